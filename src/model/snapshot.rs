use serde::{Deserialize, Serialize};

/// Lenient typed view over an uploaded snapshot document. Uploads are
/// persisted as raw JSON; these views only surface the fields the core
/// reads, with defaults, so one odd roster entry never aborts a scan.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotView {
    pub account: Option<AccountView>,
    pub player: Option<ProgressView>,
    pub pokemons: Option<Vec<PokemonView>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountView {
    pub name: String,
    pub player_support_id: String,
    pub team: i64,
    pub creation_time_ms: i64,
    pub buddy_pokemon_proto: Option<BuddyProto>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuddyProto {
    pub buddy_pokemon_id: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressView {
    pub level: i64,
    pub experience: i64,
    pub num_pokemon_captured: i64,
    pub poke_stop_visits: i64,
    pub km_walked: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PokemonView {
    /// Per-snapshot unique instance id.
    pub id: u64,
    /// Species id (dex number).
    pub pokemon_id: u32,
    pub cp: i64,
    pub individual_attack: i64,
    pub individual_defense: i64,
    pub individual_stamina: i64,
    pub is_egg: bool,
    pub is_lucky: bool,
    pub creation_time_ms: i64,
    pub move1: Option<i64>,
    pub move2: Option<i64>,
    pub pokemon_display: Option<DisplayView>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayView {
    pub form_name: String,
    pub shiny: bool,
    pub shadow: bool,
    pub purified: bool,
    pub costume: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub username: String,
    pub player_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDetail {
    pub name: String,
    pub start_date: String,
    pub total_xp: i64,
    pub pokemon_caught: i64,
    pub pokestops_visited: i64,
    pub km_walked: f64,
    pub highlights: Vec<HighlightEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightEntry {
    pub cp: i64,
    pub name: String,
    pub sprite: String,
    pub type_colors: Vec<String>,
}

/// One row of the public leaderboard listing. `owner_id` is the rotating
/// public id, never the internal player id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub name: String,
    pub level: i64,
    pub team: i64,
    pub km_walked: String,
    pub display_pokemon: DisplayPokemonInfo,
    pub owner_id: String,
}

/// The player's showcased Pokémon: their buddy when one is set, otherwise
/// their strongest non-egg.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayPokemonInfo {
    pub name: String,
    pub cp: i64,
    pub sprite: String,
}

impl Default for DisplayPokemonInfo {
    fn default() -> Self {
        DisplayPokemonInfo {
            name: "N/A".to_string(),
            cp: 0,
            sprite: String::new(),
        }
    }
}
