use serde::{Deserialize, Serialize};

/// Persisted ranking document. Derived data: safe to delete, regenerated
/// from the snapshot store on the next read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RankingSnapshot {
    pub recent_players: Vec<RecentPlayerEntry>,
    pub strongest_pokemon: Vec<StrongestEntry>,
    pub rarest_pokemon: Vec<RarestEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuddyInfo {
    pub name: String,
    pub sprite: String,
}

/// Owner identity in every ranking entry is the rotating public id, never
/// the internal player id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentPlayerEntry {
    pub name: String,
    pub owner_id: String,
    pub buddy: Option<BuddyInfo>,
    pub km_walked: String,
    pub pokemon_caught: i64,
    /// Snapshot file mtime, unix millis.
    pub last_update: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrongestEntry {
    pub name: String,
    pub sprite: String,
    pub cp: i64,
    pub owner: String,
    pub owner_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RarestEntry {
    pub name: String,
    pub sprite: String,
    pub owner: String,
    pub owner_id: String,
    pub type_colors: Vec<String>,
    pub is_shiny: bool,
    pub is_lucky: bool,
    pub is_perfect: bool,
    pub is_shadow: bool,
    pub is_purified: bool,
    pub is_legendary: bool,
    pub is_mythical: bool,
}
