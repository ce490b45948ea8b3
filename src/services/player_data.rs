use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::Config;
use crate::model::snapshot::{
    DisplayPokemonInfo, HighlightEntry, PlayerDetail, PlayerSummary, PokemonView, SnapshotView,
    UserRecord,
};
use crate::services::enrich;
use crate::services::identity::IdentityService;
use crate::services::pokedex::PokedexData;

static STATS_FILE: &str = "PGSStats.json";
const HIGHLIGHT_LIMIT: usize = 4;

/// Result of an upload. An empty payload is a connectivity test from the
/// uploading client and counts as success; a non-empty payload without the
/// two required account fields is a structured rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Saved { name: String, player_id: String },
    ConnectionTest,
    MissingFields,
}

/// Player Snapshot Store: one JSON document per player, written wholesale
/// on every upload, plus the small user registry keyed by internal id.
pub struct PlayerDataService {
    cfg: Config,
}

impl PlayerDataService {
    pub fn new(cfg: Config) -> Self {
        PlayerDataService { cfg }
    }

    /// Validates the two required fields and persists the payload verbatim.
    /// Everything beyond those fields is stored as given.
    pub async fn save_player_data(&self, data: &Value) -> Result<UploadOutcome> {
        let name = data
            .pointer("/account/name")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let player_id = match data.pointer("/account/playerSupportId") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        let (Some(name), Some(player_id)) = (name, player_id) else {
            if data.as_object().map_or(false, |o| o.is_empty()) {
                info!("received connection test (empty payload)");
                return Ok(UploadOutcome::ConnectionTest);
            }
            warn!("upload rejected, missing required account fields");
            return Ok(UploadOutcome::MissingFields);
        };

        info!(player = %name, id = %player_id, "received snapshot upload");
        tokio::fs::create_dir_all(self.cfg.players_dir())
            .await
            .context("creating snapshot directory")?;
        let json = serde_json::to_string_pretty(data)?;
        tokio::fs::write(self.snapshot_path(&player_id), json)
            .await
            .context("writing snapshot file")?;

        self.upsert_user(&player_id, &name).await?;
        Ok(UploadOutcome::Saved { name, player_id })
    }

    /// Every snapshot file in the store, excluding auxiliary files. A
    /// missing directory means zero players, not an error.
    pub async fn list_snapshot_files(&self) -> Result<Vec<PathBuf>> {
        let mut dir = match tokio::fs::read_dir(self.cfg.players_dir()).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut files = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            let is_json = path.extension().map_or(false, |ext| ext == "json");
            let is_stats = path
                .file_name()
                .map_or(false, |name| name == STATS_FILE);
            if is_json && !is_stats {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Typed view of one player's snapshot; `None` covers both an unknown
    /// id and an unreadable document.
    pub async fn load_view(&self, internal_id: &str) -> Result<Option<SnapshotView>> {
        let path = self.snapshot_path(internal_id);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<SnapshotView>(&text) {
            Ok(view) => Ok(Some(view)),
            Err(e) => {
                warn!(id = %internal_id, error = %e, "snapshot unreadable");
                Ok(None)
            }
        }
    }

    /// Dashboard detail view: summary stats plus up to four highlight
    /// Pokémon (most recent catch, latest shiny if distinct, top-CP
    /// fillers), enriched for display.
    pub async fn get_player_detail(
        &self,
        internal_id: &str,
        dex: &PokedexData,
    ) -> Result<Option<PlayerDetail>> {
        let Some(view) = self.load_view(internal_id).await? else {
            return Ok(None);
        };
        let (Some(account), Some(player), Some(pokemons)) =
            (view.account, view.player, view.pokemons)
        else {
            return Ok(None);
        };

        let roster: Vec<&PokemonView> =
            pokemons.iter().filter(|p| enrich::is_displayable(p)).collect();
        let mut highlights: Vec<&PokemonView> = Vec::new();
        let mut seen: HashSet<u64> = HashSet::new();

        if let Some(recent) = roster.iter().max_by_key(|p| p.creation_time_ms) {
            seen.insert(recent.id);
            highlights.push(recent);
        }
        let latest_shiny = roster
            .iter()
            .filter(|p| p.pokemon_display.as_ref().map_or(false, |d| d.shiny))
            .max_by_key(|p| p.creation_time_ms);
        if let Some(shiny) = latest_shiny {
            if seen.insert(shiny.id) {
                highlights.push(shiny);
            }
        }
        let mut by_cp = roster.clone();
        by_cp.sort_by(|a, b| b.cp.cmp(&a.cp));
        for p in by_cp {
            if highlights.len() >= HIGHLIGHT_LIMIT {
                break;
            }
            if seen.insert(p.id) {
                highlights.push(p);
            }
        }

        let highlights = highlights
            .into_iter()
            .map(|p| {
                let info = enrich::display_info(dex, p);
                HighlightEntry {
                    cp: p.cp,
                    name: info.name,
                    sprite: info.sprite,
                    type_colors: info.type_colors,
                }
            })
            .collect();

        Ok(Some(PlayerDetail {
            name: account.name,
            start_date: format_start_date(account.creation_time_ms),
            total_xp: player.experience,
            pokemon_caught: player.num_pokemon_captured,
            pokestops_visited: player.poke_stop_visits,
            km_walked: player.km_walked,
            highlights,
        }))
    }

    /// One summary row per stored player for the public leaderboard page.
    /// The showcased Pokémon is the buddy when one is set, otherwise the
    /// strongest non-egg; players with neither get the `N/A` placeholder.
    /// Unreadable snapshots are skipped, never fatal.
    pub async fn get_public_player_summaries(
        &self,
        dex: &PokedexData,
        identity: &IdentityService,
    ) -> Result<Vec<PlayerSummary>> {
        let mut summaries = Vec::new();
        for path in self.list_snapshot_files().await? {
            let text = match tokio::fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "could not read snapshot, skipping");
                    continue;
                }
            };
            let view = match serde_json::from_str::<SnapshotView>(&text) {
                Ok(view) => view,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "malformed snapshot, skipping");
                    continue;
                }
            };
            let (Some(account), Some(player)) = (view.account, view.player) else {
                warn!(file = %path.display(), "snapshot missing required sections, skipping");
                continue;
            };
            if account.player_support_id.is_empty() {
                continue;
            }
            let pokemons = view.pokemons.unwrap_or_default();

            let showcased = account
                .buddy_pokemon_proto
                .as_ref()
                .filter(|b| b.buddy_pokemon_id != 0)
                .and_then(|b| pokemons.iter().find(|p| p.id == b.buddy_pokemon_id))
                .or_else(|| pokemons.iter().filter(|p| !p.is_egg).max_by_key(|p| p.cp));
            let display_pokemon = match showcased {
                Some(p) => {
                    let info = enrich::display_info(dex, p);
                    DisplayPokemonInfo {
                        name: info.name,
                        cp: p.cp,
                        sprite: info.sprite,
                    }
                }
                None => DisplayPokemonInfo::default(),
            };

            let owner_id = identity.public_id_for(&account.player_support_id).await?;
            summaries.push(PlayerSummary {
                name: account.name,
                level: player.level,
                team: account.team,
                km_walked: format!("{:.1}", player.km_walked),
                display_pokemon,
                owner_id,
            });
        }
        Ok(summaries)
    }

    /// Full snapshot for the owner's private dashboard, with every non-egg
    /// roster entry augmented in place with display fields. Eggs and
    /// unparseable entries pass through untouched.
    pub async fn get_private_player_data(
        &self,
        internal_id: &str,
        dex: &PokedexData,
    ) -> Result<Option<Value>> {
        let path = self.snapshot_path(internal_id);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut value: Value =
            serde_json::from_str(&text).context("parsing stored snapshot")?;

        if let Some(entries) = value.pointer_mut("/pokemons").and_then(Value::as_array_mut) {
            for slot in entries {
                let Ok(p) = serde_json::from_value::<PokemonView>(slot.clone()) else {
                    continue;
                };
                if !enrich::is_displayable(&p) {
                    continue;
                }
                let info = enrich::display_info(dex, &p);
                if let Some(obj) = slot.as_object_mut() {
                    obj.insert("name".to_string(), json!(info.name));
                    obj.insert("sprite".to_string(), json!(info.sprite));
                    obj.insert("typeColors".to_string(), json!(info.type_colors));
                    if let Some(name) = p.move1.and_then(|id| dex.resolve_move_name(id)) {
                        obj.insert("move1Name".to_string(), json!(name));
                    }
                    if let Some(name) = p.move2.and_then(|id| dex.resolve_move_name(id)) {
                        obj.insert("move2Name".to_string(), json!(name));
                    }
                }
            }
        }
        Ok(Some(value))
    }

    pub async fn read_users(&self) -> Result<Vec<UserRecord>> {
        match tokio::fs::read_to_string(self.cfg.users_file()).await {
            Ok(text) => Ok(serde_json::from_str(&text).unwrap_or_default()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_users(&self, users: &[UserRecord]) -> Result<()> {
        tokio::fs::create_dir_all(&self.cfg.data_dir).await?;
        let json = serde_json::to_string_pretty(users)?;
        tokio::fs::write(self.cfg.users_file(), json)
            .await
            .context("writing user registry")
    }

    async fn upsert_user(&self, player_id: &str, name: &str) -> Result<()> {
        let mut users = self.read_users().await?;
        match users.iter_mut().find(|u| u.player_id == player_id) {
            Some(user) => user.username = name.to_string(),
            None => users.push(UserRecord {
                username: name.to_string(),
                player_id: player_id.to_string(),
            }),
        }
        self.write_users(&users).await
    }

    pub fn snapshot_path(&self, internal_id: &str) -> PathBuf {
        // ids are externally issued; reduce to a bare file name so an odd
        // id can never escape the snapshot directory
        let stem = Path::new(internal_id)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(internal_id);
        self.cfg.players_dir().join(format!("{}.json", stem))
    }
}

fn format_start_date(creation_time_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(creation_time_ms)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::tempdir;

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            data_dir: dir.to_path_buf(),
            fetch_timeout: Duration::from_secs(5),
            ..Config::default()
        }
    }

    fn pokemon(id: u64, cp: i64, created: i64, shiny: bool) -> Value {
        json!({
            "id": id,
            "pokemonId": 25,
            "cp": cp,
            "creationTimeMs": created,
            "pokemonDisplay": { "formName": "Pikachu", "shiny": shiny }
        })
    }

    fn snapshot(name: &str, player_id: &str, pokemons: Vec<Value>) -> Value {
        json!({
            "account": {
                "name": name,
                "playerSupportId": player_id,
                "team": 2,
                "creationTimeMs": 1_467_331_200_000i64
            },
            "player": {
                "level": 40,
                "experience": 1_000_000,
                "numPokemonCaptured": 420,
                "pokeStopVisits": 777,
                "kmWalked": 123.45
            },
            "pokemons": pokemons
        })
    }

    #[tokio::test]
    async fn empty_payload_is_a_connection_test() {
        let dir = tempdir().unwrap();
        let svc = PlayerDataService::new(test_config(dir.path()));
        let outcome = svc.save_player_data(&json!({})).await.unwrap();
        assert_eq!(outcome, UploadOutcome::ConnectionTest);
    }

    #[tokio::test]
    async fn payload_without_required_fields_is_rejected() {
        let dir = tempdir().unwrap();
        let svc = PlayerDataService::new(test_config(dir.path()));
        let outcome = svc
            .save_player_data(&json!({ "account": { "name": "Ash" } }))
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::MissingFields);
    }

    #[tokio::test]
    async fn valid_payload_is_persisted_and_registered() {
        let dir = tempdir().unwrap();
        let cfg = test_config(dir.path());
        let svc = PlayerDataService::new(cfg.clone());

        let outcome = svc
            .save_player_data(&snapshot("Ash", "trainer-1", vec![]))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            UploadOutcome::Saved {
                name: "Ash".to_string(),
                player_id: "trainer-1".to_string()
            }
        );
        assert!(cfg.players_dir().join("trainer-1.json").exists());

        let users = svc.read_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "Ash");

        // a second upload only refreshes the in-game name
        svc.save_player_data(&snapshot("Red", "trainer-1", vec![]))
            .await
            .unwrap();
        let users = svc.read_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "Red");
    }

    #[tokio::test]
    async fn snapshot_listing_skips_auxiliary_files() {
        let dir = tempdir().unwrap();
        let cfg = test_config(dir.path());
        let svc = PlayerDataService::new(cfg.clone());

        assert!(svc.list_snapshot_files().await.unwrap().is_empty());

        tokio::fs::create_dir_all(cfg.players_dir()).await.unwrap();
        tokio::fs::write(cfg.players_dir().join("trainer-1.json"), "{}")
            .await
            .unwrap();
        tokio::fs::write(cfg.players_dir().join("PGSStats.json"), "{}")
            .await
            .unwrap();
        tokio::fs::write(cfg.players_dir().join("notes.txt"), "")
            .await
            .unwrap();

        let files = svc.list_snapshot_files().await.unwrap();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn detail_highlights_are_deduplicated_and_capped() {
        let dir = tempdir().unwrap();
        let svc = PlayerDataService::new(test_config(dir.path()));

        // instance 1 is both the most recent catch and the latest shiny;
        // it must appear once
        let roster = vec![
            pokemon(1, 900, 5_000, true),
            pokemon(2, 3000, 1_000, false),
            pokemon(3, 2500, 2_000, false),
            pokemon(4, 2000, 3_000, false),
            pokemon(5, 1500, 4_000, false),
        ];
        svc.save_player_data(&snapshot("Ash", "trainer-1", roster))
            .await
            .unwrap();

        let dex = PokedexData::default();
        let detail = svc
            .get_player_detail("trainer-1", &dex)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(detail.name, "Ash");
        assert_eq!(detail.pokemon_caught, 420);
        assert_eq!(detail.highlights.len(), 4);
        let cps: Vec<i64> = detail.highlights.iter().map(|h| h.cp).collect();
        // recent catch first, then top-CP fillers
        assert_eq!(cps, vec![900, 3000, 2500, 2000]);
        assert!(detail.highlights.iter().all(|h| !h.sprite.is_empty()));
    }

    #[tokio::test]
    async fn unknown_player_detail_is_not_found() {
        let dir = tempdir().unwrap();
        let svc = PlayerDataService::new(test_config(dir.path()));
        let dex = PokedexData::default();
        assert!(svc
            .get_player_detail("nobody", &dex)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn snapshot_path_never_escapes_the_store() {
        let dir = tempdir().unwrap();
        let cfg = test_config(dir.path());
        let svc = PlayerDataService::new(cfg.clone());

        svc.save_player_data(&snapshot("Ash", "../../outside", vec![]))
            .await
            .unwrap();
        assert!(cfg.players_dir().join("outside.json").exists());
        assert!(!dir.path().join("outside.json").exists());
        assert_eq!(
            svc.snapshot_path("../../outside"),
            cfg.players_dir().join("outside.json")
        );
    }

    #[tokio::test]
    async fn public_summaries_showcase_buddy_over_top_cp() {
        let dir = tempdir().unwrap();
        let svc = PlayerDataService::new(test_config(dir.path()));
        let identity = IdentityService::new(&test_config(dir.path()));

        // buddy wins even when a stronger roster entry exists
        let mut with_buddy = snapshot(
            "Ash",
            "trainer-1",
            vec![pokemon(1, 500, 1_000, false), pokemon(2, 3000, 2_000, false)],
        );
        with_buddy["account"]["buddyPokemonProto"] = json!({ "buddyPokemonId": 1 });
        svc.save_player_data(&with_buddy).await.unwrap();

        // no buddy: the strongest non-egg is showcased, never the egg
        let mut egg = pokemon(9, 9000, 0, false);
        egg["isEgg"] = json!(true);
        let no_buddy = snapshot(
            "Misty",
            "trainer-2",
            vec![egg, pokemon(3, 1200, 1_000, false)],
        );
        svc.save_player_data(&no_buddy).await.unwrap();

        let dex = PokedexData::default();
        let mut summaries = svc
            .get_public_player_summaries(&dex, &identity)
            .await
            .unwrap();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(summaries.len(), 2);

        let ash = &summaries[0];
        assert_eq!(ash.name, "Ash");
        assert_eq!(ash.level, 40);
        assert_eq!(ash.team, 2);
        assert_eq!(ash.km_walked, "123.5");
        assert_eq!(ash.display_pokemon.cp, 500);

        let misty = &summaries[1];
        assert_eq!(misty.display_pokemon.cp, 1200);

        // owner identity is masked and round-trips through the id map
        assert_ne!(ash.owner_id, "trainer-1");
        assert_eq!(
            identity.internal_id_for(&ash.owner_id).await.as_deref(),
            Some("trainer-1")
        );
    }

    #[tokio::test]
    async fn public_summaries_placeholder_for_an_empty_roster() {
        let dir = tempdir().unwrap();
        let svc = PlayerDataService::new(test_config(dir.path()));
        let identity = IdentityService::new(&test_config(dir.path()));

        svc.save_player_data(&snapshot("Ash", "trainer-1", vec![]))
            .await
            .unwrap();

        let dex = PokedexData::default();
        let summaries = svc
            .get_public_player_summaries(&dex, &identity)
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].display_pokemon.name, "N/A");
        assert_eq!(summaries[0].display_pokemon.cp, 0);
        assert!(summaries[0].display_pokemon.sprite.is_empty());
    }

    #[tokio::test]
    async fn private_data_enriches_roster_entries_in_place() {
        let dir = tempdir().unwrap();
        let svc = PlayerDataService::new(test_config(dir.path()));

        let mut egg = pokemon(9, 0, 0, false);
        egg["isEgg"] = json!(true);
        let roster = vec![pokemon(1, 1200, 1_000, false), egg];
        svc.save_player_data(&snapshot("Ash", "trainer-1", roster))
            .await
            .unwrap();

        let dex = PokedexData::default();
        let value = svc
            .get_private_player_data("trainer-1", &dex)
            .await
            .unwrap()
            .unwrap();
        let entries = value["pokemons"].as_array().unwrap();
        assert_eq!(entries[0]["name"], json!("Pokedex #25"));
        assert!(entries[0]["sprite"].as_str().unwrap().contains("pokemon_icon"));
        assert!(entries[1].get("name").is_none());
    }
}
