use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::model::rankings::{
    BuddyInfo, RankingSnapshot, RarestEntry, RecentPlayerEntry, StrongestEntry,
};
use crate::model::snapshot::{PokemonView, SnapshotView};
use crate::services::enrich;
use crate::services::identity::IdentityService;
use crate::services::player_data::PlayerDataService;
use crate::services::pokedex::{PokedexData, PokedexService};

const LIST_LIMIT: usize = 50;

/// One accumulated roster record, tagged with its owner.
struct TaggedPokemon {
    view: PokemonView,
    owner: String,
    owner_id: String,
    score: f64,
}

struct ScanOutcome {
    recent: Vec<RecentPlayerEntry>,
    pool: Vec<TaggedPokemon>,
}

/// Ranking Aggregator: derives the three ranked views from the snapshot
/// store and persists them as one document. The document is a cache;
/// deleting it only costs a rebuild on the next read.
///
/// Rebuilds are serialized behind a mutex so two uploads arriving together
/// cannot interleave their scans into one document.
pub struct RankingService {
    cfg: Config,
    players: Arc<PlayerDataService>,
    identity: Arc<IdentityService>,
    pokedex: Arc<PokedexService>,
    rebuild_lock: Mutex<()>,
}

impl RankingService {
    pub fn new(
        cfg: Config,
        players: Arc<PlayerDataService>,
        identity: Arc<IdentityService>,
        pokedex: Arc<PokedexService>,
    ) -> Self {
        RankingService {
            cfg,
            players,
            identity,
            pokedex,
            rebuild_lock: Mutex::new(()),
        }
    }

    /// Makes sure a ranking document exists at startup.
    pub async fn initialize(&self) -> Result<()> {
        if self.read_document().await.ok().flatten().is_none() {
            info!("no ranking document found, building one");
            self.rebuild_all().await?;
        }
        Ok(())
    }

    /// Serves the persisted document, regenerating it when it is absent or
    /// unreadable.
    pub async fn get_rankings(&self) -> Result<RankingSnapshot> {
        match self.read_document().await {
            Ok(Some(doc)) => Ok(doc),
            Ok(None) => self.rebuild_all().await,
            Err(e) => {
                warn!(error = %e, "ranking document unreadable, rebuilding");
                self.rebuild_all().await
            }
        }
    }

    /// Full rebuild from every snapshot in the store.
    pub async fn rebuild_all(&self) -> Result<RankingSnapshot> {
        let _guard = self.rebuild_lock.lock().await;
        self.rebuild_locked().await
    }

    /// Cheap path after a single player's upload: splice that player's
    /// entry into the recent list, then rebuild the two cross-population
    /// lists from a full rescan. O(total players) per upload, accepted for
    /// the expected volume.
    pub async fn update_for_player(&self, internal_id: &str) -> Result<()> {
        let _guard = self.rebuild_lock.lock().await;
        let mut doc = match self.read_document().await {
            Ok(Some(doc)) => doc,
            _ => {
                self.rebuild_locked().await?;
                return Ok(());
            }
        };

        if let Some(entry) = self.recent_entry_for(internal_id).await? {
            doc.recent_players.retain(|e| e.owner_id != entry.owner_id);
            doc.recent_players.push(entry);
            doc.recent_players
                .sort_by(|a, b| b.last_update.cmp(&a.last_update));
            doc.recent_players.truncate(LIST_LIMIT);
        }

        let outcome = self.scan_store().await?;
        let dex = self.pokedex.data().await;
        doc.strongest_pokemon = build_strongest(&dex, &outcome.pool);
        doc.rarest_pokemon = build_rarest(&dex, &outcome.pool);
        self.persist(&doc).await
    }

    async fn rebuild_locked(&self) -> Result<RankingSnapshot> {
        let outcome = self.scan_store().await?;
        let dex = self.pokedex.data().await;

        let mut recent = outcome.recent;
        recent.sort_by(|a, b| b.last_update.cmp(&a.last_update));
        recent.truncate(LIST_LIMIT);

        let doc = RankingSnapshot {
            recent_players: recent,
            strongest_pokemon: build_strongest(&dex, &outcome.pool),
            rarest_pokemon: build_rarest(&dex, &outcome.pool),
        };
        self.persist(&doc).await?;
        info!(
            players = doc.recent_players.len(),
            pokemon = outcome.pool.len(),
            "rankings rebuilt"
        );
        Ok(doc)
    }

    /// Walks every snapshot once, accumulating recent-player entries and
    /// the tagged roster pool. Malformed files are skipped with a warning.
    async fn scan_store(&self) -> Result<ScanOutcome> {
        let files = self.players.list_snapshot_files().await?;
        let dex = self.pokedex.data().await;
        let mut recent = Vec::new();
        let mut pool = Vec::new();

        for path in files {
            let Some((view, mtime)) = read_snapshot(&path).await else {
                continue;
            };
            let (Some(account), Some(player), Some(pokemons)) =
                (view.account, view.player, view.pokemons)
            else {
                warn!(file = %path.display(), "snapshot missing required sections, skipping");
                continue;
            };
            if account.player_support_id.is_empty() {
                warn!(file = %path.display(), "snapshot has no player id, skipping");
                continue;
            }

            let public_id = self
                .identity
                .public_id_for(&account.player_support_id)
                .await?;

            let buddy = account
                .buddy_pokemon_proto
                .as_ref()
                .and_then(|b| pokemons.iter().find(|p| p.id == b.buddy_pokemon_id))
                .filter(|p| p.pokemon_display.is_some())
                .map(|p| {
                    let info = enrich::display_info(&dex, p);
                    BuddyInfo {
                        name: info.name,
                        sprite: info.sprite,
                    }
                });

            recent.push(RecentPlayerEntry {
                name: account.name.clone(),
                owner_id: public_id.clone(),
                buddy,
                km_walked: format!("{:.1}", player.km_walked),
                pokemon_caught: player.num_pokemon_captured,
                last_update: mtime,
            });

            for p in &pokemons {
                if !enrich::is_displayable(p) {
                    continue;
                }
                let form_name = p
                    .pokemon_display
                    .as_ref()
                    .map(|d| d.form_name.as_str())
                    .unwrap_or_default();
                let entry = dex.entry_for_form(p.pokemon_id, form_name);
                let score = enrich::rarity_score(p, entry);
                pool.push(TaggedPokemon {
                    view: p.clone(),
                    owner: account.name.clone(),
                    owner_id: public_id.clone(),
                    score,
                });
            }
        }
        Ok(ScanOutcome { recent, pool })
    }

    async fn recent_entry_for(&self, internal_id: &str) -> Result<Option<RecentPlayerEntry>> {
        let Some(view) = self.players.load_view(internal_id).await? else {
            return Ok(None);
        };
        let (Some(account), Some(player), Some(pokemons)) =
            (view.account, view.player, view.pokemons)
        else {
            return Ok(None);
        };

        let dex = self.pokedex.data().await;
        let public_id = self.identity.public_id_for(internal_id).await?;
        let mtime = match tokio::fs::metadata(self.players.snapshot_path(internal_id)).await {
            Ok(meta) => mtime_millis(&meta),
            Err(_) => 0,
        };
        let buddy = account
            .buddy_pokemon_proto
            .as_ref()
            .and_then(|b| pokemons.iter().find(|p| p.id == b.buddy_pokemon_id))
            .filter(|p| p.pokemon_display.is_some())
            .map(|p| {
                let info = enrich::display_info(&dex, p);
                BuddyInfo {
                    name: info.name,
                    sprite: info.sprite,
                }
            });

        Ok(Some(RecentPlayerEntry {
            name: account.name,
            owner_id: public_id,
            buddy,
            km_walked: format!("{:.1}", player.km_walked),
            pokemon_caught: player.num_pokemon_captured,
            last_update: mtime,
        }))
    }

    async fn read_document(&self) -> Result<Option<RankingSnapshot>> {
        let text = match tokio::fs::read_to_string(self.cfg.rankings_file()).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let doc = serde_json::from_str(&text).context("parsing ranking document")?;
        Ok(Some(doc))
    }

    async fn persist(&self, doc: &RankingSnapshot) -> Result<()> {
        tokio::fs::create_dir_all(&self.cfg.data_dir).await?;
        let json = serde_json::to_string_pretty(doc)?;
        tokio::fs::write(self.cfg.rankings_file(), json)
            .await
            .context("writing ranking document")
    }
}

async fn read_snapshot(path: &Path) -> Option<(SnapshotView, i64)> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "could not stat snapshot, skipping");
            return None;
        }
    };
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "could not read snapshot, skipping");
            return None;
        }
    };
    match serde_json::from_str::<SnapshotView>(&text) {
        Ok(view) => Some((view, mtime_millis(&meta))),
        Err(e) => {
            warn!(file = %path.display(), error = %e, "malformed snapshot, skipping");
            None
        }
    }
}

fn mtime_millis(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn build_strongest(dex: &PokedexData, pool: &[TaggedPokemon]) -> Vec<StrongestEntry> {
    let mut sorted: Vec<&TaggedPokemon> = pool.iter().collect();
    sorted.sort_by(|a, b| b.view.cp.cmp(&a.view.cp));
    sorted.truncate(LIST_LIMIT);
    sorted
        .into_iter()
        .map(|t| {
            let info = enrich::display_info(dex, &t.view);
            StrongestEntry {
                name: info.name,
                sprite: info.sprite,
                cp: t.view.cp,
                owner: t.owner.clone(),
                owner_id: t.owner_id.clone(),
            }
        })
        .collect()
}

fn build_rarest(dex: &PokedexData, pool: &[TaggedPokemon]) -> Vec<RarestEntry> {
    let mut qualifying: Vec<&TaggedPokemon> = pool.iter().filter(|t| t.score > 0.0).collect();
    qualifying.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.view.cp.cmp(&a.view.cp))
    });
    qualifying.truncate(LIST_LIMIT);
    qualifying
        .into_iter()
        .map(|t| {
            let display = t.view.pokemon_display.clone().unwrap_or_default();
            let form_name = display.form_name.as_str();
            let entry = dex.entry_for_form(t.view.pokemon_id, form_name);
            let info = enrich::display_info(dex, &t.view);
            RarestEntry {
                name: info.name,
                sprite: info.sprite,
                owner: t.owner.clone(),
                owner_id: t.owner_id.clone(),
                type_colors: dex.resolve_type_colors(entry),
                is_shiny: display.shiny,
                is_lucky: t.view.is_lucky,
                is_perfect: enrich::is_perfect(&t.view),
                is_shadow: display.shadow,
                is_purified: display.purified,
                is_legendary: entry.map_or(false, |e| e.is_legendary()),
                is_mythical: entry.map_or(false, |e| e.is_mythic()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tempfile::tempdir;

    fn test_config(dir: &Path) -> Config {
        Config {
            data_dir: dir.to_path_buf(),
            fetch_timeout: Duration::from_secs(5),
            ..Config::default()
        }
    }

    struct Harness {
        cfg: Config,
        players: Arc<PlayerDataService>,
        identity: Arc<IdentityService>,
        rankings: RankingService,
    }

    fn harness(dir: &Path) -> Harness {
        let cfg = test_config(dir);
        let players = Arc::new(PlayerDataService::new(cfg.clone()));
        let identity = Arc::new(IdentityService::new(&cfg));
        let pokedex = Arc::new(PokedexService::new(cfg.clone()));
        let rankings = RankingService::new(
            cfg.clone(),
            players.clone(),
            identity.clone(),
            pokedex,
        );
        Harness {
            cfg,
            players,
            identity,
            rankings,
        }
    }

    fn pokemon(id: u64, cp: i64, flags: &[&str], ivs: (i64, i64, i64)) -> Value {
        json!({
            "id": id,
            "pokemonId": 25,
            "cp": cp,
            "individualAttack": ivs.0,
            "individualDefense": ivs.1,
            "individualStamina": ivs.2,
            "isLucky": flags.contains(&"lucky"),
            "creationTimeMs": 1_000 + id,
            "pokemonDisplay": {
                "formName": "Pikachu",
                "shiny": flags.contains(&"shiny"),
                "shadow": flags.contains(&"shadow"),
                "purified": flags.contains(&"purified")
            }
        })
    }

    fn snapshot(name: &str, player_id: &str, pokemons: Vec<Value>) -> Value {
        json!({
            "account": {
                "name": name,
                "playerSupportId": player_id,
                "buddyPokemonProto": { "buddyPokemonId": pokemons.first()
                    .and_then(|p| p["id"].as_u64()).unwrap_or(0) }
            },
            "player": {
                "numPokemonCaptured": 100,
                "kmWalked": 42.0
            },
            "pokemons": pokemons
        })
    }

    #[tokio::test]
    async fn empty_store_yields_an_empty_document() {
        let dir = tempdir().unwrap();
        let h = harness(dir.path());
        let doc = h.rankings.rebuild_all().await.unwrap();
        assert!(doc.recent_players.is_empty());
        assert!(doc.strongest_pokemon.is_empty());
        assert!(doc.rarest_pokemon.is_empty());
        assert!(h.cfg.rankings_file().exists());
    }

    #[tokio::test]
    async fn strongest_is_ordered_by_cp_across_players() {
        let dir = tempdir().unwrap();
        let h = harness(dir.path());

        h.players
            .save_player_data(&snapshot(
                "Ash",
                "trainer-1",
                vec![
                    pokemon(1, 500, &[], (0, 0, 0)),
                    pokemon(2, 2500, &[], (0, 0, 0)),
                ],
            ))
            .await
            .unwrap();
        h.players
            .save_player_data(&snapshot(
                "Misty",
                "trainer-2",
                vec![pokemon(3, 1200, &[], (0, 0, 0))],
            ))
            .await
            .unwrap();

        let doc = h.rankings.rebuild_all().await.unwrap();
        let cps: Vec<i64> = doc.strongest_pokemon.iter().map(|e| e.cp).collect();
        assert_eq!(cps, vec![2500, 1200, 500]);
        assert_eq!(doc.recent_players.len(), 2);
        assert!(doc.recent_players[0].buddy.is_some());
        assert_eq!(doc.recent_players[0].km_walked, "42.0");

        // owner identity is masked: the internal id never appears
        for entry in &doc.strongest_pokemon {
            assert_ne!(entry.owner_id, "trainer-1");
            assert_ne!(entry.owner_id, "trainer-2");
        }
        let public = doc.strongest_pokemon[0].owner_id.clone();
        assert_eq!(
            h.identity.internal_id_for(&public).await.as_deref(),
            Some("trainer-1")
        );
    }

    #[tokio::test]
    async fn malformed_snapshots_are_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let h = harness(dir.path());

        h.players
            .save_player_data(&snapshot(
                "Ash",
                "trainer-1",
                vec![pokemon(1, 900, &[], (0, 0, 0))],
            ))
            .await
            .unwrap();
        tokio::fs::create_dir_all(h.cfg.players_dir()).await.unwrap();
        tokio::fs::write(
            h.cfg.players_dir().join("no-account.json"),
            json!({ "player": {}, "pokemons": [pokemon(9, 9000, &[], (0, 0, 0))] }).to_string(),
        )
        .await
        .unwrap();
        tokio::fs::write(h.cfg.players_dir().join("garbage.json"), "{ not json")
            .await
            .unwrap();

        let doc = h.rankings.rebuild_all().await.unwrap();
        assert_eq!(doc.recent_players.len(), 1);
        assert_eq!(doc.strongest_pokemon.len(), 1);
        assert_eq!(doc.strongest_pokemon[0].cp, 900);
    }

    #[tokio::test]
    async fn rarest_filters_and_breaks_ties_by_cp() {
        let dir = tempdir().unwrap();
        let h = harness(dir.path());

        h.players
            .save_player_data(&snapshot(
                "Ash",
                "trainer-1",
                vec![
                    // 8.8: perfect ivs with the cp bonus
                    pokemon(1, 1000, &[], (15, 15, 15)),
                    // 8.0 twice: shiny, so the cp decides between them
                    pokemon(2, 2000, &["shiny"], (0, 0, 0)),
                    pokemon(3, 0, &["shiny"], (0, 0, 0)),
                    // 4.0: lucky
                    pokemon(4, 3000, &["lucky"], (0, 0, 0)),
                    // near-perfect with no flags scores zero and is excluded
                    pokemon(5, 4000, &[], (14, 15, 15)),
                ],
            ))
            .await
            .unwrap();

        let doc = h.rankings.rebuild_all().await.unwrap();
        assert_eq!(doc.rarest_pokemon.len(), 4);
        assert!(doc.rarest_pokemon[0].is_perfect);
        assert!(doc.rarest_pokemon[1].is_shiny);
        assert!(doc.rarest_pokemon[2].is_shiny);
        assert!(doc.rarest_pokemon[3].is_lucky);
        // the shiny pair is ordered by cp descending
        assert_eq!(doc.rarest_pokemon[1].sprite, doc.rarest_pokemon[2].sprite);
        let strongest: Vec<i64> = doc.strongest_pokemon.iter().map(|e| e.cp).collect();
        assert_eq!(strongest, vec![4000, 3000, 2000, 1000, 0]);
    }

    #[tokio::test]
    async fn eggs_never_reach_the_rankings() {
        let dir = tempdir().unwrap();
        let h = harness(dir.path());

        let mut egg = pokemon(7, 9999, &[], (15, 15, 15));
        egg["isEgg"] = json!(true);
        h.players
            .save_player_data(&snapshot("Ash", "trainer-1", vec![egg]))
            .await
            .unwrap();

        let doc = h.rankings.rebuild_all().await.unwrap();
        assert!(doc.strongest_pokemon.is_empty());
        assert!(doc.rarest_pokemon.is_empty());
    }

    #[tokio::test]
    async fn missing_document_is_rebuilt_on_read() {
        let dir = tempdir().unwrap();
        let h = harness(dir.path());

        h.players
            .save_player_data(&snapshot(
                "Ash",
                "trainer-1",
                vec![pokemon(1, 700, &[], (0, 0, 0))],
            ))
            .await
            .unwrap();

        let doc = h.rankings.get_rankings().await.unwrap();
        assert_eq!(doc.strongest_pokemon.len(), 1);
        tokio::fs::remove_file(h.cfg.rankings_file()).await.unwrap();
        let doc = h.rankings.get_rankings().await.unwrap();
        assert_eq!(doc.strongest_pokemon.len(), 1);
    }

    #[tokio::test]
    async fn update_for_player_refreshes_recent_and_population_lists() {
        let dir = tempdir().unwrap();
        let h = harness(dir.path());

        h.players
            .save_player_data(&snapshot(
                "Ash",
                "trainer-1",
                vec![pokemon(1, 700, &[], (0, 0, 0))],
            ))
            .await
            .unwrap();
        h.rankings.rebuild_all().await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        h.players
            .save_player_data(&snapshot(
                "Misty",
                "trainer-2",
                vec![pokemon(2, 3100, &[], (0, 0, 0))],
            ))
            .await
            .unwrap();
        h.rankings.update_for_player("trainer-2").await.unwrap();

        let doc = h.rankings.get_rankings().await.unwrap();
        assert_eq!(doc.recent_players.len(), 2);
        assert_eq!(doc.recent_players[0].name, "Misty");
        let cps: Vec<i64> = doc.strongest_pokemon.iter().map(|e| e.cp).collect();
        assert_eq!(cps, vec![3100, 700]);

        // a re-upload replaces the player's entry instead of duplicating it
        h.players
            .save_player_data(&snapshot(
                "Misty",
                "trainer-2",
                vec![pokemon(2, 3200, &[], (0, 0, 0))],
            ))
            .await
            .unwrap();
        h.rankings.update_for_player("trainer-2").await.unwrap();
        let doc = h.rankings.get_rankings().await.unwrap();
        assert_eq!(doc.recent_players.len(), 2);
        assert_eq!(doc.strongest_pokemon[0].cp, 3200);
    }
}
