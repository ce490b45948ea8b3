use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::Config;

const TOKEN_LEN: usize = 16;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct IdMap {
    forward: HashMap<String, String>,
    reverse: HashMap<String, String>,
}

/// Bidirectional map between the stable internal player id and the
/// rotating public id shared in public-facing contexts. Entries are minted
/// lazily and the whole map is persisted after every mutation.
///
/// When the persisted map is lost, `initialize` rebuilds it from the known
/// internal ids in the user registry. Previously shared public links go
/// stale at that point, which is accepted.
pub struct IdentityService {
    path: PathBuf,
    inner: Mutex<IdMap>,
}

impl IdentityService {
    pub fn new(cfg: &Config) -> Self {
        IdentityService {
            path: cfg.public_ids_file(),
            inner: Mutex::new(IdMap::default()),
        }
    }

    pub async fn initialize(&self, known_internal_ids: Vec<String>) -> Result<()> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => match serde_json::from_str::<IdMap>(&text) {
                Ok(map) => {
                    *self.inner.lock().await = map;
                    return Ok(());
                }
                Err(e) => warn!(error = %e, "public id map unreadable, rebuilding"),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no public id map found, building from registry")
            }
            Err(e) => warn!(error = %e, "could not read public id map, rebuilding"),
        }

        let mut map = IdMap::default();
        for internal in known_internal_ids {
            let token = mint_unique(&map);
            map.forward.insert(internal.clone(), token.clone());
            map.reverse.insert(token, internal);
        }
        self.persist(&map).await?;
        *self.inner.lock().await = map;
        Ok(())
    }

    /// Idempotent: returns the existing token for a known internal id, or
    /// mints, persists and returns a new one.
    pub async fn public_id_for(&self, internal_id: &str) -> Result<String> {
        let mut map = self.inner.lock().await;
        if let Some(token) = map.forward.get(internal_id) {
            return Ok(token.clone());
        }
        let token = mint_unique(&map);
        map.forward.insert(internal_id.to_string(), token.clone());
        map.reverse.insert(token.clone(), internal_id.to_string());
        self.persist(&map).await?;
        Ok(token)
    }

    /// Reverse lookup; `None` for unrecognized or stale tokens.
    pub async fn internal_id_for(&self, public_id: &str) -> Option<String> {
        self.inner.lock().await.reverse.get(public_id).cloned()
    }

    async fn persist(&self, map: &IdMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(map)?;
        tokio::fs::write(&self.path, json)
            .await
            .context("persisting public id map")
    }
}

fn mint_unique(map: &IdMap) -> String {
    loop {
        let token = mint_token();
        if !map.reverse.contains_key(&token) {
            return token;
        }
    }
}

fn mint_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;
    use tempfile::tempdir;

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            data_dir: dir.to_path_buf(),
            fetch_timeout: Duration::from_secs(5),
            ..Config::default()
        }
    }

    #[test]
    fn tokens_do_not_collide_over_many_mints() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(mint_token()));
        }
    }

    #[tokio::test]
    async fn public_id_is_idempotent_and_round_trips() {
        let dir = tempdir().unwrap();
        let svc = IdentityService::new(&test_config(dir.path()));
        svc.initialize(vec![]).await.unwrap();

        let a = svc.public_id_for("player-a").await.unwrap();
        let b = svc.public_id_for("player-b").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(svc.public_id_for("player-a").await.unwrap(), a);
        assert_eq!(svc.internal_id_for(&a).await.as_deref(), Some("player-a"));
        assert_eq!(svc.internal_id_for("bogus-token").await, None);
    }

    #[tokio::test]
    async fn map_survives_a_restart() {
        let dir = tempdir().unwrap();
        let cfg = test_config(dir.path());

        let svc = IdentityService::new(&cfg);
        svc.initialize(vec![]).await.unwrap();
        let token = svc.public_id_for("player-a").await.unwrap();

        let svc = IdentityService::new(&cfg);
        svc.initialize(vec![]).await.unwrap();
        assert_eq!(svc.public_id_for("player-a").await.unwrap(), token);
    }

    #[tokio::test]
    async fn lost_map_is_rebuilt_from_the_registry() {
        let dir = tempdir().unwrap();
        let cfg = test_config(dir.path());

        let svc = IdentityService::new(&cfg);
        svc.initialize(vec!["player-a".to_string(), "player-b".to_string()])
            .await
            .unwrap();
        let a = svc.public_id_for("player-a").await.unwrap();
        let b = svc.public_id_for("player-b").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(svc.internal_id_for(&b).await.as_deref(), Some("player-b"));
        assert!(cfg.public_ids_file().exists());
    }

    #[tokio::test]
    async fn corrupt_map_file_is_rebuilt() {
        let dir = tempdir().unwrap();
        let cfg = test_config(dir.path());
        tokio::fs::write(cfg.public_ids_file(), "definitely not json")
            .await
            .unwrap();

        let svc = IdentityService::new(&cfg);
        svc.initialize(vec!["player-a".to_string()]).await.unwrap();
        let token = svc.public_id_for("player-a").await.unwrap();
        assert_eq!(svc.internal_id_for(&token).await.as_deref(), Some("player-a"));
    }
}
