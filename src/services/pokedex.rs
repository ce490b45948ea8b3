use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use serde_json::Value;
use sha2::{Digest, Sha256, Sha512};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::{Config, CHARGED_MOVES_FILE, FAST_MOVES_FILE};
use crate::model::pokedex::{
    HealthStatus, MoveEntry, PokedexEntry, ScheduleStatus, ShinyRateTable,
};
use crate::model::snapshot::DisplayView;
use crate::services::normalize::{normalize_asset_key, normalize_form_key, NORMAL_FORM};

static FALLBACK_COLOR: &str = "#FFFFFF";
static TYPE_PREFIX: &str = "POKEMON_TYPE_";
static DEFAULT_SHINY_DENOMINATOR: u32 = 512;

/// Origin codes as uploaded by the client.
static ORIGIN_WILD_GO: i64 = 3;
static ORIGIN_RAID: i64 = 14;
static ORIGIN_ROCKET_LEADER: i64 = 26;
static ORIGIN_ROCKET_GRUNT: i64 = 27;
static ORIGIN_ROCKET_BOSS: i64 = 28;

/// Daily refresh fires at this UTC hour.
static REFRESH_HOUR_UTC: u32 = 3;

lazy_static! {
    static ref TYPE_COLORS: HashMap<&'static str, &'static str> = HashMap::from([
        ("NORMAL", "#A8A77A"),
        ("FIRE", "#EE8130"),
        ("WATER", "#6390F0"),
        ("GRASS", "#7AC74C"),
        ("ELECTRIC", "#F7D02C"),
        ("ICE", "#96D9D6"),
        ("FIGHTING", "#C22E28"),
        ("POISON", "#A33EA1"),
        ("GROUND", "#E2BF65"),
        ("FLYING", "#A98FF3"),
        ("PSYCHIC", "#F95587"),
        ("BUG", "#A6B91A"),
        ("ROCK", "#B6A136"),
        ("GHOST", "#735797"),
        ("DRAGON", "#6F35FC"),
        ("DARK", "#705746"),
        ("STEEL", "#B7B7CE"),
        ("FAIRY", "#D685AD"),
    ]);
}

/// Immutable, query-optimized view of the reference dataset. Swapped out
/// wholesale on every (re)load; readers hold an `Arc` snapshot so a
/// concurrent reload never shows them a half-built index.
#[derive(Debug, Default)]
pub struct PokedexData {
    index: HashMap<u32, HashMap<String, PokedexEntry>>,
    move_names: HashMap<i64, String>,
    shiny_rates: ShinyRateTable,
    costume_ids: HashMap<String, String>,
}

impl PokedexData {
    fn species(&self, dex_nr: u32) -> Option<&HashMap<String, PokedexEntry>> {
        self.index.get(&dex_nr)
    }

    /// Canonical entry for a species: its NORMAL form, or any form when no
    /// NORMAL entry exists.
    pub fn base_entry(&self, dex_nr: u32) -> Option<&PokedexEntry> {
        let forms = self.species(dex_nr)?;
        forms.get(NORMAL_FORM).or_else(|| forms.values().next())
    }

    /// Best-matching entry for a player-supplied form name, falling back to
    /// the canonical entry.
    pub fn entry_for_form(&self, dex_nr: u32, form_name: &str) -> Option<&PokedexEntry> {
        let base = self.base_entry(dex_nr)?;
        let key = normalize_form_key(form_name, &base.names.english);
        self.species(dex_nr)
            .and_then(|forms| forms.get(&key))
            .or(Some(base))
    }

    pub fn resolve_display_name(&self, dex_nr: u32, form_name: &str) -> String {
        match self.entry_for_form(dex_nr, form_name) {
            Some(entry) if !entry.names.english.is_empty() => entry.names.english.clone(),
            _ => format!("Pokedex #{}", dex_nr),
        }
    }

    pub fn resolve_sprite(&self, dex_nr: u32, display: &DisplayView) -> String {
        let fallback = fallback_sprite(dex_nr, display.shiny);

        let base = match self.base_entry(dex_nr) {
            Some(entry) if !entry.asset_forms.is_empty() => entry,
            _ => return fallback,
        };

        let form_key = match normalize_form_key(&display.form_name, &base.names.english) {
            key if key == NORMAL_FORM => None,
            key => Some(key),
        };
        let costume_key = display
            .costume
            .filter(|id| *id != 0)
            .and_then(|id| self.costume_ids.get(&id.to_string()))
            .map(|name| normalize_asset_key(name));

        let asset = SPRITE_STRATEGY_ORDER.iter().find_map(|strategy| {
            base.asset_forms.iter().find(|asset| {
                strategy.matches(
                    non_empty(&asset.form),
                    non_empty(&asset.costume),
                    form_key.as_deref(),
                    costume_key.as_deref(),
                )
            })
        });

        asset
            .and_then(|asset| {
                if display.shiny {
                    asset.shiny_image.clone()
                } else {
                    asset.image.clone()
                }
            })
            .filter(|url| !url.is_empty())
            .unwrap_or(fallback)
    }

    /// 0, 1 or 2 display colors in primary,secondary order.
    pub fn resolve_type_colors(&self, entry: Option<&PokedexEntry>) -> Vec<String> {
        let mut colors = Vec::new();
        if let Some(entry) = entry {
            for slot in [&entry.primary_type, &entry.secondary_type].into_iter().flatten() {
                let name = slot.type_id.trim_start_matches(TYPE_PREFIX);
                colors.push(
                    TYPE_COLORS
                        .get(name)
                        .copied()
                        .unwrap_or(FALLBACK_COLOR)
                        .to_string(),
                );
            }
        }
        colors
    }

    /// Tiered shiny-odds lookup: event tag, then origin category, then the
    /// per-species tier table, then the global default.
    pub fn resolve_shiny_rate(
        &self,
        dex_nr: u32,
        origin: Option<i64>,
        pokemon_class: Option<&str>,
        origin_events: &[String],
    ) -> u32 {
        let rates = &self.shiny_rates;
        let default_rate = rates
            .rates
            .get(&rates.default_tier)
            .copied()
            .unwrap_or(DEFAULT_SHINY_DENOMINATOR);

        if origin_events.iter().any(|e| e.contains("community_day")) {
            if let Some(rate) = rates.rates.get("community-day") {
                return *rate;
            }
        }
        if let Some(origin) = origin {
            let rare_class = pokemon_class
                .map(|c| {
                    c == crate::model::pokedex::CLASS_LEGENDARY
                        || c == crate::model::pokedex::CLASS_MYTHIC
                })
                .unwrap_or(false);
            if (origin == ORIGIN_RAID || origin == ORIGIN_WILD_GO) && rare_class {
                if let Some(rate) = rates.rates.get("legendary") {
                    return *rate;
                }
            }
            if origin == ORIGIN_ROCKET_LEADER || origin == ORIGIN_ROCKET_BOSS {
                if let Some(rate) = rates.rates.get("rocket-leader") {
                    return *rate;
                }
            }
            if origin == ORIGIN_ROCKET_GRUNT {
                if let Some(rate) = rates.rates.get("rocket-grunt") {
                    return *rate;
                }
            }
        }

        let tier = rates
            .pokemon
            .get(&dex_nr.to_string())
            .unwrap_or(&rates.default_tier);
        rates.rates.get(tier).copied().unwrap_or(default_rate)
    }

    pub fn resolve_move_name(&self, move_id: i64) -> Option<String> {
        self.move_names.get(&move_id).cloned()
    }

    pub fn species_count(&self) -> usize {
        self.index.len()
    }
}

/// Ordered sprite candidate strategies; first match wins, the hardcoded
/// URL pattern is the terminal fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpriteStrategy {
    ExactFormCostume,
    CostumeOnly,
    FormOnly,
    Plain,
    NormalForm,
}

static SPRITE_STRATEGY_ORDER: [SpriteStrategy; 5] = [
    SpriteStrategy::ExactFormCostume,
    SpriteStrategy::CostumeOnly,
    SpriteStrategy::FormOnly,
    SpriteStrategy::Plain,
    SpriteStrategy::NormalForm,
];

impl SpriteStrategy {
    fn matches(
        &self,
        asset_form: Option<&str>,
        asset_costume: Option<&str>,
        form_key: Option<&str>,
        costume_key: Option<&str>,
    ) -> bool {
        match self {
            SpriteStrategy::ExactFormCostume => {
                form_key.is_some()
                    && costume_key.is_some()
                    && asset_form == form_key
                    && asset_costume == costume_key
            }
            SpriteStrategy::CostumeOnly => {
                costume_key.is_some() && asset_costume == costume_key && asset_form.is_none()
            }
            SpriteStrategy::FormOnly => {
                form_key.is_some() && asset_form == form_key && asset_costume.is_none()
            }
            SpriteStrategy::Plain => asset_form.is_none() && asset_costume.is_none(),
            SpriteStrategy::NormalForm => {
                asset_form == Some(NORMAL_FORM) && asset_costume.is_none()
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn fallback_sprite(dex_nr: u32, shiny: bool) -> String {
    let suffix = if shiny { "_shiny" } else { "" };
    format!(
        "https://raw.githubusercontent.com/PokeMiners/pogo_assets/master/Images/Pokemon/pokemon_icon_{:03}_00{}.png",
        dex_nr, suffix
    )
}

fn sha512_hex(bytes: &[u8]) -> String {
    let digest = Sha512::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A matching local hash means the local copy is current and no download
/// happens. Manifests are inconsistent about hex casing.
fn hashes_match(local: Option<&str>, remote: &str) -> bool {
    local.map_or(false, |l| l.eq_ignore_ascii_case(remote))
}

fn next_refresh_delay(now: DateTime<Utc>) -> std::time::Duration {
    let today = now
        .date_naive()
        .and_hms_opt(REFRESH_HOUR_UTC, 0, 0)
        .unwrap();
    let mut next = Utc.from_utc_datetime(&today);
    if next <= now {
        next += chrono::Duration::days(1);
    }
    (next - now)
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(3600))
}

/// Reference Data Cache: fetches, hashes and normalizes the external
/// pokedex/move datasets and serves an in-memory index of them. The daily
/// scheduler (and process startup) are the only writers of its files;
/// fetch failures always fall back to the last good local copy.
pub struct PokedexService {
    cfg: Config,
    client: reqwest::Client,
    inner: RwLock<Arc<PokedexData>>,
    health: RwLock<HealthStatus>,
}

impl PokedexService {
    pub fn new(cfg: Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(cfg.fetch_timeout)
            .build()
            .expect("failed to build http client");
        PokedexService {
            cfg,
            client,
            inner: RwLock::new(Arc::new(PokedexData::default())),
            health: RwLock::new(HealthStatus::default()),
        }
    }

    /// Current dataset snapshot; cheap to clone, safe to hold across awaits.
    pub async fn data(&self) -> Arc<PokedexData> {
        self.inner.read().await.clone()
    }

    pub async fn health(&self) -> HealthStatus {
        self.health.read().await.clone()
    }

    /// Startup path: one refresh attempt, then load whatever is local.
    pub async fn initialize(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.cfg.data_dir)
            .await
            .context("creating data directory")?;
        self.refresh_if_stale().await;
        self.load().await
    }

    /// Checks both remote manifests and downloads any file whose hash no
    /// longer matches the local copy. Network and parse failures are logged
    /// and swallowed; the local cache is never blanked. Returns whether any
    /// file changed.
    pub async fn refresh_if_stale(&self) -> bool {
        let (changed, _ok) = self.refresh_status().await;
        changed
    }

    async fn refresh_status(&self) -> (bool, bool) {
        let mut changed = false;
        let mut ok = true;
        match self.check_pokedex_update().await {
            Ok(c) => changed |= c,
            Err(e) => {
                ok = false;
                warn!(error = %e, "pokedex update check failed, keeping local copy");
            }
        }
        match self.check_move_updates().await {
            Ok(c) => changed |= c,
            Err(e) => {
                ok = false;
                warn!(error = %e, "move table update check failed, keeping local copies");
            }
        }
        (changed, ok)
    }

    async fn check_pokedex_update(&self) -> Result<bool> {
        info!("checking for pokedex updates");
        let manifest: Value = self
            .client
            .get(&self.cfg.pokedex_hashes_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let remote = manifest["sha512"]["pokedex.json"]
            .as_str()
            .ok_or_else(|| anyhow!("pokedex.json hash missing from remote manifest"))?
            .to_string();

        {
            let mut health = self.health.write().await;
            health.pokedex.remote_hash = Some(remote.clone());
            health.pokedex.last_checked = Some(Utc::now());
        }

        let local = match tokio::fs::read(self.cfg.pokedex_raw_file()).await {
            Ok(bytes) => Some(sha512_hex(&bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no local pokedex found, a new one will be downloaded");
                None
            }
            Err(e) => return Err(e.into()),
        };
        self.health.write().await.pokedex.local_hash = local.clone();

        if hashes_match(local.as_deref(), &remote) {
            info!("pokedex is up to date");
            return Ok(false);
        }

        info!("pokedex update available, downloading");
        let body = self
            .client
            .get(&self.cfg.pokedex_api_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        tokio::fs::write(self.cfg.pokedex_raw_file(), body).await?;
        info!("new pokedex downloaded");
        Ok(true)
    }

    async fn check_move_updates(&self) -> Result<bool> {
        info!("checking for move table updates");
        let manifest: Value = self
            .client
            .get(&self.cfg.pogoapi_hashes_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut changed = false;
        let tracked = [
            (FAST_MOVES_FILE, self.cfg.fast_moves_file()),
            (CHARGED_MOVES_FILE, self.cfg.charged_moves_file()),
        ];
        for (name, path) in tracked {
            let remote = manifest[name]["hash_sha256"].as_str().map(str::to_string);
            {
                let mut health = self.health.write().await;
                let slot = if name == FAST_MOVES_FILE {
                    &mut health.fast_moves
                } else {
                    &mut health.charged_moves
                };
                slot.remote_hash = remote.clone();
                slot.last_checked = Some(Utc::now());
            }
            let Some(remote) = remote else {
                warn!(file = name, "no hash in remote manifest, skipping");
                continue;
            };

            let local = match tokio::fs::read(&path).await {
                Ok(bytes) => Some(sha256_hex(&bytes)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(e.into()),
            };
            {
                let mut health = self.health.write().await;
                let slot = if name == FAST_MOVES_FILE {
                    &mut health.fast_moves
                } else {
                    &mut health.charged_moves
                };
                slot.local_hash = local.clone();
            }

            if hashes_match(local.as_deref(), &remote) {
                info!(file = name, "move table is up to date");
                continue;
            }

            info!(file = name, "move table update available, downloading");
            let body = self
                .client
                .get(format!("{}/{}", self.cfg.pogoapi_base_url, name))
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;
            tokio::fs::write(&path, body).await?;
            changed = true;
        }
        Ok(changed)
    }

    /// Re-cleans the raw pokedex, persists the normalized copy and swaps in
    /// a freshly built index. Sections that fail to parse keep the data
    /// from the previous load instead of blanking it.
    pub async fn load(&self) -> Result<()> {
        let prev = self.data().await;
        let mut data = PokedexData::default();

        let entries = match self.clean_raw_pokedex().await {
            Some(entries) => Some(entries),
            None => self.read_cleaned_pokedex().await,
        };
        data.index = match entries {
            Some(list) => {
                let mut index: HashMap<u32, HashMap<String, PokedexEntry>> = HashMap::new();
                for entry in list {
                    index
                        .entry(entry.dex_nr)
                        .or_default()
                        .insert(entry.form_id.clone(), entry);
                }
                index
            }
            None => prev.index.clone(),
        };

        data.move_names = match self.load_move_map().await {
            Ok(map) => map,
            Err(e) => {
                warn!(error = %e, "could not load move tables, keeping previous map");
                prev.move_names.clone()
            }
        };

        data.shiny_rates = match tokio::fs::read_to_string(self.cfg.shiny_rates_file()).await {
            Ok(text) => match serde_json::from_str::<ShinyRateTable>(&text) {
                Ok(table) => table,
                Err(e) => {
                    warn!(error = %e, "could not parse shiny rate table");
                    ShinyRateTable::default()
                }
            },
            Err(e) => {
                warn!(error = %e, "could not load shiny rate table");
                ShinyRateTable::default()
            }
        };

        data.costume_ids = match tokio::fs::read_to_string(self.cfg.costume_id_map_file()).await {
            Ok(text) => match serde_json::from_str::<HashMap<String, String>>(&text) {
                Ok(map) => map,
                Err(e) => {
                    warn!(error = %e, "could not parse costume id map");
                    HashMap::new()
                }
            },
            Err(e) => {
                warn!(error = %e, "could not load costume id map");
                HashMap::new()
            }
        };

        info!(
            species = data.index.len(),
            moves = data.move_names.len(),
            "pokedex loaded"
        );
        *self.inner.write().await = Arc::new(data);
        Ok(())
    }

    /// Normalizes form and asset keys of the raw remote copy and persists
    /// the cleaned dataset. `None` when there is no usable raw copy.
    async fn clean_raw_pokedex(&self) -> Option<Vec<PokedexEntry>> {
        let text = match tokio::fs::read_to_string(self.cfg.pokedex_raw_file()).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "no raw pokedex to clean");
                return None;
            }
        };
        let mut entries = match serde_json::from_str::<Vec<PokedexEntry>>(&text) {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "could not parse raw pokedex");
                return None;
            }
        };
        for entry in &mut entries {
            entry.form_id = normalize_form_key(&entry.form_id, &entry.names.english);
            for asset in &mut entry.asset_forms {
                if let Some(form) = &asset.form {
                    asset.form = Some(normalize_asset_key(form));
                }
                if let Some(costume) = &asset.costume {
                    asset.costume = Some(normalize_asset_key(costume));
                }
            }
        }
        match serde_json::to_string_pretty(&entries) {
            Ok(json) => {
                if let Err(e) = tokio::fs::write(self.cfg.pokedex_file(), json).await {
                    error!(error = %e, "could not persist cleaned pokedex");
                }
            }
            Err(e) => error!(error = %e, "could not serialize cleaned pokedex"),
        }
        Some(entries)
    }

    async fn read_cleaned_pokedex(&self) -> Option<Vec<PokedexEntry>> {
        let text = tokio::fs::read_to_string(self.cfg.pokedex_file())
            .await
            .ok()?;
        match serde_json::from_str::<Vec<PokedexEntry>>(&text) {
            Ok(entries) => Some(entries),
            Err(e) => {
                error!(error = %e, "could not parse cleaned pokedex");
                None
            }
        }
    }

    async fn load_move_map(&self) -> Result<HashMap<i64, String>> {
        let fast = tokio::fs::read_to_string(self.cfg.fast_moves_file()).await?;
        let charged = tokio::fs::read_to_string(self.cfg.charged_moves_file()).await?;
        let fast: Vec<MoveEntry> = serde_json::from_str(&fast)?;
        let charged: Vec<MoveEntry> = serde_json::from_str(&charged)?;
        let mut map = HashMap::new();
        for entry in fast.into_iter().chain(charged) {
            map.insert(entry.move_id, entry.name);
        }
        Ok(map)
    }

    /// Spawns the daily refresh loop. This task is the only writer of the
    /// cache files after startup.
    pub fn schedule_daily_updates(self: &Arc<Self>) {
        let svc = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let delay = next_refresh_delay(Utc::now());
                info!(seconds = delay.as_secs(), "next reference data refresh scheduled");
                tokio::time::sleep(delay).await;
                svc.run_scheduled_refresh().await;
            }
        });
    }

    async fn run_scheduled_refresh(&self) {
        info!("running scheduled reference data refresh");
        {
            let mut health = self.health.write().await;
            health.scheduler.last_run = Some(Utc::now());
            health.scheduler.status = ScheduleStatus::Running;
        }

        let (changed, ok) = self.refresh_status().await;
        let mut status = if ok {
            ScheduleStatus::Success
        } else {
            ScheduleStatus::Failed
        };
        if changed {
            info!("reference data changed, reloading");
            if let Err(e) = self.load().await {
                error!(error = %e, "reload after refresh failed");
                status = ScheduleStatus::Failed;
            }
        }
        self.health.write().await.scheduler.status = status;
    }
}
