use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub static CLASS_LEGENDARY: &str = "POKEMON_CLASS_LEGENDARY";
pub static CLASS_MYTHIC: &str = "POKEMON_CLASS_MYTHIC";

/// One entry of the external reference dataset, keyed by (dexNr, formId)
/// once the form id has been normalized. Unknown fields are carried along
/// in `extra` so the cleaned local copy loses nothing from the remote file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PokedexEntry {
    pub dex_nr: u32,
    pub form_id: String,
    pub names: NameTable,
    pub primary_type: Option<TypeSlot>,
    pub secondary_type: Option<TypeSlot>,
    pub pokemon_class: Option<String>,
    pub asset_forms: Vec<AssetForm>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl PokedexEntry {
    pub fn is_legendary(&self) -> bool {
        self.pokemon_class.as_deref() == Some(CLASS_LEGENDARY)
    }

    pub fn is_mythic(&self) -> bool {
        self.pokemon_class.as_deref() == Some(CLASS_MYTHIC)
    }

    pub fn is_rare_class(&self) -> bool {
        self.is_legendary() || self.is_mythic()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NameTable {
    #[serde(rename = "English")]
    pub english: String,
    #[serde(flatten)]
    pub other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeSlot {
    #[serde(rename = "type")]
    pub type_id: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Sprite asset variant. `form`/`costume` labels are normalized at load
/// time so they can be compared against keys derived from player data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetForm {
    pub form: Option<String>,
    pub costume: Option<String>,
    pub image: Option<String>,
    pub shiny_image: Option<String>,
}

/// Row of the pogoapi fast/charged move tables.
#[derive(Debug, Clone, Deserialize)]
pub struct MoveEntry {
    pub move_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShinyRateTable {
    /// tier name -> odds denominator
    pub rates: HashMap<String, u32>,
    /// dex number (as string) -> tier name
    pub pokemon: HashMap<String, String>,
    pub default_tier: String,
}

impl Default for ShinyRateTable {
    fn default() -> Self {
        ShinyRateTable {
            rates: HashMap::new(),
            pokemon: HashMap::new(),
            default_tier: "standard".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHealth {
    pub remote_hash: Option<String>,
    pub local_hash: Option<String>,
    pub last_checked: Option<DateTime<Utc>>,
    pub file: &'static str,
}

impl FileHealth {
    fn new(file: &'static str) -> Self {
        FileHealth {
            remote_hash: None,
            local_hash: None,
            last_checked: None,
            file,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScheduleStatus {
    #[serde(rename = "Not yet run")]
    NotYetRun,
    Running,
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerHealth {
    pub last_run: Option<DateTime<Utc>>,
    pub status: ScheduleStatus,
}

/// Freshness record per tracked remote file plus the outcome of the last
/// scheduled refresh, served verbatim by the health endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub pokedex: FileHealth,
    pub fast_moves: FileHealth,
    pub charged_moves: FileHealth,
    pub scheduler: SchedulerHealth,
}

impl Default for HealthStatus {
    fn default() -> Self {
        HealthStatus {
            pokedex: FileHealth::new("pokedex.json"),
            fast_moves: FileHealth::new("fast_moves.json"),
            charged_moves: FileHealth::new("charged_moves.json"),
            scheduler: SchedulerHealth {
                last_run: None,
                status: ScheduleStatus::NotYetRun,
            },
        }
    }
}
