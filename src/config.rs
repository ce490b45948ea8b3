use std::path::PathBuf;
use std::time::Duration;

pub static POKEDEX_API_URL: &str =
    "https://pokemon-go-api.github.io/pokemon-go-api/api/pokedex.json";
pub static POKEDEX_HASHES_URL: &str =
    "https://pokemon-go-api.github.io/pokemon-go-api/api/hashes.json";
pub static POGOAPI_HASHES_URL: &str = "https://pogoapi.net/api/v1/api_hashes.json";
pub static POGOAPI_BASE_URL: &str = "https://pogoapi.net/api/v1";

pub static FAST_MOVES_FILE: &str = "fast_moves.json";
pub static CHARGED_MOVES_FILE: &str = "charged_moves.json";

/// Resolved runtime configuration. Everything lives under one data
/// directory so a deployment is a single folder plus the binary. The
/// remote endpoints default to the published datasets and are fields so
/// tests can point them elsewhere.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub fetch_timeout: Duration,
    pub pokedex_api_url: String,
    pub pokedex_hashes_url: String,
    pub pogoapi_hashes_url: String,
    pub pogoapi_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("data"),
            fetch_timeout: Duration::from_secs(30),
            pokedex_api_url: POKEDEX_API_URL.to_string(),
            pokedex_hashes_url: POKEDEX_HASHES_URL.to_string(),
            pogoapi_hashes_url: POGOAPI_HASHES_URL.to_string(),
            pogoapi_base_url: POGOAPI_BASE_URL.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
        let timeout_secs = std::env::var("FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);
        Config {
            data_dir: PathBuf::from(data_dir),
            fetch_timeout: Duration::from_secs(timeout_secs),
            ..Config::default()
        }
    }

    pub fn players_dir(&self) -> PathBuf {
        self.data_dir.join("players")
    }

    pub fn rankings_file(&self) -> PathBuf {
        self.data_dir.join("rankings.json")
    }

    pub fn users_file(&self) -> PathBuf {
        self.data_dir.join("users.json")
    }

    pub fn public_ids_file(&self) -> PathBuf {
        self.data_dir.join("public_ids.json")
    }

    /// Verbatim remote copy, kept only for hash comparison.
    pub fn pokedex_raw_file(&self) -> PathBuf {
        self.data_dir.join("pokedex_raw.json")
    }

    pub fn pokedex_file(&self) -> PathBuf {
        self.data_dir.join("pokedex.json")
    }

    pub fn fast_moves_file(&self) -> PathBuf {
        self.data_dir.join(FAST_MOVES_FILE)
    }

    pub fn charged_moves_file(&self) -> PathBuf {
        self.data_dir.join(CHARGED_MOVES_FILE)
    }

    pub fn shiny_rates_file(&self) -> PathBuf {
        self.data_dir.join("shiny_rates.json")
    }

    pub fn costume_id_map_file(&self) -> PathBuf {
        self.data_dir.join("costume_id_map.json")
    }
}
