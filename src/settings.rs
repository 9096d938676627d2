use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::models::rewards::RewardSchedule;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: Backend,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub listen: String,
}

#[derive(Debug, Deserialize)]
pub struct Reconciliation {
    pub enabled: bool,
    pub interval_secs: u64,
    #[serde(default)]
    pub repair: bool,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub store: Store,
    pub postgres: Option<Postgres>,
    pub http: Http,
    pub rewards: RewardSchedule,
    pub reconciliation: Reconciliation,
}

fn default_max_connections() -> u32 {
    5
}

impl Settings {
    /// Loads `path`, then lets `ANGEL_*` environment variables override it,
    /// e.g. `ANGEL_POSTGRES__URL`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("ANGEL")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Self::validated(config.try_deserialize()?)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;

        Self::validated(config.try_deserialize()?)
    }

    fn validated(settings: Settings) -> Result<Self, ConfigError> {
        settings.rewards.validate().map_err(ConfigError::Message)?;

        if settings.store.backend == Backend::Postgres && settings.postgres.is_none() {
            return Err(ConfigError::Message(
                "store.backend = \"postgres\" requires a [postgres] section".to_string(),
            ));
        }

        if settings.reconciliation.enabled && settings.reconciliation.interval_secs == 0 {
            return Err(ConfigError::Message(
                "reconciliation.interval_secs must be greater than zero".to_string(),
            ));
        }

        Ok(settings)
    }
}
