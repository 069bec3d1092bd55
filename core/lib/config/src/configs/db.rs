// External uses
use serde::Deserialize;
// Local uses
use crate::envy_load;

/// Used database configuration.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DbConfig {
    /// Amount of open connections to the database held by server in the pool.
    #[serde(default = "DbConfig::default_pool_size")]
    pub pool_size: usize,
    /// Database URL.
    pub url: String,
}

impl DbConfig {
    pub fn from_env() -> Self {
        envy_load!("database", "DATABASE_")
    }

    fn default_pool_size() -> usize {
        10
    }
}
