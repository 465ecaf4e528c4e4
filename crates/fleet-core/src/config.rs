//! fleet.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of the state database inside a data directory.
pub const DB_FILE_NAME: &str = "fleet.redb";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub store: StoreConfig,
    pub pool: PoolConfig,
    pub criteria: CriteriaConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the redb database file.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Only nodes in this group are managed by the pool. `None` manages all nodes.
    pub managed_group: Option<String>,
    /// Persist reservations in the state store.
    pub persist: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            managed_group: None,
            persist: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CriteriaConfig {
    /// Criteria key → dotted attribute path overrides.
    pub paths: BTreeMap<String, String>,
}

impl FleetConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FleetConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Resolve the database path. `data_dir` wins over `store.path`.
    pub fn db_path(&self, data_dir: Option<&Path>) -> PathBuf {
        match (data_dir, &self.store.path) {
            (Some(dir), _) => dir.join(DB_FILE_NAME),
            (None, Some(path)) => path.clone(),
            (None, None) => PathBuf::from("/var/lib/fleet").join(DB_FILE_NAME),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        let config: FleetConfig = toml::from_str("").unwrap();
        assert!(config.store.path.is_none());
        assert!(config.pool.managed_group.is_none());
        assert!(config.pool.persist);
        assert!(config.criteria.paths.is_empty());
    }

    #[test]
    fn test_parse_full() {
        let toml_str = r#"
[store]
path = "/tmp/fleet.redb"

[pool]
managed_group = "__TFPOOL"
persist = false

[criteria.paths]
memory = "hardware.mem_gb"
"#;
        let config: FleetConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.store.path, Some(PathBuf::from("/tmp/fleet.redb")));
        assert_eq!(config.pool.managed_group.as_deref(), Some("__TFPOOL"));
        assert!(!config.pool.persist);
        assert_eq!(config.criteria.paths.get("memory").map(String::as_str), Some("hardware.mem_gb"));
    }

    #[test]
    fn test_db_path_precedence() {
        let mut config = FleetConfig::default();
        assert_eq!(config.db_path(None), PathBuf::from("/var/lib/fleet/fleet.redb"));

        config.store.path = Some(PathBuf::from("/srv/inv.redb"));
        assert_eq!(config.db_path(None), PathBuf::from("/srv/inv.redb"));
        assert_eq!(config.db_path(Some(Path::new("/data"))), PathBuf::from("/data/fleet.redb"));
    }

    #[test]
    fn test_round_trip_toml() {
        let mut config = FleetConfig::default();
        config.pool.managed_group = Some("pool".to_string());
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("managed_group = \"pool\""));
    }
}
