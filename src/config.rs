//! Client configuration.
//!
//! Precedence: command line > environment > config files > defaults. Config files are
//! TOML; the first one found among `--config`, `$DOCQUERY_CONFIG`, `./docquery.toml` and
//! `~/.config/docquery.toml` wins field by field over the ones after it.

use crate::errors::DbError;
use crate::telemetry::DEFAULT_SLOW_QUERY_MS;
use crate::types::Namespace;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_URI: &str = "mongodb://localhost:6666";
pub const DEFAULT_DATABASE: &str = "sample_mflix";
pub const DEFAULT_COLLECTION: &str = "movies";
pub const DEFAULT_BATCH_SIZE: u32 = 50;
pub const DEFAULT_MAX_ITEMS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
    pub batch_size: u32,
    /// Cap on documents printed by cursor iteration.
    pub max_items: usize,
    /// Seed file for `memory://` endpoints.
    pub seed: Option<PathBuf>,
    pub app_name: Option<String>,
    /// Overrides the driver's server selection timeout when set.
    pub server_selection_timeout_ms: Option<u64>,
    pub slow_query_ms: u64,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    /// A log4rs YAML file; takes over from `log_level`/`log_file` when set.
    pub log_config: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_items: DEFAULT_MAX_ITEMS,
            seed: None,
            app_name: Some("docquery".to_string()),
            server_selection_timeout_ms: None,
            slow_query_ms: DEFAULT_SLOW_QUERY_MS,
            log_level: None,
            log_file: None,
            log_config: None,
        }
    }
}

/// One source of settings; unset fields fall through to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub uri: Option<String>,
    pub database: Option<String>,
    pub collection: Option<String>,
    pub batch_size: Option<u32>,
    pub max_items: Option<usize>,
    pub seed: Option<PathBuf>,
    pub app_name: Option<String>,
    pub server_selection_timeout_ms: Option<u64>,
    pub slow_query_ms: Option<u64>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub log_config: Option<PathBuf>,
}

impl ConfigLayer {
    /// # Errors
    /// Returns `DbError::Config` for invalid TOML or unknown keys.
    pub fn from_toml_str(s: &str) -> Result<Self, DbError> {
        toml::from_str(s).map_err(|e| DbError::Config(e.to_string()))
    }

    /// # Errors
    /// Returns `DbError::Io` if the file cannot be read and `DbError::Config` if it does not parse.
    pub fn from_file(path: &Path) -> Result<Self, DbError> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s).map_err(|e| DbError::Config(format!("{}: {e}", path.display())))
    }

    /// Reads `DOCQUERY_*` variables through `lookup`.
    ///
    /// # Errors
    /// Returns `DbError::Config` when a numeric variable does not parse.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DbError> {
        fn num<T: std::str::FromStr>(key: &str, v: Option<String>) -> Result<Option<T>, DbError> {
            v.map(|s| s.trim().parse::<T>().map_err(|_| DbError::Config(format!("{key} must be a number, got '{s}'"))))
                .transpose()
        }
        Ok(Self {
            uri: lookup("DOCQUERY_URI"),
            database: lookup("DOCQUERY_DB"),
            collection: lookup("DOCQUERY_COLLECTION"),
            batch_size: num("DOCQUERY_BATCH_SIZE", lookup("DOCQUERY_BATCH_SIZE"))?,
            max_items: num("DOCQUERY_MAX_ITEMS", lookup("DOCQUERY_MAX_ITEMS"))?,
            seed: lookup("DOCQUERY_SEED").map(PathBuf::from),
            app_name: lookup("DOCQUERY_APP_NAME"),
            server_selection_timeout_ms: num(
                "DOCQUERY_SERVER_SELECTION_TIMEOUT_MS",
                lookup("DOCQUERY_SERVER_SELECTION_TIMEOUT_MS"),
            )?,
            slow_query_ms: num("DOCQUERY_SLOW_QUERY_MS", lookup("DOCQUERY_SLOW_QUERY_MS"))?,
            log_level: lookup("DOCQUERY_LOG_LEVEL"),
            log_file: lookup("DOCQUERY_LOG_FILE").map(PathBuf::from),
            log_config: lookup("DOCQUERY_LOG_CONFIG").map(PathBuf::from),
        })
    }

    /// # Errors
    /// See `from_env_with`.
    pub fn from_env() -> Result<Self, DbError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Fills every unset field from `lower`.
    #[must_use]
    pub fn or(self, lower: Self) -> Self {
        Self {
            uri: self.uri.or(lower.uri),
            database: self.database.or(lower.database),
            collection: self.collection.or(lower.collection),
            batch_size: self.batch_size.or(lower.batch_size),
            max_items: self.max_items.or(lower.max_items),
            seed: self.seed.or(lower.seed),
            app_name: self.app_name.or(lower.app_name),
            server_selection_timeout_ms: self.server_selection_timeout_ms.or(lower.server_selection_timeout_ms),
            slow_query_ms: self.slow_query_ms.or(lower.slow_query_ms),
            log_level: self.log_level.or(lower.log_level),
            log_file: self.log_file.or(lower.log_file),
            log_config: self.log_config.or(lower.log_config),
        }
    }
}

impl ClientConfig {
    /// Applies a merged layer over the defaults.
    #[must_use]
    pub fn from_layer(layer: ConfigLayer) -> Self {
        let d = Self::default();
        Self {
            uri: layer.uri.unwrap_or(d.uri),
            database: layer.database.unwrap_or(d.database),
            collection: layer.collection.unwrap_or(d.collection),
            batch_size: layer.batch_size.unwrap_or(d.batch_size),
            max_items: layer.max_items.unwrap_or(d.max_items),
            seed: layer.seed,
            app_name: layer.app_name.or(d.app_name),
            server_selection_timeout_ms: layer.server_selection_timeout_ms,
            slow_query_ms: layer.slow_query_ms.unwrap_or(d.slow_query_ms),
            log_level: layer.log_level,
            log_file: layer.log_file,
            log_config: layer.log_config,
        }
    }

    /// Resolves the configuration from command-line values, the environment and config files.
    ///
    /// # Errors
    /// Returns `DbError::Config` when a layer is malformed.
    pub fn load(cli: ConfigLayer, config_path: Option<&Path>) -> Result<Self, DbError> {
        let mut files = ConfigLayer::default();
        for p in config_paths(config_path) {
            if p.exists() {
                log::debug!("reading config {}", p.display());
                files = files.or(ConfigLayer::from_file(&p)?);
            } else if config_path == Some(p.as_path()) {
                return Err(DbError::Config(format!("config file not found: {}", p.display())));
            }
        }
        let cfg = Self::from_layer(cli.or(ConfigLayer::from_env()?).or(files));
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    /// Returns `DbError::Config` for an empty URI or an invalid namespace.
    pub fn validate(&self) -> Result<(), DbError> {
        if self.uri.trim().is_empty() {
            return Err(DbError::Config("uri must not be empty".into()));
        }
        self.namespace().map(|_| ())
    }

    /// # Errors
    /// Returns `DbError::Config` when database or collection is invalid.
    pub fn namespace(&self) -> Result<Namespace, DbError> {
        Namespace::new(&self.database, &self.collection)
    }

    #[must_use]
    pub fn server_selection_timeout(&self) -> Option<Duration> {
        self.server_selection_timeout_ms.map(Duration::from_millis)
    }
}

/// Candidate config files, highest priority first.
#[must_use]
pub fn config_paths(cli_cfg: Option<&Path>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = vec![];
    if let Some(p) = cli_cfg {
        paths.push(p.to_path_buf());
    }
    if let Ok(p) = std::env::var("DOCQUERY_CONFIG") {
        paths.push(PathBuf::from(p));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join("docquery.toml"));
    }
    if let Ok(home) = std::env::var("USERPROFILE").or_else(|_| std::env::var("HOME")) {
        paths.push(PathBuf::from(home).join(".config").join("docquery.toml"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_the_sample_catalog() {
        let c = ClientConfig::default();
        assert_eq!(c.uri, "mongodb://localhost:6666");
        assert_eq!(c.namespace().unwrap().to_string(), "sample_mflix.movies");
        assert_eq!(c.batch_size, 50);
        assert_eq!(c.max_items, 100);
        assert!(c.server_selection_timeout().is_none());
    }

    #[test]
    fn layers_resolve_by_precedence() {
        let file = ConfigLayer::from_toml_str("uri = \"mongodb://file:1\"\ndatabase = \"filedb\"\nbatch_size = 10\n").unwrap();
        let env_vars: HashMap<&str, &str> = [("DOCQUERY_DB", "envdb"), ("DOCQUERY_BATCH_SIZE", "20")].into();
        let env = ConfigLayer::from_env_with(|k| env_vars.get(k).map(|v| (*v).to_string())).unwrap();
        let cli = ConfigLayer { batch_size: Some(30), ..ConfigLayer::default() };
        let cfg = ClientConfig::from_layer(cli.or(env).or(file));
        assert_eq!(cfg.uri, "mongodb://file:1");
        assert_eq!(cfg.database, "envdb");
        assert_eq!(cfg.batch_size, 30);
        assert_eq!(cfg.collection, "movies");
    }

    #[test]
    fn bad_values_are_config_errors() {
        let err = ConfigLayer::from_env_with(|k| (k == "DOCQUERY_BATCH_SIZE").then(|| "lots".to_string())).unwrap_err();
        assert!(matches!(err, DbError::Config(_)));
        assert!(matches!(ConfigLayer::from_toml_str("colour = 1"), Err(DbError::Config(_))));
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(ClientConfig::load(ConfigLayer::default(), Some(&missing)), Err(DbError::Config(_))));
    }

    #[test]
    fn reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("docquery.toml");
        std::fs::write(&p, "uri = \"memory://\"\ncollection = \"films\"\nslow_query_ms = 5\n").unwrap();
        let layer = ConfigLayer::from_file(&p).unwrap();
        let cfg = ClientConfig::from_layer(layer);
        assert_eq!(cfg.uri, "memory://");
        assert_eq!(cfg.collection, "films");
        assert_eq!(cfg.slow_query_ms, 5);
    }
}
