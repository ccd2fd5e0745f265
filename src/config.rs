//! Process configuration read from the environment.

use std::path::PathBuf;

use crate::catalog::CatalogVersion;
use crate::error::ConfigError;

pub const DATASET_PATH_VAR: &str = "SEGMENTS_DATASET_PATH";
pub const MODEL_PATH_VAR: &str = "SEGMENTS_MODEL_PATH";
pub const CATALOG_VERSION_VAR: &str = "SEGMENTS_CATALOG_VERSION";
pub const LOG_FILE_PATH_VAR: &str = "LOG_FILE_PATH";

const DEFAULT_DATASET_PATH: &str = "data/customer_data.csv";
const DEFAULT_MODEL_PATH: &str = "model/pipeline.json";
const DEFAULT_LOG_FILE_PATH: &str = "logs/shopper_segments.log";

/// Where the dataset, the classifier artifact and the log file live, and
/// which segment catalog the artifact must have been fit against.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub dataset_path: PathBuf,
    pub model_path: PathBuf,
    pub catalog_version: CatalogVersion,
    pub log_file_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            catalog_version: CatalogVersion::Five,
            log_file_path: PathBuf::from(DEFAULT_LOG_FILE_PATH),
        }
    }
}

impl AppConfig {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source; unset or blank
    /// variables fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            dataset_path: var(DATASET_PATH_VAR).map_or(defaults.dataset_path, PathBuf::from),
            model_path: var(MODEL_PATH_VAR).map_or(defaults.model_path, PathBuf::from),
            catalog_version: match var(CATALOG_VERSION_VAR) {
                Some(value) => value.parse()?,
                None => defaults.catalog_version,
            },
            log_file_path: var(LOG_FILE_PATH_VAR).map_or(defaults.log_file_path, PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.dataset_path, PathBuf::from("data/customer_data.csv"));
        assert_eq!(config.catalog_version, CatalogVersion::Five);
    }

    #[test]
    fn test_overrides_from_environment() {
        let config = AppConfig::from_lookup(lookup(&[
            (DATASET_PATH_VAR, "/tmp/customers.csv"),
            (MODEL_PATH_VAR, "/tmp/six.json"),
            (CATALOG_VERSION_VAR, "Six"),
            (LOG_FILE_PATH_VAR, "  "),
        ]))
        .unwrap();

        assert_eq!(config.dataset_path, PathBuf::from("/tmp/customers.csv"));
        assert_eq!(config.model_path, PathBuf::from("/tmp/six.json"));
        assert_eq!(config.catalog_version, CatalogVersion::Six);
        assert_eq!(config.log_file_path, PathBuf::from(DEFAULT_LOG_FILE_PATH));
    }

    #[test]
    fn test_bad_catalog_version() {
        let err = AppConfig::from_lookup(lookup(&[(CATALOG_VERSION_VAR, "seven")])).unwrap_err();
        assert_eq!(err, ConfigError::CatalogVersion("seven".to_string()));
    }
}
