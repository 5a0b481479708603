use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::domain::DEFAULT_CURRENCY;

pub const DEFAULT_CONFIG_FILE: &str = "pennypals.toml";
pub const DEFAULT_DATABASE: &str = "pennypals.db";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// SQLite database file
    pub database: String,
    /// Username acting when `--user` is not given
    pub user: Option<String>,
    /// One of off, error, warn, info, debug, trace
    pub log_level: Option<String>,
    pub default_currency: String,
}

impl Settings {
    /// Load defaults, then the optional config file, then `PENNYPALS_*` variables.
    pub fn new(path: Option<&str>) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("database", DEFAULT_DATABASE)?
            .set_default("default_currency", DEFAULT_CURRENCY)?
            .add_source(
                File::new(path.unwrap_or(DEFAULT_CONFIG_FILE), FileFormat::Toml)
                    .required(path.is_some()),
            )
            .add_source(Environment::with_prefix("PENNYPALS"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_settings_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(
            &path,
            "database = \"trip.db\"\nuser = \"ana\"\ndefault_currency = \"EUR\"\n",
        )
        .unwrap();

        let settings = Settings::new(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(settings.database, "trip.db");
        assert_eq!(settings.user.as_deref(), Some("ana"));
        assert_eq!(settings.default_currency, "EUR");
        assert!(settings.log_level.is_none());
    }

    #[test]
    fn test_settings_defaults_fill_missing_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(&path, "log_level = \"info\"\n").unwrap();

        let settings = Settings::new(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(settings.database, DEFAULT_DATABASE);
        assert_eq!(settings.default_currency, "USD");
        assert_eq!(settings.log_level.as_deref(), Some("info"));
    }

    #[test]
    fn test_explicit_config_file_must_exist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.toml");
        assert!(Settings::new(Some(path.to_str().unwrap())).is_err());
    }
}
