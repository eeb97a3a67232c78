//! Settings of the terminal front end: dispatch tuning plus carrier configuration.
//!
//! Sources are merged in this order, later ones winning:
//! 1. built-in defaults
//! 2. the TOML file named by `PARCELHUB_CONFIG` (default `parcelhub.toml`), if it exists
//! 3. `PARCELHUB_`-prefixed environment variables, `__` separating nested keys
//!
//! ```toml
//! [dispatch]
//! max_concurrency = 8
//!
//! [carriers.counter]
//! store_name = "Corner Shop"
//! ```
//!
//! `PARCELHUB_CARRIERS__GATEWAY__API_KEY=…` sets `gateway.api_key`.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use parcelhub_core::{Config, ConfigValue, DispatchSettings};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const ENV_PREFIX: &str = "PARCELHUB_";
const CONFIG_PATH_VAR: &str = "PARCELHUB_CONFIG";
pub(crate) const LOG_PATH_VAR: &str = "PARCELHUB_LOG";
const DEFAULT_CONFIG_FILE: &str = "parcelhub.toml";

/// Shape of the merged sources; carrier values are grouped by carrier UID.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct FileSettings {
    dispatch: DispatchSettings,
    carriers: BTreeMap<String, BTreeMap<String, ConfigValue>>,
}

#[derive(Debug)]
pub(crate) struct Settings {
    pub dispatch: DispatchSettings,
    pub carriers: Config,
}

impl Settings {
    /// Load settings from defaults, the config file and the environment.
    pub(crate) fn load() -> Result<Self> {
        let path = env::var_os(CONFIG_PATH_VAR)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from);
        Self::from_figment(Self::figment(&path))
    }

    fn figment(path: &Path) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileSettings::default()));
        if path.exists() {
            info!(path = %path.display(), "loading configuration file");
            figment = figment.merge(Toml::file(path));
        } else {
            warn!(path = %path.display(), "configuration file not found, using defaults");
        }
        figment.merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&["config", "log"])
                .split("__"),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let file: FileSettings = figment
            .extract()
            .context("failed to read parcelhub settings")?;

        let carriers = Config::new(file.carriers.into_iter().flat_map(|(carrier, fields)| {
            fields
                .into_iter()
                .map(move |(field, value)| (format!("{carrier}.{field}"), value))
        }));

        Ok(Self {
            dispatch: file.dispatch,
            carriers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn from_toml(toml: &str) -> Settings {
        let figment = Figment::new()
            .merge(Serialized::defaults(FileSettings::default()))
            .merge(Toml::string(toml));
        Settings::from_figment(figment).expect("settings")
    }

    #[test]
    fn empty_sources_give_defaults() {
        let settings = from_toml("");

        assert_eq!(settings.dispatch, DispatchSettings::default());
        assert!(settings.carriers.is_empty());
    }

    #[test]
    fn carrier_tables_become_prefixed_keys() {
        let settings = from_toml(
            r#"
            [dispatch]
            max_concurrency = 2
            fail_fast = true

            [carriers.counter]
            store_name = "Corner Shop"
            latitude = 50.85
            max_weight_grams = 5000

            [carriers.gateway]
            base_url = "https://labels.example.org"
            "#,
        );

        assert_eq!(settings.dispatch.max_concurrency, 2);
        assert!(settings.dispatch.fail_fast);
        assert_eq!(settings.dispatch.plugin_timeout_ms, 10_000);
        assert_eq!(settings.carriers.text("counter.store_name"), Some("Corner Shop"));
        assert_eq!(
            settings.carriers.get("counter.latitude"),
            Some(&ConfigValue::Float(50.85))
        );
        assert_eq!(settings.carriers.integer("counter.max_weight_grams"), Some(5000));
        assert_eq!(
            settings.carriers.text("gateway.base_url"),
            Some("https://labels.example.org")
        );
        assert_eq!(settings.carriers.len(), 4);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let figment = Settings::figment(Path::new("/nonexistent/parcelhub.toml"));

        assert!(figment.extract::<FileSettings>().is_ok());
    }
}
