//! Layered configuration for quire.
//!
//! Sources are merged in order, later ones winning:
//! 1. built-in defaults,
//! 2. a configuration file (`config.toml`, `config.yaml` or `config.json` in
//!    the platform configuration directory, or an explicit path),
//! 3. environment variables prefixed with `QUIRE_`, nested keys separated by
//!    a double underscore (`QUIRE_STORE__REMOTE_TIMEOUT=2500`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_PREFIX: &str = "QUIRE_";
const APP_QUALIFIER: &str = "org";
const APP_ORG: &str = "quire";
const APP_NAME: &str = "quire";
const CONFIG_STEM: &str = "config";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Upper bound for a single remote call, in milliseconds. Zero disables
    /// the bound.
    pub remote_timeout: u64,
    /// Discard responses that were overtaken by a newer operation on the same
    /// key.
    pub sequencing: bool,
    pub character_invalidation: CharacterInvalidation,
    /// Buffer size of the store's event channel. Slow subscribers that fall
    /// further behind miss events.
    pub event_capacity: usize,
}
impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            remote_timeout: 10_000,
            sequencing: true,
            character_invalidation: CharacterInvalidation::default(),
            event_capacity: 256,
        }
    }
}
impl StoreConfig {
    pub fn remote_timeout(&self) -> Option<Duration> {
        (self.remote_timeout > 0).then(|| Duration::from_millis(self.remote_timeout))
    }

    pub fn with_remote_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.remote_timeout = timeout.map_or(0, |t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn with_sequencing(mut self, sequencing: bool) -> Self {
        self.sequencing = sequencing;
        self
    }

    pub fn with_character_invalidation(mut self, scope: CharacterInvalidation) -> Self {
        self.character_invalidation = scope;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            exn::bail!(ErrorKind::Invalid {
                field: "store.event_capacity",
                reason: "must be greater than zero".to_string()
            });
        }
        Ok(())
    }
}

/// Which character caches are dropped when a character is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterInvalidation {
    /// Only the owning book's character list.
    #[default]
    Book,
    /// Every cached character list.
    All,
}
impl CharacterInvalidation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::All => "all",
        }
    }
}
impl FromStr for CharacterInvalidation {
    type Err = error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "book" => Ok(Self::Book),
            "all" | "every" => Ok(Self::All),
            _ => exn::bail!(ErrorKind::Invalid {
                field: "store.character_invalidation",
                reason: format!("unknown scope '{s}'")
            }),
        }
    }
}
impl Display for CharacterInvalidation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// The platform configuration directory, if one can be determined.
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

impl Config {
    /// Load from the platform configuration directory (when present) and the
    /// environment.
    pub fn load() -> Result<Self> {
        let mut figment = Self::defaults();
        match config_dir() {
            Some(dir) => {
                tracing::debug!(dir = %dir.display(), "Loading configuration directory");
                figment = figment
                    .merge(Toml::file(dir.join(CONFIG_STEM).with_extension("toml")))
                    .merge(Yaml::file(dir.join(CONFIG_STEM).with_extension("yaml")))
                    .merge(Json::file(dir.join(CONFIG_STEM).with_extension("json")));
            },
            None => tracing::warn!("Could not determine configuration directory, using defaults"),
        }
        Self::extract(figment.merge(Self::env()))
    }

    /// Load from an explicit file, whose format follows its extension, and the
    /// environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            exn::bail!(ErrorKind::FileNotFound(path.to_path_buf()));
        }
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_lowercase();
        let figment = match extension.as_str() {
            "toml" => Self::defaults().merge(Toml::file(path)),
            "yaml" | "yml" => Self::defaults().merge(Yaml::file(path)),
            "json" => Self::defaults().merge(Json::file(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(extension)),
        };
        tracing::debug!(path = %path.display(), "Loading configuration file");
        Self::extract(figment.merge(Self::env()))
    }

    pub fn validate(&self) -> Result<()> {
        self.store.validate()
    }

    fn defaults() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
    }

    fn env() -> Env {
        Env::prefixed(ENV_PREFIX).split("__")
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.store.remote_timeout(), Some(Duration::from_secs(10)));
        assert!(config.store.sequencing);
        assert_eq!(config.store.character_invalidation, CharacterInvalidation::Book);
    }

    #[test]
    fn test_zero_timeout_disables() {
        let store = StoreConfig::default().with_remote_timeout(None);
        assert_eq!(store.remote_timeout, 0);
        assert_eq!(store.remote_timeout(), None);
    }

    #[test]
    fn test_zero_capacity_is_invalid() {
        let store = StoreConfig { event_capacity: 0, ..Default::default() };
        let err = store.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid { field: "store.event_capacity", .. }));
    }

    #[rstest]
    #[case("book", CharacterInvalidation::Book)]
    #[case(" ALL ", CharacterInvalidation::All)]
    fn test_character_invalidation_from_str(#[case] input: &str, #[case] expected: CharacterInvalidation) {
        assert_eq!(input.parse::<CharacterInvalidation>().unwrap(), expected);
    }

    #[test]
    fn test_file_then_environment() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[store]\nremote_timeout = 500\ncharacter_invalidation = \"all\"\n")?;
            jail.set_env("QUIRE_STORE__SEQUENCING", "false");
            jail.set_env("QUIRE_STORE__REMOTE_TIMEOUT", "750");
            let config = Config::load_from("config.toml").unwrap();
            assert_eq!(config.store.remote_timeout, 750);
            assert!(!config.store.sequencing);
            assert_eq!(config.store.character_invalidation, CharacterInvalidation::All);
            assert_eq!(config.store.event_capacity, 256);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_file_value_fails_validation() {
        Jail::expect_with(|jail| {
            jail.create_file("config.json", r#"{ "store": { "event_capacity": 0 } }"#)?;
            let err = Config::load_from("config.json").unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid { .. }));
            Ok(())
        });
    }

    #[test]
    fn test_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quire.yml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "store:\n  event_capacity: 16").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.store.event_capacity, 16);
    }

    #[test]
    fn test_missing_and_unsupported_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert_eq!(*Config::load_from(&missing).unwrap_err(), ErrorKind::FileNotFound(missing));

        let ini = dir.path().join("config.ini");
        std::fs::write(&ini, "[store]").unwrap();
        assert_eq!(*Config::load_from(&ini).unwrap_err(), ErrorKind::UnsupportedFormat("ini".to_string()));
    }
}
