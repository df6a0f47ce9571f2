//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default rules file name, resolved like `-r`.
    pub rules_file: String,

    /// Year for log files whose path does not carry one.
    pub year: Option<i32>,

    /// Personal days off, added to the built-in holiday list.
    pub holidays: Vec<NaiveDate>,

    /// Activity labels counted as naps by the sleep statistics.
    pub nap_labels: Vec<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("rules_file", &self.rules_file)
            .field("year", &self.year)
            .field("holidays", &self.holidays.len())
            .field("nap_labels", &self.nap_labels)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rules_file: "calendar".to_string(),
            year: None,
            holidays: Vec::new(),
            nap_labels: vec!["Sieste".to_string()],
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (DAYLOG_*)
        figment = figment.merge(Env::prefixed("DAYLOG_"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for daylog.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("daylog"))
}
