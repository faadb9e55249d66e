//! Configuration management for the minid client
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (minid.toml)
//! - Environment variables (MINID__*)
//!
//! ## Example config file (minid.toml):
//! ```toml
//! [service]
//! url = "https://identifiers.fair-research.org/"
//! timeout_secs = 30
//! token = "..."
//!
//! [defaults]
//! test = true
//! update_if_exists = false
//! algorithm = "sha256"
//! created_by = "Jane Doe"
//!
//! [prefixes.production]
//! doi = "doi:10.1234/"
//!
//! [prefixes.test]
//! doi = "doi:10.5072/"
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::checksum::Algorithm;
use crate::error::Result;
use crate::identifier::{IdentifierTranslator, PrefixTable};
use crate::service::{DEFAULT_SERVICE_URL, DEFAULT_TIMEOUT};

/// Main configuration for the minid client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinidConfig {
    /// Identifier service settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// Defaults for registration commands
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Additional or overriding identifier prefixes
    #[serde(default)]
    pub prefixes: PrefixConfig,
}

/// Identifier service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the identifier service
    #[serde(default = "default_service_url")]
    pub url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Access token with write scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Registration defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Register in the test namespace unless told otherwise
    #[serde(default)]
    pub test: bool,

    /// Keep existing identifiers during batch registration
    #[serde(default)]
    pub update_if_exists: bool,

    /// Algorithm used to checksum files for lookups
    #[serde(default)]
    pub algorithm: Algorithm,

    /// Name recorded as `created_by` on registered files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

/// Scheme prefixes, per namespace
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrefixConfig {
    #[serde(default)]
    pub production: BTreeMap<String, String>,

    #[serde(default)]
    pub test: BTreeMap<String, String>,
}

fn default_service_url() -> String {
    DEFAULT_SERVICE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: default_service_url(),
            timeout_secs: default_timeout_secs(),
            token: None,
        }
    }
}

impl MinidConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        for location in ["minid.toml", ".minid.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory (~/.config/minid/minid.toml on Linux)
        if let Some(dirs) = directories::ProjectDirs::from("org", "fair-research", "minid") {
            let xdg_config = dirs.config_dir().join("minid.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // MINID__SERVICE__TOKEN, MINID__DEFAULTS__TEST, ...
        builder = builder.add_source(
            Environment::with_prefix("MINID")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let config: Self = config.try_deserialize()?;
        config.prefix_table()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.service.timeout_secs)
    }

    /// Default prefixes with configured overrides applied
    pub fn prefix_table(&self) -> Result<PrefixTable> {
        PrefixTable::default().with_overrides(&self.prefixes.production, &self.prefixes.test)
    }

    pub fn translator(&self) -> Result<IdentifierTranslator> {
        Ok(IdentifierTranslator::new(self.prefix_table()?))
    }
}
