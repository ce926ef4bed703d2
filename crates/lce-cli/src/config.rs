//! # CLI Configuration
//!
//! A YAML document read from `--config` or, failing that, the `LCE_CONFIG`
//! environment variable. Every section is optional:
//!
//! ```yaml
//! actor: compliance-batch
//! escalation:
//!   sla_hours: { l1: 12 }
//! screening:
//!   high_risk_countries: { KP: 100, IR: 100 }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use lce_aml::ScreeningConfig;
use lce_core::LceError;
use lce_escalation::EscalationConfig;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "LCE_CONFIG";

/// Errors loading the CLI configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config {path}: {source}")]
    Read {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file is not valid YAML for [`AppConfig`].
    #[error("cannot parse config {path}: {source}")]
    Parse {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        source: serde_yaml::Error,
    },
    /// A section failed validation.
    #[error("invalid config: {0}")]
    Invalid(#[from] LceError),
}

/// Configuration shared by all subcommands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Actor recorded on every write and event.
    pub actor: String,
    /// Escalation SLA table and recipients.
    pub escalation: EscalationConfig,
    /// AML screening thresholds and tables.
    pub screening: ScreeningConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            actor: "lce-cli".to_string(),
            escalation: EscalationConfig::default(),
            screening: ScreeningConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, else from `$LCE_CONFIG`, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        match path.map(Path::to_path_buf).or(from_env) {
            Some(p) => Self::from_file(&p),
            None => Ok(Self::default()),
        }
    }

    /// Load and validate a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), LceError> {
        if self.actor.trim().is_empty() {
            return Err(LceError::validation("actor is required"));
        }
        self.escalation.validate()?;
        self.screening.validate()
    }
}
