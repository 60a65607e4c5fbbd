//! Configuration (versioned YAML)
//!
//! ```yaml
//! version: 1
//! credentials:
//!   user_id: admin
//!   password: admin
//! report:
//!   root_name: content
//!   indent_unit: "&emsp;"
//!   line_terminator: "<br/>"
//!   include_properties: true
//!   synthetic_type: hippofacnav:facetnavigation
//! subscription:
//!   root_path: /content
//!   deep: true
//!   no_local: false
//!   event_types: "NODE_ADDED | NODE_REMOVED | PROPERTY_ADDED | PROPERTY_REMOVED | PROPERTY_CHANGED | NODE_MOVED | PERSIST"
//! ```
//!
//! Every section is optional; omitted fields fall back to the defaults above.

pub mod error;

use std::path::Path;

use content_store::{Credentials, EventTypeMask};
use serde::{Deserialize, Serialize};

pub use error::{ConfigError, ConfigResult};

use crate::report::{DEFAULT_INDENT_UNIT, DEFAULT_LINE_TERMINATOR};
use crate::traversal::SYNTHETIC_AGGREGATION_TYPE;

pub const CONFIG_VERSION: u32 = 1;
pub const SUPPORTED_VERSIONS: &[u32] = &[CONFIG_VERSION];

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "CONTENT_VIEW_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewConfig {
    pub version: u32,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub subscription: SubscriptionConfig,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CredentialsConfig {
    pub user_id: String,
    pub password: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            user_id: "admin".to_string(),
            password: "admin".to_string(),
        }
    }
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("user_id", &self.user_id)
            .field("password", &"***")
            .finish()
    }
}

impl CredentialsConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.user_id, &self.password)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ReportConfig {
    /// Name of the root child whose subtree is reported
    pub root_name: String,
    pub indent_unit: String,
    pub line_terminator: String,
    /// List each node's properties right after the node
    pub include_properties: bool,
    /// Node type whose children are never expanded
    pub synthetic_type: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            root_name: "content".to_string(),
            indent_unit: DEFAULT_INDENT_UNIT.to_string(),
            line_terminator: DEFAULT_LINE_TERMINATOR.to_string(),
            include_properties: true,
            synthetic_type: SYNTHETIC_AGGREGATION_TYPE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SubscriptionConfig {
    pub root_path: String,
    pub deep: bool,
    pub no_local: bool,
    /// `|`-separated flag names, e.g. `NODE_ADDED | PERSIST`
    pub event_types: EventTypeMask,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            root_path: "/content".to_string(),
            deep: true,
            no_local: false,
            event_types: EventTypeMask::all(),
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            credentials: CredentialsConfig::default(),
            report: ReportConfig::default(),
            subscription: SubscriptionConfig::default(),
        }
    }
}

impl ViewConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let raw: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let version = raw
            .get("version")
            .ok_or(ConfigError::MissingVersion)?
            .as_u64()
            .ok_or_else(|| ConfigError::invalid("version", "must be a positive integer"))?;
        let version = u32::try_from(version)
            .map_err(|_| ConfigError::invalid("version", "out of range"))?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let config: ViewConfig = serde_yaml::from_value(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// `path` when given, else the file named by `CONTENT_VIEW_CONFIG`, else defaults
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => Self::from_yaml(path),
            None => match std::env::var_os(CONFIG_ENV) {
                Some(env_path) => Self::from_yaml(env_path),
                None => Ok(Self::default()),
            },
        }
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.report.root_name.is_empty() {
            return Err(ConfigError::invalid("report.root_name", "must not be empty"));
        }
        if self.report.root_name.contains('/') {
            return Err(ConfigError::invalid(
                "report.root_name",
                "must be a single name, not a path",
            ));
        }
        if !self.subscription.root_path.starts_with('/') {
            return Err(ConfigError::invalid(
                "subscription.root_path",
                "must be an absolute path",
            ));
        }
        if self.subscription.event_types.is_empty() {
            return Err(ConfigError::invalid(
                "subscription.event_types",
                "at least one event type is required",
            ));
        }
        Ok(())
    }
}
