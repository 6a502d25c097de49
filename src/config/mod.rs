//! Discovery configuration
//!
//! One [`GroupConfig`] per subsystem decides whether that worker pool is
//! discovered at all and which coordination group announces it. A disabled
//! subsystem is entirely absent at runtime: its getters report "not
//! configured" rather than "empty", and the stats snapshot omits its key.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::registry::Subsystem;
use crate::selector::SelectorConfig;

// ============================================================================
// Errors
// ============================================================================

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A field holds a value that cannot be used
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Config file could not be read
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

// ============================================================================
// Group Configuration
// ============================================================================

/// Discovery switch and coordination group for one subsystem
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Whether this subsystem is discovered at all
    #[serde(default)]
    pub enabled: bool,

    /// Coordination group address announcing the pool
    #[serde(default)]
    pub group: String,
}

impl GroupConfig {
    /// An enabled entry watching `group`
    pub fn enabled(group: impl Into<String>) -> Self {
        Self {
            enabled: true,
            group: group.into(),
        }
    }

    /// A disabled entry
    pub fn disabled() -> Self {
        Self::default()
    }
}

// ============================================================================
// Discovery Configuration
// ============================================================================

/// Configuration for the whole discovery facade
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Bridge pool discovery
    #[serde(default)]
    pub bridge: GroupConfig,

    /// Recorder pool discovery
    #[serde(default)]
    pub recorder: GroupConfig,

    /// SIP-capable recorder pool discovery
    #[serde(default)]
    pub sip_recorder: GroupConfig,

    /// Gateway pool discovery
    #[serde(default)]
    pub gateway: GroupConfig,

    /// Bridge selector tuning
    #[serde(default)]
    pub selector: SelectorConfig,
}

impl DiscoveryConfig {
    /// Create a new config builder
    pub fn builder() -> DiscoveryConfigBuilder {
        DiscoveryConfigBuilder::default()
    }

    /// Group entry for a subsystem
    pub fn group(&self, subsystem: Subsystem) -> &GroupConfig {
        match subsystem {
            Subsystem::Bridge => &self.bridge,
            Subsystem::Recorder => &self.recorder,
            Subsystem::SipRecorder => &self.sip_recorder,
            Subsystem::Gateway => &self.gateway,
        }
    }

    /// Subsystems with discovery enabled
    pub fn enabled_subsystems(&self) -> Vec<Subsystem> {
        Subsystem::all()
            .into_iter()
            .filter(|s| self.group(*s).enabled)
            .collect()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for subsystem in Subsystem::all() {
            let entry = self.group(subsystem);
            if entry.enabled && entry.group.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.group", subsystem),
                    reason: "Enabled subsystem needs a group address".to_string(),
                });
            }
        }

        if self.selector.stale_after_secs <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "selector.stale_after_secs".to_string(),
                reason: "Staleness threshold must be positive".to_string(),
            });
        }

        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`DiscoveryConfig`]
#[derive(Debug, Default)]
pub struct DiscoveryConfigBuilder {
    bridge: Option<GroupConfig>,
    recorder: Option<GroupConfig>,
    sip_recorder: Option<GroupConfig>,
    gateway: Option<GroupConfig>,
    stale_after_secs: Option<i64>,
}

impl DiscoveryConfigBuilder {
    /// Enable bridge discovery on `group`
    pub fn bridge(mut self, group: impl Into<String>) -> Self {
        self.bridge = Some(GroupConfig::enabled(group));
        self
    }

    /// Enable recorder discovery on `group`
    pub fn recorder(mut self, group: impl Into<String>) -> Self {
        self.recorder = Some(GroupConfig::enabled(group));
        self
    }

    /// Enable SIP recorder discovery on `group`
    pub fn sip_recorder(mut self, group: impl Into<String>) -> Self {
        self.sip_recorder = Some(GroupConfig::enabled(group));
        self
    }

    /// Enable gateway discovery on `group`
    pub fn gateway(mut self, group: impl Into<String>) -> Self {
        self.gateway = Some(GroupConfig::enabled(group));
        self
    }

    /// Set the selector staleness threshold
    pub fn stale_after_secs(mut self, secs: i64) -> Self {
        self.stale_after_secs = Some(secs);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<DiscoveryConfig, ConfigError> {
        let config = DiscoveryConfig {
            bridge: self.bridge.unwrap_or_default(),
            recorder: self.recorder.unwrap_or_default(),
            sip_recorder: self.sip_recorder.unwrap_or_default(),
            gateway: self.gateway.unwrap_or_default(),
            selector: SelectorConfig {
                stale_after_secs: self
                    .stale_after_secs
                    .unwrap_or(SelectorConfig::default().stale_after_secs),
            },
        };
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================
