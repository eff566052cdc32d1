//! Engine configuration
//!
//! The debounce interval is the only behavioral tunable; the notice texts are
//! carried here so integrators can localize them.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default quiet period before buffered edits are flushed
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Default notice text for failed flushes
pub const DEFAULT_ERROR_MESSAGE: &str = "Failed to sync changes, will retry";

/// Default notice text for a failed teardown flush, which is never retried
pub const DEFAULT_TEARDOWN_MESSAGE: &str = "Failed to save changes before closing";

/// Sync engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Quiet period after the last edit before a flush
    #[serde(rename = "debounce_ms", with = "millis")]
    pub debounce: Duration,
    /// Text handed to the notifier on flush failure
    pub error_message: String,
    /// Text handed to the notifier when a teardown flush fails
    pub teardown_message: String,
}

impl SyncConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With debounce interval
    #[inline]
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// With notice text
    #[inline]
    #[must_use]
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }

    /// With teardown notice text
    #[inline]
    #[must_use]
    pub fn with_teardown_message(mut self, message: impl Into<String>) -> Self {
        self.teardown_message = message.into();
        self
    }

    /// Notice text for a failure, by whether the flush was a teardown
    #[must_use]
    pub fn notice_message(&self, teardown: bool) -> &str {
        if teardown {
            &self.teardown_message
        } else {
            &self.error_message
        }
    }

    /// Check values are usable
    ///
    /// # Errors
    /// `ConfigError::Invalid` for a zero debounce or empty notice text.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce.is_zero() {
            return Err(ConfigError::Invalid("debounce_ms must be greater than 0".to_string()));
        }
        if self.error_message.trim().is_empty() {
            return Err(ConfigError::Invalid("error_message must not be empty".to_string()));
        }
        if self.teardown_message.trim().is_empty() {
            return Err(ConfigError::Invalid("teardown_message must not be empty".to_string()));
        }
        Ok(())
    }

    /// Parse and validate from TOML
    ///
    /// Missing keys take their defaults.
    ///
    /// # Errors
    /// `ConfigError::Parse` on malformed TOML, `ConfigError::Invalid` on
    /// out-of-range values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
            teardown_message: DEFAULT_TEARDOWN_MESSAGE.to_string(),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
