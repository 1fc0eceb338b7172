//! Runtime configuration.

use serde::{Deserialize, Serialize};

use crate::error::{ReactiveError, Result};

/// Default label attached to a runtime's log events.
pub const DEFAULT_LABEL: &str = "tether";

/// Settings for a [`Runtime`](crate::reactive::Runtime).
///
/// ```rust,ignore
/// let config = RuntimeConfig::from_json(r#"{ "label": "editor", "max_depth": 32 }"#)?;
/// let runtime = Runtime::with_config(config)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Name recorded on every log event emitted by the runtime.
    pub label: String,

    /// How many effect runs may be nested on one thread before a write stops
    /// dispatching. `None` (the default) means no limit.
    ///
    /// Cascades terminate without a limit, since each effect occupies at most
    /// one frame per stack. With a limit set, writes made at that depth are
    /// not dispatched and their subscribers keep stale data. Only effect
    /// frames count; `untracked` sections do not.
    pub max_depth: Option<usize>,
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(ReactiveError::ConfigParse)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.label.trim().is_empty() {
            return Err(ReactiveError::InvalidConfig("label must not be empty".into()));
        }
        if self.max_depth == Some(0) {
            return Err(ReactiveError::InvalidConfig(
                "max_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Set the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Limit the nesting of effect runs to `max_depth`.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_owned(),
            max_depth: None,
        }
    }
}
