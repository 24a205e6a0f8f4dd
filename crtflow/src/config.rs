//! Engine configuration.
//!
//! The only behavioral switch is the enabled toggle: when disabled, every
//! action and orchestrator returns [`CrtError::Disabled`] with the
//! configured hint before doing any work.
//!
//! [`CrtError::Disabled`]: crate::errors::CrtError::Disabled

use serde::Deserialize;

/// Environment variable controlling the enabled toggle.
pub const ENABLED_ENV: &str = "CRTFLOW_ENABLED";

fn default_enabled() -> bool {
    true
}

fn default_disabled_hint() -> String {
    "set enabled = true in the crtflow configuration".to_string()
}

/// Configuration for the crtflow engine.
#[derive(Debug, Clone, Deserialize)]
pub struct CrtConfig {
    /// Whether the engine performs any work at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Message shown to callers when the engine is disabled.
    #[serde(default = "default_disabled_hint")]
    pub disabled_hint: String,
}

impl Default for CrtConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            disabled_hint: default_disabled_hint(),
        }
    }
}

impl CrtConfig {
    /// Creates a configuration with defaults (enabled).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a disabled configuration.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Sets the enabled toggle.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the disabled hint message.
    #[must_use]
    pub fn with_disabled_hint(mut self, hint: impl Into<String>) -> Self {
        self.disabled_hint = hint.into();
        self
    }

    /// Reads the enabled toggle from the environment
    /// (`CRTFLOW_ENABLED=0|false|no` disables).
    #[must_use]
    pub fn from_env() -> Self {
        let enabled = std::env::var(ENABLED_ENV)
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);
        Self::default().with_enabled(enabled)
    }

    /// Returns true if the engine may perform work.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns `Err(Disabled)` when the engine is switched off.
    ///
    /// # Errors
    ///
    /// Returns [`CrtError::Disabled`] carrying the configured hint.
    ///
    /// [`CrtError::Disabled`]: crate::errors::CrtError::Disabled
    pub fn ensure_enabled(&self) -> crate::errors::Result<()> {
        if self.enabled {
            Ok(())
        } else {
            Err(crate::errors::CrtError::Disabled {
                hint: self.disabled_hint.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CrtError;

    #[test]
    fn test_default_is_enabled() {
        let config = CrtConfig::default();
        assert!(config.is_enabled());
        assert!(config.ensure_enabled().is_ok());
    }

    #[test]
    fn test_disabled_returns_hint() {
        let config = CrtConfig::disabled().with_disabled_hint("flip the switch");
        let err = config.ensure_enabled().unwrap_err();
        match err {
            CrtError::Disabled { hint } => assert_eq!(hint, "flip the switch"),
            other => panic!("expected Disabled, got {other}"),
        }
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: CrtConfig = serde_json::from_str("{}").unwrap();
        assert!(config.enabled);

        let config: CrtConfig = serde_json::from_str(r#"{"enabled": false}"#).unwrap();
        assert!(!config.enabled);
    }
}
