//! Error types for the crtflow engine.
//!
//! The taxonomy separates configuration problems (`Disabled`), resolution
//! problems (`UnknownType`, `NoActivity`, `AlreadyRunning`) surfaced before
//! any activity is touched, and execution problems (`Plugin`, `Store`)
//! raised from inside a stage.

use crate::activity::{ActivityId, ActivityStatus};
use crate::registry::StageKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CrtError>;

/// The main error type for crtflow operations.
#[derive(Debug, Error)]
pub enum CrtError {
    /// No plugin is registered for the requested stage kind and type name.
    #[error("Unknown type '{type_name}' for {kind} stage")]
    UnknownType {
        /// The stage kind that was being resolved.
        kind: StageKind,
        /// The requested type name.
        type_name: String,
    },

    /// Refine/Transfer was requested but no eligible activity exists.
    #[error("No activity available for type '{type_name}': {detail}")]
    NoActivity {
        /// The pipeline type name.
        type_name: String,
        /// What made the lookup fail.
        detail: String,
    },

    /// An activity for the type is already pending or running.
    #[error("There is an activity with type '{type_name}' that is already running ({activity_id})")]
    AlreadyRunning {
        /// The pipeline type name.
        type_name: String,
        /// The id of the activity holding the type.
        activity_id: ActivityId,
    },

    /// A stage plugin failed; the failure is also recorded in the
    /// activity's extra data before this error is raised.
    #[error("{0}")]
    Plugin(#[from] PluginError),

    /// A repository backend failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// An activity status transition outside the legal graph was attempted.
    #[error("Invalid activity transition: {from} -> {to}")]
    InvalidTransition {
        /// The current status.
        from: ActivityStatus,
        /// The rejected target status.
        to: ActivityStatus,
    },

    /// The engine is disabled by configuration.
    #[error("crtflow is disabled: {hint}")]
    Disabled {
        /// Where to enable the engine.
        hint: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CrtError {
    /// Creates an unknown-type error.
    #[must_use]
    pub fn unknown_type(kind: StageKind, type_name: impl Into<String>) -> Self {
        Self::UnknownType {
            kind,
            type_name: type_name.into(),
        }
    }

    /// Creates a no-activity error.
    #[must_use]
    pub fn no_activity(type_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::NoActivity {
            type_name: type_name.into(),
            detail: detail.into(),
        }
    }

    /// Returns true if the error was surfaced before any activity was
    /// created or mutated.
    #[must_use]
    pub fn is_pre_activity(&self) -> bool {
        matches!(
            self,
            Self::UnknownType { .. }
                | Self::NoActivity { .. }
                | Self::AlreadyRunning { .. }
                | Self::Disabled { .. }
        )
    }
}

impl From<serde_json::Error> for CrtError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A wrapped failure from a stage plugin.
///
/// Carries enough structure to be recorded into the owning activity's
/// extra data as the durable trace of the failure.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{stage} plugin for type '{type_name}' failed: {reason}")]
pub struct PluginError {
    /// The stage kind whose plugin failed.
    pub stage: StageKind,
    /// The pipeline type name.
    pub type_name: String,
    /// The activity the failure belongs to, when one exists.
    pub activity_id: Option<ActivityId>,
    /// Human-readable failure reason.
    pub reason: String,
}

impl PluginError {
    /// Creates a new plugin error.
    #[must_use]
    pub fn new(stage: StageKind, type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            stage,
            type_name: type_name.into(),
            activity_id: None,
            reason: reason.into(),
        }
    }

    /// Attaches the owning activity id.
    #[must_use]
    pub fn with_activity(mut self, id: ActivityId) -> Self {
        self.activity_id = Some(id);
        self
    }

    /// Converts to a JSON value suitable for merging into activity extra.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.reason,
            "failed_stage": self.stage.to_string(),
        })
    }
}

/// Errors raised by repository backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend reported a failure.
    #[error("Store backend error: {0}")]
    Backend(String),

    /// An activity id was not present in the store.
    #[error("Activity not found: {0}")]
    ActivityNotFound(ActivityId),

    /// IO error from the backend.
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),
}
