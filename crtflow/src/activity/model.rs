//! Activity record, status state machine, and extra-data semantics.

use crate::registry::StageKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of an [`Activity`], assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(Uuid);

impl ActivityId {
    /// Generates a fresh activity id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ActivityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The lifecycle status of an activity.
///
/// Legal transitions, enforced at the repository boundary:
///
/// ```text
/// pending   -> running
/// running   -> completed | failed
/// completed -> running            (resumed by a later stage)
/// ```
///
/// `failed` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    /// Activity is created but not yet executing.
    Pending,
    /// A stage is currently executing against the activity.
    Running,
    /// The last stage finished successfully.
    Completed,
    /// A stage failed; the activity chain is halted.
    Failed,
}

impl Default for ActivityStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl ActivityStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the status counts as "running" for the
    /// one-active-activity-per-type guard.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// Returns true if `self -> to` is a legal transition.
    #[must_use]
    pub fn can_transition_to(&self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed | Self::Failed)
                | (Self::Completed, Self::Running)
        )
    }
}

/// Free-form metadata attached to an activity.
///
/// Values are merged, never silently overwritten: inserting an existing key
/// with a different value either merges (object into object) or folds both
/// values into an array under the key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Extra(serde_json::Map<String, serde_json::Value>);

impl Extra {
    /// Creates an empty extra bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an extra bag from an arbitrary JSON value.
    ///
    /// Objects are taken as-is; any other non-null value is stored under
    /// the `"extra"` key so opaque caller strings still merge cleanly.
    #[must_use]
    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => Self(map),
            serde_json::Value::Null => Self::default(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("extra".to_string(), other);
                Self(map)
            }
        }
    }

    /// Returns true if the bag holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Looks up a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Merges `other` into this bag.
    ///
    /// New keys insert; equal values are a no-op; two objects merge
    /// recursively; any other conflict keeps both values in an array.
    pub fn merge(&mut self, other: Extra) {
        for (key, incoming) in other.0 {
            match self.0.remove(&key) {
                None => {
                    self.0.insert(key, incoming);
                }
                Some(existing) if existing == incoming => {
                    self.0.insert(key, existing);
                }
                Some(serde_json::Value::Object(existing_map)) => match incoming {
                    serde_json::Value::Object(incoming_map) => {
                        let mut nested = Extra(existing_map);
                        nested.merge(Extra(incoming_map));
                        self.0.insert(key, serde_json::Value::Object(nested.0));
                    }
                    other => {
                        let folded = serde_json::Value::Array(vec![
                            serde_json::Value::Object(existing_map),
                            other,
                        ]);
                        self.0.insert(key, folded);
                    }
                },
                Some(serde_json::Value::Array(mut items)) => {
                    items.push(incoming);
                    self.0.insert(key, serde_json::Value::Array(items));
                }
                Some(existing) => {
                    self.0
                        .insert(key, serde_json::Value::Array(vec![existing, incoming]));
                }
            }
        }
    }

    /// Converts the bag into a JSON value.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.0.clone())
    }

    /// Returns the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Extra {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

/// One persisted record of a pipeline run.
///
/// The activity spans the whole Collect -> Refine -> Transfer chain: the
/// `stage` field advances as later stages resume the record by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Unique id, immutable after creation.
    pub id: ActivityId,
    /// The pipeline type name, immutable after creation.
    pub type_name: String,
    /// The stage that most recently worked on the activity.
    pub stage: StageKind,
    /// Current lifecycle status.
    pub status: ActivityStatus,
    /// Merged caller- and plugin-supplied metadata.
    pub extra: Extra,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Bumped on every status/extra mutation.
    pub updated_at: DateTime<Utc>,
}

impl Activity {
    /// Creates a new running activity for a stage and type.
    #[must_use]
    pub fn new(stage: StageKind, type_name: impl Into<String>, extra: Extra) -> Self {
        let now = Utc::now();
        Self {
            id: ActivityId::new(),
            type_name: type_name.into(),
            stage,
            status: ActivityStatus::Running,
            extra,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if the activity blocks other runs of its type.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_status_transitions() {
        assert!(ActivityStatus::Pending.can_transition_to(ActivityStatus::Running));
        assert!(ActivityStatus::Running.can_transition_to(ActivityStatus::Completed));
        assert!(ActivityStatus::Running.can_transition_to(ActivityStatus::Failed));
        assert!(ActivityStatus::Completed.can_transition_to(ActivityStatus::Running));

        assert!(!ActivityStatus::Failed.can_transition_to(ActivityStatus::Running));
        assert!(!ActivityStatus::Pending.can_transition_to(ActivityStatus::Completed));
        assert!(!ActivityStatus::Completed.can_transition_to(ActivityStatus::Failed));
    }

    #[test]
    fn test_status_is_active() {
        assert!(ActivityStatus::Pending.is_active());
        assert!(ActivityStatus::Running.is_active());
        assert!(!ActivityStatus::Completed.is_active());
        assert!(!ActivityStatus::Failed.is_active());
    }

    #[test]
    fn test_status_serialize_snake_case() {
        assert_eq!(serde_json::to_string(&ActivityStatus::Completed).unwrap(), r#""completed""#);
        let parsed: ActivityStatus = serde_json::from_str(r#""failed""#).unwrap();
        assert_eq!(parsed, ActivityStatus::Failed);
    }

    #[test]
    fn test_extra_merge_inserts_new_keys() {
        let mut extra = Extra::from_value(json!({"a": 1}));
        extra.merge(Extra::from_value(json!({"b": 2})));
        assert_eq!(extra.to_value(), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_extra_merge_equal_values_noop() {
        let mut extra = Extra::from_value(json!({"a": 1}));
        extra.merge(Extra::from_value(json!({"a": 1})));
        assert_eq!(extra.to_value(), json!({"a": 1}));
    }

    #[test]
    fn test_extra_merge_objects_recursively() {
        let mut extra = Extra::from_value(json!({"meta": {"source": "api"}}));
        extra.merge(Extra::from_value(json!({"meta": {"page": 3}})));
        assert_eq!(extra.to_value(), json!({"meta": {"source": "api", "page": 3}}));
    }

    #[test]
    fn test_extra_merge_conflict_folds_into_array() {
        let mut extra = Extra::from_value(json!({"a": 1}));
        extra.merge(Extra::from_value(json!({"a": 2})));
        extra.merge(Extra::from_value(json!({"a": 3})));
        assert_eq!(extra.to_value(), json!({"a": [1, 2, 3]}));
    }

    #[test]
    fn test_extra_from_scalar_value() {
        let extra = Extra::from_value(json!("batch-42"));
        assert_eq!(extra.to_value(), json!({"extra": "batch-42"}));
    }

    #[test]
    fn test_activity_new_is_running() {
        let activity = Activity::new(StageKind::Collect, "orders", Extra::new());
        assert_eq!(activity.status, ActivityStatus::Running);
        assert_eq!(activity.stage, StageKind::Collect);
        assert_eq!(activity.type_name, "orders");
        assert!(activity.is_active());
    }
}
