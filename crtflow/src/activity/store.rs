//! Activity repository contract and in-memory implementation.

use super::{Activity, ActivityId, ActivityStatus, Extra};
use crate::errors::{CrtError, Result, StoreError};
use crate::registry::StageKind;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Repository contract for [`Activity`] records.
///
/// The store is the single source of truth for the "is a type currently
/// running" decision; implementations must make [`create_exclusive`]
/// atomic with respect to concurrent creations for the same type.
///
/// [`create_exclusive`]: ActivityRepository::create_exclusive
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// Creates a new running activity unconditionally.
    async fn create(&self, stage: StageKind, type_name: &str, extra: Extra) -> Result<Activity>;

    /// Creates a new running activity only if no activity of the type is
    /// pending or running.
    ///
    /// The check-then-create sequence is a single critical section; two
    /// concurrent calls for the same type cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns [`CrtError::AlreadyRunning`] when an active activity exists.
    async fn create_exclusive(
        &self,
        stage: StageKind,
        type_name: &str,
        extra: Extra,
    ) -> Result<Activity>;

    /// Fetches an activity by id.
    async fn get_by_id(&self, id: ActivityId) -> Result<Activity>;

    /// Reopens a completed activity for a later stage, setting the stage
    /// and transitioning to `Running`.
    async fn resume(&self, id: ActivityId, stage: StageKind) -> Result<Activity>;

    /// Transitions an activity to a new status.
    ///
    /// # Errors
    ///
    /// Returns [`CrtError::InvalidTransition`] for transitions outside the
    /// legal graph.
    async fn update_status(&self, id: ActivityId, status: ActivityStatus) -> Result<()>;

    /// Merges data into an activity's extra bag.
    async fn merge_extra(&self, id: ActivityId, data: Extra) -> Result<()>;

    /// Returns the active (pending or running) activity for a type, if any.
    async fn find_running(&self, type_name: &str) -> Result<Option<Activity>>;

    /// Returns the most recently updated activity for a type matching the
    /// given stage and status.
    async fn find_latest(
        &self,
        type_name: &str,
        stage: StageKind,
        status: ActivityStatus,
    ) -> Result<Option<Activity>>;
}

/// In-memory [`ActivityRepository`] backed by a mutex-guarded map.
///
/// The mutex scope covers the check-then-create sequence, which is what
/// makes `create_exclusive` safe under concurrent orchestrator calls.
/// Intended for tests and embedded use; durable backends live outside the
/// crate.
#[derive(Debug, Default)]
pub struct MemoryActivityRepository {
    records: Mutex<HashMap<ActivityId, Activity>>,
}

impl MemoryActivityRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored activities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns true if no activities are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    fn active_for(records: &HashMap<ActivityId, Activity>, type_name: &str) -> Option<Activity> {
        records
            .values()
            .find(|a| a.type_name == type_name && a.is_active())
            .cloned()
    }
}

#[async_trait]
impl ActivityRepository for MemoryActivityRepository {
    async fn create(&self, stage: StageKind, type_name: &str, extra: Extra) -> Result<Activity> {
        let activity = Activity::new(stage, type_name, extra);
        self.records.lock().insert(activity.id, activity.clone());
        Ok(activity)
    }

    async fn create_exclusive(
        &self,
        stage: StageKind,
        type_name: &str,
        extra: Extra,
    ) -> Result<Activity> {
        let mut records = self.records.lock();
        if let Some(active) = Self::active_for(&records, type_name) {
            return Err(CrtError::AlreadyRunning {
                type_name: type_name.to_string(),
                activity_id: active.id,
            });
        }
        let activity = Activity::new(stage, type_name, extra);
        records.insert(activity.id, activity.clone());
        Ok(activity)
    }

    async fn get_by_id(&self, id: ActivityId) -> Result<Activity> {
        self.records
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::ActivityNotFound(id).into())
    }

    async fn resume(&self, id: ActivityId, stage: StageKind) -> Result<Activity> {
        let mut records = self.records.lock();
        let activity = records
            .get_mut(&id)
            .ok_or(StoreError::ActivityNotFound(id))?;
        if !activity.status.can_transition_to(ActivityStatus::Running) {
            return Err(CrtError::InvalidTransition {
                from: activity.status,
                to: ActivityStatus::Running,
            });
        }
        activity.stage = stage;
        activity.status = ActivityStatus::Running;
        activity.updated_at = Utc::now();
        Ok(activity.clone())
    }

    async fn update_status(&self, id: ActivityId, status: ActivityStatus) -> Result<()> {
        let mut records = self.records.lock();
        let activity = records
            .get_mut(&id)
            .ok_or(StoreError::ActivityNotFound(id))?;
        if !activity.status.can_transition_to(status) {
            return Err(CrtError::InvalidTransition {
                from: activity.status,
                to: status,
            });
        }
        activity.status = status;
        activity.updated_at = Utc::now();
        Ok(())
    }

    async fn merge_extra(&self, id: ActivityId, data: Extra) -> Result<()> {
        let mut records = self.records.lock();
        let activity = records
            .get_mut(&id)
            .ok_or(StoreError::ActivityNotFound(id))?;
        activity.extra.merge(data);
        activity.updated_at = Utc::now();
        Ok(())
    }

    async fn find_running(&self, type_name: &str) -> Result<Option<Activity>> {
        Ok(Self::active_for(&self.records.lock(), type_name))
    }

    async fn find_latest(
        &self,
        type_name: &str,
        stage: StageKind,
        status: ActivityStatus,
    ) -> Result<Option<Activity>> {
        Ok(self
            .records
            .lock()
            .values()
            .filter(|a| a.type_name == type_name && a.stage == stage && a.status == status)
            .max_by_key(|a| a.updated_at)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = MemoryActivityRepository::new();
        let created = repo
            .create(StageKind::Collect, "orders", Extra::new())
            .await
            .unwrap();

        let fetched = repo.get_by_id(created.id).await.unwrap();
        assert_eq!(fetched.type_name, "orders");
        assert_eq!(fetched.status, ActivityStatus::Running);
    }

    #[tokio::test]
    async fn test_create_exclusive_rejects_second_active() {
        let repo = MemoryActivityRepository::new();
        let first = repo
            .create_exclusive(StageKind::Collect, "orders", Extra::new())
            .await
            .unwrap();

        let err = repo
            .create_exclusive(StageKind::Collect, "orders", Extra::new())
            .await
            .unwrap_err();
        match err {
            CrtError::AlreadyRunning { type_name, activity_id } => {
                assert_eq!(type_name, "orders");
                assert_eq!(activity_id, first.id);
            }
            other => panic!("expected AlreadyRunning, got {other}"),
        }

        // A different type is unaffected.
        repo.create_exclusive(StageKind::Collect, "customers", Extra::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_exclusive_allowed_after_completion() {
        let repo = MemoryActivityRepository::new();
        let first = repo
            .create_exclusive(StageKind::Collect, "orders", Extra::new())
            .await
            .unwrap();
        repo.update_status(first.id, ActivityStatus::Completed)
            .await
            .unwrap();

        repo.create_exclusive(StageKind::Collect, "orders", Extra::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_status_rejects_illegal_transition() {
        let repo = MemoryActivityRepository::new();
        let activity = repo
            .create(StageKind::Collect, "orders", Extra::new())
            .await
            .unwrap();
        repo.update_status(activity.id, ActivityStatus::Failed)
            .await
            .unwrap();

        let err = repo
            .update_status(activity.id, ActivityStatus::Running)
            .await
            .unwrap_err();
        assert!(matches!(err, CrtError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_resume_reopens_completed_activity() {
        let repo = MemoryActivityRepository::new();
        let activity = repo
            .create(StageKind::Collect, "orders", Extra::new())
            .await
            .unwrap();
        repo.update_status(activity.id, ActivityStatus::Completed)
            .await
            .unwrap();

        let resumed = repo.resume(activity.id, StageKind::Refine).await.unwrap();
        assert_eq!(resumed.stage, StageKind::Refine);
        assert_eq!(resumed.status, ActivityStatus::Running);

        // While resumed, the type counts as running again.
        assert!(repo.find_running("orders").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_resume_rejects_failed_activity() {
        let repo = MemoryActivityRepository::new();
        let activity = repo
            .create(StageKind::Collect, "orders", Extra::new())
            .await
            .unwrap();
        repo.update_status(activity.id, ActivityStatus::Failed)
            .await
            .unwrap();

        let err = repo.resume(activity.id, StageKind::Refine).await.unwrap_err();
        assert!(matches!(err, CrtError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_merge_extra_accumulates() {
        let repo = MemoryActivityRepository::new();
        let activity = repo
            .create(StageKind::Collect, "orders", Extra::from_value(json!({"a": 1})))
            .await
            .unwrap();

        repo.merge_extra(activity.id, Extra::from_value(json!({"b": 2})))
            .await
            .unwrap();
        let fetched = repo.get_by_id(activity.id).await.unwrap();
        assert_eq!(fetched.extra.to_value(), json!({"a": 1, "b": 2}));
    }

    #[tokio::test]
    async fn test_find_latest_picks_most_recent() {
        let repo = MemoryActivityRepository::new();
        let first = repo
            .create(StageKind::Collect, "orders", Extra::new())
            .await
            .unwrap();
        repo.update_status(first.id, ActivityStatus::Completed)
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(2)).await;

        let second = repo
            .create(StageKind::Collect, "orders", Extra::new())
            .await
            .unwrap();
        repo.update_status(second.id, ActivityStatus::Completed)
            .await
            .unwrap();

        let latest = repo
            .find_latest("orders", StageKind::Collect, ActivityStatus::Completed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, second.id);
    }

    #[tokio::test]
    async fn test_get_by_id_missing() {
        let repo = MemoryActivityRepository::new();
        let err = repo.get_by_id(ActivityId::new()).await.unwrap_err();
        assert!(matches!(err, CrtError::Store(StoreError::ActivityNotFound(_))));
    }
}
