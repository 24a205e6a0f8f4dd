//! Running-activity guard.

use crate::activity::{Activity, ActivityRepository};
use crate::errors::Result;
use std::sync::Arc;
use tracing::debug;

/// Answers "does this type already have an activity in flight?".
///
/// The guard is a read-side convenience for fast rejection; the invariant
/// itself is enforced by [`ActivityRepository::create_exclusive`], which
/// performs the check-then-create sequence atomically.
#[derive(Clone)]
pub struct HasRunningActivity {
    activities: Arc<dyn ActivityRepository>,
}

impl HasRunningActivity {
    /// Creates a guard over an activity repository.
    #[must_use]
    pub fn new(activities: Arc<dyn ActivityRepository>) -> Self {
        Self { activities }
    }

    /// Returns true iff an activity for the type is pending or running.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn execute(&self, type_name: &str) -> Result<bool> {
        Ok(self.running_activity(type_name).await?.is_some())
    }

    /// Returns the activity currently holding the type, if any.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn running_activity(&self, type_name: &str) -> Result<Option<Activity>> {
        let running = self.activities.find_running(type_name).await?;
        if let Some(ref activity) = running {
            debug!(
                type_name = %type_name,
                activity_id = %activity.id,
                "Type already has a running activity"
            );
        }
        Ok(running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityStatus, Extra, MemoryActivityRepository};
    use crate::registry::StageKind;

    #[tokio::test]
    async fn test_reports_running_activity() {
        let repo = Arc::new(MemoryActivityRepository::new());
        let guard = HasRunningActivity::new(repo.clone());

        assert!(!guard.execute("orders").await.unwrap());

        let activity = repo
            .create(StageKind::Collect, "orders", Extra::new())
            .await
            .unwrap();
        assert!(guard.execute("orders").await.unwrap());
        assert!(!guard.execute("customers").await.unwrap());

        repo.update_status(activity.id, ActivityStatus::Completed)
            .await
            .unwrap();
        assert!(!guard.execute("orders").await.unwrap());
    }
}
