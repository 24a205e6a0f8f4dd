//! Collect stage executor.

use super::record_plugin_failure;
use crate::activity::{ActivityId, ActivityRepository, ActivityStatus, Extra};
use crate::config::CrtConfig;
use crate::entity::EntityRepository;
use crate::errors::Result;
use crate::registry::{StageKind, StageRegistry};
use crate::stages::{CollectOutcome, StageContext};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

/// Executes the Collect stage for a type: creates a new activity, runs the
/// collector plugin, and persists the collected records as entities tagged
/// with the activity id.
#[derive(Clone)]
pub struct CollectAction {
    config: CrtConfig,
    registry: Arc<StageRegistry>,
    activities: Arc<dyn ActivityRepository>,
    entities: Arc<dyn EntityRepository>,
}

impl CollectAction {
    /// Creates the executor.
    #[must_use]
    pub fn new(
        config: CrtConfig,
        registry: Arc<StageRegistry>,
        activities: Arc<dyn ActivityRepository>,
        entities: Arc<dyn EntityRepository>,
    ) -> Self {
        Self {
            config,
            registry,
            activities,
            entities,
        }
    }

    /// Runs Collect for `type_name`.
    ///
    /// `extra` is free-form caller metadata merged into the new activity.
    /// Unless `force` is set, creation is exclusive: an already pending or
    /// running activity of the same type rejects the call before anything
    /// is created.
    ///
    /// Returns the new activity id, or `None` when the collector reported
    /// nothing to collect (the activity still exists, completed, with a
    /// `nothing_to_collect` marker).
    ///
    /// # Errors
    ///
    /// `UnknownType` and `AlreadyRunning` surface without creating an
    /// activity; `Plugin` failures are recorded on the activity before
    /// being re-raised; `Store` failures abort immediately.
    #[instrument(skip(self, extra), fields(type_name = %type_name))]
    pub async fn execute(
        &self,
        type_name: &str,
        extra: Option<Value>,
        force: bool,
    ) -> Result<Option<ActivityId>> {
        self.config.ensure_enabled()?;
        let collector = self.registry.collector(type_name)?;

        let caller_extra = Extra::from_value(extra.unwrap_or(Value::Null));
        let activity = if force {
            self.activities
                .create(StageKind::Collect, type_name, caller_extra)
                .await?
        } else {
            self.activities
                .create_exclusive(StageKind::Collect, type_name, caller_extra)
                .await?
        };
        info!(activity_id = %activity.id, "Collect started");

        let ctx = StageContext::new(type_name, activity.id, activity.extra.to_value());
        let outcome = match collector.collect(&ctx).await {
            Ok(outcome) => outcome,
            Err(plugin_err) => {
                let plugin_err = plugin_err.with_activity(activity.id);
                record_plugin_failure(&self.activities, &plugin_err).await;
                return Err(plugin_err.into());
            }
        };

        match outcome {
            CollectOutcome::Records { records, extra } => {
                let count = records.len();
                self.entities.put_many(activity.id, records).await?;
                self.activities
                    .merge_extra(activity.id, Extra::from_value(extra))
                    .await?;
                self.activities
                    .update_status(activity.id, ActivityStatus::Completed)
                    .await?;
                info!(activity_id = %activity.id, records = count, "Collect completed");
                Ok(Some(activity.id))
            }
            CollectOutcome::Nothing => {
                self.activities
                    .merge_extra(
                        activity.id,
                        Extra::from_value(serde_json::json!({"nothing_to_collect": true})),
                    )
                    .await?;
                self.activities
                    .update_status(activity.id, ActivityStatus::Completed)
                    .await?;
                info!(activity_id = %activity.id, "Collect completed with nothing to collect");
                Ok(None)
            }
        }
    }
}
