//! Transfer stage executor.

use super::record_plugin_failure;
use crate::activity::{Activity, ActivityId, ActivityRepository, ActivityStatus, Extra};
use crate::config::CrtConfig;
use crate::entity::EntityRepository;
use crate::errors::{CrtError, Result, StoreError};
use crate::registry::{StageKind, StageRegistry};
use crate::stages::StageContext;
use std::sync::Arc;
use tracing::{info, instrument};

/// Executes the Transfer stage: resumes an activity, loads its refined
/// entities, and hands them to the transferor plugin for delivery to the
/// external destination.
///
/// Transfer persists no entities of its own, so a failed transfer leaves
/// the entity store exactly as it was. Transfer outcomes (e.g. remote ids)
/// are merged into the activity's extra before completion, so callers
/// reading the activity afterwards always see them, sync mode or not.
#[derive(Clone)]
pub struct TransferAction {
    config: CrtConfig,
    registry: Arc<StageRegistry>,
    activities: Arc<dyn ActivityRepository>,
    entities: Arc<dyn EntityRepository>,
}

impl TransferAction {
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

    /// Runs Transfer for `type_name`.
    ///
    /// With an explicit `activity_id` the activity is resumed as-is (it
    /// must belong to the type). Without one, the latest completed Refine
    /// activity of the type is selected.
    ///
    /// # Errors
    ///
    /// `UnknownType` and `NoActivity` surface without mutating anything;
    /// `Plugin` failures are recorded on the activity before being
    /// re-raised; `Store` failures abort immediately.
    #[instrument(skip(self), fields(type_name = %type_name))]
    pub async fn execute(
        &self,
        type_name: &str,
        activity_id: Option<ActivityId>,
    ) -> Result<ActivityId> {
        self.config.ensure_enabled()?;
        let transferor = self.registry.transferor(type_name)?;

        let selected = self.select_activity(type_name, activity_id).await?;
        let activity = self
            .activities
            .resume(selected.id, StageKind::Transfer)
            .await?;
        info!(activity_id = %activity.id, "Transfer started");

        let entities = self
            .entities
            .get_all_by_activity_grouped_by_identifier(activity.id)
            .await?;

        let ctx = StageContext::new(type_name, activity.id, activity.extra.to_value());
        let outcome = match transferor.transfer(&ctx, &entities).await {
            Ok(outcome) => outcome,
            Err(plugin_err) => {
                let plugin_err = plugin_err.with_activity(activity.id);
                record_plugin_failure(&self.activities, &plugin_err).await;
                return Err(plugin_err.into());
            }
        };

        self.activities
            .merge_extra(activity.id, Extra::from_value(outcome.extra))
            .await?;
        self.activities
            .update_status(activity.id, ActivityStatus::Completed)
            .await?;

        // Read back so transfer outcomes appear in the log trail even for
        // fire-and-forget callers.
        let finished = self.activities.get_by_id(activity.id).await?;
        info!(
            activity_id = %finished.id,
            extra = %finished.extra.to_value(),
            "Transfer completed"
        );
        Ok(finished.id)
    }

    async fn select_activity(
        &self,
        type_name: &str,
        activity_id: Option<ActivityId>,
    ) -> Result<Activity> {
        match activity_id {
            Some(id) => {
                let activity = match self.activities.get_by_id(id).await {
                    Ok(activity) => activity,
                    Err(CrtError::Store(StoreError::ActivityNotFound(_))) => {
                        return Err(CrtError::no_activity(
                            type_name,
                            format!("activity {id} does not exist"),
                        ));
                    }
                    Err(err) => return Err(err),
                };
                if activity.type_name != type_name {
                    return Err(CrtError::no_activity(
                        type_name,
                        format!("activity {id} belongs to type '{}'", activity.type_name),
                    ));
                }
                Ok(activity)
            }
            None => self
                .activities
                .find_latest(type_name, StageKind::Refine, ActivityStatus::Completed)
                .await?
                .ok_or_else(|| {
                    CrtError::no_activity(type_name, "no completed refine activity to transfer")
                }),
        }
    }
}
