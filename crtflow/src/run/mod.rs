//! Run orchestrators: Collect -> Refine -> Transfer as one logical run.
//!
//! [`RunSync`] executes the chain in the caller's task and returns the
//! refined, transferred data; [`RunAsync`] enqueues the same chain on a
//! background worker and returns immediately.

mod worker;

pub use worker::RunAsync;

use crate::actions::{CollectAction, RefineAction, TransferAction};
use crate::activity::{ActivityId, ActivityRepository};
use crate::config::CrtConfig;
use crate::entity::EntityRepository;
use crate::errors::{CrtError, Result};
use crate::guard::HasRunningActivity;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};

/// The result of a synchronous run.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// The activity that carried the run, absent when there was nothing
    /// to collect.
    pub activity_id: Option<ActivityId>,
    /// Refined and transferred data, grouped by identifier.
    pub data: BTreeMap<String, Value>,
    /// The activity's final extra data.
    pub extra: Value,
}

impl RunOutcome {
    /// An outcome for a run that had nothing to collect.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Converts the outcome to a JSON value for serialization.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "activity_id": self.activity_id,
            "data": self.data,
            "extra": self.extra,
        })
    }
}

/// Runs the full pipeline chain synchronously for a type.
#[derive(Clone)]
pub struct RunSync {
    config: CrtConfig,
    guard: HasRunningActivity,
    collect: CollectAction,
    refine: RefineAction,
    transfer: TransferAction,
    activities: Arc<dyn ActivityRepository>,
    entities: Arc<dyn EntityRepository>,
}

impl RunSync {
    /// Creates the orchestrator.
    #[must_use]
    pub fn new(
        config: CrtConfig,
        guard: HasRunningActivity,
        collect: CollectAction,
        refine: RefineAction,
        transfer: TransferAction,
        activities: Arc<dyn ActivityRepository>,
        entities: Arc<dyn EntityRepository>,
    ) -> Self {
        Self {
            config,
            guard,
            collect,
            refine,
            transfer,
            activities,
            entities,
        }
    }

    /// Runs Collect -> Refine -> Transfer for `type_name` and returns the
    /// run's data read back from the entity store.
    ///
    /// Unless `force` is set, the run is rejected with `AlreadyRunning`
    /// when an activity of the type is already in flight; `force` permits
    /// a second concurrent activity but each invocation still creates at
    /// most one.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` is raised before any stage work. Stage errors
    /// propagate as-is; a failed stage halts the remaining chain.
    #[instrument(skip(self, extra), fields(type_name = %type_name))]
    pub async fn execute(
        &self,
        type_name: &str,
        extra: Option<Value>,
        force: bool,
    ) -> Result<RunOutcome> {
        self.config.ensure_enabled()?;

        // Fast rejection; the atomic check lives in the exclusive
        // activity creation inside Collect.
        if !force {
            if let Some(running) = self.guard.running_activity(type_name).await? {
                return Err(CrtError::AlreadyRunning {
                    type_name: type_name.to_string(),
                    activity_id: running.id,
                });
            }
        }

        let Some(activity_id) = self.collect.execute(type_name, extra, force).await? else {
            info!(type_name = %type_name, "Run produced no activity, nothing to collect");
            return Ok(RunOutcome::empty());
        };

        self.refine.execute(type_name, Some(activity_id)).await?;
        self.transfer.execute(type_name, Some(activity_id)).await?;

        let data = self
            .entities
            .get_all_by_activity_grouped_by_identifier(activity_id)
            .await?;
        let activity = self.activities.get_by_id(activity_id).await?;
        info!(
            activity_id = %activity_id,
            identifiers = data.len(),
            "Run completed"
        );
        Ok(RunOutcome {
            activity_id: Some(activity_id),
            data,
            extra: activity.extra.to_value(),
        })
    }
}

/// Wires up a full engine (executors, guard, orchestrators) from its
/// parts. Convenience for embedders and tests.
#[must_use]
pub fn build_engine(
    config: CrtConfig,
    registry: Arc<crate::registry::StageRegistry>,
    activities: Arc<dyn ActivityRepository>,
    entities: Arc<dyn EntityRepository>,
) -> RunSync {
    let guard = HasRunningActivity::new(activities.clone());
    let collect = CollectAction::new(
        config.clone(),
        registry.clone(),
        activities.clone(),
        entities.clone(),
    );
    let refine = RefineAction::new(
        config.clone(),
        registry.clone(),
        activities.clone(),
        entities.clone(),
    );
    let transfer = TransferAction::new(
        config.clone(),
        registry,
        activities.clone(),
        entities.clone(),
    );
    RunSync::new(config, guard, collect, refine, transfer, activities, entities)
}
