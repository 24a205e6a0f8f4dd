//! Refine stage executor.

use super::record_plugin_failure;
use crate::activity::{Activity, ActivityId, ActivityRepository, ActivityStatus, Extra};
use crate::config::CrtConfig;
use crate::entity::EntityRepository;
use crate::errors::{CrtError, Result, StoreError};
use crate::registry::{StageKind, StageRegistry};
use crate::stages::StageContext;
use std::sync::Arc;
use tracing::{info, instrument};

/// Executes the Refine stage: resumes an activity, loads its collected
/// entities, applies the refiner plugin, and writes the refined records
/// back per identifier.
#[derive(Clone)]
pub struct RefineAction {
    config: CrtConfig,
    registry: Arc<StageRegistry>,
    activities: Arc<dyn ActivityRepository>,
    entities: Arc<dyn EntityRepository>,
}

impl RefineAction {
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

    /// Runs Refine for `type_name`.
    ///
    /// With an explicit `activity_id` the activity is resumed as-is (it
    /// must belong to the type). Without one, the latest completed Collect
    /// activity of the type is selected.
    ///
    /// Writing back overwrites per identifier, so refining the same
    /// activity twice yields the same stored entities.
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
        let refiner = self.registry.refiner(type_name)?;

        let selected = self.select_activity(type_name, activity_id).await?;
        let activity = self.activities.resume(selected.id, StageKind::Refine).await?;
        info!(activity_id = %activity.id, "Refine started");

        let entities = self
            .entities
            .get_all_by_activity_grouped_by_identifier(activity.id)
            .await?;

        let ctx = StageContext::new(type_name, activity.id, activity.extra.to_value());
        let outcome = match refiner.refine(&ctx, &entities).await {
            Ok(outcome) => outcome,
            Err(plugin_err) => {
                let plugin_err = plugin_err.with_activity(activity.id);
                record_plugin_failure(&self.activities, &plugin_err).await;
                return Err(plugin_err.into());
            }
        };

        let count = outcome.records.len();
        self.entities.put_many(activity.id, outcome.records).await?;
        self.activities
            .merge_extra(activity.id, Extra::from_value(outcome.extra))
            .await?;
        self.activities
            .update_status(activity.id, ActivityStatus::Completed)
            .await?;
        info!(activity_id = %activity.id, records = count, "Refine completed");
        Ok(activity.id)
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
                .find_latest(type_name, StageKind::Collect, ActivityStatus::Completed)
                .await?
                .ok_or_else(|| {
                    CrtError::no_activity(type_name, "no completed collect activity to refine")
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::CollectAction;
    use crate::activity::MemoryActivityRepository;
    use crate::entity::MemoryEntityRepository;
    use crate::stages::Record;
    use crate::testing::{FailingRefiner, StaticCollector, UppercaseRefiner};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Fixture {
        collect: CollectAction,
        refine: RefineAction,
        activities: Arc<MemoryActivityRepository>,
        entities: Arc<MemoryEntityRepository>,
    }

    fn fixture(registry: Arc<StageRegistry>) -> Fixture {
        let activities: Arc<MemoryActivityRepository> = Arc::new(MemoryActivityRepository::new());
        let entities: Arc<MemoryEntityRepository> = Arc::new(MemoryEntityRepository::new());
        Fixture {
            collect: CollectAction::new(
                CrtConfig::default(),
                registry.clone(),
                activities.clone(),
                entities.clone(),
            ),
            refine: RefineAction::new(
                CrtConfig::default(),
                registry,
                activities.clone(),
                entities.clone(),
            ),
            activities,
            entities,
        }
    }

    fn orders_registry() -> Arc<StageRegistry> {
        StageRegistry::builder()
            .collector(
                "orders",
                Arc::new(StaticCollector::new(vec![
                    Record::new("o-1", json!("widget")),
                    Record::new("o-2", json!("gadget")),
                ])),
            )
            .refiner("orders", Arc::new(UppercaseRefiner::new()))
            .build()
    }

    #[tokio::test]
    async fn test_refine_selects_latest_collect_activity() {
        let fx = fixture(orders_registry());
        let collected = fx
            .collect
            .execute("orders", None, false)
            .await
            .unwrap()
            .unwrap();

        let refined = fx.refine.execute("orders", None).await.unwrap();
        assert_eq!(refined, collected);

        let activity = fx.activities.get_by_id(refined).await.unwrap();
        assert_eq!(activity.stage, StageKind::Refine);
        assert_eq!(activity.status, ActivityStatus::Completed);

        let grouped = fx
            .entities
            .get_all_by_activity_grouped_by_identifier(refined)
            .await
            .unwrap();
        assert_eq!(grouped["o-1"], json!("WIDGET"));
        assert_eq!(grouped["o-2"], json!("GADGET"));
    }

    #[tokio::test]
    async fn test_refine_is_idempotent_per_activity() {
        let fx = fixture(orders_registry());
        let id = fx
            .collect
            .execute("orders", None, false)
            .await
            .unwrap()
            .unwrap();

        fx.refine.execute("orders", Some(id)).await.unwrap();
        let first = fx
            .entities
            .get_all_by_activity_grouped_by_identifier(id)
            .await
            .unwrap();

        fx.refine.execute("orders", Some(id)).await.unwrap();
        let second = fx
            .entities
            .get_all_by_activity_grouped_by_identifier(id)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn test_refine_without_eligible_activity() {
        let fx = fixture(orders_registry());
        let err = fx.refine.execute("orders", None).await.unwrap_err();
        assert!(matches!(err, CrtError::NoActivity { .. }));
        assert!(fx.activities.is_empty());
    }

    #[tokio::test]
    async fn test_refine_rejects_activity_of_other_type() {
        let registry = StageRegistry::builder()
            .collector("orders", Arc::new(StaticCollector::empty()))
            .collector("customers", Arc::new(StaticCollector::empty()))
            .refiner("orders", Arc::new(UppercaseRefiner::new()))
            .build();
        let fx = fixture(registry);

        let customers_id = fx
            .collect
            .execute("customers", None, false)
            .await
            .unwrap()
            .unwrap();

        let err = fx
            .refine
            .execute("orders", Some(customers_id))
            .await
            .unwrap_err();
        assert!(matches!(err, CrtError::NoActivity { .. }));
    }

    #[tokio::test]
    async fn test_refiner_failure_marks_activity_failed() {
        let registry = StageRegistry::builder()
            .collector(
                "orders",
                Arc::new(StaticCollector::new(vec![Record::new("o-1", json!("x"))])),
            )
            .refiner("orders", Arc::new(FailingRefiner::new("bad schema")))
            .build();
        let fx = fixture(registry);

        let id = fx
            .collect
            .execute("orders", None, false)
            .await
            .unwrap()
            .unwrap();
        let err = fx.refine.execute("orders", Some(id)).await.unwrap_err();
        assert!(matches!(err, CrtError::Plugin(_)));

        let activity = fx.activities.get_by_id(id).await.unwrap();
        assert_eq!(activity.status, ActivityStatus::Failed);
        assert_eq!(activity.extra.get("error"), Some(&json!("bad schema")));

        // Collected entities are untouched by the failed refine.
        let grouped = fx
            .entities
            .get_all_by_activity_grouped_by_identifier(id)
            .await
            .unwrap();
        assert_eq!(grouped["o-1"], json!("x"));
    }
}
