//! Entity records: refined data items linked to the activity that
//! produced them.
//!
//! Entities are written by the Collect and Refine executors and read back
//! by Refine, Transfer, and callers. The store is keyed by activity id, so
//! writes from different activities never collide.

use crate::activity::ActivityId;
use crate::errors::Result;
use crate::stages::Record;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One unit of refined data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// The activity that produced or refined the entity. A non-owning
    /// back-reference, not an ownership relation.
    pub activity_id: ActivityId,
    /// Logical grouping key.
    pub identifier: String,
    /// Stage-produced payload, opaque to the core.
    pub payload: Value,
}

impl Entity {
    /// Creates a new entity.
    #[must_use]
    pub fn new(activity_id: ActivityId, identifier: impl Into<String>, payload: Value) -> Self {
        Self {
            activity_id,
            identifier: identifier.into(),
            payload,
        }
    }
}

/// Repository contract for [`Entity`] records.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Inserts or overwrites the entity for `(activity_id, identifier)`.
    async fn put(&self, activity_id: ActivityId, identifier: &str, payload: Value) -> Result<()>;

    /// Inserts or overwrites a batch of records for an activity.
    async fn put_many(&self, activity_id: ActivityId, records: Vec<Record>) -> Result<()> {
        for record in records {
            self.put(activity_id, &record.identifier, record.payload)
                .await?;
        }
        Ok(())
    }

    /// Returns all data for an activity as identifier -> payload.
    async fn get_all_by_activity_grouped_by_identifier(
        &self,
        activity_id: ActivityId,
    ) -> Result<BTreeMap<String, Value>>;
}

/// In-memory [`EntityRepository`] backed by a concurrent map keyed by
/// activity id. Intended for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryEntityRepository {
    by_activity: DashMap<ActivityId, BTreeMap<String, Value>>,
}

impl MemoryEntityRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entities stored for an activity.
    #[must_use]
    pub fn count_for(&self, activity_id: ActivityId) -> usize {
        self.by_activity
            .get(&activity_id)
            .map_or(0, |group| group.len())
    }
}

#[async_trait]
impl EntityRepository for MemoryEntityRepository {
    async fn put(&self, activity_id: ActivityId, identifier: &str, payload: Value) -> Result<()> {
        self.by_activity
            .entry(activity_id)
            .or_default()
            .insert(identifier.to_string(), payload);
        Ok(())
    }

    async fn get_all_by_activity_grouped_by_identifier(
        &self,
        activity_id: ActivityId,
    ) -> Result<BTreeMap<String, Value>> {
        Ok(self
            .by_activity
            .get(&activity_id)
            .map(|group| group.clone())
            .unwrap_or_default())
    }
}
