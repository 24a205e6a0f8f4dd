//! Stage plugin contracts.
//!
//! Each pipeline type registers one plugin per stage kind. Plugins receive
//! a [`StageContext`] and return an outcome; entity persistence is
//! executor-mediated, so plugins never touch the stores directly.

use crate::activity::ActivityId;
use crate::errors::PluginError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Context handed to every stage plugin invocation.
#[derive(Debug, Clone)]
pub struct StageContext {
    /// The pipeline type name being executed.
    pub type_name: String,
    /// The activity the invocation belongs to.
    pub activity_id: ActivityId,
    /// The activity's extra data at invocation time.
    pub extra: Value,
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(type_name: impl Into<String>, activity_id: ActivityId, extra: Value) -> Self {
        Self {
            type_name: type_name.into(),
            activity_id,
            extra,
        }
    }
}

/// One unit of data produced by a Collect or Refine plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Logical grouping key (e.g. an external id).
    pub identifier: String,
    /// Stage-produced payload, opaque to the core.
    pub payload: Value,
}

impl Record {
    /// Creates a new record.
    #[must_use]
    pub fn new(identifier: impl Into<String>, payload: Value) -> Self {
        Self {
            identifier: identifier.into(),
            payload,
        }
    }
}

/// Result of a Collect plugin invocation.
#[derive(Debug, Clone)]
pub enum CollectOutcome {
    /// Raw data was fetched.
    Records {
        /// The collected records, persisted by the executor under the
        /// activity id.
        records: Vec<Record>,
        /// Plugin-produced metadata merged into the activity.
        extra: Value,
    },
    /// The source had nothing to collect; no result payload is produced.
    Nothing,
}

impl CollectOutcome {
    /// Creates an outcome carrying records and no extra metadata.
    #[must_use]
    pub fn records(records: Vec<Record>) -> Self {
        Self::Records {
            records,
            extra: Value::Null,
        }
    }

    /// Creates an outcome carrying records and plugin metadata.
    #[must_use]
    pub fn records_with_extra(records: Vec<Record>, extra: Value) -> Self {
        Self::Records { records, extra }
    }
}

/// Result of a Refine plugin invocation.
#[derive(Debug, Clone)]
pub struct RefineOutcome {
    /// Refined records, written back per identifier by the executor.
    pub records: Vec<Record>,
    /// Plugin-produced metadata merged into the activity.
    pub extra: Value,
}

impl RefineOutcome {
    /// Creates an outcome carrying refined records.
    #[must_use]
    pub fn records(records: Vec<Record>) -> Self {
        Self {
            records,
            extra: Value::Null,
        }
    }

    /// Attaches plugin metadata.
    #[must_use]
    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = extra;
        self
    }
}

/// Result of a Transfer plugin invocation.
///
/// Transfer produces no records; outcomes such as remote ids travel in
/// `extra` and end up on the activity.
#[derive(Debug, Clone, Default)]
pub struct TransferOutcome {
    /// Plugin-produced metadata merged into the activity.
    pub extra: Value,
}

impl TransferOutcome {
    /// Creates an empty outcome.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an outcome carrying metadata.
    #[must_use]
    pub fn with_extra(extra: Value) -> Self {
        Self { extra }
    }
}

/// A plugin that fetches raw data for a type.
#[async_trait]
pub trait Collector: Send + Sync + Debug {
    /// Fetches raw data for the context's type.
    async fn collect(&self, ctx: &StageContext) -> Result<CollectOutcome, PluginError>;
}

/// A plugin that refines previously collected data.
#[async_trait]
pub trait Refiner: Send + Sync + Debug {
    /// Refines the entities collected under the context's activity,
    /// supplied as identifier -> payload.
    async fn refine(
        &self,
        ctx: &StageContext,
        entities: &BTreeMap<String, Value>,
    ) -> Result<RefineOutcome, PluginError>;
}

/// A plugin that pushes refined data to an external destination.
#[async_trait]
pub trait Transferor: Send + Sync + Debug {
    /// Transfers the refined entities of the context's activity.
    async fn transfer(
        &self,
        ctx: &StageContext,
        entities: &BTreeMap<String, Value>,
    ) -> Result<TransferOutcome, PluginError>;
}
