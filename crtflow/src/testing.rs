//! Mock stage plugins for testing.
//!
//! These are used by the crate's own tests and exported for downstream
//! plugin authors wiring up their first pipeline.

use crate::errors::PluginError;
use crate::registry::StageKind;
use crate::stages::{
    CollectOutcome, Collector, Record, RefineOutcome, Refiner, StageContext, TransferOutcome,
    Transferor,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;

/// A collector returning a fixed set of records on every call.
#[derive(Debug)]
pub struct StaticCollector {
    records: Vec<Record>,
    extra: Value,
    call_count: Mutex<usize>,
}

impl StaticCollector {
    /// Creates a collector returning the given records.
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            extra: Value::Null,
            call_count: Mutex::new(0),
        }
    }

    /// Creates a collector returning no records (but a `Records` outcome,
    /// not `Nothing`).
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Attaches plugin metadata returned alongside the records.
    #[must_use]
    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = extra;
        self
    }

    /// Returns the number of times the collector was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl Collector for StaticCollector {
    async fn collect(&self, _ctx: &StageContext) -> Result<CollectOutcome, PluginError> {
        *self.call_count.lock() += 1;
        Ok(CollectOutcome::records_with_extra(
            self.records.clone(),
            self.extra.clone(),
        ))
    }
}

/// A collector that always reports nothing to collect.
#[derive(Debug, Default)]
pub struct EmptyCollector;

impl EmptyCollector {
    /// Creates the collector.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Collector for EmptyCollector {
    async fn collect(&self, _ctx: &StageContext) -> Result<CollectOutcome, PluginError> {
        Ok(CollectOutcome::Nothing)
    }
}

/// A collector that always fails.
#[derive(Debug)]
pub struct FailingCollector {
    reason: String,
}

impl FailingCollector {
    /// Creates a collector failing with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Collector for FailingCollector {
    async fn collect(&self, ctx: &StageContext) -> Result<CollectOutcome, PluginError> {
        Err(PluginError::new(StageKind::Collect, &ctx.type_name, &self.reason)
            .with_activity(ctx.activity_id))
    }
}

/// A refiner that upper-cases every string payload and passes everything
/// else through unchanged.
#[derive(Debug, Default)]
pub struct UppercaseRefiner;

impl UppercaseRefiner {
    /// Creates the refiner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Refiner for UppercaseRefiner {
    async fn refine(
        &self,
        _ctx: &StageContext,
        entities: &BTreeMap<String, Value>,
    ) -> Result<RefineOutcome, PluginError> {
        let records = entities
            .iter()
            .map(|(identifier, payload)| {
                let refined = match payload {
                    Value::String(s) => Value::String(s.to_uppercase()),
                    other => other.clone(),
                };
                Record::new(identifier.clone(), refined)
            })
            .collect();
        Ok(RefineOutcome::records(records))
    }
}

/// A refiner that always fails.
#[derive(Debug)]
pub struct FailingRefiner {
    reason: String,
}

impl FailingRefiner {
    /// Creates a refiner failing with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Refiner for FailingRefiner {
    async fn refine(
        &self,
        ctx: &StageContext,
        _entities: &BTreeMap<String, Value>,
    ) -> Result<RefineOutcome, PluginError> {
        Err(PluginError::new(StageKind::Refine, &ctx.type_name, &self.reason)
            .with_activity(ctx.activity_id))
    }
}

/// A transferor that records every batch it receives.
#[derive(Debug, Default)]
pub struct RecordingTransferor {
    batches: Mutex<Vec<BTreeMap<String, Value>>>,
    extra: Value,
}

impl RecordingTransferor {
    /// Creates the transferor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches metadata returned on every transfer (e.g. fake remote ids).
    #[must_use]
    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = extra;
        self
    }

    /// Returns the batches transferred so far.
    #[must_use]
    pub fn batches(&self) -> Vec<BTreeMap<String, Value>> {
        self.batches.lock().clone()
    }

    /// Returns the number of transfer calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.batches.lock().len()
    }
}

#[async_trait]
impl Transferor for RecordingTransferor {
    async fn transfer(
        &self,
        _ctx: &StageContext,
        entities: &BTreeMap<String, Value>,
    ) -> Result<TransferOutcome, PluginError> {
        self.batches.lock().push(entities.clone());
        Ok(TransferOutcome::with_extra(self.extra.clone()))
    }
}

/// A transferor that always fails.
#[derive(Debug)]
pub struct FailingTransferor {
    reason: String,
}

impl FailingTransferor {
    /// Creates a transferor failing with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Transferor for FailingTransferor {
    async fn transfer(
        &self,
        ctx: &StageContext,
        _entities: &BTreeMap<String, Value>,
    ) -> Result<TransferOutcome, PluginError> {
        Err(PluginError::new(StageKind::Transfer, &ctx.type_name, &self.reason)
            .with_activity(ctx.activity_id))
    }
}
