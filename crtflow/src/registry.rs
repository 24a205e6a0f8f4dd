//! Stage registry: maps a type name to one plugin per stage kind.
//!
//! The registry is assembled once at startup through
//! [`StageRegistryBuilder`] and is immutable afterwards, so concurrent
//! lookups need no synchronization. Components receive it by `Arc`
//! injection rather than through ambient global state.

use crate::errors::{CrtError, Result};
use crate::stages::{Collector, Refiner, Transferor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The three pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Fetches raw data from a source.
    Collect,
    /// Reworks collected data into its refined shape.
    Refine,
    /// Pushes refined data to an external destination.
    Transfer,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collect => write!(f, "collect"),
            Self::Refine => write!(f, "refine"),
            Self::Transfer => write!(f, "transfer"),
        }
    }
}

/// Immutable lookup table from `(stage kind, type name)` to plugin.
#[derive(Debug, Default)]
pub struct StageRegistry {
    collectors: BTreeMap<String, Arc<dyn Collector>>,
    refiners: BTreeMap<String, Arc<dyn Refiner>>,
    transferors: BTreeMap<String, Arc<dyn Transferor>>,
}

impl StageRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> StageRegistryBuilder {
        StageRegistryBuilder::default()
    }

    /// Resolves the collector registered for a type.
    ///
    /// # Errors
    ///
    /// Returns [`CrtError::UnknownType`] when no collector is registered.
    pub fn collector(&self, type_name: &str) -> Result<Arc<dyn Collector>> {
        self.collectors
            .get(type_name)
            .cloned()
            .ok_or_else(|| CrtError::unknown_type(StageKind::Collect, type_name))
    }

    /// Resolves the refiner registered for a type.
    ///
    /// # Errors
    ///
    /// Returns [`CrtError::UnknownType`] when no refiner is registered.
    pub fn refiner(&self, type_name: &str) -> Result<Arc<dyn Refiner>> {
        self.refiners
            .get(type_name)
            .cloned()
            .ok_or_else(|| CrtError::unknown_type(StageKind::Refine, type_name))
    }

    /// Resolves the transferor registered for a type.
    ///
    /// # Errors
    ///
    /// Returns [`CrtError::UnknownType`] when no transferor is registered.
    pub fn transferor(&self, type_name: &str) -> Result<Arc<dyn Transferor>> {
        self.transferors
            .get(type_name)
            .cloned()
            .ok_or_else(|| CrtError::unknown_type(StageKind::Transfer, type_name))
    }

    /// Lists registered collector type names in order.
    #[must_use]
    pub fn collector_types(&self) -> Vec<String> {
        self.collectors.keys().cloned().collect()
    }

    /// Lists registered refiner type names in order.
    #[must_use]
    pub fn refiner_types(&self) -> Vec<String> {
        self.refiners.keys().cloned().collect()
    }

    /// Lists registered transferor type names in order.
    #[must_use]
    pub fn transferor_types(&self) -> Vec<String> {
        self.transferors.keys().cloned().collect()
    }

    /// Returns true if a plugin is registered for the pair.
    #[must_use]
    pub fn has_type(&self, kind: StageKind, type_name: &str) -> bool {
        match kind {
            StageKind::Collect => self.collectors.contains_key(type_name),
            StageKind::Refine => self.refiners.contains_key(type_name),
            StageKind::Transfer => self.transferors.contains_key(type_name),
        }
    }
}

/// Builder assembling a [`StageRegistry`] during startup.
///
/// Registering a second plugin for the same `(kind, name)` pair replaces
/// the first; registration order is otherwise irrelevant.
#[derive(Debug, Default)]
pub struct StageRegistryBuilder {
    registry: StageRegistry,
}

impl StageRegistryBuilder {
    /// Registers a collector for a type.
    #[must_use]
    pub fn collector(mut self, type_name: impl Into<String>, plugin: Arc<dyn Collector>) -> Self {
        self.registry.collectors.insert(type_name.into(), plugin);
        self
    }

    /// Registers a refiner for a type.
    #[must_use]
    pub fn refiner(mut self, type_name: impl Into<String>, plugin: Arc<dyn Refiner>) -> Self {
        self.registry.refiners.insert(type_name.into(), plugin);
        self
    }

    /// Registers a transferor for a type.
    #[must_use]
    pub fn transferor(mut self, type_name: impl Into<String>, plugin: Arc<dyn Transferor>) -> Self {
        self.registry.transferors.insert(type_name.into(), plugin);
        self
    }

    /// Finalizes the registry.
    #[must_use]
    pub fn build(self) -> Arc<StageRegistry> {
        Arc::new(self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingTransferor, StaticCollector, UppercaseRefiner};

    #[test]
    fn test_stage_kind_display() {
        assert_eq!(StageKind::Collect.to_string(), "collect");
        assert_eq!(StageKind::Refine.to_string(), "refine");
        assert_eq!(StageKind::Transfer.to_string(), "transfer");
    }

    #[test]
    fn test_resolve_registered_plugins() {
        let registry = StageRegistry::builder()
            .collector("orders", Arc::new(StaticCollector::empty()))
            .refiner("orders", Arc::new(UppercaseRefiner::new()))
            .transferor("orders", Arc::new(RecordingTransferor::new()))
            .build();

        assert!(registry.collector("orders").is_ok());
        assert!(registry.refiner("orders").is_ok());
        assert!(registry.transferor("orders").is_ok());
        assert!(registry.has_type(StageKind::Collect, "orders"));
        assert!(!registry.has_type(StageKind::Collect, "customers"));
    }

    #[test]
    fn test_resolve_unknown_type() {
        let registry = StageRegistry::builder().build();
        let err = registry.collector("orders").unwrap_err();
        assert!(matches!(
            err,
            CrtError::UnknownType { kind: StageKind::Collect, .. }
        ));
    }

    #[test]
    fn test_type_listings_are_ordered() {
        let registry = StageRegistry::builder()
            .collector("orders", Arc::new(StaticCollector::empty()))
            .collector("customers", Arc::new(StaticCollector::empty()))
            .collector("invoices", Arc::new(StaticCollector::empty()))
            .build();

        assert_eq!(
            registry.collector_types(),
            vec!["customers", "invoices", "orders"]
        );
        assert!(registry.refiner_types().is_empty());
    }
}
