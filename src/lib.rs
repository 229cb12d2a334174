//! # Correlink
//!
//! A deterministic, explainable entity correlation engine for device/user
//! inventory aggregation.
//!
//! Adapter integrations feed per-connection records into the engine; the
//! engine decides which records describe the same real-world device or user
//! and merges them into one logical entity, attaching an audit reason to
//! every link it makes.

pub mod compare;
pub mod config;
pub mod dsu;
pub mod engine;
pub mod error;
pub mod extract;
pub mod model;
pub mod report;
pub mod store;

// Re-export main types for convenience
pub use config::{CorrelationConfig, FamilyToggles};
pub use engine::{correlate, CorrelationGroup, Partition};
pub use error::StoreError;
pub use model::{
    AdapterRecord, AdapterRecordRef, CorrelationEdge, CorrelationReason, Entity, EntityId,
    EntityKind, SignalFamily, SignalKind, SignalValue,
};
pub use store::{ApplyOutcome, EntityStore, MemoryStore};

use parking_lot::Mutex;

/// Result of one discovery-cycle correlation for one entity kind.
#[derive(Debug, Clone, Copy)]
pub struct CycleOutcome {
    pub kind: EntityKind,
    /// Number of equivalence groups in the run's partition.
    pub groups: usize,
    /// Number of snapshot records that participated in the run.
    pub records: usize,
    /// What applying the partition changed in the store.
    pub outcome: ApplyOutcome,
}

/// Main API for entity correlation.
///
/// Owns one entity store per kind. The correlation run itself is a pure
/// computation over the snapshot; only `apply_partition` touches shared
/// state, and it is serialized per kind behind a mutex. Device and user
/// cycles never share entities and may run in parallel.
pub struct Correlator {
    config: CorrelationConfig,
    devices: Mutex<Box<dyn EntityStore>>,
    users: Mutex<Box<dyn EntityStore>>,
}

impl Correlator {
    /// Create a correlator backed by in-memory stores.
    pub fn new(config: CorrelationConfig) -> Self {
        Self {
            config,
            devices: Mutex::new(Box::new(MemoryStore::new(EntityKind::Device))),
            users: Mutex::new(Box::new(MemoryStore::new(EntityKind::User))),
        }
    }

    /// Create a correlator with custom store implementations.
    pub fn with_stores(
        config: CorrelationConfig,
        devices: Box<dyn EntityStore>,
        users: Box<dyn EntityStore>,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            devices.kind() == EntityKind::Device,
            "device store holds {} entities",
            devices.kind()
        );
        anyhow::ensure!(
            users.kind() == EntityKind::User,
            "user store holds {} entities",
            users.kind()
        );
        Ok(Self {
            config,
            devices: Mutex::new(devices),
            users: Mutex::new(users),
        })
    }

    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    fn store_for(&self, kind: EntityKind) -> &Mutex<Box<dyn EntityStore>> {
        match kind {
            EntityKind::Device => &self.devices,
            EntityKind::User => &self.users,
        }
    }

    /// Run one correlation cycle over a snapshot of one kind's records and
    /// apply the resulting partition.
    ///
    /// The partition is computed outside the store lock; applying it is
    /// serialized per kind so two concurrent cycles cannot interleave their
    /// merges.
    pub fn correlate_cycle(
        &self,
        kind: EntityKind,
        records: &[AdapterRecord],
    ) -> anyhow::Result<CycleOutcome> {
        let partition = engine::correlate(kind, records, &self.config);
        let groups = partition.len();
        let participating = partition.total_records();

        let mut store = self.store_for(kind).lock();
        let outcome = store.apply_partition(&partition)?;
        Ok(CycleOutcome {
            kind,
            groups,
            records: participating,
            outcome,
        })
    }

    /// Snapshot of all entities of a kind, ordered by id.
    pub fn entities(&self, kind: EntityKind) -> Vec<Entity> {
        let store = self.store_for(kind).lock();
        store.entities().into_iter().cloned().collect()
    }

    /// Number of entities of a kind.
    pub fn entity_count(&self, kind: EntityKind) -> usize {
        self.store_for(kind).lock().len()
    }

    /// The entity currently owning a record, if any.
    pub fn entity_of(&self, kind: EntityKind, reference: &AdapterRecordRef) -> Option<EntityId> {
        self.store_for(kind).lock().entity_of(reference)
    }

    /// Administrative un-merge; see [`EntityStore::split`].
    pub fn split(
        &self,
        kind: EntityKind,
        entity: EntityId,
        references: &[AdapterRecordRef],
    ) -> anyhow::Result<EntityId> {
        let mut store = self.store_for(kind).lock();
        Ok(store.split(entity, references)?)
    }
}
