//! # Error Types
//!
//! Typed errors for the entity merge store. Extraction and comparison never
//! error: malformed signals degrade to absence. The only hard failure in the
//! core is an invariant violation in the store, which indicates an engine bug
//! rather than bad input.

use crate::model::{AdapterRecordRef, EntityId, EntityKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A merge would leave the store in a state where some record belongs to
    /// more than one entity, or the partition itself is malformed. This is a
    /// programming-error assertion: the call aborts before any mutation and
    /// the store is left unchanged.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A partition of one entity kind was applied to a store of another.
    #[error("entity kind mismatch: store holds {store} entities, partition is for {partition}")]
    KindMismatch {
        store: EntityKind,
        partition: EntityKind,
    },

    /// The referenced entity does not exist.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    /// A split referenced a record that is not a member of the entity.
    #[error("record {reference} is not a member of entity {entity}")]
    NotAMember {
        entity: EntityId,
        reference: AdapterRecordRef,
    },

    /// A split listed no records to move.
    #[error("split of entity {0} listed no records")]
    EmptySplit(EntityId),
}
