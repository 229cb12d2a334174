//! # Entity Merge Store
//!
//! Applies correlation partitions against the persisted entities, enforcing
//! the structural invariants: every record belongs to exactly one entity, and
//! entities are exactly the connected components of recorded decisions.
//!
//! The store is the only stateful component; it owns convergence. Applying a
//! partition is idempotent (re-applying it against its own output is a no-op)
//! and commutative (merging {A,B} then {B,C} equals merging {A,B,C} at once).

use crate::engine::Partition;
use crate::error::StoreError;
use crate::model::{
    AdapterRecordRef, CorrelationEdge, Entity, EntityId, EntityKind, SignalFamily,
};
use hashbrown::HashMap;
use rustc_hash::FxHashSet;
use std::collections::BTreeSet;
use tracing::debug;

/// Summary of one `apply_partition` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Entities created for never-before-seen components.
    pub entities_created: usize,
    /// Pre-existing entities merged away into another entity.
    pub entities_merged: usize,
    /// Records newly attached to an entity.
    pub records_added: usize,
    /// Audit edges newly recorded.
    pub edges_added: usize,
}

impl ApplyOutcome {
    /// True when the call changed nothing (the partition was already fully
    /// applied).
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Abstract persistence for merged entities.
///
/// The correlation engine only ever sees this contract, not a concrete
/// database. Implementations must keep the invariants of [`Entity`]: merges
/// are all-or-nothing, and a failed call leaves the store unchanged.
pub trait EntityStore: Send + std::fmt::Debug {
    /// The single entity kind this store holds. Device and user stores are
    /// disjoint by construction.
    fn kind(&self) -> EntityKind;

    /// The entity currently owning a record, if any.
    fn entity_of(&self, reference: &AdapterRecordRef) -> Option<EntityId>;

    fn entity(&self, id: EntityId) -> Option<&Entity>;

    /// All entities, ordered by id.
    fn entities(&self) -> Vec<&Entity>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply a correlation partition: create entities for unseen components,
    /// adopt new records, and merge entities bridged by a component.
    fn apply_partition(&mut self, partition: &Partition) -> Result<ApplyOutcome, StoreError>;

    /// Administrative un-merge: move the given records out of an entity into
    /// a new standalone entity. Never invoked by the automatic engine.
    fn split(
        &mut self,
        entity: EntityId,
        references: &[AdapterRecordRef],
    ) -> Result<EntityId, StoreError>;
}

/// In-memory reference implementation of [`EntityStore`].
#[derive(Debug, Clone)]
pub struct MemoryStore {
    kind: EntityKind,
    entities: HashMap<EntityId, Entity>,
    member_index: HashMap<AdapterRecordRef, EntityId>,
    next_entity_id: u64,
}

impl MemoryStore {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            entities: HashMap::new(),
            member_index: HashMap::new(),
            next_entity_id: 0,
        }
    }

    /// Verify the structural invariants: every member of every entity is
    /// indexed back to exactly that entity, and no record appears twice.
    pub fn check_invariants(&self) -> Result<(), StoreError> {
        Self::check_staged(&self.entities, &self.member_index)
    }

    fn check_staged(
        entities: &HashMap<EntityId, Entity>,
        member_index: &HashMap<AdapterRecordRef, EntityId>,
    ) -> Result<(), StoreError> {
        let mut seen: FxHashSet<&AdapterRecordRef> = FxHashSet::default();
        for entity in entities.values() {
            for member in &entity.members {
                if !seen.insert(member) {
                    return Err(StoreError::InvariantViolation(format!(
                        "record {member} belongs to more than one entity"
                    )));
                }
                match member_index.get(member) {
                    Some(owner) if *owner == entity.id => {}
                    Some(owner) => {
                        return Err(StoreError::InvariantViolation(format!(
                            "record {member} indexed to {owner} but held by {}",
                            entity.id
                        )))
                    }
                    None => {
                        return Err(StoreError::InvariantViolation(format!(
                            "record {member} held by {} but missing from the index",
                            entity.id
                        )))
                    }
                }
            }
        }
        if seen.len() != member_index.len() {
            return Err(StoreError::InvariantViolation(format!(
                "index holds {} records but entities hold {}",
                member_index.len(),
                seen.len()
            )));
        }
        Ok(())
    }

    /// Reject partitions that would structurally violate the one-entity-per-
    /// record invariant before anything is mutated.
    fn validate_partition(&self, partition: &Partition) -> Result<(), StoreError> {
        if partition.kind != self.kind {
            return Err(StoreError::KindMismatch {
                store: self.kind,
                partition: partition.kind,
            });
        }

        let mut seen: FxHashSet<&AdapterRecordRef> = FxHashSet::default();
        for group in &partition.groups {
            if group.members.is_empty() {
                return Err(StoreError::InvariantViolation(
                    "partition contains an empty group".to_string(),
                ));
            }
            for member in &group.members {
                if !seen.insert(member) {
                    return Err(StoreError::InvariantViolation(format!(
                        "record {member} appears in more than one partition group"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Append edges to an entity, deduplicated by `(a, b, family)`.
fn push_edges(entity: &mut Entity, edges: &[CorrelationEdge], edges_added: &mut usize) {
    let mut known: FxHashSet<(AdapterRecordRef, AdapterRecordRef, SignalFamily)> = entity
        .edges
        .iter()
        .map(|edge| (edge.a.clone(), edge.b.clone(), edge.family()))
        .collect();

    for edge in edges {
        let key = (edge.a.clone(), edge.b.clone(), edge.family());
        if known.insert(key) {
            entity.edges.push(edge.clone());
            *edges_added += 1;
        }
    }
}

impl EntityStore for MemoryStore {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    fn entity_of(&self, reference: &AdapterRecordRef) -> Option<EntityId> {
        self.member_index.get(reference).copied()
    }

    fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    fn entities(&self) -> Vec<&Entity> {
        let mut all: Vec<&Entity> = self.entities.values().collect();
        all.sort_by_key(|entity| entity.id);
        all
    }

    fn len(&self) -> usize {
        self.entities.len()
    }

    fn apply_partition(&mut self, partition: &Partition) -> Result<ApplyOutcome, StoreError> {
        self.validate_partition(partition)?;

        // Stage the whole mutation; commit only after the invariant check so
        // a failing call leaves the store unchanged.
        let mut entities = self.entities.clone();
        let mut member_index = self.member_index.clone();
        let mut next_entity_id = self.next_entity_id;
        let mut outcome = ApplyOutcome::default();

        for group in &partition.groups {
            let existing: BTreeSet<EntityId> = group
                .members
                .iter()
                .filter_map(|member| member_index.get(member).copied())
                .collect();

            let target_id = match existing.iter().next() {
                None => {
                    let id = EntityId(next_entity_id);
                    next_entity_id += 1;
                    entities.insert(id, Entity::new(id, partition.kind));
                    outcome.entities_created += 1;
                    id
                }
                Some(&lowest) => lowest,
            };

            // Merge every other intersecting entity into the target,
            // re-pointing its members. Carried-over edges are moved, not
            // newly recorded, so they do not count toward `edges_added`.
            for &other_id in existing.iter().skip(1) {
                let other = entities
                    .remove(&other_id)
                    .expect("indexed entity must exist");
                debug!(from = %other_id, into = %target_id, "merging entities bridged by component");
                let target = entities.get_mut(&target_id).expect("target must exist");
                for member in other.members {
                    member_index.insert(member.clone(), target_id);
                    target.members.push(member);
                }
                let mut moved_edges = 0;
                push_edges(target, &other.edges, &mut moved_edges);
                outcome.entities_merged += 1;
            }

            // Adopt records seen for the first time, in component order.
            let target = entities.get_mut(&target_id).expect("target must exist");
            for member in &group.members {
                if !member_index.contains_key(member) {
                    member_index.insert(member.clone(), target_id);
                    target.members.push(member.clone());
                    outcome.records_added += 1;
                }
            }
            push_edges(target, &group.edges, &mut outcome.edges_added);
        }

        Self::check_staged(&entities, &member_index)?;

        self.entities = entities;
        self.member_index = member_index;
        self.next_entity_id = next_entity_id;
        Ok(outcome)
    }

    fn split(
        &mut self,
        entity_id: EntityId,
        references: &[AdapterRecordRef],
    ) -> Result<EntityId, StoreError> {
        let entity = self
            .entities
            .get(&entity_id)
            .ok_or(StoreError::UnknownEntity(entity_id))?;

        let moved: BTreeSet<&AdapterRecordRef> = references.iter().collect();
        if moved.is_empty() {
            return Err(StoreError::EmptySplit(entity_id));
        }
        for reference in &moved {
            if !entity.contains(reference) {
                return Err(StoreError::NotAMember {
                    entity: entity_id,
                    reference: (*reference).clone(),
                });
            }
        }

        let new_id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;

        let entity = self
            .entities
            .get_mut(&entity_id)
            .expect("checked above");
        let mut new_entity = Entity::new(new_id, entity.kind);

        // Move members, preserving their original order on both sides.
        let (moved_members, kept_members): (Vec<_>, Vec<_>) = entity
            .members
            .drain(..)
            .partition(|member| moved.contains(member));
        entity.members = kept_members;
        new_entity.members = moved_members;

        // Edges fully inside the moved set travel with it; edges crossing
        // the boundary justified a link that no longer exists and are
        // dropped. The remaining members' internal edges are untouched.
        let mut dropped = 0usize;
        let (moved_edges, rest): (Vec<_>, Vec<_>) = entity
            .edges
            .drain(..)
            .partition(|edge| moved.contains(&edge.a) && moved.contains(&edge.b));
        entity.edges = rest
            .into_iter()
            .filter(|edge| {
                let crosses = moved.contains(&edge.a) || moved.contains(&edge.b);
                if crosses {
                    dropped += 1;
                }
                !crosses
            })
            .collect();
        new_entity.edges = moved_edges;
        if dropped > 0 {
            debug!(entity = %entity_id, dropped, "dropped boundary edges during split");
        }

        for member in &new_entity.members {
            self.member_index.insert(member.clone(), new_id);
        }
        if self.entities.get(&entity_id).is_some_and(Entity::is_empty) {
            self.entities.remove(&entity_id);
        }
        self.entities.insert(new_id, new_entity);
        Ok(new_id)
    }
}
