//! # Correlation Reporting
//!
//! Turns correlation decisions into audit/justification records for the UI
//! and operational dashboards. Thin by design: the engine and store own all
//! semantics, this module only renders them.

use crate::engine::Partition;
use crate::model::Entity;
use crate::store::ApplyOutcome;
use anyhow::Result;
use std::fmt::Write as _;

/// Render a one-run summary suitable for an operational log line.
pub fn summarize_run(partition: &Partition, outcome: &ApplyOutcome) -> String {
    let singletons = partition
        .groups
        .iter()
        .filter(|group| group.len() == 1)
        .count();
    format!(
        "{} run: {} records in {} groups ({} singletons, {} edges); \
         {} entities created, {} merged, {} records added, {} edges recorded",
        partition.kind,
        partition.total_records(),
        partition.len(),
        singletons,
        partition.total_edges(),
        outcome.entities_created,
        outcome.entities_merged,
        outcome.records_added,
        outcome.edges_added,
    )
}

/// Render an entity's membership and the justification for its shape.
pub fn entity_audit(entity: &Entity) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({}, {} members)", entity.id, entity.kind, entity.len());
    for member in &entity.members {
        let _ = writeln!(out, "  member {member}");
    }
    for edge in &entity.edges {
        let _ = writeln!(out, "  edge {edge}");
    }
    out
}

/// Serialize entities for downstream consumers (GUI, reporting).
pub fn export_entities_json(entities: &[&Entity]) -> Result<String> {
    Ok(serde_json::to_string_pretty(entities)?)
}
