#[path = "../src/test_support.rs"]
mod test_support;

use correlink::{CorrelationConfig, Correlator, EntityKind};
use test_support::{generate_devices, generate_users};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn reapplying_a_cycle_is_idempotent() -> anyhow::Result<()> {
    init_tracing();
    let correlator = Correlator::new(CorrelationConfig::new());
    let population = generate_devices(500, 0.25, 7);

    let first = correlator.correlate_cycle(EntityKind::Device, &population)?;
    let entities_after_first = correlator.entities(EntityKind::Device);

    let second = correlator.correlate_cycle(EntityKind::Device, &population)?;
    let entities_after_second = correlator.entities(EntityKind::Device);

    assert_eq!(first.groups, second.groups);
    assert!(second.outcome.is_noop(), "second apply must change nothing");
    assert_eq!(entities_after_first, entities_after_second);
    Ok(())
}

#[test]
fn rerun_records_no_duplicate_audit_edges() -> anyhow::Result<()> {
    let correlator = Correlator::new(CorrelationConfig::new());
    let population = generate_devices(200, 0.5, 21);

    correlator.correlate_cycle(EntityKind::Device, &population)?;
    let edges_first: usize = correlator
        .entities(EntityKind::Device)
        .iter()
        .map(|entity| entity.edges.len())
        .sum();

    correlator.correlate_cycle(EntityKind::Device, &population)?;
    let edges_second: usize = correlator
        .entities(EntityKind::Device)
        .iter()
        .map(|entity| entity.edges.len())
        .sum();

    assert_eq!(edges_first, edges_second);
    Ok(())
}

#[test]
fn device_and_user_cycles_are_independent() -> anyhow::Result<()> {
    let correlator = Correlator::new(CorrelationConfig::new());
    let devices = generate_devices(100, 0.3, 3);
    let users = generate_users(100, 0.3, 3);

    correlator.correlate_cycle(EntityKind::Device, &devices)?;
    correlator.correlate_cycle(EntityKind::User, &users)?;

    let device_count = correlator.entity_count(EntityKind::Device);
    let user_count = correlator.entity_count(EntityKind::User);
    assert!(device_count > 0);
    assert!(user_count > 0);

    // Re-running one kind leaves the other untouched.
    let users_before = correlator.entities(EntityKind::User);
    correlator.correlate_cycle(EntityKind::Device, &devices)?;
    assert_eq!(users_before, correlator.entities(EntityKind::User));
    Ok(())
}

#[test]
fn every_snapshot_record_lands_in_exactly_one_entity() -> anyhow::Result<()> {
    let correlator = Correlator::new(CorrelationConfig::new());
    let population = generate_devices(300, 0.4, 11);
    correlator.correlate_cycle(EntityKind::Device, &population)?;

    let entities = correlator.entities(EntityKind::Device);
    let mut seen = std::collections::BTreeSet::new();
    for entity in &entities {
        for member in &entity.members {
            assert!(seen.insert(member.clone()), "{member} appears twice");
        }
    }

    for record in &population {
        assert!(
            seen.contains(&record.reference),
            "{} missing from every entity",
            record.reference
        );
    }
    Ok(())
}
