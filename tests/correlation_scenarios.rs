//! End-to-end correlation scenarios exercising the full extract -> compare ->
//! engine -> store pipeline through the public facade.

#[path = "../src/test_support.rs"]
mod test_support;

use correlink::{
    CorrelationConfig, Correlator, EntityKind, SignalFamily, SignalKind, SignalValue,
};
use test_support::{device, user};

#[test]
fn same_mac_different_adapters_one_entity() -> anyhow::Result<()> {
    let correlator = Correlator::new(CorrelationConfig::new());
    let records = vec![
        device("aws_adapter_0", "i-1")
            .with_signal(
                SignalKind::MacAddresses,
                SignalValue::text_set(["aa:bb:cc:dd:ee:ff"]),
            )
            .with_signal(SignalKind::Hostname, SignalValue::text("cloud-host")),
        device("sccm_adapter_0", "host-2")
            .with_signal(
                SignalKind::MacAddresses,
                SignalValue::text_set(["AA:BB:CC:DD:EE:FF"]),
            )
            .with_signal(SignalKind::Hostname, SignalValue::text("lan-host")),
    ];

    correlator.correlate_cycle(EntityKind::Device, &records)?;

    let entities = correlator.entities(EntityKind::Device);
    assert_eq!(entities.len(), 1);
    let entity = &entities[0];
    assert_eq!(entity.members.len(), 2);
    assert_eq!(entity.edges.len(), 1);
    assert_eq!(entity.edges[0].family(), SignalFamily::MacAddress);
    assert_eq!(entity.edges[0].reason.matched, "aabbccddeeff");
    Ok(())
}

#[test]
fn transitive_chain_links_records_that_never_directly_match() -> anyhow::Result<()> {
    let correlator = Correlator::new(CorrelationConfig::new());
    let records = vec![
        device("aws_adapter_0", "a").with_signal(
            SignalKind::MacAddresses,
            SignalValue::text_set(["02:42:ac:11:00:02"]),
        ),
        device("sccm_adapter_0", "b")
            .with_signal(
                SignalKind::MacAddresses,
                SignalValue::text_set(["02:42:ac:11:00:02"]),
            )
            .with_signal(SignalKind::DeviceSerial, SignalValue::text("C02ZK1AB")),
        device("esx_adapter_0", "c")
            .with_signal(SignalKind::DeviceSerial, SignalValue::text("C02ZK1AB")),
    ];

    correlator.correlate_cycle(EntityKind::Device, &records)?;

    let entities = correlator.entities(EntityKind::Device);
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].members.len(), 3);
    // a and c are linked only through b; no direct a<->c edge is required.
    Ok(())
}

#[test]
fn placeholder_serial_never_merges() -> anyhow::Result<()> {
    let correlator = Correlator::new(CorrelationConfig::new());
    let records = vec![
        device("aws_adapter_0", "vm-1")
            .with_signal(SignalKind::DeviceSerial, SignalValue::text("0")),
        device("esx_adapter_0", "vm-2")
            .with_signal(SignalKind::DeviceSerial, SignalValue::text("0")),
    ];

    correlator.correlate_cycle(EntityKind::Device, &records)?;
    assert_eq!(correlator.entity_count(EntityKind::Device), 2);
    Ok(())
}

#[test]
fn mail_and_principal_match_case_insensitively() -> anyhow::Result<()> {
    let correlator = Correlator::new(CorrelationConfig::new());
    let records = vec![
        user("exchange_adapter_0", "mb-1").with_signal(
            SignalKind::NormalizedMail,
            SignalValue::text("John.Doe@Example.com"),
        ),
        user("ad_adapter_0", "u-1").with_signal(
            SignalKind::AdUserPrincipalName,
            SignalValue::text("john.doe@example.com"),
        ),
    ];

    correlator.correlate_cycle(EntityKind::User, &records)?;

    let entities = correlator.entities(EntityKind::User);
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].edges[0].family(), SignalFamily::NormalizedMail);
    Ok(())
}

#[test]
fn identical_population_twice_yields_identical_entities() -> anyhow::Result<()> {
    let correlator = Correlator::new(CorrelationConfig::new());
    let records = vec![
        device("aws_adapter_0", "a").with_signal(
            SignalKind::MacAddresses,
            SignalValue::text_set(["aa:bb:cc:dd:ee:01"]),
        ),
        device("sccm_adapter_0", "b").with_signal(
            SignalKind::MacAddresses,
            SignalValue::text_set(["aa:bb:cc:dd:ee:01"]),
        ),
    ];

    correlator.correlate_cycle(EntityKind::Device, &records)?;
    let first = correlator.entities(EntityKind::Device);
    let outcome = correlator.correlate_cycle(EntityKind::Device, &records)?;
    let second = correlator.entities(EntityKind::Device);

    assert_eq!(first, second);
    assert!(outcome.outcome.is_noop());
    assert_eq!(second[0].edges.len(), 1, "no duplicate audit edges");
    Ok(())
}

#[test]
fn device_and_user_with_same_mail_never_merge() -> anyhow::Result<()> {
    let mut config = CorrelationConfig::new();
    // Even with the mail family force-enabled for devices, kinds are
    // correlated in separate passes against separate stores.
    config
        .families_for_mut(EntityKind::Device)
        .set(SignalFamily::NormalizedMail, true);
    let correlator = Correlator::new(config);

    let device_record = device("mdm_adapter_0", "d-1").with_signal(
        SignalKind::NormalizedMail,
        SignalValue::text("john.doe@example.com"),
    );
    let user_record = user("ad_adapter_0", "u-1").with_signal(
        SignalKind::NormalizedMail,
        SignalValue::text("john.doe@example.com"),
    );

    correlator.correlate_cycle(EntityKind::Device, &[device_record.clone(), user_record.clone()])?;
    correlator.correlate_cycle(EntityKind::User, &[device_record, user_record])?;

    assert_eq!(correlator.entity_count(EntityKind::Device), 1);
    assert_eq!(correlator.entity_count(EntityKind::User), 1);
    let device_entity = &correlator.entities(EntityKind::Device)[0];
    let user_entity = &correlator.entities(EntityKind::User)[0];
    assert_eq!(device_entity.members.len(), 1);
    assert_eq!(user_entity.members.len(), 1);
    assert_ne!(device_entity.members, user_entity.members);
    Ok(())
}

#[test]
fn record_with_no_shared_signals_stays_a_singleton() -> anyhow::Result<()> {
    let correlator = Correlator::new(CorrelationConfig::new());
    let records = vec![
        device("aws_adapter_0", "a")
            .with_signal(SignalKind::DeviceSerial, SignalValue::text("SER-A")),
        device("sccm_adapter_0", "b")
            .with_signal(SignalKind::DeviceSerial, SignalValue::text("SER-B")),
        device("esx_adapter_0", "lonely"),
    ];

    correlator.correlate_cycle(EntityKind::Device, &records)?;

    assert_eq!(correlator.entity_count(EntityKind::Device), 3);
    let lonely = correlator
        .entity_of(
            EntityKind::Device,
            &correlink::AdapterRecordRef::new("esx_adapter_0", "lonely"),
        )
        .expect("singleton record still becomes an entity");
    let entities = correlator.entities(EntityKind::Device);
    let entity = entities.iter().find(|entity| entity.id == lonely).unwrap();
    assert_eq!(entity.members.len(), 1);
    assert!(entity.edges.is_empty());
    Ok(())
}
