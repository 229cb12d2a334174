//! Shared helpers for integration tests and benchmarks. Included from
//! `tests/` and `benches/` via `#[path]`; not part of the library itself.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use correlink::{AdapterRecord, EntityKind, SignalKind, SignalValue};

#[allow(dead_code)]
pub const PLUGINS: [&str; 5] = [
    "aws_adapter_0",
    "ad_adapter_0",
    "sccm_adapter_0",
    "esx_adapter_0",
    "crowdstrike_adapter_0",
];

#[allow(dead_code)]
pub fn device(plugin: &str, local_id: &str) -> AdapterRecord {
    AdapterRecord::new(plugin, local_id, EntityKind::Device)
}

#[allow(dead_code)]
pub fn user(plugin: &str, local_id: &str) -> AdapterRecord {
    AdapterRecord::new(plugin, local_id, EntityKind::User)
}

/// Generate a synthetic device population.
///
/// With probability `overlap_probability` a record reuses one of a small
/// pool of shared MACs/serials (so it will correlate with other records of
/// the same pool slot); otherwise its signals are unique to it.
#[allow(dead_code)]
pub fn generate_devices(count: u32, overlap_probability: f64, seed: u64) -> Vec<AdapterRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut records = Vec::with_capacity(count as usize);

    let pool_size = (count / 10).max(1);
    for i in 0..count {
        let plugin = PLUGINS[rng.random_range(0..PLUGINS.len())];
        let local_id = format!("{}_{:06}", plugin, i);
        let mut record = AdapterRecord::new(plugin, local_id, EntityKind::Device);

        if rng.random_bool(overlap_probability) {
            let slot = rng.random_range(0..pool_size);
            record = record
                .with_signal(
                    SignalKind::MacAddresses,
                    SignalValue::text_set([format!("02:00:00:{:02x}:{:02x}:{:02x}",
                        (slot >> 16) & 0xff, (slot >> 8) & 0xff, slot & 0xff)]),
                )
                .with_signal(
                    SignalKind::DeviceSerial,
                    SignalValue::text(format!("POOL-SER-{slot:06}")),
                );
        } else {
            record = record
                .with_signal(
                    SignalKind::MacAddresses,
                    SignalValue::text_set([format!("0a:00:{:02x}:{:02x}:{:02x}:{:02x}",
                        (i >> 24) & 0xff, (i >> 16) & 0xff, (i >> 8) & 0xff, i & 0xff)]),
                )
                .with_signal(
                    SignalKind::DeviceSerial,
                    SignalValue::text(format!("UNIQ-SER-{i:06}")),
                );
        }

        // A slice of the population also reports a hostname and address.
        if rng.random_bool(0.5) {
            record = record
                .with_signal(
                    SignalKind::Hostname,
                    SignalValue::text(format!("host-{:04}", i % 500)),
                )
                .with_signal(
                    SignalKind::IpAddresses,
                    SignalValue::text_set([format!("10.{}.{}.{}", (i >> 16) & 0xff, (i >> 8) & 0xff, (i % 253) + 1)]),
                );
        }

        records.push(record);
    }

    records
}

/// Generate a synthetic user population with mail overlap.
#[allow(dead_code)]
pub fn generate_users(count: u32, overlap_probability: f64, seed: u64) -> Vec<AdapterRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut records = Vec::with_capacity(count as usize);

    let pool_size = (count / 10).max(1);
    for i in 0..count {
        let plugin = PLUGINS[rng.random_range(0..PLUGINS.len())];
        let local_id = format!("{}_u{:06}", plugin, i);
        let mail = if rng.random_bool(overlap_probability) {
            format!("shared.user{}@example.com", rng.random_range(0..pool_size))
        } else {
            format!("user{i:06}@example.com")
        };
        records.push(
            AdapterRecord::new(plugin, local_id, EntityKind::User)
                .with_signal(SignalKind::NormalizedMail, SignalValue::text(mail)),
        );
    }

    records
}
