//! # Correlation Engine
//!
//! The per-run matching/bucketing algorithm. Given a snapshot of one entity
//! kind's records, it applies comparator families under precondition filters,
//! unions confirmed pairs in a disjoint set, and emits the final partition
//! together with the audit edges that justify every link.
//!
//! The run is stateless: it works on an in-memory snapshot and produces a
//! pure partition decision. Persistence and convergence belong to the
//! [`crate::store`].

use crate::compare;
use crate::config::CorrelationConfig;
use crate::dsu::DisjointSet;
use crate::extract::ExtractedSignals;
use crate::model::{
    AdapterRecord, AdapterRecordRef, CorrelationEdge, CorrelationReason, EntityKind, RecordId,
    SignalFamily,
};
use hashbrown::HashMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use tracing::{debug, info, warn};

/// One equivalence group of the output partition.
///
/// A group of size 1 is an ordinary outcome: the record stands alone as its
/// own entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationGroup {
    /// Members ordered by per-run record id (snapshot order).
    pub members: Vec<AdapterRecordRef>,
    /// The confirmed pairs justifying this group, in family priority order.
    pub edges: Vec<CorrelationEdge>,
}

impl CorrelationGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// The final partition of one run: disjoint groups covering every snapshot
/// record of the kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub kind: EntityKind,
    pub groups: Vec<CorrelationGroup>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn total_records(&self) -> usize {
        self.groups.iter().map(CorrelationGroup::len).sum()
    }

    /// Total number of audit edges across all groups.
    pub fn total_edges(&self) -> usize {
        self.groups.iter().map(|group| group.edges.len()).sum()
    }
}

struct RunRecord {
    reference: AdapterRecordRef,
    signals: ExtractedSignals,
}

/// Pair key with the lower arena id first.
type PairKey = (u32, u32);

fn pair_key(a: usize, b: usize) -> PairKey {
    let (a, b) = (a as u32, b as u32);
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

struct RunState {
    dsu: DisjointSet,
    /// Accepted edges with arena ids, in acceptance order.
    edges: Vec<(PairKey, CorrelationReason)>,
    /// Pairs that already own a recorded reason (first family wins).
    seen_pairs: FxHashSet<PairKey>,
    /// Same-adapter pairs held back for multi-signal confirmation.
    suspicious: FxHashMap<PairKey, Vec<CorrelationReason>>,
}

/// Correlate one entity kind's snapshot into a partition.
///
/// Records of a different kind are excluded (never compared cross-kind), and
/// duplicate fetches of the same `(plugin_unique_name, local_id)` collapse to
/// the latest occurrence.
pub fn correlate(
    kind: EntityKind,
    records: &[AdapterRecord],
    config: &CorrelationConfig,
) -> Partition {
    let run_records = intake(kind, records, config);
    let mut state = RunState {
        dsu: DisjointSet::new(run_records.len()),
        edges: Vec::new(),
        seen_pairs: FxHashSet::default(),
        suspicious: FxHashMap::default(),
    };

    for family in config.families_for(kind).enabled_families() {
        if !run_records
            .iter()
            .any(|record| record.signals.has_family_signal(family))
        {
            info!(%kind, %family, "no usable signals in population, skipping family pass");
            continue;
        }
        run_family_pass(family, &run_records, &mut state);
    }

    resolve_suspicious_pairs(&run_records, &mut state);
    build_partition(kind, run_records, state)
}

fn intake(
    kind: EntityKind,
    records: &[AdapterRecord],
    config: &CorrelationConfig,
) -> Vec<RunRecord> {
    let mut by_ref: FxHashMap<AdapterRecordRef, usize> = FxHashMap::default();
    let mut run_records: Vec<RunRecord> = Vec::with_capacity(records.len());

    for record in records {
        if record.kind != kind {
            warn!(
                record = %record.reference,
                expected = %kind,
                actual = %record.kind,
                "excluding record of wrong entity kind from run"
            );
            continue;
        }
        let signals = ExtractedSignals::from_record(record, config);
        match by_ref.get(&record.reference) {
            Some(&index) => {
                // Duplicate fetch of literally the same thing; keep the
                // latest snapshot entry.
                debug!(record = %record.reference, "collapsing duplicate fetch");
                run_records[index].signals = signals;
            }
            None => {
                by_ref.insert(record.reference.clone(), run_records.len());
                run_records.push(RunRecord {
                    reference: record.reference.clone(),
                    signals,
                });
            }
        }
    }

    run_records
}

fn run_family_pass(family: SignalFamily, run_records: &[RunRecord], state: &mut RunState) {
    let mut pairs = match family {
        SignalFamily::DeviceSerial => {
            exact_pairs(run_records, |signals| signals.serial.clone())
        }
        SignalFamily::CloudId => exact_pairs(run_records, |signals| {
            signals
                .cloud
                .as_ref()
                .map(|(provider, id)| format!("{provider}:{id}"))
        }),
        SignalFamily::AzureDeviceId => {
            exact_pairs(run_records, |signals| signals.azure_device_id.clone())
        }
        SignalFamily::NormalizedMail => exact_pairs(run_records, |signals| signals.mail.clone()),
        SignalFamily::LoginPrincipal => {
            exact_pairs(run_records, |signals| signals.principal.clone())
        }
        SignalFamily::MacAddress => mac_candidate_pairs(run_records),
        SignalFamily::HostnameSubnet => hostname_candidate_pairs(run_records),
    };

    // Deterministic acceptance order regardless of hash iteration.
    pairs.sort();
    pairs.dedup();

    for (a, b, matched) in pairs {
        accept_pair(family, a, b, matched, run_records, state);
    }
}

/// Link a bucket through its first member.
///
/// Same-adapter pairs are quarantined for stricter confirmation, so a member
/// sharing the head's adapter is additionally paired with a cross-adapter
/// partner (when the bucket has one) to keep it reachable.
fn star_pairs(
    bucket: &[usize],
    matched: &str,
    run_records: &[RunRecord],
    pairs: &mut Vec<(usize, usize, String)>,
) {
    let head = bucket[0];
    let head_plugin = &run_records[head].reference.plugin_unique_name;
    let cross_partner = bucket
        .iter()
        .copied()
        .find(|&index| run_records[index].reference.plugin_unique_name != *head_plugin);

    for &member in &bucket[1..] {
        pairs.push((head, member, matched.to_string()));
        if run_records[member].reference.plugin_unique_name == *head_plugin {
            if let Some(partner) = cross_partner {
                if partner != member {
                    pairs.push((partner, member, matched.to_string()));
                }
            }
        }
    }
}

/// One linear pass for exact-match families: bucket records by signal value;
/// every bucket of >= 2 is an equivalence group for the family, linked
/// through its first member.
fn exact_pairs<K, F>(run_records: &[RunRecord], key_fn: F) -> Vec<(usize, usize, String)>
where
    K: Eq + Hash + ToString,
    F: Fn(&ExtractedSignals) -> Option<K>,
{
    let mut buckets: HashMap<K, Vec<usize>> = HashMap::new();
    for (index, record) in run_records.iter().enumerate() {
        if let Some(key) = key_fn(&record.signals) {
            buckets.entry(key).or_default().push(index);
        }
    }

    let mut pairs = Vec::new();
    for (key, bucket) in buckets {
        if bucket.len() < 2 {
            continue;
        }
        star_pairs(&bucket, &key.to_string(), run_records, &mut pairs);
    }
    pairs
}

/// Multi-key advisory index for the MAC family: index by each individual MAC
/// value to surface candidates, then confirm with the authoritative set
/// comparator.
fn mac_candidate_pairs(run_records: &[RunRecord]) -> Vec<(usize, usize, String)> {
    let mut buckets: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, record) in run_records.iter().enumerate() {
        for mac in &record.signals.macs {
            buckets.entry(mac.as_str()).or_default().push(index);
        }
    }

    let mut pairs = Vec::new();
    let mut candidates = Vec::new();
    for (mac, bucket) in buckets {
        if bucket.len() < 2 {
            continue;
        }
        candidates.clear();
        star_pairs(&bucket, mac, run_records, &mut candidates);
        for (a, b, matched) in candidates.drain(..) {
            // The index is advisory; the comparator is authoritative.
            if compare::compare_macs(&run_records[a].signals, &run_records[b].signals) {
                pairs.push((a, b, matched));
            }
        }
    }
    pairs
}

/// Advisory hostname index; candidates within a bucket are confirmed pairwise
/// because the subnet requirement does not bucket.
fn hostname_candidate_pairs(run_records: &[RunRecord]) -> Vec<(usize, usize, String)> {
    let mut buckets: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, record) in run_records.iter().enumerate() {
        if let Some(hostname) = record.signals.hostname.as_deref() {
            if !record.signals.ips.is_empty() {
                buckets.entry(hostname).or_default().push(index);
            }
        }
    }

    let mut pairs = Vec::new();
    for (hostname, bucket) in buckets {
        if bucket.len() < 2 {
            continue;
        }
        for i in 0..bucket.len() {
            for j in (i + 1)..bucket.len() {
                if compare::compare_hostname_and_subnet(
                    &run_records[bucket[i]].signals,
                    &run_records[bucket[j]].signals,
                ) {
                    pairs.push((bucket[i], bucket[j], hostname.to_string()));
                }
            }
        }
    }
    pairs
}

fn accept_pair(
    family: SignalFamily,
    a: usize,
    b: usize,
    matched: String,
    run_records: &[RunRecord],
    state: &mut RunState,
) {
    // Self-correlation guard.
    if a == b {
        return;
    }
    let key = pair_key(a, b);
    let record_a = &run_records[a];
    let record_b = &run_records[b];

    if record_a.reference.plugin_unique_name == record_b.reference.plugin_unique_name {
        // Same adapter, different local id: local-id stability is usually
        // guaranteed by the adapter, so this smells like a comparator false
        // positive. Hold for multi-signal confirmation.
        let reasons = state.suspicious.entry(key).or_default();
        if reasons.iter().all(|reason| reason.family != family) {
            reasons.push(CorrelationReason::new(family, matched));
        }
        return;
    }

    if !state.seen_pairs.insert(key) {
        // An earlier family already owns this pair's recorded reason.
        return;
    }
    state
        .edges
        .push((key, CorrelationReason::new(family, matched)));
    state.dsu.union(RecordId(key.0), RecordId(key.1));
}

/// Same-adapter pairs need at least two distinct confirming families; a
/// single family is rejected and logged for manual review.
fn resolve_suspicious_pairs(run_records: &[RunRecord], state: &mut RunState) {
    let mut pending: Vec<(PairKey, Vec<CorrelationReason>)> = state.suspicious.drain().collect();
    pending.sort_by_key(|(key, _)| *key);

    for (key, reasons) in pending {
        let ref_a = &run_records[key.0 as usize].reference;
        let ref_b = &run_records[key.1 as usize].reference;
        if reasons.len() >= 2 {
            debug!(
                a = %ref_a,
                b = %ref_b,
                families = reasons.len(),
                "accepting same-adapter pair after multi-signal confirmation"
            );
            // Families were collected in priority order; the first owns the
            // recorded reason.
            let reason = reasons.into_iter().next().expect("non-empty reasons");
            state.seen_pairs.insert(key);
            state.edges.push((key, reason));
            state.dsu.union(RecordId(key.0), RecordId(key.1));
        } else {
            warn!(
                a = %ref_a,
                b = %ref_b,
                reason = %reasons[0],
                "rejecting suspicious same-adapter correlation without corroboration"
            );
        }
    }
}

fn build_partition(kind: EntityKind, run_records: Vec<RunRecord>, mut state: RunState) -> Partition {
    let mut edges_by_root: FxHashMap<u32, Vec<CorrelationEdge>> = FxHashMap::default();
    let edges = std::mem::take(&mut state.edges);
    for (key, reason) in edges {
        let root = state.dsu.find(RecordId(key.0));
        edges_by_root.entry(root.0).or_default().push(CorrelationEdge::new(
            run_records[key.0 as usize].reference.clone(),
            run_records[key.1 as usize].reference.clone(),
            reason,
        ));
    }

    let groups = state
        .dsu
        .components()
        .into_iter()
        .map(|members| {
            let root = state.dsu.find(members[0]);
            CorrelationGroup {
                members: members
                    .iter()
                    .map(|id| run_records[id.0 as usize].reference.clone())
                    .collect(),
                edges: edges_by_root.remove(&root.0).unwrap_or_default(),
            }
        })
        .collect();

    Partition { kind, groups }
}
