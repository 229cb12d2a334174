//! # Data Model
//!
//! Core data structures for entity correlation: adapter records, identity
//! signals, correlation reasons, and merged entities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Compact per-run identifier for records in the correlation arena.
///
/// Assigned densely at the start of a run; not stable across runs. Durable
/// identity lives in [`AdapterRecordRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub u32);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Stable identifier for a merged entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// The kind of real-world entity a record describes.
///
/// Populations are correlated per kind; a Device record is never compared to
/// a User record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Device,
    User,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Device => write!(f, "device"),
            EntityKind::User => write!(f, "user"),
        }
    }
}

/// Durable identity of one fetch of one asset from one adapter connection.
///
/// `local_id` is only unique within its `plugin_unique_name`; two adapters may
/// emit colliding local ids for unrelated assets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AdapterRecordRef {
    /// The adapter connection instance that produced the record.
    pub plugin_unique_name: String,
    /// Adapter-local, typically-stable identifier.
    pub local_id: String,
}

impl AdapterRecordRef {
    pub fn new(plugin_unique_name: impl Into<String>, local_id: impl Into<String>) -> Self {
        Self {
            plugin_unique_name: plugin_unique_name.into(),
            local_id: local_id.into(),
        }
    }
}

impl fmt::Display for AdapterRecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.plugin_unique_name, self.local_id)
    }
}

/// Closed set of identity signal kinds a record may carry.
///
/// New signal families require a code change; there is no ad hoc registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SignalKind {
    MacAddresses,
    Hostname,
    IpAddresses,
    DeviceSerial,
    CloudId,
    AzureDeviceId,
    AdUserPrincipalName,
    NormalizedMail,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::MacAddresses => "mac_addresses",
            SignalKind::Hostname => "hostname",
            SignalKind::IpAddresses => "ip_addresses",
            SignalKind::DeviceSerial => "device_serial",
            SignalKind::CloudId => "cloud_id",
            SignalKind::AzureDeviceId => "azure_device_id",
            SignalKind::AdUserPrincipalName => "ad_user_principal_name",
            SignalKind::NormalizedMail => "normalized_mail",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw signal value as supplied by the adapter normalizer.
///
/// Values here are pre-normalization; the extractors in [`crate::extract`]
/// own normalization and placeholder filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalValue {
    Text(String),
    TextSet(Vec<String>),
    /// A value only meaningful within a scope, e.g. a cloud instance id
    /// scoped to its provider.
    Scoped { scope: String, value: String },
}

impl SignalValue {
    pub fn text(value: impl Into<String>) -> Self {
        SignalValue::Text(value.into())
    }

    pub fn text_set<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SignalValue::TextSet(values.into_iter().map(Into::into).collect())
    }

    pub fn scoped(scope: impl Into<String>, value: impl Into<String>) -> Self {
        SignalValue::Scoped {
            scope: scope.into(),
            value: value.into(),
        }
    }

    /// View as single text, if this is a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SignalValue::Text(value) => Some(value),
            _ => None,
        }
    }

    /// View as a set of texts. A single `Text` value is a set of one.
    pub fn as_text_set(&self) -> Vec<&str> {
        match self {
            SignalValue::Text(value) => vec![value.as_str()],
            SignalValue::TextSet(values) => values.iter().map(String::as_str).collect(),
            SignalValue::Scoped { .. } => Vec::new(),
        }
    }
}

/// One fetch of one entity from one adapter connection at one point in time.
///
/// Records are superseded, never mutated, by the next fetch of the same
/// adapter connection. `raw` is retained for audit and never consulted by
/// comparison logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterRecord {
    pub reference: AdapterRecordRef,
    pub kind: EntityKind,
    pub signals: BTreeMap<SignalKind, SignalValue>,
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl AdapterRecord {
    pub fn new(
        plugin_unique_name: impl Into<String>,
        local_id: impl Into<String>,
        kind: EntityKind,
    ) -> Self {
        Self {
            reference: AdapterRecordRef::new(plugin_unique_name, local_id),
            kind,
            signals: BTreeMap::new(),
            raw: serde_json::Value::Null,
        }
    }

    /// Attach a signal, replacing any prior value of the same kind.
    pub fn with_signal(mut self, kind: SignalKind, value: SignalValue) -> Self {
        self.signals.insert(kind, value);
        self
    }

    /// Attach the opaque original payload.
    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }

    pub fn signal(&self, kind: SignalKind) -> Option<&SignalValue> {
        self.signals.get(&kind)
    }

    /// Single text value for a signal kind, if present.
    pub fn text_signal(&self, kind: SignalKind) -> Option<&str> {
        self.signal(kind).and_then(SignalValue::as_text)
    }

    /// All text values for a signal kind; empty when absent.
    pub fn text_set_signal(&self, kind: SignalKind) -> Vec<&str> {
        self.signal(kind)
            .map(SignalValue::as_text_set)
            .unwrap_or_default()
    }
}

/// Comparator family: a category of identity evidence with its own extractor
/// and comparator.
///
/// [`SignalFamily::PRIORITY`] is the documented total order used both for
/// processing and for reason tie-breaking: the first family to confirm a pair
/// owns the recorded [`CorrelationReason`]. The final grouping is independent
/// of this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SignalFamily {
    DeviceSerial,
    CloudId,
    AzureDeviceId,
    MacAddress,
    NormalizedMail,
    LoginPrincipal,
    HostnameSubnet,
}

impl SignalFamily {
    /// Processing and tie-break order, strongest evidence first.
    pub const PRIORITY: [SignalFamily; 7] = [
        SignalFamily::DeviceSerial,
        SignalFamily::CloudId,
        SignalFamily::AzureDeviceId,
        SignalFamily::MacAddress,
        SignalFamily::NormalizedMail,
        SignalFamily::LoginPrincipal,
        SignalFamily::HostnameSubnet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalFamily::DeviceSerial => "serial",
            SignalFamily::CloudId => "cloud_id",
            SignalFamily::AzureDeviceId => "azure_device_id",
            SignalFamily::MacAddress => "mac",
            SignalFamily::NormalizedMail => "mail",
            SignalFamily::LoginPrincipal => "login_principal",
            SignalFamily::HostnameSubnet => "hostname_subnet",
        }
    }
}

impl fmt::Display for SignalFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why two records were judged equivalent. Attached to every merge decision;
/// there are no silent merges.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationReason {
    pub family: SignalFamily,
    /// The shared value that triggered the match, e.g. the common MAC.
    pub matched: String,
}

impl CorrelationReason {
    pub fn new(family: SignalFamily, matched: impl Into<String>) -> Self {
        Self {
            family,
            matched: matched.into(),
        }
    }
}

impl fmt::Display for CorrelationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shared {} {}", self.family, self.matched)
    }
}

/// An audit edge justifying that two records belong to the same entity.
///
/// Edges are normalized so that `a <= b` in ref order; the unordered pair
/// appears at most once per family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationEdge {
    pub a: AdapterRecordRef,
    pub b: AdapterRecordRef,
    pub reason: CorrelationReason,
}

impl CorrelationEdge {
    /// Create an edge, normalizing endpoint order.
    pub fn new(a: AdapterRecordRef, b: AdapterRecordRef, reason: CorrelationReason) -> Self {
        if a <= b {
            Self { a, b, reason }
        } else {
            Self { a: b, b: a, reason }
        }
    }

    pub fn family(&self) -> SignalFamily {
        self.reason.family
    }
}

impl fmt::Display for CorrelationEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {} ({})", self.a, self.b, self.reason)
    }
}

/// The logical identity an end user sees: a set of adapter records judged
/// equivalent, plus the audit edges that justify its current shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    /// Member records in insertion order. No two members share the same
    /// `(plugin_unique_name, local_id)`.
    pub members: Vec<AdapterRecordRef>,
    /// The recorded decisions that connect the members.
    pub edges: Vec<CorrelationEdge>,
}

impl Entity {
    pub fn new(id: EntityId, kind: EntityKind) -> Self {
        Self {
            id,
            kind,
            members: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, reference: &AdapterRecordRef) -> bool {
        self.members.iter().any(|member| member == reference)
    }
}
