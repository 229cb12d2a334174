//! # Configuration
//!
//! Explicit, constructed configuration for a correlation deployment. There is
//! no global registry: the engine only sees what is passed in here, which
//! keeps family enable/disable per deployment and unit testing free of
//! import-order surprises.

use crate::model::{EntityKind, SignalFamily};
use std::collections::BTreeMap;

/// Serial values emitted by hypervisors and lazy firmware. Treating these as
/// real serials would merge unrelated machines.
pub const GENERIC_SERIALS: [&str; 9] = [
    "0",
    "none",
    "n/a",
    "na",
    "unknown",
    "default string",
    "to be filled by o.e.m.",
    "system serial number",
    "chassis serial number",
];

/// Hostname values that name no machine in particular.
pub const PLACEHOLDER_HOSTNAMES: [&str; 3] = ["localhost", "unknown", "localhost.localdomain"];

/// Per-kind enable/disable switches for comparator families.
///
/// A disabled family is skipped for the whole run, exactly like a family
/// whose precondition filter finds no usable signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyToggles {
    enabled: BTreeMap<SignalFamily, bool>,
}

impl FamilyToggles {
    /// All families enabled.
    pub fn all() -> Self {
        let mut enabled = BTreeMap::new();
        for family in SignalFamily::PRIORITY {
            enabled.insert(family, true);
        }
        Self { enabled }
    }

    /// Families that make sense for device populations.
    pub fn device_default() -> Self {
        let mut toggles = Self::all();
        toggles.set(SignalFamily::NormalizedMail, false);
        toggles.set(SignalFamily::LoginPrincipal, false);
        toggles
    }

    /// Families that make sense for user populations.
    pub fn user_default() -> Self {
        let mut toggles = Self::all();
        toggles.set(SignalFamily::DeviceSerial, false);
        toggles.set(SignalFamily::CloudId, false);
        toggles.set(SignalFamily::AzureDeviceId, false);
        toggles.set(SignalFamily::MacAddress, false);
        toggles.set(SignalFamily::HostnameSubnet, false);
        toggles
    }

    pub fn set(&mut self, family: SignalFamily, enabled: bool) -> &mut Self {
        self.enabled.insert(family, enabled);
        self
    }

    pub fn is_enabled(&self, family: SignalFamily) -> bool {
        self.enabled.get(&family).copied().unwrap_or(true)
    }

    /// Enabled families in priority order.
    pub fn enabled_families(&self) -> Vec<SignalFamily> {
        SignalFamily::PRIORITY
            .into_iter()
            .filter(|family| self.is_enabled(*family))
            .collect()
    }
}

/// Deployment configuration consumed by the engine and extractors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationConfig {
    /// Comparator families enabled for device runs.
    pub device_families: FamilyToggles,
    /// Comparator families enabled for user runs.
    pub user_families: FamilyToggles,
    /// Domain suffixes that may be stripped from hostnames. A hostname whose
    /// suffix is not listed here is kept verbatim.
    pub hostname_domain_allowlist: Vec<String>,
    /// Serial values treated as absent. Lower-case comparison.
    pub placeholder_serials: Vec<String>,
}

impl CorrelationConfig {
    pub fn new() -> Self {
        Self {
            device_families: FamilyToggles::device_default(),
            user_families: FamilyToggles::user_default(),
            hostname_domain_allowlist: Vec::new(),
            placeholder_serials: GENERIC_SERIALS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn families_for(&self, kind: EntityKind) -> &FamilyToggles {
        match kind {
            EntityKind::Device => &self.device_families,
            EntityKind::User => &self.user_families,
        }
    }

    pub fn families_for_mut(&mut self, kind: EntityKind) -> &mut FamilyToggles {
        match kind {
            EntityKind::Device => &mut self.device_families,
            EntityKind::User => &mut self.user_families,
        }
    }

    /// Add a domain suffix eligible for hostname stripping.
    pub fn allow_domain(mut self, domain: impl Into<String>) -> Self {
        self.hostname_domain_allowlist
            .push(domain.into().to_ascii_lowercase());
        self
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_split_families_by_kind() {
        let config = CorrelationConfig::new();
        assert!(config
            .families_for(EntityKind::Device)
            .is_enabled(SignalFamily::MacAddress));
        assert!(!config
            .families_for(EntityKind::Device)
            .is_enabled(SignalFamily::NormalizedMail));
        assert!(config
            .families_for(EntityKind::User)
            .is_enabled(SignalFamily::NormalizedMail));
        assert!(!config
            .families_for(EntityKind::User)
            .is_enabled(SignalFamily::MacAddress));
    }

    #[test]
    fn test_disable_a_noisy_family() {
        let mut config = CorrelationConfig::new();
        config
            .families_for_mut(EntityKind::Device)
            .set(SignalFamily::HostnameSubnet, false);
        let enabled = config.families_for(EntityKind::Device).enabled_families();
        assert!(!enabled.contains(&SignalFamily::HostnameSubnet));
        assert!(enabled.contains(&SignalFamily::DeviceSerial));
    }

    #[test]
    fn test_enabled_families_follow_priority_order() {
        let toggles = FamilyToggles::all();
        assert_eq!(toggles.enabled_families(), SignalFamily::PRIORITY.to_vec());
    }

    #[test]
    fn test_allow_domain_lowercases() {
        let config = CorrelationConfig::new().allow_domain("Corp.Example.COM");
        assert_eq!(config.hostname_domain_allowlist, vec!["corp.example.com"]);
    }
}
