//! # Pairwise Comparators
//!
//! Predicates deciding whether two records' extracted signals indicate the
//! same entity. All comparators are pure, symmetric, and consult no global
//! state. They must only run after the precondition filter has confirmed both
//! sides carry the relevant signal non-trivially; a missing signal is never
//! evidence of equivalence.

use crate::extract::ExtractedSignals;
use crate::model::SignalFamily;
use std::net::IpAddr;

/// True iff the MAC sets intersect on at least one value.
pub fn compare_macs(a: &ExtractedSignals, b: &ExtractedSignals) -> bool {
    a.macs.iter().any(|mac| b.macs.contains(mac))
}

/// Exact equality on the extracted serial (placeholders already filtered).
pub fn compare_serial(a: &ExtractedSignals, b: &ExtractedSignals) -> bool {
    match (&a.serial, &b.serial) {
        (Some(sa), Some(sb)) => sa == sb,
        _ => false,
    }
}

/// Exact equality scoped to the same cloud provider.
pub fn compare_cloud_id(a: &ExtractedSignals, b: &ExtractedSignals) -> bool {
    match (&a.cloud, &b.cloud) {
        (Some((provider_a, id_a)), Some((provider_b, id_b))) => {
            provider_a == provider_b && id_a == id_b
        }
        _ => false,
    }
}

/// Exact equality on the Azure AD device id.
pub fn compare_azure_device_id(a: &ExtractedSignals, b: &ExtractedSignals) -> bool {
    match (&a.azure_device_id, &b.azure_device_id) {
        (Some(ia), Some(ib)) => ia == ib,
        _ => false,
    }
}

/// Exact equality on the normalized login principal.
pub fn compare_login_principal(a: &ExtractedSignals, b: &ExtractedSignals) -> bool {
    match (&a.principal, &b.principal) {
        (Some(pa), Some(pb)) => pa == pb,
        _ => false,
    }
}

/// Exact equality on the normalized mail address.
pub fn compare_mail(a: &ExtractedSignals, b: &ExtractedSignals) -> bool {
    match (&a.mail, &b.mail) {
        (Some(ma), Some(mb)) => ma == mb,
        _ => false,
    }
}

/// Hostnames match AND at least one IP pair shares a subnet prefix.
///
/// The subnet requirement cuts false positives from generic hostnames like
/// `desktop-1` that recur across unrelated networks.
pub fn compare_hostname_and_subnet(a: &ExtractedSignals, b: &ExtractedSignals) -> bool {
    match (&a.hostname, &b.hostname) {
        (Some(ha), Some(hb)) if ha == hb => a
            .ips
            .iter()
            .any(|ip_a| b.ips.iter().any(|ip_b| same_subnet(ip_a, ip_b))),
        _ => false,
    }
}

/// Same /24 for IPv4, same /64 for IPv6. Mixed families never match.
pub fn same_subnet(a: &IpAddr, b: &IpAddr) -> bool {
    match (a, b) {
        (IpAddr::V4(a), IpAddr::V4(b)) => a.octets()[..3] == b.octets()[..3],
        (IpAddr::V6(a), IpAddr::V6(b)) => a.octets()[..8] == b.octets()[..8],
        _ => false,
    }
}

/// Dispatch to the family's comparator.
pub fn compare_family(family: SignalFamily, a: &ExtractedSignals, b: &ExtractedSignals) -> bool {
    match family {
        SignalFamily::DeviceSerial => compare_serial(a, b),
        SignalFamily::CloudId => compare_cloud_id(a, b),
        SignalFamily::AzureDeviceId => compare_azure_device_id(a, b),
        SignalFamily::MacAddress => compare_macs(a, b),
        SignalFamily::NormalizedMail => compare_mail(a, b),
        SignalFamily::LoginPrincipal => compare_login_principal(a, b),
        SignalFamily::HostnameSubnet => compare_hostname_and_subnet(a, b),
    }
}

/// The shared value justifying a confirmed match, for the audit trail.
pub fn matched_value(
    family: SignalFamily,
    a: &ExtractedSignals,
    b: &ExtractedSignals,
) -> Option<String> {
    match family {
        SignalFamily::DeviceSerial => a.serial.clone(),
        SignalFamily::CloudId => a
            .cloud
            .as_ref()
            .map(|(provider, id)| format!("{provider}:{id}")),
        SignalFamily::AzureDeviceId => a.azure_device_id.clone(),
        SignalFamily::MacAddress => a.macs.iter().find(|mac| b.macs.contains(mac)).cloned(),
        SignalFamily::NormalizedMail => a.mail.clone(),
        SignalFamily::LoginPrincipal => a.principal.clone(),
        SignalFamily::HostnameSubnet => a.hostname.clone(),
    }
}
