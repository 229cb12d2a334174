//! # Field Extractors
//!
//! Pure functions that pull identity signals out of adapter records, applying
//! light normalization. Extractors are total: malformed input degrades to
//! `None`/empty and the value is logged, never propagated as an error.
//! Absence is a normal value and is never evidence of equivalence.

use crate::config::{CorrelationConfig, PLACEHOLDER_HOSTNAMES};
use crate::model::{AdapterRecord, SignalFamily, SignalKind, SignalValue};
use std::net::IpAddr;
use tracing::debug;

/// All-zero and broadcast MACs are common firmware defaults; matching on them
/// would merge unrelated machines.
const MAC_ZERO: &str = "000000000000";
const MAC_BROADCAST: &str = "ffffffffffff";

/// Normalize one MAC address: strip separators, lower-case, require 12 hex
/// digits. Placeholder MACs are rejected.
pub fn normalize_mac(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.' | ' '))
        .collect::<String>()
        .to_ascii_lowercase();

    if cleaned.len() != 12 || !cleaned.chars().all(|c| c.is_ascii_hexdigit()) {
        debug!(mac = raw, "dropping malformed mac address");
        return None;
    }
    if cleaned == MAC_ZERO || cleaned == MAC_BROADCAST {
        debug!(mac = raw, "dropping placeholder mac address");
        return None;
    }
    Some(cleaned)
}

/// Collect all NIC MACs of a record, normalized and deduplicated.
pub fn extract_macs(record: &AdapterRecord) -> Vec<String> {
    let mut macs = Vec::new();
    for raw in record.text_set_signal(SignalKind::MacAddresses) {
        if let Some(mac) = normalize_mac(raw) {
            if !macs.contains(&mac) {
                macs.push(mac);
            }
        }
    }
    macs
}

/// Lower-case the hostname and strip one trailing domain suffix if it appears
/// in the allow-list; placeholders yield `None`.
pub fn extract_hostname(record: &AdapterRecord, domain_allowlist: &[String]) -> Option<String> {
    let raw = record.text_signal(SignalKind::Hostname)?;
    let mut hostname = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    if hostname.is_empty() || PLACEHOLDER_HOSTNAMES.contains(&hostname.as_str()) {
        return None;
    }

    for domain in domain_allowlist {
        let suffix = format!(".{domain}");
        if let Some(stripped) = hostname.strip_suffix(suffix.as_str()) {
            if !stripped.is_empty() {
                hostname = stripped.to_string();
            }
            break;
        }
    }

    Some(hostname)
}

/// Parse the record's IP addresses, dropping loopback and unspecified
/// addresses along with anything unparseable.
pub fn extract_ips(record: &AdapterRecord) -> Vec<IpAddr> {
    let mut ips = Vec::new();
    for raw in record.text_set_signal(SignalKind::IpAddresses) {
        match raw.trim().parse::<IpAddr>() {
            Ok(ip) if ip.is_loopback() || ip.is_unspecified() => {}
            Ok(ip) => {
                if !ips.contains(&ip) {
                    ips.push(ip);
                }
            }
            Err(_) => debug!(ip = raw, "dropping unparseable ip address"),
        }
    }
    ips
}

/// Extract the device serial, treating known generic placeholders as absent.
pub fn extract_serial(record: &AdapterRecord, placeholder_serials: &[String]) -> Option<String> {
    let serial = record
        .text_signal(SignalKind::DeviceSerial)?
        .trim()
        .to_ascii_lowercase();
    if serial.is_empty() {
        return None;
    }
    if placeholder_serials.iter().any(|p| p == &serial) {
        debug!(serial = %serial, record = %record.reference, "ignoring placeholder serial");
        return None;
    }
    Some(serial)
}

/// Extract the cloud instance id together with its provider scope.
///
/// An unscoped cloud id cannot be compared (the provider tag must also match)
/// and is treated as absent.
pub fn extract_cloud_id(record: &AdapterRecord) -> Option<(String, String)> {
    match record.signal(SignalKind::CloudId)? {
        SignalValue::Scoped { scope, value } => {
            let provider = scope.trim().to_ascii_lowercase();
            let id = value.trim().to_string();
            if provider.is_empty() || id.is_empty() {
                return None;
            }
            Some((provider, id))
        }
        other => {
            debug!(record = %record.reference, ?other, "cloud id without provider scope");
            None
        }
    }
}

/// Extract the Azure AD device id. GUID comparison is case-insensitive.
pub fn extract_azure_device_id(record: &AdapterRecord) -> Option<String> {
    let id = record
        .text_signal(SignalKind::AzureDeviceId)?
        .trim()
        .to_ascii_lowercase();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Extract the login principal name, lower-cased and trimmed.
pub fn extract_login_principal(record: &AdapterRecord) -> Option<String> {
    let principal = record
        .text_signal(SignalKind::AdUserPrincipalName)?
        .trim()
        .to_ascii_lowercase();
    if principal.is_empty() {
        None
    } else {
        Some(principal)
    }
}

/// Extract the normalized mail address.
///
/// Prefers the explicit mail field and falls back to the login principal when
/// that looks like a mail address. Values failing the minimal
/// `local@domain.tld` shape are logged and treated as absent.
pub fn extract_normalized_mail(record: &AdapterRecord) -> Option<String> {
    let candidate = record
        .text_signal(SignalKind::NormalizedMail)
        .or_else(|| record.text_signal(SignalKind::AdUserPrincipalName))?;

    let mail = candidate.trim().to_ascii_lowercase();
    if looks_like_mail(&mail) {
        Some(mail)
    } else {
        debug!(mail = %candidate, record = %record.reference, "ignoring invalid mail value");
        None
    }
}

/// Minimal `local@domain.tld` shape check. Deliberately loose: the goal is to
/// reject obvious non-mail principals, not to validate RFC 5322.
fn looks_like_mail(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    if value.contains(char::is_whitespace) || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((name, tld)) => !name.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// All signals of one record, extracted once per run.
///
/// The engine works exclusively off this view; the raw payload is never
/// consulted after extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractedSignals {
    pub macs: Vec<String>,
    pub hostname: Option<String>,
    pub ips: Vec<IpAddr>,
    pub serial: Option<String>,
    pub cloud: Option<(String, String)>,
    pub azure_device_id: Option<String>,
    pub principal: Option<String>,
    pub mail: Option<String>,
}

impl ExtractedSignals {
    pub fn from_record(record: &AdapterRecord, config: &CorrelationConfig) -> Self {
        Self {
            macs: extract_macs(record),
            hostname: extract_hostname(record, &config.hostname_domain_allowlist),
            ips: extract_ips(record),
            serial: extract_serial(record, &config.placeholder_serials),
            cloud: extract_cloud_id(record),
            azure_device_id: extract_azure_device_id(record),
            principal: extract_login_principal(record),
            mail: extract_normalized_mail(record),
        }
    }

    /// Whether this record carries a usable signal for the given family.
    /// Used by the engine's precondition filter.
    pub fn has_family_signal(&self, family: SignalFamily) -> bool {
        match family {
            SignalFamily::DeviceSerial => self.serial.is_some(),
            SignalFamily::CloudId => self.cloud.is_some(),
            SignalFamily::AzureDeviceId => self.azure_device_id.is_some(),
            SignalFamily::MacAddress => !self.macs.is_empty(),
            SignalFamily::NormalizedMail => self.mail.is_some(),
            SignalFamily::LoginPrincipal => self.principal.is_some(),
            SignalFamily::HostnameSubnet => self.hostname.is_some() && !self.ips.is_empty(),
        }
    }
}
