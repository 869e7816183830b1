//! Admin certificate reconciliation helpers

use std::collections::BTreeSet;

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::params::OrderingServiceNodeParams;

/// Changes needed to bring the node's admin certificates in line
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdminCertChanges {
    pub append: Vec<String>,
    pub remove: Vec<String>,
}

impl AdminCertChanges {
    pub fn is_empty(&self) -> bool {
        self.append.is_empty() && self.remove.is_empty()
    }
}

/// Certificates differing only in line breaks or padding are the same
pub fn normalize(cert: &str) -> String {
    cert.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Short SHA-256 fingerprint for logging a certificate without its content
pub fn fingerprint(cert: &str) -> String {
    let digest = Sha256::digest(normalize(cert).as_bytes());
    hex::encode(&digest[..8])
}

/// Admin certificates the caller wants, in precedence order: `admins`, then
/// `crypto.enrollment.component.admincerts`, then
/// `crypto.msp.component.admincerts`.
pub fn desired_admin_certs(params: &OrderingServiceNodeParams) -> Option<Vec<String>> {
    if let Some(admins) = params.admins.as_ref().filter(|admins| !admins.is_empty()) {
        return Some(admins.clone());
    }

    let crypto = params.crypto.as_ref()?;
    ["enrollment", "msp"].iter().find_map(|config_type| {
        let certs: Vec<String> = crypto
            .get(config_type)?
            .get("component")?
            .get("admincerts")?
            .as_array()?
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect();
        (!certs.is_empty()).then_some(certs)
    })
}

/// Sorted set differences between desired and observed certificates
pub fn compute_changes(desired: &[String], observed: &[String]) -> AdminCertChanges {
    let desired: BTreeSet<String> = desired.iter().map(|cert| normalize(cert)).collect();
    let observed: BTreeSet<String> = observed.iter().map(|cert| normalize(cert)).collect();

    AdminCertChanges {
        append: desired.difference(&observed).cloned().collect(),
        remove: observed.difference(&desired).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn certs(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_changes_are_set_differences() {
        let changes = compute_changes(&certs(&["A", "B"]), &certs(&["B", "C"]));
        assert_eq!(changes.append, certs(&["A"]));
        assert_eq!(changes.remove, certs(&["C"]));
    }

    #[test]
    fn test_whitespace_is_ignored() {
        let changes = compute_changes(&certs(&["LS0t\nQUJD\n"]), &certs(&["LS0tQUJD"]));
        assert!(changes.is_empty());
        assert_eq!(fingerprint("LS0t\nQUJD"), fingerprint("LS0tQUJD"));
        assert_eq!(fingerprint("LS0tQUJD").len(), 16);
    }

    #[test]
    fn test_changes_are_sorted() {
        let changes = compute_changes(&certs(&["Z", "M", "A"]), &[]);
        assert_eq!(changes.append, certs(&["A", "M", "Z"]));
    }

    #[test]
    fn test_admins_take_precedence() {
        let params = OrderingServiceNodeParams {
            admins: Some(certs(&["A"])),
            crypto: Some(json!({"enrollment": {"component": {"admincerts": ["B"]}}})),
            ..OrderingServiceNodeParams::new("os1")
        };
        assert_eq!(desired_admin_certs(&params), Some(certs(&["A"])));
    }

    #[test]
    fn test_crypto_enrollment_before_msp() {
        let params = OrderingServiceNodeParams {
            crypto: Some(json!({
                "enrollment": {"component": {"admincerts": ["B"]}},
                "msp": {"component": {"admincerts": ["C"]}}
            })),
            ..OrderingServiceNodeParams::new("os1")
        };
        assert_eq!(desired_admin_certs(&params), Some(certs(&["B"])));

        let msp_only = OrderingServiceNodeParams {
            crypto: Some(json!({"msp": {"component": {"admincerts": ["C"]}}})),
            ..OrderingServiceNodeParams::new("os1")
        };
        assert_eq!(desired_admin_certs(&msp_only), Some(certs(&["C"])));
    }

    #[test]
    fn test_no_desired_certs() {
        assert_eq!(
            desired_admin_certs(&OrderingServiceNodeParams::new("os1")),
            None
        );
    }
}
