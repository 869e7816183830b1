//! Organization value object

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An organization's membership service provider definition.
///
/// Certificates are base64 encoded PEM strings and are treated as opaque.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Organization {
    pub msp_id: String,
    #[serde(default)]
    pub root_certs: Vec<String>,
    #[serde(default)]
    pub intermediate_certs: Vec<String>,
    #[serde(default)]
    pub admins: Vec<String>,
    #[serde(default)]
    pub revocation_list: Vec<String>,
    #[serde(default)]
    pub tls_root_certs: Vec<String>,
    #[serde(default)]
    pub tls_intermediate_certs: Vec<String>,
    #[serde(default)]
    pub fabric_node_ous: Option<FabricNodeOus>,
    #[serde(default)]
    pub organizational_unit_identifiers: Vec<OuIdentifier>,
}

/// Node OU classification: maps organizational units in certificates to the
/// client, peer, admin and orderer roles.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct FabricNodeOus {
    #[serde(default)]
    pub enable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ou_identifier: Option<OuIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_ou_identifier: Option<OuIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_ou_identifier: Option<OuIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orderer_ou_identifier: Option<OuIdentifier>,
    /// Fields added by newer Fabric releases
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct OuIdentifier {
    /// Base64 encoded PEM of the issuing certificate; empty matches any issuer
    #[serde(default)]
    pub certificate: String,
    pub organizational_unit_identifier: String,
}

impl Organization {
    pub fn new(msp_id: impl Into<String>) -> Self {
        Self {
            msp_id: msp_id.into(),
            ..Default::default()
        }
    }
}
