//! Wire types exchanged with the operations console

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Component types known to the console
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Orderer,
    Peer,
    CertificateAuthority,
}

impl ComponentKind {
    /// The `type` field the console uses for this kind
    pub fn api_type(&self) -> &'static str {
        match self {
            ComponentKind::Orderer => "fabric-orderer",
            ComponentKind::Peer => "fabric-peer",
            ComponentKind::CertificateAuthority => "fabric-ca",
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.api_type())
    }
}

/// A component record exactly as the console returned it.
///
/// Only a handful of fields are interpreted; everything else is preserved so
/// that comparisons and updates see fields this crate does not model.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ComponentState(Map<String, Value>);

impl ComponentState {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(Error::ConfigError(format!(
                "expected a component object, got {other}"
            ))),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.str_field("id")
    }

    /// The id, or an error naming the component when the console omitted it
    pub fn require_id(&self) -> Result<&str> {
        self.id().ok_or_else(|| {
            Error::ConfigError(format!(
                "component {} has no id",
                self.display_name().unwrap_or("<unnamed>")
            ))
        })
    }

    pub fn display_name(&self) -> Option<&str> {
        self.str_field("display_name")
    }

    /// The console knows the component but its deployment is gone or was
    /// never completed.
    pub fn is_corrupt(&self) -> bool {
        self.0.contains_key("deployment_attrs_missing")
    }

    /// Whether the node has been confirmed as a consenter of the system channel
    pub fn consenter_proposal_fin(&self) -> bool {
        self.0
            .get("consenter_proposal_fin")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Admin certificates, or `None` when the console does not report them
    pub fn admin_certs(&self) -> Option<Vec<String>> {
        self.0.get("admin_certs").and_then(Value::as_array).map(|certs| {
            certs
                .iter()
                .filter_map(|cert| cert.as_str().map(String::from))
                .collect()
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Look up a nested string by path, e.g. `["msp", "ca", "name"]`.
    /// Numeric segments index into lists.
    pub fn str_path(&self, path: &[&str]) -> Option<&str> {
        let (first, rest) = path.split_first()?;
        let mut current = self.0.get(*first)?;
        for key in rest {
            current = match current {
                Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
                other => other.get(*key)?,
            };
        }
        current.as_str()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

/// Connection details for a certificate authority known to the console
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CertificateAuthority {
    pub name: String,
    pub api_url: String,
    pub ca_name: String,
    pub tlsca_name: String,
    /// TLS certificate of the CA as base64 encoded PEM
    pub pem: String,
}

impl CertificateAuthority {
    pub fn from_component(component: &ComponentState) -> Result<Self> {
        let missing = |field: &str| {
            Error::ConfigError(format!(
                "certificate authority {} has no {field}",
                component.display_name().unwrap_or("<unnamed>")
            ))
        };
        let api_url = component
            .str_field("api_url")
            .ok_or_else(|| missing("api_url"))?;
        let ca_name = component
            .str_path(&["msp", "ca", "name"])
            .or_else(|| component.str_field("ca_name"))
            .ok_or_else(|| missing("ca_name"))?;
        let tlsca_name = component
            .str_path(&["msp", "tlsca", "name"])
            .or_else(|| component.str_field("tlsca_name"))
            .ok_or_else(|| missing("tlsca_name"))?;
        let pem = component
            .str_path(&["msp", "component", "tls_cert"])
            .or_else(|| component.str_field("tls_cert"))
            .or_else(|| component.str_field("pem"))
            .ok_or_else(|| missing("tls_cert"))?;

        Ok(Self {
            name: component.display_name().unwrap_or_default().to_string(),
            api_url: api_url.to_string(),
            ca_name: ca_name.to_string(),
            tlsca_name: tlsca_name.to_string(),
            pem: pem.to_string(),
        })
    }
}

/// Consensus type of an ordering service node
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrdererType {
    #[default]
    Raft,
}

/// Storage for the orderer container
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct OrdererStorage {
    #[serde(default)]
    pub orderer: VolumeConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct VolumeConfig {
    #[serde(default = "default_volume_size")]
    pub size: String,
    /// Omitted when unset; the console rejects an explicit null class
    #[serde(default, rename = "class", skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

fn default_volume_size() -> String {
    "100Gi".to_string()
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            size: default_volume_size(),
            storage_class: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct HsmEndpoint {
    pub pkcs11endpoint: String,
}

/// Request body for creating an ordering service node.
///
/// The console can only create ordering services, so a single node is
/// created as a one node service joined to an existing cluster. Fields the
/// console treats as per-node lists are one-element lists here.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CreateOrderingServiceRequest {
    pub display_name: String,
    pub cluster_id: String,
    pub cluster_name: String,
    pub msp_id: String,
    pub orderer_type: OrdererType,
    pub system_channel_id: String,
    pub config_override: Vec<Value>,
    pub resources: Value,
    pub storage: OrdererStorage,
    pub crypto: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hsm: Option<HsmEndpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Caller facing summary of an ordering service node
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct OrderingServiceNodeInfo {
    pub id: String,
    pub name: String,
    pub api_url: Option<String>,
    pub operations_url: Option<String>,
    pub grpcwp_url: Option<String>,
    pub msp_id: Option<String>,
    pub pem: Option<String>,
    pub tls_ca_root_cert: Option<String>,
    pub tls_cert: Option<String>,
    pub location: Option<String>,
    pub system_channel_id: Option<String>,
    pub client_tls_cert: Option<String>,
    pub server_tls_cert: Option<String>,
    pub cluster_id: Option<String>,
    pub cluster_name: Option<String>,
    pub consenter_proposal_fin: bool,
}

impl OrderingServiceNodeInfo {
    pub fn from_component(component: &ComponentState) -> Self {
        let field = |key: &str| component.str_field(key).map(String::from);
        let first_of = |paths: &[&[&str]]| {
            paths
                .iter()
                .find_map(|path| component.str_path(path))
                .map(String::from)
        };
        let tls_ca_root_cert = first_of(&[
            &["msp", "tlsca", "root_certs", "0"],
            &["tls_ca_root_cert"],
        ]);

        Self {
            id: component.id().unwrap_or_default().to_string(),
            name: component.display_name().unwrap_or_default().to_string(),
            api_url: field("api_url"),
            operations_url: field("operations_url"),
            grpcwp_url: field("grpcwp_url"),
            msp_id: field("msp_id"),
            pem: field("pem").or_else(|| tls_ca_root_cert.clone()),
            tls_ca_root_cert,
            tls_cert: first_of(&[&["msp", "component", "tls_cert"], &["tls_cert"]]),
            location: field("location"),
            system_channel_id: field("system_channel_id"),
            client_tls_cert: first_of(&[
                &["msp", "component", "client_tls_cert"],
                &["client_tls_cert"],
            ]),
            server_tls_cert: first_of(&[
                &["msp", "component", "server_tls_cert"],
                &["server_tls_cert"],
            ]),
            cluster_id: field("cluster_id"),
            cluster_name: field("cluster_name"),
            consenter_proposal_fin: component.consenter_proposal_fin(),
        }
    }
}
