//! Declared state of an ordering service node
//!
//! Parameters are loaded from YAML. Every optional field has a serde default
//! so a minimal file only names the node and how to enroll it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::console::{OrdererStorage, OrdererType};
use crate::error::{Error, Result};

pub const DEFAULT_SYSTEM_CHANNEL_ID: &str = "testchainid";
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 60;

/// Whether the node should exist
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    #[default]
    Present,
    Absent,
}

/// PKCS #11 settings for keeping the node's keys in an HSM
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HsmConfig {
    /// Address of the PKCS #11 proxy, when one is used
    #[serde(default)]
    pub pkcs11endpoint: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub pin: Option<String>,
}

impl std::fmt::Debug for HsmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HsmConfig")
            .field("pkcs11endpoint", &self.pkcs11endpoint)
            .field("label", &self.label)
            .field("pin", &self.pin.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HsmConfig {
    /// The BCCSP override that points the node at the HSM
    pub fn config_override(&self) -> Result<Value> {
        let (label, pin) = match (&self.label, &self.pin) {
            (Some(label), Some(pin)) => (label, pin),
            _ => {
                return Err(Error::ValidationError(
                    "hsm requires both label and pin".to_string(),
                ))
            }
        };
        Ok(json!({
            "General": {
                "BCCSP": {
                    "Default": "PKCS11",
                    "PKCS11": {
                        "Label": label,
                        "Pin": pin,
                    }
                }
            }
        }))
    }
}

/// Desired configuration of one ordering service node
///
/// `orderer_type` and `system_channel_id` stay unset unless the caller
/// declares them. Their defaults only apply when a node is created.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OrderingServiceNodeParams {
    #[serde(default)]
    pub state: DesiredState,

    /// Display name; the console lookup key
    pub name: String,

    /// Name of the ordering service the node joins
    #[serde(default)]
    pub ordering_service: Option<String>,

    #[serde(default)]
    pub msp_id: Option<String>,

    /// Consensus type; `raft` when a node is created without one
    #[serde(default)]
    pub orderer_type: Option<OrdererType>,

    /// System channel name; `testchainid` when a node is created without one
    #[serde(default)]
    pub system_channel_id: Option<String>,

    /// Path to the system channel config block used to join the node
    #[serde(default)]
    pub config_block: Option<PathBuf>,

    /// Display name of the CA to enroll against
    #[serde(default)]
    pub certificate_authority: Option<String>,

    #[serde(default)]
    pub enrollment_id: Option<String>,

    #[serde(default)]
    pub enrollment_secret: Option<String>,

    /// Base64 encoded PEM admin certificates
    #[serde(default, alias = "admin_certificates")]
    pub admins: Option<Vec<String>>,

    /// Complete crypto configuration; replaces CA enrollment
    #[serde(default)]
    pub crypto: Option<Value>,

    #[serde(default)]
    pub config_override: Option<Value>,

    #[serde(default)]
    pub resources: Option<Value>,

    #[serde(default)]
    pub storage: OrdererStorage,

    #[serde(default)]
    pub hsm: Option<HsmConfig>,

    #[serde(default)]
    pub zone: Option<String>,

    /// Exact version or version range
    #[serde(default)]
    pub version: Option<String>,

    /// Seconds to wait for the node to start
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout: u64,
}

fn default_wait_timeout() -> u64 {
    DEFAULT_WAIT_TIMEOUT_SECS
}

/// Resource requests applied to new nodes under the caller's resources
pub fn default_resources() -> Value {
    json!({
        "orderer": {
            "requests": {
                "cpu": "250m",
                "memory": "500M"
            }
        },
        "proxy": {
            "requests": {
                "cpu": "100m",
                "memory": "200M"
            }
        }
    })
}

impl std::fmt::Debug for OrderingServiceNodeParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderingServiceNodeParams")
            .field("state", &self.state)
            .field("name", &self.name)
            .field("ordering_service", &self.ordering_service)
            .field("msp_id", &self.msp_id)
            .field("orderer_type", &self.orderer_type)
            .field("system_channel_id", &self.system_channel_id)
            .field("config_block", &self.config_block)
            .field("certificate_authority", &self.certificate_authority)
            .field("enrollment_id", &self.enrollment_id)
            .field(
                "enrollment_secret",
                &self.enrollment_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("admins", &self.admins.as_ref().map(Vec::len))
            .field("crypto", &self.crypto.as_ref().map(|_| "<redacted>"))
            .field("config_override", &self.config_override)
            .field("resources", &self.resources)
            .field("storage", &self.storage)
            .field("hsm", &self.hsm)
            .field("zone", &self.zone)
            .field("version", &self.version)
            .field("wait_timeout", &self.wait_timeout)
            .finish()
    }
}

impl OrderingServiceNodeParams {
    /// Parameters for a node that only needs a name, everything else default
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: DesiredState::default(),
            name: name.into(),
            ordering_service: None,
            msp_id: None,
            orderer_type: None,
            system_channel_id: None,
            config_block: None,
            certificate_authority: None,
            enrollment_id: None,
            enrollment_secret: None,
            admins: None,
            crypto: None,
            config_override: None,
            resources: None,
            storage: OrdererStorage::default(),
            hsm: None,
            zone: None,
            version: None,
            wait_timeout: default_wait_timeout(),
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Checks that hold regardless of whether the node exists
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::ValidationError("name must not be empty".to_string()));
        }
        if let Some(hsm) = &self.hsm {
            hsm.config_override()?;
        }
        Ok(())
    }

    /// Additional checks before a node is created
    pub fn validate_for_create(&self) -> Result<()> {
        self.validate()?;

        for (field, missing) in [
            ("msp_id", self.msp_id.is_none()),
            ("ordering_service", self.ordering_service.is_none()),
        ] {
            if missing {
                return Err(Error::ValidationError(format!(
                    "{field} is required to create ordering service node {}",
                    self.name
                )));
            }
        }

        let ca_set = self.certificate_authority.is_some();
        match (ca_set, self.crypto.is_some()) {
            (true, true) => {
                return Err(Error::ValidationError(
                    "certificate_authority and crypto are mutually exclusive".to_string(),
                ))
            }
            (false, false) => {
                return Err(Error::ValidationError(
                    "one of certificate_authority or crypto is required".to_string(),
                ))
            }
            _ => {}
        }

        for (field, set) in [
            ("enrollment_id", self.enrollment_id.is_some()),
            ("enrollment_secret", self.enrollment_secret.is_some()),
            ("admins", self.admins.is_some()),
        ] {
            if ca_set && !set {
                return Err(Error::ValidationError(format!(
                    "certificate_authority and {field} must be specified together"
                )));
            }
        }

        Ok(())
    }
}
