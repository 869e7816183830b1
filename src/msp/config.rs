//! MSP compiler: Organization <-> channel configuration group
//!
//! The tree produced here is the organization group of a Fabric channel
//! configuration, in the JSON form `configtxlator` reads and writes. Its
//! shape is fixed by Fabric and must not drift.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::organization::{FabricNodeOus, Organization, OuIdentifier};
use super::policy::{
    default_admins_policy, default_endorsement_policy, default_readers_policy,
    default_writers_policy, Policy, ADMINS_POLICY, ENDORSEMENT_POLICY, READERS_POLICY,
    WRITERS_POLICY,
};
use crate::error::{Error, Result};

/// Key of the MSP entry under `values`
pub const MSP_VALUE_KEY: &str = "MSP";

/// MSP type for X.509 based MSPs
pub const FABRIC_MSP_TYPE: i32 = 0;

pub const IDENTITY_IDENTIFIER_HASH_FUNCTION: &str = "SHA256";
pub const SIGNATURE_HASH_FAMILY: &str = "SHA2";

/// Organization group of a channel configuration
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct MspConfigTree {
    #[serde(default)]
    pub groups: Map<String, Value>,
    pub mod_policy: String,
    pub policies: BTreeMap<String, ConfigPolicy>,
    pub values: MspValues,
}

/// A named policy together with the policy that governs changing it
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ConfigPolicy {
    pub mod_policy: String,
    pub policy: Policy,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct MspValues {
    #[serde(rename = "MSP")]
    pub msp: MspValue,
    /// Other organization values (e.g. AnchorPeers) are carried through
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct MspValue {
    pub mod_policy: String,
    pub value: MspValueBody,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct MspValueBody {
    pub config: MspConfig,
    #[serde(rename = "type")]
    pub msp_type: i32,
}

/// The `FabricMSPConfig` message
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct MspConfig {
    #[serde(default)]
    pub admins: Vec<String>,
    pub crypto_config: CryptoConfig,
    #[serde(default)]
    pub fabric_node_ous: Option<FabricNodeOus>,
    #[serde(default)]
    pub intermediate_certs: Vec<String>,
    pub name: String,
    #[serde(default)]
    pub organizational_unit_identifiers: Vec<OuIdentifier>,
    #[serde(default)]
    pub revocation_list: Vec<String>,
    #[serde(default)]
    pub root_certs: Vec<String>,
    /// Never set by this crate; local signing identities do not belong in
    /// channel configuration
    #[serde(default)]
    pub signing_identity: Option<Value>,
    #[serde(default)]
    pub tls_intermediate_certs: Vec<String>,
    #[serde(default)]
    pub tls_root_certs: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct CryptoConfig {
    pub identity_identifier_hash_function: String,
    pub signature_hash_family: String,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            identity_identifier_hash_function: IDENTITY_IDENTIFIER_HASH_FUNCTION.to_string(),
            signature_hash_family: SIGNATURE_HASH_FAMILY.to_string(),
        }
    }
}

impl MspConfigTree {
    /// Parse a tree, reporting structural problems as `MalformedMsp`
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(|e| Error::MalformedMsp(e.to_string()))
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Extract the organization described by this tree
    pub fn organization(&self, msp_id: &str) -> Organization {
        let config = &self.values.msp.value.config;
        Organization {
            msp_id: msp_id.to_string(),
            root_certs: config.root_certs.clone(),
            intermediate_certs: config.intermediate_certs.clone(),
            admins: config.admins.clone(),
            revocation_list: config.revocation_list.clone(),
            tls_root_certs: config.tls_root_certs.clone(),
            tls_intermediate_certs: config.tls_intermediate_certs.clone(),
            fabric_node_ous: config.fabric_node_ous.clone(),
            organizational_unit_identifiers: config.organizational_unit_identifiers.clone(),
        }
    }
}

fn admin_governed(policy: Policy) -> ConfigPolicy {
    ConfigPolicy {
        mod_policy: ADMINS_POLICY.to_string(),
        policy,
    }
}

/// Compile an organization into its channel configuration group.
///
/// Admins, Readers and Writers policies are always present. The Endorsement
/// policy is only added when requested, as it is meaningless for ordering
/// organizations. `extra_policies` are added last and replace any default of
/// the same name.
pub fn organization_to_msp(
    organization: &Organization,
    endorsement_policy_required: bool,
    extra_policies: &BTreeMap<String, Policy>,
) -> Result<MspConfigTree> {
    let msp_id = organization.msp_id.as_str();

    let mut policies = BTreeMap::new();
    policies.insert(
        ADMINS_POLICY.to_string(),
        admin_governed(default_admins_policy(msp_id)),
    );
    policies.insert(
        READERS_POLICY.to_string(),
        admin_governed(default_readers_policy(msp_id)),
    );
    policies.insert(
        WRITERS_POLICY.to_string(),
        admin_governed(default_writers_policy(msp_id)),
    );
    if endorsement_policy_required {
        policies.insert(
            ENDORSEMENT_POLICY.to_string(),
            admin_governed(default_endorsement_policy(msp_id)),
        );
    }

    for (name, policy) in extra_policies {
        policy
            .validate()
            .map_err(|e| Error::ValidationError(format!("policy {name}: {e}")))?;
        debug!(msp_id, policy = %name, "Adding caller supplied policy");
        policies.insert(name.clone(), admin_governed(policy.clone()));
    }

    let config = MspConfig {
        admins: organization.admins.clone(),
        crypto_config: CryptoConfig::default(),
        fabric_node_ous: organization.fabric_node_ous.clone(),
        intermediate_certs: organization.intermediate_certs.clone(),
        name: msp_id.to_string(),
        organizational_unit_identifiers: organization.organizational_unit_identifiers.clone(),
        revocation_list: organization.revocation_list.clone(),
        root_certs: organization.root_certs.clone(),
        signing_identity: None,
        tls_intermediate_certs: organization.tls_intermediate_certs.clone(),
        tls_root_certs: organization.tls_root_certs.clone(),
    };

    Ok(MspConfigTree {
        groups: Map::new(),
        mod_policy: ADMINS_POLICY.to_string(),
        policies,
        values: MspValues {
            msp: MspValue {
                mod_policy: ADMINS_POLICY.to_string(),
                value: MspValueBody {
                    config,
                    msp_type: FABRIC_MSP_TYPE,
                },
            },
            extra: Map::new(),
        },
    })
}

/// The parts of `FabricMSPConfig` that describe an organization
#[derive(Deserialize)]
struct ExtractedConfig {
    #[serde(default)]
    admins: Vec<String>,
    #[serde(default)]
    fabric_node_ous: Option<FabricNodeOus>,
    #[serde(default)]
    intermediate_certs: Vec<String>,
    #[serde(default)]
    organizational_unit_identifiers: Vec<OuIdentifier>,
    #[serde(default)]
    revocation_list: Vec<String>,
    #[serde(default)]
    root_certs: Vec<String>,
    #[serde(default)]
    tls_intermediate_certs: Vec<String>,
    #[serde(default)]
    tls_root_certs: Vec<String>,
}

/// Extract an organization from a channel configuration group.
///
/// Only `values.MSP.value.config` is read; the rest of the tree may be in any
/// shape. The returned organization never carries a signing identity.
pub fn msp_to_organization(msp_id: &str, msp: &Value) -> Result<Organization> {
    let msp_value = msp
        .get("values")
        .and_then(|values| values.get(MSP_VALUE_KEY))
        .ok_or_else(|| Error::MalformedMsp(format!("{msp_id}: missing values.MSP")))?;
    let config = msp_value
        .get("value")
        .and_then(|value| value.get("config"))
        .ok_or_else(|| Error::MalformedMsp(format!("{msp_id}: missing values.MSP.value.config")))?;

    let config: ExtractedConfig = serde_json::from_value(config.clone())
        .map_err(|e| Error::MalformedMsp(format!("{msp_id}: {e}")))?;

    Ok(Organization {
        msp_id: msp_id.to_string(),
        root_certs: config.root_certs,
        intermediate_certs: config.intermediate_certs,
        admins: config.admins,
        revocation_list: config.revocation_list,
        tls_root_certs: config.tls_root_certs,
        tls_intermediate_certs: config.tls_intermediate_certs,
        fabric_node_ous: config.fabric_node_ous,
        organizational_unit_identifiers: config.organizational_unit_identifiers,
    })
}
