//! Fabric channel policy types and the default policy encoder
//!
//! Policies serialize to the JSON form of Fabric's `common.Policy` message as
//! produced by `configtxlator`, so they can be spliced straight into a
//! channel configuration update.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fabric policy type for signature policies
pub const SIGNATURE_POLICY_TYPE: i32 = 1;

/// Fabric policy type for implicit meta policies
pub const IMPLICIT_META_POLICY_TYPE: i32 = 3;

/// Name of the policy that governs modification of organization config
pub const ADMINS_POLICY: &str = "Admins";
pub const READERS_POLICY: &str = "Readers";
pub const WRITERS_POLICY: &str = "Writers";
pub const ENDORSEMENT_POLICY: &str = "Endorsement";

/// A channel policy
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Policy {
    /// Policy type discriminator (1 = signature, 3 = implicit meta)
    #[serde(rename = "type")]
    pub policy_type: i32,
    pub value: PolicyValue,
}

/// Body of a policy, shaped by the policy type
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PolicyValue {
    Signature(SignaturePolicy),
    ImplicitMeta(ImplicitMetaPolicy),
}

/// An n-of-m threshold over a list of principals
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SignaturePolicy {
    pub identities: Vec<Principal>,
    pub rule: Rule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
}

/// Aggregation over the same-named sub-policies of child groups
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ImplicitMetaPolicy {
    /// ANY, ALL or MAJORITY
    pub rule: String,
    pub sub_policy: String,
}

/// An identity matcher
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Principal {
    pub principal: RolePrincipal,
    pub principal_classification: PrincipalClassification,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct RolePrincipal {
    pub msp_identifier: String,
    pub role: MspRole,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MspRole {
    Member,
    Admin,
    Client,
    Peer,
    Orderer,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrincipalClassification {
    #[default]
    Role,
    OrganizationUnit,
    Identity,
}

/// A signature rule. `signed_by` refers to a principal by position.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    SignedBy(usize),
    NOutOf(NOutOf),
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct NOutOf {
    pub n: usize,
    pub rules: Vec<Rule>,
}

impl Policy {
    /// Check structural invariants of a signature policy.
    ///
    /// Every `signed_by` index must point into the principal list and every
    /// threshold must be satisfiable by its rules. Implicit meta policies are
    /// accepted as-is.
    pub fn validate(&self) -> Result<()> {
        match &self.value {
            PolicyValue::Signature(signature) => {
                if self.policy_type != SIGNATURE_POLICY_TYPE {
                    return Err(Error::ValidationError(format!(
                        "signature policy body with policy type {}",
                        self.policy_type
                    )));
                }
                signature.rule.validate(signature.identities.len())
            }
            PolicyValue::ImplicitMeta(_) => {
                if self.policy_type != IMPLICIT_META_POLICY_TYPE {
                    return Err(Error::ValidationError(format!(
                        "implicit meta policy body with policy type {}",
                        self.policy_type
                    )));
                }
                Ok(())
            }
        }
    }
}

impl Rule {
    fn validate(&self, principals: usize) -> Result<()> {
        match self {
            Rule::SignedBy(index) if *index >= principals => Err(Error::ValidationError(format!(
                "signed_by index {index} out of range for {principals} principal(s)"
            ))),
            Rule::SignedBy(_) => Ok(()),
            Rule::NOutOf(n_out_of) => {
                if n_out_of.n > n_out_of.rules.len() {
                    return Err(Error::ValidationError(format!(
                        "n_out_of threshold {} exceeds {} rule(s)",
                        n_out_of.n,
                        n_out_of.rules.len()
                    )));
                }
                n_out_of
                    .rules
                    .iter()
                    .try_for_each(|rule| rule.validate(principals))
            }
        }
    }
}

/// Build the canonical 1-of-1 signature policy over a single role principal.
pub fn default_policy(msp_id: &str, role: MspRole) -> Policy {
    Policy {
        policy_type: SIGNATURE_POLICY_TYPE,
        value: PolicyValue::Signature(SignaturePolicy {
            identities: vec![Principal {
                principal: RolePrincipal {
                    msp_identifier: msp_id.to_string(),
                    role,
                },
                principal_classification: PrincipalClassification::Role,
            }],
            rule: Rule::NOutOf(NOutOf {
                n: 1,
                rules: vec![Rule::SignedBy(0)],
            }),
            version: None,
        }),
    }
}

pub fn default_admins_policy(msp_id: &str) -> Policy {
    default_policy(msp_id, MspRole::Admin)
}

pub fn default_readers_policy(msp_id: &str) -> Policy {
    default_policy(msp_id, MspRole::Member)
}

pub fn default_writers_policy(msp_id: &str) -> Policy {
    default_policy(msp_id, MspRole::Member)
}

pub fn default_endorsement_policy(msp_id: &str) -> Policy {
    default_policy(msp_id, MspRole::Member)
}
