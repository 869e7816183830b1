//! Membership service provider definitions and channel policies
//!
//! This module compiles an organization's certificates into the
//! configuration group Fabric channels use for access control, and reads
//! organizations back out of existing channel configuration.

pub mod config;
pub mod directory;
pub mod organization;
pub mod policy;


pub use config::{msp_to_organization, organization_to_msp, ConfigPolicy, MspConfigTree};
pub use directory::{write_msp_directory, Identity};
pub use organization::{FabricNodeOus, Organization, OuIdentifier};
pub use policy::{default_policy, MspRole, Policy, PolicyValue, Rule};
