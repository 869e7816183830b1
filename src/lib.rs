//! fabric-ops: declarative lifecycle automation for Hyperledger Fabric
//!
//! This crate reconciles ordering service nodes managed by an operations
//! console and compiles organization definitions into the MSP configuration
//! used in Fabric channel configuration.

pub mod console;
pub mod controller;
pub mod error;
pub mod msp;
pub mod telemetry;
pub mod tree;

pub use crate::error::{Error, Result};
