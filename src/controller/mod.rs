//! Controller for ordering service nodes
//! This module contains the declared parameters, the reconciliation state
//! machine and the reconciler that drives the console.

mod admin_certs;
pub mod params;
mod reconciler;
pub mod state;

pub use admin_certs::{compute_changes, desired_admin_certs, fingerprint, AdminCertChanges};
pub use params::{DesiredState, HsmConfig, OrderingServiceNodeParams};
pub use reconciler::{build_create_request, reconcile, ReconcileOutcome, PERMITTED_CHANGES};
pub use state::{classify, transition, Action, Phase, Step};
