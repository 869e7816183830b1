//! Operations console access
//!
//! The reconciler talks to the console only through the [`Console`] trait.
//! [`HttpConsole`] implements it against the console REST API.

mod http;
pub mod types;
pub mod version;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;

pub use http::{ConsoleConfig, HttpConsole};
pub use types::{
    CertificateAuthority, ComponentKind, ComponentState, CreateOrderingServiceRequest,
    HsmEndpoint, OrdererStorage, OrdererType, OrderingServiceNodeInfo, VolumeConfig,
};

/// Capabilities the reconciler needs from an operations console.
///
/// Implementations must not retry internally; a failed call is reported as
/// is and aborts the reconciliation.
#[async_trait]
pub trait Console: Send + Sync {
    /// Find a component by display name, including its deployment attributes
    async fn find_by_name(&self, kind: ComponentKind, name: &str)
        -> Result<Option<ComponentState>>;

    /// All nodes of the ordering service with the given cluster name
    async fn find_ordering_service(&self, cluster_name: &str) -> Result<Vec<ComponentState>>;

    async fn find_certificate_authority(&self, name: &str) -> Result<Option<CertificateAuthority>> {
        match self
            .find_by_name(ComponentKind::CertificateAuthority, name)
            .await?
        {
            Some(component) => CertificateAuthority::from_component(&component).map(Some),
            None => Ok(None),
        }
    }

    /// Create an ordering service node, returning the created node
    async fn create(&self, request: &CreateOrderingServiceRequest) -> Result<ComponentState>;

    /// Apply a partial update to a deployed node
    async fn update(&self, id: &str, changes: &Map<String, Value>) -> Result<ComponentState>;

    /// Remove a node and its deployment
    async fn delete(&self, id: &str) -> Result<()>;

    /// Remove a console entry that has no deployment behind it
    async fn delete_unmanaged(&self, id: &str) -> Result<()>;

    async fn edit_admin_certs(&self, id: &str, append: &[String], remove: &[String])
        -> Result<()>;

    /// Send a base64 encoded system channel config block to the node
    async fn submit_config_block(&self, id: &str, config_block: &str) -> Result<()>;

    /// Record that the node has joined the system channel consenter set
    async fn mark_joined(&self, id: &str) -> Result<ComponentState>;

    /// Turn an exact version or version range into a deployable version
    async fn resolve_version(&self, spec: &str) -> Result<String>;

    /// Block until the component is serving or `timeout` elapses
    async fn wait_until_ready(&self, id: &str, timeout: Duration) -> Result<()>;
}
