//! Ordering service node reconciler
//!
//! Brings one ordering service node in the console to the declared state in
//! a single sequential pass. The pass classifies the observed record, walks
//! the state machine in [`super::state`] and issues one console call per
//! step. Nothing is retried; a failed call aborts the pass and the next run
//! picks up from whatever the console then reports.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use super::admin_certs::{compute_changes, desired_admin_certs, fingerprint};
use super::params::{
    default_resources, DesiredState, OrderingServiceNodeParams, DEFAULT_SYSTEM_CHANNEL_ID,
};
use super::state::{classify, transition, Action, Phase};
use crate::console::{
    ComponentKind, ComponentState, Console, CreateOrderingServiceRequest, HsmEndpoint,
    OrderingServiceNodeInfo,
};
use crate::error::{Error, Result};
use crate::tree;

/// Top-level fields an update may change on an existing node
pub const PERMITTED_CHANGES: [&str; 4] = ["resources", "config_override", "version", "crypto"];

/// Result of one reconciliation pass
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ReconcileOutcome {
    /// Whether any console mutation was made
    pub changed: bool,
    /// The node as it stands after the pass; `None` when it should not exist
    pub node: Option<OrderingServiceNodeInfo>,
    pub reconciled_at: DateTime<Utc>,
}

/// Reconcile one ordering service node against the console
#[instrument(skip(console, params), fields(name = %params.name, state = ?params.state))]
pub async fn reconcile(
    console: &dyn Console,
    params: &OrderingServiceNodeParams,
) -> Result<ReconcileOutcome> {
    params.validate()?;

    let observed = console
        .find_by_name(ComponentKind::Orderer, &params.name)
        .await?;
    let mut phase = classify(observed.as_ref());
    info!(%phase, "Observed ordering service node");

    // Creation may follow a corrupt entry's removal, so all create-time
    // validation happens before the first mutation.
    if params.state == DesiredState::Present
        && matches!(phase, Phase::Absent | Phase::PresentCorrupt)
    {
        params.validate_for_create()?;
    }

    let mut current = observed;
    let mut changed = false;

    while phase != Phase::Converged {
        let step = transition(phase, params.state);
        debug!(%phase, action = ?step.action, next = %step.next, "Reconcile step");

        match step.action {
            Action::None => {}
            Action::Delete => {
                let node = take_node(&mut current, step.action)?;
                let id = node.require_id()?;
                info!(id, "Deleting ordering service node");
                console.delete(id).await?;
                changed = true;
            }
            Action::DeleteUnmanaged => {
                let node = take_node(&mut current, step.action)?;
                let id = node.require_id()?;
                warn!(
                    id,
                    "Ordering service node exists in console but has no deployment, deleting it before continuing"
                );
                console.delete_unmanaged(id).await?;
                changed = true;
            }
            Action::Create => {
                current = Some(create_node(console, params).await?);
                changed = true;
            }
            Action::Update => {
                let node = take_node(&mut current, step.action)?;
                let (node, updated) = update_node(console, params, node).await?;
                current = Some(node);
                changed |= updated;
            }
            Action::Finalize => {
                let node = take_node(&mut current, step.action)?;
                let (node, finalized) = finalize_node(console, params, node).await?;
                current = Some(node);
                changed |= finalized;
            }
        }

        phase = step.next;
    }

    let node = match params.state {
        DesiredState::Present => current.as_ref().map(OrderingServiceNodeInfo::from_component),
        DesiredState::Absent => None,
    };

    info!(changed, "Reconciliation complete");
    Ok(ReconcileOutcome {
        changed,
        node,
        reconciled_at: Utc::now(),
    })
}

fn take_node(current: &mut Option<ComponentState>, action: Action) -> Result<ComponentState> {
    current
        .take()
        .ok_or_else(|| Error::ConfigError(format!("no ordering service node to {action:?}")))
}

async fn create_node(
    console: &dyn Console,
    params: &OrderingServiceNodeParams,
) -> Result<ComponentState> {
    let request = build_create_request(console, params).await?;
    info!(
        msp_id = %request.msp_id,
        cluster_id = %request.cluster_id,
        version = request.version.as_deref().unwrap_or("default"),
        "Creating ordering service node"
    );
    console.create(&request).await
}

/// Assemble the request for a one node ordering service joined to the
/// existing cluster.
pub async fn build_create_request(
    console: &dyn Console,
    params: &OrderingServiceNodeParams,
) -> Result<CreateOrderingServiceRequest> {
    let required = |field: &str, value: &Option<String>| {
        value
            .clone()
            .ok_or_else(|| Error::ValidationError(format!("{field} is required")))
    };
    let ordering_service = required("ordering_service", &params.ordering_service)?;
    let msp_id = required("msp_id", &params.msp_id)?;

    let nodes = console.find_ordering_service(&ordering_service).await?;
    let first = nodes.first().ok_or_else(|| {
        Error::ValidationError(format!("ordering service {ordering_service} does not exist"))
    })?;
    let cluster_field = |field: &str| {
        first.str_field(field).map(String::from).ok_or_else(|| {
            Error::ConfigError(format!(
                "ordering service {ordering_service} does not report {field}"
            ))
        })
    };
    let cluster_id = cluster_field("cluster_id")?;
    let cluster_name = cluster_field("cluster_name")?;

    let mut resources = default_resources();
    if let Some(overrides) = &params.resources {
        tree::merge(&mut resources, overrides);
    }

    let mut config_override = params.config_override.clone().unwrap_or_else(|| json!({}));
    let mut hsm = None;
    if let Some(hsm_config) = &params.hsm {
        tree::merge(&mut config_override, &hsm_config.config_override()?);
        hsm = hsm_config
            .pkcs11endpoint
            .as_ref()
            .filter(|endpoint| !endpoint.is_empty())
            .map(|endpoint| HsmEndpoint {
                pkcs11endpoint: endpoint.clone(),
            });
    }

    let version = match &params.version {
        Some(spec) => Some(console.resolve_version(spec).await?),
        None => None,
    };

    let crypto = match &params.crypto {
        Some(crypto) => crypto.clone(),
        None => enrollment_crypto(console, params).await?,
    };

    Ok(CreateOrderingServiceRequest {
        display_name: params.name.clone(),
        cluster_id,
        cluster_name,
        msp_id,
        orderer_type: params.orderer_type.unwrap_or_default(),
        system_channel_id: params
            .system_channel_id
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_CHANNEL_ID.to_string()),
        config_override: vec![config_override],
        resources,
        storage: params.storage.clone(),
        crypto: vec![crypto],
        hsm,
        zone: params.zone.clone().map(|zone| vec![zone]),
        version,
    })
}

/// Crypto configuration that enrolls the node's identity and TLS
/// certificate against the named certificate authority.
async fn enrollment_crypto(
    console: &dyn Console,
    params: &OrderingServiceNodeParams,
) -> Result<Value> {
    let ca_name = params.certificate_authority.as_deref().ok_or_else(|| {
        Error::ValidationError("one of certificate_authority or crypto is required".to_string())
    })?;
    let ca = console
        .find_certificate_authority(ca_name)
        .await?
        .ok_or_else(|| {
            Error::ValidationError(format!("certificate authority {ca_name} does not exist"))
        })?;

    let api_url = Url::parse(&ca.api_url).map_err(|e| {
        Error::ConfigError(format!(
            "certificate authority {ca_name} has invalid api_url {}: {e}",
            ca.api_url
        ))
    })?;
    let host = api_url.host_str().ok_or_else(|| {
        Error::ConfigError(format!("certificate authority {ca_name} api_url has no host"))
    })?;
    let port = api_url
        .port_or_known_default()
        .map(|port| port.to_string())
        .unwrap_or_default();

    debug!(ca = ca_name, host, port = %port, "Enrolling against certificate authority");

    let enrollment = |name: &str| {
        json!({
            "host": host,
            "port": port,
            "name": name,
            "tls_cert": ca.pem,
            "enroll_id": params.enrollment_id,
            "enroll_secret": params.enrollment_secret,
        })
    };

    Ok(json!({
        "enrollment": {
            "component": {
                "admincerts": params.admins,
            },
            "ca": enrollment(&ca.ca_name),
            "tlsca": enrollment(&ca.tlsca_name),
        }
    }))
}

/// The console reports fields it rejects when sent back
fn strip_read_only_resources(node: &mut Map<String, Value>) {
    if let Some(Value::Object(resources)) = node.get_mut("resources") {
        for container in ["orderer", "proxy"] {
            if let Some(Value::Object(requirements)) = resources.get_mut(container) {
                requirements.remove("limits");
            }
        }
        resources.remove("init");
    }
}

/// Caller-declared values to lay over the observed record
async fn update_overlay(
    console: &dyn Console,
    params: &OrderingServiceNodeParams,
    observed: &Map<String, Value>,
) -> Result<Map<String, Value>> {
    let mut overlay = Map::new();

    for (field, value) in [
        ("config_override", &params.config_override),
        ("resources", &params.resources),
        ("crypto", &params.crypto),
    ] {
        if let Some(value) = value {
            overlay.insert(field.to_string(), value.clone());
        }
    }

    if let Some(spec) = &params.version {
        let version = console.resolve_version(spec).await?;
        overlay.insert("version".to_string(), Value::String(version));
    }

    // Declared identity fields are compared so a mismatch is reported
    // instead of silently ignored.
    if let Some(msp_id) = &params.msp_id {
        overlay.insert("msp_id".to_string(), Value::String(msp_id.clone()));
    }
    let declared = [
        ("orderer_type", params.orderer_type.map(serde_json::to_value).transpose()?),
        ("system_channel_id", params.system_channel_id.clone().map(Value::String)),
    ];
    for (field, value) in declared {
        if let Some(value) = value {
            if observed.contains_key(field) {
                overlay.insert(field.to_string(), value);
            }
        }
    }

    Ok(overlay)
}

/// Apply permitted changes to an existing node. Returns the node as it
/// stands afterwards and whether an update was sent.
async fn update_node(
    console: &dyn Console,
    params: &OrderingServiceNodeParams,
    observed: ComponentState,
) -> Result<(ComponentState, bool)> {
    let id = observed.require_id()?.to_string();
    let mut current = observed.into_map();
    strip_read_only_resources(&mut current);

    let overlay = update_overlay(console, params, &current).await?;
    let mut desired = current.clone();
    tree::merge_maps(&mut desired, &overlay);

    let mut changes = tree::diff(&current, &desired);
    if let Some((field, new)) = changes
        .iter()
        .find(|(field, _)| !PERMITTED_CHANGES.contains(&field.as_str()))
    {
        return Err(Error::IllegalChange {
            field: field.clone(),
            old: current.get(field).cloned().unwrap_or(Value::Null),
            new: new.clone(),
        });
    }

    if changes.is_empty() {
        debug!(id = %id, "Ordering service node is up to date");
        return Ok((ComponentState::new(current), false));
    }

    // Partial resource updates are rejected, so send the whole subtree
    if params.resources.is_some() {
        if let Some(resources) = desired.get("resources") {
            changes.insert("resources".to_string(), resources.clone());
        }
    }

    info!(
        id = %id,
        fields = ?changes.keys().collect::<Vec<_>>(),
        "Differences detected, updating ordering service node"
    );
    let updated = console.update(&id, &changes).await?;
    Ok((updated, true))
}

/// Admin certificates, system channel join and readiness for a node that
/// now exists.
async fn finalize_node(
    console: &dyn Console,
    params: &OrderingServiceNodeParams,
    mut node: ComponentState,
) -> Result<(ComponentState, bool)> {
    let id = node.require_id()?.to_string();
    let mut changed = false;

    if let Some(desired) = desired_admin_certs(params) {
        match node.admin_certs() {
            None => debug!(id = %id, "Console does not report admin certificates, skipping"),
            Some(observed) => {
                let certs = compute_changes(&desired, &observed);
                if !certs.is_empty() {
                    let fingerprints =
                        |list: &[String]| list.iter().map(|c| fingerprint(c)).collect::<Vec<_>>();
                    info!(
                        id = %id,
                        append = ?fingerprints(&certs.append),
                        remove = ?fingerprints(&certs.remove),
                        "Updating admin certificates"
                    );
                    console
                        .edit_admin_certs(&id, &certs.append, &certs.remove)
                        .await?;
                    changed = true;
                }
            }
        }
    }

    if !node.consenter_proposal_fin() {
        if let Some(path) = &params.config_block {
            let block = tokio::fs::read(path).await?;
            info!(id = %id, path = %path.display(), bytes = block.len(), "Submitting system channel config block");
            console.submit_config_block(&id, &STANDARD.encode(block)).await?;
            node = console.mark_joined(&id).await?;
            changed = true;
        }
    }

    // Report what the console holds after the edits, not the last response
    if changed {
        node = console
            .find_by_name(ComponentKind::Orderer, &params.name)
            .await?
            .ok_or_else(|| {
                Error::ConfigError(format!(
                    "ordering service node {} disappeared while being finalized",
                    params.name
                ))
            })?;
    }

    if node.consenter_proposal_fin() {
        console
            .wait_until_ready(&id, Duration::from_secs(params.wait_timeout))
            .await?;
    } else {
        debug!(id = %id, "Node has not joined the system channel, not waiting for it");
    }

    Ok((node, changed))
}
