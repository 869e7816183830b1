//! Integration tests for the console REST client against a mock console

use std::time::Duration;

use fabric_ops::console::{
    ComponentKind, Console, ConsoleConfig, CreateOrderingServiceRequest, HttpConsole,
    OrdererStorage, OrdererType,
};
use fabric_ops::controller::{reconcile, OrderingServiceNodeParams};
use fabric_ops::Error;
use serde_json::{json, Map, Value};
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// base64("key:secret")
const BASIC_AUTH: &str = "Basic a2V5OnNlY3JldA==";

fn console_for(server: &MockServer) -> HttpConsole {
    HttpConsole::new(ConsoleConfig {
        api_endpoint: server.uri(),
        api_key: "key".to_string(),
        api_secret: Some("secret".to_string()),
        api_timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn cluster_components() -> Value {
    json!({
        "components": [
            {
                "id": "os1",
                "type": "fabric-orderer",
                "display_name": "Ordering Service_1",
                "cluster_id": "abcdefgh",
                "cluster_name": "Ordering Service",
                "msp_id": "OrdererOrgMSP",
                "consenter_proposal_fin": true
            },
            {
                "id": "peer1",
                "type": "fabric-peer",
                "display_name": "Ordering Service_2"
            },
            {
                "id": "ca1",
                "type": "fabric-ca",
                "display_name": "Orderer Org CA",
                "api_url": "https://ca.example.org:7054",
                "msp": {
                    "ca": {"name": "ca"},
                    "tlsca": {"name": "tlsca"},
                    "component": {"tls_cert": "Q0EgVExTIENFUlQ="}
                }
            }
        ]
    })
}

async fn mount_components(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/ak/api/v3/components"))
        .and(query_param("deployment_attrs", "included"))
        .and(query_param("cache", "skip"))
        .and(header("authorization", BASIC_AUTH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn create_request() -> CreateOrderingServiceRequest {
    CreateOrderingServiceRequest {
        display_name: "Ordering Service_2".to_string(),
        cluster_id: "abcdefgh".to_string(),
        cluster_name: "Ordering Service".to_string(),
        msp_id: "OrdererOrgMSP".to_string(),
        orderer_type: OrdererType::Raft,
        system_channel_id: "testchainid".to_string(),
        config_override: vec![json!({})],
        resources: json!({}),
        storage: OrdererStorage::default(),
        crypto: vec![json!({"msp": {}})],
        hsm: None,
        zone: None,
        version: None,
    }
}

#[tokio::test]
async fn test_find_by_name_filters_by_type() {
    let server = MockServer::start().await;
    mount_components(&server, cluster_components()).await;
    let console = console_for(&server);

    let orderer = console
        .find_by_name(ComponentKind::Orderer, "Ordering Service_1")
        .await
        .unwrap()
        .expect("orderer should be found");
    assert_eq!(orderer.id(), Some("os1"));

    // A peer shares the name but is not an orderer
    let missing = console
        .find_by_name(ComponentKind::Orderer, "Ordering Service_2")
        .await
        .unwrap();
    assert!(missing.is_none());

    let ca = console
        .find_certificate_authority("Orderer Org CA")
        .await
        .unwrap()
        .expect("CA should be found");
    assert_eq!(ca.ca_name, "ca");
    assert_eq!(ca.tlsca_name, "tlsca");
}

#[tokio::test]
async fn test_find_ordering_service_by_cluster_name() {
    let server = MockServer::start().await;
    mount_components(&server, cluster_components()).await;
    let console = console_for(&server);

    let nodes = console
        .find_ordering_service("Ordering Service")
        .await
        .unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].str_field("cluster_id"), Some("abcdefgh"));
}

#[tokio::test]
async fn test_error_status_becomes_remote_operation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ak/api/v3/components"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;
    let console = console_for(&server);

    let err = console
        .find_by_name(ComponentKind::Orderer, "os")
        .await
        .unwrap_err();

    match err {
        Error::RemoteOperation {
            operation,
            status,
            message,
        } => {
            assert_eq!(operation, "list_components");
            assert_eq!(status, 401);
            assert_eq!(message, "invalid api key");
        }
        other => panic!("expected RemoteOperation, got {other:?}"),
    }
}

#[tokio::test]
async fn test_create_returns_first_created_node() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ak/api/v3/kubernetes/components/fabric-orderer"))
        .and(body_partial_json(json!({
            "display_name": "Ordering Service_2",
            "orderer_type": "raft",
            "config_override": [{}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "created": [
                {"id": "os2", "display_name": "Ordering Service_2"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let console = console_for(&server);

    let node = console.create(&create_request()).await.unwrap();

    assert_eq!(node.id(), Some("os2"));
}

#[tokio::test]
async fn test_update_and_delete_paths() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/ak/api/v3/kubernetes/components/fabric-orderer/os2"))
        .and(body_json(json!({"version": "2.4.3"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "os2", "version": "2.4.3"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/ak/api/v3/kubernetes/components/os2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/ak/api/v3/components/os3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let console = console_for(&server);

    let mut changes = Map::new();
    changes.insert("version".to_string(), json!("2.4.3"));
    let updated = console.update("os2", &changes).await.unwrap();
    assert_eq!(updated.str_field("version"), Some("2.4.3"));

    console.delete("os2").await.unwrap();
    console.delete_unmanaged("os3").await.unwrap();
}

#[tokio::test]
async fn test_admin_certs_join_and_mark_joined() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/ak/api/v3/kubernetes/components/os2/certs"))
        .and(body_json(json!({
            "append_admin_certs": ["A"],
            "remove_admin_certs": ["C"]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/ak/api/v3/kubernetes/components/fabric-orderer/os2/config"))
        .and(body_json(json!({"b64_block": "Q09ORklH"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/ak/api/v3/components/fabric-orderer/os2"))
        .and(body_json(json!({"consenter_proposal_fin": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "os2",
            "consenter_proposal_fin": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    let console = console_for(&server);

    console
        .edit_admin_certs("os2", &["A".to_string()], &["C".to_string()])
        .await
        .unwrap();
    console.submit_config_block("os2", "Q09ORklH").await.unwrap();
    let joined = console.mark_joined("os2").await.unwrap();
    assert!(joined.consenter_proposal_fin());
}

#[tokio::test]
async fn test_version_range_queries_available_versions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ak/api/v3/kubernetes/fabric/versions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "versions": {
                "orderer": {
                    "1.4.12": {"default": false},
                    "2.2.5": {"default": true},
                    "2.4.3": {"default": false},
                    "3.0.0": {"default": false}
                },
                "peer": {
                    "2.5.0": {"default": false}
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    let console = console_for(&server);

    assert_eq!(console.resolve_version(">=2.2,<3.0").await.unwrap(), "2.4.3");
    // Exact versions do not hit the console
    assert_eq!(console.resolve_version("2.2.1").await.unwrap(), "2.2.1");
}

async fn mount_operations_url(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/ak/api/v3/components/os2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "os2",
            "operations_url": server.uri()
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_wait_until_ready_polls_healthz() {
    let server = MockServer::start().await;
    mount_operations_url(&server).await;
    Mock::given(method("GET"))
        .and(path("/healthz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "OK"})))
        .mount(&server)
        .await;
    let console = console_for(&server);

    console
        .wait_until_ready("os2", Duration::from_secs(5))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_wait_until_ready_times_out() {
    let server = MockServer::start().await;
    mount_operations_url(&server).await;
    Mock::given(method("GET"))
        .and(path("/healthz"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let console = console_for(&server);

    let err = console
        .wait_until_ready("os2", Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout { ref id, seconds: 1 } if id == "os2"));
}

#[tokio::test]
async fn test_reconcile_creates_node_through_console_api() {
    let server = MockServer::start().await;
    mount_components(&server, cluster_components()).await;
    Mock::given(method("POST"))
        .and(path("/ak/api/v3/kubernetes/components/fabric-orderer"))
        .and(body_partial_json(json!({
            "display_name": "Ordering Service_2",
            "cluster_id": "abcdefgh",
            "crypto": [{
                "enrollment": {
                    "ca": {"host": "ca.example.org", "port": "7054", "name": "ca"},
                    "tlsca": {"name": "tlsca"}
                }
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "os2",
            "type": "fabric-orderer",
            "display_name": "Ordering Service_2",
            "cluster_id": "abcdefgh",
            "cluster_name": "Ordering Service",
            "msp_id": "OrdererOrgMSP",
            "admin_certs": ["QURNSU4="],
            "consenter_proposal_fin": false
        }])))
        .expect(1)
        .mount(&server)
        .await;
    let console = console_for(&server);

    let params = OrderingServiceNodeParams {
        ordering_service: Some("Ordering Service".to_string()),
        msp_id: Some("OrdererOrgMSP".to_string()),
        certificate_authority: Some("Orderer Org CA".to_string()),
        enrollment_id: Some("orderer".to_string()),
        enrollment_secret: Some("ordererpw".to_string()),
        admins: Some(vec!["QURNSU4=".to_string()]),
        ..OrderingServiceNodeParams::new("Ordering Service_2")
    };

    let outcome = reconcile(&console, &params).await.unwrap();

    assert!(outcome.changed);
    let node = outcome.node.expect("node should be reported");
    assert_eq!(node.id, "os2");
    assert_eq!(node.cluster_name.as_deref(), Some("Ordering Service"));
}
