//! REST implementation of the console capabilities

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Map, Value};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::types::{ComponentKind, ComponentState, CreateOrderingServiceRequest};
use super::version;
use super::Console;
use crate::error::{Error, Result};

const API_PREFIX: &str = "ak/api/v3";
const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Connection settings for an operations console
#[derive(Clone, Debug)]
pub struct ConsoleConfig {
    pub api_endpoint: String,
    pub api_key: String,
    pub api_secret: Option<String>,
    pub api_timeout: Duration,
}

/// Console client using basic authentication
pub struct HttpConsole {
    http_client: Client,
    base_url: String,
    api_key: String,
    api_secret: Option<String>,
}

impl HttpConsole {
    pub fn new(config: ConsoleConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.api_timeout)
            .user_agent(concat!("fabric-ops/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            http_client,
            base_url: config.api_endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            api_secret: config.api_secret,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_PREFIX, path)
    }

    /// Send an authenticated request, turning non-2xx responses into
    /// `RemoteOperation` errors carrying the response body.
    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .basic_auth(&self.api_key, self.api_secret.as_ref())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(operation, %status, "Console request succeeded");
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        warn!(operation, %status, "Console request failed");
        Err(Error::RemoteOperation {
            operation: operation.to_string(),
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json(&self, operation: &str, request: RequestBuilder) -> Result<Value> {
        let response = self.send(operation, request).await?;
        Ok(response.json().await?)
    }

    async fn list_components(&self) -> Result<Vec<ComponentState>> {
        let url = self.url("components?deployment_attrs=included&cache=skip");
        let body = self
            .send_json("list_components", self.http_client.get(url))
            .await?;

        let components = match body {
            Value::Array(items) => items,
            Value::Object(mut fields) => match fields.remove("components") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        components
            .into_iter()
            .map(ComponentState::from_value)
            .collect()
    }

    async fn get_component(&self, id: &str) -> Result<ComponentState> {
        let url = self.url(&format!("components/{id}?deployment_attrs=included&cache=skip"));
        let body = self
            .send_json("get_component", self.http_client.get(url))
            .await?;
        ComponentState::from_value(body)
    }

    async fn available_orderer_versions(&self) -> Result<Vec<String>> {
        let body = self
            .send_json(
                "list_versions",
                self.http_client.get(self.url("kubernetes/fabric/versions")),
            )
            .await?;
        Ok(body
            .pointer("/versions/orderer")
            .and_then(Value::as_object)
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default())
    }
}

/// The create endpoint answers with the created nodes, in one of several
/// shapes depending on console release.
fn first_created(body: Value) -> Result<ComponentState> {
    let node = match body {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        Value::Object(mut fields) => match fields.remove("created") {
            Some(Value::Array(mut items)) if !items.is_empty() => items.swap_remove(0),
            Some(_) | None => Value::Object(fields),
        },
        other => {
            return Err(Error::ConfigError(format!(
                "unexpected create response: {other}"
            )))
        }
    };
    ComponentState::from_value(node)
}

#[async_trait]
impl Console for HttpConsole {
    async fn find_by_name(
        &self,
        kind: ComponentKind,
        name: &str,
    ) -> Result<Option<ComponentState>> {
        Ok(self.list_components().await?.into_iter().find(|component| {
            component.str_field("type") == Some(kind.api_type())
                && component.display_name() == Some(name)
        }))
    }

    async fn find_ordering_service(&self, cluster_name: &str) -> Result<Vec<ComponentState>> {
        Ok(self
            .list_components()
            .await?
            .into_iter()
            .filter(|component| {
                component.str_field("type") == Some(ComponentKind::Orderer.api_type())
                    && component.str_field("cluster_name") == Some(cluster_name)
            })
            .collect())
    }

    async fn create(&self, request: &CreateOrderingServiceRequest) -> Result<ComponentState> {
        let url = self.url("kubernetes/components/fabric-orderer");
        let body = self
            .send_json("create", self.http_client.post(url).json(request))
            .await?;
        first_created(body)
    }

    async fn update(&self, id: &str, changes: &Map<String, Value>) -> Result<ComponentState> {
        let url = self.url(&format!("kubernetes/components/fabric-orderer/{id}"));
        let body = self
            .send_json("update", self.http_client.put(url).json(changes))
            .await?;
        ComponentState::from_value(body)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let url = self.url(&format!("kubernetes/components/{id}"));
        self.send("delete", self.http_client.delete(url)).await?;
        Ok(())
    }

    async fn delete_unmanaged(&self, id: &str) -> Result<()> {
        let url = self.url(&format!("components/{id}"));
        self.send("delete_unmanaged", self.http_client.delete(url))
            .await?;
        Ok(())
    }

    async fn edit_admin_certs(&self, id: &str, append: &[String], remove: &[String]) -> Result<()> {
        let url = self.url(&format!("kubernetes/components/{id}/certs"));
        let body = json!({
            "append_admin_certs": append,
            "remove_admin_certs": remove,
        });
        self.send("edit_admin_certs", self.http_client.put(url).json(&body))
            .await?;
        Ok(())
    }

    async fn submit_config_block(&self, id: &str, config_block: &str) -> Result<()> {
        let url = self.url(&format!("kubernetes/components/fabric-orderer/{id}/config"));
        let body = json!({ "b64_block": config_block });
        self.send("submit_config_block", self.http_client.put(url).json(&body))
            .await?;
        Ok(())
    }

    async fn mark_joined(&self, id: &str) -> Result<ComponentState> {
        let url = self.url(&format!("components/fabric-orderer/{id}"));
        let body = json!({ "consenter_proposal_fin": true });
        let updated = self
            .send_json("mark_joined", self.http_client.put(url).json(&body))
            .await?;
        ComponentState::from_value(updated)
    }

    async fn resolve_version(&self, spec: &str) -> Result<String> {
        if !version::is_range(spec) {
            return Ok(spec.trim().to_string());
        }
        let available = self.available_orderer_versions().await?;
        let resolved = version::resolve_version(spec, &available)?;
        info!(spec, version = %resolved, "Resolved orderer version range");
        Ok(resolved)
    }

    async fn wait_until_ready(&self, id: &str, timeout: Duration) -> Result<()> {
        let component = self.get_component(id).await?;
        let operations_url = component.str_field("operations_url").ok_or_else(|| {
            Error::ConfigError(format!("component {id} has no operations_url"))
        })?;
        let health_url = format!("{}/healthz", operations_url.trim_end_matches('/'));

        info!(id, %health_url, timeout_secs = timeout.as_secs(), "Waiting for component to start");
        let deadline = Instant::now() + timeout;
        loop {
            match self.http_client.get(&health_url).send().await {
                Ok(response) if response.status().is_success() => {
                    info!(id, "Component is ready");
                    return Ok(());
                }
                Ok(response) => debug!(id, status = %response.status(), "Component not ready yet"),
                Err(e) => debug!(id, error = %e, "Component not reachable yet"),
            }

            if Instant::now() + READY_POLL_INTERVAL > deadline {
                return Err(Error::Timeout {
                    id: id.to_string(),
                    seconds: timeout.as_secs(),
                });
            }
            sleep(READY_POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_created_accepts_all_response_shapes() {
        let node = json!({"id": "os1", "display_name": "os"});
        for body in [
            json!([node.clone()]),
            json!({"created": [node.clone()]}),
            node.clone(),
        ] {
            assert_eq!(first_created(body).unwrap().id(), Some("os1"));
        }
        assert!(first_created(json!("ok")).is_err());
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let console = HttpConsole::new(ConsoleConfig {
            api_endpoint: "https://console.example.org:32000/".to_string(),
            api_key: "key".to_string(),
            api_secret: Some("secret".to_string()),
            api_timeout: Duration::from_secs(60),
        })
        .unwrap();
        assert_eq!(
            console.url("components"),
            "https://console.example.org:32000/ak/api/v3/components"
        );
    }
}
