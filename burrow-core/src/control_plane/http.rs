//! JSON/HTTPS client for the hosted control-plane API

use super::{ControlPlane, CreateInstanceRequest, Instance, InstanceId};
use async_trait::async_trait;
use burrow_common::{ControlPlaneConfig, Result, TunnelError};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ResolveRequest<'a> {
    names: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ResolvedInstance {
    name: String,
    address: String,
}

#[derive(Debug, Deserialize)]
struct ResolveResponse {
    #[serde(default)]
    instances: Vec<ResolvedInstance>,
}

fn api_error(err: &reqwest::Error) -> TunnelError {
    TunnelError::ControlPlane {
        status: err.status().map(|s| s.as_u16()),
        message: err.to_string(),
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TunnelError::ControlPlane {
        status: Some(status.as_u16()),
        message: if body.is_empty() {
            status.to_string()
        } else {
            body
        },
    })
}

/// Control plane backed by the hosted REST API
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    client: reqwest::Client,
    endpoint: String,
    project: Option<String>,
}

impl HttpControlPlane {
    pub fn new(config: &ControlPlaneConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.api_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TunnelError::Config(format!("invalid API token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .user_agent(concat!("burrow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| api_error(&e))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            project: config.project.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.endpoint, path)
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn create_instance(&self, request: &CreateInstanceRequest) -> Result<Instance> {
        debug!(name = %request.name, image = %request.image, "Creating instance");
        let mut request = request.clone();
        if request.project.is_none() {
            request.project.clone_from(&self.project);
        }

        let response = self
            .client
            .post(self.url("instances"))
            .json(&request)
            .send()
            .await
            .map_err(|e| api_error(&e))?;
        check(response)
            .await?
            .json()
            .await
            .map_err(|e| api_error(&e))
    }

    async fn get_instance(&self, id: &InstanceId) -> Result<Instance> {
        let response = self
            .client
            .get(self.url(&format!("instances/{id}")))
            .send()
            .await
            .map_err(|e| api_error(&e))?;
        check(response)
            .await?
            .json()
            .await
            .map_err(|e| api_error(&e))
    }

    async fn delete_instance(&self, id: &InstanceId) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("instances/{id}")))
            .send()
            .await
            .map_err(|e| api_error(&e))?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(instance = %id, "Instance already deleted");
            return Ok(());
        }
        check(response).await.map(|_| ())
    }

    async fn resolve_instances(&self, names: &[String]) -> Result<HashMap<String, String>> {
        let response = self
            .client
            .post(self.url("instances/resolve"))
            .json(&ResolveRequest {
                names,
                project: self.project.as_deref(),
            })
            .send()
            .await
            .map_err(|e| api_error(&e))?;
        let resolved: ResolveResponse = check(response)
            .await?
            .json()
            .await
            .map_err(|e| api_error(&e))?;

        Ok(resolved
            .instances
            .into_iter()
            .map(|i| (i.name, i.address))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_plane::{InstanceState, ServicePort};

    #[test]
    fn test_url_building() {
        let config = ControlPlaneConfig {
            endpoint: "https://api.example.com/".into(),
            ..Default::default()
        };
        let api = HttpControlPlane::new(&config).unwrap();
        assert_eq!(api.url("instances"), "https://api.example.com/v1/instances");
    }

    #[test]
    fn test_invalid_token_is_config_error() {
        let config = ControlPlaneConfig {
            api_token: Some("bad\ntoken".into()),
            ..Default::default()
        };
        assert!(matches!(
            HttpControlPlane::new(&config),
            Err(TunnelError::Config(_))
        ));
    }

    #[test]
    fn test_wire_shapes() {
        let request = CreateInstanceRequest {
            name: "burrow-proxy".into(),
            image: "burrow/tcp-proxy:stable".into(),
            args: vec!["4443:10".into()],
            services: vec![ServicePort::tls(4444)],
            project: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["services"][0]["port"], 4444);
        assert_eq!(json["services"][0]["tls"], true);
        assert!(json.get("project").is_none());

        let instance: Instance = serde_json::from_str(
            r#"{"id":"i-123","state":"running","fqdn":"p-123.burrow.dev"}"#,
        )
        .unwrap();
        assert_eq!(instance.id, InstanceId("i-123".into()));
        assert_eq!(instance.state, InstanceState::Running);

        let resolved: ResolveResponse =
            serde_json::from_str(r#"{"instances":[{"name":"nginx","address":"10.0.0.5"}]}"#)
                .unwrap();
        assert_eq!(resolved.instances[0].address, "10.0.0.5");
    }
}
