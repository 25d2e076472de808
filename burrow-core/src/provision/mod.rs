//! Proxy instance lifecycle
//!
//! Provisioning turns a set of forwards into one running proxy instance:
//! allocate exposed ports, mint the session token, encode the proxy's
//! argument vector, create the instance behind a TLS service group and wait
//! for it to report ready. Teardown deletes it again.

use crate::auth::AuthToken;
use crate::control_plane::{
    ControlPlane, CreateInstanceRequest, InstanceId, InstanceState, ServicePort,
};
use crate::forward::ForwardSpec;
use burrow_common::{ProxyConfig, Result, TunnelError};
use burrow_protocol::{ProxyArgs, RouteToken};
use std::sync::Arc;
use tracing::{debug, error, info};

pub mod alloc;

pub use alloc::{allocate_exposed_ports, exposed_port, map_forwards, ExposedMapping};

/// Fresh 32-character session token.
pub fn generate_auth_token() -> AuthToken {
    AuthToken::generate()
}

/// Encodes the proxy's argument vector for `mappings`.
pub fn build_proxy_args(
    config: &ProxyConfig,
    token: &AuthToken,
    mappings: &[ExposedMapping],
) -> Result<ProxyArgs> {
    let routes = mappings
        .iter()
        .map(|m| {
            RouteToken::new(
                m.forward.transport,
                m.forward.target.as_str(),
                m.forward.remote_port,
                m.exposed_port,
                config.retry_budget,
            )
            .map_err(|e| TunnelError::parse(&m.forward.to_string(), e.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ProxyArgs {
        heartbeat_port: config.control_port,
        auth_timeout_secs: config.auth_timeout.as_secs(),
        auth_token: token.as_str().to_string(),
        idle_timeout_secs: config.idle_timeout.as_secs(),
        routes,
    })
}

/// A running proxy instance owned by this session
#[derive(Debug, Clone)]
pub struct ProxyInstance {
    pub id: InstanceId,
    pub fqdn: String,
    pub control_port: u16,
    pub auth_token: AuthToken,
    pub mappings: Vec<ExposedMapping>,
}

impl ProxyInstance {
    pub fn control_addr(&self) -> String {
        format!("{}:{}", self.fqdn, self.control_port)
    }

    pub fn exposed_addr(&self, exposed_port: u16) -> String {
        format!("{}:{}", self.fqdn, exposed_port)
    }
}

pub struct ProxyProvisioner {
    control_plane: Arc<dyn ControlPlane>,
    config: ProxyConfig,
}

impl ProxyProvisioner {
    pub fn new(control_plane: Arc<dyn ControlPlane>, config: ProxyConfig) -> Self {
        Self {
            control_plane,
            config,
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Creates a proxy instance serving `forwards` and waits until it is
    /// running.
    ///
    /// An instance that never becomes ready is deleted before the error is
    /// returned.
    pub async fn provision(&self, forwards: &[ForwardSpec]) -> Result<ProxyInstance> {
        let mappings = map_forwards(forwards, &self.config.proxy_ports, self.config.control_port)?;
        let auth_token = generate_auth_token();
        let args = build_proxy_args(&self.config, &auth_token, &mappings)?;

        let mut services: Vec<ServicePort> = mappings
            .iter()
            .map(|m| ServicePort::tls(m.exposed_port))
            .collect();
        services.push(ServicePort::tls(self.config.control_port));

        let request = CreateInstanceRequest {
            name: format!("burrow-proxy-{}", uuid::Uuid::new_v4().simple()),
            image: self.config.image.clone(),
            args: args.to_argv(),
            services,
            project: None,
        };
        debug!(routes = %args.routes_arg(), "Proxy routes");

        let instance = self.control_plane.create_instance(&request).await?;
        info!(instance = %instance.id, name = %request.name, "Proxy instance created");

        match self.wait_ready(&instance.id).await {
            Ok(fqdn) => {
                info!(instance = %instance.id, %fqdn, "Proxy instance ready");
                Ok(ProxyInstance {
                    id: instance.id,
                    fqdn,
                    control_port: self.config.control_port,
                    auth_token,
                    mappings,
                })
            }
            Err(e) => {
                self.delete(&instance.id).await;
                Err(e)
            }
        }
    }

    async fn wait_ready(&self, id: &InstanceId) -> Result<String> {
        let poll = async {
            loop {
                let instance = self.control_plane.get_instance(id).await?;
                let state = instance.state;
                match (state, instance.fqdn) {
                    (InstanceState::Running, Some(fqdn)) => return Ok(fqdn),
                    (InstanceState::Failed | InstanceState::Terminated, _) => {
                        return Err(TunnelError::InvalidState(format!(
                            "proxy instance {id} is {state:?}"
                        )))
                    }
                    _ => tokio::time::sleep(self.config.ready_poll_interval).await,
                }
            }
        };

        tokio::time::timeout(self.config.ready_timeout, poll)
            .await
            .map_err(|_| {
                TunnelError::Timeout(format!(
                    "proxy instance {id} not ready after {:?}",
                    self.config.ready_timeout
                ))
            })?
    }

    /// Deletes the instance. Failures are logged, never returned.
    pub async fn teardown(&self, instance: &ProxyInstance) {
        self.delete(&instance.id).await;
    }

    async fn delete(&self, id: &InstanceId) {
        match self.control_plane.delete_instance(id).await {
            Ok(()) => info!(instance = %id, "Proxy instance deleted"),
            Err(e) => error!(instance = %id, error = %e, "Failed to delete proxy instance"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_build_proxy_args() {
        let forwards = ForwardSpec::parse_all(&["8443:nginx:8080"]).unwrap();
        let mappings = map_forwards(&forwards, &[4444], 4443).unwrap();
        let token = AuthToken::new("T".repeat(32)).unwrap();
        let config = ProxyConfig::default();

        let argv = build_proxy_args(&config, &token, &mappings)
            .unwrap()
            .to_argv();
        assert_eq!(argv[0], "4443:10");
        assert_eq!(argv[1], format!("10:{}", "T".repeat(32)));
        assert_eq!(argv[2], "600");
        assert_eq!(argv[3], "[TCP2TCP:nginx:8080:4444:27]");
    }

    #[test]
    fn test_args_follow_config() {
        let forwards = ForwardSpec::parse_all(&["web:80", "db.internal:5432"]).unwrap();
        let config = ProxyConfig {
            proxy_ports: vec![7000, 7001],
            control_port: 7443,
            auth_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(90),
            retry_budget: 5,
            ..Default::default()
        };
        let mappings = map_forwards(&forwards, &config.proxy_ports, config.control_port).unwrap();
        let args = build_proxy_args(&config, &AuthToken::generate(), &mappings).unwrap();

        assert_eq!(args.heartbeat_port, 7443);
        assert_eq!(
            args.routes_arg(),
            "[TCP2TCP:web:80:7000:5|TCP2TCP:db.internal:5432:7001:5]"
        );
        assert_eq!(args.to_argv()[2], "90");
    }

    #[test]
    fn test_exposed_addr() {
        let instance = ProxyInstance {
            id: InstanceId("i-1".into()),
            fqdn: "p-1.burrow.dev".into(),
            control_port: 4443,
            auth_token: AuthToken::generate(),
            mappings: Vec::new(),
        };
        assert_eq!(instance.control_addr(), "p-1.burrow.dev:4443");
        assert_eq!(instance.exposed_addr(4444), "p-1.burrow.dev:4444");
    }
}
