//! Embeddable tunnel session with builder pattern.
//!
//! # Example
//!
//! ```rust,no_run
//! use burrow::Session;
//! use burrow_common::ControlPlaneConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> burrow::Result<()> {
//! let session = Session::builder()
//!     .forward("8443:nginx:8080")
//!     .api(ControlPlaneConfig {
//!         api_token: Some("my-api-token".into()),
//!         ..Default::default()
//!     })
//!     .build()?;
//!
//! session.run(CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{ForwardInfo, SessionConfig, SessionInfo};
use burrow_common::{ControlPlaneConfig, Result, TlsConfig, TunnelError};
use burrow_core::control_plane::ControlPlane;
use burrow_core::{
    AddressResolver, ControlRelay, Dialer, ForwardSpec, HttpControlPlane, ProxyInstance,
    ProxyProvisioner, Relay, RelayConfig, TransportConfig,
};
use burrow_protocol::Transport;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A tunnel session: one proxy instance and its relays.
///
/// Use [`Session::builder()`] to create a new session.
pub struct Session {
    config: SessionConfig,
    control_plane: Arc<dyn ControlPlane>,
}

/// Builder for constructing a [`Session`].
#[derive(Default)]
pub struct SessionBuilder {
    config: SessionConfig,
    control_plane: Option<Arc<dyn ControlPlane>>,
    api: Option<ControlPlaneConfig>,
}

fn join_failure(what: &str, err: &JoinError) -> TunnelError {
    TunnelError::InvalidState(format!("{what} task failed: {err}"))
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Runs the session until `shutdown` fires or a fatal error occurs.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        self.run_with(shutdown, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `on_ready` once every relay accepts.
    ///
    /// Forwards are parsed and resolved before anything is provisioned.
    /// Once an instance exists it is deleted on every exit path, after the
    /// local listeners have closed.
    pub async fn run_with<F>(&self, shutdown: CancellationToken, on_ready: F) -> Result<()>
    where
        F: FnOnce(&SessionInfo),
    {
        let forwards = ForwardSpec::parse_all(&self.config.forwards)?;
        let addresses = AddressResolver::new(Arc::clone(&self.control_plane))
            .resolve(forwards.iter().map(|f| f.target.as_str()))
            .await?;
        let dialer = Dialer::new(&self.config.transport)
            .map_err(|e| TunnelError::Tls(format!("cannot prepare proxy transport: {e}")))?;

        let provisioner =
            ProxyProvisioner::new(Arc::clone(&self.control_plane), self.config.proxy.clone());
        let instance = provisioner.provision(&forwards).await?;

        let result = if shutdown.is_cancelled() {
            Ok(())
        } else {
            self.serve(&instance, &addresses, dialer, shutdown, on_ready)
                .await
        };

        provisioner.teardown(&instance).await;
        result
    }

    async fn serve<F>(
        &self,
        instance: &ProxyInstance,
        addresses: &HashMap<String, String>,
        dialer: Dialer,
        shutdown: CancellationToken,
        on_ready: F,
    ) -> Result<()>
    where
        F: FnOnce(&SessionInfo),
    {
        let session = shutdown.child_token();
        let handshake_timeout = self.config.proxy.auth_timeout;

        let control = ControlRelay::new(
            instance.control_addr(),
            instance.auth_token.clone(),
            dialer.clone(),
            self.config.heartbeat.clone(),
            handshake_timeout,
        )
        .with_connect_timeout(self.config.proxy.connect_timeout);
        let (ready_tx, ready_rx) = oneshot::channel();
        let mut control_task = tokio::spawn(control.run(ready_tx, session.clone()));

        tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                session.cancel();
                let _ = control_task.await;
                return Ok(());
            }
            ready = ready_rx => {
                if ready.is_err() {
                    return match control_task.await {
                        Ok(Err(e)) => Err(e),
                        Ok(Ok(())) => Err(TunnelError::Heartbeat(
                            "control relay stopped before becoming ready".into(),
                        )),
                        Err(e) => Err(join_failure("control relay", &e)),
                    };
                }
            }
        }

        let mut relays = JoinSet::new();
        let mut forwards = Vec::with_capacity(instance.mappings.len());
        let mut outcome = Ok(());

        for mapping in &instance.mappings {
            let forward = &mapping.forward;
            if forward.transport != Transport::Tcp {
                warn!(forward = %forward, "Skipping forward, only TCP is relayed");
                continue;
            }

            let address = addresses
                .get(&forward.target)
                .cloned()
                .unwrap_or_else(|| forward.target.clone());
            let via = instance.exposed_addr(mapping.exposed_port);
            let config = RelayConfig::new(forward.effective_local_port(), via.clone())
                .with_auth_token(instance.auth_token.clone())
                .with_instance(instance.id.clone())
                .with_target(format!("{address}:{}", forward.remote_port))
                .with_handshake_timeout(handshake_timeout)
                .with_connect_timeout(self.config.proxy.connect_timeout);

            match Relay::new(config, dialer.clone()).bind().await {
                Ok(bound) => {
                    forwards.push(ForwardInfo {
                        local_addr: bound.local_addr(),
                        target: forward.target.clone(),
                        address,
                        remote_port: forward.remote_port,
                        via,
                    });
                    relays.spawn(bound.serve(session.clone()));
                }
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        let mut control_done = false;
        if outcome.is_ok() {
            for forward in &forwards {
                info!("{forward}");
            }
            on_ready(&SessionInfo {
                instance_id: instance.id.clone(),
                fqdn: instance.fqdn.clone(),
                forwards,
            });

            outcome = loop {
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => {
                        info!("Shutting down session");
                        break Ok(());
                    }
                    control = &mut control_task => {
                        control_done = true;
                        break Err(match control {
                            Ok(Err(e)) => e,
                            Ok(Ok(())) => TunnelError::Heartbeat("control relay stopped".into()),
                            Err(e) => join_failure("control relay", &e),
                        });
                    }
                    Some(relay) = relays.join_next() => match relay {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => break Err(e),
                        Err(e) => break Err(join_failure("relay", &e)),
                    },
                }
            };
        }

        session.cancel();
        while relays.join_next().await.is_some() {}
        if !control_done {
            let _ = control_task.await;
        }
        outcome
    }
}

impl SessionBuilder {
    /// Add one forward, `[localPort:]target:remotePort[/proto]`.
    #[must_use]
    pub fn forward(mut self, spec: impl Into<String>) -> Self {
        self.config.forwards.push(spec.into());
        self
    }

    #[must_use]
    pub fn forwards<I, S>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.forwards.extend(specs.into_iter().map(Into::into));
        self
    }

    /// Exposed proxy ports: one per forward, or a single base port.
    ///
    /// Default: `[4444]`
    #[must_use]
    pub fn proxy_ports(mut self, ports: Vec<u16>) -> Self {
        self.config.proxy.proxy_ports = ports;
        self
    }

    /// Default: `4443`
    #[must_use]
    pub fn control_port(mut self, port: u16) -> Self {
        self.config.proxy.control_port = port;
        self
    }

    #[must_use]
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.config.proxy.image = image.into();
        self
    }

    /// Default: 10 seconds
    #[must_use]
    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.config.proxy.auth_timeout = timeout;
        self
    }

    /// Default: 600 seconds
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.proxy.idle_timeout = timeout;
        self
    }

    /// Default: 27
    #[must_use]
    pub fn retry_budget(mut self, budget: u32) -> Self {
        self.config.proxy.retry_budget = budget;
        self
    }

    #[must_use]
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.config.proxy.ready_timeout = timeout;
        self
    }

    /// Bound on reaching the proxy, TLS handshake included.
    ///
    /// Default: 10 seconds
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.proxy.connect_timeout = timeout;
        self
    }

    /// Default: 60 seconds
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat.interval = interval;
        self
    }

    /// Configure TLS towards the proxy.
    #[must_use]
    pub fn tls(mut self, config: TlsConfig) -> Self {
        self.config.transport = TransportConfig::Tls(config);
        self
    }

    /// Talk to the proxy without TLS. For local development only.
    #[must_use]
    pub fn plaintext(mut self) -> Self {
        self.config.transport = TransportConfig::Tcp;
        self
    }

    /// Use the hosted control-plane API.
    #[must_use]
    pub fn api(mut self, config: ControlPlaneConfig) -> Self {
        self.api = Some(config);
        self
    }

    /// Use a custom control-plane implementation.
    #[must_use]
    pub fn control_plane(mut self, control_plane: Arc<dyn ControlPlane>) -> Self {
        self.control_plane = Some(control_plane);
        self
    }

    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the session with the configured options.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or no control plane
    /// was given.
    pub fn build(self) -> Result<Session> {
        self.config.validate()?;
        let control_plane = match (self.control_plane, self.api) {
            (Some(control_plane), _) => control_plane,
            (None, Some(api)) => Arc::new(HttpControlPlane::new(&api)?),
            (None, None) => {
                return Err(TunnelError::Config(
                    "a control plane or API configuration is required".into(),
                ))
            }
        };
        Ok(Session {
            config: self.config,
            control_plane,
        })
    }
}
