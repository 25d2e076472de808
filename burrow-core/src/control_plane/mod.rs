//! Control-plane API consumed by the tunnel
//!
//! The tunnel only needs four operations: create, get and delete a compute
//! instance (with its TLS service group), and resolve instance names to
//! private addresses. [`HttpControlPlane`] talks to the hosted API; tests
//! plug in their own implementation.

use async_trait::async_trait;
use burrow_common::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub mod http;

pub use http::HttpControlPlane;

/// Opaque handle of a compute instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub String);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    Pending,
    Running,
    Failed,
    Terminated,
}

/// A compute instance as reported by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub state: InstanceState,
    /// Public FQDN of the instance's service group, once assigned
    #[serde(default)]
    pub fqdn: Option<String>,
}

/// One public port of a service group and the instance port it maps to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    pub port: u16,
    pub target_port: u16,
    /// Terminate TLS at the service edge
    pub tls: bool,
}

impl ServicePort {
    pub fn tls(port: u16) -> Self {
        Self {
            port,
            target_port: port,
            tls: true,
        }
    }
}

/// Request to launch a compute instance behind a public service group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInstanceRequest {
    pub name: String,
    pub image: String,
    pub args: Vec<String>,
    pub services: Vec<ServicePort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn create_instance(&self, request: &CreateInstanceRequest) -> Result<Instance>;

    async fn get_instance(&self, id: &InstanceId) -> Result<Instance>;

    /// Deleting an instance that no longer exists is not an error.
    async fn delete_instance(&self, id: &InstanceId) -> Result<()>;

    /// Maps instance names or UUIDs to private addresses. Unknown names are
    /// absent from the returned map.
    async fn resolve_instances(&self, names: &[String]) -> Result<HashMap<String, String>>;
}
