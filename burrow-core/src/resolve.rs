//! Target address resolution
//!
//! Targets that already are addresses (IP literals, or names under a
//! private DNS suffix) pass through. Everything else is treated as an
//! instance name or UUID and resolved through the control plane in a
//! single batched lookup.

use crate::control_plane::ControlPlane;
use burrow_common::constants::PRIVATE_DOMAIN_SUFFIXES;
use burrow_common::{Result, TunnelError};
use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

/// Whether `target` can be dialed by the proxy without a lookup.
pub fn is_address(target: &str) -> bool {
    let host = target
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(target);
    if host.parse::<IpAddr>().is_ok() {
        return true;
    }
    let lower = host.to_ascii_lowercase();
    PRIVATE_DOMAIN_SUFFIXES
        .iter()
        .any(|suffix| lower.ends_with(suffix) && lower.len() > suffix.len())
}

pub struct AddressResolver {
    control_plane: Arc<dyn ControlPlane>,
}

impl AddressResolver {
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self { control_plane }
    }

    /// Maps every target to the address the proxy should dial.
    ///
    /// Fails with [`TunnelError::NotFound`] naming every target the control
    /// plane did not know.
    pub async fn resolve<'a, I>(&self, targets: I) -> Result<HashMap<String, String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut resolved = HashMap::new();
        let mut lookup = BTreeSet::new();
        for target in targets {
            if is_address(target) {
                resolved.insert(target.to_string(), target.to_string());
            } else {
                lookup.insert(target.to_string());
            }
        }

        if lookup.is_empty() {
            return Ok(resolved);
        }

        let names: Vec<String> = lookup.into_iter().collect();
        debug!(count = names.len(), "Resolving instance names");
        let found = self.control_plane.resolve_instances(&names).await?;

        let missing: Vec<String> = names
            .iter()
            .filter(|name| !found.contains_key(*name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(TunnelError::NotFound(missing));
        }

        for name in names {
            if let Some(address) = found.get(&name) {
                debug!(%name, %address, "Resolved instance");
                resolved.insert(name, address.clone());
            }
        }
        Ok(resolved)
    }
}
