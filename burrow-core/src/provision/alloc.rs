//! Exposed proxy port allocation

use crate::forward::ForwardSpec;
use burrow_common::{Result, TunnelError};
use std::collections::HashSet;

/// Exposed port for the `index`-th forward when counting up from `base`.
pub fn exposed_port(base: u16, index: usize) -> Result<u16> {
    u16::try_from(index)
        .ok()
        .and_then(|offset| base.checked_add(offset))
        .ok_or_else(|| {
            TunnelError::Config(format!(
                "exposed port for forward #{index} overflows from base port {base}"
            ))
        })
}

/// One exposed port per forward.
///
/// A list with exactly one entry per forward is used as given. A single
/// port is a base that counts up by forward index. Any other length is a
/// configuration error, as is a duplicate or a collision with `reserved`.
pub fn allocate_exposed_ports(
    proxy_ports: &[u16],
    count: usize,
    reserved: Option<u16>,
) -> Result<Vec<u16>> {
    let ports = match proxy_ports {
        [] => return Err(TunnelError::Config("no proxy ports configured".into())),
        ports if ports.len() == count => ports.to_vec(),
        [base] => (0..count)
            .map(|index| exposed_port(*base, index))
            .collect::<Result<Vec<_>>>()?,
        ports => {
            return Err(TunnelError::Config(format!(
                "{} proxy ports given for {count} forwards; pass one per forward or a single base port",
                ports.len()
            )))
        }
    };

    let mut seen = HashSet::with_capacity(ports.len());
    for &port in &ports {
        if port == 0 {
            return Err(TunnelError::Config("proxy port must not be 0".into()));
        }
        if Some(port) == reserved {
            return Err(TunnelError::Config(format!(
                "proxy port {port} collides with the control port"
            )));
        }
        if !seen.insert(port) {
            return Err(TunnelError::Config(format!("proxy port {port} used twice")));
        }
    }

    Ok(ports)
}

/// A forward paired with the proxy port that carries it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposedMapping {
    pub forward: ForwardSpec,
    pub exposed_port: u16,
}

/// Pairs each forward with its exposed port, preserving order.
pub fn map_forwards(
    forwards: &[ForwardSpec],
    proxy_ports: &[u16],
    control_port: u16,
) -> Result<Vec<ExposedMapping>> {
    let ports = allocate_exposed_ports(proxy_ports, forwards.len(), Some(control_port))?;
    Ok(forwards
        .iter()
        .cloned()
        .zip(ports)
        .map(|(forward, exposed_port)| ExposedMapping {
            forward,
            exposed_port,
        })
        .collect())
}
