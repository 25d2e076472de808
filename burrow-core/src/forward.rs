//! Forward specifications: `[localPort:]target:remotePort[/proto]`

use burrow_common::{Result, TunnelError};
use burrow_protocol::Transport;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// One parsed forwarding argument
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForwardSpec {
    /// Instance name, UUID, private IP or private FQDN
    pub target: String,
    /// Local listening port, 0 means "same as the remote port"
    pub local_port: u16,
    /// Port on the target
    pub remote_port: u16,
    pub transport: Transport,
}

impl ForwardSpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let (rest, transport) = match spec.split_once('/') {
            Some((rest, proto)) => {
                let transport: Transport = proto
                    .parse()
                    .map_err(|_| TunnelError::parse(spec, format!("unknown protocol '{proto}'")))?;
                if transport != Transport::Tcp {
                    warn!(
                        spec = %spec,
                        "Only TCP is relayed at the moment, '{}' forwards will be skipped",
                        transport
                    );
                }
                (rest, transport)
            }
            None => (spec, Transport::Tcp),
        };

        let fields: Vec<&str> = rest.splitn(3, ':').collect();
        let (local_port, target, remote_port) = match fields[..] {
            [target, remote] => (0, target, remote),
            // An explicit 0 means the same as leaving the local port out
            [local, target, remote] => (parse_port(spec, local, "local port")?, target, remote),
            _ => {
                return Err(TunnelError::parse(
                    spec,
                    "expected [localPort:]target:remotePort[/proto]",
                ))
            }
        };

        if target.is_empty() {
            return Err(TunnelError::parse(spec, "target is empty"));
        }
        if target.parse::<u64>().is_ok() {
            return Err(TunnelError::parse(
                spec,
                format!("target '{target}' looks like a port, expected a name or address"),
            ));
        }

        let remote_port = parse_port(spec, remote_port, "remote port")?;
        if remote_port == 0 {
            return Err(TunnelError::parse(spec, "remote port must not be 0"));
        }

        Ok(Self {
            target: target.to_string(),
            local_port,
            remote_port,
            transport,
        })
    }

    /// Parses every argument, failing on the first malformed one.
    pub fn parse_all<S: AsRef<str>>(specs: &[S]) -> Result<Vec<Self>> {
        specs.iter().map(|s| Self::parse(s.as_ref())).collect()
    }

    /// Port the local listener binds.
    pub fn effective_local_port(&self) -> u16 {
        if self.local_port == 0 {
            self.remote_port
        } else {
            self.local_port
        }
    }
}

fn parse_port(spec: &str, value: &str, what: &str) -> Result<u16> {
    value
        .parse::<u16>()
        .map_err(|_| TunnelError::parse(spec, format!("{what} '{value}' is not a valid port")))
}

impl FromStr for ForwardSpec {
    type Err = TunnelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ForwardSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.local_port != 0 {
            write!(f, "{}:", self.local_port)?;
        }
        write!(f, "{}:{}/{}", self.target, self.remote_port, self.transport)
    }
}
