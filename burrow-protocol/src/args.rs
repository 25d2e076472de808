//! Launch arguments of the remote proxy process
//!
//! The proxy binary receives exactly four positional arguments:
//!
//! ```text
//! <heartbeatPort>:<authTimeoutSecs>
//! <authTimeoutSecs>:<authToken>
//! <idleTimeoutSecs>
//! [TCP2<PROTO>:<target>:<remotePort>:<exposedPort>:<retryBudget>|...]
//! ```
//!
//! Field order and delimiters are a compatibility contract with the deployed
//! proxy image. Changing them requires a new image version.

use crate::constants::ROUTE_PREFIX;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const ROUTE_SEPARATOR: char = '|';
const FIELD_SEPARATOR: char = ':';
const RESERVED_CHARS: &[char] = &[':', '|', '[', ']'];

/// Argument serialization errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgsError {
    #[error("expected {expected} arguments, got {got}")]
    ArgumentCount { expected: usize, got: usize },

    #[error("malformed field '{field}': {reason}")]
    Malformed { field: String, reason: &'static str },

    #[error("target '{0}' contains a reserved character")]
    ReservedCharacter(String),

    #[error("unknown transport '{0}'")]
    UnknownTransport(String),
}

/// Transport of a forwarded port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Tcp,
    Udp,
}

impl Transport {
    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Udp => "udp",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = ArgsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Transport::Tcp),
            "udp" => Ok(Transport::Udp),
            _ => Err(ArgsError::UnknownTransport(s.to_string())),
        }
    }
}

/// One routing instruction: exposed proxy port to private target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteToken {
    transport: Transport,
    target: String,
    remote_port: u16,
    exposed_port: u16,
    retry_budget: u32,
}

impl RouteToken {
    pub fn new(
        transport: Transport,
        target: impl Into<String>,
        remote_port: u16,
        exposed_port: u16,
        retry_budget: u32,
    ) -> Result<Self, ArgsError> {
        let target = target.into();
        if target.is_empty() {
            return Err(ArgsError::Malformed {
                field: target,
                reason: "empty target",
            });
        }
        if target.contains(RESERVED_CHARS) {
            return Err(ArgsError::ReservedCharacter(target));
        }
        Ok(Self {
            transport,
            target,
            remote_port,
            exposed_port,
            retry_budget,
        })
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    pub fn exposed_port(&self) -> u16 {
        self.exposed_port
    }

    pub fn retry_budget(&self) -> u32 {
        self.retry_budget
    }
}

impl fmt::Display for RouteToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{ROUTE_PREFIX}{}:{}:{}:{}:{}",
            self.transport.as_str().to_ascii_uppercase(),
            self.target,
            self.remote_port,
            self.exposed_port,
            self.retry_budget
        )
    }
}

impl FromStr for RouteToken {
    type Err = ArgsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason| ArgsError::Malformed {
            field: s.to_string(),
            reason,
        };

        let rest = s
            .strip_prefix(ROUTE_PREFIX)
            .ok_or_else(|| malformed("missing TCP2 prefix"))?;
        let fields: Vec<&str> = rest.split(FIELD_SEPARATOR).collect();
        let [transport, target, remote, exposed, retries] = fields[..] else {
            return Err(malformed("expected five ':'-separated fields"));
        };

        Self::new(
            transport.parse()?,
            target,
            remote.parse().map_err(|_| malformed("bad remote port"))?,
            exposed.parse().map_err(|_| malformed("bad exposed port"))?,
            retries.parse().map_err(|_| malformed("bad retry budget"))?,
        )
    }
}

/// Complete argument set for one proxy instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyArgs {
    pub heartbeat_port: u16,
    pub auth_timeout_secs: u64,
    pub auth_token: String,
    pub idle_timeout_secs: u64,
    pub routes: Vec<RouteToken>,
}

impl ProxyArgs {
    pub const ARG_COUNT: usize = 4;

    /// `[token|token|...]`
    pub fn routes_arg(&self) -> String {
        let joined = self
            .routes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(&ROUTE_SEPARATOR.to_string());
        format!("[{joined}]")
    }

    /// The ordered argument vector passed to the proxy process.
    pub fn to_argv(&self) -> Vec<String> {
        vec![
            format!("{}:{}", self.heartbeat_port, self.auth_timeout_secs),
            format!("{}:{}", self.auth_timeout_secs, self.auth_token),
            self.idle_timeout_secs.to_string(),
            self.routes_arg(),
        ]
    }

    /// Parses an argument vector as the proxy process would.
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Result<Self, ArgsError> {
        let [heartbeat, auth, idle, routes] = argv else {
            return Err(ArgsError::ArgumentCount {
                expected: Self::ARG_COUNT,
                got: argv.len(),
            });
        };
        let (heartbeat, auth, idle, routes) =
            (heartbeat.as_ref(), auth.as_ref(), idle.as_ref(), routes.as_ref());

        let malformed = |field: &str, reason| ArgsError::Malformed {
            field: field.to_string(),
            reason,
        };

        let (heartbeat_port, heartbeat_timeout) = heartbeat
            .split_once(FIELD_SEPARATOR)
            .ok_or_else(|| malformed(heartbeat, "expected port:timeout"))?;
        let heartbeat_port = heartbeat_port
            .parse()
            .map_err(|_| malformed(heartbeat, "bad heartbeat port"))?;
        let auth_timeout_secs: u64 = heartbeat_timeout
            .parse()
            .map_err(|_| malformed(heartbeat, "bad auth timeout"))?;

        let (auth_timeout, auth_token) = auth
            .split_once(FIELD_SEPARATOR)
            .ok_or_else(|| malformed(auth, "expected timeout:token"))?;
        if auth_timeout.parse::<u64>().ok() != Some(auth_timeout_secs) {
            return Err(malformed(auth, "auth timeout disagrees with heartbeat field"));
        }

        let idle_timeout_secs = idle
            .parse()
            .map_err(|_| malformed(idle, "bad idle timeout"))?;

        let inner = routes
            .strip_prefix('[')
            .and_then(|r| r.strip_suffix(']'))
            .ok_or_else(|| malformed(routes, "expected [..]"))?;
        let routes = if inner.is_empty() {
            Vec::new()
        } else {
            inner
                .split(ROUTE_SEPARATOR)
                .map(str::parse)
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(Self {
            heartbeat_port,
            auth_timeout_secs,
            auth_token: auth_token.to_string(),
            idle_timeout_secs,
            routes,
        })
    }
}
