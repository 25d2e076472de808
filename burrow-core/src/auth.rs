//! Session auth token handling

use burrow_common::constants::AUTH_TOKEN_LEN;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use std::fmt;
use subtle::ConstantTimeEq;

/// The per-session credential every connection presents to the proxy.
///
/// `Debug` is redacted so the token never reaches logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Fresh random alphanumeric token drawn from the OS CSPRNG.
    pub fn generate() -> Self {
        let token = OsRng
            .sample_iter(&Alphanumeric)
            .take(AUTH_TOKEN_LEN)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// Wraps an existing token after checking its format.
    pub fn new(token: impl Into<String>) -> Result<Self, TokenValidationError> {
        let token = token.into();
        validate_token_format(&token, 256)?;
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Constant-time match against bytes presented by a peer.
    pub fn matches(&self, presented: &[u8]) -> bool {
        constant_time_eq(self.as_bytes(), presented)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Constant-time comparison of two byte slices
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Validate token format
///
/// Tokens travel unframed on the wire, so they must be non-empty printable ASCII.
pub fn validate_token_format(token: &str, max_len: usize) -> Result<(), TokenValidationError> {
    if token.is_empty() {
        return Err(TokenValidationError::Empty);
    }
    if token.len() > max_len {
        return Err(TokenValidationError::TooLong {
            len: token.len(),
            max: max_len,
        });
    }
    if !token.chars().all(|c| c.is_ascii_graphic()) {
        return Err(TokenValidationError::InvalidCharacters);
    }
    Ok(())
}

/// Token validation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenValidationError {
    #[error("token is empty")]
    Empty,
    #[error("token too long: {len} bytes exceeds maximum of {max} bytes")]
    TooLong { len: usize, max: usize },
    #[error("token contains invalid characters")]
    InvalidCharacters,
}

impl From<TokenValidationError> for burrow_common::TunnelError {
    fn from(err: TokenValidationError) -> Self {
        burrow_common::TunnelError::Config(format!("invalid auth token: {err}"))
    }
}
