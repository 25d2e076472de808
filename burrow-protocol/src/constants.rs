//! Protocol constants

/// Frame written on the control connection once per heartbeat interval.
pub const HEARTBEAT_PAYLOAD: &[u8; 9] = b"heartbeat";

/// Status code: connection admitted, the stream is now opaque payload.
pub const STATUS_ADMITTED: i16 = 1;

/// Status code: no spare backend connection on the proxy.
pub const STATUS_REJECTED: i16 = 0;

/// Status code written by the proxy for internal failures. Any negative value
/// is accepted on decode.
pub const STATUS_INTERNAL_ERROR: i16 = -1;

/// Size of the status field.
pub const STATUS_LEN: usize = 2;

/// Size of the error message length prefix.
pub const MESSAGE_LEN_PREFIX: usize = 4;

/// Upper bound on error messages accepted from the proxy (64 KiB).
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Prefix of every route token in the proxy argument list.
pub const ROUTE_PREFIX: &str = "TCP2";
