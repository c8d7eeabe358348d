//! Unified error type.

use thiserror::Error;

/// Open-ended failure cause carried by an [`Abort`](crate::Abort) and handed
/// to the error handler.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by mango's fallible operations.
///
/// Application-level errors (400, 422, etc.) travel as [`Abort`](crate::Abort)
/// signals and end up as HTTP responses, not as `Error`s. This type surfaces
/// infrastructure failures: resolving the listen address, binding to a port.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid listen address `{addr}`: {source}")]
    InvalidAddr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
}
