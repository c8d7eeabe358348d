//! The abort signal.
//!
//! Any code running inside the pipeline can stop the request with a status
//! code and an optional cause. The usual route is a returned `Err(Abort)`,
//! which `?` carries up through helpers, middleware and handlers:
//!
//! ```rust
//! use http::StatusCode;
//! use mango::{abort, Abort, Context};
//!
//! fn require_admin(ctx: &Context) -> Result<(), Abort> {
//!     match ctx.request().header("x-role") {
//!         Some("admin") => Ok(()),
//!         _ => Err(abort(StatusCode::FORBIDDEN, "admins only")),
//!     }
//! }
//! ```
//!
//! Code that cannot return a `Result` (a closure passed to a foreign API, an
//! iterator adapter) can call [`Abort::raise`] instead. The nearest
//! [`Context::next`](crate::Context::next) frame intercepts either form the
//! same way.

use std::fmt;

use http::StatusCode;

use crate::error::BoxError;

/// Result alias used by handlers, middleware and binding helpers.
pub type Result<T, E = Abort> = std::result::Result<T, E>;

/// A request-scoped short-circuit: a status code plus an optional cause.
///
/// Without a cause the status is written with an empty body. With a cause
/// the app's error handler renders the response.
pub struct Abort {
    status: StatusCode,
    cause: Option<BoxError>,
}

/// Builds an [`Abort`] carrying `cause`.
pub fn abort(status: StatusCode, cause: impl Into<BoxError>) -> Abort {
    Abort { status, cause: Some(cause.into()) }
}

impl Abort {
    /// An abort that only sets the status code.
    pub fn new(status: StatusCode) -> Self {
        Self { status, cause: None }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Unwinds to the nearest pipeline frame carrying this signal.
    ///
    /// Never returns. Prefer returning `Err(self)` where the call site allows.
    pub fn raise(self) -> ! {
        std::panic::panic_any(self)
    }

    pub(crate) fn into_parts(self) -> (StatusCode, Option<BoxError>) {
        (self.status, self.cause)
    }
}

impl fmt::Debug for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Abort")
            .field("status", &self.status)
            .field("cause", &self.cause.as_ref().map(ToString::to_string))
            .finish()
    }
}

impl fmt::Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "aborted with {}: {cause}", self.status),
            None => write!(f, "aborted with {}", self.status),
        }
    }
}

impl From<StatusCode> for Abort {
    fn from(status: StatusCode) -> Self {
        Self::new(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_abort_has_no_cause() {
        let a = Abort::new(StatusCode::NO_CONTENT);
        assert_eq!(a.status(), StatusCode::NO_CONTENT);
        assert!(a.cause().is_none());
        assert_eq!(a.to_string(), "aborted with 204 No Content");
    }

    #[test]
    fn abort_keeps_cause_text() {
        let a = abort(StatusCode::BAD_REQUEST, "missing id");
        assert_eq!(a.cause().map(ToString::to_string).as_deref(), Some("missing id"));
        let (status, cause) = a.into_parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(cause.is_some());
    }

    #[test]
    fn raise_unwinds_with_the_signal_as_payload() {
        fn conflict() {
            Abort::new(StatusCode::CONFLICT).raise()
        }

        let payload = std::panic::catch_unwind(conflict).unwrap_err();
        let signal = payload.downcast::<Abort>().unwrap();
        assert_eq!(signal.status(), StatusCode::CONFLICT);
    }
}
