//! Outgoing responses and the status-observing sink they write to.
//!
//! A handler returns something that implements [`Response`]. The pipeline
//! sends it exactly once through the request's [`ResponseWriter`], which
//! remembers the status that reached the wire so the error handler and
//! middleware can inspect it afterwards.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use tracing::debug;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

// ── Response ─────────────────────────────────────────────────────────────────

/// A value that knows how to write itself to a [`ResponseWriter`].
///
/// Built-in shapes: [`Text`] (via [`text`]) and [`Json`](crate::json::Json)
/// (via [`json::ok`](crate::json::ok) / [`json::response`](crate::json::response)).
/// Implement it on your own types to stream anything else:
///
/// ```rust
/// use std::io::Write;
/// use http::StatusCode;
/// use mango::{Response, ResponseWriter};
///
/// struct Csv(Vec<[String; 2]>);
///
/// impl Response for Csv {
///     fn send(self: Box<Self>, w: &mut ResponseWriter) {
///         w.headers_mut().insert("content-type", "text/csv".parse().unwrap());
///         w.write_header(StatusCode::OK);
///         for [a, b] in self.0 {
///             let _ = writeln!(w, "{a},{b}");
///         }
///     }
/// }
/// ```
pub trait Response: Send {
    fn send(self: Box<Self>, w: &mut ResponseWriter);
}

/// A type-erased response, as returned by the error handler.
pub type BoxResponse = Box<dyn Response>;

/// Conversion into a [`BoxResponse`]. Handlers may return any implementor.
pub trait IntoResponse {
    fn into_response(self) -> BoxResponse;
}

impl<R: Response + 'static> IntoResponse for R {
    fn into_response(self) -> BoxResponse { Box::new(self) }
}

impl Response for BoxResponse {
    fn send(self: Box<Self>, w: &mut ResponseWriter) { (*self).send(w) }
}

// ── Text ─────────────────────────────────────────────────────────────────────

/// A plain-text response: `text/plain; charset=utf-8`.
#[derive(Debug, Clone)]
pub struct Text {
    status: StatusCode,
    body: String,
}

/// Builds a plain-text response.
pub fn text(status: StatusCode, body: impl Into<String>) -> Text {
    Text { status, body: body.into() }
}

impl Response for Text {
    fn send(self: Box<Self>, w: &mut ResponseWriter) {
        w.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
        w.write_header(self.status);
        w.write_bytes(self.body.as_bytes());
    }
}

/// `200 OK` with the string as body.
impl Response for String {
    fn send(self: Box<Self>, w: &mut ResponseWriter) {
        Box::new(text(StatusCode::OK, *self)).send(w)
    }
}

impl Response for &'static str {
    fn send(self: Box<Self>, w: &mut ResponseWriter) {
        Box::new(text(StatusCode::OK, *self)).send(w)
    }
}

/// Return a bare status from a handler: `Ok(StatusCode::NO_CONTENT)`.
impl Response for StatusCode {
    fn send(self: Box<Self>, w: &mut ResponseWriter) {
        w.write_header(*self);
    }
}

// ── ResponseWriter ───────────────────────────────────────────────────────────

/// The sink a [`Response`] writes to.
///
/// Status-observing: the first [`write_header`](Self::write_header) commits
/// the status and records it; later calls are ignored. Writing body bytes
/// before any status commits `200 OK`, as HTTP servers conventionally do.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    committed: bool,
    finished: bool,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ResponseWriter {
    pub fn new() -> Self { Self::default() }

    /// Headers to send. Changes after the status is committed still apply,
    /// since nothing reaches the socket before the pipeline returns.
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }

    pub fn headers(&self) -> &HeaderMap { &self.headers }

    /// Commits the status line.
    pub fn write_header(&mut self, status: StatusCode) {
        if self.committed {
            debug!(
                committed = %self.status.unwrap_or(StatusCode::OK),
                ignored = %status,
                "superfluous write_header call"
            );
            return;
        }
        self.committed = true;
        self.status = Some(status);
    }

    /// Appends to the body, committing `200 OK` first if nothing else was.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if !self.committed {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(bytes);
    }

    /// The observed status: committed, or recorded by the abort path ahead of
    /// rendering. `None` until either happens.
    pub fn status(&self) -> Option<StatusCode> { self.status }

    pub fn is_committed(&self) -> bool { self.committed }

    /// Records a status without committing it, so the error handler can read
    /// what the request is about to fail with.
    pub(crate) fn observe(&mut self, status: StatusCode) {
        if !self.committed {
            self.status = Some(status);
        }
    }

    pub(crate) fn is_finished(&self) -> bool { self.finished }

    pub(crate) fn finish(&mut self) { self.finished = true; }

    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(Bytes::from(self.body)));
        *res.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *res.headers_mut() = self.headers;
        res
    }
}

impl std::io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.write_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sent(r: impl IntoResponse) -> ResponseWriter {
        let mut w = ResponseWriter::new();
        r.into_response().send(&mut w);
        w
    }

    #[test]
    fn text_sets_content_type_and_status() {
        let w = sent(text(StatusCode::CREATED, "made"));
        assert_eq!(w.status(), Some(StatusCode::CREATED));
        assert_eq!(w.headers()[CONTENT_TYPE], TEXT_PLAIN);
        assert_eq!(w.body, b"made");
    }

    #[test]
    fn first_status_wins() {
        let mut w = ResponseWriter::new();
        w.write_header(StatusCode::ACCEPTED);
        w.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(w.status(), Some(StatusCode::ACCEPTED));
    }

    #[test]
    fn body_without_status_commits_ok() {
        let mut w = ResponseWriter::new();
        std::io::Write::write_all(&mut w, b"hi").unwrap();
        assert!(w.is_committed());
        assert_eq!(w.status(), Some(StatusCode::OK));
    }

    #[test]
    fn observed_status_yields_to_the_committed_one() {
        let mut w = ResponseWriter::new();
        w.observe(StatusCode::BAD_REQUEST);
        assert_eq!(w.status(), Some(StatusCode::BAD_REQUEST));
        assert!(!w.is_committed());
        w.write_header(StatusCode::IM_A_TEAPOT);
        w.observe(StatusCode::BAD_GATEWAY);
        assert_eq!(w.status(), Some(StatusCode::IM_A_TEAPOT));
    }

    #[test]
    fn bare_status_and_strings() {
        let w = sent(StatusCode::NO_CONTENT);
        assert_eq!(w.status(), Some(StatusCode::NO_CONTENT));
        assert!(w.body.is_empty());

        let w = sent("plain");
        assert_eq!(w.status(), Some(StatusCode::OK));
        assert_eq!(w.body, b"plain");
    }

    #[test]
    fn into_inner_builds_the_http_response() {
        let res = sent(text(StatusCode::NOT_FOUND, "gone")).into_inner();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.headers()[CONTENT_TYPE], TEXT_PLAIN);
    }
}
