//! JSON responses.
//!
//! ```rust
//! use http::StatusCode;
//! use mango::json;
//!
//! json::ok(vec![1, 2, 3]);
//! json::response(StatusCode::CREATED, serde_json::json!({"id": 42}));
//! ```

use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use tracing::error;

use crate::response::{Response, ResponseWriter};

const APPLICATION_JSON: &str = "application/json";

/// A status plus a body serialized with `serde_json`.
#[derive(Debug, Clone)]
pub struct Json<T> {
    status: StatusCode,
    body: T,
}

/// `200 OK` with `body` as JSON.
pub fn ok<T: Serialize + Send + 'static>(body: T) -> Json<T> {
    response(StatusCode::OK, body)
}

/// `status` with `body` as JSON.
pub fn response<T: Serialize + Send + 'static>(status: StatusCode, body: T) -> Json<T> {
    Json { status, body }
}

impl<T: Serialize + Send> Response for Json<T> {
    fn send(self: Box<Self>, w: &mut ResponseWriter) {
        // Serialize up front: once the status is committed a failure can no
        // longer change it.
        let mut bytes = match serde_json::to_vec(&self.body) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "failed to serialize JSON response");
                w.write_header(StatusCode::INTERNAL_SERVER_ERROR);
                return;
            }
        };
        bytes.push(b'\n');
        w.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        w.write_header(self.status);
        w.write_bytes(&bytes);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::response::IntoResponse;

    #[test]
    fn serializes_body_with_status() {
        let mut w = ResponseWriter::new();
        response(StatusCode::CREATED, HashMap::from([("id", 5)]))
            .into_response()
            .send(&mut w);
        assert_eq!(w.status(), Some(StatusCode::CREATED));
        assert_eq!(w.headers()[CONTENT_TYPE], APPLICATION_JSON);
        let res = w.into_inner();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    #[test]
    fn unserializable_body_is_a_500() {
        // Maps with non-string keys cannot be JSON objects.
        let body = HashMap::from([((1, 2), "pair")]);
        let mut w = ResponseWriter::new();
        ok(body).into_response().send(&mut w);
        assert_eq!(w.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(w.headers().get(CONTENT_TYPE).is_none());
    }
}
