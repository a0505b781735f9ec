//! searchwire Response Types
//!
//! This module defines the raw response returned by one request/response
//! exchange, before any typed decoding.

use super::status::Status;

/// Status plus raw body of one response.
///
/// # Response Flow
///
/// 1. The executor transmits a `RestRequest` on a fresh connection
/// 2. The connection's codec reads the wire response into a `RestResponse`
/// 3. The connection is closed
/// 4. Callers inspect `status` and optionally decode `body`
///
/// An empty body on the wire is represented as `None`.
///
/// # Example
///
/// ```
/// use searchwire_common::{RestResponse, Status};
///
/// let response = RestResponse::new(Status::Ok, Some(r#"{"ok":true}"#.to_string()));
/// assert!(response.is_success());
/// assert_eq!(response.body_str(), Some(r#"{"ok":true}"#));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestResponse {
    /// Response status
    pub status: Status,
    /// Raw body (absent when the server sent none)
    pub body: Option<String>,
}

impl RestResponse {
    pub fn new(status: Status, body: Option<String>) -> Self {
        let body = body.filter(|b| !b.is_empty());
        RestResponse { status, body }
    }

    /// Builds a response from raw body bytes, decoding them as UTF-8.
    ///
    /// Invalid sequences are replaced rather than rejected: the body is
    /// passed through to decoders, which report their own failures.
    pub fn from_bytes(status: Status, body: Vec<u8>) -> Self {
        if body.is_empty() {
            return RestResponse { status, body: None };
        }
        let body = match String::from_utf8(body) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Response body is not valid UTF-8, decoding lossily");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        RestResponse::new(status, Some(body))
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn body_str(&self) -> Option<&str> {
        self.body.as_deref()
    }
}
