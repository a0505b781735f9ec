use std::sync::Arc;
use std::time::Instant;

use searchwire_common::protocol::error::Result;
use searchwire_common::{Method, RestRequest, RestResponse};

use crate::provider::ConnectionProvider;

/// Turns method + path + body into a [`RestResponse`].
///
/// Each call acquires its own connection from the provider and closes it
/// before returning, whatever the outcome. Failures after the connection
/// opened are returned without retry, and 4xx/5xx statuses are ordinary
/// responses.
#[derive(Debug, Clone)]
pub struct RestExecutor {
    provider: Arc<ConnectionProvider>,
}

impl RestExecutor {
    pub fn new(provider: Arc<ConnectionProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<ConnectionProvider> {
        &self.provider
    }

    /// Execute one request.
    ///
    /// An empty `body` is sent as no body.
    pub fn execute(&self, method: Method, path: &str, body: Option<&str>) -> Result<RestResponse> {
        let mut request = RestRequest::new(method, path);
        if let Some(body) = body.filter(|b| !b.is_empty()) {
            request = request.with_body(body);
        }
        self.send(&request)
    }

    /// Execute a prepared request.
    pub fn send(&self, request: &RestRequest) -> Result<RestResponse> {
        let mut connection = self.provider.open()?;
        let start = Instant::now();

        let result = connection.transmit(request);
        connection.close();

        match &result {
            Ok(response) => tracing::debug!(
                method = %request.method,
                path = %request.normalized_path(),
                server = %connection.server(),
                status = response.status.code(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Request completed"
            ),
            Err(err) => tracing::debug!(
                method = %request.method,
                path = %request.normalized_path(),
                server = %connection.server(),
                error = %err,
                "Request failed"
            ),
        }

        result
    }

    pub fn get(&self, path: &str) -> Result<RestResponse> {
        self.execute(Method::Get, path, None)
    }

    pub fn post(&self, path: &str, body: Option<&str>) -> Result<RestResponse> {
        self.execute(Method::Post, path, body)
    }

    pub fn put(&self, path: &str, body: Option<&str>) -> Result<RestResponse> {
        self.execute(Method::Put, path, body)
    }

    pub fn delete(&self, path: &str) -> Result<RestResponse> {
        self.execute(Method::Delete, path, None)
    }

    pub fn head(&self, path: &str) -> Result<RestResponse> {
        self.execute(Method::Head, path, None)
    }
}
