//! Store server: route dispatch and error bodies.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::handler::{HandlerContext, RequestHandler};
use crate::store::PatientStore;
use sleeplab_protocol::{to_json, HttpHandler, HttpMethod, HttpResponse, StoreRequest};
use std::sync::Arc;
use tracing::{debug, error};

/// The store server.
///
/// Resolves HTTP-shaped requests against the route table, runs them on the
/// shared [`PatientStore`] and encodes every outcome as a JSON response.
///
/// # Example
///
/// ```
/// use sleeplab_protocol::{HttpHandler, HttpMethod};
/// use sleeplab_store::{StoreConfig, StoreServer};
///
/// let server = StoreServer::new(StoreConfig::default());
/// let response = server.handle(HttpMethod::Get, "/rooms", b"");
/// assert_eq!(response.status, 200);
/// ```
pub struct StoreServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl StoreServer {
    /// Creates a server with an empty store.
    pub fn new(config: StoreConfig) -> Self {
        Self::with_store(Arc::new(PatientStore::new(config)))
    }

    /// Creates a server over an existing store, sharing its configuration.
    pub fn with_store(store: Arc<PatientStore>) -> Self {
        let context = Arc::new(HandlerContext::new(store));
        let handler = RequestHandler::new(Arc::clone(&context));
        Self { handler, context }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<PatientStore> {
        &self.context.store
    }

    /// Handles a decoded request.
    pub fn handle_request(&self, request: StoreRequest) -> StoreResult<Vec<u8>> {
        self.handler.handle(request)
    }

    fn respond(&self, method: HttpMethod, path: &str, body: &[u8]) -> StoreResult<Vec<u8>> {
        let limit = self.context.config().max_body_bytes;
        if body.len() > limit {
            return Err(StoreError::Validation(format!(
                "body of {} bytes exceeds limit of {}",
                body.len(),
                limit
            )));
        }
        let request = StoreRequest::parse(method, path, body)?;
        debug!(operation = request.operation(), %method, path, "store request");
        self.handle_request(request)
    }
}

impl HttpHandler for StoreServer {
    fn handle(&self, method: HttpMethod, path: &str, body: &[u8]) -> HttpResponse {
        match self.respond(method, path, body) {
            Ok(body) => HttpResponse::new(200, body),
            Err(err) => {
                if err.is_server_error() {
                    error!(%method, path, error = %err, "store request failed");
                } else {
                    debug!(%method, path, error = %err, "store request rejected");
                }
                // An ErrorBody always encodes; fall back to an empty body.
                let payload = to_json(&err.to_body()).unwrap_or_default();
                HttpResponse::new(err.status_code(), payload)
            }
        }
    }
}
