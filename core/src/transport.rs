//! Who actually performs a composed HTTP request.
//!
//! The console only needs "send this, give me whatever came back". By default
//! that is the host, over `EXECUTE_REQUEST`. Tests and native embedders plug in
//! their own `Transport` instead.
//!
//! A non-2xx response is a successful transport result. `TransportError` means
//! no response was obtained at all.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::host::HostApi;
use crate::http::{HttpRequest, HttpResponse};

/// Object-safe: the console holds an `Arc<dyn Transport>`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        request_id: &str,
        request: HttpRequest,
    ) -> Result<HttpResponse, TransportError>;
}

/// Delegates execution to the host.
#[derive(Clone)]
pub struct HostTransport {
    host: HostApi,
}

impl HostTransport {
    pub fn new(host: HostApi) -> Self {
        Self { host }
    }
}

#[async_trait]
impl Transport for HostTransport {
    async fn execute(
        &self,
        request_id: &str,
        request: HttpRequest,
    ) -> Result<HttpResponse, TransportError> {
        Ok(self
            .host
            .execute_request(request_id, request, CancellationToken::new())
            .await?)
    }
}
