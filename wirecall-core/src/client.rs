//! # Wire Client
//!
//! This module implements the high-level logic of a dynamic unary call.
//!
//! A call runs these steps, failing fast on the first error:
//!
//! 1. Load the supplied descriptor sets into the shared [`Registry`].
//! 2. Resolve the request type and map the JSON body onto it.
//! 3. Frame the serialized request and POST it over HTTP/2 + TLS.
//! 4. Unframe the reply, resolve the response type and render the message as JSON.
//!
//! Nothing touches the network before step 3, so schema and body errors never issue a
//! request.
//!
//! ## Example
//!
//! ```rust,no_run
//! use wirecall_core::client::{CallRequest, WireClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = WireClient::new();
//!
//! let result = client
//!     .call(CallRequest {
//!         registry_files: vec![std::fs::read_to_string("echo.pb.b64")?],
//!         url: "https://localhost:50051/echo.EchoServer/SayHello".to_string(),
//!         request_type: "echo.EchoRequest".to_string(),
//!         response_type: "echo.EchoReply".to_string(),
//!         request_body: r#"{"@type": "echo.EchoRequest", "first_name": "sal"}"#.to_string(),
//!         ..Default::default()
//!     })
//!     .await?;
//!
//! println!("{}", result.payload);
//! # Ok(())
//! # }
//! ```
mod types;

pub use types::*;

use crate::{
    codec::{JsonDecoder, JsonEncoder, JsonMappingError, ResponseDecodeError},
    frame::{self, FrameError},
    registry::{Registry, RegistryError, TypeNotFound},
    transport::{Transport, TransportConfig, TransportError},
};
use std::sync::Arc;

/// Errors that can occur during a dynamic call.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("Failed to load descriptors: '{0}'")]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    TypeNotFound(#[from] TypeNotFound),
    #[error("Invalid request body: '{0}'")]
    JsonMapping(#[from] JsonMappingError),
    #[error("Invalid response frame: '{0}'")]
    Frame(#[from] FrameError),
    #[error("Transport error: '{0}'")]
    Transport(#[from] TransportError),
    #[error("Invalid response message: '{0}'")]
    ResponseDecode(#[from] ResponseDecodeError),
}

/// Performs dynamic calls against a [`Registry`] shared by all of its clones.
#[derive(Debug, Clone, Default)]
pub struct WireClient {
    registry: Arc<Registry>,
}

impl WireClient {
    /// Creates a client with its own, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client that loads into and resolves from `registry`.
    pub fn with_registry(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Executes one unary call.
    ///
    /// # Returns
    ///
    /// * `Ok(CallResult)` - The remote answered `200 OK` with a well-formed response message.
    /// * `Err(CallError)` - Any step failed. No partial result is produced and nothing is retried.
    #[tracing::instrument(skip_all, fields(url = %request.url, request_type = %request.request_type))]
    pub async fn call(&self, request: CallRequest) -> Result<CallResult, CallError> {
        self.registry
            .load_base64(&request.registry_files, &request.request_type)?;

        let request_descriptor = self.registry.resolve(&request.request_type)?;
        let message = JsonEncoder::new(request_descriptor).encode(&request.request_body)?;

        let transport = Transport::new(TransportConfig {
            url: request.url.clone(),
            sni: request.sni,
            ca: request.ca,
            insecure_skip_verify: request.insecure_skip_verify,
            timeout: request.request_timeout,
            headers: request.request_headers,
        })?;

        let response = transport.send(frame::encode_record(&message)).await?;

        let mut body = response.body;
        let reply = frame::decode_record(&mut body)?;
        if !body.is_empty() {
            tracing::debug!(trailing = body.len(), "ignoring bytes after the response record");
        }

        let response_descriptor = self.registry.resolve(&request.response_type)?;
        let payload = JsonDecoder::new(response_descriptor).decode(&reply)?;

        tracing::info!(status = %response.status, "call completed");

        Ok(CallResult {
            id: request.url,
            status_code: response.status.as_u16(),
            response_headers: response.headers,
            payload,
        })
    }
}
