use std::{collections::BTreeMap, time::Duration};

/// Everything needed to perform one dynamic call.
#[derive(Debug, Clone, Default)]
pub struct CallRequest {
    /// Base64 encoded binary `FileDescriptorSet`s, loaded in order.
    pub registry_files: Vec<String>,
    /// Absolute `https://` URL of the method (e.g. `https://host:443/echo.EchoServer/SayHello`).
    pub url: String,
    /// TLS server name override. `None` or empty derives it from `url`.
    pub sni: Option<String>,
    /// PEM encoded trust anchors. Replaces the native roots when set.
    pub ca: Option<String>,
    pub insecure_skip_verify: bool,
    /// Bounds the whole network exchange. `None` or zero waits forever.
    pub request_timeout: Option<Duration>,
    /// Extra request headers, applied in order after `content-type: application/grpc`.
    pub request_headers: Vec<(String, String)>,
    /// Fully-qualified request message type (e.g. `echo.EchoRequest`).
    pub request_type: String,
    /// Fully-qualified response message type (e.g. `echo.EchoReply`).
    pub response_type: String,
    /// JSON request body, following the `Any` convention (`{"@type": "...", ...}`).
    pub request_body: String,
}

/// The outcome of a successful call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResult {
    /// Stable identity of the call target, the request URL.
    pub id: String,
    pub status_code: u16,
    /// Lowercase header names, multi-valued headers joined with `", "`.
    pub response_headers: BTreeMap<String, String>,
    /// The decoded response message as JSON text.
    pub payload: String,
}
