//! # HTTP/2 Transport
//!
//! This module performs the single POST exchange of a call over HTTP/2 + TLS using a
//! `hyper` client and a `rustls` connector.
//!
//! ## Request
//!
//! * Method `POST`, body = one framed record.
//! * `content-type: application/grpc` is set first, caller headers are applied after it
//!   with replace semantics, so a caller `content-type` wins.
//! * ALPN only offers `h2` and the client refuses plain HTTP.
//!
//! ## Response
//!
//! Only `200 OK` is accepted. Any other status fails the call without touching the body.
//! On success the headers are flattened (multi-valued headers joined with `", "` in
//! arrival order) and the body is drained completely. Header names are returned in the
//! lowercase form HTTP/2 puts on the wire (`content-type`, not `Content-Type`).
//!
//! The optional timeout bounds the whole exchange: connect, TLS handshake, request and
//! body drain. A zero timeout means no limit.
mod tls;

use bytes::Bytes;
use http::{
    HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, Uri,
    header::{CONTENT_TYPE, InvalidHeaderName, InvalidHeaderValue},
};
use http_body_util::{BodyExt, Full};
use hyper_rustls::{FixedServerNameResolver, HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use rustls::pki_types::{InvalidDnsNameError, ServerName};
use std::{collections::BTreeMap, time::Duration};

/// Content type sent with every request.
pub const GRPC_CONTENT_TYPE: &str = "application/grpc";

type HyperClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("Invalid url '{url}': '{source}'")]
    InvalidUrl {
        url: String,
        source: http::uri::InvalidUri,
    },
    #[error("Invalid TLS server name '{name}': '{source}'")]
    InvalidServerName {
        name: String,
        source: InvalidDnsNameError,
    },
    #[error("Invalid header key '{key}': '{source}'")]
    InvalidHeaderName {
        key: String,
        source: InvalidHeaderName,
    },
    #[error("Invalid header value for key '{key}': '{source}'")]
    InvalidHeaderValue {
        key: String,
        source: InvalidHeaderValue,
    },
    #[error("Invalid CA certificate: {0}")]
    InvalidCaCertificate(String),
    #[error("TLS configuration error: '{0}'")]
    Tls(#[source] rustls::Error),
    #[error("Failed to build request: '{0}'")]
    Build(#[source] http::Error),
    #[error("Request failed: '{0}'")]
    Request(#[source] hyper_util::client::legacy::Error),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Unexpected response status '{0}', expected '200 OK'")]
    UnexpectedStatus(StatusCode),
    #[error("Failed to read response body: '{0}'")]
    BodyRead(#[source] hyper::Error),
}

/// Settings of one exchange, evaluated once per call.
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    /// Absolute `https://` URL of the method, e.g. `https://host:443/pkg.Service/Method`.
    pub url: String,
    /// TLS server name override. Used for SNI and certificate name validation.
    pub sni: Option<String>,
    /// PEM encoded trust anchors replacing the native roots.
    pub ca: Option<String>,
    pub insecure_skip_verify: bool,
    /// Bound of the whole exchange. `None` or zero means no limit.
    pub timeout: Option<Duration>,
    pub headers: Vec<(String, String)>,
}

/// A fully materialized `200 OK` response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

/// HTTP/2 client bound to the settings of one call.
pub struct Transport {
    client: HyperClient,
    uri: Uri,
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("uri", &self.uri)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Validates the configuration and builds the client.
    ///
    /// No connection is opened until [`Transport::send`].
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let uri: Uri = config
            .url
            .parse()
            .map_err(|source| TransportError::InvalidUrl {
                url: config.url.clone(),
                source,
            })?;

        let headers = request_headers(config.headers)?;
        let tls_config = tls::client_config(config.ca.as_deref(), config.insecure_skip_verify)?;

        let builder = HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_only();

        let builder = match config.sni.filter(|name| !name.is_empty()) {
            Some(name) => {
                let server_name = ServerName::try_from(name.clone())
                    .map_err(|source| TransportError::InvalidServerName { name, source })?;
                builder.with_server_name_resolver(FixedServerNameResolver::new(server_name))
            }
            None => builder,
        };

        let connector = builder.enable_http2().build();
        let client = Client::builder(TokioExecutor::new())
            .http2_only(true)
            .build(connector);

        Ok(Self {
            client,
            uri,
            headers,
            timeout: config.timeout.filter(|timeout| !timeout.is_zero()),
        })
    }

    /// POSTs `body` and returns the complete `200 OK` response.
    pub async fn send(&self, body: Bytes) -> Result<RawResponse, TransportError> {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri(self.uri.clone())
            .body(Full::new(body))
            .map_err(TransportError::Build)?;
        *request.headers_mut() = self.headers.clone();

        tracing::debug!(uri = %self.uri, "sending request");

        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.exchange(request))
                .await
                .map_err(|_| TransportError::Timeout(timeout))?,
            None => self.exchange(request).await,
        }
    }

    async fn exchange(&self, request: Request<Full<Bytes>>) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .request(request)
            .await
            .map_err(TransportError::Request)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TransportError::UnexpectedStatus(status));
        }

        let headers = flatten_headers(response.headers());
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(TransportError::BodyRead)?
            .to_bytes();

        tracing::debug!(%status, body_len = body.len(), "received response");

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

fn request_headers(headers: Vec<(String, String)>) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::new();
    map.insert(CONTENT_TYPE, HeaderValue::from_static(GRPC_CONTENT_TYPE));

    for (key, value) in headers {
        let name = HeaderName::try_from(key.as_str())
            .map_err(|source| TransportError::InvalidHeaderName {
                key: key.clone(),
                source,
            })?;
        let value = HeaderValue::try_from(value.as_str())
            .map_err(|source| TransportError::InvalidHeaderValue { key, source })?;
        map.insert(name, value);
    }

    Ok(map)
}

/// Joins multi-valued headers with `", "`, keeping their arrival order.
fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .keys()
        .map(|name| {
            let joined = headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ");
            (name.as_str().to_string(), joined)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> TransportConfig {
        TransportConfig {
            url: url.to_string(),
            ca: Some(echo_service::CA_CERT.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_content_type_comes_first_and_can_be_overridden() {
        let headers = request_headers(vec![]).unwrap();
        assert_eq!(headers[CONTENT_TYPE], GRPC_CONTENT_TYPE);

        let headers = request_headers(vec![
            ("Content-Type".to_string(), "application/grpc+proto".to_string()),
            ("x-token".to_string(), "one".to_string()),
            ("x-token".to_string(), "two".to_string()),
        ])
        .unwrap();

        assert_eq!(headers[CONTENT_TYPE], "application/grpc+proto");
        assert_eq!(headers.get_all("x-token").iter().count(), 1);
        assert_eq!(headers["x-token"], "two");
    }

    #[test]
    fn test_invalid_headers() {
        assert!(matches!(
            request_headers(vec![("bad header".to_string(), "v".to_string())]),
            Err(TransportError::InvalidHeaderName { .. })
        ));
        assert!(matches!(
            request_headers(vec![("x-ok".to_string(), "line\nbreak".to_string())]),
            Err(TransportError::InvalidHeaderValue { .. })
        ));
    }

    #[test]
    fn test_flatten_headers() {
        let mut headers = HeaderMap::new();
        headers.append("x-multi", HeaderValue::from_static("a"));
        headers.append("x-multi", HeaderValue::from_static("b"));
        headers.append("x-multi", HeaderValue::from_static("c"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(GRPC_CONTENT_TYPE));

        let flat = flatten_headers(&headers);
        assert_eq!(flat["x-multi"], "a, b, c");
        assert!(!flat.contains_key("Content-Type"));
        assert_eq!(flat["content-type"], GRPC_CONTENT_TYPE);
        assert_eq!(flat.len(), 2);
    }

    #[tokio::test]
    async fn test_new_validates_config() {
        assert!(Transport::new(config("https://localhost:8443/echo.EchoServer/SayHello")).is_ok());

        assert!(matches!(
            Transport::new(config("https://exa mple.com/")),
            Err(TransportError::InvalidUrl { .. })
        ));

        let mut bad_sni = config("https://127.0.0.1:8443/");
        bad_sni.sni = Some("not a host!".to_string());
        assert!(matches!(
            Transport::new(bad_sni),
            Err(TransportError::InvalidServerName { .. })
        ));

        let mut empty_sni = config("https://127.0.0.1:8443/");
        empty_sni.sni = Some(String::new());
        assert!(Transport::new(empty_sni).is_ok());
    }

    #[tokio::test]
    async fn test_zero_timeout_means_no_limit() {
        let mut zero = config("https://127.0.0.1:8443/");
        zero.timeout = Some(Duration::ZERO);
        assert_eq!(Transport::new(zero).unwrap().timeout, None);

        let mut bounded = config("https://127.0.0.1:8443/");
        bounded.timeout = Some(Duration::from_millis(1500));
        assert_eq!(
            Transport::new(bounded).unwrap().timeout,
            Some(Duration::from_millis(1500))
        );
    }
}
