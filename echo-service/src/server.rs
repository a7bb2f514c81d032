//! Mock remote speaking the length-prefixed wire framing over TLS + HTTP/2.
//!
//! The server certificate is issued for `localhost` and `127.0.0.1` by the private
//! test CA in [`CA_CERT`]. Clients that do not trust that CA fail the handshake.
use crate::pb::{EchoReply, EchoRequest};
use bytes::{BufMut, Bytes, BytesMut};
use http::{Request, Response, StatusCode, header::CONTENT_TYPE};
use http_body_util::{BodyExt, Full};
use hyper::{body::Incoming, service::service_fn};
use hyper_util::rt::{TokioExecutor, TokioIo};
use prost::Message;
use rustls::{
    ServerConfig,
    pki_types::{CertificateDer, PrivateKeyDer, pem::PemObject},
};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// PEM of the CA that issued the mock remote's certificate.
pub const CA_CERT: &str = include_str!("../certs/ca.pem");
const SERVER_CERT: &str = include_str!("../certs/localhost.pem");
const SERVER_KEY: &str = include_str!("../certs/localhost.key");

pub const SAY_HELLO_PATH: &str = "/echo.EchoServer/SayHello";
/// Same as [`SAY_HELLO_PATH`] but answers after [`SLOW_DELAY`].
pub const SLOW_PATH: &str = "/echo.EchoServer/Slow";
pub const SLOW_DELAY: Duration = Duration::from_secs(2);

/// Binds the mock remote on an ephemeral local port and serves it in the background.
pub async fn spawn_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(tls_config()));

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();

            tokio::spawn(async move {
                // Clients that reject the certificate abort the handshake here.
                let Ok(tls) = acceptor.accept(stream).await else {
                    return;
                };

                if let Err(e) = hyper::server::conn::http2::Builder::new(TokioExecutor::new())
                    .serve_connection(TokioIo::new(tls), service_fn(handle))
                    .await
                {
                    tracing::debug!("mock remote connection closed: {e}");
                }
            });
        }
    });

    addr
}

fn tls_config() -> ServerConfig {
    let certs = CertificateDer::pem_slice_iter(SERVER_CERT.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = PrivateKeyDer::from_pem_slice(SERVER_KEY.as_bytes()).unwrap();

    let mut config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .unwrap();

    config.alpn_protocols = vec![b"h2".to_vec()];
    config
}

async fn handle(request: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = request.uri().path().to_owned();

    match path.as_str() {
        SAY_HELLO_PATH => Ok(say_hello(request).await),
        SLOW_PATH => {
            tokio::time::sleep(SLOW_DELAY).await;
            Ok(say_hello(request).await)
        }
        _ => Ok(plain(StatusCode::NOT_FOUND, "no such method")),
    }
}

async fn say_hello(request: Request<Incoming>) -> Response<Full<Bytes>> {
    let echo = request.headers().get("x-echo").cloned();
    let content_type = request.headers().get(CONTENT_TYPE).cloned();

    let body = match request.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return plain(StatusCode::BAD_REQUEST, "unreadable body"),
    };

    let Some(payload) = unframe(&body) else {
        return plain(StatusCode::BAD_REQUEST, "malformed frame");
    };

    let Ok(req) = EchoRequest::decode(payload) else {
        return plain(StatusCode::BAD_REQUEST, "malformed EchoRequest");
    };

    let middle = req.middle_name.map(|m| m.name).unwrap_or_default();
    let reply = EchoReply {
        message: format!("Hello {} {} {}", req.first_name, middle, req.last_name),
    };

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/grpc")
        .header("x-multi", "a")
        .header("x-multi", "b");

    if let Some(value) = echo {
        response = response.header("x-echo", value);
    }
    if let Some(value) = content_type {
        response = response.header("x-request-content-type", value);
    }

    response
        .body(Full::new(frame(&reply.encode_to_vec())))
        .unwrap()
}

fn plain(status: StatusCode, text: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::from_static(text.as_bytes())))
        .unwrap()
}

fn frame(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_slice(payload.len().to_string().as_bytes());
    buf.put_u8(0);
    buf.put_slice(payload);
    buf.freeze()
}

fn unframe(record: &[u8]) -> Option<&[u8]> {
    let separator = record.iter().position(|b| *b == 0)?;
    let len: usize = std::str::from_utf8(&record[..separator]).ok()?.parse().ok()?;
    record.get(separator + 1..separator + 1 + len)
}
