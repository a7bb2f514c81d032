use echo_service::{CA_CERT, SAY_HELLO_PATH, SLOW_PATH, file_descriptor_set_base64, spawn_server};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use wirecall_core::{
    CallError, CallRequest, Registry, WireClient, codec::JsonMappingError,
    registry::RegistryError, transport::TransportError,
};

const REQUEST_BODY: &str = r#"{
    "@type": "type.googleapis.com/echo.EchoRequest",
    "first_name": "sal",
    "last_name": "mander",
    "middle_name": { "name": "a" }
}"#;

fn say_hello(addr: SocketAddr) -> CallRequest {
    CallRequest {
        registry_files: vec![file_descriptor_set_base64()],
        url: format!("https://127.0.0.1:{}{}", addr.port(), SAY_HELLO_PATH),
        sni: Some("localhost".to_string()),
        ca: Some(CA_CERT.to_string()),
        request_type: "echo.EchoRequest".to_string(),
        response_type: "echo.EchoReply".to_string(),
        request_body: REQUEST_BODY.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_say_hello() {
    let addr = spawn_server().await;
    let client = WireClient::new();
    let request = say_hello(addr);
    let url = request.url.clone();

    let result = client.call(request).await.unwrap();

    assert_eq!(result.id, url);
    assert_eq!(result.status_code, 200);
    assert_eq!(result.payload, r#"{"message":"Hello sal a mander"}"#);
    assert_eq!(result.response_headers["content-type"], "application/grpc");
}

#[tokio::test]
async fn test_response_headers() {
    let addr = spawn_server().await;
    let client = WireClient::new();

    let mut request = say_hello(addr);
    request.request_headers = vec![("x-echo".to_string(), "ping".to_string())];

    let result = client.call(request).await.unwrap();

    assert_eq!(result.response_headers["x-echo"], "ping");
    assert_eq!(result.response_headers["x-multi"], "a, b");
    assert_eq!(
        result.response_headers["x-request-content-type"],
        "application/grpc"
    );
}

#[tokio::test]
async fn test_content_type_override() {
    let addr = spawn_server().await;
    let client = WireClient::new();

    let mut request = say_hello(addr);
    request.request_headers = vec![(
        "content-type".to_string(),
        "application/grpc+custom".to_string(),
    )];

    let result = client.call(request).await.unwrap();

    assert_eq!(
        result.response_headers["x-request-content-type"],
        "application/grpc+custom"
    );
}

#[tokio::test]
async fn test_sni_derived_from_url() {
    let addr = spawn_server().await;
    let client = WireClient::new();

    // The certificate also covers the IP address.
    let mut request = say_hello(addr);
    request.sni = None;

    let result = client.call(request).await.unwrap();
    assert_eq!(result.status_code, 200);
}

#[tokio::test]
async fn test_unknown_request_type_fails_before_connecting() {
    let client = WireClient::new();

    // Nothing listens on port 9, a network attempt would surface as a transport error.
    let mut request = say_hello("127.0.0.1:9".parse().unwrap());
    request.request_type = "echo.Missing".to_string();

    match client.call(request).await {
        Err(CallError::TypeNotFound(e)) => assert_eq!(e.0, "echo.Missing"),
        other => panic!("Expected TypeNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_response_type() {
    let addr = spawn_server().await;
    let client = WireClient::new();

    let mut request = say_hello(addr);
    request.response_type = "echo.Missing".to_string();

    assert!(matches!(
        client.call(request).await,
        Err(CallError::TypeNotFound(_))
    ));
}

#[tokio::test]
async fn test_unexpected_status() {
    let addr = spawn_server().await;
    let client = WireClient::new();

    let mut request = say_hello(addr);
    request.url = format!("https://127.0.0.1:{}/echo.EchoServer/Unknown", addr.port());

    match client.call(request).await {
        Err(CallError::Transport(TransportError::UnexpectedStatus(status))) => {
            assert_eq!(status.as_u16(), 404)
        }
        other => panic!("Expected UnexpectedStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_untrusted_certificate() {
    let addr = spawn_server().await;
    let client = WireClient::new();

    let mut request = say_hello(addr);
    request.ca = None;

    assert!(matches!(
        client.call(request).await,
        Err(CallError::Transport(TransportError::Request(_)))
    ));
}

#[tokio::test]
async fn test_wrong_server_name() {
    let addr = spawn_server().await;
    let client = WireClient::new();

    let mut request = say_hello(addr);
    request.sni = Some("example.com".to_string());

    assert!(matches!(
        client.call(request).await,
        Err(CallError::Transport(TransportError::Request(_)))
    ));
}

#[tokio::test]
async fn test_insecure_skip_verify() {
    let addr = spawn_server().await;
    let client = WireClient::new();

    let mut request = say_hello(addr);
    request.ca = None;
    request.sni = Some("example.com".to_string());
    request.insecure_skip_verify = true;

    let result = client.call(request).await.unwrap();
    assert_eq!(result.payload, r#"{"message":"Hello sal a mander"}"#);
}

#[tokio::test]
async fn test_timeout() {
    let addr = spawn_server().await;
    let client = WireClient::new();

    let mut request = say_hello(addr);
    request.url = format!("https://127.0.0.1:{}{}", addr.port(), SLOW_PATH);
    request.request_timeout = Some(Duration::from_millis(200));

    match client.call(request).await {
        Err(CallError::Transport(TransportError::Timeout(timeout))) => {
            assert_eq!(timeout, Duration::from_millis(200))
        }
        other => panic!("Expected Timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_not_reached() {
    let addr = spawn_server().await;
    let client = WireClient::new();

    let mut request = say_hello(addr);
    request.request_timeout = Some(Duration::from_secs(10));

    assert!(client.call(request).await.is_ok());
}

#[tokio::test]
async fn test_zero_timeout_means_no_limit() {
    let addr = spawn_server().await;
    let client = WireClient::new();

    let mut request = say_hello(addr);
    request.request_timeout = Some(Duration::ZERO);

    let result = client.call(request).await.unwrap();
    assert_eq!(result.payload, r#"{"message":"Hello sal a mander"}"#);
}

#[tokio::test]
async fn test_registry_is_shared_across_calls() {
    let addr = spawn_server().await;
    let registry = Arc::new(Registry::new());
    let client = WireClient::with_registry(registry.clone());

    client.call(say_hello(addr)).await.unwrap();
    assert!(registry.contains("echo.EchoRequest"));
    assert!(registry.contains("echo.EchoReply"));

    // Types stay resolvable without resending the descriptors.
    let mut request = say_hello(addr);
    request.registry_files.clear();
    let result = client.clone().call(request).await.unwrap();
    assert_eq!(result.payload, r#"{"message":"Hello sal a mander"}"#);
}

#[tokio::test]
async fn test_wrapped_registry_file() {
    let addr = spawn_server().await;
    let client = WireClient::new();

    let wrapped = file_descriptor_set_base64()
        .as_bytes()
        .chunks(76)
        .map(|line| format!("{}\n", std::str::from_utf8(line).unwrap()))
        .collect::<String>();

    let mut request = say_hello(addr);
    request.registry_files = vec![wrapped];

    let result = client.call(request).await.unwrap();
    assert_eq!(result.status_code, 200);
}

#[tokio::test]
async fn test_invalid_registry_file() {
    let client = WireClient::new();

    let mut request = say_hello("127.0.0.1:9".parse().unwrap());
    request.registry_files = vec!["%%% not base64 %%%".to_string()];

    assert!(matches!(
        client.call(request).await,
        Err(CallError::Registry(RegistryError::InvalidBase64 { .. }))
    ));
    assert!(client.registry().message_names().is_empty());
}

#[tokio::test]
async fn test_invalid_request_body() {
    let client = WireClient::new();

    let mut request = say_hello("127.0.0.1:9".parse().unwrap());
    request.request_body = r#"{"@type": "echo.EchoRequest", "nickname": "sal"}"#.to_string();

    assert!(matches!(
        client.call(request).await,
        Err(CallError::JsonMapping(_))
    ));

    let mut request = say_hello("127.0.0.1:9".parse().unwrap());
    request.request_body = "{not json".to_string();

    assert!(matches!(
        client.call(request).await,
        Err(CallError::JsonMapping(JsonMappingError::InvalidJson(_)))
    ));
}

#[tokio::test]
async fn test_empty_message() {
    let addr = spawn_server().await;
    let client = WireClient::new();

    let mut request = say_hello(addr);
    request.request_body = "{}".to_string();

    let result = client.call(request).await.unwrap();
    assert_eq!(result.payload, r#"{"message":"Hello   "}"#);
}
