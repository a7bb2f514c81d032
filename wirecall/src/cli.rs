//! # CLI
//!
//! This module defines the command-line interface of `wirecall` using `clap`.
//!
//! It is responsible for parsing user input and performing validation (e.g., ensuring headers are `key:value`).
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "wirecall", version, about = "Dynamic unary calls over HTTP/2 + TLS")]
pub struct Cli {
    /// Full URL of the method (e.g. https://localhost:8443/echo.EchoServer/SayHello)
    pub url: String,

    /// Fully qualified request message type (e.g. echo.EchoRequest)
    #[arg(long)]
    pub request_type: String,

    /// Fully qualified response message type (e.g. echo.EchoReply)
    #[arg(long)]
    pub response_type: String,

    /// JSON body following the `Any` convention (`{"@type": "...", ...}`)
    #[arg(long, value_parser = parse_body)]
    pub body: String,

    /// Path to a binary descriptor set (.bin), may be repeated
    #[arg(long = "descriptor-set")]
    pub descriptor_sets: Vec<PathBuf>,

    /// Base64 encoded descriptor set, may be repeated
    #[arg(long = "registry-file")]
    pub registry_files: Vec<String>,

    /// TLS server name to send and verify instead of the URL host
    #[arg(long)]
    pub sni: Option<String>,

    /// Path to a PEM file with the CA certificates to trust instead of the system roots
    #[arg(long)]
    pub ca: Option<PathBuf>,

    /// Accept any server certificate
    #[arg(long)]
    pub insecure_skip_verify: bool,

    /// Timeout of the whole call in milliseconds, 0 means no limit
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| "Format must be 'key:value'".to_string())
}

fn parse_body(value: &str) -> Result<String, String> {
    serde_json::from_str::<serde_json::Value>(value)
        .map(|_| value.to_string())
        .map_err(|e| format!("Invalid JSON: {e}"))
}
