//! # Wirecall CLI Entry Point
//!
//! The main executable for the wirecall tool. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Installs the log subscriber and parses arguments using [`cli::Cli`].
//! 2. **Input**: Reads descriptor sets and CA files from disk.
//! 3. **Execution**: Delegates the call to the `WireClient`.
//! 4. **Presentation**: Prints the call result as JSON to stdout, or the error to stderr.
mod cli;
mod formatter;

use anyhow::Context;
use base64::{Engine, engine::general_purpose::STANDARD};
use clap::Parser;
use cli::Cli;
use formatter::{FormattedString, GenericError};
use std::{process, time::Duration};
use tracing_subscriber::EnvFilter;
use wirecall_core::{CallRequest, WireClient};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    let request = match call_request(args) {
        Ok(request) => request,
        Err(err) => {
            let err = GenericError("Invalid input:", format!("{err:#}"));
            eprintln!("{}", FormattedString::from(err));
            process::exit(1);
        }
    };

    match WireClient::new().call(request).await {
        Ok(result) => println!("{}", FormattedString::from(result)),
        Err(err) => {
            eprintln!("{}", FormattedString::from(GenericError("Call Failed:", err)));
            process::exit(1);
        }
    }
}

fn call_request(args: Cli) -> anyhow::Result<CallRequest> {
    let mut registry_files =
        Vec::with_capacity(args.descriptor_sets.len() + args.registry_files.len());

    for path in &args.descriptor_sets {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read descriptor set '{}'", path.display()))?;
        registry_files.push(STANDARD.encode(bytes));
    }
    registry_files.extend(args.registry_files);

    let ca = args
        .ca
        .map(|path| {
            std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read CA file '{}'", path.display()))
        })
        .transpose()?;

    tracing::debug!(registry_files = registry_files.len(), "prepared call request");

    Ok(CallRequest {
        registry_files,
        url: args.url,
        sni: args.sni,
        ca,
        insecure_skip_verify: args.insecure_skip_verify,
        request_timeout: args.timeout_ms.map(Duration::from_millis),
        request_headers: args.headers,
        request_type: args.request_type,
        response_type: args.response_type,
        request_body: args.body,
    })
}
