//! # Wirecall Core
//!
//! `wirecall-core` is a dynamic, schema-driven unary RPC client. The Protobuf schema is not
//! compiled in: binary `FileDescriptorSet`s are supplied with every call, the request is built
//! from JSON and the response is rendered back to JSON.
//!
//! ## Key Components
//!
//! * **[`Registry`]:** Process-wide, thread-safe store of message types, populated from the
//!   descriptor sets of each call.
//! * **[`codec`]:** Maps `Any`-style JSON onto dynamic messages and back.
//! * **[`frame`]:** The length-prefixed record format used on the wire
//!   (`<decimal length> 0x00 <payload>`).
//! * **[`transport`]:** A single POST exchange over HTTP/2 + TLS with configurable trust,
//!   server name, headers and timeout.
//! * **[`WireClient`]:** Orchestrates the above for one call and returns a [`CallResult`].
//!
//! ## Re-exports
//!
//! This crate re-exports `prost` and `prost-reflect` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod client;
pub mod codec;
pub mod frame;
pub mod registry;
pub mod transport;

pub use client::{CallError, CallRequest, CallResult, WireClient};
pub use registry::{Registry, RegistryError, TypeNotFound};

// Re-exports
pub use prost;
pub use prost_reflect;
