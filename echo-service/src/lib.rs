//! # Echo Service
//!
//! **INTERNAL USE ONLY**: This crate exists solely to provide a mock remote and the
//! matching descriptor set for integration testing `wirecall-core`.
//! It is not intended for production use.
use base64::{Engine, engine::general_purpose::STANDARD};

mod server;

pub use server::{CA_CERT, SAY_HELLO_PATH, SLOW_DELAY, SLOW_PATH, spawn_server};

/// Message types of `proto/echo.proto`, written out by hand so the fixture builds without `protoc`.
pub mod pb {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Middle {
        #[prost(string, tag = "1")]
        pub name: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct EchoRequest {
        #[prost(string, tag = "1")]
        pub first_name: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub last_name: ::prost::alloc::string::String,
        #[prost(message, optional, tag = "3")]
        pub middle_name: ::core::option::Option<Middle>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct EchoReply {
        #[prost(string, tag = "1")]
        pub message: ::prost::alloc::string::String,
    }
}

/// Binary `FileDescriptorSet` containing `src/echo/echo.proto` (package `echo`).
pub const FILE_DESCRIPTOR_SET: &[u8] = include_bytes!("../descriptors/echo.bin");

/// [`FILE_DESCRIPTOR_SET`] in the base64 form callers hand to the client.
pub fn file_descriptor_set_base64() -> String {
    STANDARD.encode(FILE_DESCRIPTOR_SET)
}
