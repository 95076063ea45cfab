//! Core application primitives (HTTP server, request context)

pub mod http;

pub use http::*;
