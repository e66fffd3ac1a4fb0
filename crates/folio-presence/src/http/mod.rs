//! REST backend for room, conversation and chat RPCs.

mod api;
mod client;

pub use client::{HttpBackend, HttpConfig};
