//! tvmux addon library
//!
//! Exposes the router so integration tests can drive the HTTP surface
//! without binding a socket.

pub mod api;
