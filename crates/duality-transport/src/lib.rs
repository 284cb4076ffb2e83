// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Transport port and remote link for the Duality client.
//!
//! The scene layer never talks to a socket directly. It receives a
//! [`RemoteLink`], a clonable handle over a boxed [`Transport`], and issues the
//! three RPC methods the server understands (`listScenes`, `download`,
//! `python`). Endpoint configuration and connection lifecycle stay with the
//! embedding application: it builds a transport (for example a
//! [`StreamTransport`] over a connected `TcpStream`) and hands it over.
//!
//! # Reply Shape
//!
//! Every call yields a JSON result tree plus zero or more raw binary payloads.
//! A result object carrying an `error` member is a server-side failure; the
//! link maps `{"error": {"kind": "notFound"}}` to [`LinkError::NotFound`] and
//! everything else to [`LinkError::Server`].
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod link;
mod stream;
pub mod wire;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use link::{method, LinkError, RemoteLink};
pub use stream::StreamTransport;

use serde_json::Value;

/// One server reply: a JSON result tree plus raw binary payloads.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reply {
    /// Structured result tree.
    pub result: Value,
    /// Raw binary attachments, in server order.
    pub payloads: Vec<Vec<u8>>,
}

impl Reply {
    /// Reply with a result tree and no payloads.
    pub fn new(result: Value) -> Self {
        Self {
            result,
            payloads: Vec::new(),
        }
    }

    /// Reply carrying a single binary payload.
    pub fn with_payload(result: Value, payload: Vec<u8>) -> Self {
        Self {
            result,
            payloads: vec![payload],
        }
    }
}

/// Errors raised by a [`Transport`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON segment could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Framing or protocol violation.
    #[error("[WIRE_PROTOCOL] {0}")]
    Protocol(String),
    /// The peer closed the connection.
    #[error("connection closed")]
    Closed,
}

/// RPC-style request/response port.
///
/// Implementations are driven strictly in `send`, `receive` pairs; the
/// [`RemoteLink`] holds its lock across both halves so replies never interleave
/// between callers.
pub trait Transport: Send {
    /// Send one request.
    fn send(&mut self, method: &str, params: &Value) -> Result<(), TransportError>;

    /// Receive the reply to the most recent request.
    fn receive(&mut self) -> Result<Reply, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, method: &str, params: &Value) -> Result<(), TransportError> {
        (**self).send(method, params)
    }

    fn receive(&mut self) -> Result<Reply, TransportError> {
        (**self).receive()
    }
}
