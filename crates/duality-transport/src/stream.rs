// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Blocking transport over any byte stream (TCP, Unix socket, in-memory pipe).

use std::io::{Read, Write};

use serde_json::Value;

use crate::wire::{encode_request, Packet};
use crate::{Reply, Transport, TransportError};

/// Framed request/response transport over a connected stream.
///
/// The caller owns connection setup; this type only speaks the packet format
/// from [`crate::wire`].
#[derive(Debug)]
pub struct StreamTransport<S> {
    stream: S,
}

impl<S> StreamTransport<S> {
    /// Wrap a connected stream.
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Return the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S> Transport for StreamTransport<S>
where
    S: Read + Write + Send,
{
    fn send(&mut self, method: &str, params: &Value) -> Result<(), TransportError> {
        let packet = encode_request(method, params)?;
        self.stream.write_all(&packet)?;
        self.stream.flush()?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Reply, TransportError> {
        Packet::read_from(&mut self.stream)?.into_reply()
    }
}
