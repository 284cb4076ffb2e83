// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scripted transport for headless tests of providers, caches and loaders.
//!
//! [`ScriptedTransport`] answers each request by calling a handler closure and
//! records every call so tests can assert how often the server was hit.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{json, Value};

use crate::{Reply, Transport, TransportError};

type Handler = Box<dyn FnMut(&str, &Value) -> Result<Reply, TransportError> + Send>;

/// One recorded request.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Method name.
    pub method: String,
    /// Parameter tree as sent.
    pub params: Value,
}

/// Shared view of the requests a [`ScriptedTransport`] has seen.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl CallLog {
    /// Snapshot of all calls so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of calls so far.
    pub fn len(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing was called.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of calls to `method`.
    pub fn count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|call| call.method == method)
            .count()
    }

    fn push(&self, call: RecordedCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

/// Transport whose replies come from a closure.
pub struct ScriptedTransport {
    handler: Handler,
    pending: VecDeque<Result<Reply, TransportError>>,
    log: CallLog,
}

impl ScriptedTransport {
    /// Build a transport that answers every request with `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: FnMut(&str, &Value) -> Result<Reply, TransportError> + Send + 'static,
    {
        Self {
            handler: Box::new(handler),
            pending: VecDeque::new(),
            log: CallLog::default(),
        }
    }

    /// Transport that fails every request with [`TransportError::Closed`].
    pub fn refusing() -> Self {
        Self::new(|_, _| Err(TransportError::Closed))
    }

    /// Handle to the call log (stays valid after the transport is moved).
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, method: &str, params: &Value) -> Result<(), TransportError> {
        self.log.push(RecordedCall {
            method: method.to_owned(),
            params: params.clone(),
        });
        let reply = (self.handler)(method, params);
        self.pending.push_back(reply);
        Ok(())
    }

    fn receive(&mut self) -> Result<Reply, TransportError> {
        self.pending
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Protocol("receive without send".into())))
    }
}

/// Server-style "not found" reply.
pub fn not_found_reply(message: &str) -> Reply {
    Reply::new(json!({ "error": { "kind": "notFound", "message": message } }))
}
