// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared remote link: one transport, many callers.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::{Reply, Transport, TransportError};

/// RPC method names understood by the scene server.
pub mod method {
    /// List all scene descriptions (no params).
    pub const LIST_SCENES: &str = "listScenes";
    /// Download a static file belonging to a scene.
    pub const DOWNLOAD: &str = "download";
    /// Run a server-side script with the current variable values.
    pub const PYTHON: &str = "python";
}

/// Server error kind that maps to [`LinkError::NotFound`].
const NOT_FOUND_KIND: &str = "notFound";

/// Errors surfaced by [`RemoteLink`] calls.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level failure (I/O, framing, closed connection).
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    /// The server reported that the requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The server reported any other failure.
    #[error("server error ({kind}): {message}")]
    Server {
        /// Server-provided error kind.
        kind: String,
        /// Human readable message.
        message: String,
    },
    /// The reply did not have the expected shape.
    #[error("malformed reply: {0}")]
    Malformed(String),
    /// A previous caller panicked while holding the link.
    #[error("remote link poisoned")]
    Poisoned,
}

/// Clonable handle to the single transport shared by every provider.
///
/// Providers receive a clone at construction time instead of reaching for a
/// global client. [`replace`](RemoteLink::replace) swaps the transport behind
/// every clone at once, so an endpoint change reaches existing providers.
#[derive(Clone)]
pub struct RemoteLink {
    inner: Arc<Mutex<Box<dyn Transport>>>,
}

impl fmt::Debug for RemoteLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteLink")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish()
    }
}

impl RemoteLink {
    /// Wrap a transport.
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(transport))),
        }
    }

    /// Link whose every call fails with [`TransportError::Closed`].
    ///
    /// Useful for parsing descriptions without a server.
    pub fn offline() -> Self {
        Self::new(Offline)
    }

    /// Swap the transport seen by this handle and all of its clones.
    ///
    /// A call already in progress finishes on the old transport.
    pub fn replace<T: Transport + 'static>(&self, transport: T) -> Result<(), LinkError> {
        let mut current = self.inner.lock().map_err(|_| LinkError::Poisoned)?;
        *current = Box::new(transport);
        debug!("remote link transport replaced");
        Ok(())
    }

    /// Issue one request and wait for its reply.
    ///
    /// Server-side errors embedded in the result tree are turned into
    /// [`LinkError`] values; the reply is returned untouched otherwise.
    pub fn call(&self, method: &str, params: &Value) -> Result<Reply, LinkError> {
        let reply = {
            let mut transport = self.inner.lock().map_err(|_| LinkError::Poisoned)?;
            transport.send(method, params)?;
            transport.receive()?
        };
        debug!(
            method,
            payloads = reply.payloads.len(),
            "remote call completed"
        );
        check_server_error(&reply.result)?;
        Ok(reply)
    }

    /// Fetch every scene description the server knows about.
    pub fn list_scenes(&self) -> Result<Vec<Value>, LinkError> {
        let reply = self.call(method::LIST_SCENES, &Value::Null)?;
        match reply.result {
            Value::Array(items) => Ok(items),
            other => Err(LinkError::Malformed(format!(
                "listScenes returned {}, expected an array",
                kind_of(&other)
            ))),
        }
    }

    /// Download a static scene file.
    pub fn download(&self, scene: &str, filename: &str) -> Result<Vec<u8>, LinkError> {
        let params = json!({ "scene": scene, "filename": filename });
        let reply = self.call(method::DOWNLOAD, &params)?;
        single_payload(reply, method::DOWNLOAD)
    }

    /// Ask the server to compute a file from the given variable values.
    pub fn compute(
        &self,
        scene: &str,
        filename: &str,
        variables: Map<String, Value>,
    ) -> Result<Vec<u8>, LinkError> {
        let params = json!({
            "scene": scene,
            "filename": filename,
            "variables": Value::Object(variables),
        });
        let reply = self.call(method::PYTHON, &params)?;
        single_payload(reply, method::PYTHON)
    }
}

struct Offline;

impl Transport for Offline {
    fn send(&mut self, _method: &str, _params: &Value) -> Result<(), TransportError> {
        Err(TransportError::Closed)
    }

    fn receive(&mut self) -> Result<Reply, TransportError> {
        Err(TransportError::Closed)
    }
}

fn check_server_error(result: &Value) -> Result<(), LinkError> {
    let Some(error) = result.get("error") else {
        return Ok(());
    };
    let kind = error
        .get("kind")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_owned();
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map_or_else(|| error.to_string(), str::to_owned);
    if kind == NOT_FOUND_KIND {
        Err(LinkError::NotFound(message))
    } else {
        Err(LinkError::Server { kind, message })
    }
}

fn single_payload(reply: Reply, method: &str) -> Result<Vec<u8>, LinkError> {
    reply
        .payloads
        .into_iter()
        .next()
        .ok_or_else(|| LinkError::Malformed(format!("{method} reply carried no binary payload")))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedTransport;

    #[test]
    fn download_returns_first_payload_and_sends_params() {
        let transport = ScriptedTransport::new(|_, _| {
            Ok(Reply::with_payload(json!({}), vec![1, 2, 3]))
        });
        let log = transport.log();
        let link = RemoteLink::new(transport);

        let bytes = link.download("demo", "mesh.g3d").unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);

        let calls = log.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, method::DOWNLOAD);
        assert_eq!(calls[0].params["scene"], "demo");
        assert_eq!(calls[0].params["filename"], "mesh.g3d");
    }

    #[test]
    fn not_found_kind_maps_to_not_found() {
        let link = RemoteLink::new(ScriptedTransport::new(|_, _| {
            Ok(Reply::new(json!({
                "error": { "kind": "notFound", "message": "no such file: a.g3d" }
            })))
        }));
        match link.download("demo", "a.g3d") {
            Err(LinkError::NotFound(msg)) => assert!(msg.contains("a.g3d")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn other_server_errors_keep_their_kind() {
        let link = RemoteLink::new(ScriptedTransport::new(|_, _| {
            Ok(Reply::new(json!({
                "error": { "kind": "scriptFailed", "message": "boom" }
            })))
        }));
        match link.compute("demo", "gen.py", Map::new()) {
            Err(LinkError::Server { kind, message }) => {
                assert_eq!(kind, "scriptFailed");
                assert_eq!(message, "boom");
            }
            other => panic!("expected Server error, got {other:?}"),
        }
    }

    #[test]
    fn missing_payload_is_malformed() {
        let link = RemoteLink::new(ScriptedTransport::new(|_, _| Ok(Reply::new(json!({})))));
        assert!(matches!(
            link.download("demo", "a.g3d"),
            Err(LinkError::Malformed(_))
        ));
    }

    #[test]
    fn list_scenes_requires_an_array() {
        let link = RemoteLink::new(ScriptedTransport::new(|_, _| {
            Ok(Reply::new(json!({ "scenes": [] })))
        }));
        assert!(matches!(link.list_scenes(), Err(LinkError::Malformed(_))));

        let link = RemoteLink::new(ScriptedTransport::new(|_, _| {
            Ok(Reply::new(json!([{ "metadata": { "name": "a" } }])))
        }));
        assert_eq!(link.list_scenes().unwrap().len(), 1);
    }

    #[test]
    fn replace_reaches_every_clone() {
        let link = RemoteLink::offline();
        let provider_handle = link.clone();
        assert!(provider_handle.download("demo", "a.g3d").is_err());

        link.replace(ScriptedTransport::new(|_, _| {
            Ok(Reply::with_payload(json!({}), vec![7]))
        }))
        .unwrap();
        assert_eq!(provider_handle.download("demo", "a.g3d").unwrap(), vec![7]);
    }

    #[test]
    fn transport_failures_propagate() {
        let link = RemoteLink::new(ScriptedTransport::refusing());
        assert!(matches!(
            link.list_scenes(),
            Err(LinkError::Transport(TransportError::Closed))
        ));
    }
}
