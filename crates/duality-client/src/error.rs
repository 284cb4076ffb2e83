// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Loader error type.

use duality_cache::StoreError;
use duality_scene::{SceneError, VariableError};
use duality_transport::LinkError;

/// Errors surfaced by [`crate::SceneLoader`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Talking to the server failed.
    #[error(transparent)]
    Link(#[from] LinkError),
    /// The requested scene description is malformed.
    #[error(transparent)]
    Scene(#[from] SceneError),
    /// A variable update was rejected.
    #[error(transparent)]
    Variable(#[from] VariableError),
    /// The persistent cache directory could not be opened.
    #[error("payload store: {0}")]
    Store(#[from] StoreError),
    /// The server has no scene with this name.
    #[error("scene named '{0}' does not exist")]
    UnknownScene(String),
    /// The operation needs a loaded scene.
    #[error("no scene loaded")]
    NoSceneLoaded,
    /// Connecting to a server address failed.
    #[error("cannot connect to {address}: {source}")]
    Connect {
        /// Address that was dialled.
        address: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
