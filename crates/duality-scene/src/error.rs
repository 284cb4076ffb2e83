// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error and warning types for the scene layer.

use std::fmt;

use crate::VariableKind;

/// Fatal description errors. Parsing stops at the first one and no scene is
/// produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    /// The description is malformed at `path`.
    #[error("[SCENE_FORMAT] {path}: {reason}")]
    Format {
        /// Field path such as `scene[1].dataset.transforms[0]`.
        path: String,
        /// What is wrong with the field.
        reason: String,
    },
    /// A transform reference names a transform that was never declared.
    #[error("[UNRESOLVED_TRANSFORM] {path}: no transform named '{name}'")]
    UnresolvedTransform {
        /// Field path of the reference.
        path: String,
        /// The unresolved name.
        name: String,
    },
}

impl SceneError {
    /// Field path the error points at.
    pub fn path(&self) -> &str {
        match self {
            Self::Format { path, .. } | Self::UnresolvedTransform { path, .. } => path,
        }
    }
}

/// Misuse of the variable API. The stored value is unchanged whenever one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariableError {
    /// No node with this name owns variables.
    #[error("unknown node '{0}'")]
    UnknownNode(String),
    /// The node has no variable with this name.
    #[error("node '{node}' has no variable '{variable}'")]
    UnknownVariable {
        /// Owning node.
        node: String,
        /// Requested variable.
        variable: String,
    },
    /// A float was given for an enum variable or the other way round.
    #[error("variable '{node}.{variable}' is a {expected} variable")]
    TypeMismatch {
        /// Owning node.
        node: String,
        /// Requested variable.
        variable: String,
        /// Kind the variable actually has.
        expected: VariableKind,
    },
    /// The value violates the variable's bounds or allowed set.
    #[error("invalid value for '{node}.{variable}': {reason}")]
    InvalidValue {
        /// Owning node.
        node: String,
        /// Requested variable.
        variable: String,
        /// Why the value was rejected.
        reason: String,
    },
    /// A second variable with the same name was declared on one node.
    #[error("node '{node}' already declares variable '{variable}'")]
    Duplicate {
        /// Owning node.
        node: String,
        /// Repeated name.
        variable: String,
    },
}

/// Recoverable findings reported alongside a successfully parsed scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneWarning {
    /// The node is hidden in both the 2D and the 3D view.
    Visibility {
        /// Name of the node.
        node: String,
    },
}

impl fmt::Display for SceneWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Visibility { node } => {
                write!(f, "node '{node}' is invisible in both 2D and 3D views")
            }
        }
    }
}

/// Errors raised while decoding a fetched payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// The buffer ended before `what` could be read.
    #[error("truncated payload: missing {what}")]
    Truncated {
        /// Section that was being read.
        what: &'static str,
    },
    /// The buffer does not start with the expected magic.
    #[error("bad magic: expected {expected}")]
    BadMagic {
        /// Expected magic, as text.
        expected: &'static str,
    },
    /// Known format, unknown version.
    #[error("unsupported version {0}")]
    UnsupportedVersion(u32),
    /// Structurally readable but semantically invalid.
    #[error("invalid payload: {0}")]
    Invalid(String),
}
