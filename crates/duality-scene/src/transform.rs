// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Named and inline transform references.

use std::collections::HashMap;

use glam::Mat4;

/// A transform as written in a description: a literal matrix or a name.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformRef {
    /// 16 elements, column-major.
    Inline(Mat4),
    /// Name of a transform declared in the description's `transforms` table.
    Named(String),
}

/// A named reference with no matching declaration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no transform named '{name}'")]
pub struct UnresolvedTransform {
    /// The missing name.
    pub name: String,
}

/// Named transforms of one description.
///
/// Lives for a single parse pass; resolved matrices are baked into datasets.
#[derive(Debug, Clone, Default)]
pub struct TransformTable {
    named: HashMap<String, Mat4>,
}

impl TransformTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `matrix` under `name`. Redefinition replaces the previous
    /// matrix, which is returned.
    pub fn define(&mut self, name: impl Into<String>, matrix: Mat4) -> Option<Mat4> {
        self.named.insert(name.into(), matrix)
    }

    /// Resolve a reference to its matrix.
    pub fn resolve(&self, reference: &TransformRef) -> Result<Mat4, UnresolvedTransform> {
        match reference {
            TransformRef::Inline(matrix) => Ok(*matrix),
            TransformRef::Named(name) => {
                self.named
                    .get(name)
                    .copied()
                    .ok_or_else(|| UnresolvedTransform { name: name.clone() })
            }
        }
    }

    /// Number of named transforms.
    pub fn len(&self) -> usize {
        self.named.len()
    }

    /// Returns `true` if no transform is named.
    pub fn is_empty(&self) -> bool {
        self.named.is_empty()
    }
}

/// Build a matrix from 16 description elements (column-major, translation in
/// elements 12..15).
pub(crate) fn matrix_from_elements(elements: &[f32; 16]) -> Mat4 {
    Mat4::from_cols_array(elements)
}
