// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Path-tracking view over an untyped description tree.

use serde_json::{Map, Value};

use crate::transform::matrix_from_elements;
use crate::{SceneError, TransformRef};

/// A value in the description together with the path that leads to it.
#[derive(Debug, Clone)]
pub(crate) struct Field<'a> {
    value: &'a Value,
    path: String,
}

impl<'a> Field<'a> {
    pub(crate) fn root(value: &'a Value) -> Self {
        Self {
            value,
            path: String::new(),
        }
    }

    pub(crate) fn path(&self) -> &str {
        if self.path.is_empty() {
            "<root>"
        } else {
            &self.path
        }
    }

    pub(crate) fn error(&self, reason: impl Into<String>) -> SceneError {
        SceneError::Format {
            path: self.path().to_owned(),
            reason: reason.into(),
        }
    }

    fn child_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_owned()
        } else {
            format!("{}.{key}", self.path)
        }
    }

    fn object(&self) -> Result<&'a Map<String, Value>, SceneError> {
        self.value
            .as_object()
            .ok_or_else(|| self.error(format!("expected an object, found {}", kind_of(self.value))))
    }

    /// Required member of an object.
    pub(crate) fn get(&self, key: &str) -> Result<Field<'a>, SceneError> {
        self.opt(key)?.ok_or_else(|| SceneError::Format {
            path: self.child_path(key),
            reason: "missing required field".to_owned(),
        })
    }

    /// Optional member of an object. An explicit `null` counts as absent.
    pub(crate) fn opt(&self, key: &str) -> Result<Option<Field<'a>>, SceneError> {
        Ok(self
            .object()?
            .get(key)
            .filter(|v| !v.is_null())
            .map(|value| Field {
                value,
                path: self.child_path(key),
            }))
    }

    /// Members of an object, ordered by key.
    pub(crate) fn entries(&self) -> Result<Vec<(&'a str, Field<'a>)>, SceneError> {
        Ok(self
            .object()?
            .iter()
            .map(|(key, value)| {
                (
                    key.as_str(),
                    Field {
                        value,
                        path: self.child_path(key),
                    },
                )
            })
            .collect())
    }

    /// Elements of an array.
    pub(crate) fn items(&self) -> Result<Vec<Field<'a>>, SceneError> {
        let items = self
            .value
            .as_array()
            .ok_or_else(|| self.error(format!("expected an array, found {}", kind_of(self.value))))?;
        Ok(items
            .iter()
            .enumerate()
            .map(|(i, value)| Field {
                value,
                path: format!("{}[{i}]", self.path),
            })
            .collect())
    }

    pub(crate) fn is_array(&self) -> bool {
        self.value.is_array()
    }

    pub(crate) fn str(&self) -> Result<&'a str, SceneError> {
        self.value
            .as_str()
            .ok_or_else(|| self.error(format!("expected a string, found {}", kind_of(self.value))))
    }

    pub(crate) fn bool(&self) -> Result<bool, SceneError> {
        self.value
            .as_bool()
            .ok_or_else(|| self.error(format!("expected a boolean, found {}", kind_of(self.value))))
    }

    pub(crate) fn f32(&self) -> Result<f32, SceneError> {
        let wide = self
            .value
            .as_f64()
            .ok_or_else(|| self.error(format!("expected a number, found {}", kind_of(self.value))))?;
        let narrow = wide as f32;
        if narrow.is_finite() {
            Ok(narrow)
        } else {
            Err(self.error(format!("{wide} does not fit a 32-bit float")))
        }
    }

    /// Fixed-length numeric array.
    pub(crate) fn floats<const N: usize>(&self, what: &str) -> Result<[f32; N], SceneError> {
        let items = self.items()?;
        if items.len() != N {
            return Err(self.error(format!(
                "{what} needs {N} elements, found {}",
                items.len()
            )));
        }
        let mut out = [0.0; N];
        for (slot, item) in out.iter_mut().zip(&items) {
            *slot = item.f32()?;
        }
        Ok(out)
    }

    /// A transform reference: a 16-element matrix or a transform name.
    pub(crate) fn transform_ref(&self) -> Result<TransformRef, SceneError> {
        if self.is_array() {
            let elements = self.floats::<16>("matrix")?;
            Ok(TransformRef::Inline(matrix_from_elements(&elements)))
        } else if let Some(name) = self.value.as_str() {
            Ok(TransformRef::Named(name.to_owned()))
        } else {
            Err(self.error(format!(
                "expected a matrix or a transform name, found {}",
                kind_of(self.value)
            )))
        }
    }
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
