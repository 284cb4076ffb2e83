// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-node input variables of parametrized providers.
//!
//! Every node gets an index space of its own: the first variable declared for
//! a node has index 0, the next 1, and so on. Indices never change after
//! declaration.

use std::collections::BTreeMap;
use std::fmt;

use duality_cache::SnapshotValue;

use crate::VariableError;

/// Kind of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// Continuous value within bounds.
    Float,
    /// One of a fixed list of strings.
    Enum,
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Float => "float",
            Self::Enum => "enum",
        })
    }
}

/// A continuous variable.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatVariable {
    /// Name, unique within the node.
    pub name: String,
    /// Optional display label.
    pub label: Option<String>,
    /// Declaration index within the node.
    pub index: usize,
    /// Smallest accepted value.
    pub lower_bound: f32,
    /// Largest accepted value.
    pub upper_bound: f32,
    /// UI step hint.
    pub step_size: f32,
    /// Value at load time.
    pub default_value: f32,
    value: f32,
}

impl FloatVariable {
    /// Current value.
    pub fn value(&self) -> f32 {
        self.value
    }
}

/// An enumerated variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumVariable {
    /// Name, unique within the node.
    pub name: String,
    /// Optional display label.
    pub label: Option<String>,
    /// Declaration index within the node.
    pub index: usize,
    /// Allowed values in declaration order.
    pub values: Vec<String>,
    /// Value at load time.
    pub default_value: String,
    value: String,
}

impl EnumVariable {
    /// Current value.
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// One declared variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    /// Continuous variable.
    Float(FloatVariable),
    /// Enumerated variable.
    Enum(EnumVariable),
}

impl Variable {
    /// Variable name.
    pub fn name(&self) -> &str {
        match self {
            Self::Float(v) => &v.name,
            Self::Enum(v) => &v.name,
        }
    }

    /// Declaration index within the owning node.
    pub fn index(&self) -> usize {
        match self {
            Self::Float(v) => v.index,
            Self::Enum(v) => v.index,
        }
    }

    /// Display label, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Float(v) => v.label.as_deref(),
            Self::Enum(v) => v.label.as_deref(),
        }
    }

    /// Variable kind.
    pub fn kind(&self) -> VariableKind {
        match self {
            Self::Float(_) => VariableKind::Float,
            Self::Enum(_) => VariableKind::Enum,
        }
    }

    /// Current value in snapshot form.
    pub fn current(&self) -> SnapshotValue {
        match self {
            Self::Float(v) => SnapshotValue::Float(v.value),
            Self::Enum(v) => SnapshotValue::Enum(v.value.clone()),
        }
    }
}

/// Variables of a single node, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeVariables {
    variables: Vec<Variable>,
}

impl NodeVariables {
    /// All variables in declaration (index) order.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    /// Float variables in declaration order.
    pub fn floats(&self) -> impl Iterator<Item = &FloatVariable> {
        self.variables.iter().filter_map(|v| match v {
            Variable::Float(f) => Some(f),
            Variable::Enum(_) => None,
        })
    }

    /// Enum variables in declaration order.
    pub fn enums(&self) -> impl Iterator<Item = &EnumVariable> {
        self.variables.iter().filter_map(|v| match v {
            Variable::Enum(e) => Some(e),
            Variable::Float(_) => None,
        })
    }

    /// Variable by name.
    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name() == name)
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Returns `true` if the node declares no variables.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.iter_mut().find(|v| v.name() == name)
    }
}

/// Authoritative store of variable definitions and values, keyed by node name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableRegistry {
    nodes: BTreeMap<String, NodeVariables>,
}

impl VariableRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `node` has an (initially empty) variable list.
    pub fn register_node(&mut self, node: impl Into<String>) {
        self.nodes.entry(node.into()).or_default();
    }

    /// Returns `true` if `node` is registered.
    pub fn contains_node(&self, node: &str) -> bool {
        self.nodes.contains_key(node)
    }

    /// Registered node names, sorted.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Variables of `node`.
    pub fn node(&self, node: &str) -> Option<&NodeVariables> {
        self.nodes.get(node)
    }

    /// Append a float variable to `node` and return its index.
    ///
    /// The bounds must be ordered and contain the default value.
    #[allow(clippy::too_many_arguments)]
    pub fn declare_float(
        &mut self,
        node: &str,
        name: &str,
        label: Option<String>,
        lower_bound: f32,
        upper_bound: f32,
        step_size: f32,
        default_value: f32,
    ) -> Result<usize, VariableError> {
        let invalid = |reason: String| VariableError::InvalidValue {
            node: node.to_owned(),
            variable: name.to_owned(),
            reason,
        };
        if lower_bound > upper_bound {
            return Err(invalid(format!(
                "lower bound {lower_bound} exceeds upper bound {upper_bound}"
            )));
        }
        if !(lower_bound..=upper_bound).contains(&default_value) {
            return Err(invalid(format!(
                "default {default_value} outside [{lower_bound}, {upper_bound}]"
            )));
        }
        let vars = self.declaring(node, name)?;
        let index = vars.len();
        vars.variables.push(Variable::Float(FloatVariable {
            name: name.to_owned(),
            label,
            index,
            lower_bound,
            upper_bound,
            step_size,
            default_value,
            value: default_value,
        }));
        Ok(index)
    }

    /// Append an enum variable to `node` and return its index.
    ///
    /// `values` must be non-empty and contain the default value.
    pub fn declare_enum(
        &mut self,
        node: &str,
        name: &str,
        label: Option<String>,
        values: Vec<String>,
        default_value: String,
    ) -> Result<usize, VariableError> {
        let invalid = |reason: String| VariableError::InvalidValue {
            node: node.to_owned(),
            variable: name.to_owned(),
            reason,
        };
        if values.is_empty() {
            return Err(invalid("enum declares no values".to_owned()));
        }
        if !values.contains(&default_value) {
            return Err(invalid(format!(
                "default '{default_value}' is not one of the allowed values"
            )));
        }
        let vars = self.declaring(node, name)?;
        let index = vars.len();
        vars.variables.push(Variable::Enum(EnumVariable {
            name: name.to_owned(),
            label,
            index,
            values,
            value: default_value.clone(),
            default_value,
        }));
        Ok(index)
    }

    /// Set a float variable.
    pub fn set_float(&mut self, node: &str, variable: &str, value: f32) -> Result<(), VariableError> {
        match self.lookup_mut(node, variable)? {
            Variable::Float(var) => {
                if !value.is_finite() || !(var.lower_bound..=var.upper_bound).contains(&value) {
                    return Err(VariableError::InvalidValue {
                        node: node.to_owned(),
                        variable: variable.to_owned(),
                        reason: format!(
                            "{value} outside [{}, {}]",
                            var.lower_bound, var.upper_bound
                        ),
                    });
                }
                var.value = value;
                Ok(())
            }
            Variable::Enum(_) => Err(VariableError::TypeMismatch {
                node: node.to_owned(),
                variable: variable.to_owned(),
                expected: VariableKind::Enum,
            }),
        }
    }

    /// Set an enum variable.
    pub fn set_enum(&mut self, node: &str, variable: &str, value: &str) -> Result<(), VariableError> {
        match self.lookup_mut(node, variable)? {
            Variable::Enum(var) => {
                if !var.values.iter().any(|allowed| allowed == value) {
                    return Err(VariableError::InvalidValue {
                        node: node.to_owned(),
                        variable: variable.to_owned(),
                        reason: format!("'{value}' is not one of {:?}", var.values),
                    });
                }
                value.clone_into(&mut var.value);
                Ok(())
            }
            Variable::Float(_) => Err(VariableError::TypeMismatch {
                node: node.to_owned(),
                variable: variable.to_owned(),
                expected: VariableKind::Float,
            }),
        }
    }

    /// Set a variable from a tagged value, dispatching on its kind.
    pub fn set_variable(
        &mut self,
        node: &str,
        variable: &str,
        value: &SnapshotValue,
    ) -> Result<(), VariableError> {
        match value {
            SnapshotValue::Float(v) => self.set_float(node, variable, *v),
            SnapshotValue::Enum(v) => self.set_enum(node, variable, v),
        }
    }

    /// `(name, value)` pairs of `node` in declaration order.
    pub fn snapshot(&self, node: &str) -> Result<Vec<(String, SnapshotValue)>, VariableError> {
        let vars = self
            .nodes
            .get(node)
            .ok_or_else(|| VariableError::UnknownNode(node.to_owned()))?;
        Ok(vars
            .iter()
            .map(|v| (v.name().to_owned(), v.current()))
            .collect())
    }

    /// `(name, value)` pairs of the listed variables of `node`, in declaration
    /// order.
    pub fn snapshot_of(
        &self,
        node: &str,
        names: &[String],
    ) -> Result<Vec<(String, SnapshotValue)>, VariableError> {
        let vars = self
            .nodes
            .get(node)
            .ok_or_else(|| VariableError::UnknownNode(node.to_owned()))?;
        if let Some(missing) = names.iter().find(|name| vars.get(name).is_none()) {
            return Err(VariableError::UnknownVariable {
                node: node.to_owned(),
                variable: missing.clone(),
            });
        }
        Ok(vars
            .iter()
            .filter(|v| names.iter().any(|name| name == v.name()))
            .map(|v| (v.name().to_owned(), v.current()))
            .collect())
    }

    fn declaring(&mut self, node: &str, name: &str) -> Result<&mut NodeVariables, VariableError> {
        let vars = self.nodes.entry(node.to_owned()).or_default();
        if vars.get(name).is_some() {
            return Err(VariableError::Duplicate {
                node: node.to_owned(),
                variable: name.to_owned(),
            });
        }
        Ok(vars)
    }

    fn lookup_mut(&mut self, node: &str, variable: &str) -> Result<&mut Variable, VariableError> {
        self.nodes
            .get_mut(node)
            .ok_or_else(|| VariableError::UnknownNode(node.to_owned()))?
            .get_mut(variable)
            .ok_or_else(|| VariableError::UnknownVariable {
                node: node.to_owned(),
                variable: variable.to_owned(),
            })
    }
}
