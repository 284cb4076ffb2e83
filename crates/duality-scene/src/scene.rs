// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The scene graph: ordered nodes plus their variables.

use std::collections::HashSet;
use std::sync::mpsc::Sender;

use duality_cache::{CacheEvent, DataCache, ProviderIdentity};
use tracing::debug;

use crate::{
    BoundingBox, NodeVariables, SceneError, SceneNode, VariableError, VariableRegistry, View,
};

/// Descriptive header of a scene.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SceneMetadata {
    /// Scene name; also the namespace of its files on the server.
    pub name: String,
    /// Free-form description.
    pub description: String,
}

/// A parsed scene.
///
/// Node names are unique and every variable in the registry belongs to one of
/// the nodes.
#[derive(Debug)]
pub struct Scene {
    metadata: SceneMetadata,
    web_view_url: Option<String>,
    nodes: Vec<SceneNode>,
    variables: VariableRegistry,
}

impl Scene {
    /// Assemble a scene, checking node names against each other and against
    /// the registry.
    pub fn new(
        metadata: SceneMetadata,
        web_view_url: Option<String>,
        nodes: Vec<SceneNode>,
        variables: VariableRegistry,
    ) -> Result<Self, SceneError> {
        let mut seen = HashSet::new();
        for (i, node) in nodes.iter().enumerate() {
            if !seen.insert(node.name()) {
                return Err(SceneError::Format {
                    path: format!("scene[{i}].name"),
                    reason: format!("duplicate node name '{}'", node.name()),
                });
            }
        }
        if let Some(orphan) = variables.node_names().find(|n| !seen.contains(n)) {
            return Err(SceneError::Format {
                path: "scene".to_owned(),
                reason: format!("variables declared for missing node '{orphan}'"),
            });
        }
        Ok(Self {
            metadata,
            web_view_url,
            nodes,
            variables,
        })
    }

    /// Name and description.
    pub fn metadata(&self) -> &SceneMetadata {
        &self.metadata
    }

    /// Companion web page, if declared.
    pub fn web_view_url(&self) -> Option<&str> {
        self.web_view_url.as_deref()
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    /// Node by name.
    pub fn node(&self, name: &str) -> Option<&SceneNode> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    /// Nodes drawn in `view`, in declaration order.
    pub fn nodes_in_view(&self, view: View) -> impl Iterator<Item = &SceneNode> {
        self.nodes.iter().filter(move |n| n.is_visible_in(view))
    }

    /// Variable registry.
    pub fn variables(&self) -> &VariableRegistry {
        &self.variables
    }

    /// Variables of the nodes drawn in `view`, in node order. Nodes without
    /// variables are left out.
    pub fn values_for_view(&self, view: View) -> Vec<(&str, &NodeVariables)> {
        self.nodes_in_view(view)
            .filter_map(|n| {
                self.variables
                    .node(n.name())
                    .filter(|vars| !vars.is_empty())
                    .map(|vars| (n.name(), vars))
            })
            .collect()
    }

    /// Set a float variable and return the identities it made stale.
    pub fn set_float_variable(
        &mut self,
        node: &str,
        variable: &str,
        value: f32,
    ) -> Result<Vec<ProviderIdentity>, VariableError> {
        let before = self.identities_of(node);
        self.variables.set_float(node, variable, value)?;
        Ok(self.stale_identities(node, before))
    }

    /// Set an enum variable and return the identities it made stale.
    pub fn set_enum_variable(
        &mut self,
        node: &str,
        variable: &str,
        value: &str,
    ) -> Result<Vec<ProviderIdentity>, VariableError> {
        let before = self.identities_of(node);
        self.variables.set_enum(node, variable, value)?;
        Ok(self.stale_identities(node, before))
    }

    /// Request every payload whose current identity is neither installed nor
    /// pending. Cache misses report back on `notify`.
    ///
    /// Returns the number of requests made.
    pub fn update_datasets(&mut self, cache: &DataCache, notify: &Sender<CacheEvent>) -> usize {
        let registry = &self.variables;
        let requested: usize = self
            .nodes
            .iter_mut()
            .map(|n| n.refresh(registry, cache, notify))
            .sum();
        if requested > 0 {
            debug!(scene = %self.metadata.name, requested, "datasets refreshed");
        }
        requested
    }

    /// Route a cache event to every dataset waiting for its key.
    pub fn apply_event(&mut self, event: &CacheEvent) -> bool {
        self.nodes
            .iter_mut()
            .fold(false, |applied, n| n.deliver(event) || applied)
    }

    /// Number of nodes waiting for a payload.
    pub fn pending_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_pending()).count()
    }

    /// Make failed datasets eligible for the next [`Scene::update_datasets`].
    pub fn reset_unavailable(&mut self) {
        for node in &mut self.nodes {
            node.reset_unavailable();
        }
    }

    /// Union of the bounds of ready datasets drawn in `view`.
    pub fn bounding_box(&self, view: View) -> Option<BoundingBox> {
        self.nodes_in_view(view)
            .filter_map(|n| n.dataset().bounding_box())
            .reduce(|a, b| a.union(&b))
    }

    fn identities_of(&self, node: &str) -> Vec<ProviderIdentity> {
        self.node(node)
            .map(|n| n.identities(&self.variables))
            .unwrap_or_default()
    }

    fn stale_identities(&self, node: &str, before: Vec<ProviderIdentity>) -> Vec<ProviderIdentity> {
        let after = self.identities_of(node);
        before.into_iter().filter(|id| !after.contains(id)).collect()
    }
}
