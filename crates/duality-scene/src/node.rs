// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scene nodes.

use std::sync::mpsc::Sender;

use duality_cache::{CacheEvent, DataCache, ProviderIdentity};

use crate::dataset;
use crate::{Dataset, DatasetStatus, TransferFunction, VariableRegistry, View, Visibility};

/// A named, renderable element of a scene.
#[derive(Debug)]
pub struct SceneNode {
    name: String,
    visibility: Visibility,
    dataset: Dataset,
    transfer_function: Option<TransferFunction>,
}

impl SceneNode {
    /// Node drawing `dataset`. Only volume nodes sample a transfer function.
    pub fn new(
        name: impl Into<String>,
        visibility: Visibility,
        dataset: Dataset,
        transfer_function: Option<TransferFunction>,
    ) -> Self {
        Self {
            name: name.into(),
            visibility,
            dataset,
            transfer_function,
        }
    }

    /// Unique node name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Views the node is drawn in.
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Returns `true` if the node is drawn in `view`.
    pub fn is_visible_in(&self, view: View) -> bool {
        self.visibility.is_visible_in(view)
    }

    /// Dataset of the node.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Transfer function of a volume node.
    pub fn transfer_function(&self) -> Option<&TransferFunction> {
        self.transfer_function.as_ref()
    }

    /// Returns `true` while the dataset or transfer function waits for a
    /// payload.
    pub fn is_pending(&self) -> bool {
        let tf_pending = self
            .transfer_function
            .as_ref()
            .is_some_and(|tf| matches!(tf.status(), DatasetStatus::Pending(_)));
        tf_pending || matches!(self.dataset.status(), DatasetStatus::Pending(_))
    }

    /// Request payloads whose identity has nothing installed or pending.
    pub(crate) fn refresh(
        &mut self,
        registry: &VariableRegistry,
        cache: &DataCache,
        notify: &Sender<CacheEvent>,
    ) -> usize {
        let mut requested = usize::from(self.dataset.refresh(&self.name, registry, cache, notify));
        if let Some(tf) = self.transfer_function.as_mut() {
            requested += usize::from(dataset::refresh(tf, &self.name, registry, cache, notify));
        }
        requested
    }

    pub(crate) fn deliver(&mut self, event: &CacheEvent) -> bool {
        let mut applied = self.dataset.deliver(event, &self.name);
        if let Some(tf) = self.transfer_function.as_mut() {
            applied |= dataset::deliver(tf, event, &self.name);
        }
        applied
    }

    pub(crate) fn reset_unavailable(&mut self) {
        self.dataset.reset_unavailable();
        if let Some(tf) = self.transfer_function.as_mut() {
            dataset::reset_unavailable(tf);
        }
    }

    /// Current identities of every provider of this node.
    pub(crate) fn identities(
        &self,
        registry: &VariableRegistry,
    ) -> Vec<ProviderIdentity> {
        let tf = self.transfer_function.as_ref().and_then(TransferFunction::provider);
        std::iter::once(self.dataset.provider())
            .chain(tf)
            .filter_map(|p| p.identity(registry).ok())
            .collect()
    }
}
