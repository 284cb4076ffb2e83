// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Datasets: geometry and volume payloads owned by scene nodes.

use std::sync::mpsc::Sender;

use duality_cache::{CacheEvent, DataCache, FetchOutcome, IdentityKey, Lookup};
use glam::{Mat4, Vec4};
use tracing::{debug, warn};

use crate::{
    BoundingBox, DataProvider, Geometry, PayloadError, PrimitiveOrder, VariableRegistry, Volume,
};

/// Payload state of a dataset or transfer function.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DatasetStatus {
    /// Nothing requested yet, or the last request was invalidated.
    #[default]
    Empty,
    /// A fetch for this identity key is outstanding.
    Pending(IdentityKey),
    /// A decoded payload is installed.
    Ready,
    /// The fetch failed or the payload could not be decoded.
    Unavailable(String),
}

/// Bookkeeping shared by everything that pulls a payload from the cache.
#[derive(Debug, Clone, Default)]
pub(crate) struct FetchState {
    pub(crate) status: DatasetStatus,
    /// Identity key of the installed, pending or failed payload.
    pub(crate) key: Option<IdentityKey>,
}

/// A consumer of one provider's payload.
pub(crate) trait Fetchable {
    /// Where the payload comes from; `None` means nothing to fetch.
    fn provider(&self) -> Option<&DataProvider>;
    fn state(&self) -> &FetchState;
    fn state_mut(&mut self) -> &mut FetchState;
    /// Decode and keep `payload`.
    fn install(&mut self, payload: &[u8]) -> Result<(), PayloadError>;
    /// Drop the decoded payload.
    fn discard(&mut self);
}

/// Ask the cache for the payload matching the target's current identity.
///
/// Returns `true` if a new request went out (hit or miss).
pub(crate) fn refresh<T: Fetchable>(
    target: &mut T,
    label: &str,
    registry: &VariableRegistry,
    cache: &DataCache,
    notify: &Sender<CacheEvent>,
) -> bool {
    let Some(provider) = target.provider() else {
        return false;
    };
    let identity = match provider.identity(registry) {
        Ok(identity) => identity,
        Err(err) => {
            warn!(node = label, %err, "cannot compute provider identity");
            target.discard();
            *target.state_mut() = FetchState {
                status: DatasetStatus::Unavailable(err.to_string()),
                key: None,
            };
            return false;
        }
    };
    let key = identity.key();
    let state = target.state();
    if state.key == Some(key) && state.status != DatasetStatus::Empty {
        return false;
    }
    let job = provider.fetch_job(&identity);
    match cache.request(&identity, notify.clone(), job) {
        Lookup::Hit(payload) => {
            debug!(node = label, %identity, "payload served from cache");
            install(target, key, &payload, label);
        }
        Lookup::Pending => {
            debug!(node = label, %identity, "payload requested");
            let state = target.state_mut();
            state.status = DatasetStatus::Pending(key);
            state.key = Some(key);
        }
    }
    true
}

/// Apply a cache event to the target if it is waiting for that key.
///
/// Events for any other key (stale completions, other datasets) are ignored.
pub(crate) fn deliver<T: Fetchable>(target: &mut T, event: &CacheEvent, label: &str) -> bool {
    if target.state().status != DatasetStatus::Pending(event.key) {
        return false;
    }
    match &event.outcome {
        FetchOutcome::Ready(payload) => install(target, event.key, payload, label),
        FetchOutcome::Failed(err) => {
            warn!(node = label, %err, "payload fetch failed");
            target.discard();
            target.state_mut().status = DatasetStatus::Unavailable(err.to_string());
        }
        FetchOutcome::Invalidated => {
            debug!(node = label, "pending payload invalidated");
            *target.state_mut() = FetchState::default();
        }
    }
    true
}

/// Turn a settled-as-unavailable target back into a candidate for fetching.
pub(crate) fn reset_unavailable<T: Fetchable>(target: &mut T) {
    if matches!(target.state().status, DatasetStatus::Unavailable(_)) {
        *target.state_mut() = FetchState::default();
    }
}

fn install<T: Fetchable>(target: &mut T, key: IdentityKey, payload: &[u8], label: &str) {
    let status = match target.install(payload) {
        Ok(()) => DatasetStatus::Ready,
        Err(err) => {
            warn!(node = label, %err, "payload could not be decoded");
            target.discard();
            DatasetStatus::Unavailable(err.to_string())
        }
    };
    *target.state_mut() = FetchState {
        status,
        key: Some(key),
    };
}

/// Triangle, line or point geometry.
///
/// The decoded geometry of the last successful fetch stays readable while a
/// fetch for a new identity is pending.
#[derive(Debug)]
pub struct GeometryDataset {
    provider: DataProvider,
    transforms: Vec<Mat4>,
    color: Option<Vec4>,
    state: FetchState,
    geometry: Option<Geometry>,
    order: Option<PrimitiveOrder>,
}

impl GeometryDataset {
    /// Dataset fetched through `provider`; `transforms` are applied in order
    /// after decoding; `color` overrides per-vertex colours.
    pub fn new(provider: DataProvider, transforms: Vec<Mat4>, color: Option<Vec4>) -> Self {
        Self {
            provider,
            transforms,
            color,
            state: FetchState::default(),
            geometry: None,
            order: None,
        }
    }

    /// Payload source.
    pub fn provider(&self) -> &DataProvider {
        &self.provider
    }

    /// Load-time transforms in application order.
    pub fn transforms(&self) -> &[Mat4] {
        &self.transforms
    }

    /// Override colour.
    pub fn color(&self) -> Option<Vec4> {
        self.color
    }

    /// Fetch status.
    pub fn status(&self) -> &DatasetStatus {
        &self.state.status
    }

    /// Decoded geometry with transforms applied.
    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    /// Opaque/transparent split of the decoded geometry.
    pub fn primitive_order(&self) -> Option<&PrimitiveOrder> {
        self.order.as_ref()
    }

    /// Opaque indices in load order; empty until a payload is installed.
    pub fn opaque_indices(&self) -> &[u32] {
        self.order.as_ref().map_or(&[], PrimitiveOrder::opaque_indices)
    }

    /// Transparent indices sorted back to front for `model_view`.
    pub fn sorted_transparent_indices(&self, model_view: &Mat4) -> Vec<u32> {
        self.order
            .as_ref()
            .map_or_else(Vec::new, |order| order.sorted_transparent(model_view))
    }

    /// Bounds of the decoded geometry.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.geometry.as_ref().and_then(Geometry::bounding_box)
    }

    /// Install an already decoded payload, bypassing the cache.
    pub fn load(&mut self, payload: &[u8]) -> Result<(), PayloadError> {
        let result = Fetchable::install(self, payload);
        self.state.status = match &result {
            Ok(()) => DatasetStatus::Ready,
            Err(err) => DatasetStatus::Unavailable(err.to_string()),
        };
        result
    }
}

impl Fetchable for GeometryDataset {
    fn provider(&self) -> Option<&DataProvider> {
        Some(&self.provider)
    }

    fn state(&self) -> &FetchState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut FetchState {
        &mut self.state
    }

    fn install(&mut self, payload: &[u8]) -> Result<(), PayloadError> {
        let mut geometry = Geometry::decode(payload)?;
        for matrix in &self.transforms {
            geometry.apply_transform(matrix);
        }
        self.order = Some(PrimitiveOrder::build(&geometry, self.color));
        self.geometry = Some(geometry);
        Ok(())
    }

    fn discard(&mut self) {
        self.geometry = None;
        self.order = None;
    }
}

/// Voxel volume.
#[derive(Debug)]
pub struct VolumeDataset {
    provider: DataProvider,
    transforms: Vec<Mat4>,
    state: FetchState,
    volume: Option<Volume>,
}

impl VolumeDataset {
    /// Dataset fetched through `provider`; `transforms` place the grid.
    pub fn new(provider: DataProvider, transforms: Vec<Mat4>) -> Self {
        Self {
            provider,
            transforms,
            state: FetchState::default(),
            volume: None,
        }
    }

    /// Payload source.
    pub fn provider(&self) -> &DataProvider {
        &self.provider
    }

    /// Load-time transforms in application order.
    pub fn transforms(&self) -> &[Mat4] {
        &self.transforms
    }

    /// Combined placement matrix (first transform applied first).
    pub fn model_matrix(&self) -> Mat4 {
        self.transforms
            .iter()
            .fold(Mat4::IDENTITY, |acc, m| *m * acc)
    }

    /// Fetch status.
    pub fn status(&self) -> &DatasetStatus {
        &self.state.status
    }

    /// Decoded volume.
    pub fn volume(&self) -> Option<&Volume> {
        self.volume.as_ref()
    }

    /// Bounds of the placed grid.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.volume
            .as_ref()
            .map(|v| v.bounding_box().transformed(&self.model_matrix()))
    }
}

impl Fetchable for VolumeDataset {
    fn provider(&self) -> Option<&DataProvider> {
        Some(&self.provider)
    }

    fn state(&self) -> &FetchState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut FetchState {
        &mut self.state
    }

    fn install(&mut self, payload: &[u8]) -> Result<(), PayloadError> {
        self.volume = Some(Volume::decode(payload)?);
        Ok(())
    }

    fn discard(&mut self) {
        self.volume = None;
    }
}

/// A renderable payload of a scene node.
#[derive(Debug)]
pub enum Dataset {
    /// Geometry dataset.
    Geometry(GeometryDataset),
    /// Volume dataset.
    Volume(VolumeDataset),
}

impl Dataset {
    /// Payload source.
    pub fn provider(&self) -> &DataProvider {
        match self {
            Self::Geometry(d) => d.provider(),
            Self::Volume(d) => d.provider(),
        }
    }

    /// Fetch status.
    pub fn status(&self) -> &DatasetStatus {
        match self {
            Self::Geometry(d) => d.status(),
            Self::Volume(d) => d.status(),
        }
    }

    /// Returns `true` if a payload is installed.
    pub fn is_ready(&self) -> bool {
        *self.status() == DatasetStatus::Ready
    }

    /// Bounds of the installed payload.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        match self {
            Self::Geometry(d) => d.bounding_box(),
            Self::Volume(d) => d.bounding_box(),
        }
    }

    pub(crate) fn refresh(
        &mut self,
        label: &str,
        registry: &VariableRegistry,
        cache: &DataCache,
        notify: &Sender<CacheEvent>,
    ) -> bool {
        match self {
            Self::Geometry(d) => refresh(d, label, registry, cache, notify),
            Self::Volume(d) => refresh(d, label, registry, cache, notify),
        }
    }

    pub(crate) fn deliver(&mut self, event: &CacheEvent, label: &str) -> bool {
        match self {
            Self::Geometry(d) => deliver(d, event, label),
            Self::Volume(d) => deliver(d, event, label),
        }
    }

    pub(crate) fn reset_unavailable(&mut self) {
        match self {
            Self::Geometry(d) => reset_unavailable(d),
            Self::Volume(d) => reset_unavailable(d),
        }
    }
}
