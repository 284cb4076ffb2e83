// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed scene graph for the Duality client.
//!
//! A server supplies each scene as an untyped JSON description. [`parse_scene`]
//! validates it in one all-or-nothing pass and yields a [`Scene`]: ordered
//! [`SceneNode`]s, each owning a [`Dataset`] whose payload is fetched through a
//! [`DataProvider`] and the shared [`duality_cache::DataCache`].
//!
//! # Ownership
//!
//! The scene owns its nodes, a node owns its dataset, a dataset owns its
//! provider. Variable values live in one [`VariableRegistry`] keyed by node
//! name; parametrized providers keep only the node name and compute their
//! cache identity from the registry on demand.
//!
//! # Payload Flow
//!
//! [`Scene::update_datasets`] asks the cache for every dataset whose identity
//! has no payload yet. Hits are decoded immediately; misses complete later as
//! [`duality_cache::CacheEvent`]s which the owner feeds back through
//! [`Scene::apply_event`].
//!
//! # Transparency
//!
//! Geometry datasets split primitives into opaque and transparent sets at load
//! time. [`GeometryDataset::sorted_transparent_indices`] reorders the
//! transparent set back to front for a given model-view matrix.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation
)]

mod bounds;
mod codec;
mod dataset;
mod description;
mod error;
mod geometry;
mod node;
mod parser;
mod provider;
mod render_params;
mod scene;
mod sort;
mod transfer;
mod transform;
mod variables;
mod view;
mod volume;

pub use bounds::BoundingBox;
pub use dataset::{Dataset, DatasetStatus, GeometryDataset, VolumeDataset};
pub use error::{PayloadError, SceneError, SceneWarning, VariableError};
pub use geometry::{Geometry, PrimitiveType};
pub use node::SceneNode;
pub use parser::{parse_metadata, parse_scene, ParsedScene};
pub use provider::{DataProvider, DownloadProvider, ParametrizedProvider};
pub use render_params::{CoordinateAxis, InitialView, RenderParameters2D, RenderParameters3D};
pub use scene::{Scene, SceneMetadata};
pub use sort::PrimitiveOrder;
pub use transfer::{TransferFunction, TransferTable};
pub use transform::{TransformRef, TransformTable, UnresolvedTransform};
pub use variables::{
    EnumVariable, FloatVariable, NodeVariables, Variable, VariableKind, VariableRegistry,
};
pub use view::{View, Visibility};
pub use volume::Volume;

/// Re-exported so callers can name snapshot values without a direct
/// `duality-cache` dependency.
pub use duality_cache::SnapshotValue;
