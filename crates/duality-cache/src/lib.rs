// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identity-keyed payload cache for the Duality client.
//!
//! Every fetchable payload has a [`ProviderIdentity`]: `(scene, file)` for a
//! static download, `(scene, file, variable snapshot)` for a server-computed
//! file. Identities reduce to a 32-byte [`IdentityKey`] (BLAKE3 over a
//! canonical encoding) and [`DataCache`] keeps at most one entry, and at most
//! one in-flight fetch, per key.
//!
//! # Delivery Model
//!
//! Fetches run on worker threads. Completion is reported as a [`CacheEvent`]
//! sent over an `mpsc` channel supplied by the caller; events are always sent
//! after the cache lock is released, so a consumer may call back into the
//! cache while handling one.
//!
//! # Persistence
//!
//! An optional [`CacheStore`] tier keeps payloads across process runs. Stored
//! records embed the identity they were written for and a payload checksum;
//! a record that fails either check is dropped and the payload is fetched
//! again.
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
    clippy::use_self
)]

mod cache;
mod fs;
mod identity;
mod store;

pub use cache::{CacheEvent, CacheStats, DataCache, FetchHandle, FetchOutcome, Lookup};
pub use fs::FsStore;
pub use identity::{IdentityKey, ProviderIdentity, SnapshotValue};
pub use store::{CacheStore, MemoryStore, StoreError};

/// Errors delivered to cache subscribers when a provider fetch fails.
///
/// Failures are per identity: they are reported to everyone waiting on that
/// identity and are not cached, so a later request tries again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Transport or protocol failure while talking to the server.
    #[error("[REMOTE_FETCH] {0}")]
    Remote(String),
    /// The server reported that the resource does not exist.
    #[error("[NOT_FOUND] {0}")]
    NotFound(String),
}
