// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scene loading for Duality clients.
//!
//! [`SceneLoader`] owns the remote link, the payload cache and at most one
//! loaded [`duality_scene::Scene`]. It is driven from a single owner thread:
//! payload fetches run on cache workers and their completions are applied by
//! [`SceneLoader::pump`].
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
    clippy::missing_errors_doc
)]

mod error;
mod loader;

pub use error::ClientError;
pub use loader::SceneLoader;
