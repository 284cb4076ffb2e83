// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Client settings for Duality tools and the port they are persisted through.
//!
//! [`ConfigService`] serializes values as JSON and hands the bytes to a
//! [`ConfigStore`]. [`FsConfigStore`] keeps them as files under the platform
//! config directory; [`MemoryConfigStore`] is the in-process variant.
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

mod config;
mod fs;
mod settings;

pub use config::{ConfigError, ConfigService, ConfigStore, MemoryConfigStore};
pub use fs::FsConfigStore;
pub use settings::{CachePolicy, ClientSettings, SETTINGS_KEY};
