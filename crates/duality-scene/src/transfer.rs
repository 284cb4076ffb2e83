// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Transfer functions of volume nodes.

use crate::dataset::{Fetchable, FetchState};
use crate::{DataProvider, DatasetStatus, PayloadError};

/// Entries of the identity table.
const IDENTITY_ENTRIES: usize = 256;

/// RGBA8 lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTable {
    entries: Vec<[u8; 4]>,
}

impl TransferTable {
    /// Decode a raw RGBA8 table: non-empty, length a multiple of 4.
    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        if bytes.is_empty() {
            return Err(PayloadError::Invalid("empty transfer function".to_owned()));
        }
        if bytes.len() % 4 != 0 {
            return Err(PayloadError::Invalid(format!(
                "transfer function of {} bytes is not RGBA8",
                bytes.len()
            )));
        }
        Ok(Self {
            entries: bytes
                .chunks_exact(4)
                .map(|c| [c[0], c[1], c[2], c[3]])
                .collect(),
        })
    }

    /// Linear ramp mapping each intensity to itself in every channel.
    pub fn identity() -> Self {
        Self {
            entries: (0..IDENTITY_ENTRIES)
                .map(|i| {
                    let v = i as u8;
                    [v, v, v, v]
                })
                .collect(),
        }
    }

    /// Table entries.
    pub fn entries(&self) -> &[[u8; 4]] {
        &self.entries
    }
}

/// Optional per-volume transfer function.
///
/// Without a provider, or until one has delivered, lookups use
/// [`TransferTable::identity`].
#[derive(Debug)]
pub struct TransferFunction {
    provider: Option<DataProvider>,
    state: FetchState,
    table: Option<TransferTable>,
}

impl TransferFunction {
    /// Transfer function fetched through `provider`.
    pub fn new(provider: DataProvider) -> Self {
        Self {
            provider: Some(provider),
            state: FetchState::default(),
            table: None,
        }
    }

    /// The identity transfer function; nothing to fetch.
    pub fn identity() -> Self {
        Self {
            provider: None,
            state: FetchState::default(),
            table: None,
        }
    }

    /// Provider, if the function is fetched.
    pub fn provider(&self) -> Option<&DataProvider> {
        self.provider.as_ref()
    }

    /// Fetch status.
    pub fn status(&self) -> &DatasetStatus {
        &self.state.status
    }

    /// Table to sample: the fetched one, or the identity ramp.
    pub fn table(&self) -> TransferTable {
        self.table.clone().unwrap_or_else(TransferTable::identity)
    }

    /// Fetched table, if any.
    pub fn fetched_table(&self) -> Option<&TransferTable> {
        self.table.as_ref()
    }
}

impl Fetchable for TransferFunction {
    fn provider(&self) -> Option<&DataProvider> {
        self.provider.as_ref()
    }

    fn state(&self) -> &FetchState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut FetchState {
        &mut self.state
    }

    fn install(&mut self, payload: &[u8]) -> Result<(), PayloadError> {
        self.table = Some(TransferTable::decode(payload)?);
        Ok(())
    }

    fn discard(&mut self) {
        self.table = None;
    }
}
