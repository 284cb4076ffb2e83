// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persistent tier port and the record format shared by its implementations.
//!
//! Record layout (integers little-endian):
//!
//! ``MAGIC "DCR1"(4) || IDENTITY_LEN(4) || IDENTITY || PAYLOAD_LEN(8) ||
//! BLAKE3(PAYLOAD)(32) || PAYLOAD``
//!
//! `IDENTITY` is [`ProviderIdentity::canonical_bytes`]. A record is only
//! returned for the identity it was written for; keys alone are never trusted.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::{IdentityKey, ProviderIdentity};

const RECORD_MAGIC: [u8; 4] = *b"DCR1";

/// Errors raised by a [`CacheStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O failure in the backing medium.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A record failed structural or checksum validation.
    #[error("[CACHE_RECORD_CORRUPT] {0}")]
    Corrupt(String),
}

/// Key-value byte storage keyed by provider identity.
///
/// Implementations must be safe to call from fetch worker threads.
pub trait CacheStore: Send + Sync {
    /// Load the payload stored for `identity`.
    ///
    /// Returns `Ok(None)` when nothing valid is stored; a record written for a
    /// different identity, or one whose checksum fails, counts as nothing.
    fn load(&self, identity: &ProviderIdentity) -> Result<Option<Vec<u8>>, StoreError>;

    /// Persist `payload` for `identity`, replacing any previous record.
    fn save(&self, identity: &ProviderIdentity, payload: &[u8]) -> Result<(), StoreError>;

    /// Remove the record for `key`. No-op if absent.
    fn remove(&self, key: &IdentityKey) -> Result<(), StoreError>;

    /// Remove every record.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Serialize a record for `identity`.
pub(crate) fn encode_record(identity: &ProviderIdentity, payload: &[u8]) -> Vec<u8> {
    let id = identity.canonical_bytes();
    let mut out = Vec::with_capacity(4 + 4 + id.len() + 8 + 32 + payload.len());
    out.extend_from_slice(&RECORD_MAGIC);
    out.extend_from_slice(&(id.len() as u32).to_le_bytes());
    out.extend_from_slice(&id);
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(blake3::hash(payload).as_bytes());
    out.extend_from_slice(payload);
    out
}

/// Validate a record against `identity` and return its payload.
///
/// `Ok(None)` means the record belongs to another identity.
pub(crate) fn decode_record(
    identity: &ProviderIdentity,
    record: &[u8],
) -> Result<Option<Vec<u8>>, StoreError> {
    let corrupt = |what: &str| StoreError::Corrupt(what.to_owned());
    let (magic, rest) = split(record, 4).ok_or_else(|| corrupt("truncated magic"))?;
    if magic != RECORD_MAGIC {
        return Err(corrupt("bad magic"));
    }
    let (id_len, rest) = split(rest, 4).ok_or_else(|| corrupt("truncated identity length"))?;
    let id_len = u32::from_le_bytes([id_len[0], id_len[1], id_len[2], id_len[3]]) as usize;
    let (stored_id, rest) = split(rest, id_len).ok_or_else(|| corrupt("truncated identity"))?;
    if stored_id != identity.canonical_bytes().as_slice() {
        return Ok(None);
    }
    let (len, rest) = split(rest, 8).ok_or_else(|| corrupt("truncated payload length"))?;
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(len);
    let len = usize::try_from(u64::from_le_bytes(len_bytes))
        .map_err(|_| corrupt("payload length overflows"))?;
    let (checksum, payload) = split(rest, 32).ok_or_else(|| corrupt("truncated checksum"))?;
    if payload.len() != len {
        return Err(corrupt("payload length mismatch"));
    }
    if blake3::hash(payload).as_bytes() != checksum {
        return Err(corrupt("checksum mismatch"));
    }
    Ok(Some(payload.to_vec()))
}

fn split(bytes: &[u8], at: usize) -> Option<(&[u8], &[u8])> {
    (bytes.len() >= at).then(|| bytes.split_at(at))
}

/// In-memory [`CacheStore`]; records live as long as the store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<IdentityKey, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite the raw record bytes for `key` (tests use this to simulate
    /// damaged or foreign records).
    pub fn put_raw(&self, key: IdentityKey, record: Vec<u8>) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, record);
    }
}

impl CacheStore for MemoryStore {
    fn load(&self, identity: &ProviderIdentity) -> Result<Option<Vec<u8>>, StoreError> {
        let key = identity.key();
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(record) = records.get(&key) else {
            return Ok(None);
        };
        match decode_record(identity, record) {
            Ok(Some(payload)) => Ok(Some(payload)),
            Ok(None) => {
                records.remove(&key);
                Ok(None)
            }
            Err(err) => {
                records.remove(&key);
                Err(err)
            }
        }
    }

    fn save(&self, identity: &ProviderIdentity, payload: &[u8]) -> Result<(), StoreError> {
        let record = encode_record(identity, payload);
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.key(), record);
        Ok(())
    }

    fn remove(&self, key: &IdentityKey) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::SnapshotValue;

    fn identity() -> ProviderIdentity {
        ProviderIdentity::parametrized(
            "scene",
            "gen.py",
            vec![("iso".to_owned(), SnapshotValue::Float(0.5))],
        )
    }

    #[test]
    fn save_then_load_returns_payload() {
        let store = MemoryStore::new();
        store.save(&identity(), b"voxels").unwrap();
        assert_eq!(store.load(&identity()).unwrap().unwrap(), b"voxels");
    }

    #[test]
    fn record_for_other_identity_is_a_miss() {
        let store = MemoryStore::new();
        let other = ProviderIdentity::download("scene", "gen.py");
        // Simulate a key collision: the slot for `identity()` holds a record
        // written for a different identity.
        store.put_raw(identity().key(), encode_record(&other, b"stale"));
        assert!(store.load(&identity()).unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn flipped_payload_byte_is_corrupt() {
        let store = MemoryStore::new();
        let mut record = encode_record(&identity(), b"payload");
        let last = record.len() - 1;
        record[last] ^= 0xFF;
        store.put_raw(identity().key(), record);
        assert!(matches!(
            store.load(&identity()),
            Err(StoreError::Corrupt(msg)) if msg == "checksum mismatch"
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn truncated_record_is_corrupt() {
        let record = encode_record(&identity(), b"payload");
        assert!(decode_record(&identity(), &record[..record.len() - 3]).is_err());
        assert!(decode_record(&identity(), &record[..6]).is_err());
    }

    #[test]
    fn remove_and_clear() {
        let store = MemoryStore::new();
        let a = ProviderIdentity::download("s", "a");
        let b = ProviderIdentity::download("s", "b");
        store.save(&a, b"a").unwrap();
        store.save(&b, b"b").unwrap();
        store.remove(&a.key()).unwrap();
        assert!(store.load(&a).unwrap().is_none());
        assert_eq!(store.len(), 1);
        store.clear().unwrap();
        assert!(store.is_empty());
    }
}
