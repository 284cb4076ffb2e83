// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed [`CacheStore`] (one record file per identity key).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::store::{decode_record, encode_record};
use crate::{CacheStore, IdentityKey, ProviderIdentity, StoreError};

const RECORD_EXT: &str = "dcr";

/// Store payload records as files under a cache directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    base: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base = dir.into();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, key: &IdentityKey) -> PathBuf {
        self.base.join(format!("{key}.{RECORD_EXT}"))
    }
}

impl CacheStore for FsStore {
    fn load(&self, identity: &ProviderIdentity) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(&identity.key());
        let record = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Io(err)),
        };
        match decode_record(identity, &record) {
            Ok(Some(payload)) => Ok(Some(payload)),
            Ok(None) => {
                warn!(%identity, path = %path.display(), "cache record belongs to another identity; dropping");
                remove_if_present(&path)?;
                Ok(None)
            }
            Err(err) => {
                remove_if_present(&path)?;
                Err(err)
            }
        }
    }

    fn save(&self, identity: &ProviderIdentity, payload: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(&identity.key());
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, encode_record(identity, payload))?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &IdentityKey) -> Result<(), StoreError> {
        remove_if_present(&self.path_for(key))
    }

    fn clear(&self) -> Result<(), StoreError> {
        for entry in fs::read_dir(&self.base)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == RECORD_EXT) {
                remove_if_present(&path)?;
            }
        }
        Ok(())
    }
}

fn remove_if_present(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(StoreError::Io(err)),
    }
}
