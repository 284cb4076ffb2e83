// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Provider identities and their canonical keys.

use std::fmt;

/// Domain prefix mixed into every identity hash.
const KEY_DOMAIN: &[u8] = b"duality:provider-identity:v1\0";

const TAG_DOWNLOAD: u8 = 0;
const TAG_PARAMETRIZED: u8 = 1;
const TAG_FLOAT: u8 = 0;
const TAG_ENUM: u8 = 1;

/// Value of one variable inside a parametrized identity snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotValue {
    /// Continuous variable value.
    Float(f32),
    /// Enumerated variable value.
    Enum(String),
}

impl fmt::Display for SnapshotValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(value) => write!(f, "{value}"),
            Self::Enum(value) => f.write_str(value),
        }
    }
}

/// Uniquely identifies one fetchable payload.
///
/// Two providers with equal identities share one cache entry. For a
/// parametrized provider the snapshot is part of the identity, so editing any
/// variable yields a different identity (and key).
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderIdentity {
    /// Static file belonging to a scene.
    Download {
        /// Owning scene name.
        scene: String,
        /// File name on the server.
        filename: String,
    },
    /// Server-computed file.
    Parametrized {
        /// Owning scene name.
        scene: String,
        /// Script name on the server.
        filename: String,
        /// `(variable name, value)` pairs in declaration order.
        snapshot: Vec<(String, SnapshotValue)>,
    },
}

impl ProviderIdentity {
    /// Identity of a static download.
    pub fn download(scene: impl Into<String>, filename: impl Into<String>) -> Self {
        Self::Download {
            scene: scene.into(),
            filename: filename.into(),
        }
    }

    /// Identity of a server-computed file for the given snapshot.
    pub fn parametrized(
        scene: impl Into<String>,
        filename: impl Into<String>,
        snapshot: Vec<(String, SnapshotValue)>,
    ) -> Self {
        Self::Parametrized {
            scene: scene.into(),
            filename: filename.into(),
            snapshot,
        }
    }

    /// Owning scene name.
    pub fn scene(&self) -> &str {
        match self {
            Self::Download { scene, .. } | Self::Parametrized { scene, .. } => scene,
        }
    }

    /// Server-side file name.
    pub fn filename(&self) -> &str {
        match self {
            Self::Download { filename, .. } | Self::Parametrized { filename, .. } => filename,
        }
    }

    /// Canonical byte encoding used for hashing and for persisted records.
    ///
    /// Strings are length-prefixed (u32 LE). Floats are written as their bit
    /// pattern after folding `-0.0` into `0.0` and every NaN into one quiet
    /// NaN, so values that compare equal encode identically.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        match self {
            Self::Download { scene, filename } => {
                out.push(TAG_DOWNLOAD);
                put_str(&mut out, scene);
                put_str(&mut out, filename);
            }
            Self::Parametrized {
                scene,
                filename,
                snapshot,
            } => {
                out.push(TAG_PARAMETRIZED);
                put_str(&mut out, scene);
                put_str(&mut out, filename);
                out.extend_from_slice(&(snapshot.len() as u32).to_le_bytes());
                for (name, value) in snapshot {
                    put_str(&mut out, name);
                    match value {
                        SnapshotValue::Float(v) => {
                            out.push(TAG_FLOAT);
                            out.extend_from_slice(&canonical_f32_bits(*v).to_le_bytes());
                        }
                        SnapshotValue::Enum(v) => {
                            out.push(TAG_ENUM);
                            put_str(&mut out, v);
                        }
                    }
                }
            }
        }
        out
    }

    /// Cache key for this identity.
    pub fn key(&self) -> IdentityKey {
        let mut hasher = blake3::Hasher::new();
        hasher.update(KEY_DOMAIN);
        hasher.update(&self.canonical_bytes());
        IdentityKey(*hasher.finalize().as_bytes())
    }
}

impl fmt::Display for ProviderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scene(), self.filename())?;
        if let Self::Parametrized { snapshot, .. } = self {
            f.write_str("{")?;
            for (i, (name, value)) in snapshot.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{name}={value}")?;
            }
            f.write_str("}")?;
        }
        Ok(())
    }
}

/// 32-byte BLAKE3 key of a [`ProviderIdentity`].
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct IdentityKey(pub [u8; 32]);

impl IdentityKey {
    /// View the key as a byte array.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

fn put_str(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value.as_bytes());
}

fn canonical_f32_bits(value: f32) -> u32 {
    if value.is_nan() {
        f32::NAN.to_bits()
    } else if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}
