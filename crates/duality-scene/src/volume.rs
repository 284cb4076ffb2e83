// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! I3M volume payloads.
//!
//! Layout, little-endian: `"I3M1" | size u32[3] | scale f32[3] |
//! voxels u32[x*y*z]` with each voxel a packed RGBA8 value.

use glam::{UVec3, Vec3};

use crate::codec::Reader;
use crate::{BoundingBox, PayloadError};

const MAGIC: &str = "I3M1";

/// Decoded voxel grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    /// Voxel counts along x, y, z.
    pub size: UVec3,
    /// Edge length of one voxel along x, y, z.
    pub scale: Vec3,
    /// `size.x * size.y * size.z` packed RGBA8 voxels, x fastest.
    pub voxels: Vec<u32>,
}

impl Volume {
    /// Decode an I3M payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        let mut r = Reader::new(bytes);
        r.magic(MAGIC)?;
        let size = UVec3::new(r.u32("size")?, r.u32("size")?, r.u32("size")?);
        let scale = Vec3::new(r.f32("scale")?, r.f32("scale")?, r.f32("scale")?);
        if !scale.is_finite() || scale.min_element() <= 0.0 {
            return Err(PayloadError::Invalid(format!("voxel scale {scale} must be positive")));
        }
        let count = (size.x as usize)
            .checked_mul(size.y as usize)
            .and_then(|xy| xy.checked_mul(size.z as usize))
            .ok_or_else(|| PayloadError::Invalid(format!("volume {size} is too large")))?;
        let voxels = r.u32s(count, "voxels")?;
        r.finish()?;
        Ok(Self {
            size,
            scale,
            voxels,
        })
    }

    /// Encode back into I3M.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = MAGIC.as_bytes().to_vec();
        for v in self.size.to_array() {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for v in self.scale.to_array() {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for v in &self.voxels {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    /// World-space extent of the grid.
    pub fn extent(&self) -> Vec3 {
        self.size.as_vec3() * self.scale
    }

    /// Box of the grid centred on the origin.
    pub fn bounding_box(&self) -> BoundingBox {
        let half = self.extent() * 0.5;
        BoundingBox::from_corners(-half, half)
    }
}
