// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! G3D geometry payloads (structure of arrays).
//!
//! Layout, little-endian:
//!
//! ```text
//! "G3DS" | version u32 (1) | primitive u32 | index_count u32 | vertex_count u32
//!        | attribute_mask u32 | indices u32[index_count] | positions f32[3n]
//!        | normals f32[3n]? | tangents f32[3n]? | colors f32[4n]?
//!        | texcoords f32[2n]? | alphas f32[n]?
//! ```
//!
//! Optional attributes appear in mask-bit order.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::codec::Reader;
use crate::{BoundingBox, PayloadError};

const MAGIC: &str = "G3DS";
const VERSION: u32 = 1;

const HAS_NORMALS: u32 = 1 << 0;
const HAS_TANGENTS: u32 = 1 << 1;
const HAS_COLORS: u32 = 1 << 2;
const HAS_TEXCOORDS: u32 = 1 << 3;
const HAS_ALPHAS: u32 = 1 << 4;
const KNOWN_ATTRIBUTES: u32 = HAS_NORMALS | HAS_TANGENTS | HAS_COLORS | HAS_TEXCOORDS | HAS_ALPHAS;

/// Primitive topology of a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// One index per primitive.
    Point,
    /// Two indices per primitive.
    Line,
    /// Three indices per primitive.
    Triangle,
}

impl PrimitiveType {
    /// Indices per primitive.
    pub fn arity(self) -> usize {
        match self {
            Self::Point => 1,
            Self::Line => 2,
            Self::Triangle => 3,
        }
    }

    fn from_tag(tag: u32) -> Result<Self, PayloadError> {
        match tag {
            0 => Ok(Self::Point),
            1 => Ok(Self::Line),
            2 => Ok(Self::Triangle),
            other => Err(PayloadError::Invalid(format!("unknown primitive type {other}"))),
        }
    }
}

/// Decoded geometry.
///
/// Every present attribute has one entry per vertex; every index is below the
/// vertex count; the index count is a multiple of the primitive arity.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    /// Primitive topology.
    pub primitive: PrimitiveType,
    /// Index buffer in load order.
    pub indices: Vec<u32>,
    /// Vertex positions.
    pub positions: Vec<Vec3>,
    /// Per-vertex normals.
    pub normals: Option<Vec<Vec3>>,
    /// Per-vertex tangents.
    pub tangents: Option<Vec<Vec3>>,
    /// Per-vertex RGBA colours.
    pub colors: Option<Vec<Vec4>>,
    /// Per-vertex texture coordinates.
    pub texcoords: Option<Vec<Vec2>>,
    /// Per-vertex opacity.
    pub alphas: Option<Vec<f32>>,
}

impl Geometry {
    /// Decode a G3D payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        let mut r = Reader::new(bytes);
        r.magic(MAGIC)?;
        let version = r.u32("version")?;
        if version != VERSION {
            return Err(PayloadError::UnsupportedVersion(version));
        }
        let primitive = PrimitiveType::from_tag(r.u32("primitive type")?)?;
        let index_count = r.u32("index count")? as usize;
        let vertex_count = r.u32("vertex count")? as usize;
        let mask = r.u32("attribute mask")?;
        if mask & !KNOWN_ATTRIBUTES != 0 {
            return Err(PayloadError::Invalid(format!(
                "unknown attribute bits {:#x}",
                mask & !KNOWN_ATTRIBUTES
            )));
        }
        if index_count % primitive.arity() != 0 {
            return Err(PayloadError::Invalid(format!(
                "{index_count} indices do not form whole {primitive:?} primitives"
            )));
        }

        let indices = r.u32s(index_count, "indices")?;
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(PayloadError::Invalid(format!(
                "index {bad} out of range for {vertex_count} vertices"
            )));
        }
        let positions = r.vec3s(vertex_count, "positions")?;
        let has = |bit: u32| mask & bit != 0;
        let normals = has(HAS_NORMALS)
            .then(|| r.vec3s(vertex_count, "normals"))
            .transpose()?;
        let tangents = has(HAS_TANGENTS)
            .then(|| r.vec3s(vertex_count, "tangents"))
            .transpose()?;
        let colors = has(HAS_COLORS)
            .then(|| r.vec4s(vertex_count, "colors"))
            .transpose()?;
        let texcoords = has(HAS_TEXCOORDS)
            .then(|| r.vec2s(vertex_count, "texcoords"))
            .transpose()?;
        let alphas = has(HAS_ALPHAS)
            .then(|| r.f32s(vertex_count, "alphas"))
            .transpose()?;
        r.finish()?;

        Ok(Self {
            primitive,
            indices,
            positions,
            normals,
            tangents,
            colors,
            texcoords,
            alphas,
        })
    }

    /// Encode back into G3D. Used to build fixtures and by tools.
    pub fn encode(&self) -> Vec<u8> {
        let mut mask = 0;
        for (present, bit) in [
            (self.normals.is_some(), HAS_NORMALS),
            (self.tangents.is_some(), HAS_TANGENTS),
            (self.colors.is_some(), HAS_COLORS),
            (self.texcoords.is_some(), HAS_TEXCOORDS),
            (self.alphas.is_some(), HAS_ALPHAS),
        ] {
            if present {
                mask |= bit;
            }
        }
        let tag: u32 = match self.primitive {
            PrimitiveType::Point => 0,
            PrimitiveType::Line => 1,
            PrimitiveType::Triangle => 2,
        };
        let mut out = MAGIC.as_bytes().to_vec();
        for word in [
            VERSION,
            tag,
            self.indices.len() as u32,
            self.positions.len() as u32,
            mask,
        ] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        for index in &self.indices {
            out.extend_from_slice(&index.to_le_bytes());
        }
        let mut put = |values: &[f32]| {
            for v in values {
                out.extend_from_slice(&v.to_le_bytes());
            }
        };
        put(&flatten(&self.positions, Vec3::to_array));
        if let Some(n) = &self.normals {
            put(&flatten(n, Vec3::to_array));
        }
        if let Some(t) = &self.tangents {
            put(&flatten(t, Vec3::to_array));
        }
        if let Some(c) = &self.colors {
            put(&flatten(c, Vec4::to_array));
        }
        if let Some(uv) = &self.texcoords {
            put(&flatten(uv, Vec2::to_array));
        }
        if let Some(a) = &self.alphas {
            put(a);
        }
        out
    }

    /// Number of primitives.
    pub fn primitive_count(&self) -> usize {
        self.indices.len() / self.primitive.arity()
    }

    /// Bake `matrix` into positions, normals and tangents.
    ///
    /// Normals use the inverse transpose of the upper 3x3 block; normals and
    /// tangents are renormalised.
    pub fn apply_transform(&mut self, matrix: &Mat4) {
        for p in &mut self.positions {
            *p = matrix.transform_point3(*p);
        }
        if let Some(normals) = &mut self.normals {
            let normal_matrix = Mat3::from_mat4(*matrix).inverse().transpose();
            for n in normals.iter_mut() {
                *n = (normal_matrix * *n).normalize_or_zero();
            }
        }
        if let Some(tangents) = &mut self.tangents {
            for t in tangents.iter_mut() {
                *t = matrix.transform_vector3(*t).normalize_or_zero();
            }
        }
    }

    /// Opacity of vertex `v`: the alpha attribute, else the colour alpha,
    /// else 1.
    pub fn vertex_alpha(&self, v: usize) -> f32 {
        if let Some(alphas) = &self.alphas {
            return alphas[v];
        }
        self.colors.as_ref().map_or(1.0, |c| c[v].w)
    }

    /// Bounds of all vertex positions.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.positions)
    }
}

fn flatten<T: Copy, const N: usize>(items: &[T], to_array: fn(&T) -> [f32; N]) -> Vec<f32> {
    items.iter().flat_map(to_array).collect()
}
