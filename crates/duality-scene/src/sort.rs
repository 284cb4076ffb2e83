// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Opaque/transparent primitive split and back-to-front ordering.

use glam::{Mat4, Vec3, Vec4};

use crate::{Geometry, PrimitiveType};

/// Load-time primitive classification of one geometry.
///
/// Opaque indices keep load order and are never resorted. Transparent indices
/// are stored with one centroid per transparent primitive, in the same order.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveOrder {
    primitive: PrimitiveType,
    opaque: Vec<u32>,
    transparent: Vec<u32>,
    centroids: Vec<Vec3>,
}

impl PrimitiveOrder {
    /// Classify the primitives of `geometry`.
    ///
    /// A primitive is transparent if any of its vertices has alpha below 1 or
    /// if `override_color` has alpha below 1.
    pub fn build(geometry: &Geometry, override_color: Option<Vec4>) -> Self {
        let arity = geometry.primitive.arity();
        let all_transparent = override_color.is_some_and(|c| c.w < 1.0);
        let mut opaque = Vec::new();
        let mut transparent = Vec::new();
        let mut centroids = Vec::new();
        for prim in geometry.indices.chunks_exact(arity) {
            let is_transparent = all_transparent
                || prim
                    .iter()
                    .any(|&v| geometry.vertex_alpha(v as usize) < 1.0);
            if is_transparent {
                let sum: Vec3 = prim
                    .iter()
                    .map(|&v| geometry.positions[v as usize])
                    .sum();
                centroids.push(sum / arity as f32);
                transparent.extend_from_slice(prim);
            } else {
                opaque.extend_from_slice(prim);
            }
        }
        Self {
            primitive: geometry.primitive,
            opaque,
            transparent,
            centroids,
        }
    }

    /// Opaque indices in load order.
    pub fn opaque_indices(&self) -> &[u32] {
        &self.opaque
    }

    /// Transparent indices in load order.
    pub fn transparent_indices(&self) -> &[u32] {
        &self.transparent
    }

    /// Centroid of each transparent primitive.
    pub fn centroids(&self) -> &[Vec3] {
        &self.centroids
    }

    /// Transparent indices ordered back to front for `model_view`.
    ///
    /// A singular matrix has no eye position; load order is returned.
    pub fn sorted_transparent(&self, model_view: &Mat4) -> Vec<u32> {
        let Some(eye) = eye_in_object_space(model_view) else {
            return self.transparent.clone();
        };
        let order = back_to_front(&self.centroids, eye);
        expand_by_arity(&order, &self.transparent, self.primitive.arity())
    }
}

/// Viewer origin transformed into object space, or `None` if `model_view`
/// cannot be inverted.
pub(crate) fn eye_in_object_space(model_view: &Mat4) -> Option<Vec3> {
    let det = model_view.determinant();
    if det == 0.0 || !det.is_finite() {
        return None;
    }
    let eye = model_view.inverse() * Vec4::W;
    if eye.w == 0.0 {
        return None;
    }
    let eye = eye.truncate() / eye.w;
    eye.is_finite().then_some(eye)
}

/// Primitive indices ordered by descending squared distance to `eye`.
///
/// The sort is stable: equidistant primitives keep load order.
pub(crate) fn back_to_front(centroids: &[Vec3], eye: Vec3) -> Vec<usize> {
    let distances: Vec<f32> = centroids.iter().map(|c| c.distance_squared(eye)).collect();
    let mut order: Vec<usize> = (0..centroids.len()).collect();
    order.sort_by(|&a, &b| distances[b].total_cmp(&distances[a]));
    order
}

/// Rebuild an index buffer from a primitive permutation.
pub(crate) fn expand_by_arity(order: &[usize], indices: &[u32], arity: usize) -> Vec<u32> {
    let mut out = Vec::with_capacity(indices.len());
    for &prim in order {
        let start = prim * arity;
        out.extend_from_slice(&indices[start..start + arity]);
    }
    out
}
