// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Axis-aligned bounding boxes.

use glam::{Mat4, Vec3};

/// Axis-aligned bounding box.
///
/// Invariant: `min` is component-wise less than or equal to `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min: Vec3,
    max: Vec3,
}

impl BoundingBox {
    /// Box spanning two corners given in any order.
    pub fn from_corners(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Smallest box containing every point; `None` for no points.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = *points.next()?;
        Some(points.fold(Self::from_corners(first, first), |bb, p| {
            Self {
                min: bb.min.min(*p),
                max: bb.max.max(*p),
            }
        }))
    }

    /// Minimum corner.
    pub fn min(&self) -> Vec3 {
        self.min
    }

    /// Maximum corner.
    pub fn max(&self) -> Vec3 {
        self.max
    }

    /// Center point.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Edge lengths.
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Union of two boxes.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Box around the eight corners after transformation by `matrix`.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let (lo, hi) = (self.min, self.max);
        let corners = [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
        .map(|c| matrix.transform_point3(c));
        let mut out = Self::from_corners(corners[0], corners[0]);
        for c in &corners[1..] {
            out.min = out.min.min(*c);
            out.max = out.max.max(*c);
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn from_points_and_union() {
        let pts = [Vec3::new(1.0, -2.0, 0.0), Vec3::new(-1.0, 3.0, 2.0)];
        let bb = BoundingBox::from_points(&pts).unwrap();
        assert_eq!(bb.min(), Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(bb.max(), Vec3::new(1.0, 3.0, 2.0));
        assert!(BoundingBox::from_points(&[]).is_none());

        let other = BoundingBox::from_corners(Vec3::splat(5.0), Vec3::splat(4.0));
        let u = bb.union(&other);
        assert_eq!(u.max(), Vec3::splat(5.0));
        assert_eq!(u.min(), bb.min());
    }

    #[test]
    fn transformed_box_stays_axis_aligned() {
        let bb = BoundingBox::from_corners(Vec3::splat(-1.0), Vec3::splat(1.0));
        let rotated = bb.transformed(&Mat4::from_rotation_z(std::f32::consts::FRAC_PI_4));
        let half_diag = 2.0_f32.sqrt();
        assert!((rotated.max().x - half_diag).abs() < 1e-5);
        assert!((rotated.min().y + half_diag).abs() < 1e-5);
        assert_eq!(rotated.center(), Vec3::ZERO);
    }
}
