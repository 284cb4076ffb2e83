// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Initial camera parameters declared by a scene.

use glam::{Mat4, Vec2, Vec3};

/// Slicing axis of the 2D view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinateAxis {
    /// Slice across x.
    X,
    /// Slice across y.
    Y,
    /// Slice across z.
    #[default]
    Z,
}

impl CoordinateAxis {
    /// Parse the lowercase description tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "x" => Some(Self::X),
            "y" => Some(Self::Y),
            "z" => Some(Self::Z),
            _ => None,
        }
    }

    /// Lowercase description tag.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        }
    }
}

/// Camera of the 3D view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParameters3D {
    /// Camera translation.
    pub translation: Vec3,
    /// Camera rotation.
    pub rotation: Mat4,
}

impl Default for RenderParameters3D {
    fn default() -> Self {
        Self {
            translation: Vec3::new(0.0, 0.0, -3.0),
            rotation: Mat4::IDENTITY,
        }
    }
}

/// Camera of the 2D slice view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParameters2D {
    /// Pan in the slice plane.
    pub translation: Vec2,
    /// In-plane rotation in radians.
    pub rotation: f32,
    /// Zoom factor.
    pub zoom: f32,
    /// Slicing axis.
    pub axis: CoordinateAxis,
    /// Slice position along `axis`.
    pub depth: f32,
}

impl Default for RenderParameters2D {
    fn default() -> Self {
        Self {
            translation: Vec2::ZERO,
            rotation: 0.0,
            zoom: 1.0,
            axis: CoordinateAxis::Z,
            depth: 0.0,
        }
    }
}

/// Views declared under `initialView`; absent views use defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InitialView {
    /// Declared 3D camera.
    pub three_d: Option<RenderParameters3D>,
    /// Declared 2D camera.
    pub two_d: Option<RenderParameters2D>,
}

impl InitialView {
    /// 3D camera to start with.
    pub fn params_3d(&self) -> RenderParameters3D {
        self.three_d.unwrap_or_default()
    }

    /// 2D camera to start with.
    pub fn params_2d(&self) -> RenderParameters2D {
        self.two_d.unwrap_or_default()
    }
}
