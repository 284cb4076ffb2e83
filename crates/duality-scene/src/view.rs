// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! View modes and per-node visibility.

/// Rendering mode of a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// Slice view.
    TwoD,
    /// Perspective view.
    ThreeD,
}

/// Which views a node takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    /// Only the 2D view.
    Visible2D,
    /// Only the 3D view.
    Visible3D,
    /// Both views.
    #[default]
    VisibleBoth,
    /// Neither view.
    VisibleNone,
}

impl Visibility {
    /// Visibility from the `view2d` / `view3d` flags of a description node.
    pub fn from_flags(view2d: bool, view3d: bool) -> Self {
        match (view2d, view3d) {
            (true, true) => Self::VisibleBoth,
            (true, false) => Self::Visible2D,
            (false, true) => Self::Visible3D,
            (false, false) => Self::VisibleNone,
        }
    }

    /// Returns `true` if a node with this visibility is drawn in `view`.
    pub fn is_visible_in(self, view: View) -> bool {
        matches!(
            (self, view),
            (Self::VisibleBoth, _) | (Self::Visible2D, View::TwoD) | (Self::Visible3D, View::ThreeD)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_to_visibility() {
        assert_eq!(Visibility::from_flags(true, true), Visibility::VisibleBoth);
        assert_eq!(Visibility::from_flags(false, true), Visibility::Visible3D);
        assert_eq!(Visibility::from_flags(true, false), Visibility::Visible2D);
        assert_eq!(Visibility::from_flags(false, false), Visibility::VisibleNone);
    }

    #[test]
    fn none_is_never_visible() {
        assert!(!Visibility::VisibleNone.is_visible_in(View::TwoD));
        assert!(!Visibility::VisibleNone.is_visible_in(View::ThreeD));
        assert!(Visibility::Visible3D.is_visible_in(View::ThreeD));
        assert!(!Visibility::Visible3D.is_visible_in(View::TwoD));
    }
}
