// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Pixel domains: a grid size plus the transformation that places it in the virtual plane.

The transformation maps domain space (centered on the grid) into the shared virtual space.
Two domains compare equal within [REALIZE_TOLERANCE] per matrix element.
*/

use glam::{IVec2, Mat2, Mat3, Vec2};

/// Tolerance for "is this transform the identity" and "are these domains the same".
pub const REALIZE_TOLERANCE: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    pub size: IVec2,
    pub transformation: Mat3,
}

impl Domain {
    /// A domain of `size` at the origin with no transformation.
    pub const fn identity(size: IVec2) -> Self {
        Domain {
            size,
            transformation: Mat3::IDENTITY,
        }
    }

    pub const fn new(size: IVec2, transformation: Mat3) -> Self {
        Domain { size, transformation }
    }

    pub fn translation(&self) -> Vec2 {
        self.transformation.z_axis.truncate()
    }

    /// The 2x2 rotation/scale/shear part.
    pub fn linear(&self) -> Mat2 {
        Mat2::from_mat3(self.transformation)
    }

    /// Sizes equal and transformations element-wise within [REALIZE_TOLERANCE].
    pub fn is_equal(&self, other: &Domain) -> bool {
        self.size == other.size && transformations_equal(&self.transformation, &other.transformation)
    }
}

pub fn transformations_equal(a: &Mat3, b: &Mat3) -> bool {
    a.abs_diff_eq(*b, REALIZE_TOLERANCE)
}

pub fn is_identity_linear(linear: &Mat2) -> bool {
    linear.abs_diff_eq(Mat2::IDENTITY, REALIZE_TOLERANCE)
}
