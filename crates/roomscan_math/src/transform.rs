// Transform utilities for Mat4
//
// Extends glam::Mat4 with the helpers the scene graph needs for framing.

use glam::{Mat4, Vec3};
use crate::Aabb;

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Transform an axis-aligned bounding box.
    /// Computes the bounding box of all 8 transformed corners.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;

    /// True when every element is finite.
    fn is_finite_matrix(&self) -> bool;
}

impl Mat4Ext for Mat4 {
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        if aabb.is_empty() {
            return Aabb::EMPTY;
        }

        aabb.corners()
            .iter()
            .map(|&corner| self.transform_point3(corner))
            .fold(Aabb::EMPTY, |acc, p: Vec3| acc.include_point(p))
    }

    fn is_finite_matrix(&self) -> bool {
        self.to_cols_array().iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_aabb_translation() {
        let mat = Mat4::from_translation(Vec3::new(5.0, 5.0, 5.0));
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::ONE);
        let transformed = mat.transform_aabb(&aabb);

        assert!((transformed.min() - Vec3::splat(5.0)).length() < 0.001);
        assert!((transformed.max() - Vec3::splat(6.0)).length() < 0.001);
    }

    #[test]
    fn test_transform_aabb_rotation() {
        use std::f32::consts::FRAC_PI_2;

        // 90 degrees about Z maps +X extent onto +Y
        let mat = Mat4::from_rotation_z(FRAC_PI_2);
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::new(2.0, 1.0, 1.0));
        let transformed = mat.transform_aabb(&aabb);

        assert!((transformed.y.size() - 2.0).abs() < 0.001);
        assert!((transformed.x.size() - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_empty_aabb_stays_empty() {
        let mat = Mat4::from_translation(Vec3::X);
        assert!(mat.transform_aabb(&Aabb::EMPTY).is_empty());
    }

    #[test]
    fn test_non_finite_matrix_detected() {
        assert!(Mat4::IDENTITY.is_finite_matrix());
        assert!(!Mat4::from_scale(Vec3::new(f32::NAN, 1.0, 1.0)).is_finite_matrix());
    }
}
