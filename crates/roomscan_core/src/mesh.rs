//! Render-ready mesh buffers.
//!
//! Geometry arrives from the decoder already flattened: every three
//! consecutive positions form one triangle, and normals/uvs (when present)
//! run parallel to the positions. No index buffer is kept.

use roomscan_math::{as_bytes, Aabb, Vec2, Vec3};

/// Flat triangle-list geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshBuffers {
    /// Vertex positions, three per triangle
    pub positions: Vec<Vec3>,

    /// Per-vertex normals as authored (not computed)
    pub normals: Option<Vec<Vec3>>,

    /// Per-vertex texture coordinates
    pub uvs: Option<Vec<Vec2>>,

    /// Bounds of `positions` in local space
    pub bounds: Aabb,
}

impl MeshBuffers {
    pub fn new(positions: Vec<Vec3>, normals: Option<Vec<Vec3>>, uvs: Option<Vec<Vec2>>) -> Self {
        let bounds = Aabb::from_point_cloud(&positions);
        Self {
            positions,
            normals,
            uvs,
            bounds,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn has_normals(&self) -> bool {
        self.normals
            .as_ref()
            .is_some_and(|normals| normals.len() == self.positions.len())
    }

    pub fn has_uvs(&self) -> bool {
        self.uvs.is_some()
    }

    /// Iterate over triangle corner positions.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.positions
            .chunks_exact(3)
            .map(|tri| [tri[0], tri[1], tri[2]])
    }

    /// One face normal per corner, assuming counter-clockwise front faces.
    ///
    /// Degenerate triangles get a zero normal.
    pub fn compute_flat_normals(&self) -> Vec<Vec3> {
        let mut normals = Vec::with_capacity(self.positions.len());
        for [v0, v1, v2] in self.triangles() {
            let normal = (v1 - v0).cross(v2 - v0).normalize_or_zero();
            normals.extend([normal; 3]);
        }
        normals
    }

    /// Fill in flat normals when none were authored or their count is off.
    pub fn ensure_normals(&mut self) {
        if !self.has_normals() {
            self.normals = Some(self.compute_flat_normals());
        }
    }

    /// Reverse the winding of every triangle (swap second and third corners).
    pub(crate) fn flip_winding(&mut self) {
        fn flip<T>(values: &mut [T]) {
            for tri in values.chunks_exact_mut(3) {
                tri.swap(1, 2);
            }
        }
        flip(&mut self.positions);
        if let Some(normals) = self.normals.as_mut() {
            flip(normals);
        }
        if let Some(uvs) = self.uvs.as_mut() {
            flip(uvs);
        }
    }

    pub fn positions_bytes(&self) -> &[u8] {
        as_bytes(&self.positions)
    }

    pub fn normals_bytes(&self) -> Option<&[u8]> {
        self.normals.as_deref().map(as_bytes)
    }

    pub fn uvs_bytes(&self) -> Option<&[u8]> {
        self.uvs.as_deref().map(as_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> MeshBuffers {
        MeshBuffers::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            None,
            Some(vec![Vec2::ZERO; 6]),
        )
    }

    #[test]
    fn test_counts_and_bounds() {
        let mesh = quad();
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.bounds.min(), Vec3::ZERO);
        assert_eq!(mesh.bounds.max(), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_flat_normals_ccw() {
        let normals = quad().compute_flat_normals();
        assert_eq!(normals.len(), 6);
        for n in normals {
            assert!((n - Vec3::Z).length() < 1e-6);
        }
    }

    #[test]
    fn test_ensure_normals_only_when_missing() {
        let mut mesh = quad();
        assert!(!mesh.has_normals());
        mesh.ensure_normals();
        assert!(mesh.has_normals());

        let mut authored = quad();
        authored.normals = Some(vec![Vec3::X; 6]);
        authored.ensure_normals();
        assert_eq!(authored.normals.unwrap()[0], Vec3::X);
    }

    #[test]
    fn test_flip_winding() {
        let mut mesh = quad();
        mesh.flip_winding();
        assert_eq!(mesh.positions[1], Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(mesh.positions[2], Vec3::new(1.0, 0.0, 0.0));
        for n in mesh.compute_flat_normals() {
            assert!((n + Vec3::Z).length() < 1e-6);
        }
    }

    #[test]
    fn test_buffer_bytes() {
        let mesh = quad();
        assert_eq!(mesh.positions_bytes().len(), 6 * 12);
        assert_eq!(mesh.uvs_bytes().map(<[u8]>::len), Some(6 * 8));
        assert!(mesh.normals_bytes().is_none());
    }
}
