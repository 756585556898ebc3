//! Mesh prim → flat triangle buffers.
//!
//! USD meshes are indexed polygon soups with attributes that may be
//! per-point, face-varying, or indexed separately. Everything is expanded
//! here into one vertex per triangle corner.
//!
//! Supported faces are triangles and quads (fan-split as (0,1,2)+(0,2,3)).
//! Other polygon sizes are skipped and reported.

use std::collections::BTreeMap;

use roomscan_math::{Vec2, Vec3};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::mesh::MeshBuffers;

use super::types::PropertyNode;
use super::values::{parse_floats, parse_indices, parse_token};

/// Triangulate a face-vertex index list against per-face vertex counts.
///
/// Returns the triangle-list indices and how many faces were skipped per
/// unsupported vertex count. Indices past the end of `indices` (or past
/// `usize::MAX` for absurd counts) come back as -1 so the range check
/// downstream catches them.
pub fn triangulate(indices: &[i64], counts: &[i64]) -> (Vec<i64>, BTreeMap<i64, usize>) {
    let at = |offset: usize, k: usize| {
        offset
            .checked_add(k)
            .and_then(|i| indices.get(i).copied())
            .unwrap_or(-1)
    };
    let mut triangles = Vec::with_capacity(counts.len() * 6);
    let mut skipped = BTreeMap::new();
    let mut offset = 0usize;

    for &count in counts {
        match count {
            3 => triangles.extend([at(offset, 0), at(offset, 1), at(offset, 2)]),
            4 => {
                let (a, b, c, d) = (at(offset, 0), at(offset, 1), at(offset, 2), at(offset, 3));
                triangles.extend([a, b, c, a, c, d]);
            }
            _ => *skipped.entry(count).or_insert(0) += 1,
        }
        offset = offset.saturating_add(usize::try_from(count).unwrap_or(0));
    }

    (triangles, skipped)
}

/// Per-mesh attribute expansion with diagnostics attached to the mesh name.
struct MeshReader<'a> {
    name: &'a str,
    counts: Option<Vec<i64>>,
    diagnostics: &'a mut Diagnostics,
}

impl MeshReader<'_> {
    /// Triangulate against the mesh's face counts; without counts the list
    /// is already a triangle list.
    fn triangulated(&mut self, list: Vec<i64>, report_faces: bool) -> Vec<i64> {
        let Some(counts) = self.counts.as_deref() else {
            return list;
        };

        let (triangles, skipped) = triangulate(&list, counts);
        if report_faces {
            for (vertex_count, faces) in skipped {
                self.diagnostics.push(Diagnostic::DegenerateFace {
                    mesh: self.name.to_string(),
                    vertex_count,
                    faces,
                });
            }
        }
        triangles
    }

    /// Gather `N`-wide elements of `values` through `indices`. Out-of-range
    /// indices produce zeroed elements.
    fn deindex<const N: usize>(&mut self, values: &[f32], indices: &[i64], attribute: &str) -> Vec<[f32; N]> {
        let element_count = values.len() / N;
        let mut first_bad = None;
        let mut occurrences = 0;

        let gathered = indices
            .iter()
            .map(|&index| match usize::try_from(index) {
                Ok(i) if i < element_count => element::<N>(&values[i * N..i * N + N]),
                _ => {
                    occurrences += 1;
                    first_bad.get_or_insert(index);
                    [0.0; N]
                }
            })
            .collect();

        if let Some(index) = first_bad {
            self.diagnostics.push(Diagnostic::IndexOutOfRange {
                mesh: self.name.to_string(),
                attribute: attribute.to_string(),
                index,
                occurrences,
            });
        }
        gathered
    }

    /// Gather through the position indices when there are any, else take
    /// the values in order.
    fn by_position<const N: usize>(&mut self, values: &[f32], position_indices: Option<&[i64]>, attribute: &str) -> Vec<[f32; N]> {
        match position_indices {
            Some(indices) => self.deindex::<N>(values, indices, attribute),
            None => chunks::<N>(values),
        }
    }

    /// One value per face corner, in face order.
    fn face_varying<const N: usize>(&mut self, values: &[f32], attribute: &str) -> Vec<[f32; N]> {
        let trivial: Vec<i64> = (0..(values.len() / N) as i64).collect();
        let indices = self.triangulated(trivial, false);
        self.deindex::<N>(values, &indices, attribute)
    }
}

fn element<const N: usize>(slice: &[f32]) -> [f32; N] {
    let mut out = [0.0; N];
    out.copy_from_slice(slice);
    out
}

fn chunks<const N: usize>(values: &[f32]) -> Vec<[f32; N]> {
    values.chunks_exact(N).map(element::<N>).collect()
}

/// Build flat buffers for a `Mesh` prim. Returns `None` when it has no `points`.
pub fn build_mesh(name: &str, node: &PropertyNode, diagnostics: &mut Diagnostics) -> Option<MeshBuffers> {
    let points = parse_floats(node.attribute_text("points")?);

    let mut reader = MeshReader {
        name,
        counts: node.attribute_text("faceVertexCounts").map(parse_indices),
        diagnostics,
    };

    let position_indices = node
        .attribute_text("faceVertexIndices")
        .map(parse_indices)
        .map(|raw| reader.triangulated(raw, true));
    let position_indices = position_indices.as_deref();

    let positions: Vec<Vec3> = reader
        .by_position::<3>(&points, position_indices, "points")
        .into_iter()
        .map(Vec3::from_array)
        .collect();

    let uvs = node.attribute_text("primvars:st").map(|text| {
        let st = parse_floats(text);
        let values: Vec<[f32; 2]> = if let Some(st_indices) = node.attribute_text("primvars:st:indices") {
            let indices = reader.triangulated(parse_indices(st_indices), false);
            reader.deindex::<2>(&st, &indices, "primvars:st")
        } else if st.len() / 2 == points.len() / 3 {
            reader.by_position::<2>(&st, position_indices, "primvars:st")
        } else {
            reader.face_varying::<2>(&st, "primvars:st")
        };
        values.into_iter().map(Vec2::from_array).collect::<Vec<_>>()
    });

    let authored_normals = node
        .attribute_text("normals")
        .map(|text| (text, None))
        .or_else(|| {
            node.attribute_text("primvars:normals")
                .map(|text| (text, node.attribute_text("primvars:normals:indices")))
        });

    let normals = authored_normals.map(|(text, normal_indices)| {
        let normals = parse_floats(text);
        let values: Vec<[f32; 3]> = if let Some(normal_indices) = normal_indices {
            let indices = reader.triangulated(parse_indices(normal_indices), false);
            reader.deindex::<3>(&normals, &indices, "normals")
        } else if normals.len() == points.len() {
            reader.by_position::<3>(&normals, position_indices, "normals")
        } else {
            reader.face_varying::<3>(&normals, "normals")
        };
        values.into_iter().map(Vec3::from_array).collect::<Vec<_>>()
    });

    let mut mesh = MeshBuffers::new(positions, normals, uvs);

    if node.attribute_text("orientation").map(parse_token) == Some("leftHanded") {
        log::debug!("Mesh {} uses left-handed winding", name);
        mesh.flip_winding();
    }

    log::debug!(
        "Mesh {}: {} triangles, normals: {}, uvs: {}",
        name,
        mesh.triangle_count(),
        mesh.normals.is_some(),
        mesh.uvs.is_some()
    );

    Some(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usd::types::PropertyValue;

    fn mesh_node(attributes: &[(&str, &str)]) -> PropertyNode {
        let mut node = PropertyNode::new();
        for (key, value) in attributes {
            node.insert(key, PropertyValue::Array(value.to_string()));
        }
        node
    }

    fn build(node: &PropertyNode) -> (Option<MeshBuffers>, Vec<Diagnostic>) {
        let mut diagnostics = Diagnostics::default();
        let mesh = build_mesh("Test", node, &mut diagnostics);
        (mesh, diagnostics.entries().to_vec())
    }

    const QUAD_POINTS: &str = "[(0, 0, 0), (1, 0, 0), (1, 1, 0), (0, 1, 0)]";

    #[test]
    fn test_quad_fan_split() {
        let node = mesh_node(&[
            ("point3f[] points", QUAD_POINTS),
            ("int[] faceVertexCounts", "[4]"),
            ("int[] faceVertexIndices", "[0, 1, 2, 3]"),
        ]);
        let (mesh, diagnostics) = build(&node);
        let mesh = mesh.unwrap();

        assert!(diagnostics.is_empty());
        assert_eq!(mesh.vertex_count(), 6);
        let expected = [0, 1, 2, 0, 2, 3].map(|i| {
            let p = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]][i];
            Vec3::from_array(p)
        });
        assert_eq!(mesh.positions, expected.to_vec());
    }

    #[test]
    fn test_two_triangles() {
        let node = mesh_node(&[
            ("point3f[] points", QUAD_POINTS),
            ("int[] faceVertexCounts", "[3, 3]"),
            ("int[] faceVertexIndices", "[0, 1, 2, 0, 2, 3]"),
        ]);
        let (mesh, _) = build(&node);
        let mesh = mesh.unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.positions[5], Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_triangulate_running_offset() {
        let (triangles, skipped) = triangulate(&[0, 1, 2, 3, 4, 5, 6, 7], &[5, 3]);
        assert_eq!(triangles, vec![5, 6, 7]);
        assert_eq!(skipped.get(&5), Some(&1));
    }

    #[test]
    fn test_huge_face_counts_do_not_overflow() {
        let (triangles, skipped) = triangulate(&[0, 1, 2], &[i64::MAX, i64::MAX, 3]);
        assert_eq!(triangles, vec![-1, -1, -1]);
        assert_eq!(skipped.get(&i64::MAX), Some(&2));

        let node = mesh_node(&[
            ("point3f[] points", "[(0, 0, 0), (1, 0, 0), (0, 1, 0)]"),
            ("int[] faceVertexCounts", "[9223372036854775807, 9223372036854775807, 3]"),
            ("int[] faceVertexIndices", "[0, 1, 2]"),
        ]);
        let (mesh, diagnostics) = build(&node);
        let mesh = mesh.unwrap();

        assert_eq!(mesh.positions, vec![Vec3::ZERO; 3]);
        assert!(diagnostics.contains(&Diagnostic::DegenerateFace {
            mesh: "Test".into(),
            vertex_count: i64::MAX,
            faces: 2,
        }));
        assert!(diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::IndexOutOfRange { index: -1, occurrences: 3, .. })));
    }

    #[test]
    fn test_pentagon_dropped_with_diagnostic() {
        let node = mesh_node(&[
            ("point3f[] points", "[(0,0,0), (1,0,0), (1,1,0), (0.5,2,0), (0,1,0)]"),
            ("int[] faceVertexCounts", "[5]"),
            ("int[] faceVertexIndices", "[0, 1, 2, 3, 4]"),
        ]);
        let (mesh, diagnostics) = build(&node);
        assert_eq!(mesh.unwrap().vertex_count(), 0);
        assert_eq!(
            diagnostics,
            vec![Diagnostic::DegenerateFace {
                mesh: "Test".into(),
                vertex_count: 5,
                faces: 1,
            }]
        );
    }

    #[test]
    fn test_out_of_range_index_zeroed() {
        let node = mesh_node(&[
            ("point3f[] points", "[(1, 1, 1), (2, 2, 2), (3, 3, 3)]"),
            ("int[] faceVertexCounts", "[3]"),
            ("int[] faceVertexIndices", "[0, 1, 9]"),
        ]);
        let (mesh, diagnostics) = build(&node);
        let mesh = mesh.unwrap();

        assert_eq!(mesh.positions[2], Vec3::ZERO);
        assert!(matches!(
            diagnostics.as_slice(),
            [Diagnostic::IndexOutOfRange { index: 9, occurrences: 1, .. }]
        ));
    }

    #[test]
    fn test_no_points_is_none() {
        let node = mesh_node(&[("int[] faceVertexCounts", "[3]")]);
        let (mesh, _) = build(&node);
        assert!(mesh.is_none());
    }

    #[test]
    fn test_no_counts_uses_indices_as_given() {
        let node = mesh_node(&[
            ("point3f[] points", QUAD_POINTS),
            ("int[] faceVertexIndices", "[3, 2, 1]"),
        ]);
        let (mesh, _) = build(&node);
        assert_eq!(mesh.unwrap().positions[0], Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_indexed_uvs() {
        let node = mesh_node(&[
            ("point3f[] points", QUAD_POINTS),
            ("int[] faceVertexCounts", "[4]"),
            ("int[] faceVertexIndices", "[0, 1, 2, 3]"),
            ("texCoord2f[] primvars:st", "[(0, 0), (1, 1)]"),
            ("int[] primvars:st:indices", "[0, 0, 1, 1]"),
        ]);
        let (mesh, diagnostics) = build(&node);
        let uvs = mesh.unwrap().uvs.unwrap();

        assert!(diagnostics.is_empty());
        assert_eq!(uvs.len(), 6);
        // corners (0,1,2) then (0,2,3)
        assert_eq!(uvs[2], Vec2::ONE);
        assert_eq!(uvs[3], Vec2::ZERO);
        assert_eq!(uvs[5], Vec2::ONE);
    }

    #[test]
    fn test_vertex_uvs_follow_positions() {
        let node = mesh_node(&[
            ("point3f[] points", QUAD_POINTS),
            ("int[] faceVertexCounts", "[4]"),
            ("int[] faceVertexIndices", "[0, 1, 2, 3]"),
            ("float2[] primvars:st", "[(0, 0), (1, 0), (1, 1), (0, 1)]"),
        ]);
        let (mesh, _) = build(&node);
        let uvs = mesh.unwrap().uvs.unwrap();
        assert_eq!(uvs[4], Vec2::new(1.0, 1.0));
        assert_eq!(uvs[5], Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_face_varying_normals() {
        // 4 points, but 6 normals: one per corner of two triangles
        let node = mesh_node(&[
            ("point3f[] points", QUAD_POINTS),
            ("int[] faceVertexCounts", "[3, 3]"),
            ("int[] faceVertexIndices", "[0, 1, 2, 0, 2, 3]"),
            (
                "normal3f[] normals",
                "[(0,0,1), (0,0,1), (0,0,1), (1,0,0), (1,0,0), (1,0,0)]",
            ),
        ]);
        let (mesh, _) = build(&node);
        let normals = mesh.unwrap().normals.unwrap();
        assert_eq!(normals.len(), 6);
        assert_eq!(normals[2], Vec3::Z);
        assert_eq!(normals[3], Vec3::X);
    }

    #[test]
    fn test_left_handed_flips_winding() {
        let node = mesh_node(&[
            ("point3f[] points", QUAD_POINTS),
            ("int[] faceVertexCounts", "[3]"),
            ("int[] faceVertexIndices", "[0, 1, 2]"),
            ("uniform token orientation", "\"leftHanded\""),
        ]);
        let (mesh, _) = build(&node);
        let mesh = mesh.unwrap();
        assert_eq!(mesh.positions[1], Vec3::new(1.0, 1.0, 0.0));
        assert!((mesh.compute_flat_normals()[0] + Vec3::Z).length() < 1e-6);
    }
}
