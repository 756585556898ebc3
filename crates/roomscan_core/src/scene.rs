//! Decoded scene graph.
//!
//! The decoder produces an owned tree of [`SceneNode`]s. Each node carries a
//! local transform, semantic tags fixed at construction, and optionally a
//! mesh with its material. Consumers walk the tree or ask for a flat draw
//! list with world matrices.

use roomscan_math::{Aabb, Mat4, Mat4Ext, Quat, Vec3};
use serde::Serialize;

use crate::material::MaterialDescriptor;
use crate::mesh::MeshBuffers;
use crate::semantics::SemanticTags;

/// Local transform, kept as a full matrix (authored matrices may shear).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    matrix: Mat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        matrix: Mat4::IDENTITY,
    };

    pub fn from_matrix(matrix: Mat4) -> Self {
        Self { matrix }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self::from_matrix(Mat4::from_translation(translation))
    }

    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    pub fn translation(&self) -> Vec3 {
        self.matrix.w_axis.truncate()
    }

    /// Decompose into (scale, rotation, translation).
    pub fn to_scale_rotation_translation(&self) -> (Vec3, Quat, Vec3) {
        self.matrix.to_scale_rotation_translation()
    }

    pub fn scale(&self) -> Vec3 {
        self.to_scale_rotation_translation().0
    }

    pub fn rotation(&self) -> Quat {
        self.to_scale_rotation_translation().1
    }

    /// Same transform with the local Z scale replaced.
    ///
    /// The matrix is decomposed and rebuilt, so any shear is lost. Singular
    /// matrices cannot be decomposed and are returned unchanged.
    pub fn with_z_scale(&self, z: f32) -> Self {
        if self.matrix.determinant() == 0.0 {
            return *self;
        }
        let (mut scale, rotation, translation) = self.to_scale_rotation_translation();
        scale.z = z;
        Self::from_matrix(Mat4::from_scale_rotation_translation(scale, rotation, translation))
    }

    pub fn is_identity(&self) -> bool {
        self.matrix == Mat4::IDENTITY
    }
}

/// Geometry and material of a mesh node.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshPart {
    pub buffers: MeshBuffers,
    pub material: MaterialDescriptor,
}

/// A node in the decoded scene graph.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneNode {
    /// Prim name (empty for the root)
    pub name: String,

    pub transform: Transform,

    /// Present on mesh nodes with geometry
    pub mesh: Option<MeshPart>,

    pub tags: SemanticTags,

    pub children: Vec<SceneNode>,
}

/// Which mesh nodes a draw list includes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VisibilityFilter {
    #[default]
    All,

    /// Only walls, floors, ceilings, doors, windows and openings
    StructureOnly,
}

/// A mesh node paired with its world matrix.
#[derive(Clone, Copy, Debug)]
pub struct DrawItem<'a> {
    pub node: &'a SceneNode,
    pub part: &'a MeshPart,
    pub world: Mat4,
}

/// Aggregate counts for logging, CLI output and comparisons.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SceneSummary {
    pub nodes: usize,
    pub meshes: usize,
    pub triangles: usize,
    pub structure_meshes: usize,
    pub glass_meshes: usize,
    pub textured_meshes: usize,
    pub doors: usize,
    pub windows: usize,
    /// World-space bounds as (min, max), absent when there is no geometry
    pub bounds: Option<([f32; 3], [f32; 3])>,
}

impl SceneNode {
    pub fn group(name: impl Into<String>, transform: Transform, tags: SemanticTags) -> Self {
        Self {
            name: name.into(),
            transform,
            mesh: None,
            tags,
            children: Vec::new(),
        }
    }

    pub fn is_mesh(&self) -> bool {
        self.mesh.is_some()
    }

    /// Pre-order traversal of this node and all descendants.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    pub fn node_count(&self) -> usize {
        self.walk().count()
    }

    pub fn mesh_count(&self) -> usize {
        self.walk().filter(|node| node.is_mesh()).count()
    }

    pub fn triangle_count(&self) -> usize {
        self.walk()
            .filter_map(|node| node.mesh.as_ref())
            .map(|part| part.buffers.triangle_count())
            .sum()
    }

    /// First node with the given name, in pre-order.
    pub fn find(&self, name: &str) -> Option<&SceneNode> {
        self.walk().find(|node| node.name == name)
    }

    /// Mesh nodes with their world matrices, in pre-order.
    pub fn draw_list(&self, filter: VisibilityFilter) -> Vec<DrawItem<'_>> {
        let mut items = Vec::new();
        let mut stack = vec![(self, self.transform.matrix())];

        while let Some((node, world)) = stack.pop() {
            if let Some(part) = node.mesh.as_ref() {
                let visible = match filter {
                    VisibilityFilter::All => true,
                    VisibilityFilter::StructureOnly => node.tags.is_structure,
                };
                if visible {
                    items.push(DrawItem { node, part, world });
                }
            }

            for child in node.children.iter().rev() {
                stack.push((child, world * child.transform.matrix()));
            }
        }

        items
    }

    /// World-space bounds of all mesh geometry.
    pub fn world_bounds(&self) -> Aabb {
        self.draw_list(VisibilityFilter::All)
            .iter()
            .map(|item| item.world.transform_aabb(&item.part.buffers.bounds))
            .fold(Aabb::EMPTY, |acc, b| Aabb::surrounding(&acc, &b))
    }

    pub fn summary(&self) -> SceneSummary {
        let mut summary = SceneSummary::default();
        for node in self.walk() {
            summary.nodes += 1;
            summary.doors += node.tags.is_door as usize;
            summary.windows += node.tags.is_window as usize;
            if let Some(part) = node.mesh.as_ref() {
                summary.meshes += 1;
                summary.triangles += part.buffers.triangle_count();
                summary.structure_meshes += node.tags.is_structure as usize;
                summary.glass_meshes += part.material.is_glass() as usize;
                summary.textured_meshes += part.material.diffuse_texture.is_some() as usize;
            }
        }

        let bounds = self.world_bounds();
        if !bounds.is_empty() {
            summary.bounds = Some((bounds.min().to_array(), bounds.max().to_array()));
        }
        summary
    }
}

/// Iterator returned by [`SceneNode::walk`].
pub struct Walk<'a> {
    stack: Vec<&'a SceneNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a SceneNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_part() -> MeshPart {
        MeshPart {
            buffers: MeshBuffers::new(
                vec![Vec3::ZERO, Vec3::X, Vec3::Y],
                None,
                None,
            ),
            material: MaterialDescriptor::default(),
        }
    }

    fn mesh_node(name: &str, structure: bool, transform: Transform) -> SceneNode {
        SceneNode {
            mesh: Some(triangle_part()),
            ..SceneNode::group(
                name,
                transform,
                SemanticTags {
                    is_structure: structure,
                    ..Default::default()
                },
            )
        }
    }

    fn sample_tree() -> SceneNode {
        let mut room = SceneNode::group(
            "Room",
            Transform::from_translation(Vec3::new(10.0, 0.0, 0.0)),
            SemanticTags::default(),
        );
        room.children.push(mesh_node("Wall0", true, Transform::IDENTITY));
        room.children.push(mesh_node(
            "Chair",
            false,
            Transform::from_translation(Vec3::new(0.0, 5.0, 0.0)),
        ));

        let mut root = SceneNode::group("", Transform::IDENTITY, SemanticTags::default());
        root.children.push(room);
        root
    }

    #[test]
    fn test_walk_preorder() {
        let root = sample_tree();
        let names: Vec<&str> = root.walk().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["", "Room", "Wall0", "Chair"]);
        assert_eq!(root.node_count(), 4);
        assert_eq!(root.mesh_count(), 2);
        assert_eq!(root.triangle_count(), 2);
    }

    #[test]
    fn test_draw_list_world_matrices() {
        let root = sample_tree();
        let items = root.draw_list(VisibilityFilter::All);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].node.name, "Wall0");
        assert_eq!(items[1].world.w_axis.truncate(), Vec3::new(10.0, 5.0, 0.0));
    }

    #[test]
    fn test_structure_only_filter() {
        let root = sample_tree();
        let items = root.draw_list(VisibilityFilter::StructureOnly);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].node.name, "Wall0");
    }

    #[test]
    fn test_world_bounds_and_summary() {
        let root = sample_tree();
        let bounds = root.world_bounds();
        assert_eq!(bounds.min(), Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(bounds.max(), Vec3::new(11.0, 6.0, 0.0));

        let summary = root.summary();
        assert_eq!(summary.meshes, 2);
        assert_eq!(summary.structure_meshes, 1);
        assert_eq!(summary.bounds, Some(([10.0, 0.0, 0.0], [11.0, 6.0, 0.0])));
    }

    #[test]
    fn test_with_z_scale() {
        let t = Transform::from_matrix(Mat4::from_scale_rotation_translation(
            Vec3::new(2.0, 3.0, 4.0),
            Quat::IDENTITY,
            Vec3::new(1.0, 2.0, 3.0),
        ));
        let scaled = t.with_z_scale(1.05);
        let (scale, _, translation) = scaled.to_scale_rotation_translation();
        assert!((scale - Vec3::new(2.0, 3.0, 1.05)).length() < 1e-5);
        assert!((translation - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
    }

    #[test]
    fn test_with_z_scale_keeps_singular_matrix() {
        let flat = Transform::from_matrix(Mat4::from_scale_rotation_translation(
            Vec3::new(1.0, 0.0, 1.0),
            Quat::IDENTITY,
            Vec3::new(0.0, 1.0, 0.0),
        ));
        let scaled = flat.with_z_scale(1.05);

        assert_eq!(scaled, flat);
        assert!(scaled.matrix().to_cols_array().iter().all(|v| v.is_finite()));
    }
}

