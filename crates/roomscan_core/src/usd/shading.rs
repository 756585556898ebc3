//! Material binding and UsdPreviewSurface → [`MaterialDescriptor`].
//!
//! Only the inputs a room scan actually authors are read: diffuse colour or
//! texture (with wrap modes and a 2D transform), emissive colour and
//! opacity. Anything else keeps its default.

use roomscan_math::{Vec2, Vec3};

use crate::config::DecodeOptions;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::material::{ColorSpace, MaterialDescriptor, TextureRef, UvTransform, WrapMode, DEFAULT_GREY};

use super::archive::AssetTable;
use super::references::resolve_path;
use super::types::{Key, PropertyNode, VisitBudget};
use super::values::{
    connection_source, parse_asset_path, parse_float, parse_prim_path, parse_token, parse_vec2,
    parse_vec3, prim_name,
};

/// Name of the transform shader exporters place next to a diffuse texture.
const DIFFUSE_TRANSFORM_SHADER: &str = "Transform2d_diffuse";

/// Resolves materials for meshes of one document.
pub struct MaterialResolver<'a> {
    /// Layer the mesh was defined in
    pub document: &'a PropertyNode,

    /// Entry layer of the decode (fallback for name searches)
    pub entry: &'a PropertyNode,

    /// Archive directory of `document`
    pub base_dir: &'a str,

    pub assets: &'a AssetTable,
    pub options: &'a DecodeOptions,
}

impl<'a> MaterialResolver<'a> {
    /// Material for a mesh prim. Engine defaults when nothing is bound.
    pub fn resolve(&self, mesh: &'a PropertyNode, diagnostics: &mut Diagnostics) -> MaterialDescriptor {
        let mut material = MaterialDescriptor::default();

        let Some((name, bound)) = self.bound_material(mesh, diagnostics) else {
            return material;
        };
        material.name = name.to_string();

        let Some(surface) = self.surface_shader(bound, diagnostics) else {
            log::debug!("Material {} has no surface shader", name);
            return material;
        };

        if let Some(opacity) = surface.attribute_text("inputs:opacity").and_then(parse_float) {
            material.opacity = opacity;
            material.transparent = opacity < 1.0;
            material.is_opening = opacity < self.options.opening_opacity_threshold;
        }

        if let Some(connection) = surface.attribute_text("inputs:diffuseColor.connect") {
            let texture_shader = connection_source(connection)
                .and_then(|(path, _)| self.find_shader(bound, path, diagnostics));
            match texture_shader {
                Some(shader) => material.diffuse_texture = self.texture_ref(bound, shader, diagnostics),
                None => log::debug!("Material {}: diffuse connection {} unresolved", name, connection),
            }
        } else if let Some(color) = surface.attribute_text("inputs:diffuseColor").and_then(parse_vec3) {
            material.base_color = color;
        }

        if material.base_color == Vec3::ZERO {
            material.base_color = DEFAULT_GREY;
            material.double_sided = true;
        }

        if surface.attribute("inputs:emissiveColor.connect").is_some() {
            log::debug!("Material {}: emissive texture ignored", name);
        } else if let Some(color) = surface.attribute_text("inputs:emissiveColor").and_then(parse_vec3) {
            material.emissive = color;
        }

        material
    }

    /// The bound material prim and its name.
    fn bound_material(&self, mesh: &'a PropertyNode, diagnostics: &mut Diagnostics) -> Option<(&'a str, &'a PropertyNode)> {
        let Some(path) = mesh.relationship("material:binding").and_then(parse_prim_path) else {
            return self
                .search(mesh, "Material", diagnostics, |key| key.is_prim_of("Material"))
                .and_then(|(key, node)| Some((key.prim_name()?, node)));
        };

        let name = prim_name(path);
        let is_named_material = |key: &Key| key.is_prim_of("Material") && key.prim_name() == Some(name);

        let found = self
            .document
            .prim_at_path(path)
            .or_else(|| self.search(self.document, name, diagnostics, is_named_material).map(|(_, n)| n))
            .or_else(|| self.search(self.entry, name, diagnostics, is_named_material).map(|(_, n)| n));

        if found.is_none() {
            log::debug!("Material binding {} not found", path);
        }
        found.map(|node| (name, node))
    }

    fn surface_shader(&self, material: &'a PropertyNode, diagnostics: &mut Diagnostics) -> Option<&'a PropertyNode> {
        let connection = material.attribute_text("outputs:surface.connect")?;
        let (path, _) = connection_source(connection)?;
        self.find_shader(material, path, diagnostics)
    }

    /// Shader addressed by a connection path: a child of the material, the
    /// prim at that path, or a shader of that name anywhere reachable.
    fn find_shader(&self, material: &'a PropertyNode, path: &str, diagnostics: &mut Diagnostics) -> Option<&'a PropertyNode> {
        let name = prim_name(path);
        let is_named_shader = |key: &Key| key.is_prim_of("Shader") && key.prim_name() == Some(name);

        material
            .child_prim(Some("Shader"), name)
            .or_else(|| self.document.prim_at_path(path))
            .or_else(|| self.search(material, name, diagnostics, is_named_shader).map(|(_, n)| n))
            .or_else(|| self.search(self.document, name, diagnostics, is_named_shader).map(|(_, n)| n))
            .or_else(|| self.search(self.entry, name, diagnostics, is_named_shader).map(|(_, n)| n))
    }

    fn texture_ref(&self, material: &'a PropertyNode, shader: &'a PropertyNode, diagnostics: &mut Diagnostics) -> Option<TextureRef> {
        let raw = parse_asset_path(shader.attribute_text("inputs:file")?);
        let resolved = resolve_path(self.base_dir, raw);
        let root_relative = resolve_path("", raw);

        let handle = self
            .assets
            .texture(&resolved)
            .or_else(|| self.assets.texture(&root_relative))
            .map(|texture| texture.handle.clone());
        if handle.is_none() {
            diagnostics.push(Diagnostic::MissingTexture {
                path: resolved.clone(),
            });
        }

        let wrap = |name: &str| {
            shader
                .attribute_text(name)
                .map(parse_token)
                .and_then(WrapMode::from_token)
                .unwrap_or_default()
        };

        let color_space = shader
            .attribute_metadata("inputs:file")
            .and_then(|meta| meta.metadata_value("colorSpace"))
            .or_else(|| shader.attribute_text("inputs:sourceColorSpace"))
            .map(parse_token)
            .and_then(ColorSpace::from_token)
            .unwrap_or_default();

        Some(TextureRef {
            asset_path: resolved,
            handle,
            wrap_s: wrap("inputs:wrapS"),
            wrap_t: wrap("inputs:wrapT"),
            transform: self.uv_transform(material, shader, diagnostics),
            color_space,
        })
    }

    fn uv_transform(&self, material: &'a PropertyNode, shader: &'a PropertyNode, diagnostics: &mut Diagnostics) -> UvTransform {
        let is_transform_shader = |node: &PropertyNode| {
            ["inputs:rotation", "inputs:scale", "inputs:translation"]
                .iter()
                .any(|input| node.attribute(input).is_some())
        };

        let connected = shader
            .attribute_text("inputs:st.connect")
            .and_then(connection_source)
            .and_then(|(path, _)| self.find_shader(material, path, diagnostics))
            .filter(|node| is_transform_shader(node));

        let Some(node) = connected.or_else(|| material.child_prim(Some("Shader"), DIFFUSE_TRANSFORM_SHADER)) else {
            return UvTransform::default();
        };

        UvTransform {
            rotation: node.attribute_text("inputs:rotation").and_then(parse_float).unwrap_or(0.0),
            scale: node.attribute_text("inputs:scale").and_then(parse_vec2).unwrap_or(Vec2::ONE),
            offset: node
                .attribute_text("inputs:translation")
                .and_then(parse_vec2)
                .unwrap_or(Vec2::ZERO),
        }
    }

    /// Budgeted subtree search; reports when the budget runs out first.
    fn search(
        &self,
        scope: &'a PropertyNode,
        target: &str,
        diagnostics: &mut Diagnostics,
        matches: impl FnMut(&Key) -> bool,
    ) -> Option<(&'a Key, &'a PropertyNode)> {
        let mut budget = VisitBudget::new(self.options.visit_budget);
        let found = scope.find_prim(&mut budget, matches);
        if found.is_none() && budget.is_exhausted() {
            diagnostics.push(Diagnostic::BudgetExhausted {
                target: target.to_string(),
            });
        }
        found
    }
}
