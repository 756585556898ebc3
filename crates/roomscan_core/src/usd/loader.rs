//! High-level room-scan decoding.
//!
//! This module provides the entry points that turn USDZ archive bytes (or
//! raw USDA text) into a [`SceneNode`] tree:
//!
//! - `Scope` prims are transparent; their children join the current parent
//! - `Xform` prims become group nodes with their own transform
//! - `Mesh` prims become mesh nodes with geometry and material
//! - `references` are spliced in from sibling layers of the archive
//!
//! Semantic tags flow from parent to child as nodes are created. Doors,
//! windows and see-through materials are rendered with a glass material.
//!
//! # Example
//!
//! ```ignore
//! use roomscan_core::{decode, VisibilityFilter};
//!
//! let scene = decode(&std::fs::read("Room.usdz")?)?;
//! for item in scene.root.draw_list(VisibilityFilter::StructureOnly) {
//!     println!("{} {:?}", item.node.name, item.world);
//! }
//! ```

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::config::DecodeOptions;
use crate::diagnostics::{DecodeReport, Diagnostic, DiagnosticHook, Diagnostics};
use crate::material::MaterialDescriptor;
use crate::scene::{MeshPart, SceneNode, Transform};
use crate::semantics::{classify, PrimRole, SemanticTags};

use super::archive::{self, ArchiveError, ArchiveLoader, AssetTable, EntryPoint, TextureHandle, TextureHook};
use super::geometry::build_mesh;
use super::parser::parse_usda;
use super::references::{parent_dir, references_of, resolve_path};
use super::shading::MaterialResolver;
use super::types::{PrimRef, PropertyNode};
use super::values::{parse_float, parse_token};
use super::xform::compose_transform;

/// Errors that end a decode.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Binary USD (crate) layers are not supported{}", .path.as_deref().map(|p| format!(": {p}")).unwrap_or_default())]
    UnsupportedFormat { path: Option<String> },

    #[error("Scene contains no meshes ({nodes} node(s) decoded)")]
    EmptyScene { nodes: usize },

    #[error("Archive contains no USD layer")]
    MissingEntryPoint,

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Layer-level metadata of the entry layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StageInfo {
    pub default_prim: Option<String>,
    pub up_axis: Option<String>,
    pub meters_per_unit: Option<f32>,
}

impl StageInfo {
    fn from_layer(root: &PropertyNode) -> Self {
        let Some(meta) = root.layer_metadata() else {
            return Self::default();
        };
        let token = |name: &str| meta.metadata_value(name).map(|v| parse_token(v).to_string());
        Self {
            default_prim: token("defaultPrim"),
            up_axis: token("upAxis"),
            meters_per_unit: meta.metadata_value("metersPerUnit").and_then(parse_float),
        }
    }
}

/// Output of a successful decode.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedScene {
    /// Unnamed root group
    pub root: SceneNode,

    /// Archive contents (empty for raw USDA input)
    pub assets: AssetTable,

    /// Archive path of the entry layer (`None` for raw USDA input)
    pub entry: Option<String>,

    pub stage: StageInfo,

    pub report: DecodeReport,
}

/// Room-scan decoder with host hooks.
///
/// Hooks are per decoder; nothing is registered globally.
#[derive(Clone, Default)]
pub struct UsdzDecoder {
    options: DecodeOptions,
    texture_hook: Option<TextureHook>,
    diagnostic_hook: Option<DiagnosticHook>,
}

impl UsdzDecoder {
    pub fn new(options: DecodeOptions) -> Self {
        Self {
            options,
            texture_hook: None,
            diagnostic_hook: None,
        }
    }

    /// Register texture bytes with the host and use the returned handle.
    pub fn with_texture_hook(
        mut self,
        hook: impl Fn(&str, &[u8]) -> TextureHandle + Send + Sync + 'static,
    ) -> Self {
        self.texture_hook = Some(std::sync::Arc::new(hook));
        self
    }

    /// Decide which diagnostics are logged. All are still reported.
    pub fn with_diagnostic_hook(
        mut self,
        hook: impl Fn(&Diagnostic) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.diagnostic_hook = Some(std::sync::Arc::new(hook));
        self
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Decode USDZ archive bytes or raw USDA text.
    pub fn decode(&self, bytes: &[u8]) -> DecodeResult<DecodedScene> {
        let mut diagnostics = Diagnostics::new(self.diagnostic_hook.clone());

        if archive::is_crate(bytes) {
            return Err(DecodeError::UnsupportedFormat { path: None });
        }

        let (assets, entry, text_layer) = if archive::is_zip(bytes) {
            let loaded = ArchiveLoader::new(self.texture_hook.as_ref()).load(bytes, &mut diagnostics)?;
            match loaded.entry {
                Some(EntryPoint::Layer(path)) => (loaded.assets, Some(path), None),
                Some(EntryPoint::Crate(path)) => {
                    return Err(DecodeError::UnsupportedFormat { path: Some(path) })
                }
                None => return Err(DecodeError::MissingEntryPoint),
            }
        } else {
            let text = String::from_utf8_lossy(bytes);
            let layer = parse_usda(&text, &mut diagnostics);
            (AssetTable::new(), None, Some(layer))
        };

        let entry_root = match (&text_layer, &entry) {
            (Some(layer), _) => layer,
            (None, Some(path)) => assets.layer(path).ok_or(DecodeError::MissingEntryPoint)?,
            (None, None) => return Err(DecodeError::MissingEntryPoint),
        };

        let stage = StageInfo::from_layer(entry_root);
        let mut builder = HierarchyBuilder::new(&assets, entry_root, &self.options, diagnostics);
        let root = builder.build(entry.as_deref());
        let report = builder.diagnostics.into_report();

        let meshes = root.mesh_count();
        if meshes == 0 {
            log::info!("Decoded scene has no meshes");
            return Err(DecodeError::EmptyScene {
                nodes: root.node_count(),
            });
        }

        log::info!(
            "Decoded room scan: {} nodes, {} meshes, {} triangles, {} diagnostic(s)",
            root.node_count(),
            meshes,
            root.triangle_count(),
            report.len()
        );

        Ok(DecodedScene {
            root,
            assets,
            entry,
            stage,
            report,
        })
    }

    /// Read and decode a file from disk.
    pub fn decode_file<P: AsRef<Path>>(&self, path: P) -> DecodeResult<DecodedScene> {
        let path = path.as_ref();
        log::debug!("Decoding {}", path.display());
        let bytes = std::fs::read(path)?;
        self.decode(&bytes)
    }
}

/// Decode with default options and no hooks.
pub fn decode(bytes: &[u8]) -> DecodeResult<DecodedScene> {
    UsdzDecoder::default().decode(bytes)
}

/// Decode with the given options and no hooks.
pub fn decode_with(bytes: &[u8], options: &DecodeOptions) -> DecodeResult<DecodedScene> {
    UsdzDecoder::new(options.clone()).decode(bytes)
}

/// Read and decode a file with default options.
pub fn decode_file<P: AsRef<Path>>(path: P) -> DecodeResult<DecodedScene> {
    UsdzDecoder::default().decode_file(path)
}

/// A layer being built, with the archive directory its paths resolve against.
struct Document<'a> {
    root: &'a PropertyNode,
    base_dir: String,
}

/// Internal builder for constructing the scene graph from property trees.
struct HierarchyBuilder<'a> {
    assets: &'a AssetTable,
    entry: &'a PropertyNode,
    options: &'a DecodeOptions,
    diagnostics: Diagnostics,
    /// Layers currently being expanded, entry layer first
    reference_chain: Vec<String>,
}

impl<'a> HierarchyBuilder<'a> {
    fn new(
        assets: &'a AssetTable,
        entry: &'a PropertyNode,
        options: &'a DecodeOptions,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            assets,
            entry,
            options,
            diagnostics,
            reference_chain: Vec::new(),
        }
    }

    fn build(&mut self, entry_path: Option<&str>) -> SceneNode {
        let document = Document {
            root: self.entry,
            base_dir: entry_path.map(parent_dir).unwrap_or("").to_string(),
        };
        // Raw USDA text has no archive path but still counts as a layer
        self.reference_chain.push(entry_path.unwrap_or("").to_string());

        let mut root = SceneNode::group("", Transform::IDENTITY, SemanticTags::default());
        self.process_scope(&document, self.entry, &mut root, 0);
        root
    }

    /// Process the prims of a scope into `parent`.
    fn process_scope(&mut self, document: &Document<'a>, data: &'a PropertyNode, parent: &mut SceneNode, depth: usize) {
        self.process_references(document, data, parent, depth);

        for prim in data.prims() {
            if depth + 1 > self.options.max_depth {
                self.diagnostics.push(Diagnostic::DepthLimit {
                    prim: prim.name.to_string(),
                    limit: self.options.max_depth,
                });
                continue;
            }

            match prim.prim_type {
                "Scope" => self.process_scope(document, prim.node, parent, depth + 1),
                "Xform" => {
                    let node = self.process_xform(document, prim, &parent.name, parent.tags, depth + 1);
                    parent.children.push(node);
                }
                "Mesh" => {
                    let node = self.process_mesh(document, prim, &parent.name, parent.tags, depth + 1);
                    parent.children.push(node);
                }
                other => log::debug!("Skipping {} prim {}", other, prim.name),
            }
        }
    }

    /// Process an Xform prim into a group node.
    fn process_xform(
        &mut self,
        document: &Document<'a>,
        prim: PrimRef<'a>,
        parent_name: &str,
        parent_tags: SemanticTags,
        depth: usize,
    ) -> SceneNode {
        let tags = parent_tags.union(classify(PrimRole::Xform, prim.name, parent_name));
        let mut node = SceneNode::group(prim.name, compose_transform(prim.node), tags);
        self.process_scope(document, prim.node, &mut node, depth);
        node
    }

    /// Process a Mesh prim into a mesh node. References on the mesh become
    /// its children.
    fn process_mesh(
        &mut self,
        document: &Document<'a>,
        prim: PrimRef<'a>,
        parent_name: &str,
        parent_tags: SemanticTags,
        depth: usize,
    ) -> SceneNode {
        let mut tags = parent_tags.union(classify(PrimRole::Mesh, prim.name, parent_name));
        let mut transform = compose_transform(prim.node);

        let buffers = build_mesh(prim.name, prim.node, &mut self.diagnostics);
        let resolver = MaterialResolver {
            document: document.root,
            entry: self.entry,
            base_dir: &document.base_dir,
            assets: self.assets,
            options: self.options,
        };
        let mut material = resolver.resolve(prim.node, &mut self.diagnostics);

        if material.is_opening || tags.is_opening() {
            log::debug!("Mesh {} rendered as opening", prim.name);
            material = MaterialDescriptor::glass();
            tags.is_structure = true;
            if let Some(depth_scale) = self.options.opening_depth_scale {
                transform = transform.with_z_scale(depth_scale);
            }
        }

        let mut node = SceneNode::group(prim.name, transform, tags);
        node.mesh = buffers.map(|buffers| MeshPart { buffers, material });
        self.process_references(document, prim.node, &mut node, depth);
        node
    }

    /// Splice referenced layers into `parent`.
    fn process_references(&mut self, document: &Document<'a>, data: &'a PropertyNode, parent: &mut SceneNode, depth: usize) {
        for raw in references_of(data) {
            let path = resolve_path(&document.base_dir, &raw);

            let Some(root) = self.assets.layer(&path) else {
                let diagnostic = if self.assets.is_crate(&path) {
                    Diagnostic::UnsupportedReference { path }
                } else {
                    Diagnostic::UnresolvedReference { path }
                };
                self.diagnostics.push(diagnostic);
                continue;
            };

            if self.reference_chain.contains(&path) {
                self.diagnostics.push(Diagnostic::ReferenceCycle { path });
                continue;
            }
            if self.reference_chain.len() >= self.options.max_reference_depth {
                self.diagnostics.push(Diagnostic::DepthLimit {
                    prim: path,
                    limit: self.options.max_reference_depth,
                });
                continue;
            }

            log::debug!("Expanding reference {} into {:?}", path, parent.name);
            let referenced = Document {
                root,
                base_dir: parent_dir(&path).to_string(),
            };
            self.reference_chain.push(path);
            self.process_scope(&referenced, root, parent, depth);
            self.reference_chain.pop();
        }
    }
}
