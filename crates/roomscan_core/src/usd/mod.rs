//! USD support for room scans.
//!
//! This module reads USDZ archives and USDA text as produced by mobile
//! room-capture apps, and converts them to the scene graph.
//!
//! ## Supported USD Features
//!
//! - USDZ (zip) containers with text layers and PNG/JPEG textures
//! - `Xform`, `Scope` and `Mesh` prims, `references` across layers
//! - `UsdPreviewSurface` diffuse colour/texture, emissive colour, opacity
//! - `xformOp:transform`, translate/rotate/orient/scale/pivot ops
//!
//! ## Not Supported
//!
//! - Binary `.usdc` (crate) layers; detected and rejected
//! - Animation / time samples, skinning, volumes
//! - Variants, payloads and other composition arcs

pub mod archive;
pub mod geometry;
pub mod parser;
pub mod references;
pub mod shading;
pub mod types;
pub mod values;
pub mod xform;
mod loader;

pub use archive::{Asset, AssetTable, TextureAsset, TextureHandle, TextureHook};
pub use loader::*;
pub use parser::{parse_usda, UsdaParser};
pub use types::{Key, PropertyNode, PropertyValue};
