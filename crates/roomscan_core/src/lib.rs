//! Roomscan Core - decoder for AR room-scan USDZ captures.
//!
//! This crate provides:
//!
//! - **USD support**: USDZ archive reading, USDA parsing, reference
//!   resolution, geometry, materials and transforms
//! - **Scene graph types**: `SceneNode`, `MeshBuffers`, `MaterialDescriptor`
//! - **Semantics**: wall/floor/door/window tagging of scanned prims
//!
//! # Example
//!
//! ```ignore
//! use roomscan_core::{decode, VisibilityFilter};
//!
//! let scene = decode(&std::fs::read("Room.usdz")?)?;
//! println!("{} meshes, {} triangles",
//!     scene.root.mesh_count(),
//!     scene.root.triangle_count());
//! let walls = scene.root.draw_list(VisibilityFilter::StructureOnly);
//! ```

pub mod config;
pub mod diagnostics;
pub mod material;
pub mod mesh;
pub mod scene;
pub mod semantics;
pub mod usd;

// Re-export commonly used types
pub use config::DecodeOptions;
pub use diagnostics::{DecodeReport, Diagnostic};
pub use material::{MaterialDescriptor, TextureRef};
pub use mesh::MeshBuffers;
pub use scene::{SceneNode, SceneSummary, Transform, VisibilityFilter};
pub use semantics::SemanticTags;
pub use usd::{decode, decode_file, decode_with, DecodeError, DecodedScene, UsdzDecoder};
