//! Semantic role of scanned prims, guessed from their names.
//!
//! Room-scan exporters name prims after what they captured (`Wall_0`,
//! `Door_1`, `Window0`). This is the only place that knows the heuristic.

use serde::Serialize;

/// Name fragments that mark a mesh as part of the room's structure.
pub const STRUCTURE_KEYWORDS: [&str; 6] = ["wall", "floor", "ceiling", "door", "window", "opening"];

/// Semantic flags carried by scene nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SemanticTags {
    pub is_door: bool,
    pub is_window: bool,
    pub is_structure: bool,
}

impl SemanticTags {
    pub fn union(self, other: SemanticTags) -> SemanticTags {
        SemanticTags {
            is_door: self.is_door || other.is_door,
            is_window: self.is_window || other.is_window,
            is_structure: self.is_structure || other.is_structure,
        }
    }

    /// Doors and windows are rendered as see-through openings.
    pub fn is_opening(&self) -> bool {
        self.is_door || self.is_window
    }
}

/// Prim kinds the classifier distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimRole {
    Xform,
    Mesh,
}

/// Tags a prim contributes on its own, before inheritance.
///
/// Xforms mark doors and windows by their own name. Meshes mark structure
/// by their own name or their parent's.
pub fn classify(role: PrimRole, name: &str, parent_name: &str) -> SemanticTags {
    let name = name.to_lowercase();
    match role {
        PrimRole::Xform => SemanticTags {
            is_door: name.contains("door"),
            is_window: name.contains("window"),
            is_structure: false,
        },
        PrimRole::Mesh => {
            let parent = parent_name.to_lowercase();
            SemanticTags {
                is_structure: STRUCTURE_KEYWORDS
                    .iter()
                    .any(|keyword| name.contains(keyword) || parent.contains(keyword)),
                ..SemanticTags::default()
            }
        }
    }
}
