//! Decoder tuning knobs.

use serde::{Deserialize, Serialize};

/// Options controlling a decode.
///
/// Deserializable from JSON; missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Shader opacity below this marks the material as an opening
    pub opening_opacity_threshold: f32,

    /// Local Z scale applied to glass meshes so they sit proud of
    /// coplanar walls. `None` leaves the authored scale alone.
    pub opening_depth_scale: Option<f32>,

    /// Maximum prim nesting depth built into the scene graph
    pub max_depth: usize,

    /// Maximum number of layers in a chain of references, entry layer included
    pub max_reference_depth: usize,

    /// Maximum entries visited by a single material or shader search
    pub visit_budget: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            opening_opacity_threshold: 0.05,
            opening_depth_scale: Some(1.05),
            max_depth: 256,
            max_reference_depth: 16,
            visit_budget: 100_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: DecodeOptions =
            serde_json::from_str(r#"{ "opening_depth_scale": null, "max_depth": 8 }"#).unwrap();
        assert_eq!(options.opening_depth_scale, None);
        assert_eq!(options.max_depth, 8);
        assert_eq!(options.opening_opacity_threshold, 0.05);
        assert_eq!(options.visit_budget, DecodeOptions::default().visit_budget);
    }
}
