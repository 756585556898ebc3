//! Surface descriptions for decoded meshes.
//!
//! A [`MaterialDescriptor`] is renderer-neutral: it records what the scan
//! asked for (colour, texture, opacity) and leaves shading to the consumer.

use roomscan_math::{Vec2, Vec3};
use serde::Serialize;

use crate::usd::archive::TextureHandle;

/// Base colour substituted for pure black diffuse.
pub const DEFAULT_GREY: Vec3 = Vec3::splat(0.933_333_3); // #EEEEEE

/// Opacity of the glass material used for doors, windows and openings.
pub const GLASS_OPACITY: f32 = 0.05;

/// Texture addressing outside [0, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    MirroredRepeat,
    Repeat,
}

impl WrapMode {
    /// Map a USD wrap token (`clamp`, `mirror`, `repeat`).
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "clamp" => Some(WrapMode::ClampToEdge),
            "mirror" => Some(WrapMode::MirroredRepeat),
            "repeat" => Some(WrapMode::Repeat),
            _ => None,
        }
    }
}

/// How texel values are to be interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum ColorSpace {
    #[default]
    Srgb,
    Raw,
}

impl ColorSpace {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "srgb" => Some(ColorSpace::Srgb),
            "raw" | "linear" => Some(ColorSpace::Raw),
            _ => None,
        }
    }
}

/// 2D texture coordinate transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UvTransform {
    /// Rotation in degrees
    pub rotation: f32,
    pub scale: Vec2,
    pub offset: Vec2,
}

impl Default for UvTransform {
    fn default() -> Self {
        Self {
            rotation: 0.0,
            scale: Vec2::ONE,
            offset: Vec2::ZERO,
        }
    }
}

/// Diffuse texture binding.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureRef {
    /// Archive-relative path the shader asked for
    pub asset_path: String,

    /// Handle of the archive texture, `None` when the file is missing
    pub handle: Option<TextureHandle>,

    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub transform: UvTransform,
    pub color_space: ColorSpace,
}

/// Renderer-neutral material.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialDescriptor {
    /// Name of the bound material prim, empty for defaults
    pub name: String,

    pub base_color: Vec3,
    pub diffuse_texture: Option<TextureRef>,
    pub emissive: Vec3,

    pub transparent: bool,
    pub opacity: f32,

    pub roughness: f32,
    pub metalness: f32,

    pub double_sided: bool,
    pub depth_write: bool,

    /// Opacity fell below the opening threshold
    pub is_opening: bool,
}

impl Default for MaterialDescriptor {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: Vec3::ONE,
            diffuse_texture: None,
            emissive: Vec3::ZERO,
            transparent: false,
            opacity: 1.0,
            roughness: 1.0,
            metalness: 0.0,
            double_sided: false,
            depth_write: true,
            is_opening: false,
        }
    }
}

impl MaterialDescriptor {
    /// Translucent material used for doors, windows and openings.
    pub fn glass() -> Self {
        Self {
            name: "glass".to_string(),
            base_color: Vec3::ONE,
            transparent: true,
            opacity: GLASS_OPACITY,
            roughness: 0.0,
            metalness: 0.5,
            double_sided: true,
            depth_write: false,
            is_opening: true,
            ..Self::default()
        }
    }

    pub fn is_glass(&self) -> bool {
        self.transparent && !self.depth_write && self.opacity == GLASS_OPACITY
    }
}
