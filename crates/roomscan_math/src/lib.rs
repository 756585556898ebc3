// Re-export glam for convenience
pub use glam::*;

// Room-scan math types
mod aabb;
mod interval;
mod transform;

pub use aabb::Aabb;
pub use interval::Interval;
pub use transform::Mat4Ext;

/// Reinterpret a slice of plain vectors as raw bytes for buffer uploads.
pub fn as_bytes<T: bytemuck::Pod>(values: &[T]) -> &[u8] {
    bytemuck::cast_slice(values)
}
