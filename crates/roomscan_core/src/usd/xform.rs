//! Transform attributes → local matrix.
//!
//! An authored `xformOp:transform` wins outright. Otherwise the component
//! ops are composed as `T · P · R · S · P⁻¹` where P is the pivot. Attribute
//! lookup is by name, so `double3` and `float3` spellings are equivalent.

use roomscan_math::{Mat4, Mat4Ext, Quat, Vec3};

use crate::scene::Transform;

use super::types::PropertyNode;
use super::values::{parse_float, parse_floats, parse_quat, parse_vec3};

/// Transform operation read from a prim.
#[derive(Clone, Debug, PartialEq)]
pub enum XformOp {
    /// Full 4x4 matrix (xformOp:transform)
    Transform(Mat4),

    Translate(Vec3),

    /// Pivot offset (xformOp:translate:pivot)
    Pivot(Vec3),

    /// Euler rotation XYZ in degrees
    RotateXYZ(Vec3),

    /// Rotation in degrees around a single axis
    RotateX(f32),
    RotateY(f32),
    RotateZ(f32),

    /// Unit quaternion (xformOp:orient)
    Orient(Quat),

    Scale(Vec3),
}

impl XformOp {
    /// Convert this operation to a transformation matrix.
    pub fn to_matrix(&self) -> Mat4 {
        match self {
            XformOp::Transform(m) => *m,
            XformOp::Translate(t) | XformOp::Pivot(t) => Mat4::from_translation(*t),
            XformOp::RotateXYZ(euler) => {
                Mat4::from_rotation_x(euler.x.to_radians())
                    * Mat4::from_rotation_y(euler.y.to_radians())
                    * Mat4::from_rotation_z(euler.z.to_radians())
            }
            XformOp::RotateX(deg) => Mat4::from_rotation_x(deg.to_radians()),
            XformOp::RotateY(deg) => Mat4::from_rotation_y(deg.to_radians()),
            XformOp::RotateZ(deg) => Mat4::from_rotation_z(deg.to_radians()),
            XformOp::Orient(q) => Mat4::from_quat(*q),
            XformOp::Scale(s) => Mat4::from_scale(*s),
        }
    }
}

/// Read the transform ops authored on a prim, in composition order.
///
/// Orient replaces any Euler rotation; single-axis rotations are only read
/// when neither is present.
pub fn read_xform_ops(node: &PropertyNode) -> Vec<XformOp> {
    if let Some(text) = node.attribute_text("xformOp:transform") {
        let values = parse_floats(text);
        if values.len() == 16 {
            // USD stores row vectors row by row; that is glam's column layout.
            let mut cols = [0.0; 16];
            cols.copy_from_slice(&values);
            let matrix = Mat4::from_cols_array(&cols);
            if matrix.is_finite_matrix() {
                return vec![XformOp::Transform(matrix)];
            }
        }
        log::debug!("Ignoring malformed xformOp:transform {:?}", text);
    }

    let vec3 = |name: &str| node.attribute_text(name).and_then(parse_vec3);

    let mut ops = Vec::new();
    if let Some(t) = vec3("xformOp:translate") {
        ops.push(XformOp::Translate(t));
    }

    let pivot = vec3("xformOp:translate:pivot");
    if let Some(p) = pivot {
        ops.push(XformOp::Pivot(p));
    }

    if let Some(q) = node.attribute_text("xformOp:orient").and_then(parse_quat) {
        ops.push(XformOp::Orient(q));
    } else if let Some(euler) = vec3("xformOp:rotateXYZ") {
        ops.push(XformOp::RotateXYZ(euler));
    } else {
        let angle = |name: &str| node.attribute_text(name).and_then(parse_float);
        if let Some(deg) = angle("xformOp:rotateX") {
            ops.push(XformOp::RotateX(deg));
        }
        if let Some(deg) = angle("xformOp:rotateY") {
            ops.push(XformOp::RotateY(deg));
        }
        if let Some(deg) = angle("xformOp:rotateZ") {
            ops.push(XformOp::RotateZ(deg));
        }
    }

    if let Some(s) = vec3("xformOp:scale") {
        ops.push(XformOp::Scale(s));
    }

    if let Some(p) = pivot {
        ops.push(XformOp::Pivot(-p));
    }

    ops
}

/// Combine a list of xformOps into a single matrix.
pub fn compose_xform_ops(ops: &[XformOp]) -> Mat4 {
    ops.iter()
        .fold(Mat4::IDENTITY, |result, op| result * op.to_matrix())
}

/// Local transform of a prim. Identity when nothing is authored.
pub fn compose_transform(node: &PropertyNode) -> Transform {
    Transform::from_matrix(compose_xform_ops(&read_xform_ops(node)))
}
