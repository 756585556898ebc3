//! Numeric and token parsing of raw value text.
//!
//! The structural parser keeps values as text. These helpers turn the
//! text into numbers only when a consumer needs them. Tokenization is
//! position-preserving: an unparsable number becomes NaN (floats) or -1
//! (indices) rather than shifting every following element.

use roomscan_math::{Quat, Vec2, Vec3};

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || matches!(c, ',' | '(' | ')' | '[' | ']'))
        .filter(|token| !token.is_empty())
}

/// Flat list of floats from an array or tuple literal (`[(0, 1, 2), (3, 4, 5)]`).
pub fn parse_floats(text: &str) -> Vec<f32> {
    tokens(text)
        .map(|token| token.parse::<f32>().unwrap_or(f32::NAN))
        .collect()
}

/// Flat list of integers. Unparsable entries become -1 so they are caught
/// by range checks downstream.
pub fn parse_indices(text: &str) -> Vec<i64> {
    tokens(text)
        .map(|token| token.parse::<i64>().unwrap_or(-1))
        .collect()
}

pub fn parse_float(text: &str) -> Option<f32> {
    tokens(text).next()?.parse().ok()
}

pub fn parse_vec2(text: &str) -> Option<Vec2> {
    match parse_floats(text).as_slice() {
        [x, y, ..] => Some(Vec2::new(*x, *y)),
        _ => None,
    }
}

pub fn parse_vec3(text: &str) -> Option<Vec3> {
    match parse_floats(text).as_slice() {
        [x, y, z, ..] => Some(Vec3::new(*x, *y, *z)),
        _ => None,
    }
}

/// Quaternion written in USD order `(w, x, y, z)`, normalized.
pub fn parse_quat(text: &str) -> Option<Quat> {
    match parse_floats(text).as_slice() {
        [w, x, y, z, ..] => {
            let q = Quat::from_xyzw(*x, *y, *z, *w);
            (q.length_squared() > 0.0 && q.is_finite()).then(|| q.normalize())
        }
        _ => None,
    }
}

/// Token value with surrounding quotes removed (`"leftHanded"` → `leftHanded`).
pub fn parse_token(text: &str) -> &str {
    text.trim().trim_matches('"').trim_matches('\'')
}

/// Asset path with `@` delimiters removed (`@textures/wall.png@` → `textures/wall.png`).
pub fn parse_asset_path(text: &str) -> &str {
    let text = text.trim();
    match text.split('@').nth(1) {
        Some(path) if text.starts_with('@') => path.trim(),
        _ => parse_token(text),
    }
}

/// Prim path from a relationship target (`</Room/Looks/Wall>` → `/Room/Looks/Wall`).
pub fn parse_prim_path(text: &str) -> Option<&str> {
    let start = text.find('<')? + 1;
    let len = text[start..].find('>')?;
    let path = text[start..start + len].trim();
    (!path.is_empty()).then_some(path)
}

/// Prim path and property name of a connection target
/// (`</Room/Looks/Wall/Surface.outputs:surface>` → (`/Room/Looks/Wall/Surface`, `outputs:surface`)).
pub fn connection_source(text: &str) -> Option<(&str, &str)> {
    let path = parse_prim_path(text)?;
    let last_slash = path.rfind('/').map_or(0, |i| i + 1);
    match path[last_slash..].find('.') {
        Some(dot) => Some((&path[..last_slash + dot], &path[last_slash + dot + 1..])),
        None => Some((path, "")),
    }
}

/// Last segment of a prim path.
pub fn prim_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
