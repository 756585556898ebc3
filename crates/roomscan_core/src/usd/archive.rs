//! USDZ container reading.
//!
//! A USDZ file is an uncompressed zip holding one or more scene layers and
//! the textures they use. Every entry is classified once into an
//! [`AssetTable`] that later stages read by archive-relative path.
//!
//! Binary crate layers (`PXR-USDC`) are recognised but not decoded.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

use image::ImageFormat;
use thiserror::Error;
use zip::ZipArchive;

use crate::diagnostics::Diagnostics;

use super::parser::parse_usda;
use super::types::PropertyNode;

/// Magic bytes at the start of a binary crate layer.
pub const CRATE_MAGIC: &[u8; 8] = b"PXR-USDC";

/// Magic bytes at the start of a zip local file header.
pub const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// Largest up-front buffer reserved from an entry's declared size.
const MAX_PREALLOC: usize = 64 << 20;

/// Errors that can occur while reading an archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

pub fn is_crate(bytes: &[u8]) -> bool {
    bytes.starts_with(CRATE_MAGIC)
}

pub fn is_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC)
}

/// Opaque texture handle handed to the renderer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextureHandle {
    /// Image bytes kept in memory (no hook installed)
    Embedded { path: String, bytes: Arc<[u8]> },

    /// Identifier issued by the host's texture hook (URL, GPU id, ...)
    Host(String),
}

/// Host hook that registers texture bytes and returns a handle for them.
pub type TextureHook = Arc<dyn Fn(&str, &[u8]) -> TextureHandle + Send + Sync>;

/// An image entry of the archive.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureAsset {
    pub handle: TextureHandle,

    /// Format sniffed from the bytes, if recognisable
    pub format: Option<ImageFormat>,

    /// (width, height) read from the image header, if decodable
    pub dimensions: Option<(u32, u32)>,

    pub byte_len: usize,
}

impl TextureAsset {
    fn probe(path: &str, bytes: &[u8], hook: Option<&TextureHook>) -> Self {
        let format = image::guess_format(bytes).ok();
        let dimensions = image::io::Reader::new(Cursor::new(bytes))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok());

        if dimensions.is_none() {
            log::debug!("Texture {} has an unreadable header", path);
        }

        let handle = match hook {
            Some(hook) => hook(path, bytes),
            None => TextureHandle::Embedded {
                path: path.to_string(),
                bytes: Arc::from(bytes),
            },
        };

        Self {
            handle,
            format,
            dimensions,
            byte_len: bytes.len(),
        }
    }
}

/// One classified archive entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Asset {
    /// Parsed text layer
    Layer(PropertyNode),

    /// Binary crate layer (not decoded)
    Crate,

    Texture(TextureAsset),
}

/// Archive contents by archive-relative path, sorted by path.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssetTable {
    assets: BTreeMap<String, Asset>,
}

impl AssetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, asset: Asset) {
        self.assets.insert(path.into(), asset);
    }

    pub fn get(&self, path: &str) -> Option<&Asset> {
        self.assets.get(path)
    }

    pub fn layer(&self, path: &str) -> Option<&PropertyNode> {
        match self.assets.get(path) {
            Some(Asset::Layer(root)) => Some(root),
            _ => None,
        }
    }

    pub fn texture(&self, path: &str) -> Option<&TextureAsset> {
        match self.assets.get(path) {
            Some(Asset::Texture(texture)) => Some(texture),
            _ => None,
        }
    }

    pub fn is_crate(&self, path: &str) -> bool {
        matches!(self.assets.get(path), Some(Asset::Crate))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Asset)> {
        self.assets.iter().map(|(path, asset)| (path.as_str(), asset))
    }

    pub fn textures(&self) -> impl Iterator<Item = (&str, &TextureAsset)> {
        self.iter().filter_map(|(path, asset)| match asset {
            Asset::Texture(texture) => Some((path, texture)),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// The layer a decode starts from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryPoint {
    Layer(String),
    Crate(String),
}

/// Result of unpacking an archive.
#[derive(Debug)]
pub struct LoadedArchive {
    pub assets: AssetTable,
    pub entry: Option<EntryPoint>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EntryKind {
    Image,
    Scene,
    Other,
}

fn entry_kind(path: &str) -> EntryKind {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".png") || lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        EntryKind::Image
    } else if lower.ends_with(".usd") || lower.ends_with(".usda") || lower.ends_with(".usdc") {
        EntryKind::Scene
    } else {
        EntryKind::Other
    }
}

/// Read buffer size for an entry; the header's size field is not trusted.
fn capacity_hint(declared: u64) -> usize {
    usize::try_from(declared).map_or(MAX_PREALLOC, |size| size.min(MAX_PREALLOC))
}

/// Unpacks a USDZ archive into an [`AssetTable`].
pub struct ArchiveLoader<'h> {
    texture_hook: Option<&'h TextureHook>,
}

impl<'h> ArchiveLoader<'h> {
    pub fn new(texture_hook: Option<&'h TextureHook>) -> Self {
        Self { texture_hook }
    }

    /// Read every entry of the archive and pick the entry point.
    pub fn load(&self, bytes: &[u8], diagnostics: &mut Diagnostics) -> ArchiveResult<LoadedArchive> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut assets = AssetTable::new();
        // Archive order, for entry point selection
        let mut scenes: Vec<(String, bool)> = Vec::new();

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }

            let path = file.name().to_string();
            let kind = entry_kind(&path);
            if kind == EntryKind::Other {
                log::debug!("Skipping archive entry {}", path);
                continue;
            }

            let mut data = Vec::with_capacity(capacity_hint(file.size()));
            file.read_to_end(&mut data)?;

            match kind {
                EntryKind::Image => {
                    let texture = TextureAsset::probe(&path, &data, self.texture_hook);
                    log::debug!(
                        "Archive texture {} ({:?}, {:?})",
                        path,
                        texture.format,
                        texture.dimensions
                    );
                    assets.insert(path, Asset::Texture(texture));
                }
                EntryKind::Scene if is_crate(&data) => {
                    log::debug!("Archive layer {} is a binary crate", path);
                    scenes.push((path.clone(), true));
                    assets.insert(path, Asset::Crate);
                }
                EntryKind::Scene => {
                    let text = String::from_utf8_lossy(&data);
                    let root = parse_usda(&text, diagnostics);
                    log::debug!("Archive layer {} ({} root entries)", path, root.len());
                    scenes.push((path.clone(), false));
                    assets.insert(path, Asset::Layer(root));
                }
                EntryKind::Other => {}
            }
        }

        let entry = select_entry_point(&scenes);
        Ok(LoadedArchive { assets, entry })
    }
}

/// Pick the layer to start from, given scene entries in archive order
/// with their crate flag.
///
/// A crate first entry wins (and is unsupported). Otherwise the first
/// `.usda`, or `.usd` that is not crate-encoded. With only crate layers
/// left, the first of those.
fn select_entry_point(scenes: &[(String, bool)]) -> Option<EntryPoint> {
    if let Some((path, true)) = scenes.first() {
        return Some(EntryPoint::Crate(path.clone()));
    }

    let text_layer = scenes.iter().find(|(path, is_crate)| {
        let lower = path.to_ascii_lowercase();
        !is_crate && (lower.ends_with(".usda") || lower.ends_with(".usd"))
    });
    if let Some((path, _)) = text_layer {
        return Some(EntryPoint::Layer(path.clone()));
    }

    scenes
        .iter()
        .find(|(_, is_crate)| *is_crate)
        .map(|(path, _)| EntryPoint::Crate(path.clone()))
}
