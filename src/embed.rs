// Font and image collaborators.
//
// The compiler never looks inside fonts or images; it holds opaque handles that can
// encode text, report pixel sizes and yield a stable identity for resource
// memoization. Embedding is async because a real document writer may do I/O.

use crate::error::{GraphicError, Result};
use base64::Engine;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Stable identity of an embedded resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Content-addressed key: equal bytes embed to equal keys.
    pub fn digest(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut out = String::with_capacity(digest.len() * 2);
        for b in digest {
            use std::fmt::Write;
            let _ = write!(&mut out, "{:02x}", b);
        }
        Self(out)
    }

    pub fn named(name: &str) -> Self {
        Self(format!("name:{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub trait EmbeddedFont: fmt::Debug + Send + Sync {
    /// PostScript (or best available) name, used as a base-font hint.
    fn name(&self) -> &str;
    /// Encodes a run for a show-text operator.
    fn encode_text(&self, text: &str) -> Vec<u8>;
    fn identity(&self) -> ResourceKey;
    /// Horizontal advance of `text` in ems. Without metrics every character is
    /// 0.6 em wide.
    fn advance_width(&self, text: &str) -> f64 {
        text.chars().count() as f64 * 0.6
    }
}

#[derive(Debug, Clone)]
pub struct FontHandle(Arc<dyn EmbeddedFont>);

impl FontHandle {
    pub fn new(font: impl EmbeddedFont + 'static) -> Self {
        Self(Arc::new(font))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn encode_text(&self, text: &str) -> Vec<u8> {
        self.0.encode_text(text)
    }

    pub fn identity(&self) -> ResourceKey {
        self.0.identity()
    }

    pub fn advance_width(&self, text: &str) -> f64 {
        self.0.advance_width(text)
    }
}

impl PartialEq for FontHandle {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Png,
    Jpeg,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHandle {
    identity: ResourceKey,
    kind: ImageKind,
    width: u32,
    height: u32,
}

impl ImageHandle {
    pub fn new(identity: ResourceKey, kind: ImageKind, width: u32, height: u32) -> Self {
        Self {
            identity,
            kind,
            width,
            height,
        }
    }

    pub fn identity(&self) -> ResourceKey {
        self.identity.clone()
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    /// Intrinsic size in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

#[allow(async_fn_in_trait)]
pub trait FontEmbedder {
    async fn embed_font(&mut self, bytes: Vec<u8>, name_hint: &str) -> Result<FontHandle>;
}

#[allow(async_fn_in_trait)]
pub trait ImageEmbedder {
    async fn embed_png(&mut self, bytes: Vec<u8>) -> Result<ImageHandle>;
    async fn embed_jpeg(&mut self, bytes: Vec<u8>) -> Result<ImageHandle>;
}

/// A TrueType/OpenType font addressed by glyph id (2-byte big-endian, Identity-H).
#[derive(Debug)]
pub struct TrueTypeFont {
    name: String,
    identity: ResourceKey,
    data: Arc<Vec<u8>>,
}

impl TrueTypeFont {
    pub fn parse(data: Vec<u8>, name_hint: &str) -> Result<Self> {
        let face = ttf_parser::Face::parse(&data, 0).map_err(|err| GraphicError::Embed {
            kind: "font",
            reason: format!("invalid font data for {name_hint}: {err}"),
        })?;
        let name = postscript_name(&face).unwrap_or_else(|| name_hint.to_string());
        let identity = ResourceKey::digest(&data);
        Ok(Self {
            name,
            identity,
            data: Arc::new(data),
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl EmbeddedFont for TrueTypeFont {
    fn name(&self) -> &str {
        &self.name
    }

    fn encode_text(&self, text: &str) -> Vec<u8> {
        let Ok(face) = ttf_parser::Face::parse(&self.data, 0) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(text.len() * 2);
        for ch in text.chars() {
            // Unmapped characters fall to .notdef.
            let gid = face.glyph_index(ch).map(|g| g.0).unwrap_or(0);
            out.extend_from_slice(&gid.to_be_bytes());
        }
        out
    }

    fn identity(&self) -> ResourceKey {
        self.identity.clone()
    }

    fn advance_width(&self, text: &str) -> f64 {
        let Ok(face) = ttf_parser::Face::parse(&self.data, 0) else {
            return 0.0;
        };
        let units = f64::from(face.units_per_em().max(1));
        text.chars()
            .map(|ch| {
                let gid = face.glyph_index(ch).unwrap_or(ttf_parser::GlyphId(0));
                f64::from(face.glyph_hor_advance(gid).unwrap_or(0)) / units
            })
            .sum()
    }
}

fn postscript_name(face: &ttf_parser::Face<'_>) -> Option<String> {
    use ttf_parser::name::name_id;

    let mut family = None;
    let mut post = None;
    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        match entry.name_id {
            name_id::POST_SCRIPT_NAME if post.is_none() => post = Some(name),
            name_id::TYPOGRAPHIC_FAMILY | name_id::FAMILY if family.is_none() => {
                family = Some(name)
            }
            _ => {}
        }
    }
    post.or(family)
}

/// One of the base-14 fonts, encoded single-byte WinAnsi.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardFont {
    name: &'static str,
}

impl StandardFont {
    pub fn helvetica() -> Self {
        Self { name: "Helvetica" }
    }
}

impl EmbeddedFont for StandardFont {
    fn name(&self) -> &str {
        self.name
    }

    fn encode_text(&self, text: &str) -> Vec<u8> {
        text.chars().map(winansi_byte).collect()
    }

    fn identity(&self) -> ResourceKey {
        ResourceKey::named(self.name)
    }
}

fn winansi_byte(ch: char) -> u8 {
    match ch {
        '\u{0000}'..='\u{007F}' | '\u{00A0}'..='\u{00FF}' => ch as u8,
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => b'?',
    }
}

/// Default font collaborator: validates with ttf-parser and keeps every font it
/// embedded so the caller can write the font programs out.
#[derive(Debug, Default)]
pub struct TrueTypeEmbedder {
    fonts: Vec<FontHandle>,
}

impl TrueTypeEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fonts(&self) -> &[FontHandle] {
        &self.fonts
    }
}

impl FontEmbedder for TrueTypeEmbedder {
    async fn embed_font(&mut self, bytes: Vec<u8>, name_hint: &str) -> Result<FontHandle> {
        let font = TrueTypeFont::parse(bytes, name_hint)?;
        log::debug!("embedded font {} ({})", font.name(), name_hint);
        let handle = FontHandle::new(font);
        self.fonts.push(handle.clone());
        Ok(handle)
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub handle: ImageHandle,
    pub bytes: Arc<Vec<u8>>,
}

/// Default image collaborator: reads pixel dimensions with `image` and keeps the
/// encoded bytes. Identical bytes embed once.
#[derive(Debug, Default)]
pub struct RasterEmbedder {
    images: Vec<EmbeddedImage>,
}

impl RasterEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn images(&self) -> &[EmbeddedImage] {
        &self.images
    }

    fn embed(&mut self, bytes: Vec<u8>, kind: ImageKind) -> Result<ImageHandle> {
        let identity = ResourceKey::digest(&bytes);
        if let Some(existing) = self.images.iter().find(|img| img.handle.identity == identity) {
            return Ok(existing.handle.clone());
        }
        let format = match kind {
            ImageKind::Png => image::ImageFormat::Png,
            ImageKind::Jpeg => image::ImageFormat::Jpeg,
        };
        let decoded =
            image::load_from_memory_with_format(&bytes, format).map_err(|err| GraphicError::Embed {
                kind: "image",
                reason: err.to_string(),
            })?;
        let handle = ImageHandle::new(identity, kind, decoded.width(), decoded.height());
        log::debug!(
            "embedded {:?} image {}x{}",
            kind,
            handle.width(),
            handle.height()
        );
        self.images.push(EmbeddedImage {
            handle: handle.clone(),
            bytes: Arc::new(bytes),
        });
        Ok(handle)
    }
}

impl ImageEmbedder for RasterEmbedder {
    async fn embed_png(&mut self, bytes: Vec<u8>) -> Result<ImageHandle> {
        self.embed(bytes, ImageKind::Png)
    }

    async fn embed_jpeg(&mut self, bytes: Vec<u8>) -> Result<ImageHandle> {
        self.embed(bytes, ImageKind::Jpeg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Splits a `data:` URI into its media type (the text between `:` and the first `;`
/// or `,`) and decoded payload.
pub fn parse_data_uri(uri: &str) -> Option<DataUri> {
    let rest = uri.trim().strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.split(';').next().unwrap_or_default().trim();
    let mime = if mime.is_empty() {
        "text/plain".to_string()
    } else {
        mime.to_ascii_lowercase()
    };
    let bytes = if header.split(';').any(|p| p.trim() == "base64") {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact)
            .ok()?
    } else {
        payload.as_bytes().to_vec()
    };
    Some(DataUri { mime, bytes })
}
