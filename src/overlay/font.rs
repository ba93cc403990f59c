use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use tiny_skia::{Path as SkiaPath, PathBuilder};
use tracing::{info, warn};
use ttf_parser::{Face, name_id};
use usvg::fontdb;

/// Ascent above and descent below the baseline, in pixels (descent is negative).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalMetrics {
    pub ascent: f32,
    pub descent: f32,
}

impl VerticalMetrics {
    /// Offset from a line's vertical middle down to its baseline.
    pub fn middle_to_baseline(&self) -> f32 {
        (self.ascent + self.descent) / 2.0
    }
}

/// Glyph measurement and outlines for a single font resource.
///
/// Implementations must be usable from several threads at once; the engine
/// only ever borrows them immutably.
pub trait FontMetricsProvider: Send + Sync {
    /// Pixel width of `text` set at `font_size`.
    fn measure_width(&self, text: &str, font_size: f32) -> Result<f32>;

    fn vertical_metrics(&self, font_size: f32) -> VerticalMetrics;

    /// Outlines of `text` with its left baseline origin at `(x, baseline)`.
    /// `Ok(None)` means there is nothing visible to draw.
    fn text_path(&self, text: &str, font_size: f32, x: f32, baseline: f32)
    -> Result<Option<SkiaPath>>;

    fn family(&self) -> Option<&str> {
        None
    }
}

#[derive(Clone)]
pub struct FontFace {
    data: Arc<Vec<u8>>,
    face_index: u32,
    units_per_em: u16,
    space_advance: u16,
    ascender: i16,
    descender: i16,
    family: Option<String>,
}

impl FontFace {
    pub fn from_data(data: Vec<u8>, face_index: u32) -> Result<Self> {
        let face = Face::parse(&data, face_index)
            .map_err(|err| anyhow!("failed to parse font data ({})", err))?;
        let units_per_em = face.units_per_em().max(1);
        let space_advance = face
            .glyph_index(' ')
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(units_per_em / 2);
        let ascender = face.ascender();
        let descender = face.descender();
        let family = extract_family_name(&face);
        Ok(Self {
            data: Arc::new(data),
            face_index,
            units_per_em,
            space_advance,
            ascender,
            descender,
            family,
        })
    }

    fn face(&self) -> Result<Face<'_>> {
        Face::parse(&self.data, self.face_index)
            .map_err(|err| anyhow!("failed to parse font data ({})", err))
    }

    fn scale(&self, font_size: f32) -> f32 {
        font_size / self.units_per_em as f32
    }
}

impl FontMetricsProvider for FontFace {
    fn measure_width(&self, text: &str, font_size: f32) -> Result<f32> {
        let face = self.face()?;
        let mut advance = 0u32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            if ch == ' ' {
                advance = advance.saturating_add(self.space_advance as u32);
                continue;
            }
            let glyph_advance = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .unwrap_or(self.space_advance);
            advance = advance.saturating_add(glyph_advance as u32);
        }
        Ok(advance as f32 * self.scale(font_size))
    }

    fn vertical_metrics(&self, font_size: f32) -> VerticalMetrics {
        let scale = self.scale(font_size);
        VerticalMetrics {
            ascent: self.ascender as f32 * scale,
            descent: self.descender as f32 * scale,
        }
    }

    fn text_path(
        &self,
        text: &str,
        font_size: f32,
        x: f32,
        baseline: f32,
    ) -> Result<Option<SkiaPath>> {
        let face = self.face()?;
        let scale = self.scale(font_size);
        let mut builder = PathBuilder::new();
        let mut pen_x = 0.0f32;
        for ch in text.chars() {
            let Some(glyph) = face.glyph_index(ch) else {
                pen_x += self.space_advance as f32;
                continue;
            };
            let mut outline = OutlineSink {
                builder: &mut builder,
                origin_x: x + pen_x * scale,
                origin_y: baseline,
                scale,
            };
            face.outline_glyph(glyph, &mut outline);
            pen_x += face
                .glyph_hor_advance(glyph)
                .unwrap_or(self.space_advance) as f32;
        }
        Ok(builder.finish())
    }

    fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }
}

/// Maps font units (y up) onto canvas pixels (y down).
struct OutlineSink<'a> {
    builder: &'a mut PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl OutlineSink<'_> {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.origin_y - y * self.scale)
    }
}

impl ttf_parser::OutlineBuilder for OutlineSink<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

/// Last-resort metrics when no font file can be loaded. Widths are estimated
/// per character and nothing is drawn for glyphs; bubbles still render.
#[derive(Debug, Clone, Default)]
pub struct EstimatedFont;

impl FontMetricsProvider for EstimatedFont {
    fn measure_width(&self, text: &str, font_size: f32) -> Result<f32> {
        Ok(estimate_text_width_units(text) * font_size)
    }

    fn vertical_metrics(&self, font_size: f32) -> VerticalMetrics {
        VerticalMetrics {
            ascent: font_size * 0.8,
            descent: -font_size * 0.2,
        }
    }

    fn text_path(
        &self,
        _text: &str,
        _font_size: f32,
        _x: f32,
        _baseline: f32,
    ) -> Result<Option<SkiaPath>> {
        Ok(None)
    }
}

fn estimate_char_units(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF
    ) {
        1.0
    } else {
        0.9
    }
}

fn estimate_text_width_units(text: &str) -> f32 {
    text.chars()
        .filter(|ch| *ch != '\n')
        .map(estimate_char_units)
        .sum()
}

pub fn load_font_face(path: &Path) -> Result<FontFace> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_face_from_data(data, None)
        .with_context(|| format!("failed to parse font: {}", path.display()))
}

/// Configured font file, then a system font, then estimated metrics. Font
/// problems never abort rendering.
pub fn resolve_font(
    font_path: Option<&Path>,
    font_family: Option<&str>,
) -> Arc<dyn FontMetricsProvider> {
    if let Some(path) = font_path {
        match load_font_face(path) {
            Ok(face) => {
                info!(path = %path.display(), family = ?face.family(), "font loaded");
                return Arc::new(face);
            }
            Err(err) => warn!("font unavailable, falling back: {:#}", err),
        }
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    let mut candidates = Vec::new();
    if let Some(family) = font_family {
        candidates.push(fontdb::Family::Name(family));
    }
    candidates.push(fontdb::Family::SansSerif);
    for family in candidates {
        match load_font_face_from_db(&db, family) {
            Ok(face) => {
                info!(family = ?face.family(), "using system font");
                return Arc::new(face);
            }
            Err(err) => warn!("system font lookup failed: {:#}", err),
        }
    }

    warn!("no usable font found, glyphs will not be drawn");
    Arc::new(EstimatedFont)
}

fn load_font_face_from_db(db: &fontdb::Database, family: fontdb::Family<'_>) -> Result<FontFace> {
    let families = [family];
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {:?}", families[0]))?;
    let (data, face_index) = db
        .with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| anyhow!("failed to load font data: {:?}", families[0]))?;
    FontFace::from_data(data, face_index)
}

fn load_font_face_from_data(data: Vec<u8>, preferred_family: Option<&str>) -> Result<FontFace> {
    let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
    let mut fallback = None;
    for index in 0..count {
        let Ok(face) = Face::parse(&data, index) else {
            continue;
        };
        let family = extract_family_name(&face);
        let matches = match (preferred_family, family.as_deref()) {
            (Some(preferred), Some(found)) => found.eq_ignore_ascii_case(preferred),
            _ => false,
        };
        if matches {
            return FontFace::from_data(data, index);
        }
        if fallback.is_none() {
            fallback = Some(index);
        }
    }
    let index = fallback.ok_or_else(|| anyhow!("no parsable face in font data"))?;
    FontFace::from_data(data, index)
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn estimated_font_measures_without_glyphs() {
        let font = EstimatedFont;
        let width = font.measure_width("ab c", 20.0).expect("width");
        assert!((width - (0.55 * 3.0 + 0.25) * 20.0).abs() < 1e-4);
        assert!(font.text_path("ab", 20.0, 0.0, 0.0).expect("path").is_none());
        let metrics = font.vertical_metrics(10.0);
        assert!((metrics.middle_to_baseline() - 3.0).abs() < 1e-4);
    }

    #[test]
    fn unreadable_font_file_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").expect("write");
        assert!(load_font_face(&path).is_err());
        assert!(load_font_face(&dir.path().join("missing.ttf")).is_err());
    }

    #[test]
    fn missing_font_path_still_resolves() {
        let dir = tempdir().expect("tempdir");
        let font = resolve_font(Some(&dir.path().join("missing.ttf")), Some("NoSuchFamily"));
        let width = font.measure_width("hello", 42.0).expect("width");
        assert!(width > 0.0);
    }
}
