use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt::Write;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Mutex;
use ttf_parser::{Face, OutlineBuilder};

use crate::model::split_label;

/// Advance used for glyphs the font cannot supply, as a fraction of the
/// font size.
const FALLBACK_ADVANCE: f32 = 0.56;
pub const LINE_HEIGHT: f32 = 1.5;

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> = Lazy::new(|| Mutex::new(TextMeasurer::new()));

/// Measured extent of a possibly multi-line label.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<String>,
    pub width: f32,
    pub height: f32,
}

pub fn measure_text_width(text: &str, font_size: f32, font_family: &str) -> Option<f32> {
    if text.is_empty() || font_size <= 0.0 {
        return Some(0.0);
    }
    let mut guard = TEXT_MEASURER.lock().ok()?;
    guard.measure(text, font_size, font_family)
}

/// Width estimate that never fails: font measurement when a face is
/// available, a fixed average advance otherwise.
pub fn text_width(text: &str, font_size: f32, font_family: &str) -> f32 {
    measure_text_width(text, font_size, font_family)
        .unwrap_or_else(|| estimate_width(text, font_size))
}

pub fn estimate_width(text: &str, font_size: f32) -> f32 {
    text.chars().filter(|ch| *ch != '\n').count() as f32 * font_size * FALLBACK_ADVANCE
}

pub fn measure_label(label: &str, font_size: f32, font_family: &str) -> TextBlock {
    let lines = split_label(label);
    let width = lines
        .iter()
        .map(|line| text_width(line, font_size, font_family))
        .fold(0.0f32, f32::max);
    let height = lines.len() as f32 * font_size * LINE_HEIGHT;
    TextBlock {
        lines,
        width,
        height,
    }
}

/// Glyph outlines for `text` as SVG path data, with the baseline starting at
/// `origin`. `None` when no font face is available.
pub fn text_outline_path(
    text: &str,
    font_size: f32,
    font_family: &str,
    origin: (f32, f32),
) -> Option<String> {
    if text.is_empty() || font_size <= 0.0 {
        return None;
    }
    let mut guard = TEXT_MEASURER.lock().ok()?;
    guard.outline(text, font_size, font_family, origin)
}

struct TextMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    cache: HashMap<String, Option<FontFace>>,
}

impl TextMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            cache: HashMap::new(),
        }
    }

    fn face(&mut self, font_family: &str) -> Option<&mut FontFace> {
        let family_key = normalize_family_key(font_family);
        if !self.cache.contains_key(&family_key) {
            let face = self.load_face(font_family);
            if face.is_none() {
                tracing::debug!(family = font_family, "no font face, estimating text width");
            }
            self.cache.insert(family_key.clone(), face);
        }
        self.cache.get_mut(&family_key).and_then(Option::as_mut)
    }

    fn measure(&mut self, text: &str, font_size: f32, font_family: &str) -> Option<f32> {
        let normalized = text.replace('\t', "    ");
        self.face(font_family)?.measure_width(&normalized, font_size)
    }

    fn outline(
        &mut self,
        text: &str,
        font_size: f32,
        font_family: &str,
        origin: (f32, f32),
    ) -> Option<String> {
        self.face(font_family)?.outline(text, font_size, origin)
    }

    fn load_face(&mut self, font_family: &str) -> Option<FontFace> {
        let family_key = normalize_family_key(font_family);
        if let Some(face) = load_cached_face(&family_key) {
            return Some(face);
        }
        let names: Vec<&str> = font_family
            .split(',')
            .map(|part| part.trim().trim_matches('"').trim_matches('\''))
            .filter(|raw| !raw.is_empty())
            .collect();
        let mut families: Vec<Family<'_>> = names
            .iter()
            .map(|raw| match raw.to_ascii_lowercase().as_str() {
                "serif" => Family::Serif,
                "sans-serif" | "system-ui" | "-apple-system" | "ui-sans-serif" => {
                    Family::SansSerif
                }
                "monospace" | "ui-monospace" => Family::Monospace,
                "cursive" => Family::Cursive,
                "fantasy" => Family::Fantasy,
                _ => Family::Name(raw),
            })
            .collect();
        if families.is_empty() {
            families.push(Family::SansSerif);
        }

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let query = Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        };
        let id = self.db.query(&query)?;
        self.db
            .with_face_data(id, |data, index| {
                let face = FontFace::new(data.to_vec(), index)?;
                if let Some((font_path, meta_path)) = cache_paths(&family_key)
                    && !font_path.exists()
                {
                    if let Some(parent) = font_path.parent() {
                        let _ = fs::create_dir_all(parent);
                    }
                    let _ = fs::write(&font_path, &face.data);
                    let _ = fs::write(&meta_path, index.to_string());
                }
                Some(face)
            })
            .flatten()
    }
}

struct FontFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: u16,
    ascii_advances: [u16; 128],
    advance_cache: HashMap<char, Option<u16>>,
}

impl FontFace {
    fn new(data: Vec<u8>, index: u32) -> Option<Self> {
        let face = Face::parse(&data, index).ok()?;
        let units_per_em = face.units_per_em().max(1);
        let mut ascii_advances = [0u16; 128];
        for byte in 0u8..=127 {
            if let Some(glyph_id) = face.glyph_index(byte as char) {
                ascii_advances[byte as usize] = face.glyph_hor_advance(glyph_id).unwrap_or(0);
            }
        }
        drop(face);
        Some(Self {
            data,
            index,
            units_per_em,
            ascii_advances,
            advance_cache: HashMap::new(),
        })
    }

    fn measure_width(&mut self, text: &str, font_size: f32) -> Option<f32> {
        let scale = font_size / self.units_per_em as f32;
        let fallback = font_size * FALLBACK_ADVANCE;

        if text.is_ascii() {
            let width: f32 = text
                .bytes()
                .filter(|byte| *byte != b'\n')
                .map(|byte| match self.ascii_advances[byte as usize] {
                    0 => fallback,
                    advance => advance as f32 * scale,
                })
                .sum();
            return Some(width.max(0.0));
        }

        let mut width = 0.0f32;
        let mut pending: Vec<char> = Vec::new();
        for ch in text.chars().filter(|ch| *ch != '\n') {
            match self.advance_cache.get(&ch) {
                Some(Some(advance)) => width += *advance as f32 * scale,
                Some(None) => width += fallback,
                None => pending.push(ch),
            }
        }
        if !pending.is_empty() {
            let face = Face::parse(&self.data, self.index).ok()?;
            for ch in pending {
                let advance = face.glyph_index(ch).and_then(|id| face.glyph_hor_advance(id));
                self.advance_cache.insert(ch, advance);
                width += advance.map_or(fallback, |advance| advance as f32 * scale);
            }
        }
        Some(width.max(0.0))
    }

    fn outline(&self, text: &str, font_size: f32, origin: (f32, f32)) -> Option<String> {
        let face = Face::parse(&self.data, self.index).ok()?;
        let scale = font_size / self.units_per_em as f32;
        let mut sink = PathDataBuilder {
            d: String::new(),
            scale,
            origin,
        };
        for ch in text.chars() {
            let glyph = face.glyph_index(ch);
            if let Some(glyph) = glyph {
                face.outline_glyph(glyph, &mut sink);
            }
            let advance = glyph
                .and_then(|id| face.glyph_hor_advance(id))
                .map_or(font_size * FALLBACK_ADVANCE, |advance| advance as f32 * scale);
            sink.origin.0 += advance;
        }
        (!sink.d.is_empty()).then_some(sink.d)
    }
}

/// Collects glyph outlines in font units, flipped and scaled into SVG path
/// data.
struct PathDataBuilder {
    d: String,
    scale: f32,
    origin: (f32, f32),
}

impl PathDataBuilder {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin.0 + x * self.scale, self.origin.1 - y * self.scale)
    }
}

impl OutlineBuilder for PathDataBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        let _ = write!(self.d, "M{x:.2} {y:.2}");
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        let _ = write!(self.d, "L{x:.2} {y:.2}");
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        let _ = write!(self.d, "Q{x1:.2} {y1:.2} {x:.2} {y:.2}");
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        let _ = write!(self.d, "C{x1:.2} {y1:.2} {x2:.2} {y2:.2} {x:.2} {y:.2}");
    }

    fn close(&mut self) {
        self.d.push('Z');
    }
}

fn normalize_family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}

fn cache_paths(family_key: &str) -> Option<(PathBuf, PathBuf)> {
    let base = std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))?;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    family_key.hash(&mut hasher);
    let hash = hasher.finish();
    let dir = base.join("mmdc-canvas").join("font-cache");
    Some((dir.join(format!("{hash:x}.font")), dir.join(format!("{hash:x}.meta"))))
}

fn load_cached_face(family_key: &str) -> Option<FontFace> {
    let (font_path, meta_path) = cache_paths(family_key)?;
    if !font_path.exists() || !meta_path.exists() {
        return None;
    }
    let bytes = fs::read(font_path).ok()?;
    let index: u32 = fs::read_to_string(meta_path).ok()?.trim().parse().ok()?;
    FontFace::new(bytes, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_ignores_line_breaks() {
        assert_eq!(estimate_width("ab\ncd", 10.0), 4.0 * 10.0 * FALLBACK_ADVANCE);
    }

    #[test]
    fn label_height_counts_lines() {
        let block = measure_label("one<br/>two", 16.0, "sans-serif");
        assert_eq!(block.lines, vec!["one", "two"]);
        assert_eq!(block.height, 2.0 * 16.0 * LINE_HEIGHT);
        assert!(block.width > 0.0);
    }

    #[test]
    fn empty_text_has_zero_width() {
        assert_eq!(measure_text_width("", 16.0, "sans-serif"), Some(0.0));
        assert!(text_outline_path("", 16.0, "sans-serif", (0.0, 0.0)).is_none());
    }

    #[test]
    fn outline_builder_flips_y() {
        let mut builder = PathDataBuilder {
            d: String::new(),
            scale: 0.5,
            origin: (10.0, 20.0),
        };
        builder.move_to(0.0, 0.0);
        builder.line_to(4.0, 8.0);
        builder.close();
        assert_eq!(builder.d, "M10.00 20.00L12.00 16.00Z");
    }
}
