//! Seal definitions, the seal catalog, and the seal renderer
//!
//! [`render_seal`] is pure: it turns a [`SealDefinition`] into drawing
//! operations in a square `size × size` box with the origin at the lower
//! left. The stamp engine wraps the result in Form XObjects.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, Stream, StringFormat};
use serde::{Deserialize, Serialize};

use crate::error::SealJoinError;

/// Bézier control distance for a quarter circle of radius 1
const KAPPA: f64 = 0.552_284_749_8;

/// Average Helvetica-Bold advance width in text space units per em
const AVG_GLYPH_WIDTH: f64 = 0.6;

/// Advance of Latin glyphs in the Adobe-GB1 half-width range
const CJK_HALF_WIDTH: f64 = 0.5;

const MIN_LABEL_FONT_SIZE: f64 = 4.0;

const LABEL_FONT: &[u8] = b"SealLabel";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealId(pub u64);

impl fmt::Display for SealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SealId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SealShape {
    Circular,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SealSize {
    Small,
    Medium,
    Large,
}

impl SealSize {
    /// Edge length of the seal's square footprint in points
    pub fn footprint(self) -> f64 {
        match self {
            SealSize::Small => 36.0,
            SealSize::Medium => 48.0,
            SealSize::Large => 60.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SealStatus {
    #[default]
    Active,
    Inactive,
}

fn default_stroke_width() -> f64 {
    2.0
}

fn default_label_font_size() -> f64 {
    12.0
}

fn default_size() -> SealSize {
    SealSize::Medium
}

/// A seal as stored in the catalog.
///
/// Deserialization also accepts the field names used by the seal management
/// front end (`name`, `type`, `borderWidth`, `fontSize`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealDefinition {
    pub id: SealId,
    #[serde(alias = "name")]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "type")]
    pub shape: SealShape,
    pub color: String,
    #[serde(default = "default_stroke_width", alias = "borderWidth")]
    pub stroke_width: f64,
    #[serde(default = "default_label_font_size", alias = "fontSize")]
    pub label_font_size: f64,
    #[serde(default = "default_size")]
    pub size: SealSize,
    #[serde(default)]
    pub status: SealStatus,
}

impl SealDefinition {
    pub fn is_active(&self) -> bool {
        self.status == SealStatus::Active
    }

    pub fn footprint(&self) -> f64 {
        self.size.footprint()
    }
}

/// Read access to seal definitions
pub trait SealCatalog: Send + Sync {
    fn get(&self, id: SealId) -> Result<SealDefinition, SealJoinError>;

    fn list(&self) -> Vec<SealDefinition>;
}

/// Immutable in-memory catalog
#[derive(Debug, Clone, Default)]
pub struct MemorySealCatalog {
    seals: BTreeMap<SealId, SealDefinition>,
}

impl MemorySealCatalog {
    pub fn new(seals: impl IntoIterator<Item = SealDefinition>) -> Self {
        Self {
            seals: seals.into_iter().map(|seal| (seal.id, seal)).collect(),
        }
    }

    /// The three sample seals the application ships with
    pub fn builtin() -> Self {
        Self::new([
            SealDefinition {
                id: SealId(1),
                label: "示例科技有限公司".to_string(),
                description: "公司公章，用于正式文件签署".to_string(),
                shape: SealShape::Circular,
                color: "#dc2626".to_string(),
                stroke_width: 3.0,
                label_font_size: 16.0,
                size: SealSize::Large,
                status: SealStatus::Active,
            },
            SealDefinition {
                id: SealId(2),
                label: "上海集采汇".to_string(),
                description: "合作方印章".to_string(),
                shape: SealShape::Square,
                color: "#2563eb".to_string(),
                stroke_width: 2.0,
                label_font_size: 14.0,
                size: SealSize::Medium,
                status: SealStatus::Active,
            },
            SealDefinition {
                id: SealId(3),
                label: "财务专用章".to_string(),
                description: "财务部门专用印章".to_string(),
                shape: SealShape::Circular,
                color: "#059669".to_string(),
                stroke_width: 2.0,
                label_font_size: 12.0,
                size: SealSize::Medium,
                status: SealStatus::Inactive,
            },
        ])
    }

    /// Parse a JSON array of seal definitions
    pub fn from_json(json: &str) -> Result<Self, SealJoinError> {
        let seals: Vec<SealDefinition> =
            serde_json::from_str(json).map_err(|e| SealJoinError::Catalog(e.to_string()))?;
        for seal in &seals {
            if parse_hex_color(&seal.color).is_none() {
                return Err(SealJoinError::Catalog(format!(
                    "seal {} has invalid color {:?}",
                    seal.id, seal.color
                )));
            }
        }
        Ok(Self::new(seals))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SealJoinError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| SealJoinError::Catalog(format!("{}: {}", path.display(), e)))?;
        let catalog = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), seals = catalog.seals.len(), "loaded seal catalog");
        Ok(catalog)
    }
}

impl SealCatalog for MemorySealCatalog {
    fn get(&self, id: SealId) -> Result<SealDefinition, SealJoinError> {
        self.seals
            .get(&id)
            .cloned()
            .ok_or(SealJoinError::UnknownSeal(id))
    }

    fn list(&self) -> Vec<SealDefinition> {
        self.seals.values().cloned().collect()
    }
}

/// Parse `#RRGGBB` into RGB components in `0.0..=1.0`
pub fn parse_hex_color(color: &str) -> Option<[f32; 3]> {
    let hex = color.strip_prefix('#').unwrap_or(color);
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .ok()
            .map(|v| v as f32 / 255.0)
    };
    Some([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}

/// Font a seal label is set in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelFont {
    /// Helvetica-Bold, WinAnsi encoded
    Latin,
    /// Predefined STSong-Light (Adobe-GB1), UCS-2 encoded
    Cjk,
}

impl LabelFont {
    /// Latin when every character has a WinAnsi glyph
    pub fn for_label(label: &str) -> Self {
        if label.chars().all(is_winansi) {
            LabelFont::Latin
        } else {
            LabelFont::Cjk
        }
    }

    /// Text as it will be drawn; characters outside the BMP become `?`
    fn drawable(self, label: &str) -> String {
        match self {
            LabelFont::Latin => label.to_string(),
            LabelFont::Cjk => label
                .chars()
                .map(|c| if c.len_utf16() == 1 { c } else { '?' })
                .collect(),
        }
    }

    /// Advance width of `line` in ems
    fn width_em(self, line: &str) -> f64 {
        match self {
            LabelFont::Latin => line.chars().count() as f64 * AVG_GLYPH_WIDTH,
            LabelFont::Cjk => line
                .chars()
                .map(|c| if c.is_ascii() { CJK_HALF_WIDTH } else { 1.0 })
                .sum(),
        }
    }

    fn show_text_operand(self, line: &str) -> Object {
        match self {
            LabelFont::Latin => Object::string_literal(winansi_bytes(line)),
            LabelFont::Cjk => {
                let bytes = line.encode_utf16().flat_map(u16::to_be_bytes).collect();
                Object::String(bytes, StringFormat::Hexadecimal)
            }
        }
    }

    fn resource(self) -> Dictionary {
        match self {
            LabelFont::Latin => dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica-Bold",
                "Encoding" => "WinAnsiEncoding",
            },
            LabelFont::Cjk => {
                let descriptor = dictionary! {
                    "Type" => "FontDescriptor",
                    "FontName" => "STSong-Light",
                    "Flags" => 6,
                    "FontBBox" => vec![(-25).into(), (-254).into(), 1000.into(), 880.into()],
                    "ItalicAngle" => 0,
                    "Ascent" => 880,
                    "Descent" => -120,
                    "CapHeight" => 880,
                    "StemV" => 93,
                };
                let descendant = dictionary! {
                    "Type" => "Font",
                    "Subtype" => "CIDFontType0",
                    "BaseFont" => "STSong-Light",
                    "CIDSystemInfo" => dictionary! {
                        "Registry" => Object::string_literal("Adobe"),
                        "Ordering" => Object::string_literal("GB1"),
                        "Supplement" => 2,
                    },
                    "FontDescriptor" => descriptor,
                    "DW" => 1000,
                    "W" => vec![1.into(), 95.into(), 500.into()],
                };
                dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type0",
                    "BaseFont" => "STSong-Light-UniGB-UCS2-H",
                    "Encoding" => "UniGB-UCS2-H",
                    "DescendantFonts" => vec![Object::Dictionary(descendant)],
                }
            }
        }
    }
}

/// Drawing instructions for one seal, independent of any document
#[derive(Debug, Clone)]
pub struct SealAppearance {
    /// Edge length of the square drawing box
    pub size: f64,
    /// Label lines as actually drawn
    pub label_lines: Vec<String>,
    pub label_font: LabelFont,
    pub label_font_size: f64,
    pub content: Content,
}

impl SealAppearance {
    /// Wrap the drawing in a Form XObject clipped to `bbox`
    pub(crate) fn to_form_xobject(&self, bbox: [f64; 4]) -> Result<Stream, SealJoinError> {
        let content_bytes = self
            .content
            .encode()
            .map_err(|e| SealJoinError::OperationError(e.to_string()))?;

        let mut fonts = Dictionary::new();
        fonts.set(LABEL_FONT, Object::Dictionary(self.label_font.resource()));

        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));

        let mut stream_dict = Dictionary::new();
        stream_dict.set("Type", Object::Name(b"XObject".to_vec()));
        stream_dict.set("Subtype", Object::Name(b"Form".to_vec()));
        stream_dict.set("FormType", Object::Integer(1));
        stream_dict.set(
            "BBox",
            Object::Array(bbox.iter().map(|v| Object::Real(*v as f32)).collect()),
        );
        stream_dict.set("Resources", Object::Dictionary(resources));

        Ok(Stream::new(stream_dict, content_bytes))
    }
}

/// Render a seal into drawing operations
pub fn render_seal(seal: &SealDefinition) -> SealAppearance {
    let size = seal.footprint();
    let color = parse_hex_color(&seal.color).unwrap_or([0.0, 0.0, 0.0]);
    // Keep at least a visible hairline and never eat more than a sixth of the seal
    let stroke = seal.stroke_width.clamp(0.25, size / 6.0);

    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new("RG", rgb_operands(color)),
        Operation::new("rg", rgb_operands(color)),
    ];

    let font = LabelFont::for_label(&seal.label);
    let (label_lines, font_size) = match seal.shape {
        SealShape::Circular => draw_circular(&mut ops, seal, font, size, stroke),
        SealShape::Square => draw_square(&mut ops, seal, font, size, stroke),
    };

    ops.push(Operation::new("Q", vec![]));

    SealAppearance {
        size,
        label_lines,
        label_font: font,
        label_font_size: font_size,
        content: Content { operations: ops },
    }
}

fn draw_circular(
    ops: &mut Vec<Operation>,
    seal: &SealDefinition,
    font: LabelFont,
    size: f64,
    stroke: f64,
) -> (Vec<String>, f64) {
    let c = size / 2.0;
    let outer = c - stroke / 2.0;
    let inner = (outer - stroke - 1.5).max(1.0);

    ops.push(Operation::new("w", vec![real(stroke)]));
    push_circle(ops, c, c, outer);
    ops.push(Operation::new("S", vec![]));

    ops.push(Operation::new("w", vec![real(0.5)]));
    push_circle(ops, c, c, inner);
    ops.push(Operation::new("S", vec![]));

    push_star(ops, c, c + size * 0.08, size * 0.16);
    ops.push(Operation::new("f", vec![]));

    // The label sits on a chord below the star
    let baseline = c - size * 0.28;
    let half_chord = (inner * inner - (c - baseline).powi(2)).max(0.0).sqrt();
    let line = font.drawable(&seal.label);
    let font_size = fit_font_size(font, &line, seal.label_font_size, half_chord * 2.0 * 0.9);
    push_text_line(ops, font, &line, font_size, c, baseline);

    (vec![line], font_size)
}

fn draw_square(
    ops: &mut Vec<Operation>,
    seal: &SealDefinition,
    font: LabelFont,
    size: f64,
    stroke: f64,
) -> (Vec<String>, f64) {
    let outer_inset = stroke / 2.0;
    let inner_inset = stroke + 1.5;

    ops.push(Operation::new("w", vec![real(stroke)]));
    ops.push(Operation::new(
        "re",
        vec![
            real(outer_inset),
            real(outer_inset),
            real(size - 2.0 * outer_inset),
            real(size - 2.0 * outer_inset),
        ],
    ));
    ops.push(Operation::new("S", vec![]));

    ops.push(Operation::new("w", vec![real(0.5)]));
    ops.push(Operation::new(
        "re",
        vec![
            real(inner_inset),
            real(inner_inset),
            real(size - 2.0 * inner_inset),
            real(size - 2.0 * inner_inset),
        ],
    ));
    ops.push(Operation::new("S", vec![]));

    let available = (size - 2.0 * inner_inset - 2.0).max(1.0);
    let label = font.drawable(&seal.label);
    let single = fit_font_size(font, &label, seal.label_font_size, available);

    let lines = if single < seal.label_font_size && label.chars().count() > 1 {
        split_in_two(&label)
    } else {
        vec![label]
    };

    let font_size = lines
        .iter()
        .map(|line| fit_font_size(font, line, seal.label_font_size, available))
        .fold(seal.label_font_size.max(MIN_LABEL_FONT_SIZE), f64::min)
        // Two lines must also fit vertically
        .min(available / (lines.len() as f64 * 1.2));

    let c = size / 2.0;
    let leading = font_size * 1.2;
    let first_baseline = c + (lines.len() as f64 - 1.0) * leading / 2.0 - font_size * 0.35;
    for (i, line) in lines.iter().enumerate() {
        let baseline = first_baseline - i as f64 * leading;
        push_text_line(ops, font, line, font_size, c, baseline);
    }

    (lines, font_size)
}

fn split_in_two(label: &str) -> Vec<String> {
    let chars: Vec<char> = label.chars().collect();
    let mid = chars.len().div_ceil(2);
    // Prefer breaking at a space near the middle
    let split = chars
        .iter()
        .enumerate()
        .filter(|(_, c)| **c == ' ')
        .map(|(i, _)| i)
        .min_by_key(|i| i.abs_diff(mid))
        .unwrap_or(mid);
    let (first, second) = chars.split_at(split);
    vec![
        first.iter().collect::<String>().trim().to_string(),
        second.iter().collect::<String>().trim().to_string(),
    ]
}

fn push_text_line(
    ops: &mut Vec<Operation>,
    font: LabelFont,
    line: &str,
    font_size: f64,
    center_x: f64,
    baseline: f64,
) {
    if line.is_empty() {
        return;
    }
    let width = font.width_em(line) * font_size;
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec![Object::Name(LABEL_FONT.to_vec()), real(font_size)],
    ));
    ops.push(Operation::new(
        "Td",
        vec![real(center_x - width / 2.0), real(baseline)],
    ));
    ops.push(Operation::new("Tj", vec![font.show_text_operand(line)]));
    ops.push(Operation::new("ET", vec![]));
}

fn push_circle(ops: &mut Vec<Operation>, cx: f64, cy: f64, r: f64) {
    let k = r * KAPPA;
    ops.push(Operation::new("m", vec![real(cx + r), real(cy)]));
    let quarters = [
        [cx + r, cy + k, cx + k, cy + r, cx, cy + r],
        [cx - k, cy + r, cx - r, cy + k, cx - r, cy],
        [cx - r, cy - k, cx - k, cy - r, cx, cy - r],
        [cx + k, cy - r, cx + r, cy - k, cx + r, cy],
    ];
    for q in quarters {
        ops.push(Operation::new("c", q.iter().map(|v| real(*v)).collect()));
    }
    ops.push(Operation::new("h", vec![]));
}

/// Five-pointed star, first point straight up
fn push_star(ops: &mut Vec<Operation>, cx: f64, cy: f64, outer: f64) {
    let inner = outer * 0.382;
    for i in 0..10 {
        let radius = if i % 2 == 0 { outer } else { inner };
        let angle = PI / 2.0 + i as f64 * PI / 5.0;
        let (x, y) = (cx + radius * angle.cos(), cy + radius * angle.sin());
        let op = if i == 0 { "m" } else { "l" };
        ops.push(Operation::new(op, vec![real(x), real(y)]));
    }
    ops.push(Operation::new("h", vec![]));
}

fn fit_font_size(font: LabelFont, line: &str, preferred: f64, available_width: f64) -> f64 {
    let width_em = font.width_em(line).max(AVG_GLYPH_WIDTH);
    let fitting = available_width / width_em;
    preferred.min(fitting).max(MIN_LABEL_FONT_SIZE)
}

fn is_winansi(c: char) -> bool {
    matches!(c as u32, 0x20..=0x7E | 0xA0..=0xFF)
}

/// Latin-1 bytes of text made only of [`is_winansi`] characters
fn winansi_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(c as u32).unwrap_or(b'?'))
        .collect()
}

/// Encode text as a PDF text string (UTF-16BE with BOM)
pub(crate) fn utf16_text_string(text: &str) -> Object {
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, lopdf::StringFormat::Hexadecimal)
}

fn rgb_operands(color: [f32; 3]) -> Vec<Object> {
    color.iter().map(|c| Object::Real(*c)).collect()
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn operators(appearance: &SealAppearance) -> Vec<&str> {
        appearance
            .content
            .operations
            .iter()
            .map(|op| op.operator.as_str())
            .collect()
    }

    fn seal(shape: SealShape, label: &str) -> SealDefinition {
        SealDefinition {
            id: SealId(9),
            label: label.to_string(),
            description: String::new(),
            shape,
            color: "#dc2626".to_string(),
            stroke_width: 2.0,
            label_font_size: 14.0,
            size: SealSize::Medium,
            status: SealStatus::Active,
        }
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#ff0000"), Some([1.0, 0.0, 0.0]));
        assert_eq!(parse_hex_color("00ff00"), Some([0.0, 1.0, 0.0]));
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("#zzzzzz"), None);
        assert_eq!(parse_hex_color("#ééé"), None);
    }

    #[test]
    fn test_footprints() {
        assert_eq!(SealSize::Small.footprint(), 36.0);
        assert_eq!(SealSize::Medium.footprint(), 48.0);
        assert_eq!(SealSize::Large.footprint(), 60.0);
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = MemorySealCatalog::builtin();
        assert_eq!(catalog.list().len(), 3);
        assert!(catalog.get(SealId(1)).unwrap().is_active());
        assert!(!catalog.get(SealId(3)).unwrap().is_active());
        assert!(matches!(
            catalog.get(SealId(42)),
            Err(SealJoinError::UnknownSeal(SealId(42)))
        ));
    }

    #[test]
    fn test_catalog_accepts_front_end_field_names() {
        let json = r##"[{
            "id": 1737000000000,
            "name": "Acme Corp",
            "type": "square",
            "color": "#2563eb",
            "size": "small",
            "borderWidth": 3,
            "fontSize": 10,
            "status": "inactive",
            "usageCount": 8
        }]"##;
        let catalog = MemorySealCatalog::from_json(json).unwrap();
        let seal = catalog.get(SealId(1_737_000_000_000)).unwrap();
        assert_eq!(seal.label, "Acme Corp");
        assert_eq!(seal.shape, SealShape::Square);
        assert_eq!(seal.stroke_width, 3.0);
        assert_eq!(seal.label_font_size, 10.0);
        assert_eq!(seal.status, SealStatus::Inactive);
    }

    #[test]
    fn test_catalog_rejects_bad_color() {
        let json = r#"[{"id": 1, "label": "X", "shape": "circular", "color": "red"}]"#;
        assert!(matches!(
            MemorySealCatalog::from_json(json),
            Err(SealJoinError::Catalog(_))
        ));
    }

    #[test]
    fn test_circular_seal_has_two_rings_and_star() {
        let appearance = render_seal(&seal(SealShape::Circular, "ACME"));
        let ops = operators(&appearance);
        assert_eq!(ops.iter().filter(|op| **op == "S").count(), 2);
        assert_eq!(ops.iter().filter(|op| **op == "f").count(), 1);
        assert_eq!(ops.iter().filter(|op| **op == "c").count(), 8);
        assert_eq!(appearance.label_lines, vec!["ACME".to_string()]);
        assert_eq!(appearance.size, 48.0);
    }

    #[test]
    fn test_square_seal_frames() {
        let appearance = render_seal(&seal(SealShape::Square, "OK"));
        let ops = operators(&appearance);
        assert_eq!(ops.iter().filter(|op| **op == "re").count(), 2);
        assert!(!ops.contains(&"c"));
    }

    #[test]
    fn test_long_square_label_wraps_to_two_lines() {
        let appearance = render_seal(&seal(SealShape::Square, "Shanghai Procurement Hub"));
        assert_eq!(appearance.label_lines.len(), 2);
        assert_eq!(
            appearance
                .content
                .operations
                .iter()
                .filter(|op| op.operator == "Tj")
                .count(),
            2
        );
    }

    #[test]
    fn test_label_shrinks_to_fit() {
        let appearance = render_seal(&seal(SealShape::Circular, "A VERY LONG COMPANY NAME LTD"));
        assert!(appearance.label_font_size < 14.0);
        assert!(appearance.label_font_size >= MIN_LABEL_FONT_SIZE);
    }

    #[test]
    fn test_chinese_label_uses_cjk_font() {
        let appearance = render_seal(&seal(SealShape::Circular, "财务章"));
        assert_eq!(appearance.label_font, LabelFont::Cjk);
        assert_eq!(appearance.label_lines, vec!["财务章".to_string()]);

        let tj = appearance
            .content
            .operations
            .iter()
            .find(|op| op.operator == "Tj")
            .unwrap();
        let Object::String(bytes, format) = &tj.operands[0] else {
            panic!("expected string operand");
        };
        assert_eq!(*format, StringFormat::Hexadecimal);
        assert_eq!(bytes, &vec![0x8D, 0x22, 0x52, 0xA1, 0x7A, 0xE0]);

        let stream = appearance.to_form_xobject([0.0, 0.0, 48.0, 48.0]).unwrap();
        let font = stream
            .dict
            .get(b"Resources")
            .and_then(Object::as_dict)
            .and_then(|r| r.get(b"Font"))
            .and_then(Object::as_dict)
            .and_then(|f| f.get(LABEL_FONT))
            .and_then(Object::as_dict)
            .unwrap();
        assert_eq!(font.get(b"Subtype").unwrap().as_name().unwrap(), b"Type0");
        assert_eq!(font.get(b"Encoding").unwrap().as_name().unwrap(), b"UniGB-UCS2-H");
        let descendant = font.get(b"DescendantFonts").unwrap().as_array().unwrap()[0]
            .as_dict()
            .unwrap();
        assert_eq!(
            descendant.get(b"Subtype").unwrap().as_name().unwrap(),
            b"CIDFontType0"
        );
        assert_eq!(
            descendant.get(b"BaseFont").unwrap().as_name().unwrap(),
            b"STSong-Light"
        );
        let system_info = descendant.get(b"CIDSystemInfo").unwrap().as_dict().unwrap();
        assert_eq!(system_info.get(b"Ordering").unwrap().as_str().unwrap(), b"GB1");
    }

    #[test]
    fn test_builtin_seals_keep_their_labels() {
        for def in MemorySealCatalog::builtin().list() {
            let appearance = render_seal(&def);
            assert_eq!(appearance.label_font, LabelFont::Cjk);
            assert_eq!(appearance.label_lines.concat(), def.label);
        }
    }

    #[test]
    fn test_latin_label_uses_helvetica() {
        let appearance = render_seal(&seal(SealShape::Square, "Café"));
        assert_eq!(appearance.label_font, LabelFont::Latin);
        let stream = appearance.to_form_xobject([0.0, 0.0, 48.0, 48.0]).unwrap();
        let fonts = stream
            .dict
            .get(b"Resources")
            .and_then(Object::as_dict)
            .and_then(|r| r.get(b"Font"))
            .and_then(Object::as_dict)
            .unwrap();
        let font = fonts.get(LABEL_FONT).and_then(Object::as_dict).unwrap();
        assert_eq!(font.get(b"BaseFont").unwrap().as_name().unwrap(), b"Helvetica-Bold");
    }

    #[test]
    fn test_cjk_label_outside_bmp_becomes_placeholder() {
        let appearance = render_seal(&seal(SealShape::Circular, "章𠀀"));
        assert_eq!(appearance.label_lines, vec!["章?".to_string()]);
    }

    #[test]
    fn test_render_is_deterministic() {
        let def = seal(SealShape::Circular, "Same");
        let a = render_seal(&def).content.encode().unwrap();
        let b = render_seal(&def).content.encode().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_utf16_text_string() {
        let Object::String(bytes, _) = utf16_text_string("章") else {
            panic!("expected string");
        };
        assert_eq!(bytes, vec![0xFE, 0xFF, 0x7A, 0xE0]);
    }

    #[test]
    fn test_form_xobject_carries_bbox() {
        let appearance = render_seal(&seal(SealShape::Circular, "X"));
        let stream = appearance.to_form_xobject([24.0, 0.0, 48.0, 48.0]).unwrap();
        let bbox = stream.dict.get(b"BBox").unwrap().as_array().unwrap();
        assert_eq!(bbox[0].as_float().unwrap(), 24.0);
        assert_eq!(stream.dict.get(b"Subtype").unwrap().as_name().unwrap(), b"Form");
    }
}
