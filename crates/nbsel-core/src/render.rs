//! Text rendering of cells and outputs
//!
//! Data outputs are rendered through a [`RendererRegistry`] mapping a MIME
//! type to a rendering function. The registry starts with `text/plain`,
//! `text/html` and `image/png`; callers can register more.

use std::collections::{BTreeSet, HashMap};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Column width handed to the HTML converter
const HTML_TEXT_WIDTH: usize = 80;

/// Rendering function for one MIME type
pub type RenderFn = fn(&str) -> String;

#[derive(Clone, Copy)]
pub struct Renderer {
    pub render: RenderFn,
    /// Whether the renderer is used when the caller does not choose parsers
    pub enabled_by_default: bool,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("enabled_by_default", &self.enabled_by_default)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct RendererRegistry {
    renderers: HashMap<String, Renderer>,
}

impl Default for RendererRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("text/plain", render_text, true);
        registry.register("text/html", render_html, true);
        registry.register("image/png", render_image, true);
        registry
    }
}

impl RendererRegistry {
    /// Registry with no renderers at all
    pub fn empty() -> Self {
        Self {
            renderers: HashMap::new(),
        }
    }

    /// Add or replace the renderer for `mime_type`
    pub fn register(&mut self, mime_type: &str, render: RenderFn, enabled_by_default: bool) {
        self.renderers.insert(
            mime_type.to_string(),
            Renderer {
                render,
                enabled_by_default,
            },
        );
    }

    pub fn get(&self, mime_type: &str) -> Option<&Renderer> {
        self.renderers.get(mime_type)
    }

    pub fn default_enabled(&self) -> BTreeSet<String> {
        self.renderers
            .iter()
            .filter(|(_, renderer)| renderer.enabled_by_default)
            .map(|(mime, _)| mime.clone())
            .collect()
    }
}

/// Which renderers to apply and which MIME types to skip
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Enabled renderers; `None` means the registry defaults
    pub enabled: Option<BTreeSet<String>>,
    /// MIME types never shown
    pub excluded: BTreeSet<String>,
}

impl RenderOptions {
    pub(crate) fn enabled_parsers(&self, registry: &RendererRegistry) -> BTreeSet<String> {
        self.enabled
            .clone()
            .unwrap_or_else(|| registry.default_enabled())
    }
}

fn render_text(text: &str) -> String {
    text.to_string()
}

/// Convert markup to plain text; entities, lists and tables are kept readable
fn render_html(html: &str) -> String {
    html2text::from_read(html.as_bytes(), HTML_TEXT_WIDTH)
        .trim_end()
        .to_string()
}

/// Images are base64 payloads; show a placeholder with the decoded size
fn render_image(base64: &str) -> String {
    let encoded = base64.bytes().filter(|b| !b.is_ascii_whitespace()).count();
    let padding = base64.trim_end().bytes().rev().take_while(|b| *b == b'=').count();
    let decoded = (encoded / 4 * 3).saturating_sub(padding);
    format!("[image/png, {}]", format_bytes(decoded))
}

/// Format bytes as human-readable size (e.g., "1.5 KB")
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} bytes")
    }
}

/// Frame drawn around a cell's source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BoxStyle {
    #[default]
    Single,
    Double,
    Heavy,
    Ascii,
    /// No frame, source printed as-is
    None,
}

struct Frame {
    top_left: char,
    top_right: char,
    bottom_left: char,
    bottom_right: char,
    horizontal: char,
    vertical: char,
}

impl BoxStyle {
    fn frame(self) -> Option<Frame> {
        let chars = match self {
            Self::Single => ['┌', '┐', '└', '┘', '─', '│'],
            Self::Double => ['╔', '╗', '╚', '╝', '═', '║'],
            Self::Heavy => ['┏', '┓', '┗', '┛', '━', '┃'],
            Self::Ascii => ['+', '+', '+', '+', '-', '|'],
            Self::None => return None,
        };
        Some(Frame {
            top_left: chars[0],
            top_right: chars[1],
            bottom_left: chars[2],
            bottom_right: chars[3],
            horizontal: chars[4],
            vertical: chars[5],
        })
    }
}

impl std::fmt::Display for BoxStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Single => "single",
            Self::Double => "double",
            Self::Heavy => "heavy",
            Self::Ascii => "ascii",
            Self::None => "none",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for BoxStyle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "double" => Ok(Self::Double),
            "heavy" => Ok(Self::Heavy),
            "ascii" => Ok(Self::Ascii),
            "none" => Ok(Self::None),
            _ => Err(format!(
                "Unknown box style '{s}'. Expected: single, double, heavy, ascii, none"
            )),
        }
    }
}

/// Draw `text` inside a frame. With `width`, the frame is at most that many
/// columns wide and longer lines are wrapped.
pub fn draw_box(text: &str, style: BoxStyle, width: Option<usize>) -> String {
    let max_inner = width.map(|w| w.saturating_sub(4).max(1));
    let mut lines: Vec<String> = Vec::new();
    for line in text.lines() {
        lines.extend(wrap_line(line, max_inner));
    }
    if lines.is_empty() {
        lines.push(String::new());
    }

    let Some(frame) = style.frame() else {
        return lines.join("\n");
    };

    let inner = lines
        .iter()
        .map(|l| l.width())
        .max()
        .unwrap_or(0)
        .max(max_inner.unwrap_or(0));
    let rule: String = std::iter::repeat(frame.horizontal).take(inner + 2).collect();

    let mut out = Vec::with_capacity(lines.len() + 2);
    out.push(format!("{}{rule}{}", frame.top_left, frame.top_right));
    for line in &lines {
        let pad = inner.saturating_sub(line.width());
        out.push(format!(
            "{v} {line}{} {v}",
            " ".repeat(pad),
            v = frame.vertical
        ));
    }
    out.push(format!("{}{rule}{}", frame.bottom_left, frame.bottom_right));
    out.join("\n")
}

/// Split `line` into pieces of at most `max` display columns
fn wrap_line(line: &str, max: Option<usize>) -> Vec<String> {
    let line = line.replace('\t', "    ");
    let Some(max) = max else {
        return vec![line];
    };
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;
    for c in line.chars() {
        let w = c.width().unwrap_or(0);
        if current_width + w > max && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
            current_width = 0;
        }
        current.push(c);
        current_width += w;
    }
    pieces.push(current);
    pieces
}
