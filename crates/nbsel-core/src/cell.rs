use crate::notebook::Notebook;
use crate::output::Output;
use crate::render::{draw_box, BoxStyle, RenderOptions, RendererRegistry};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Type of notebook cell
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CellType {
    /// Executable code cell
    #[default]
    Code,
    /// Markdown documentation cell
    Markdown,
    /// Raw text cell (no formatting)
    Raw,
    /// Any other `cell_type` value, kept verbatim so it round-trips
    Unknown(String),
}

impl CellType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Code => "code",
            Self::Markdown => "markdown",
            Self::Raw => "raw",
            Self::Unknown(s) => s,
        }
    }
}

impl std::fmt::Display for CellType {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CellType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "code" => Ok(Self::Code),
            "markdown" | "md" => Ok(Self::Markdown),
            "raw" | "text" => Ok(Self::Raw),
            _ => Err(format!(
                "Unknown cell type '{s}'. Expected: code, markdown, raw"
            )),
        }
    }
}

impl From<String> for CellType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "code" => Self::Code,
            "markdown" => Self::Markdown,
            "raw" => Self::Raw,
            _ => Self::Unknown(s),
        }
    }
}

impl From<CellType> for String {
    fn from(cell_type: CellType) -> Self {
        match cell_type {
            CellType::Unknown(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

/// One cell record of a notebook.
///
/// Keys this crate does not interpret (`id`, `attachments`, ...) are kept in
/// `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub cell_type: CellType,
    #[serde(default, with = "multiline")]
    pub source: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<Output>>,
    #[serde(
        default,
        deserialize_with = "present_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub execution_count: Option<Option<i64>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Cell {
    /// New code cell with no outputs and a null execution count
    pub fn code(source: impl Into<String>) -> Self {
        Self {
            cell_type: CellType::Code,
            source: source.into(),
            outputs: Some(Vec::new()),
            execution_count: Some(None),
            ..Default::default()
        }
    }

    pub fn markdown(source: impl Into<String>) -> Self {
        Self {
            cell_type: CellType::Markdown,
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn raw(source: impl Into<String>) -> Self {
        Self {
            cell_type: CellType::Raw,
            source: source.into(),
            ..Default::default()
        }
    }

    /// Builder helper for tests and programmatic notebooks
    #[must_use]
    pub fn with_outputs(mut self, outputs: Vec<Output>) -> Self {
        self.outputs = Some(outputs);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Outputs of a code cell; empty for every other cell type
    pub fn outputs(&self) -> &[Output] {
        self.outputs.as_deref().unwrap_or(&[])
    }

    pub fn execution_count(&self) -> Option<i64> {
        self.execution_count.flatten()
    }

    /// Source split into lines, each keeping its trailing newline
    pub fn source_lines(&self) -> Vec<&str> {
        split_lines(&self.source)
    }

    /// Replace the source with the given lines (concatenated as-is)
    pub fn set_source<S: AsRef<str>>(&mut self, lines: &[S]) {
        self.source = lines.iter().map(AsRef::as_ref).collect();
    }

    /// `metadata.slideshow.slide_type`, if any
    pub fn slide_type(&self) -> Option<&str> {
        self.metadata
            .get("slideshow")
            .and_then(|s| s.get("slide_type"))
            .and_then(Value::as_str)
    }

    pub fn set_slide_type(&mut self, slide_type: &str) {
        match self.metadata.get_mut("slideshow") {
            Some(Value::Object(slideshow)) => {
                slideshow.insert("slide_type".into(), Value::from(slide_type));
            }
            _ => {
                let mut slideshow = Map::new();
                slideshow.insert("slide_type".into(), Value::from(slide_type));
                self.metadata
                    .insert("slideshow".into(), Value::Object(slideshow));
            }
        }
    }

    /// Entries of `metadata.tags`
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.metadata
            .get("tags")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
    }

    /// Source text followed by the rendered outputs, used for text search
    pub fn searchable_text(&self, include_outputs: bool) -> String {
        if !include_outputs || self.outputs().is_empty() {
            return self.source.clone();
        }
        let renderers = RendererRegistry::default();
        let options = RenderOptions::default();
        let mut text = self.source.clone();
        for output in self.outputs() {
            text.push('\n');
            text.push_str(&output.to_str(&renderers, &options));
        }
        text
    }

    /// Human readable rendering: header line, boxed source, then outputs
    pub fn to_str(
        &self,
        index: usize,
        style: BoxStyle,
        width: Option<usize>,
        renderers: &RendererRegistry,
        options: &RenderOptions,
    ) -> String {
        let header = match self.execution_count() {
            Some(count) => format!("[{index}] {} (In [{count}])", self.cell_type),
            None => format!("[{index}] {}", self.cell_type),
        };
        let mut rendered = vec![header, draw_box(&self.source, style, width)];
        rendered.extend(
            self.outputs()
                .iter()
                .map(|output| output.to_str(renderers, options))
                .filter(|text| !text.is_empty()),
        );
        rendered.join("\n")
    }
}

/// Position-bound, read-only view of one cell.
///
/// The view stores the index, not the cell, and resolves the cell against the
/// notebook on every access.
#[derive(Debug, Clone, Copy)]
pub struct CellView<'a> {
    notebook: &'a Notebook,
    index: usize,
}

impl<'a> CellView<'a> {
    pub(crate) fn new(notebook: &'a Notebook, index: usize) -> Self {
        Self { notebook, index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn notebook(&self) -> &'a Notebook {
        self.notebook
    }

    pub fn cell(&self) -> &'a Cell {
        &self.notebook.cells[self.index]
    }

    pub fn cell_type(&self) -> &'a CellType {
        &self.cell().cell_type
    }

    pub fn source(&self) -> &'a str {
        &self.cell().source
    }

    pub fn metadata(&self) -> &'a Map<String, Value> {
        &self.cell().metadata
    }

    pub fn outputs(&self) -> &'a [Output] {
        self.cell().outputs()
    }

    pub fn previous(&self) -> Option<CellView<'a>> {
        self.index
            .checked_sub(1)
            .map(|index| CellView::new(self.notebook, index))
    }

    pub fn next(&self) -> Option<CellView<'a>> {
        let index = self.index + 1;
        (index < self.notebook.len()).then(|| CellView::new(self.notebook, index))
    }
}

/// Split text into lines, keeping the `\n` terminators (nbformat convention)
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// Distinguishes an absent key (`None`) from an explicit `null` (`Some(None)`)
fn present_option<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// nbformat multiline strings: read a string or a list of strings, write a list of lines
pub(crate) mod multiline {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        One(String),
        Many(Vec<String>),
    }

    pub fn serialize<S: Serializer>(text: &str, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(super::split_lines(text))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Repr::deserialize(deserializer)? {
            Repr::One(text) => text,
            Repr::Many(lines) => lines.concat(),
        })
    }
}
