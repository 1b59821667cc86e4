use crate::cell::{Cell, CellView};
use crate::error::{NotebookError, Result};
use crate::render::{BoxStyle, RenderOptions, RendererRegistry};
use crate::selector::Selector;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

const DEFAULT_NBFORMAT: u32 = 4;
const DEFAULT_NBFORMAT_MINOR: u32 = 5;

/// An in-memory Jupyter notebook document.
///
/// The cell sequence is the only source of ordering: a cell's position is its
/// index in `cells`. Every edit in this crate goes through a [`Selector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    #[serde(default)]
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default = "default_nbformat")]
    pub nbformat: u32,
    #[serde(default = "default_nbformat_minor")]
    pub nbformat_minor: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// File stem the notebook was read from
    #[serde(skip)]
    pub name: Option<String>,
}

fn default_nbformat() -> u32 {
    DEFAULT_NBFORMAT
}

fn default_nbformat_minor() -> u32 {
    DEFAULT_NBFORMAT_MINOR
}

impl Default for Notebook {
    fn default() -> Self {
        Self::from_cells(Vec::new())
    }
}

impl std::str::FromStr for Notebook {
    type Err = NotebookError;

    fn from_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        if !value.is_object() {
            return Err(NotebookError::InvalidFormat(
                "notebook root must be a JSON object".into(),
            ));
        }
        Ok(serde_json::from_value(value)?)
    }
}

impl Notebook {
    /// Notebook with the given cells and empty metadata (nbformat 4.5)
    pub fn from_cells(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            metadata: Map::new(),
            nbformat: DEFAULT_NBFORMAT,
            nbformat_minor: DEFAULT_NBFORMAT_MINOR,
            extra: Map::new(),
            name: None,
        }
    }

    /// Read a notebook file; the file stem becomes the notebook name
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a notebook.
    pub fn read_ipynb<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut notebook: Self = content.parse()?;
        notebook.name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
        tracing::info!(
            "Read notebook {} ({} cells)",
            path.display(),
            notebook.len()
        );
        Ok(notebook)
    }

    /// Write the notebook as indented JSON
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_ipynb<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut content = self.to_json()?;
        content.push('\n');
        fs::write(path, content)?;
        tracing::info!("Wrote notebook {} ({} cells)", path.display(), self.len());
        Ok(())
    }

    /// Serialize to the standard notebook JSON document
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// View of the cell at `index`, if it exists
    pub fn cell(&self, index: usize) -> Option<CellView<'_>> {
        (index < self.len()).then(|| CellView::new(self, index))
    }

    pub fn cell_mut(&mut self, index: usize) -> Option<&mut Cell> {
        self.cells.get_mut(index)
    }

    /// New notebook with the cells of `self` followed by those of `other`.
    /// Metadata comes from `self`.
    #[must_use]
    pub fn concat(&self, other: &Notebook) -> Notebook {
        let mut combined = self.clone();
        combined.cells.extend(other.cells.iter().cloned());
        combined
    }

    /// Views of the selected cells, in index order
    pub fn iter_cells<'a>(&'a self, selector: &'a Selector) -> impl Iterator<Item = CellView<'a>> {
        selector.iter_matching(self, false)
    }

    /// Views of the cells the selector rejects, in index order
    pub fn iter_neg_cells<'a>(
        &'a self,
        selector: &'a Selector,
    ) -> impl Iterator<Item = CellView<'a>> {
        selector.iter_matching(self, true)
    }

    /// Render the selected cells for display
    pub fn to_str(&self, selector: &Selector, display: &DisplayOptions) -> String {
        self.iter_cells(selector)
            .map(|view| {
                view.cell().to_str(
                    view.index(),
                    display.style,
                    display.width,
                    &display.renderers,
                    &display.render,
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Settings for [`Notebook::to_str`]
#[derive(Debug, Clone, Default)]
pub struct DisplayOptions {
    pub style: BoxStyle,
    pub width: Option<usize>,
    pub renderers: RendererRegistry,
    pub render: RenderOptions,
}
