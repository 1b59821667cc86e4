//! # nbsel-core
//!
//! Select, filter and edit the cells of Jupyter notebooks (nbformat 4.x).
//!
//! This crate provides:
//! - A lossless notebook model (unknown keys and cell types round-trip)
//! - Composable cell selectors (`&`, `|`, `!`) built from named predicates
//! - A byte encoding of selectors so shell pipelines can build them in stages
//! - Selector-scoped edits: tag, erase, delete, keep, replace, auto-slide
//! - Text rendering of cells and outputs, and export through nbconvert
//!
//! ## Example
//!
//! ```no_run
//! use nbsel_core::{ContainsQuery, Notebook, Selector};
//!
//! let mut notebook = Notebook::read_ipynb("example.ipynb")?;
//! let scratch = Selector::is_code() & Selector::contains(ContainsQuery::new("TODO"))?;
//! notebook.delete(&scratch);
//! notebook.write_ipynb("example.ipynb")?;
//! # Ok::<(), nbsel_core::NotebookError>(())
//! ```

/// Cell records and positional cell views
pub mod cell;
/// Error types
pub mod error;
/// Conversion through `jupyter nbconvert`
pub mod export;
/// Notebook document
pub mod notebook;
pub mod ops;
/// Cell outputs and their MIME types
pub mod output;
pub mod render;
pub mod selection;
pub mod selector;
pub mod slides;

pub use cell::{Cell, CellType, CellView};
pub use error::{NotebookError, Result};
pub use export::{default_output_path, ExportFormat, ExportOptions, NbconvertExporter};
pub use notebook::{DisplayOptions, Notebook};
pub use ops::Replacement;
pub use output::Output;
pub use render::{BoxStyle, RenderOptions, RendererRegistry};
pub use selection::Selection;
pub use selector::{
    registry, ContainsQuery, Predicate, Selector, SelectorArgs, SelectorRegistry,
};
pub use slides::{AutoSlideOptions, SLIDE_TYPES};
