//! Conversion of selected cells to other formats through `jupyter nbconvert`
//!
//! Rendering is left to nbconvert: the selected cells are written to a
//! temporary notebook which is then handed to the external program.

use crate::error::{NotebookError, Result};
use crate::notebook::Notebook;
use crate::selector::Selector;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Package named in `MissingDependency` errors
const NBCONVERT_PACKAGE: &str = "nbconvert";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Html,
    Markdown,
    Python,
    Slides,
}

impl ExportFormat {
    /// Value of nbconvert's `--to`
    pub fn nbconvert_name(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Markdown => "markdown",
            Self::Python => "python",
            Self::Slides => "slides",
        }
    }

    /// Exporter class receiving `--<Exporter>.<key>=<value>` options
    pub fn exporter_class(self) -> &'static str {
        match self {
            Self::Html => "HTMLExporter",
            Self::Markdown => "MarkdownExporter",
            Self::Python => "PythonExporter",
            Self::Slides => "SlidesExporter",
        }
    }

    /// Suffix nbconvert appends to the output base name
    pub fn extension(self) -> &'static str {
        match self {
            Self::Html => ".html",
            Self::Markdown => ".md",
            Self::Python => ".py",
            Self::Slides => ".slides.html",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.nbconvert_name())
    }
}

/// nbconvert options shared by every format, plus the slide settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub template_name: Option<String>,
    pub exclude_code_cell: bool,
    pub exclude_markdown: bool,
    pub exclude_raw: bool,
    pub exclude_unknown: bool,
    pub exclude_input: bool,
    pub exclude_output: bool,
    /// reveal.js theme (slides only)
    pub theme: Option<String>,
    /// reveal.js transition (slides only)
    pub transition: Option<String>,
    /// reveal.js scroll (slides only)
    pub scroll: Option<bool>,
    /// Extra exporter traits, passed as `--<Exporter>.<key>=<value>`
    pub kwargs: Vec<(String, String)>,
}

impl ExportOptions {
    fn to_args(&self, format: ExportFormat) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(template) = &self.template_name {
            args.push(format!("--template={template}"));
        }
        let flags = [
            (self.exclude_code_cell, "exclude_code_cell"),
            (self.exclude_markdown, "exclude_markdown"),
            (self.exclude_raw, "exclude_raw"),
            (self.exclude_unknown, "exclude_unknown"),
            (self.exclude_input, "exclude_input"),
            (self.exclude_output, "exclude_output"),
        ];
        let exporter = format.exporter_class();
        for (set, trait_name) in flags {
            if set {
                args.push(format!("--{exporter}.{trait_name}=True"));
            }
        }
        if format == ExportFormat::Slides {
            if let Some(theme) = &self.theme {
                args.push(format!("--SlidesExporter.reveal_theme={theme}"));
            }
            if let Some(transition) = &self.transition {
                args.push(format!("--SlidesExporter.reveal_transition={transition}"));
            }
            if let Some(scroll) = self.scroll {
                let value = if scroll { "True" } else { "False" };
                args.push(format!("--SlidesExporter.reveal_scroll={value}"));
            }
        }
        for (key, value) in &self.kwargs {
            args.push(format!("--{exporter}.{key}={value}"));
        }
        args
    }
}

/// Runs `<program> nbconvert` on a filtered copy of a notebook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NbconvertExporter {
    program: String,
}

impl Default for NbconvertExporter {
    fn default() -> Self {
        Self::new("jupyter")
    }
}

impl NbconvertExporter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Convert the selected cells and write the result to `output`.
    ///
    /// nbconvert decides the final extension; pass a path without it or
    /// with the one from [`ExportFormat::extension`].
    ///
    /// # Errors
    ///
    /// `MissingDependency` when the program or nbconvert is not installed,
    /// `ExportError` when the conversion fails.
    pub fn export(
        &self,
        notebook: &Notebook,
        selector: &Selector,
        format: ExportFormat,
        output: &Path,
        options: &ExportOptions,
    ) -> Result<PathBuf> {
        let mut selected = notebook.clone();
        selected.keep(selector);

        let temp_dir = tempfile::TempDir::new()?;
        let input = temp_dir.path().join("selection.ipynb");
        selected.write_ipynb(&input)?;

        let output_dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let base_name = output_base_name(output, format);

        tracing::info!(
            "Exporting {} cells to {} as {format}",
            selected.len(),
            output.display()
        );
        let result = Command::new(&self.program)
            .arg("nbconvert")
            .arg("--to")
            .arg(format.nbconvert_name())
            .arg("--output")
            .arg(&base_name)
            .arg("--output-dir")
            .arg(&output_dir)
            .args(options.to_args(format))
            .arg(&input)
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    NotebookError::MissingDependency {
                        package: NBCONVERT_PACKAGE.into(),
                    }
                } else {
                    NotebookError::IoError(e)
                }
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            if stderr.contains("not a Jupyter command") || stderr.contains("No module named") {
                return Err(NotebookError::MissingDependency {
                    package: NBCONVERT_PACKAGE.into(),
                });
            }
            return Err(NotebookError::ExportError(format!(
                "nbconvert exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }

        Ok(output_dir.join(format!("{base_name}{}", format.extension())))
    }
}

/// File name of `output` without the format's extension
fn output_base_name(output: &Path, format: ExportFormat) -> String {
    let file_name = output
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    file_name
        .strip_suffix(format.extension())
        .map(str::to_string)
        .unwrap_or(file_name)
}

/// `notebook.ipynb` becomes `notebook.html`, `notebook.slides.html` and so on
pub fn default_output_path(input: &Path, format: ExportFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "notebook".to_string());
    input.with_file_name(format!("{stem}{}", format.extension()))
}
