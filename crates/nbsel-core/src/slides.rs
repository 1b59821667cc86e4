//! Slideshow metadata and the automatic slide layout heuristic
//!
//! The layout produced by [`Notebook::auto_slide`] is a heuristic, not an
//! optimal pagination.

use crate::error::{NotebookError, Result};
use crate::notebook::Notebook;
use crate::selector::Selector;
use serde_json::Value;

/// Values accepted for `metadata.slideshow.slide_type`
pub const SLIDE_TYPES: [&str; 6] = ["-", "skip", "slide", "subslide", "fragment", "notes"];

/// Slide types that do not take space on the current slide
const UNCOUNTED_SLIDE_TYPES: [&str; 3] = ["skip", "fragment", "notes"];

/// Settings for [`Notebook::auto_slide`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoSlideOptions {
    /// Counted cells allowed per slide; `None` for no limit
    pub max_cells: Option<usize>,
    /// Cells with image outputs allowed per slide; `None` for no limit
    pub max_images: Option<usize>,
    /// Delete blank cells first
    pub delete_empty: bool,
}

impl Default for AutoSlideOptions {
    fn default() -> Self {
        Self {
            max_cells: Some(3),
            max_images: Some(1),
            delete_empty: true,
        }
    }
}

impl Notebook {
    /// Set the notebook toolbar to the slideshow editor
    pub fn mark_slideshow(&mut self) {
        self.metadata
            .insert("celltoolbar".into(), Value::from("Slideshow"));
    }

    /// Set the slide type of the selected cells
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `slide_type` is not one of [`SLIDE_TYPES`].
    pub fn tag_slide(&mut self, selector: &Selector, slide_type: &str) -> Result<()> {
        if !SLIDE_TYPES.contains(&slide_type) {
            return Err(NotebookError::invalid_argument(
                "tag_slide",
                format!(
                    "unknown slide type '{slide_type}', expected one of {}",
                    SLIDE_TYPES.join(", ")
                ),
            ));
        }
        self.set_slide_type(selector, slide_type);
        Ok(())
    }

    pub fn set_slide(&mut self, selector: &Selector) {
        self.set_slide_type(selector, "slide");
    }

    pub fn set_subslide(&mut self, selector: &Selector) {
        self.set_slide_type(selector, "subslide");
    }

    pub fn set_skip(&mut self, selector: &Selector) {
        self.set_slide_type(selector, "skip");
    }

    pub fn set_fragment(&mut self, selector: &Selector) {
        self.set_slide_type(selector, "fragment");
    }

    pub fn set_notes(&mut self, selector: &Selector) {
        self.set_slide_type(selector, "notes");
    }

    fn set_slide_type(&mut self, selector: &Selector, slide_type: &str) {
        for index in selector.matching_indices(self, false) {
            self.cells[index].set_slide_type(slide_type);
        }
    }

    /// Lay the selected cells out as slides.
    ///
    /// 1. Optionally delete blank cells.
    /// 2. Markdown cells starting with a `#` heading open a new slide.
    /// 3. A cell right after a slide boundary is set back to `-`, walking
    ///    from the end so a run of headings collapses onto one slide.
    /// 4. [`Notebook::max_cells_per_slide`] splits crowded slides.
    pub fn auto_slide(&mut self, selector: &Selector, options: &AutoSlideOptions) {
        if options.delete_empty {
            self.delete(&(selector.clone() & Selector::is_empty()));
        }

        let headings = selector.clone()
            & Selector::is_markdown()
            & Selector::from_fn(|view| view.source().trim_start().starts_with('#'));
        self.set_slide(&headings);

        let selected = selector.matching_indices(self, false);
        for &index in selected.iter().rev() {
            if index > 0 && Selector::is_new_slide().evaluate(self, index - 1) {
                self.cells[index].set_slide_type("-");
            }
        }

        self.max_cells_per_slide(selector, options.max_cells, options.max_images);
        tracing::debug!(
            "Auto-slide laid out {} cells ({} slide boundaries)",
            self.count(selector),
            self.count(&(selector.clone() & Selector::is_new_slide()))
        );
    }

    /// Walk the selected cells in order, counting cells and images since the
    /// last boundary, and open a subslide whenever a count exceeds its limit.
    /// `skip`, `fragment` and `notes` cells are not counted.
    pub fn max_cells_per_slide(
        &mut self,
        selector: &Selector,
        max_cells: Option<usize>,
        max_images: Option<usize>,
    ) {
        let is_image = Selector::has_output_type(["image/png"]);
        let uncounted = Selector::has_slide_type(UNCOUNTED_SLIDE_TYPES);
        let new_slide = Selector::is_new_slide();

        let mut cells_count = 0usize;
        let mut img_count = 0usize;
        for index in selector.matching_indices(self, false) {
            let has_image = is_image.evaluate(self, index);
            if new_slide.evaluate(self, index) {
                cells_count = 1;
                img_count = 0;
            } else if !uncounted.evaluate(self, index) {
                cells_count += 1;
            }
            if has_image {
                img_count += 1;
            }

            let too_many_cells = max_cells.is_some_and(|max| cells_count > max);
            let too_many_images = max_images.is_some_and(|max| img_count > max);
            if too_many_cells || too_many_images {
                self.cells[index].set_slide_type("subslide");
                cells_count = 1;
                img_count = usize::from(has_image);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;

    fn slide_types(nb: &Notebook) -> Vec<Option<&str>> {
        nb.cells.iter().map(|c| c.slide_type()).collect()
    }

    #[test]
    fn test_tag_slide_validates_kind() {
        let mut nb = Notebook::from_cells(vec![Cell::code("a")]);
        assert!(nb.tag_slide(&Selector::all(), "fragment").is_ok());
        assert_eq!(nb.cells[0].slide_type(), Some("fragment"));
        assert!(matches!(
            nb.tag_slide(&Selector::all(), "chapter"),
            Err(NotebookError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_mark_slideshow() {
        let mut nb = Notebook::default();
        nb.mark_slideshow();
        assert_eq!(nb.metadata["celltoolbar"], "Slideshow");
    }

    #[test]
    fn test_max_cells_inserts_subslides() {
        let mut nb = Notebook::from_cells((0..7).map(|i| Cell::code(format!("x{i}"))).collect());
        nb.max_cells_per_slide(&Selector::all(), Some(3), None);
        assert_eq!(
            slide_types(&nb),
            vec![None, None, None, Some("subslide"), None, None, Some("subslide")]
        );
    }

    #[test]
    fn test_uncounted_cells_do_not_split() {
        let mut nb = Notebook::from_cells(vec![
            Cell::code("a"),
            Cell::code("b"),
            Cell::markdown("note"),
            Cell::code("c"),
        ]);
        nb.set_notes(&Selector::index(2));
        nb.max_cells_per_slide(&Selector::all(), Some(3), None);
        assert_eq!(slide_types(&nb), vec![None, None, Some("notes"), None]);
    }
}
