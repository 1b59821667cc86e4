//! A selector bound to the notebook it applies to

use crate::error::Result;
use crate::notebook::{DisplayOptions, Notebook};
use crate::ops::Replacement;
use crate::selector::{ContainsQuery, Selector};
use crate::slides::AutoSlideOptions;
use serde_json::Value;
use std::collections::BTreeSet;

/// Borrowed notebook plus a selector, so a chain of edits does not repeat
/// the selector:
///
/// ```
/// use nbsel_core::{Cell, Notebook, Selector};
///
/// let mut nb = Notebook::from_cells(vec![Cell::code(""), Cell::markdown("# Title")]);
/// nb.select(Selector::is_empty()).delete();
/// assert_eq!(nb.len(), 1);
/// ```
#[derive(Debug)]
pub struct Selection<'a> {
    notebook: &'a mut Notebook,
    selector: Selector,
}

impl Notebook {
    pub fn select(&mut self, selector: Selector) -> Selection<'_> {
        Selection {
            notebook: self,
            selector,
        }
    }
}

impl<'a> Selection<'a> {
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn notebook(&self) -> &Notebook {
        self.notebook
    }

    /// Narrow the selection to cells also matching `other`
    #[must_use]
    pub fn and(self, other: Selector) -> Self {
        Self {
            notebook: self.notebook,
            selector: self.selector & other,
        }
    }

    /// Widen the selection to cells matching `other`
    #[must_use]
    pub fn or(self, other: Selector) -> Self {
        Self {
            notebook: self.notebook,
            selector: self.selector | other,
        }
    }

    /// Select the complement
    #[must_use]
    pub fn invert(self) -> Self {
        Self {
            notebook: self.notebook,
            selector: !self.selector,
        }
    }

    pub fn count(&self) -> usize {
        self.notebook.count(&self.selector)
    }

    pub fn first(&self) -> Option<usize> {
        self.notebook.first(&self.selector)
    }

    pub fn last(&self) -> Option<usize> {
        self.notebook.last(&self.selector)
    }

    pub fn list(&self) -> Vec<usize> {
        self.notebook.list(&self.selector)
    }

    pub fn search(&self, query: &ContainsQuery) -> Result<Option<usize>> {
        self.notebook.search(&self.selector, query)
    }

    pub fn search_all(&self, query: &ContainsQuery) -> Result<Vec<usize>> {
        self.notebook.search_all(&self.selector, query)
    }

    pub fn to_str(&self, display: &DisplayOptions) -> String {
        self.notebook.to_str(&self.selector, display)
    }

    pub fn tag(self, key: &str, value: &Value) -> Self {
        self.notebook.tag(&self.selector, key, value);
        self
    }

    pub fn erase(self) -> Self {
        self.notebook.erase(&self.selector);
        self
    }

    pub fn erase_output(self, output_types: Option<&BTreeSet<String>>) -> Self {
        self.notebook.erase_output(&self.selector, output_types);
        self
    }

    /// Indices shift after a delete, so the selection is consumed
    pub fn delete(self) {
        self.notebook.delete(&self.selector);
    }

    pub fn keep(self) {
        self.notebook.keep(&self.selector);
    }

    pub fn replace(self, replacement: &Replacement) -> Result<Self> {
        self.notebook.replace(&self.selector, replacement)?;
        Ok(self)
    }

    pub fn tag_slide(self, slide_type: &str) -> Result<Self> {
        self.notebook.tag_slide(&self.selector, slide_type)?;
        Ok(self)
    }

    pub fn auto_slide(self, options: &AutoSlideOptions) {
        self.notebook.auto_slide(&self.selector, options);
    }

    pub fn mark_slideshow(self) -> Self {
        self.notebook.mark_slideshow();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;

    fn sample() -> Notebook {
        Notebook::from_cells(vec![
            Cell::code("a"),
            Cell::markdown("Hello World"),
            Cell::code("a b"),
            Cell::code("a c"),
        ])
    }

    #[test]
    fn test_selection_queries() {
        let mut nb = sample();
        let selection = nb.select(Selector::is_code());
        assert_eq!(selection.count(), 3);
        assert_eq!(selection.first(), Some(0));
        assert_eq!(selection.last(), Some(3));
        assert_eq!(
            selection.search_all(&ContainsQuery::new("b")).unwrap(),
            vec![2]
        );
    }

    #[test]
    fn test_selection_combinators() {
        let mut nb = sample();
        let selection = nb
            .select(Selector::is_code())
            .and(Selector::index(-1))
            .or(Selector::is_markdown());
        assert_eq!(selection.list(), vec![1, 3]);
        assert_eq!(selection.invert().list(), vec![0, 2]);
    }

    #[test]
    fn test_selection_chained_edits() {
        let mut nb = sample();
        nb.select(Selector::is_markdown())
            .tag("tags", &serde_json::json!(["intro"]))
            .tag_slide("slide")
            .unwrap()
            .mark_slideshow();
        assert_eq!(nb.cells[1].slide_type(), Some("slide"));
        assert_eq!(nb.cells[1].tags().collect::<Vec<_>>(), vec!["intro"]);
        assert_eq!(nb.metadata["celltoolbar"], "Slideshow");

        nb.select(Selector::is_code()).keep();
        assert_eq!(nb.len(), 3);
    }
}
