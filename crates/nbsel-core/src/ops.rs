//! Selector-scoped notebook edits and queries
//!
//! Every operation takes the [`Selector`] naming the cells it applies to.
//! Edits work on the in-memory document only; writing the file back is a
//! separate call to [`Notebook::write_ipynb`].

use crate::error::{NotebookError, Result};
use crate::notebook::Notebook;
use crate::selector::{ContainsQuery, Selector};
use regex::{NoExpand, RegexBuilder};
use serde_json::Value;
use std::collections::BTreeSet;

/// Arguments of [`Notebook::replace`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub old: String,
    pub new: String,
    /// Maximum substitutions per cell; `None` replaces every occurrence
    pub count: Option<usize>,
    pub case: bool,
    /// `old` is a regular expression and `new` may use `$1`-style groups
    pub regex: bool,
}

impl Replacement {
    /// Case-sensitive literal replacement of every occurrence
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
            count: None,
            case: true,
            regex: false,
        }
    }

    #[must_use]
    pub fn count(mut self, count: Option<usize>) -> Self {
        self.count = count;
        self
    }

    #[must_use]
    pub fn case(mut self, case: bool) -> Self {
        self.case = case;
        self
    }

    #[must_use]
    pub fn regex(mut self, regex: bool) -> Self {
        self.regex = regex;
        self
    }
}

impl Notebook {
    pub fn count(&self, selector: &Selector) -> usize {
        self.iter_cells(selector).count()
    }

    /// Index of the first selected cell
    pub fn first(&self, selector: &Selector) -> Option<usize> {
        self.iter_cells(selector).next().map(|view| view.index())
    }

    /// Index of the last selected cell
    pub fn last(&self, selector: &Selector) -> Option<usize> {
        self.iter_cells(selector).last().map(|view| view.index())
    }

    /// Indices of the selected cells
    pub fn list(&self, selector: &Selector) -> Vec<usize> {
        selector.matching_indices(self, false)
    }

    /// First selected cell containing the query
    ///
    /// # Errors
    ///
    /// Returns `RegexError` if a regex query does not compile.
    pub fn search(&self, selector: &Selector, query: &ContainsQuery) -> Result<Option<usize>> {
        let combined = selector.clone() & Selector::contains(query.clone())?;
        Ok(self.first(&combined))
    }

    /// All selected cells containing the query
    ///
    /// # Errors
    ///
    /// Returns `RegexError` if a regex query does not compile.
    pub fn search_all(&self, selector: &Selector, query: &ContainsQuery) -> Result<Vec<usize>> {
        let combined = selector.clone() & Selector::contains(query.clone())?;
        Ok(self.list(&combined))
    }

    /// Merge `value` into `metadata[key]` of every selected cell. Two mappings
    /// are merged recursively; anything else overwrites.
    pub fn tag(&mut self, selector: &Selector, key: &str, value: &Value) {
        let indices = selector.matching_indices(self, false);
        for &index in &indices {
            let metadata = &mut self.cells[index].metadata;
            match metadata.get_mut(key) {
                Some(existing) => deep_merge(existing, value),
                None => {
                    metadata.insert(key.to_string(), value.clone());
                }
            }
        }
        tracing::debug!("Tagged {} cells with '{key}'", indices.len());
    }

    /// Empty the source of the selected cells. Outputs are kept.
    pub fn erase(&mut self, selector: &Selector) {
        let indices = selector.matching_indices(self, false);
        for &index in &indices {
            self.cells[index].set_source::<&str>(&[]);
        }
        tracing::debug!("Erased {} cells", indices.len());
    }

    /// Remove MIME types from the outputs of the selected cells; `None`
    /// clears the outputs entirely. Outputs left empty are dropped.
    pub fn erase_output(&mut self, selector: &Selector, output_types: Option<&BTreeSet<String>>) {
        let indices = selector.matching_indices(self, false);
        for &index in &indices {
            let Some(outputs) = self.cells[index].outputs.as_mut() else {
                continue;
            };
            match output_types {
                Some(types) => {
                    *outputs = std::mem::take(outputs)
                        .into_iter()
                        .filter_map(|output| output.erase(types))
                        .collect();
                }
                None => outputs.clear(),
            }
        }
        tracing::debug!("Erased outputs of {} cells", indices.len());
    }

    /// Remove the selected cells, keeping the others in order
    pub fn delete(&mut self, selector: &Selector) {
        let before = self.len();
        self.retain_cells(selector, true);
        tracing::debug!("Deleted {} cells", before - self.len());
    }

    /// Remove every cell that is not selected
    pub fn keep(&mut self, selector: &Selector) {
        let before = self.len();
        self.retain_cells(selector, false);
        tracing::debug!("Kept {} of {} cells", self.len(), before);
    }

    fn retain_cells(&mut self, selector: &Selector, negate: bool) {
        let keep: BTreeSet<usize> = selector.matching_indices(self, negate).into_iter().collect();
        let cells = std::mem::take(&mut self.cells);
        self.cells = cells
            .into_iter()
            .enumerate()
            .filter(|(index, _)| keep.contains(index))
            .map(|(_, cell)| cell)
            .collect();
    }

    /// Substitute text in the source of the selected cells
    ///
    /// # Errors
    ///
    /// Returns `RegexError` if `old` does not compile in regex mode, and
    /// `InvalidArgument` for an empty pattern.
    pub fn replace(&mut self, selector: &Selector, replacement: &Replacement) -> Result<()> {
        if replacement.old.is_empty() {
            return Err(NotebookError::invalid_argument(
                "replace",
                "the text to replace cannot be empty",
            ));
        }
        let pattern = if replacement.regex {
            replacement.old.clone()
        } else {
            regex::escape(&replacement.old)
        };
        let re = RegexBuilder::new(&pattern)
            .case_insensitive(!replacement.case)
            .build()?;
        let limit = replacement.count.unwrap_or(0);

        let mut changed = 0;
        for index in selector.matching_indices(self, false) {
            let cell = &mut self.cells[index];
            let updated = if replacement.regex {
                re.replacen(&cell.source, limit, replacement.new.as_str())
            } else {
                re.replacen(&cell.source, limit, NoExpand(&replacement.new))
            };
            if updated != cell.source {
                cell.source = updated.into_owned();
                changed += 1;
            }
        }
        tracing::debug!("Replaced '{}' in {changed} cells", replacement.old);
        Ok(())
    }
}

fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::output::Output;
    use serde_json::json;

    fn nb1() -> Notebook {
        Notebook::from_cells(vec![
            Cell::code("a"),
            Cell::markdown("Hello World"),
            Cell::code("a b"),
            Cell::code("a c"),
        ])
    }

    #[test]
    fn test_first_last_list() {
        let nb = nb1();
        let code = Selector::is_code();
        assert_eq!(nb.first(&code), Some(0));
        assert_eq!(nb.last(&code), Some(3));
        assert_eq!(nb.list(&code), vec![0, 2, 3]);
        assert_eq!(nb.count(&code), 3);
        assert_eq!(nb.first(&Selector::is_raw()), None);
        assert_eq!(nb.last(&Selector::is_raw()), None);
    }

    #[test]
    fn test_search_is_scoped_by_selector() {
        let nb = nb1();
        let query = ContainsQuery::new("a");
        assert_eq!(nb.search(&Selector::all(), &query).unwrap(), Some(0));
        assert_eq!(nb.search(&Selector::slice(Some(1), None, None).unwrap(), &query).unwrap(), Some(2));
        assert_eq!(nb.search(&Selector::all(), &ContainsQuery::new("b ")).unwrap(), None);
    }

    #[test]
    fn test_tag_deep_merges_mappings() {
        let mut nb = nb1();
        nb.cells[0]
            .metadata
            .insert("slideshow".into(), json!({"slide_type": "skip", "nested": {"a": 1}}));
        nb.tag(&Selector::index(0), "slideshow", &json!({"nested": {"b": 2}}));
        assert_eq!(
            nb.cells[0].metadata["slideshow"],
            json!({"slide_type": "skip", "nested": {"a": 1, "b": 2}})
        );

        nb.cells[1].metadata.insert("tags".into(), json!(["x"]));
        nb.tag(&Selector::index(1), "tags", &json!(["y"]));
        assert_eq!(nb.cells[1].metadata["tags"], json!(["y"]));

        nb.tag(&Selector::index(2), "new", &json!(true));
        assert_eq!(nb.cells[2].metadata["new"], json!(true));
    }

    #[test]
    fn test_erase_keeps_outputs() {
        let mut nb = Notebook::from_cells(vec![
            Cell::code("print(1)").with_outputs(vec![Output::stream("stdout", "1\n")])
        ]);
        nb.erase(&Selector::all());
        assert_eq!(nb.cells[0].source, "");
        assert_eq!(nb.cells[0].outputs().len(), 1);
    }

    #[test]
    fn test_erase_output_none_clears_all() {
        let mut nb = Notebook::from_cells(vec![
            Cell::code("x").with_outputs(vec![Output::stream("stdout", "1\n")]),
            Cell::markdown("y"),
        ]);
        nb.erase_output(&Selector::all(), None);
        assert!(nb.cells[0].outputs().is_empty());
        assert!(nb.cells[1].outputs.is_none());
    }

    #[test]
    fn test_replace_count_and_case() {
        let mut nb = Notebook::from_cells(vec![Cell::code("a a a"), Cell::code("A a")]);
        nb.replace(&Selector::all(), &Replacement::new("a", "x").count(Some(2)))
            .unwrap();
        assert_eq!(nb.cells[0].source, "x x a");
        assert_eq!(nb.cells[1].source, "A x");

        nb.replace(&Selector::index(1), &Replacement::new("a", "y").case(false))
            .unwrap();
        assert_eq!(nb.cells[1].source, "y x");
    }

    #[test]
    fn test_replace_literal_does_not_expand_groups() {
        let mut nb = Notebook::from_cells(vec![Cell::code("price: 5")]);
        nb.replace(&Selector::all(), &Replacement::new("5", "$1")).unwrap();
        assert_eq!(nb.cells[0].source, "price: $1");

        nb.replace(
            &Selector::all(),
            &Replacement::new(r"(\w+): ", "${1}=").regex(true),
        )
        .unwrap();
        assert_eq!(nb.cells[0].source, "price=$1");
    }

    #[test]
    fn test_replace_rejects_empty_pattern() {
        let mut nb = nb1();
        assert!(nb.replace(&Selector::all(), &Replacement::new("", "x")).is_err());
    }
}
