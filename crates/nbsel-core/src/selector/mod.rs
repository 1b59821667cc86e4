//! Composable cell selectors
//!
//! A [`Selector`] is an immutable boolean expression over `(notebook, index)`.
//! Leaves are [`Predicate`]s: plain data naming a built-in test and its bound
//! arguments, so a whole tree can be encoded with [`codec`] and passed between
//! processes. Combinators (`&`, `|`, `!`) always build new nodes.
//!
//! ```
//! use nbsel_core::{Cell, Notebook, Selector};
//!
//! let nb = Notebook::from_cells(vec![Cell::code("x = 1"), Cell::markdown("# Title")]);
//! let selector = Selector::is_markdown() | Selector::index(0);
//! assert_eq!(selector.matching_indices(&nb, false), vec![0, 1]);
//! ```

pub mod codec;
pub mod registry;

use crate::cell::{CellType, CellView};
use crate::error::{NotebookError, Result};
use crate::notebook::Notebook;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

pub use registry::{registry, SelectorArgs, SelectorEntry, SelectorRegistry};

/// Slide types that open a new slide
pub const NEW_SLIDE_TYPES: [&str; 2] = ["slide", "subslide"];

/// Arguments of the `contains` predicate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainsQuery {
    pub text: String,
    /// Case-sensitive matching
    pub case: bool,
    /// Also search the rendered outputs
    pub output: bool,
    /// Treat `text` as a regular expression
    pub regex: bool,
}

impl ContainsQuery {
    /// Case-sensitive literal search in the source only
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            case: true,
            output: false,
            regex: false,
        }
    }

    #[must_use]
    pub fn case(mut self, case: bool) -> Self {
        self.case = case;
        self
    }

    #[must_use]
    pub fn output(mut self, output: bool) -> Self {
        self.output = output;
        self
    }

    #[must_use]
    pub fn regex(mut self, regex: bool) -> Self {
        self.regex = regex;
        self
    }

    /// Compile the query; literal text is escaped first
    pub fn compile(&self) -> Result<regex::Regex> {
        let pattern = if self.regex {
            self.text.clone()
        } else {
            regex::escape(&self.text)
        };
        Ok(RegexBuilder::new(&pattern)
            .case_insensitive(!self.case)
            .build()?)
    }

    fn matches(&self, view: &CellView<'_>) -> bool {
        let haystack = view.cell().searchable_text(self.output);
        if !self.regex && self.case {
            return haystack.contains(&self.text);
        }
        self.compile()
            .map(|re| re.is_match(&haystack))
            .unwrap_or(false)
    }
}

/// Built-in cell test with its bound arguments
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Predicate {
    IsCode,
    IsMarkdown,
    IsRaw,
    /// Source is empty or whitespace only
    IsEmpty,
    HasType(CellType),
    Contains(ContainsQuery),
    /// Code cell with at least one output
    HasOutput,
    /// Some output advertises one of the MIME types
    HasOutputType(BTreeSet<String>),
    /// `metadata.slideshow.slide_type` is one of the given values
    HasSlideType(BTreeSet<String>),
    /// Slide type is `slide` or `subslide`
    IsNewSlide,
    /// `metadata.tags` contains the tag
    HasTag(String),
    /// Source plus output bytes lie within `[min_size, max_size]`
    HasByteSize {
        min_size: Option<u64>,
        max_size: Option<u64>,
        output_types: Option<BTreeSet<String>>,
        ignore_source: bool,
    },
    /// Position equality; negative values count from the end
    Index(i64),
    /// Membership in `start:stop:step`, with Python slice semantics
    Slice {
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
    },
}

impl Predicate {
    /// Registry name of the predicate
    pub fn name(&self) -> &'static str {
        match self {
            Self::IsCode => "is_code",
            Self::IsMarkdown => "is_markdown",
            Self::IsRaw => "is_raw",
            Self::IsEmpty => "is_empty",
            Self::HasType(_) => "has_type",
            Self::Contains(_) => "contains",
            Self::HasOutput => "has_output",
            Self::HasOutputType(_) => "has_output_type",
            Self::HasSlideType(_) => "has_slide_type",
            Self::IsNewSlide => "is_new_slide",
            Self::HasTag(_) => "has_tag",
            Self::HasByteSize { .. } => "has_byte_size",
            Self::Index(_) => "index",
            Self::Slice { .. } => "slice",
        }
    }

    /// Evaluate against one cell. Predicates about outputs are false for
    /// cells without outputs.
    pub fn evaluate(&self, view: &CellView<'_>) -> bool {
        let cell = view.cell();
        match self {
            Self::IsCode => cell.cell_type == CellType::Code,
            Self::IsMarkdown => cell.cell_type == CellType::Markdown,
            Self::IsRaw => cell.cell_type == CellType::Raw,
            Self::IsEmpty => cell.source.trim().is_empty(),
            Self::HasType(cell_type) => &cell.cell_type == cell_type,
            Self::Contains(query) => query.matches(view),
            Self::HasOutput => !cell.outputs().is_empty(),
            Self::HasOutputType(types) => cell.outputs().iter().any(|o| o.has_output_type(types)),
            Self::HasSlideType(types) => cell.slide_type().is_some_and(|t| types.contains(t)),
            Self::IsNewSlide => cell
                .slide_type()
                .is_some_and(|t| NEW_SLIDE_TYPES.contains(&t)),
            Self::HasTag(tag) => cell.tags().any(|t| t == tag),
            Self::HasByteSize {
                min_size,
                max_size,
                output_types,
                ignore_source,
            } => {
                let source = if *ignore_source { 0 } else { cell.source.len() };
                let outputs: usize = cell
                    .outputs()
                    .iter()
                    .map(|o| o.byte_size(output_types.as_ref()))
                    .sum();
                let size = (source + outputs) as u64;
                min_size.map_or(true, |min| size >= min) && max_size.map_or(true, |max| size <= max)
            }
            Self::Index(index) => {
                resolve_index(*index, view.notebook().len()) == Some(view.index())
            }
            Self::Slice { start, stop, step } => {
                slice_contains(*start, *stop, *step, view.notebook().len(), view.index())
            }
        }
    }
}

/// In-process predicate. Cannot be serialized.
#[derive(Clone)]
pub struct CustomPredicate(Arc<dyn Fn(&CellView<'_>) -> bool + Send + Sync>);

impl std::fmt::Debug for CustomPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CustomPredicate(..)")
    }
}

/// Boolean expression tree over notebook cells
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Selector {
    /// Every cell
    #[default]
    All,
    Predicate(Predicate),
    And(Box<Selector>, Box<Selector>),
    Or(Box<Selector>, Box<Selector>),
    Not(Box<Selector>),
    /// Same-process only; [`codec::encode`] rejects it
    #[serde(skip)]
    Custom(CustomPredicate),
}

impl From<Predicate> for Selector {
    fn from(predicate: Predicate) -> Self {
        Self::Predicate(predicate)
    }
}

impl Selector {
    pub fn all() -> Self {
        Self::All
    }

    /// Look `name` up in the registry and bind `args` to it.
    ///
    /// # Errors
    ///
    /// `NoSuchSelector` for an unknown name, `InvalidArgument` when the
    /// arguments do not fit the predicate.
    pub fn named(name: &str, args: &SelectorArgs) -> Result<Self> {
        registry().build(name, args)
    }

    /// Parse a CLI token: an index (`3`, `-1`), a slice (`1:4`, `::2`) or a
    /// registered name.
    pub fn parse(token: &str, args: &SelectorArgs) -> Result<Self> {
        if let Ok(index) = token.parse::<i64>() {
            return Ok(Self::index(index));
        }
        if token.contains(':') {
            return parse_slice(token);
        }
        Self::named(token, args)
    }

    /// Conjunction of several named selectors, each with its own arguments
    pub fn all_of<'a, I>(named: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, SelectorArgs)>,
    {
        let mut combined: Option<Selector> = None;
        for (name, args) in named {
            let next = Self::named(name, &args)?;
            combined = Some(match combined {
                Some(acc) => acc.and(next),
                None => next,
            });
        }
        Ok(combined.unwrap_or_default())
    }

    pub fn index(index: i64) -> Self {
        Predicate::Index(index).into()
    }

    /// Cells in `start:stop:step`
    ///
    /// # Errors
    ///
    /// A zero step is rejected.
    pub fn slice(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Result<Self> {
        if step == Some(0) {
            return Err(NotebookError::invalid_argument("slice", "slice step cannot be zero"));
        }
        Ok(Predicate::Slice { start, stop, step }.into())
    }

    /// Wrap an arbitrary function. The result works in-process only.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&CellView<'_>) -> bool + Send + Sync + 'static,
    {
        Self::Custom(CustomPredicate(Arc::new(f)))
    }

    pub fn is_code() -> Self {
        Predicate::IsCode.into()
    }

    pub fn is_markdown() -> Self {
        Predicate::IsMarkdown.into()
    }

    pub fn is_raw() -> Self {
        Predicate::IsRaw.into()
    }

    pub fn is_empty() -> Self {
        Predicate::IsEmpty.into()
    }

    pub fn is_new_slide() -> Self {
        Predicate::IsNewSlide.into()
    }

    /// # Errors
    ///
    /// Returns `RegexError` if a regex query does not compile.
    pub fn contains(query: ContainsQuery) -> Result<Self> {
        query.compile()?;
        Ok(Predicate::Contains(query).into())
    }

    pub fn has_output_type<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::HasOutputType(types.into_iter().map(Into::into).collect()).into()
    }

    pub fn has_slide_type<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::HasSlideType(types.into_iter().map(Into::into).collect()).into()
    }

    #[must_use]
    pub fn and(self, other: Selector) -> Selector {
        Self::And(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn or(self, other: Selector) -> Selector {
        Self::Or(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn negate(self) -> Selector {
        Self::Not(Box::new(self))
    }

    /// True when the tree has no [`Selector::Custom`] node
    pub fn is_portable(&self) -> bool {
        match self {
            Self::All | Self::Predicate(_) => true,
            Self::And(a, b) | Self::Or(a, b) => a.is_portable() && b.is_portable(),
            Self::Not(inner) => inner.is_portable(),
            Self::Custom(_) => false,
        }
    }

    /// Evaluate at `index`. `index` must be in range.
    pub fn evaluate(&self, notebook: &Notebook, index: usize) -> bool {
        self.evaluate_view(&CellView::new(notebook, index))
    }

    fn evaluate_view(&self, view: &CellView<'_>) -> bool {
        match self {
            Self::All => true,
            Self::Predicate(predicate) => predicate.evaluate(view),
            Self::And(a, b) => a.evaluate_view(view) && b.evaluate_view(view),
            Self::Or(a, b) => a.evaluate_view(view) || b.evaluate_view(view),
            Self::Not(inner) => !inner.evaluate_view(view),
            Self::Custom(CustomPredicate(f)) => f(view),
        }
    }

    /// Lazily yield the matching cells (or, with `negate`, the others) in
    /// ascending index order. Each call starts a fresh pass.
    pub fn iter_matching<'a>(&'a self, notebook: &'a Notebook, negate: bool) -> Matches<'a> {
        Matches {
            selector: self,
            notebook,
            negate,
            next: 0,
        }
    }

    pub fn matching_indices(&self, notebook: &Notebook, negate: bool) -> Vec<usize> {
        self.iter_matching(notebook, negate)
            .map(|view| view.index())
            .collect()
    }
}

impl std::ops::BitAnd for Selector {
    type Output = Selector;

    fn bitand(self, rhs: Selector) -> Selector {
        self.and(rhs)
    }
}

impl std::ops::BitOr for Selector {
    type Output = Selector;

    fn bitor(self, rhs: Selector) -> Selector {
        self.or(rhs)
    }
}

impl std::ops::Not for Selector {
    type Output = Selector;

    fn not(self) -> Selector {
        self.negate()
    }
}

/// Iterator returned by [`Selector::iter_matching`]
#[derive(Debug, Clone)]
pub struct Matches<'a> {
    selector: &'a Selector,
    notebook: &'a Notebook,
    negate: bool,
    next: usize,
}

impl<'a> Iterator for Matches<'a> {
    type Item = CellView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.notebook.len() {
            let view = CellView::new(self.notebook, self.next);
            self.next += 1;
            if self.selector.evaluate_view(&view) != self.negate {
                return Some(view);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.notebook.len().saturating_sub(self.next)))
    }
}

fn parse_slice(token: &str) -> Result<Selector> {
    let parts: Vec<&str> = token.split(':').collect();
    if parts.len() > 3 {
        return Err(NotebookError::invalid_argument(
            "slice",
            format!("'{token}' is not a valid slice"),
        ));
    }
    let mut bounds = [None; 3];
    for (slot, part) in bounds.iter_mut().zip(&parts) {
        let part = part.trim();
        if !part.is_empty() {
            *slot = Some(part.parse::<i64>().map_err(|_| {
                NotebookError::invalid_argument("slice", format!("'{token}' is not a valid slice"))
            })?);
        }
    }
    Selector::slice(bounds[0], bounds[1], bounds[2])
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let resolved = if index < 0 { index + len } else { index };
    (0..len).contains(&resolved).then_some(resolved as usize)
}

/// Whether `index` is produced by `range(len)[start:stop:step]`
#[allow(clippy::cast_possible_wrap)]
fn slice_contains(
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
    len: usize,
    index: usize,
) -> bool {
    let len = len as i64;
    let i = index as i64;
    let step = step.unwrap_or(1);
    let clamp = |bound: i64, low: i64, high: i64| {
        let bound = if bound < 0 { bound + len } else { bound };
        bound.clamp(low, high)
    };

    if step > 0 {
        let start = start.map_or(0, |s| clamp(s, 0, len));
        let stop = stop.map_or(len, |s| clamp(s, 0, len));
        i >= start && i < stop && (i - start) % step == 0
    } else if step < 0 {
        let start = start.map_or(len - 1, |s| clamp(s, -1, len - 1));
        let stop = stop.map_or(-1, |s| clamp(s, -1, len - 1));
        i <= start && i > stop && (start - i).unsigned_abs() % step.unsigned_abs() == 0
    } else {
        false
    }
}
