//! Registry of named selectors
//!
//! Maps a predicate name to a help line and a builder that binds string
//! arguments (as they arrive from a command line) to a [`Predicate`]. The
//! registry is filled once by [`SelectorRegistry::builtin`] and is read-only
//! afterwards.

use super::{ContainsQuery, Predicate, Selector};
use crate::cell::CellType;
use crate::error::{NotebookError, Result};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, BTreeSet};

static REGISTRY: Lazy<SelectorRegistry> = Lazy::new(SelectorRegistry::builtin);

/// The process-wide registry of built-in selectors
pub fn registry() -> &'static SelectorRegistry {
    &REGISTRY
}

/// Positional and keyword arguments for a named selector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorArgs {
    pub positional: Vec<String>,
    pub keyword: BTreeMap<String, String>,
}

impl SelectorArgs {
    pub fn new(positional: Vec<String>, keyword: BTreeMap<String, String>) -> Self {
        Self {
            positional,
            keyword,
        }
    }

    pub fn positional<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            positional: args.into_iter().map(Into::into).collect(),
            keyword: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_keyword(mut self, key: &str, value: impl Into<String>) -> Self {
        self.keyword.insert(key.to_string(), value.into());
        self
    }

    /// Keyword `key`, else positional argument `position`
    fn get(&self, position: usize, key: &str) -> Option<&str> {
        self.keyword
            .get(key)
            .map(String::as_str)
            .or_else(|| self.positional.get(position).map(String::as_str))
    }

    fn required(&self, selector: &str, position: usize, key: &str) -> Result<&str> {
        self.get(position, key).ok_or_else(|| {
            NotebookError::invalid_argument(selector, format!("missing argument '{key}'"))
        })
    }

    fn flag(&self, selector: &str, position: usize, key: &str, default: bool) -> Result<bool> {
        self.get(position, key)
            .map_or(Ok(default), |value| parse_bool(selector, key, value))
    }

    fn number(&self, selector: &str, position: usize, key: &str) -> Result<Option<u64>> {
        self.get(position, key)
            .map(|value| {
                value.parse::<u64>().map_err(|_| {
                    NotebookError::invalid_argument(
                        selector,
                        format!("'{key}' must be a non-negative integer, got '{value}'"),
                    )
                })
            })
            .transpose()
    }

    /// All positional arguments plus the comma-separated keyword `key`
    fn set(&self, key: &str) -> BTreeSet<String> {
        self.positional
            .iter()
            .map(String::as_str)
            .chain(self.keyword.get(key).into_iter().flat_map(|v| v.split(',')))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

fn parse_bool(selector: &str, key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "on" => Ok(true),
        "false" | "0" | "no" | "n" | "off" => Ok(false),
        _ => Err(NotebookError::invalid_argument(
            selector,
            format!("'{key}' must be a boolean, got '{value}'"),
        )),
    }
}

type BuildFn = fn(&SelectorArgs) -> Result<Predicate>;

/// One registered selector
#[derive(Clone, Copy)]
pub struct SelectorEntry {
    pub name: &'static str,
    /// One-line description shown by `select --list`
    pub help: &'static str,
    /// Argument synopsis, e.g. `TEXT [CASE] [OUTPUT] [REGEX]`
    pub usage: &'static str,
    build: BuildFn,
}

impl std::fmt::Debug for SelectorEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectorEntry")
            .field("name", &self.name)
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct SelectorRegistry {
    entries: BTreeMap<&'static str, SelectorEntry>,
}

impl SelectorRegistry {
    /// Registry holding every built-in selector
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        registry.register("is_code", "Select code cells", "", |_| Ok(Predicate::IsCode));
        registry.register("is_markdown", "Select markdown cells", "", |_| {
            Ok(Predicate::IsMarkdown)
        });
        registry.register("is_raw", "Select raw cells", "", |_| Ok(Predicate::IsRaw));
        registry.register(
            "is_empty",
            "Select cells whose source is blank",
            "",
            |_| Ok(Predicate::IsEmpty),
        );
        registry.register(
            "has_type",
            "Select cells of a given type",
            "TYPE",
            build_has_type,
        );
        registry.register(
            "contains",
            "Select cells containing a certain text",
            "TEXT [CASE] [OUTPUT] [REGEX]",
            build_contains,
        );
        registry.register(
            "has_output",
            "Select code cells that have outputs",
            "",
            |_| Ok(Predicate::HasOutput),
        );
        registry.register(
            "has_output_type",
            "Select cells that have a given output type (MIME type)",
            "TYPE...",
            |args| {
                non_empty_set("has_output_type", args.set("types")).map(Predicate::HasOutputType)
            },
        );
        registry.register(
            "has_slide_type",
            "Select cells that have a given slide type",
            "TYPE...",
            |args| {
                non_empty_set("has_slide_type", args.set("types")).map(Predicate::HasSlideType)
            },
        );
        registry.register(
            "is_new_slide",
            "Select cells that start a slide or subslide",
            "",
            |_| Ok(Predicate::IsNewSlide),
        );
        registry.register(
            "has_tag",
            "Select cells carrying a metadata tag",
            "TAG",
            |args| {
                args.required("has_tag", 0, "tag")
                    .map(|tag| Predicate::HasTag(tag.to_string()))
            },
        );
        registry.register(
            "has_byte_size",
            "Select cells whose size in bytes is within bounds",
            "[MIN_SIZE] [MAX_SIZE]",
            build_has_byte_size,
        );
        registry.register("index", "Select the cell at a position", "N", |args| {
            let raw = args.required("index", 0, "index")?;
            raw.parse::<i64>().map(Predicate::Index).map_err(|_| {
                NotebookError::invalid_argument("index", format!("'{raw}' is not an integer"))
            })
        });
        registry.register(
            "slice",
            "Select cells in a range START:STOP[:STEP]",
            "RANGE",
            |args| {
                let raw = args.required("slice", 0, "range")?;
                match super::parse_slice(raw)? {
                    Selector::Predicate(predicate) => Ok(predicate),
                    _ => Err(NotebookError::invalid_argument("slice", "not a range")),
                }
            },
        );
        registry
    }

    fn register(
        &mut self,
        name: &'static str,
        help: &'static str,
        usage: &'static str,
        build: BuildFn,
    ) {
        self.entries.insert(
            name,
            SelectorEntry {
                name,
                help,
                usage,
                build,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&SelectorEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entries sorted by name
    pub fn entries(&self) -> impl Iterator<Item = &SelectorEntry> {
        self.entries.values()
    }

    /// Bind `args` to the selector called `name`
    ///
    /// # Errors
    ///
    /// `NoSuchSelector` for an unknown name; otherwise whatever the
    /// predicate's argument binding reports.
    pub fn build(&self, name: &str, args: &SelectorArgs) -> Result<Selector> {
        let entry = self
            .get(name)
            .ok_or_else(|| NotebookError::NoSuchSelector(name.to_string()))?;
        let predicate = (entry.build)(args)?;
        tracing::debug!("Built selector {name} from {args:?}");
        Ok(Selector::Predicate(predicate))
    }
}

fn build_has_type(args: &SelectorArgs) -> Result<Predicate> {
    let raw = args.required("has_type", 0, "type")?;
    let cell_type = raw
        .parse::<CellType>()
        .unwrap_or_else(|_| CellType::from(raw.to_string()));
    Ok(Predicate::HasType(cell_type))
}

fn build_contains(args: &SelectorArgs) -> Result<Predicate> {
    let query = ContainsQuery::new(args.required("contains", 0, "text")?)
        .case(args.flag("contains", 1, "case", true)?)
        .output(args.flag("contains", 2, "output", false)?)
        .regex(args.flag("contains", 3, "regex", false)?);
    query.compile()?;
    Ok(Predicate::Contains(query))
}

fn build_has_byte_size(args: &SelectorArgs) -> Result<Predicate> {
    let min_size = args.number("has_byte_size", 0, "min_size")?;
    let max_size = args.number("has_byte_size", 1, "max_size")?;
    if let (Some(min), Some(max)) = (min_size, max_size) {
        if min > max {
            return Err(NotebookError::invalid_argument(
                "has_byte_size",
                format!("min_size {min} is greater than max_size {max}"),
            ));
        }
    }
    let output_types = args.keyword.get("output_types").map(|types| {
        types
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    });
    Ok(Predicate::HasByteSize {
        min_size,
        max_size,
        output_types,
        ignore_source: args.flag("has_byte_size", 2, "ignore_source", false)?,
    })
}

fn non_empty_set(selector: &str, set: BTreeSet<String>) -> Result<BTreeSet<String>> {
    if set.is_empty() {
        Err(NotebookError::invalid_argument(
            selector,
            "at least one type is required",
        ))
    } else {
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let names: Vec<&str> = registry().entries().map(|e| e.name).collect();
        for expected in [
            "is_markdown",
            "is_code",
            "is_raw",
            "is_empty",
            "contains",
            "has_output_type",
            "has_slide_type",
            "index",
            "slice",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
        assert!(registry().entries().all(|e| !e.help.is_empty()));
    }

    #[test]
    fn test_contains_binding() {
        let args = SelectorArgs::positional(["Hello", "false"]).with_keyword("regex", "true");
        let selector = registry().build("contains", &args).unwrap();
        let Selector::Predicate(Predicate::Contains(query)) = selector else {
            panic!("expected contains predicate");
        };
        assert_eq!(query.text, "Hello");
        assert!(!query.case);
        assert!(!query.output);
        assert!(query.regex);
    }

    #[test]
    fn test_contains_defaults_to_case_sensitive() {
        let selector = registry()
            .build("contains", &SelectorArgs::positional(["x"]))
            .unwrap();
        assert!(matches!(
            selector,
            Selector::Predicate(Predicate::Contains(ContainsQuery { case: true, .. }))
        ));
    }

    #[test]
    fn test_argument_errors() {
        let missing = registry().build("contains", &SelectorArgs::default());
        assert!(matches!(missing, Err(NotebookError::InvalidArgument { .. })));

        let bad_bool = registry().build(
            "contains",
            &SelectorArgs::positional(["x"]).with_keyword("case", "maybe"),
        );
        assert!(matches!(bad_bool, Err(NotebookError::InvalidArgument { .. })));

        let no_types = registry().build("has_output_type", &SelectorArgs::default());
        assert!(matches!(no_types, Err(NotebookError::InvalidArgument { .. })));

        let inverted = registry().build("has_byte_size", &SelectorArgs::positional(["10", "1"]));
        assert!(matches!(inverted, Err(NotebookError::InvalidArgument { .. })));
    }

    #[test]
    fn test_type_sets_merge_positional_and_keyword() {
        let args = SelectorArgs::positional(["image/png"]).with_keyword("types", "text/html, text/plain");
        let selector = registry().build("has_output_type", &args).unwrap();
        let Selector::Predicate(Predicate::HasOutputType(types)) = selector else {
            panic!("expected has_output_type");
        };
        assert_eq!(types.len(), 3);
        assert!(types.contains("text/html"));
    }

    #[test]
    fn test_has_type_accepts_aliases() {
        let selector = registry()
            .build("has_type", &SelectorArgs::positional(["md"]))
            .unwrap();
        assert!(matches!(
            selector,
            Selector::Predicate(Predicate::HasType(CellType::Markdown))
        ));
    }
}
