//! Slide layout produced by `auto_slide`

use nbsel_core::{AutoSlideOptions, Cell, Notebook, Output, Selector};
use serde_json::{json, Map, Value};

fn image_cell(source: &str) -> Cell {
    let data: Map<String, Value> = json!({"image/png": "iVBORw0KGgo=", "text/plain": "<Figure>"})
        .as_object()
        .cloned()
        .unwrap();
    Cell::code(source).with_outputs(vec![Output::display_data(data)])
}

fn slide_types(nb: &Notebook) -> Vec<Option<&str>> {
    nb.cells.iter().map(|c| c.slide_type()).collect()
}

#[test]
fn test_auto_slide_layout() {
    let mut nb = Notebook::from_cells(vec![
        Cell::markdown("# Title"),
        Cell::markdown("intro"),
        Cell::code("a"),
        Cell::code("b"),
        Cell::code("c"),
        Cell::code("  \n"),
        Cell::markdown("## Part 2"),
        image_cell("plot(x)"),
        image_cell("plot(y)"),
    ]);
    nb.auto_slide(&Selector::all(), &AutoSlideOptions::default());

    assert_eq!(nb.len(), 8);
    assert_eq!(
        slide_types(&nb),
        vec![
            Some("slide"),
            Some("-"),
            None,
            Some("subslide"),
            None,
            Some("slide"),
            Some("-"),
            Some("subslide"),
        ]
    );
}

#[test]
fn test_consecutive_headings_share_a_slide() {
    let mut nb = Notebook::from_cells(vec![
        Cell::markdown("# Chapter"),
        Cell::markdown("# Section"),
        Cell::markdown("text"),
    ]);
    nb.auto_slide(&Selector::all(), &AutoSlideOptions::default());
    assert_eq!(slide_types(&nb), vec![Some("slide"), Some("-"), Some("-")]);
}

#[test]
fn test_keep_empty_cells() {
    let mut nb = Notebook::from_cells(vec![Cell::markdown("# A"), Cell::code(""), Cell::code("x")]);
    let options = AutoSlideOptions {
        delete_empty: false,
        ..Default::default()
    };
    nb.auto_slide(&Selector::all(), &options);
    assert_eq!(nb.len(), 3);
}

#[test]
fn test_never_raises_when_every_cell_is_tagged() {
    let mut nb = Notebook::from_cells(vec![
        Cell::markdown("# A"),
        Cell::code(""),
        image_cell("p"),
        Cell::markdown("notes"),
        Cell::raw("r"),
    ]);
    for (index, kind) in ["slide", "skip", "fragment", "notes", "subslide"].iter().enumerate() {
        nb.tag_slide(&Selector::index(index as i64), kind).unwrap();
    }
    let options = AutoSlideOptions {
        delete_empty: false,
        ..Default::default()
    };
    nb.auto_slide(&Selector::all(), &options);
    assert_eq!(nb.len(), 5);
    assert!(nb.cells.iter().all(|c| c.slide_type().is_some()));
}

#[test]
fn test_image_limit_splits_slides() {
    let mut nb = Notebook::from_cells(vec![image_cell("a"), image_cell("b"), image_cell("c")]);
    nb.max_cells_per_slide(&Selector::all(), None, Some(1));
    assert_eq!(
        slide_types(&nb),
        vec![None, Some("subslide"), Some("subslide")]
    );
}

#[test]
fn test_selector_limits_the_layout() {
    let mut nb = Notebook::from_cells(vec![
        Cell::markdown("# Kept out"),
        Cell::markdown("# In"),
        Cell::code(""),
    ]);
    nb.auto_slide(&Selector::slice(Some(1), None, None).unwrap(), &AutoSlideOptions::default());
    assert_eq!(nb.len(), 2);
    assert_eq!(slide_types(&nb), vec![None, Some("slide")]);
}
