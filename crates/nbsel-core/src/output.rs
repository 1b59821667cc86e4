//! Cell outputs: stream, error, display data and execute results
//!
//! Every output advertises a set of MIME types. Data-bearing outputs take it
//! from the keys of their `data` payload; stream and error outputs use the
//! fixed types [`STREAM_MIME_TYPE`] and [`ERROR_MIME_TYPE`]. Each set also
//! carries the bare category of every type, so `image/png` answers a query
//! for `image`.

use crate::cell::multiline;
use crate::error::{NotebookError, Result};
use crate::render::{RenderOptions, RendererRegistry};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

pub const STREAM_MIME_TYPE: &str = "text/plain";
pub const ERROR_MIME_TYPE: &str = "text/error";

/// Preferred data types when rendering a data output, before insertion order
pub const PREFERRED_DATA_TYPES: [&str; 3] = ["image/png", "text/html", "text/plain"];

/// One output entry of a code cell, discriminated by `output_type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    Stream(StreamOutput),
    Error(ErrorOutput),
    DisplayData(DataOutput),
    ExecuteResult(DataOutput),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamOutput {
    /// `stdout` or `stderr`
    #[serde(default = "default_stream_name")]
    pub name: String,
    #[serde(default, with = "multiline")]
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorOutput {
    pub ename: String,
    pub evalue: String,
    #[serde(default)]
    pub traceback: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload shared by `display_data` and `execute_result`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataOutput {
    /// MIME type to value, in document order
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(
        default,
        deserialize_with = "present_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub execution_count: Option<Option<i64>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_stream_name() -> String {
    "stdout".to_string()
}

fn present_count<'de, D>(deserializer: D) -> std::result::Result<Option<Option<i64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

impl Output {
    /// Build an output from its JSON record, dispatching on `output_type`
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` when the discriminant is missing or unknown,
    /// and `JsonError` when the payload does not match the variant.
    pub fn from_value(value: Value) -> Result<Self> {
        let output_type = value
            .get("output_type")
            .and_then(Value::as_str)
            .ok_or_else(|| NotebookError::InvalidFormat("output without output_type".into()))?;
        match output_type {
            "stream" | "error" | "display_data" | "execute_result" => {
                Ok(serde_json::from_value(value)?)
            }
            other => Err(NotebookError::InvalidFormat(format!(
                "unknown output_type '{other}'"
            ))),
        }
    }

    pub fn stream(name: &str, text: impl Into<String>) -> Self {
        Self::Stream(StreamOutput {
            name: name.to_string(),
            text: text.into(),
            extra: Map::new(),
        })
    }

    pub fn error(ename: &str, evalue: &str, traceback: Vec<String>) -> Self {
        Self::Error(ErrorOutput {
            ename: ename.to_string(),
            evalue: evalue.to_string(),
            traceback,
            extra: Map::new(),
        })
    }

    pub fn display_data(data: Map<String, Value>) -> Self {
        Self::DisplayData(DataOutput {
            data,
            ..Default::default()
        })
    }

    pub fn execute_result(execution_count: i64, data: Map<String, Value>) -> Self {
        Self::ExecuteResult(DataOutput {
            data,
            execution_count: Some(Some(execution_count)),
            ..Default::default()
        })
    }

    /// The `output_type` discriminant
    pub fn output_type(&self) -> &'static str {
        match self {
            Self::Stream(_) => "stream",
            Self::Error(_) => "error",
            Self::DisplayData(_) => "display_data",
            Self::ExecuteResult(_) => "execute_result",
        }
    }

    pub fn execution_count(&self) -> Option<i64> {
        match self {
            Self::ExecuteResult(data) => data.execution_count.flatten(),
            _ => None,
        }
    }

    /// MIME types of this output, including bare categories
    pub fn output_types(&self) -> BTreeSet<String> {
        match self {
            Self::Stream(_) => expand_mime_types([STREAM_MIME_TYPE]),
            Self::Error(_) => expand_mime_types([ERROR_MIME_TYPE]),
            Self::DisplayData(data) | Self::ExecuteResult(data) => {
                expand_mime_types(data.data.keys().map(String::as_str))
            }
        }
    }

    /// True iff `requested` shares at least one type with [`Output::output_types`]
    pub fn has_output_type(&self, requested: &BTreeSet<String>) -> bool {
        let own = self.output_types();
        requested.iter().any(|t| own.contains(t))
    }

    /// Serialized size in bytes, of the whole entry (`None`) or of the
    /// requested MIME types only
    pub fn byte_size(&self, output_types: Option<&BTreeSet<String>>) -> usize {
        let Some(requested) = output_types else {
            return json_size(self);
        };
        match self {
            Self::Stream(_) | Self::Error(_) => {
                if self.has_output_type(requested) {
                    json_size(self)
                } else {
                    0
                }
            }
            Self::DisplayData(data) | Self::ExecuteResult(data) => {
                let selected: Map<String, Value> = data
                    .data
                    .iter()
                    .filter(|(key, _)| requested.contains(key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                if selected.is_empty() {
                    0
                } else {
                    json_size(&selected)
                }
            }
        }
    }

    /// Drop the requested MIME types. Returns `None` when nothing is left.
    ///
    /// Stream and error outputs are all-or-nothing; data outputs lose only the
    /// keys named exactly and disappear once their payload is empty.
    #[must_use]
    pub fn erase(self, output_types: &BTreeSet<String>) -> Option<Self> {
        match self {
            Self::Stream(_) | Self::Error(_) => {
                (!self.has_output_type(output_types)).then_some(self)
            }
            Self::DisplayData(data) => erase_data(data, output_types).map(Self::DisplayData),
            Self::ExecuteResult(data) => erase_data(data, output_types).map(Self::ExecuteResult),
        }
    }

    /// Render the output as text
    pub fn to_str(&self, renderers: &RendererRegistry, options: &RenderOptions) -> String {
        match self {
            Self::Stream(stream) => stream.text.clone(),
            Self::Error(error) => {
                let mut lines = error.traceback.clone();
                lines.push(format!("{}: {}", error.ename, error.evalue));
                lines.join("\n")
            }
            Self::DisplayData(data) | Self::ExecuteResult(data) => {
                render_data(data, renderers, options).unwrap_or_default()
            }
        }
    }
}

fn erase_data(mut data: DataOutput, output_types: &BTreeSet<String>) -> Option<DataOutput> {
    data.data.retain(|key, _| !output_types.contains(key.as_str()));
    (!data.data.is_empty()).then_some(data)
}

fn render_data(
    data: &DataOutput,
    renderers: &RendererRegistry,
    options: &RenderOptions,
) -> Option<String> {
    let enabled = options.enabled_parsers(renderers);
    let ordered = PREFERRED_DATA_TYPES
        .iter()
        .copied()
        .filter(|t| enabled.contains(*t))
        .chain(data.data.keys().map(String::as_str));

    for data_type in ordered {
        if options.excluded.contains(data_type) {
            continue;
        }
        let Some(value) = data.data.get(data_type) else {
            continue;
        };
        let text = value_to_text(value);
        if enabled.contains(data_type) {
            if let Some(renderer) = renderers.get(data_type) {
                return Some((renderer.render)(&text));
            }
        }
        return Some(text);
    }
    None
}

/// Flatten a MIME payload (string, list of lines or JSON) into text
pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) if items.iter().all(Value::is_string) => {
            items.iter().filter_map(Value::as_str).collect()
        }
        other => other.to_string(),
    }
}

fn json_size<T: Serialize + ?Sized>(value: &T) -> usize {
    serde_json::to_vec(value).map(|bytes| bytes.len()).unwrap_or(0)
}

/// Expand each `category/subtype` into itself plus `category`
pub fn expand_mime_types<'a, I>(types: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut expanded = BTreeSet::new();
    for mime in types {
        if let Some((category, _)) = mime.split_once('/') {
            expanded.insert(category.to_string());
        }
        expanded.insert(mime.to_string());
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(types: &[&str]) -> BTreeSet<String> {
        types.iter().map(|t| (*t).to_string()).collect()
    }

    fn plot_output() -> Output {
        Output::display_data(
            json!({"text/plain": "<Figure>", "image/png": "iVBORw0KGgo="})
                .as_object()
                .cloned()
                .unwrap(),
        )
    }

    #[test]
    fn test_from_value_dispatch() {
        let stream = Output::from_value(json!({
            "output_type": "stream",
            "name": "stdout",
            "text": ["Hello\n", "World\n"]
        }))
        .unwrap();
        assert_eq!(stream.output_type(), "stream");

        let result = Output::from_value(json!({
            "output_type": "execute_result",
            "execution_count": 3,
            "data": {"text/plain": "4"},
            "metadata": {}
        }))
        .unwrap();
        assert_eq!(result.execution_count(), Some(3));

        let unknown = Output::from_value(json!({"output_type": "widget"}));
        assert!(matches!(unknown, Err(NotebookError::InvalidFormat(_))));
        let missing = Output::from_value(json!({"text": "x"}));
        assert!(matches!(missing, Err(NotebookError::InvalidFormat(_))));
    }

    #[test]
    fn test_output_types_include_category() {
        assert_eq!(
            Output::stream("stdout", "x").output_types(),
            set(&["text", "text/plain"])
        );
        assert_eq!(
            Output::error("E", "v", vec![]).output_types(),
            set(&["text", "text/error"])
        );
        assert!(plot_output().has_output_type(&set(&["image"])));
        assert!(plot_output().has_output_type(&set(&["image/png", "text/latex"])));
        assert!(!plot_output().has_output_type(&set(&["text/html"])));
    }

    #[test]
    fn test_erase_stream_removes_entry() {
        let stream = Output::stream("stdout", "hello\n");
        assert!(stream.clone().erase(&set(&["text/plain"])).is_none());
        assert_eq!(stream.clone().erase(&set(&["image/png"])), Some(stream));
    }

    #[test]
    fn test_erase_data_removes_matching_keys_only() {
        let erased = plot_output().erase(&set(&["text/plain"])).unwrap();
        let Output::DisplayData(data) = &erased else {
            panic!("expected display data");
        };
        assert_eq!(data.data.len(), 1);
        assert!(data.data.contains_key("image/png"));

        // a bare category names no data key
        let kept = erased.clone().erase(&set(&["image"])).unwrap();
        assert_eq!(kept, erased);
        assert!(erased.erase(&set(&["image/png"])).is_none());
    }

    #[test]
    fn test_byte_size_restricted() {
        let output = plot_output();
        let whole = output.byte_size(None);
        let png = output.byte_size(Some(&set(&["image/png"])));
        assert!(png > 0);
        assert!(png < whole);
        assert_eq!(output.byte_size(Some(&set(&["text/html"]))), 0);
        assert_eq!(output.byte_size(Some(&set(&["image"]))), 0);
    }

    #[test]
    fn test_error_to_str() {
        let error = Output::error(
            "ZeroDivisionError",
            "division by zero",
            vec!["Traceback (most recent call last):".into()],
        );
        assert_eq!(
            error.to_str(&RendererRegistry::default(), &RenderOptions::default()),
            "Traceback (most recent call last):\nZeroDivisionError: division by zero"
        );
    }

    #[test]
    fn test_data_to_str_priority_and_exclusion() {
        let renderers = RendererRegistry::default();
        let output = Output::execute_result(
            1,
            json!({"text/plain": "plain", "text/html": "<p>bold</p>"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(output.to_str(&renderers, &RenderOptions::default()), "bold");

        let options = RenderOptions {
            excluded: set(&["text/html"]),
            ..Default::default()
        };
        assert_eq!(output.to_str(&renderers, &options), "plain");

        let only_plain = RenderOptions {
            enabled: Some(set(&["text/plain"])),
            ..Default::default()
        };
        assert_eq!(output.to_str(&renderers, &only_plain), "plain");
    }

    #[test]
    fn test_data_to_str_falls_back_to_insertion_order() {
        let output = Output::display_data(
            json!({"application/json": {"a": 1}})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(
            output.to_str(&RendererRegistry::default(), &RenderOptions::default()),
            r#"{"a":1}"#
        );
    }
}
