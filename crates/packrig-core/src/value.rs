//! Option value model
//!
//! Configuration trees are built from [`OptionValue`]. A missing key is the
//! only representation of "undefined"; `Null` is a defined value.
//!
//! Values are cheap to deep-copy: maps and arrays are cloned, while callables
//! and plugins are shared behind `Arc`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;

use crate::plugin::PluginEntry;

/// Nested option mapping
pub type OptionMap = BTreeMap<String, OptionValue>;

type CallableFn = dyn Fn(&[OptionValue]) -> OptionValue + Send + Sync;

/// A function-valued option (e.g. a computed filename or runtime chunk name)
#[derive(Clone)]
pub struct Callable {
    name: String,
    func: Arc<CallableFn>,
}

impl Callable {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[OptionValue]) -> OptionValue + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[OptionValue]) -> OptionValue {
        (self.func)(args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({})", self.name)
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

/// A regular-expression option, kept as source text and compiled on use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    case_insensitive: bool,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            case_insensitive: false,
        }
    }

    pub fn case_insensitive(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            case_insensitive: true,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Compile and test the pattern against `text`
    pub fn is_match(&self, text: &str) -> Result<bool, regex_lite::Error> {
        let regex = regex_lite::RegexBuilder::new(&self.source)
            .case_insensitive(self.case_insensitive)
            .build()?;
        Ok(regex.is_match(text))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.source)?;
        if self.case_insensitive {
            write!(f, "i")?;
        }
        Ok(())
    }
}

/// A configuration value
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Pattern(Pattern),
    Array(Vec<OptionValue>),
    Object(OptionMap),
    Function(Callable),
    Plugin(PluginEntry),
}

impl OptionValue {
    /// Build an object value from key/value pairs
    pub fn object<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, OptionValue)>,
        K: Into<String>,
    {
        OptionValue::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build an array of string values
    pub fn strings(items: &[&str]) -> Self {
        OptionValue::Array(items.iter().map(|s| OptionValue::from(*s)).collect())
    }

    pub fn function<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[OptionValue]) -> OptionValue + Send + Sync + 'static,
    {
        OptionValue::Function(Callable::new(name, func))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OptionValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&OptionMap> {
        match self {
            OptionValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[OptionValue]> {
        match self {
            OptionValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            OptionValue::Function(callable) => Some(callable),
            _ => None,
        }
    }

    pub fn as_plugin(&self) -> Option<&PluginEntry> {
        match self {
            OptionValue::Plugin(plugin) => Some(plugin),
            _ => None,
        }
    }

    /// JavaScript-style truthiness, which the default rules are written against
    pub fn is_truthy(&self) -> bool {
        match self {
            OptionValue::Null => false,
            OptionValue::Bool(b) => *b,
            OptionValue::Number(n) => *n != 0.0 && !n.is_nan(),
            OptionValue::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Short type name used in validation messages
    pub fn type_name(&self) -> &'static str {
        match self {
            OptionValue::Null => "null",
            OptionValue::Bool(_) => "boolean",
            OptionValue::Number(_) => "number",
            OptionValue::String(_) => "string",
            OptionValue::Pattern(_) => "RegExp",
            OptionValue::Array(_) => "array",
            OptionValue::Object(_) => "object",
            OptionValue::Function(_) => "function",
            OptionValue::Plugin(_) => "plugin",
        }
    }

    /// Convert to a JSON value for display
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Truthiness of an optional value: absent counts as falsy
pub fn truthy(value: Option<&OptionValue>) -> bool {
    value.is_some_and(OptionValue::is_truthy)
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Number(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::String(value)
    }
}

impl From<Pattern> for OptionValue {
    fn from(value: Pattern) -> Self {
        OptionValue::Pattern(value)
    }
}

impl From<PluginEntry> for OptionValue {
    fn from(value: PluginEntry) -> Self {
        OptionValue::Plugin(value)
    }
}

impl From<OptionMap> for OptionValue {
    fn from(value: OptionMap) -> Self {
        OptionValue::Object(value)
    }
}

impl From<serde_json::Value> for OptionValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => OptionValue::Null,
            serde_json::Value::Bool(b) => OptionValue::Bool(b),
            serde_json::Value::Number(n) => OptionValue::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => OptionValue::String(s),
            serde_json::Value::Array(items) => {
                OptionValue::Array(items.into_iter().map(OptionValue::from).collect())
            }
            serde_json::Value::Object(map) => OptionValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, OptionValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for OptionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OptionValue::Null => serializer.serialize_unit(),
            OptionValue::Bool(b) => serializer.serialize_bool(*b),
            OptionValue::Number(n) => {
                if n.is_nan() {
                    serializer.serialize_str("NaN")
                } else if n.is_infinite() {
                    serializer.serialize_str(if *n > 0.0 { "Infinity" } else { "-Infinity" })
                } else if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            OptionValue::String(s) => serializer.serialize_str(s),
            OptionValue::Pattern(p) => serializer.serialize_str(&p.to_string()),
            OptionValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            OptionValue::Object(map) => serializer.collect_map(map),
            OptionValue::Function(callable) => {
                serializer.serialize_str(&format!("[function {}]", callable.name()))
            }
            OptionValue::Plugin(plugin) => {
                serializer.serialize_str(&format!("[plugin {}]", plugin.name()))
            }
        }
    }
}

/// Closed view over the shape of a possibly-absent value
///
/// Normalizing rules match on this instead of probing types ad hoc.
#[derive(Debug, Clone, Copy)]
pub enum Shape<'a> {
    Absent,
    Scalar(&'a OptionValue),
    Sequence(&'a [OptionValue]),
    Callable(&'a Callable),
    Mapping(&'a OptionMap),
}

impl<'a> Shape<'a> {
    pub fn of(value: Option<&'a OptionValue>) -> Self {
        match value {
            None => Shape::Absent,
            Some(OptionValue::Array(items)) => Shape::Sequence(items),
            Some(OptionValue::Function(callable)) => Shape::Callable(callable),
            Some(OptionValue::Object(map)) => Shape::Mapping(map),
            Some(other) => Shape::Scalar(other),
        }
    }

    /// Owned copy of the viewed value; `None` when absent
    pub fn to_value(self) -> Option<OptionValue> {
        match self {
            Shape::Absent => None,
            Shape::Scalar(value) => Some(value.clone()),
            Shape::Sequence(items) => Some(OptionValue::Array(items.to_vec())),
            Shape::Callable(callable) => Some(OptionValue::Function(callable.clone())),
            Shape::Mapping(map) => Some(OptionValue::Object(map.clone())),
        }
    }

    /// Shallow copy into a fresh mapping; non-mapping shapes yield an empty one
    pub fn to_mapping(self) -> OptionMap {
        match self {
            Shape::Mapping(map) => map.clone(),
            _ => OptionMap::new(),
        }
    }
}

/// Look up a dot-separated path
///
/// Every intermediate segment must be an object; anything else yields `None`.
pub fn lookup<'a>(root: &'a OptionMap, path: &str) -> Option<&'a OptionValue> {
    let segments: Vec<&str> = path.split('.').collect();
    lookup_segments(root, &segments)
}

pub(crate) fn lookup_segments<'a, S: AsRef<str>>(
    root: &'a OptionMap,
    segments: &[S],
) -> Option<&'a OptionValue> {
    let (last, parents) = segments.split_last()?;
    let mut current = root;
    for segment in parents {
        match current.get(segment.as_ref()) {
            Some(OptionValue::Object(map)) => current = map,
            _ => return None,
        }
    }
    current.get(last.as_ref())
}
