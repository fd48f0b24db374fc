//! Key/typed-value persistence used by post-effect state load/save.

use std::collections::BTreeMap;
use std::path::Path;

use crate::foundation::error::{PostError, PostResult};

/// One persisted parameter.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// Text.
    Text(String),
    /// Linear RGBA colour.
    Color([f32; 4]),
}

impl ParamValue {
    /// Boolean value; integers are accepted as `!= 0`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Numeric value as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Integer value. Floats are not truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Colour value.
    pub fn as_color(&self) -> Option<[f32; 4]> {
        match self {
            Self::Color(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<[f32; 4]> for ParamValue {
    fn from(v: [f32; 4]) -> Self {
        Self::Color(v)
    }
}

/// Externally owned settings object.
pub trait ParamStore {
    /// Stored value, if any.
    fn get_parameter(&self, name: &str) -> Option<ParamValue>;
    /// Store or replace a value.
    fn set_parameter(&mut self, name: &str, value: ParamValue);
}

/// In-memory [`ParamStore`] that round-trips through JSON.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct RenderSettings {
    params: BTreeMap<String, ParamValue>,
}

impl RenderSettings {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Remove a parameter, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        self.params.remove(name)
    }

    /// Parameter names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// Serialize as pretty JSON.
    pub fn to_json_string(&self) -> PostResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PostError::serde(format!("render settings: {e}")))
    }

    /// Parse from JSON.
    pub fn from_json_str(s: &str) -> PostResult<Self> {
        serde_json::from_str(s).map_err(|e| PostError::serde(format!("render settings: {e}")))
    }

    /// Load from a JSON file.
    pub fn load(path: &Path) -> PostResult<Self> {
        let s = std::fs::read_to_string(path).map_err(|e| {
            PostError::serde(format!("read render settings '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&s)
    }

    /// Write as a JSON file.
    pub fn save(&self, path: &Path) -> PostResult<()> {
        std::fs::write(path, self.to_json_string()?).map_err(|e| {
            PostError::serde(format!("write render settings '{}': {e}", path.display()))
        })
    }
}

impl ParamStore for RenderSettings {
    fn get_parameter(&self, name: &str) -> Option<ParamValue> {
        self.params.get(name).cloned()
    }

    fn set_parameter(&mut self, name: &str, value: ParamValue) {
        self.params.insert(name.to_string(), value);
    }
}

/// Read view that prefixes every name with `"<prefix>/"`.
pub struct Section<'a> {
    inner: &'a dyn ParamStore,
    prefix: String,
}

impl<'a> Section<'a> {
    /// Scope `inner` under `prefix`.
    pub fn new(inner: &'a dyn ParamStore, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }
}

impl ParamStore for Section<'_> {
    fn get_parameter(&self, name: &str) -> Option<ParamValue> {
        self.inner
            .get_parameter(&format!("{}/{name}", self.prefix))
    }

    fn set_parameter(&mut self, name: &str, _value: ParamValue) {
        tracing::warn!(prefix = %self.prefix, name, "write through a read-only settings section ignored");
    }
}

/// Write view that prefixes every name with `"<prefix>/"`.
pub struct SectionMut<'a> {
    inner: &'a mut dyn ParamStore,
    prefix: String,
}

impl<'a> SectionMut<'a> {
    /// Scope `inner` under `prefix`.
    pub fn new(inner: &'a mut dyn ParamStore, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }
}

impl ParamStore for SectionMut<'_> {
    fn get_parameter(&self, name: &str) -> Option<ParamValue> {
        self.inner
            .get_parameter(&format!("{}/{name}", self.prefix))
    }

    fn set_parameter(&mut self, name: &str, value: ParamValue) {
        self.inner
            .set_parameter(&format!("{}/{name}", self.prefix), value);
    }
}

#[cfg(test)]
#[path = "../tests/unit/settings.rs"]
mod tests;
