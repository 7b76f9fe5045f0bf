//! The parameter boundary.
//!
//! The host hands parameters over by name and input-item index through
//! [`ParameterSource`].  [`ItemParams`] is the typed view of one item used
//! while building a [`crate::dispatcher::ResourceOperation`]; every lookup
//! either yields a value of the right type or an
//! [`AdapterError::InvalidParams`], so malformed input is rejected before
//! any request is built.

use serde_json::{Map, Value};

use crate::error::{AdapterError, Result};

/// Supplies parameter values per input item.
pub trait ParameterSource: Send + Sync {
    /// The value of `name` for item `item_index`, if the item has one.
    fn get_parameter(&self, name: &str, item_index: usize) -> Option<Value>;

    /// Number of input items.
    fn item_count(&self) -> usize;
}

/// A [`ParameterSource`] over a list of JSON objects, one per item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonItems {
    items: Vec<Value>,
}

impl JsonItems {
    pub fn new(items: Vec<Value>) -> Self {
        Self { items }
    }

    /// A single-item source.
    pub fn single(item: Value) -> Self {
        Self { items: vec![item] }
    }
}

impl ParameterSource for JsonItems {
    fn get_parameter(&self, name: &str, item_index: usize) -> Option<Value> {
        self.items
            .get(item_index)
            .and_then(|item| item.get(name))
            .filter(|value| !value.is_null())
            .cloned()
    }

    fn item_count(&self) -> usize {
        self.items.len()
    }
}

/// Typed accessors over one item of a [`ParameterSource`].
pub struct ItemParams<'a> {
    source: &'a dyn ParameterSource,
    index: usize,
    operation: String,
}

impl<'a> ItemParams<'a> {
    /// View item `index`; `operation` labels validation errors.
    pub fn new(source: &'a dyn ParameterSource, index: usize, operation: impl Into<String>) -> Self {
        Self {
            source,
            index,
            operation: operation.into(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    fn invalid(&self, reason: impl Into<String>) -> AdapterError {
        AdapterError::invalid(self.operation.clone(), reason)
    }

    pub fn raw(&self, name: &str) -> Option<Value> {
        self.source.get_parameter(name, self.index)
    }

    /// A string parameter that must be present and non-blank.
    pub fn required_str(&self, name: &str) -> Result<String> {
        self.optional_str(name)?
            .ok_or_else(|| self.invalid(format!("`{name}` is required and must not be empty")))
    }

    /// A string parameter; blank strings count as absent.  Numbers are
    /// accepted and rendered as strings.
    pub fn optional_str(&self, name: &str) -> Result<Option<String>> {
        match self.raw(name) {
            None => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(self.invalid(format!("`{name}` must be a string, got {other}"))),
        }
    }

    pub fn str_or(&self, name: &str, default: &str) -> Result<String> {
        Ok(self.optional_str(name)?.unwrap_or_else(|| default.to_string()))
    }

    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool> {
        match self.raw(name) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(b),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                "" => Ok(default),
                _ => Err(self.invalid(format!("`{name}` must be a boolean, got \"{s}\""))),
            },
            Some(other) => Err(self.invalid(format!("`{name}` must be a boolean, got {other}"))),
        }
    }

    pub fn optional_u64(&self, name: &str) -> Result<Option<u64>> {
        match self.raw(name) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| self.invalid(format!("`{name}` must be a non-negative integer"))),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| self.invalid(format!("`{name}` must be a non-negative integer"))),
            Some(other) => Err(self.invalid(format!("`{name}` must be an integer, got {other}"))),
        }
    }

    pub fn required_u64(&self, name: &str) -> Result<u64> {
        self.optional_u64(name)?
            .ok_or_else(|| self.invalid(format!("`{name}` is required")))
    }

    /// An object parameter such as `additionalFields`; absent means empty.
    pub fn object(&self, name: &str) -> Result<Map<String, Value>> {
        match self.raw(name) {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map),
            Some(other) => Err(self.invalid(format!("`{name}` must be an object, got {other}"))),
        }
    }

    /// A comma-separated list (`"a, b,c"`); also accepts a JSON array of
    /// strings.  Empty entries are dropped.
    pub fn csv_list(&self, name: &str) -> Result<Vec<String>> {
        match self.raw(name) {
            None => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(s
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect()),
            Some(Value::Array(values)) => values
                .into_iter()
                .map(|value| match value {
                    Value::String(s) => Ok(s.trim().to_string()),
                    other => Err(self.invalid(format!("`{name}` entries must be strings, got {other}"))),
                })
                .filter(|entry| !matches!(entry, Ok(s) if s.is_empty()))
                .collect(),
            Some(other) => Err(self.invalid(format!("`{name}` must be a list, got {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params(item: Value) -> JsonItems {
        JsonItems::single(item)
    }

    #[test]
    fn json_items_index_by_item() {
        let items = JsonItems::new(vec![json!({"hostName": "a"}), json!({"hostName": "b"})]);
        assert_eq!(items.item_count(), 2);
        assert_eq!(items.get_parameter("hostName", 1), Some(json!("b")));
        assert_eq!(items.get_parameter("hostName", 2), None);
        assert_eq!(items.get_parameter("missing", 0), None);
    }

    #[test]
    fn required_str_rejects_blank() {
        let source = params(json!({"hostName": "  ", "title": "x"}));
        let p = ItemParams::new(&source, 0, "host.create");
        let err = p.required_str("hostName").unwrap_err();
        assert!(err.to_string().contains("`hostName` is required"));
        assert!(err.to_string().contains("host.create"));
        assert_eq!(p.required_str("title").unwrap(), "x");
    }

    #[test]
    fn numbers_are_accepted_as_strings() {
        let source = params(json!({"downtimeId": 42}));
        let p = ItemParams::new(&source, 0, "downtime.get");
        assert_eq!(p.required_str("downtimeId").unwrap(), "42");
    }

    #[test]
    fn booleans_and_integers_parse_from_strings() {
        let source = params(json!({"returnAll": "true", "limit": "10", "persistent": false}));
        let p = ItemParams::new(&source, 0, "x");
        assert!(p.bool_or("returnAll", false).unwrap());
        assert!(!p.bool_or("persistent", true).unwrap());
        assert!(p.bool_or("missing", true).unwrap());
        assert_eq!(p.optional_u64("limit").unwrap(), Some(10));
        assert_eq!(p.optional_u64("missing").unwrap(), None);
    }

    #[test]
    fn bad_types_are_rejected() {
        let source = params(json!({"limit": -1, "additionalFields": "nope", "flag": [1]}));
        let p = ItemParams::new(&source, 0, "x");
        assert!(p.optional_u64("limit").is_err());
        assert!(p.object("additionalFields").is_err());
        assert!(p.bool_or("flag", false).is_err());
    }

    #[test]
    fn object_defaults_to_empty() {
        let source = params(json!({}));
        let p = ItemParams::new(&source, 0, "x");
        assert!(p.object("additionalFields").unwrap().is_empty());
    }

    #[test]
    fn csv_list_splits_and_trims() {
        let source = params(json!({"sites": "prod, dr ,,edge", "perms": ["a", " b "]}));
        let p = ItemParams::new(&source, 0, "x");
        assert_eq!(p.csv_list("sites").unwrap(), vec!["prod", "dr", "edge"]);
        assert_eq!(p.csv_list("perms").unwrap(), vec!["a", "b"]);
        assert!(p.csv_list("missing").unwrap().is_empty());
    }
}
