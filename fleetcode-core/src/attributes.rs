//! Generic attribute trees and their flattened form.
//!
//! Probed stream metadata and the policy's predicate documents are nested
//! key/value trees. Matching works on the flattened form: every leaf is
//! addressed by its dotted path (`tags.language`, `disposition.default`),
//! with list elements addressed by position (`side_data.0.type`).

use std::collections::BTreeMap;

/// A nested attribute value, independent of the document library it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Num(String),
    Bool(bool),
    Null,
    Map(BTreeMap<String, AttrValue>),
    List(Vec<AttrValue>),
}

impl AttrValue {
    /// Looks up a direct child of a map value.
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        match self {
            AttrValue::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Returns the string form of a leaf; `None` for maps and lists.
    pub fn as_leaf_string(&self) -> Option<String> {
        match self {
            AttrValue::Str(s) | AttrValue::Num(s) => Some(s.clone()),
            AttrValue::Bool(b) => Some(b.to_string()),
            AttrValue::Null => Some(String::new()),
            AttrValue::Map(_) | AttrValue::List(_) => None,
        }
    }

    /// True for maps and lists with no children, and for null.
    pub fn is_empty(&self) -> bool {
        match self {
            AttrValue::Map(map) => map.is_empty(),
            AttrValue::List(list) => list.is_empty(),
            AttrValue::Null => true,
            _ => false,
        }
    }
}

impl From<serde_json::Value> for AttrValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => AttrValue::Null,
            serde_json::Value::Bool(b) => AttrValue::Bool(b),
            serde_json::Value::Number(n) => AttrValue::Num(n.to_string()),
            serde_json::Value::String(s) => AttrValue::Str(s),
            serde_json::Value::Array(items) => {
                AttrValue::List(items.into_iter().map(AttrValue::from).collect())
            }
            serde_json::Value::Object(map) => AttrValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, AttrValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&serde_json::Value> for AttrValue {
    fn from(value: &serde_json::Value) -> Self {
        AttrValue::from(value.clone())
    }
}

/// Flattens a tree into a map of dotted leaf path to leaf string.
///
/// A bare leaf at the root flattens to an empty map, since it has no path.
/// Empty maps and lists contribute nothing.
pub fn flatten(value: &AttrValue) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    flatten_into(value, None, &mut out);
    out
}

fn flatten_into(value: &AttrValue, prefix: Option<&str>, out: &mut BTreeMap<String, String>) {
    let join = |key: &str| match prefix {
        Some(p) => format!("{p}.{key}"),
        None => key.to_string(),
    };

    match value {
        AttrValue::Map(map) => {
            for (key, child) in map {
                let path = join(key);
                flatten_into(child, Some(&path), out);
            }
        }
        AttrValue::List(items) => {
            for (i, child) in items.iter().enumerate() {
                let path = join(&i.to_string());
                flatten_into(child, Some(&path), out);
            }
        }
        leaf => {
            if let (Some(path), Some(text)) = (prefix, leaf.as_leaf_string()) {
                out.insert(path.to_string(), text);
            }
        }
    }
}
