//! Shared types used across fleet crates.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A nested attribute map. Leaves are scalars, inner nodes are objects.
pub type AttrMap = serde_json::Map<String, Value>;

/// Name of the site-wide defaults group.
pub const DEFAULTS_GROUP: &str = "xcatdefaults";

/// Look up a dotted path (`device_info.arch`) inside an attribute map.
///
/// Returns `None` if any segment is missing or an intermediate value is
/// not an object.
pub fn attr_at<'a>(attrs: &'a AttrMap, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = attrs.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Render a scalar attribute as a string. Objects and arrays yield `None`.
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

// ── Resource envelope ─────────────────────────────────────────────

/// Metadata block of a resource envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub name: String,
}

/// The `{ meta: { name }, spec: {...} }` envelope objects are exchanged in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub meta: Meta,
    pub spec: AttrMap,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceError {
    #[error("meta name should not be empty")]
    EmptyName,
    #[error("meta name {meta} is not the same as resource name {resource}")]
    NameMismatch { meta: String, resource: String },
}

impl Resource {
    pub fn new(name: impl Into<String>, spec: AttrMap) -> Self {
        Self {
            meta: Meta { name: name.into() },
            spec,
        }
    }

    /// Check the envelope. When `expected` is given the meta name must equal it.
    pub fn validate(&self, expected: Option<&str>) -> Result<(), ResourceError> {
        if self.meta.name.trim().is_empty() {
            return Err(ResourceError::EmptyName);
        }
        if let Some(expected) = expected {
            if self.meta.name != expected {
                return Err(ResourceError::NameMismatch {
                    meta: self.meta.name.clone(),
                    resource: expected.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> AttrMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn attr_at_walks_nested_objects() {
        let map = attrs(json!({"device_info": {"arch": "x86_64", "cpucount": 8}}));
        assert_eq!(attr_at(&map, "device_info.arch"), Some(&json!("x86_64")));
        assert_eq!(attr_at(&map, "device_info.cpucount"), Some(&json!(8)));
        assert!(attr_at(&map, "device_info.mtm").is_none());
        assert!(attr_at(&map, "device_info.arch.more").is_none());
    }

    #[test]
    fn scalar_string_skips_objects() {
        assert_eq!(scalar_string(&json!("a")), Some("a".to_string()));
        assert_eq!(scalar_string(&json!(12)), Some("12".to_string()));
        assert_eq!(scalar_string(&json!({"k": 1})), None);
    }

    #[test]
    fn resource_validation() {
        let res = Resource::new("node1", AttrMap::new());
        assert!(res.validate(None).is_ok());
        assert!(res.validate(Some("node1")).is_ok());
        assert_eq!(
            res.validate(Some("node2")),
            Err(ResourceError::NameMismatch {
                meta: "node1".to_string(),
                resource: "node2".to_string(),
            })
        );

        let empty = Resource::new("  ", AttrMap::new());
        assert_eq!(empty.validate(None), Err(ResourceError::EmptyName));
    }

    #[test]
    fn resource_json_shape() {
        let res = Resource::new("node1", attrs(json!({"role": "compute"})));
        let value = serde_json::to_value(&res).unwrap();
        assert_eq!(value, json!({"meta": {"name": "node1"}, "spec": {"role": "compute"}}));
    }
}
