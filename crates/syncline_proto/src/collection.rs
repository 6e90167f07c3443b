//! Collection keys and cached record documents.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Separator between resource and view in a key's string form.
const VIEW_SEPARATOR: &str = "::";

/// Error returned when a collection key string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid collection key: '{key}'")]
pub struct KeyParseError {
    /// The string that failed to parse.
    pub key: String,
}

/// Identity of one cached collection.
///
/// A key names a logical resource (`posts`, `jobs`) plus an optional view
/// discriminator for filtered or paged variants of it (`posts::feed-2`).
/// Two keys with the same resource refer to overlapping server content, so
/// a confirmed mutation on the resource staled all of them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CollectionKey {
    /// Logical resource name.
    pub resource: String,
    /// Optional view discriminator.
    pub view: Option<String>,
}

impl CollectionKey {
    /// Creates a key for a whole resource.
    #[must_use]
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            view: None,
        }
    }

    /// Creates a key for a filtered or paged view of a resource.
    #[must_use]
    pub fn with_view(resource: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            view: Some(view.into()),
        }
    }

    /// Returns `true` if this key's content belongs to `resource`.
    #[must_use]
    pub fn matches_resource(&self, resource: &str) -> bool {
        self.resource == resource
    }

    /// Returns the canonical string form used as a storage key.
    #[must_use]
    pub fn storage_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.view {
            Some(view) => write!(f, "{}{}{}", self.resource, VIEW_SEPARATOR, view),
            None => write!(f, "{}", self.resource),
        }
    }
}

impl FromStr for CollectionKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || KeyParseError { key: s.to_string() };

        let (resource, view) = match s.split_once(VIEW_SEPARATOR) {
            Some((resource, view)) => (resource, Some(view)),
            None => (s, None),
        };

        if resource.is_empty() || view.is_some_and(str::is_empty) {
            return Err(invalid());
        }

        Ok(Self {
            resource: resource.to_string(),
            view: view.map(str::to_string),
        })
    }
}

/// One record inside a cached collection.
///
/// The body is an opaque JSON document; the engine only ever touches it
/// for optimistic edits and identifies records by `id` alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDoc {
    /// Server-side (or, for unconfirmed creates, locally assigned) ID.
    pub id: String,
    /// Opaque record body.
    pub body: Value,
}

impl RecordDoc {
    /// Creates a record document.
    #[must_use]
    pub fn new(id: impl Into<String>, body: Value) -> Self {
        Self {
            id: id.into(),
            body,
        }
    }

    /// Reads a boolean field from the body.
    ///
    /// Returns `None` if the body is not an object, the field is missing,
    /// or the field is not a boolean.
    #[must_use]
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.body.get(name).and_then(Value::as_bool)
    }

    /// Sets a boolean field on the body.
    ///
    /// Returns `false` if the body is not an object, leaving it untouched.
    pub fn set_flag(&mut self, name: &str, enabled: bool) -> bool {
        match self.body.as_object_mut() {
            Some(map) => {
                map.insert(name.to_string(), Value::Bool(enabled));
                true
            }
            None => false,
        }
    }

    /// Applies a partial update to the body.
    ///
    /// When both the body and the patch are objects, top-level fields of
    /// the patch overwrite fields of the same name. Otherwise the patch
    /// replaces the body wholesale.
    pub fn merge(&mut self, patch: &Value) {
        match (self.body.as_object_mut(), patch.as_object()) {
            (Some(body), Some(patch)) => {
                for (field, value) in patch {
                    body.insert(field.clone(), value.clone());
                }
            }
            _ => self.body = patch.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_display_and_parse_roundtrip() {
        let plain = CollectionKey::new("posts");
        assert_eq!(plain.to_string(), "posts");
        assert_eq!("posts".parse::<CollectionKey>().unwrap(), plain);

        let viewed = CollectionKey::with_view("posts", "feed-2");
        assert_eq!(viewed.to_string(), "posts::feed-2");
        assert_eq!("posts::feed-2".parse::<CollectionKey>().unwrap(), viewed);
    }

    #[test]
    fn key_parse_rejects_empty_parts() {
        assert!("".parse::<CollectionKey>().is_err());
        assert!("::feed".parse::<CollectionKey>().is_err());
        assert!("posts::".parse::<CollectionKey>().is_err());
    }

    #[test]
    fn key_matches_resource() {
        let key = CollectionKey::with_view("posts", "feed-1");
        assert!(key.matches_resource("posts"));
        assert!(!key.matches_resource("jobs"));
    }

    #[test]
    fn flag_reads_booleans_only() {
        let doc = RecordDoc::new("p1", json!({"liked": true, "count": 3}));
        assert_eq!(doc.flag("liked"), Some(true));
        assert_eq!(doc.flag("count"), None);
        assert_eq!(doc.flag("missing"), None);
    }

    #[test]
    fn set_flag_on_object_body() {
        let mut doc = RecordDoc::new("p1", json!({"liked": false}));
        assert!(doc.set_flag("liked", true));
        assert_eq!(doc.flag("liked"), Some(true));

        // Inserts when absent
        assert!(doc.set_flag("pinned", true));
        assert_eq!(doc.flag("pinned"), Some(true));
    }

    #[test]
    fn set_flag_on_scalar_body_fails() {
        let mut doc = RecordDoc::new("p1", json!("just text"));
        assert!(!doc.set_flag("liked", true));
        assert_eq!(doc.body, json!("just text"));
    }

    #[test]
    fn merge_overwrites_top_level_fields() {
        let mut doc = RecordDoc::new("p1", json!({"title": "old", "count": 3}));
        doc.merge(&json!({"title": "new"}));
        assert_eq!(doc.body, json!({"title": "new", "count": 3}));
    }

    #[test]
    fn merge_replaces_non_object_bodies() {
        let mut doc = RecordDoc::new("p1", json!(["a", "b"]));
        doc.merge(&json!({"title": "new"}));
        assert_eq!(doc.body, json!({"title": "new"}));
    }
}
