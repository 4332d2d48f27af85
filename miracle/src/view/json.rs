//! JSON backend.

use serde_json::Value as Json;

use super::{DataView, Key, ViewKind};
use crate::error::{DocumentError, ViewError};
use crate::value::Value;

/// A parsed JSON document.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonDocument {
    root: Json,
}

impl JsonDocument {
    /// Parse UTF-8 JSON text.
    ///
    /// # Example
    /// ```
    /// use miracle::view::{DataView, JsonDocument};
    ///
    /// let doc = JsonDocument::parse(r#"{"name": "Alex"}"#).unwrap();
    /// assert_eq!(doc.root().child(&"name".into()).unwrap().as_scalar(), "Alex");
    /// ```
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        Ok(Self {
            root: serde_json::from_str(text)?,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        Ok(Self {
            root: serde_json::from_slice(bytes)?,
        })
    }

    pub fn from_value(root: Json) -> Self {
        Self { root }
    }

    pub fn root(&self) -> JsonView<'_> {
        JsonView { node: &self.root }
    }
}

/// View onto one JSON node.
#[derive(Debug, Clone, Copy)]
pub struct JsonView<'a> {
    node: &'a Json,
}

impl<'a> JsonView<'a> {
    pub fn new(node: &'a Json) -> Self {
        Self { node }
    }

    pub fn node(&self) -> &'a Json {
        self.node
    }
}

impl<'a> DataView for JsonView<'a> {
    const BACKEND: &'static str = "JSON";

    fn kind(&self) -> ViewKind {
        match self.node {
            Json::Object(_) => ViewKind::JsonObject,
            Json::Array(_) => ViewKind::JsonArray,
            _ => ViewKind::JsonScalar,
        }
    }

    fn child(&self, key: &Key) -> Result<Self, ViewError> {
        let child = match (self.node, key) {
            (Json::Object(map), Key::Name(name)) => map.get(name),
            (Json::Array(items), Key::Index(i)) => items.get(*i),
            _ => return Err(ViewError::mismatch(key, self.kind())),
        };
        child
            .map(JsonView::new)
            .ok_or_else(|| ViewError::not_found(key, self.kind()))
    }

    fn children(&self) -> Result<Vec<Self>, ViewError> {
        match self.node {
            Json::Array(items) => Ok(items.iter().map(JsonView::new).collect()),
            _ => Err(ViewError::mismatch("iteration", self.kind())),
        }
    }

    fn as_scalar(&self) -> Value {
        Value::from(self.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> JsonDocument {
        JsonDocument::parse(text).unwrap()
    }

    #[test]
    fn test_object_key_lookup() {
        let doc = doc(r#"{"a": {"c": {"name": "Alex", "age": 34}}}"#);
        let c = doc.root().child(&"a".into()).unwrap().child(&"c".into()).unwrap();
        assert_eq!(c.kind(), ViewKind::JsonObject);
        assert_eq!(c.child(&"name".into()).unwrap().as_scalar(), "Alex");
        assert_eq!(c.child(&"age".into()).unwrap().as_scalar(), 34);
    }

    #[test]
    fn test_missing_key_is_not_found() {
        let doc = doc(r#"{"a": 1}"#);
        let err = doc.root().child(&"b".into()).unwrap_err();
        assert!(matches!(err, ViewError::NotFound { .. }));
    }

    #[test]
    fn test_positional_lookup() {
        let doc = doc(r#"["Alex", 34]"#);
        assert_eq!(doc.root().child(&Key::Index(0)).unwrap().as_scalar(), "Alex");
        assert_eq!(doc.root().child(&Key::Index(1)).unwrap().as_scalar(), 34);
        assert!(matches!(
            doc.root().child(&Key::Index(2)).unwrap_err(),
            ViewError::NotFound { .. }
        ));
    }

    #[test]
    fn test_wrong_key_type_is_mismatch() {
        let object = doc(r#"{"a": 1}"#);
        assert!(matches!(
            object.root().child(&Key::Index(0)).unwrap_err(),
            ViewError::TypeMismatch { kind: ViewKind::JsonObject, .. }
        ));

        let array = doc("[1, 2]");
        assert!(matches!(
            array.root().child(&"a".into()).unwrap_err(),
            ViewError::TypeMismatch { kind: ViewKind::JsonArray, .. }
        ));

        let scalar = doc("3");
        assert!(matches!(
            scalar.root().child(&"a".into()).unwrap_err(),
            ViewError::TypeMismatch { kind: ViewKind::JsonScalar, .. }
        ));
    }

    #[test]
    fn test_children_only_on_arrays() {
        let array = doc(r#"[{"name": "Alex"}, {"name": "Den"}]"#);
        assert_eq!(array.root().children().unwrap().len(), 2);

        let object = doc(r#"{"name": "Alex"}"#);
        assert!(matches!(
            object.root().children().unwrap_err(),
            ViewError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_attributes_unsupported() {
        let doc = doc(r#"{"rank": 1}"#);
        assert!(matches!(
            doc.root().attribute("rank").unwrap_err(),
            ViewError::UnsupportedAction { backend: "JSON", .. }
        ));
    }

    #[test]
    fn test_composite_scalar_is_the_node_itself() {
        let doc = doc(r#"{"tags": ["a", "b"], "n": null}"#);
        let value = doc.root().as_scalar();
        let map = value.as_map().unwrap();
        assert_eq!(map["tags"], Value::List(vec!["a".into(), "b".into()]));
        assert!(map["n"].is_null());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            JsonDocument::parse("{oops"),
            Err(DocumentError::Json(_))
        ));
    }
}
