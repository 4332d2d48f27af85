//! JSON schema files.
//!
//! A schema file lists record definitions by name. Fields carry an `action`
//! tag plus its parameters, and an optional `convert` chain:
//!
//! ```json
//! {
//!   "root": "Feed",
//!   "records": [
//!     { "name": "Feed", "fields": [
//!       { "name": "title", "action": "select", "path": ["channel", "title"] },
//!       { "name": "posts", "action": "select",
//!         "path": ["channel", { "action": "iterate", "over": "item", "each": { "record": "Post" } }] }
//!     ] },
//!     { "name": "Post", "fields": [
//!       { "name": "title", "action": "select", "path": ["title"] },
//!       { "name": "published", "action": "select", "path": ["pubDate"],
//!         "convert": [{ "type": "parse_timestamp", "format": "rfc2822" }] }
//!     ] }
//!   ]
//! }
//! ```
//!
//! Path steps are strings (keys), integers (indices), `{"attr": name}` or a
//! nested action object. Record names may be used before they are defined.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::action::{Action, Each, Iterate, Step};
use super::registry::{DefinitionId, FieldBinding, RecordBuilder, Registry, Schema};
use crate::convert::Operation;
use crate::error::SchemaError;
use crate::view::Key;

/// A schema as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaFile {
    /// Version of the file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Record applied to the document root
    pub root: String,

    pub records: Vec<RecordSpec>,
}

fn default_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSpec {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,

    #[serde(flatten)]
    pub action: ActionSpec,

    /// Ordered list of operations applied to the resolved value
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub convert: Vec<Operation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionSpec {
    Select {
        #[serde(default)]
        path: Vec<StepSpec>,
        /// Record applied at the end of the path
        #[serde(default, skip_serializing_if = "Option::is_none")]
        record: Option<String>,
    },
    Iterate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        over: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        each: Option<EachSpec>,
    },
    Identity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepSpec {
    Index(usize),
    Name(String),
    Attribute { attr: String },
    Nested(Box<ActionSpec>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeySpec {
    Index(usize),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EachSpec {
    Key(KeySpec),
    Attr(String),
    Action(Box<ActionSpec>),
    Record(String),
}

impl From<&KeySpec> for Key {
    fn from(spec: &KeySpec) -> Self {
        match spec {
            KeySpec::Index(i) => Key::Index(*i),
            KeySpec::Name(name) => Key::Name(name.clone()),
        }
    }
}

/// Resolves record names while translating one field.
struct FieldContext<'r> {
    registry: &'r Registry,
    record: &'r str,
    field: &'r str,
}

impl FieldContext<'_> {
    fn resolve(&self, target: &str) -> Result<DefinitionId, SchemaError> {
        self.registry
            .lookup(target)
            .ok_or_else(|| SchemaError::UnknownReference {
                record: self.record.to_string(),
                field: self.field.to_string(),
                target: target.to_string(),
            })
    }

    fn action(&self, spec: &ActionSpec) -> Result<Action, SchemaError> {
        match spec {
            ActionSpec::Identity => Ok(Action::Identity),
            ActionSpec::Select { path, record } => {
                let mut steps = path
                    .iter()
                    .map(|step| self.step(step))
                    .collect::<Result<Vec<_>, _>>()?;
                if let Some(target) = record {
                    steps.push(Step::Record(self.resolve(target)?));
                }
                Ok(Action::Select(steps))
            }
            ActionSpec::Iterate { over, each } => Ok(Action::Iterate(Iterate {
                over: over.clone(),
                each: each.as_ref().map(|e| self.each(e)).transpose()?,
            })),
        }
    }

    fn step(&self, spec: &StepSpec) -> Result<Step, SchemaError> {
        Ok(match spec {
            StepSpec::Index(i) => Step::Key(Key::Index(*i)),
            StepSpec::Name(name) => Step::Key(Key::Name(name.clone())),
            StepSpec::Attribute { attr } => Step::Attribute(attr.clone()),
            StepSpec::Nested(action) => Step::Action(self.action(action)?),
        })
    }

    fn each(&self, spec: &EachSpec) -> Result<Each, SchemaError> {
        Ok(match spec {
            EachSpec::Key(key) => Each::Key(key.into()),
            EachSpec::Attr(name) => Each::Attribute(name.clone()),
            EachSpec::Action(action) => Each::Action(Box::new(self.action(action)?)),
            EachSpec::Record(target) => Each::Record(self.resolve(target)?),
        })
    }
}

impl SchemaFile {
    /// Parse a schema file from a JSON string
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Serialize to a pretty JSON string
    pub fn to_json(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Register every record and return the frozen schema with its root.
    ///
    /// All names are declared before any field is translated, so records can
    /// refer to each other in any order.
    pub fn build(&self) -> Result<(Schema, DefinitionId), SchemaError> {
        let mut registry = Registry::new();
        let ids = self
            .records
            .iter()
            .map(|record| registry.declare(record.name.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        for (record, id) in self.records.iter().zip(ids) {
            let mut builder = RecordBuilder::new();
            for field in &record.fields {
                let context = FieldContext {
                    registry: &registry,
                    record: &record.name,
                    field: &field.name,
                };
                let mut binding = FieldBinding::new(field.name.clone(), context.action(&field.action)?);
                if !field.convert.is_empty() {
                    binding = binding.with_converter(field.convert.clone());
                }
                builder = builder.binding(binding);
            }
            registry.define(id, builder)?;
        }

        let root = registry
            .lookup(&self.root)
            .ok_or_else(|| SchemaError::NotDeclared(self.root.clone()))?;
        Ok((registry.finish()?, root))
    }

    /// Read and build a schema file in one go.
    pub fn load(path: impl AsRef<Path>) -> Result<(Schema, DefinitionId), SchemaError> {
        Self::from_path(path)?.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use crate::view::{JsonDocument, XmlDocument};

    const RSS_SCHEMA: &str = include_str!("../../schemas/rss.json");

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title> Example Feed </title>
    <link>https://example.org/</link>
    <description>Things happen</description>
    <language>en</language>
    <item>
      <title>First post</title>
      <link>https://example.org/first</link>
      <pubDate>Mon, 04 Nov 2019 13:25:58 GMT</pubDate>
      <guid isPermaLink="true">https://example.org/first</guid>
      <category>Rust</category>
      <category> Parsing </category>
    </item>
    <item>
      <title>Draft without a date</title>
      <link>https://example.org/draft</link>
      <guid>draft</guid>
    </item>
    <item>
      <title>Second post</title>
      <link>https://example.org/second</link>
      <pubDate>Tue, 05 Nov 2019 08:00:00 +0100</pubDate>
      <guid>https://example.org/second</guid>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_rss_schema_extracts_feed() {
        let (schema, root) = SchemaFile::from_json(RSS_SCHEMA).unwrap().build().unwrap();
        let doc = XmlDocument::parse(FEED).unwrap();

        let feed = schema.instantiate(root, doc.root()).unwrap();
        assert_eq!(feed.name(), "Feed");
        assert_eq!(feed["title"], "Example Feed");
        assert_eq!(feed["language"], "en");

        // The undated draft fails to resolve and is skipped.
        let posts = feed["posts"].as_list().unwrap();
        assert_eq!(posts.len(), 2);

        let first = posts[0].as_record().unwrap();
        assert_eq!(first["title"], "First post");
        assert_eq!(
            first["published"].as_timestamp().unwrap().to_string(),
            "2019-11-04 13:25:58"
        );
        assert_eq!(
            first["categories"],
            Value::List(vec!["rust".into(), "parsing".into()])
        );

        let second = posts[1].as_record().unwrap();
        assert_eq!(
            second["published"].as_timestamp().unwrap().to_string(),
            "2019-11-05 07:00:00"
        );
        assert_eq!(second["categories"], Value::List(vec![]));
    }

    #[test]
    fn test_field_order_follows_file() {
        let (schema, root) = SchemaFile::from_json(RSS_SCHEMA).unwrap().build().unwrap();
        let names: Vec<&str> = schema
            .definition(root)
            .unwrap()
            .fields()
            .iter()
            .map(|f| f.name())
            .collect();
        assert_eq!(names, ["title", "link", "description", "language", "posts"]);
    }

    #[test]
    fn test_serialization_round_trip() {
        let file = SchemaFile::from_json(RSS_SCHEMA).unwrap();
        let again = SchemaFile::from_json(&file.to_json().unwrap()).unwrap();
        assert_eq!(file, again);
    }

    #[test]
    fn test_step_kinds() {
        let file = SchemaFile::from_json(
            r#"{
                "root": "Country",
                "records": [{
                    "name": "Country",
                    "fields": [
                        {"name": "name", "action": "select", "path": ["name"]},
                        {"name": "rank", "action": "select", "path": [{"attr": "rank"}],
                         "convert": [{"type": "to_int"}]},
                        {"name": "neighbors", "action": "iterate", "over": "neighbor",
                         "each": {"attr": "name"}},
                        {"name": "text", "action": "identity"}
                    ]
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(file.version, "1.0");

        let (schema, root) = file.build().unwrap();
        let doc = XmlDocument::parse(
            r#"<country rank="1"><name>Liechtenstein</name><neighbor name="Austria"/><neighbor name="Switzerland"/></country>"#,
        )
        .unwrap();
        let country = schema.instantiate(root, doc.root()).unwrap();
        assert_eq!(country["rank"], 1);
        assert_eq!(
            country["neighbors"],
            Value::List(vec!["Austria".into(), "Switzerland".into()])
        );
        assert!(country["text"].is_null());
    }

    #[test]
    fn test_index_steps_and_record_terminal() {
        let file = SchemaFile::from_json(
            r#"{
                "root": "Data",
                "records": [
                    {"name": "Data", "fields": [
                        {"name": "first", "action": "select", "path": ["users", 0], "record": "User"},
                        {"name": "logins", "action": "select",
                         "path": ["users", {"action": "iterate", "each": {"key": "login"}}]}
                    ]},
                    {"name": "User", "fields": [
                        {"name": "login", "action": "select", "path": ["login"]}
                    ]}
                ]
            }"#,
        )
        .unwrap();
        let (schema, root) = file.build().unwrap();
        let doc = JsonDocument::parse(r#"{"users":[{"login":"alex"},{"login":"den"}]}"#).unwrap();

        let data = schema.instantiate(root, doc.root()).unwrap();
        assert_eq!(data["first"].as_record().unwrap()["login"], "alex");
        assert_eq!(data["logins"], Value::List(vec!["alex".into(), "den".into()]));
    }

    #[test]
    fn test_unknown_reference() {
        let file = SchemaFile::from_json(
            r#"{"root": "Data", "records": [{"name": "Data", "fields": [
                {"name": "user", "action": "select", "path": ["user"], "record": "User"}
            ]}]}"#,
        )
        .unwrap();
        assert!(matches!(
            file.build(),
            Err(SchemaError::UnknownReference { target, .. }) if target == "User"
        ));
    }

    #[test]
    fn test_unknown_root() {
        let file = SchemaFile::from_json(r#"{"root": "Missing", "records": []}"#).unwrap();
        assert!(matches!(file.build(), Err(SchemaError::NotDeclared(name)) if name == "Missing"));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rss.json");
        std::fs::write(&path, RSS_SCHEMA).unwrap();

        let (schema, root) = SchemaFile::load(&path).unwrap();
        assert_eq!(schema.lookup("Feed"), Some(root));
        assert!(matches!(
            SchemaFile::load(dir.path().join("absent.json")),
            Err(SchemaError::Io(_))
        ));
    }
}
