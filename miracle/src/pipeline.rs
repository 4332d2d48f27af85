//! High-level helpers that go from raw input to a record.
//!
//! They combine format detection, document parsing and instantiation of a
//! schema's root definition.
//!
//! # Example
//!
//! ```rust,ignore
//! use miracle::pipeline::Extractor;
//! use miracle::schema::SchemaFile;
//!
//! let (schema, root) = SchemaFile::load("schemas/rss.json")?;
//! let feed = Extractor::new(&schema, root).extract_file("feed.xml", None)?;
//! println!("{}", feed["title"]);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, info};

use crate::engine::ResolveOptions;
use crate::error::{DocumentError, Error, Result};
use crate::schema::{DefinitionId, Schema};
use crate::value::Record;
use crate::view::tabular::{decode_content, detect_encoding};
use crate::view::{JsonDocument, TabularDocument, XmlDocument};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Xml,
    Csv,
}

impl Format {
    /// Guess the format from a file extension.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "json" => Some(Format::Json),
            "xml" | "rss" | "atom" => Some(Format::Xml),
            "csv" | "tsv" => Some(Format::Csv),
            _ => None,
        }
    }

    /// Guess the format from an HTTP `Content-Type` header.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type.split(';').next()?.trim().to_lowercase();
        if mime.ends_with("json") {
            Some(Format::Json)
        } else if mime.ends_with("xml") {
            Some(Format::Xml)
        } else if mime == "text/csv" || mime == "text/tab-separated-values" {
            Some(Format::Csv)
        } else {
            None
        }
    }

    /// Guess the format from the first meaningful byte of the content.
    ///
    /// Anything that is neither JSON nor XML is read as CSV.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let first = bytes.iter().find(|b| !b.is_ascii_whitespace())?;
        Some(match first {
            b'{' | b'[' => Format::Json,
            b'<' => Format::Xml,
            _ => Format::Csv,
        })
    }

    /// Extension first, then content.
    pub fn detect(path: Option<&Path>, bytes: &[u8]) -> Option<Self> {
        path.and_then(Self::from_extension).or_else(|| Self::sniff(bytes))
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Json => "json",
            Format::Xml => "xml",
            Format::Csv => "csv",
        })
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "xml" => Ok(Format::Xml),
            "csv" => Ok(Format::Csv),
            other => Err(format!("unknown format '{}' (expected json, xml or csv)", other)),
        }
    }
}

/// Decode text input, honouring a UTF-8 BOM and falling back to detection.
fn decode_text(bytes: &[u8]) -> std::result::Result<String, DocumentError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => {
            let encoding = detect_encoding(bytes);
            debug!(%encoding, "input is not UTF-8");
            decode_content(bytes, &encoding)
        }
    }
}

/// Applies the root definition of a schema to documents.
#[derive(Debug, Clone, Copy)]
pub struct Extractor<'s> {
    schema: &'s Schema,
    root: DefinitionId,
    options: ResolveOptions,
}

impl<'s> Extractor<'s> {
    pub fn new(schema: &'s Schema, root: DefinitionId) -> Self {
        Self {
            schema,
            root,
            options: ResolveOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Parse `input` as `format` and instantiate the root definition.
    pub fn extract_str(&self, format: Format, input: &str) -> Result<Record> {
        let record = match format {
            Format::Json => {
                let doc = JsonDocument::parse(input)?;
                self.schema.instantiate_with(self.root, doc.root(), &self.options)?
            }
            Format::Xml => {
                let doc = XmlDocument::parse(input)?;
                self.schema.instantiate_with(self.root, doc.root(), &self.options)?
            }
            Format::Csv => {
                let doc = TabularDocument::from_reader(input.as_bytes())?;
                self.schema.instantiate_with(self.root, doc.root(), &self.options)?
            }
        };
        Ok(record)
    }

    /// Like [`Self::extract_str`], detecting the format when not given.
    ///
    /// CSV input also gets encoding and delimiter detection.
    pub fn extract_bytes(&self, format: Option<Format>, bytes: &[u8]) -> Result<Record> {
        let format = format
            .or_else(|| Format::sniff(bytes))
            .ok_or_else(|| Error::UnknownFormat("input".to_string()))?;
        debug!(%format, bytes = bytes.len(), "extracting");

        match format {
            Format::Csv => {
                let doc = TabularDocument::from_bytes_auto(bytes)?;
                Ok(self.schema.instantiate_with(self.root, doc.root(), &self.options)?)
            }
            Format::Json | Format::Xml => self.extract_str(format, &decode_text(bytes)?),
        }
    }

    /// Read a file and extract a record from it.
    pub fn extract_file(&self, path: impl AsRef<Path>, format: Option<Format>) -> Result<Record> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let format = format
            .or_else(|| Format::detect(Some(path), &bytes))
            .ok_or_else(|| Error::UnknownFormat(path.display().to_string()))?;

        let record = self.extract_bytes(Some(format), &bytes)?;
        info!(path = %path.display(), %format, record = record.name(), "extracted record");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::Operation;
    use crate::schema::{Iterate, RecordBuilder, Registry};
    use crate::select;
    use std::io::Write;

    fn people_schema() -> (Schema, DefinitionId) {
        let mut registry = Registry::new();
        let person = registry
            .add(
                "Person",
                RecordBuilder::new()
                    .field("name", select![0usize])
                    .convert("age", select![1usize], Operation::ToInt),
            )
            .unwrap();
        let people = registry
            .add("People", RecordBuilder::new().field("rows", Iterate::all().record(person)))
            .unwrap();
        (registry.finish().unwrap(), people)
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(Format::from_extension(Path::new("feed.RSS")), Some(Format::Xml));
        assert_eq!(Format::from_extension(Path::new("data.json")), Some(Format::Json));
        assert_eq!(Format::from_extension(Path::new("noext")), None);

        assert_eq!(Format::sniff(b"  {\"a\":1}"), Some(Format::Json));
        assert_eq!(Format::sniff(b"\xEF\xBB\xBF<rss/>"), Some(Format::Xml));
        assert_eq!(Format::sniff(b"a,b\n"), Some(Format::Csv));
        assert_eq!(Format::sniff(b"   \n"), None);

        assert_eq!(
            Format::from_content_type("application/rss+xml; charset=utf-8"),
            Some(Format::Xml)
        );
        assert_eq!(Format::from_content_type("application/json"), Some(Format::Json));
        assert_eq!(Format::from_content_type("text/html"), None);

        assert_eq!("XML".parse::<Format>(), Ok(Format::Xml));
        assert!("yaml".parse::<Format>().is_err());
    }

    #[test]
    fn test_extract_str() {
        let mut registry = Registry::new();
        let user = registry
            .add("User", RecordBuilder::new().field("name", select!["name"]))
            .unwrap();
        let schema = registry.finish().unwrap();

        let record = Extractor::new(&schema, user)
            .extract_str(Format::Json, r#"{"name":"Alex"}"#)
            .unwrap();
        assert_eq!(record["name"], "Alex");

        let err = Extractor::new(&schema, user)
            .extract_str(Format::Json, "{")
            .unwrap_err();
        assert!(matches!(err, Error::Document(DocumentError::Json(_))));
    }

    #[test]
    fn test_extract_csv_file() {
        let (schema, people) = people_schema();
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "Alex;34").unwrap();
        writeln!(file, "Den;22").unwrap();

        let record = Extractor::new(&schema, people)
            .extract_file(file.path(), None)
            .unwrap();
        let rows = record["rows"].as_list().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].as_record().unwrap()["age"], 34);
    }

    #[test]
    fn test_extract_xml_bytes_with_bom() {
        let mut registry = Registry::new();
        let company = registry
            .add("Company", RecordBuilder::new().field("name", select!["name"]))
            .unwrap();
        let schema = registry.finish().unwrap();

        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("<company><name>Société</name></company>".as_bytes());

        let record = Extractor::new(&schema, company)
            .extract_bytes(None, &bytes)
            .unwrap();
        assert_eq!(record["name"], "Société");
    }

    #[test]
    fn test_unknown_format() {
        let (schema, people) = people_schema();
        let err = Extractor::new(&schema, people)
            .extract_bytes(None, b"  ")
            .unwrap_err();
        assert!(matches!(err, Error::UnknownFormat(_)));
    }

    #[test]
    fn test_depth_option_is_applied() {
        let mut registry = Registry::new();
        let node = registry.declare("Node").unwrap();
        registry
            .define(node, RecordBuilder::new().field("next", select!["next", node]))
            .unwrap();
        let schema = registry.finish().unwrap();

        let err = Extractor::new(&schema, node)
            .with_options(ResolveOptions::default().with_max_depth(2))
            .extract_str(Format::Json, r#"{"next":{"next":{"next":{}}}}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Resolve(e) if e.is_depth_exceeded()));
    }
}
