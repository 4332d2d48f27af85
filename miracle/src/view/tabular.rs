//! Tabular (CSV) backend.
//!
//! A document is either a table of rows or a single row. Rows and cells are
//! addressed by index only; there are no names and no attributes.
//!
//! Input forms:
//! - a readable stream, parsed with the `csv` crate (quoting supported)
//! - a single comma-joined line, split on commas
//! - an already-split list of cells
//! - raw bytes with encoding and delimiter auto-detection

use std::io::Read;

use super::{DataView, Key, ViewKind};
use crate::error::{DocumentError, ViewError};
use crate::value::Value;

/// Delimiters considered by [`detect_delimiter`], in order of preference.
const CANDIDATE_DELIMITERS: [char; 4] = [',', ';', '\t', '|'];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Shape {
    Table(Vec<Vec<String>>),
    Row(Vec<String>),
}

/// A parsed table or single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularDocument {
    shape: Shape,
}

impl TabularDocument {
    /// Read comma-separated rows from a stream. Every line is data.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DocumentError> {
        Self::from_reader_with(reader, b',', false)
    }

    /// Read delimited rows from a stream, optionally skipping a header line.
    ///
    /// Rows may have different lengths.
    pub fn from_reader_with<R: Read>(
        reader: R,
        delimiter: u8,
        has_headers: bool,
    ) -> Result<Self, DocumentError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(has_headers)
            .flexible(true)
            .from_reader(reader);

        let rows = csv_reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, csv::Error>>()?;

        Ok(Self {
            shape: Shape::Table(rows),
        })
    }

    /// A single row from a comma-joined line. No quoting rules apply.
    pub fn from_line(line: &str) -> Self {
        Self {
            shape: Shape::Row(line.split(',').map(str::to_string).collect()),
        }
    }

    /// A single row from already-split cells.
    pub fn from_cells<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            shape: Shape::Row(cells.into_iter().map(Into::into).collect()),
        }
    }

    /// Rows already split into cells.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            shape: Shape::Table(rows),
        }
    }

    /// Parse raw bytes, detecting the text encoding and the delimiter.
    pub fn from_bytes_auto(bytes: &[u8]) -> Result<Self, DocumentError> {
        if bytes.is_empty() {
            return Err(DocumentError::Empty);
        }
        let encoding = detect_encoding(bytes);
        let content = decode_content(bytes, &encoding)
            .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned());
        let delimiter = u8::try_from(detect_delimiter(&content)).unwrap_or(b',');
        tracing::debug!(%encoding, delimiter = %(delimiter as char), "decoded tabular input");

        Self::from_reader_with(content.as_bytes(), delimiter, false)
    }

    pub fn root(&self) -> TabularView<'_> {
        match &self.shape {
            Shape::Table(rows) => TabularView::Table(rows),
            Shape::Row(cells) => TabularView::Row(cells),
        }
    }

    /// Number of rows (1 for a single-row document).
    pub fn row_count(&self) -> usize {
        match &self.shape {
            Shape::Table(rows) => rows.len(),
            Shape::Row(_) => 1,
        }
    }
}

/// Detect the encoding of raw bytes using chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes with the named encoding.
pub fn decode_content(bytes: &[u8], encoding: &str) -> Result<String, DocumentError> {
    let codec = encoding_rs::Encoding::for_label(encoding.as_bytes())
        .ok_or_else(|| DocumentError::Encoding(format!("unknown encoding '{}'", encoding)))?;
    let (text, _, _) = codec.decode(bytes);
    Ok(text.into_owned())
}

/// Pick the candidate delimiter that occurs most often in the first line.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best = CANDIDATE_DELIMITERS[0];
    let mut best_count = 0;
    for &candidate in &CANDIDATE_DELIMITERS {
        let count = first_line.matches(candidate).count();
        if count > best_count {
            best_count = count;
            best = candidate;
        }
    }
    best
}

/// View onto a table, a row or a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularView<'a> {
    Table(&'a [Vec<String>]),
    Row(&'a [String]),
    Cell(&'a str),
}

impl<'a> DataView for TabularView<'a> {
    const BACKEND: &'static str = "tabular";

    fn kind(&self) -> ViewKind {
        match self {
            TabularView::Table(_) => ViewKind::Table,
            TabularView::Row(_) => ViewKind::Row,
            TabularView::Cell(_) => ViewKind::Cell,
        }
    }

    fn child(&self, key: &Key) -> Result<Self, ViewError> {
        let index = match key {
            Key::Index(i) => *i,
            Key::Name(_) => return Err(ViewError::mismatch(key, self.kind())),
        };
        let found = match self {
            TabularView::Table(rows) => rows.get(index).map(|row| TabularView::Row(row)),
            TabularView::Row(cells) => cells.get(index).map(|cell| TabularView::Cell(cell)),
            TabularView::Cell(_) => return Err(ViewError::mismatch(key, self.kind())),
        };
        found.ok_or_else(|| ViewError::not_found(key, self.kind()))
    }

    fn children(&self) -> Result<Vec<Self>, ViewError> {
        match self {
            TabularView::Table(rows) => Ok(rows.iter().map(|row| TabularView::Row(row)).collect()),
            TabularView::Row(cells) => Ok(cells.iter().map(|cell| TabularView::Cell(cell)).collect()),
            TabularView::Cell(_) => Err(ViewError::mismatch("iteration", self.kind())),
        }
    }

    fn as_scalar(&self) -> Value {
        fn row_value(cells: &[String]) -> Value {
            Value::List(cells.iter().map(|c| Value::from(c.as_str())).collect())
        }

        match self {
            TabularView::Table(rows) => Value::List(rows.iter().map(|r| row_value(r)).collect()),
            TabularView::Row(cells) => row_value(cells),
            TabularView::Cell(cell) => Value::from(*cell),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_rows_and_cells() {
        let doc = TabularDocument::from_reader("Alex,34\nDen,22\n".as_bytes()).unwrap();
        assert_eq!(doc.row_count(), 2);

        let second = doc.root().child(&Key::Index(1)).unwrap();
        assert_eq!(second.kind(), ViewKind::Row);
        assert_eq!(second.child(&Key::Index(0)).unwrap().as_scalar(), "Den");
    }

    #[test]
    fn test_stream_keeps_quoted_commas() {
        let doc = TabularDocument::from_reader("\"Doe, John\",41\n".as_bytes()).unwrap();
        let row = doc.root().child(&Key::Index(0)).unwrap();
        assert_eq!(row.child(&Key::Index(0)).unwrap().as_scalar(), "Doe, John");
    }

    #[test]
    fn test_header_is_skipped_on_request() {
        let csv = "name;age\nAlex;34\n";
        let doc = TabularDocument::from_reader_with(csv.as_bytes(), b';', true).unwrap();
        assert_eq!(doc.row_count(), 1);
        assert_eq!(
            doc.root().as_scalar(),
            Value::List(vec![Value::List(vec!["Alex".into(), "34".into()])])
        );
    }

    #[test]
    fn test_line_and_cells_are_single_rows() {
        let line = TabularDocument::from_line("Alex,34");
        assert_eq!(line.root().kind(), ViewKind::Row);
        assert_eq!(line.root().child(&Key::Index(1)).unwrap().as_scalar(), "34");

        let cells = TabularDocument::from_cells(["Alex", "34"]);
        assert_eq!(line, cells);
    }

    #[test]
    fn test_names_and_attributes_rejected() {
        let doc = TabularDocument::from_line("Alex,34");
        assert!(matches!(
            doc.root().child(&"name".into()).unwrap_err(),
            ViewError::TypeMismatch { kind: ViewKind::Row, .. }
        ));
        assert!(matches!(
            doc.root().attribute("name").unwrap_err(),
            ViewError::UnsupportedAction { backend: "tabular", .. }
        ));
    }

    #[test]
    fn test_out_of_range_and_cell_navigation() {
        let doc = TabularDocument::from_line("Alex,34");
        assert!(matches!(
            doc.root().child(&Key::Index(5)).unwrap_err(),
            ViewError::NotFound { .. }
        ));
        let cell = doc.root().child(&Key::Index(0)).unwrap();
        assert!(matches!(
            cell.children().unwrap_err(),
            ViewError::TypeMismatch { kind: ViewKind::Cell, .. }
        ));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_auto_parse() {
        let doc = TabularDocument::from_bytes_auto(b"Alex;34\nDen;22").unwrap();
        assert_eq!(doc.row_count(), 2);
        let cell = doc.root().child(&Key::Index(1)).unwrap().child(&Key::Index(1)).unwrap();
        assert_eq!(cell.as_scalar(), "22");
        assert!(matches!(
            TabularDocument::from_bytes_auto(b""),
            Err(DocumentError::Empty)
        ));
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
        assert!(matches!(
            decode_content(bytes, "klingon"),
            Err(DocumentError::Encoding(_))
        ));
    }
}
