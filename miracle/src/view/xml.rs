//! XML backend.
//!
//! The document is parsed with `roxmltree` and copied into an owned element
//! tree. Namespaced tags and attributes are spelled `{namespace-uri}local`.
//!
//! Navigation rules:
//! - a child element without child elements collapses to its text
//! - a missing attribute yields a [`XmlView::Missing`] view (scalar `Null`)
//!   while a missing element is `NotFound`
//! - iteration drops elements that fail to resolve
//!
//! Documents nesting deeper than [`MAX_DEPTH`] elements are rejected before
//! parsing, since the parser recurses once per element.

use super::{DataView, IteratePolicy, Key, ViewKind};
use crate::error::{DocumentError, ViewError};
use crate::value::Value;

/// Deepest element nesting accepted by [`XmlDocument::parse`].
pub const MAX_DEPTH: usize = 256;

/// An owned XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlElement>,
    text: Option<String>,
}

impl XmlElement {
    fn open(node: roxmltree::Node<'_, '_>) -> Self {
        let name = node.tag_name();
        Self {
            tag: qualified_name(name.namespace(), name.name()),
            attributes: node
                .attributes()
                .map(|attr| (qualified_name(attr.namespace(), attr.name()), attr.value().to_string()))
                .collect(),
            children: Vec::new(),
            text: None,
        }
    }

    fn append_text(&mut self, text: &str) {
        self.text.get_or_insert_with(String::new).push_str(text);
    }

    /// Drop indentation-only text of elements that have child elements.
    fn close(&mut self) {
        let blank = self.text.as_deref().map_or(false, |t| t.trim().is_empty());
        if blank && !self.children.is_empty() {
            self.text = None;
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn children(&self) -> &[XmlElement] {
        &self.children
    }

    /// Direct text content, `None` when the element has none.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

impl Drop for XmlElement {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut element) = pending.pop() {
            pending.append(&mut element.children);
        }
    }
}

fn qualified_name(namespace: Option<&str>, local: &str) -> String {
    match namespace {
        Some(ns) => format!("{{{}}}{}", ns, local),
        None => local.to_string(),
    }
}

/// Copy a parsed element subtree without recursion.
fn build_tree(root: roxmltree::Node<'_, '_>) -> XmlElement {
    let mut stack = vec![(XmlElement::open(root), root.children())];
    let mut finished = None;

    loop {
        let next = match stack.last_mut() {
            Some((_, pending)) => pending.next(),
            None => break,
        };
        match next {
            Some(node) if node.is_element() => {
                stack.push((XmlElement::open(node), node.children()));
            }
            Some(node) => {
                if let (true, Some(text), Some((element, _))) =
                    (node.is_text(), node.text(), stack.last_mut())
                {
                    element.append_text(text);
                }
            }
            None => {
                if let Some((mut done, _)) = stack.pop() {
                    done.close();
                    match stack.last_mut() {
                        Some((parent, _)) => parent.children.push(done),
                        None => finished = Some(done),
                    }
                }
            }
        }
    }

    finished.unwrap_or_default()
}

/// Deepest element nesting of `text`.
///
/// A lightweight scan: comments, CDATA sections, processing instructions and
/// declarations are skipped, quoted attribute values may contain `>`.
fn nesting_depth(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut deepest = 0usize;
    let mut pos = 0;

    while let Some(offset) = bytes[pos..].iter().position(|&b| b == b'<') {
        let start = pos + offset;
        let rest = &bytes[start..];
        pos = if rest.starts_with(b"<!--") {
            skip_past(bytes, start + 4, b"-->")
        } else if rest.starts_with(b"<![CDATA[") {
            skip_past(bytes, start + 9, b"]]>")
        } else if rest.starts_with(b"<?") {
            skip_past(bytes, start + 2, b"?>")
        } else if rest.starts_with(b"<!") {
            skip_declaration(bytes, start + 2)
        } else if rest.starts_with(b"</") {
            depth = depth.saturating_sub(1);
            skip_past(bytes, start + 2, b">")
        } else {
            let (end, self_closing) = scan_start_tag(bytes, start + 1);
            if !self_closing {
                depth += 1;
                deepest = deepest.max(depth);
            }
            end
        };
    }

    deepest
}

fn skip_past(bytes: &[u8], from: usize, terminator: &[u8]) -> usize {
    let from = from.min(bytes.len());
    bytes[from..]
        .windows(terminator.len())
        .position(|w| w == terminator)
        .map_or(bytes.len(), |p| from + p + terminator.len())
}

/// `<!DOCTYPE ...>` may carry an internal subset in brackets.
fn skip_declaration(bytes: &[u8], from: usize) -> usize {
    let mut brackets = 0usize;
    let mut quote = None;
    for (offset, &b) in bytes[from..].iter().enumerate() {
        match (quote, b) {
            (Some(q), _) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'[') => brackets += 1,
            (None, b']') => brackets = brackets.saturating_sub(1),
            (None, b'>') if brackets == 0 => return from + offset + 1,
            _ => {}
        }
    }
    bytes.len()
}

/// End of a start tag and whether it closes itself.
fn scan_start_tag(bytes: &[u8], from: usize) -> (usize, bool) {
    let mut quote = None;
    for (offset, &b) in bytes[from..].iter().enumerate() {
        match (quote, b) {
            (Some(q), _) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'>') => {
                let self_closing = offset > 0 && bytes[from + offset - 1] == b'/';
                return (from + offset + 1, self_closing);
            }
            _ => {}
        }
    }
    (bytes.len(), false)
}

/// A parsed XML document holding a single element tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    root: XmlElement,
}

impl XmlDocument {
    /// Parse UTF-8 XML text. Surrounding whitespace is ignored.
    ///
    /// Fails with [`DocumentError::TooDeep`] past [`MAX_DEPTH`] nested elements.
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(DocumentError::Empty);
        }
        if nesting_depth(trimmed) > MAX_DEPTH {
            return Err(DocumentError::TooDeep { limit: MAX_DEPTH });
        }
        let parsed = roxmltree::Document::parse(trimmed)?;
        Ok(Self {
            root: build_tree(parsed.root_element()),
        })
    }

    pub fn root_element(&self) -> &XmlElement {
        &self.root
    }

    pub fn root(&self) -> XmlView<'_> {
        XmlView::Element(&self.root)
    }
}

/// View onto an XML element, a collapsed text node or a missing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlView<'a> {
    Element(&'a XmlElement),
    Text(&'a str),
    Missing,
}

impl<'a> XmlView<'a> {
    fn element(&self, operation: impl ToString) -> Result<&'a XmlElement, ViewError> {
        match self {
            XmlView::Element(e) => Ok(e),
            _ => Err(ViewError::mismatch(operation, self.kind())),
        }
    }
}

impl<'a> DataView for XmlView<'a> {
    const BACKEND: &'static str = "XML";

    fn kind(&self) -> ViewKind {
        match self {
            XmlView::Element(_) => ViewKind::XmlElement,
            XmlView::Text(_) => ViewKind::XmlText,
            XmlView::Missing => ViewKind::XmlMissing,
        }
    }

    fn child(&self, key: &Key) -> Result<Self, ViewError> {
        let element = self.element(key)?;
        let tag = match key {
            Key::Name(tag) => tag,
            Key::Index(_) => return Err(ViewError::mismatch(key, self.kind())),
        };
        let found = element
            .children
            .iter()
            .find(|child| &child.tag == tag)
            .ok_or_else(|| ViewError::not_found(key, self.kind()))?;

        if found.is_leaf() {
            Ok(found.text().map_or(XmlView::Missing, XmlView::Text))
        } else {
            Ok(XmlView::Element(found))
        }
    }

    fn attribute(&self, name: &str) -> Result<Self, ViewError> {
        let element = self.element(format!("attribute {:?}", name))?;
        Ok(element
            .attribute(name)
            .map_or(XmlView::Missing, XmlView::Text))
    }

    fn children(&self) -> Result<Vec<Self>, ViewError> {
        let element = self.element("iteration")?;
        Ok(element.children.iter().map(XmlView::Element).collect())
    }

    fn children_named(&self, name: &str) -> Result<Vec<Self>, ViewError> {
        let element = self.element(format!("iteration over {:?}", name))?;
        Ok(element
            .children
            .iter()
            .filter(|child| child.tag == name)
            .map(XmlView::Element)
            .collect())
    }

    fn as_scalar(&self) -> Value {
        match self {
            XmlView::Element(e) => e.text().map_or(Value::Null, Value::from),
            XmlView::Text(t) => Value::from(*t),
            XmlView::Missing => Value::Null,
        }
    }

    fn iterate_policy(&self) -> IteratePolicy {
        IteratePolicy::SkipFailed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTRY: &str = r#"
        <country rank="1" year="2008">
            <name>Liechtenstein</name>
            <gdppc>141100</gdppc>
            <neighbor name="Austria" direction="E"/>
            <neighbor name="Switzerland" direction="W"/>
        </country>
    "#;

    fn country() -> XmlDocument {
        XmlDocument::parse(COUNTRY).unwrap()
    }

    #[test]
    fn test_leaf_child_collapses_to_text() {
        let doc = country();
        let name = doc.root().child(&"name".into()).unwrap();
        assert_eq!(name, XmlView::Text("Liechtenstein"));
        assert_eq!(name.as_scalar(), "Liechtenstein");
    }

    #[test]
    fn test_first_matching_child_wins() {
        let doc = XmlDocument::parse("<a><b><c>1</c></b><b><c>2</c></b></a>").unwrap();
        let c = doc
            .root()
            .child(&"b".into())
            .unwrap()
            .child(&"c".into())
            .unwrap();
        assert_eq!(c.as_scalar(), "1");
    }

    #[test]
    fn test_attribute_lookup_and_missing_sentinel() {
        let doc = country();
        assert_eq!(doc.root().attribute("rank").unwrap().as_scalar(), "1");

        let missing = doc.root().attribute("capital").unwrap();
        assert_eq!(missing, XmlView::Missing);
        assert!(missing.as_scalar().is_null());
    }

    #[test]
    fn test_missing_element_is_not_found() {
        let doc = country();
        assert!(matches!(
            doc.root().child(&"capital".into()).unwrap_err(),
            ViewError::NotFound { .. }
        ));
    }

    #[test]
    fn test_index_key_is_mismatch() {
        let doc = country();
        assert!(matches!(
            doc.root().child(&Key::Index(0)).unwrap_err(),
            ViewError::TypeMismatch { kind: ViewKind::XmlElement, .. }
        ));
    }

    #[test]
    fn test_children_keep_elements() {
        let doc = country();
        let children = doc.root().children().unwrap();
        assert_eq!(children.len(), 4);
        assert_eq!(children[2].attribute("name").unwrap().as_scalar(), "Austria");

        let neighbors = doc.root().children_named("neighbor").unwrap();
        assert_eq!(neighbors.len(), 2);
        assert_eq!(neighbors[1].attribute("direction").unwrap().as_scalar(), "W");
        assert_eq!(doc.root().iterate_policy(), IteratePolicy::SkipFailed);
    }

    #[test]
    fn test_text_views_are_not_navigable() {
        let doc = country();
        let name = doc.root().child(&"name".into()).unwrap();
        assert!(matches!(
            name.children().unwrap_err(),
            ViewError::TypeMismatch { kind: ViewKind::XmlText, .. }
        ));
        assert!(matches!(
            XmlView::Missing.attribute("x").unwrap_err(),
            ViewError::TypeMismatch { kind: ViewKind::XmlMissing, .. }
        ));
    }

    #[test]
    fn test_empty_leaf_collapses_to_missing() {
        let doc = XmlDocument::parse("<a><b/></a>").unwrap();
        assert_eq!(doc.root().child(&"b".into()).unwrap(), XmlView::Missing);
    }

    #[test]
    fn test_namespaced_names() {
        let doc = XmlDocument::parse(
            r#"<item xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:creator>Ann</dc:creator></item>"#,
        )
        .unwrap();
        let creator = doc
            .root()
            .child(&"{http://purl.org/dc/elements/1.1/}creator".into())
            .unwrap();
        assert_eq!(creator.as_scalar(), "Ann");
    }

    #[test]
    fn test_composite_element_scalar_drops_indentation() {
        let doc = country();
        assert!(doc.root().as_scalar().is_null());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(XmlDocument::parse("   "), Err(DocumentError::Empty)));
        assert!(matches!(
            XmlDocument::parse("<a><b></a>"),
            Err(DocumentError::Xml(_))
        ));
    }

    fn nested(depth: usize) -> String {
        format!("{}x{}", "<n>".repeat(depth), "</n>".repeat(depth))
    }

    #[test]
    fn test_deep_document_is_rejected() {
        for depth in [MAX_DEPTH + 1, 5_000, 20_000] {
            assert!(matches!(
                XmlDocument::parse(&nested(depth)),
                Err(DocumentError::TooDeep { limit: MAX_DEPTH })
            ));
        }
    }

    #[test]
    fn test_document_at_depth_limit_parses() {
        let doc = XmlDocument::parse(&nested(MAX_DEPTH)).unwrap();
        assert_eq!(doc.root_element().tag(), "n");

        let mut element = doc.root_element();
        let mut levels = 1;
        while let Some(child) = element.children().first() {
            element = child;
            levels += 1;
        }
        assert_eq!(levels, MAX_DEPTH);
        assert_eq!(element.text(), Some("x"));
    }

    #[test]
    fn test_nesting_depth_skips_markup() {
        assert_eq!(nesting_depth("<a><b/><c>t</c></a>"), 2);
        assert_eq!(nesting_depth(r#"<a href="x>y/"><b title='</b>'/></a>"#), 1);
        assert_eq!(
            nesting_depth("<?xml version=\"1.0\"?><!-- <x><x> --><a><![CDATA[<y><y>]]></a>"),
            1
        );
        assert_eq!(
            nesting_depth("<!DOCTYPE a [<!ENTITY e \"<b>\">]><a><b>&e;</b></a>"),
            2
        );
    }

    #[test]
    fn test_deep_tree_drops_without_recursion() {
        let mut root = XmlElement::default();
        for _ in 0..100_000 {
            root = XmlElement {
                tag: "n".to_string(),
                attributes: Vec::new(),
                children: vec![root],
                text: None,
            };
        }
        drop(root);
    }
}
