//! Editable XML tree for package parts.
//!
//! Parts that get mutated (the main document, headers, footers, relationship
//! and content-type listings) are parsed into an owned element tree, edited in
//! place, and written back with quick-xml. Whitespace text nodes are kept so an
//! untouched part serialises to an equivalent document.

use crate::error::{Error, Result};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// The `<?xml ...?>` declaration of a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDeclaration {
    /// XML version, almost always "1.0"
    pub version: String,
    /// Value of the `standalone` pseudo-attribute, if present
    pub standalone: Option<String>,
}

impl Default for XmlDeclaration {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            standalone: Some("yes".to_string()),
        }
    }
}

/// A node in the element tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    /// A nested element
    Element(XmlElement),
    /// Unescaped character data
    Text(String),
    /// A CDATA section
    CData(String),
    /// A comment
    Comment(String),
}

impl XmlNode {
    /// Returns the element if this node is one.
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            XmlNode::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the element mutably if this node is one.
    pub fn as_element_mut(&mut self) -> Option<&mut XmlElement> {
        match self {
            XmlNode::Element(e) => Some(e),
            _ => None,
        }
    }
}

impl From<XmlElement> for XmlNode {
    fn from(element: XmlElement) -> Self {
        XmlNode::Element(element)
    }
}

/// An element with its qualified name, attributes in document order, and children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written, e.g. `w:p`
    pub name: String,
    /// Attributes as (qualified name, unescaped value)
    pub attributes: Vec<(String, String)>,
    /// Child nodes
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder: add an attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder: append a child element.
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map(|(_, local)| local)
            .unwrap_or(&self.name)
    }

    /// Get an attribute value by qualified name.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Remove an attribute, returning its value.
    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Iterate over all child elements.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(XmlNode::as_element)
    }

    /// Iterate over child elements with the given qualified name.
    pub fn elements<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.child_elements().filter(move |e| e.name == name)
    }

    /// Iterate mutably over child elements with the given qualified name.
    pub fn elements_mut<'a>(
        &'a mut self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a mut XmlElement> + 'a {
        self.children
            .iter_mut()
            .filter_map(XmlNode::as_element_mut)
            .filter(move |e| e.name == name)
    }

    /// First child element with the given name.
    pub fn first_element(&self, name: &str) -> Option<&XmlElement> {
        self.child_elements().find(|e| e.name == name)
    }

    /// First child element with the given name, mutably.
    pub fn first_element_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.children
            .iter_mut()
            .filter_map(XmlNode::as_element_mut)
            .find(|e| e.name == name)
    }

    /// Remove every child element with the given name, returning them in order.
    pub fn take_elements(&mut self, name: &str) -> Vec<XmlElement> {
        let mut taken = Vec::new();
        let mut kept = Vec::with_capacity(self.children.len());
        for node in self.children.drain(..) {
            match node {
                XmlNode::Element(e) if e.name == name => taken.push(e),
                other => kept.push(other),
            }
        }
        self.children = kept;
        taken
    }

    /// Concatenated text and CDATA of all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Visit this element and all descendant elements, pre-order.
    pub fn visit(&self, f: &mut dyn FnMut(&XmlElement)) {
        f(self);
        for child in self.child_elements() {
            child.visit(f);
        }
    }

    /// Visit this element and all descendant elements mutably, pre-order.
    pub fn visit_mut(&mut self, f: &mut dyn FnMut(&mut XmlElement)) {
        f(self);
        for child in self.children.iter_mut().filter_map(XmlNode::as_element_mut) {
            child.visit_mut(f);
        }
    }
}

fn collect_text(element: &XmlElement, out: &mut String) {
    for child in &element.children {
        match child {
            XmlNode::Text(t) | XmlNode::CData(t) => out.push_str(t),
            XmlNode::Element(e) => collect_text(e, out),
            XmlNode::Comment(_) => {}
        }
    }
}

/// A parsed XML part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    /// The declaration, if the part had one
    pub declaration: Option<XmlDeclaration>,
    /// Comments preceding the root element
    pub prolog: Vec<XmlNode>,
    /// The root element
    pub root: XmlElement,
}

impl XmlDocument {
    /// Create a document with a standalone declaration around `root`.
    pub fn new(root: XmlElement) -> Self {
        Self {
            declaration: Some(XmlDeclaration::default()),
            prolog: Vec::new(),
            root,
        }
    }

    /// Parse XML text into an element tree.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        // Keep whitespace; it is significant inside w:t
        reader.config_mut().trim_text(false);

        let mut buf = Vec::new();
        let mut declaration = None;
        let mut prolog = Vec::new();
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Decl(e)) => {
                    let version = e
                        .version()
                        .map(|v| lossy(&v))
                        .unwrap_or_else(|_| "1.0".to_string());
                    let standalone = e.standalone().and_then(|r| r.ok()).map(|v| lossy(&v));
                    declaration = Some(XmlDeclaration {
                        version,
                        standalone,
                    });
                }
                Ok(Event::Start(e)) => stack.push(element_from_start(&e)?),
                Ok(Event::Empty(e)) => {
                    let element = element_from_start(&e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::XmlParse("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(e)) => {
                    // Text outside the root is formatting whitespace only
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::Text(e.unescape()?.into_owned()));
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::CData(lossy(&e.into_inner())));
                    }
                }
                Ok(Event::Comment(e)) => {
                    let comment = XmlNode::Comment(lossy(&e.into_inner()));
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(comment),
                        None if root.is_none() => prolog.push(comment),
                        None => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlParse(format!(
                        "at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(Error::XmlParse("unexpected end of document".to_string()));
        }
        let root = root.ok_or_else(|| Error::XmlParse("document has no root element".to_string()))?;

        Ok(Self {
            declaration,
            prolog,
            root,
        })
    }

    /// Serialize to UTF-8 bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        if let Some(ref decl) = self.declaration {
            writer.write_event(Event::Decl(BytesDecl::new(
                &decl.version,
                Some("UTF-8"),
                decl.standalone.as_deref(),
            )))?;
            writer.get_mut().extend_from_slice(b"\r\n");
        }
        for node in &self.prolog {
            write_node(&mut writer, node)?;
        }
        write_element(&mut writer, &self.root)?;
        Ok(writer.into_inner())
    }

    /// Serialize to a string.
    pub fn to_xml(&self) -> Result<String> {
        let bytes = self.to_bytes()?;
        String::from_utf8(bytes).map_err(|e| Error::XmlParse(e.to_string()))
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn element_from_start(e: &BytesStart<'_>) -> Result<XmlElement> {
    let mut element = XmlElement::new(lossy(e.name().as_ref()));
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::XmlParse(err.to_string()))?;
        let key = lossy(attr.key.as_ref());
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(element));
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err(Error::XmlParse("multiple root elements".to_string()))
    }
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> Result<()> {
    match node {
        XmlNode::Element(e) => write_element(writer, e)?,
        XmlNode::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
        XmlNode::CData(t) => writer.write_event(Event::CData(BytesCData::new(t.as_str())))?,
        XmlNode::Comment(t) => {
            writer.write_event(Event::Comment(BytesText::from_escaped(t.as_str())))?
        }
    }
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t xml:space="preserve">Fish &amp; Chips </w:t></w:r></w:p><w:sectPr/></w:body></w:document>"#;

    #[test]
    fn test_parse_structure() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.root.name, "w:document");
        assert_eq!(doc.root.local_name(), "document");
        assert_eq!(
            doc.declaration.as_ref().and_then(|d| d.standalone.as_deref()),
            Some("yes")
        );

        let body = doc.root.first_element("w:body").unwrap();
        assert_eq!(body.elements("w:p").count(), 1);
        assert!(body.first_element("w:sectPr").is_some());
        assert_eq!(body.text_content(), "Fish & Chips ");
    }

    #[test]
    fn test_round_trip_is_stable() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        let xml = doc.to_xml().unwrap();
        assert!(xml.contains("Fish &amp; Chips "));
        assert!(xml.contains("<w:sectPr/>"));

        let reparsed = XmlDocument::parse(&xml).unwrap();
        assert_eq!(doc, reparsed);
    }

    #[test]
    fn test_attribute_escaping() {
        let root = XmlElement::new("a").with_attr("title", "x < \"y\" & z");
        let xml = XmlDocument::new(root).to_xml().unwrap();
        let parsed = XmlDocument::parse(&xml).unwrap();
        assert_eq!(parsed.root.attr("title"), Some("x < \"y\" & z"));
    }

    #[test]
    fn test_attribute_editing() {
        let mut e = XmlElement::new("w:shd").with_attr("w:fill", "FFFFFF");
        e.set_attr("w:fill", "F97012");
        e.set_attr("w:val", "clear");
        assert_eq!(e.attr("w:fill"), Some("F97012"));
        assert_eq!(e.attributes.len(), 2);
        assert_eq!(e.remove_attr("w:val"), Some("clear".to_string()));
        assert_eq!(e.attr("w:val"), None);
    }

    #[test]
    fn test_take_elements() {
        let mut p = XmlElement::new("w:p")
            .with_child(XmlElement::new("w:pPr"))
            .with_child(XmlElement::new("w:r"));

        let taken = p.take_elements("w:r");
        assert_eq!(taken.len(), 1);
        assert_eq!(p.child_elements().count(), 1);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(XmlDocument::parse("<a><b></a>").is_err());
        assert!(XmlDocument::parse("").is_err());
        assert!(XmlDocument::parse("<a>").is_err());
    }
}
