//! Mutable element tree over quick-xml
//!
//! WordprocessingML parts are small enough to hold in memory, and the
//! rewriter needs to splice runs in and out of arbitrary parents, so parts are
//! parsed into an owned tree of [`XmlElement`]s and written back with the
//! quick-xml writer. Names are kept qualified (`w:sdt`); lookups compare the
//! local part. Text is stored unescaped and re-escaped on write.

use std::borrow::Cow;

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::XmlError;

/// WordprocessingML main namespace
pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Prefix used when a part does not declare one for [`W_NS`]
pub const DEFAULT_W_PREFIX: &str = "w";

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
    Comment(String),
    Instruction(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

impl Default for Declaration {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            encoding: Some("UTF-8".to_string()),
            standalone: Some("yes".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub declaration: Option<Declaration>,
    pub root: XmlElement,
}

fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    pub fn is(&self, local: &str) -> bool {
        self.local_name() == local
    }

    /// Attribute by exact qualified name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute by local name, ignoring the prefix; namespace declarations
    /// never match
    pub fn attr_local(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| !k.starts_with("xmlns") && local_part(k) == local)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Direct child elements
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// First direct child element with this local name
    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.is(local))
    }

    /// Position in `children` of the first element with this local name
    pub fn child_position(&self, local: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|node| matches!(node, XmlNode::Element(e) if e.is(local)))
    }

    /// Concatenated direct text children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(t) | XmlNode::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Pre-order walk over this element and every descendant element
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Child-index paths (relative to `self`) of every descendant matching
    /// `pred`, in document order. Matches nested inside a match are included.
    pub fn find_paths<F>(&self, pred: F) -> Vec<Vec<usize>>
    where
        F: Fn(&XmlElement) -> bool,
    {
        fn walk<F: Fn(&XmlElement) -> bool>(
            element: &XmlElement,
            path: &mut Vec<usize>,
            pred: &F,
            out: &mut Vec<Vec<usize>>,
        ) {
            for (i, node) in element.children.iter().enumerate() {
                if let XmlNode::Element(child) = node {
                    path.push(i);
                    if pred(child) {
                        out.push(path.clone());
                    }
                    walk(child, path, pred, out);
                    path.pop();
                }
            }
        }

        let mut out = Vec::new();
        walk(self, &mut Vec::new(), &pred, &mut out);
        out
    }

    pub fn get_path(&self, path: &[usize]) -> Option<&XmlElement> {
        let mut current = self;
        for &i in path {
            current = match current.children.get(i)? {
                XmlNode::Element(e) => e,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn get_path_mut(&mut self, path: &[usize]) -> Option<&mut XmlElement> {
        let mut current = self;
        for &i in path {
            current = match current.children.get_mut(i)? {
                XmlNode::Element(e) => e,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Remove every descendant element matching `pred`; removed subtrees are
    /// not searched further. Returns the number removed.
    pub fn remove_where<F>(&mut self, pred: &F) -> usize
    where
        F: Fn(&XmlElement) -> bool,
    {
        let before = self.children.len();
        self.children
            .retain(|node| !matches!(node, XmlNode::Element(e) if pred(e)));
        let mut removed = before - self.children.len();
        for node in &mut self.children {
            if let XmlNode::Element(e) = node {
                removed += e.remove_where(pred);
            }
        }
        removed
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a XmlElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.elements().collect::<Vec<_>>().into_iter().rev());
        Some(next)
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, XmlError> {
    let mut element = XmlElement::new(lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Parse {
            position: 0,
            message: e.to_string(),
        })?;
        let value = attr.unescape_value().map_err(|e| XmlError::Parse {
            position: 0,
            message: e.to_string(),
        })?;
        element
            .attributes
            .push((lossy(attr.key.as_ref()), value.into_owned()));
    }
    Ok(element)
}

impl XmlDocument {
    pub fn new(root: XmlElement) -> Self {
        Self {
            declaration: Some(Declaration::default()),
            root,
        }
    }

    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, XmlError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let text = std::str::from_utf8(bytes).map_err(|e| XmlError::Parse {
            position: e.valid_up_to(),
            message: "part is not valid UTF-8".to_string(),
        })?;
        Self::parse(text)
    }

    pub fn parse(xml: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(xml);
        let mut buf = Vec::new();
        let mut declaration = None;
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        // Attach a finished node to the open element; nodes outside the root
        // (prolog whitespace, comments) are dropped.
        fn attach(stack: &mut [XmlElement], node: XmlNode) {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(node);
            }
        }

        loop {
            let position = reader.buffer_position();
            let parse_err = |message: String| XmlError::Parse {
                position: position as usize,
                message,
            };

            match reader.read_event_into(&mut buf) {
                Ok(Event::Decl(decl)) => {
                    let version = decl
                        .version()
                        .map(|v| lossy(&v))
                        .unwrap_or_else(|_| "1.0".to_string());
                    let encoding = decl.encoding().and_then(|e| e.ok()).map(|e| lossy(&e));
                    let standalone = decl.standalone().and_then(|s| s.ok()).map(|s| lossy(&s));
                    declaration = Some(Declaration {
                        version,
                        encoding,
                        standalone,
                    });
                }
                Ok(Event::Start(start)) => {
                    stack.push(element_from_start(&start)?);
                }
                Ok(Event::Empty(start)) => {
                    let element = element_from_start(&start)?;
                    if stack.is_empty() {
                        if root.is_some() {
                            return Err(parse_err("multiple root elements".to_string()));
                        }
                        root = Some(element);
                    } else {
                        attach(&mut stack, XmlNode::Element(element));
                    }
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| parse_err("unexpected closing tag".to_string()))?;
                    if stack.is_empty() {
                        if root.is_some() {
                            return Err(parse_err("multiple root elements".to_string()));
                        }
                        root = Some(element);
                    } else {
                        attach(&mut stack, XmlNode::Element(element));
                    }
                }
                Ok(Event::Text(text)) => {
                    if !stack.is_empty() {
                        let value = text.unescape().map_err(|e| parse_err(e.to_string()))?;
                        attach(&mut stack, XmlNode::Text(value.into_owned()));
                    }
                }
                Ok(Event::CData(data)) => {
                    attach(&mut stack, XmlNode::CData(lossy(&data.into_inner())));
                }
                Ok(Event::Comment(comment)) => {
                    attach(&mut stack, XmlNode::Comment(lossy(&comment)));
                }
                Ok(Event::PI(instruction)) => {
                    attach(&mut stack, XmlNode::Instruction(lossy(&instruction)));
                }
                Ok(Event::DocType(_)) => {}
                Ok(Event::Eof) => break,
                Err(e) => return Err(parse_err(e.to_string())),
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(XmlError::Parse {
                position: xml.len(),
                message: format!("unclosed element <{}>", stack[stack.len() - 1].name),
            });
        }

        Ok(Self {
            declaration,
            root: root.ok_or(XmlError::NoRoot)?,
        })
    }

    /// Prefix the root binds to `namespace`, if any
    pub fn namespace_prefix(&self, namespace: &str) -> Option<&str> {
        self.root
            .attributes
            .iter()
            .find(|(k, v)| v == namespace && k.starts_with("xmlns:"))
            .map(|(k, _)| &k["xmlns:".len()..])
    }

    /// Prefix for WordprocessingML elements created in this part
    pub fn w_prefix(&self) -> String {
        self.namespace_prefix(W_NS)
            .unwrap_or(DEFAULT_W_PREFIX)
            .to_string()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, XmlError> {
        let mut writer = Writer::new(Vec::new());
        let write_err = |e: quick_xml::Error| XmlError::Write(e.to_string());

        if let Some(decl) = &self.declaration {
            writer
                .write_event(Event::Decl(BytesDecl::new(
                    &decl.version,
                    decl.encoding.as_deref(),
                    decl.standalone.as_deref(),
                )))
                .map_err(write_err)?;
            writer
                .write_event(Event::Text(BytesText::from_escaped("\r\n")))
                .map_err(write_err)?;
        }
        write_element(&mut writer, &self.root).map_err(write_err)?;
        Ok(writer.into_inner())
    }

    pub fn to_xml_string(&self) -> Result<String, XmlError> {
        let bytes = self.to_bytes()?;
        String::from_utf8(bytes).map_err(|e| XmlError::Write(e.to_string()))
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> quick_xml::Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start));
    }

    writer.write_event(Event::Start(start))?;
    for node in &element.children {
        match node {
            XmlNode::Element(child) => write_element(writer, child)?,
            XmlNode::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            XmlNode::CData(data) => {
                writer.write_event(Event::CData(BytesCData::new(Cow::Borrowed(data.as_str()))))?
            }
            XmlNode::Comment(comment) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))?
            }
            XmlNode::Instruction(pi) => {
                writer.write_event(Event::PI(BytesText::from_escaped(pi.as_str())))?
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t xml:space="preserve">Tom &amp; Jerry </w:t></w:r></w:p><w:sectPr/></w:body></w:document>"#;

    #[test]
    fn test_parse_structure() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.root.name, "w:document");
        assert!(doc.root.is("document"));
        let body = doc.root.child("body").unwrap();
        assert_eq!(body.elements().count(), 2);
        assert_eq!(body.child_position("sectPr"), Some(1));

        let decl = doc.declaration.as_ref().unwrap();
        assert_eq!(decl.encoding.as_deref(), Some("UTF-8"));
        assert_eq!(decl.standalone.as_deref(), Some("yes"));
    }

    #[test]
    fn test_text_is_unescaped_and_whitespace_kept() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        let t = doc.root.descendants().find(|e| e.is("t")).unwrap();
        assert_eq!(t.text(), "Tom & Jerry ");
        assert_eq!(t.attr("xml:space"), Some("preserve"));
        assert_eq!(t.attr_local("space"), Some("preserve"));
    }

    #[test]
    fn test_write_round_trip() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        let written = doc.to_xml_string().unwrap();
        assert!(written.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>"));
        assert!(written.contains("Tom &amp; Jerry "));
        assert!(written.contains("<w:sectPr/>"));

        let reparsed = XmlDocument::parse(&written).unwrap();
        assert_eq!(reparsed.root, doc.root);
    }

    #[test]
    fn test_namespace_prefix() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.namespace_prefix(W_NS), Some("w"));
        assert_eq!(doc.w_prefix(), "w");

        let other = XmlDocument::parse(r#"<x:document xmlns:x="http://schemas.openxmlformats.org/wordprocessingml/2006/main"/>"#).unwrap();
        assert_eq!(other.w_prefix(), "x");
    }

    #[test]
    fn test_descendants_preorder() {
        let doc = XmlDocument::parse("<a><b><c/></b><d/></a>").unwrap();
        let names: Vec<&str> = doc.root.descendants().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_find_and_get_paths() {
        let doc = XmlDocument::parse("<a><x/><b><x/></b>text<x/></a>").unwrap();
        let paths = doc.root.find_paths(|e| e.is("x"));
        assert_eq!(paths, vec![vec![0], vec![1, 0], vec![3]]);
        assert!(doc.root.get_path(&[1, 0]).unwrap().is("x"));
        // index 2 is a text node
        assert!(doc.root.get_path(&[2]).is_none());
    }

    #[test]
    fn test_remove_where() {
        let mut doc = XmlDocument::parse("<a><x/><b><x/><x><x/></x></b></a>").unwrap();
        let removed = doc.root.remove_where(&|e: &XmlElement| e.is("x"));
        assert_eq!(removed, 3);
        assert_eq!(doc.root.descendants().filter(|e| e.is("x")).count(), 0);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            XmlDocument::parse("<a><b></a>"),
            Err(XmlError::Parse { .. })
        ));
        assert!(matches!(XmlDocument::parse("<a>"), Err(XmlError::Parse { .. })));
        assert!(matches!(XmlDocument::parse(""), Err(XmlError::NoRoot)));
    }

    #[test]
    fn test_parse_bytes_strips_bom() {
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend_from_slice(b"<?xml version=\"1.0\"?><root/>");
        let doc = XmlDocument::parse_bytes(&bytes).unwrap();
        assert_eq!(doc.root.name, "root");
    }

    #[test]
    fn test_builders_and_set_attr() {
        let mut e = XmlElement::new("w:fldChar").with_attr("w:fldCharType", "begin");
        e.set_attr("w:fldCharType", "end");
        assert_eq!(e.attributes.len(), 1);
        assert_eq!(e.attr_local("fldCharType"), Some("end"));
    }
}
