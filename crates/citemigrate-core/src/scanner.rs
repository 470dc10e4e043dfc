//! Citavi placeholder discovery
//!
//! Citavi wraps every citation in a structured document tag (`w:sdt`) whose
//! `w:sdtPr/w:tag/@w:val` starts with `CitaviPlaceholder#`. Inside the
//! `w:sdtContent` sits an ordinary Word field: `begin`, instruction runs,
//! `separate`, the rendered runs, `end`.

use serde_json::Value;

use crate::archive::PartKind;
use crate::decoder;
use crate::xml::XmlElement;

pub const PLACEHOLDER_TAG_PREFIX: &str = "CitaviPlaceholder#";

/// One legacy citation found in a part
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    pub part: PartKind,
    /// Child-index path of the `w:sdt` from the part root
    pub path: Vec<usize>,
    pub tag: String,
    /// Trimmed `w:instrText` runs, concatenated
    pub instruction_text: String,
    /// Rendered text between the `separate` and `end` field chars
    pub display_text: String,
}

impl Placeholder {
    /// Embedded Citavi payload, if any strategy recovers one
    pub fn payload(&self) -> Option<Value> {
        decoder::decode(&self.instruction_text)
    }

    /// Display text for logs
    pub fn label(&self) -> &str {
        if self.display_text.is_empty() {
            "[no display text]"
        } else {
            &self.display_text
        }
    }
}

/// `w:sdtPr/w:tag/@w:val` of a structured document tag
pub fn sdt_tag(sdt: &XmlElement) -> Option<&str> {
    sdt.child("sdtPr")?.child("tag")?.attr_local("val")
}

pub fn is_placeholder(element: &XmlElement) -> bool {
    element.is("sdt")
        && sdt_tag(element).is_some_and(|tag| tag.starts_with(PLACEHOLDER_TAG_PREFIX))
}

/// Every placeholder under `root`, in document order
pub fn scan(part: PartKind, root: &XmlElement) -> Vec<Placeholder> {
    root.find_paths(is_placeholder)
        .into_iter()
        .filter_map(|path| {
            let sdt = root.get_path(&path)?;
            let tag = sdt_tag(sdt).unwrap_or_default().to_string();
            let (instruction_text, display_text) = match sdt.child("sdtContent") {
                Some(content) => (instruction_text(content), display_text(content)),
                None => (String::new(), String::new()),
            };
            Some(Placeholder {
                part,
                path,
                tag,
                instruction_text,
                display_text,
            })
        })
        .collect()
}

pub fn count_placeholders(root: &XmlElement) -> usize {
    root.descendants().filter(|e| is_placeholder(e)).count()
}

/// Number of `w:instrText` runs whose text contains `needle`
pub fn count_instructions_containing(root: &XmlElement, needle: &str) -> usize {
    root.descendants()
        .filter(|e| e.is("instrText") && e.text().contains(needle))
        .count()
}

fn instruction_text(content: &XmlElement) -> String {
    content
        .descendants()
        .filter(|e| e.is("instrText"))
        .map(|e| e.text().trim().to_string())
        .collect()
}

fn display_text(content: &XmlElement) -> String {
    let mut text = String::new();
    let mut in_display = false;
    for element in content.descendants() {
        if element.is("fldChar") {
            match element.attr_local("fldCharType") {
                Some("separate") => in_display = true,
                Some("end") => in_display = false,
                _ => {}
            }
        } else if in_display && element.is("t") {
            text.push_str(&element.text());
        }
    }
    text.trim().to_string()
}
