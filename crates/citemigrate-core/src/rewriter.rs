//! Placeholder replacement and bibliography handling

use crate::error::Result;
use crate::scanner::{count_instructions_containing, sdt_tag};
use crate::synthesizer::{build_bibliography_field, SynthesizedField, BIBLIOGRAPHY_MARKER};
use crate::xml::{XmlElement, XmlNode};

const LEGACY_BIBLIOGRAPHY_TAGS: &[&str] = &["CitaviBibliography", "CitaviFilteredBibliography"];

/// Replace the element at `path` with the field's runs. Inside a paragraph the
/// runs take the element's place directly; anywhere else they are wrapped in a
/// new `w:p`. Returns false when `path` does not address a non-root element.
pub fn replace(root: &mut XmlElement, path: &[usize], field: &SynthesizedField, prefix: &str) -> bool {
    let Some((&index, parent_path)) = path.split_last() else {
        return false;
    };
    let Some(parent) = root.get_path_mut(parent_path) else {
        return false;
    };
    if !matches!(parent.children.get(index), Some(XmlNode::Element(_))) {
        return false;
    }

    let runs = field.to_runs(prefix);
    if parent.is("p") {
        parent
            .children
            .splice(index..=index, runs.into_iter().map(XmlNode::Element));
    } else {
        let mut paragraph = XmlElement::new(format!("{}:p", prefix));
        paragraph.children = runs.into_iter().map(XmlNode::Element).collect();
        parent.children[index] = XmlNode::Element(paragraph);
    }
    true
}

/// Apply several replacements in reverse document order so that the paths of
/// the remaining ones stay valid. Returns the number applied.
pub fn replace_all(
    root: &mut XmlElement,
    mut replacements: Vec<(Vec<usize>, SynthesizedField)>,
    prefix: &str,
) -> usize {
    replacements.sort_by(|a, b| b.0.cmp(&a.0));
    let mut applied = 0;
    for (path, field) in &replacements {
        if replace(root, path, field, prefix) {
            applied += 1;
        }
    }
    applied
}

fn is_legacy_bibliography(element: &XmlElement) -> bool {
    element.is("sdt")
        && sdt_tag(element)
            .is_some_and(|tag| LEGACY_BIBLIOGRAPHY_TAGS.iter().any(|legacy| tag.contains(legacy)))
}

/// Remove Citavi bibliography containers; returns how many were removed
pub fn remove_legacy_bibliography(root: &mut XmlElement) -> usize {
    root.remove_where(&is_legacy_bibliography)
}

pub fn has_bibliography(root: &XmlElement) -> bool {
    count_instructions_containing(root, BIBLIOGRAPHY_MARKER) > 0
}

/// Add a paragraph holding a Zotero bibliography field at the end of the
/// body, before a trailing `w:sectPr`. Returns the inserted field, or `None`
/// if the part already has one or has no body.
pub fn append_bibliography(
    root: &mut XmlElement,
    style_uri: &str,
    prefix: &str,
) -> Result<Option<SynthesizedField>> {
    if has_bibliography(root) {
        return Ok(None);
    }
    let Some(body_index) = root.child_position("body") else {
        return Ok(None);
    };
    let Some(body) = root.get_path_mut(&[body_index]) else {
        return Ok(None);
    };

    let field = build_bibliography_field(style_uri)?;
    let mut paragraph = XmlElement::new(format!("{}:p", prefix));
    paragraph.children = field.to_runs(prefix).into_iter().map(XmlNode::Element).collect();

    let position = body.child_position("sectPr").unwrap_or(body.children.len());
    body.children.insert(position, XmlNode::Element(paragraph));
    Ok(Some(field))
}
