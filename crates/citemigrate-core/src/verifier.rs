//! Structural checks on rewritten parts
//!
//! Issues are advisory. Callers log them and still write the package.

use std::fmt;

use crate::xml::{XmlDocument, XmlElement};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    /// An `end` field char with no open field; checking stops there
    UnmatchedFieldEnd,
    /// `begin` field chars left open at the end of the part
    UnclosedFields(usize),
    MissingBody,
    /// A `w:sdt` without `w:sdtContent`
    SdtWithoutContent,
    /// The serialized part is not well-formed
    Syntax(String),
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityIssue::UnmatchedFieldEnd => write!(f, "Unmatched field 'end' without 'begin'"),
            IntegrityIssue::UnclosedFields(n) => {
                write!(f, "{} unclosed field(s) detected (begin without end)", n)
            }
            IntegrityIssue::MissingBody => write!(f, "Document body element not found"),
            IntegrityIssue::SdtWithoutContent => write!(f, "SDT element without sdtContent found"),
            IntegrityIssue::Syntax(message) => write!(f, "XML syntax error: {}", message),
        }
    }
}

pub fn verify(root: &XmlElement) -> Vec<IntegrityIssue> {
    let mut issues = Vec::new();

    let mut open: i64 = 0;
    let mut balanced = true;
    for fld_char in root.descendants().filter(|e| e.is("fldChar")) {
        match fld_char.attr_local("fldCharType") {
            Some("begin") => open += 1,
            Some("end") => open -= 1,
            _ => {}
        }
        if open < 0 {
            issues.push(IntegrityIssue::UnmatchedFieldEnd);
            balanced = false;
            break;
        }
    }
    if balanced && open > 0 {
        issues.push(IntegrityIssue::UnclosedFields(open as usize));
    }

    // Footnote and endnote parts have no body
    if root.is("document") && root.child("body").is_none() {
        issues.push(IntegrityIssue::MissingBody);
    }

    for sdt in root.descendants().filter(|e| e.is("sdt")) {
        if sdt.child("sdtContent").is_none() {
            issues.push(IntegrityIssue::SdtWithoutContent);
        }
    }

    issues
}

/// Audit a serialized part
pub fn verify_xml(xml: &str) -> Vec<IntegrityIssue> {
    match XmlDocument::parse(xml) {
        Ok(document) => verify(&document.root),
        Err(e) => vec![IntegrityIssue::Syntax(e.to_string())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#;

    fn body(inner: &str) -> String {
        format!("<w:document {}><w:body>{}</w:body></w:document>", NS, inner)
    }

    #[test]
    fn test_clean_document() {
        let xml = body(r#"<w:p><w:r><w:fldChar w:fldCharType="begin"/></w:r><w:r><w:fldChar w:fldCharType="separate"/></w:r><w:r><w:fldChar w:fldCharType="end"/></w:r></w:p>"#);
        assert!(verify_xml(&xml).is_empty());
    }

    #[test]
    fn test_unclosed_begin() {
        let xml = body(r#"<w:p><w:r><w:fldChar w:fldCharType="begin"/></w:r></w:p>"#);
        let issues = verify_xml(&xml);
        assert_eq!(issues, vec![IntegrityIssue::UnclosedFields(1)]);
        assert_eq!(
            issues[0].to_string(),
            "1 unclosed field(s) detected (begin without end)"
        );
    }

    #[test]
    fn test_unmatched_end_stops_counting() {
        let xml = body(
            r#"<w:p><w:r><w:fldChar w:fldCharType="end"/></w:r><w:r><w:fldChar w:fldCharType="begin"/></w:r><w:r><w:fldChar w:fldCharType="begin"/></w:r></w:p>"#,
        );
        assert_eq!(verify_xml(&xml), vec![IntegrityIssue::UnmatchedFieldEnd]);
    }

    #[test]
    fn test_missing_body_only_for_documents() {
        let doc = format!("<w:document {}/>", NS);
        assert_eq!(verify_xml(&doc), vec![IntegrityIssue::MissingBody]);

        let footnotes = format!("<w:footnotes {}><w:footnote/></w:footnotes>", NS);
        assert!(verify_xml(&footnotes).is_empty());
    }

    #[test]
    fn test_sdt_without_content() {
        let xml = body("<w:sdt><w:sdtPr/></w:sdt><w:sdt><w:sdtPr/><w:sdtContent/></w:sdt>");
        assert_eq!(verify_xml(&xml), vec![IntegrityIssue::SdtWithoutContent]);
    }

    #[test]
    fn test_syntax_error() {
        let issues = verify_xml("<w:document><w:body></w:document>");
        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0], IntegrityIssue::Syntax(_)));
        assert!(issues[0].to_string().starts_with("XML syntax error"));
    }
}
