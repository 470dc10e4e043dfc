//! Synthetic .docx packages for integration tests

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::Path;

use base64::Engine;
use serde_json::Value;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// Write a zip with exactly `members`, in order
pub fn write_zip(path: &Path, members: &[(&str, String)]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    for (name, content) in members {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// A minimal package with `body` as the main document body plus `extra` parts
pub fn write_docx(path: &Path, body: &str, extra: &[(&str, String)]) {
    let mut members = vec![
        ("[Content_Types].xml", CONTENT_TYPES_XML.to_string()),
        ("_rels/.rels", RELS_XML.to_string()),
        ("word/document.xml", document_xml(body)),
    ];
    members.extend(extra.iter().cloned());
    write_zip(path, &members);
}

pub fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{}"><w:body>{}<w:sectPr/></w:body></w:document>"#,
        W_NS, body
    )
}

pub fn footnotes_xml(paragraphs: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:footnotes xmlns:w="{}"><w:footnote w:id="1">{}</w:footnote></w:footnotes>"#,
        W_NS, paragraphs
    )
}

/// Citavi content control around a field whose instruction is `instruction`
pub fn placeholder_with_instruction(tag: &str, instruction: &str, display: &str) -> String {
    format!(
        concat!(
            r#"<w:sdt><w:sdtPr><w:tag w:val="{tag}"/></w:sdtPr><w:sdtContent>"#,
            r#"<w:r><w:fldChar w:fldCharType="begin"/></w:r>"#,
            r#"<w:r><w:instrText xml:space="preserve">{instruction}</w:instrText></w:r>"#,
            r#"<w:r><w:fldChar w:fldCharType="separate"/></w:r>"#,
            r#"<w:r><w:t>{display}</w:t></w:r>"#,
            r#"<w:r><w:fldChar w:fldCharType="end"/></w:r>"#,
            r#"</w:sdtContent></w:sdt>"#
        ),
        tag = tag,
        instruction = instruction,
        display = display
    )
}

/// Citavi placeholder carrying `payload` as base64 JSON
pub fn placeholder(id: usize, payload: &Value, display: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(payload.to_string());
    placeholder_with_instruction(&format!("CitaviPlaceholder#{}", id), &encoded, display)
}

/// A body paragraph containing `inner`
pub fn paragraph(inner: &str) -> String {
    format!("<w:p><w:r><w:t xml:space=\"preserve\">Text </w:t></w:r>{}</w:p>", inner)
}
