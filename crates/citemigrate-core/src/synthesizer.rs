//! Zotero field code construction
//!
//! A Zotero citation is a plain Word field:
//!
//! ```text
//! <w:r><w:fldChar w:fldCharType="begin"/></w:r>
//! <w:r><w:instrText xml:space="preserve"> ADDIN ZOTERO_ITEM CSL_CITATION {...} </w:instrText></w:r>  (one run per chunk)
//! <w:r><w:fldChar w:fldCharType="separate"/></w:r>
//! <w:r><w:rPr><w:noProof/></w:rPr><w:t xml:space="preserve">(Smith 2019)</w:t></w:r>
//! <w:r><w:fldChar w:fldCharType="end"/></w:r>
//! ```
//!
//! The payload carries no `formattedCitation`. Zotero then treats the field as
//! freshly inserted and renders it on the first refresh instead of asking
//! whether to keep a manual edit.

use serde::Serialize;
use serde_json::Value;
use zotero_client::{LibraryRef, ZoteroItem};

use crate::csl::CslItem;
use crate::error::Result;
use crate::xml::XmlElement;

pub const CITATION_SCHEMA: &str =
    "https://github.com/citation-style-language/schema/raw/master/csl-citation.json";

/// Display run used when the placeholder had no visible text
pub const DEFAULT_DISPLAY_TEXT: &str = "(Citation)";

pub const BIBLIOGRAPHY_DISPLAY_TEXT: &str = "{Bibliography will be generated by Zotero}";

pub const CITATION_MARKER: &str = "ZOTERO_ITEM";
pub const BIBLIOGRAPHY_MARKER: &str = "ZOTERO_BIBL";

const CITATION_ID_LEN: usize = 12;

#[derive(Debug, Serialize)]
struct CitationProperties {
    #[serde(rename = "noteIndex")]
    note_index: u32,
}

#[derive(Debug, Serialize)]
struct CitationItem {
    id: String,
    uris: Vec<String>,
    uri: Vec<String>,
    #[serde(rename = "itemData")]
    item_data: CslItem,
}

#[derive(Debug, Serialize)]
struct CitationPayload {
    #[serde(rename = "citationID")]
    citation_id: String,
    properties: CitationProperties,
    #[serde(rename = "citationItems")]
    citation_items: Vec<CitationItem>,
    schema: &'static str,
}

#[derive(Debug, Default, Serialize)]
struct BibliographyPayload {
    uncited: Vec<Value>,
    omitted: Vec<Value>,
    custom: Vec<Value>,
}

/// Runs for one field, before they are spliced into a part
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedField {
    pub instruction_chunks: Vec<String>,
    pub display_text: String,
    /// Mark the display run `w:noProof`
    pub no_proof: bool,
    /// Style Zotero should apply on first refresh (bibliography fields)
    pub style_uri: Option<String>,
}

impl SynthesizedField {
    pub fn instruction(&self) -> String {
        self.instruction_chunks.concat()
    }

    /// Word runs using `prefix` for the WordprocessingML namespace
    pub fn to_runs(&self, prefix: &str) -> Vec<XmlElement> {
        let w = |local: &str| format!("{}:{}", prefix, local);
        let fld_char = |kind: &str| {
            XmlElement::new(w("r"))
                .with_child(XmlElement::new(w("fldChar")).with_attr(w("fldCharType"), kind))
        };

        let mut runs = vec![fld_char("begin")];
        for chunk in &self.instruction_chunks {
            runs.push(
                XmlElement::new(w("r")).with_child(
                    XmlElement::new(w("instrText"))
                        .with_attr("xml:space", "preserve")
                        .with_text(chunk.as_str()),
                ),
            );
        }
        runs.push(fld_char("separate"));

        let mut display = XmlElement::new(w("r"));
        if self.no_proof {
            display = display.with_child(XmlElement::new(w("rPr")).with_child(XmlElement::new(w("noProof"))));
        }
        runs.push(
            display.with_child(
                XmlElement::new(w("t"))
                    .with_attr("xml:space", "preserve")
                    .with_text(self.display_text.as_str()),
            ),
        );

        runs.push(fld_char("end"));
        runs
    }
}

/// Split on character boundaries into pieces of at most `size` characters
pub fn chunk_instruction(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

pub fn new_citation_id() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(CITATION_ID_LEN)
        .collect()
}

/// `ADDIN ZOTERO_ITEM` field citing `items`, keeping `display_text` visible
/// until Zotero re-renders it
pub fn build_citation_field(
    items: &[ZoteroItem],
    library: &LibraryRef,
    display_text: &str,
    chunk_size: usize,
) -> Result<SynthesizedField> {
    let payload = CitationPayload {
        citation_id: new_citation_id(),
        properties: CitationProperties { note_index: 0 },
        citation_items: items
            .iter()
            .map(|item| {
                let uri = library.item_uri(&item.key);
                CitationItem {
                    id: item.key.clone(),
                    uris: vec![uri.clone()],
                    uri: vec![uri],
                    item_data: CslItem::from(item),
                }
            })
            .collect(),
        schema: CITATION_SCHEMA,
    };

    let instruction = format!(
        " ADDIN {} CSL_CITATION {} ",
        CITATION_MARKER,
        serde_json::to_string(&payload)?
    );
    let display_text = if display_text.is_empty() {
        DEFAULT_DISPLAY_TEXT
    } else {
        display_text
    };

    Ok(SynthesizedField {
        instruction_chunks: chunk_instruction(&instruction, chunk_size),
        display_text: display_text.to_string(),
        no_proof: true,
        style_uri: None,
    })
}

/// Empty-state `ADDIN ZOTERO_BIBL` field
pub fn build_bibliography_field(style_uri: &str) -> Result<SynthesizedField> {
    let instruction = format!(
        " ADDIN {} {} CSL_BIBLIOGRAPHY ",
        BIBLIOGRAPHY_MARKER,
        serde_json::to_string(&BibliographyPayload::default())?
    );
    Ok(SynthesizedField {
        instruction_chunks: vec![instruction],
        display_text: BIBLIOGRAPHY_DISPLAY_TEXT.to_string(),
        no_proof: false,
        style_uri: Some(style_uri.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use zotero_client::Creator;

    fn item() -> ZoteroItem {
        ZoteroItem::new("X42A7DEE", "journalArticle")
            .with_title("Advances in Molecular Biology and Chemistry")
            .with_date("2019")
            .with_creator(Creator::person("author", "Smith", "Jane"))
    }

    fn payload(field: &SynthesizedField) -> Value {
        let instruction = field.instruction();
        let json = instruction
            .trim()
            .strip_prefix("ADDIN ZOTERO_ITEM CSL_CITATION ")
            .unwrap();
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_citation_payload_shape() {
        let field =
            build_citation_field(&[item()], &LibraryRef::user("475425"), "(Smith 2019)", 250).unwrap();
        let value = payload(&field);

        let id = value["citationID"].as_str().unwrap();
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(value["properties"], serde_json::json!({"noteIndex": 0}));
        assert_eq!(value["schema"], CITATION_SCHEMA);

        let cited = &value["citationItems"][0];
        assert_eq!(cited["id"], "X42A7DEE");
        assert_eq!(cited["uris"][0], "http://zotero.org/users/475425/items/X42A7DEE");
        assert_eq!(cited["uri"], cited["uris"]);
        assert_eq!(cited["itemData"]["type"], "article-journal");

        assert!(!field.instruction().contains("formattedCitation"));
        assert!(!field.instruction().contains("plainCitation"));
        assert_eq!(field.display_text, "(Smith 2019)");
    }

    #[test]
    fn test_group_library_uri() {
        let field = build_citation_field(&[item()], &LibraryRef::group("99"), "", 250).unwrap();
        let value = payload(&field);
        assert_eq!(
            value["citationItems"][0]["uris"][0],
            "http://zotero.org/groups/99/items/X42A7DEE"
        );
        assert_eq!(field.display_text, DEFAULT_DISPLAY_TEXT);
    }

    #[test]
    fn test_chunking() {
        let field =
            build_citation_field(&[item(), item(), item()], &LibraryRef::user("1"), "x", 250).unwrap();
        assert!(field.instruction_chunks.len() > 1);
        assert!(field.instruction_chunks.iter().all(|c| c.chars().count() <= 250));
        assert!(field.instruction().starts_with(" ADDIN ZOTERO_ITEM CSL_CITATION {"));
        assert!(field.instruction().ends_with("} "));
    }

    #[test]
    fn test_chunk_on_char_boundaries() {
        let chunks = chunk_instruction("äöüß", 3);
        assert_eq!(chunks, vec!["äöü", "ß"]);
        assert_eq!(chunk_instruction("abc", 0), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_runs_layout() {
        let field = SynthesizedField {
            instruction_chunks: vec!["a".into(), "b".into()],
            display_text: "(Doe 2001)".into(),
            no_proof: true,
            style_uri: None,
        };
        let runs = field.to_runs("w");
        assert_eq!(runs.len(), 6);
        assert!(runs.iter().all(|r| r.name == "w:r"));
        assert_eq!(
            runs[0].child("fldChar").unwrap().attr("w:fldCharType"),
            Some("begin")
        );
        assert_eq!(runs[1].child("instrText").unwrap().text(), "a");
        assert_eq!(
            runs[1].child("instrText").unwrap().attr("xml:space"),
            Some("preserve")
        );
        assert_eq!(
            runs[3].child("fldChar").unwrap().attr("w:fldCharType"),
            Some("separate")
        );
        assert!(runs[4].child("rPr").unwrap().child("noProof").is_some());
        assert_eq!(runs[4].child("t").unwrap().text(), "(Doe 2001)");
        assert_eq!(
            runs[5].child("fldChar").unwrap().attr("w:fldCharType"),
            Some("end")
        );
    }

    #[test]
    fn test_bibliography_field() {
        let field = build_bibliography_field("http://www.zotero.org/styles/apa").unwrap();
        assert_eq!(
            field.instruction(),
            r#" ADDIN ZOTERO_BIBL {"uncited":[],"omitted":[],"custom":[]} CSL_BIBLIOGRAPHY "#
        );
        assert_eq!(field.display_text, BIBLIOGRAPHY_DISPLAY_TEXT);
        assert_eq!(field.style_uri.as_deref(), Some("http://www.zotero.org/styles/apa"));
        let runs = field.to_runs("w");
        assert_eq!(runs.len(), 5);
        assert!(runs[3].child("rPr").is_none());
    }
}
