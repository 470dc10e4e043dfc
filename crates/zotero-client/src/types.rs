//! Zotero item model (`format=json` responses)
//!
//! Only the fields used for citation matching and CSL conversion are modelled.
//! Zotero sends empty strings for unset fields, so every field defaults to
//! empty rather than being optional.

use serde::{Deserialize, Serialize};

use crate::error::ZoteroError;

/// Item types that are never cited directly
const NON_CITABLE_TYPES: &[&str] = &["attachment", "note", "annotation"];

/// One library entry as returned by `/items/top`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ZoteroItem {
    pub key: String,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub data: ItemData,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ItemData {
    pub key: String,
    pub item_type: String,
    pub title: String,
    pub creators: Vec<Creator>,
    pub date: String,
    #[serde(rename = "DOI")]
    pub doi: String,
    #[serde(rename = "ISBN")]
    pub isbn: String,
    #[serde(rename = "ISSN")]
    pub issn: String,
    pub publication_title: String,
    pub book_title: String,
    pub proceedings_title: String,
    pub volume: String,
    pub issue: String,
    pub pages: String,
    pub publisher: String,
    pub place: String,
    pub url: String,
    pub edition: String,
}

/// An item creator: either a person (`lastName`/`firstName`) or a single
/// organisational `name`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Creator {
    pub creator_type: String,
    pub first_name: String,
    pub last_name: String,
    pub name: String,
}

impl Creator {
    pub fn person(creator_type: &str, last_name: &str, first_name: &str) -> Self {
        Self {
            creator_type: creator_type.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            name: String::new(),
        }
    }

    pub fn organization(creator_type: &str, name: &str) -> Self {
        Self {
            creator_type: creator_type.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn is_editor(&self) -> bool {
        self.creator_type == "editor"
    }
}

impl ZoteroItem {
    pub fn new(key: impl Into<String>, item_type: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            data: ItemData {
                key: key.clone(),
                item_type: item_type.into(),
                ..Default::default()
            },
            key,
            version: 0,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.data.title = title.to_string();
        self
    }

    pub fn with_date(mut self, date: &str) -> Self {
        self.data.date = date.to_string();
        self
    }

    pub fn with_creator(mut self, creator: Creator) -> Self {
        self.data.creators.push(creator);
        self
    }

    pub fn with_doi(mut self, doi: &str) -> Self {
        self.data.doi = doi.to_string();
        self
    }

    pub fn with_isbn(mut self, isbn: &str) -> Self {
        self.data.isbn = isbn.to_string();
        self
    }

    /// Attachments, notes and annotations are not bibliographic entries
    pub fn is_citable(&self) -> bool {
        !NON_CITABLE_TYPES.contains(&self.data.item_type.as_str())
    }

    /// Short human-readable label for logs
    pub fn label(&self) -> String {
        let title = if self.data.title.is_empty() {
            "?"
        } else {
            self.data.title.as_str()
        };
        title.chars().take(60).collect()
    }
}

/// Parse a JSON array of items
pub fn parse_items(json: &str) -> Result<Vec<ZoteroItem>, ZoteroError> {
    serde_json::from_str(json).map_err(|e| ZoteroError::ParseError {
        message: format!("Invalid Zotero JSON: {}", e),
    })
}
