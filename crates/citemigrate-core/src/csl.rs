//! Zotero item → CSL-JSON `itemData`

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use zotero_client::{Creator, ZoteroItem};

lazy_static! {
    static ref FIRST_YEAR: Regex = Regex::new(r"(\d{4})").unwrap();
}

/// CSL item type for a Zotero `itemType`; unknown types become `article`
pub fn csl_type(item_type: &str) -> &'static str {
    match item_type {
        "journalArticle" => "article-journal",
        "book" => "book",
        "bookSection" => "chapter",
        "conferencePaper" => "paper-conference",
        "thesis" => "thesis",
        "report" => "report",
        "webpage" => "webpage",
        "magazineArticle" => "article-magazine",
        "newspaperArticle" => "article-newspaper",
        "manuscript" => "manuscript",
        _ => "article",
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CslName {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given: Option<String>,
    /// Organisational name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub literal: Option<String>,
}

impl From<&Creator> for CslName {
    fn from(creator: &Creator) -> Self {
        Self {
            family: non_empty(&creator.last_name),
            given: non_empty(&creator.first_name),
            literal: non_empty(&creator.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CslDate {
    #[serde(rename = "date-parts")]
    pub date_parts: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CslItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub author: Vec<CslName>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub editor: Vec<CslName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued: Option<CslDate>,
    #[serde(rename = "container-title", skip_serializing_if = "Option::is_none")]
    pub container_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(rename = "publisher-place", skip_serializing_if = "Option::is_none")]
    pub publisher_place: Option<String>,
    #[serde(rename = "DOI", skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(rename = "ISBN", skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(rename = "ISSN", skip_serializing_if = "Option::is_none")]
    pub issn: Option<String>,
    #[serde(rename = "URL", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl From<&ZoteroItem> for CslItem {
    fn from(item: &ZoteroItem) -> Self {
        let data = &item.data;
        let (editors, authors): (Vec<&Creator>, Vec<&Creator>) =
            data.creators.iter().partition(|c| c.is_editor());

        let issued = FIRST_YEAR.find(&data.date).map(|m| CslDate {
            date_parts: vec![vec![m.as_str().to_string()]],
        });

        let container_title = [&data.publication_title, &data.book_title, &data.proceedings_title]
            .into_iter()
            .find_map(|field| non_empty(field));

        Self {
            id: item.key.clone(),
            item_type: csl_type(&data.item_type).to_string(),
            title: non_empty(&data.title),
            author: authors.into_iter().map(CslName::from).collect(),
            editor: editors.into_iter().map(CslName::from).collect(),
            issued,
            container_title,
            volume: non_empty(&data.volume),
            issue: non_empty(&data.issue),
            page: non_empty(&data.pages),
            publisher: non_empty(&data.publisher),
            publisher_place: non_empty(&data.place),
            doi: non_empty(&data.doi),
            isbn: non_empty(&data.isbn),
            issn: non_empty(&data.issn),
            url: non_empty(&data.url),
            edition: non_empty(&data.edition),
        }
    }
}
