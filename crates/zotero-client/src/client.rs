//! Zotero Web API client
//!
//! Rate limit: the API answers 429 with a `Retry-After` header when a key
//! sends too many requests; this client surfaces that as `RateLimited`, with
//! the header's delay in seconds when present.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::credential::ApiKey;
use crate::error::ZoteroError;
use crate::http::HttpClient;
use crate::types::{parse_items, ZoteroItem};

pub const DEFAULT_BASE_URL: &str = "https://api.zotero.org";

/// Maximum page size accepted by `/items/top`
pub const PAGE_SIZE: usize = 100;

const API_VERSION: &str = "3";

/// Personal (`users`) or shared (`groups`) library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryKind {
    #[default]
    User,
    Group,
}

impl LibraryKind {
    pub fn path_segment(&self) -> &'static str {
        match self {
            LibraryKind::User => "users",
            LibraryKind::Group => "groups",
        }
    }
}

impl FromStr for LibraryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" | "users" => Ok(LibraryKind::User),
            "group" | "groups" => Ok(LibraryKind::Group),
            other => Err(format!("Unknown library kind: {}", other)),
        }
    }
}

/// Address of one library: numeric owner id plus kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryRef {
    pub id: String,
    #[serde(default)]
    pub kind: LibraryKind,
}

impl LibraryRef {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: LibraryKind::User,
        }
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: LibraryKind::Group,
        }
    }

    /// `users/12345` or `groups/678`
    pub fn path(&self) -> String {
        format!("{}/{}", self.kind.path_segment(), self.id)
    }

    /// Stable URI Zotero uses to link a field code back to a library item
    pub fn item_uri(&self, item_key: &str) -> String {
        format!("http://zotero.org/{}/items/{}", self.path(), item_key)
    }
}

impl fmt::Display for LibraryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

pub struct ZoteroClient {
    http: HttpClient,
    base_url: String,
    library: LibraryRef,
    api_key: ApiKey,
}

impl ZoteroClient {
    pub fn new(library: LibraryRef, api_key: ApiKey) -> Result<Self, ZoteroError> {
        Ok(Self {
            http: HttpClient::new(concat!("citemigrate/", env!("CARGO_PKG_VERSION")))?,
            base_url: DEFAULT_BASE_URL.to_string(),
            library,
            api_key,
        })
    }

    /// Point the client at another API host (self-hosted mirrors, tests)
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ZoteroError> {
        url::Url::parse(base_url).map_err(|_| ZoteroError::InvalidUrl {
            url: base_url.to_string(),
        })?;
        self.base_url = base_url.trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn library(&self) -> &LibraryRef {
        &self.library
    }

    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    /// Fetch one page of top-level items
    pub async fn top_items(&self, start: usize, limit: usize) -> Result<Vec<ZoteroItem>, ZoteroError> {
        let url = format!("{}/{}/items/top", self.base_url, self.library.path());
        let params = [
            ("format", "json".to_string()),
            ("start", start.to_string()),
            ("limit", limit.to_string()),
        ];
        let headers = [
            ("Zotero-API-Key", self.api_key.expose()),
            ("Zotero-API-Version", API_VERSION),
        ];

        let response = self.http.get(&url, &params, &headers).await?;

        match response.status {
            403 => Err(ZoteroError::Forbidden {
                library: self.library.path(),
            }),
            404 => Err(ZoteroError::NotFound {
                library: self.library.path(),
            }),
            _ if !response.is_success() => Err(ZoteroError::Status {
                status: response.status,
                body: self.api_key.redact(response.body.trim()),
            }),
            _ => parse_items(&response.body),
        }
    }

    /// Fetch every top-level citable item in the library
    pub async fn all_top_items(&self) -> Result<Vec<ZoteroItem>, ZoteroError> {
        let items = paginate(PAGE_SIZE, |start, limit| self.top_items(start, limit)).await?;
        let total = items.len();
        let citable: Vec<ZoteroItem> = items.into_iter().filter(|i| i.is_citable()).collect();
        tracing::debug!(
            library = %self.library,
            fetched = total,
            citable = citable.len(),
            "Fetched Zotero library"
        );
        Ok(citable)
    }
}

/// Drive a `(start, limit)` page fetcher until a short or empty page
pub async fn paginate<T, F, Fut>(page_size: usize, mut fetch: F) -> Result<Vec<T>, ZoteroError>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ZoteroError>>,
{
    let mut all = Vec::new();
    let mut start = 0;
    loop {
        let page = fetch(start, page_size).await?;
        let len = page.len();
        all.extend(page);
        if len < page_size {
            break;
        }
        start += page_size;
    }
    Ok(all)
}
