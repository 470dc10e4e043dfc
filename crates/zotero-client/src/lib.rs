//! zotero-client: read-only access to a Zotero library over the Web API v3
//!
//! This crate provides:
//! - The Zotero item model (`ZoteroItem`, `ItemData`, `Creator`)
//! - Library addressing for personal and group libraries
//! - Paginated listing of top-level items (attachments and notes excluded)
//! - An API key wrapper that never prints the raw credential
//!
//! API docs: https://www.zotero.org/support/dev/web_api/v3/basics

pub mod client;
pub mod credential;
pub mod error;
pub mod http;
pub mod types;

pub use client::{paginate, LibraryKind, LibraryRef, ZoteroClient, DEFAULT_BASE_URL, PAGE_SIZE};
pub use credential::ApiKey;
pub use error::ZoteroError;
pub use types::{parse_items, Creator, ItemData, ZoteroItem};
