//! Error types for the Zotero client

use thiserror::Error;

/// Errors raised while talking to the Zotero Web API
#[derive(Error, Debug)]
pub enum ZoteroError {
    #[error("Request failed: {message}")]
    RequestFailed { message: String },

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("Timeout")]
    Timeout,

    /// 429, with the server's `Retry-After` in seconds when it sent one
    #[error("Rate limited{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<u64> },

    /// 403: wrong key, or the key has no read access to this library
    #[error("Access denied to library {library}: check the API key and its permissions")]
    Forbidden { library: String },

    #[error("Library not found: {library}")]
    NotFound { library: String },

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Parse error: {message}")]
    ParseError { message: String },
}

fn retry_hint(retry_after: &Option<u64>) -> String {
    retry_after
        .map(|seconds| format!(", retry after {}s", seconds))
        .unwrap_or_default()
}

impl From<serde_json::Error> for ZoteroError {
    fn from(err: serde_json::Error) -> Self {
        ZoteroError::ParseError {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_message() {
        assert_eq!(
            ZoteroError::RateLimited { retry_after: Some(12) }.to_string(),
            "Rate limited, retry after 12s"
        );
        assert_eq!(
            ZoteroError::RateLimited { retry_after: None }.to_string(),
            "Rate limited"
        );
    }
}
