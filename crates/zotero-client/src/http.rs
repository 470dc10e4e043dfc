//! Native HTTP client using reqwest

use crate::error::ZoteroError;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Client;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct HttpClient {
    client: Client,
    user_agent: String,
}

impl HttpClient {
    pub fn new(user_agent: &str) -> Result<Self, ZoteroError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ZoteroError::RequestFailed {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
        })
    }

    /// GET `url` with query `params` and extra request `headers`.
    ///
    /// Only transport failures and 429 are errors here; other statuses are
    /// returned to the caller for interpretation.
    pub async fn get(
        &self,
        url: &str,
        params: &[(&str, String)],
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, ZoteroError> {
        let url =
            reqwest::Url::parse_with_params(url, params).map_err(|_| ZoteroError::InvalidUrl {
                url: url.to_string(),
            })?;

        let mut request = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ZoteroError::Timeout
            } else {
                ZoteroError::RequestFailed {
                    message: e.without_url().to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ZoteroError::RateLimited {
                retry_after: retry_after(response.headers()),
            });
        }

        let body = response.text().await.map_err(|e| ZoteroError::ParseError {
            message: e.to_string(),
        })?;

        Ok(HttpResponse { status, body })
    }
}

/// Seconds from a `Retry-After` header; the HTTP-date form is ignored
fn retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
