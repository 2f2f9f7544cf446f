//! REST client for the on-call platform's v2 API.
//!
//! `Api` is the seam the orchestrator talks through; `RestClient` is the
//! reqwest-backed implementation.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.pagerduty.com";
pub const PAGE_SIZE: usize = 100;

const ACCEPT_V2: &str = "application/vnd.pagerduty+json;version=2";

/// Query pairs. Keys may repeat (`statuses[]=a&statuses[]=b`).
pub type Query<'a> = [(&'a str, &'a str)];

#[async_trait]
pub trait Api: Send + Sync {
    /// Read `path`, following pagination and merging the `field` array of
    /// every page into the first page's envelope.
    ///
    /// A follow-up page that still reports `more` but carries no items ends
    /// the loop with a warning, so the merged list can be truncated.
    async fn fetch_collection(&self, path: &str, query: &Query<'_>, field: &str) -> Result<Value>;

    /// Read `path`, merging the collection named after the path itself
    /// (`/schedules` merges `schedules`).
    async fn fetch(&self, path: &str, query: &Query<'_>) -> Result<Value> {
        self.fetch_collection(path, query, path.trim_start_matches('/'))
            .await
    }

    /// Full update. 200 and 204 succeed.
    async fn replace(&self, path: &str, body: Value) -> Result<()>;

    /// Delete. Only 204 succeeds.
    async fn remove(&self, path: &str) -> Result<()>;

    /// Create. Only 201 succeeds; the created object is returned. `from` is
    /// sent as the `From` header when given, falling back to the client's
    /// default if it has one.
    async fn create(&self, path: &str, body: Value, from: Option<&str>) -> Result<Value>;
}

#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    from: Option<String>,
}

impl RestClient {
    pub fn new(access_token: &str) -> Result<Self> {
        Self::with_base_url(access_token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(access_token: &str, base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_V2));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Token token={}", access_token.trim())).map_err(
                |_| Error::Config("access token contains characters not valid in a header".into()),
            )?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            from: None,
        })
    }

    /// Default `From` header for creates that don't pass their own.
    pub fn with_from(mut self, from: Option<String>) -> Self {
        self.from = from.filter(|value| !value.trim().is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_page(&self, path: &str, query: &Query<'_>, offset: Option<usize>) -> Result<Value> {
        debug!(method = "GET", path, ?offset, "Sending request");

        let mut request = self
            .client
            .get(self.url(path))
            .query(query)
            .query(&[("limit", PAGE_SIZE)]);
        if let Some(offset) = offset {
            request = request.query(&[("offset", offset)]);
        }

        let response = request.send().await?;
        let response = expect_status(response, "GET", path, |s| s.is_success()).await?;
        Ok(response.json().await?)
    }
}

fn has_more(page: &Value) -> bool {
    page.get("more").and_then(Value::as_bool).unwrap_or(false)
}

fn take_items(page: &mut Value, field: &str) -> Vec<Value> {
    page.get_mut(field)
        .and_then(Value::as_array_mut)
        .map(std::mem::take)
        .unwrap_or_default()
}

async fn expect_status(
    response: reqwest::Response,
    method: &'static str,
    path: &str,
    accepted: impl Fn(StatusCode) -> bool,
) -> Result<reqwest::Response> {
    let status = response.status();
    if accepted(status) {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(
        method,
        path,
        status = status.as_u16(),
        body = %body,
        "Request rejected"
    );

    Err(Error::Request {
        method,
        path: path.to_string(),
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Api for RestClient {
    async fn fetch_collection(&self, path: &str, query: &Query<'_>, field: &str) -> Result<Value> {
        let mut merged = self.get_page(path, query, None).await?;
        let mut more = has_more(&merged);
        let mut offset = PAGE_SIZE;

        while more {
            let mut page = self.get_page(path, query, Some(offset)).await?;
            more = has_more(&page);
            let items = take_items(&mut page, field);

            if items.is_empty() && more {
                warn!(path, offset, "Empty page still reports more results, stopping pagination");
                break;
            }

            if let Some(object) = merged.as_object_mut() {
                match object.get_mut(field).and_then(Value::as_array_mut) {
                    Some(all) => all.extend(items),
                    None => {
                        object.insert(field.to_string(), Value::Array(items));
                    }
                }
            }
            offset += PAGE_SIZE;
        }

        if let Some(object) = merged.as_object_mut() {
            if object.contains_key("more") {
                object.insert("more".to_string(), Value::Bool(false));
            }
        }

        Ok(merged)
    }

    async fn replace(&self, path: &str, body: Value) -> Result<()> {
        debug!(method = "PUT", path, "Sending request");
        let response = self.client.put(self.url(path)).json(&body).send().await?;
        expect_status(response, "PUT", path, |s| {
            s == StatusCode::OK || s == StatusCode::NO_CONTENT
        })
        .await?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        debug!(method = "DELETE", path, "Sending request");
        let response = self.client.delete(self.url(path)).send().await?;
        expect_status(response, "DELETE", path, |s| s == StatusCode::NO_CONTENT).await?;
        Ok(())
    }

    async fn create(&self, path: &str, body: Value, from: Option<&str>) -> Result<Value> {
        let from = from.or(self.from.as_deref());
        debug!(method = "POST", path, ?from, "Sending request");
        let mut request = self.client.post(self.url(path)).json(&body);
        if let Some(from) = from {
            request = request.header("From", from);
        }

        let response = request.send().await?;
        let response =
            expect_status(response, "POST", path, |s| s == StatusCode::CREATED).await?;
        Ok(response.json().await?)
    }
}
