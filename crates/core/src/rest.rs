use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::{Fact, FactId, FactQuery, FactStore, NewFact, Result, StoreError, VotePatch};

/// Connection settings for a PostgREST fact table.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Project root, e.g. `https://abc.supabase.co`.
    pub base_url: Url,
    /// Anonymous API key, sent as both `apikey` and bearer token.
    pub api_key: String,
    /// Table name under `/rest/v1/`.
    pub table: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl RestConfig {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::Config(format!("store url {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Config(format!(
                "store url {base_url} cannot carry a path"
            )));
        }
        Ok(Self {
            base_url,
            api_key: api_key.into(),
            table: "facts".to_string(),
            timeout: Duration::from_secs(10),
        })
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Error body PostgREST sends with non-2xx responses.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: String,
}

/// Fact table reached over the PostgREST dialect (Supabase).
///
/// Each trait call is exactly one HTTP request.
pub struct RestFactStore {
    client: Client,
    config: RestConfig,
}

impl RestFactStore {
    pub fn new(config: RestConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&config.api_key)?);
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {}", config.api_key))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// `{base}/rest/v1/{table}`
    fn table_url(&self) -> Result<Url> {
        let mut url = self.config.base_url.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|_| StoreError::Config("store url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["rest", "v1", self.config.table.as_str()]);
        Ok(url)
    }

    fn select_url(&self, query: &FactQuery) -> Result<Url> {
        let mut url = self.table_url()?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", "*");
            if let Some(category) = &query.category {
                pairs.append_pair("category", &format!("eq.{category}"));
            }
            let direction = if query.descending { "desc" } else { "asc" };
            pairs.append_pair("order", &format!("{}.{direction}", query.order_by.column()));
            pairs.append_pair("limit", &query.limit.to_string());
        }
        Ok(url)
    }

    fn update_url(&self, id: FactId) -> Result<Url> {
        let mut url = self.table_url()?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{id}"))
            .append_pair("select", "*");
        Ok(url)
    }

    fn returning(request: RequestBuilder) -> RequestBuilder {
        request.header("Prefer", "return=representation")
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| StoreError::Config("api key is not a valid header value".to_string()))
}

/// Turn a non-2xx response into [`StoreError::Rejected`], keeping the
/// PostgREST `message` when the body has one.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<PostgrestError>(&body)
        .map(|e| e.message)
        .unwrap_or(body);
    Err(StoreError::Rejected {
        status: status.as_u16(),
        message,
    })
}

impl FactStore for RestFactStore {
    async fn select(&self, query: &FactQuery) -> Result<Vec<Fact>> {
        let url = self.select_url(query)?;
        debug!(%url, "select facts");
        let response = check(self.client.get(url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn insert(&self, fact: &NewFact) -> Result<Vec<Fact>> {
        let url = self.table_url()?;
        debug!(%url, category = %fact.category, "insert fact");
        let request = Self::returning(self.client.post(url)).json(fact);
        let response = check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn update(&self, id: FactId, patch: &VotePatch) -> Result<Fact> {
        let url = self.update_url(id)?;
        debug!(%url, column = patch.kind.column(), value = patch.value, "update fact");
        let request = Self::returning(self.client.patch(url)).json(&patch.to_json());
        let response = check(request.send().await?).await?;
        let rows: Vec<Fact> = response.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("fact id {id}")))
    }
}
