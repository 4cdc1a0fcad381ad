//! `reqwest`-backed [`CrmClient`].

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use salescycle_shared::{Result, SalesCycleError};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::{CrmClient, Page};

/// Upstream maximum page size.
pub const PAGE_SIZE: usize = 25;

/// User-Agent string for CRM requests.
const USER_AGENT: &str = concat!("salescycle/", env!("CARGO_PKG_VERSION"));

/// CRM REST client authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpCrmClient {
    client: Client,
    base_url: String,
}

impl HttpCrmClient {
    /// Build a client for `base_url` (e.g. `https://api.acculynx.com/api/v2`).
    pub fn new(base_url: &Url, api_key: &str, timeout: Duration) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| SalesCycleError::config(format!("invalid API key: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| SalesCycleError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    /// GET `endpoint` and decode the body as JSON.
    async fn get_json(&self, endpoint: &str, query: &[(String, String)]) -> Result<Value> {
        let url = self.url_for(endpoint);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| SalesCycleError::Network(format!("{endpoint}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SalesCycleError::Api {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SalesCycleError::decode(format!("{endpoint}: {e}")))
    }
}

impl CrmClient for HttpCrmClient {
    #[instrument(skip(self, params))]
    async fn paginated_fetch(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        max_items: usize,
    ) -> Result<Page> {
        let mut items: Vec<Value> = Vec::new();
        let mut count = 0usize;
        let mut start_index = 0usize;

        while items.len() < max_items {
            let mut query = params.to_vec();
            query.push(("pageSize".into(), PAGE_SIZE.to_string()));
            query.push(("pageStartIndex".into(), start_index.to_string()));

            let body = self.get_json(endpoint, &query).await?;

            let page_items = match body.get("items") {
                Some(Value::Array(list)) => list.clone(),
                _ => Vec::new(),
            };
            count = body
                .get("count")
                .and_then(Value::as_u64)
                .map(|c| c as usize)
                .unwrap_or(0);

            let fetched = page_items.len();
            items.extend(page_items);
            debug!(start_index, fetched, total = items.len(), count, "fetched page");

            // Short page or upstream exhausted
            if fetched < PAGE_SIZE || items.len() >= count {
                break;
            }

            start_index += PAGE_SIZE;
        }

        items.truncate(max_items);
        Ok(Page { items, count })
    }

    #[instrument(skip(self))]
    async fn detail_fetch(&self, endpoint: &str) -> Result<Value> {
        self.get_json(endpoint, &[]).await
    }
}
