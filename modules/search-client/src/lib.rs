pub mod error;
pub mod types;

pub use error::{Result, SearchError};
pub use types::{FacetStats, Hit, IndexSettings, SearchParams, SearchResponse};

use reqwest::RequestBuilder;

/// Client for the Algolia search REST API, bound to one index.
pub struct SearchClient {
    client: reqwest::Client,
    base_url: String,
    app_id: String,
    api_key: String,
    index_name: String,
}

impl SearchClient {
    pub fn new(app_id: &str, api_key: &str, index_name: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("https://{}-dsn.algolia.net", app_id.to_lowercase()),
            app_id: app_id.to_string(),
            api_key: api_key.to_string(),
            index_name: index_name.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("X-Algolia-Application-Id", &self.app_id)
            .header("X-Algolia-API-Key", &self.api_key)
    }

    /// Run a query against the bound index.
    pub async fn search(&self, params: &SearchParams) -> Result<SearchResponse> {
        let url = format!("{}/1/indexes/{}/query", self.base_url, self.index_name);

        tracing::debug!(
            index = %self.index_name,
            query = %params.query,
            page = params.page,
            facet_filters = params.facet_filters.len(),
            "Search request"
        );

        let resp = self
            .authed(self.client.post(&url))
            .json(params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SearchError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let raw = resp.text().await?;
        let results: SearchResponse = serde_json::from_str(&raw)?;
        tracing::debug!(
            nb_hits = results.nb_hits,
            processing_time_ms = results.processing_time_ms,
            "Search complete"
        );
        Ok(results)
    }

    /// Read the index settings (facet attributes, ranking).
    pub async fn get_settings(&self) -> Result<IndexSettings> {
        let url = format!("{}/1/indexes/{}/settings", self.base_url, self.index_name);
        let resp = self.authed(self.client.get(&url)).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SearchError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let raw = resp.text().await?;
        Ok(serde_json::from_str(&raw)?)
    }
}
