pub mod error;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

pub use error::{AgentError, Result};
pub use types::{AgentInfo, AgentResponse, ConversationContext};

use async_trait::async_trait;
use guided_search_common::AgentMessage;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use types::{CompletionRequest, CompletionResponse, RequestConfiguration, WireMessage};

/// Completions are requested whole; the guide never streams.
const COMPLETION_QUERY: &str = "compatibilityMode=ai-sdk-5&stream=false";

/// A conversational agent reachable over some transport.
///
/// Implementations keep the session's conversation history: the user turn
/// is recorded before the request goes out, the assistant turn after the
/// reply comes back.
#[async_trait]
pub trait AgentTransport: Send {
    /// Pre-flight check that the agent exists and is usable.
    async fn validate_agent(&self) -> Result<AgentInfo>;

    async fn send_message(
        &mut self,
        text: &str,
        context: Option<&ConversationContext>,
    ) -> Result<AgentResponse>;

    fn reset_session(&mut self);

    fn history(&self) -> &[AgentMessage];
}

/// Client for the Algolia Agent Studio completions API.
pub struct AgentClient {
    client: reqwest::Client,
    base_url: String,
    agent_id: String,
    app_id: String,
    api_key: String,
    history: Vec<AgentMessage>,
}

impl AgentClient {
    pub fn new(base_url: &str, agent_id: &str, app_id: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            agent_id: agent_id.to_string(),
            app_id: app_id.to_string(),
            api_key: api_key.to_string(),
            history: Vec::new(),
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("X-Algolia-Application-Id", HeaderValue::from_str(&self.app_id)?);
        headers.insert("X-Algolia-API-Key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn post_completion(
        &self,
        context: Option<&ConversationContext>,
    ) -> Result<CompletionResponse> {
        let url = format!(
            "{}/1/agents/{}/completions?{}",
            self.base_url, self.agent_id, COMPLETION_QUERY
        );
        let body = CompletionRequest {
            messages: self.history.iter().map(WireMessage::from).collect(),
            configuration: context.map(RequestConfiguration::from),
        };

        tracing::debug!(agent_id = %self.agent_id, turns = body.messages.len(), "Agent completion request");

        let resp = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(AgentError::from_status(status.as_u16(), message));
        }

        let raw = resp.text().await?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[async_trait]
impl AgentTransport for AgentClient {
    async fn validate_agent(&self) -> Result<AgentInfo> {
        let url = format!("{}/1/agents/{}", self.base_url, self.agent_id);
        let resp = self
            .client
            .get(&url)
            .headers(self.headers()?)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(AgentError::from_status(status.as_u16(), message));
        }

        let info: AgentInfo = resp.json().await?;
        tracing::info!(agent_id = %self.agent_id, name = ?info.name, status = ?info.status, "Agent validated");
        Ok(info)
    }

    async fn send_message(
        &mut self,
        text: &str,
        context: Option<&ConversationContext>,
    ) -> Result<AgentResponse> {
        self.history.push(AgentMessage::user(text));

        if let Some(ctx) = context {
            tracing::debug!(
                result_count = ctx.result_count,
                filters = ctx.applied_filters.len(),
                query = ?ctx.current_query,
                "Sending agent turn"
            );
        }

        let completion = self.post_completion(context).await.map_err(|e| {
            tracing::warn!(error = %e, "Agent completion failed");
            e
        })?;

        let message = completion.text();
        let suggestions = completion.suggestions();
        self.history
            .push(AgentMessage::assistant(message.clone(), suggestions.clone()));

        Ok(AgentResponse {
            message,
            suggestions,
        })
    }

    fn reset_session(&mut self) {
        self.history.clear();
    }

    fn history(&self) -> &[AgentMessage] {
        &self.history
    }
}
