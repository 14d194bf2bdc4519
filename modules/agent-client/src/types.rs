use guided_search_common::{
    AgentMessage, FilterSuggestion, Filters, Role, Scalar, SuggestionType,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What the caller knows about the search when it sends a turn.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    pub current_query: Option<String>,
    pub applied_filters: Filters,
    pub result_count: u64,
}

/// Parsed reply from one completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentResponse {
    pub message: String,
    pub suggestions: Vec<FilterSuggestion>,
}

// --- Completion request ---

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CompletionRequest {
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<RequestConfiguration>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RequestConfiguration {
    pub search_parameters: SearchParameters,
    pub result_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SearchParameters {
    pub query: String,
    pub filters: Filters,
}

impl From<&ConversationContext> for RequestConfiguration {
    fn from(ctx: &ConversationContext) -> Self {
        Self {
            search_parameters: SearchParameters {
                query: ctx.current_query.clone().unwrap_or_default(),
                filters: ctx.applied_filters.clone(),
            },
            result_count: ctx.result_count,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct WireMessage {
    pub role: Role,
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct TextPart {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

impl From<&AgentMessage> for WireMessage {
    fn from(msg: &AgentMessage) -> Self {
        Self {
            role: msg.role,
            parts: vec![TextPart {
                kind: "text",
                text: msg.content.clone(),
            }],
        }
    }
}

// --- Completion response ---

/// The completions endpoint has shipped several body shapes; every field
/// is optional and [`CompletionResponse::text`] picks the first one present.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct CompletionResponse {
    #[serde(default)]
    pub parts: Option<Vec<ResponsePart>>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub filters: Option<Map<String, Value>>,
    #[serde(default)]
    pub query_suggestion: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResponsePart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

pub(crate) const NO_RESPONSE: &str = "No response received";

impl CompletionResponse {
    pub fn text(&self) -> String {
        if let Some(parts) = &self.parts {
            let joined: Vec<&str> = parts
                .iter()
                .filter(|p| p.kind == "text")
                .filter_map(|p| p.text.as_deref())
                .collect();
            if !joined.is_empty() {
                return joined.join("");
            }
        }

        self.content
            .clone()
            .filter(|c| !c.is_empty())
            .or_else(|| self.message.clone().filter(|m| !m.is_empty()))
            .unwrap_or_else(|| NO_RESPONSE.to_string())
    }

    /// Structured hints some agent revisions attach next to the text.
    pub fn suggestions(&self) -> Vec<FilterSuggestion> {
        let mut suggestions = Vec::new();

        if let Some(filters) = &self.filters {
            for (field, value) in filters {
                let Some(scalar) = scalar_from_json(value) else {
                    continue;
                };
                suggestions.push(FilterSuggestion {
                    kind: SuggestionType::Filter,
                    label: format!("{field}: {scalar}"),
                    value: scalar,
                    field: Some(field.clone()),
                });
            }
        }

        if let Some(query) = self.query_suggestion.as_ref().filter(|q| !q.is_empty()) {
            suggestions.push(FilterSuggestion {
                kind: SuggestionType::Query,
                label: query.clone(),
                value: Scalar::Text(query.clone()),
                field: None,
            });
        }

        suggestions
    }
}

fn scalar_from_json(value: &Value) -> Option<Scalar> {
    match value {
        Value::String(s) => Some(Scalar::Text(s.clone())),
        Value::Number(n) => n.as_f64().map(Scalar::Number),
        Value::Bool(b) => Some(Scalar::Bool(*b)),
        _ => None,
    }
}

/// Agent metadata returned by the pre-flight lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}
