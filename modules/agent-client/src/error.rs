use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Agent is not published (status 422). Publish the agent in Agent Studio before using it: {message}")]
    NotPublished { message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
}

impl AgentError {
    /// Build the error for a non-2xx response, singling out unpublished agents.
    pub fn from_status(status: u16, message: String) -> Self {
        if status == 422 {
            AgentError::NotPublished { message }
        } else {
            AgentError::Api { status, message }
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AgentError::Api { status, .. } => Some(*status),
            AgentError::NotPublished { .. } => Some(422),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Parse(err.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderValue> for AgentError {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        AgentError::InvalidHeader(err.to_string())
    }
}
