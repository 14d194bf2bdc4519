//! Guidance interpreter: asks the agent for the next filter and turns its
//! free-text reply into at most one facet option.

pub mod extract;
pub mod fallback;
pub mod prompt;
pub mod reply;
pub mod stage;

use agent_client::{AgentError, AgentTransport, ConversationContext};
use guided_search_common::{FacetData, FacetOption, Filters, Stage};
use thiserror::Error;

use extract::{extract_json, strip_span};
use fallback::fallback_option;
use prompt::build_context_message;
use reply::{AgentReply, Interpretation};

pub use stage::{completed_stages, next_stage};

#[derive(Debug, Error)]
pub enum GuidanceError {
    #[error("Agent service unavailable: Agent configuration invalid: {0}")]
    InvalidAgent(AgentError),

    #[error("Agent service unavailable: {0}")]
    Unavailable(#[from] AgentError),

    #[error("Agent reply did not match the guidance format: {0}")]
    MalformedReply(String),

    #[error("Guidance request was superseded by a newer one")]
    Superseded,
}

/// How unrecognized agent replies are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyMode {
    /// Substitute a deterministic default suggestion.
    #[default]
    Lenient,
    /// Fail the guidance call with [`GuidanceError::MalformedReply`].
    Strict,
}

/// Result of one guidance cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Guidance {
    pub message: String,
    pub facet_options: Vec<FacetOption>,
    pub next_stage: Stage,
}

/// One guided conversation. Owns its transport, and with it the history.
pub struct GuidanceSession<T> {
    transport: T,
    started: bool,
    mode: ReplyMode,
}

impl<T: AgentTransport> GuidanceSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            started: false,
            mode: ReplyMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ReplyMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Run one guidance cycle.
    ///
    /// The first call validates the agent and fails outright if it is
    /// unusable. After that, only transport failures are errors; replies
    /// that can't be interpreted fall back to a default suggestion (unless
    /// the session is in [`ReplyMode::Strict`]).
    pub async fn get_guidance(
        &mut self,
        query: &str,
        filters: &Filters,
        result_count: u64,
        facets: Option<&FacetData>,
    ) -> Result<Guidance, GuidanceError> {
        if !self.started {
            self.transport
                .validate_agent()
                .await
                .map_err(GuidanceError::InvalidAgent)?;
            self.transport.reset_session();
            self.started = true;
        }

        let prompt = build_context_message(filters, result_count, facets);
        let context = ConversationContext {
            current_query: (!query.is_empty()).then(|| query.to_string()),
            applied_filters: filters.clone(),
            result_count,
        };

        let response = self.transport.send_message(&prompt, Some(&context)).await?;
        let (message, mut facet_options) = self.interpret(&response.message, facets)?;
        facet_options.truncate(1);

        Ok(Guidance {
            message,
            facet_options,
            next_stage: next_stage(filters),
        })
    }

    fn interpret(
        &self,
        raw: &str,
        facets: Option<&FacetData>,
    ) -> Result<(String, Vec<FacetOption>), GuidanceError> {
        let extracted = extract_json(raw);

        let parsed = extracted
            .as_ref()
            .map(|found| AgentReply::from_value(found.value.clone()));

        let (message, interpretation) = match (&extracted, parsed) {
            (Some(found), Some(Ok(reply))) => {
                let message = reply
                    .text()
                    .map(str::to_string)
                    .unwrap_or_else(|| display_text(raw, &found.span));
                (message, reply.interpret(facets))
            }
            (Some(found), Some(Err(e))) => {
                tracing::warn!(error = %e, "Agent reply JSON did not match the guidance schema");
                (display_text(raw, &found.span), Interpretation::Unrecognized)
            }
            _ => (raw.trim().to_string(), Interpretation::Unrecognized),
        };

        match interpretation {
            Interpretation::Stop => Ok((message, Vec::new())),
            Interpretation::Options(options) => Ok((message, options)),
            Interpretation::Unrecognized => match self.mode {
                ReplyMode::Strict => Err(GuidanceError::MalformedReply(raw.to_string())),
                ReplyMode::Lenient => {
                    let option = fallback_option(facets);
                    tracing::warn!(label = %option.label, "Using fallback guidance suggestion");
                    Ok((message, vec![option]))
                }
            },
        }
    }

    /// Forget the conversation; the next call validates the agent again.
    pub fn reset(&mut self) {
        self.started = false;
        self.transport.reset_session();
    }
}

fn display_text(raw: &str, span: &std::ops::Range<usize>) -> String {
    let stripped = strip_span(raw, span);
    if stripped.is_empty() {
        raw.trim().to_string()
    } else {
        stripped
    }
}
