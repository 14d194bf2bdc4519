//! In-memory agent transports for tests.
//!
//! `ScriptedTransport` replays canned replies in order and records every
//! prompt and context it was sent, so tests can assert on both sides of the exchange.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use guided_search_common::AgentMessage;

use crate::{AgentError, AgentInfo, AgentResponse, AgentTransport, ConversationContext, Result};

pub struct ScriptedTransport {
    replies: VecDeque<Result<String>>,
    rejection: Option<(u16, String)>,
    history: Vec<AgentMessage>,
    validations: AtomicUsize,
    pub prompts: Vec<String>,
    pub contexts: Vec<Option<ConversationContext>>,
    pub resets: usize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            replies: VecDeque::new(),
            rejection: None,
            history: Vec::new(),
            validations: AtomicUsize::new(0),
            prompts: Vec::new(),
            contexts: Vec::new(),
            resets: 0,
        }
    }

    /// Queue a successful reply.
    pub fn reply(mut self, text: impl Into<String>) -> Self {
        self.replies.push_back(Ok(text.into()));
        self
    }

    /// Queue a failed request.
    pub fn fail(mut self, err: AgentError) -> Self {
        self.replies.push_back(Err(err));
        self
    }

    /// Make the pre-flight validation fail with this status and body.
    pub fn reject_validation(mut self, status: u16, message: impl Into<String>) -> Self {
        self.rejection = Some((status, message.into()));
        self
    }

    pub fn validations(&self) -> usize {
        self.validations.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentTransport for ScriptedTransport {
    async fn validate_agent(&self) -> Result<AgentInfo> {
        self.validations.fetch_add(1, Ordering::SeqCst);
        match &self.rejection {
            Some((status, message)) => Err(AgentError::from_status(*status, message.clone())),
            None => Ok(AgentInfo {
                id: Some("scripted".to_string()),
                name: Some("Scripted agent".to_string()),
                status: Some("published".to_string()),
            }),
        }
    }

    async fn send_message(
        &mut self,
        text: &str,
        context: Option<&ConversationContext>,
    ) -> Result<AgentResponse> {
        self.prompts.push(text.to_string());
        self.contexts.push(context.cloned());
        self.history.push(AgentMessage::user(text));

        let reply = self
            .replies
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::Network("no scripted reply left".to_string())))?;

        self.history.push(AgentMessage::assistant(reply.clone(), vec![]));
        Ok(AgentResponse {
            message: reply,
            suggestions: vec![],
        })
    }

    fn reset_session(&mut self) {
        self.resets += 1;
        self.history.clear();
    }

    fn history(&self) -> &[AgentMessage] {
        &self.history
    }
}
