//! Guided flow state and request coordination.
//!
//! Every filter or result change may start a guidance request. Requests are
//! ticketed: a ticket carries a sequence number and a cancellation token.
//! Issuing a new ticket cancels the previous one, and completions are only
//! applied if they carry the newest sequence number.

use std::sync::Arc;

use agent_client::AgentTransport;
use guided_search_common::{
    FacetCategory, FacetData, FacetOption, FilterValue, Filters, PriceBounds, SearchFlowState,
    Stage,
};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::guidance::{completed_stages, Guidance, GuidanceError, GuidanceSession};

/// Shown when the agent has nothing to say yet.
pub const WELCOME_MESSAGE: &str =
    "I'm here to help you find the perfect stay. Pick an option below to get started.";

/// Identifies the inputs of a guidance request. Two requests with the same
/// fingerprint would ask the agent the same question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(filters: &Filters, result_count: u64, facets_loaded: bool) -> Self {
        let filters = serde_json::to_string(filters).unwrap_or_default();
        Self(format!("{filters}|{result_count}|{facets_loaded}"))
    }
}

#[derive(Debug, Clone)]
pub struct GuidanceTicket {
    pub seq: u64,
    pub token: CancellationToken,
}

#[derive(Debug, Default)]
pub struct GuidanceCoordinator {
    next_seq: u64,
    current: Option<GuidanceTicket>,
    last_fingerprint: Option<Fingerprint>,
}

impl GuidanceCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket for a request with this fingerprint, cancelling the one
    /// in flight. Returns `None` when the fingerprint matches the last request.
    pub fn begin(&mut self, fingerprint: Fingerprint) -> Option<GuidanceTicket> {
        if self.last_fingerprint.as_ref() == Some(&fingerprint) {
            tracing::debug!("Skipping guidance request with unchanged inputs");
            return None;
        }

        if let Some(previous) = self.current.take() {
            tracing::debug!(seq = previous.seq, "Cancelling superseded guidance request");
            previous.token.cancel();
        }

        self.next_seq += 1;
        let ticket = GuidanceTicket {
            seq: self.next_seq,
            token: CancellationToken::new(),
        };
        self.current = Some(ticket.clone());
        self.last_fingerprint = Some(fingerprint);
        Some(ticket)
    }

    pub fn is_current(&self, seq: u64) -> bool {
        self.current.as_ref().is_some_and(|t| t.seq == seq)
    }

    /// Close the ticket if it is still the current one.
    pub fn finish(&mut self, seq: u64) -> bool {
        if self.is_current(seq) {
            self.current = None;
            true
        } else {
            false
        }
    }

    pub fn in_flight(&self) -> bool {
        self.current.is_some()
    }

    /// Forget the last fingerprint so the next request always runs.
    pub fn invalidate(&mut self) {
        if let Some(previous) = self.current.take() {
            previous.token.cancel();
        }
        self.last_fingerprint = None;
    }
}

/// Run one guidance cycle under a ticket. Resolves to
/// [`GuidanceError::Superseded`] as soon as the ticket is cancelled; the
/// in-flight agent request is dropped with it.
pub async fn run_ticketed<T: AgentTransport>(
    session: &mut GuidanceSession<T>,
    ticket: &GuidanceTicket,
    query: &str,
    filters: &Filters,
    result_count: u64,
    facets: Option<&FacetData>,
) -> Result<Guidance, GuidanceError> {
    tokio::select! {
        biased;
        _ = ticket.token.cancelled() => Err(GuidanceError::Superseded),
        result = session.get_guidance(query, filters, result_count, facets) => result,
    }
}

/// A finished guidance cycle, tagged with its ticket's sequence number.
pub type Completion = (u64, Result<Guidance, GuidanceError>);

/// Inputs of one guidance cycle, owned so the cycle can run on its own task.
#[derive(Debug, Clone, Default)]
pub struct GuidanceRequest {
    pub query: String,
    pub filters: Filters,
    pub result_count: u64,
    pub facets: Option<FacetData>,
}

/// Run a ticketed cycle on a background task and report it on `completions`.
/// A ticket cancelled while waiting for the session reports `Superseded`
/// without touching the agent.
pub fn spawn_ticketed<T>(
    session: Arc<Mutex<GuidanceSession<T>>>,
    ticket: GuidanceTicket,
    request: GuidanceRequest,
    completions: mpsc::UnboundedSender<Completion>,
) -> JoinHandle<()>
where
    T: AgentTransport + Sync + 'static,
{
    tokio::spawn(async move {
        let mut session = tokio::select! {
            biased;
            _ = ticket.token.cancelled() => {
                let _ = completions.send((ticket.seq, Err(GuidanceError::Superseded)));
                return;
            }
            session = session.lock() => session,
        };

        let result = run_ticketed(
            &mut session,
            &ticket,
            &request.query,
            &request.filters,
            request.result_count,
            request.facets.as_ref(),
        )
        .await;
        let _ = completions.send((ticket.seq, result));
    })
}

/// UI-facing flow state for the guide panel.
#[derive(Debug, Default)]
pub struct SearchFlow {
    state: SearchFlowState,
    coordinator: GuidanceCoordinator,
}

impl SearchFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SearchFlowState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.coordinator.in_flight()
    }

    pub fn set_result_count(&mut self, result_count: u64) {
        self.state.result_count = result_count;
    }

    /// Ask for a ticket for the current inputs.
    pub fn request_guidance(
        &mut self,
        filters: &Filters,
        result_count: u64,
        facets_loaded: bool,
    ) -> Option<GuidanceTicket> {
        self.state.result_count = result_count;
        self.coordinator
            .begin(Fingerprint::new(filters, result_count, facets_loaded))
    }

    /// Apply a finished request. Stale or superseded completions are dropped
    /// and `false` is returned.
    pub fn complete(&mut self, seq: u64, result: Result<Guidance, GuidanceError>) -> bool {
        if !self.coordinator.finish(seq) {
            tracing::debug!(seq, "Discarding stale guidance result");
            return false;
        }

        match result {
            Ok(guidance) => {
                self.state.agent_message = if guidance.message.is_empty() {
                    WELCOME_MESSAGE.to_string()
                } else {
                    guidance.message
                };
                self.state.suggested_options = guidance.facet_options;
                self.state.completed_stages = completed_stages(guidance.next_stage);
                self.state.stage = guidance.next_stage;
                self.state.error = None;
            }
            Err(GuidanceError::Superseded) => return false,
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(error = %message, "Guidance failed");
                self.state.stage = Stage::Error;
                self.state.suggested_options.clear();
                self.state.agent_message = message.clone();
                self.state.error = Some(message);
                // Errors are not retried automatically; a new input change
                // must be allowed to try again.
                self.coordinator.invalidate();
            }
        }
        true
    }

    /// Start over; the next request always runs.
    pub fn reset(&mut self) {
        self.coordinator.invalidate();
        self.state = SearchFlowState::default();
    }
}

/// The filter a chosen option applies, or `None` for an option without a value.
pub fn selection_for(option: &FacetOption, facets: Option<&FacetData>) -> Option<(String, FilterValue)> {
    if option.value.is_empty() {
        return None;
    }

    match option.category {
        FacetCategory::Location => Some(("city".to_string(), option.value.clone().into())),
        FacetCategory::Property => {
            let field = if facets.is_some_and(|f| f.is_property_type(&option.value)) {
                "property_type"
            } else {
                "room_type"
            };
            Some((field.to_string(), option.value.clone().into()))
        }
        FacetCategory::Price => {
            let bounds = PriceBounds::parse(&option.value)?;
            Some(("price".to_string(), bounds.to_string().into()))
        }
        FacetCategory::Amenities => Some(("amenities".to_string(), option.value.clone().into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guided_search_common::FacetBucket;

    fn filters(pairs: &[(&str, &str)]) -> Filters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), (*v).into()))
            .collect()
    }

    fn option(category: FacetCategory, value: &str) -> FacetOption {
        FacetOption {
            label: value.to_string(),
            value: value.to_string(),
            count: 10,
            category,
            priority: None,
        }
    }

    fn guidance(stage: Stage) -> Guidance {
        Guidance {
            message: "Try Paris".into(),
            facet_options: vec![option(FacetCategory::Location, "Paris")],
            next_stage: stage,
        }
    }

    #[test]
    fn identical_fingerprint_yields_no_ticket() {
        let mut coordinator = GuidanceCoordinator::new();
        let f = filters(&[("city", "Paris")]);
        assert!(coordinator.begin(Fingerprint::new(&f, 10, true)).is_some());
        assert!(coordinator.begin(Fingerprint::new(&f, 10, true)).is_none());
        assert!(coordinator.begin(Fingerprint::new(&f, 10, false)).is_some());
    }

    #[test]
    fn new_ticket_cancels_previous() {
        let mut coordinator = GuidanceCoordinator::new();
        let first = coordinator
            .begin(Fingerprint::new(&Filters::new(), 500, true))
            .unwrap();
        let second = coordinator
            .begin(Fingerprint::new(&Filters::new(), 120, true))
            .unwrap();

        assert!(first.token.is_cancelled());
        assert!(!second.token.is_cancelled());
        assert!(second.seq > first.seq);
        assert!(!coordinator.is_current(first.seq));
        assert!(coordinator.is_current(second.seq));
    }

    #[test]
    fn stale_completion_is_discarded() {
        let mut flow = SearchFlow::new();
        let first = flow.request_guidance(&Filters::new(), 500, true).unwrap();
        let second = flow.request_guidance(&filters(&[("city", "Paris")]), 120, true).unwrap();

        assert!(flow.complete(second.seq, Ok(guidance(Stage::PropertyType))));
        assert!(!flow.complete(first.seq, Ok(guidance(Stage::Location))));
        assert_eq!(flow.state().stage, Stage::PropertyType);
        assert_eq!(flow.state().completed_stages, vec!["location"]);
        assert!(!flow.is_loading());
    }

    #[test]
    fn error_switches_to_error_stage_verbatim() {
        let mut flow = SearchFlow::new();
        let ticket = flow.request_guidance(&Filters::new(), 500, true).unwrap();
        let err = GuidanceError::MalformedReply("nope".into());
        let text = err.to_string();

        assert!(flow.complete(ticket.seq, Err(err)));
        assert_eq!(flow.state().stage, Stage::Error);
        assert_eq!(flow.state().agent_message, text);
        assert_eq!(flow.state().error.as_deref(), Some(text.as_str()));
        assert!(flow.state().suggested_options.is_empty());

        // Same inputs may be retried after an error.
        assert!(flow.request_guidance(&Filters::new(), 500, true).is_some());
    }

    #[test]
    fn superseded_result_is_ignored() {
        let mut flow = SearchFlow::new();
        let ticket = flow.request_guidance(&Filters::new(), 500, true).unwrap();
        assert!(!flow.complete(ticket.seq, Err(GuidanceError::Superseded)));
        assert_eq!(flow.state().stage, Stage::Welcome);
    }

    #[test]
    fn success_clears_previous_error() {
        let mut flow = SearchFlow::new();
        let t = flow.request_guidance(&Filters::new(), 1, true).unwrap();
        flow.complete(t.seq, Err(GuidanceError::MalformedReply("x".into())));
        let t = flow.request_guidance(&Filters::new(), 2, true).unwrap();
        flow.complete(t.seq, Ok(guidance(Stage::Location)));
        assert_eq!(flow.state().stage, Stage::Location);
        assert!(flow.state().error.is_none());
        assert_eq!(flow.state().suggested_options.len(), 1);
    }

    #[test]
    fn selection_maps_categories_to_fields() {
        let facets = FacetData {
            property_types: vec![FacetBucket::new("Apartment", 80)],
            room_types: vec![FacetBucket::new("Private room", 40)],
            ..Default::default()
        };

        assert_eq!(
            selection_for(&option(FacetCategory::Location, "Paris"), Some(&facets)),
            Some(("city".into(), "Paris".into()))
        );
        assert_eq!(
            selection_for(&option(FacetCategory::Property, "Apartment"), Some(&facets)),
            Some(("property_type".into(), "Apartment".into()))
        );
        assert_eq!(
            selection_for(&option(FacetCategory::Property, "Private room"), Some(&facets)),
            Some(("room_type".into(), "Private room".into()))
        );
        assert_eq!(
            selection_for(&option(FacetCategory::Price, "100.0:200"), Some(&facets)),
            Some(("price".into(), "100:200".into()))
        );
        assert_eq!(selection_for(&option(FacetCategory::Price, "cheap"), None), None);
    }

    #[test]
    fn placeholder_option_selects_nothing() {
        let placeholder = crate::guidance::fallback::fallback_option(None);
        assert_eq!(selection_for(&placeholder, None), None);
    }

    #[tokio::test]
    async fn spawned_cycles_apply_only_the_newest() {
        use agent_client::fixtures::ScriptedTransport;

        let session = Arc::new(Mutex::new(GuidanceSession::new(
            ScriptedTransport::new().reply(r#"{"text": "Try Lyon", "city": "Lyon"}"#),
        )));
        let facets = FacetData {
            cities: vec![FacetBucket::new("Paris", 120), FacetBucket::new("Lyon", 60)],
            ..Default::default()
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut flow = SearchFlow::new();

        let first = flow.request_guidance(&Filters::new(), 500, true).unwrap();
        let second = flow.request_guidance(&Filters::new(), 480, true).unwrap();
        let request = GuidanceRequest {
            result_count: 480,
            facets: Some(facets),
            ..Default::default()
        };

        spawn_ticketed(Arc::clone(&session), first.clone(), request.clone(), tx.clone())
            .await
            .unwrap();
        spawn_ticketed(Arc::clone(&session), second.clone(), request, tx)
            .await
            .unwrap();

        let mut applied = Vec::new();
        while let Some((seq, result)) = rx.recv().await {
            if flow.complete(seq, result) {
                applied.push(seq);
            }
        }

        assert_eq!(applied, vec![second.seq]);
        assert!(!flow.is_loading());
        assert_eq!(flow.state().agent_message, "Try Lyon");
        assert_eq!(flow.state().suggested_options[0].label, "Lyon");
        assert_eq!(session.lock().await.transport().prompts.len(), 1);
    }

    #[tokio::test]
    async fn cancelled_ticket_resolves_superseded() {
        use agent_client::fixtures::ScriptedTransport;

        let mut session = GuidanceSession::new(ScriptedTransport::new().reply("{\"filters\": null}"));
        let mut coordinator = GuidanceCoordinator::new();
        let ticket = coordinator
            .begin(Fingerprint::new(&Filters::new(), 5, false))
            .unwrap();
        coordinator.begin(Fingerprint::new(&Filters::new(), 6, false));

        let result = run_ticketed(&mut session, &ticket, "", &Filters::new(), 5, None).await;
        assert!(matches!(result, Err(GuidanceError::Superseded)));
        assert!(session.transport().prompts.is_empty());
    }
}
