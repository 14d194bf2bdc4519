use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tracing::info;
use tracing_subscriber::EnvFilter;

use agent_client::AgentClient;
use guided_search::flow::{
    selection_for, spawn_ticketed, Completion, GuidanceRequest, GuidanceTicket, SearchFlow,
};
use guided_search::guidance::{GuidanceSession, ReplyMode};
use guided_search::render::{
    filter_chips, stage_label, stage_progress, FacetList, ListingCard, Pagination,
};
use guided_search::store::SearchStore;
use guided_search::sync::{facet_data, search_params, toggle_refinement, FACET_ATTRIBUTES};
use guided_search_common::{Config, FacetData, Scalar};
use search_client::{SearchClient, SearchResponse};

#[derive(Parser)]
#[command(name = "guided-search", about = "Guided property search in the terminal")]
struct Cli {
    /// Run one search and guidance cycle, print it, and exit
    #[arg(long)]
    once: bool,

    /// Fail guidance on unrecognized agent replies instead of falling back
    #[arg(long)]
    strict: bool,

    /// Initial search query
    #[arg(long, default_value = "")]
    query: String,
}

struct App {
    search: SearchClient,
    session: Arc<Mutex<GuidanceSession<AgentClient>>>,
    completions: mpsc::UnboundedSender<Completion>,
    store: SearchStore,
    flow: SearchFlow,
    results: Option<SearchResponse>,
    facets: Option<FacetData>,
}

enum Command {
    Pick,
    Query(String),
    Remove(String),
    Filter(String, String),
    Next,
    Previous,
    Reset,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (head, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        match head {
            "1" => Some(Self::Pick),
            "q" => Some(Self::Query(rest.to_string())),
            "rm" if !rest.is_empty() => Some(Self::Remove(rest.to_string())),
            "f" => {
                let (field, value) = rest.split_once(' ')?;
                Some(Self::Filter(field.to_string(), value.trim().to_string()))
            }
            "n" => Some(Self::Next),
            "p" => Some(Self::Previous),
            "reset" => Some(Self::Reset),
            "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

impl App {
    async fn refresh(&mut self) {
        let params = search_params(self.store.state());
        match self.search.search(&params).await {
            Ok(results) => {
                info!(
                    hits = results.nb_hits,
                    page = results.page,
                    ms = results.processing_time_ms,
                    "Search complete"
                );
                self.facets = Some(facet_data(&results, self.store.filters()));
                self.results = Some(results);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Search failed");
                self.results = None;
                self.facets = None;
            }
        }

        let result_count = self.results.as_ref().map_or(0, |r| r.nb_hits);
        let filters = self.store.filters().clone();
        if let Some(ticket) = self
            .flow
            .request_guidance(&filters, result_count, self.facets.is_some())
        {
            self.spawn_guidance(ticket, result_count);
        }
    }

    fn spawn_guidance(&self, ticket: GuidanceTicket, result_count: u64) {
        let request = GuidanceRequest {
            query: self.store.state().query.clone(),
            filters: self.store.filters().clone(),
            result_count,
            facets: self.facets.clone(),
        };
        spawn_ticketed(
            Arc::clone(&self.session),
            ticket,
            request,
            self.completions.clone(),
        );
    }

    fn print(&self) {
        println!();
        match &self.results {
            Some(results) => {
                println!("{} results", results.nb_hits);
                for hit in &results.hits {
                    println!("{}", ListingCard::from_hit(hit));
                }
                if let Some(pages) = Pagination::window(results.page, results.nb_pages) {
                    println!("{pages}");
                }
            }
            None => println!("Error loading search results"),
        }

        if let Some(facets) = &self.facets {
            for (attribute, buckets) in [
                ("city", &facets.cities),
                ("property_type", &facets.property_types),
                ("room_type", &facets.room_types),
            ] {
                if !buckets.is_empty() {
                    print!("{}", FacetList::new(attribute, buckets));
                }
            }
        }

        let chips = filter_chips(self.store.filters());
        if !chips.is_empty() {
            let chips: Vec<String> = chips.iter().map(|(k, v)| format!("{k}: {v}")).collect();
            println!("Filters: {}", chips.join(" | "));
        }

        self.print_guide();
    }

    fn print_guide(&self) {
        let state = self.flow.state();
        if self.flow.is_loading() {
            println!("\nGuide: thinking...");
            return;
        }
        println!(
            "\nGuide [{}% {}]: {}",
            stage_progress(state.stage),
            stage_label(state.stage),
            state.agent_message
        );
        for option in &state.suggested_options {
            println!("  1) {} ({})", option.label, option.count);
        }
        if state.result_count == 0 && !self.store.filters().is_empty() {
            println!("No properties match your current criteria. Try removing some filters.");
        }
    }

    /// Returns `false` when the user asked to quit.
    async fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::Pick => {
                let option = self.flow.state().suggested_options.first().cloned();
                match option.and_then(|o| selection_for(&o, self.facets.as_ref())) {
                    Some((field, value)) => self.store.add_filter(field, value),
                    None => println!("Nothing to pick"),
                }
            }
            Command::Query(text) => self.store.update_query(text),
            Command::Remove(field) => self.store.remove_filter(&field),
            Command::Filter(field, value) => {
                let filters = toggle_refinement(self.store.filters(), &field, Scalar::from(value));
                self.store.update_filters(filters);
            }
            Command::Next => {
                let page = self.store.state().page;
                if self.results.as_ref().is_some_and(|r| page + 1 < r.nb_pages) {
                    self.store.update_page(page + 1);
                }
            }
            Command::Previous => {
                let page = self.store.state().page;
                self.store.update_page(page.saturating_sub(1));
            }
            Command::Reset => {
                self.store.reset();
                // Cancels the cycle in flight, which releases the session.
                self.flow.reset();
                self.session.lock().await.reset();
            }
            Command::Quit => return false,
        }
        true
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("guided_search=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::from_env();
    config.log_redacted();

    let search = SearchClient::new(
        &config.algolia_app_id,
        &config.algolia_search_api_key,
        &config.algolia_index_name,
    );

    match search.get_settings().await {
        Ok(settings) => {
            let configured = settings.facet_attributes();
            for attribute in FACET_ATTRIBUTES {
                if !configured.contains(attribute) {
                    tracing::warn!(attribute, "Attribute is not configured for faceting");
                }
            }
        }
        Err(e) => tracing::warn!(error = %e, "Could not read index settings"),
    }

    let agent = AgentClient::new(
        &config.agent_api_url,
        &config.agent_id,
        &config.algolia_app_id,
        &config.agent_api_key,
    );
    let mode = if cli.strict || config.strict_replies {
        ReplyMode::Strict
    } else {
        ReplyMode::Lenient
    };

    let mut store = SearchStore::new();
    if !cli.query.is_empty() {
        store.update_query(cli.query.as_str());
    }

    let (completions, mut finished) = mpsc::unbounded_channel();
    let mut app = App {
        search,
        session: Arc::new(Mutex::new(GuidanceSession::new(agent).with_mode(mode))),
        completions,
        store,
        flow: SearchFlow::new(),
        results: None,
        facets: None,
    };

    app.refresh().await;
    app.print();

    if cli.once {
        while app.flow.is_loading() {
            let Some((seq, result)) = finished.recv().await else {
                break;
            };
            app.flow.complete(seq, result);
        }
        app.print_guide();
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("\nCommands: 1 | q <text> | rm <field> | f <field> <value> | n | p | reset | quit");
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let Some(command) = Command::parse(&line) else {
                    println!("Unknown command");
                    continue;
                };
                if !app.apply(command).await {
                    break;
                }
                app.refresh().await;
                app.print();
            }
            Some((seq, result)) = finished.recv() => {
                if app.flow.complete(seq, result) {
                    app.print_guide();
                }
            }
        }
    }

    info!("Goodbye");
    Ok(())
}
