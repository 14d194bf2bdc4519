use guided_search_common::{FilterValue, Filters, SearchState};

/// Owns the user's search state. Every mutation except [`SearchStore::update_page`]
/// sends the user back to the first page.
#[derive(Debug, Clone, Default)]
pub struct SearchStore {
    state: SearchState,
}

impl SearchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn filters(&self) -> &Filters {
        &self.state.filters
    }

    pub fn update_query(&mut self, query: impl Into<String>) {
        self.state.query = query.into();
        self.state.page = 0;
    }

    /// Replace the whole filter map.
    pub fn update_filters(&mut self, filters: Filters) {
        self.state.filters = filters;
        self.state.page = 0;
    }

    pub fn add_filter(&mut self, field: impl Into<String>, value: impl Into<FilterValue>) {
        self.state.filters.insert(field.into(), value.into());
        self.state.page = 0;
    }

    /// Removing a field that isn't set only resets the page.
    pub fn remove_filter(&mut self, field: &str) {
        self.state.filters.remove(field);
        self.state.page = 0;
    }

    pub fn update_page(&mut self, page: u32) {
        self.state.page = page;
    }

    pub fn reset(&mut self) {
        self.state = SearchState::default();
    }
}
