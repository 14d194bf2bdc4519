use guided_search_common::{FacetData, Filters};

const SINGLE_CHOICE_INSTRUCTION: &str =
    " Provide a brief 1-2 sentence message and exactly ONE filter choice in the specified JSON format.";

/// Build the per-cycle context turn sent to the agent.
pub fn build_context_message(
    filters: &Filters,
    result_count: u64,
    facets: Option<&FacetData>,
) -> String {
    let mut message = format!("Search status: {result_count} properties found.");

    if filters.is_empty() {
        message.push_str(" No filters applied yet.");
    } else {
        let applied = serde_json::to_string(filters).unwrap_or_default();
        message.push_str(&format!(" Applied filters: {applied}."));
    }

    if let Some(facets) = facets {
        let available = serde_json::to_string(facets).unwrap_or_default();
        message.push_str(&format!(" Available filter options: {available}."));
    }

    message.push_str(SINGLE_CHOICE_INSTRUCTION);
    message
}
