use guided_search_common::{Filters, Stage};

const LOCATION_FIELDS: &[&str] = &["city", "neighborhood"];
const PROPERTY_FIELDS: &[&str] = &["property_type", "room_type"];
const PRICE_FIELD: &str = "price";

fn has_any(filters: &Filters, fields: &[&str]) -> bool {
    fields.iter().any(|f| filters.contains_key(*f))
}

/// Where the guide goes next, judged only from the applied filters.
pub fn next_stage(filters: &Filters) -> Stage {
    let has_location = has_any(filters, LOCATION_FIELDS);
    let has_property_type = has_any(filters, PROPERTY_FIELDS);
    let has_price = filters.contains_key(PRICE_FIELD);

    if !has_location && !has_property_type {
        Stage::Location
    } else if !has_property_type {
        Stage::PropertyType
    } else if !has_price {
        Stage::Price
    } else {
        Stage::Refine
    }
}

/// Stages that precede `next` in flow order.
pub fn completed_stages(next: Stage) -> Vec<String> {
    Stage::FLOW
        .iter()
        .take_while(|s| **s != next)
        .map(|s| s.as_str().to_string())
        .collect()
}
