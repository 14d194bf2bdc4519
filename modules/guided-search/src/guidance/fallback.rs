use guided_search_common::{FacetCategory, FacetData, FacetOption};

use super::reply::{option_from_bucket, priority_for};

pub const PLACEHOLDER_LABEL: &str = "All Locations";

/// Deterministic suggestion used when the agent's reply can't be interpreted:
/// first city, else first property type, else first room type, else a
/// zero-count placeholder.
pub fn fallback_option(facets: Option<&FacetData>) -> FacetOption {
    let first = facets.and_then(|f| {
        f.cities
            .first()
            .map(|b| option_from_bucket(b, FacetCategory::Location))
            .or_else(|| {
                f.property_types
                    .first()
                    .map(|b| option_from_bucket(b, FacetCategory::Property))
            })
            .or_else(|| {
                f.room_types
                    .first()
                    .map(|b| option_from_bucket(b, FacetCategory::Property))
            })
    });

    first.unwrap_or_else(|| FacetOption {
        label: PLACEHOLDER_LABEL.to_string(),
        value: String::new(),
        count: 0,
        category: FacetCategory::Location,
        priority: priority_for(FacetCategory::Location, 0),
    })
}
