//! Translation between the local search state and the hosted search index.

use guided_search_common::{
    FacetBucket, FacetData, FilterValue, Filters, PriceBounds, PriceRange, Scalar, SearchState,
};
use search_client::{SearchParams, SearchResponse};

/// Facets requested with every query.
pub const FACET_ATTRIBUTES: &[&str] = &[
    "city",
    "property_type",
    "room_type",
    "price",
    "person_capacity",
    "bedrooms",
];

/// Attributes filtered by numeric range (`"min:max"`) rather than by value.
pub const RANGE_ATTRIBUTES: &[&str] = &["price"];

const CITY_LIMIT: usize = 10;
const PROPERTY_TYPE_LIMIT: usize = 8;
const ROOM_TYPE_LIMIT: usize = 6;

/// Refinements currently applied on one attribute, as the index reports them.
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    pub attribute: String,
    pub values: Vec<Scalar>,
}

/// Fold refinements into the filter map: one value stays a scalar, several
/// become a list. Attributes without values are dropped.
pub fn filters_from_refinements(refinements: &[Refinement]) -> Filters {
    refinements
        .iter()
        .filter(|r| !r.values.is_empty())
        .map(|r| {
            let value = match r.values.as_slice() {
                [single] => FilterValue::Scalar(single.clone()),
                many => FilterValue::List(many.to_vec()),
            };
            (r.attribute.clone(), value)
        })
        .collect()
}

/// The inverse of [`filters_from_refinements`].
pub fn refinements_from_filters(filters: &Filters) -> Vec<Refinement> {
    filters
        .iter()
        .map(|(attribute, value)| Refinement {
            attribute: attribute.clone(),
            values: value.values().into_iter().cloned().collect(),
        })
        .collect()
}

/// Toggle one value of a refinement list, the way a facet checkbox does:
/// values on the same attribute accumulate, and toggling a present value
/// removes it. Range attributes hold a single value and are replaced.
pub fn toggle_refinement(filters: &Filters, attribute: &str, value: Scalar) -> Filters {
    let mut refinements = refinements_from_filters(filters);

    match refinements.iter_mut().find(|r| r.attribute == attribute) {
        Some(refinement) if RANGE_ATTRIBUTES.contains(&attribute) => {
            refinement.values = vec![value];
        }
        Some(refinement) => match refinement.values.iter().position(|v| *v == value) {
            Some(i) => {
                refinement.values.remove(i);
            }
            None => refinement.values.push(value),
        },
        None => refinements.push(Refinement {
            attribute: attribute.to_string(),
            values: vec![value],
        }),
    }

    filters_from_refinements(&refinements)
}

/// Build index query parameters for the current state.
pub fn search_params(state: &SearchState) -> SearchParams {
    let mut facet_filters = Vec::new();
    let mut numeric_filters = Vec::new();

    for (field, value) in &state.filters {
        if RANGE_ATTRIBUTES.contains(&field.as_str()) {
            if let Some(bounds) = value
                .values()
                .first()
                .and_then(|s| PriceBounds::parse(&s.to_string()))
            {
                numeric_filters.push(format!("{field}>={}", Scalar::Number(bounds.min)));
                numeric_filters.push(format!("{field}<={}", Scalar::Number(bounds.max)));
                continue;
            }
        }

        let group: Vec<String> = value
            .values()
            .iter()
            .map(|s| format!("{field}:{s}"))
            .collect();
        if !group.is_empty() {
            facet_filters.push(group);
        }
    }

    SearchParams {
        query: state.query.clone(),
        page: state.page,
        hits_per_page: None,
        facets: FACET_ATTRIBUTES.iter().map(|s| s.to_string()).collect(),
        facet_filters,
        numeric_filters,
        max_values_per_facet: Some(CITY_LIMIT as u32),
    }
}

fn buckets(results: &SearchResponse, attribute: &str, filters: &Filters, limit: usize) -> Vec<FacetBucket> {
    let Some(values) = results.facets.get(attribute) else {
        return Vec::new();
    };

    let refined: Vec<String> = filters
        .get(attribute)
        .map(|v| v.values().iter().map(|s| s.to_string()).collect())
        .unwrap_or_default();

    let mut buckets: Vec<FacetBucket> = values
        .iter()
        .map(|(value, count)| FacetBucket {
            label: value.clone(),
            value: value.clone(),
            count: *count,
            is_refined: refined.contains(value),
        })
        .collect();

    // Highest count first, ties alphabetical.
    buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    buckets.truncate(limit);
    buckets
}

/// Facet snapshot handed to the guidance agent.
pub fn facet_data(results: &SearchResponse, filters: &Filters) -> FacetData {
    FacetData {
        cities: buckets(results, "city", filters, CITY_LIMIT),
        property_types: buckets(results, "property_type", filters, PROPERTY_TYPE_LIMIT),
        room_types: buckets(results, "room_type", filters, ROOM_TYPE_LIMIT),
        price_range: results.facets_stats.get("price").map(|stats| PriceRange {
            min: Some(stats.min),
            max: Some(stats.max),
        }),
    }
}
