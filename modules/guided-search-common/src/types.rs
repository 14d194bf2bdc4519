use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Filter values ---

/// A single filter value. Untagged so the JSON form is exactly what the
/// search backend and the agent see (`"Paris"`, `2`, `true`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Number(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{}", *n as i64),
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Number(n as f64)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

/// A filter is either one scalar or a list of scalars (OR semantics).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    List(Vec<Scalar>),
    Scalar(Scalar),
}

impl FilterValue {
    /// All scalars carried by this value, in order.
    pub fn values(&self) -> Vec<&Scalar> {
        match self {
            FilterValue::Scalar(s) => vec![s],
            FilterValue::List(items) => items.iter().collect(),
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Scalar(s) => write!(f, "{s}"),
            FilterValue::List(items) => {
                let joined: Vec<String> = items.iter().map(|s| s.to_string()).collect();
                f.write_str(&joined.join(", "))
            }
        }
    }
}

macro_rules! scalar_filter_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FilterValue {
                fn from(value: $ty) -> Self {
                    FilterValue::Scalar(value.into())
                }
            }
        )*
    };
}

scalar_filter_from!(&str, String, f64, i64, bool);

impl From<Scalar> for FilterValue {
    fn from(value: Scalar) -> Self {
        FilterValue::Scalar(value)
    }
}

/// Applied filters keyed by field name.
pub type Filters = BTreeMap<String, FilterValue>;

/// Price filters travel as `"min:max"` strings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBounds {
    pub min: f64,
    pub max: f64,
}

impl PriceBounds {
    pub fn parse(raw: &str) -> Option<Self> {
        let (min, max) = raw.split_once(':')?;
        let min = min.trim().parse::<f64>().ok()?;
        let max = max.trim().parse::<f64>().ok()?;
        Some(Self { min, max })
    }
}

impl fmt::Display for PriceBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            Scalar::Number(self.min),
            Scalar::Number(self.max)
        )
    }
}

// --- Search state ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchState {
    pub query: String,
    pub filters: Filters,
    pub page: u32,
}

// --- Facets ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacetCategory {
    Location,
    Property,
    Price,
    Amenities,
}

impl FacetCategory {
    /// Accepts the category names agents actually produce, not just ours.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "location" | "city" | "cities" | "neighborhood" => Some(Self::Location),
            "property" | "property_type" | "propertytype" | "propertytypes" | "room_type"
            | "roomtype" | "roomtypes" => Some(Self::Property),
            "price" | "price_range" | "pricerange" => Some(Self::Price),
            "amenities" | "amenity" => Some(Self::Amenities),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Property => "property",
            Self::Price => "price",
            Self::Amenities => "amenities",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// One selectable filter suggestion surfaced by the guide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetOption {
    pub label: String,
    pub value: String,
    pub count: u64,
    pub category: FacetCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

/// A facet value with its hit count, as reported by the search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetBucket {
    pub label: String,
    pub value: String,
    pub count: u64,
    #[serde(default)]
    pub is_refined: bool,
}

impl FacetBucket {
    pub fn new(value: impl Into<String>, count: u64) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
            count,
            is_refined: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Snapshot of the facet values the guide may choose from. Serialized
/// verbatim into the agent prompt.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetData {
    pub cities: Vec<FacetBucket>,
    pub property_types: Vec<FacetBucket>,
    pub room_types: Vec<FacetBucket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceRange>,
}

impl FacetData {
    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
            && self.property_types.is_empty()
            && self.room_types.is_empty()
            && self.price_range.is_none()
    }

    /// Find the hit count for a value in any facet list.
    pub fn count_for(&self, value: &str) -> Option<u64> {
        self.cities
            .iter()
            .chain(&self.property_types)
            .chain(&self.room_types)
            .find(|b| b.value.eq_ignore_ascii_case(value) || b.label.eq_ignore_ascii_case(value))
            .map(|b| b.count)
    }

    pub fn is_property_type(&self, value: &str) -> bool {
        self.property_types.iter().any(|b| b.value == value)
    }
}

// --- Conversation ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionType {
    Filter,
    Query,
    Refinement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSuggestion {
    #[serde(rename = "type")]
    pub kind: SuggestionType,
    pub label: String,
    pub value: Scalar,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// One turn in the session's conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<FilterSuggestion>>,
}

impl AgentMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            suggestions: None,
        }
    }

    pub fn assistant(content: impl Into<String>, suggestions: Vec<FilterSuggestion>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            suggestions: if suggestions.is_empty() {
                None
            } else {
                Some(suggestions)
            },
        }
    }
}

// --- Guided flow ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Welcome,
    Location,
    PropertyType,
    Price,
    Amenities,
    Refine,
    Error,
}

impl Stage {
    /// Stages in the order the guide walks through them.
    pub const FLOW: [Stage; 5] = [
        Stage::Location,
        Stage::PropertyType,
        Stage::Price,
        Stage::Amenities,
        Stage::Refine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Welcome => "welcome",
            Stage::Location => "location",
            Stage::PropertyType => "property_type",
            Stage::Price => "price",
            Stage::Amenities => "amenities",
            Stage::Refine => "refine",
            Stage::Error => "error",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchFlowState {
    pub stage: Stage,
    pub result_count: u64,
    pub suggested_options: Vec<FacetOption>,
    pub agent_message: String,
    pub completed_stages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for SearchFlowState {
    fn default() -> Self {
        Self {
            stage: Stage::Welcome,
            result_count: 0,
            suggested_options: Vec::new(),
            agent_message: "Loading...".to_string(),
            completed_stages: Vec::new(),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_values_serialize_untagged() {
        let mut filters = Filters::new();
        filters.insert("city".into(), "Paris".into());
        filters.insert("bedrooms".into(), 2i64.into());
        filters.insert(
            "room_type".into(),
            FilterValue::List(vec!["Private room".into(), "Entire home/apt".into()]),
        );

        let value = serde_json::to_value(&filters).unwrap();
        assert_eq!(
            value,
            json!({
                "bedrooms": 2.0,
                "city": "Paris",
                "room_type": ["Private room", "Entire home/apt"],
            })
        );
    }

    #[test]
    fn filter_values_deserialize_lists_and_scalars() {
        let filters: Filters =
            serde_json::from_value(json!({"city": "Paris", "tags": ["a", 3], "pets": true}))
                .unwrap();
        assert_eq!(filters["city"], FilterValue::Scalar(Scalar::Text("Paris".into())));
        assert_eq!(
            filters["tags"],
            FilterValue::List(vec![Scalar::Text("a".into()), Scalar::Number(3.0)])
        );
        assert_eq!(filters["pets"], FilterValue::Scalar(Scalar::Bool(true)));
    }

    #[test]
    fn whole_numbers_display_without_fraction() {
        assert_eq!(Scalar::Number(120.0).to_string(), "120");
        assert_eq!(Scalar::Number(99.5).to_string(), "99.5");
        let list = FilterValue::List(vec!["Paris".into(), "Lyon".into()]);
        assert_eq!(list.to_string(), "Paris, Lyon");
    }

    #[test]
    fn price_bounds_parse_and_format() {
        let bounds = PriceBounds::parse("100:250").unwrap();
        assert_eq!(bounds, PriceBounds { min: 100.0, max: 250.0 });
        assert_eq!(bounds.to_string(), "100:250");
        assert!(PriceBounds::parse("cheap").is_none());
        assert!(PriceBounds::parse("100:").is_none());
    }

    #[test]
    fn facet_category_accepts_agent_aliases() {
        assert_eq!(FacetCategory::parse_loose("City"), Some(FacetCategory::Location));
        assert_eq!(FacetCategory::parse_loose("room_type"), Some(FacetCategory::Property));
        assert_eq!(FacetCategory::parse_loose("price"), Some(FacetCategory::Price));
        assert_eq!(FacetCategory::parse_loose("vibes"), None);
    }

    #[test]
    fn facet_data_uses_camel_case_keys() {
        let data = FacetData {
            cities: vec![FacetBucket::new("Paris", 120)],
            property_types: vec![],
            room_types: vec![],
            price_range: Some(PriceRange { min: Some(10.0), max: Some(500.0) }),
        };
        let value = serde_json::to_value(&data).unwrap();
        assert!(value.get("propertyTypes").is_some());
        assert_eq!(value["cities"][0]["isRefined"], json!(false));
        assert_eq!(value["priceRange"]["max"], json!(500.0));
    }

    #[test]
    fn stage_serializes_snake_case() {
        assert_eq!(serde_json::to_value(Stage::PropertyType).unwrap(), json!("property_type"));
        assert_eq!(Stage::Refine.to_string(), "refine");
    }

    #[test]
    fn assistant_message_omits_empty_suggestions() {
        let msg = AgentMessage::assistant("hello", vec![]);
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.suggestions.is_none());
    }
}
