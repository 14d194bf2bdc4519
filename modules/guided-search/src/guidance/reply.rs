//! The guidance reply schema and its mapping onto facet options.

use guided_search_common::{
    FacetBucket, FacetCategory, FacetData, FacetOption, PriceBounds, Priority, Scalar,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Every reply shape the guidance agent is known to produce, deserialized in
/// one pass. `filters` distinguishes "absent" (`None`) from an explicit
/// `null` (`Some(None)`), which is the agent's "stop narrowing" sentinel.
///
/// A field with an unexpected shape reads as absent, so one odd sibling
/// never hides the others.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentReply {
    #[serde(default, deserialize_with = "lenient")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub filters: Option<Option<FiltersField>>,
    #[serde(default, deserialize_with = "lenient")]
    pub filter_choice: Option<FilterChoice>,
    #[serde(default, rename = "filterOptions", deserialize_with = "lenient")]
    pub filter_options: Option<Vec<ChoiceOption>>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FiltersField {
    Choice(FilterChoice),
    /// `{"city": "Paris"}` style: facet name to value(s).
    Direct(Map<String, Value>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterChoice {
    pub category: String,
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ChoiceOption {
    Detailed {
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        value: Option<Scalar>,
        #[serde(default)]
        count: Option<f64>,
    },
    Plain(Scalar),
}

/// What a reply asks the guide to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    /// Results are narrow enough; suggest nothing.
    Stop,
    Options(Vec<FacetOption>),
    /// Parsed, but matched none of the known shapes.
    Unrecognized,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<FiltersField>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Some(None)),
        other => Ok(serde_json::from_value(other).ok().map(Some)),
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

pub(crate) fn priority_for(category: FacetCategory, count: u64) -> Option<Priority> {
    match category {
        FacetCategory::Location if count > 100 => Some(Priority::High),
        FacetCategory::Location if count > 50 => Some(Priority::Medium),
        FacetCategory::Location => Some(Priority::Low),
        FacetCategory::Property if count > 50 => Some(Priority::High),
        FacetCategory::Property => Some(Priority::Medium),
        FacetCategory::Price | FacetCategory::Amenities => None,
    }
}

pub(crate) fn option_from_bucket(bucket: &FacetBucket, category: FacetCategory) -> FacetOption {
    FacetOption {
        label: bucket.label.clone(),
        value: bucket.value.clone(),
        count: bucket.count,
        category,
        priority: priority_for(category, bucket.count),
    }
}

impl ChoiceOption {
    fn label_and_value(&self) -> Option<(String, String)> {
        let (label, value) = match self {
            ChoiceOption::Detailed { label, value, .. } => (
                label.clone().filter(|l| !l.trim().is_empty()),
                value.as_ref().map(|v| v.to_string()).filter(|v| !v.trim().is_empty()),
            ),
            ChoiceOption::Plain(scalar) => (Some(scalar.to_string()), None),
        };
        match (label, value) {
            (Some(l), Some(v)) => Some((l, v)),
            (Some(l), None) => Some((l.clone(), l)),
            (None, Some(v)) => Some((v.clone(), v)),
            (None, None) => None,
        }
    }

    fn count(&self) -> Option<u64> {
        match self {
            ChoiceOption::Detailed { count: Some(c), .. } if *c >= 0.0 => Some(c.round() as u64),
            _ => None,
        }
    }
}

impl AgentReply {
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// The human-facing message, when the reply carries one.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    pub fn interpret(&self, facets: Option<&FacetData>) -> Interpretation {
        match &self.filters {
            Some(None) => return Interpretation::Stop,
            Some(Some(FiltersField::Choice(choice))) => {
                let options = options_from_choice(choice, facets);
                if !options.is_empty() {
                    return Interpretation::Options(options);
                }
            }
            Some(Some(FiltersField::Direct(map))) => {
                let options = options_from_facet_keys(map, facets);
                if !options.is_empty() {
                    return Interpretation::Options(options);
                }
            }
            None => {}
        }

        if let Some(choice) = &self.filter_choice {
            let options = options_from_choice(choice, facets);
            if !options.is_empty() {
                return Interpretation::Options(options);
            }
        }

        if let (Some(items), Some(facets)) = (&self.filter_options, facets) {
            let options: Vec<FacetOption> = items
                .iter()
                .filter_map(ChoiceOption::label_and_value)
                .filter_map(|(label, value)| {
                    match_any_facet(&value, facets).or_else(|| match_any_facet(&label, facets))
                })
                .collect();
            if !options.is_empty() {
                return Interpretation::Options(options);
            }
        }

        let options = options_from_facet_keys(&self.rest, facets);
        if !options.is_empty() {
            return Interpretation::Options(options);
        }

        Interpretation::Unrecognized
    }
}

fn options_from_choice(choice: &FilterChoice, facets: Option<&FacetData>) -> Vec<FacetOption> {
    let declared = FacetCategory::parse_loose(&choice.category);

    choice
        .options
        .iter()
        .filter_map(|opt| {
            let (label, value) = opt.label_and_value()?;
            let category = declared.or_else(|| facets.and_then(|f| infer_category(&value, f)))?;
            let count = opt
                .count()
                .or_else(|| facets.and_then(|f| f.count_for(&value).or_else(|| f.count_for(&label))))
                .unwrap_or(0);
            Some(FacetOption {
                label,
                value,
                count,
                category,
                priority: priority_for(category, count),
            })
        })
        .collect()
}

fn infer_category(value: &str, facets: &FacetData) -> Option<FacetCategory> {
    if find_bucket(value, &facets.cities).is_some() {
        Some(FacetCategory::Location)
    } else if find_bucket(value, &facets.property_types).is_some()
        || find_bucket(value, &facets.room_types).is_some()
    {
        Some(FacetCategory::Property)
    } else {
        None
    }
}

/// Exact (case-insensitive) matches win over substring matches.
fn find_bucket<'a>(needle: &str, buckets: &'a [FacetBucket]) -> Option<&'a FacetBucket> {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    buckets
        .iter()
        .find(|b| b.value.to_lowercase() == needle || b.label.to_lowercase() == needle)
        .or_else(|| {
            buckets.iter().find(|b| {
                let label = b.label.to_lowercase();
                !label.is_empty() && (label.contains(&needle) || needle.contains(&label))
            })
        })
}

fn match_any_facet(needle: &str, facets: &FacetData) -> Option<FacetOption> {
    [
        (&facets.cities, FacetCategory::Location),
        (&facets.property_types, FacetCategory::Property),
        (&facets.room_types, FacetCategory::Property),
    ]
    .into_iter()
    .find_map(|(buckets, category)| {
        find_bucket(needle, buckets).map(|b| option_from_bucket(b, category))
    })
}

fn needles(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Number(n) => vec![n.to_string()],
        Value::Array(items) => items.iter().flat_map(needles).collect(),
        Value::Object(obj) => obj
            .get("value")
            .or_else(|| obj.get("label"))
            .map(needles)
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn options_from_facet_keys(map: &Map<String, Value>, facets: Option<&FacetData>) -> Vec<FacetOption> {
    let mut options = Vec::new();

    for (key, value) in map {
        let key = key.to_lowercase();

        if key == "price" || key == "pricerange" || key == "price_range" {
            if let Some(bounds) = value.as_str().and_then(PriceBounds::parse) {
                options.push(FacetOption {
                    label: format!("${} - ${}", Scalar::Number(bounds.min), Scalar::Number(bounds.max)),
                    value: bounds.to_string(),
                    count: 0,
                    category: FacetCategory::Price,
                    priority: None,
                });
            }
            continue;
        }

        let Some(facets) = facets else {
            continue;
        };
        let (buckets, category) = match key.as_str() {
            "cities" | "city" | "location" | "neighborhood" => {
                (&facets.cities, FacetCategory::Location)
            }
            "propertytypes" | "property_type" | "propertytype" => {
                (&facets.property_types, FacetCategory::Property)
            }
            "roomtypes" | "room_type" | "roomtype" => (&facets.room_types, FacetCategory::Property),
            _ => continue,
        };

        options.extend(
            needles(value)
                .iter()
                .filter_map(|n| find_bucket(n, buckets))
                .map(|b| option_from_bucket(b, category)),
        );
    }

    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn facets() -> FacetData {
        FacetData {
            cities: vec![FacetBucket::new("Paris", 120), FacetBucket::new("Lyon", 60)],
            property_types: vec![FacetBucket::new("Apartment", 80), FacetBucket::new("Loft", 12)],
            room_types: vec![FacetBucket::new("Private room", 40)],
            price_range: None,
        }
    }

    fn interpret(value: Value) -> Interpretation {
        AgentReply::from_value(value).unwrap().interpret(Some(&facets()))
    }

    fn single(interpretation: Interpretation) -> FacetOption {
        match interpretation {
            Interpretation::Options(mut options) => options.remove(0),
            other => panic!("expected options, got {other:?}"),
        }
    }

    #[test]
    fn explicit_null_filters_means_stop() {
        assert_eq!(
            interpret(json!({"text": "Looks good", "filters": null})),
            Interpretation::Stop
        );
    }

    #[test]
    fn null_filters_survive_odd_siblings() {
        for reply in [
            json!({"text": "Great shortlist", "filters": null, "filterOptions": {"city": "Paris"}}),
            json!({"text": "Great shortlist", "filters": null, "filter_choice": "none"}),
            json!({"text": 4, "filters": null}),
        ] {
            assert_eq!(interpret(reply), Interpretation::Stop);
        }
    }

    #[test]
    fn odd_text_reads_as_absent() {
        let reply = AgentReply::from_value(json!({"text": ["a"], "filters": null})).unwrap();
        assert_eq!(reply.text(), None);
    }

    #[test]
    fn unusable_filters_value_is_not_stop() {
        let reply = AgentReply::from_value(json!({"filters": "none", "city": "Lyon"})).unwrap();
        assert!(reply.filters.is_none());
        assert_eq!(single(reply.interpret(Some(&facets()))).label, "Lyon");
    }

    #[test]
    fn missing_filters_is_not_stop() {
        assert_eq!(interpret(json!({"text": "Hello"})), Interpretation::Unrecognized);
    }

    #[test]
    fn structured_choice_maps_to_options() {
        let option = single(interpret(json!({
            "text": "Start with a city",
            "filters": {"category": "location", "options": [{"label": "Paris", "value": "paris", "count": 120}]}
        })));
        assert_eq!(
            option,
            FacetOption {
                label: "Paris".into(),
                value: "paris".into(),
                count: 120,
                category: FacetCategory::Location,
                priority: Some(Priority::High),
            }
        );
    }

    #[test]
    fn missing_count_is_looked_up_in_facets() {
        let option = single(interpret(json!({
            "filters": {"category": "property_type", "options": [{"label": "Apartment"}]}
        })));
        assert_eq!(option.value, "Apartment");
        assert_eq!(option.count, 80);
        assert_eq!(option.category, FacetCategory::Property);
        assert_eq!(option.priority, Some(Priority::High));
    }

    #[test]
    fn legacy_filter_choice_is_supported() {
        let option = single(interpret(json!({
            "filter_choice": {"category": "city", "options": ["Lyon"]}
        })));
        assert_eq!(option.label, "Lyon");
        assert_eq!(option.count, 60);
        assert_eq!(option.priority, Some(Priority::Medium));
    }

    #[test]
    fn filter_options_match_by_substring() {
        let option = single(interpret(json!({"filterOptions": ["private"]})));
        assert_eq!(option.value, "Private room");
        assert_eq!(option.category, FacetCategory::Property);
        assert_eq!(option.priority, Some(Priority::Medium));
    }

    #[test]
    fn top_level_facet_keys_match_snapshot() {
        let option = single(interpret(json!({"text": "How about", "cities": ["paris"]})));
        assert_eq!(option.value, "Paris");
        assert_eq!(option.category, FacetCategory::Location);
    }

    #[test]
    fn direct_filter_map_is_matched() {
        let option = single(interpret(json!({"filters": {"property_type": "loft"}})));
        assert_eq!(option.value, "Loft");
        assert_eq!(option.priority, Some(Priority::Medium));
    }

    #[test]
    fn price_key_becomes_price_option() {
        let option = single(interpret(json!({"price": "100:200"})));
        assert_eq!(option.label, "$100 - $200");
        assert_eq!(option.value, "100:200");
        assert_eq!(option.category, FacetCategory::Price);
        assert_eq!(option.priority, None);
    }

    #[test]
    fn unknown_names_without_facet_match_fall_through() {
        assert_eq!(
            interpret(json!({"filterOptions": ["Atlantis"]})),
            Interpretation::Unrecognized
        );
    }

    #[test]
    fn text_is_trimmed_and_blank_is_none() {
        let reply = AgentReply::from_value(json!({"text": "  hi  "})).unwrap();
        assert_eq!(reply.text(), Some("hi"));
        let reply = AgentReply::from_value(json!({"text": " "})).unwrap();
        assert_eq!(reply.text(), None);
    }
}
