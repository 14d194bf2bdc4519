//! Display models for listings, facets, pagination and the guide panel.

use std::fmt;

use guided_search_common::{FacetBucket, Filters, Scalar, Stage};
use search_client::Hit;

pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/500x300?text=No+Image";

const IMAGE_FIELDS: &[&str] = &[
    "image",
    "xl_picture_url",
    "picture_url",
    "medium_url",
    "thumbnail_url",
];

/// Facet values shown before collapsing the rest.
pub const FACET_DISPLAY_LIMIT: usize = 8;

const PAGE_WINDOW: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct ListingCard {
    pub object_id: String,
    pub name: String,
    pub image_url: String,
    pub description: String,
    pub category: Option<String>,
    pub rating: Option<f64>,
    pub badges: Vec<String>,
    pub price: Option<f64>,
    pub locality: Option<String>,
}

impl ListingCard {
    pub fn from_hit(hit: &Hit) -> Self {
        let image_url = IMAGE_FIELDS
            .iter()
            .find_map(|field| hit.str_attr(field))
            .unwrap_or(PLACEHOLDER_IMAGE)
            .to_string();

        let description = hit
            .str_attr("description")
            .map(str::to_string)
            .unwrap_or_else(|| {
                let mut text = format!(
                    "{} in {}",
                    hit.str_attr("property_type").unwrap_or("Property"),
                    hit.str_attr("city").unwrap_or("great location"),
                );
                if let Some(neighborhood) = hit.str_attr("neighborhood") {
                    text.push_str(", ");
                    text.push_str(neighborhood);
                }
                text
            });

        let category = ["category", "room_type", "property_type"]
            .iter()
            .find_map(|field| hit.str_attr(field))
            .map(str::to_string);

        let reviews = positive(hit, "reviews_count");
        let rating = positive(hit, "rating").or_else(|| reviews.map(|n| (n / 20.0).clamp(1.0, 5.0)));

        let mut badges = Vec::new();
        for (field, unit) in [("bedrooms", "bed"), ("bathrooms", "bath"), ("person_capacity", "guest")] {
            if let Some(n) = positive(hit, field) {
                badges.push(counted(n, unit));
            }
        }
        if let Some(n) = reviews {
            badges.push(format!("{} reviews", Scalar::Number(n)));
        }

        Self {
            object_id: hit.object_id.clone(),
            name: hit.str_attr("name").unwrap_or_default().to_string(),
            image_url,
            description,
            category,
            rating,
            badges,
            price: hit.num_attr("price"),
            locality: hit
                .str_attr("neighborhood")
                .or_else(|| hit.str_attr("city"))
                .map(str::to_string),
        }
    }

    pub fn price_label(&self) -> String {
        match self.price {
            Some(price) => format!("${}", group_thousands(price)),
            None => "$N/A".to_string(),
        }
    }
}

impl fmt::Display for ListingCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(rating) = self.rating {
            write!(f, "  ★ {rating:.1}")?;
        }
        writeln!(f)?;
        if let Some(category) = &self.category {
            writeln!(f, "  [{category}]")?;
        }
        writeln!(f, "  {}", self.description)?;
        if !self.badges.is_empty() {
            writeln!(f, "  {}", self.badges.join(" · "))?;
        }
        write!(f, "  {} per night", self.price_label())?;
        if let Some(locality) = &self.locality {
            write!(f, "  ({locality})")?;
        }
        Ok(())
    }
}

fn positive(hit: &Hit, field: &str) -> Option<f64> {
    hit.num_attr(field).filter(|n| *n > 0.0)
}

fn counted(n: f64, unit: &str) -> String {
    let suffix = if n == 1.0 { "" } else { "s" };
    format!("{} {unit}{suffix}", Scalar::Number(n))
}

fn group_thousands(value: f64) -> String {
    let formatted = Scalar::Number(value).to_string();
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(d) => ("-", d),
        None => ("", int_part),
    };

    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

/// A refinement list capped at [`FACET_DISPLAY_LIMIT`] entries.
#[derive(Debug, Clone, PartialEq)]
pub struct FacetList<'a> {
    pub attribute: &'a str,
    pub visible: &'a [FacetBucket],
    pub hidden: usize,
}

impl<'a> FacetList<'a> {
    pub fn new(attribute: &'a str, buckets: &'a [FacetBucket]) -> Self {
        let shown = buckets.len().min(FACET_DISPLAY_LIMIT);
        Self {
            attribute,
            visible: &buckets[..shown],
            hidden: buckets.len() - shown,
        }
    }

    pub fn show_more_label(&self) -> Option<String> {
        (self.hidden > 0).then(|| format!("Show {} more...", self.hidden))
    }
}

impl fmt::Display for FacetList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", chip_label(self.attribute))?;
        for bucket in self.visible {
            let mark = if bucket.is_refined { "x" } else { " " };
            writeln!(f, "  [{mark}] {} ({})", bucket.label, bucket.count)?;
        }
        if let Some(more) = self.show_more_label() {
            writeln!(f, "  {more}")?;
        }
        Ok(())
    }
}

/// Numbered page buttons around the current page (zero-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub current: u32,
    pub pages: Vec<u32>,
    pub has_previous: bool,
    pub has_next: bool,
}

impl Pagination {
    /// `None` when everything fits on one page.
    pub fn window(current: u32, nb_pages: u32) -> Option<Self> {
        if nb_pages <= 1 {
            return None;
        }

        let start = i64::from(current) - 2;
        let pages = (0..i64::from(PAGE_WINDOW.min(nb_pages)))
            .map(|i| start + i)
            .filter(|page| (0..i64::from(nb_pages)).contains(page))
            .filter_map(|page| u32::try_from(page).ok())
            .collect();

        Some(Self {
            current,
            pages,
            has_previous: current > 0,
            has_next: current + 1 < nb_pages,
        })
    }
}

impl fmt::Display for Pagination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.has_previous { "< " } else { "  " })?;
        for page in &self.pages {
            if *page == self.current {
                write!(f, "[{}] ", page + 1)?;
            } else {
                write!(f, "{} ", page + 1)?;
            }
        }
        if self.has_next {
            f.write_str(">")?;
        }
        Ok(())
    }
}

pub fn stage_progress(stage: Stage) -> u8 {
    match stage {
        Stage::Welcome => 0,
        Stage::Location => 25,
        Stage::PropertyType => 50,
        Stage::Price => 75,
        _ => 100,
    }
}

pub fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Welcome => "Getting started",
        Stage::Error => "Service unavailable",
        Stage::Refine => "Nearly there!",
        _ => "Building your search",
    }
}

/// Title-cased label for a filter key. Only the first underscore becomes a
/// space.
pub fn chip_label(key: &str) -> String {
    let spaced = key.replacen('_', " ", 1);
    let mut label = String::with_capacity(spaced.len());
    let mut at_word_start = true;
    for c in spaced.chars() {
        let is_word = c.is_alphanumeric() || c == '_';
        if is_word && at_word_start {
            label.extend(c.to_uppercase());
        } else {
            label.push(c);
        }
        at_word_start = !is_word;
    }
    label
}

/// `(label, value)` pairs for the applied-filter chips.
pub fn filter_chips(filters: &Filters) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|(key, value)| (chip_label(key), value.to_string()))
        .collect()
}
