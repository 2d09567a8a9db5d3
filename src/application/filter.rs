//! Translates listing query parameters into a typed filter.
//!
//! The filter has two renderings: a predicate used by the in-memory
//! repositories and a JSON document that feeds cache keys and the search
//! response echo. Set-valued criteria are sorted and de-duplicated on
//! construction so equivalent queries render identically.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;
use time::{
    Date, Duration, OffsetDateTime, Time, format_description::BorrowedFormatItem,
    macros::format_description,
};
use uuid::Uuid;

use crate::application::pagination::{PageParams, PageRequest};
use crate::domain::entities::PropertyRecord;
use crate::domain::types::{Furnished, ListedBy, ListingType, PropertyType};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("invalid value `{value}` for `{field}`")]
    InvalidValue { field: &'static str, value: String },
}

impl FilterError {
    fn invalid(field: &'static str, value: &str) -> Self {
        Self::InvalidValue {
            field,
            value: value.to_string(),
        }
    }
}

/// Raw query string of the list and search endpoints.
///
/// Everything arrives as text; multi-valued fields are comma separated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyQueryParams {
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    #[serde(rename = "type")]
    pub property_type: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub min_area: Option<String>,
    pub max_area: Option<String>,
    pub bedrooms: Option<String>,
    pub bathrooms: Option<String>,
    pub amenities: Option<String>,
    pub furnished: Option<String>,
    pub available_from: Option<String>,
    pub listed_by: Option<String>,
    pub tags: Option<String>,
    pub min_rating: Option<String>,
    pub is_verified: Option<String>,
    pub listing_type: Option<String>,
    pub created_by: Option<String>,
    pub created_after: Option<String>,
    pub created_before: Option<String>,
    pub q: Option<String>,
    pub sort_by: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PropertyQueryParams {
    pub fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page.clone(),
            limit: self.limit.clone(),
        }
    }
}

/// `"3"` matches exactly three, `"3+"` matches three or more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountFilter {
    Exactly(i32),
    AtLeast(i32),
}

impl CountFilter {
    fn parse(field: &'static str, raw: &str) -> Result<Self, FilterError> {
        let parse = |value: &str| {
            value
                .trim()
                .parse::<i32>()
                .map_err(|_| FilterError::invalid(field, raw))
        };
        match raw.strip_suffix('+') {
            Some(minimum) => Ok(Self::AtLeast(parse(minimum)?)),
            None => Ok(Self::Exactly(parse(raw)?)),
        }
    }

    pub fn matches(&self, value: i32) -> bool {
        match self {
            Self::Exactly(expected) => value == *expected,
            Self::AtLeast(minimum) => value >= *minimum,
        }
    }

    fn to_value(self) -> Value {
        match self {
            Self::Exactly(expected) => json!(expected),
            Self::AtLeast(minimum) => json!({ "$gte": minimum }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyFilter {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub property_types: Vec<PropertyType>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub min_area: Option<f64>,
    pub max_area: Option<f64>,
    pub bedrooms: Option<CountFilter>,
    pub bathrooms: Option<CountFilter>,
    /// Every listed amenity must be present.
    pub amenities: Vec<String>,
    pub furnished: Vec<Furnished>,
    /// Listing must be available on or before this date.
    pub available_by: Option<Date>,
    pub listed_by: Vec<ListedBy>,
    /// At least one listed tag must be present.
    pub tags: Vec<String>,
    pub min_rating: Option<f64>,
    pub is_verified: Option<bool>,
    pub listing_type: Option<ListingType>,
    pub created_by: Option<Uuid>,
    pub created_after: Option<OffsetDateTime>,
    pub created_before: Option<OffsetDateTime>,
}

impl PropertyFilter {
    pub fn from_params(params: &PropertyQueryParams) -> Result<Self, FilterError> {
        // Inclusive of the whole `createdBefore` day.
        let created_before = parse_date("createdBefore", params.created_before.as_deref())?
            .map(|date| day_start(date.next_day().unwrap_or(date)) - Duration::nanoseconds(1));

        Ok(Self {
            min_price: parse_number("minPrice", params.min_price.as_deref())?,
            max_price: parse_number("maxPrice", params.max_price.as_deref())?,
            property_types: parse_set("type", params.property_type.as_deref())?,
            state: non_blank(params.state.as_deref()).map(str::to_string),
            city: non_blank(params.city.as_deref()).map(str::to_string),
            min_area: parse_number("minArea", params.min_area.as_deref())?,
            max_area: parse_number("maxArea", params.max_area.as_deref())?,
            bedrooms: non_blank(params.bedrooms.as_deref())
                .map(|raw| CountFilter::parse("bedrooms", raw))
                .transpose()?,
            bathrooms: non_blank(params.bathrooms.as_deref())
                .map(|raw| CountFilter::parse("bathrooms", raw))
                .transpose()?,
            amenities: split_list(params.amenities.as_deref()),
            furnished: parse_set("furnished", params.furnished.as_deref())?,
            available_by: parse_date("availableFrom", params.available_from.as_deref())?,
            listed_by: parse_set("listedBy", params.listed_by.as_deref())?,
            tags: split_list(params.tags.as_deref()),
            min_rating: parse_number("minRating", params.min_rating.as_deref())?,
            is_verified: parse_bool("isVerified", params.is_verified.as_deref())?,
            listing_type: non_blank(params.listing_type.as_deref())
                .map(|raw| {
                    raw.parse::<ListingType>()
                        .map_err(|_| FilterError::invalid("listingType", raw))
                })
                .transpose()?,
            created_by: non_blank(params.created_by.as_deref())
                .map(|raw| Uuid::parse_str(raw).map_err(|_| FilterError::invalid("createdBy", raw)))
                .transpose()?,
            created_after: parse_date("createdAfter", params.created_after.as_deref())?
                .map(day_start),
            created_before,
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, property: &PropertyRecord) -> bool {
        within(property.price, self.min_price, self.max_price)
            && within(property.area_sq_ft, self.min_area, self.max_area)
            && (self.property_types.is_empty()
                || self.property_types.contains(&property.property_type))
            && self
                .state
                .as_deref()
                .is_none_or(|needle| contains_ignore_case(&property.state, needle))
            && self
                .city
                .as_deref()
                .is_none_or(|needle| contains_ignore_case(&property.city, needle))
            && self.bedrooms.is_none_or(|count| count.matches(property.bedrooms))
            && self
                .bathrooms
                .is_none_or(|count| count.matches(property.bathrooms))
            && self
                .amenities
                .iter()
                .all(|amenity| property.amenities.contains(amenity))
            && (self.furnished.is_empty() || self.furnished.contains(&property.furnished))
            && self
                .available_by
                .is_none_or(|date| property.available_from <= date)
            && (self.listed_by.is_empty() || self.listed_by.contains(&property.listed_by))
            && (self.tags.is_empty() || self.tags.iter().any(|tag| property.tags.contains(tag)))
            && self
                .min_rating
                .is_none_or(|minimum| property.rating.is_some_and(|rating| rating >= minimum))
            && self
                .is_verified
                .is_none_or(|verified| property.is_verified == verified)
            && self
                .listing_type
                .is_none_or(|listing_type| property.listing_type == listing_type)
            && self
                .created_by
                .is_none_or(|owner| property.created_by == owner)
            && self
                .created_after
                .is_none_or(|after| property.created_at >= after)
            && self
                .created_before
                .is_none_or(|before| property.created_at <= before)
    }

    /// Document form used for cache keys and the search echo.
    ///
    /// Case-insensitive text matches render as `/value/i`.
    pub fn to_value(&self) -> Value {
        let mut doc = Map::new();
        if let Some(range) = range_value(self.min_price, self.max_price) {
            doc.insert("price".into(), range);
        }
        if !self.property_types.is_empty() {
            doc.insert("type".into(), json!({ "$in": labels(&self.property_types) }));
        }
        if let Some(state) = &self.state {
            doc.insert("state".into(), Value::String(format!("/{state}/i")));
        }
        if let Some(city) = &self.city {
            doc.insert("city".into(), Value::String(format!("/{city}/i")));
        }
        if let Some(range) = range_value(self.min_area, self.max_area) {
            doc.insert("areaSqFt".into(), range);
        }
        if let Some(bedrooms) = self.bedrooms {
            doc.insert("bedrooms".into(), bedrooms.to_value());
        }
        if let Some(bathrooms) = self.bathrooms {
            doc.insert("bathrooms".into(), bathrooms.to_value());
        }
        if !self.amenities.is_empty() {
            doc.insert("amenities".into(), json!({ "$all": self.amenities }));
        }
        if !self.furnished.is_empty() {
            doc.insert("furnished".into(), json!({ "$in": labels(&self.furnished) }));
        }
        if let Some(date) = self.available_by {
            doc.insert("availableFrom".into(), json!({ "$lte": format_date(date) }));
        }
        if !self.listed_by.is_empty() {
            doc.insert("listedBy".into(), json!({ "$in": labels(&self.listed_by) }));
        }
        if !self.tags.is_empty() {
            doc.insert("tags".into(), json!({ "$in": self.tags }));
        }
        if let Some(minimum) = self.min_rating {
            doc.insert("rating".into(), json!({ "$gte": number(minimum) }));
        }
        if let Some(verified) = self.is_verified {
            doc.insert("isVerified".into(), Value::Bool(verified));
        }
        if let Some(listing_type) = self.listing_type {
            doc.insert("listingType".into(), json!(listing_type.as_str()));
        }
        if let Some(owner) = self.created_by {
            doc.insert("createdBy".into(), json!(owner.to_string()));
        }
        if self.created_after.is_some() || self.created_before.is_some() {
            let mut range = Map::new();
            if let Some(after) = self.created_after {
                range.insert("$gte".into(), json!(after.unix_timestamp()));
            }
            if let Some(before) = self.created_before {
                range.insert("$lte".into(), json!(before.unix_timestamp()));
            }
            doc.insert("createdAt".into(), Value::Object(range));
        }
        Value::Object(doc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    PriceAsc,
    PriceDesc,
    AreaAsc,
    AreaDesc,
    RatingDesc,
    DateAsc,
    #[default]
    DateDesc,
    /// Text-match score first, newest first on ties. Only valid with a text query.
    Relevance,
}

impl SortOrder {
    /// Unknown names fall back to newest first, as does `relevance` without text.
    pub fn parse(raw: Option<&str>, has_text: bool) -> Self {
        match non_blank(raw) {
            Some("price_asc") => Self::PriceAsc,
            Some("price_desc") => Self::PriceDesc,
            Some("area_asc") => Self::AreaAsc,
            Some("area_desc") => Self::AreaDesc,
            Some("rating_desc") => Self::RatingDesc,
            Some("date_asc") => Self::DateAsc,
            Some("date_desc") => Self::DateDesc,
            Some("relevance") | None if has_text => Self::Relevance,
            _ => Self::DateDesc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::AreaAsc => "area_asc",
            Self::AreaDesc => "area_desc",
            Self::RatingDesc => "rating_desc",
            Self::DateAsc => "date_asc",
            Self::DateDesc => "date_desc",
            Self::Relevance => "relevance",
        }
    }
}

/// A complete catalog read: filter, optional text, ordering and page.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyQuery {
    pub filter: PropertyFilter,
    pub text: Option<String>,
    pub sort: SortOrder,
    pub page: PageRequest,
}

impl PropertyQuery {
    /// Listing reads ignore `q` and `sortBy`; they are always newest first.
    pub fn listing(params: &PropertyQueryParams) -> Result<Self, FilterError> {
        Ok(Self {
            filter: PropertyFilter::from_params(params)?,
            text: None,
            sort: SortOrder::DateDesc,
            page: PageRequest::from_params(&params.page_params()),
        })
    }

    pub fn search(params: &PropertyQueryParams) -> Result<Self, FilterError> {
        let text = non_blank(params.q.as_deref()).map(str::to_string);
        Ok(Self {
            filter: PropertyFilter::from_params(params)?,
            sort: SortOrder::parse(params.sort_by.as_deref(), text.is_some()),
            text,
            page: PageRequest::from_params(&params.page_params()),
        })
    }

    /// Filter document including the text clause, if any.
    pub fn filter_value(&self) -> Value {
        let mut value = self.filter.to_value();
        if let (Some(text), Value::Object(doc)) = (&self.text, &mut value) {
            doc.insert("$text".into(), json!({ "$search": text }));
        }
        value
    }

    /// Lower-cased words of the text query.
    pub fn text_terms(&self) -> Vec<String> {
        self.text
            .as_deref()
            .map(|text| text.split_whitespace().map(str::to_lowercase).collect())
            .unwrap_or_default()
    }
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_number(field: &'static str, raw: Option<&str>) -> Result<Option<f64>, FilterError> {
    non_blank(raw)
        .map(|value| {
            value
                .parse::<f64>()
                .ok()
                .filter(|number| number.is_finite())
                .ok_or_else(|| FilterError::invalid(field, value))
        })
        .transpose()
}

fn parse_date(field: &'static str, raw: Option<&str>) -> Result<Option<Date>, FilterError> {
    non_blank(raw)
        .map(|value| Date::parse(value, DATE_FORMAT).map_err(|_| FilterError::invalid(field, value)))
        .transpose()
}

fn parse_bool(field: &'static str, raw: Option<&str>) -> Result<Option<bool>, FilterError> {
    match non_blank(raw) {
        None => Ok(None),
        Some("true") => Ok(Some(true)),
        Some("false") => Ok(Some(false)),
        Some(other) => Err(FilterError::invalid(field, other)),
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    non_blank(raw)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        })
        .unwrap_or_default()
}

fn parse_set<T>(field: &'static str, raw: Option<&str>) -> Result<Vec<T>, FilterError>
where
    T: std::str::FromStr + Ord,
{
    let mut values = BTreeSet::new();
    for item in split_list(raw) {
        let parsed = item
            .parse::<T>()
            .map_err(|_| FilterError::invalid(field, &item))?;
        values.insert(parsed);
    }
    Ok(values.into_iter().collect())
}

fn labels<T: std::fmt::Display>(values: &[T]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

fn within(value: f64, min: Option<f64>, max: Option<f64>) -> bool {
    min.is_none_or(|min| value >= min) && max.is_none_or(|max| value <= max)
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn range_value(min: Option<f64>, max: Option<f64>) -> Option<Value> {
    if min.is_none() && max.is_none() {
        return None;
    }
    let mut range = Map::new();
    if let Some(min) = min {
        range.insert("$gte".into(), number(min));
    }
    if let Some(max) = max {
        range.insert("$lte".into(), number(max));
    }
    Some(Value::Object(range))
}

/// Whole numbers render without a fraction so `100` and `100.0` share a key.
fn number(value: f64) -> Value {
    const EXACT_INT: f64 = 9_007_199_254_740_992.0;
    if value.fract() == 0.0 && value.abs() < EXACT_INT {
        json!(value as i64)
    } else {
        json!(value)
    }
}

fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

fn day_start(date: Date) -> OffsetDateTime {
    date.with_time(Time::MIDNIGHT).assume_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> PropertyQueryParams {
        let doc = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), Value::String((*value).to_string())))
            .collect::<Map<_, _>>();
        serde_json::from_value(Value::Object(doc)).expect("query params")
    }

    #[test]
    fn blank_parameters_are_ignored() {
        let filter = PropertyFilter::from_params(&params(&[("city", "  "), ("type", "")]))
            .expect("filter");
        assert!(filter.is_empty());
        assert_eq!(filter.to_value(), json!({}));
    }

    #[test]
    fn city_renders_as_case_insensitive_match() {
        let filter = PropertyFilter::from_params(&params(&[("city", "Pune")])).expect("filter");
        assert_eq!(filter.to_value(), json!({ "city": "/Pune/i" }));
    }

    #[test]
    fn set_filters_are_sorted_and_deduplicated() {
        let a = PropertyFilter::from_params(&params(&[("type", "Villa,Apartment,Villa")]))
            .expect("filter");
        let b =
            PropertyFilter::from_params(&params(&[("type", "Apartment, Villa")])).expect("filter");
        assert_eq!(a, b);
        assert_eq!(a.to_value(), json!({ "type": { "$in": ["Apartment", "Villa"] } }));
    }

    #[test]
    fn count_filters_support_minimums() {
        let filter = PropertyFilter::from_params(&params(&[("bedrooms", "3+"), ("bathrooms", "2")]))
            .expect("filter");
        assert_eq!(filter.bedrooms, Some(CountFilter::AtLeast(3)));
        assert_eq!(filter.bathrooms, Some(CountFilter::Exactly(2)));
        assert_eq!(
            filter.to_value(),
            json!({ "bedrooms": { "$gte": 3 }, "bathrooms": 2 })
        );
    }

    #[test]
    fn whole_prices_render_as_integers() {
        let filter = PropertyFilter::from_params(&params(&[("minPrice", "100")])).expect("filter");
        assert_eq!(filter.to_value(), json!({ "price": { "$gte": 100 } }));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = PropertyFilter::from_params(&params(&[("minPrice", "cheap")]))
            .expect_err("invalid price");
        assert_eq!(err, FilterError::invalid("minPrice", "cheap"));

        assert!(PropertyFilter::from_params(&params(&[("type", "Castle")])).is_err());
        assert!(PropertyFilter::from_params(&params(&[("availableFrom", "soon")])).is_err());
        assert_eq!(
            PropertyFilter::from_params(&params(&[("isVerified", "yes")])).expect_err("bool"),
            FilterError::invalid("isVerified", "yes")
        );
        let verified = PropertyFilter::from_params(&params(&[("isVerified", "false")]))
            .expect("false is valid");
        assert_eq!(verified.is_verified, Some(false));
    }

    #[test]
    fn sort_parsing_defaults_to_newest_first() {
        assert_eq!(SortOrder::parse(None, false), SortOrder::DateDesc);
        assert_eq!(SortOrder::parse(Some("bogus"), false), SortOrder::DateDesc);
        assert_eq!(SortOrder::parse(Some("relevance"), false), SortOrder::DateDesc);
        assert_eq!(SortOrder::parse(None, true), SortOrder::Relevance);
        assert_eq!(SortOrder::parse(Some("price_asc"), true), SortOrder::PriceAsc);
    }

    #[test]
    fn search_filter_value_carries_text_clause() {
        let query =
            PropertyQuery::search(&params(&[("q", "sea view"), ("city", "Goa")])).expect("query");
        assert_eq!(query.sort, SortOrder::Relevance);
        assert_eq!(
            query.filter_value(),
            json!({ "city": "/Goa/i", "$text": { "$search": "sea view" } })
        );
        assert_eq!(query.text_terms(), vec!["sea", "view"]);
    }

    #[test]
    fn listing_query_ignores_text_and_sort() {
        let query = PropertyQuery::listing(&params(&[("q", "x"), ("sortBy", "price_asc")]))
            .expect("query");
        assert_eq!(query.text, None);
        assert_eq!(query.sort, SortOrder::DateDesc);
    }
}
