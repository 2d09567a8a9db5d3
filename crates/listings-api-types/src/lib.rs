//! Wire-level request and response types for the listings HTTP API.
//!
//! Field names follow the public JSON contract (`camelCase`), so clients and
//! the server share one definition of every payload.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

// `YYYY-MM-DD` serde adapter for calendar dates.
time::serde::format_description!(
    pub iso_date,
    Date,
    "[year]-[month]-[day]"
);

// ----- Catalog enums -----

/// Error returned when a catalog enum is parsed from an unknown label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} `{}`", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

macro_rules! catalog_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($label => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

catalog_enum!(
    /// Kind of dwelling being listed.
    PropertyType, "property type", {
        Apartment => "Apartment",
        Villa => "Villa",
        Studio => "Studio",
        Penthouse => "Penthouse",
        Bungalow => "Bungalow",
    }
);

catalog_enum!(
    /// Furnishing state of a listing.
    Furnished, "furnished status", {
        Furnished => "Furnished",
        Unfurnished => "Unfurnished",
        Semi => "Semi",
    }
);

catalog_enum!(
    /// Who published the listing.
    ListedBy, "lister", {
        Owner => "Owner",
        Agent => "Agent",
        Builder => "Builder",
    }
);

catalog_enum!(
    /// Whether the listing is for sale or for rent.
    ListingType, "listing type", {
        Sale => "sale",
        Rent => "rent",
    }
);

// ----- Response envelope -----

/// Standard success envelope: `{"success": true, "message"?: ..., "data"?: ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiEnvelope<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// Page/limit pagination summary attached to every list payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub pages: u64,
    pub limit: u32,
}

impl Pagination {
    pub fn new(total: u64, page: u32, limit: u32) -> Self {
        let limit_u64 = u64::from(limit.max(1));
        Self {
            total,
            page,
            pages: total.div_ceil(limit_u64),
            limit,
        }
    }
}

/// Search pagination with navigation hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPagination {
    #[serde(flatten)]
    pub base: Pagination,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    pub next_page: Option<u32>,
    pub prev_page: Option<u32>,
}

impl From<Pagination> for SearchPagination {
    fn from(base: Pagination) -> Self {
        let has_next_page = u64::from(base.page) < base.pages;
        let has_prev_page = base.page > 1;
        Self {
            base,
            has_next_page,
            has_prev_page,
            next_page: has_next_page.then(|| base.page + 1),
            prev_page: has_prev_page.then(|| base.page - 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyList<T> {
    pub properties: Vec<T>,
    pub pagination: Pagination,
}

/// Echo of what a search request asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFilters {
    pub applied: Option<serde_json::Value>,
    pub text_search: Option<String>,
    pub sort_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySearchResults<T> {
    pub properties: Vec<T>,
    pub pagination: SearchPagination,
    pub filters: AppliedFilters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteList<T> {
    pub favorites: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationList<T> {
    pub recommendations: Vec<T>,
    pub pagination: Pagination,
}

// ----- Requests -----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyCreateRequest {
    pub property_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    pub price: f64,
    pub state: String,
    pub city: String,
    pub area_sq_ft: f64,
    pub bedrooms: i32,
    pub bathrooms: i32,
    #[serde(default)]
    pub amenities: Vec<String>,
    pub furnished: Furnished,
    #[serde(with = "iso_date")]
    pub available_from: Date,
    pub listed_by: ListedBy,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub color_theme: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub is_verified: bool,
    pub listing_type: ListingType,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyUpdateRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub property_type: Option<PropertyType>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub area_sq_ft: Option<f64>,
    #[serde(default)]
    pub bedrooms: Option<i32>,
    #[serde(default)]
    pub bathrooms: Option<i32>,
    #[serde(default)]
    pub amenities: Option<Vec<String>>,
    #[serde(default)]
    pub furnished: Option<Furnished>,
    #[serde(default, with = "iso_date::option")]
    pub available_from: Option<Date>,
    #[serde(default)]
    pub listed_by: Option<ListedBy>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub color_theme: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub is_verified: Option<bool>,
    #[serde(default)]
    pub listing_type: Option<ListingType>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRequest {
    pub property_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRequest {
    pub property_id: Uuid,
    pub recipient_email: String,
    #[serde(default)]
    pub message: Option<String>,
}
