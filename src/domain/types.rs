//! Shared domain enumerations.
//!
//! The catalog enums live in the API types crate so that request payloads and
//! stored records agree on their labels; the domain re-exports them.

pub use listings_api_types::{Furnished, ListedBy, ListingType, PropertyType, UnknownVariant};
