//! Invariants every stored listing must satisfy.

use crate::domain::error::DomainError;

pub const MAX_RATING: f64 = 5.0;

/// Field values checked on create and after an update is merged.
#[derive(Debug, Clone, Copy)]
pub struct ListingFields<'a> {
    pub property_code: &'a str,
    pub title: &'a str,
    pub city: &'a str,
    pub state: &'a str,
    pub price: f64,
    pub area_sq_ft: f64,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub rating: Option<f64>,
}

pub fn validate_listing(fields: ListingFields<'_>) -> Result<(), DomainError> {
    if fields.property_code.trim().is_empty() {
        return Err(DomainError::validation("propertyId must not be empty"));
    }
    if fields.title.trim().is_empty() {
        return Err(DomainError::validation("title must not be empty"));
    }
    if fields.city.trim().is_empty() || fields.state.trim().is_empty() {
        return Err(DomainError::validation("city and state are required"));
    }
    if !fields.price.is_finite() || fields.price < 0.0 {
        return Err(DomainError::validation("price must be a non-negative number"));
    }
    if !fields.area_sq_ft.is_finite() || fields.area_sq_ft < 0.0 {
        return Err(DomainError::validation(
            "areaSqFt must be a non-negative number",
        ));
    }
    if fields.bedrooms < 0 || fields.bathrooms < 0 {
        return Err(DomainError::validation(
            "bedrooms and bathrooms must not be negative",
        ));
    }
    if let Some(rating) = fields.rating
        && !(0.0..=MAX_RATING).contains(&rating)
    {
        return Err(DomainError::validation("rating must be between 0 and 5"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> ListingFields<'static> {
        ListingFields {
            property_code: "PROP1001",
            title: "Garden villa",
            city: "Pune",
            state: "Maharashtra",
            price: 1_000_000.0,
            area_sq_ft: 1200.0,
            bedrooms: 3,
            bathrooms: 2,
            rating: Some(4.5),
        }
    }

    #[test]
    fn accepts_well_formed_listing() {
        assert!(validate_listing(fields()).is_ok());
    }

    #[test]
    fn rejects_negative_price() {
        let err = validate_listing(ListingFields {
            price: -1.0,
            ..fields()
        })
        .expect_err("negative price");
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn rejects_rating_out_of_range() {
        assert!(
            validate_listing(ListingFields {
                rating: Some(5.5),
                ..fields()
            })
            .is_err()
        );
        assert!(
            validate_listing(ListingFields {
                rating: None,
                ..fields()
            })
            .is_ok()
        );
    }
}
