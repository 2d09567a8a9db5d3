//! Application services: catalog, favorites, recommendations and auth.

pub mod auth;
pub mod error;
pub mod favorites;
pub mod filter;
pub mod pagination;
pub mod properties;
pub mod recommendations;
pub mod repos;
