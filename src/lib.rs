//! Property listings API with a read-through, write-invalidate cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
