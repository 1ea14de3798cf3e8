//! Core types and constants for temba-migrate
//!
//! This crate contains the domain vocabulary shared by the API client,
//! the destination store and the importer.

mod constants;
mod entity;
mod env_config;
mod error;
mod record;

pub use constants::*;
pub use entity::EntityType;
pub use env_config::env_parse_with_default;
pub use error::ValidationError;
pub use record::{Cursor, SourceId, SourceRecord};
