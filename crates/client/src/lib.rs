//! Client for the source instance's paginated v2 HTTP API.
//!
//! Every request is authenticated, throttled and retried; responses are
//! decoded into [`SourceRecord`](temba_migrate_core::SourceRecord)s at this
//! boundary so importers never see malformed pages.

pub mod api_types;
mod client;
mod config;
mod error;

pub use client::{ApiClient, Page};
pub use config::{ClientConfig, clean_api_key, clean_api_url};
pub use error::ClientError;
