//! Import pipeline for temba-migrate
//!
//! Pages every entity out of a source instance's API, remaps foreign keys
//! onto destination ids and writes the result through the storage traits.
//! Also hosts the standalone attachment host fixer and the boundary loader.

pub mod attachments;
mod choices;
pub mod context;
pub mod error;
pub mod geo;
pub mod importers;
pub mod orchestrator;
pub mod remap;
pub mod stats;

pub use attachments::{rewrite_attachment, rewrite_attachment_hosts};
pub use context::{ImportContext, ImportOptions};
pub use error::{ImportError, RunFailure, RunStage};
pub use geo::import_geo_files;
pub use orchestrator::{Orchestrator, RunReport, RunState};
pub use remap::{RemapError, RemapTable};
pub use stats::{ImportStats, Outcome, RunStats};
