//! Storage backend trait abstraction
//!
//! Defines async domain traits for the destination database so importers
//! can run against PostgreSQL or the in-memory backend alike.

pub mod attachments;
pub mod boundaries;
pub mod context;
pub mod records;

pub use attachments::AttachmentStore;
pub use boundaries::BoundaryStore;
pub use context::ContextStore;
pub use records::RecordStore;
