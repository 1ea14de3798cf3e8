//! Shared constants for temba-migrate.
//!
//! Centralizes the tuning defaults used by the client, storage and CLI crates.

/// Path prefix of every source API resource.
pub const API_PATH_PREFIX: &str = "/api/v2";

/// Per-request HTTP timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Attempts allowed for transient failures (network errors, 5xx) after the first one.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff between retries, in milliseconds.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;

/// Longest `Retry-After` the client will honour, in seconds.
pub const MAX_RETRY_AFTER_SECS: u64 = 300;

/// PostgreSQL connection pool: maximum connections.
pub const PG_POOL_MAX_CONNECTIONS: u32 = 5;

/// PostgreSQL connection pool: acquire timeout in seconds.
pub const PG_POOL_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Channel type written for every imported channel. The source API does not
/// expose it, so an operator has to correct it after the import.
pub const DEFAULT_CHANNEL_TYPE: &str = "FBA";

/// Group type written for every imported group ("manually curated").
pub const MANUAL_GROUP_TYPE: &str = "M";

/// Groups the destination creates on its own; never imported.
pub const SYSTEM_GROUP_NAMES: [&str; 5] = ["active", "blocked", "stopped", "archived", "open tickets"];

/// Contact fields the destination creates for every organization. Campaign
/// events may be relative to them, but they are never imported.
pub const SYSTEM_FIELD_KEYS: [&str; 5] = ["id", "name", "created_on", "language", "last_seen_on"];
