//! Centralized constants for limits and defaults.

// =============================================================================
// Defaults
// =============================================================================

/// Default per-operation deadline (5 seconds).
/// Bounds both handle acquisition and statement execution.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Default number of expired rows removed per reclamation batch.
/// The shared handle is released between batches.
pub const DEFAULT_RECLAIM_BATCH_SIZE: usize = 500;

/// In-memory SQLite endpoint.
pub const MEMORY_NODE: &str = ":memory:";

// =============================================================================
// Limits
// =============================================================================

/// Longest TTL honoured, in milliseconds (1000 years).
/// Longer TTLs are clamped so `now + ttl` stays inside an SQLite INTEGER.
pub const MAX_TTL_MILLIS: i64 = 1000 * 365 * 24 * 60 * 60 * 1000;

/// Reclamation intervals below this produce a validation warning.
pub const MIN_RECOMMENDED_RECLAIM_INTERVAL_MS: u64 = 1_000;

/// Longest accepted operation deadline (`i32::MAX` milliseconds).
/// SQLite's busy timeout is a C `int` of milliseconds.
pub const MAX_TIMEOUT_MS: u64 = i32::MAX as u64;

/// Longest accepted table name.
pub const MAX_TABLE_NAME_LEN: usize = 63;
