//! Structured logging field names shared by every casuist crate.
//!
//! Keeping field names in one place means log aggregation can query by
//! the same keys across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue (per-row batch failure, lock contention) |
//! | INFO  | Lifecycle events, operation completions, pass summaries |
//! | DEBUG | Decision points, config choices, dedup hits |
//! | TRACE | Per-row iteration inside batch passes |

/// Subsystem originating the log event.
/// Values: "db", "scoring", "inference", "jobs"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "ledger", "dedup", "pool", "consolidation"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "create_version", "resolve_guideline", "regenerate"
pub const OPERATION: &str = "op";

/// Annotation group UUID being operated on.
pub const GROUP_ID: &str = "group_id";

/// Document id being operated on.
pub const DOCUMENT_ID: &str = "document_id";

/// Guideline id being operated on.
pub const GUIDELINE_ID: &str = "guideline_id";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Rows examined by a batch pass.
pub const ROWS_EXAMINED: &str = "rows_examined";

/// Rows removed by a batch pass.
pub const ROWS_REMOVED: &str = "rows_removed";

/// Rows a batch pass failed to process.
pub const ROWS_FAILED: &str = "rows_failed";

/// Number of results returned by a query or scoring run.
pub const RESULT_COUNT: &str = "result_count";

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";
