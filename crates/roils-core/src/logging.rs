//! Structured logging schema and field name constants.
//!
//! All crates use these constants for consistent structured logging fields,
//! so a run can be replayed by filtering on `record_key` and `model`.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Requires operator attention (restart failed, store lost) |
//! | WARN  | Recoverable issue: timeout, soft API failure, missing precondition |
//! | INFO  | Lifecycle events, stage completions, writes |
//! | DEBUG | Per-record decisions (skip, prompt built) |
//! | TRACE | Per-page scan detail |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID for one stage run. Format: UUIDv7 (time-ordered).
pub const RUN_ID: &str = "run_id";

/// Subsystem originating the log event.
/// Values: "store", "inference", "lifecycle", "jobs", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "redis", "ollama", "ssh", "summary_stage", "evaluation_stage"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "generate", "restart", "run_summaries", "clear"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Record key being operated on (`event:<id>`).
pub const RECORD_KEY: &str = "record_key";

/// Model identifier.
pub const MODEL: &str = "model";

/// Hash field name.
pub const FIELD: &str = "field";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Byte length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

/// Evaluation pass number (1-based).
pub const PASS: &str = "pass";

/// HTTP status returned by the backend.
pub const STATUS: &str = "status";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Slow operation threshold exceeded.
pub const SLOW: &str = "slow";
