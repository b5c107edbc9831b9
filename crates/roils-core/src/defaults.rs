//! Centralized default constants for the ROILS pipeline.
//!
//! **This module is the single source of truth** for shared default values.
//! Config deserialization, the CLI, and tests reference these constants
//! instead of defining their own magic numbers.

// =============================================================================
// RECORD STORE
// =============================================================================

/// Default Redis host.
pub const REDIS_HOST: &str = "127.0.0.1";

/// Default Redis port.
pub const REDIS_PORT: u16 = 6379;

/// Default Redis logical database.
pub const REDIS_DB: i64 = 0;

/// SCAN `COUNT` hint per page.
pub const SCAN_COUNT: usize = 100;

/// Key prefix for incident records.
pub const EVENT_PREFIX: &str = "event:";

/// Glob pattern matching every incident record.
pub const EVENT_PATTERN: &str = "event:*";

/// Hash field holding the incident narrative.
pub const NARRATIVE_FIELD: &str = "Narrative";

// =============================================================================
// GENERATION BACKEND
// =============================================================================

/// Default Ollama endpoint.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Per-request generation deadline (seconds).
pub const GEN_TIMEOUT_SECS: u64 = 45;

/// Health check timeout (seconds).
pub const HEALTH_TIMEOUT_SECS: u64 = 5;

/// Generation calls slower than this are logged as slow (milliseconds).
pub const SLOW_GEN_MS: u64 = 30_000;

/// Default summary model.
pub const SUMMARY_MODEL: &str = "mistral";

/// Default evaluation model.
pub const EVAL_MODEL: &str = "mistral";

/// Default summary prompt template.
pub const SUMMARY_PROMPT: &str = "Summarize the following event without adding any information or context not explicitly stated in the narrative: '{narrative}'";

/// Default evaluation prompt template.
pub const EVAL_PROMPT: &str = "Evaluate whether the summary below is faithful to the narrative. Point out any information in the summary that is not stated in the narrative.\n\nNarrative:\n{narrative}\n\nSummary:\n{summary}\n\nEvaluation:";

// =============================================================================
// DECODING OPTIONS
// =============================================================================

/// Maximum tokens to generate.
pub const NUM_PREDICT: i32 = 500;

/// Top-k sampling bound.
pub const TOP_K: i32 = 25;

/// Nucleus sampling bound.
pub const TOP_P: f32 = 0.2;

/// Near-deterministic decoding.
pub const TEMPERATURE: f32 = 0.01;

/// GPUs to offload to.
pub const NUM_GPU: i32 = 2;

/// CPU threads for generation.
pub const NUM_THREAD: i32 = 16;

/// Context window in tokens.
pub const NUM_CTX: i32 = 16_000;

// =============================================================================
// EVALUATION STAGE
// =============================================================================

/// Upper bound on evaluation passes (first pass included).
pub const EVAL_MAX_PASSES: u32 = 5;

// =============================================================================
// LIFECYCLE CONTROLLER
// =============================================================================

/// Default container running the generation backend.
pub const CONTAINER_NAME: &str = "ollama";

/// Default remote user.
pub const SSH_USER: &str = "root";

/// Wait after issuing a restart before returning control (seconds).
pub const RESTART_SETTLE_SECS: u64 = 10;

/// SSH connect timeout (seconds).
pub const SSH_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Upper bound on one remote container command, connect included (seconds).
pub const SSH_COMMAND_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// EXPORT / CONFIG FILES
// =============================================================================

/// Default export file path.
pub const EXPORT_PATH: &str = "extract_summary.csv";

/// Default configuration file path.
pub const CONFIG_PATH: &str = "roils.toml";

/// Default browse page size.
pub const BROWSE_PAGE_SIZE: usize = 10;
