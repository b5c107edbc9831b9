//! Core traits for pipeline abstractions.
//!
//! These traits are the seams between the stages and their collaborators:
//! stages take `&dyn RecordStore`, `&dyn GenerationBackend` and
//! `&dyn LifecycleController`, so tests substitute in-memory fakes.

use async_trait::async_trait;

use crate::{GenerationOutcome, GenerationRequest, Result};

// =============================================================================
// RECORD STORE
// =============================================================================

/// One page of a key scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next page; `0` means the scan is complete.
    pub cursor: u64,
    pub keys: Vec<String>,
}

impl ScanPage {
    pub fn is_last(&self) -> bool {
        self.cursor == 0
    }
}

/// Key-value store holding one hash per incident record.
///
/// Writes are immediately visible to subsequent reads.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read one field.
    async fn get(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// Write one field.
    async fn set(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// Check whether a field exists.
    async fn exists(&self, key: &str, field: &str) -> Result<bool>;

    /// Delete one field. Returns whether it existed.
    async fn delete_field(&self, key: &str, field: &str) -> Result<bool>;

    /// List the field names of a record.
    async fn fields(&self, key: &str) -> Result<Vec<String>>;

    /// Read every field of a record.
    async fn get_all(&self, key: &str) -> Result<Vec<(String, String)>>;

    /// Fetch one page of keys matching a glob pattern, starting at `cursor`
    /// (`0` starts a new scan). Pages may be empty before the scan ends.
    async fn scan_page(&self, pattern: &str, cursor: u64, count: usize) -> Result<ScanPage>;

    /// Verify the store is reachable.
    async fn ping(&self) -> Result<()>;

    /// Collect every key matching `pattern`, deduplicated, in first-seen order.
    ///
    /// Stages iterate with [`RecordStore::scan_page`] instead; this is for
    /// small key sets (tests, re-scan of pending keys).
    async fn list_keys(&self, pattern: &str, count: usize) -> Result<Vec<String>> {
        let mut seen = std::collections::HashSet::new();
        let mut keys = Vec::new();
        let mut cursor = 0;
        loop {
            let page = self.scan_page(pattern, cursor, count).await?;
            let last = page.is_last();
            let next = page.cursor;
            for key in page.keys {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
            if last {
                return Ok(keys);
            }
            cursor = next;
        }
    }
}

// =============================================================================
// GENERATION BACKEND
// =============================================================================

/// HTTP text-generation service.
///
/// Implementations never retry. `Err` is reserved for transport failures that
/// never reached the backend (connection refused, DNS); everything else is a
/// [`GenerationOutcome`].
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Run one generation request under the client's fixed deadline.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome>;

    /// Check if the backend is available and responding.
    async fn health_check(&self) -> Result<bool>;
}

// =============================================================================
// LIFECYCLE CONTROLLER
// =============================================================================

/// Recovery primitive that restarts the service hosting the generation backend.
///
/// `restart` returns after a fixed settle interval and does not verify the
/// backend is healthy; callers re-attempt their own work later. Failures are
/// returned, never retried internally.
#[async_trait]
pub trait LifecycleController: Send + Sync {
    async fn restart(&self) -> Result<()>;
}
