//! Paged iteration over record keys.

use std::collections::HashSet;

use tracing::trace;

use roils_core::{RecordStore, Result};

/// Walks a SCAN cursor to completion.
///
/// Only one page of keys is held at a time. Repeats within a page are
/// dropped; a key SCAN repeats on a later page is yielded again, which the
/// per-record existence checks make harmless in resume mode.
pub(crate) struct KeyScanner<'a> {
    store: &'a dyn RecordStore,
    pattern: &'a str,
    count: usize,
    cursor: u64,
    done: bool,
}

impl<'a> KeyScanner<'a> {
    pub(crate) fn new(store: &'a dyn RecordStore, pattern: &'a str, count: usize) -> Self {
        Self {
            store,
            pattern,
            count,
            cursor: 0,
            done: false,
        }
    }

    /// Next page of keys, or `None` once the scan has completed.
    /// Returned pages may be empty.
    pub(crate) async fn next_page(&mut self) -> Result<Option<Vec<String>>> {
        if self.done {
            return Ok(None);
        }
        let page = self
            .store
            .scan_page(self.pattern, self.cursor, self.count)
            .await?;
        self.done = page.is_last();
        self.cursor = page.cursor;

        let mut seen = HashSet::with_capacity(page.keys.len());
        let keys: Vec<String> = page
            .keys
            .into_iter()
            .filter(|k| seen.insert(k.clone()))
            .collect();
        trace!(cursor = self.cursor, result_count = keys.len(), "Scanned key page");
        Ok(Some(keys))
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done
    }
}
