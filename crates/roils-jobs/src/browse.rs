//! Page-by-page record listing.

use std::collections::VecDeque;

use roils_core::{defaults, Record, RecordStore, Result};

use crate::scan::KeyScanner;

/// Yields records in fixed-size pages, reading keys through the store's
/// paginated scan so the key space is never loaded at once.
pub struct RecordPager<'a> {
    store: &'a dyn RecordStore,
    scanner: KeyScanner<'a>,
    buffered: VecDeque<String>,
    page_size: usize,
}

impl<'a> RecordPager<'a> {
    pub fn new(store: &'a dyn RecordStore, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        Self {
            store,
            scanner: KeyScanner::new(store, defaults::EVENT_PATTERN, page_size),
            buffered: VecDeque::new(),
            page_size,
        }
    }

    /// Next page of up to `page_size` records; `None` when exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Record>>> {
        while self.buffered.len() < self.page_size && !self.scanner.is_done() {
            if let Some(keys) = self.scanner.next_page().await? {
                self.buffered.extend(keys);
            }
        }
        if self.buffered.is_empty() {
            return Ok(None);
        }

        let take = self.page_size.min(self.buffered.len());
        let keys: Vec<String> = self.buffered.drain(..take).collect();
        let mut records = Vec::with_capacity(take);
        for key in keys {
            let fields = self.store.get_all(&key).await?;
            records.push(Record::from_fields(key, fields));
        }
        Ok(Some(records))
    }
}
