//! In-memory record store.
//!
//! Keeps records in ordered maps so scans are deterministic. Paging mimics
//! Redis: `count` bounds how many keys are *examined* per page and `MATCH`
//! filters afterwards, so a page may come back empty before the scan ends.
//! A cursor resumes after the last key it examined, so keys that exist for
//! the whole scan are returned even when other hashes are deleted mid-scan.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use roils_core::{Error, RecordStore, Result, ScanPage};

type Records = BTreeMap<String, BTreeMap<String, String>>;

/// Ordered in-process record store.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<Mutex<Records>>,
    writes: Arc<Mutex<usize>>,
    /// Resume position for cursor `n` is `cursors[n - 1]`.
    cursors: Arc<Mutex<Vec<String>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed records with a narrative each (builder style, for tests).
    pub fn with_narratives<'a, I>(self, items: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        {
            let mut records = self.lock();
            for (key, narrative) in items {
                records
                    .entry(key.to_string())
                    .or_default()
                    .insert(roils_core::defaults::NARRATIVE_FIELD.to_string(), narrative.to_string());
            }
        }
        self
    }

    /// Insert a field without counting it as a pipeline write.
    pub fn seed(&self, key: &str, field: &str, value: &str) {
        self.lock()
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
    }

    /// Number of `set` calls since creation.
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of every record.
    pub fn snapshot(&self) -> Records {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, key: &str, field: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).and_then(|r| r.get(field)).cloned())
    }

    async fn set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.seed(key, field, value);
        *self.writes.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }

    async fn exists(&self, key: &str, field: &str) -> Result<bool> {
        Ok(self
            .lock()
            .get(key)
            .map(|r| r.contains_key(field))
            .unwrap_or(false))
    }

    async fn delete_field(&self, key: &str, field: &str) -> Result<bool> {
        let mut records = self.lock();
        let Some(record) = records.get_mut(key) else {
            return Ok(false);
        };
        let removed = record.remove(field).is_some();
        // Redis drops a hash when its last field goes away.
        if record.is_empty() {
            records.remove(key);
        }
        Ok(removed)
    }

    async fn fields(&self, key: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()
            .get(key)
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_all(&self, key: &str) -> Result<Vec<(String, String)>> {
        Ok(self
            .lock()
            .get(key)
            .map(|r| r.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn scan_page(&self, pattern: &str, cursor: u64, count: usize) -> Result<ScanPage> {
        let resume_after = if cursor == 0 {
            None
        } else {
            let cursors = self.cursors.lock().unwrap_or_else(|e| e.into_inner());
            let resume = usize::try_from(cursor - 1)
                .ok()
                .and_then(|i| cursors.get(i))
                .cloned();
            match resume {
                Some(key) => Some(key),
                None => return Err(Error::InvalidInput(format!("unknown cursor: {}", cursor))),
            }
        };

        let records = self.lock();
        let lower = match resume_after.as_deref() {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        let mut examined = records.range::<str, _>((lower, Bound::Unbounded));
        let batch: Vec<&String> = examined.by_ref().take(count.max(1)).map(|(k, _)| k).collect();
        let exhausted = examined.next().is_none();

        let keys = batch
            .iter()
            .filter(|k| glob_match(pattern, k))
            .map(|k| (*k).clone())
            .collect();
        let next = match batch.last() {
            Some(last) if !exhausted => {
                let mut cursors = self.cursors.lock().unwrap_or_else(|e| e.into_inner());
                cursors.push((*last).clone());
                cursors.len() as u64
            }
            _ => 0,
        };
        Ok(ScanPage { cursor: next, keys })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Redis-style glob match supporting `*` and `?`.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}
