//! Clear Model Data.

use tracing::{debug, info, warn};

use roils_core::{defaults, FieldKey, FieldKind, ModelId, RecordStore, Result};

use crate::scan::KeyScanner;

/// Delete every generated field belonging to exactly `model` (optionally only
/// one kind) across all `event:*` records. Returns the number of fields
/// deleted. Irreversible.
///
/// Fields are matched by parsing their names, so clearing `mistral` leaves
/// `mistral:7b:LLM Summary` untouched.
pub async fn clear_model_data(
    store: &dyn RecordStore,
    scan_count: usize,
    model: &ModelId,
    kind: Option<FieldKind>,
) -> Result<usize> {
    warn!(
        subsystem = "jobs",
        component = "maintenance",
        op = "clear",
        model = %model,
        kind = kind.map(|k| k.to_string()).unwrap_or_else(|| "all".to_string()),
        "Clearing generated fields"
    );

    let mut deleted = 0;
    let mut scanner = KeyScanner::new(store, defaults::EVENT_PATTERN, scan_count);
    while let Some(keys) = scanner.next_page().await? {
        for key in keys {
            for field in store.fields(&key).await? {
                let Some(parsed) = FieldKey::parse(&field) else {
                    continue;
                };
                if &parsed.model != model || kind.is_some_and(|k| k != parsed.kind) {
                    continue;
                }
                if store.delete_field(&key, &field).await? {
                    debug!(record_key = %key, field = %field, "Field deleted");
                    deleted += 1;
                }
            }
        }
    }

    info!(
        subsystem = "jobs",
        component = "maintenance",
        op = "clear",
        model = %model,
        deleted,
        "Clear complete"
    );
    Ok(deleted)
}
