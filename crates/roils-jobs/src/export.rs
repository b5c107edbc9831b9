//! CSV export of narratives, summaries and evaluations.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use roils_core::{
    clean_export_text, defaults, non_blank, FieldKey, ModelId, Record, RecordStore, Result,
};

use crate::scan::KeyScanner;

/// Write one CSV row per `event:*` record in scan order. Returns the number
/// of data rows. Read-only with respect to the store.
///
/// Columns: `Key`, `Narrative`, `<summary model> Summary`,
/// `<evaluation model> Evaluation`. Absent fields are empty cells.
pub async fn export_csv<W: Write>(
    store: &dyn RecordStore,
    scan_count: usize,
    summary_model: &ModelId,
    eval_model: &ModelId,
    out: &mut W,
) -> Result<usize> {
    write_row(
        out,
        &[
            "Key",
            "Narrative",
            &format!("{} Summary", summary_model),
            &format!("{} Evaluation", eval_model),
        ],
    )?;

    let summary_field = FieldKey::summary(summary_model);
    let eval_field = FieldKey::evaluation(eval_model);
    let mut rows = 0;
    let mut scanner = KeyScanner::new(store, defaults::EVENT_PATTERN, scan_count);
    while let Some(keys) = scanner.next_page().await? {
        for key in keys {
            let record = Record::from_fields(key.as_str(), store.get_all(&key).await?);
            let cell = |value: Option<&String>| {
                non_blank(value.map(String::as_str))
                    .map(clean_export_text)
                    .unwrap_or_default()
            };
            write_row(
                out,
                &[
                    &key,
                    &cell(record.narrative.as_ref()),
                    &cell(record.generated.get(&summary_field)),
                    &cell(record.generated.get(&eval_field)),
                ],
            )?;
            rows += 1;
        }
    }
    out.flush()?;
    Ok(rows)
}

/// Export to a file, replacing it if present.
pub async fn export_to_path(
    store: &dyn RecordStore,
    scan_count: usize,
    summary_model: &ModelId,
    eval_model: &ModelId,
    path: &Path,
) -> Result<usize> {
    let mut out = BufWriter::new(File::create(path)?);
    let rows = export_csv(store, scan_count, summary_model, eval_model, &mut out).await?;
    info!(
        subsystem = "jobs",
        component = "export",
        path = %path.display(),
        rows,
        "Export written"
    );
    Ok(rows)
}

fn write_row<W: Write>(out: &mut W, cells: &[&str]) -> Result<()> {
    let line = cells
        .iter()
        .map(|c| quote(c))
        .collect::<Vec<_>>()
        .join(",");
    out.write_all(line.as_bytes())?;
    out.write_all(b"\r\n")?;
    Ok(())
}

/// RFC 4180 quoting: wrap in quotes when needed, doubling embedded quotes.
fn quote(cell: &str) -> String {
    if cell.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
