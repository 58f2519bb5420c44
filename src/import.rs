use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::{info, warn};

use crate::codec::Record;
use crate::error::StoreError;
use crate::store::DbStore;

/// Row interval at which the importer CLI reports progress.
pub const PROGRESS_REPORT_INTERVAL: usize = 50_000;

/// Stream a delimited file into the store inside one atomic batch.
///
/// The first row is the header: column 0 names the headword field, columns
/// 1..N name the record attributes. Each data row becomes one entry keyed
/// by its lowercased column 0. Rows with extra columns have the extras
/// ignored; short rows populate only the columns present; a row that fails
/// to parse is logged and skipped. None of these abort the load. A failure
/// to commit the batch itself does abort it, with nothing written.
///
/// Returns the number of rows written. Committing once for the whole file
/// is deliberate: per-row commits would dominate runtime on datasets of
/// hundreds of thousands of rows.
pub fn import_csv(
    store: &DbStore,
    csv_path: &Path,
    progress_every: usize,
) -> Result<usize, StoreError> {
    info!("starting import: source={}", csv_path.display());

    let file = File::open(csv_path)?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(BufReader::new(file));

    let header = reader
        .headers()
        .map_err(|err| StoreError::Format(format!("failed to read header row: {err}")))?
        .clone();
    if header.is_empty() {
        return Err(StoreError::Format(
            "input has no header row or zero columns".to_string(),
        ));
    }

    let mut skipped = 0usize;
    let written = store.run_batch(|batch| {
        let mut written = 0usize;
        for row in reader.records() {
            let row = match row {
                Ok(row) => row,
                Err(err) => {
                    warn!("skipping malformed row: {err}");
                    skipped += 1;
                    continue;
                }
            };

            let headword = match row.get(0) {
                Some(word) if !word.trim().is_empty() => word,
                _ => {
                    warn!("skipping row with empty headword column");
                    skipped += 1;
                    continue;
                }
            };

            let mut record = Record::new();
            for (i, field) in row.iter().enumerate().skip(1) {
                if i < header.len() {
                    record.insert(header[i].to_string(), field.to_string());
                } else {
                    warn!("row for '{headword}' has more columns than the header, extras ignored");
                    break;
                }
            }

            if let Err(err) = batch.put(headword, &record) {
                warn!("skipping row for '{headword}': {err}");
                skipped += 1;
                continue;
            }
            written += 1;

            if progress_every > 0 && written % progress_every == 0 {
                info!("imported {written} rows so far");
            }
        }
        Ok(written)
    })?;

    info!(
        "import complete: written={written} skipped={skipped} source={}",
        csv_path.display()
    );
    Ok(written)
}
