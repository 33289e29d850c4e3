//! Backup export and import
//!
//! A backup is the full record set as one JSON array. Paths ending in `.zst`
//! are zstd-compressed. Import goes through [`StatusStore::append`], so
//! records already present are skipped rather than overwritten.

use std::io;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::types::StatusRecord;

use super::{StatusStore, StoreError};

const ZSTD_LEVEL: i32 = 3;

fn is_compressed(path: &Path) -> bool {
    path.extension().map(|ext| ext == "zst").unwrap_or(false)
}

/// Write `records` to `path`. Returns the number of bytes written.
pub fn write_backup(path: &Path, records: &[StatusRecord]) -> Result<usize, StoreError> {
    let json = serde_json::to_vec_pretty(records)?;
    let bytes = if is_compressed(path) {
        zstd::encode_all(json.as_slice(), ZSTD_LEVEL)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("zstd encode error: {}", e)))?
    } else {
        json
    };
    std::fs::write(path, &bytes)?;
    info!(path = ?path, records = records.len(), bytes = bytes.len(), "Backup written");
    Ok(bytes.len())
}

/// Read a backup written by [`write_backup`].
pub fn read_backup(path: &Path) -> Result<Vec<StatusRecord>, StoreError> {
    let raw = std::fs::read(path)?;
    let json = if is_compressed(path) {
        zstd::decode_all(raw.as_slice()).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("zstd decode error: {}", e))
        })?
    } else {
        raw
    };
    Ok(serde_json::from_slice(&json)?)
}

/// Outcome of an import run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// Append every record, counting duplicates as skipped.
pub async fn import_records(
    store: &dyn StatusStore,
    records: Vec<StatusRecord>,
) -> Result<ImportSummary, StoreError> {
    let mut summary = ImportSummary::default();
    for record in records {
        match store.append(record).await {
            Ok(()) => summary.imported += 1,
            Err(StoreError::Duplicate { tank_id, timestamp }) => {
                warn!(%tank_id, %timestamp, "Skipping duplicate record during import");
                summary.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    info!(
        imported = summary.imported,
        skipped = summary.skipped,
        backend = store.backend_name(),
        "Import complete"
    );
    Ok(summary)
}
