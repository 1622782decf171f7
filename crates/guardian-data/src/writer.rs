//! CSV export of output tables.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use guardian_core::error::{GuardianError, Result};
use serde::Serialize;
use tracing::debug;

use crate::table::{DetailRow, DETAIL_COLUMNS};

/// Serialize `rows` as CSV with a header taken from the field names.
///
/// Nothing, not even a header, is written for an empty slice.
pub fn write_rows<W: Write, T: Serialize>(writer: W, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the detail table to `path`. The header is always written, so an
/// empty table still produces a well-formed file.
pub fn write_detail_csv(path: &Path, rows: &[DetailRow]) -> Result<()> {
    let file = File::create(path).map_err(|source| GuardianError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    wtr.write_record(DETAIL_COLUMNS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    debug!("Wrote {} detail rows to {}", rows.len(), path.display());
    Ok(())
}
