//! Record-oriented, line-delimited JSON

use crate::error::Result;
use bytes::Bytes;
use logbatch_core::Table;
use std::io::Write;

/// Write one JSON object per row, each terminated by a newline
pub fn write_ndjson<W: Write>(table: &Table, mut writer: W) -> Result<()> {
    for record in table.records() {
        serde_json::to_writer(&mut writer, &record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Serialize a table to an in-memory NDJSON buffer
pub fn to_ndjson(table: &Table) -> Result<Bytes> {
    // Rough per-cell guess to avoid most reallocations
    let mut buf = Vec::with_capacity(table.num_rows() * table.num_columns().max(1) * 32);
    write_ndjson(table, &mut buf)?;
    Ok(Bytes::from(buf))
}
