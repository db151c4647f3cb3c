use crate::domain::model::{OutputRow, OUTPUT_COLUMNS};
use crate::utils::error::{Result, ValidatorError};

/// Values of the first column, header row skipped, blank cells dropped.
pub fn read_first_column(data: &[u8]) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(value) = record.get(0).map(str::trim).filter(|v| !v.is_empty()) {
            values.push(value.to_string());
        }
    }
    Ok(values)
}

/// Header plus one line per row. Absent values become empty cells.
pub fn write_rows(rows: &[OutputRow]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(OUTPUT_COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }

    writer
        .into_inner()
        .map_err(|e| ValidatorError::IoError(e.into_error()))
}
