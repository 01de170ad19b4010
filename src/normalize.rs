//! Record set normalization.
//!
//! Turns a decoded JSON payload into a [`Table`] and checks the table
//! against the columns its feed is expected to carry.

use crate::error::NormalizeError;
use crate::models::{Row, Table};
use tracing::debug;

/// Build a table from a sequence of flat JSON objects.
///
/// An empty sequence yields a table with no rows and no columns; callers
/// treat that as "no data for range".
pub fn normalize(rows: Vec<Row>) -> Table {
    let columns = rows
        .first()
        .map(|first| first.keys().cloned().collect())
        .unwrap_or_default();

    Table::new(columns, rows)
}

/// Check that every required column appears in at least one row.
///
/// Empty tables pass: there is nothing to aggregate, so a missing schema
/// cannot make an aggregate fail.
pub fn validate(table: &Table, required: &[&str]) -> Result<(), NormalizeError> {
    if table.is_empty() {
        return Ok(());
    }

    for column in required {
        if !table.has_column(column) {
            return Err(NormalizeError::MissingColumn(column.to_string()));
        }
    }

    let ragged = table
        .rows()
        .iter()
        .filter(|row| row.len() != table.columns().len())
        .count();
    if ragged > 0 {
        debug!("{} of {} rows have a different column set", ragged, table.row_count());
    }

    Ok(())
}
