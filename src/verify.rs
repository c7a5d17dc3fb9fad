//! Post-load verification of the destination
//!
//! Counts rows per table and sweeps every destination date column for
//! values that slipped past the sentinel normalization (anything earlier
//! than 1900). Referential integrity is not re-checked here: the
//! destination's foreign keys already rejected orphans at insert, and
//! those rejections were reported as batch failures by the loader.

use crate::dest::Destination;
use crate::error::VerifyError;
use crate::tables::{Table, LOAD_ORDER};
use tracing::{info, warn};

/// Verification result for one table
#[derive(Debug)]
pub struct TableCheck {
    pub table: Table,
    pub rows: u64,
    /// Rows with a date earlier than the 1900 sanity threshold, per column
    pub stale_dates: Vec<(&'static str, u64)>,
}

impl TableCheck {
    pub fn stale_total(&self) -> u64 {
        self.stale_dates.iter().map(|(_, n)| n).sum()
    }
}

/// Full verification report
#[derive(Debug)]
pub struct VerifyReport {
    pub tables: Vec<TableCheck>,
}

impl VerifyReport {
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.rows).sum()
    }

    /// Total rows still carrying a pre-1900 date anywhere (expected: zero)
    pub fn stale_date_total(&self) -> u64 {
        self.tables.iter().map(TableCheck::stale_total).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.stale_date_total() == 0
    }
}

/// Run the verification pass against the destination
pub fn verify(dest: &mut dyn Destination) -> Result<VerifyReport, VerifyError> {
    let mut tables = Vec::with_capacity(LOAD_ORDER.len());

    for table in LOAD_ORDER {
        let spec = table.spec();
        let rows = dest.count_rows(table)?;

        let mut stale_dates = Vec::new();
        for column in spec.date_columns() {
            let stale = dest.count_stale_dates(table, column)?;
            if stale > 0 {
                warn!(
                    table = spec.dest_name,
                    column, count = stale, "rows still carry a pre-1900 date"
                );
            }
            stale_dates.push((column, stale));
        }

        info!(table = spec.dest_name, rows, "verified");
        tables.push(TableCheck {
            table,
            rows,
            stale_dates,
        });
    }

    Ok(VerifyReport { tables })
}
