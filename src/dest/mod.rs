//! Destination database backends
//!
//! The loader and verifier talk to the destination through the
//! [`Destination`] trait. Two backends exist, selected by the connection
//! URL:
//!
//! - Postgres (`postgresql://...`) - the real cloud destination
//! - SQLite (`sqlite://path` or a `.db` path) - a local rehearsal target
//!   with the same schema and foreign-key semantics, also used by the
//!   integration tests
//!
//! Connections are constructed explicitly at stage start and dropped when
//! the stage's scope ends; there is no process-wide database handle.

mod postgres;
mod sqlite;

pub use postgres::PostgresDestination;
pub use sqlite::SqliteDestination;

use crate::config::DestUrl;
use crate::error::DbResult;
use crate::record::Row;
use crate::tables::{Table, TableSpec};

/// Operations the loader and verifier need from a destination database.
///
/// `insert_batch` is all-or-nothing: one transaction per call, so a
/// constraint violation anywhere in the batch rolls the whole batch back
/// without touching other batches.
pub trait Destination {
    /// Delete every row of the table
    fn clear(&mut self, table: Table) -> DbResult<()>;

    /// Insert all rows in one transaction; any failure rolls back the batch
    fn insert_batch(&mut self, table: Table, rows: &[Row]) -> DbResult<()>;

    /// Row count of the table
    fn count_rows(&mut self, table: Table) -> DbResult<u64>;

    /// Rows whose date column is earlier than the 1900 sanity threshold
    fn count_stale_dates(&mut self, table: Table, column: &str) -> DbResult<u64>;
}

/// Open the backend matching the destination URL
pub fn connect(url: &DestUrl) -> DbResult<Box<dyn Destination>> {
    match url {
        DestUrl::Postgres(url) => Ok(Box::new(PostgresDestination::connect(url)?)),
        DestUrl::Sqlite(path) => Ok(Box::new(SqliteDestination::open(path)?)),
    }
}

/// SQL placeholder dialect
#[derive(Debug, Clone, Copy)]
pub(crate) enum Placeholder {
    /// Postgres `$1, $2, ...`
    Dollar,
    /// SQLite `?1, ?2, ...`
    Question,
}

/// Build a multi-row INSERT for one batch.
///
/// Placeholders are numbered row-major, matching the flattened parameter
/// order the backends bind with.
pub(crate) fn insert_sql(spec: &TableSpec, row_count: usize, style: Placeholder) -> String {
    use std::fmt::Write;

    let columns = spec.dest_columns().collect::<Vec<_>>();
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ",
        spec.dest_name,
        columns.join(", ")
    );

    let mut n = 0usize;
    for row in 0..row_count {
        if row > 0 {
            sql.push_str(", ");
        }
        sql.push('(');
        for (i, _) in columns.iter().enumerate() {
            n += 1;
            if i > 0 {
                sql.push_str(", ");
            }
            match style {
                Placeholder::Dollar => {
                    let _ = write!(sql, "${n}");
                }
                Placeholder::Question => {
                    let _ = write!(sql, "?{n}");
                }
            }
        }
        sql.push(')');
    }

    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sql_single_row() {
        let sql = insert_sql(Table::TimePeriod.spec(), 1, Placeholder::Dollar);
        assert_eq!(
            sql,
            "INSERT INTO time_periods (id, year, period_number, start_date, end_date) \
             VALUES ($1, $2, $3, $4, $5)"
        );
    }

    #[test]
    fn test_insert_sql_multi_row_question() {
        let sql = insert_sql(Table::TimePeriod.spec(), 2, Placeholder::Question);
        assert!(sql.ends_with("VALUES (?1, ?2, ?3, ?4, ?5), (?6, ?7, ?8, ?9, ?10)"));
    }

    #[test]
    fn test_insert_sql_uses_destination_names() {
        let sql = insert_sql(Table::Client.spec(), 1, Placeholder::Dollar);
        assert!(sql.starts_with("INSERT INTO clients ("));
        assert!(sql.contains("next_appointment"));
        // Legacy names never leak into destination SQL
        assert!(!sql.contains("nextAppointment"));
    }
}
