//! SQLite destination backend
//!
//! A local stand-in for the cloud destination with the same table names,
//! column names, NOT NULL constraints, and restrict-on-delete foreign
//! keys. Used for rehearsal runs and by the integration tests. Timestamps
//! are stored as RFC 3339 text, which keeps date comparisons lexicographic.

use super::{insert_sql, Destination, Placeholder};
use crate::error::{DbError, DbResult};
use crate::record::{DbValue, Row};
use crate::tables::Table;
use crate::transform::MIN_VALID_DATE;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, ToSql};
use std::path::Path;

/// Destination schema, SQLite dialect. Mirrors the cloud schema exactly:
/// integer primary keys, restrict-on-delete foreign keys, and the
/// destination column names the downstream application depends on.
const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS appointment_types (
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    description TEXT,
    rate_type INTEGER
);

CREATE TABLE IF NOT EXISTS employees (
    id INTEGER PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT,
    active INTEGER NOT NULL,
    hire_date TEXT,
    external_id INTEGER,
    payroll_external_id INTEGER
);

CREATE TABLE IF NOT EXISTS time_periods (
    id INTEGER PRIMARY KEY,
    year INTEGER NOT NULL,
    period_number INTEGER NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS clients (
    id INTEGER PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    contact_email TEXT,
    consent INTEGER NOT NULL,
    treatment_plan INTEGER NOT NULL,
    active INTEGER NOT NULL,
    next_appointment TEXT,
    employee_id INTEGER REFERENCES employees(id) ON DELETE RESTRICT,
    appointment_type_id INTEGER REFERENCES appointment_types(id) ON DELETE RESTRICT,
    external_id INTEGER
);

CREATE TABLE IF NOT EXISTS rates (
    id INTEGER PRIMARY KEY,
    employee_id INTEGER NOT NULL REFERENCES employees(id) ON DELETE RESTRICT,
    appointment_type_id INTEGER NOT NULL REFERENCES appointment_types(id) ON DELETE RESTRICT,
    amount REAL NOT NULL,
    kind TEXT NOT NULL,
    effective_from TEXT NOT NULL,
    effective_to TEXT,
    external_id INTEGER
);

CREATE TABLE IF NOT EXISTS appointments (
    id INTEGER PRIMARY KEY,
    client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE RESTRICT,
    employee_id INTEGER NOT NULL REFERENCES employees(id) ON DELETE RESTRICT,
    rate_id INTEGER NOT NULL REFERENCES rates(id) ON DELETE RESTRICT,
    appointment_type_id INTEGER NOT NULL REFERENCES appointment_types(id) ON DELETE RESTRICT,
    starts_at TEXT NOT NULL,
    duration_minutes INTEGER NOT NULL,
    billed_amount REAL,
    paid_amount REAL,
    no_show INTEGER NOT NULL,
    billed INTEGER NOT NULL,
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// SQLite destination (rehearsal target and test harness)
pub struct SqliteDestination {
    conn: Connection,
}

impl SqliteDestination {
    /// Open (or create) a file-backed destination
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path).map_err(|e| DbError::ConnectFailed {
            target: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::init(conn)
    }

    /// Open an in-memory destination (tests)
    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        // FK enforcement is per-connection in SQLite and off by default
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self { conn })
    }

    /// Direct access to the underlying connection (tests)
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Destination for SqliteDestination {
    fn clear(&mut self, table: Table) -> DbResult<()> {
        let sql = format!("DELETE FROM {}", table.spec().dest_name);
        self.conn.execute(&sql, [])?;
        Ok(())
    }

    fn insert_batch(&mut self, table: Table, rows: &[Row]) -> DbResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let sql = insert_sql(table.spec(), rows.len(), Placeholder::Question);
        let tx = self.conn.transaction()?;
        {
            let params =
                rusqlite::params_from_iter(rows.iter().flat_map(|row| row.values.iter()));
            tx.execute(&sql, params)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn count_rows(&mut self, table: Table) -> DbResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.spec().dest_name);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_stale_dates(&mut self, table: Table, column: &str) -> DbResult<u64> {
        // RFC 3339 text compares lexicographically, so a plain string
        // comparison against the threshold date is correct here.
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {column} IS NOT NULL AND {column} < '{MIN_VALID_DATE}'",
            table.spec().dest_name
        );
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl ToSql for DbValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            DbValue::Null => ToSqlOutput::Owned(Value::Null),
            DbValue::Bool(b) => ToSqlOutput::Owned(Value::Integer(*b as i64)),
            DbValue::Int(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            DbValue::Float(f) => ToSqlOutput::Owned(Value::Real(*f)),
            DbValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            DbValue::Timestamp(ts) => ToSqlOutput::Owned(Value::Text(ts.to_rfc3339())),
        })
    }
}
