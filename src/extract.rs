//! Extraction of the legacy SQLite export into JSONL artifacts
//!
//! Each table is read in full, ordered by primary key, and written as one
//! JSON object per line to `<export-dir>/<LegacyTable>.jsonl`. Field names
//! in the artifact are the legacy column names; the rename to destination
//! conventions happens later, during record building.

use crate::config::CountMismatchPolicy;
use crate::error::{ExtractError, ExtractResult};
use crate::tables::{Table, TableSpec, LOAD_ORDER};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Two appointment-type rows that were missing from the initial legacy
/// export and are appended manually, keyed by code, whenever the export
/// does not already contain them.
const MANUAL_APPOINTMENT_TYPES: &[(i64, &str, &str)] = &[
    (98, "PHONE", "Phone Consultation"),
    (99, "GROUP", "Group Session"),
];

/// Handle to the legacy export database
pub struct SourceDb {
    conn: Connection,
}

/// Result of extracting one table
#[derive(Debug)]
pub struct TableExtract {
    pub table: Table,
    /// Rows written to the artifact (including manually appended rows)
    pub rows: u64,
    pub artifact: PathBuf,
    /// Present when the extracted count differed from the expected count
    /// and the mismatch policy is `warn`
    pub count_warning: Option<String>,
}

/// Result of a full extraction run
#[derive(Debug)]
pub struct ExtractReport {
    pub tables: Vec<TableExtract>,
}

impl ExtractReport {
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

impl SourceDb {
    /// Open the legacy export read-only
    pub fn open(path: &Path) -> ExtractResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )
        .map_err(|e| ExtractError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self { conn })
    }

    /// In-memory source (tests)
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Extract every table in load order.
    ///
    /// `expected` pairs legacy tables with operator-supplied row counts;
    /// a mismatch either aborts or warns depending on `policy`.
    pub fn extract_all(
        &self,
        export_dir: &Path,
        expected: &[(Table, u64)],
        policy: CountMismatchPolicy,
    ) -> ExtractResult<ExtractReport> {
        fs::create_dir_all(export_dir)?;

        let mut tables = Vec::with_capacity(LOAD_ORDER.len());
        for table in LOAD_ORDER {
            let expect = expected
                .iter()
                .find(|(t, _)| *t == table)
                .map(|(_, count)| *count);
            tables.push(self.extract_table(table, export_dir, expect, policy)?);
        }

        Ok(ExtractReport { tables })
    }

    /// Extract one table to its JSONL artifact
    pub fn extract_table(
        &self,
        table: Table,
        export_dir: &Path,
        expected: Option<u64>,
        policy: CountMismatchPolicy,
    ) -> ExtractResult<TableExtract> {
        let spec = table.spec();
        let artifact = artifact_path(export_dir, spec);

        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            spec.legacy_column_list(),
            spec.legacy_name,
            spec.primary_key
        );

        let mut records = Vec::new();
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut record = Map::with_capacity(spec.columns.len());
            for (i, column) in spec.columns.iter().enumerate() {
                record.insert(column.legacy.to_string(), json_value(row.get_ref(i)?));
            }
            records.push(record);
        }

        if table == Table::AppointmentType {
            append_manual_appointment_types(&mut records);
        }

        let file = File::create(&artifact)?;
        let mut writer = BufWriter::new(file);
        for record in &records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        let actual = records.len() as u64;
        let mut count_warning = None;
        if let Some(expected) = expected {
            if expected != actual {
                match policy {
                    CountMismatchPolicy::Abort => {
                        return Err(ExtractError::CountMismatch {
                            table: spec.legacy_name,
                            expected,
                            actual,
                        });
                    }
                    CountMismatchPolicy::Warn => {
                        let msg = format!(
                            "expected {expected} rows in {}, extracted {actual}",
                            spec.legacy_name
                        );
                        warn!("{msg}");
                        count_warning = Some(msg);
                    }
                }
            }
        }

        info!(table = spec.legacy_name, rows = actual, "extracted");

        Ok(TableExtract {
            table,
            rows: actual,
            artifact,
            count_warning,
        })
    }
}

/// Artifact path for a table within the export directory
pub fn artifact_path(export_dir: &Path, spec: &TableSpec) -> PathBuf {
    export_dir.join(format!("{}.jsonl", spec.legacy_name))
}

/// Convert a SQLite cell to its JSON rendering, preserving the legacy
/// representation (dates stay as the text the export produced)
fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => json!(i),
        ValueRef::Real(f) => json!(f),
        ValueRef::Text(t) => json!(String::from_utf8_lossy(t)),
        ValueRef::Blob(b) => json!(String::from_utf8_lossy(b)),
    }
}

fn append_manual_appointment_types(records: &mut Vec<Map<String, Value>>) {
    for &(id, code, name) in MANUAL_APPOINTMENT_TYPES {
        let present = records
            .iter()
            .any(|r| r.get("code").and_then(Value::as_str) == Some(code));
        if present {
            continue;
        }

        let mut record = Map::new();
        record.insert("apptTypeId".into(), json!(id));
        record.insert("code".into(), json!(code));
        record.insert("displayName".into(), json!(name));
        record.insert("notes".into(), Value::Null);
        record.insert("rateTypeId".into(), Value::Null);
        records.push(record);
        info!(code, "appended manual appointment type missing from export");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    fn legacy_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE AppointmentType (
                apptTypeId INTEGER PRIMARY KEY,
                code TEXT, displayName TEXT, notes TEXT, rateTypeId INTEGER
            );
            CREATE TABLE Employee (
                empId INTEGER PRIMARY KEY,
                firstName TEXT, lastName TEXT, email TEXT,
                isActive INTEGER, hireDate TEXT, msId TEXT, payrollId TEXT
            );
            CREATE TABLE TimePeriod (
                periodId INTEGER PRIMARY KEY,
                year INTEGER, periodNum INTEGER, startDate TEXT, endDate TEXT
            );
            CREATE TABLE Client (
                clientId INTEGER PRIMARY KEY,
                firstName TEXT, lastName TEXT, email TEXT,
                consent INTEGER, hasTreatmentPlan INTEGER, isActive INTEGER,
                nextAppointment TEXT, primaryEmpId INTEGER,
                defaultApptTypeId INTEGER, chartId TEXT
            );
            CREATE TABLE Rate (
                rateId INTEGER PRIMARY KEY,
                empId INTEGER, apptTypeId INTEGER, amount REAL, rateKind TEXT,
                effectiveFrom TEXT, effectiveTo TEXT, payrollId TEXT
            );
            CREATE TABLE Appointment (
                apptId INTEGER PRIMARY KEY,
                clientId INTEGER, empId INTEGER, rateId INTEGER, apptTypeId INTEGER,
                apptDate TEXT, durationMin INTEGER, amountBilled REAL, amountPaid REAL,
                noShow INTEGER, billed INTEGER, notes TEXT, createdAt TEXT, updatedAt TEXT
            );

            INSERT INTO Employee VALUES
                (2, 'Noa', 'Lavi', 'noa@example.com', 1, '2018-05-14', '101', NULL),
                (1, 'Sam', 'Ortiz', NULL, 0, '2015-01-02', NULL, '77');
            INSERT INTO AppointmentType VALUES (1, 'IND', 'Individual Session', NULL, 1);
            "#,
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_extract_orders_by_primary_key() {
        let source = SourceDb::from_connection(legacy_db());
        let dir = tempfile::tempdir().unwrap();

        let result = source
            .extract_table(Table::Employee, dir.path(), None, CountMismatchPolicy::Abort)
            .unwrap();
        assert_eq!(result.rows, 2);

        let file = File::open(&result.artifact).unwrap();
        let ids: Vec<i64> = std::io::BufReader::new(file)
            .lines()
            .map(|line| {
                let v: Value = serde_json::from_str(&line.unwrap()).unwrap();
                v["empId"].as_i64().unwrap()
            })
            .collect();
        assert_eq!(ids, [1, 2]);
    }

    #[test]
    fn test_manual_appointment_types_appended() {
        let source = SourceDb::from_connection(legacy_db());
        let dir = tempfile::tempdir().unwrap();

        let result = source
            .extract_table(
                Table::AppointmentType,
                dir.path(),
                None,
                CountMismatchPolicy::Abort,
            )
            .unwrap();
        // 1 exported + 2 manual
        assert_eq!(result.rows, 3);

        let content = fs::read_to_string(&result.artifact).unwrap();
        assert!(content.contains("\"PHONE\""));
        assert!(content.contains("\"GROUP\""));
    }

    #[test]
    fn test_manual_rows_not_duplicated() {
        let conn = legacy_db();
        conn.execute(
            "INSERT INTO AppointmentType VALUES (98, 'PHONE', 'Phone Consultation', NULL, NULL)",
            [],
        )
        .unwrap();
        let source = SourceDb::from_connection(conn);
        let dir = tempfile::tempdir().unwrap();

        let result = source
            .extract_table(
                Table::AppointmentType,
                dir.path(),
                None,
                CountMismatchPolicy::Abort,
            )
            .unwrap();
        // 2 exported (one of them PHONE) + 1 manual (GROUP only)
        assert_eq!(result.rows, 3);
    }

    #[test]
    fn test_count_mismatch_abort() {
        let source = SourceDb::from_connection(legacy_db());
        let dir = tempfile::tempdir().unwrap();

        let err = source
            .extract_table(
                Table::Employee,
                dir.path(),
                Some(5),
                CountMismatchPolicy::Abort,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractError::CountMismatch {
                expected: 5,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_count_mismatch_warn_continues() {
        let source = SourceDb::from_connection(legacy_db());
        let dir = tempfile::tempdir().unwrap();

        let result = source
            .extract_table(
                Table::Employee,
                dir.path(),
                Some(5),
                CountMismatchPolicy::Warn,
            )
            .unwrap();
        assert_eq!(result.rows, 2);
        assert!(result.count_warning.is_some());
    }

    #[test]
    fn test_extract_all_writes_every_artifact() {
        let source = SourceDb::from_connection(legacy_db());
        let dir = tempfile::tempdir().unwrap();

        let report = source
            .extract_all(dir.path(), &[], CountMismatchPolicy::Abort)
            .unwrap();
        assert_eq!(report.tables.len(), 6);
        for extract in &report.tables {
            assert!(extract.artifact.exists(), "missing {:?}", extract.artifact);
        }
    }
}
