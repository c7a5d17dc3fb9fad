//! Batched loading of extracted records into the destination
//!
//! Records are grouped into fixed-size batches; each batch is one
//! all-or-nothing insert. A failed batch (validation failure inside it, or
//! a constraint error from the database) is recorded with its primary-key
//! range and the loader moves on to the next batch. Failures surface in
//! the per-table outcome, not as errors - only infrastructure problems
//! (missing artifact, connection loss) abort the stage.

use crate::dest::Destination;
use crate::error::{LoadError, LoadResult};
use crate::progress::{estimate_remaining, TableProgress};
use crate::record::{build_row, Row, SourceRecord};
use crate::tables::{Table, LOAD_ORDER};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One failed batch, attributed by primary-key range
#[derive(Debug)]
pub struct BatchError {
    /// Primary keys of the first and last record in the batch
    pub first_id: i64,
    pub last_id: i64,
    pub message: String,
}

/// Explicit result of loading one table, returned up the call chain and
/// aggregated by the orchestrator
#[derive(Debug)]
pub struct TableOutcome {
    pub table: Table,
    pub rows_read: u64,
    pub rows_loaded: u64,
    pub batches_committed: u32,
    pub batches_failed: u32,
    pub errors: Vec<BatchError>,
}

impl TableOutcome {
    pub fn is_clean(&self) -> bool {
        self.batches_failed == 0
    }
}

/// Aggregated result of a full load run
#[derive(Debug, Default)]
pub struct LoadReport {
    pub tables: Vec<TableOutcome>,
}

impl LoadReport {
    pub fn rows_loaded(&self) -> u64 {
        self.tables.iter().map(|t| t.rows_loaded).sum()
    }

    pub fn batches_failed(&self) -> u32 {
        self.tables.iter().map(|t| t.batches_failed).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.tables.iter().all(TableOutcome::is_clean)
    }
}

/// Batched table loader over an injected destination connection
pub struct Loader<'a> {
    dest: &'a mut dyn Destination,
    batch_size: usize,
}

impl<'a> Loader<'a> {
    pub fn new(dest: &'a mut dyn Destination, batch_size: usize) -> Self {
        Self { dest, batch_size }
    }

    /// Clear every destination table, children first, so restrict-on-delete
    /// foreign keys never block the clear
    pub fn clear_all(&mut self) -> LoadResult<()> {
        for table in LOAD_ORDER.iter().rev() {
            debug!(table = %table, "clearing");
            self.dest.clear(*table)?;
        }
        info!("destination cleared");
        Ok(())
    }

    /// Load one table's records in batches
    pub fn load_table(
        &mut self,
        table: Table,
        records: &[SourceRecord],
        progress: Option<&TableProgress>,
    ) -> LoadResult<TableOutcome> {
        let spec = table.spec();
        let total = records.len() as u64;
        let started = Instant::now();

        let mut outcome = TableOutcome {
            table,
            rows_read: total,
            rows_loaded: 0,
            batches_committed: 0,
            batches_failed: 0,
            errors: Vec::new(),
        };

        let mut processed = 0u64;
        for batch in records.chunks(self.batch_size.max(1)) {
            match build_batch(spec, batch) {
                Ok(rows) => match self.dest.insert_batch(table, &rows) {
                    Ok(()) => {
                        outcome.rows_loaded += rows.len() as u64;
                        outcome.batches_committed += 1;
                    }
                    Err(e) => record_failure(&mut outcome, spec, batch, e.to_string()),
                },
                Err(message) => record_failure(&mut outcome, spec, batch, message),
            }

            processed += batch.len() as u64;

            if let Some(p) = progress {
                p.advance(batch.len() as u64);
                if let Some(eta) = estimate_remaining(started.elapsed(), processed, total) {
                    p.set_eta(eta);
                }
            }

            debug!(
                table = %table,
                processed,
                total,
                failed_batches = outcome.batches_failed,
                "batch boundary"
            );
        }

        if outcome.is_clean() {
            info!(table = %table, rows = outcome.rows_loaded, "loaded");
        } else {
            warn!(
                table = %table,
                rows = outcome.rows_loaded,
                failed_batches = outcome.batches_failed,
                "loaded with failures"
            );
        }

        Ok(outcome)
    }
}

/// Build every row of a batch, or return the first validation failure.
/// One bad record fails its whole batch; failure granularity is the batch,
/// not the record.
fn build_batch(
    spec: &crate::tables::TableSpec,
    batch: &[SourceRecord],
) -> Result<Vec<Row>, String> {
    let mut rows = Vec::with_capacity(batch.len());
    for record in batch {
        match build_row(spec, record) {
            Ok(row) => rows.push(row),
            Err(e) => return Err(e.to_string()),
        }
    }
    Ok(rows)
}

fn record_failure(
    outcome: &mut TableOutcome,
    spec: &crate::tables::TableSpec,
    batch: &[SourceRecord],
    message: String,
) {
    let (first_id, last_id) = id_range(spec, batch);
    warn!(
        table = spec.dest_name,
        first_id, last_id, %message, "batch failed"
    );
    outcome.batches_failed += 1;
    outcome.errors.push(BatchError {
        first_id,
        last_id,
        message,
    });
}

/// Primary-key range of a batch, for failure attribution. Records are
/// extracted in key order, so first/last is the range.
fn id_range(spec: &crate::tables::TableSpec, batch: &[SourceRecord]) -> (i64, i64) {
    let key = |record: &SourceRecord| {
        record
            .get(spec.primary_key)
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(0)
    };
    match (batch.first(), batch.last()) {
        (Some(first), Some(last)) => (key(first), key(last)),
        _ => (0, 0),
    }
}

/// Read one table's JSONL artifact back into records
pub fn read_artifact(path: &Path) -> LoadResult<Vec<SourceRecord>> {
    if !path.exists() {
        return Err(LoadError::ArtifactMissing {
            path: path.to_path_buf(),
        });
    }

    let file = File::open(path)?;
    let mut records = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: SourceRecord =
            serde_json::from_str(&line).map_err(|source| LoadError::ArtifactParse {
                path: path.to_path_buf(),
                line: i + 1,
                source,
            })?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dest::SqliteDestination;
    use serde_json::json;

    fn employee(id: i64) -> SourceRecord {
        json!({
            "empId": id,
            "firstName": format!("First{id}"),
            "lastName": format!("Last{id}"),
            "email": null,
            "isActive": 1,
            "hireDate": "2020-01-06",
            "msId": null,
            "payrollId": null,
        })
        .as_object()
        .unwrap()
        .clone()
    }

    #[test]
    fn test_load_table_clean() {
        let mut dest = SqliteDestination::open_in_memory().unwrap();
        let records: Vec<_> = (1..=10).map(employee).collect();

        let mut loader = Loader::new(&mut dest, 4);
        let outcome = loader.load_table(Table::Employee, &records, None).unwrap();

        assert_eq!(outcome.rows_read, 10);
        assert_eq!(outcome.rows_loaded, 10);
        assert_eq!(outcome.batches_committed, 3); // 4 + 4 + 2
        assert!(outcome.is_clean());
        assert_eq!(dest.count_rows(Table::Employee).unwrap(), 10);
    }

    #[test]
    fn test_batch_failure_isolation() {
        let mut dest = SqliteDestination::open_in_memory().unwrap();
        let mut records: Vec<_> = (1..=9).map(employee).collect();
        // Record 5 (batch 2 of 3) loses a required field
        records[4].remove("lastName");

        let mut loader = Loader::new(&mut dest, 3);
        let outcome = loader.load_table(Table::Employee, &records, None).unwrap();

        assert_eq!(outcome.batches_committed, 2);
        assert_eq!(outcome.batches_failed, 1);
        assert_eq!(outcome.rows_loaded, 6);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].first_id, 4);
        assert_eq!(outcome.errors[0].last_id, 6);

        // Batches 1 and 3 are fully present despite batch 2 failing
        assert_eq!(dest.count_rows(Table::Employee).unwrap(), 6);
    }

    #[test]
    fn test_dependency_order_violation_fails_every_batch() {
        let mut dest = SqliteDestination::open_in_memory().unwrap();
        // Appointments into an empty database: every FK parent is missing
        let records: Vec<SourceRecord> = (1..=4)
            .map(|id| {
                json!({
                    "apptId": id,
                    "clientId": 1, "empId": 1, "rateId": 1, "apptTypeId": 1,
                    "apptDate": "2023-06-15 14:30:00",
                    "durationMin": 50,
                    "amountBilled": null, "amountPaid": null,
                    "noShow": 0, "billed": 0, "notes": null,
                    "createdAt": "2023-06-15 14:30:00",
                    "updatedAt": "2023-06-15 14:30:00",
                })
                .as_object()
                .unwrap()
                .clone()
            })
            .collect();

        let mut loader = Loader::new(&mut dest, 2);
        let outcome = loader
            .load_table(Table::Appointment, &records, None)
            .unwrap();

        assert_eq!(outcome.batches_failed, 2);
        assert_eq!(outcome.rows_loaded, 0);
        assert_eq!(dest.count_rows(Table::Appointment).unwrap(), 0);
    }

    #[test]
    fn test_clear_all_reverse_order() {
        let mut dest = SqliteDestination::open_in_memory().unwrap();
        let records: Vec<_> = (1..=3).map(employee).collect();
        {
            let mut loader = Loader::new(&mut dest, 100);
            loader.load_table(Table::Employee, &records, None).unwrap();
            loader.clear_all().unwrap();
        }
        assert_eq!(dest.count_rows(Table::Employee).unwrap(), 0);
    }

    #[test]
    fn test_read_artifact_missing() {
        let err = read_artifact(Path::new("/nonexistent/Employee.jsonl")).unwrap_err();
        assert!(matches!(err, LoadError::ArtifactMissing { .. }));
    }

    #[test]
    fn test_read_artifact_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Employee.jsonl");
        std::fs::write(
            &path,
            "{\"empId\":1,\"firstName\":\"A\"}\n\n{\"empId\":2,\"firstName\":\"B\"}\n",
        )
        .unwrap();

        let records = read_artifact(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["empId"], json!(2));
    }
}
