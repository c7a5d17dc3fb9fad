//! Table registry for the migration pipeline
//!
//! This module is the single source of truth for:
//! - The foreign-key dependency order in which tables are loaded
//! - The legacy-to-destination column name mapping (the compatibility
//!   surface the downstream application depends on)
//! - Which destination columns are NOT NULL and which hold timestamps
//!
//! Every stage (extract, load, verify) consults this registry; none of them
//! carries its own copy of the mapping.

use std::fmt;

/// The six migrated entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    AppointmentType,
    Employee,
    TimePeriod,
    Client,
    Rate,
    Appointment,
}

/// Load order: leaves first, so every foreign key points at rows that
/// already exist. Clearing uses the reverse of this order.
pub const LOAD_ORDER: [Table; 6] = [
    Table::AppointmentType,
    Table::Employee,
    Table::TimePeriod,
    Table::Client,
    Table::Rate,
    Table::Appointment,
];

/// Destination type of a column, which also selects the normalization
/// applied while building insert rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// 32/64-bit integer (ids, counts, durations)
    Int,
    /// External-system identifier that may arrive as a string and may
    /// overflow; parse failure degrades to NULL
    BigId,
    /// Monetary or rate amount
    Float,
    /// Free text
    Text,
    /// Legacy 0/1 or native boolean
    Bool,
    /// Date or date-time; subject to sentinel normalization
    Timestamp,
}

/// One column of the legacy-to-destination mapping
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    /// Column name in the legacy export (and in the JSONL artifacts)
    pub legacy: &'static str,
    /// Column name in the destination schema
    pub dest: &'static str,
    /// Destination type
    pub kind: ColumnKind,
    /// Destination NOT NULL constraint
    pub required: bool,
}

const fn col(
    legacy: &'static str,
    dest: &'static str,
    kind: ColumnKind,
    required: bool,
) -> ColumnSpec {
    ColumnSpec {
        legacy,
        dest,
        kind,
        required,
    }
}

/// Full mapping for one table
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub table: Table,
    /// Table name in the legacy export
    pub legacy_name: &'static str,
    /// Table name in the destination schema
    pub dest_name: &'static str,
    /// Legacy primary key column (always the first entry of `columns`)
    pub primary_key: &'static str,
    pub columns: &'static [ColumnSpec],
}

use ColumnKind::*;

const APPOINTMENT_TYPE_COLUMNS: &[ColumnSpec] = &[
    col("apptTypeId", "id", Int, true),
    col("code", "code", Text, true),
    col("displayName", "name", Text, true),
    col("notes", "description", Text, false),
    col("rateTypeId", "rate_type", Int, false),
];

const EMPLOYEE_COLUMNS: &[ColumnSpec] = &[
    col("empId", "id", Int, true),
    col("firstName", "first_name", Text, true),
    col("lastName", "last_name", Text, true),
    col("email", "email", Text, false),
    col("isActive", "active", Bool, true),
    col("hireDate", "hire_date", Timestamp, false),
    col("msId", "external_id", BigId, false),
    col("payrollId", "payroll_external_id", BigId, false),
];

const TIME_PERIOD_COLUMNS: &[ColumnSpec] = &[
    col("periodId", "id", Int, true),
    col("year", "year", Int, true),
    col("periodNum", "period_number", Int, true),
    col("startDate", "start_date", Timestamp, true),
    col("endDate", "end_date", Timestamp, true),
];

const CLIENT_COLUMNS: &[ColumnSpec] = &[
    col("clientId", "id", Int, true),
    col("firstName", "first_name", Text, true),
    col("lastName", "last_name", Text, true),
    col("email", "contact_email", Text, false),
    col("consent", "consent", Bool, true),
    col("hasTreatmentPlan", "treatment_plan", Bool, true),
    col("isActive", "active", Bool, true),
    // Known to carry the year-zero sentinel in the legacy export
    col("nextAppointment", "next_appointment", Timestamp, false),
    col("primaryEmpId", "employee_id", Int, false),
    col("defaultApptTypeId", "appointment_type_id", Int, false),
    col("chartId", "external_id", BigId, false),
];

const RATE_COLUMNS: &[ColumnSpec] = &[
    col("rateId", "id", Int, true),
    col("empId", "employee_id", Int, true),
    col("apptTypeId", "appointment_type_id", Int, true),
    col("amount", "amount", Float, true),
    col("rateKind", "kind", Text, true),
    col("effectiveFrom", "effective_from", Timestamp, true),
    col("effectiveTo", "effective_to", Timestamp, false),
    col("payrollId", "external_id", BigId, false),
];

const APPOINTMENT_COLUMNS: &[ColumnSpec] = &[
    col("apptId", "id", Int, true),
    col("clientId", "client_id", Int, true),
    col("empId", "employee_id", Int, true),
    col("rateId", "rate_id", Int, true),
    col("apptTypeId", "appointment_type_id", Int, true),
    col("apptDate", "starts_at", Timestamp, true),
    col("durationMin", "duration_minutes", Int, true),
    col("amountBilled", "billed_amount", Float, false),
    col("amountPaid", "paid_amount", Float, false),
    col("noShow", "no_show", Bool, true),
    col("billed", "billed", Bool, true),
    col("notes", "notes", Text, false),
    col("createdAt", "created_at", Timestamp, true),
    col("updatedAt", "updated_at", Timestamp, true),
];

const APPOINTMENT_TYPE_SPEC: TableSpec = TableSpec {
    table: Table::AppointmentType,
    legacy_name: "AppointmentType",
    dest_name: "appointment_types",
    primary_key: "apptTypeId",
    columns: APPOINTMENT_TYPE_COLUMNS,
};

const EMPLOYEE_SPEC: TableSpec = TableSpec {
    table: Table::Employee,
    legacy_name: "Employee",
    dest_name: "employees",
    primary_key: "empId",
    columns: EMPLOYEE_COLUMNS,
};

const TIME_PERIOD_SPEC: TableSpec = TableSpec {
    table: Table::TimePeriod,
    legacy_name: "TimePeriod",
    dest_name: "time_periods",
    primary_key: "periodId",
    columns: TIME_PERIOD_COLUMNS,
};

const CLIENT_SPEC: TableSpec = TableSpec {
    table: Table::Client,
    legacy_name: "Client",
    dest_name: "clients",
    primary_key: "clientId",
    columns: CLIENT_COLUMNS,
};

const RATE_SPEC: TableSpec = TableSpec {
    table: Table::Rate,
    legacy_name: "Rate",
    dest_name: "rates",
    primary_key: "rateId",
    columns: RATE_COLUMNS,
};

const APPOINTMENT_SPEC: TableSpec = TableSpec {
    table: Table::Appointment,
    legacy_name: "Appointment",
    dest_name: "appointments",
    primary_key: "apptId",
    columns: APPOINTMENT_COLUMNS,
};

impl Table {
    /// Look up the full mapping for this table
    pub fn spec(self) -> &'static TableSpec {
        match self {
            Table::AppointmentType => &APPOINTMENT_TYPE_SPEC,
            Table::Employee => &EMPLOYEE_SPEC,
            Table::TimePeriod => &TIME_PERIOD_SPEC,
            Table::Client => &CLIENT_SPEC,
            Table::Rate => &RATE_SPEC,
            Table::Appointment => &APPOINTMENT_SPEC,
        }
    }

    /// Find a table by its legacy name (used by --expect parsing)
    pub fn from_legacy_name(name: &str) -> Option<Table> {
        LOAD_ORDER
            .into_iter()
            .find(|t| t.spec().legacy_name.eq_ignore_ascii_case(name))
    }
}

impl TableSpec {
    /// Destination column names, in insert order
    pub fn dest_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.dest)
    }

    /// Destination timestamp columns (swept by the verifier for leftover
    /// pre-1900 dates)
    pub fn date_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Timestamp)
            .map(|c| c.dest)
    }

    /// Comma-separated legacy column list for the extraction SELECT
    pub fn legacy_column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.legacy)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().dest_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_order_parents_first() {
        let pos = |t: Table| LOAD_ORDER.iter().position(|x| *x == t).unwrap();

        // Client references Employee and AppointmentType
        assert!(pos(Table::Employee) < pos(Table::Client));
        assert!(pos(Table::AppointmentType) < pos(Table::Client));

        // Rate references Employee and AppointmentType
        assert!(pos(Table::Employee) < pos(Table::Rate));

        // Appointment references everything else
        assert!(pos(Table::Client) < pos(Table::Appointment));
        assert!(pos(Table::Rate) < pos(Table::Appointment));
    }

    #[test]
    fn test_primary_key_is_first_column() {
        for table in LOAD_ORDER {
            let spec = table.spec();
            assert_eq!(spec.columns[0].legacy, spec.primary_key);
            assert_eq!(spec.columns[0].dest, "id");
            assert!(spec.columns[0].required);
        }
    }

    #[test]
    fn test_from_legacy_name() {
        assert_eq!(Table::from_legacy_name("Employee"), Some(Table::Employee));
        assert_eq!(Table::from_legacy_name("employee"), Some(Table::Employee));
        assert_eq!(Table::from_legacy_name("nope"), None);
    }

    #[test]
    fn test_appointment_required_dates() {
        let spec = Table::Appointment.spec();
        let required_dates: Vec<_> = spec
            .columns
            .iter()
            .filter(|c| c.required && c.kind == ColumnKind::Timestamp)
            .map(|c| c.dest)
            .collect();
        assert_eq!(required_dates, ["starts_at", "created_at", "updated_at"]);
    }

    #[test]
    fn test_client_next_appointment_is_nullable_timestamp() {
        let spec = Table::Client.spec();
        let next = spec
            .columns
            .iter()
            .find(|c| c.dest == "next_appointment")
            .unwrap();
        assert_eq!(next.kind, ColumnKind::Timestamp);
        assert!(!next.required);
    }

    #[test]
    fn test_legacy_column_list() {
        let list = Table::TimePeriod.spec().legacy_column_list();
        assert_eq!(list, "periodId, year, periodNum, startDate, endDate");
    }
}
