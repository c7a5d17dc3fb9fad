//! Postgres destination backend
//!
//! The real cloud destination. The schema (and its restrict-on-delete
//! foreign keys) is owned by the downstream application; this backend only
//! clears, inserts, and counts.

use super::{insert_sql, Destination, Placeholder};
use crate::error::{DbError, DbResult};
use crate::record::{DbValue, Row};
use crate::tables::Table;
use crate::transform::MIN_VALID_DATE;
use postgres::types::{accepts, private::BytesMut, to_sql_checked, IsNull, ToSql, Type};
use postgres::{Client, NoTls};

/// Postgres destination
pub struct PostgresDestination {
    client: Client,
}

impl PostgresDestination {
    /// Connect using a `postgresql://` connection string
    pub fn connect(url: &str) -> DbResult<Self> {
        let client = Client::connect(url, NoTls).map_err(|e| DbError::ConnectFailed {
            target: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { client })
    }
}

impl Destination for PostgresDestination {
    fn clear(&mut self, table: Table) -> DbResult<()> {
        let sql = format!("DELETE FROM {}", table.spec().dest_name);
        self.client.execute(&sql, &[])?;
        Ok(())
    }

    fn insert_batch(&mut self, table: Table, rows: &[Row]) -> DbResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let sql = insert_sql(table.spec(), rows.len(), Placeholder::Dollar);
        let params: Vec<&(dyn ToSql + Sync)> = rows
            .iter()
            .flat_map(|row| row.values.iter())
            .map(|value| value as &(dyn ToSql + Sync))
            .collect();

        let mut tx = self.client.transaction()?;
        tx.execute(&sql, &params)?;
        tx.commit()?;
        Ok(())
    }

    fn count_rows(&mut self, table: Table) -> DbResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.spec().dest_name);
        let row = self.client.query_one(&sql, &[])?;
        Ok(row.get::<_, i64>(0) as u64)
    }

    fn count_stale_dates(&mut self, table: Table, column: &str) -> DbResult<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {column} IS NOT NULL AND {column} < TIMESTAMP '{MIN_VALID_DATE}'",
            table.spec().dest_name
        );
        let row = self.client.query_one(&sql, &[])?;
        Ok(row.get::<_, i64>(0) as u64)
    }
}

impl ToSql for DbValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            DbValue::Null => Ok(IsNull::Yes),
            DbValue::Bool(value) => value.to_sql(ty, out),
            DbValue::Int(value) => match *ty {
                Type::INT2 => (*value as i16).to_sql(ty, out),
                Type::INT4 => (*value as i32).to_sql(ty, out),
                _ => value.to_sql(ty, out),
            },
            DbValue::Float(value) => match *ty {
                Type::FLOAT4 => (*value as f32).to_sql(ty, out),
                _ => value.to_sql(ty, out),
            },
            DbValue::Text(value) => value.to_sql(ty, out),
            DbValue::Timestamp(value) => match *ty {
                Type::DATE => value.date_naive().to_sql(ty, out),
                Type::TIMESTAMP => value.naive_utc().to_sql(ty, out),
                _ => value.to_sql(ty, out),
            },
        }
    }

    accepts!(
        BOOL,
        INT2,
        INT4,
        INT8,
        FLOAT4,
        FLOAT8,
        TEXT,
        VARCHAR,
        DATE,
        TIMESTAMP,
        TIMESTAMPTZ
    );
    to_sql_checked!();
}
