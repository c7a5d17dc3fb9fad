//! practice-migrate - Legacy Practice-Management Data Migration
//!
//! A one-shot pipeline that moves a practice-management dataset from a
//! legacy SQLite export into a cloud Postgres instance, via human-readable
//! JSONL artifacts, with batch loading and post-load verification.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌───────────────────┐     ┌──────────────────┐
//! │  Legacy export   │     │  JSONL artifacts  │     │   Destination    │
//! │    (SQLite)      │────▶│  export/<T>.jsonl │────▶│ (Postgres, or a  │
//! │                  │     │  legacy column    │     │ SQLite rehearsal │
//! │  read in key     │     │  names preserved  │     │    database)     │
//! │  order, table    │     └───────────────────┘     └──────────────────┘
//! │  by table        │        extract                   load (batched,
//! └──────────────────┘                                  dependency order)
//!                                                              │
//!                                                              ▼
//!                                                        verify (counts +
//!                                                        sentinel sweep)
//! ```
//!
//! Tables load strictly in foreign-key dependency order (appointment
//! types, employees, time periods, clients, rates, appointments) and the
//! destination is cleared in reverse order first. All value normalization
//! - the legacy year-zero sentinel date, 0/1 booleans, oversized external
//! identifiers - is centralized in [`transform`] so every table gets
//! identical treatment.
//!
//! # Example
//!
//! ```bash
//! # Extract the legacy export, then load and verify against Postgres
//! practice-migrate extract --source legacy.db --expect Employee=42
//! practice-migrate load --database-url postgresql://user@host/practice
//! practice-migrate verify
//!
//! # Or everything at once, against a local rehearsal database
//! practice-migrate run --source legacy.db --database-url rehearsal.db
//! ```

pub mod config;
pub mod dest;
pub mod error;
pub mod extract;
pub mod load;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod tables;
pub mod transform;
pub mod verify;

pub use config::{CliArgs, CountMismatchPolicy, DestUrl, MigrateConfig, Stage};
pub use error::{MigrateError, Result};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use tables::{Table, LOAD_ORDER};
