//! Stage orchestration
//!
//! Wires the extractor, loader and verifier together according to the
//! configured stage. Database connections are constructed here, injected
//! into each component, and released when the stage's scope ends, success
//! or failure. There is no resume: aborting mid-load leaves the
//! destination partially loaded, and the clear pass at the start of the
//! next load is the recovery path.

use crate::config::{MigrateConfig, Stage};
use crate::dest;
use crate::error::{ConfigError, Result};
use crate::extract::{ExtractReport, SourceDb};
use crate::load::{read_artifact, LoadReport, Loader};
use crate::progress::{self, TableProgress};
use crate::tables::LOAD_ORDER;
use crate::verify::{self, VerifyReport};
use std::time::Instant;
use tracing::info;

/// The migration pipeline: extract -> load -> verify
pub struct Pipeline {
    config: MigrateConfig,
}

impl Pipeline {
    pub fn new(config: MigrateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MigrateConfig {
        &self.config
    }

    /// Execute the configured stage(s)
    pub fn run(&self) -> Result<PipelineOutcome> {
        match self.config.stage {
            Stage::Extract => Ok(PipelineOutcome {
                extract: Some(self.run_extract()?),
                load: None,
                verify: None,
            }),
            Stage::Load => Ok(PipelineOutcome {
                extract: None,
                load: Some(self.run_load()?),
                verify: None,
            }),
            Stage::Verify => Ok(PipelineOutcome {
                extract: None,
                load: None,
                verify: Some(self.run_verify()?),
            }),
            Stage::Run => {
                let extract = self.run_extract()?;
                let load = self.run_load()?;
                let verify = self.run_verify()?;
                Ok(PipelineOutcome {
                    extract: Some(extract),
                    load: Some(load),
                    verify: Some(verify),
                })
            }
        }
    }

    /// Extract every legacy table into JSONL artifacts
    pub fn run_extract(&self) -> Result<ExtractReport> {
        let source_path = self
            .config
            .source
            .as_ref()
            .ok_or(ConfigError::MissingSource)?;

        info!(source = %source_path.display(), "extracting");
        let source = SourceDb::open(source_path)?;
        let report = source.extract_all(
            &self.config.export_dir,
            &self.config.expected_counts,
            self.config.on_count_mismatch,
        )?;

        if self.config.show_progress {
            progress::print_extract_summary(&report);
        }
        Ok(report)
    }

    /// Clear the destination and load every artifact in dependency order
    pub fn run_load(&self) -> Result<LoadReport> {
        let url = self
            .config
            .dest_url
            .as_ref()
            .ok_or(ConfigError::MissingDatabaseUrl)?;

        info!(destination = %url.display(), "loading");
        let started = Instant::now();
        let mut dest = dest::connect(url)?;
        let mut loader = Loader::new(dest.as_mut(), self.config.batch_size);

        loader.clear_all()?;

        let mut report = LoadReport::default();
        for table in LOAD_ORDER {
            let spec = table.spec();
            let artifact = crate::extract::artifact_path(&self.config.export_dir, spec);
            let records = read_artifact(&artifact)?;

            let bar = self
                .config
                .show_progress
                .then(|| TableProgress::new(spec.dest_name, records.len() as u64));

            let outcome = loader.load_table(table, &records, bar.as_ref())?;

            if let Some(bar) = bar {
                if outcome.is_clean() {
                    bar.finish("done");
                } else {
                    bar.finish(&format!("{} batches failed", outcome.batches_failed));
                }
            }
            report.tables.push(outcome);
        }

        if self.config.show_progress {
            progress::print_load_summary(&report, started.elapsed());
        }
        Ok(report)
    }

    /// Verify destination row counts and sweep for leftover sentinel dates
    pub fn run_verify(&self) -> Result<VerifyReport> {
        let url = self
            .config
            .dest_url
            .as_ref()
            .ok_or(ConfigError::MissingDatabaseUrl)?;

        info!(destination = %url.display(), "verifying");
        let mut dest = dest::connect(url)?;
        let report = verify::verify(dest.as_mut())?;

        if self.config.show_progress {
            progress::print_verify_summary(&report);
        }
        Ok(report)
    }
}

/// Everything a run produced, for the caller to inspect
#[derive(Debug)]
pub struct PipelineOutcome {
    pub extract: Option<ExtractReport>,
    pub load: Option<LoadReport>,
    pub verify: Option<VerifyReport>,
}

impl PipelineOutcome {
    /// True when nothing failed: no failed batches, no stale dates
    pub fn is_clean(&self) -> bool {
        self.load.as_ref().map_or(true, LoadReport::is_clean)
            && self.verify.as_ref().map_or(true, VerifyReport::is_clean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CountMismatchPolicy;
    use std::path::PathBuf;

    #[test]
    fn test_extract_without_source_reports_missing_source() {
        let config = MigrateConfig {
            stage: Stage::Extract,
            source: None,
            export_dir: PathBuf::from("export"),
            dest_url: None,
            batch_size: 1000,
            expected_counts: Vec::new(),
            on_count_mismatch: CountMismatchPolicy::Abort,
            show_progress: false,
            verbose: false,
        };

        let err = Pipeline::new(config).run().unwrap_err();
        assert!(err.to_string().contains("No legacy export configured"));
    }
}
