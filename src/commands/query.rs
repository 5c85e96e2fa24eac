//! Query package lists with an RPM-style query format.
//!
//! Reads the RPM headers in one or more package lists, in order, and writes one
//! rendering of the query format per package. Rendering runs on two threads while
//! the output keeps the input order.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use pkgq_lib::errors::PkgqError;
use pkgq_lib::logging::{OperationTimer, format_count, log_pipeline_summary};
use pkgq_lib::pipeline::QueryPipeline;
use pkgq_lib::pkglist::{is_stdin_path, open_pkglist};
use pkgq_lib::progress::{DEFAULT_PROGRESS_INTERVAL, ProgressTracker};
use pkgq_lib::queryformat::QueryFormat;
use pkgq_lib::rpmheader::RpmDecoder;
use pkgq_lib::validation::{validate_inputs_exist, validate_single_stdin};

use crate::commands::command::Command;
use crate::commands::common::{OutputOptions, PipelineOptions};

/// Query package lists.
#[derive(Debug, Parser)]
#[command(
    name = "query",
    about = "\x1b[36mRender every package in package lists through a query format\x1b[0m",
    long_about = r#"
Render every package in one or more package lists through an RPM-style query format.

Package lists are read in the order given; '-' (the default) reads stdin. Gzip-compressed
package lists are detected and decompressed. The format is rendered once per package with
no separator added, so it usually ends in '\n'.

Format syntax:
  %{TAG}            tag value; "(none)" if the package lacks the tag
  %-20{TAG}         value padded to 20 columns (left-aligned with '-')
  %{=TAG} %{#TAG}   first element / number of elements
  %{TAG:hex}        also :octal and :shescape
  [...]             repeat once per element of the arrays referenced inside
  %|TAG?{a}:{b}|    'a' if the package has TAG, otherwise 'b'

Run 'pkgq querytags' for the list of tag names.

Example usage:
  pkgq query '%{NAME}-%{VERSION}-%{RELEASE}\n' pkglist.classic
  pkgq query '[%{NAME} %{REQUIRENAME}\n]' base/pkglist.*.gz -o requires.txt
  zcat pkglist.classic.gz | pkgq query '%{NAME}\t%{SIZE}\n'
"#
)]
pub struct Query {
    /// Query format
    #[arg(value_name = "FORMAT")]
    pub format: String,

    /// Package lists to read ('-' for stdin)
    #[arg(value_name = "PKGLIST", default_value = "-")]
    pub inputs: Vec<PathBuf>,

    /// Output options
    #[command(flatten)]
    pub output: OutputOptions,

    /// Pipeline tuning options
    #[command(flatten)]
    pub pipeline: PipelineOptions,

    /// Log progress every N packages
    #[arg(long = "progress-interval", default_value_t = DEFAULT_PROGRESS_INTERVAL)]
    pub progress_interval: u64,
}

impl Query {
    fn validate(&self) -> Result<()> {
        validate_single_stdin(&self.inputs)?;
        validate_inputs_exist(&self.inputs, "Package list")?;
        if self.inputs.iter().any(is_stdin_path) && io::stdin().is_terminal() {
            return Err(PkgqError::InvalidParameter {
                parameter: "PKGLIST".to_string(),
                reason: "refusing to read binary data from a terminal".to_string(),
            }
            .into());
        }
        self.pipeline.validate()
    }

    fn submit_inputs(
        &self,
        pipeline: &mut QueryPipeline<Box<dyn Write + Send>, RpmDecoder, QueryFormat>,
        progress: &ProgressTracker,
    ) -> Result<()> {
        for input in &self.inputs {
            let reader = open_pkglist(input)
                .with_context(|| format!("Failed to open package list: {}", input.display()))?;
            let mut records = 0u64;
            for blob in reader {
                pipeline.submit(blob?)?;
                records += 1;
                progress.log_if_needed(1);
            }
            info!("Read {} packages from {}", format_count(records), input.display());
        }
        Ok(())
    }
}

impl Command for Query {
    fn execute(&self, _command_line: &str) -> Result<()> {
        self.validate()?;

        let format = QueryFormat::parse(&self.format).map_err(|e| PkgqError::InvalidParameter {
            parameter: "FORMAT".to_string(),
            reason: e.to_string(),
        })?;

        let timer = OperationTimer::new("Querying packages");
        info!("Inputs: {}", self.inputs.len());
        info!("Output: {}", self.output.describe());
        info!("Queue capacity: {}", self.pipeline.queue_capacity);

        let sink = self.output.open()?;
        let mut pipeline =
            QueryPipeline::new(&self.pipeline.to_config(), RpmDecoder, format, sink)?;
        let progress = ProgressTracker::new("Read packages").with_interval(self.progress_interval);

        // An unreadable input stops the run at once: dropping the unfinished
        // pipeline discards whatever is still queued.
        if let Err(e) = self.submit_inputs(&mut pipeline, &progress) {
            drop(pipeline);
            return Err(e);
        }
        let outcome = pipeline.finish()?;
        progress.log_final();

        log_pipeline_summary(&outcome.stats);
        timer.log_completion(outcome.stats.records_written);
        Ok(())
    }
}
