//! Common CLI options shared across commands.
//!
//! This module provides shared argument structures that can be composed into
//! command structs using `#[command(flatten)]`.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use pkgq_lib::pipeline::queue::{
    DEFAULT_AID_LOW_WATER_BYTES, DEFAULT_AID_MAX_SIZE_RATIO, DEFAULT_AID_NEAR_FULL_SLACK,
};
use pkgq_lib::pipeline::{AidPolicy, DEFAULT_QUEUE_CAPACITY, PipelineConfig};
use pkgq_lib::validation::{validate_positive, validate_ratio};

/// Tuning for the two-thread formatting pipeline.
#[derive(Debug, Clone, Args)]
pub struct PipelineOptions {
    /// Number of records held between reading and output
    #[arg(long = "queue-capacity", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Bytes of unformatted records the reading thread always leaves for the worker
    #[arg(long = "aid-low-water", default_value_t = DEFAULT_AID_LOW_WATER_BYTES)]
    pub aid_low_water: usize,

    /// Free queue slots tolerated before the reading thread helps format
    #[arg(long = "aid-near-full-slack", default_value_t = DEFAULT_AID_NEAR_FULL_SLACK)]
    pub aid_near_full_slack: usize,

    /// Largest record the reading thread takes early, as a multiple of the average size
    #[arg(long = "aid-max-size-ratio", default_value_t = DEFAULT_AID_MAX_SIZE_RATIO)]
    pub aid_max_size_ratio: f64,

    /// Only help format when the queue is full
    #[arg(long = "no-aid", default_value = "false")]
    pub no_aid: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            aid_low_water: DEFAULT_AID_LOW_WATER_BYTES,
            aid_near_full_slack: DEFAULT_AID_NEAR_FULL_SLACK,
            aid_max_size_ratio: DEFAULT_AID_MAX_SIZE_RATIO,
            no_aid: false,
        }
    }
}

impl PipelineOptions {
    /// Validates the option values.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero queue capacity or a non-positive size ratio.
    pub fn validate(&self) -> Result<()> {
        validate_positive(self.queue_capacity, "queue-capacity")?;
        validate_ratio(self.aid_max_size_ratio, "aid-max-size-ratio")?;
        Ok(())
    }

    /// Builds the pipeline configuration.
    #[must_use]
    pub fn to_config(&self) -> PipelineConfig {
        PipelineConfig {
            queue_capacity: self.queue_capacity,
            aid: AidPolicy {
                enabled: !self.no_aid,
                low_water_bytes: self.aid_low_water,
                near_full_slack: self.aid_near_full_slack,
                max_size_ratio: self.aid_max_size_ratio,
            },
        }
    }
}

/// Output destination option.
#[derive(Debug, Clone, Default, Args)]
pub struct OutputOptions {
    /// Output file (stdout if omitted or '-')
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

impl OutputOptions {
    /// Opens the output for buffered writing.
    ///
    /// # Errors
    ///
    /// Returns an error if the output file cannot be created.
    pub fn open(&self) -> Result<Box<dyn Write + Send>> {
        match self.output.as_deref() {
            Some(path) if path != Path::new("-") => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create output: {}", path.display()))?;
                Ok(Box::new(BufWriter::new(file)))
            }
            _ => Ok(Box::new(BufWriter::new(io::stdout()))),
        }
    }

    /// Human-readable name of the output.
    #[must_use]
    pub fn describe(&self) -> String {
        self.output.as_ref().map_or_else(|| "stdout".to_string(), |p| p.display().to_string())
    }
}
