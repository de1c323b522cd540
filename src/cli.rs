// Copyright (c) 2024 The Regents of the University of Michigan.
// Part of clusterstats, released under the BSD 3-Clause License.

pub mod report;

use clap::builder::NonEmptyStringValueParser;
use clap::{Parser, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::path::PathBuf;

/// Summarize the scheduler accounting records of the jobs a workflow run submitted.
///
/// `clusterstats` scans LOG_FILE for the external job ids that the workflow
/// engine submitted, queries the cluster's accounting history for each job,
/// and prints a TSV report sorted by submit time.
///
/// Jobs without accounting data are reported with the submit time
/// JOBNOTACCOUNTABLE and sort after all other jobs.
///
/// EXAMPLES
///
/// * Report on a Snakemake run:
///
///   clusterstats .snakemake/log/2024-01-01T000000.000000.snakemake.log > stats.tsv
///
/// * Report on a cluster without Biowulf's accounting tools:
///
///   clusterstats --cluster=none snakemake.log
///
#[derive(Parser, Debug)]
#[command(version, about, long_about)]
pub struct Options {
    /// The workflow log to scan for submitted jobs.
    pub log_file: PathBuf,

    /// Number of accounting queries to run at the same time.
    #[arg(long, default_value_t=8 as u16, env="CLUSTERSTATS_THREADS", display_order=2)]
    pub threads: u16,

    /// Seconds to wait on a single accounting query [default: 60].
    #[arg(long, env = "CLUSTERSTATS_TIMEOUT", display_order = 2)]
    pub timeout: Option<u64>,

    /// Phrase that marks submission lines in the log [default: with external jobid].
    #[arg(long, value_parser = NonEmptyStringValueParser::new(), display_order = 2)]
    pub marker: Option<String>,

    /// Format of the report.
    #[arg(long, value_enum, default_value_t=ReportFormat::Tsv, display_order=2)]
    pub format: ReportFormat,

    /// Query accounting data on the given cluster.
    ///
    /// Autodetected by default.
    #[arg(long, env = "CLUSTERSTATS_CLUSTER", display_order = 2)]
    pub cluster: Option<String>,

    /// When to print colored output.
    #[arg(long, value_name="WHEN", value_enum, default_value_t=ColorMode::Auto, env="CLUSTERSTATS_COLOR", display_order=2)]
    pub color: ColorMode,

    /// Disable progress bars.
    #[arg(long, env = "CLUSTERSTATS_NO_PROGRESS", display_order = 2)]
    pub no_progress: bool,

    #[command(flatten)]
    pub verbose: Verbosity<WarnLevel>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum ColorMode {
    /// Automatically detect when to print colored output.
    Auto,

    /// Always print colored output.
    Always,

    /// Never print colored output.
    Never,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Tab separated values with a `##` header line.
    Tsv,

    /// A JSON array of records.
    Json,
}
