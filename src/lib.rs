pub(crate) mod builtin;
pub mod accounting;
pub mod cluster;
pub mod format;
pub mod gather;
pub mod progress_styles;
pub mod record;
pub mod report;
pub mod scan;
pub mod source;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget};
use std::io;
use std::path::PathBuf;
use std::sync::mpsc;

use crate::record::JobAccountingRecord;

/// Submit time reported for jobs without accounting data.
pub const NOT_ACCOUNTABLE: &str = "JOBNOTACCOUNTABLE";

/// Default phrase marking a workflow log line that reports an external job id.
pub const DEFAULT_SUBMIT_MARKER: &str = "with external jobid";

/// Default phrase in the history check output that marks a job without accounting data.
pub const DEFAULT_NO_ACCOUNTING_MARKER: &str = "No accounting";

/// Default number of seconds to wait on a single accounting query.
pub const DEFAULT_QUERY_TIMEOUT: u64 = 60;

pub const MIN_PROGRESS_BAR_SIZE: usize = 1;

/// Hold a MultiProgress and all of its progress bars.
///
/// This is necessary because a dropped ProgressBar will be automatically
/// removed from MultiProgress (https://github.com/console-rs/indicatif/issues/614)
///
pub struct MultiProgressContainer {
    pub progress_bars: Vec<ProgressBar>,
    pub multi_progress: MultiProgress,
}

impl MultiProgressContainer {
    pub fn new(multi_progress: MultiProgress) -> Self {
        Self {
            progress_bars: Vec::new(),
            multi_progress,
        }
    }

    /// Add a progress bar, hiding it when `hide` is true.
    pub fn add_or_hide(&mut self, mut progress: ProgressBar, hide: bool) -> ProgressBar {
        if hide {
            progress.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            progress = self.multi_progress.add(progress);
            self.progress_bars.push(progress.clone());
        }

        progress
    }
}

/// Errors that may be encountered when using the clusterstats crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    // OS errors
    #[error("OS error")]
    OS(#[from] nix::errno::Errno),

    #[error("No home directory")]
    NoHome(),

    // IO errors
    #[error("I/O error: {0}")]
    IO(#[from] io::Error),

    #[error("Unable to read '{0}': {1}")]
    FileRead(PathBuf, #[source] io::Error),

    #[error("Unable to read the workflow log '{0}': {1}")]
    LogRead(PathBuf, #[source] io::Error),

    // serialization errors
    #[error("Unable to parse '{0}'.\n{1}")]
    TOMLParse(PathBuf, #[source] toml::de::Error),

    #[error("Cluster '{1}' in '{0}' sets an empty '{2}'.")]
    EmptyClusterMarker(PathBuf, String, String),

    #[error("Unable to serialize the report: {0}")]
    JSONSerialize(#[source] serde_json::Error),

    // query errors
    #[error("Unable to spawn '{0}': {1}.")]
    SpawnProcess(String, #[source] io::Error),

    #[error("'{0}' failed: {1}.")]
    QueryFailed(String, String),

    #[error("'{0}' did not complete within {1} seconds.")]
    QueryTimeout(String, u64),

    #[error("Unexpected output from {0}: {1}")]
    UnexpectedOutput(String, String),

    #[error("The submit marker must not be empty.")]
    EmptySubmitMarker,

    #[error("Interrupted")]
    Interrupted,

    // cluster errors
    #[error(
        "Cluster '{0}' not found: check the names in clusters.toml or the built-in clusters."
    )]
    ClusterNameNotFound(String),

    #[error("No cluster found: execute with -vvv to see why.")]
    ClusterNotFound(),

    // thread errors
    #[error("Unexpected error communicating between threads in 'gather_records'.")]
    GatherRecordsSend(#[from] mpsc::SendError<JobAccountingRecord>),
}
