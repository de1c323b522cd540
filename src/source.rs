pub mod biowulf;
pub mod command;
pub mod sacct;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::cluster::{Cluster, SourceType};
use crate::scan::JobReference;
use crate::Error;

/// An `AccountingSource` queries the scheduler's job history.
///
/// Production sources run the cluster's accounting tools. Implementations
/// must be safe to call from many threads at once.
///
pub trait AccountingSource: Send + Sync {
    /// Check whether the scheduler has a history record for the job.
    ///
    /// # Returns
    /// The raw text of the history query. A job without history produces
    /// empty text or text containing the cluster's no-accounting marker.
    ///
    /// # Errors
    /// `Err(Error::Interrupted)` when the user interrupted the query. Any
    /// other error means the query could not be completed.
    ///
    fn history_check(&self, job: &JobReference) -> Result<String, Error>;

    /// Get the accounting fields of the job.
    ///
    /// # Returns
    /// Newline separated `key<TAB>value` pairs.
    ///
    /// # Errors
    /// As for `history_check`.
    ///
    fn job_data(&self, job: &JobReference) -> Result<String, Error>;
}

/// Construct the accounting source used on the given cluster.
///
/// # Arguments
/// * `cluster`: The cluster to query.
/// * `timeout`: Maximum time to wait on any single query.
/// * `should_terminate`: Set to true when the user terminates the process.
///
pub fn for_cluster(
    cluster: &Cluster,
    timeout: Duration,
    should_terminate: Arc<AtomicBool>,
) -> Arc<dyn AccountingSource> {
    match cluster.source {
        SourceType::BiowulfTools => Arc::new(biowulf::BiowulfTools::new(timeout, should_terminate)),
        SourceType::Sacct => Arc::new(sacct::Sacct::new(timeout, should_terminate)),
    }
}
