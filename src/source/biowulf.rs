// Copyright (c) 2024 The Regents of the University of Michigan.
// Part of clusterstats, released under the BSD 3-Clause License.

use log::debug;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::scan::JobReference;
use crate::source::command::run_with_timeout;
use crate::source::AccountingSource;
use crate::Error;

/// The `BiowulfTools` source queries the NIH Biowulf accounting utilities.
///
/// `jobhist <id>` reports "No accounting information" for jobs it does not
/// know, and `jobdata <id>` prints one `key<TAB>value` pair per line.
///
pub struct BiowulfTools {
    timeout: Duration,
    should_terminate: Arc<AtomicBool>,
}

impl BiowulfTools {
    pub fn new(timeout: Duration, should_terminate: Arc<AtomicBool>) -> Self {
        Self {
            timeout,
            should_terminate,
        }
    }
}

impl AccountingSource for BiowulfTools {
    fn history_check(&self, job: &JobReference) -> Result<String, Error> {
        debug!("Checking the history of job '{job}' with jobhist.");
        run_with_timeout(
            "jobhist",
            &[job.as_str()],
            self.timeout,
            &self.should_terminate,
        )
    }

    fn job_data(&self, job: &JobReference) -> Result<String, Error> {
        debug!("Reading the accounting data of job '{job}' with jobdata.");
        run_with_timeout(
            "jobdata",
            &[job.as_str()],
            self.timeout,
            &self.should_terminate,
        )
    }
}
