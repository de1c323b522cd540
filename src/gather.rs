// Copyright (c) 2024 The Regents of the University of Michigan.
// Part of clusterstats, released under the BSD 3-Clause License.

use indicatif::ProgressBar;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::accounting;
use crate::record::JobAccountingRecord;
use crate::scan::JobReference;
use crate::source::AccountingSource;
use crate::{progress_styles, Error, MultiProgressContainer, MIN_PROGRESS_BAR_SIZE};

/// Accounting records being gathered.
///
/// Call `get()` to wait for all pending threads to complete and return the result.
///
pub struct PendingRecords {
    /// Threads querying the accounting source.
    threads: Vec<JoinHandle<Result<(), Error>>>,

    /// Channel to receive results from worker threads.
    receiver: Receiver<JobAccountingRecord>,

    /// Progress bar.
    progress: ProgressBar,

    /// Set when the user terminates the process.
    should_terminate: Arc<AtomicBool>,
}

/// Gather the accounting records of the given jobs.
///
/// `gather_records` spawns threads that query `source` and then returns
/// immediately. Calling `get` on the result waits for the threads to complete
/// and provides one record per job.
///
/// # Arguments
/// * `source` - The accounting source to query.
/// * `jobs` - The jobs to query.
/// * `no_accounting_marker` - History check text that marks jobs without accounting.
/// * `threads` - Number of queries to run at the same time.
/// * `should_terminate` - Stop querying when set.
///
/// # Panics
/// When unable to spawn threads.
///
pub fn gather_records(
    source: Arc<dyn AccountingSource>,
    jobs: Vec<JobReference>,
    no_accounting_marker: &str,
    threads: u16,
    should_terminate: Arc<AtomicBool>,
    multi_progress: &mut MultiProgressContainer,
) -> PendingRecords {
    let mut progress = ProgressBar::new(jobs.len() as u64).with_message("Querying accounting");
    progress = multi_progress.add_or_hide(progress, jobs.len() < MIN_PROGRESS_BAR_SIZE);
    progress.set_style(progress_styles::counted_bar());
    progress.enable_steady_tick(Duration::from_millis(progress_styles::STEADY_TICK));

    if !jobs.is_empty() {
        debug!("Querying accounting data for {} jobs.", jobs.len());
    }

    let threads = threads.clamp(1, u16::try_from(jobs.len()).unwrap_or(u16::MAX).max(1));
    let jobs_mutex = Arc::new(Mutex::new(jobs));
    let (sender, receiver) = mpsc::channel();

    let mut handles = Vec::with_capacity(threads as usize);

    for i in 0..threads {
        let source = Arc::clone(&source);
        let jobs_mutex = Arc::clone(&jobs_mutex);
        let sender = sender.clone();
        let progress = progress.clone();
        let should_terminate = Arc::clone(&should_terminate);
        let no_accounting_marker = no_accounting_marker.to_string();

        let thread_name = format!("gather-records-{i}");
        let handle = thread::Builder::new()
            .name(thread_name)
            .spawn(move || -> Result<(), Error> {
                loop {
                    if should_terminate.load(Ordering::Relaxed) {
                        break Ok(());
                    }

                    // Pull the next job to query off the shared stack.
                    let job = {
                        let mut jobs = jobs_mutex.lock().unwrap();
                        match jobs.pop() {
                            Some(job) => job,
                            None => break Ok(()),
                        }
                    };

                    let accounting =
                        accounting::fetch(source.as_ref(), &job, &no_accounting_marker)?;
                    sender.send(JobAccountingRecord::from(&accounting))?;

                    progress.inc(1);
                }
            });

        handles.push(handle.expect("Should be able to spawn threads."));
    }

    PendingRecords {
        threads: handles,
        receiver,
        progress,
        should_terminate,
    }
}

impl PendingRecords {
    /// Get the accounting records.
    ///
    /// The records are in no particular order.
    ///
    /// # Errors
    /// Returns `Err(Error::Interrupted)` when the user interrupted the queries.
    ///
    /// # Panics
    /// This method should not panic.
    ///
    pub fn get(self) -> Result<Vec<JobAccountingRecord>, Error> {
        let mut result = Vec::new();
        for record in &self.receiver {
            result.push(record);
        }

        for handle in self.threads {
            handle.join().expect("The thread should not panic")?;
        }

        self.progress.finish();

        if self.should_terminate.load(Ordering::Relaxed) {
            return Err(Error::Interrupted);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use indicatif::{MultiProgress, ProgressDrawTarget};
    use serial_test::parallel;
    use std::collections::HashSet;

    use super::*;
    use crate::accounting::tests::{FakeSource, Script};
    use crate::record::SubmitTime;
    use crate::DEFAULT_NO_ACCOUNTING_MARKER;

    fn setup() -> MultiProgressContainer {
        MultiProgressContainer::new(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()))
    }

    fn gather(
        source: FakeSource,
        ids: &[&str],
        threads: u16,
    ) -> Result<Vec<JobAccountingRecord>, Error> {
        let mut multi_progress = setup();
        gather_records(
            Arc::new(source),
            ids.iter().map(|id| JobReference::new(*id)).collect(),
            DEFAULT_NO_ACCOUNTING_MARKER,
            threads,
            Arc::new(AtomicBool::new(false)),
            &mut multi_progress,
        )
        .get()
    }

    #[test]
    #[parallel]
    fn one_record_per_job() {
        let mut source = FakeSource::default();
        let ids: Vec<String> = (0..100).map(|i| format!("{}", 1000 + i)).collect();
        for (i, id) in ids.iter().enumerate() {
            if i % 3 == 0 {
                source = source.with_job(id, "No accounting information available", "");
            } else {
                let data = format!("submit_time\t{}\n", 1_700_000_000 + i);
                source = source.with_job(id, "history", &data);
            }
        }
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

        let records = gather(source, &id_refs, 8).unwrap();
        assert_eq!(records.len(), 100);

        let found: HashSet<&str> = records.iter().map(|r| r.job_id.as_str()).collect();
        assert_eq!(found.len(), 100);
        assert_eq!(records.iter().filter(|r| !r.is_accountable()).count(), 34);
    }

    #[test]
    #[parallel]
    fn failures_are_isolated() {
        let source = FakeSource::default()
            .with_job("1", "history", "submit_time\t1700000000\nstate\tCOMPLETED\n");
        // Job "2" is unknown to the fake source: its queries fail.
        let records = gather(source, &["1", "2"], 2).unwrap();
        assert_eq!(records.len(), 2);

        let one = records.iter().find(|r| r.job_id.as_str() == "1").unwrap();
        assert_eq!(one.submit_time, SubmitTime::Epoch(1_700_000_000));
        let two = records.iter().find(|r| r.job_id.as_str() == "2").unwrap();
        assert_eq!(two.submit_time, SubmitTime::NotAccountable);
    }

    #[test]
    #[parallel]
    fn no_jobs() {
        let records = gather(FakeSource::default(), &[], 8).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    #[parallel]
    fn zero_threads() {
        let source = FakeSource::default().with_job("1", "history", "state\tRUNNING\n");
        let records = gather(source, &["1"], 0).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    #[parallel]
    fn interrupted_query() {
        let mut source = FakeSource::default().with_job("1", "history", "state\tRUNNING\n");
        source.jobs.insert(
            "2".into(),
            Script {
                interrupt: true,
                ..Script::default()
            },
        );

        assert!(matches!(
            gather(source, &["1", "2"], 1),
            Err(Error::Interrupted)
        ));
    }

    #[test]
    #[parallel]
    fn terminate_flag() {
        let mut multi_progress = setup();
        let source = FakeSource::default().with_job("1", "history", "state\tRUNNING\n");
        let result = gather_records(
            Arc::new(source),
            vec![JobReference::new("1")],
            DEFAULT_NO_ACCOUNTING_MARKER,
            1,
            Arc::new(AtomicBool::new(true)),
            &mut multi_progress,
        )
        .get();

        assert!(matches!(result, Err(Error::Interrupted)));
    }
}
