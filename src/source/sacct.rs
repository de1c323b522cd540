// Copyright (c) 2024 The Regents of the University of Michigan.
// Part of clusterstats, released under the BSD 3-Clause License.

use chrono::{Local, NaiveDateTime, TimeZone};
use log::debug;
use std::fmt::Write as _;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::scan::JobReference;
use crate::source::command::run_with_timeout;
use crate::source::AccountingSource;
use crate::Error;

/// Field separator requested from `sacct`.
///
/// `--parsable2` does not escape its delimiter inside values, and job names
/// and paths may contain the default `|`.
///
const DELIMITER: &str = "\x1f";

/// Timestamp format of `sacct` with the default `SLURM_TIME_FORMAT`.
const SACCT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// `sacct` fields to request and the accounting keys they map to.
///
/// `Submit` and `Start` are handled separately: they produce `submit_time`
/// and `queued`.
///
const FIELDS: [(&str, &str); 16] = [
    ("JobIDRaw", "jobid"),
    ("State", "state"),
    ("JobName", "job_name"),
    ("NodeList", "node_list"),
    ("Submit", "submit_time"),
    ("Start", "start"),
    ("Elapsed", "elapsed"),
    ("Timelimit", "time_limit"),
    ("AllocCPUS", "cpus"),
    ("ReqMem", "mem"),
    ("Partition", "partition"),
    ("QOS", "qos"),
    ("User", "username"),
    ("Group", "groupname"),
    ("Account", "account"),
    ("WorkDir", "work_dir"),
];

/// The `Sacct` source queries the generic Slurm accounting database with `sacct`.
///
/// Only the job allocation is queried (`-X`), so per-step usage such as
/// average and maximum memory is not reported.
///
pub struct Sacct {
    timeout: Duration,
    should_terminate: Arc<AtomicBool>,
}

impl Sacct {
    pub fn new(timeout: Duration, should_terminate: Arc<AtomicBool>) -> Self {
        Self {
            timeout,
            should_terminate,
        }
    }

    fn query(&self, job: &JobReference, format: &str) -> Result<String, Error> {
        run_with_timeout(
            "sacct",
            &[
                "--jobs",
                job.as_str(),
                "--allocations",
                "--noheader",
                "--parsable2",
                "--format",
                format,
                "--delimiter",
                DELIMITER,
            ],
            self.timeout,
            &self.should_terminate,
        )
    }
}

impl AccountingSource for Sacct {
    fn history_check(&self, job: &JobReference) -> Result<String, Error> {
        debug!("Checking the history of job '{job}' with sacct.");
        // sacct prints nothing for jobs it does not know.
        self.query(job, "JobIDRaw")
    }

    fn job_data(&self, job: &JobReference) -> Result<String, Error> {
        debug!("Reading the accounting data of job '{job}' with sacct.");
        let format = FIELDS.map(|(field, _)| field).join(",");
        let output = self.query(job, &format)?;

        match output.lines().find(|line| !line.trim().is_empty()) {
            Some(line) => convert_row(line),
            None => Ok(String::new()),
        }
    }
}

/// Convert a local `sacct` timestamp to seconds since the epoch.
fn parse_time(value: &str) -> Option<i64> {
    let naive = NaiveDateTime::parse_from_str(value, SACCT_TIME_FORMAT).ok()?;
    Some(Local.from_local_datetime(&naive).earliest()?.timestamp())
}

/// Format seconds the way Slurm prints durations: `[D-]HH:MM:SS`.
pub(crate) fn format_duration(seconds: i64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let seconds = seconds % 60;

    if days > 0 {
        format!("{days}-{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

/// Convert one `--parsable2` row into `key<TAB>value` lines.
///
/// Delimiters beyond the expected field count are kept in `WorkDir`, the
/// last field.
///
/// # Errors
/// Returns `Err(Error::UnexpectedOutput)` when the row has fewer values than
/// requested fields.
///
pub(crate) fn convert_row(line: &str) -> Result<String, Error> {
    let values: Vec<&str> = line.splitn(FIELDS.len(), DELIMITER).collect();
    if values.len() != FIELDS.len() {
        return Err(Error::UnexpectedOutput("sacct".into(), line.into()));
    }

    let mut result = String::with_capacity(line.len() * 2);
    let mut submit = None;
    let mut start = None;

    for ((field, key), value) in FIELDS.iter().zip(values) {
        match *field {
            "Submit" => {
                submit = parse_time(value);
                match submit {
                    Some(epoch) => {
                        let _ = writeln!(result, "{key}\t{epoch}");
                    }
                    None => {
                        let _ = writeln!(result, "{key}\t{value}");
                    }
                }
            }
            "Start" => start = parse_time(value),
            _ => {
                let _ = writeln!(result, "{key}\t{value}");
            }
        }
    }

    // Jobs that never started have no queue time.
    if let (Some(submit), Some(start)) = (submit, start) {
        if start >= submit {
            let _ = writeln!(result, "queued\t{}", format_duration(start - submit));
        }
    }

    Ok(result)
}
