use log::{debug, trace};
use memchr::memmem;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::Error;

/// An external (scheduler assigned) job identifier found in a workflow log.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct JobReference(String);

impl JobReference {
    /// Clean a raw log token into a job reference.
    ///
    /// Strips the quote and period characters that the workflow engine wraps
    /// around job ids.
    ///
    /// # Returns
    /// `None` when nothing remains after cleaning.
    ///
    pub fn from_token(token: &str) -> Option<Self> {
        let cleaned: String = token.chars().filter(|c| !matches!(c, '\'' | '.')).collect();
        if cleaned.is_empty() {
            None
        } else {
            Some(Self::new(cleaned))
        }
    }

    /// Construct a job reference from an id that is already clean.
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Find the job references in the contents of a workflow log.
///
/// A line is selected when it contains `marker`. The job id is the last
/// whitespace delimited token that follows the marker on that line.
/// An empty `marker` selects no lines.
///
pub fn find_job_references(log: &str, marker: &str) -> BTreeSet<JobReference> {
    let mut result = BTreeSet::new();
    if marker.is_empty() {
        return result;
    }

    let finder = memmem::Finder::new(marker.as_bytes());

    for line in log.lines() {
        let Some(position) = finder.find(line.as_bytes()) else {
            continue;
        };

        let tail = &line[position + marker.len()..];
        match tail.split_whitespace().last().and_then(JobReference::from_token) {
            Some(job) => {
                trace!("Found job '{job}' in line '{line}'.");
                result.insert(job);
            }
            None => trace!("No job id in line '{line}'."),
        }
    }

    result
}

/// Scan a workflow log file for the distinct job references it submitted.
///
/// # Errors
/// * `Err(Error::EmptySubmitMarker)` when `marker` is empty.
/// * `Err(Error::LogRead)` when the file does not exist or cannot be read.
///
pub fn scan_log(path: &Path, marker: &str) -> Result<BTreeSet<JobReference>, Error> {
    if marker.is_empty() {
        return Err(Error::EmptySubmitMarker);
    }

    debug!("Scanning '{}' for submitted jobs.", path.display());

    let bytes = fs::read(path).map_err(|e| Error::LogRead(path.into(), e))?;
    let log = String::from_utf8_lossy(&bytes);
    let jobs = find_job_references(&log, marker);

    debug!("Found {} distinct jobs in '{}'.", jobs.len(), path.display());
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use assert_fs::prelude::*;
    use assert_fs::TempDir;
    use serial_test::parallel;

    use super::*;
    use crate::DEFAULT_SUBMIT_MARKER;

    fn jobs(ids: &[&str]) -> BTreeSet<JobReference> {
        ids.iter().map(|id| JobReference(String::from(*id))).collect()
    }

    #[test]
    #[parallel]
    fn strips_punctuation() {
        let log = "\
Submitted job 1 with external jobid '1001'.
[Tue Nov 14 17:13:20 2023]
rule align:
Submitted job 2 with external jobid 1002'.
";
        assert_eq!(
            find_job_references(log, DEFAULT_SUBMIT_MARKER),
            jobs(&["1001", "1002"])
        );
    }

    #[test]
    #[parallel]
    fn deduplicates() {
        let log = "\
Submitted job 1 with external jobid '1001'.
Submitted job 1 with external jobid '1001'.
Submitted job 3 with external jobid '1003'.
";
        let found = find_job_references(log, DEFAULT_SUBMIT_MARKER);
        assert_eq!(found.len(), 2);
        assert_eq!(found, jobs(&["1001", "1003"]));
    }

    #[test]
    #[parallel]
    fn ignores_other_lines() {
        let log = "\
Building DAG of jobs...
Submitted batch job 42
Job 1 has been submitted with external jobid
Submitted job 4 with external jobid '.'.
";
        assert!(find_job_references(log, DEFAULT_SUBMIT_MARKER).is_empty());
        assert!(find_job_references("", DEFAULT_SUBMIT_MARKER).is_empty());
    }

    #[test]
    #[parallel]
    fn custom_marker() {
        let log = "Submitted batch job 42\nSubmitted batch job 43.\n";
        assert_eq!(
            find_job_references(log, "Submitted batch job"),
            jobs(&["42", "43"])
        );
    }

    #[test]
    #[parallel]
    fn empty_marker() {
        let log = "\
Building DAG of jobs...
rule all:
Submitted job 1 with external jobid '1001'.
";
        assert!(find_job_references(log, "").is_empty());
    }

    #[test]
    #[parallel]
    fn from_token() {
        assert_eq!(
            JobReference::from_token("'1234'."),
            Some(JobReference("1234".into()))
        );
        assert_eq!(JobReference::from_token("'.'"), None);
        assert_eq!(
            JobReference::from_token("1234_5"),
            Some(JobReference("1234_5".into()))
        );
    }

    #[test]
    #[parallel]
    fn scan_file() {
        let temp = TempDir::new().unwrap();
        let log = temp.child("snakemake.log");
        log.write_str("Submitted job 7 with external jobid '700'.\n")
            .unwrap();

        let found = scan_log(log.path(), DEFAULT_SUBMIT_MARKER).unwrap();
        assert_eq!(found, jobs(&["700"]));
    }

    #[test]
    #[parallel]
    fn scan_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = scan_log(&temp.path().join("missing.log"), DEFAULT_SUBMIT_MARKER);
        assert!(matches!(result, Err(Error::LogRead(_, _))));
    }

    #[test]
    #[parallel]
    fn scan_empty_marker() {
        let temp = TempDir::new().unwrap();
        let log = temp.child("snakemake.log");
        log.write_str("rule all:\nSubmitted job 7 with external jobid '700'.\n")
            .unwrap();

        let result = scan_log(log.path(), "");
        assert!(matches!(result, Err(Error::EmptySubmitMarker)));
    }

    #[test]
    #[parallel]
    fn scan_invalid_utf8() {
        let temp = TempDir::new().unwrap();
        let log = temp.child("snakemake.log");
        log.write_binary(b"\xff\xfe noise\nSubmitted job 1 with external jobid '9'.\n")
            .unwrap();

        let found = scan_log(log.path(), DEFAULT_SUBMIT_MARKER).unwrap();
        assert_eq!(found, jobs(&["9"]));
    }
}
