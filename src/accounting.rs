// Copyright (c) 2024 The Regents of the University of Michigan.
// Part of clusterstats, released under the BSD 3-Clause License.

use log::{debug, trace, warn};
use std::collections::HashMap;

use crate::scan::JobReference;
use crate::source::AccountingSource;
use crate::Error;

/// Key/value accounting fields reported by the scheduler for one job.
///
/// Keys are passed through verbatim from the accounting tool. Lookups of
/// absent keys return an empty string.
///
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawAccounting {
    fields: HashMap<String, String>,
}

/// The result of querying the accounting history of one job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Accounting {
    /// The scheduler has no usable accounting data for the job.
    NotAccountable { job: JobReference, reason: String },

    /// The scheduler reported accounting fields for the job.
    Accountable {
        job: JobReference,
        fields: RawAccounting,
    },
}

impl RawAccounting {
    /// Parse the output of a job data query.
    ///
    /// Each line must hold exactly one `key<TAB>value` pair. Other lines are
    /// continuation or noise lines from the accounting tool and are skipped.
    ///
    pub fn parse(text: &str) -> Self {
        let mut fields = HashMap::new();
        let mut skipped = 0;

        for line in text.lines() {
            let mut parts = line.split('\t');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(value), None) => {
                    fields.insert(key.to_string(), value.to_string());
                }
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            trace!("Skipped {skipped} malformed accounting line(s).");
        }

        Self { fields }
    }

    /// Get the value of a field, or `""` when the scheduler did not report it.
    pub fn get(&self, key: &str) -> &str {
        self.fields.get(key).map_or("", String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawAccounting {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Accounting {
    pub fn job(&self) -> &JobReference {
        match self {
            Accounting::NotAccountable { job, .. } | Accounting::Accountable { job, .. } => job,
        }
    }

    pub fn is_accountable(&self) -> bool {
        matches!(self, Accounting::Accountable { .. })
    }
}

/// Query the accounting history of a single job.
///
/// The history check runs first. When its output is empty or contains
/// `no_accounting_marker`, the job is not accountable. Otherwise the job
/// data query provides the accounting fields.
///
/// Query failures (missing tools, non-zero exit codes, empty output,
/// timeouts) make the job not accountable. They do not fail the caller.
///
/// # Errors
/// Returns `Err(Error::Interrupted)` when the user interrupted a query.
///
pub fn fetch(
    source: &dyn AccountingSource,
    job: &JobReference,
    no_accounting_marker: &str,
) -> Result<Accounting, Error> {
    let not_accountable = |reason: String| -> Result<Accounting, Error> {
        debug!("Job '{job}' is not accountable: {reason}");
        Ok(Accounting::NotAccountable {
            job: job.clone(),
            reason,
        })
    };

    let history = match source.history_check(job) {
        Ok(history) => history,
        Err(Error::Interrupted) => return Err(Error::Interrupted),
        Err(error) => {
            warn!("Job '{job}' is not accountable: {error}");
            return not_accountable(error.to_string());
        }
    };

    if history.trim().is_empty() {
        return not_accountable("the history check returned no output.".into());
    }
    if history.contains(no_accounting_marker) {
        return not_accountable(format!("the history check reported '{no_accounting_marker}'."));
    }

    let data = match source.job_data(job) {
        Ok(data) => data,
        Err(Error::Interrupted) => return Err(Error::Interrupted),
        Err(error) => {
            warn!("Job '{job}' is not accountable: {error}");
            return not_accountable(error.to_string());
        }
    };

    let fields = RawAccounting::parse(&data);
    if fields.is_empty() {
        return not_accountable("the job data query returned no fields.".into());
    }

    trace!("Job '{job}' has {} accounting fields.", fields.len());
    Ok(Accounting::Accountable {
        job: job.clone(),
        fields,
    })
}
