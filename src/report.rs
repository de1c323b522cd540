use log::trace;
use std::io::Write;

use crate::record::JobAccountingRecord;
use crate::Error;

/// Column names of the TSV report.
pub const COLUMNS: [&str; 12] = [
    "SubmitTime",
    "HumanSubmitTime",
    "JobID:JobState:JobName",
    "Node",
    "QueueTime:RunTime:TimeLimit",
    "AvgCPU:MaxCPU:CPULimit",
    "AvgMEM:MaxMEM:MEMLimit",
    "Partition:QOS",
    "Username:Group:Account",
    "Workdir",
    "StdOut",
    "StdErr",
];

/// Sort records into report order.
///
/// Records are ordered by submit time (see `SubmitTime`), and then by job id
/// so that the order does not depend on when each query finished.
///
pub fn sort_records(records: &mut [JobAccountingRecord]) {
    records.sort_by(|a, b| {
        a.submit_time
            .cmp(&b.submit_time)
            .then_with(|| a.job_id.cmp(&b.job_id))
    });
}

/// Write the TSV report.
///
/// The header line is prefixed with `##`. `records` are written in the
/// given order, call `sort_records` first.
///
/// # Errors
/// Returns `Err(Error::IO)` when the output cannot be written.
///
pub fn write_tsv<W: Write>(records: &[JobAccountingRecord], output: &mut W) -> Result<(), Error> {
    trace!("Writing {} TSV rows.", records.len());

    writeln!(output, "##{}", COLUMNS.join("\t"))?;
    for record in records {
        writeln!(output, "{}", record.columns().join("\t"))?;
    }

    Ok(())
}

/// Write the report as a JSON array of records.
///
/// # Errors
/// Returns `Err(Error)` when the records cannot be serialized or written.
///
pub fn write_json<W: Write>(records: &[JobAccountingRecord], output: &mut W) -> Result<(), Error> {
    trace!("Writing {} JSON records.", records.len());

    serde_json::to_writer_pretty(&mut *output, records).map_err(Error::JSONSerialize)?;
    writeln!(output)?;

    Ok(())
}
