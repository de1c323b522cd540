use console::style;
use log::{debug, info, warn};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use std::error::Error;
use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::{Options, ReportFormat};
use clusterstats::cluster;
use clusterstats::{gather, report, scan, source, MultiProgressContainer};

/// Gather accounting data for the jobs in the workflow log and write the report.
pub fn report<W: Write>(
    options: &Options,
    multi_progress: &mut MultiProgressContainer,
    output: &mut W,
) -> Result<(), Box<dyn Error>> {
    debug!("Reporting on jobs in '{}'.", options.log_file.display());

    let cluster = cluster::Configuration::open()?.identify(options.cluster.as_deref())?;

    let marker = options
        .marker
        .as_deref()
        .unwrap_or_else(|| cluster.submit_marker());
    let jobs = scan::scan_log(&options.log_file, marker)?;

    if jobs.is_empty() {
        warn!(
            "No lines in '{}' contain '{marker}'.",
            options.log_file.display()
        );
    } else {
        info!("Found {} submitted jobs.", jobs.len());
    }

    // Install the Ctrl-C signal handler to gracefully stop running queries.
    // Allow the user to force an immediate shutdown with a 2nd Ctrl-C.
    let should_terminate = Arc::new(AtomicBool::new(false));
    flag::register_conditional_shutdown(SIGINT, 10, Arc::clone(&should_terminate))?;
    flag::register(SIGINT, Arc::clone(&should_terminate))?;
    flag::register_conditional_shutdown(SIGTERM, 10, Arc::clone(&should_terminate))?;
    flag::register(SIGTERM, Arc::clone(&should_terminate))?;

    let timeout = Duration::from_secs(options.timeout.unwrap_or_else(|| cluster.timeout()));
    let source = source::for_cluster(&cluster, timeout, Arc::clone(&should_terminate));

    let total = jobs.len();
    let mut records = gather::gather_records(
        source,
        jobs.into_iter().collect(),
        cluster.no_accounting_marker(),
        options.threads,
        should_terminate,
        multi_progress,
    )
    .get()?;

    report::sort_records(&mut records);

    let not_accountable = records.iter().filter(|r| !r.is_accountable()).count();
    if not_accountable > 0 {
        warn!(
            "{} of {total} jobs have no accounting data.",
            style(not_accountable).yellow().bold()
        );
    } else if total > 0 {
        info!("All {total} jobs have accounting data.");
    }

    match options.format {
        ReportFormat::Tsv => report::write_tsv(&records, output)?,
        ReportFormat::Json => report::write_json(&records, output)?,
    }

    Ok(())
}
