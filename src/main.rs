#![warn(clippy::pedantic)]

use clap::error::ErrorKind;
use clap::Parser;
use indicatif::{MultiProgress, ProgressDrawTarget};
use indicatif_log_bridge::LogWrapper;
use log::{error, info};
use std::error::Error;
use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Instant;

mod cli;
mod ui;

use clusterstats::format::HumanDuration;
use clusterstats::MultiProgressContainer;
use cli::{ColorMode, Options};
use ui::MultiProgressWriter;

fn main_detail(options: &Options) -> Result<(), Box<dyn Error>> {
    let instant = Instant::now();

    let log_style;
    match options.color {
        ColorMode::Never => {
            log_style = "never";
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        }
        ColorMode::Always => {
            log_style = "always";
            console::set_colors_enabled(true);
            console::set_colors_enabled_stderr(true);
        }
        ColorMode::Auto => {
            log_style = "auto";
        }
    }

    let log_level = match options.verbose.log_level_filter() {
        clap_verbosity_flag::LevelFilter::Off => "off",
        clap_verbosity_flag::LevelFilter::Error => "error",
        clap_verbosity_flag::LevelFilter::Warn => "warn",
        clap_verbosity_flag::LevelFilter::Info => "info",
        clap_verbosity_flag::LevelFilter::Debug => "debug",
        clap_verbosity_flag::LevelFilter::Trace => "trace",
    };

    let multi_progress = if options.no_progress {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new()
    };

    let mut output = MultiProgressWriter::new(io::stdout(), multi_progress.clone());

    let env = env_logger::Env::default()
        .filter_or("CLUSTERSTATS_LOG", log_level)
        .write_style_or("CLUSTERSTATS_LOG_STYLE", log_style);

    let logger = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .build();

    LogWrapper::new(multi_progress.clone(), logger).try_init()?;

    let mut multi_progress_container = MultiProgressContainer::new(multi_progress);

    cli::report::report(options, &mut multi_progress_container, &mut output)?;

    // Drop output here - otherwise it is dropped after multi_progress and the progress bars
    // are always cleared on exit.
    output.flush()?;
    drop(output);

    info!("Completed in {}.", HumanDuration(instant.elapsed()));

    Ok(())
}

fn main() -> ExitCode {
    let options = match Options::try_parse() {
        Ok(options) => options,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => error.exit(),
            _ => {
                let _ = error.print();
                return ExitCode::FAILURE;
            }
        },
    };

    if let Err(error) = main_detail(&options) {
        error!("{error}");
        eprintln!("\nUsage: clusterstats [OPTIONS] <LOG_FILE>\n\nFor more information, try '--help'.");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
