// Copyright (c) 2024 The Regents of the University of Michigan.
// Part of clusterstats, released under the BSD 3-Clause License.

use indicatif::{ProgressState, ProgressStyle};
use std::fmt::Write;

use crate::format::HumanDuration;

pub(crate) const STEADY_TICK: u64 = 110;

/// Format progress duration in milliseconds
fn elapsed(state: &ProgressState, w: &mut dyn Write) {
    let _ = write!(w, "{:#}", HumanDuration(state.elapsed()));
}

/// Create a progress bar that counts queried jobs.
///
/// # Panics
/// When the progress style is invalid.
///
pub fn counted_bar() -> ProgressStyle {
    ProgressStyle::with_template(
        "|{bar:32.green}| {msg:.bold}: {human_pos}/{human_len} ({elapsed:.dim})",
    )
    .expect("Valid template")
    .with_key("elapsed", elapsed)
    .progress_chars("█▉▊▋▌▍▎▏  ")
}
