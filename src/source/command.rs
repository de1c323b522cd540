// Copyright (c) 2024 The Regents of the University of Michigan.
// Part of clusterstats, released under the BSD 3-Clause License.

use log::{debug, error, trace};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::io::Read;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::Error;

/// How often to check a running query for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Read everything from `stream` on a separate thread.
///
/// Reading on a thread keeps a child with large output from blocking on a
/// full pipe while the caller polls for its exit.
///
fn read_to_end<R: Read + Send + 'static>(mut stream: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = stream.read_to_end(&mut buffer);
        buffer
    })
}

fn describe_failure(status: ExitStatus) -> String {
    match status.code() {
        None => match status.signal() {
            None => "terminated by an unknown signal".to_string(),
            Some(signal) => format!("terminated by signal {signal}"),
        },
        Some(code) => format!("exited with code {code}"),
    }
}

/// Execute an accounting query and capture its standard output.
///
/// # Arguments
/// * `program`: The executable to run (searched on `PATH`).
/// * `args`: Arguments to pass.
/// * `timeout`: Kill the process when it runs longer than this.
/// * `should_terminate`: Interrupt the process when set.
///
/// # Errors
/// * `Error::SpawnProcess` when the program cannot be launched.
/// * `Error::QueryFailed` when it exits with a non-zero status.
/// * `Error::QueryTimeout` when it does not complete within `timeout`.
/// * `Error::Interrupted` when `should_terminate` is set while it runs.
///
pub fn run_with_timeout(
    program: &str,
    args: &[&str],
    timeout: Duration,
    should_terminate: &AtomicBool,
) -> Result<String, Error> {
    if should_terminate.load(Ordering::Relaxed) {
        return Err(Error::Interrupted);
    }

    trace!("Executing '{program} {}'.", args.join(" "));

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::SpawnProcess(program.into(), e))?;

    let stdout = read_to_end(child.stdout.take().expect("Piped stdout"));
    let stderr = read_to_end(child.stderr.take().expect("Piped stderr"));

    let instant = Instant::now();
    let status = loop {
        if should_terminate.load(Ordering::Relaxed) {
            error!("Interrupted! Stopping '{program}'.");
            #[allow(clippy::cast_possible_wrap)]
            signal::kill(Pid::from_raw(child.id() as i32), Signal::SIGINT)?;
            let _ = child.wait();
            return Err(Error::Interrupted);
        }

        if instant.elapsed() >= timeout {
            debug!(
                "'{program} {}' did not complete within {} seconds, stopping it.",
                args.join(" "),
                timeout.as_secs()
            );
            child
                .kill()
                .map_err(|e| Error::SpawnProcess(program.into(), e))?;
            let _ = child.wait();
            // The reader threads are left to finish on their own: orphaned
            // grandchildren may still hold the pipes open.
            return Err(Error::QueryTimeout(program.into(), timeout.as_secs()));
        }

        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(Error::SpawnProcess(program.into(), e)),
        }
    };

    let stdout = stdout.join().expect("The thread should not panic");
    let stderr = stderr.join().expect("The thread should not panic");

    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr);
        let mut message = describe_failure(status);
        if !stderr.trim().is_empty() {
            message.push_str(": ");
            message.push_str(stderr.trim());
        }
        return Err(Error::QueryFailed(program.into(), message));
    }

    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use serial_test::parallel;

    use super::*;

    fn run(args: &[&str], timeout: u64) -> Result<String, Error> {
        run_with_timeout(
            "sh",
            args,
            Duration::from_secs(timeout),
            &AtomicBool::new(false),
        )
    }

    #[test]
    #[parallel]
    fn output() {
        let output = run(&["-c", "printf 'state\\tCOMPLETED\\n'"], 10).unwrap();
        assert_eq!(output, "state\tCOMPLETED\n");
    }

    #[test]
    #[parallel]
    fn failure() {
        let result = run(&["-c", "echo oops >&2; exit 3"], 10);
        match result {
            Err(Error::QueryFailed(program, message)) => {
                assert_eq!(program, "sh");
                assert!(message.contains("exited with code 3"));
                assert!(message.contains("oops"));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    #[parallel]
    fn timeout() {
        let instant = Instant::now();
        let result = run(&["-c", "exec sleep 30"], 1);
        assert!(matches!(result, Err(Error::QueryTimeout(_, 1))));
        assert!(instant.elapsed() < Duration::from_secs(20));
    }

    #[test]
    #[parallel]
    fn missing_program() {
        let result = run_with_timeout(
            "clusterstats-not-a-program",
            &[],
            Duration::from_secs(1),
            &AtomicBool::new(false),
        );
        assert!(matches!(result, Err(Error::SpawnProcess(_, _))));
    }

    #[test]
    #[parallel]
    fn interrupted_before_start() {
        let result = run_with_timeout("true", &[], Duration::from_secs(1), &AtomicBool::new(true));
        assert!(matches!(result, Err(Error::Interrupted)));
    }
}
