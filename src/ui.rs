use indicatif::MultiProgress;
use memchr::memmem;
use std::io::{self, Write};

/// The default writer buffer size.
const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Buffered writer that interoperates with a `MultiProgress`.
///
/// The report goes to stdout while progress bars draw on stderr. Complete
/// lines are written with the `MultiProgress` suspended so that a terminal
/// showing both streams never mixes a partial row with a progress bar.
///
pub struct MultiProgressWriter<T: Write> {
    inner: T,
    multi_progress: MultiProgress,
    buffer: Vec<u8>,
}

impl<T: Write> MultiProgressWriter<T> {
    /// Create a new writer.
    ///
    /// # Arguments
    /// * `inner`: Writer to forward output to.
    /// * `multi_progress`: The `MultiProgress` to suspend when writing.
    ///
    pub fn new(inner: T, multi_progress: MultiProgress) -> Self {
        Self {
            inner,
            multi_progress,
            buffer: Vec::with_capacity(DEFAULT_BUFFER_SIZE),
        }
    }

    /// Write all complete lines in the buffer to the inner writer.
    fn write_lines(&mut self) -> io::Result<()> {
        if let Some(last_newline) = memmem::rfind(&self.buffer, b"\n") {
            let lines = &self.buffer[0..=last_newline];
            let inner = &mut self.inner;
            self.multi_progress
                .suspend(|| -> io::Result<()> { inner.write_all(lines) })?;
            self.buffer.drain(0..=last_newline);
        }
        Ok(())
    }
}

impl<T: Write> Write for MultiProgressWriter<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.buffer.len() >= DEFAULT_BUFFER_SIZE {
            self.write_lines()?;
        }

        self.buffer.extend_from_slice(buf);

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.write_lines()?;
        self.inner.flush()
    }
}

impl<T: Write> Drop for MultiProgressWriter<T> {
    fn drop(&mut self) {
        // Write any trailing partial line as well.
        if !self.buffer.is_empty() {
            let _ = self.write_lines();
            let _ = self.inner.write_all(&self.buffer);
            let _ = self.inner.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use indicatif::ProgressDrawTarget;

    use super::*;

    #[test]
    fn complete_lines() {
        let multi_progress = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        let mut output = Vec::new();
        {
            let mut writer = MultiProgressWriter::new(&mut output, multi_progress);
            write!(writer, "a\tb\nc").unwrap();
            writer.flush().unwrap();
            assert_eq!(writer.buffer, b"c");
            writeln!(writer, "\td").unwrap();
        }
        assert_eq!(output, b"a\tb\nc\td\n");
    }
}
