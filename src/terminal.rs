//! Terminal setup for running LC-3 programs interactively.
use crossterm::terminal;
use log::error;
use std::io;
use std::io::Write;

/// Restores the terminal from raw mode when dropped.
#[derive(Debug)]
pub struct RawLock {
    enabled: bool,
}

impl Drop for RawLock {
    fn drop(&mut self) {
        if !self.enabled {
            return;
        }
        // terminal stays in raw mode but no means to repair
        if let Err(e) = terminal::disable_raw_mode() {
            error!("Error resetting terminal {e}");
        }
    }
}

impl RawLock {
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Set terminal to raw mode, i.e. without line buffering and echo, in best-effort mode.
///
/// Failure is only logged since stdin may not be a terminal, e.g. for piped input.
#[must_use]
pub fn set_terminal_raw() -> RawLock {
    match terminal::enable_raw_mode() {
        Ok(()) => RawLock { enabled: true },
        Err(e) => {
            error!("Could not set terminal to raw mode: {e}");
            RawLock { enabled: false }
        }
    }
}

/// Output for a terminal in raw mode where `\n` does not return the carriage any more.
#[derive(Debug)]
pub struct RawModeWriter<W: Write> {
    inner: W,
}

impl<W: Write> RawModeWriter<W> {
    pub const fn new(inner: W) -> Self {
        Self { inner }
    }
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for RawModeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for (idx, part) in buf.split(|b| *b == b'\n').enumerate() {
            if idx > 0 {
                self.inner.write_all(b"\r\n")?;
            }
            self.inner.write_all(part)?;
        }
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;

    #[gtest]
    fn test_raw_mode_writer_returns_carriage() -> googletest::Result<()> {
        let mut sut = RawModeWriter::new(Vec::new());
        write!(sut, "\nProgram halted\n")?;
        sut.write_all(b"ab")?;
        sut.flush()?;
        let written = String::from_utf8(sut.into_inner())?;
        expect_that!(written, eq("\r\nProgram halted\r\nab"));
        Ok(())
    }
}
