//! The append-only game transcript.
//!
//! [`EventLog`] is a write-only, order-preserving sink: one line per
//! broadcast event plus one final winner line. It is created once at process
//! start (which is also when the log directory gets created — nothing happens
//! at import time) and threaded explicitly into the engine. Tests swap the
//! file for an in-memory buffer or [`EventLog::sink`].
//!
//! Each appended line is also mirrored through `tracing` at info level so a
//! console run narrates the game as it happens.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use tracing::info;

/// Name of the transcript file inside the log directory.
pub const LOG_FILE_NAME: &str = "game.log";

/// Append-only transcript sink.
pub struct EventLog {
    writer: Box<dyn Write + Send>,
}

impl EventLog {
    /// Open (creating `dir` if needed) the transcript file in append mode.
    pub fn create(dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE_NAME))?;
        Ok(Self::from_writer(Box::new(file)))
    }

    /// Wrap an arbitrary writer.
    pub fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self { writer }
    }

    /// A transcript that discards everything. Useful in tests.
    pub fn sink() -> Self {
        Self::from_writer(Box::new(io::sink()))
    }

    /// Append one line, flushing so the transcript survives a crash mid-game.
    pub fn append(&mut self, line: &str) -> io::Result<()> {
        info!("{line}");
        writeln!(self.writer, "{line}")?;
        self.writer.flush()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog").finish_non_exhaustive()
    }
}
