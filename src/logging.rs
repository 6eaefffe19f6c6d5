//! Logging.
//!
//! Library diagnostics go through `tracing`; [`init_tracing`] installs a
//! formatting subscriber for binaries and tests that want to see them.
//!
//! Each toolkit additionally owns a [`LogSink`]: the report stream of its
//! engine (capacity overflows, diagnostics, simulation progress), written to
//! standard output or to a file chosen per toolkit.
use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bevy_ecs::prelude::*;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::toolkit::error::{Result, ToolkitError};

const LOG_ENV: &str = "GRIDKIT_LOG";

/// Installs a global fmt subscriber. The filter comes from `GRIDKIT_LOG`,
/// then `RUST_LOG`, then `default_directive`.
pub fn init_tracing(default_directive: &str) -> Result<()> {
    let filter = std::env::var(LOG_ENV)
        .ok()
        .and_then(|d| EnvFilter::try_new(d).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| ToolkitError::Tracing(e.to_string()))
}

/// Where a toolkit's report lines go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SinkTarget {
    #[default]
    Stdout,
    File(PathBuf),
}

impl SinkTarget {
    /// Empty string selects standard output.
    pub fn parse(target: &str) -> Self {
        match target.trim() {
            "" => SinkTarget::Stdout,
            path => SinkTarget::File(PathBuf::from(path)),
        }
    }
}

#[derive(Resource)]
pub struct LogSink {
    target: SinkTarget,
    writer: Box<dyn Write + Send + Sync>,
    pub detailed: bool,
}

impl Default for LogSink {
    fn default() -> Self {
        Self::stdout()
    }
}

impl LogSink {
    pub fn stdout() -> Self {
        Self {
            target: SinkTarget::Stdout,
            writer: Box::new(io::stdout()),
            detailed: false,
        }
    }

    pub fn to_file(path: &Path, append: bool) -> Result<Self> {
        let file: File = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .map_err(|source| ToolkitError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            target: SinkTarget::File(path.to_path_buf()),
            writer: Box::new(file),
            detailed: false,
        })
    }

    /// Opens `target`, falling back to standard output when the file cannot
    /// be created.
    pub fn open(target: &SinkTarget) -> Self {
        match target {
            SinkTarget::Stdout => Self::stdout(),
            SinkTarget::File(path) => Self::to_file(path, false).unwrap_or_else(|err| {
                warn!(%err, "toolkit log falls back to stdout");
                Self::stdout()
            }),
        }
    }

    pub fn target(&self) -> &SinkTarget {
        &self.target
    }

    pub fn report(&mut self, msg: impl Display) {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        if let Err(err) = writeln!(self.writer, "[{stamp}] {msg}") {
            warn!(%err, "toolkit log write failed");
        }
    }

    /// Reported only when detailed logging is switched on.
    pub fn detail(&mut self, msg: impl Display) {
        if self.detailed {
            self.report(msg);
        }
    }

    /// Returns false when buffered lines could not reach the target.
    pub fn flush(&mut self) -> bool {
        match self.writer.flush() {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, target = ?self.target, "toolkit log flush failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sink_appends_or_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tk.log");
        {
            let mut sink = LogSink::to_file(&path, false).unwrap();
            sink.report("first");
            sink.detail("hidden");
            sink.detailed = true;
            sink.detail("shown");
            sink.flush();
        }
        {
            let mut sink = LogSink::to_file(&path, true).unwrap();
            sink.report("second");
            sink.flush();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("] first"));
        assert!(!text.contains("hidden"));
        assert!(text.contains("] shown"));
        assert!(text.contains("] second"));

        LogSink::to_file(&path, false).unwrap().flush();
        assert!(std::fs::read_to_string(&path).unwrap().is_empty());
    }

    struct Unflushable;

    impl Write for Unflushable {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::other("disk gone"))
        }
    }

    #[test]
    fn flush_failures_are_reported_not_swallowed() {
        let mut sink = LogSink {
            target: SinkTarget::File("gone.log".into()),
            writer: Box::new(Unflushable),
            detailed: false,
        };
        sink.report("kept");
        assert!(!sink.flush());
        assert!(LogSink::stdout().flush());
    }

    #[test]
    fn targets_parse() {
        assert_eq!(SinkTarget::parse(""), SinkTarget::Stdout);
        assert_eq!(SinkTarget::parse("a.log"), SinkTarget::File("a.log".into()));
    }
}
