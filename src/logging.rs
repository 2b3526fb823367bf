//! Log setup: `[YYYY-MM-DD HH:MM:SS] message` to stdout and an optional file
//!
//! The filter defaults to `info` and follows `RUST_LOG`. The file is opened
//! in append mode and never rotated.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Timestamp layout of every log line
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Writes every log line to stdout and, if open, to a file
pub struct LogSink {
    file: Option<File>,
}

impl LogSink {
    pub fn new(file: Option<File>) -> Self {
        Self { file }
    }

    /// Open `path` for appending
    pub fn append_to(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        Ok(Self::new(Some(file)))
    }
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // File errors are dropped; stdout still gets the line
        if let Some(file) = self.file.as_mut() {
            let _ = file.write_all(buf);
        }
        io::stdout().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
        io::stdout().flush()
    }
}

/// Format one record the way every sink receives it
pub fn format_line(timestamp: &str, message: &std::fmt::Arguments<'_>) -> String {
    format!("[{}] {}", timestamp, message)
}

/// Install the global logger. A log file that cannot be opened is reported
/// on stderr and logging continues on stdout alone.
pub fn init(file: Option<&Path>) {
    let sink = match file.map(LogSink::append_to).transpose() {
        Ok(sink) => sink.unwrap_or_else(|| LogSink::new(None)),
        Err(e) => {
            eprintln!("{:#}", e);
            LogSink::new(None)
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
            writeln!(buf, "{}", format_line(&timestamp, record.args()))
        })
        .target(env_logger::Target::Pipe(Box::new(sink)))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_line_format() {
        let line = format_line("2024-03-09 12:34:56", &format_args!("Worker started (PID {})", 42));
        assert_eq!(line, "[2024-03-09 12:34:56] Worker started (PID 42)");
    }

    #[test]
    fn test_timestamp_layout() {
        let stamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        assert!(NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT).is_ok());
        assert_eq!(stamp.len(), 19);
    }

    #[test]
    fn test_sink_appends_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("failsafe.log");
        fs::write(&path, "[2024-01-01 00:00:00] earlier\n").unwrap();

        let mut sink = LogSink::append_to(&path).unwrap();
        sink.write_all(b"[2024-01-01 00:00:01] later\n").unwrap();
        sink.flush().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "[2024-01-01 00:00:00] earlier\n[2024-01-01 00:00:01] later\n");
    }

    #[test]
    fn test_unwritable_log_path() {
        let dir = tempdir().unwrap();
        let err = LogSink::append_to(&dir.path().join("missing/failsafe.log")).err().unwrap();
        assert!(format!("{:#}", err).contains("missing/failsafe.log"));
    }
}
