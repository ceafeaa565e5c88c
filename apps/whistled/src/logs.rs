use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use tracing_subscriber::fmt::MakeWriter;
use whistle_core::proto::LogLine;
use whistle_utils::now_millis;

/// Bounded ring of the daemon's own log lines, served to `whistlectl logs`.
#[derive(Clone)]
pub struct LogStore {
    inner: Arc<Mutex<LogState>>,
}

struct LogState {
    lines: VecDeque<LogLine>,
    max_lines: usize,
}

impl LogStore {
    pub fn new(max_lines: usize) -> Self {
        let max_lines = max_lines.max(100);
        Self {
            inner: Arc::new(Mutex::new(LogState {
                lines: VecDeque::with_capacity(max_lines.min(1024)),
                max_lines,
            })),
        }
    }

    pub fn push(&self, line: String) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        while guard.lines.len() >= guard.max_lines {
            guard.lines.pop_front();
        }
        guard.lines.push_back(LogLine {
            at_ms: now_millis(),
            line,
        });
    }

    /// Last `lines` entries, oldest first, and whether older ones were cut.
    pub fn tail(&self, lines: usize) -> (Vec<LogLine>, bool) {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let count = lines.min(guard.lines.len());
        let skip = guard.lines.len() - count;
        (guard.lines.iter().skip(skip).cloned().collect(), skip > 0)
    }

    pub fn writer(&self) -> LogWriterFactory {
        LogWriterFactory { store: self.clone() }
    }
}

pub struct LogWriterFactory {
    store: LogStore,
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            store: self.store.clone(),
            buffer: Vec::new(),
        }
    }
}

/// Tees formatted output to stdout and the store, one entry per line.
pub struct LogWriter {
    store: LogStore,
    buffer: Vec<u8>,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.trim_end_matches('\n');
            if !line.trim().is_empty() {
                self.store.push(line.to_string());
            }
        }

        io::stdout().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}
