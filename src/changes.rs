//! Change events and the reporter that writes them out.
//!
//! The walk produces [`ChangeEvent`]s synchronously into a bounded queue
//! through a [`ChangeSink`]. One consumer thread (the [`ChangeReporter`])
//! writes them as lines of the form `<change> <entity> <relative path>`,
//! with the root directory rendered as `.`. A full queue blocks the walk;
//! events are never dropped.
//!
//! # Example
//!
//! ```
//! use pathfingerprint::changes::{ChangeEvent, ChangeKind, ChangeSink};
//! use pathfingerprint::catalog::EntityKind;
//!
//! let (sink, stream) = ChangeSink::bounded(16);
//! sink.emit(ChangeEvent::new(EntityKind::Path, ChangeKind::Create, ""));
//! sink.quit();
//!
//! let lines: Vec<String> = stream.map(|e| e.to_string()).collect();
//! assert_eq!(lines, vec!["create path ."]);
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::JoinHandle;

use crate::catalog::EntityKind;

/// Default depth of the reporting queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 1000;

/// Kind of mutation observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl ChangeKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One observed mutation of a file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub entity: EntityKind,
    pub change: ChangeKind,
    /// Relative path; the root directory is the empty string.
    pub rel_path: String,
}

impl ChangeEvent {
    #[must_use]
    pub fn new(entity: EntityKind, change: ChangeKind, rel_path: impl Into<String>) -> Self {
        Self {
            entity,
            change,
            rel_path: rel_path.into(),
        }
    }
}

/// Renders the report line (without the trailing newline).
impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rel_path = if self.rel_path.is_empty() {
            "."
        } else {
            self.rel_path.as_str()
        };
        write!(f, "{} {} {}", self.change, self.entity, rel_path)
    }
}

#[derive(Debug)]
enum Message {
    Change(ChangeEvent),
    Quit,
}

/// Producer side of the reporting queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ChangeSink {
    tx: SyncSender<Message>,
}

impl ChangeSink {
    /// Create a bounded queue of the given depth.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, ChangeStream) {
        let (tx, rx) = mpsc::sync_channel(capacity);
        (Self { tx }, ChangeStream { rx })
    }

    /// Queue one event, blocking while the queue is full.
    pub fn emit(&self, event: ChangeEvent) {
        log::debug!("Catalog change: {event}");
        if self.tx.send(Message::Change(event)).is_err() {
            log::warn!("Change reporter has gone away; event not reported");
        }
    }

    /// Tell the consumer that no more events follow.
    pub fn quit(&self) {
        let _ = self.tx.send(Message::Quit);
    }
}

/// Consumer side of the reporting queue.
///
/// Iterates events in emission order until the quit signal arrives or every
/// sink has been dropped.
#[derive(Debug)]
pub struct ChangeStream {
    rx: Receiver<Message>,
}

impl Iterator for ChangeStream {
    type Item = ChangeEvent;

    fn next(&mut self) -> Option<ChangeEvent> {
        match self.rx.recv() {
            Ok(Message::Change(event)) => Some(event),
            Ok(Message::Quit) | Err(_) => None,
        }
    }
}

/// Where change lines are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportDestination {
    /// The standard error stream (`-` on the command line).
    Stderr,
    /// A file, created or truncated.
    File(PathBuf),
}

impl FromStr for ReportDestination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err("Report destination cannot be empty".to_string()),
            "-" => Ok(Self::Stderr),
            other => Ok(Self::File(PathBuf::from(other))),
        }
    }
}

impl fmt::Display for ReportDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stderr => f.write_str("<stderr>"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Counts of report lines written and lost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub written: usize,
    pub failed: usize,
}

/// Background consumer writing change lines.
#[derive(Debug)]
pub struct ChangeReporter {
    sink: ChangeSink,
    handle: JoinHandle<ReportSummary>,
}

impl ChangeReporter {
    /// Open the destination and start the consumer thread.
    ///
    /// # Errors
    ///
    /// Fails if the report file cannot be created or the thread cannot start.
    pub fn spawn(destination: &ReportDestination, capacity: usize) -> io::Result<Self> {
        let out: Box<dyn Write + Send> = match destination {
            ReportDestination::Stderr => Box::new(io::stderr()),
            ReportDestination::File(path) => Box::new(BufWriter::new(File::create(path)?)),
        };

        let (sink, stream) = ChangeSink::bounded(capacity);
        let handle = std::thread::Builder::new()
            .name("change-reporter".to_string())
            .spawn(move || write_events(stream, out))?;

        log::debug!("Reporter running, writing to {destination}");
        Ok(Self { sink, handle })
    }

    /// A producer handle for the walk.
    #[must_use]
    pub fn sink(&self) -> ChangeSink {
        self.sink.clone()
    }

    /// Signal quit, wait for the consumer to drain the queue, and return
    /// its summary.
    pub fn finish(self) -> ReportSummary {
        self.sink.quit();
        match self.handle.join() {
            Ok(summary) => summary,
            Err(_) => {
                log::error!("Change reporter thread panicked");
                ReportSummary::default()
            }
        }
    }
}

/// Drain `stream` into `out`, one line per event.
///
/// Each line is flushed before it counts as written. A failed write is
/// logged and counted; the remaining events are still attempted.
pub fn write_events<W: Write>(stream: ChangeStream, mut out: W) -> ReportSummary {
    let mut summary = ReportSummary::default();

    for event in stream {
        match writeln!(out, "{event}").and_then(|()| out.flush()) {
            Ok(()) => summary.written += 1,
            Err(e) => {
                log::warn!("Could not write change report line [{event}]: {e}");
                summary.failed += 1;
            }
        }
    }

    log::debug!(
        "Reporter terminating: {} written, {} failed",
        summary.written,
        summary.failed
    );
    summary
}
