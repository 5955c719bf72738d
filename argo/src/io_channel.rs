//! I/O channel
//!
//! A single-producer/single-consumer line queue routing daemon-received
//! user input to an executor process, plus a line-buffered append-only log
//! sink for executor output (spec.md §4.3). Modeled on the Notify-based
//! coordination pattern used for shutdown signaling elsewhere in this
//! codebase, adapted to buffered line transport instead of a single flag.

use crate::error::{ArgoError, Result};
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

/// Read-side poll delay and retry budget (spec.md §4.3).
const POLL_DELAY_MS: u64 = 50;
const POLL_MAX_ATTEMPTS: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Success,
    WouldBlock,
    Eof,
}

/// In-memory input queue, filled by the daemon's `/input/{id}` handler and
/// drained by the executor process's stdin-equivalent reads.
#[derive(Debug, Default)]
pub struct InputQueue {
    lines: Mutex<VecDeque<String>>,
    closed: Mutex<bool>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(VecDeque::new()),
            closed: Mutex::new(false),
        }
    }

    /// Enqueue a line of input (FIFO).
    pub async fn push(&self, line: String) -> Result<()> {
        if *self.closed.lock().await {
            return Err(ArgoError::Eof);
        }
        self.lines.lock().await.push_back(line);
        Ok(())
    }

    /// Non-blocking single attempt: returns the next queued line, or
    /// `WouldBlock` if the queue is empty, or `Eof` if closed and empty.
    pub async fn try_read(&self) -> (ReadOutcome, Option<String>) {
        let mut lines = self.lines.lock().await;
        if let Some(line) = lines.pop_front() {
            return (ReadOutcome::Success, Some(line));
        }
        drop(lines);
        if *self.closed.lock().await {
            (ReadOutcome::Eof, None)
        } else {
            (ReadOutcome::WouldBlock, None)
        }
    }

    /// Poll until a line arrives, the channel closes, or the attempt
    /// budget is exhausted (returns `WouldBlock` in that last case).
    pub async fn read_blocking(&self) -> Result<String> {
        for _ in 0..POLL_MAX_ATTEMPTS {
            match self.try_read().await {
                (ReadOutcome::Success, Some(line)) => return Ok(line),
                (ReadOutcome::Eof, _) => return Err(ArgoError::Eof),
                (ReadOutcome::WouldBlock, _) => {
                    sleep(Duration::from_millis(POLL_DELAY_MS)).await;
                }
                _ => unreachable!(),
            }
        }
        Err(ArgoError::WouldBlock)
    }

    pub async fn close(&self) {
        *self.closed.lock().await = true;
    }
}

/// Append-only line-buffered output sink, backing the log file an
/// `argo attach` client tails.
pub struct OutputSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl OutputSink {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: Mutex::new(None),
        }
    }

    async fn ensure_open(&self) -> Result<()> {
        let mut guard = self.file.lock().await;
        if guard.is_none() {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            *guard = Some(f);
        }
        Ok(())
    }

    pub async fn write_line(&self, line: &str) -> Result<()> {
        self.ensure_open().await?;
        let mut guard = self.file.lock().await;
        let f = guard.as_mut().expect("ensure_open just populated this");
        f.write_all(line.as_bytes()).await?;
        f.write_all(b"\n").await?;
        f.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_fifo_ordering() {
        let q = InputQueue::new();
        q.push("first".into()).await.unwrap();
        q.push("second".into()).await.unwrap();
        assert_eq!(q.read_blocking().await.unwrap(), "first");
        assert_eq!(q.read_blocking().await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_try_read_would_block_on_empty() {
        let q = InputQueue::new();
        let (outcome, line) = q.try_read().await;
        assert_eq!(outcome, ReadOutcome::WouldBlock);
        assert!(line.is_none());
    }

    #[tokio::test]
    async fn test_closed_queue_yields_eof() {
        let q = InputQueue::new();
        q.close().await;
        let (outcome, _) = q.try_read().await;
        assert_eq!(outcome, ReadOutcome::Eof);
        assert!(q.push("late".into()).await.is_err());
    }

    #[tokio::test]
    async fn test_output_sink_appends_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.log");
        let sink = OutputSink::new(path.clone());
        sink.write_line("hello").await.unwrap();
        sink.write_line("world").await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, "hello\nworld\n");
    }
}
