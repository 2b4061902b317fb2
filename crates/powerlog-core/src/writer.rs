//! Batch-buffered CSV row writer.
//!
//! The header is written and flushed as soon as the writer is created. Rows
//! accumulate in memory and go out in a single write once the batch is full.
//! [`RowWriter::finish`] flushes whatever remains; if the writer is dropped on
//! any other exit path, `Drop` performs that final flush instead.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Rows buffered before a write.
pub const DEFAULT_BATCH_SIZE: usize = 50;

pub struct RowWriter<W: Write> {
    inner: Option<W>,
    buffer: Vec<String>,
    batch_size: usize,
    rows_written: u64,
}

impl RowWriter<BufWriter<File>> {
    /// Create (truncate) `path` and write the header.
    pub fn create(path: &Path, header: &str, batch_size: usize) -> io::Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), header, batch_size)
    }
}

impl<W: Write> RowWriter<W> {
    /// Wrap `inner`, writing and flushing `header` immediately.
    pub fn new(mut inner: W, header: &str, batch_size: usize) -> io::Result<Self> {
        inner.write_all(format!("{header}\n").as_bytes())?;
        inner.flush()?;
        let batch_size = batch_size.max(1);
        Ok(Self {
            inner: Some(inner),
            buffer: Vec::with_capacity(batch_size),
            batch_size,
            rows_written: 0,
        })
    }

    /// Buffer one line (without trailing newline); write the batch when full.
    pub fn append(&mut self, line: String) -> io::Result<()> {
        self.buffer.push(line);
        if self.buffer.len() >= self.batch_size {
            self.flush_buffer()?;
        }
        Ok(())
    }

    /// Write every buffered line in one write and flush the target.
    ///
    /// The buffer is cleared before writing, so a failed write is not
    /// retried by a later flush.
    pub fn flush_buffer(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let Some(inner) = self.inner.as_mut() else {
            return Ok(());
        };
        let lines = std::mem::take(&mut self.buffer);
        let mut chunk = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
        for line in &lines {
            chunk.push_str(line);
            chunk.push('\n');
        }
        inner.write_all(chunk.as_bytes())?;
        inner.flush()?;
        self.rows_written += lines.len() as u64;
        self.buffer = lines;
        self.buffer.clear();
        Ok(())
    }

    /// Rows currently held in memory.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Rows already handed to the output target.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Final flush; returns the underlying target.
    pub fn finish(mut self) -> io::Result<W> {
        self.flush_buffer()?;
        let mut inner = self
            .inner
            .take()
            .ok_or_else(|| io::Error::other("row writer already finished"))?;
        inner.flush()?;
        Ok(inner)
    }
}

impl<W: Write> Drop for RowWriter<W> {
    fn drop(&mut self) {
        let pending = self.buffer.len();
        if self.inner.is_some() && pending > 0 {
            if let Err(e) = self.flush_buffer() {
                log::error!("final flush of {pending} row(s) failed: {e}");
            }
        }
    }
}
