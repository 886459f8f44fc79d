//! Record-oriented output datasets.
//!
//! Object files are written as a sequence of records, grouped into
//! files (one per module), ending with an end-of-data marker.  On
//! disk every record is preceded by a control word giving its length;
//! end-of-file and end-of-data are control words of their own.
use std::io::Write;

use tracing::{event, Level};

use super::types::{IoAction, IoFailed, IoTarget};

/// Control word preceding each record.  The low bits hold the record
/// length in words.
pub const CONTROL_RECORD: u64 = 0x8 << 60;
/// Control word marking the end of a file.
pub const CONTROL_EOF: u64 = 0xE << 60;
/// Control word marking the end of the data.
pub const CONTROL_EOD: u64 = 0xF << 60;
/// Selects the kind of a control word.
pub const CONTROL_MASK: u64 = 0xF << 60;

/// A sink for object records.
pub trait Dataset {
    /// Append words to the current record.
    ///
    /// # Errors
    ///
    /// When the underlying output fails.
    fn write(&mut self, words: &[u64]) -> Result<(), IoFailed>;

    /// End the current record.
    ///
    /// # Errors
    ///
    /// When the underlying output fails.
    fn write_eor(&mut self) -> Result<(), IoFailed>;

    /// End the current file.
    ///
    /// # Errors
    ///
    /// When the underlying output fails.
    fn write_eof(&mut self) -> Result<(), IoFailed>;

    /// Mark the end of the data.
    ///
    /// # Errors
    ///
    /// When the underlying output fails.
    fn write_eod(&mut self) -> Result<(), IoFailed>;

    /// Flush everything written so far.
    ///
    /// # Errors
    ///
    /// When the underlying output fails.
    fn close(&mut self) -> Result<(), IoFailed>;
}

/// A dataset written to a byte stream as big-endian words.
#[derive(Debug)]
pub struct BlockedDataset<W: Write> {
    inner: W,
    target: IoTarget,
    pending: Vec<u64>,
}

impl<W: Write> BlockedDataset<W> {
    pub fn new(inner: W, target: IoTarget) -> BlockedDataset<W> {
        BlockedDataset {
            inner,
            target,
            pending: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn fail(&self, error: std::io::Error) -> IoFailed {
        IoFailed {
            action: IoAction::Write,
            target: self.target.clone(),
            error,
        }
    }

    fn put_word(&mut self, word: u64) -> Result<(), IoFailed> {
        self.inner
            .write_all(&word.to_be_bytes())
            .map_err(|e| self.fail(e))
    }
}

impl<W: Write> Dataset for BlockedDataset<W> {
    fn write(&mut self, words: &[u64]) -> Result<(), IoFailed> {
        self.pending.extend_from_slice(words);
        Ok(())
    }

    fn write_eor(&mut self) -> Result<(), IoFailed> {
        let record = std::mem::take(&mut self.pending);
        event!(Level::TRACE, "writing record of {} words", record.len());
        self.put_word(CONTROL_RECORD | record.len() as u64)?;
        for word in record {
            self.put_word(word)?;
        }
        Ok(())
    }

    fn write_eof(&mut self) -> Result<(), IoFailed> {
        if !self.pending.is_empty() {
            self.write_eor()?;
        }
        self.put_word(CONTROL_EOF)
    }

    fn write_eod(&mut self) -> Result<(), IoFailed> {
        if !self.pending.is_empty() {
            self.write_eor()?;
        }
        self.put_word(CONTROL_EOD)
    }

    fn close(&mut self) -> Result<(), IoFailed> {
        self.inner.flush().map_err(|e| self.fail(e))
    }
}

/// A dataset held in memory.
pub type MemoryDataset = BlockedDataset<Vec<u8>>;

impl MemoryDataset {
    #[must_use]
    pub fn in_memory() -> MemoryDataset {
        BlockedDataset::new(Vec::new(), IoTarget::Memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framing() {
        let mut ds = MemoryDataset::in_memory();
        ds.write(&[1, 2]).expect("write");
        ds.write_eor().expect("eor");
        ds.write_eof().expect("eof");
        ds.write_eod().expect("eod");
        ds.close().expect("close");
        let bytes = ds.into_inner();
        let words: Vec<u64> = bytes
            .chunks_exact(8)
            .map(|c| u64::from_be_bytes(c.try_into().expect("8 bytes")))
            .collect();
        assert_eq!(words, vec![CONTROL_RECORD | 2, 1, 2, CONTROL_EOF, CONTROL_EOD]);
    }
}
