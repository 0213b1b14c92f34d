//! Incremental rendering of cumulative streamed text.

use std::io::{self, Write};

/// Emits only the newly appended part of each cumulative observation.
///
/// Holds the number of bytes already written. Text that is not longer than
/// what was written, or that does not split cleanly at the held length,
/// produces nothing.
#[derive(Debug, Default, Clone)]
pub struct IncrementalRenderer {
    emitted: usize,
}

impl IncrementalRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes emitted so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// The suffix of `text` not yet emitted, if any.
    pub fn next_suffix<'a>(&mut self, text: &'a str) -> Option<&'a str> {
        if text.len() <= self.emitted {
            return None;
        }
        let suffix = text.get(self.emitted..)?;
        self.emitted = text.len();
        Some(suffix)
    }

    /// Write the new suffix of `text` to `out` and flush.
    ///
    /// Returns the number of bytes written.
    pub fn write_suffix<W: Write>(&mut self, text: &str, out: &mut W) -> io::Result<usize> {
        match self.next_suffix(text) {
            Some(suffix) => {
                out.write_all(suffix.as_bytes())?;
                out.flush()?;
                Ok(suffix.len())
            }
            None => Ok(0),
        }
    }
}
