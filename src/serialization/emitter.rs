use std::io::{self, Write};

use crate::profile::SessionSummary;
use crate::sample::Sample;

use super::record::{Record, SampleRecord, SummaryRecord};

/// Single-writer, append-only record stream: one JSON line per sample, in
/// the order samples are handed over, closed by a summary line.
pub struct SampleEmitter<W: Write> {
    out: W,
    emitted: u64,
}

impl<W: Write> SampleEmitter<W> {
    pub fn new(out: W) -> Self {
        Self { out, emitted: 0 }
    }

    pub fn emit(&mut self, sample: &Sample) -> io::Result<()> {
        self.write_record(&Record::Sample(SampleRecord::from(sample)))?;
        self.emitted += 1;
        Ok(())
    }

    /// Number of samples written so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Write the trailing summary, flush, and hand the stream back.
    pub fn finish(mut self, summary: &SessionSummary) -> io::Result<W> {
        self.write_record(&Record::Summary(SummaryRecord::from(summary)))?;
        self.out.flush()?;
        Ok(self.out)
    }

    fn write_record(&mut self, record: &Record) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, record).map_err(io::Error::from)?;
        self.out.write_all(b"\n")
    }
}
