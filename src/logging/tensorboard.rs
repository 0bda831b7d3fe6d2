//! Tensorboard logger
use super::chunk::{ByTime, ChunkLogger, ChunkSummary, Chunker, SummaryWriter};
use super::{Id, LogError, LogValue, StatsLogger};
use std::fmt::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tensorboard_rs::summary_writer::SummaryWriter as TbSummaryWriter;

/// Logger that saves chunk summaries to a tensorboard event file.
///
/// Each flush writes one point per logged ID. The step index counts flushes.
#[derive(Debug)]
pub struct TensorBoardLogger<C: Chunker = ByTime>(ChunkLogger<C, TensorBoardBackend>);

impl<C: Chunker> TensorBoardLogger<C> {
    #[inline]
    pub fn new<P: AsRef<Path>>(chunker: C, log_dir: P) -> Self {
        Self(ChunkLogger::new(chunker, TensorBoardBackend::new(log_dir)))
    }
}

impl<C: Chunker> StatsLogger for TensorBoardLogger<C> {
    #[inline]
    fn group_start(&mut self) {
        self.0.group_start()
    }
    #[inline]
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        self.0.group_log(id, value)
    }
    #[inline]
    fn group_end(&mut self) {
        self.0.group_end()
    }
    #[inline]
    fn flush(&mut self) {
        self.0.flush()
    }
}

/// Logging backend that saves summaries to a tensorboard file.
pub struct TensorBoardBackend {
    writer: TbSummaryWriter,
    log_dir: PathBuf,
    summary_index: usize,
}

impl fmt::Debug for TensorBoardBackend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TensorBoardBackend")
            .field("log_dir", &self.log_dir)
            .field("summary_index", &self.summary_index)
            .finish()
    }
}

impl TensorBoardBackend {
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Self {
        Self {
            writer: TbSummaryWriter::new(log_dir.as_ref()),
            log_dir: log_dir.as_ref().to_path_buf(),
            summary_index: 0,
        }
    }
}

impl SummaryWriter for TensorBoardBackend {
    fn write_summaries<'a, I>(&mut self, summaries: I, _elapsed: Duration)
    where
        I: Iterator<Item = (&'a Id, &'a ChunkSummary)>,
    {
        // The writer copies the tag so reuse one buffer for formatting them.
        let mut tag_buffer = String::new();

        for (id, summary) in summaries {
            tag_buffer.clear();
            let _ = write!(tag_buffer, "{}", id);
            self.write_summary(&tag_buffer, summary);
        }
        self.summary_index += 1;
        self.writer.flush();
    }
}

impl TensorBoardBackend {
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn write_summary(&mut self, tag: &str, summary: &ChunkSummary) {
        match summary {
            ChunkSummary::Counter {
                increment,
                initial_value,
            } => self.writer.add_scalar(
                tag,
                (initial_value + increment) as f32,
                self.summary_index,
            ),
            ChunkSummary::Duration { stats } | ChunkSummary::Scalar { stats } => {
                if let Some(mean) = stats.mean() {
                    self.writer.add_scalar(tag, mean as f32, self.summary_index)
                }
            }
        }
    }
}
