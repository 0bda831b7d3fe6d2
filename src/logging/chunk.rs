//! Chunked summaries of logged values
use super::{Id, LogError, LogValue, StatsLogger};
use crate::utils::stats::OnlineMeanVariance;
use coarsetime::{Duration as CDuration, Instant as CInstant};
use std::collections::{btree_map::Entry, BTreeMap};
use std::time::{Duration, Instant};

/// Decide when the summaries of a [`ChunkLogger`] are flushed.
pub trait Chunker {
    /// Whether to flush before starting a new log group.
    #[inline]
    fn flush_group_start(&mut self) -> bool {
        false
    }
    /// Whether to flush after ending a log group.
    #[inline]
    fn flush_group_end(&mut self) -> bool {
        false
    }
    /// Indicate that the current chunk has been flushed
    fn note_flush(&mut self);
}

/// Write out summaries to a backend.
pub trait SummaryWriter {
    fn write_summaries<'a, I>(&mut self, summaries: I, elapsed: Duration)
    where
        I: Iterator<Item = (&'a Id, &'a ChunkSummary)>;
}

/// Flush summaries at fixed time intervals.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ByTime {
    // The time is checked on every log group so a coarse (fast, ~1ms accurate) clock is used.
    pub chunk_duration: CDuration,
    coarse_chunk_start: CInstant,
}

impl ByTime {
    pub fn new(chunk_duration: Duration) -> Self {
        Self {
            chunk_duration: CDuration::new(chunk_duration.as_secs(), chunk_duration.subsec_nanos()),
            coarse_chunk_start: CInstant::now(),
        }
    }
}

impl Default for ByTime {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl Chunker for ByTime {
    #[inline]
    fn flush_group_start(&mut self) -> bool {
        // Checked before logging so that a burst of logs is not split across chunks.
        self.coarse_chunk_start.elapsed() > self.chunk_duration
    }
    fn note_flush(&mut self) {
        self.coarse_chunk_start = CInstant::now();
    }
}

/// Logs time series statistics by breaking the time series into chunks and summarizing each chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkLogger<C: Chunker, W: SummaryWriter> {
    chunker: C,
    writer: W,

    // A binary tree is used so that keys are written in sorted order
    summaries: BTreeMap<Id, Node>,

    /// Start time of the current chunk.
    chunk_start: Instant,
}

impl<C: Chunker, W: SummaryWriter> ChunkLogger<C, W> {
    pub fn new(chunker: C, writer: W) -> Self {
        Self {
            chunker,
            writer,
            summaries: BTreeMap::new(),
            chunk_start: Instant::now(),
        }
    }
}

impl<C: Chunker + Default, W: SummaryWriter + Default> Default for ChunkLogger<C, W> {
    fn default() -> Self {
        Self::new(C::default(), W::default())
    }
}

impl<C: Chunker, W: SummaryWriter> StatsLogger for ChunkLogger<C, W> {
    fn group_start(&mut self) {
        if self.chunker.flush_group_start() {
            self.flush();
        }
    }

    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        match self.summaries.entry(id) {
            Entry::Vacant(e) => {
                e.insert(Node::new(value.into()));
            }
            Entry::Occupied(e) => e.into_mut().push(value)?,
        }
        Ok(())
    }

    fn group_end(&mut self) {
        if self.chunker.flush_group_end() {
            self.flush()
        }
    }

    fn flush(&mut self) {
        if self.summaries.values().any(|node| node.dirty) {
            self.writer.write_summaries(
                self.summaries
                    .iter()
                    .filter(|(_, node)| node.dirty)
                    .map(|(id, node)| (id, &node.summary)),
                self.chunk_start.elapsed(),
            );
        }

        for node in self.summaries.values_mut() {
            node.reset();
        }
        self.chunk_start = Instant::now();
        self.chunker.note_flush();
    }
}

/// Flush when dropped
impl<C: Chunker, W: SummaryWriter> Drop for ChunkLogger<C, W> {
    fn drop(&mut self) {
        self.flush();
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    summary: ChunkSummary,
    /// Whether the summary has been updated in this chunk
    dirty: bool,
}

impl Node {
    const fn new(summary: ChunkSummary) -> Self {
        Self {
            summary,
            dirty: true,
        }
    }

    fn push(&mut self, value: LogValue) -> Result<(), LogError> {
        self.summary.push(value)?;
        self.dirty = true;
        Ok(())
    }

    fn reset(&mut self) {
        self.dirty = false;
        self.summary.reset()
    }
}

/// Summary of the values logged under one ID within a chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkSummary {
    Counter { increment: u64, initial_value: u64 },
    Duration { stats: OnlineMeanVariance<f64> },
    Scalar { stats: OnlineMeanVariance<f64> },
}

impl From<LogValue> for ChunkSummary {
    fn from(value: LogValue) -> Self {
        match value {
            LogValue::CounterIncrement(i) => Self::Counter {
                increment: i,
                initial_value: 0,
            },
            LogValue::Duration(d) => {
                let mut stats = OnlineMeanVariance::new();
                stats.push(d.as_secs_f64());
                Self::Duration { stats }
            }
            LogValue::Scalar(v) => {
                let mut stats = OnlineMeanVariance::new();
                stats.push(v);
                Self::Scalar { stats }
            }
        }
    }
}

impl ChunkSummary {
    /// Add a value to the summary.
    ///
    /// Fails without modifying the summary if the value is a different variant from the one
    /// the summary was created from.
    fn push(&mut self, value: LogValue) -> Result<(), LogError> {
        match (self, value) {
            (Self::Counter { increment, .. }, LogValue::CounterIncrement(i)) => *increment += i,
            (Self::Duration { stats }, LogValue::Duration(d)) => stats.push(d.as_secs_f64()),
            (Self::Scalar { stats }, LogValue::Scalar(v)) => stats.push(v),
            (summary, value) => {
                return Err(LogError::IncompatibleValue {
                    prev: summary.value_variant_name(),
                    now: value.variant_name(),
                })
            }
        }
        Ok(())
    }

    /// Reset for the start of the next chunk.
    fn reset(&mut self) {
        match self {
            Self::Counter {
                increment,
                initial_value,
            } => {
                *initial_value += *increment;
                *increment = 0
            }
            Self::Duration { stats } | Self::Scalar { stats } => *stats = OnlineMeanVariance::new(),
        }
    }

    /// Name of the associated [`LogValue`] variant
    const fn value_variant_name(&self) -> &'static str {
        match self {
            Self::Counter { .. } => "CounterIncrement",
            Self::Duration { .. } => "Duration",
            Self::Scalar { .. } => "Scalar",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Never flushes on its own.
    #[derive(Debug, Default)]
    struct Manual;

    impl Chunker for Manual {
        fn note_flush(&mut self) {}
    }

    #[derive(Debug, Default, Clone)]
    struct Collect(Rc<RefCell<Vec<Vec<(String, ChunkSummary)>>>>);

    impl SummaryWriter for Collect {
        fn write_summaries<'a, I>(&mut self, summaries: I, _: Duration)
        where
            I: Iterator<Item = (&'a Id, &'a ChunkSummary)>,
        {
            self.0.borrow_mut().push(
                summaries
                    .map(|(id, s)| (id.to_string(), s.clone()))
                    .collect(),
            );
        }
    }

    #[test]
    fn scalars_are_averaged_within_chunk() {
        let writes = Collect::default();
        let mut logger = ChunkLogger::new(Manual, writes.clone());
        logger.log_scalar("x", 1.0);
        logger.log_scalar("x", 3.0);
        logger.flush();

        let written = writes.0.borrow();
        assert_eq!(written.len(), 1);
        let (id, summary) = &written[0][0];
        assert_eq!(id, "x");
        match summary {
            ChunkSummary::Scalar { stats } => assert_eq!(stats.mean(), Some(2.0)),
            s => panic!("unexpected summary {:?}", s),
        }
    }

    #[test]
    fn counter_accumulates_across_chunks() {
        let writes = Collect::default();
        let mut logger = ChunkLogger::new(Manual, writes.clone());
        logger.log_counter_increment("n", 2);
        logger.flush();
        logger.log_counter_increment("n", 3);
        logger.flush();

        let written = writes.0.borrow();
        assert_eq!(
            written[1][0].1,
            ChunkSummary::Counter {
                increment: 3,
                initial_value: 2
            }
        );
    }

    #[test]
    fn incompatible_value_is_rejected() {
        let mut logger = ChunkLogger::new(Manual, Collect::default());
        logger.log("x", LogValue::Scalar(1.0)).unwrap();
        assert_eq!(
            logger.log("x", LogValue::CounterIncrement(1)),
            Err(LogError::IncompatibleValue {
                prev: "Scalar",
                now: "CounterIncrement"
            })
        );
    }

    #[test]
    fn durations_are_summarized_in_seconds() {
        let writes = Collect::default();
        let mut logger = ChunkLogger::new(Manual, writes.clone());
        logger.log_duration("t", Duration::from_millis(100));
        logger.log_duration("t", Duration::from_millis(300));
        logger.flush();

        match &writes.0.borrow()[0][0].1 {
            ChunkSummary::Duration { stats } => {
                assert!((stats.mean().unwrap() - 0.2).abs() < 1e-9)
            }
            s => panic!("unexpected summary {:?}", s),
        };
    }

    #[test]
    fn clean_summaries_are_not_written() {
        let writes = Collect::default();
        let mut logger = ChunkLogger::new(Manual, writes.clone());
        logger.log_scalar("x", 1.0);
        logger.flush();
        logger.flush();
        assert_eq!(writes.0.borrow().len(), 1);
    }
}
