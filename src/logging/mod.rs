//! Logging statistics from training runs
mod chunk;
mod display;
mod tensorboard;
#[cfg(test)]
pub mod testing;

pub use chunk::{ByTime, ChunkLogger, ChunkSummary, Chunker, SummaryWriter};
pub use display::{DisplayBackend, DisplayLogger};
pub use tensorboard::{TensorBoardBackend, TensorBoardLogger};

use log::warn;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Log statistics in (possibly nested) named scopes.
///
/// Logs are made in groups: all values logged between `group_start` and `group_end` belong to
/// the same point in time. Backends may buffer and summarize values until `flush`.
pub trait StatsLogger {
    /// Start a new logging group.
    fn group_start(&mut self);

    /// Log a value within the current group.
    ///
    /// # Returns
    /// An error if the value is structurally incompatible with previous values
    /// logged under the same ID. The value is not logged in that case.
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError>;

    /// End the current logging group.
    fn group_end(&mut self);

    /// Write out any buffered summaries.
    fn flush(&mut self);

    /// Log a single value as its own group.
    #[inline]
    fn log(&mut self, name: &'static str, value: LogValue) -> Result<(), LogError> {
        self.group_start();
        let result = self.group_log(name.into(), value);
        self.group_end();
        result
    }

    /// Log a scalar value. Failures are reported as warnings.
    #[inline]
    fn log_scalar(&mut self, name: &'static str, value: f64) {
        if let Err(err) = self.log(name, LogValue::Scalar(value)) {
            warn!("failed to log {:?}: {}", name, err);
        }
    }

    /// Log an increment to a counter. Failures are reported as warnings.
    #[inline]
    fn log_counter_increment(&mut self, name: &'static str, increment: u64) {
        if let Err(err) = self.log(name, LogValue::CounterIncrement(increment)) {
            warn!("failed to log {:?}: {}", name, err);
        }
    }

    /// Log a duration. Failures are reported as warnings.
    #[inline]
    fn log_duration(&mut self, name: &'static str, duration: Duration) {
        if let Err(err) = self.log(name, LogValue::Duration(duration)) {
            warn!("failed to log {:?}: {}", name, err);
        }
    }

    /// Wrap this logger such that all logged names are nested in the given scope.
    #[inline]
    fn with_scope(&mut self, scope: &'static str) -> ScopedLogger<Self>
    where
        Self: Sized,
    {
        ScopedLogger::new(self, scope)
    }

    /// Group all logs made through the returned logger until it is dropped.
    #[inline]
    fn group(&mut self) -> LogGroup<Self>
    where
        Self: Sized,
    {
        LogGroup::new(self)
    }
}

impl<L: StatsLogger + ?Sized> StatsLogger for &'_ mut L {
    #[inline]
    fn group_start(&mut self) {
        L::group_start(self)
    }
    #[inline]
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        L::group_log(self, id, value)
    }
    #[inline]
    fn group_end(&mut self) {
        L::group_end(self)
    }
    #[inline]
    fn flush(&mut self) {
        L::flush(self)
    }
}

/// Logger that does nothing
impl StatsLogger for () {
    #[inline]
    fn group_start(&mut self) {}
    #[inline]
    fn group_log(&mut self, _: Id, _: LogValue) -> Result<(), LogError> {
        Ok(())
    }
    #[inline]
    fn group_end(&mut self) {}
    #[inline]
    fn flush(&mut self) {}
}

/// Log to both loggers.
///
/// If both fail, the error from the first is returned.
impl<A: StatsLogger, B: StatsLogger> StatsLogger for (A, B) {
    #[inline]
    fn group_start(&mut self) {
        self.0.group_start();
        self.1.group_start();
    }
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        let r1 = self.0.group_log(id.clone(), value.clone());
        let r2 = self.1.group_log(id, value);
        r1.and(r2)
    }
    #[inline]
    fn group_end(&mut self) {
        self.0.group_end();
        self.1.group_end();
    }
    #[inline]
    fn flush(&mut self) {
        self.0.flush();
        self.1.flush();
    }
}

/// Logged value.
#[derive(Debug, Clone, PartialEq)]
pub enum LogValue {
    /// A scalar value. Summarized by mean and standard deviation.
    Scalar(f64),
    /// Increment a counter. Summarized by the running total.
    CounterIncrement(u64),
    /// A time duration. Summarized by mean and standard deviation.
    Duration(Duration),
}

impl LogValue {
    const fn variant_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "Scalar",
            Self::CounterIncrement(_) => "CounterIncrement",
            Self::Duration(_) => "Duration",
        }
    }
}

impl From<f64> for LogValue {
    #[inline]
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<f32> for LogValue {
    #[inline]
    fn from(value: f32) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<Duration> for LogValue {
    #[inline]
    fn from(value: Duration) -> Self {
        Self::Duration(value)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    #[error("incompatible value type; previously {prev} now {now}")]
    IncompatibleValue {
        prev: &'static str,
        now: &'static str,
    },
}

/// Hierarchical identifier of a logged value. Displayed as `scope/.../name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id {
    /// Enclosing scopes, outermost first.
    namespace: Vec<&'static str>,
    /// Name of the value within its namespace.
    name: &'static str,
}

impl Id {
    pub const fn from_name(name: &'static str) -> Self {
        Self {
            namespace: Vec::new(),
            name,
        }
    }

    /// Nest this ID inside an outer scope.
    #[must_use]
    pub fn with_prefix(mut self, scope: &'static str) -> Self {
        self.namespace.insert(0, scope);
        self
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl From<&'static str> for Id {
    #[inline]
    fn from(name: &'static str) -> Self {
        Self::from_name(name)
    }
}

impl FromIterator<&'static str> for Id {
    /// The last item is the name, the rest are the namespace (outermost first).
    ///
    /// # Panics
    /// If the iterator is empty.
    fn from_iter<I: IntoIterator<Item = &'static str>>(iter: I) -> Self {
        let mut namespace: Vec<_> = iter.into_iter().collect();
        let name = namespace.pop().expect("id must have at least a name");
        Self { namespace, name }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for scope in &self.namespace {
            write!(f, "{}/", scope)?;
        }
        f.write_str(self.name)
    }
}

/// Logger that nests all IDs in a scope.
#[derive(Debug)]
pub struct ScopedLogger<'a, L: ?Sized> {
    logger: &'a mut L,
    scope: &'static str,
}

impl<'a, L: ?Sized> ScopedLogger<'a, L> {
    #[inline]
    pub fn new(logger: &'a mut L, scope: &'static str) -> Self {
        Self { logger, scope }
    }
}

impl<L: StatsLogger + ?Sized> StatsLogger for ScopedLogger<'_, L> {
    #[inline]
    fn group_start(&mut self) {
        self.logger.group_start()
    }
    #[inline]
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        self.logger.group_log(id.with_prefix(self.scope), value)
    }
    #[inline]
    fn group_end(&mut self) {
        self.logger.group_end()
    }
    #[inline]
    fn flush(&mut self) {
        self.logger.flush()
    }
}

/// Logger that puts everything logged through it into a single group, ended on drop.
#[derive(Debug)]
pub struct LogGroup<'a, L: StatsLogger + ?Sized> {
    logger: &'a mut L,
}

impl<'a, L: StatsLogger + ?Sized> LogGroup<'a, L> {
    #[inline]
    pub fn new(logger: &'a mut L) -> Self {
        logger.group_start();
        Self { logger }
    }
}

impl<L: StatsLogger + ?Sized> Drop for LogGroup<'_, L> {
    #[inline]
    fn drop(&mut self) {
        self.logger.group_end()
    }
}

impl<L: StatsLogger + ?Sized> StatsLogger for LogGroup<'_, L> {
    #[inline]
    fn group_start(&mut self) {}
    #[inline]
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        self.logger.group_log(id, value)
    }
    #[inline]
    fn group_end(&mut self) {}
    #[inline]
    fn flush(&mut self) {
        self.logger.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingLogger;
    use super::*;

    #[test]
    fn scoped_ids_display_with_slashes() {
        let id = Id::from_name("avg_reward").with_prefix("training");
        assert_eq!(id.to_string(), "training/avg_reward");
        let id: Id = ["a", "b", "c"].into_iter().collect();
        assert_eq!(id.to_string(), "a/b/c");
    }

    #[test]
    fn nested_scopes() {
        let mut logger = RecordingLogger::default();
        {
            let mut outer = logger.with_scope("outer");
            let mut inner = outer.with_scope("inner");
            inner.log_scalar("x", 1.0);
        }
        assert_eq!(logger.scalars("outer/inner/x"), vec![1.0]);
    }

    #[test]
    fn group_spans_until_drop() {
        let mut logger = RecordingLogger::default();
        {
            let mut group = logger.group();
            group.log_scalar("a", 1.0);
            group.log_scalar("b", 2.0);
        }
        assert_eq!(logger.groups_started, 1);
        assert_eq!(logger.groups_ended, 1);
    }

    #[test]
    fn pair_logs_to_both() {
        let mut logger = (RecordingLogger::default(), RecordingLogger::default());
        logger.log_counter_increment("n", 3);
        assert_eq!(logger.0.records.len(), 1);
        assert_eq!(logger.1.records.len(), 1);
    }
}
