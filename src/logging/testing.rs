//! Logging test utilities
use super::{Id, LogError, LogValue, StatsLogger};

/// Logger that records every value it is given.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecordingLogger {
    pub records: Vec<(String, LogValue)>,
    pub groups_started: usize,
    pub groups_ended: usize,
    pub flushes: usize,
}

impl RecordingLogger {
    /// All scalar values logged with the given ID, in order.
    pub fn scalars(&self, id: &str) -> Vec<f64> {
        self.records
            .iter()
            .filter(|(name, _)| name == id)
            .filter_map(|(_, value)| match value {
                LogValue::Scalar(v) => Some(*v),
                _ => None,
            })
            .collect()
    }
}

impl StatsLogger for RecordingLogger {
    fn group_start(&mut self) {
        self.groups_started += 1;
    }
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        self.records.push((id.to_string(), value));
        Ok(())
    }
    fn group_end(&mut self) {
        self.groups_ended += 1;
    }
    fn flush(&mut self) {
        self.flushes += 1;
    }
}
