use super::Record;
use log::info;

/// Writes a record to an output destination with [`Recorder::write`].
pub trait Recorder {
    /// Write a record to the [`Recorder`].
    fn write(&mut self, record: Record);
}

/// Writes the scalar values of each record to the log at info level.
pub struct LogRecorder {
    prefix: String,
}

impl LogRecorder {
    /// Creates a recorder that prefixes every line with `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Recorder for LogRecorder {
    fn write(&mut self, record: Record) {
        info!("{}: {}", self.prefix, record.scalars_to_string());
    }
}
