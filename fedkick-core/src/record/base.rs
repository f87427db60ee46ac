//! Base implementation of records for logging.
use crate::error::FedkickError;
use chrono::prelude::{DateTime, Local};
use std::collections::HashMap;

/// Value stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A metric such as a loss or a rate.
    Scalar(f32),

    /// Wall-clock time of the record.
    DateTime(DateTime<Local>),

    /// A label.
    String(String),
}

/// Named values produced by one training iteration.
#[derive(Debug, Clone, Default)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record holding the current local time under `time`.
    pub fn timestamped() -> Self {
        Self(HashMap::from([(
            "time".to_string(),
            RecordValue::DateTime(Local::now()),
        )]))
    }

    /// Creates a record containing a single scalar value.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Inserts a value, replacing the one stored under the same key.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Gets a reference to the value associated with the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Gets a scalar value from the record.
    pub fn get_scalar(&self, k: &str) -> Result<f32, FedkickError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(FedkickError::RecordValueTypeError("Scalar".to_string())),
            None => Err(FedkickError::RecordKeyError(k.to_string())),
        }
    }

    /// Checks if the record is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Formats the scalar values as `key=value` pairs sorted by key.
    pub fn scalars_to_string(&self) -> String {
        let mut pairs: Vec<(&String, f32)> = self
            .0
            .iter()
            .filter_map(|(k, v)| match v {
                RecordValue::Scalar(v) => Some((k, *v)),
                _ => None,
            })
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs
            .iter()
            .map(|(k, v)| format!("{}={:.4}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
