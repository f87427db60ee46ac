//! Types and traits for recording training metrics.
//!
//! ```rust
//! use fedkick_core::record::{Record, RecordValue};
//!
//! let mut record = Record::empty();
//! record.insert("iteration", RecordValue::Scalar(1.0));
//! record.insert("epsilon", RecordValue::Scalar(0.2));
//! assert_eq!(record.get_scalar("epsilon").unwrap(), 0.2);
//! ```
mod base;
mod buffered_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use recorder::{LogRecorder, Recorder};
