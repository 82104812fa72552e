//! Types and traits for telemetry.
//!
//! Training components report named observations as [`Record`]s. A record is a
//! flat map from names such as `"loss/value"` or `"count/chunks"` to a
//! [`RecordValue`]. Records flow into an [`AggregateRecorder`], which keeps them
//! until [`AggregateRecorder::flush`] reduces them with [`RecordStorage`] and
//! writes the result to its destination.
//!
//! Telemetry is purely observational. Recorders never return errors to the caller;
//! a recorder that cannot deliver a record logs the problem and drops it.
//!
//! ```rust
//! use chunkrl_core::record::{Record, RecordValue};
//!
//! let mut record = Record::empty();
//! record.insert("loss/value", RecordValue::Scalar(0.5));
//! record.insert("traj-length", RecordValue::Scalar(12.0));
//! assert_eq!(record.get_scalar("loss/value").unwrap(), 0.5);
//! ```
mod base;
mod buffered_recorder;
mod log_recorder;
mod null_recorder;
mod recorder;
mod storage;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use log_recorder::LogRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::{AggregateRecorder, Recorder};
pub use storage::RecordStorage;
