//! Writes chunkrl telemetry to TFRecord files readable by tensorboard.
use chunkrl_core::record::{AggregateRecorder, Record, RecordStorage, RecordValue, Recorder};
use log::warn;
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Write records to TFRecord.
///
/// Only [`RecordValue::Scalar`] values are written. Each record must carry its step
/// as a scalar under the step key, `"learner_steps"` by default.
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    step_key: String,
    storage: RecordStorage,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            step_key: "learner_steps".to_string(),
            storage: RecordStorage::new(),
        }
    }

    /// Sets the key of the step in written records.
    pub fn step_key(mut self, key: impl Into<String>) -> Self {
        self.step_key = key.into();
        self
    }
}

impl Recorder for TensorboardRecorder {
    /// Write a given [`Record`] into a TFRecord.
    ///
    /// Records without a scalar step are dropped with a warning.
    fn write(&mut self, record: Record) {
        let step = match record.get(&self.step_key) {
            Some(RecordValue::Scalar(v)) => *v as usize,
            _ => {
                warn!("Dropped a record without scalar '{}'", self.step_key);
                return;
            }
        };

        for (k, v) in record.iter() {
            if *k != self.step_key {
                if let RecordValue::Scalar(v) = v {
                    self.writer.add_scalar(k, *v, step);
                }
            }
        }
        self.writer.flush();
    }
}

impl AggregateRecorder for TensorboardRecorder {
    fn store(&mut self, record: Record) {
        self.storage.store(record);
    }

    fn flush(&mut self, step: i64) {
        if self.storage.is_empty() {
            return;
        }
        let mut record = self.storage.aggregate();
        record.insert(self.step_key.clone(), RecordValue::Scalar(step as f32));
        self.write(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_flush_writes_event_file() -> std::io::Result<()> {
        let dir = TempDir::new("tensorboard")?;
        let mut recorder = TensorboardRecorder::new(dir.path());
        recorder.store(Record::from_scalar("loss/value", 1.0));
        recorder.store(Record::from_scalar("loss/value", 3.0));
        recorder.flush(1);
        recorder.write(Record::from_scalar("no-step", 0.0));

        let n_files = std::fs::read_dir(dir.path())?.count();
        assert!(n_files >= 1);
        Ok(())
    }
}
