use super::{AggregateRecorder, Record, RecordStorage, RecordValue, Recorder};

/// Keeps written records in memory.
///
/// Records given to [`AggregateRecorder::store`] are aggregated on
/// [`AggregateRecorder::flush`] and the aggregate, tagged with the step under
/// the key `"learner_steps"`, is appended to the buffer. Used to inspect
/// telemetry in tests and evaluation runs.
#[derive(Debug, Default)]
pub struct BufferedRecorder {
    buf: Vec<Record>,
    storage: RecordStorage,
}

impl BufferedRecorder {
    /// Construct the recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an iterator over the records.
    pub fn iter(&self) -> std::slice::Iter<Record> {
        self.buf.iter()
    }

    /// The number of buffered records.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if no record has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Takes the buffered records, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<Record> {
        std::mem::take(&mut self.buf)
    }
}

impl Recorder for BufferedRecorder {
    fn write(&mut self, record: Record) {
        self.buf.push(record);
    }
}

impl AggregateRecorder for BufferedRecorder {
    fn store(&mut self, record: Record) {
        self.storage.store(record);
    }

    fn flush(&mut self, step: i64) {
        if self.storage.is_empty() {
            return;
        }
        let mut record = self.storage.aggregate();
        record.insert("learner_steps", RecordValue::Scalar(step as f32));
        self.buf.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_appends_aggregate() {
        let mut recorder = BufferedRecorder::new();
        recorder.store(Record::from_scalar("kl-div", 0.01));
        recorder.store(Record::from_scalar("kl-div", 0.03));
        recorder.flush(7);
        recorder.flush(8);

        assert_eq!(recorder.len(), 1);
        let r = recorder.iter().next().unwrap();
        assert_eq!(r.get_scalar("learner_steps").unwrap(), 7.0);
        assert!((r.get_scalar("kl-div_mean").unwrap() - 0.02).abs() < 1e-6);
    }
}
