//! Keyed side stream of external data

use std::collections::{BTreeMap, VecDeque};

use crate::types::{ExternalDataRecord, ObjectId};

/// External data grouped per object, each group in chronological order.
#[derive(Debug, Clone, Default)]
pub struct ExternalDataChannel {
    records: BTreeMap<ObjectId, VecDeque<(Vec<u8>, f32)>>,
    len: usize,
    newest: Option<f32>,
}

impl ExternalDataChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn has_pending(&self) -> bool {
        self.len > 0
    }

    /// Timestamp of the most recently pushed record
    pub fn newest_time(&self) -> Option<f64> {
        self.newest.map(|t| t as f64)
    }

    pub fn push(&mut self, record: ExternalDataRecord) {
        let queue = self.records.entry(record.object_key).or_default();
        if let Some((_, last)) = queue.back() {
            if record.timestamp_seconds < *last {
                tracing::warn!(
                    "External data for {} out of order ({:.3}s after {:.3}s)",
                    record.object_key,
                    record.timestamp_seconds,
                    last
                );
            }
        }
        queue.push_back((record.payload, record.timestamp_seconds));
        self.len += 1;
        self.newest = Some(record.timestamp_seconds);
    }

    /// Queued records for one object, oldest first
    pub fn records_for(&self, key: ObjectId) -> impl Iterator<Item = (&[u8], f32)> + '_ {
        self.records
            .get(&key)
            .into_iter()
            .flat_map(|q| q.iter().map(|(p, t)| (p.as_slice(), *t)))
    }

    /// Remove every record due at `now`, ordered by time then object
    pub fn drain_due(&mut self, now: f64) -> Vec<ExternalDataRecord> {
        let mut due = Vec::new();
        for (key, queue) in self.records.iter_mut() {
            while let Some((_, t)) = queue.front() {
                if (*t as f64) > now {
                    break;
                }
                if let Some((payload, t)) = queue.pop_front() {
                    due.push(ExternalDataRecord::new(*key, payload, t));
                }
            }
        }
        self.records.retain(|_, q| !q.is_empty());
        self.len -= due.len();
        due.sort_by(|a, b| a.timestamp_seconds.total_cmp(&b.timestamp_seconds));
        due
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.len = 0;
        self.newest = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_key_order_and_due_filter() {
        let mut channel = ExternalDataChannel::new();
        channel.push(ExternalDataRecord::new(ObjectId(2), vec![1], 0.5));
        channel.push(ExternalDataRecord::new(ObjectId(1), vec![2], 0.2));
        channel.push(ExternalDataRecord::new(ObjectId(2), vec![3], 0.7));
        channel.push(ExternalDataRecord::new(ObjectId(1), vec![4], 2.0));

        let due = channel.drain_due(1.0);
        let tags: Vec<u8> = due.iter().map(|r| r.payload[0]).collect();
        assert_eq!(tags, vec![2, 1, 3]);
        assert_eq!(channel.len(), 1);
        assert_eq!(channel.records_for(ObjectId(1)).count(), 1);
        assert_eq!(channel.records_for(ObjectId(2)).count(), 0);
        assert_eq!(channel.newest_time(), Some(2.0));
    }

    #[test]
    fn test_equal_times_keep_object_order() {
        let mut channel = ExternalDataChannel::new();
        channel.push(ExternalDataRecord::new(ObjectId(9), vec![9], 1.0));
        channel.push(ExternalDataRecord::new(ObjectId(3), vec![3], 1.0));
        let keys: Vec<_> = channel.drain_due(1.0).into_iter().map(|r| r.object_key).collect();
        assert_eq!(keys, vec![ObjectId(3), ObjectId(9)]);
        assert!(channel.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut channel = ExternalDataChannel::new();
        channel.push(ExternalDataRecord::new(ObjectId(1), vec![], 0.0));
        channel.clear();
        assert!(!channel.has_pending());
        assert_eq!(channel.newest_time(), None);
    }
}
