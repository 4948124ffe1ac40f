//! Bounded, newest-first record window.

use std::collections::VecDeque;
use tick_core::Record;

/// Most recent records, newest first.
///
/// Holds at most `capacity` records; inserting into a full model evicts the
/// oldest one.
#[derive(Debug, Clone)]
pub struct ViewModel {
    records: VecDeque<Record>,
    capacity: usize,
    evicted: u64,
}

impl ViewModel {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// Insert at the front. Returns the evicted record, if any.
    pub fn push(&mut self, record: Record) -> Option<Record> {
        let evicted = if self.records.len() == self.capacity {
            self.evicted += 1;
            self.records.pop_back()
        } else {
            None
        };
        self.records.push_front(record);
        evicted
    }

    /// Records, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn latest(&self) -> Option<&Record> {
        self.records.front()
    }

    /// Owned copy of the current window, newest first.
    pub fn snapshot(&self) -> Vec<Record> {
        self.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records evicted since creation.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tick_core::FieldValue;

    fn record(seq: i64) -> Record {
        let mut r = Record::new();
        r.insert("sequence", FieldValue::from(seq));
        r
    }

    fn sequences(model: &ViewModel) -> Vec<f64> {
        model.iter().filter_map(|r| r.get_f64("sequence")).collect()
    }

    #[test]
    fn test_newest_first() {
        let mut model = ViewModel::new(10);
        for i in 1..=3 {
            model.push(record(i));
        }
        assert_eq!(sequences(&model), vec![3.0, 2.0, 1.0]);
        assert_eq!(model.latest().and_then(|r| r.get_f64("sequence")), Some(3.0));
    }

    #[test]
    fn test_full_model_evicts_oldest() {
        let mut model = ViewModel::new(2);
        assert!(model.push(record(1)).is_none());
        assert!(model.push(record(2)).is_none());

        let evicted = model.push(record(3)).unwrap();
        assert_eq!(evicted.get_f64("sequence"), Some(1.0));
        assert_eq!(sequences(&model), vec![3.0, 2.0]);
        assert_eq!(model.len(), 2);
        assert_eq!(model.evicted(), 1);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut model = ViewModel::new(0);
        model.push(record(1));
        model.push(record(2));
        assert_eq!(model.capacity(), 1);
        assert_eq!(sequences(&model), vec![2.0]);
    }
}
