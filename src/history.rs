use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartSample {
    pub timestamp_ms: i64,
    #[serde(with = "crate::decimal")]
    pub value: f64,
    pub step: bool,
}

/// Bounded chart history; the oldest entries are evicted first.
#[derive(Debug, Clone)]
pub struct ChartHistory {
    window: VecDeque<ChartSample>,
    capacity: usize,
}

impl ChartHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        ChartHistory {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: ChartSample) {
        self.window.push_back(sample);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChartSample> {
        self.window.iter()
    }

    pub fn latest(&self) -> Option<&ChartSample> {
        self.window.back()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t: i64) -> ChartSample {
        ChartSample { timestamp_ms: t, value: t as f64, step: false }
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut history = ChartHistory::new(3);
        for t in 0..5 {
            history.push(sample(t));
        }
        let kept: Vec<i64> = history.iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(kept, vec![2, 3, 4]);
        assert_eq!(history.latest().map(|s| s.timestamp_ms), Some(4));
    }

    #[test]
    fn test_zero_capacity_keeps_latest() {
        let mut history = ChartHistory::new(0);
        history.push(sample(1));
        history.push(sample(2));
        assert_eq!(history.len(), 1);
        assert_eq!(history.capacity(), 1);
    }
}
