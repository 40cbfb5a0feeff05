/// One accepted reading, in the order it was published
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry {
    pub bpm: f64,
    pub spo2: f64,
}

/// Append-only session history of (BPM, SpO2) pairs for the review chart
#[derive(Debug, Default, Clone)]
pub struct DisplayBuffer {
    data: Vec<Entry>,
}

impl DisplayBuffer {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn push(&mut self, bpm: f64, spo2: f64) {
        self.data.push(Entry { bpm, spo2 });
    }

    #[allow(dead_code)]
    pub fn entries(&self) -> &[Entry] {
        &self.data
    }

    pub fn spo2_series(&self) -> Vec<f64> {
        self.data.iter().map(|e| e.spo2).collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Starts a new session
    pub fn reset(&mut self) {
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let mut buffer = DisplayBuffer::new();
        buffer.push(70.0, 97.0);
        buffer.push(71.0, 98.0);

        assert_eq!(buffer.spo2_series(), vec![97.0, 98.0]);
        assert_eq!(buffer.entries()[0].bpm, 70.0);
    }

    #[test]
    fn test_reset_starts_new_session() {
        let mut buffer = DisplayBuffer::new();
        buffer.push(0.0, 96.0);
        buffer.push(0.0, 99.0);
        assert_eq!(buffer.len(), 2);

        buffer.reset();
        assert!(buffer.is_empty());
    }
}
