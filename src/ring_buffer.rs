//! # Sample Window Module
//!
//! Fixed-capacity ring buffer holding the most recent sensor samples.
//!
//! ## Key Types
//! - `Sample`: One (red, ir) intensity pair read from the sensor FIFO
//! - `RingBuffer<T>`: Bounded buffer, oldest element dropped on overflow
//! - `Window`: Borrowed, ordered view of a buffer of samples
//!
//! Red and IR are stored as one pair per slot, so eviction always removes
//! both channels together and the window can never lose channel alignment.

use std::collections::VecDeque;

/// One acquisition tick's worth of raw intensity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub red: u32,
    pub ir: u32,
}

impl Sample {
    pub fn new(red: u32, ir: u32) -> Self {
        Self { red, ir }
    }
}

#[derive(Debug)]
pub struct RingBuffer<T> {
    data: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Creates a buffer holding at most `capacity` items (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `item`, silently dropping the oldest one when full
    pub fn push(&mut self, item: T) {
        if self.data.len() == self.capacity {
            self.data.pop_front();
        }
        self.data.push_back(item);
    }

    pub fn is_full(&self) -> bool {
        self.data.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl RingBuffer<Sample> {
    /// Ordered view of the current window without copying
    pub fn snapshot(&self) -> Window<'_> {
        let (older, newer) = self.data.as_slices();
        Window { older, newer }
    }
}

impl RingBuffer<f64> {
    /// Arithmetic mean of the retained values, `None` when empty
    pub fn mean(&self) -> Option<f64> {
        if self.data.is_empty() {
            return None;
        }
        Some(self.data.iter().sum::<f64>() / self.data.len() as f64)
    }
}

/// Immutable view of the samples in a `RingBuffer`, oldest first
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    older: &'a [Sample],
    newer: &'a [Sample],
}

impl<'a> Window<'a> {
    /// Builds a window over a contiguous slice
    pub fn from_slice(samples: &'a [Sample]) -> Self {
        Self {
            older: samples,
            newer: &[],
        }
    }

    pub fn len(&self) -> usize {
        self.older.len() + self.newer.len()
    }

    pub fn samples(&self) -> impl Iterator<Item = &'a Sample> + 'a {
        let (older, newer) = (self.older, self.newer);
        older.iter().chain(newer.iter())
    }

    pub fn red(&self) -> impl Iterator<Item = u32> + 'a {
        self.samples().map(|s| s.red)
    }

    pub fn ir(&self) -> impl Iterator<Item = u32> + 'a {
        self.samples().map(|s| s.ir)
    }

    pub fn mean_red(&self) -> f64 {
        self.mean_of(self.red())
    }

    pub fn mean_ir(&self) -> f64 {
        self.mean_of(self.ir())
    }

    fn mean_of(&self, values: impl Iterator<Item = u32>) -> f64 {
        let len = self.len();
        if len == 0 {
            return 0.0;
        }
        values.map(f64::from).sum::<f64>() / len as f64
    }
}
