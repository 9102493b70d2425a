//! Fixed-capacity sample history
//!
//! The detector looks a bounded distance back into the stream, so the engine
//! keeps the last `capacity` values of each channel it consumes in a circular
//! store. Memory is allocated once at construction; appending past capacity
//! overwrites the oldest record in place.

use crate::error::ClassifyError;

/// The channels the classification heuristic reads back out of history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Accelerometer x axis (`ax`)
    LateralAccel,
    /// Accelerometer y axis (`ay`)
    VerticalAccel,
    /// Gyroscope z axis (`gz`)
    YawRate,
}

/// Circular store of the most recent `capacity` records, three channels wide.
///
/// Lookback is by displacement from the newest record: `at(channel, 0)` is the
/// value appended last, `at(channel, 1)` the one before it. Displacements at
/// or past the retained count are an error, never a stale read.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    ax: Vec<f64>,
    ay: Vec<f64>,
    gz: Vec<f64>,
    /// Physical index of the newest record; meaningful only when `len > 0`.
    head: usize,
    /// Number of records retained, saturating at capacity.
    len: usize,
}

impl HistoryBuffer {
    /// Creates a buffer retaining up to `capacity` records per channel.
    pub fn with_capacity(capacity: usize) -> Result<Self, ClassifyError> {
        if capacity == 0 {
            return Err(ClassifyError::InvalidConfig(
                "history capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            ax: vec![0.0; capacity],
            ay: vec![0.0; capacity],
            gz: vec![0.0; capacity],
            head: 0,
            len: 0,
        })
    }

    /// Appends one record, overwriting the oldest once the buffer is full.
    pub fn append(&mut self, ax: f64, ay: f64, gz: f64) {
        let capacity = self.capacity();
        self.head = if self.len == 0 {
            0
        } else {
            (self.head + 1) % capacity
        };
        self.ax[self.head] = ax;
        self.ay[self.head] = ay;
        self.gz[self.head] = gz;
        if self.len < capacity {
            self.len += 1;
        }
    }

    /// Value of `channel` at `displacement` records before the newest one.
    pub fn at(&self, channel: Channel, displacement: usize) -> Result<f64, ClassifyError> {
        if displacement >= self.len {
            return Err(ClassifyError::LookbackOutOfRange {
                displacement,
                available: self.len,
            });
        }
        let capacity = self.capacity();
        let index = (self.head + capacity - displacement) % capacity;
        Ok(self.lane(channel)[index])
    }

    /// Number of records currently retained.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of records retained per channel.
    pub fn capacity(&self) -> usize {
        self.ax.len()
    }

    /// Physical index of the newest record, for diagnostics.
    pub fn cursor(&self) -> Option<usize> {
        if self.len == 0 {
            None
        } else {
            Some(self.head)
        }
    }

    fn lane(&self, channel: Channel) -> &[f64] {
        match channel {
            Channel::LateralAccel => &self.ax,
            Channel::VerticalAccel => &self.ay,
            Channel::YawRate => &self.gz,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(capacity: usize, records: usize) -> HistoryBuffer {
        let mut buffer = HistoryBuffer::with_capacity(capacity).unwrap();
        for i in 0..records {
            let v = i as f64;
            buffer.append(v, v + 0.5, -v);
        }
        buffer
    }

    #[test]
    fn rejects_zero_capacity() {
        assert!(matches!(
            HistoryBuffer::with_capacity(0),
            Err(ClassifyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn lookback_zero_is_newest() {
        let buffer = filled(8, 3);
        assert_eq!(buffer.at(Channel::LateralAccel, 0).unwrap(), 2.0);
        assert_eq!(buffer.at(Channel::VerticalAccel, 0).unwrap(), 2.5);
        assert_eq!(buffer.at(Channel::YawRate, 0).unwrap(), -2.0);
        assert_eq!(buffer.at(Channel::VerticalAccel, 2).unwrap(), 0.5);
    }

    #[test]
    fn length_saturates_at_capacity() {
        let buffer = filled(5, 12);
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.capacity(), 5);
        // Newest is record 11, oldest retained is record 7.
        assert_eq!(buffer.at(Channel::LateralAccel, 0).unwrap(), 11.0);
        assert_eq!(buffer.at(Channel::LateralAccel, 4).unwrap(), 7.0);
    }

    #[test]
    fn lookback_past_retained_count_fails() {
        let buffer = filled(5, 3);
        match buffer.at(Channel::VerticalAccel, 3) {
            Err(ClassifyError::LookbackOutOfRange {
                displacement,
                available,
            }) => {
                assert_eq!(displacement, 3);
                assert_eq!(available, 3);
            }
            other => panic!("expected LookbackOutOfRange, got {:?}", other),
        }

        let full = filled(5, 9);
        assert!(full.at(Channel::VerticalAccel, 5).is_err());
        assert!(full.at(Channel::VerticalAccel, 4).is_ok());
    }

    #[test]
    fn empty_buffer_has_no_cursor() {
        let buffer = HistoryBuffer::with_capacity(4).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.cursor(), None);
        assert!(buffer.at(Channel::VerticalAccel, 0).is_err());
    }

    #[test]
    fn cursor_wraps_with_head() {
        let buffer = filled(4, 6);
        // Six appends into four slots: head has wrapped to index 1.
        assert_eq!(buffer.cursor(), Some(1));
    }
}
