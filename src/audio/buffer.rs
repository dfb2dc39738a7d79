//! Fixed-capacity circular buffer holding the analyser window.
//!
//! The microphone callback pushes every downmixed sample; the spectrum
//! analyser reads the newest `capacity` samples on each endpointer tick
//! without consuming them.  Older samples are overwritten, so memory stays
//! bounded however long the candidate talks.
//!
//! # Example
//!
//! ```rust
//! use voice_interview::audio::RingBuffer;
//!
//! let mut window = RingBuffer::new(4);
//! window.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]); // oldest sample dropped
//! assert_eq!(window.snapshot(), vec![2.0, 3.0, 4.0, 5.0]);
//! assert_eq!(window.len(), 4); // snapshot does not consume
//! ```

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity circular buffer.
///
/// When [`push_slice`](Self::push_slice) would exceed `capacity`, the oldest
/// samples are silently overwritten.  The buffer never allocates beyond its
/// initial capacity.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
    /// Index of the *next* write position (wraps around `capacity`).
    write_pos: usize,
    /// Number of valid samples currently stored (≤ `capacity`).
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a new ring buffer with the given `capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            buf: vec![T::default(); capacity],
            capacity,
            write_pos: 0,
            len: 0,
        }
    }

    /// Append `data`, overwriting the oldest samples once full.
    pub fn push_slice(&mut self, data: &[T]) {
        for &item in data {
            self.buf[self.write_pos] = item;
            self.write_pos = (self.write_pos + 1) % self.capacity;
            if self.len < self.capacity {
                self.len += 1;
            }
        }
    }

    /// Copy out the stored samples in chronological order, oldest first.
    /// The buffer is left untouched.
    pub fn snapshot(&self) -> Vec<T> {
        let read_pos = if self.len < self.capacity {
            0
        } else {
            self.write_pos
        };

        (0..self.len)
            .map(|i| self.buf[(read_pos + i) % self.capacity])
            .collect()
    }

    /// Like [`snapshot`](Self::snapshot), but left-padded with
    /// `T::default()` so the result always has `capacity` elements.
    ///
    /// The analyser needs a full window even during the first few
    /// milliseconds of a capture; padding with silence keeps the FFT size
    /// fixed.
    pub fn window(&self) -> Vec<T> {
        let mut out = vec![T::default(); self.capacity - self.len];
        out.extend(self.snapshot());
        out
    }

    /// Discard all samples and reset the write position.
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_within_capacity() {
        let mut buf = RingBuffer::new(8);
        buf.push_slice(&[1.0_f32, 2.0, 3.0]);

        assert_eq!(buf.snapshot(), vec![1.0, 2.0, 3.0]);
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn overflow_keeps_newest_in_order() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);

        assert_eq!(buf.len(), 4);
        assert_eq!(buf.snapshot(), vec![5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn overflow_across_separate_pushes() {
        let mut buf = RingBuffer::new(3);
        buf.push_slice(&[1.0_f32, 2.0, 3.0]);
        buf.push_slice(&[4.0, 5.0]);

        assert_eq!(buf.snapshot(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn snapshot_is_not_destructive() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1.0_f32, 2.0]);

        let _ = buf.snapshot();

        assert_eq!(buf.snapshot(), vec![1.0, 2.0]);
    }

    #[test]
    fn window_pads_with_leading_silence() {
        let mut buf = RingBuffer::new(5);
        buf.push_slice(&[0.5_f32, 0.25]);

        assert_eq!(buf.window(), vec![0.0, 0.0, 0.0, 0.5, 0.25]);
    }

    #[test]
    fn window_of_full_buffer_is_snapshot() {
        let mut buf = RingBuffer::new(3);
        buf.push_slice(&[1.0_f32, 2.0, 3.0, 4.0]);

        assert_eq!(buf.window(), buf.snapshot());
    }

    #[test]
    fn clear_resets_state() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1.0_f32, 2.0, 3.0, 4.0, 5.0]);
        buf.clear();

        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 4);

        buf.push_slice(&[9.0_f32]);
        assert_eq!(buf.snapshot(), vec![9.0]);
    }

    #[test]
    #[should_panic(expected = "RingBuffer capacity must be > 0")]
    fn zero_capacity_panics() {
        let _buf: RingBuffer<f32> = RingBuffer::new(0);
    }
}
