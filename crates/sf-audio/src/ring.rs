/// Fixed-capacity circular sample buffer with independent write and read cursors.
///
/// Both cursors advance modulo `capacity`. The write side (`push`,
/// `peek_window`) serves analysis input; the read side (`pop`, `accumulate`)
/// serves overlap-add output, where every slot is read once and zeroed so
/// stale energy never reaches the next overlap cycle.
///
/// # Example
/// ```
/// use sf_audio::ring::RingBuffer;
/// let mut ring = RingBuffer::new(4);
/// for s in [1.0, 2.0, 3.0, 4.0, 5.0] {
///     ring.push(s);
/// }
/// let mut window = [0.0; 3];
/// ring.peek_window(&mut window);
/// assert_eq!(window, [3.0, 4.0, 5.0]);
/// ```
#[derive(Clone, Debug)]
pub struct RingBuffer {
    data: Vec<f32>,
    write: usize,
    read: usize,
}

impl RingBuffer {
    /// Allocate a zeroed ring of `capacity` samples.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            data: vec![0.0; capacity],
            write: 0,
            read: 0,
        }
    }

    /// Capacity in samples.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Slot the next `push` writes to.
    #[must_use]
    pub fn write_pos(&self) -> usize {
        self.write
    }

    /// Slot the next `pop` reads from.
    #[must_use]
    pub fn read_pos(&self) -> usize {
        self.read
    }

    /// Zero every slot and rewind both cursors. Never reallocates.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.write = 0;
        self.read = 0;
    }

    /// Write one sample at the write cursor and advance it.
    #[inline(always)]
    pub fn push(&mut self, sample: f32) {
        self.data[self.write] = sample;
        self.write += 1;
        if self.write == self.data.len() {
            self.write = 0;
        }
    }

    /// Read the sample at the read cursor, zero the slot, advance.
    #[inline(always)]
    pub fn pop(&mut self) -> f32 {
        let sample = std::mem::take(&mut self.data[self.read]);
        self.read += 1;
        if self.read == self.data.len() {
            self.read = 0;
        }
        sample
    }

    /// Pop `out.len()` samples in order.
    pub fn pop_into(&mut self, out: &mut [f32]) {
        for slot in out.iter_mut() {
            *slot = self.pop();
        }
    }

    /// Copy the most recent `out.len()` pushed samples, oldest first.
    ///
    /// Unwraps the circular indexing; does not move any cursor.
    ///
    /// # Panics
    /// Panics if `out.len() > capacity()`.
    pub fn peek_window(&self, out: &mut [f32]) {
        let cap = self.data.len();
        let len = out.len();
        assert!(len <= cap, "window longer than ring");
        let start = (self.write + cap - len) % cap;
        let first = len.min(cap - start);
        out[..first].copy_from_slice(&self.data[start..start + first]);
        out[first..].copy_from_slice(&self.data[..len - first]);
    }

    /// Add `frame[i] * gain` into the slot `i` positions ahead of the read cursor.
    ///
    /// `frame[0]` is the next sample `pop` returns.
    ///
    /// # Panics
    /// Panics if `frame.len() > capacity()`.
    pub fn accumulate(&mut self, frame: &[f32], gain: f32) {
        let cap = self.data.len();
        assert!(frame.len() <= cap, "frame longer than ring");
        let first = frame.len().min(cap - self.read);
        let (head, tail) = frame.split_at(first);
        for (slot, &s) in self.data[self.read..self.read + first].iter_mut().zip(head) {
            *slot += s * gain;
        }
        for (slot, &s) in self.data[..tail.len()].iter_mut().zip(tail) {
            *slot += s * gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_window_unwraps_across_the_seam() {
        let mut ring = RingBuffer::new(8);
        for i in 0..13 {
            ring.push(i as f32);
        }
        let mut out = [0.0; 8];
        ring.peek_window(&mut out);
        assert_eq!(out, [5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);
        assert_eq!(ring.write_pos(), 5);
    }

    #[test]
    fn pop_is_read_once() {
        let mut ring = RingBuffer::new(4);
        ring.accumulate(&[1.0, 2.0, 3.0, 4.0], 1.0);
        let mut out = [0.0; 4];
        ring.pop_into(&mut out);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);
        ring.pop_into(&mut out);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn accumulate_overlaps_from_the_read_cursor() {
        let mut ring = RingBuffer::new(4);
        ring.accumulate(&[1.0; 4], 0.5);
        assert_eq!(ring.pop(), 0.5);
        assert_eq!(ring.pop(), 0.5);
        // Second frame starts two slots later and wraps.
        ring.accumulate(&[1.0; 4], 1.0);
        let mut out = [0.0; 4];
        ring.pop_into(&mut out);
        assert_eq!(out, [1.5, 1.5, 1.0, 1.0]);
    }

    #[test]
    fn clear_rewinds_and_zeroes() {
        let mut ring = RingBuffer::new(3);
        ring.push(1.0);
        ring.accumulate(&[2.0], 1.0);
        ring.pop();
        ring.clear();
        assert_eq!((ring.write_pos(), ring.read_pos()), (0, 0));
        let mut out = [9.0; 3];
        ring.peek_window(&mut out);
        assert_eq!(out, [0.0; 3]);
    }
}
