//! Fixed-capacity ring buffer
//!
//! Both the echo stream and the input stream are stored in a ring with
//! separate read and write cursors and an occupancy count. Unlike a
//! scrollback ring, a full ring never overwrites: callers check `free()`
//! and degrade (bell, drop) themselves.

/// Circular buffer of `Copy` values with wraparound cursors
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    /// Backing storage, always `capacity` long
    slots: Vec<T>,
    /// Index of the oldest element
    read: usize,
    /// Index where the next element is written
    write: usize,
    /// Number of elements currently stored
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create an empty ring holding at most `capacity` elements
    ///
    /// A zero capacity is bumped to one so the cursor arithmetic stays defined.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![T::default(); capacity.max(1)],
            read: 0,
            write: 0,
            len: 0,
        }
    }

    /// Maximum number of elements
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of elements stored
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the ring is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if the ring is full
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Number of free slots
    pub fn free(&self) -> usize {
        self.capacity() - self.len
    }

    /// Append at the write cursor, handing the value back if the ring is full
    pub fn push(&mut self, value: T) -> Result<(), T> {
        if self.is_full() {
            return Err(value);
        }
        self.slots[self.write] = value;
        self.write = (self.write + 1) % self.capacity();
        self.len += 1;
        Ok(())
    }

    /// Remove the oldest element
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = self.slots[self.read];
        self.read = (self.read + 1) % self.capacity();
        self.len -= 1;
        Some(value)
    }

    /// Peek at the oldest element
    pub fn front(&self) -> Option<T> {
        (!self.is_empty()).then(|| self.slots[self.read])
    }

    /// Peek at the most recently written element
    pub fn back(&self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        Some(self.slots[self.prev_write()])
    }

    /// Remove the most recently written element (undo the last push)
    pub fn pop_back(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        self.write = self.prev_write();
        self.len -= 1;
        Some(self.slots[self.write])
    }

    /// Drop every element and rewind both cursors
    pub fn clear(&mut self) {
        self.read = 0;
        self.write = 0;
        self.len = 0;
    }

    /// Iterate from oldest to newest without consuming
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len).map(move |i| self.slots[(self.read + i) % self.capacity()])
    }

    fn prev_write(&self) -> usize {
        (self.write + self.capacity() - 1) % self.capacity()
    }
}
