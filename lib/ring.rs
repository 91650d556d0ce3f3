use crate::error::{Error, Result};

/// Fixed-capacity FIFO over caller-supplied storage.
///
/// Writing into a full buffer overwrites the oldest unread element, so after any
/// number of writes the buffer holds the most recent `capacity` elements in arrival
/// order.
pub struct RingBuffer<'a, T> {
    storage: &'a mut [T],
    // next slot to write
    head: usize,
    // oldest unread slot
    tail: usize,
    count: usize,
}

impl<'a, T> RingBuffer<'a, T>
where
    T: Copy,
{
    /// Takes over `storage` as backing memory, starting empty. The capacity is the
    /// storage length and must not be zero.
    pub fn new(storage: &'a mut [T]) -> Result<Self> {
        if storage.is_empty() {
            return Err(Error::InvalidParameter);
        }
        Ok(RingBuffer {
            storage,
            head: 0,
            tail: 0,
            count: 0,
        })
    }

    /// Appends `item`. When the buffer is full the oldest element is dropped and
    /// returned.
    pub fn write(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() {
            let oldest = self.storage[self.tail];
            self.tail = self.wrap(self.tail + 1);
            Some(oldest)
        } else {
            self.count += 1;
            None
        };
        self.storage[self.head] = item;
        self.head = self.wrap(self.head + 1);
        evicted
    }

    pub fn read(&mut self) -> Result<T> {
        if self.is_empty() {
            return Err(Error::Empty);
        }
        let item = self.storage[self.tail];
        self.tail = self.wrap(self.tail + 1);
        self.count -= 1;
        Ok(item)
    }

    /// Element `offset` positions after the oldest one, without removing it.
    pub fn peek(&self, offset: usize) -> Result<T> {
        if offset >= self.count {
            return Err(Error::OutOfRange);
        }
        Ok(self.storage[self.wrap(self.tail + offset)])
    }

    pub fn newest(&self) -> Result<T> {
        let offset = self.count.checked_sub(1).ok_or(Error::Empty)?;
        self.peek(offset)
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.count).map(move |offset| self.storage[self.wrap(self.tail + offset)])
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == self.storage.len()
    }

    fn wrap(&self, index: usize) -> usize {
        index % self.storage.len()
    }
}
