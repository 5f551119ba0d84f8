use std::fmt;

use bytes::{Buf, Bytes, BytesMut};

/// A fixed-capacity byte region with NIO-style cursors.
///
/// The buffer keeps the invariant `0 <= position <= limit <= capacity`.
/// Writers fill `[position, limit)` and then [`flip`](ByteBuffer::flip) the
/// buffer so readers can drain the same window.
///
/// Unlike the `bytes` types the storage never grows: once allocated the
/// capacity is fixed, which is what lets several buffers be handed to a
/// scatter read as one logical region.
#[derive(Clone, PartialEq, Eq)]
pub struct ByteBuffer {
    storage: BytesMut,
    position: usize,
    limit: usize,
}

impl ByteBuffer {
    /// Allocate a zeroed buffer, position 0 and limit at capacity.
    pub fn allocate(capacity: usize) -> Self {
        Self {
            storage: BytesMut::zeroed(capacity),
            position: 0,
            limit: capacity,
        }
    }

    /// Wrap existing bytes. Position is 0, limit and capacity are the length
    /// of `data`, so the whole content is readable.
    pub fn wrap(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let len = data.len();
        Self {
            storage: BytesMut::from(&data[..]),
            position: 0,
            limit: len,
        }
    }

    /// Total size of the region.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Index of the next byte to be read or written.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the position.
    ///
    /// # Panics
    /// Panics if `position` exceeds the limit.
    pub fn set_position(&mut self, position: usize) -> &mut Self {
        assert!(
            position <= self.limit,
            "position {position} out of bounds (limit {})",
            self.limit
        );
        self.position = position;
        self
    }

    /// First index that must not be read or written.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Move the limit. The position is pulled back if it would pass the new
    /// limit.
    ///
    /// # Panics
    /// Panics if `limit` exceeds the capacity.
    pub fn set_limit(&mut self, limit: usize) -> &mut Self {
        assert!(
            limit <= self.capacity(),
            "limit {limit} out of bounds (capacity {})",
            self.capacity()
        );
        self.limit = limit;
        if self.position > limit {
            self.position = limit;
        }
        self
    }

    /// Bytes between position and limit.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    /// Whether any byte is left between position and limit.
    #[inline]
    pub fn has_remaining(&self) -> bool {
        self.position < self.limit
    }

    /// Position to 0, limit to capacity. Content is untouched.
    pub fn clear(&mut self) -> &mut Self {
        self.position = 0;
        self.limit = self.capacity();
        self
    }

    /// Limit to the current position, position to 0.
    pub fn flip(&mut self) -> &mut Self {
        self.limit = self.position;
        self.position = 0;
        self
    }

    /// Position to 0, limit untouched.
    pub fn rewind(&mut self) -> &mut Self {
        self.position = 0;
        self
    }

    /// Move `[position, limit)` to the start of the buffer and prepare it for
    /// further writes.
    pub fn compact(&mut self) -> &mut Self {
        let remaining = self.remaining();
        self.storage.copy_within(self.position..self.limit, 0);
        self.position = remaining;
        self.limit = self.capacity();
        self
    }

    /// The readable window `[position, limit)`.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.storage[self.position..self.limit]
    }

    /// The writable window `[position, limit)`.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.storage[self.position..self.limit]
    }

    /// The bytes in `[0, limit)`, regardless of the position.
    #[inline]
    pub fn filled(&self) -> &[u8] {
        &self.storage[..self.limit]
    }

    /// Bytes in an arbitrary window, `None` when the window is out of bounds.
    #[inline]
    pub fn window(&self, start: usize, end: usize) -> Option<&[u8]> {
        self.storage.get(start..end)
    }

    /// Move the position forward by `n`.
    ///
    /// # Panics
    /// Panics if fewer than `n` bytes remain.
    pub fn advance_position(&mut self, n: usize) {
        assert!(
            n <= self.remaining(),
            "advance {n} past limit (remaining {})",
            self.remaining()
        );
        self.position += n;
    }

    /// Copy `src` at the position and advance it.
    ///
    /// # Panics
    /// Panics if `src` is longer than the remaining space.
    pub fn put_slice(&mut self, src: &[u8]) -> &mut Self {
        let len = src.len();
        self.as_mut_slice()[..len].copy_from_slice(src);
        self.position += len;
        self
    }

    /// Copy bytes from the position into `dst` and advance the position.
    /// Returns how many bytes were copied.
    pub fn get_slice(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.remaining());
        dst[..n].copy_from_slice(&self.as_slice()[..n]);
        self.position += n;
        n
    }

    /// Copy the readable window into an immutable `Bytes`.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_slice())
    }

    /// Give the buffer back. Storage is freed when the last owner releases.
    #[inline]
    pub fn release(self) {}
}

impl Buf for ByteBuffer {
    #[inline]
    fn remaining(&self) -> usize {
        ByteBuffer::remaining(self)
    }

    #[inline]
    fn chunk(&self) -> &[u8] {
        self.as_slice()
    }

    #[inline]
    fn advance(&mut self, cnt: usize) {
        self.advance_position(cnt)
    }
}

impl From<&[u8]> for ByteBuffer {
    fn from(data: &[u8]) -> Self {
        ByteBuffer::wrap(data)
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(data: Vec<u8>) -> Self {
        ByteBuffer::wrap(data)
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("position", &self.position)
            .field("limit", &self.limit)
            .field("capacity", &self.capacity())
            .finish()
    }
}
