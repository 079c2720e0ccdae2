//! Chunk buffer.

/// Fixed-capacity `i32` buffer shared by all sorting stages.
///
/// The buffer is allocated once per sort operation and lent to one stage at
/// a time: ingest fills it, the in-memory sort reorders it, the merger carves
/// it into per-stream windows and write-back stages text output through it.
/// Exclusive borrows keep the stages from aliasing each other.
pub struct ChunkBuffer {
    limit: usize,
    inner: Vec<i32>,
}

impl ChunkBuffer {
    /// Creates a buffer holding up to `limit` integers.
    ///
    /// The backing storage is reserved upfront; this is the only long-lived
    /// allocation a sort operation makes.
    pub fn new(limit: usize) -> Self {
        ChunkBuffer {
            limit,
            inner: Vec::with_capacity(limit),
        }
    }

    /// Adds a new element to the buffer.
    pub fn push(&mut self, item: i32) {
        self.inner.push(item);
    }

    /// Returns buffer length.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Checks if the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Checks if the buffer reached the limit.
    pub fn is_full(&self) -> bool {
        self.inner.len() >= self.limit
    }

    /// Drops the buffered elements, keeping the allocation.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// The filled prefix of the buffer.
    pub fn as_slice(&self) -> &[i32] {
        self.inner.as_slice()
    }

    /// The filled prefix, mutable; this is the in-memory sort workspace.
    pub fn as_mut_slice(&mut self) -> &mut [i32] {
        self.inner.as_mut_slice()
    }

    /// The whole `limit`-element window, regardless of fill level.
    ///
    /// The merger partitions this into per-stream sub-buffers and write-back
    /// uses it as a block staging area. Content left by a previous stage is
    /// not preserved.
    pub fn backing_mut(&mut self) -> &mut [i32] {
        self.inner.resize(self.limit, 0);
        self.inner.as_mut_slice()
    }
}

#[cfg(test)]
mod test {
    use super::ChunkBuffer;

    #[test]
    fn test_fill_and_clear() {
        let mut buffer = ChunkBuffer::new(2);

        buffer.push(0);
        assert_eq!(buffer.is_full(), false);
        buffer.push(1);
        assert_eq!(buffer.is_full(), true);
        assert_eq!(buffer.as_slice(), &[0, 1]);

        buffer.clear();
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.is_empty(), true);
    }

    #[test]
    fn test_backing_covers_whole_window() {
        let mut buffer = ChunkBuffer::new(8);

        buffer.push(42);
        assert_eq!(buffer.as_slice().len(), 1);
        assert_eq!(buffer.backing_mut().len(), 8);
        assert_eq!(buffer.backing_mut()[0], 42);
    }
}
