//! Fixed-capacity binary min-heap.
//!
//! Backs the K-way merge priority queue. Each element carries the key being
//! merged and the index of the input stream it came from, so that popping the
//! minimum tells the merger which stream to refill from. The root node holds
//! the minimal key.

/// One queue entry: a key and the input stream that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapEl {
    pub key: i32,
    pub src: u16,
}

/// Binary min-heap with a fixed capacity, keyed on [`HeapEl::key`].
///
/// Equal keys are popped in arbitrary order.
pub struct MinHeap {
    capacity: usize,
    arr: Vec<HeapEl>,
}

impl MinHeap {
    /// Creates an empty heap able to hold up to `capacity` elements.
    pub fn with_capacity(capacity: usize) -> Self {
        MinHeap {
            capacity,
            arr: Vec::with_capacity(capacity),
        }
    }

    /// Checks if the heap is empty.
    pub fn is_empty(&self) -> bool {
        self.arr.is_empty()
    }

    /// Returns the current element count.
    pub fn len(&self) -> usize {
        self.arr.len()
    }

    /// Removes all elements, keeping the allocation.
    pub fn clear(&mut self) {
        self.arr.clear();
    }

    /// Inserts a new element, restoring the heap property.
    ///
    /// Complexity: O(log n).
    ///
    /// # Panics
    /// Panics if the heap is full; capacity is a structural bound, exceeding
    /// it means the caller queued more than one element per stream.
    pub fn insert(&mut self, el: HeapEl) {
        assert!(self.arr.len() < self.capacity, "heap overflow");

        self.arr.push(el);
        self.sift_up(self.arr.len() - 1);
    }

    /// Removes and returns the minimal element, or [`None`] if the heap is
    /// empty.
    ///
    /// Complexity: O(log n).
    pub fn pop(&mut self) -> Option<HeapEl> {
        if self.arr.is_empty() {
            return None;
        }

        // Move the last element into the root slot and let it sink.
        let min = self.arr.swap_remove(0);
        if !self.arr.is_empty() {
            self.sift_down(0);
        }

        return Some(min);
    }

    fn sift_up(&mut self, mut i: usize) {
        while i != 0 {
            let parent = (i - 1) / 2;
            if self.arr[parent].key <= self.arr[i].key {
                break;
            }
            self.arr.swap(i, parent);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut min = i;

            if left < self.arr.len() && self.arr[left].key < self.arr[min].key {
                min = left;
            }
            if right < self.arr.len() && self.arr[right].key < self.arr[min].key {
                min = right;
            }
            if min == i {
                break;
            }

            self.arr.swap(i, min);
            i = min;
        }
    }
}

#[cfg(test)]
mod test {
    use rand::Rng;
    use rstest::*;

    use super::{HeapEl, MinHeap};

    fn drain_keys(heap: &mut MinHeap) -> Vec<i32> {
        let mut keys = Vec::new();
        while let Some(el) = heap.pop() {
            keys.push(el.key);
        }
        keys
    }

    #[rstest]
    #[case(vec![5, 1, 3, 2, 4], vec![1, 2, 3, 4, 5])]
    #[case(vec![1, 1, 1], vec![1, 1, 1])]
    #[case(vec![i32::MAX, i32::MIN, 0], vec![i32::MIN, 0, i32::MAX])]
    #[case(vec![7], vec![7])]
    fn test_pop_order(#[case] keys: Vec<i32>, #[case] expected: Vec<i32>) {
        let mut heap = MinHeap::with_capacity(keys.len());
        for (i, key) in keys.into_iter().enumerate() {
            heap.insert(HeapEl { key, src: i as u16 });
        }

        assert_eq!(drain_keys(&mut heap), expected);
        assert!(heap.is_empty());
    }

    #[test]
    fn test_src_travels_with_key() {
        let mut heap = MinHeap::with_capacity(3);
        heap.insert(HeapEl { key: 30, src: 0 });
        heap.insert(HeapEl { key: 10, src: 1 });
        heap.insert(HeapEl { key: 20, src: 2 });

        assert_eq!(heap.pop(), Some(HeapEl { key: 10, src: 1 }));
        assert_eq!(heap.pop(), Some(HeapEl { key: 20, src: 2 }));
        assert_eq!(heap.pop(), Some(HeapEl { key: 30, src: 0 }));
        assert_eq!(heap.pop(), None);
    }

    #[test]
    fn test_interleaved_insert_pop() {
        // The merge pump never holds more than one element per stream, so the
        // heap sees pops interleaved with inserts at the same size.
        let mut rng = rand::thread_rng();
        let mut heap = MinHeap::with_capacity(16);

        for _ in 0..16 {
            heap.insert(HeapEl {
                key: rng.gen(),
                src: 0,
            });
        }

        let mut last = i32::MIN;
        for _ in 0..1000 {
            let el = heap.pop().unwrap();
            assert!(el.key >= last);
            last = el.key;
            // Replacement keys never go below the popped minimum.
            heap.insert(HeapEl {
                key: rng.gen_range(el.key..=i32::MAX),
                src: 0,
            });
        }
    }

    #[test]
    fn test_clear_allows_reuse() {
        let mut heap = MinHeap::with_capacity(2);
        heap.insert(HeapEl { key: 1, src: 0 });
        heap.clear();

        assert!(heap.is_empty());
        heap.insert(HeapEl { key: 2, src: 0 });
        heap.insert(HeapEl { key: 3, src: 1 });
        assert_eq!(heap.len(), 2);
    }

    #[test]
    #[should_panic(expected = "heap overflow")]
    fn test_overflow_panics() {
        let mut heap = MinHeap::with_capacity(1);
        heap.insert(HeapEl { key: 1, src: 0 });
        heap.insert(HeapEl { key: 2, src: 1 });
    }
}
