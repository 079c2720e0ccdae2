//! `filesort` sorts a text file of signed 32-bit integers in place using a
//! bounded amount of memory.
//!
//! The file is ingested chunk by chunk into a single fixed-size buffer; each
//! chunk is sorted in memory by a parallel merge sort and spilled to a sorted
//! binary run file. The runs are then consolidated by a multi-pass 16-way
//! merge driven by a fixed-capacity min-heap, and the merged result is
//! serialized back over the input file as text. Peak memory use is bounded by
//! the buffer size; inputs larger than RAM sort through temporary files. For
//! more information see
//! [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use filesort::FileSorterBuilder;
//!
//! fn main() {
//!     let sorter = FileSorterBuilder::new()
//!         .with_buffer_bytes(16 * 1024 * 1024)
//!         .with_threads(4)
//!         .build()
//!         .unwrap();
//!
//!     sorter.sort(Path::new("numbers.txt")).unwrap();
//! }
//! ```

pub mod buffer;
pub mod chunk;
pub mod heap;
pub mod merger;
pub mod profile;
pub mod psort;
pub mod sort;

pub use buffer::ChunkBuffer;
pub use heap::{HeapEl, MinHeap};
pub use merger::{KwayMerger, MERGE_FANIN};
pub use sort::{FileSorter, FileSorterBuilder, SortError, DEFAULT_BUFFER_BYTES};
