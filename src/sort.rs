//! External sorter.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::num::ParseIntError;
use std::path::Path;

use bytesize::ByteSize;
use log;

use crate::buffer::ChunkBuffer;
use crate::chunk;
use crate::merger::{KwayMerger, MERGE_FANIN};
use crate::profile::{Profiler, Stage};
use crate::psort;

/// Default sorting buffer size, in bytes.
pub const DEFAULT_BUFFER_BYTES: usize = 128 << 20;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Temporary directory creation error.
    TempDir(io::Error),
    /// Workers thread pool initialization error.
    ThreadPoolBuild(rayon::ThreadPoolBuildError),
    /// Common I/O error.
    IO(io::Error),
    /// Input line is not a valid 32-bit integer.
    Parse {
        /// 1-based line number in the input file.
        line: usize,
        source: ParseIntError,
    },
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(match &self {
            SortError::TempDir(err) => err,
            SortError::ThreadPoolBuild(err) => err,
            SortError::IO(err) => err,
            SortError::Parse { source, .. } => source,
        })
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::TempDir(err) => write!(f, "temporary directory not created: {}", err),
            SortError::ThreadPoolBuild(err) => write!(f, "thread pool initialization failed: {}", err),
            SortError::IO(err) => write!(f, "I/O operation failed: {}", err),
            SortError::Parse { line, source } => {
                write!(f, "invalid integer at line {}: {}", line, source)
            }
        }
    }
}

impl From<io::Error> for SortError {
    fn from(err: io::Error) -> Self {
        SortError::IO(err)
    }
}

/// File sorter builder. Provides methods for [`FileSorter`] initialization.
#[derive(Clone)]
pub struct FileSorterBuilder {
    /// Sorting buffer size, in bytes.
    buffer_bytes: usize,
    /// Number of threads to be used to sort chunks in parallel.
    threads: Option<usize>,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
}

impl FileSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        FileSorterBuilder::default()
    }

    /// Sets the sorting buffer size, in bytes.
    pub fn with_buffer_bytes(mut self, buffer_bytes: usize) -> FileSorterBuilder {
        self.buffer_bytes = buffer_bytes;
        return self;
    }

    /// Sets number of threads to be used to sort chunks in parallel.
    pub fn with_threads(mut self, threads: usize) -> FileSorterBuilder {
        self.threads = Some(threads);
        return self;
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> FileSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Builds a [`FileSorter`] instance using provided configuration.
    pub fn build(self) -> Result<FileSorter, SortError> {
        FileSorter::new(self.buffer_bytes, self.threads, self.tmp_dir.as_deref())
    }
}

impl Default for FileSorterBuilder {
    fn default() -> Self {
        FileSorterBuilder {
            buffer_bytes: DEFAULT_BUFFER_BYTES,
            threads: None,
            tmp_dir: None,
        }
    }
}

/// External file sorter.
///
/// Sorts a text file of decimal 32-bit integers in place, one value per
/// line, using a bounded amount of memory. The input is ingested into a
/// single fixed-size buffer chunk by chunk; each chunk is sorted in parallel
/// and spilled to a binary run file, and the runs are then consolidated by a
/// multi-pass K-way merge before being serialized back over the input file.
pub struct FileSorter {
    /// Number of integers the chunk buffer holds.
    buf_len: usize,
    /// Sorting thread pool.
    thread_pool: rayon::ThreadPool,
    /// Worker count used to partition each chunk.
    threads: usize,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
}

impl FileSorter {
    /// Creates a new file sorter instance.
    ///
    /// # Arguments
    /// * `buffer_bytes` - Sorting buffer size, in bytes. Bounds the peak
    ///   memory used for chunk sorting and merging.
    /// * `threads` - Number of threads to be used to sort chunks in parallel.
    ///   If the parameter is [`None`] threads number will be selected based
    ///   on available CPU core number.
    /// * `tmp_dir` - Directory to be used to store temporary data. If the
    ///   parameter is [`None`] the default OS temporary directory will be
    ///   used, falling back to the current directory.
    ///
    /// # Panics
    /// Panics if `buffer_bytes` is not a positive multiple of 4 or is too
    /// small to partition across the merge fan-in.
    pub fn new(
        buffer_bytes: usize,
        threads: Option<usize>,
        tmp_dir: Option<&Path>,
    ) -> Result<Self, SortError> {
        assert!(
            buffer_bytes > 0 && buffer_bytes % 4 == 0,
            "buffer size must be a positive multiple of 4"
        );
        let buf_len = buffer_bytes / 4;
        assert!(
            buf_len > MERGE_FANIN,
            "buffer must hold more than {} integers",
            MERGE_FANIN
        );

        let thread_pool = Self::init_thread_pool(threads)?;
        let threads = threads.unwrap_or_else(|| thread_pool.current_num_threads()).max(1);

        log::info!(
            "sorting buffer: {} ({} integers), threads: {}",
            ByteSize::b(buffer_bytes as u64).to_string_as(true),
            buf_len,
            threads
        );

        return Ok(FileSorter {
            buf_len,
            thread_pool,
            threads,
            tmp_dir: tmp_dir.map(|path| path.into()),
        });
    }

    fn init_thread_pool(threads: Option<usize>) -> Result<rayon::ThreadPool, SortError> {
        let mut thread_pool_builder = rayon::ThreadPoolBuilder::new();

        if let Some(threads) = threads {
            log::info!("initializing thread-pool (threads: {})", threads);
            thread_pool_builder = thread_pool_builder.num_threads(threads);
        } else {
            log::info!("initializing thread-pool (threads: default)");
        }
        let thread_pool = thread_pool_builder
            .build()
            .map_err(SortError::ThreadPoolBuild)?;

        return Ok(thread_pool);
    }

    fn init_tmp_dir(&self) -> Result<tempfile::TempDir, SortError> {
        let tmp_dir = match &self.tmp_dir {
            Some(path) => tempfile::Builder::new().prefix("tmpdir.").tempdir_in(path),
            None => tempfile::Builder::new()
                .prefix("tmpdir.")
                .tempdir()
                .or_else(|_| tempfile::Builder::new().prefix("tmpdir.").tempdir_in(".")),
        }
        .map_err(SortError::TempDir)?;

        log::info!("using {} as a temporary directory", tmp_dir.path().display());

        return Ok(tmp_dir);
    }

    /// Sorts the file at `path` in place.
    ///
    /// The file must contain one decimal 32-bit integer per line. On success
    /// it is rewritten with the same integers in non-decreasing order. An
    /// input with no values leaves the file untouched. Temporary run files
    /// are removed on every exit path.
    pub fn sort(&self, path: &Path) -> Result<(), SortError> {
        let mut profiler = Profiler::new();
        let mut buf = ChunkBuffer::new(self.buf_len);
        // Removed on drop, which covers the error paths below.
        let tmp_dir = self.init_tmp_dir()?;

        let fcount = self.read_chunks(path, tmp_dir.path(), &mut buf, &mut profiler)?;
        if fcount == 0 {
            log::info!("input contains no values, nothing to sort");
            return Ok(());
        }

        profiler.enter(Stage::Merge);
        let mut merger = KwayMerger::new(tmp_dir.path(), fcount);
        let merged = merger.merge(buf.backing_mut())?;
        profiler.leave(Stage::Merge);

        profiler.enter(Stage::Write);
        self.write_output(path, &merged, &mut buf)?;
        profiler.leave(Stage::Write);

        profiler.report();
        return Ok(());
    }

    /// Streams the input file, sorting and spilling one chunk at a time.
    /// Returns the number of stage-0 run files produced.
    fn read_chunks(
        &self,
        path: &Path,
        tmp_dir: &Path,
        buf: &mut ChunkBuffer,
        profiler: &mut Profiler,
    ) -> Result<usize, SortError> {
        let reader = io::BufReader::new(fs::File::open(path)?);
        let mut fcount = 0;

        profiler.enter(Stage::Read);
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let value = line.parse::<i32>().map_err(|source| SortError::Parse {
                line: index + 1,
                source,
            })?;

            buf.push(value);
            if buf.is_full() {
                profiler.leave(Stage::Read);
                self.spill_chunk(tmp_dir, buf, fcount, profiler)?;
                fcount += 1;
                profiler.enter(Stage::Read);
            }
        }
        profiler.leave(Stage::Read);

        // Remainder
        if !buf.is_empty() {
            self.spill_chunk(tmp_dir, buf, fcount, profiler)?;
            fcount += 1;
        }

        log::debug!("ingest produced {} runs", fcount);
        return Ok(fcount);
    }

    /// Sorts the buffered chunk and spills it to the next stage-0 run file.
    fn spill_chunk(
        &self,
        tmp_dir: &Path,
        buf: &mut ChunkBuffer,
        index: usize,
        profiler: &mut Profiler,
    ) -> Result<(), SortError> {
        profiler.enter(Stage::Sort);
        psort::sort_chunk(&self.thread_pool, buf.as_mut_slice(), self.threads);
        profiler.leave(Stage::Sort);

        let path = chunk::run_path(tmp_dir, 0, index);
        log::debug!("writing run {}", path.display());
        chunk::write_run(&path, buf.as_slice())?;

        buf.clear();
        return Ok(());
    }

    /// Serializes the merged binary file back to the input path as text.
    fn write_output(
        &self,
        path: &Path,
        merged: &Path,
        buf: &mut ChunkBuffer,
    ) -> Result<(), SortError> {
        let mut reader = chunk::open_run(merged)?;
        let mut writer = io::BufWriter::new(fs::File::create(path)?);
        let window = buf.backing_mut();

        loop {
            let count = chunk::read_block(&mut reader, window)?;
            if count == 0 {
                break;
            }
            for value in &window[..count] {
                writeln!(writer, "{}", value)?;
            }
        }
        writer.flush()?;

        return Ok(());
    }
}
