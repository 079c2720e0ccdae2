//! Multi-pass K-way file merger.
//!
//! Consolidates sorted stage-0 runs into a single sorted file. Each pass
//! merges groups of up to [`MERGE_FANIN`] files of stage `s` into one file of
//! stage `s + 1`, until a single file remains. Single-threaded: the merge is
//! I/O bound, CPU is not a bottleneck here.

use std::fs;
use std::io;
use std::io::prelude::*;
use std::mem;
use std::path::{Path, PathBuf};

use log;

use crate::chunk;
use crate::heap::{HeapEl, MinHeap};

/// "K" in "K-way merge": the maximum number of files merged in one group.
pub const MERGE_FANIN: usize = 16;

fn ceil_div(value: usize, div: usize) -> usize {
    (value + div - 1) / div
}

/// Per-stream window into the shared buffer.
///
/// `data[..count]` holds the currently loaded portion of the stream's file
/// and `pos` is the read cursor within it; `pos <= count <= data.len()`.
/// A `count` of zero after a refill means the file is exhausted.
struct MergeBlock<'a> {
    data: &'a mut [i32],
    count: usize,
    pos: usize,
}

/// Multi-pass K-way merger over the run files of a temp directory.
pub struct KwayMerger<'a> {
    tmpdir: &'a Path,
    fcount: usize,
    queue: MinHeap,
}

impl<'a> KwayMerger<'a> {
    /// Creates a merger for `fcount` stage-0 run files located in `tmpdir`.
    pub fn new(tmpdir: &'a Path, fcount: usize) -> Self {
        assert!(fcount > 0);

        KwayMerger {
            tmpdir,
            fcount,
            queue: MinHeap::with_capacity(MERGE_FANIN),
        }
    }

    /// Runs all merge passes and returns the path of the terminal file.
    ///
    /// `buf` is the shared chunk buffer. It must hold more than
    /// [`MERGE_FANIN`] integers so that every per-stream window gets at least
    /// one slot.
    pub fn merge(&mut self, buf: &mut [i32]) -> io::Result<PathBuf> {
        assert!(buf.len() > MERGE_FANIN);

        let stages = self.stages();
        log::debug!("merging {} runs in {} stages", self.fcount, stages);

        for stage in 0..stages {
            self.merge_stage(buf, stage)?;
        }

        return Ok(chunk::run_path(self.tmpdir, stages, 0));
    }

    /// Number of merge passes needed to reduce the run count to one.
    fn stages(&self) -> usize {
        let mut stages = 0;
        let mut files = self.fcount;

        while files > 1 {
            files = ceil_div(files, MERGE_FANIN);
            stages += 1;
        }

        stages
    }

    /// Number of files present at the given stage.
    fn stage_files(&self, stage: usize) -> usize {
        let mut files = self.fcount;

        for _ in 0..stage {
            files = ceil_div(files, MERGE_FANIN);
        }

        files
    }

    /// Merges all files of one stage in contiguous groups of up to
    /// [`MERGE_FANIN`].
    fn merge_stage(&mut self, buf: &mut [i32], stage: usize) -> io::Result<()> {
        let fcount = self.stage_files(stage);
        let mut inputs = Vec::with_capacity(MERGE_FANIN);

        for index in 0..fcount {
            inputs.push(chunk::open_run(&chunk::run_path(self.tmpdir, stage, index))?);
            if inputs.len() == MERGE_FANIN {
                self.merge_group(buf, mem::take(&mut inputs), stage, index / MERGE_FANIN)?;
            }
        }

        // Remainder group
        match inputs.len() {
            0 => {}
            1 => {
                // Fast path: a lone leftover run is copied forward, not
                // merged.
                let out_path = chunk::run_path(self.tmpdir, stage + 1, fcount / MERGE_FANIN);
                log::debug!("promoting lone run to {}", out_path.display());

                let mut reader = inputs.remove(0);
                self.copy_run(buf, &mut reader, &out_path)?;
            }
            _ => self.merge_group(buf, inputs, stage, fcount / MERGE_FANIN)?,
        }

        return Ok(());
    }

    /// Merges one group of input files into the output file of the next
    /// stage.
    fn merge_group(
        &mut self,
        buf: &mut [i32],
        mut inputs: Vec<io::BufReader<fs::File>>,
        stage: usize,
        out_index: usize,
    ) -> io::Result<()> {
        let out_path = chunk::run_path(self.tmpdir, stage + 1, out_index);
        log::debug!("merging {} runs into {}", inputs.len(), out_path.display());

        // Partition the buffer into one equal window per possible input
        // stream plus one for the output.
        let window = buf.len() / (MERGE_FANIN + 1);
        let (input_area, out_area) = buf[..window * (MERGE_FANIN + 1)].split_at_mut(window * MERGE_FANIN);

        let mut out = MergeBlock {
            data: out_area,
            count: 0,
            pos: 0,
        };
        let mut blocks = Vec::from_iter(
            input_area
                .chunks_mut(window)
                .take(inputs.len())
                .map(|data| MergeBlock { data, count: 0, pos: 0 }),
        );

        // Prime the queue with the head of each input stream.
        self.queue.clear();
        for (index, block) in blocks.iter_mut().enumerate() {
            block.count = chunk::read_block(&mut inputs[index], block.data)?;
            block.pos = 0;
            if block.count > 0 {
                self.queue.insert(HeapEl {
                    key: block.data[0],
                    src: index as u16,
                });
                block.pos = 1;
            }
        }

        let mut writer = chunk::create_run(&out_path)?;

        // Pump: move the minimum to the output window, then requeue from the
        // stream it came from.
        while let Some(el) = self.queue.pop() {
            out.data[out.pos] = el.key;
            out.pos += 1;
            if out.pos == out.data.len() {
                chunk::write_block(&mut writer, out.data)?;
                out.pos = 0;
            }

            let src = el.src as usize;
            let block = &mut blocks[src];
            if block.pos < block.count {
                self.queue.insert(HeapEl {
                    key: block.data[block.pos],
                    src: el.src,
                });
                block.pos += 1;
            } else if block.count != 0 {
                // Window exhausted; load the next one from the file.
                block.count = chunk::read_block(&mut inputs[src], block.data)?;
                block.pos = 0;
                if block.count > 0 {
                    self.queue.insert(HeapEl {
                        key: block.data[0],
                        src: el.src,
                    });
                    block.pos = 1;
                }
            }
        }

        // Remainder
        if out.pos != 0 {
            chunk::write_block(&mut writer, &out.data[..out.pos])?;
        }
        writer.flush()?;

        return Ok(());
    }

    /// Copies a run forward one stage, using the whole buffer as the I/O
    /// block.
    fn copy_run(
        &self,
        buf: &mut [i32],
        reader: &mut io::BufReader<fs::File>,
        out_path: &Path,
    ) -> io::Result<()> {
        let mut writer = chunk::create_run(out_path)?;

        loop {
            let count = chunk::read_block(reader, buf)?;
            if count == 0 {
                break;
            }
            chunk::write_block(&mut writer, &buf[..count])?;
        }
        writer.flush()?;

        return Ok(());
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use rand::Rng;
    use rstest::*;

    use super::{KwayMerger, MERGE_FANIN};
    use crate::chunk;

    fn write_runs(dir: &Path, runs: &[Vec<i32>]) {
        for (index, run) in runs.iter().enumerate() {
            chunk::write_run(&chunk::run_path(dir, 0, index), run).unwrap();
        }
    }

    fn read_run(path: &Path) -> Vec<i32> {
        let mut reader = chunk::open_run(path).unwrap();
        let mut window = [0i32; 8];
        let mut values = Vec::new();

        loop {
            let count = chunk::read_block(&mut reader, &mut window).unwrap();
            if count == 0 {
                break;
            }
            values.extend_from_slice(&window[..count]);
        }

        values
    }

    #[rstest]
    #[case(1, 0)]
    #[case(2, 1)]
    #[case(16, 1)]
    #[case(17, 2)]
    #[case(256, 2)]
    #[case(257, 3)]
    fn test_stage_count(#[case] fcount: usize, #[case] expected: usize) {
        let merger = KwayMerger::new(Path::new("unused"), fcount);
        assert_eq!(merger.stages(), expected);
    }

    #[test]
    fn test_stage_files() {
        let merger = KwayMerger::new(Path::new("unused"), 257);

        assert_eq!(merger.stage_files(0), 257);
        assert_eq!(merger.stage_files(1), 17);
        assert_eq!(merger.stage_files(2), 2);
        assert_eq!(merger.stage_files(3), 1);
    }

    #[test]
    fn test_single_run_needs_no_pass() {
        let dir = tempfile::tempdir().unwrap();
        write_runs(dir.path(), &[vec![1, 2, 3]]);

        let mut buf = vec![0i32; MERGE_FANIN + 1];
        let mut merger = KwayMerger::new(dir.path(), 1);
        let out = merger.merge(&mut buf).unwrap();

        assert_eq!(out, chunk::run_path(dir.path(), 0, 0));
        assert_eq!(read_run(&out), vec![1, 2, 3]);
    }

    #[test]
    fn test_merge_group_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let runs = vec![
            vec![-5, 4, 5, 7],
            vec![1, 6],
            vec![3, 3, 3],
            vec![i32::MIN, i32::MAX],
        ];
        write_runs(dir.path(), &runs);

        let mut buf = vec![0i32; 34];
        let mut merger = KwayMerger::new(dir.path(), runs.len());
        let out = merger.merge(&mut buf).unwrap();

        assert_eq!(out, chunk::run_path(dir.path(), 1, 0));
        assert_eq!(
            read_run(&out),
            vec![i32::MIN, -5, 1, 3, 3, 3, 4, 5, 6, 7, i32::MAX]
        );
    }

    #[test]
    fn test_lone_leftover_is_copied_forward() {
        // 17 runs: one full group plus a lone run that takes the copy path.
        let dir = tempfile::tempdir().unwrap();
        let runs = Vec::from_iter((0..17).map(|i| vec![i, i + 17, i + 34]));
        write_runs(dir.path(), &runs);

        let mut buf = vec![0i32; 34];
        let mut merger = KwayMerger::new(dir.path(), runs.len());
        let out = merger.merge(&mut buf).unwrap();

        assert_eq!(out, chunk::run_path(dir.path(), 2, 0));
        assert_eq!(read_run(&out), Vec::from_iter(0..51));
    }

    #[test]
    fn test_multi_stage_random_runs() {
        let mut rng = rand::thread_rng();
        let dir = tempfile::tempdir().unwrap();

        let mut all = Vec::new();
        let runs = Vec::from_iter((0..40).map(|_| {
            let len = rng.gen_range(1..=50);
            let mut run = Vec::from_iter((0..len).map(|_| rng.gen_range(-1000..1000)));
            run.sort_unstable();
            all.extend_from_slice(&run);
            run
        }));
        write_runs(dir.path(), &runs);

        // A tight buffer: two-integer windows, plenty of refills.
        let mut buf = vec![0i32; 34];
        let mut merger = KwayMerger::new(dir.path(), runs.len());
        let out = merger.merge(&mut buf).unwrap();

        all.sort_unstable();
        assert_eq!(read_run(&out), all);
    }
}
