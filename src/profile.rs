//! Wall-clock stage profiling.
//!
//! Accumulates time spent in each pipeline stage and reports it through the
//! `log` facade at debug level, so profiling output is a matter of log
//! configuration rather than a compile-time switch.

use std::time::{Duration, Instant};

use log;

const STAGE_COUNT: usize = 4;

/// Pipeline stages measured by the profiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading and parsing the input file.
    Read,
    /// In-memory chunk sorting.
    Sort,
    /// K-way merge of run files.
    Merge,
    /// Writing the output file.
    Write,
}

impl Stage {
    fn name(self) -> &'static str {
        match self {
            Stage::Read => "reading",
            Stage::Sort => "sorting",
            Stage::Merge => "merging",
            Stage::Write => "writing",
        }
    }
}

/// Accumulates wall-clock time per stage.
///
/// A stage may be entered and left multiple times; durations add up.
pub struct Profiler {
    started: [Option<Instant>; STAGE_COUNT],
    spent: [Duration; STAGE_COUNT],
    created: Instant,
}

impl Profiler {
    pub fn new() -> Self {
        Profiler {
            started: [None; STAGE_COUNT],
            spent: [Duration::ZERO; STAGE_COUNT],
            created: Instant::now(),
        }
    }

    /// Starts timing a stage.
    pub fn enter(&mut self, stage: Stage) {
        self.started[stage as usize] = Some(Instant::now());
    }

    /// Stops timing a stage, accumulating the elapsed time. Leaving a stage
    /// that was not entered is a no-op.
    pub fn leave(&mut self, stage: Stage) {
        if let Some(started) = self.started[stage as usize].take() {
            self.spent[stage as usize] += started.elapsed();
        }
    }

    /// Time accumulated in a stage so far.
    pub fn spent(&self, stage: Stage) -> Duration {
        self.spent[stage as usize]
    }

    /// Logs per-stage and total timings.
    pub fn report(&self) {
        for stage in [Stage::Read, Stage::Sort, Stage::Merge, Stage::Write] {
            log::debug!(
                "time in {:>8}: {:.2}s",
                stage.name(),
                self.spent(stage).as_secs_f64()
            );
        }
        log::debug!(
            "time in {:>8}: {:.2}s",
            "total",
            self.created.elapsed().as_secs_f64()
        );
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Profiler::new()
    }
}

#[cfg(test)]
mod test {
    use std::thread;
    use std::time::Duration;

    use super::{Profiler, Stage};

    #[test]
    fn test_spent_accumulates() {
        let mut profiler = Profiler::new();

        for _ in 0..2 {
            profiler.enter(Stage::Sort);
            thread::sleep(Duration::from_millis(5));
            profiler.leave(Stage::Sort);
        }

        assert!(profiler.spent(Stage::Sort) >= Duration::from_millis(10));
        assert_eq!(profiler.spent(Stage::Merge), Duration::ZERO);
    }

    #[test]
    fn test_leave_without_enter_is_noop() {
        let mut profiler = Profiler::new();
        profiler.leave(Stage::Read);
        assert_eq!(profiler.spent(Stage::Read), Duration::ZERO);
    }
}
