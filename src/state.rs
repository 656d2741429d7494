//! Job progress as seen by the caller.
//!
//! Stage and percentage are packed into one atomic word: a snapshot is always a pair that
//! was current at some point, stages only ever advance, and the percentage only grows
//! within a stage. The percentage is telemetry; use the stage (or `JobHandle::wait()`) to
//! find out whether a job is finished.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};

use crate::util::{lock, wait};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Stage {
    NotStarted = 0,
    Mapping = 1,
    Reducing = 2,
    Done = 3,
}

impl Stage {
    fn from_bits(b: u64) -> Stage {
        match b {
            0 => Stage::NotStarted,
            1 => Stage::Mapping,
            2 => Stage::Reducing,
            _ => Stage::Done,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match *self {
            Stage::NotStarted => "not started",
            Stage::Mapping => "mapping",
            Stage::Reducing => "reducing",
            Stage::Done => "done",
        };
        f.write_str(s)
    }
}

/// A snapshot of a job's progress.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JobState {
    pub stage: Stage,
    /// In [0; 100].
    pub percentage: f32,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({:.1}%)", self.stage, self.percentage)
    }
}

/// Computes done/total as a percentage; an empty phase counts as complete.
pub fn percentage(done: usize, total: usize) -> f32 {
    if total == 0 {
        100.0
    } else {
        (done.min(total) as f64 * 100.0 / total as f64) as f32
    }
}

fn pack(stage: Stage, pct: f32) -> u64 {
    ((stage as u64) << 32) | pct.clamp(0.0, 100.0).to_bits() as u64
}

fn unpack(word: u64) -> JobState {
    JobState {
        stage: Stage::from_bits(word >> 32),
        percentage: f32::from_bits(word as u32),
    }
}

/// Shared, lock-free cell holding a job's state.
pub struct StateCell {
    word: AtomicU64,
}

impl StateCell {
    pub fn new() -> StateCell {
        StateCell { word: AtomicU64::new(pack(Stage::NotStarted, 0.0)) }
    }

    pub fn snapshot(&self) -> JobState {
        unpack(self.word.load(Ordering::Acquire))
    }

    /// Moves to `stage` with 0% (100% for Done), unless the job is already at or past it.
    /// Returns whether this call made the transition.
    pub fn advance(&self, stage: Stage) -> bool {
        let pct = if stage == Stage::Done { 100.0 } else { 0.0 };
        self.word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                if unpack(cur).stage >= stage {
                    None
                } else {
                    Some(pack(stage, pct))
                }
            })
            .is_ok()
    }

    /// Raises the percentage of `stage`. Ignored if the job has moved on to another stage or
    /// the stored value is already higher.
    pub fn progress(&self, stage: Stage, pct: f32) {
        let _ = self.word.fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
            let st = unpack(cur);
            if st.stage != stage || st.percentage >= pct {
                None
            } else {
                Some(pack(stage, pct))
            }
        });
    }
}

impl Default for StateCell {
    fn default() -> Self {
        StateCell::new()
    }
}

/// One-shot completion signal that `JobHandle::wait()` blocks on. Raised once the job is done
/// or abandoned.
pub struct Completion {
    finished: Mutex<bool>,
    cv: Condvar,
}

impl Completion {
    pub fn new() -> Completion {
        Completion {
            finished: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    pub fn signal(&self) {
        let mut finished = lock(&self.finished);
        *finished = true;
        self.cv.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn is_signaled(&self) -> bool {
        *lock(&self.finished)
    }

    pub fn wait(&self) {
        let mut finished = lock(&self.finished);
        while !*finished {
            finished = wait(&self.cv, finished);
        }
    }
}

impl Default for Completion {
    fn default() -> Self {
        Completion::new()
    }
}
