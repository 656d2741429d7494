//! Implements the Reduce phase.
//!
//! The shuffling worker produces groups into a ReduceQueue; all workers (including the
//! shuffler, once it is done) consume from it. Consumers stop only when the producer has
//! declared the total number of groups and all of them were handed out: an empty queue on
//! its own means nothing.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::{Condvar, Mutex};

use log::debug;

use crate::error::{MRError, MRResult};
use crate::mapreducer::MapReducer;
use crate::record_types::{OutputSink, REmitter};
use crate::util::{lock, wait};
use crate::worker::JobContext;

/// Where the reduce phase stands, as of one queue operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReduceProgress {
    /// Groups reduced so far.
    pub finished: usize,
    /// Total number of groups; known once the shuffle has finished.
    pub total: Option<usize>,
    /// Set for exactly one operation per job: the one after which all groups were reduced.
    pub completed: bool,
}

struct QueueState<G> {
    groups: VecDeque<G>,
    published: usize,
    claimed: usize,
    finished: usize,
    total: Option<usize>,
    abandoned: bool,
}

impl<G> QueueState<G> {
    fn progress(&self, completed: bool) -> ReduceProgress {
        ReduceProgress {
            finished: self.finished,
            total: self.total,
            completed,
        }
    }
    fn all_finished(&self) -> bool {
        self.total == Some(self.finished)
    }
}

/// Producer/consumer queue of groups waiting to be reduced, with an explicit end-of-production
/// marker.
pub struct ReduceQueue<G> {
    state: Mutex<QueueState<G>>,
    available: Condvar,
}

impl<G> ReduceQueue<G> {
    pub fn new() -> ReduceQueue<G> {
        ReduceQueue {
            state: Mutex::new(QueueState {
                groups: VecDeque::new(),
                published: 0,
                claimed: 0,
                finished: 0,
                total: None,
                abandoned: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Adds a complete group; wakes up one consumer. The group is in the queue before anyone
    /// is woken.
    pub fn publish(&self, group: G) {
        let mut st = lock(&self.state);
        debug_assert!(st.total.is_none(), "publish after close_production");
        st.groups.push_back(group);
        st.published += 1;
        drop(st);
        self.available.notify_one();
    }

    /// Marks the end of production: no more groups will be published.
    pub fn close_production(&self) -> ReduceProgress {
        let mut st = lock(&self.state);
        st.total = Some(st.published);
        let completed = st.all_finished();
        let progress = st.progress(completed);
        drop(st);
        self.available.notify_all();
        progress
    }

    /// Takes one group off the queue, blocking while the queue is empty but production is
    /// still going on. Returns Ok(None) once every group has been handed out.
    pub fn pop(&self) -> MRResult<Option<G>> {
        let mut st = lock(&self.state);
        loop {
            if st.abandoned {
                return Err(MRError::Abandoned);
            }
            if let Some(g) = st.groups.pop_front() {
                st.claimed += 1;
                return Ok(Some(g));
            }
            if st.total == Some(st.claimed) {
                return Ok(None);
            }
            st = wait(&self.available, st);
        }
    }

    /// Records that one popped group has been reduced.
    pub fn finish_one(&self) -> ReduceProgress {
        let mut st = lock(&self.state);
        st.finished += 1;
        debug_assert!(st.finished <= st.claimed);
        let completed = st.all_finished();
        st.progress(completed)
    }

    /// Wakes up all consumers with an error.
    pub fn abandon(&self) {
        let mut st = lock(&self.state);
        st.abandoned = true;
        drop(st);
        self.available.notify_all();
    }
}

impl<G> Default for ReduceQueue<G> {
    fn default() -> Self {
        ReduceQueue::new()
    }
}

/// The reduce loop run by every worker. Returns the number of groups this worker reduced.
pub fn consume<MR, O>(worker: usize, mr: &MR, ctx: &JobContext<MR>, sink: &Mutex<O>) -> MRResult<usize>
    where MR: MapReducer,
          O: OutputSink<MR::OutKey, MR::OutValue>
{
    let mut reduced = 0;

    while let Some(group) = ctx.queue.pop()? {
        let mut e = REmitter::new();
        mr.reduce(&mut e, group);

        let out = e._get();
        if !out.is_empty() {
            ctx.outputs.fetch_add(out.len(), Ordering::Relaxed);
            let mut sink = lock(sink);
            for r in out {
                sink.append(r.key, r.value);
            }
        }

        reduced += 1;
        ctx.report_reduce(ctx.queue.finish_one());
    }

    debug!("worker {}: reduced {} groups", worker, reduced);
    Ok(reduced)
}
