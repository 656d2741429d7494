//! The state shared by the workers of one job, and the phase sequence every worker runs:
//! map, sort, barrier, (shuffle on worker 0), reduce.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use log::{debug, error, info};
use time::OffsetDateTime;

use crate::barrier::Barrier;
use crate::error::{MRError, MRResult};
use crate::map::{MapPartition, WorkDistributor};
use crate::mapreducer::{Group, InputRecord, MapRecord, MapReducer};
use crate::parameters::MRParameters;
use crate::record_types::OutputSink;
use crate::reduce::{consume, ReduceProgress, ReduceQueue};
use crate::shuffle::shuffle;
use crate::state::{percentage, Completion, Stage, StateCell};
use crate::util::lock;

/// The worker that runs the shuffle.
pub const SHUFFLER: usize = 0;

/// Counters describing a finished job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobStats {
    pub inputs: usize,
    pub intermediates: usize,
    pub groups: usize,
    pub outputs: usize,
    pub elapsed: time::Duration,
}

/// Everything the workers of one job share, apart from the MapReducer, the input and the
/// output sink (which are owned differently depending on how the job is run).
pub struct JobContext<MR: MapReducer> {
    pub params: MRParameters,
    pub distributor: WorkDistributor,
    pub barrier: Barrier,
    /// One slot per worker. A worker puts its sorted map output here before the barrier;
    /// the shuffler takes all of them after it.
    pub handoff: Vec<Mutex<Vec<MapRecord<MR>>>>,
    pub queue: ReduceQueue<Group<MR>>,
    pub state: StateCell,
    pub completion: Completion,

    abandoned: AtomicBool,
    intermediates: AtomicUsize,
    pub outputs: AtomicUsize,
    started: OffsetDateTime,
    stats: Mutex<Option<JobStats>>,
}

impl<MR: MapReducer> JobContext<MR> {
    pub fn new(params: MRParameters, inputs: usize) -> JobContext<MR> {
        let threads = params.threads;
        JobContext {
            distributor: WorkDistributor::new(inputs),
            barrier: Barrier::new(threads),
            handoff: (0..threads).map(|_| Mutex::new(Vec::new())).collect(),
            queue: ReduceQueue::new(),
            state: StateCell::new(),
            completion: Completion::new(),
            abandoned: AtomicBool::new(false),
            intermediates: AtomicUsize::new(0),
            outputs: AtomicUsize::new(0),
            started: OffsetDateTime::now_utc(),
            stats: Mutex::new(None),
            params,
        }
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::Acquire)
    }

    /// Gives up on the job: every blocked worker wakes up and bails out, and waiters on the
    /// job return.
    pub fn abandon(&self) {
        if !self.abandoned.swap(true, Ordering::AcqRel) {
            error!("job {}: abandoned", self.params.thread_name_prefix);
        }
        self.barrier.break_barrier();
        self.queue.abandon();
        self.completion.signal();
    }

    /// Publishes reduce progress; the operation that completed the last group finishes the
    /// job.
    pub fn report_reduce(&self, progress: ReduceProgress) {
        if let Some(total) = progress.total {
            self.state.progress(Stage::Reducing, percentage(progress.finished, total));
        }
        if progress.completed {
            self.complete(progress.total.unwrap_or(progress.finished));
        }
    }

    fn complete(&self, groups: usize) {
        let stats = JobStats {
            inputs: self.distributor.len(),
            intermediates: self.intermediates.load(Ordering::Relaxed),
            groups,
            outputs: self.outputs.load(Ordering::Relaxed),
            elapsed: OffsetDateTime::now_utc() - self.started,
        };
        *lock(&self.stats) = Some(stats);
        self.state.advance(Stage::Done);
        info!("job {}: done; {} inputs, {} intermediate records, {} groups, {} outputs in {:.3}s",
              self.params.thread_name_prefix,
              stats.inputs,
              stats.intermediates,
              stats.groups,
              stats.outputs,
              stats.elapsed.as_seconds_f64());
        self.completion.signal();
    }

    pub fn stats(&self) -> Option<JobStats> {
        *lock(&self.stats)
    }
}

/// Runs all phases for worker `id`.
fn run_worker<MR, O>(id: usize,
                     mr: &MR,
                     input: &[InputRecord<MR>],
                     sink: &Mutex<O>,
                     ctx: &JobContext<MR>)
                     -> MRResult<()>
    where MR: MapReducer,
          O: OutputSink<MR::OutKey, MR::OutValue>
{
    ctx.state.advance(Stage::Mapping);
    debug!("worker {}: mapping", id);

    let abandoned = || ctx.is_abandoned();
    let output = MapPartition::new(id, mr, input, &ctx.distributor, &ctx.state, &abandoned).run()?;
    ctx.intermediates.fetch_add(output.len(), Ordering::Relaxed);
    *lock(&ctx.handoff[id]) = output;

    ctx.barrier.arrive_and_wait()?;
    // Every worker has stopped mapping by now; no Mapping progress can follow.
    ctx.state.advance(Stage::Reducing);
    debug!("worker {}: passed barrier", id);

    if id == SHUFFLER {
        shuffle(mr, ctx)?;
    }

    consume(id, mr, ctx, sink)?;
    Ok(())
}

/// Runs worker `id`, turning a panic in map() or reduce() into an error and abandoning the
/// job, so that the other workers don't wait for this one forever.
pub fn run_guarded<MR, O>(id: usize,
                          mr: &MR,
                          input: &[InputRecord<MR>],
                          sink: &Mutex<O>,
                          ctx: &JobContext<MR>)
                          -> MRResult<()>
    where MR: MapReducer,
          O: OutputSink<MR::OutKey, MR::OutValue>
{
    match panic::catch_unwind(AssertUnwindSafe(|| run_worker(id, mr, input, sink, ctx))) {
        Ok(r) => r,
        Err(payload) => {
            ctx.abandon();
            Err(MRError::from_panic(id, payload))
        }
    }
}

/// Picks the error to report for a job from the results of all of its workers: the failure
/// that caused the job to be abandoned, rather than its consequences on other workers.
pub fn first_error(results: Vec<MRResult<()>>) -> MRResult<()> {
    let mut secondary = None;
    for r in results {
        match r {
            Ok(()) => (),
            Err(e) if e.is_primary() => return Err(e),
            Err(e) => secondary = Some(e),
        }
    }
    match secondary {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
