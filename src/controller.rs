//! Controls the execution of a mapreduce instance.
//!
//! There are two ways to run a job:
//!
//! * `MRController::start()` spawns one thread per worker and returns a `JobHandle` at once;
//!   the caller can poll its state, wait for it, and finally close it to get the output back.
//! * `MRController::run()` runs a job to completion on a scoped thread pool. It borrows the
//!   MapReducer and the input instead of taking ownership.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, info};

extern crate scoped_threadpool;
use self::scoped_threadpool::Pool;

use crate::error::{MRError, MRResult};
use crate::mapreducer::{InputRecord, MapReducer};
use crate::parameters::MRParameters;
use crate::record_types::{OutputSink, Record};
use crate::state::JobState;
use crate::worker::{first_error, run_guarded, JobContext, JobStats};

/// What the worker threads of a started job share.
struct Job<MR: MapReducer, O> {
    mr: MR,
    input: Arc<[InputRecord<MR>]>,
    sink: Mutex<O>,
    ctx: JobContext<MR>,
}

/// A running job. Obtained from `MRController::start()`; must be closed with `close()` to
/// get the output and release the worker threads. Dropping a handle without closing it
/// detaches the workers: they run to completion, but the output is lost.
pub struct JobHandle<MR: MapReducer, O> {
    job: Arc<Job<MR, O>>,
    workers: Vec<JoinHandle<MRResult<()>>>,
}

impl<MR, O> JobHandle<MR, O>
    where MR: MapReducer + 'static,
          O: OutputSink<MR::OutKey, MR::OutValue> + 'static
{
    /// A snapshot of the job's progress. Never blocks.
    pub fn state(&self) -> JobState {
        self.job.ctx.state.snapshot()
    }

    /// Blocks until all groups have been reduced. Returns an error if the job was abandoned
    /// because a worker failed; `close()` tells which one.
    pub fn wait(&self) -> MRResult<()> {
        self.job.ctx.completion.wait();
        if self.job.ctx.is_abandoned() {
            Err(MRError::Abandoned)
        } else {
            Ok(())
        }
    }

    /// Waits for the job, joins all worker threads and returns the output sink.
    pub fn close(self) -> MRResult<O> {
        self.close_with_stats().map(|(out, _)| out)
    }

    /// Like `close()`, but also returns the job's counters.
    pub fn close_with_stats(self) -> MRResult<(O, JobStats)> {
        self.job.ctx.completion.wait();

        let results = self.workers
                          .into_iter()
                          .enumerate()
                          .map(|(i, w)| w.join().unwrap_or_else(|p| Err(MRError::from_panic(i, p))))
                          .collect();
        first_error(results)?;

        let job = Arc::into_inner(self.job).ok_or(MRError::Abandoned)?;
        let stats = job.ctx.stats().ok_or(MRError::Abandoned)?;
        debug!("job {}: closed", job.ctx.params.thread_name_prefix);
        let out = job.sink.into_inner().unwrap_or_else(|e| e.into_inner());
        Ok((out, stats))
    }
}

pub struct MRController;

impl MRController {
    /// Starts a job: `params.threads` workers map `input` and reduce into `out`. Returns
    /// immediately; the workers are running (or about to) when this returns.
    ///
    /// Fails without starting anything if the parameters are invalid. If a worker thread
    /// cannot be spawned, the workers already started are stopped and joined, and the error
    /// is returned.
    pub fn start<MR, O, In>(mr: MR, params: MRParameters, input: In, out: O) -> MRResult<JobHandle<MR, O>>
        where MR: MapReducer + 'static,
              O: OutputSink<MR::OutKey, MR::OutValue> + 'static,
              In: Into<Arc<[InputRecord<MR>]>>
    {
        params.validate()?;
        let input = input.into();
        info!("job {}: starting on {} inputs with {} workers",
              params.thread_name_prefix,
              input.len(),
              params.threads);

        let job = Arc::new(Job {
            mr,
            ctx: JobContext::new(params.clone(), input.len()),
            input,
            sink: Mutex::new(out),
        });

        let mut workers = Vec::with_capacity(params.threads);
        for i in 0..params.threads {
            let mut builder = thread::Builder::new().name(params.worker_name(i));
            if let Some(size) = params.stack_size {
                builder = builder.stack_size(size);
            }

            let shared = job.clone();
            let spawned = builder.spawn(move || {
                let job = &*shared;
                run_guarded(i, &job.mr, &job.input, &job.sink, &job.ctx)
            });

            match spawned {
                Ok(w) => workers.push(w),
                Err(e) => {
                    job.ctx.abandon();
                    for w in workers {
                        let _ = w.join();
                    }
                    return Err(MRError::Spawn {
                        worker: i,
                        source: e,
                    });
                }
            }
        }

        Ok(JobHandle { job, workers })
    }

    /// Runs a job to completion on a scoped thread pool and returns its output.
    pub fn run<MR: MapReducer>(mr: &MR,
                               params: MRParameters,
                               input: &[InputRecord<MR>])
                               -> MRResult<Vec<Record<MR::OutKey, MR::OutValue>>> {
        MRController::run_into(mr, params, input, Vec::new())
    }

    /// Like `run()`, appending the output to `out`.
    pub fn run_into<MR, O>(mr: &MR, params: MRParameters, input: &[InputRecord<MR>], out: O) -> MRResult<O>
        where MR: MapReducer,
              O: OutputSink<MR::OutKey, MR::OutValue>
    {
        params.validate()?;
        info!("job {}: running on {} inputs with {} pooled workers",
              params.thread_name_prefix,
              input.len(),
              params.threads);

        let ctx: JobContext<MR> = JobContext::new(params.clone(), input.len());
        let sink = Mutex::new(out);
        let mut results: Vec<MRResult<()>> = (0..params.threads).map(|_| Ok(())).collect();

        // All workers have to run at the same time (they meet at the barrier), so the pool
        // has exactly one thread per worker.
        let threads = u32::try_from(params.threads)
                          .map_err(|_| MRError::InvalidConcurrency(params.threads))?;
        let mut pool = Pool::new(threads);
        pool.scoped(|scope| {
            for (i, result) in results.iter_mut().enumerate() {
                let (ctx, sink) = (&ctx, &sink);
                scope.execute(move || {
                    *result = run_guarded(i, mr, input, sink, ctx);
                });
            }
        });

        first_error(results)?;
        Ok(sink.into_inner().unwrap_or_else(|e| e.into_inner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure_mr::ClosureMapReducer;
    use crate::parameters::MergeStrategy;
    use crate::record_types::{MEmitter, MultiRecord, REmitter};
    use crate::sort::dict_string_less;
    use crate::state::Stage;
    use crate::util::PosRecordIterator;
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    // Input: integers; key1 is the number, value1 unused.
    fn numbers(n: u32) -> Vec<Record<u32, ()>> {
        (0..n).map(|i| Record::new(i, ())).collect()
    }

    fn mod3_mapper(e: &mut MEmitter<u32, u32>, k: &u32, _: &()) {
        e.emit(k % 3, 1);
    }

    fn sum_reducer(e: &mut REmitter<u32, u32>, r: MultiRecord<u32, u32>) {
        let (k, vs) = r.into_parts();
        e.emit(k, vs.into_iter().sum());
    }

    fn mod3() -> ClosureMapReducer<u32, (), u32, u32, u32, u32> {
        ClosureMapReducer::new(mod3_mapper, sum_reducer)
    }

    fn sink() -> Vec<Record<u32, u32>> {
        Vec::new()
    }

    fn sorted<K: Ord + Clone, V: Ord + Clone>(mut v: Vec<Record<K, V>>) -> Vec<(K, V)> {
        v.sort_by(|a, b| (&a.key, &a.value).cmp(&(&b.key, &b.value)));
        v.into_iter().map(Record::into_pair).collect()
    }

    #[test]
    fn test_mod3_scenario() {
        let job = MRController::start(mod3(),
                                      MRParameters::new().set_concurrency(4),
                                      numbers(10),
                                      Vec::new())
                      .unwrap();
        job.wait().unwrap();
        assert_eq!(job.state(), JobState { stage: Stage::Done, percentage: 100.0 });
        let out = job.close().unwrap();
        assert_eq!(sorted(out), vec![(0, 4), (1, 3), (2, 3)]);
    }

    #[test]
    fn test_empty_input() {
        let job = MRController::start(mod3(), MRParameters::new().set_concurrency(3), numbers(0), sink())
                      .unwrap();
        job.wait().unwrap();
        assert_eq!(job.state(), JobState { stage: Stage::Done, percentage: 100.0 });
        let (out, stats) = job.close_with_stats().unwrap();
        assert!(out.is_empty());
        assert_eq!(stats.groups, 0);
    }

    #[test]
    fn test_more_threads_than_inputs() {
        let out = MRController::start(mod3(), MRParameters::new().set_concurrency(8), numbers(2), Vec::new())
                      .unwrap()
                      .close()
                      .unwrap();
        assert_eq!(sorted(out), vec![(0, 1), (1, 1)]);
    }

    #[test]
    fn test_zero_threads_fails_fast() {
        match MRController::start(mod3(), MRParameters::new().set_concurrency(0), numbers(5), sink()) {
            Err(MRError::InvalidConcurrency(0)) => (),
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("started a job without workers"),
        }
        assert!(matches!(MRController::run(&mod3(), MRParameters::new().set_concurrency(0), &numbers(5)),
                         Err(MRError::InvalidConcurrency(0))));
    }

    #[test]
    fn test_sink_is_appended_to() {
        let existing = vec![Record::new(99, 99)];
        let out = MRController::start(mod3(), MRParameters::new().set_concurrency(2), numbers(3), existing)
                      .unwrap()
                      .close()
                      .unwrap();
        assert_eq!(out[0], Record::new(99, 99));
        assert_eq!(out.len(), 4);

        let pairs: Vec<(u32, u32)> = MRController::run_into(&mod3(), MRParameters::new(), &numbers(3), Vec::new())
                                         .unwrap();
        assert_eq!(pairs.len(), 3);
    }

    fn slow_mapper(e: &mut MEmitter<u32, u32>, k: &u32, _: &()) {
        thread::sleep(Duration::from_millis(1));
        e.emit(k % 17, *k);
    }

    #[test]
    fn test_stage_never_regresses() {
        let mr = ClosureMapReducer::new(slow_mapper, sum_reducer);
        let job = MRController::start(mr, MRParameters::new().set_concurrency(4), numbers(400), sink())
                      .unwrap();

        let mut last = job.state();
        loop {
            let st = job.state();
            assert!(st.stage >= last.stage, "{} after {}", st, last);
            if st.stage == last.stage {
                assert!(st.percentage >= last.percentage, "{} after {}", st, last);
            }
            last = st;
            if st.stage == Stage::Done {
                break;
            }
            thread::yield_now();
        }
        assert_eq!(job.close().unwrap().len(), 17);
    }

    fn slow_reducer(e: &mut REmitter<u32, u32>, r: MultiRecord<u32, u32>) {
        thread::sleep(Duration::from_millis(2));
        sum_reducer(e, r)
    }

    #[test]
    fn test_reduce_progress_is_reported() {
        let mr = ClosureMapReducer::new(tag_mapper, slow_reducer);
        let job = MRController::start(mr, MRParameters::new().set_concurrency(2), numbers(300), sink())
                      .unwrap();

        let mut stages = vec![job.state().stage];
        let mut reducing_pct = 0.0;
        loop {
            let st = job.state();
            if st.stage != *stages.last().unwrap() {
                stages.push(st.stage);
            }
            if st.stage == Stage::Reducing {
                assert!(st.percentage >= reducing_pct, "{} after {}%", st, reducing_pct);
                reducing_pct = st.percentage;
            }
            if st.stage == Stage::Done {
                break;
            }
            thread::sleep(Duration::from_micros(100));
        }

        assert!(stages.contains(&Stage::Reducing), "reducing never observed: {:?}", stages);
        assert!(stages.windows(2).all(|w| w[0] < w[1]), "{:?}", stages);
        assert_eq!(stages.last(), Some(&Stage::Done));
        assert_eq!(job.close().unwrap().len(), 300);
    }

    fn word_mapper(e: &mut MEmitter<String, u32>, _: &u64, line: &String) {
        for w in line.split_whitespace() {
            e.emit(String::from(w), 1);
        }
    }

    fn word_reducer(e: &mut REmitter<String, u32>, r: MultiRecord<String, u32>) {
        let (k, vs) = r.into_parts();
        e.emit(k, vs.into_iter().sum());
    }

    fn text() -> Vec<Record<u64, String>> {
        let lines = vec!["the quick brown fox", "jumps over The lazy dog", "THE END", "fox and dog"];
        PosRecordIterator::new(lines.into_iter().map(String::from)).collect()
    }

    #[test]
    fn test_wordcount_merge_strategies_agree() {
        let mr = ClosureMapReducer::new(word_mapper, word_reducer);
        let tree = MRController::run(&mr, MRParameters::new().set_concurrency(3), &text()).unwrap();
        let concat = MRController::run(&mr,
                                       MRParameters::new()
                                           .set_concurrency(3)
                                           .set_merge_strategy(MergeStrategy::ConcatSort),
                                       &text())
                         .unwrap();
        let tree = sorted(tree);
        assert_eq!(tree, sorted(concat));
        assert!(tree.contains(&(String::from("fox"), 2)));
        assert!(tree.contains(&(String::from("the"), 1)));
    }

    #[test]
    fn test_case_insensitive_grouping() {
        let mr = ClosureMapReducer::with_comparator(word_mapper, word_reducer, dict_string_less);
        let out = MRController::run(&mr, MRParameters::new().set_concurrency(2), &text()).unwrap();

        let counts: BTreeMap<String, u32> = out.into_iter()
                                               .map(|r| (r.key.to_lowercase(), r.value))
                                               .collect();
        assert_eq!(counts.get("the"), Some(&3));
        assert_eq!(counts.get("dog"), Some(&2));
        assert_eq!(counts.len(), 10);
    }

    // Every input index is mapped exactly once: each record is tagged with its own index and
    // each index forms a group of its own.
    fn tag_mapper(e: &mut MEmitter<u32, u32>, k: &u32, _: &()) {
        e.emit(*k, 1);
    }

    #[test]
    fn test_repeated_runs_agree() {
        let mr = ClosureMapReducer::new(slow_mapper, sum_reducer);
        let first = sorted(MRController::run(&mr, MRParameters::new().set_concurrency(5), &numbers(60)).unwrap());
        for _ in 0..3 {
            let again = MRController::run(&mr, MRParameters::new().set_concurrency(5), &numbers(60)).unwrap();
            assert_eq!(sorted(again), first);
        }
    }

    fn panicking_reducer(_: &mut REmitter<u32, u32>, r: MultiRecord<u32, u32>) {
        if *r.key() == 1 {
            panic!("reducer failed on key 1");
        }
    }

    #[test]
    fn test_reduce_panic_fails_job() {
        let mr = ClosureMapReducer::new(mod3_mapper, panicking_reducer);
        let job = MRController::start(mr, MRParameters::new().set_concurrency(4), numbers(30), sink())
                      .unwrap();
        assert!(job.wait().is_err());
        match job.close() {
            Err(MRError::WorkerPanicked { message, .. }) => assert_eq!(message, "reducer failed on key 1"),
            other => panic!("unexpected: {:?}", other.map(|o| o.len())),
        }

        let mr = ClosureMapReducer::new(mod3_mapper, panicking_reducer);
        assert!(matches!(MRController::run(&mr, MRParameters::new().set_concurrency(4), &numbers(30)),
                         Err(MRError::WorkerPanicked { .. })));
    }

    #[test]
    fn test_named_threads() {
        fn name_mapper(e: &mut MEmitter<String, u32>, _: &u32, _: &()) {
            e.emit(String::from(thread::current().name().unwrap_or("")), 1);
        }
        let mr = ClosureMapReducer::new(name_mapper, word_reducer);
        let out = MRController::start(mr,
                                      MRParameters::new().set_concurrency(1).set_name(String::from("wc")),
                                      numbers(3),
                                      Vec::new())
                      .unwrap()
                      .close()
                      .unwrap();
        assert_eq!(sorted(out), vec![(String::from("wc-0"), 3)]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_every_input_mapped_once(n in 0u32..300, threads in 1usize..9) {
            let mr = ClosureMapReducer::new(tag_mapper, sum_reducer);
            let out = MRController::start(mr, MRParameters::new().set_concurrency(threads), numbers(n), Vec::new())
                          .unwrap()
                          .close()
                          .unwrap();
            prop_assert_eq!(sorted(out), (0..n).map(|i| (i, 1)).collect::<Vec<_>>());
        }

        #[test]
        fn test_thread_count_does_not_change_output(n in 0u32..200, threads in 5usize..12) {
            let single = MRController::run(&mod3(), MRParameters::new().set_concurrency(1), &numbers(n)).unwrap();
            let many = MRController::run(&mod3(), MRParameters::new().set_concurrency(threads), &numbers(n)).unwrap();
            prop_assert_eq!(sorted(single), sorted(many));
        }
    }
}
