//! Implements the Map phase.
//!

use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;

use crate::error::{MRError, MRResult};
use crate::mapreducer::{InputRecord, MapRecord, MapReducer};
use crate::record_types::MEmitter;
use crate::sort::sort_records;
use crate::state::{percentage, Stage, StateCell};

/// Hands out input indices to workers. Every index in [0; len) is handed out exactly once,
/// without locking.
pub struct WorkDistributor {
    next: AtomicUsize,
    mapped: AtomicUsize,
    len: usize,
}

impl WorkDistributor {
    pub fn new(len: usize) -> WorkDistributor {
        WorkDistributor {
            next: AtomicUsize::new(0),
            mapped: AtomicUsize::new(0),
            len,
        }
    }

    pub fn next(&self) -> Option<usize> {
        // Relaxed is enough: the counter only decides ownership of an index, the input itself
        // was published before the workers started.
        let i = self.next.fetch_add(1, Ordering::Relaxed);
        if i < self.len {
            Some(i)
        } else {
            None
        }
    }

    /// Records one finished map() call; returns how many have finished so far.
    fn mapped_one(&self) -> usize {
        self.mapped.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

/// This is the base of the mapping phase. Every worker thread runs one MapPartition: it pulls
/// input records from the shared distributor until there are none left, and collects the
/// emitted records in a private buffer which is sorted at the end.
pub struct MapPartition<'a, MR: MapReducer> {
    worker: usize,
    mr: &'a MR,
    input: &'a [InputRecord<MR>],
    distributor: &'a WorkDistributor,
    state: &'a StateCell,
    abandoned: &'a dyn Fn() -> bool,
}

impl<'a, MR: MapReducer> MapPartition<'a, MR> {
    pub fn new(worker: usize,
               mr: &'a MR,
               input: &'a [InputRecord<MR>],
               distributor: &'a WorkDistributor,
               state: &'a StateCell,
               abandoned: &'a dyn Fn() -> bool)
               -> MapPartition<'a, MR> {
        MapPartition {
            worker,
            mr,
            input,
            distributor,
            state,
            abandoned,
        }
    }

    /// Maps and sorts; returns the sorted map output of this partition.
    pub fn run(self) -> MRResult<Vec<MapRecord<MR>>> {
        let mut output = self.do_map()?;
        let mr = self.mr;
        sort_records(&mut output, &|a: &MR::Key, b: &MR::Key| mr.key_less(a, b));
        debug!("worker {}: sorted {} map output records", self.worker, output.len());
        Ok(output)
    }

    /// Executes the mapping phase.
    fn do_map(&self) -> MRResult<Vec<MapRecord<MR>>> {
        let mut e = MEmitter::new();
        let mut claimed = 0;

        while let Some(i) = self.distributor.next() {
            if (self.abandoned)() {
                return Err(MRError::Abandoned);
            }
            let record = &self.input[i];
            self.mr.map(&mut e, &record.key, &record.value);
            claimed += 1;

            let done = self.distributor.mapped_one();
            self.state.progress(Stage::Mapping, percentage(done, self.distributor.len()));
        }

        debug!("worker {}: mapped {} input records into {} records",
               self.worker,
               claimed,
               e.len());
        Ok(e._get())
    }
}
