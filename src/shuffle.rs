//! Implements the shuffle phase: merging the sorted outputs of all map partitions and cutting
//! the result into groups of equal keys.
//!
//! Only one worker shuffles. Groups are handed to the reduce queue as soon as they are
//! complete, so the other workers can start reducing while the merge is still running.

use std::iter::Peekable;
use std::mem;

use log::{debug, trace};

use crate::error::{MRError, MRResult};
use crate::mapreducer::{Group, MapRecord, MapReducer};
use crate::parameters::MergeStrategy;
use crate::record_types::{MultiRecord, Record};
use crate::shard_merge::ShardMergeIterator;
use crate::sort::{keys_equal, sort_records};
use crate::util::lock;
use crate::worker::JobContext;

/// Iterator adapter: Converts an Iterator<Item=Record> into an Iterator<Item=MultiRecord> by
/// grouping subsequent records with equal keys (as derived from `less`).
/// The original iterator must yield records in sorted order (or at least in an order where
/// equal items are adjacent).
pub struct RecordsToMultiRecords<'a, K, V, It: Iterator<Item = Record<K, V>>> {
    it: Peekable<It>,
    less: &'a dyn Fn(&K, &K) -> bool,
    /// Efficiency knob: How big groups of records are expected to be. Default is 1.
    expected_group_size: usize,
}

impl<'a, K, V, It: Iterator<Item = Record<K, V>>> RecordsToMultiRecords<'a, K, V, It> {
    pub fn new(it: It, less: &'a dyn Fn(&K, &K) -> bool, egs: usize) -> Self {
        RecordsToMultiRecords {
            it: it.peekable(),
            less,
            expected_group_size: egs.max(1),
        }
    }
}

impl<'a, K, V, It: Iterator<Item = Record<K, V>>> Iterator for RecordsToMultiRecords<'a, K, V, It> {
    type Item = MultiRecord<K, V>;
    fn next(&mut self) -> Option<Self::Item> {
        let mut collection = Vec::with_capacity(self.expected_group_size);
        let first = self.it.next()?;
        let key = first.key;
        collection.push(first.value);

        while let Some(r) = self.it.next_if(|r| keys_equal(&self.less, &key, &r.key)) {
            collection.push(r.value);
        }

        Some(MultiRecord::new(key, collection))
    }
}

/// Runs the shuffle on the elected worker, after all workers passed the barrier.
/// Publishes every group to the job's reduce queue and returns the number of groups.
pub fn shuffle<MR: MapReducer>(mr: &MR, ctx: &JobContext<MR>) -> MRResult<usize> {
    let buffers: Vec<Vec<MapRecord<MR>>> = ctx.handoff
                                              .iter()
                                              .map(|slot| mem::take(&mut *lock(slot)))
                                              .collect();
    let records: usize = buffers.iter().map(Vec::len).sum();
    debug!("shuffling {} records from {} partitions ({:?})",
           records,
           buffers.len(),
           ctx.params.merge);

    let key_less = |a: &MR::Key, b: &MR::Key| mr.key_less(a, b);
    let record_less = |a: &MapRecord<MR>, b: &MapRecord<MR>| mr.key_less(&a.key, &b.key);

    let merged: Box<dyn Iterator<Item = MapRecord<MR>> + '_> = match ctx.params.merge {
        MergeStrategy::MergeTree => {
            Box::new(ShardMergeIterator::build(buffers.into_iter().map(Vec::into_iter), &record_less))
        }
        MergeStrategy::ConcatSort => {
            let mut all = Vec::with_capacity(records);
            for mut b in buffers {
                all.append(&mut b);
            }
            sort_records(&mut all, &key_less);
            Box::new(all.into_iter())
        }
    };

    let groups = RecordsToMultiRecords::new(merged, &key_less, ctx.params.reduce_group_prealloc_size);
    for group in groups {
        if ctx.is_abandoned() {
            return Err(MRError::Abandoned);
        }
        publish::<MR>(ctx, group);
    }

    let progress = ctx.queue.close_production();
    debug!("shuffle produced {} groups", progress.total.unwrap_or(0));
    ctx.report_reduce(progress);
    Ok(progress.total.unwrap_or(0))
}

fn publish<MR: MapReducer>(ctx: &JobContext<MR>, group: Group<MR>) {
    trace!("publishing group of {} values", group.len());
    ctx.queue.publish(group);
}
