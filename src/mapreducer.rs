//! The MapReducer trait and associated types.

use crate::record_types::{MEmitter, MultiRecord, REmitter};

/// Map() function type. The MEmitter argument is used to emit values from
/// the map() function.
pub type MapperF<K1, V1, K2, V2> = fn(&mut MEmitter<K2, V2>, &K1, &V1);
/// Reduce() function type. The REmitter argument is used to emit values
/// from the reduce() function.
pub type ReducerF<K2, V2, K3, V3> = fn(&mut REmitter<K3, V3>, MultiRecord<K2, V2>);

/// The user side of a job: map(), reduce() and an ordering on intermediate keys.
///
/// One instance is shared by all worker threads of a job, hence the `Sync` bound and the
/// `&self` receivers. The engine never looks into keys or values, except for passing
/// intermediate keys to `key_less()`.
pub trait MapReducer: Send + Sync {
    type InKey: Send + Sync;
    type InValue: Send + Sync;
    type Key: Send;
    type Value: Send;
    type OutKey: Send;
    type OutValue: Send;

    /// Takes one <key,value> pair and an emitter.
    /// The emitter is used to yield results from the map phase; it may be called any number
    /// of times.
    fn map(&self, em: &mut MEmitter<Self::Key, Self::Value>, key: &Self::InKey, value: &Self::InValue);

    /// Takes one key and one or more values and emits any number of (usually one) output
    /// pairs.
    fn reduce(&self, em: &mut REmitter<Self::OutKey, Self::OutValue>, records: MultiRecord<Self::Key, Self::Value>);

    /// A strict weak ordering on intermediate keys. Used for sorting, and for grouping: keys
    /// `a` and `b` belong to the same group iff `!key_less(a, b) && !key_less(b, a)`.
    fn key_less(&self, a: &Self::Key, b: &Self::Key) -> bool;
}

/// Input records of a MapReducer.
pub type InputRecord<MR> = crate::record_types::Record<<MR as MapReducer>::InKey, <MR as MapReducer>::InValue>;
/// Intermediate records of a MapReducer.
pub type MapRecord<MR> = crate::record_types::Record<<MR as MapReducer>::Key, <MR as MapReducer>::Value>;
/// Groups handed to a MapReducer's reduce().
pub type Group<MR> = MultiRecord<<MR as MapReducer>::Key, <MR as MapReducer>::Value>;
