//! A MapReducer that uses supplied map()/reduce() functions.

use std::marker::PhantomData;

use crate::mapreducer::{MapReducer, MapperF, ReducerF};
use crate::record_types::{MEmitter, MultiRecord, REmitter};
use crate::sort::{default_less, Comparer};

/// This type implements the MapReducer trait. You can use it to provide your own functions to a
/// MapReduce process. If you need more flexibility (e.g. state shared by map() calls), however,
/// you may want to simply implement your own type that fulfills MapReducer.
pub struct ClosureMapReducer<K1, V1, K2, V2, K3, V3> {
    mapper: MapperF<K1, V1, K2, V2>,
    reducer: ReducerF<K2, V2, K3, V3>,
    comparer: Comparer<K2>,
    _types: PhantomData<fn() -> (K1, V1, K3, V3)>,
}

impl<K1, V1, K2, V2, K3, V3> Clone for ClosureMapReducer<K1, V1, K2, V2, K3, V3> {
    fn clone(&self) -> Self {
        ClosureMapReducer {
            mapper: self.mapper,
            reducer: self.reducer,
            comparer: self.comparer,
            _types: PhantomData,
        }
    }
}

impl<K1, V1, K2: Ord, V2, K3, V3> ClosureMapReducer<K1, V1, K2, V2, K3, V3> {
    /// Create a new MapReducer from the supplied functions. Intermediate keys are ordered by
    /// their Ord implementation.
    pub fn new(mapper: MapperF<K1, V1, K2, V2>, reducer: ReducerF<K2, V2, K3, V3>) -> Self {
        ClosureMapReducer {
            mapper,
            reducer,
            comparer: default_less::<K2>,
            _types: PhantomData,
        }
    }
}

impl<K1, V1, K2, V2, K3, V3> ClosureMapReducer<K1, V1, K2, V2, K3, V3> {
    /// Create a new MapReducer with an explicit ordering on intermediate keys (for key types
    /// that are not Ord, or to group keys differently, e.g. `sort::dict_string_less`).
    pub fn with_comparator(mapper: MapperF<K1, V1, K2, V2>,
                           reducer: ReducerF<K2, V2, K3, V3>,
                           comparer: Comparer<K2>)
                           -> Self {
        ClosureMapReducer {
            mapper,
            reducer,
            comparer,
            _types: PhantomData,
        }
    }
    /// Set the function used for ordering (and grouping) intermediate keys.
    pub fn set_comparator(&mut self, c: Comparer<K2>) {
        self.comparer = c;
    }
}

impl<K1, V1, K2, V2, K3, V3> MapReducer for ClosureMapReducer<K1, V1, K2, V2, K3, V3>
    where K1: Send + Sync,
          V1: Send + Sync,
          K2: Send,
          V2: Send,
          K3: Send,
          V3: Send
{
    type InKey = K1;
    type InValue = V1;
    type Key = K2;
    type Value = V2;
    type OutKey = K3;
    type OutValue = V3;

    fn map(&self, e: &mut MEmitter<K2, V2>, k: &K1, v: &V1) {
        (self.mapper)(e, k, v)
    }
    fn reduce(&self, e: &mut REmitter<K3, V3>, r: MultiRecord<K2, V2>) {
        (self.reducer)(e, r)
    }
    fn key_less(&self, a: &K2, b: &K2) -> bool {
        (self.comparer)(a, b)
    }
}
