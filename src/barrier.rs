//! A single-use rendezvous between the workers of one job: the end of the map phase.

use std::sync::{Condvar, Mutex};

use crate::error::{MRError, MRResult};
use crate::util::{lock, wait};

struct BarrierState {
    arrived: usize,
    released: bool,
    broken: bool,
}

/// Blocks workers until all `parties` of them have arrived, then releases them together.
/// Unlike std::sync::Barrier, it is used exactly once and can be broken when the job is
/// abandoned, so that no worker waits for a participant that will never arrive.
pub struct Barrier {
    parties: usize,
    state: Mutex<BarrierState>,
    cv: Condvar,
}

impl Barrier {
    pub fn new(parties: usize) -> Barrier {
        Barrier {
            parties,
            state: Mutex::new(BarrierState {
                arrived: 0,
                released: false,
                broken: false,
            }),
            cv: Condvar::new(),
        }
    }

    /// Everything a worker wrote before arriving is visible to every worker after it returns.
    pub fn arrive_and_wait(&self) -> MRResult<()> {
        let mut st = lock(&self.state);
        debug_assert!(!st.released, "barrier used twice");
        st.arrived += 1;
        if st.arrived == self.parties {
            st.released = true;
            self.cv.notify_all();
        }
        while !st.released && !st.broken {
            st = wait(&self.cv, st);
        }
        if st.released {
            Ok(())
        } else {
            Err(MRError::Abandoned)
        }
    }

    /// Wakes up all waiting workers with an error. Has no effect once the barrier released.
    pub fn break_barrier(&self) {
        let mut st = lock(&self.state);
        if !st.released {
            st.broken = true;
            self.cv.notify_all();
        }
    }

    #[cfg(test)]
    fn is_released(&self) -> bool {
        lock(&self.state).released
    }
}
