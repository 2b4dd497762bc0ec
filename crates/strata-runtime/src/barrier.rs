//! Cohort barrier for cross-symbol alignment.
//!
//! Every party must arrive before any proceeds. There is no timeout: a
//! party that never arrives stalls the cohort until the barrier is
//! cancelled. A party whose feed is exhausted leaves with [`CohortBarrier::depart`].

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info};

/// Outcome of [`CohortBarrier::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierWait {
    /// Last to arrive; released the cohort.
    Leader,
    Follower,
    /// The barrier was cancelled; stop processing.
    Cancelled,
}

#[derive(Debug)]
struct BarrierState {
    parties: usize,
    arrived: usize,
    generation: u64,
    cancelled: bool,
}

#[derive(Debug)]
pub struct CohortBarrier {
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

impl CohortBarrier {
    pub fn new(parties: usize) -> Self {
        Self {
            state: Mutex::new(BarrierState {
                parties,
                arrived: 0,
                generation: 0,
                cancelled: false,
            }),
            cvar: Condvar::new(),
        }
    }

    /// Block until every party has arrived or the barrier is cancelled.
    pub fn wait(&self) -> BarrierWait {
        let mut st = self.state.lock();
        if st.cancelled {
            return BarrierWait::Cancelled;
        }
        st.arrived += 1;
        if st.arrived >= st.parties {
            st.arrived = 0;
            st.generation += 1;
            self.cvar.notify_all();
            return BarrierWait::Leader;
        }

        let generation = st.generation;
        while st.generation == generation && !st.cancelled {
            self.cvar.wait(&mut st);
        }
        if st.generation == generation {
            BarrierWait::Cancelled
        } else {
            BarrierWait::Follower
        }
    }

    /// Leave the cohort for good. Releases the waiters if everyone left is
    /// already waiting.
    pub fn depart(&self) {
        let mut st = self.state.lock();
        st.parties = st.parties.saturating_sub(1);
        debug!(parties = st.parties, "barrier party departed");
        if st.arrived > 0 && st.arrived >= st.parties {
            st.arrived = 0;
            st.generation += 1;
            self.cvar.notify_all();
        }
    }

    /// Release every current and future waiter.
    pub fn cancel(&self) {
        let mut st = self.state.lock();
        if !st.cancelled {
            st.cancelled = true;
            info!(generation = st.generation, "barrier cancelled");
        }
        self.cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    pub fn parties(&self) -> usize {
        self.state.lock().parties
    }

    /// Number of completed rounds.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_single_party_never_blocks() {
        let b = CohortBarrier::new(1);
        assert_eq!(b.wait(), BarrierWait::Leader);
        assert_eq!(b.wait(), BarrierWait::Leader);
        assert_eq!(b.generation(), 2);
    }

    #[test]
    fn test_rounds_stay_aligned() {
        let b = Arc::new(CohortBarrier::new(3));
        let counters: Arc<Vec<AtomicUsize>> = Arc::new((0..3).map(|_| AtomicUsize::new(0)).collect());
        let max_gap = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..3)
            .map(|i| {
                let b = Arc::clone(&b);
                let counters = Arc::clone(&counters);
                let max_gap = Arc::clone(&max_gap);
                thread::spawn(move || {
                    for _ in 0..50 {
                        if i == 0 {
                            thread::sleep(Duration::from_micros(200));
                        }
                        counters[i].fetch_add(1, Ordering::SeqCst);
                        let vals: Vec<usize> =
                            counters.iter().map(|c| c.load(Ordering::SeqCst)).collect();
                        let gap = vals.iter().max().unwrap() - vals.iter().min().unwrap();
                        max_gap.fetch_max(gap, Ordering::SeqCst);
                        b.wait();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(max_gap.load(Ordering::SeqCst) <= 1);
        assert_eq!(b.generation(), 50);
    }

    #[test]
    fn test_cancel_releases_waiters() {
        let b = Arc::new(CohortBarrier::new(2));
        let waiter = {
            let b = Arc::clone(&b);
            thread::spawn(move || b.wait())
        };
        thread::sleep(Duration::from_millis(20));
        b.cancel();
        assert_eq!(waiter.join().unwrap(), BarrierWait::Cancelled);
        assert_eq!(b.wait(), BarrierWait::Cancelled);
    }

    #[test]
    fn test_depart_releases_remaining() {
        let b = Arc::new(CohortBarrier::new(2));
        let waiter = {
            let b = Arc::clone(&b);
            thread::spawn(move || b.wait())
        };
        thread::sleep(Duration::from_millis(20));
        b.depart();
        assert_eq!(waiter.join().unwrap(), BarrierWait::Follower);
        assert_eq!(b.parties(), 1);
        assert_eq!(b.wait(), BarrierWait::Leader);
    }
}
