//! Reader threads that feed bars to the runtime.
//!
//! Symbols are partitioned round-robin over `num_readers` readers. A reader
//! processes its symbols bar-index by bar-index; in synchronized runs every
//! reader waits on a shared [`CohortBarrier`] after each round, so no symbol
//! gets more than one bar ahead of another.

use crossbeam_channel::{unbounded, Sender};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use strata_core::{Bar, StrataError, StrataResult, SymbolId};

use crate::barrier::{BarrierWait, CohortBarrier};
use crate::runtime::StrategyRuntime;

/// Bars of one symbol, sorted by timestamp.
#[derive(Debug, Clone)]
pub struct SymbolFeed {
    pub sym: SymbolId,
    pub bars: Vec<Bar>,
}

impl SymbolFeed {
    pub fn new(sym: SymbolId, bars: Vec<Bar>) -> Self {
        Self { sym, bars }
    }
}

/// Outcome of a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub readers: usize,
    pub bars: usize,
    /// Completed barrier rounds; zero when unsynchronized.
    pub rounds: u64,
}

fn partition<T>(items: Vec<T>, readers: usize) -> Vec<Vec<T>> {
    let mut groups: Vec<Vec<T>> = (0..readers).map(|_| Vec::new()).collect();
    for (i, item) in items.into_iter().enumerate() {
        groups[i % readers].push(item);
    }
    groups
}

fn join_error(reader: usize) -> StrataError {
    StrataError::Strategy(format!("reader {reader} panicked"))
}

pub struct Executor {
    runtime: Arc<StrategyRuntime>,
}

impl Executor {
    pub fn new(runtime: Arc<StrategyRuntime>) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &Arc<StrategyRuntime> {
        &self.runtime
    }

    fn reader_count(&self, symbols: usize) -> usize {
        self.runtime.config().num_readers.clamp(1, symbols.max(1))
    }

    /// Process historical feeds to completion.
    ///
    /// The first reader error cancels the barrier, stops the other readers
    /// and is returned.
    pub fn replay(&self, feeds: Vec<SymbolFeed>) -> StrataResult<ReplaySummary> {
        let readers = self.reader_count(feeds.len());
        let sync = self.runtime.config().synchronize;
        let total: usize = feeds.iter().map(|f| f.bars.len()).sum();
        let barrier = CohortBarrier::new(readers);
        let groups = partition(feeds, readers);
        info!(readers, bars = total, synchronized = sync, "replay started");

        let results: Vec<StrataResult<usize>> = thread::scope(|s| {
            let handles: Vec<_> = groups
                .iter()
                .map(|group| {
                    let barrier = &barrier;
                    let runtime = &self.runtime;
                    s.spawn(move || {
                        let result = if sync {
                            replay_lockstep(runtime, group, barrier)
                        } else {
                            replay_independent(runtime, group)
                        };
                        if result.is_err() {
                            runtime.stop();
                            barrier.cancel();
                        }
                        barrier.depart();
                        result
                    })
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(i, h)| h.join().unwrap_or_else(|_| Err(join_error(i))))
                .collect()
        });

        let mut bars = 0;
        for r in results {
            bars += r?;
        }
        let rounds = if sync { barrier.generation() } else { 0 };
        info!(bars, rounds, "replay finished");
        Ok(ReplaySummary {
            readers,
            bars,
            rounds,
        })
    }

    /// Start live readers fed through channels.
    pub fn spawn_live(&self) -> LiveHandle {
        let readers = self.reader_count(self.runtime.symbols().len());
        let sync = self.runtime.config().synchronize;
        let barrier = Arc::new(CohortBarrier::new(readers));
        let owned = partition(self.runtime.symbols().ids().collect(), readers);

        let mut senders = Vec::with_capacity(readers);
        let mut handles = Vec::with_capacity(readers);
        for (i, syms) in owned.into_iter().enumerate() {
            let (tx, rx) = unbounded::<(SymbolId, Bar)>();
            let runtime = Arc::clone(&self.runtime);
            let reader_barrier = Arc::clone(&barrier);
            let handle = thread::Builder::new()
                .name(format!("strata-reader-{i}"))
                .spawn(move || {
                    let mut reader = LiveReader::new(syms, sync);
                    let result = reader.run(&runtime, &reader_barrier, rx.iter());
                    reader_barrier.depart();
                    if let Err(e) = &result {
                        error!(reader = i, error = %e, "live reader failed");
                        runtime.stop();
                        reader_barrier.cancel();
                    }
                    result
                })
                .map_err(StrataError::Io);
            if handle.is_err() {
                barrier.depart();
            }
            senders.push(tx);
            handles.push(handle);
        }
        info!(readers, synchronized = sync, "live readers started");

        LiveHandle {
            runtime: Arc::clone(&self.runtime),
            senders,
            handles,
            barrier,
            readers,
        }
    }
}

fn replay_lockstep(
    runtime: &StrategyRuntime,
    feeds: &[SymbolFeed],
    barrier: &CohortBarrier,
) -> StrataResult<usize> {
    let longest = feeds.iter().map(|f| f.bars.len()).max().unwrap_or(0);
    let mut processed = 0;
    for k in 0..longest {
        if runtime.is_stopped() {
            break;
        }
        for feed in feeds {
            if let Some(bar) = feed.bars.get(k) {
                runtime.process_bar(bar, feed.sym)?;
                processed += 1;
            }
        }
        if barrier.wait() == BarrierWait::Cancelled {
            debug!(round = k, "replay reader cancelled");
            break;
        }
    }
    Ok(processed)
}

fn replay_independent(runtime: &StrategyRuntime, feeds: &[SymbolFeed]) -> StrataResult<usize> {
    let mut processed = 0;
    for feed in feeds {
        for bar in &feed.bars {
            if runtime.is_stopped() {
                return Ok(processed);
            }
            runtime.process_bar(bar, feed.sym)?;
            processed += 1;
        }
    }
    Ok(processed)
}

/// One live reader's round bookkeeping.
///
/// A bar for a symbol that already processed the current round is queued
/// until every owned symbol has caught up and the barrier released.
struct LiveReader {
    syms: Vec<SymbolId>,
    sync: bool,
    pending: HashMap<SymbolId, VecDeque<Bar>>,
    done: HashSet<SymbolId>,
}

impl LiveReader {
    fn new(syms: Vec<SymbolId>, sync: bool) -> Self {
        Self {
            pending: syms.iter().map(|&s| (s, VecDeque::new())).collect(),
            syms,
            sync,
            done: HashSet::new(),
        }
    }

    fn run(
        &mut self,
        runtime: &StrategyRuntime,
        barrier: &CohortBarrier,
        bars: impl Iterator<Item = (SymbolId, Bar)>,
    ) -> StrataResult<()> {
        for (sym, bar) in bars {
            if runtime.is_stopped() || !self.accept(runtime, barrier, sym, bar)? {
                return Ok(());
            }
        }
        if self.sync {
            self.drain(runtime, barrier)?;
        }
        Ok(())
    }

    /// Flush bars still queued once input has ended, one round per barrier
    /// release. Returns how many were processed.
    fn drain(&mut self, runtime: &StrategyRuntime, barrier: &CohortBarrier) -> StrataResult<usize> {
        let mut flushed = 0;
        while !self.done.is_empty() {
            if barrier.wait() == BarrierWait::Cancelled {
                break;
            }
            self.done.clear();
            if runtime.is_stopped() {
                break;
            }
            for &s in &self.syms {
                if let Some(b) = self.pending.get_mut(&s).and_then(VecDeque::pop_front) {
                    runtime.process_bar(&b, s)?;
                    self.done.insert(s);
                    flushed += 1;
                }
            }
        }
        let dropped: usize = self.pending.values().map(VecDeque::len).sum();
        if dropped > 0 {
            warn!(dropped, "queued bars dropped at shutdown");
        } else if flushed > 0 {
            debug!(flushed, "queued bars flushed");
        }
        Ok(flushed)
    }

    /// Returns `false` once the barrier is cancelled.
    fn accept(
        &mut self,
        runtime: &StrategyRuntime,
        barrier: &CohortBarrier,
        sym: SymbolId,
        bar: Bar,
    ) -> StrataResult<bool> {
        if !self.sync {
            runtime.process_bar(&bar, sym)?;
            return Ok(true);
        }
        let Some(queue) = self.pending.get_mut(&sym) else {
            return Err(StrataError::UnknownSymbol(sym.to_string()));
        };
        queue.push_back(bar);

        loop {
            let mut progressed = false;
            for &s in &self.syms {
                if self.done.contains(&s) {
                    continue;
                }
                if let Some(b) = self.pending.get_mut(&s).and_then(VecDeque::pop_front) {
                    runtime.process_bar(&b, s)?;
                    self.done.insert(s);
                    progressed = true;
                }
            }
            if self.done.len() == self.syms.len() {
                if barrier.wait() == BarrierWait::Cancelled {
                    return Ok(false);
                }
                self.done.clear();
                continue;
            }
            if !progressed {
                return Ok(true);
            }
        }
    }
}

/// Handle to running live readers.
pub struct LiveHandle {
    runtime: Arc<StrategyRuntime>,
    senders: Vec<Sender<(SymbolId, Bar)>>,
    handles: Vec<StrataResult<JoinHandle<StrataResult<()>>>>,
    barrier: Arc<CohortBarrier>,
    readers: usize,
}

impl LiveHandle {
    pub fn readers(&self) -> usize {
        self.readers
    }

    /// Queue a bar for the reader that owns the symbol.
    pub fn submit(&self, sym: SymbolId, bar: Bar) -> StrataResult<()> {
        if self.runtime.is_stopped() {
            return Err(StrataError::Strategy("runtime stopped".into()));
        }
        if !self.runtime.symbols().contains(sym) {
            return Err(StrataError::UnknownSymbol(sym.to_string()));
        }
        self.senders[sym.index() % self.readers]
            .send((sym, bar))
            .map_err(|_| StrataError::Strategy(format!("reader for {sym} is gone")))
    }

    /// Process everything already submitted, then shut the readers down.
    /// Synchronized readers flush their queued bars in further rounds, so a
    /// symbol that ran ahead is not cut short.
    pub fn finish(self) -> StrataResult<()> {
        self.shutdown(false)
    }

    /// Stop the readers: set the stop flag, cancel the barrier, close the
    /// channels and join. Returns the first reader error.
    pub fn stop(self) -> StrataResult<()> {
        self.shutdown(true)
    }

    fn shutdown(self, abort: bool) -> StrataResult<()> {
        if abort {
            self.runtime.stop();
            self.barrier.cancel();
        }
        drop(self.senders);
        let mut first_err = None;
        for (i, handle) in self.handles.into_iter().enumerate() {
            let result = handle.and_then(|h| h.join().unwrap_or_else(|_| Err(join_error(i))));
            if let Err(e) = result {
                first_err.get_or_insert(e);
            }
        }
        info!(abort, "live readers stopped");
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_round_robin() {
        let groups = partition(vec![0, 1, 2, 3, 4], 2);
        assert_eq!(groups, vec![vec![0, 2, 4], vec![1, 3]]);
    }
}
