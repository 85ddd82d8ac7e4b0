// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The producer/consumer handoff at the heart of the engine: an active
//! buffer of formatted lines guarded by a mutex, a condvar to wake the
//! writer thread, and an atomic level threshold read by producers without
//! taking the lock.
//!
//! Two buffers exist at any time. Producers append to the active one under
//! the lock; the writer exchanges it for its own empty buffer in a single
//! swap and drains the full one outside the lock. The swap is the only
//! operation both sides contend on.
//!
//! A second condvar signals in the writer-to-producer direction after each
//! drain reaches the sinks, so a caller can block until the lines it
//! submitted have been written out.

use crate::{FormattedLine, Level, LevelFilter};

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

struct State {
    active: Vec<FormattedLine>,
    submitted: u64,
    written: u64,
    shutdown: bool,
}

pub(crate) struct Core {
    state: Mutex<State>,
    work: Condvar,
    drained: Condvar,
    level: AtomicUsize,
    dropped: AtomicU64,
    max_lines: usize,
}

impl Core {
    pub(crate) fn new(level: LevelFilter, max_lines: usize) -> Self {
        Self {
            state: Mutex::new(State {
                active: Vec::new(),
                submitted: 0,
                written: 0,
                shutdown: false,
            }),
            work: Condvar::new(),
            drained: Condvar::new(),
            level: AtomicUsize::new(level as usize),
            dropped: AtomicU64::new(0),
            max_lines,
        }
    }

    // a panicked producer must never poison logging for everyone else, so
    // lock acquisition recovers the guard instead of propagating
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a record at `level` passes the current threshold.
    pub(crate) fn enabled(&self, level: Level) -> bool {
        level as usize <= self.level.load(Ordering::Relaxed)
    }

    pub(crate) fn level_filter(&self) -> LevelFilter {
        match self.level.load(Ordering::Relaxed) {
            0 => LevelFilter::Off,
            1 => LevelFilter::Error,
            2 => LevelFilter::Warn,
            3 => LevelFilter::Info,
            4 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    pub(crate) fn set_level_filter(&self, level: LevelFilter) {
        self.level.store(level as usize, Ordering::Relaxed);
    }

    /// Number of lines shed because the active buffer was at capacity.
    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Append formatted lines to the active buffer and wake the writer.
    /// Returns false without appending once shutdown has begun. If the
    /// buffer is at capacity the newest lines are shed and counted, so the
    /// history leading up to an overload is preserved.
    pub(crate) fn append(&self, mut lines: Vec<FormattedLine>) -> bool {
        let mut state = self.lock();
        if state.shutdown {
            return false;
        }
        let spare = self.max_lines.saturating_sub(state.active.len());
        if lines.len() > spare {
            let shed = (lines.len() - spare) as u64;
            lines.truncate(spare);
            self.dropped.fetch_add(shed, Ordering::Relaxed);
        }
        state.submitted += lines.len() as u64;
        state.active.append(&mut lines);
        drop(state);
        self.work.notify_one();
        true
    }

    /// Writer side: block until there is something to drain or shutdown has
    /// been requested, then exchange the active buffer with `standby`.
    /// Returns the shutdown flag as observed under the lock.
    pub(crate) fn wait_swap(&self, standby: &mut Vec<FormattedLine>) -> bool {
        let mut state = self.lock();
        while state.active.is_empty() && !state.shutdown {
            state = self
                .work
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        std::mem::swap(&mut state.active, standby);
        state.shutdown
    }

    /// Writer side: exchange buffers without blocking. Used for the final
    /// sweep after the writer loop exits.
    pub(crate) fn take(&self, standby: &mut Vec<FormattedLine>) {
        let mut state = self.lock();
        std::mem::swap(&mut state.active, standby);
    }

    /// Writer side: record that `lines` drained lines have reached the
    /// sinks and wake anyone blocked in `flush_wait`.
    pub(crate) fn mark_written(&self, lines: u64) {
        if lines == 0 {
            return;
        }
        let mut state = self.lock();
        state.written += lines;
        drop(state);
        self.drained.notify_all();
    }

    /// Block until every line accepted before this call has been written
    /// out. Shed lines were never accepted and are not waited for.
    pub(crate) fn flush_wait(&self) {
        let mut state = self.lock();
        let target = state.submitted;
        while state.written < target {
            state = self
                .drained
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Reject subsequent appends and wake the writer so it can drain what
    /// remains and exit.
    pub(crate) fn shutdown(&self) {
        let mut state = self.lock();
        state.shutdown = true;
        drop(state);
        self.work.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> FormattedLine {
        format!("{}\n", text)
    }

    #[test]
    fn append_then_swap_preserves_order() {
        let core = Core::new(LevelFilter::Trace, 16);
        assert!(core.append(vec![line("one"), line("two")]));
        assert!(core.append(vec![line("three")]));

        let mut standby = Vec::new();
        let shutdown = core.wait_swap(&mut standby);
        assert!(!shutdown);
        assert_eq!(standby, vec![line("one"), line("two"), line("three")]);

        // the active side is empty again after the swap
        standby.clear();
        core.take(&mut standby);
        assert!(standby.is_empty());
    }

    #[test]
    fn swap_returns_shutdown_with_remaining_lines() {
        let core = Core::new(LevelFilter::Trace, 16);
        assert!(core.append(vec![line("last")]));
        core.shutdown();

        let mut standby = Vec::new();
        assert!(core.wait_swap(&mut standby));
        assert_eq!(standby, vec![line("last")]);
    }

    #[test]
    fn append_rejected_after_shutdown() {
        let core = Core::new(LevelFilter::Trace, 16);
        core.shutdown();
        assert!(!core.append(vec![line("late")]));

        let mut standby = Vec::new();
        core.take(&mut standby);
        assert!(standby.is_empty());
    }

    #[test]
    fn overload_sheds_newest_and_counts() {
        let core = Core::new(LevelFilter::Trace, 2);
        assert!(core.append(vec![line("a"), line("b"), line("c"), line("d")]));
        assert_eq!(core.dropped(), 2);

        let mut standby = Vec::new();
        core.wait_swap(&mut standby);
        assert_eq!(standby, vec![line("a"), line("b")]);

        // capacity is available again after the swap
        assert!(core.append(vec![line("e")]));
        assert_eq!(core.dropped(), 2);
    }

    #[test]
    fn threshold_mapping() {
        let core = Core::new(LevelFilter::Info, 16);
        assert!(core.enabled(Level::Error));
        assert!(core.enabled(Level::Info));
        assert!(!core.enabled(Level::Debug));

        core.set_level_filter(LevelFilter::Trace);
        assert!(core.enabled(Level::Trace));
        assert_eq!(core.level_filter(), LevelFilter::Trace);

        core.set_level_filter(LevelFilter::Off);
        assert!(!core.enabled(Level::Error));
        assert_eq!(core.level_filter(), LevelFilter::Off);
    }

    #[test]
    fn writer_wakes_on_append() {
        use std::sync::Arc;

        let core = Arc::new(Core::new(LevelFilter::Trace, 16));
        let waiter = {
            let core = core.clone();
            std::thread::spawn(move || {
                let mut standby = Vec::new();
                core.wait_swap(&mut standby);
                standby
            })
        };
        // give the waiter a chance to block before signalling
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(core.append(vec![line("wake")]));
        let drained = waiter.join().expect("waiter panicked");
        assert_eq!(drained, vec![line("wake")]);
    }

    #[test]
    fn flush_wait_returns_once_lines_are_written() {
        use std::sync::Arc;

        let core = Arc::new(Core::new(LevelFilter::Trace, 16));
        assert!(core.append(vec![line("pending")]));
        let flusher = {
            let core = core.clone();
            std::thread::spawn(move || core.flush_wait())
        };
        // give the flusher a chance to block before draining
        std::thread::sleep(std::time::Duration::from_millis(20));
        let mut standby = Vec::new();
        core.take(&mut standby);
        assert_eq!(standby, vec![line("pending")]);
        core.mark_written(standby.len() as u64);
        flusher.join().expect("flusher panicked");
    }

    #[test]
    fn flush_wait_ignores_shed_lines() {
        let core = Core::new(LevelFilter::Trace, 2);
        assert!(core.append(vec![line("a"), line("b"), line("c")]));
        assert_eq!(core.dropped(), 1);

        let mut standby = Vec::new();
        core.take(&mut standby);
        core.mark_written(standby.len() as u64);
        // the shed line was never accepted, so this must not block on it
        core.flush_wait();
    }
}
