// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! This crate provides an asynchronous logging engine which formats log
//! messages on the calling thread and persists them from a dedicated
//! background thread, so that callers never block on file or console I/O.
//!
//! The core of this crate is the `AsyncLog` type, which is constructed using
//! the `LogBuilder`. Calling `start` on the `AsyncLog` spawns the writer
//! thread and returns a `LogHandle` which accepts log messages, allows the
//! level threshold to be changed at runtime, and stops the engine on `stop`
//! or drop. The handle can also be registered as the global logger for the
//! `log` crate facade, so the standard `error!`/`warn!`/`info!` macros feed
//! the same engine.
//!
//! Construction is explicit. Until an engine has been built and started
//! there is no handle to submit through, and the facade macros hit the `log`
//! crate's default no-op logger, so anything logged before initialization is
//! discarded rather than buffered.
//!
//! Messages are rendered into fully formatted lines at the submission site
//! and appended to an in-memory buffer under a short critical section. The
//! writer thread swaps that buffer for an empty one, drains it to the log
//! file and optionally the console, and rotates the log file when the
//! calendar day changes or the file exceeds a size cap. Rotated files are
//! named `{base}-{YYYY-MM-DD}({index}).log` and brand-new files begin with a
//! UTF-8 byte-order mark.
//!
//! Fatal signals (segmentation fault, abort, and friends) are reported
//! through a synchronous side path which renders the current call stack with
//! the normal formatter and writes it directly to the sinks, bypassing the
//! buffered path, before the process terminates with the originating signal.

pub use log::*;

mod buffer;
mod builder;
mod color;
mod config;
pub mod crash;
mod error;
mod format;
mod macros;
mod outputs;
mod rotate;
mod sender;
mod writer;

pub use builder::LogBuilder;
pub use config::{Logging, LoggingConfig};
pub use error::Error;
pub use outputs::{Output, Stderr, Stdout};
pub use sender::LogStream;

use buffer::Core;
use sender::Logger;
use writer::Writer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// A single fully rendered log line, including styling and the trailing
/// newline, ready for byte-for-byte output.
pub(crate) type FormattedLine = String;

/// A fully configured logging engine which has not started its writer thread
/// yet. Produced by `LogBuilder::build` and consumed by `start`.
pub struct AsyncLog {
    pub(crate) logger: Logger,
    pub(crate) writer: Writer,
    pub(crate) core: Arc<Core>,
    pub(crate) console: bool,
    pub(crate) color: bool,
}

impl AsyncLog {
    /// Install the crash reporter, spawn the writer thread, and return the
    /// handle used to submit log messages and stop the engine.
    pub fn start(self) -> LogHandle {
        crash::install(self.console, self.color);
        let writer = self.writer;
        let thread = std::thread::Builder::new()
            .name("log_writer".to_string())
            .spawn(move || writer.run())
            .expect("failed to spawn log writer");
        LogHandle {
            logger: self.logger,
            core: self.core,
            thread: Some(thread),
            registered: AtomicBool::new(false),
        }
    }
}

/// A handle to a running logging engine. Submitting through the handle never
/// blocks on I/O; the handle joins the writer thread when stopped or dropped.
pub struct LogHandle {
    logger: Logger,
    core: Arc<Core>,
    thread: Option<JoinHandle<()>>,
    registered: AtomicBool,
}

impl LogHandle {
    /// Submit a preformatted message at the given level. `file` and `line`
    /// identify the call site and are rendered into the preamble.
    pub fn submit(&self, level: Level, file: &str, line: u32, message: &str) {
        self.logger.submit(level, file, line, message);
    }

    /// Submit a message assembled from a format template and arguments. The
    /// arguments are only rendered if the level passes the threshold.
    pub fn submit_fmt(&self, level: Level, file: &str, line: u32, args: std::fmt::Arguments) {
        self.logger.submit_fmt(level, file, line, args);
    }

    /// Begin an append-style record. The record is submitted exactly once,
    /// when the returned `LogStream` is finished or goes out of scope.
    pub fn stream(&self, level: Level, file: &'static str, line: u32) -> LogStream<'_> {
        self.logger.stream(level, file, line)
    }

    /// Return the current level threshold.
    pub fn level(&self) -> LevelFilter {
        self.core.level_filter()
    }

    /// Change the level threshold. Takes effect for subsequent submissions;
    /// records already buffered are unaffected.
    pub fn set_level(&self, level: LevelFilter) {
        self.core.set_level_filter(level);
        if self.registered.load(Ordering::Relaxed) {
            log::set_max_level(level);
        }
    }

    /// Return the number of lines shed so far because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.core.dropped()
    }

    /// Block until every line accepted before this call has been written to
    /// the sinks and the file flushed. Lines shed under overload are counted
    /// in `dropped`, not waited for.
    pub fn flush(&self) {
        self.core.flush_wait();
    }

    /// Register a clone of this logger as the global logger for the `log`
    /// crate facade, so the standard logging macros feed this engine.
    pub fn register(&self) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(self.logger.clone()))?;
        log::set_max_level(self.core.level_filter());
        self.registered.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Stop the engine: reject new submissions, wake the writer thread, and
    /// join it after it has drained everything submitted before this call.
    /// Calling `stop` a second time is a no-op.
    pub fn stop(&mut self) {
        self.core.shutdown();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for LogHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Construct an `AsyncLog` from a `Logging` config section.
pub fn configure_logging<T: LoggingConfig>(config: &T) -> Result<AsyncLog, Error> {
    let logging = config.logging();
    let mut builder = LogBuilder::new()
        .file_name(&logging.file_name())
        .level(logging.level())
        .highlight(logging.highlight())
        .max_file_size(logging.max_file_size())
        .max_files(logging.max_files())
        .max_buffered_lines(logging.max_buffered_lines())
        .console(logging.console())
        .color(logging.color());
    if let Some(dir) = logging.log_dir() {
        builder = builder.log_path(dir);
    }
    builder.build()
}
