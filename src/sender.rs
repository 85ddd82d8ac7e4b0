// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The producer side of the engine. A `Logger` renders records on the
//! calling thread and hands the finished lines to the shared core; it also
//! implements `log::Log` so a clone can serve as the global logger for the
//! facade macros. Message rendering happens before the lock is taken, so
//! the critical section covers only the in-memory append.

use crate::buffer::Core;
use crate::format::{self, Style};
use crate::{Level, Metadata, Record};

use chrono::Local;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct Logger {
    core: Arc<Core>,
    style: Style,
}

impl Logger {
    pub(crate) fn new(core: Arc<Core>, style: Style) -> Self {
        Self { core, style }
    }

    /// Format and hand off one record. Returns without blocking on I/O; the
    /// record is silently rejected once shutdown has begun.
    pub(crate) fn submit(&self, level: Level, file: &str, line: u32, message: &str) {
        if !self.core.enabled(level) {
            return;
        }
        let now = Local::now().naive_local();
        let mut lines = Vec::with_capacity(1);
        format::format_record(
            &mut lines,
            now,
            level,
            file,
            line,
            format::thread_id(),
            message,
            &self.style,
        );
        self.core.append(lines);
    }

    /// Template form of `submit`. The arguments are only rendered when the
    /// level passes the threshold.
    pub(crate) fn submit_fmt(&self, level: Level, file: &str, line: u32, args: fmt::Arguments) {
        if !self.core.enabled(level) {
            return;
        }
        self.submit(level, file, line, &args.to_string());
    }

    pub(crate) fn stream(&self, level: Level, file: &'static str, line: u32) -> LogStream<'_> {
        LogStream {
            logger: self,
            level,
            file,
            line,
            message: String::new(),
        }
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.core.enabled(metadata.level())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let file = record.file().unwrap_or("<unknown>");
        let line = record.line().unwrap_or(0);
        self.submit(record.level(), file, line, &record.args().to_string());
    }

    fn flush(&self) {
        self.core.flush_wait();
    }
}

/// An append-style record in progress. Parts are accumulated with `append`
/// or the `std::fmt::Write` machinery; the record is submitted exactly once,
/// when the stream is finished or goes out of scope, covering early-return
/// paths as well.
pub struct LogStream<'a> {
    logger: &'a Logger,
    level: Level,
    file: &'static str,
    line: u32,
    message: String,
}

impl LogStream<'_> {
    /// Append one displayable part to the record.
    pub fn append<T: fmt::Display>(&mut self, part: T) -> &mut Self {
        let _ = fmt::Write::write_fmt(&mut self.message, format_args!("{}", part));
        self
    }

    /// Submit the record. Dropping the stream has the same effect; this form
    /// just makes the submission point explicit.
    pub fn finish(self) {}
}

impl fmt::Write for LogStream<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.message.push_str(s);
        Ok(())
    }
}

impl Drop for LogStream<'_> {
    fn drop(&mut self) {
        self.logger
            .submit(self.level, self.file, self.line, &self.message);
    }
}
