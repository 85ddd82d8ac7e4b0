// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The writer loop, run by the single background thread that owns all file
//! and console I/O. Each wake swaps the active buffer for the writer's empty
//! one under the lock, then drains it outside the lock. Rotation is
//! evaluated once per wake: the day rule before the batch, the size rule
//! after it.

use crate::buffer::Core;
use crate::crash;
use crate::format::{self, Style};
use crate::outputs::Output;
use crate::rotate::RotatingFile;
use crate::{FormattedLine, Level};

use chrono::{Local, NaiveDateTime};
use std::io::Write;
use std::sync::Arc;

pub(crate) struct Writer {
    core: Arc<Core>,
    standby: Vec<FormattedLine>,
    file: Option<RotatingFile>,
    console: Option<Box<dyn Output>>,
    style: Style,
    reported: u64,
}

impl Writer {
    pub(crate) fn new(
        core: Arc<Core>,
        file: Option<RotatingFile>,
        console: Option<Box<dyn Output>>,
        style: Style,
    ) -> Self {
        Self {
            core,
            standby: Vec::new(),
            file,
            console,
            style,
            reported: 0,
        }
    }

    /// The writer thread body. Returns once shutdown has been requested and
    /// everything submitted before it has been drained.
    pub(crate) fn run(mut self) {
        if let Some(file) = &mut self.file {
            file.roll_day(Local::now().date_naive());
        }
        self.publish_path();
        while !self.tick() {}
        // final sweep: nothing appended before the shutdown flag was set may
        // be left behind when the thread exits
        self.core.take(&mut self.standby);
        self.drain(Local::now().naive_local());
    }

    /// One wake of the writer: block for work or shutdown, then drain.
    fn tick(&mut self) -> bool {
        let shutdown = self.core.wait_swap(&mut self.standby);
        self.drain(Local::now().naive_local());
        shutdown
    }

    fn drain(&mut self, now: NaiveDateTime) {
        if self.standby.is_empty() && self.core.dropped() == self.reported {
            return;
        }
        if let Some(file) = &mut self.file {
            file.roll_day(now.date());
        }
        let batch = std::mem::take(&mut self.standby);
        for line in &batch {
            self.write(line);
        }
        let written = batch.len() as u64;
        self.standby = batch;
        self.standby.clear();
        self.report_drops(now);
        if let Some(file) = &mut self.file {
            file.roll_size();
            file.flush();
        }
        if let Some(console) = &mut self.console {
            let _ = console.flush();
        }
        // acknowledged only after the sinks are flushed, so a flush waiter
        // unblocks to find its lines on disk
        self.core.mark_written(written);
        self.publish_path();
    }

    fn write(&mut self, line: &str) {
        if let Some(file) = &mut self.file {
            file.write_line(line);
        }
        if let Some(console) = &mut self.console {
            let _ = console.write_all(line.as_bytes());
        }
    }

    /// Emit a single notice when lines have been shed since the last drain,
    /// so overload is visible in the log itself.
    fn report_drops(&mut self, now: NaiveDateTime) {
        let total = self.core.dropped();
        if total == self.reported {
            return;
        }
        let message = format!("overload: {} buffered lines dropped", total - self.reported);
        self.reported = total;
        let mut lines = Vec::with_capacity(1);
        format::format_record(
            &mut lines,
            now,
            Level::Warn,
            file!(),
            line!(),
            format::thread_id(),
            &message,
            &self.style,
        );
        for line in lines {
            self.write(&line);
        }
    }

    /// Let the crash reporter know which file a stack dump should go to.
    fn publish_path(&self) {
        if self.file.is_some() {
            crash::set_active_log(self.file.as_ref().and_then(|f| f.path()));
        }
    }
}
