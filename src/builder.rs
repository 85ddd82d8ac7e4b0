// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::buffer::Core;
use crate::config::GB;
use crate::format::Style;
use crate::outputs::{Output, Stdout};
use crate::rotate::RotatingFile;
use crate::sender::Logger;
use crate::writer::Writer;
use crate::{AsyncLog, Error, Level};

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A type to construct an `AsyncLog`. At least one sink must be enabled: a
/// log directory, the console echo, or both.
pub struct LogBuilder {
    log_path: Option<PathBuf>,
    file_name: String,
    level: Level,
    highlight: Level,
    max_file_size: u64,
    max_files: usize,
    max_buffered_lines: usize,
    console: bool,
    color: bool,
    output: Option<Box<dyn Output>>,
}

impl Default for LogBuilder {
    fn default() -> Self {
        Self {
            log_path: None,
            file_name: String::from("log"),
            level: Level::Info,
            highlight: Level::Warn,
            max_file_size: GB as u64,
            max_files: 0,
            max_buffered_lines: 65536,
            console: true,
            color: true,
            output: None,
        }
    }
}

impl LogBuilder {
    /// Create a new log builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the directory rotated log files are written to. Without a path
    /// the engine logs to the console only.
    pub fn log_path<T: AsRef<Path>>(mut self, path: T) -> Self {
        self.log_path = Some(path.as_ref().to_owned());
        self
    }

    /// Sets the base name rotated files are derived from, as in
    /// `{name}-{YYYY-MM-DD}({index}).log`.
    pub fn file_name(mut self, name: &str) -> Self {
        self.file_name = name.to_string();
        self
    }

    /// Sets the initial level threshold. Records below it are discarded at
    /// the submission site.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the most verbose level rendered in a highlight color. Less
    /// severe levels render with a dim preamble instead.
    pub fn highlight(mut self, level: Level) -> Self {
        self.highlight = level;
        self
    }

    /// Sets the size cap in bytes after which the file index rotates. Zero
    /// disables size based rotation.
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Sets how many rotated files to keep. The oldest files beyond the
    /// limit are removed after each rotation. Zero keeps everything.
    pub fn max_files(mut self, files: usize) -> Self {
        self.max_files = files;
        self
    }

    /// Sets the bound on buffered lines. When producers outpace the writer
    /// past this bound, the newest lines are shed and counted rather than
    /// blocking the producers. Deeper buffers are less likely to shed, but
    /// come at the cost of additional memory utilization.
    pub fn max_buffered_lines(mut self, lines: usize) -> Self {
        self.max_buffered_lines = lines;
        self
    }

    /// Sets whether lines are echoed to the console in addition to the log
    /// file.
    pub fn console(mut self, echo: bool) -> Self {
        self.console = echo;
        self
    }

    /// Sets whether terminal escape sequences are emitted. With color off
    /// every line is rendered plain.
    pub fn color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Replaces the console sink, `stdout` by default, with a custom
    /// output. Implies console echo.
    pub fn output(mut self, output: Box<dyn Output>) -> Self {
        self.output = Some(output);
        self.console = true;
        self
    }

    /// Consumes the builder and returns an `AsyncLog`.
    pub fn build(self) -> Result<AsyncLog, Error> {
        if self.log_path.is_none() && !self.console {
            return Err(Error::NoOutput);
        }
        let style = Style {
            color: self.color,
            highlight: self.highlight,
        };
        let core = Arc::new(Core::new(
            self.level.to_level_filter(),
            self.max_buffered_lines,
        ));
        let logger = Logger::new(core.clone(), style);
        let file = match self.log_path {
            Some(dir) => Some(RotatingFile::new(
                dir,
                &self.file_name,
                self.max_file_size,
                self.max_files,
            )),
            None => None,
        };
        let console: Option<Box<dyn Output>> = if self.console {
            Some(self.output.unwrap_or_else(|| Box::new(Stdout::new())))
        } else {
            None
        };
        let writer = Writer::new(core.clone(), file, console, style);
        Ok(AsyncLog {
            logger,
            writer,
            core,
            console: self.console,
            color: self.color,
        })
    }
}
