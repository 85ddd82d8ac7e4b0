// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::io::{BufWriter, Error, Write};

/// An `Output` is a console logging destination, for example standard out.
/// The writer thread owns the output and flushes it after every drain, so
/// implementations are free to buffer.
pub trait Output: Write + Send + Sync {}

/// An output that writes to `stdout`.
pub struct Stdout {
    writer: BufWriter<std::io::Stdout>,
}

impl Default for Stdout {
    fn default() -> Self {
        Self::new()
    }
}

impl Stdout {
    pub fn new() -> Self {
        Self {
            writer: BufWriter::new(std::io::stdout()),
        }
    }
}

impl Write for Stdout {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        self.writer.write(buf)
    }
    fn flush(&mut self) -> Result<(), Error> {
        self.writer.flush()
    }
}

impl Output for Stdout {}

/// An output that writes to `stderr`. Useful to keep log echo separate from
/// program output on `stdout`.
pub struct Stderr {
    writer: BufWriter<std::io::Stderr>,
}

impl Default for Stderr {
    fn default() -> Self {
        Self::new()
    }
}

impl Stderr {
    pub fn new() -> Self {
        Self {
            writer: BufWriter::new(std::io::stderr()),
        }
    }
}

impl Write for Stderr {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        self.writer.write(buf)
    }
    fn flush(&mut self) -> Result<(), Error> {
        self.writer.flush()
    }
}

impl Output for Stderr {}
