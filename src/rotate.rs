// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! File rotation. A `RotatingFile` owns the open log file along with the
//! calendar day, file index, and byte count that drive rotation. It is used
//! exclusively by the writer thread, so none of this state needs locking.
//!
//! Files are named `{base}-{YYYY-MM-DD}({index}).log`. The index starts at
//! zero each day and increments whenever the size cap is exceeded. Brand-new
//! files begin with a UTF-8 byte-order mark, which counts toward the size;
//! reopening an existing file appends to it and seeds the byte counter from
//! its current length.
//!
//! Failure to open a file is never fatal: the engine degrades to console
//! output, reports the condition once per failure streak on stderr, and
//! retries at the next rotation check.

use chrono::NaiveDate;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub(crate) const BOM: &[u8] = b"\xef\xbb\xbf";

pub(crate) struct RotatingFile {
    dir: PathBuf,
    base: String,
    max_bytes: u64,
    max_files: usize,
    day: Option<NaiveDate>,
    index: u32,
    bytes: u64,
    writer: Option<BufWriter<std::fs::File>>,
    failed: bool,
}

impl RotatingFile {
    /// Create the rotation state without touching the filesystem. The first
    /// `roll_day` call opens the initial file. A `max_bytes` of zero
    /// disables size based rotation; a `max_files` of zero disables old-file
    /// cleanup.
    pub(crate) fn new<T: AsRef<Path>>(
        dir: T,
        base: &str,
        max_bytes: u64,
        max_files: usize,
    ) -> Self {
        Self {
            dir: dir.as_ref().to_owned(),
            base: base.to_string(),
            max_bytes,
            max_files,
            day: None,
            index: 0,
            bytes: 0,
            writer: None,
            failed: false,
        }
    }

    /// The path of the currently open file, if one is open.
    pub(crate) fn path(&self) -> Option<PathBuf> {
        match (&self.writer, self.day) {
            (Some(_), Some(day)) => Some(self.path_for(day, self.index)),
            _ => None,
        }
    }

    fn path_for(&self, day: NaiveDate, index: u32) -> PathBuf {
        self.dir
            .join(format!("{}-{}({}).log", self.base, day.format("%Y-%m-%d"), index))
    }

    /// Recover the day and index from a `{base}-{YYYY-MM-DD}({index}).log`
    /// name. Names this scheme did not produce yield `None`.
    fn parse_name(&self, name: &str) -> Option<(NaiveDate, u32)> {
        let rest = name.strip_prefix(&self.base)?.strip_prefix('-')?;
        let rest = rest.strip_suffix(".log")?;
        let (day, index) = rest.split_once('(')?;
        let day = NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()?;
        let index = index.strip_suffix(')')?.parse().ok()?;
        Some((day, index))
    }

    /// Evaluate the day side of the rotation rule. Called once per writer
    /// wake, before the batch is written. Opens the initial file, reopens
    /// after an earlier failure, and starts a new index-zero file when the
    /// calendar day changes.
    pub(crate) fn roll_day(&mut self, today: NaiveDate) {
        if self.writer.is_some() && self.day == Some(today) {
            return;
        }
        self.close();
        self.day = Some(today);
        self.index = 0;
        self.open();
    }

    /// Evaluate the size side of the rotation rule. Called once per writer
    /// wake, after the batch is written, so a single batch never splits
    /// across files.
    pub(crate) fn roll_size(&mut self) {
        if self.max_bytes == 0 || self.writer.is_none() || self.bytes < self.max_bytes {
            return;
        }
        self.close();
        self.index += 1;
        self.open();
    }

    /// Append one formatted line to the open file, if any.
    pub(crate) fn write_line(&mut self, line: &str) {
        if let Some(writer) = &mut self.writer {
            let _ = writer.write_all(line.as_bytes());
            self.bytes += line.len() as u64;
        }
    }

    pub(crate) fn flush(&mut self) {
        if let Some(writer) = &mut self.writer {
            let _ = writer.flush();
        }
    }

    fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }

    /// Open the file for the current day and index, appending if it already
    /// exists. Indices holding files already at the size cap are skipped so
    /// a restart on a crowded day converges on a usable file immediately.
    fn open(&mut self) {
        self.writer = None;
        let day = match self.day {
            Some(day) => day,
            None => return,
        };
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            let dir = self.dir.clone();
            self.report(&dir, e);
            return;
        }
        loop {
            let path = self.path_for(day, self.index);
            let file = match OpenOptions::new().append(true).create(true).open(&path) {
                Ok(file) => file,
                Err(e) => {
                    self.report(&path, e);
                    return;
                }
            };
            let len = file.metadata().map(|m| m.len()).unwrap_or(0);
            if self.max_bytes > 0 && len >= self.max_bytes {
                self.index += 1;
                continue;
            }
            let mut writer = BufWriter::new(file);
            self.bytes = len;
            if len == 0 {
                let _ = writer.write_all(BOM);
                self.bytes = BOM.len() as u64;
            }
            self.writer = Some(writer);
            self.failed = false;
            self.cleanup();
            return;
        }
    }

    fn report(&mut self, path: &Path, error: std::io::Error) {
        if !self.failed {
            eprintln!("failed to open log file {:?}: {}", path, error);
            self.failed = true;
        }
    }

    /// Remove the oldest rotated files beyond the `max_files` limit. Age is
    /// the day and index encoded in the name, so ordering is exact and does
    /// not depend on filesystem metadata. The open file always survives and
    /// counts toward the limit; names that do not parse are left alone.
    fn cleanup(&self) {
        if self.max_files == 0 {
            return;
        }
        let current = match self.day {
            Some(day) => self.path_for(day, self.index),
            None => return,
        };
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };
        let mut files = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path == current {
                continue;
            }
            let age = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| self.parse_name(n));
            if let Some(age) = age {
                files.push((age, path));
            }
        }
        if files.len() + 1 <= self.max_files {
            return;
        }
        files.sort();
        let excess = files.len() + 1 - self.max_files;
        for (_, path) in files.into_iter().take(excess) {
            let _ = std::fs::remove_file(path);
        }
    }
}
