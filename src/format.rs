// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Pure rendering of a log record into display lines. A record with embedded
//! newlines produces one fully formatted line per segment, each carrying the
//! complete preamble, so every physical output line is self-describing.

use crate::color;
use crate::Level;

use chrono::NaiveDateTime;
use std::sync::atomic::{AtomicU64, Ordering};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const THREAD_ID_WIDTH: usize = 7;
const FILENAME_WIDTH: usize = 20;
const LINE_WIDTH: usize = 5;
const LEVEL_WIDTH: usize = 5;

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

/// Returns a small process-local id for the calling thread, assigned on
/// first use. Stable for the lifetime of the thread.
pub(crate) fn thread_id() -> u64 {
    THREAD_ID.with(|id| *id)
}

/// Rendering options shared by the producer side and the crash reporter.
#[derive(Clone, Copy)]
pub(crate) struct Style {
    /// emit terminal escape sequences
    pub(crate) color: bool,
    /// most verbose level rendered in a highlight color rather than dim
    pub(crate) highlight: Level,
}

/// Render one record into `lines`, one entry per `\n`-separated segment of
/// `message`. A message with K embedded newlines yields exactly K+1 lines.
pub(crate) fn format_record(
    lines: &mut Vec<String>,
    now: NaiveDateTime,
    level: Level,
    file: &str,
    line: u32,
    tid: u64,
    message: &str,
    style: &Style,
) {
    let preamble = format!(
        "[{}] [{:^tw$}] {:>fw$}:{:<lw$} {:>vw$}| ",
        now.format(TIMESTAMP_FORMAT),
        tid,
        basename(file),
        line,
        level,
        tw = THREAD_ID_WIDTH,
        fw = FILENAME_WIDTH,
        lw = LINE_WIDTH,
        vw = LEVEL_WIDTH,
    );
    for segment in message.split('\n') {
        lines.push(style_line(&preamble, segment, level, style));
    }
}

/// Assemble one styled output line. Levels at or above the highlight
/// threshold get a per-level color covering the whole line; below it the
/// preamble is dimmed, with INFO message bodies rendered plain and more
/// verbose levels staying dim throughout.
fn style_line(preamble: &str, segment: &str, level: Level, style: &Style) -> String {
    let mut out = String::with_capacity(preamble.len() + segment.len() + 16);
    if !style.color {
        out.push_str(preamble);
        out.push_str(segment);
    } else if level <= style.highlight {
        let color = if level == Level::Error {
            color::RED
        } else {
            color::YELLOW
        };
        out.push_str(color);
        out.push_str(preamble);
        out.push_str(segment);
        out.push_str(color::RESET);
    } else {
        out.push_str(color::RESET);
        out.push_str(color::DIM);
        out.push_str(preamble);
        if level == Level::Info {
            out.push_str(color::RESET);
        }
        out.push_str(segment);
        out.push_str(color::RESET);
    }
    out.push('\n');
    out
}

/// Reduce a source path to its final component.
fn basename(path: &str) -> &str {
    path.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(path)
}
