// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Fatal-signal reporting. On segmentation fault, abort, and similar
//! signals the handler renders the current call stack as ERROR lines with
//! the normal formatter and writes them synchronously to stderr and to the
//! current log file, then re-raises the signal so the process terminates
//! with the original cause.
//!
//! This path is decoupled from the buffered engine: it holds none of the
//! writer's locks and appends to the log file through its own handle. The
//! file path is published by the writer thread into a slot that both sides
//! only ever `try_lock`. Capturing and symbolizing the trace allocates; a
//! re-entry guard forces immediate termination if the handler itself
//! faults.

use crate::format::{self, Style};
use crate::Level;

use backtrace::Backtrace;
use chrono::{Local, NaiveDateTime};
use libc::c_int;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

const FATAL_SIGNALS: [c_int; 5] = [
    libc::SIGSEGV,
    libc::SIGABRT,
    libc::SIGBUS,
    libc::SIGILL,
    libc::SIGFPE,
];

static INSTALLED: AtomicBool = AtomicBool::new(false);
static IN_PROGRESS: AtomicBool = AtomicBool::new(false);
static CONSOLE: AtomicBool = AtomicBool::new(true);
static COLOR: AtomicBool = AtomicBool::new(false);
static ACTIVE_LOG: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Install the fatal-signal handlers. The first call installs; later calls
/// only update the console and color settings. `AsyncLog::start` calls this
/// with the engine's own settings, so explicit installation is only needed
/// when no engine is running.
pub fn install(console: bool, color: bool) {
    CONSOLE.store(console, Ordering::Relaxed);
    COLOR.store(color, Ordering::Relaxed);
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }
    for signal in FATAL_SIGNALS {
        install_handler(signal);
    }
}

/// Called by the writer thread whenever the open log file changes. Skipped
/// rather than blocked if a dump is in progress on the other side.
pub(crate) fn set_active_log(path: Option<PathBuf>) {
    if let Ok(mut slot) = ACTIVE_LOG.try_lock() {
        *slot = path;
    }
}

fn install_handler(signal: c_int) {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handle_signal as *const () as libc::sighandler_t;
        // the disposition resets to default before the handler runs and the
        // signal is left unblocked inside it: a fault in the handler cannot
        // loop, and the handler's re-raise is delivered rather than left
        // pending
        action.sa_flags = libc::SA_RESETHAND | libc::SA_NODEFER;
        libc::sigemptyset(&mut action.sa_mask);
        libc::sigaction(signal, &action, std::ptr::null_mut());
    }
}

extern "C" fn handle_signal(signal: c_int) {
    if IN_PROGRESS.swap(true, Ordering::SeqCst) {
        unsafe { libc::_exit(128 + signal) };
    }
    emit(signal);
    // the disposition is back at the default and the signal is not blocked
    // here, so re-raising terminates the process with the originating
    // signal; _exit only runs if delivery fails
    unsafe {
        libc::raise(signal);
        libc::_exit(128 + signal);
    }
}

fn emit(signal: c_int) {
    let trace = Backtrace::new();
    let now = Local::now().naive_local();
    let style = Style {
        color: COLOR.load(Ordering::Relaxed),
        highlight: Level::Warn,
    };
    let mut block = Vec::new();
    let _ = write_dump(&mut block, &trace, signal, now, &style);
    if CONSOLE.load(Ordering::Relaxed) {
        let _ = std::io::stderr().write_all(&block);
    }
    if let Ok(slot) = ACTIVE_LOG.try_lock() {
        if let Some(path) = slot.as_ref() {
            if let Ok(mut file) = std::fs::OpenOptions::new().append(true).create(true).open(path) {
                let _ = file.write_all(&block);
            }
        }
    }
}

/// Render the dump: a header naming the signal, then one ERROR line per
/// resolved stack frame, each carrying the frame's source location in the
/// preamble and its symbol as the message.
pub(crate) fn write_dump(
    out: &mut dyn Write,
    trace: &Backtrace,
    signal: c_int,
    now: NaiveDateTime,
    style: &Style,
) -> std::io::Result<()> {
    let tid = format::thread_id();
    let mut lines = Vec::new();
    format::format_record(
        &mut lines,
        now,
        Level::Error,
        file!(),
        line!(),
        tid,
        &format!("fatal signal {} ({}), dumping stack", signal, signal_name(signal)),
        style,
    );
    for (i, frame) in trace.frames().iter().enumerate() {
        let symbols = frame.symbols();
        if symbols.is_empty() {
            format::format_record(
                &mut lines,
                now,
                Level::Error,
                "??",
                0,
                tid,
                &format!("{:4}: <unresolved> ({:p})", i, frame.ip()),
                style,
            );
        }
        for symbol in symbols {
            let name = symbol
                .name()
                .map(|n| n.to_string())
                .unwrap_or_else(|| String::from("<unresolved>"));
            let file = symbol.filename().and_then(|p| p.to_str()).unwrap_or("??");
            let line = symbol.lineno().unwrap_or(0);
            format::format_record(
                &mut lines,
                now,
                Level::Error,
                file,
                line,
                tid,
                &format!("{:4}: {}", i, name),
                style,
            );
        }
    }
    for line in &lines {
        out.write_all(line.as_bytes())?;
    }
    Ok(())
}

fn signal_name(signal: c_int) -> &'static str {
    match signal {
        libc::SIGSEGV => "SIGSEGV",
        libc::SIGABRT => "SIGABRT",
        libc::SIGBUS => "SIGBUS",
        libc::SIGILL => "SIGILL",
        libc::SIGFPE => "SIGFPE",
        _ => "unknown",
    }
}
