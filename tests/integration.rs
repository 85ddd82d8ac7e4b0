// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use swaplog::*;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Rotated log files under `dir` whose names start with `base`, sorted by
/// name.
fn log_files(dir: &Path, base: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .expect("failed to read log dir")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(base) && name.ends_with(".log"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

/// The lines of a log file with the byte-order mark stripped.
fn read_lines(path: &Path) -> Vec<String> {
    let content = std::fs::read_to_string(path).expect("failed to read log file");
    content
        .strip_prefix('\u{feff}')
        .unwrap_or(&content)
        .lines()
        .map(|line| line.to_string())
        .collect()
}

/// A console sink backed by shared memory so tests can inspect the echo.
#[derive(Clone, Default)]
struct SharedBuf {
    data: Arc<Mutex<Vec<u8>>>,
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.data
            .lock()
            .expect("console sink poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Output for SharedBuf {}

#[test]
fn lines_round_trip_in_order() {
    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let mut handle = LogBuilder::new()
        .log_path(dir.path())
        .file_name("roundtrip")
        .console(false)
        .color(false)
        .build()
        .expect("failed to build logger")
        .start();
    for i in 0..100 {
        handle.submit(Level::Info, "app.rs", 1, &format!("message {}", i));
    }
    handle.stop();

    let files = log_files(dir.path(), "roundtrip");
    assert_eq!(files.len(), 1);
    let lines = read_lines(&files[0]);
    assert_eq!(lines.len(), 100);
    for (i, line) in lines.iter().enumerate() {
        assert!(line.contains(" INFO| "));
        assert!(line.ends_with(&format!("message {}", i)));
    }
    assert_eq!(handle.dropped(), 0);
}

#[test]
fn level_threshold_filters_and_changes_at_runtime() {
    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let mut handle = LogBuilder::new()
        .log_path(dir.path())
        .file_name("levels")
        .console(false)
        .color(false)
        .build()
        .expect("failed to build logger")
        .start();
    assert_eq!(handle.level(), LevelFilter::Info);
    handle.submit(Level::Debug, "app.rs", 1, "hidden");
    handle.submit(Level::Info, "app.rs", 2, "shown");
    handle.set_level(LevelFilter::Debug);
    handle.submit(Level::Debug, "app.rs", 3, "now shown");
    handle.stop();

    let files = log_files(dir.path(), "levels");
    let lines = read_lines(&files[0]);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("shown"));
    assert!(lines[1].ends_with("now shown"));
}

#[test]
fn concurrent_producers_preserve_per_thread_order() {
    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let mut handle = LogBuilder::new()
        .log_path(dir.path())
        .file_name("concurrent")
        .console(false)
        .color(false)
        .max_buffered_lines(100_000)
        .build()
        .expect("failed to build logger")
        .start();
    std::thread::scope(|scope| {
        for worker in 0..4 {
            let handle = &handle;
            scope.spawn(move || {
                for i in 0..250 {
                    let message = format!("worker {} line {}", worker, i);
                    handle.submit(Level::Info, "worker.rs", 1, &message);
                }
            });
        }
    });
    handle.stop();
    assert_eq!(handle.dropped(), 0);

    let files = log_files(dir.path(), "concurrent");
    let mut total = 0;
    let mut next = [0usize; 4];
    for file in &files {
        for line in read_lines(file) {
            total += 1;
            for (worker, expected) in next.iter_mut().enumerate() {
                let marker = format!("worker {} line ", worker);
                if let Some(rest) = line.split(marker.as_str()).nth(1) {
                    let i: usize = rest.parse().expect("malformed line index");
                    assert_eq!(i, *expected);
                    *expected += 1;
                }
            }
        }
    }
    assert_eq!(total, 1000);
}

#[test]
fn stop_is_idempotent_and_rejects_later_submissions() {
    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let mut handle = LogBuilder::new()
        .log_path(dir.path())
        .file_name("stopped")
        .console(false)
        .color(false)
        .build()
        .expect("failed to build logger")
        .start();
    handle.submit(Level::Info, "app.rs", 1, "before stop");
    handle.stop();
    handle.submit(Level::Info, "app.rs", 2, "after stop");
    handle.stop();

    let files = log_files(dir.path(), "stopped");
    let lines = read_lines(&files[0]);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("before stop"));
}

#[test]
fn size_cap_rotates_to_indexed_files() {
    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let mut handle = LogBuilder::new()
        .log_path(dir.path())
        .file_name("rotate")
        .console(false)
        .color(false)
        .max_file_size(256)
        .build()
        .expect("failed to build logger")
        .start();
    // pause between bursts so the writer drains more than one batch and
    // evaluates the size cap in between
    for burst in 0..4 {
        for i in 0..10 {
            let message = format!("rotation line {}", burst * 10 + i);
            handle.submit(Level::Info, "app.rs", 1, &message);
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    handle.stop();

    let files = log_files(dir.path(), "rotate");
    assert!(files.len() >= 2);
    let total: usize = files.iter().map(|file| read_lines(file).len()).sum();
    assert_eq!(total, 40);
}

#[test]
fn facade_macros_feed_the_engine() {
    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let mut handle = LogBuilder::new()
        .log_path(dir.path())
        .file_name("facade")
        .console(false)
        .color(false)
        .build()
        .expect("failed to build logger")
        .start();
    handle.register().expect("failed to register logger");
    info!("via the facade: {}", 42);
    debug!("below the threshold");
    handle.stop();

    let files = log_files(dir.path(), "facade");
    let lines = read_lines(&files[0]);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(" INFO| "));
    assert!(lines[0].ends_with("via the facade: 42"));
}

#[test]
fn handle_macros_capture_the_callsite() {
    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let mut handle = LogBuilder::new()
        .log_path(dir.path())
        .file_name("macros")
        .console(false)
        .color(false)
        .build()
        .expect("failed to build logger")
        .start();
    log_info!(handle, "count {}", 7);
    log_warn!(handle, "warned");
    log_trace!(handle, "hidden at the default level");
    handle.stop();

    let files = log_files(dir.path(), "macros");
    let lines = read_lines(&files[0]);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("integration.rs"));
    assert!(lines[0].ends_with("count 7"));
    assert!(lines[1].contains(" WARN| "));
}

#[test]
fn console_only_engine_echoes_lines() {
    let sink = SharedBuf::default();
    let mut handle = LogBuilder::new()
        .output(Box::new(sink.clone()))
        .color(false)
        .build()
        .expect("failed to build logger")
        .start();
    handle.submit(Level::Info, "app.rs", 1, "echoed");
    handle.stop();

    let data = sink.data.lock().expect("console sink poisoned");
    let text = std::str::from_utf8(&data).expect("console output was not utf-8");
    assert!(text.contains("echoed"));
    assert!(!text.contains('\u{feff}'));
}

#[test]
fn embedded_newlines_produce_separate_lines() {
    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let mut handle = LogBuilder::new()
        .log_path(dir.path())
        .file_name("multiline")
        .console(false)
        .color(false)
        .build()
        .expect("failed to build logger")
        .start();
    handle.submit(Level::Info, "app.rs", 1, "first\nsecond");
    handle.stop();

    let files = log_files(dir.path(), "multiline");
    let lines = read_lines(&files[0]);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("app.rs"));
    assert!(lines[0].ends_with("first"));
    assert!(lines[1].contains("app.rs"));
    assert!(lines[1].ends_with("second"));
}

#[test]
fn engine_builds_from_config_section() {
    struct AppConfig {
        logging: Logging,
    }

    impl LoggingConfig for AppConfig {
        fn logging(&self) -> &Logging {
            &self.logging
        }
    }

    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let content = format!(
        "log_dir = \"{}\"\nfile_name = \"cfg\"\nconsole = false\ncolor = false\n",
        dir.path().display()
    );
    let config_path = dir.path().join("app.toml");
    std::fs::write(&config_path, content).expect("failed to write config");

    let logging = Logging::load(config_path.to_str().expect("path was not utf-8"))
        .expect("failed to load config");
    let app = AppConfig { logging };
    let mut handle = configure_logging(&app)
        .expect("failed to configure logging")
        .start();
    log_info!(handle, "configured");
    handle.stop();

    let files = log_files(dir.path(), "cfg");
    assert_eq!(files.len(), 1);
    assert!(read_lines(&files[0])[0].ends_with("configured"));
}

#[test]
fn stream_accumulates_then_submits() {
    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let mut handle = LogBuilder::new()
        .log_path(dir.path())
        .file_name("stream")
        .console(false)
        .color(false)
        .build()
        .expect("failed to build logger")
        .start();
    {
        let mut stream = handle.stream(Level::Info, "app.rs", 9);
        stream.append("status ").append(200).append(" done");
    }
    let mut stream = handle.stream(Level::Info, "app.rs", 10);
    stream.append("explicit");
    stream.finish();
    handle.stop();

    let files = log_files(dir.path(), "stream");
    let lines = read_lines(&files[0]);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("status 200 done"));
    assert!(lines[1].ends_with("explicit"));
}

#[test]
fn flush_makes_lines_visible_before_stop() {
    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let mut handle = LogBuilder::new()
        .log_path(dir.path())
        .file_name("durable")
        .console(false)
        .color(false)
        .build()
        .expect("failed to build logger")
        .start();
    handle.submit(Level::Info, "app.rs", 1, "written before stop");
    handle.flush();

    // the engine is still running, yet the line is already on disk
    let files = log_files(dir.path(), "durable");
    assert_eq!(files.len(), 1);
    let lines = read_lines(&files[0]);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("written before stop"));
    handle.stop();
}

// The two tests below observe process-wide effects, so each re-runs this
// binary filtered down to itself and asserts on the child's fate.

#[test]
fn fatal_persists_its_message() {
    if let Some(dir) = std::env::var_os("SWAPLOG_TEST_FATAL_DIR") {
        let handle = LogBuilder::new()
            .log_path(&dir)
            .file_name("fatal")
            .console(false)
            .color(false)
            .build()
            .expect("failed to build logger")
            .start();
        handle.register().expect("failed to register logger");
        fatal!("fatal boom {}", 1);
    }

    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let exe = std::env::current_exe().expect("failed to locate test binary");
    let output = Command::new(exe)
        .args(["fatal_persists_its_message", "--exact", "--nocapture"])
        .env("SWAPLOG_TEST_FATAL_DIR", dir.path())
        .output()
        .expect("failed to run child");
    assert_eq!(output.status.code(), Some(1));

    let files = log_files(dir.path(), "fatal");
    assert_eq!(files.len(), 1);
    let lines = read_lines(&files[0]);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("ERROR"));
    assert!(lines[0].ends_with("fatal boom 1"));
}

#[test]
fn crash_terminates_with_the_originating_signal() {
    use std::os::unix::process::ExitStatusExt;

    if std::env::var_os("SWAPLOG_TEST_RAISE_SEGV").is_some() {
        crash::install(true, false);
        unsafe { libc::raise(libc::SIGSEGV) };
        unreachable!();
    }

    let exe = std::env::current_exe().expect("failed to locate test binary");
    let output = Command::new(exe)
        .args([
            "crash_terminates_with_the_originating_signal",
            "--exact",
            "--nocapture",
        ])
        .env("SWAPLOG_TEST_RAISE_SEGV", "1")
        .output()
        .expect("failed to run child");

    // killed by the re-raised signal, not a plain exit
    assert_eq!(output.status.signal(), Some(libc::SIGSEGV));
    assert_eq!(output.status.code(), None);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("SIGSEGV"));
}
