// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use swaplog::*;

fn main() {
    let mut log = LogBuilder::new()
        .log_path("demo_logs")
        .file_name("demo")
        .level(Level::Trace)
        .max_file_size(4096)
        .max_files(4)
        .build()
        .expect("failed to initialize log")
        .start();

    // route the standard macros through the engine
    log.register().expect("failed to register logger");

    error!("error");
    warn!("warning");
    info!("info");
    debug!("debug");
    trace!("trace");

    log_info!(log, "burst of {} lines to exercise size rotation", 200);
    for i in 0..200 {
        log_debug!(log, "line {}", i);
    }

    let mut status = log.stream(Level::Info, file!(), line!());
    status.append("assembled from ").append(3).append(" parts");
    status.finish();

    log.stop();
}
