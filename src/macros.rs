// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

/// Logs a message at `Level::Error` through the given handle, capturing the
/// callsite file and line for the preamble.
#[macro_export]
macro_rules! log_error {
    ($handle:expr, $($arg:tt)*) => {
        $handle.submit_fmt($crate::Level::Error, file!(), line!(), format_args!($($arg)*))
    };
}

/// Logs a message at `Level::Warn` through the given handle.
#[macro_export]
macro_rules! log_warn {
    ($handle:expr, $($arg:tt)*) => {
        $handle.submit_fmt($crate::Level::Warn, file!(), line!(), format_args!($($arg)*))
    };
}

/// Logs a message at `Level::Info` through the given handle.
#[macro_export]
macro_rules! log_info {
    ($handle:expr, $($arg:tt)*) => {
        $handle.submit_fmt($crate::Level::Info, file!(), line!(), format_args!($($arg)*))
    };
}

/// Logs a message at `Level::Debug` through the given handle.
#[macro_export]
macro_rules! log_debug {
    ($handle:expr, $($arg:tt)*) => {
        $handle.submit_fmt($crate::Level::Debug, file!(), line!(), format_args!($($arg)*))
    };
}

/// Logs a message at `Level::Trace` through the given handle.
#[macro_export]
macro_rules! log_trace {
    ($handle:expr, $($arg:tt)*) => {
        $handle.submit_fmt($crate::Level::Trace, file!(), line!(), format_args!($($arg)*))
    };
}

/// A `fatal!` macro which logs at `Level::Error` through the global facade,
/// flushes it so the message reaches the sinks, and then terminates the
/// process.
#[macro_export]
macro_rules! fatal {
    () => (
        $crate::error!();
        $crate::logger().flush();
        std::process::exit(1);
        );
    ($($arg:tt)*) => {{
        $crate::error!($($arg)*);
        $crate::logger().flush();
        std::process::exit(1);
    }};
}
