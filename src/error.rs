// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use thiserror::Error;

/// Errors which may arise while configuring the logging engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Neither a log directory nor the console echo was enabled.
    #[error("no output configured")]
    NoOutput,
    /// The config file could not be read.
    #[error("error reading config: {0}")]
    Io(#[from] std::io::Error),
    /// The config file could not be parsed.
    #[error("error parsing config: {0}")]
    Config(#[from] toml::de::Error),
}
