// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::Error;
use log::Level;
use serde::{Deserialize, Serialize};

// definitions
#[derive(Deserialize, Serialize)]
#[serde(remote = "Level")]
#[serde(rename_all = "lowercase")]
#[serde(deny_unknown_fields)]
enum LevelDef {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// size units, used in default values
pub(crate) const KB: usize = 1024;
pub(crate) const MB: usize = 1024 * KB;
pub(crate) const GB: usize = 1024 * MB;

// constants to define default values
const FILE_NAME: &str = "log";
const LEVEL: Level = Level::Info;
const HIGHLIGHT: Level = Level::Warn;
const MAX_FILE_SIZE: u64 = GB as u64;
const MAX_FILES: usize = 0;
const MAX_BUFFERED_LINES: usize = 65536;
const CONSOLE: bool = true;
const COLOR: bool = true;

// helper functions
fn file_name() -> String {
    FILE_NAME.to_string()
}

fn level() -> Level {
    LEVEL
}

fn highlight() -> Level {
    HIGHLIGHT
}

fn max_file_size() -> u64 {
    MAX_FILE_SIZE
}

fn max_files() -> usize {
    MAX_FILES
}

fn max_buffered_lines() -> usize {
    MAX_BUFFERED_LINES
}

fn console() -> bool {
    CONSOLE
}

fn color() -> bool {
    COLOR
}

// struct definitions
#[derive(Serialize, Deserialize, Debug)]
pub struct Logging {
    #[serde(default)]
    log_dir: Option<String>,
    #[serde(default = "file_name")]
    file_name: String,
    #[serde(with = "LevelDef")]
    #[serde(default = "level")]
    level: Level,
    #[serde(with = "LevelDef")]
    #[serde(default = "highlight")]
    highlight: Level,
    #[serde(default = "max_file_size")]
    max_file_size: u64,
    #[serde(default = "max_files")]
    max_files: usize,
    #[serde(default = "max_buffered_lines")]
    max_buffered_lines: usize,
    #[serde(default = "console")]
    console: bool,
    #[serde(default = "color")]
    color: bool,
}

// implementation
impl Logging {
    /// Read the logging section from a TOML file at the given path. Missing
    /// keys take their default values.
    pub fn load(file: &str) -> Result<Self, Error> {
        let content = std::fs::read_to_string(file)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn log_dir(&self) -> Option<String> {
        self.log_dir.clone()
    }

    pub fn file_name(&self) -> String {
        self.file_name.clone()
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn highlight(&self) -> Level {
        self.highlight
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    pub fn max_buffered_lines(&self) -> usize {
        self.max_buffered_lines
    }

    pub fn console(&self) -> bool {
        self.console
    }

    pub fn color(&self) -> bool {
        self.color
    }
}

pub trait LoggingConfig {
    fn logging(&self) -> &Logging;
}

// trait implementations
impl Default for Logging {
    fn default() -> Self {
        Self {
            log_dir: None,
            file_name: file_name(),
            level: level(),
            highlight: highlight(),
            max_file_size: max_file_size(),
            max_files: max_files(),
            max_buffered_lines: max_buffered_lines(),
            console: console(),
            color: color(),
        }
    }
}
