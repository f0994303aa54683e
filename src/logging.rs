// Logging - console + per-category log files
//
// Everything logs through the `log` facade. The installed logger forwards
// each record to env_logger for the console and, when enabled, appends it to
// one of three timestamped files:
//
//   error.log    - every error-level record
//   startup.log  - records with target `lifecycle` (startup / shutdown)
//   event.log    - all other info and warn records
//
// The first write to a file in a process truncates it, later writes append.
// Timestamps are UTC, the same clock env_logger stamps console lines with.

use crate::config::DebugConfig;
use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Log target for startup and shutdown milestones
pub const LIFECYCLE: &str = "lifecycle";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Event,
    Error,
    StartStop,
}

impl LogCategory {
    pub fn file_name(self) -> &'static str {
        match self {
            LogCategory::Event => "event.log",
            LogCategory::Error => "error.log",
            LogCategory::StartStop => "startup.log",
        }
    }

    fn index(self) -> usize {
        match self {
            LogCategory::Event => 0,
            LogCategory::Error => 1,
            LogCategory::StartStop => 2,
        }
    }

    /// Which file a record lands in. Debug and trace stay on the console.
    pub fn for_record(level: Level, target: &str) -> Option<Self> {
        match level {
            Level::Error => Some(LogCategory::Error),
            Level::Warn | Level::Info if target == LIFECYCLE => Some(LogCategory::StartStop),
            Level::Warn | Level::Info => Some(LogCategory::Event),
            Level::Debug | Level::Trace => None,
        }
    }
}

/// Append-only, timestamped sink with one file per category.
pub struct CategoryLog {
    dir: PathBuf,
    /// Whether each category has been written (and so truncated) yet
    opened: Mutex<[bool; 3]>,
}

impl CategoryLog {
    pub fn new<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            opened: Mutex::new([false; 3]),
        })
    }

    pub fn path(&self, category: LogCategory) -> PathBuf {
        self.dir.join(category.file_name())
    }

    pub fn log(&self, category: LogCategory, message: &str) -> io::Result<()> {
        let mut opened = self.opened.lock();
        let first_write = !opened[category.index()];

        let mut options = OpenOptions::new();
        if first_write {
            options.create(true).write(true).truncate(true);
        } else {
            options.create(true).append(true);
        }

        let mut file = options.open(self.path(category))?;
        writeln!(
            file,
            "{}   ===   {}",
            humantime::format_rfc3339_seconds(SystemTime::now()),
            message
        )?;

        opened[category.index()] = true;
        Ok(())
    }
}

/// Forwards to env_logger and to the category files.
pub struct TeeLogger {
    console: env_logger::Logger,
    files: Option<CategoryLog>,
}

impl TeeLogger {
    pub fn new(console: env_logger::Logger, files: Option<CategoryLog>) -> Self {
        Self { console, files }
    }

    pub fn max_level(&self) -> LevelFilter {
        match self.files {
            Some(_) => self.console.filter().max(LevelFilter::Info),
            None => self.console.filter(),
        }
    }
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console.enabled(metadata) || (self.files.is_some() && metadata.level() <= Level::Info)
    }

    fn log(&self, record: &Record) {
        if self.console.matches(record) {
            self.console.log(record);
        }

        if let Some(files) = &self.files {
            if let Some(category) = LogCategory::for_record(record.level(), record.target()) {
                if let Err(e) = files.log(category, &record.args().to_string()) {
                    eprintln!("Failed to write {}: {}", category.file_name(), e);
                }
            }
        }
    }

    fn flush(&self) {
        self.console.flush();
    }
}

/// Install the global logger. Safe to call more than once; later calls are
/// ignored by the `log` facade.
pub fn init(config: &DebugConfig) {
    let console = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .build();

    let files = if config.log_to_file {
        match CategoryLog::new(&config.log_dir) {
            Ok(files) => Some(files),
            Err(e) => {
                eprintln!("Log directory {:?} unavailable: {}", config.log_dir, e);
                None
            }
        }
    } else {
        None
    };

    let logger = TeeLogger::new(console, files);
    let max_level = logger.max_level();
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(max_level);
    }
}
