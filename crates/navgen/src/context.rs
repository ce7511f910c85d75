//! Per-task build context: buffered log entries and stage timers
//!
//! Worker threads never touch the global logger. Each generation task records
//! into its own [`BuildContext`] and the orchestrating thread replays the
//! buffer through the `log` facade when it finalizes the task.

use std::collections::BTreeMap;
use std::time::Duration;
use web_time::Instant;

/// Log level for buffered messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warning = 2,
    Error = 3,
}

/// Build stages that are timed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerCategory {
    /// Whole task, from first step to completion
    Total,
    Rasterization,
    Filtering,
    Connect,
    Erode,
    Polygonize,
}

/// A buffered log message
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// Accumulated time spent in one stage
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerEntry {
    pub duration: Duration,
    /// Number of start/stop pairs recorded
    pub count: usize,
}

/// Logging and timing sink owned by a single generation task
#[derive(Debug)]
pub struct BuildContext {
    logs: Vec<LogEntry>,
    active_timers: BTreeMap<TimerCategory, Instant>,
    timers: BTreeMap<TimerCategory, TimerEntry>,
    min_log_level: LogLevel,
    max_log_entries: usize,
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildContext {
    pub fn new() -> Self {
        Self {
            logs: Vec::new(),
            active_timers: BTreeMap::new(),
            timers: BTreeMap::new(),
            min_log_level: LogLevel::Debug,
            max_log_entries: 1000,
        }
    }

    pub fn set_log_level(&mut self, level: LogLevel) {
        self.min_log_level = level;
    }

    pub fn log_debug(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn log_info(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn log_warning(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn log_error(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        if level < self.min_log_level {
            return;
        }
        self.logs.push(LogEntry {
            level,
            message: message.into(),
        });
        if self.logs.len() > self.max_log_entries {
            self.logs.remove(0);
        }
    }

    pub fn start_timer(&mut self, category: TimerCategory) {
        self.active_timers.entry(category).or_insert_with(Instant::now);
    }

    pub fn stop_timer(&mut self, category: TimerCategory) {
        if let Some(start) = self.active_timers.remove(&category) {
            let entry = self.timers.entry(category).or_default();
            entry.duration += start.elapsed();
            entry.count += 1;
        }
    }

    pub fn timer_duration(&self, category: TimerCategory) -> Option<Duration> {
        self.timers.get(&category).map(|entry| entry.duration)
    }

    pub fn timer_count(&self, category: TimerCategory) -> usize {
        self.timers.get(&category).map_or(0, |entry| entry.count)
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    /// Replays buffered entries and a timer summary through `log`, then clears them
    ///
    /// Must only be called from the orchestrating thread.
    pub fn flush(&mut self, prefix: &str) {
        for entry in self.logs.drain(..) {
            match entry.level {
                LogLevel::Debug => log::debug!("{prefix}: {}", entry.message),
                LogLevel::Info => log::info!("{prefix}: {}", entry.message),
                LogLevel::Warning => log::warn!("{prefix}: {}", entry.message),
                LogLevel::Error => log::error!("{prefix}: {}", entry.message),
            }
        }
        for (category, entry) in &self.timers {
            log::debug!(
                "{prefix}: {:?} {:.2}ms ({} slices)",
                category,
                entry.duration.as_secs_f64() * 1000.0,
                entry.count
            );
        }
        self.timers.clear();
        self.active_timers.clear();
    }
}
