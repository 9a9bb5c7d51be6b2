//! Tool usage logging.
//!
//! Every tool invocation can be recorded as a [`UsageEvent`]. Events go to a
//! [`UsageSink`] owned by a [`UsageLogger`], which is created once by the
//! caller and passed to whatever needs it. A sink that keeps failing is
//! switched off after a fixed number of consecutive failures; recording never
//! changes the outcome of the call being recorded.

use crate::error::Result;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Who ran a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    /// Login name, from `USER` or `USERNAME`
    pub username: String,
    /// Machine name, from `HOSTNAME` or `COMPUTERNAME`
    pub hostname: String,
}

impl UserInfo {
    /// Read user and host from the environment, `unknown` when unset.
    pub fn from_env() -> Self {
        let var = |names: &[&str]| {
            names
                .iter()
                .find_map(|n| std::env::var(n).ok().filter(|v| !v.is_empty()))
                .unwrap_or_else(|| "unknown".to_string())
        };
        Self {
            username: var(&["USER", "USERNAME"]),
            hostname: var(&["HOSTNAME", "COMPUTERNAME"]),
        }
    }
}

/// One recorded tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageEvent {
    /// RFC 3339 local time the call finished
    pub timestamp: String,
    /// Tool name, e.g. `fill`
    pub tool_name: String,
    /// Arguments the tool was called with
    pub parameters: Value,
    /// Caller identity
    pub user: UserInfo,
    /// Whether the call returned successfully
    pub success: bool,
    /// Wall-clock duration
    pub execution_time_ms: u64,
    /// Start of the call's output, truncated
    pub output_preview: String,
    /// Error text of a failed call, empty otherwise
    pub error_message: String,
}

/// Destination for usage events.
pub trait UsageSink {
    /// Record one event.
    fn record(&mut self, event: &UsageEvent) -> Result<()>;
}

/// Writes each event as one JSON line through the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl UsageSink for LogSink {
    fn record(&mut self, event: &UsageEvent) -> Result<()> {
        log::info!(target: "exreport::usage", "{}", serde_json::to_string(event)?);
        Ok(())
    }
}

/// Appends each event as one JSON object per line to a file.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    /// Sink appending to `path`; the file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File events are appended to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UsageSink for JsonLinesSink {
    fn record(&mut self, event: &UsageEvent) -> Result<()> {
        let line = serde_json::to_string(event)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

impl<S: UsageSink + ?Sized> UsageSink for Box<S> {
    fn record(&mut self, event: &UsageEvent) -> Result<()> {
        (**self).record(event)
    }
}

/// Outcome of one logging attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStatus {
    /// The sink accepted the event
    Logged,
    /// The sink failed; logging stays enabled
    Failed,
    /// Logging was switched off after repeated failures; the sink was not called
    Disabled,
}

/// Usage logger settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageLoggerConfig {
    /// Consecutive sink failures after which logging stops
    pub max_consecutive_failures: u32,
    /// Characters of output kept in [`UsageEvent::output_preview`]
    pub preview_limit: usize,
}

impl Default for UsageLoggerConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 5,
            preview_limit: 500,
        }
    }
}

impl UsageLoggerConfig {
    /// Set the failure threshold.
    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max;
        self
    }

    /// Set the preview length.
    pub fn with_preview_limit(mut self, limit: usize) -> Self {
        self.preview_limit = limit;
        self
    }
}

/// Stateful usage logger around a sink.
#[derive(Debug)]
pub struct UsageLogger<S> {
    sink: S,
    config: UsageLoggerConfig,
    consecutive_failures: u32,
    user: UserInfo,
}

impl<S: UsageSink> UsageLogger<S> {
    /// Logger with default settings.
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, UsageLoggerConfig::default())
    }

    /// Logger with explicit settings.
    pub fn with_config(sink: S, config: UsageLoggerConfig) -> Self {
        Self {
            sink,
            config,
            consecutive_failures: 0,
            user: UserInfo::from_env(),
        }
    }

    /// Failures since the last successful write.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether the failure threshold has been reached.
    pub fn is_disabled(&self) -> bool {
        self.consecutive_failures >= self.config.max_consecutive_failures
    }

    /// Hand an event to the sink.
    pub fn log(&mut self, event: &UsageEvent) -> LogStatus {
        if self.is_disabled() {
            return LogStatus::Disabled;
        }

        match self.sink.record(event) {
            Ok(()) => {
                self.consecutive_failures = 0;
                LogStatus::Logged
            }
            Err(e) => {
                self.consecutive_failures += 1;
                log::warn!(
                    "failed to log usage of {} ({}/{}): {}",
                    event.tool_name,
                    self.consecutive_failures,
                    self.config.max_consecutive_failures,
                    e
                );
                if self.is_disabled() {
                    log::warn!(
                        "usage logging disabled after {} consecutive failures",
                        self.consecutive_failures
                    );
                }
                LogStatus::Failed
            }
        }
    }

    /// The sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

/// Keep the first `limit` characters of `text`, marking a cut with `...`.
pub fn truncate_preview(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Run `call`, recording its timing and outcome with `logger`.
///
/// The call's result is returned unchanged whatever happens to the log entry.
///
/// # Example
///
/// ```no_run
/// use exreport::usage::{invoke_logged, LogSink, UsageLogger};
/// use serde_json::json;
///
/// let mut logger = UsageLogger::new(LogSink);
/// let words = invoke_logged(&mut logger, "count_words", json!({"text": "a b c"}), || {
///     Ok::<_, std::io::Error>("a b c".split_whitespace().count())
/// })?;
/// assert_eq!(words, 3);
/// # Ok::<(), std::io::Error>(())
/// ```
pub fn invoke_logged<S, T, E, F>(
    logger: &mut UsageLogger<S>,
    tool_name: &str,
    parameters: Value,
    call: F,
) -> std::result::Result<T, E>
where
    S: UsageSink,
    T: Display,
    E: Display,
    F: FnOnce() -> std::result::Result<T, E>,
{
    let started = Instant::now();
    let result = call();
    let execution_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let (success, output_preview, error_message) = match &result {
        Ok(output) => (
            true,
            truncate_preview(&output.to_string(), logger.config.preview_limit),
            String::new(),
        ),
        Err(e) => (false, String::new(), e.to_string()),
    };

    let event = UsageEvent {
        timestamp: chrono::Local::now().to_rfc3339(),
        tool_name: tool_name.to_string(),
        parameters,
        user: logger.user.clone(),
        success,
        execution_time_ms,
        output_preview,
        error_message,
    };
    logger.log(&event);

    result
}
