//! Severity and verbosity model shared across the workspace.
//!
//! This is deliberately independent from the wire protocol's own message
//! severities (`INFO`/`WARNING`/`ERROR`/`ERROR_XFER`/`LOG`, modelled by
//! `protocol::LogCode`): this crate governs the implementation's internal
//! diagnostic logging, gated by a `-v`-style verbosity count, with an
//! optional bridge onto the `tracing` ecosystem.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::{Mutex, OnceLock};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Relative importance of a diagnostic log event, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Severity {
    /// An operation failed outright.
    Error,
    /// An operation partially succeeded or a recoverable condition was hit.
    Warning,
    /// High-level progress worth surfacing without `-v`.
    Info,
    /// Diagnostic detail useful while investigating a problem.
    Debug,
    /// Per-item tracing, the loudest level.
    Trace,
}

impl Severity {
    /// All variants, most to least severe.
    pub const ALL: [Severity; 5] = [
        Severity::Error,
        Severity::Warning,
        Severity::Info,
        Severity::Debug,
        Severity::Trace,
    ];

    /// Short lowercase name, as used in structured log output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Debug => "debug",
            Severity::Trace => "trace",
        }
    }

    #[cfg(feature = "tracing")]
    const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Severity::Error => tracing::Level::ERROR,
            Severity::Warning => tracing::Level::WARN,
            Severity::Info => tracing::Level::INFO,
            Severity::Debug => tracing::Level::DEBUG,
            Severity::Trace => tracing::Level::TRACE,
        }
    }
}

/// A `-v`-style verbosity count: 0 emits only errors and warnings, each
/// further level unlocks one more [`Severity`] tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VerbosityLevel(u8);

impl VerbosityLevel {
    /// The quietest level: errors and warnings only.
    pub const QUIET: VerbosityLevel = VerbosityLevel(0);

    /// Builds a verbosity level from a `-v` repeat count, clamped to the
    /// range this crate can represent (0..=4).
    #[must_use]
    pub const fn from_count(count: u8) -> Self {
        if count > 4 {
            VerbosityLevel(4)
        } else {
            VerbosityLevel(count)
        }
    }

    /// The raw `-v` count this level was built from.
    #[must_use]
    pub const fn count(self) -> u8 {
        self.0
    }

    /// Whether a log event at `severity` should be emitted at this level.
    #[must_use]
    pub const fn allows(self, severity: Severity) -> bool {
        match severity {
            Severity::Error | Severity::Warning => true,
            Severity::Info => self.0 >= 1,
            Severity::Debug => self.0 >= 2,
            Severity::Trace => self.0 >= 3,
        }
    }
}

/// A single captured diagnostic event.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LogEvent {
    /// The event's severity.
    pub severity: Severity,
    /// The module or subsystem that raised the event.
    pub target: &'static str,
    /// The formatted message.
    pub message: String,
}

struct State {
    level: VerbosityLevel,
    events: Vec<LogEvent>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            level: VerbosityLevel::QUIET,
            events: Vec::new(),
        }
    }
}

fn state() -> &'static Mutex<State> {
    static STATE: OnceLock<Mutex<State>> = OnceLock::new();
    STATE.get_or_init(|| Mutex::new(State::default()))
}

/// Sets the process-wide verbosity level and clears any previously captured
/// events. Call once at startup, before any other crate in the workspace
/// emits diagnostics.
pub fn init(level: VerbosityLevel) {
    let mut guard = state().lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    guard.level = level;
    guard.events.clear();
}

/// Returns the currently configured verbosity level.
#[must_use]
pub fn current_level() -> VerbosityLevel {
    state().lock().unwrap_or_else(std::sync::PoisonError::into_inner).level
}

/// Records a diagnostic event if `severity` is enabled at the current
/// verbosity level. Also emits to `tracing` when the `tracing` feature is
/// enabled, independent of the configured [`VerbosityLevel`]: `tracing`
/// subscribers do their own filtering.
pub fn log(severity: Severity, target: &'static str, message: impl Into<String>) {
    let message = message.into();

    #[cfg(feature = "tracing")]
    emit_tracing(severity, target, &message);

    let mut guard = state().lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    if guard.level.allows(severity) {
        guard.events.push(LogEvent {
            severity,
            target,
            message,
        });
    }
}

#[cfg(feature = "tracing")]
fn emit_tracing(severity: Severity, target: &'static str, message: &str) {
    match severity.to_tracing_level() {
        tracing::Level::ERROR => tracing::error!(target: "logging::bridge", %target, "{message}"),
        tracing::Level::WARN => tracing::warn!(target: "logging::bridge", %target, "{message}"),
        tracing::Level::INFO => tracing::info!(target: "logging::bridge", %target, "{message}"),
        tracing::Level::DEBUG => tracing::debug!(target: "logging::bridge", %target, "{message}"),
        tracing::Level::TRACE => tracing::trace!(target: "logging::bridge", %target, "{message}"),
    }
}

/// Drains and returns all events captured since the last [`init`] or
/// [`drain_events`] call. Intended for test harnesses asserting on what was
/// logged.
pub fn drain_events() -> Vec<LogEvent> {
    let mut guard = state().lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    std::mem::take(&mut guard.events)
}

/// Logs an [`Severity::Error`] event.
#[macro_export]
macro_rules! log_error {
    ($target:expr, $($arg:tt)+) => {
        $crate::log($crate::Severity::Error, $target, format!($($arg)+))
    };
}

/// Logs a [`Severity::Warning`] event.
#[macro_export]
macro_rules! log_warning {
    ($target:expr, $($arg:tt)+) => {
        $crate::log($crate::Severity::Warning, $target, format!($($arg)+))
    };
}

/// Logs a [`Severity::Info`] event.
#[macro_export]
macro_rules! log_info {
    ($target:expr, $($arg:tt)+) => {
        $crate::log($crate::Severity::Info, $target, format!($($arg)+))
    };
}

/// Logs a [`Severity::Debug`] event.
#[macro_export]
macro_rules! log_debug {
    ($target:expr, $($arg:tt)+) => {
        $crate::log($crate::Severity::Debug, $target, format!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tests share process-wide global state; a lock keeps them from
    // interleaving `init`/`drain_events` calls across threads.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn quiet_level_allows_only_error_and_warning() {
        let _guard = TEST_LOCK.lock().unwrap();
        let level = VerbosityLevel::QUIET;
        assert!(level.allows(Severity::Error));
        assert!(level.allows(Severity::Warning));
        assert!(!level.allows(Severity::Info));
        assert!(!level.allows(Severity::Debug));
        assert!(!level.allows(Severity::Trace));
    }

    #[test]
    fn each_v_unlocks_one_more_tier() {
        let _guard = TEST_LOCK.lock().unwrap();
        assert!(VerbosityLevel::from_count(1).allows(Severity::Info));
        assert!(!VerbosityLevel::from_count(1).allows(Severity::Debug));
        assert!(VerbosityLevel::from_count(2).allows(Severity::Debug));
        assert!(!VerbosityLevel::from_count(2).allows(Severity::Trace));
        assert!(VerbosityLevel::from_count(3).allows(Severity::Trace));
    }

    #[test]
    fn from_count_clamps_above_four() {
        let _guard = TEST_LOCK.lock().unwrap();
        assert_eq!(VerbosityLevel::from_count(200).count(), 4);
    }

    #[test]
    fn log_below_configured_level_is_dropped() {
        let _guard = TEST_LOCK.lock().unwrap();
        init(VerbosityLevel::QUIET);
        log(Severity::Debug, "test", "should not be captured");
        assert!(drain_events().is_empty());
    }

    #[test]
    fn log_at_or_above_configured_level_is_captured() {
        let _guard = TEST_LOCK.lock().unwrap();
        init(VerbosityLevel::from_count(2));
        log(Severity::Info, "test", "visible");
        log(Severity::Debug, "test", "also visible");
        let events = drain_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "visible");
        assert_eq!(events[1].message, "also visible");
    }

    #[test]
    fn drain_events_clears_the_buffer() {
        let _guard = TEST_LOCK.lock().unwrap();
        init(VerbosityLevel::from_count(1));
        log(Severity::Info, "test", "one-shot");
        assert_eq!(drain_events().len(), 1);
        assert!(drain_events().is_empty());
    }

    #[test]
    fn init_clears_previously_captured_events() {
        let _guard = TEST_LOCK.lock().unwrap();
        init(VerbosityLevel::from_count(1));
        log(Severity::Info, "test", "stale");
        init(VerbosityLevel::from_count(1));
        assert!(drain_events().is_empty());
    }

    #[test]
    fn log_macros_format_their_arguments() {
        let _guard = TEST_LOCK.lock().unwrap();
        init(VerbosityLevel::from_count(2));
        log_info!("test", "value is {}", 42);
        log_debug!("test", "{} of {}", 1, 3);
        let events = drain_events();
        assert_eq!(events[0].message, "value is 42");
        assert_eq!(events[1].message, "1 of 3");
    }

    #[test]
    fn severity_orders_from_most_to_least_severe() {
        assert!(Severity::Error < Severity::Warning);
        assert!(Severity::Warning < Severity::Info);
        assert!(Severity::Info < Severity::Debug);
        assert!(Severity::Debug < Severity::Trace);
    }
}
