//! # Runtime configuration.
//!
//! Provides [`Settings`] — the surface through which the configuration
//! collaborator feeds the orchestrator. It is consumed once at init.
//!
//! Settings can be built in code or deserialized from TOML via
//! [`Settings::from_toml_str`]. All fields have defaults matching the
//! stock deployment: check-ins in a random evening window, keep-alive
//! every 3 days, failures isolated (`nofail = true`).
//!
//! ## Window spec format
//! The check-in time is given as a clock-range spec:
//! - `"<6:00PM,10:00PM>"` — one trigger per day, uniformly random inside
//!   the range;
//! - `"8:30AM"` (bare clock time) — deterministic daily trigger.
//!
//! Both `%I:%M%p` and 24-hour `%H:%M` clocks are accepted.

use std::time::Duration;

use chrono::NaiveTime;
use serde::Deserialize;
use thiserror::Error;

use crate::schedule::{ScheduleRule, Timing};
use crate::workers::WorkerKind;

/// Delay used when schedule debugging compresses every rule.
const COMPRESSED_DELAY: Duration = Duration::from_secs(3);

/// Configuration errors raised while parsing or validating [`Settings`].
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A window spec did not match `<start,end>` or a bare clock time.
    #[error("invalid time window spec: {spec:?}")]
    Window {
        /// The offending spec string.
        spec: String,
    },

    /// A clock time inside a spec could not be parsed.
    #[error("invalid clock time: {value:?}")]
    Clock {
        /// The offending clock string.
        value: String,
    },

    /// The TOML document could not be deserialized.
    #[error("malformed configuration: {0}")]
    Malformed(String),
}

/// Policy for the first fire of an interval rule with no previous trigger.
///
/// The `IntervalDays` rule itself returns `now` when it has never fired;
/// this setting decides what the scheduling loop does with that. The
/// default waits one full interval, because the instant startup phase
/// already covers the run-at-startup case for interval workers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstRun {
    /// Fire immediately on first scheduling.
    Immediate,
    /// Wait one full interval before the first fire (default).
    #[default]
    AfterInterval,
}

/// Which worker kinds are enabled.
///
/// When no kind is enabled the whole set is treated as enabled — running
/// with an empty switch table means "everything on".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Modules {
    /// Daily site check-in workers.
    pub checkin: bool,
    /// N-day keep-alive workers.
    pub keepalive: bool,
    /// Chat monitoring workers.
    pub monitor: bool,
    /// Periodic message-posting workers.
    pub messager: bool,
}

impl Modules {
    /// Returns true when the given kind is enabled, honoring the
    /// empty-means-all rule.
    pub fn enabled(&self, kind: WorkerKind) -> bool {
        if !self.any() {
            return true;
        }
        match kind {
            WorkerKind::CheckIn => self.checkin,
            WorkerKind::KeepAlive => self.keepalive,
            WorkerKind::Monitor => self.monitor,
            WorkerKind::Messager => self.messager,
        }
    }

    fn any(&self) -> bool {
        self.checkin || self.keepalive || self.monitor || self.messager
    }
}

/// Global settings for an orchestrator run.
///
/// ## Field semantics
/// - `nofail = true` → a failing worker is logged and dropped, everything
///   else keeps running; `nofail = false` → fail-fast, any failure stops
///   the whole run.
/// - `instant` → run check-in/keep-alive workers once at startup before
///   entering scheduled mode.
/// - `once` → run the instant phase only and exit (no scheduling).
/// - `debug_schedule` → compress every rule to a few seconds for testing
///   multi-day schedules.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Worker kind switches.
    pub modules: Modules,

    /// Isolate worker failures (`false` enables fail-fast).
    pub nofail: bool,

    /// Run instant-capable workers once at startup.
    pub instant: bool,

    /// Only run the instant phase, then exit.
    pub once: bool,

    /// Compress every schedule rule to seconds (schedule debugging).
    pub debug_schedule: bool,

    /// Check-in window spec, e.g. `"<6:00PM,10:00PM>"`.
    pub time: String,

    /// Keep-alive interval in days.
    pub interval: u32,

    /// First-fire policy for interval rules with no previous trigger.
    pub first_run: FirstRun,

    /// Seconds to wait for outstanding activities while draining.
    pub grace: u64,

    /// Event bus ring-buffer capacity (min 1).
    pub bus_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            modules: Modules::default(),
            nofail: true,
            instant: true,
            once: false,
            debug_schedule: false,
            time: "<6:00PM,10:00PM>".to_string(),
            interval: 3,
            first_run: FirstRun::default(),
            grace: 30,
            bus_capacity: 1024,
        }
    }
}

impl Settings {
    /// Deserializes settings from a TOML document and normalizes them.
    pub fn from_toml_str(doc: &str) -> Result<Self, ConfigError> {
        let mut settings: Settings =
            toml::from_str(doc).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        settings.normalize();
        Ok(settings)
    }

    /// Clamps out-of-range values into their valid domain.
    ///
    /// An interval of 0 days would make the keep-alive rule fire in a
    /// tight loop, so it is raised to 1.
    pub fn normalize(&mut self) {
        self.interval = self.interval.max(1);
        self.bus_capacity = self.bus_capacity.max(1);
    }

    /// Returns the effective timing mode.
    pub fn timing(&self) -> Timing {
        if self.debug_schedule {
            Timing::Compressed {
                delay: COMPRESSED_DELAY,
            }
        } else {
            Timing::Real
        }
    }

    /// Parses the check-in window spec into a schedule rule.
    pub fn checkin_rule(&self) -> Result<ScheduleRule, ConfigError> {
        let (start, end) = parse_window(&self.time)?;
        Ok(ScheduleRule::TimeWindow { start, end })
    }

    /// Returns the keep-alive interval rule.
    pub fn keepalive_rule(&self) -> ScheduleRule {
        ScheduleRule::IntervalDays {
            days: self.interval,
        }
    }

    /// Returns the drain window as a duration.
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace)
    }
}

/// Parses a window spec: `<start,end>` or a bare clock time.
///
/// A bare time yields `start == end`, i.e. a deterministic daily trigger.
pub fn parse_window(spec: &str) -> Result<(NaiveTime, NaiveTime), ConfigError> {
    let trimmed = spec.trim();
    match trimmed
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
    {
        Some(range) => {
            let (start, end) = range.split_once(',').ok_or_else(|| ConfigError::Window {
                spec: spec.to_string(),
            })?;
            Ok((parse_clock(start)?, parse_clock(end)?))
        }
        None => {
            let at = parse_clock(trimmed)?;
            Ok((at, at))
        }
    }
}

/// Parses one clock time, trying 12-hour and 24-hour formats.
fn parse_clock(value: &str) -> Result<NaiveTime, ConfigError> {
    let normalized = value.trim().to_uppercase();
    for format in ["%I:%M%p", "%I:%M %p", "%H:%M:%S", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(&normalized, format) {
            return Ok(t);
        }
    }
    Err(ConfigError::Clock {
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn clock(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_window_range() {
        let (start, end) = parse_window("<6:00PM,10:00PM>").unwrap();
        assert_eq!(start, clock(18, 0));
        assert_eq!(end, clock(22, 0));
    }

    #[test]
    fn test_parse_window_bare_time_is_deterministic() {
        let (start, end) = parse_window("8:30AM").unwrap();
        assert_eq!(start, end);
        assert_eq!(start, clock(8, 30));
    }

    #[test]
    fn test_parse_window_24_hour() {
        let (start, end) = parse_window("< 18:00 , 22:30 >").unwrap();
        assert_eq!(start, clock(18, 0));
        assert_eq!(end, clock(22, 30));
    }

    #[test]
    fn test_parse_window_rejects_garbage() {
        assert!(parse_window("<whenever>").is_err());
        assert!(parse_window("").is_err());
    }

    #[test]
    fn test_modules_empty_means_all() {
        let modules = Modules::default();
        assert!(modules.enabled(WorkerKind::CheckIn));
        assert!(modules.enabled(WorkerKind::Messager));
    }

    #[test]
    fn test_modules_explicit_selection() {
        let modules = Modules {
            checkin: true,
            ..Modules::default()
        };
        assert!(modules.enabled(WorkerKind::CheckIn));
        assert!(!modules.enabled(WorkerKind::Monitor));
    }

    #[test]
    fn test_from_toml_defaults_and_normalization() {
        let settings = Settings::from_toml_str("interval = 0\n").unwrap();
        assert_eq!(settings.interval, 1);
        assert!(settings.nofail);
        assert!(settings.instant);
        assert_eq!(settings.time, "<6:00PM,10:00PM>");
    }

    #[test]
    fn test_from_toml_full_document() {
        let doc = r#"
            nofail = false
            once = true
            time = "<9:00AM,11:00AM>"
            interval = 7
            first_run = "after_interval"

            [modules]
            keepalive = true
        "#;
        let settings = Settings::from_toml_str(doc).unwrap();
        assert!(!settings.nofail);
        assert!(settings.once);
        assert_eq!(settings.interval, 7);
        assert_eq!(settings.first_run, FirstRun::AfterInterval);
        assert!(settings.modules.enabled(WorkerKind::KeepAlive));
        assert!(!settings.modules.enabled(WorkerKind::CheckIn));
    }

    #[test]
    fn test_rule_helpers() {
        let settings = Settings::default();
        assert!(matches!(
            settings.checkin_rule().unwrap(),
            ScheduleRule::TimeWindow { .. }
        ));
        assert_eq!(
            settings.keepalive_rule(),
            ScheduleRule::IntervalDays { days: 3 }
        );
    }

    #[test]
    fn test_timing_compression() {
        let mut settings = Settings::default();
        assert_eq!(settings.timing(), Timing::Real);
        settings.debug_schedule = true;
        assert!(matches!(settings.timing(), Timing::Compressed { .. }));
    }
}
