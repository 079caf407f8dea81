//! Simulated operating clock reconstructed from sparse time signals.
//!
//! The gateway reports the simulated time only occasionally: explicit
//! `clock_msg` ticks carry the clock, tick interval and pause flag, while
//! many other messages carry an incidental `time` field. [`ClockModel`]
//! merges both into an authoritative [`ClockState`]; consumers interpolate
//! between updates with [`ClockView`].

use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use super::message::scalar_text;

/// Tick interval at which the simulation runs in real time.
pub const BASE_INTERVAL_MS: u64 = 500;

const SECONDS_PER_DAY: u64 = 86_400;

/// Authoritative simulated clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClockState {
    /// Simulation area the clock belongs to.
    pub area_id: String,
    /// Seconds since the start of the operating day.
    pub simulated_seconds: u64,
    /// Real milliseconds per simulated tick; always greater than zero.
    pub tick_interval_ms: u64,
    /// Whether the simulation is paused.
    pub paused: bool,
}

impl Default for ClockState {
    fn default() -> Self {
        Self {
            area_id: String::new(),
            simulated_seconds: 0,
            tick_interval_ms: BASE_INTERVAL_MS,
            paused: false,
        }
    }
}

/// Fields carried by one clock tick. Absent fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClockTick {
    /// Simulation area.
    pub area_id: Option<String>,
    /// Simulated seconds.
    pub clock: Option<u64>,
    /// Tick interval in milliseconds.
    pub interval: Option<u64>,
    /// Pause flag.
    pub paused: Option<bool>,
}

impl ClockTick {
    /// Extracts tick fields from a `clock_msg` payload.
    ///
    /// Tolerates both wire forms: integers as numbers or numeric strings,
    /// the pause flag as a boolean or `"True"`/`"False"`. Null, malformed
    /// and negative values count as absent.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            area_id: payload.get("area_id").and_then(scalar_text),
            clock: payload
                .get("clock")
                .and_then(parse_integer)
                .and_then(|v| u64::try_from(v).ok()),
            interval: payload
                .get("interval")
                .and_then(parse_integer)
                .and_then(|v| u64::try_from(v).ok()),
            paused: payload.get("paused").and_then(parse_flag),
        }
    }
}

/// Single-writer clock accumulator.
#[derive(Debug, Clone, Default)]
pub struct ClockModel {
    state: ClockState,
}

impl ClockModel {
    /// Creates a clock at its default state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges the fields present in `tick` into the state.
    ///
    /// Absent fields leave the current value untouched. A zero interval is
    /// ignored. Returns `true` if the state changed.
    pub fn apply_tick(&mut self, tick: &ClockTick) -> bool {
        let before = self.state.clone();
        if let Some(area_id) = &tick.area_id {
            self.state.area_id.clone_from(area_id);
        }
        if let Some(clock) = tick.clock {
            self.state.simulated_seconds = clock;
        }
        if let Some(interval) = tick.interval.filter(|ms| *ms > 0) {
            self.state.tick_interval_ms = interval;
        }
        if let Some(paused) = tick.paused {
            self.state.paused = paused;
        }
        self.state != before
    }

    /// Applies an incidental `time` field.
    ///
    /// Values that parse as an integer greater than zero overwrite the
    /// simulated seconds unconditionally, including backwards jumps. Other
    /// values are ignored. Returns `true` if the state changed.
    pub fn apply_opportunistic_time(&mut self, raw_time: &Value) -> bool {
        let Some(seconds) = parse_integer(raw_time)
            .filter(|v| *v > 0)
            .and_then(|v| u64::try_from(v).ok())
        else {
            return false;
        };
        let changed = self.state.simulated_seconds != seconds;
        self.state.simulated_seconds = seconds;
        changed
    }

    /// Ratio of simulated to real time: `BASE_INTERVAL_MS / tick_interval_ms`.
    #[must_use]
    pub fn speed_ratio(&self) -> f64 {
        speed_ratio(self.state.tick_interval_ms)
    }

    /// Returns a copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ClockState {
        self.state.clone()
    }

    /// Restores the default state.
    pub fn reset(&mut self) {
        self.state = ClockState::default();
    }
}

/// A clock snapshot anchored to the real instant it last changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockView {
    /// State at the anchor.
    pub state: ClockState,
    /// Real time of the last state change.
    pub anchored_at: Instant,
}

impl ClockView {
    /// Simulated seconds displayed at real instant `now`.
    ///
    /// Advances by `floor(elapsed * speed_ratio)` while running and stays
    /// frozen while paused. Instants before the anchor count as zero
    /// elapsed time.
    #[must_use]
    pub fn simulated_seconds_at(&self, now: Instant) -> u64 {
        if self.state.paused {
            return self.state.simulated_seconds;
        }
        let elapsed = now.saturating_duration_since(self.anchored_at).as_secs_f64();
        let advanced = (elapsed * speed_ratio(self.state.tick_interval_ms)).floor();
        self.state
            .simulated_seconds
            .saturating_add(advanced as u64)
    }

    /// Speed ratio of the anchored state.
    #[must_use]
    pub fn speed_ratio(&self) -> f64 {
        speed_ratio(self.state.tick_interval_ms)
    }
}

fn speed_ratio(tick_interval_ms: u64) -> f64 {
    if tick_interval_ms == 0 {
        return 1.0;
    }
    BASE_INTERVAL_MS as f64 / tick_interval_ms as f64
}

/// Renders seconds as a 24-hour `HH:MM:SS` operating clock.
///
/// Hours wrap past midnight; there is no date component.
#[must_use]
pub fn format_as_clock(seconds: u64) -> String {
    let of_day = seconds % SECONDS_PER_DAY;
    format!(
        "{:02}:{:02}:{:02}",
        of_day / 3600,
        (of_day % 3600) / 60,
        of_day % 60
    )
}

/// Parses an integer from a number or numeric string.
///
/// Fractional values truncate toward zero.
fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<i64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(s) => match s.as_str() {
            "True" | "true" => Some(true),
            "False" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
