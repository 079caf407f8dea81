//! Typed domain events decoded from feed frames.
//!
//! Each frame carries exactly one recognized top-level key. The decoder
//! maps that key to a [`DomainMessage`] variant and keeps the key's value,
//! already normalized, as the variant payload.

use serde::Serialize;
use serde_json::Value;

use super::clock::ClockTick;

/// Object type reported by `SG_MSG` frames for a main signal.
pub const SIGNAL_OBJECT_TYPE: &str = "signal";

/// One decoded feed event.
///
/// Payloads are the normalized JSON value found under the frame's
/// recognized key: booleans and numbers are native JSON, never strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum DomainMessage {
    /// `CA_MSG`: a train description stepped from one berth to another
    /// (`descr`, `from`, `to`).
    Step(Value),
    /// `CB_MSG`: a description was cancelled from a berth (`descr`, `from`).
    Cancel(Value),
    /// `CC_MSG`: a description was interposed into a berth (`descr`, `to`).
    Interpose(Value),
    /// `SG_MSG`: a signalling object changed state
    /// (`obj_type`, `obj_id`, `new_state`).
    Signal(Value),
    /// `clock_msg`: simulated clock update
    /// (`area_id`, `clock`, `interval`, `paused`).
    ClockTick(Value),
    /// `train_location`: a train reported its location
    /// (`headcode`/`descr`, `location`, `time`).
    TrainLocation(Value),
    /// `train_delay`: a train reported its delay
    /// (`headcode`/`descr`, `delay`, `time`).
    TrainDelay(Value),
    /// Valid JSON without any recognized top-level key.
    Unknown {
        /// The whole normalized document.
        raw: Value,
    },
    /// A fragment that could not be parsed as JSON.
    ParseError {
        /// The offending fragment, verbatim.
        raw: String,
        /// Parser diagnostic.
        reason: String,
    },
}

impl DomainMessage {
    /// Returns the variant name as a static string slice.
    #[must_use]
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Self::Step(_) => "step",
            Self::Cancel(_) => "cancel",
            Self::Interpose(_) => "interpose",
            Self::Signal(_) => "signal",
            Self::ClockTick(_) => "clock_tick",
            Self::TrainLocation(_) => "train_location",
            Self::TrainDelay(_) => "train_delay",
            Self::Unknown { .. } => "unknown",
            Self::ParseError { .. } => "parse_error",
        }
    }

    /// Returns the payload of a recognized variant.
    #[must_use]
    pub const fn payload(&self) -> Option<&Value> {
        match self {
            Self::Step(payload)
            | Self::Cancel(payload)
            | Self::Interpose(payload)
            | Self::Signal(payload)
            | Self::ClockTick(payload)
            | Self::TrainLocation(payload)
            | Self::TrainDelay(payload) => Some(payload),
            Self::Unknown { .. } | Self::ParseError { .. } => None,
        }
    }

    /// Returns a payload field by name.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload().and_then(|payload| payload.get(key))
    }

    /// Returns `true` for `Unknown` and `ParseError`.
    #[must_use]
    pub const fn is_unrecognized(&self) -> bool {
        matches!(self, Self::Unknown { .. } | Self::ParseError { .. })
    }

    /// Returns the identifier of a main signal reported by a `Signal`
    /// message, i.e. one whose `obj_type` is `"signal"`.
    ///
    /// Numeric identifiers are rendered as their decimal text.
    #[must_use]
    pub fn signal_id(&self) -> Option<String> {
        let Self::Signal(payload) = self else {
            return None;
        };
        if payload.get("obj_type").and_then(Value::as_str) != Some(SIGNAL_OBJECT_TYPE) {
            return None;
        }
        payload.get("obj_id").and_then(scalar_text)
    }

    /// Returns the clock fields of a `ClockTick` message.
    #[must_use]
    pub fn clock_tick(&self) -> Option<ClockTick> {
        match self {
            Self::ClockTick(payload) => Some(ClockTick::from_payload(payload)),
            _ => None,
        }
    }

    /// Returns the incidental `time` field carried by many non-clock messages.
    #[must_use]
    pub fn time_field(&self) -> Option<&Value> {
        self.field("time").filter(|value| !value.is_null())
    }

    /// Returns the train identifier of a train message: the `headcode`
    /// field, falling back to `descr`.
    #[must_use]
    pub fn train_id(&self) -> Option<String> {
        match self {
            Self::TrainLocation(payload) | Self::TrainDelay(payload) => payload
                .get("headcode")
                .or_else(|| payload.get("descr"))
                .and_then(scalar_text),
            _ => None,
        }
    }
}

/// Renders a string or number as text. Other JSON types yield `None`.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
