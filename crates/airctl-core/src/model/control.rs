// ── Appliance control values ──
//
// The appliance only accepts a handful of discrete settings, so each is a
// closed enum. Out-of-set integers are rejected at deserialization and at
// `TryFrom<u8>`, never forwarded.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CoreError;

/// Rejected out-of-set value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported {field} {value} (supported: {supported})")]
pub struct InvalidValue {
    pub field: &'static str,
    pub value: i64,
    pub supported: &'static str,
}

impl From<InvalidValue> for CoreError {
    fn from(err: InvalidValue) -> Self {
        Self::ValidationFailed {
            message: err.to_string(),
        }
    }
}

// ── Mode ─────────────────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Mode {
    #[default]
    Cool,
    Heat,
}

// ── Temperature ──────────────────────────────────────────────────────

/// Supported set-points, in degrees Celsius.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Temperature {
    #[default]
    C23,
    C25,
}

impl Temperature {
    /// Ascending order.
    pub const ALL: [Self; 2] = [Self::C23, Self::C25];

    pub fn celsius(self) -> u8 {
        match self {
            Self::C23 => 23,
            Self::C25 => 25,
        }
    }

    /// Next set-point up, or `self` at the top.
    pub fn step_up(self) -> Self {
        let index = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        Self::ALL.get(index + 1).copied().unwrap_or(self)
    }

    /// Next set-point down, or `self` at the bottom.
    pub fn step_down(self) -> Self {
        let index = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        index
            .checked_sub(1)
            .and_then(|i| Self::ALL.get(i).copied())
            .unwrap_or(self)
    }
}

impl TryFrom<u8> for Temperature {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            23 => Ok(Self::C23),
            25 => Ok(Self::C25),
            other => Err(InvalidValue {
                field: "temperature",
                value: i64::from(other),
                supported: "23, 25",
            }),
        }
    }
}

impl From<Temperature> for u8 {
    fn from(t: Temperature) -> Self {
        t.celsius()
    }
}

impl std::fmt::Display for Temperature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.celsius())
    }
}

impl std::str::FromStr for Temperature {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: i64 = s.trim().trim_end_matches(['C', 'c', '℃']).parse().map_err(|_| {
            InvalidValue {
                field: "temperature",
                value: -1,
                supported: "23, 25",
            }
        })?;
        u8::try_from(raw)
            .map_err(|_| InvalidValue {
                field: "temperature",
                value: raw,
                supported: "23, 25",
            })
            .and_then(Self::try_from)
    }
}

// ── Fan speed ────────────────────────────────────────────────────────

/// The current appliance model has a single fan speed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FanSpeed {
    #[default]
    Level3,
}

impl FanSpeed {
    pub const ALL: [Self; 1] = [Self::Level3];

    pub fn level(self) -> u8 {
        match self {
            Self::Level3 => 3,
        }
    }
}

impl TryFrom<u8> for FanSpeed {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(Self::Level3),
            other => Err(InvalidValue {
                field: "fan_speed",
                value: i64::from(other),
                supported: "3",
            }),
        }
    }
}

impl From<FanSpeed> for u8 {
    fn from(f: FanSpeed) -> Self {
        f.level()
    }
}

impl std::fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.level())
    }
}

// ── ControlCommand ───────────────────────────────────────────────────

/// Payload for `aircon/control`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlCommand {
    pub power_on: bool,
    pub mode: Mode,
    pub temperature: Temperature,
    pub fan_speed: FanSpeed,
}

impl ControlCommand {
    pub fn new(power_on: bool, mode: Mode, temperature: Temperature) -> Self {
        Self {
            power_on,
            mode,
            temperature,
            fan_speed: FanSpeed::default(),
        }
    }
}
