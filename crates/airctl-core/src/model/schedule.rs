// ── Schedule domain types ──

use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use super::control::{FanSpeed, InvalidValue, Mode, Temperature};

/// Day index as the gateway encodes it: 0 = Monday .. 6 = Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DayOfWeek(u8);

impl DayOfWeek {
    pub const MONDAY: Self = Self(0);
    pub const SUNDAY: Self = Self(6);

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn weekday(self) -> Weekday {
        match self.0 {
            0 => Weekday::Mon,
            1 => Weekday::Tue,
            2 => Weekday::Wed,
            3 => Weekday::Thu,
            4 => Weekday::Fri,
            5 => Weekday::Sat,
            _ => Weekday::Sun,
        }
    }
}

impl TryFrom<u8> for DayOfWeek {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= 6 {
            Ok(Self(value))
        } else {
            Err(InvalidValue {
                field: "day",
                value: i64::from(value),
                supported: "0-6",
            })
        }
    }
}

impl From<DayOfWeek> for u8 {
    fn from(day: DayOfWeek) -> Self {
        day.0
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        // num_days_from_monday is always 0..=6
        Self(u8::try_from(day.num_days_from_monday()).unwrap_or(6))
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.weekday())
    }
}

// ── RepeatRule ───────────────────────────────────────────────────────

/// When a schedule recurs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RepeatRule {
    #[default]
    Daily,
    Weekdays,
    Weekends,
    Custom {
        #[serde(default)]
        days: BTreeSet<DayOfWeek>,
    },
}

impl RepeatRule {
    pub fn custom(days: impl IntoIterator<Item = DayOfWeek>) -> Self {
        Self::Custom {
            days: days.into_iter().collect(),
        }
    }

    /// Whether the rule fires on the given day.
    pub fn includes(&self, day: DayOfWeek) -> bool {
        match self {
            Self::Daily => true,
            Self::Weekdays => day.index() <= 4,
            Self::Weekends => day.index() >= 5,
            Self::Custom { days } => days.contains(&day),
        }
    }
}

impl fmt::Display for RepeatRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => f.write_str("daily"),
            Self::Weekdays => f.write_str("weekdays"),
            Self::Weekends => f.write_str("weekends"),
            Self::Custom { days } if days.is_empty() => f.write_str("no days selected"),
            Self::Custom { days } => {
                let names: Vec<String> = days.iter().map(ToString::to_string).collect();
                f.write_str(&names.join(","))
            }
        }
    }
}

// ── ScheduleItem ─────────────────────────────────────────────────────

/// One scheduled appliance setting. `id` is assigned by the gateway on create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub power_on: bool,
    pub mode: Mode,
    pub temperature: Temperature,
    #[serde(default)]
    pub fan_speed: FanSpeed,
    #[serde(default)]
    pub repeat: RepeatRule,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Fields the gateway sends that this client doesn't model. Round-tripped
    /// on update so a full-record overwrite never drops them.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

impl ScheduleItem {
    /// A new (not yet created) enabled schedule.
    pub fn new(time: NaiveTime, power_on: bool, mode: Mode, temperature: Temperature) -> Self {
        Self {
            id: None,
            time,
            power_on,
            mode,
            temperature,
            fan_speed: FanSpeed::default(),
            repeat: RepeatRule::Daily,
            enabled: true,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_repeat(mut self, repeat: RepeatRule) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Short human label, e.g. `07:30 / cool 23℃`.
    pub fn label(&self) -> String {
        format!(
            "{} / {} {}℃",
            self.time.format(hhmm::FORMAT),
            self.mode,
            self.temperature
        )
    }
}

/// `HH:MM` on the wire; `HH:MM:SS` is accepted on input.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&time.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
        NaiveTime::parse_from_str(raw, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn seven_thirty() -> NaiveTime {
        NaiveTime::from_hms_opt(7, 30, 0).unwrap()
    }

    #[test]
    fn new_item_serializes_without_id() {
        let item = ScheduleItem::new(seven_thirty(), true, Mode::Cool, Temperature::C23)
            .with_repeat(RepeatRule::Weekdays);

        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({
                "time": "07:30",
                "power_on": true,
                "mode": "cool",
                "temperature": 23,
                "fan_speed": 3,
                "repeat": {"type": "weekdays"},
                "enabled": true,
            })
        );
    }

    #[test]
    fn custom_repeat_round_trips_days() {
        let raw = json!({
            "id": "s1",
            "time": "22:05:00",
            "power_on": false,
            "mode": "heat",
            "temperature": 25,
            "fan_speed": 3,
            "repeat": {"type": "custom", "days": [6, 0]},
            "enabled": false,
            "created_at": "2024-01-01"
        });
        let item: ScheduleItem = serde_json::from_value(raw).unwrap();

        assert_eq!(item.id.as_deref(), Some("s1"));
        assert_eq!(item.repeat, RepeatRule::custom([DayOfWeek::MONDAY, DayOfWeek::SUNDAY]));
        assert_eq!(item.extra.get("created_at"), Some(&json!("2024-01-01")));

        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back["repeat"], json!({"type": "custom", "days": [0, 6]}));
        assert_eq!(back["time"], json!("22:05"));
        assert_eq!(back["created_at"], json!("2024-01-01"));
    }

    #[test]
    fn empty_custom_days_render_as_text() {
        let rule: RepeatRule = serde_json::from_value(json!({"type": "custom"})).unwrap();
        assert_eq!(rule.to_string(), "no days selected");
        assert!(!rule.includes(DayOfWeek::MONDAY));
    }

    #[test]
    fn invalid_day_index_is_rejected() {
        let raw = json!({"type": "custom", "days": [7]});
        assert!(serde_json::from_value::<RepeatRule>(raw).is_err());
    }

    #[test]
    fn weekday_and_weekend_rules() {
        let saturday = DayOfWeek::from(Weekday::Sat);
        assert_eq!(saturday.index(), 5);
        assert!(RepeatRule::Weekends.includes(saturday));
        assert!(!RepeatRule::Weekdays.includes(saturday));
        assert!(RepeatRule::Weekdays.includes(DayOfWeek::MONDAY));
    }

    #[test]
    fn label_uses_hhmm_mode_and_celsius() {
        let item = ScheduleItem::new(seven_thirty(), true, Mode::Heat, Temperature::C25);
        assert_eq!(item.label(), "07:30 / heat 25℃");
    }
}
