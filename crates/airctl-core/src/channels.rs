// ── Fixed channel names ──
//
// The appliance gateway listens and answers on a fixed set of MQTT topics.
// Every schedule command goes out on its own channel; every answer comes
// back on the shared response channel.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Direct control commands (fire-and-forget).
pub const CONTROL: &str = "aircon/control";

/// Shared inbound channel for all schedule responses and trigger events.
pub const SCHEDULE_RESPONSE: &str = "aircon/schedule/response";

pub const SCHEDULE_CREATE: &str = "aircon/schedule/create";
pub const SCHEDULE_UPDATE: &str = "aircon/schedule/update";
pub const SCHEDULE_DELETE: &str = "aircon/schedule/delete";
pub const SCHEDULE_LIST: &str = "aircon/schedule/list";

/// Action name the gateway uses for unsolicited "schedule fired" events.
pub const TRIGGER_ACTION: &str = "trigger";

/// A correlated schedule command. Each maps to exactly one outbound channel.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScheduleAction {
    List,
    Create,
    Update,
    Delete,
}

impl ScheduleAction {
    pub const ALL: [Self; 4] = [Self::List, Self::Create, Self::Update, Self::Delete];

    /// Outbound channel for this action.
    pub fn channel(self) -> &'static str {
        match self {
            Self::List => SCHEDULE_LIST,
            Self::Create => SCHEDULE_CREATE,
            Self::Update => SCHEDULE_UPDATE,
            Self::Delete => SCHEDULE_DELETE,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn every_action_has_its_own_channel() {
        let mut channels: Vec<_> = ScheduleAction::ALL.iter().map(|a| a.channel()).collect();
        channels.sort_unstable();
        channels.dedup();
        assert_eq!(channels.len(), ScheduleAction::ALL.len());
        assert!(channels.iter().all(|c| c.starts_with("aircon/schedule/")));
    }

    #[test]
    fn action_names_are_lowercase() {
        assert_eq!(ScheduleAction::Create.to_string(), "create");
        assert_eq!("delete".parse::<ScheduleAction>().unwrap(), ScheduleAction::Delete);
    }
}
