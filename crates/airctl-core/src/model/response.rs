// ── Gateway responses ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channels::{ScheduleAction, TRIGGER_ACTION};
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
    #[serde(other)]
    Unknown,
}

/// Anything that arrives on the shared response channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerResponse {
    pub action: String,
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl SchedulerResponse {
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    /// An unsolicited "schedule fired" notification.
    pub fn is_trigger(&self) -> bool {
        self.action == TRIGGER_ACTION && self.is_success()
    }

    /// `schedule_id` from a trigger's data, as a string whichever way it was encoded.
    pub fn trigger_schedule_id(&self) -> Option<String> {
        match self.data.as_ref()?.get("schedule_id")? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Turn a non-success status into [`CoreError::Rejected`], using the
    /// server's message or `fallback` when it sent none.
    pub fn into_result(self, action: ScheduleAction, fallback: &str) -> Result<Self, CoreError> {
        if self.is_success() {
            return Ok(self);
        }
        let message = self
            .error
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| fallback.to_owned());
        Err(CoreError::Rejected { action, message })
    }
}

/// A schedule fired on the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub schedule_id: Option<String>,
    pub received_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: Value) -> SchedulerResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn unknown_status_does_not_fail_parsing() {
        let resp = parse(json!({"action": "list", "status": "pending"}));
        assert_eq!(resp.status, ResponseStatus::Unknown);
        assert!(!resp.is_success());
    }

    #[test]
    fn trigger_requires_success() {
        let fired = parse(json!({
            "action": "trigger",
            "status": "success",
            "data": {"schedule_id": 7}
        }));
        assert!(fired.is_trigger());
        assert_eq!(fired.trigger_schedule_id().as_deref(), Some("7"));

        let failed = parse(json!({"action": "trigger", "status": "error"}));
        assert!(!failed.is_trigger());
        assert_eq!(failed.trigger_schedule_id(), None);
    }

    #[test]
    fn rejection_prefers_server_message() {
        let resp = parse(json!({"action": "create", "status": "error", "error": "slot taken"}));
        let err = resp
            .into_result(ScheduleAction::Create, "failed to save schedule")
            .unwrap_err();
        assert!(matches!(err, CoreError::Rejected { message, .. } if message == "slot taken"));
    }

    #[test]
    fn rejection_falls_back_without_message() {
        let resp = parse(json!({"action": "delete", "status": "error", "error": ""}));
        let err = resp
            .into_result(ScheduleAction::Delete, "failed to delete schedule")
            .unwrap_err();
        assert_eq!(err.to_string(), "delete rejected: failed to delete schedule");
    }
}
