#![allow(clippy::unwrap_used, dead_code)]

// In-process stand-in for the appliance gateway.
//
// `Gateway` is a `Link`: every publish is recorded and, for schedule
// channels, answered synchronously on the response channel with the same
// semantics as the real gateway (server-assigned ids, full-record update,
// list of everything stored).

use std::sync::{Arc, Mutex, OnceLock};

use airctl_api::{Error, Link, TransportConnection};
use airctl_core::channels::{
    SCHEDULE_CREATE, SCHEDULE_DELETE, SCHEDULE_LIST, SCHEDULE_RESPONSE, SCHEDULE_UPDATE,
};
use serde_json::{Value, json};

#[derive(Default)]
struct State {
    schedules: Vec<Value>,
    next_id: u64,
    log: Vec<(String, Value)>,
    /// `Some(message)` rejects the next schedule command.
    reject_next: Option<Option<String>>,
    silent: bool,
}

#[derive(Default)]
pub struct Gateway {
    connection: OnceLock<TransportConnection>,
    state: Mutex<State>,
}

impl Gateway {
    /// A connected session wired to a fresh gateway.
    pub fn connect() -> (Arc<Self>, TransportConnection) {
        let gateway = Arc::new(Self::default());
        let connection = TransportConnection::with_link(gateway.clone(), None);
        assert!(gateway.connection.set(connection.clone()).is_ok());
        connection.handle_connected();
        (gateway, connection)
    }

    /// Every request published on `channel`, oldest first.
    pub fn requests(&self, channel: &str) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// Channels published to, in order.
    pub fn channels(&self) -> Vec<String> {
        self.state.lock().unwrap().log.iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn stored(&self) -> Vec<Value> {
        self.state.lock().unwrap().schedules.clone()
    }

    pub fn reject_next(&self, message: Option<&str>) {
        self.state.lock().unwrap().reject_next = Some(message.map(str::to_owned));
    }

    /// Stop answering (requests still get recorded).
    pub fn go_silent(&self) {
        self.state.lock().unwrap().silent = true;
    }

    pub fn fire_trigger(&self, schedule_id: &str) {
        self.deliver(&json!({
            "action": "trigger",
            "status": "success",
            "data": {"schedule_id": schedule_id}
        }));
    }

    fn deliver(&self, response: &Value) {
        let payload = serde_json::to_vec(response).unwrap();
        self.connection
            .get()
            .unwrap()
            .handle_incoming(SCHEDULE_RESPONSE, &payload);
    }
}

impl State {
    fn answer(&mut self, channel: &str, request: &Value) -> Option<Value> {
        let action = match channel {
            SCHEDULE_LIST => "list",
            SCHEDULE_CREATE => "create",
            SCHEDULE_UPDATE => "update",
            SCHEDULE_DELETE => "delete",
            _ => return None,
        };
        let request_id = request["request_id"].clone();

        if let Some(message) = self.reject_next.take() {
            let mut reply = json!({"action": action, "status": "error", "request_id": request_id});
            if let Some(message) = message {
                reply["error"] = json!(message);
            }
            return Some(reply);
        }

        let data = match action {
            "list" => json!({"schedules": self.schedules}),
            "create" => {
                self.next_id += 1;
                let id = format!("s{}", self.next_id);
                let mut schedule = request["schedule"].clone();
                schedule["id"] = json!(id);
                self.schedules.push(schedule);
                json!({"id": id})
            }
            "update" => {
                let schedule = request["schedule"].clone();
                let Some(slot) = self
                    .schedules
                    .iter_mut()
                    .find(|s| s["id"] == schedule["id"])
                else {
                    return Some(json!({
                        "action": action,
                        "status": "error",
                        "error": "schedule not found",
                        "request_id": request_id
                    }));
                };
                *slot = schedule;
                Value::Null
            }
            _ => {
                self.schedules.retain(|s| s["id"] != request["id"]);
                Value::Null
            }
        };

        Some(json!({"action": action, "status": "success", "data": data, "request_id": request_id}))
    }
}

impl Link for Gateway {
    fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), Error> {
        let request: Value = serde_json::from_slice(payload).unwrap_or(Value::Null);
        let reply = {
            let mut state = self.state.lock().unwrap();
            state.log.push((channel.to_owned(), request.clone()));
            if state.silent {
                None
            } else {
                state.answer(channel, &request)
            }
        };
        if let Some(reply) = reply {
            self.deliver(&reply);
        }
        Ok(())
    }

    fn subscribe(&self, _channel: &str) -> Result<(), Error> {
        Ok(())
    }

    fn unsubscribe(&self, _channel: &str) -> Result<(), Error> {
        Ok(())
    }

    fn disconnect(&self) -> Result<(), Error> {
        Ok(())
    }
}
