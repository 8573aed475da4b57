//! `airctl watch`: live stream of schedule triggers and connection state.

use airctl_core::{AirconClient, ConnectionState};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WatchEvent {
    Connection {
        state: String,
        at: DateTime<Utc>,
    },
    Trigger {
        schedule_id: Option<String>,
        label: String,
        at: DateTime<Utc>,
    },
}

impl WatchEvent {
    fn line(&self, color: bool) -> String {
        match self {
            Self::Connection { state, at } => {
                let connected = state == &ConnectionState::Connected.to_string();
                format!(
                    "{}  connection {}",
                    output::dim(&local_time(at), color),
                    output::status(state, connected, color)
                )
            }
            Self::Trigger { label, at, .. } => {
                format!("{}  triggered  {label}", output::dim(&local_time(at), color))
            }
        }
    }
}

fn local_time(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

pub async fn handle(client: &AirconClient, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);

    // Labels need the schedule snapshot; ids are shown if it can't be loaded.
    if let Err(e) = client.schedules().list().await {
        tracing::warn!(error = %e, "Could not load schedules");
    }

    let mut states = WatchStream::new(client.connection_state());
    let mut triggers = BroadcastStream::new(client.triggers());
    util::note("Watching for schedule triggers (Ctrl-C to stop)", global.quiet);

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(state) = states.next() => WatchEvent::Connection {
                state: state.to_string(),
                at: Utc::now(),
            },
            Some(trigger) = triggers.next() => match trigger {
                Ok(event) => WatchEvent::Trigger {
                    label: client.schedules().trigger_label(event.schedule_id.as_deref()),
                    schedule_id: event.schedule_id,
                    at: event.received_at,
                },
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Trigger stream lagged");
                    continue;
                }
            },
            else => break,
        };

        let line = output::render_stream_item(&global.output, &event, |e| e.line(color))?;
        output::print_output(&line, false);
    }

    Ok(())
}
