//! `airctl monitor <channel>`: print JSON payloads as they arrive.

use std::io::{self, Write};

use airctl_core::{AirconClient, TopicFeed};
use serde_json::Value;

use crate::cli::{GlobalOpts, MonitorArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    client: &AirconClient,
    args: &MonitorArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.channel.trim().is_empty() || args.channel.contains(['+', '#']) {
        return Err(CliError::Validation {
            field: "channel".into(),
            reason: "expected a concrete topic without wildcards".into(),
        });
    }

    let mut feed = client.feed_topic::<Value>(&args.channel);
    util::note(&format!("Monitoring {} (Ctrl-C to stop)", feed.channel()), global.quiet);

    let mut stdout = io::stdout();
    tokio::select! {
        result = relay(&mut feed, args.count, &global.output, &mut stdout) => result,
        _ = tokio::signal::ctrl_c() => Ok(()),
    }
}

/// Write one line per payload until `limit` messages (decodable or not) have arrived.
async fn relay(
    feed: &mut TopicFeed<Value>,
    limit: Option<usize>,
    format: &OutputFormat,
    out: &mut (impl Write + Send),
) -> Result<(), CliError> {
    let mut seen = 0usize;

    while limit.is_none_or(|limit| seen < limit) {
        let Some(item) = feed.next().await else {
            break;
        };
        seen += 1;

        match item {
            Ok(payload) => {
                let line = output::render_stream_item(format, &payload, Value::to_string)?;
                writeln!(out, "{line}")?;
                out.flush()?;
            }
            Err(error) => tracing::warn!(%error, "Skipping undecodable message"),
        }
    }

    Ok(())
}
