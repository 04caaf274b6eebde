//! Live MQTT stream handlers.

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use sigen_core::{
    ConnectionState, CoreError, MAX_COMMAND_BATCH, SigenClient, StreamEvent, StreamHandle,
    TelemetryRecord,
};

use crate::cli::{EventKind, GlobalOpts, OutputFormat, StreamArgs, StreamCommand};
use crate::error::CliError;
use crate::output;

// ── Event rendering ─────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
enum EventView<'a> {
    Telemetry(&'a TelemetryRecord),
    Change(&'a Value),
    Alarm(&'a Value),
}

impl<'a> EventView<'a> {
    fn new(event: &'a StreamEvent) -> Self {
        match event {
            StreamEvent::Telemetry(record) => Self::Telemetry(record),
            StreamEvent::SystemChange(value) => Self::Change(value),
            StreamEvent::Alarm(value) => Self::Alarm(value),
        }
    }

    fn kind(&self) -> EventKind {
        match self {
            Self::Telemetry(_) => EventKind::Telemetry,
            Self::Change(_) => EventKind::Change,
            Self::Alarm(_) => EventKind::Alarm,
        }
    }
}

fn telemetry_line(r: &TelemetryRecord) -> String {
    format!(
        "{} {} {}  pv {:.2} kW  battery {:+.2} kW  soc {:.0}%  grid {:+.2} kW  load {:.2} kW",
        r.timestamp,
        r.system_id,
        r.device_type,
        r.pv_power_kw,
        r.battery_power_kw,
        r.soc_percent,
        r.grid_power_kw,
        r.load_power_kw,
    )
}

fn telemetry_plain(r: &TelemetryRecord) -> String {
    format!(
        "{} {} {} {} {} {}",
        r.system_id,
        r.pv_power_kw,
        r.battery_power_kw,
        r.soc_percent,
        r.grid_power_kw,
        r.load_power_kw,
    )
}

fn render_event(view: &EventView<'_>, format: &OutputFormat) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Table => match view {
            EventView::Telemetry(r) => telemetry_line(r),
            EventView::Change(v) => format!("change {v}"),
            EventView::Alarm(v) => format!("alarm  {v}"),
        },
        OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(view)?,
        OutputFormat::Yaml => format!("---\n{}", serde_yaml::to_string(view)?),
        OutputFormat::Plain => match view {
            EventView::Telemetry(r) => telemetry_plain(r),
            EventView::Change(v) | EventView::Alarm(v) => v.to_string(),
        },
    })
}

fn state_label(state: &ConnectionState) -> String {
    match state {
        ConnectionState::Idle => "idle".into(),
        ConnectionState::Connecting => "connecting".into(),
        ConnectionState::Subscribing => "subscribing".into(),
        ConnectionState::Streaming => "streaming".into(),
        ConnectionState::Faulted(reason) => format!("faulted: {reason}"),
    }
}

// ── Handlers ────────────────────────────────────────────────────────

async fn watch(
    handle: &StreamHandle,
    count: Option<usize>,
    kind: Option<EventKind>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut events = handle.subscribe();
    let mut state = handle.state();
    let color = output::should_color(&global.color);
    let mut printed = 0usize;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                if !global.quiet {
                    let label = state_label(&state.borrow_and_update());
                    eprintln!("{}", output::dim(&format!("stream {label}"), color));
                }
            }

            received = events.recv() => {
                let event = match received {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "stream output fell behind, events dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let view = EventView::new(&event);
                if kind.is_some_and(|k| k != view.kind()) {
                    continue;
                }
                output::print_output(&render_event(&view, &global.output)?, global.quiet);

                printed += 1;
                if count.is_some_and(|limit| printed >= limit) {
                    break;
                }
            }
        }
    }
    Ok(())
}

fn read_commands(file: &Path) -> Result<Vec<Value>, CliError> {
    let raw = if file == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(file)?
    };
    let commands: Vec<Value> = serde_json::from_str(&raw)?;

    if commands.is_empty() || commands.len() > MAX_COMMAND_BATCH {
        return Err(CliError::Validation {
            field: "commands".into(),
            reason: format!(
                "batch has {} entries, expected 1 to {MAX_COMMAND_BATCH}",
                commands.len()
            ),
        });
    }
    Ok(commands)
}

async fn send(handle: &StreamHandle, commands: &[Value], wait: u64) -> Result<(), CliError> {
    let mut state = handle.state();
    let ready = tokio::time::timeout(
        Duration::from_secs(wait),
        state.wait_for(|s| *s == ConnectionState::Streaming),
    )
    .await;
    if !matches!(ready, Ok(Ok(_))) {
        return Err(CliError::StreamNotConnected);
    }

    handle
        .send_command(commands)
        .await
        .map_err(CoreError::from)?;
    Ok(())
}

pub async fn handle(
    client: &SigenClient,
    args: StreamArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // Read the batch before connecting so a bad file fails fast.
    let commands = match &args.command {
        StreamCommand::Send { file, .. } => Some(read_commands(file)?),
        StreamCommand::Watch { .. } => None,
    };

    let cancel = CancellationToken::new();
    let handle = client.start_stream(cancel.clone()).await?;

    let result = match (args.command, commands) {
        (StreamCommand::Watch { count, kind }, _) => watch(&handle, count, kind, global).await,
        (StreamCommand::Send { wait, .. }, Some(commands)) => {
            let sent = send(&handle, &commands, wait).await;
            if sent.is_ok() && !global.quiet {
                eprintln!("Sent {} command(s)", commands.len());
            }
            sent
        }
        (StreamCommand::Send { .. }, None) => Ok(()),
    };

    handle.shutdown();
    handle.join().await;
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record() -> TelemetryRecord {
        TelemetryRecord {
            timestamp: "2024-05-01 12:00:00".into(),
            system_id: "S1".into(),
            device_type: "inverter".into(),
            pv_power_kw: 3.2,
            battery_power_kw: -1.5,
            soc_percent: 80.0,
            grid_power_kw: 0.25,
            load_power_kw: 1.45,
            ..TelemetryRecord::default()
        }
    }

    #[test]
    fn telemetry_table_line_shows_signs() {
        let line = telemetry_line(&record());
        assert!(line.contains("battery -1.50 kW"), "{line}");
        assert!(line.contains("grid +0.25 kW"), "{line}");
        assert!(line.contains("soc 80%"), "{line}");
    }

    #[test]
    fn json_events_are_tagged() {
        let event = StreamEvent::Alarm(json!({ "alarmCode": 17 }));
        let out = render_event(&EventView::new(&event), &OutputFormat::JsonCompact).unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["kind"], "alarm");
        assert_eq!(parsed["data"]["alarmCode"], 17);
    }

    #[test]
    fn oversized_batch_is_rejected_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        let batch: Vec<Value> = (0..25).map(|i| json!({ "id": i })).collect();
        std::fs::write(&path, serde_json::to_string(&batch).unwrap()).unwrap();

        assert!(matches!(
            read_commands(&path),
            Err(CliError::Validation { .. })
        ));
    }
}
