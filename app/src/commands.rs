//! Subcommand handlers.

use std::io::BufRead;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{select, unbounded, Receiver};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use regionrec_audio::{test_loopback_audio, LoopbackPolicy, LoopbackProvider, SystemLoopback};
use regionrec_engine::create_engine;
use regionrec_ipc::{
    command_channel, event_channel, RecorderCommand, RecorderEvent, RecordingOutcome,
    SessionState,
};

use crate::cli::{ConfigCommand, RecordArgs};
use crate::config::ConfigStore;

const WAIT_SLICE: Duration = Duration::from_millis(250);

/// Record one session through the engine and print the outcome.
#[instrument(name = "cmd_record", skip_all)]
pub fn record(config: &mut ConfigStore, args: RecordArgs) -> Result<()> {
    if let Some(region) = args.region {
        config.set("region", serde_json::to_value(region)?)?;
        if args.remember {
            config.save()?;
        }
    }

    let mut settings = config
        .settings()
        .context("no region given; pass --region or run `regionrec config set-region`")?;
    if let Some(fps) = args.fps {
        settings.fps = fps;
    }
    if let Some(format) = args.format {
        settings.output_format = format;
    }
    if let Some(dir) = args.output {
        settings.output_dir = dir;
    }
    settings.validate()?;

    let (command_tx, command_rx) = command_channel();
    let (event_tx, event_rx) = event_channel();
    let engine = thread::Builder::new()
        .name("regionrec-engine".to_string())
        .spawn(move || {
            let mut engine = create_engine(command_rx, event_tx);
            engine.run();
        })?;

    let stop_rx = stop_signal()?;
    let deadline = args
        .duration
        .map(|secs| Instant::now() + Duration::from_secs_f64(secs.max(0.0)));

    let region = settings.region;
    command_tx
        .send(RecorderCommand::Start { settings })
        .map_err(|e| anyhow!("Failed to send command: {}", e))?;

    match args.duration {
        Some(secs) => println!("Recording {region} for {secs:.1}s (Ctrl+C or Enter stops early)..."),
        None => println!("Recording {region}. Press Enter or Ctrl+C to stop."),
    }

    let outcome = wait_for_outcome(&event_rx, &stop_rx, deadline, || {
        command_tx
            .send(RecorderCommand::Stop)
            .map_err(|e| anyhow!("Failed to send command: {}", e))
    });

    if let Err(e) = command_tx.send(RecorderCommand::Shutdown) {
        warn!("Failed to send shutdown: {}", e);
    }
    if engine.join().is_err() {
        warn!("Engine thread panicked");
    }

    let outcome = outcome?;
    println!("{}", outcome.summary());
    for warning in outcome.errors.warnings() {
        println!("warning: {warning}");
    }
    if !outcome.is_saved() {
        bail!("no recording was saved");
    }
    Ok(())
}

/// Drive the event loop until the engine reports the finished recording.
fn wait_for_outcome(
    event_rx: &Receiver<RecorderEvent>,
    stop_rx: &Receiver<()>,
    deadline: Option<Instant>,
    send_stop: impl Fn() -> Result<()>,
) -> Result<RecordingOutcome> {
    let mut stop_sent = false;

    loop {
        if !stop_sent && deadline.is_some_and(|d| Instant::now() >= d) {
            debug!("Duration elapsed");
            send_stop()?;
            stop_sent = true;
        }

        select! {
            recv(stop_rx) -> _ => {
                if !stop_sent {
                    println!("Stopping...");
                    send_stop()?;
                    stop_sent = true;
                }
            }
            recv(event_rx) -> event => match event {
                Ok(RecorderEvent::Finished(outcome)) => return Ok(outcome),
                Ok(RecorderEvent::Error { message }) => bail!("{message}"),
                Ok(RecorderEvent::StateChanged { current, .. }) => {
                    if current == SessionState::Finalizing {
                        println!("Finalizing...");
                    }
                }
                Ok(RecorderEvent::Stats(stats)) => {
                    debug!(frames = stats.frames_captured, fps = stats.fps, "Progress");
                }
                Ok(RecorderEvent::Shutdown) => bail!("engine shut down before the recording finished"),
                Ok(_) => {}
                Err(_) => bail!("engine stopped unexpectedly"),
            },
            default(WAIT_SLICE) => {}
        }
    }
}

/// Fires once on Ctrl+C or when a line is read from stdin.
fn stop_signal() -> Result<Receiver<()>> {
    let (tx, rx) = unbounded();

    let ctrlc_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(());
    })
    .context("installing Ctrl+C handler")?;

    thread::Builder::new()
        .name("regionrec-stdin".to_string())
        .spawn(move || {
            let mut line = String::new();
            if std::io::stdin().lock().read_line(&mut line).is_ok() && !line.is_empty() {
                let _ = tx.send(());
            }
        })?;

    Ok(rx)
}

/// Run the loopback trial capture and print its classification.
#[instrument(name = "cmd_probe", skip_all)]
pub fn probe() -> Result<()> {
    let outcome = test_loopback_audio(&SystemLoopback, &LoopbackPolicy::default());
    info!(status = ?outcome.status, peak = outcome.peak, "Probe finished");

    println!("System audio available: {}", if outcome.available { "yes" } else { "no" });
    println!("Status: {:?}", outcome.status);
    if let Some(device) = &outcome.device {
        println!("Device: {device}");
    }
    println!("Message: {}", outcome.message);
    println!("Peak level: {:.4}", outcome.peak);
    Ok(())
}

pub fn devices() -> Result<()> {
    let devices = SystemLoopback.devices()?;
    if devices.is_empty() {
        println!("No loopback devices found");
        return Ok(());
    }
    for device in devices {
        let marker = if device.is_default { "*" } else { " " };
        println!("{marker} {}  [{}]", device.name, device.id);
    }
    Ok(())
}

pub fn config(store: &mut ConfigStore, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            println!("# {}", store.path().display());
            println!("{}", serde_json::to_string_pretty(store.values())?);
        }
        ConfigCommand::SetRegion { region } => {
            store.update_region(region)?;
            println!("Region set to {region}");
        }
        ConfigCommand::Set { key, value } => {
            let value = serde_json::from_str::<Value>(&value).unwrap_or(Value::String(value));
            store.set(&key, value)?;
            store.save()?;
            println!("{key} updated");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use regionrec_ipc::SessionStats;

    #[test]
    fn test_wait_returns_finished_outcome() {
        let (event_tx, event_rx) = unbounded();
        let (_stop_tx, stop_rx) = unbounded();

        event_tx.send(RecorderEvent::Stats(SessionStats::default())).unwrap();
        event_tx
            .send(RecorderEvent::Finished(RecordingOutcome::default()))
            .unwrap();

        let outcome = wait_for_outcome(&event_rx, &stop_rx, None, || Ok(())).unwrap();
        assert_eq!(outcome, RecordingOutcome::default());
    }

    #[test]
    fn test_wait_sends_stop_at_deadline() {
        let (event_tx, event_rx) = unbounded();
        let (_stop_tx, stop_rx) = unbounded();
        let deadline = Some(Instant::now());

        let outcome = wait_for_outcome(&event_rx, &stop_rx, deadline, move || {
            event_tx
                .send(RecorderEvent::Finished(RecordingOutcome::default()))
                .map_err(|e| anyhow!("{e}"))
        });
        assert!(outcome.is_ok());
    }

    #[test]
    fn test_wait_surfaces_start_error() {
        let (event_tx, event_rx) = unbounded();
        let (_stop_tx, stop_rx) = unbounded();
        event_tx
            .send(RecorderEvent::Error { message: "already running".to_string() })
            .unwrap();

        let err = wait_for_outcome(&event_rx, &stop_rx, None, || Ok(())).unwrap_err();
        assert!(err.to_string().contains("already running"));
    }
}
