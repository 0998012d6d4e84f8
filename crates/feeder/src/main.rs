//! Bridges a BLE orientation pointer to a robot arm's jog interface.
//!
//! The pointer is polled for orientation samples; per-axis deltas past a
//! threshold become one-step jog commands for the arm. A handful of keys
//! cover the axes the pointer cannot reach, plus the joint/coordinate mode
//! toggle and the connect trigger.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use crossterm::event::{EventStream, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use futures::StreamExt;
use indicatif::ProgressBar;
use jogwand_protocol::{DeviceInfo, MotionParameterSet};

use crate::config::Config;
use crate::connection::Event;
use crate::controller::{Controller, ControllerLink, MockController};
use crate::decoder::{Axis, GestureDecoder, JogEvent, MotionSpace, Polarity};

mod config;
mod connection;
mod controller;
mod decoder;

const TICK: Duration = Duration::from_millis(50);
const DEVICE_NAME: &str = "Dobot Magician";

#[derive(Parser)]
struct Args {
    /// JSON config file; every field falls back to the demo rig's defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log commands to an in-process stub instead of a real controller.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let params = MotionParameterSet::default();
    let command_timeout = Duration::from_millis(config.command_timeout_ms);

    if args.dry_run {
        let (ctrl, info) = controller::bring_up(
            || async {
                Ok((
                    MockController::new(),
                    DeviceInfo {
                        firmware_type: "stub".to_owned(),
                        version: "0.0.0".to_owned(),
                    },
                ))
            },
            command_timeout,
            DEVICE_NAME,
            &params,
        )
        .await
        .expect("stub connect cannot fail");
        return run(config, ctrl, info).await;
    }

    let address = config.controller_address.clone();
    let baud_rate = config.baud_rate;
    match controller::bring_up(
        move || async move { ControllerLink::connect(&address, baud_rate).await },
        command_timeout,
        DEVICE_NAME,
        &params,
    )
    .await
    {
        Ok((ctrl, info)) => run(config, ctrl, info).await,
        Err(e) => {
            // A failed connect is terminal: no parameters were pushed, so
            // jogging the arm would be meaningless.
            eprintln!("Connect Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(config: Config, ctrl: impl Controller, info: DeviceInfo) -> anyhow::Result<()> {
    log::info!(
        "connected: firmware {} version {}",
        info.firmware_type,
        info.version
    );

    let status = ProgressBar::new_spinner().with_message("Scanning for pointer...");
    status.enable_steady_tick(TICK);

    enable_raw_mode()?;
    let result = event_loop(&config, ctrl, &status).await;
    disable_raw_mode()?;
    result
}

/// The single consumer of both event sources. All mutable pipeline state
/// (decoder history, mode flag, connect gating) lives here.
async fn event_loop(
    config: &Config,
    mut ctrl: impl Controller,
    status: &ProgressBar,
) -> anyhow::Result<()> {
    let (mut events, connect) = connection::start(config);
    let mut decoder = GestureDecoder::new(config.delta_threshold);
    let mut space = MotionSpace::default();
    let mut device_found = false;

    let mut keys = EventStream::new();
    loop {
        tokio::select! {
            ev = events.recv() => {
                match ev {
                    None => return Ok(()),
                    Some(ev) => {
                        handle_link_event(ev, &mut ctrl, &mut decoder, space, status, &mut device_found)
                            .await?;
                    }
                }
            }
            key = keys.next() => {
                let Some(key) = key.transpose()? else { return Ok(()) };
                let crossterm::event::Event::Key(key) = key else { continue };
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') => return Ok(()),
                    KeyCode::Char('c') if device_found => {
                        let _ = connect.try_send(());
                    }
                    KeyCode::Char('m') => {
                        space = space.toggled();
                        log::info!("jog mode: {space:?}");
                    }
                    code => {
                        if let Some((axis, polarity)) = key_jog(code) {
                            let event = JogEvent { axis, polarity, space };
                            controller::dispatch(&mut ctrl, &event).await;
                        }
                    }
                }
            }
        }
    }
}

async fn handle_link_event(
    ev: Event,
    ctrl: &mut impl Controller,
    decoder: &mut GestureDecoder,
    space: MotionSpace,
    status: &ProgressBar,
    device_found: &mut bool,
) -> anyhow::Result<()> {
    match ev {
        Event::Found => {
            *device_found = true;
            status.set_message("Pointer found; press 'c' to connect");
        }
        Event::Subscribed => status.set_message("Polling orientation..."),
        Event::Sample(sample) => {
            for jog in decoder.decode(sample, space) {
                controller::dispatch(ctrl, &jog).await;
            }
            status.set_message(format!(
                "X={} ; Y={} ; Z={}",
                sample.x, sample.y, sample.z
            ));
        }
        Event::Error(e) => return Err(e),
    }
    Ok(())
}

/// The labeled jog keys for the axes the pointer never drives: the wrist
/// rotation pair on D and the accessory pair on E.
fn key_jog(code: KeyCode) -> Option<(Axis, Polarity)> {
    match code {
        KeyCode::Char('f') => Some((Axis::D, Polarity::Positive)),
        KeyCode::Char('d') => Some((Axis::D, Polarity::Negative)),
        KeyCode::Char('k') => Some((Axis::E, Polarity::Positive)),
        KeyCode::Char('j') => Some((Axis::E, Polarity::Negative)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jog_keys_cover_both_reserved_axes() {
        assert_eq!(key_jog(KeyCode::Char('f')), Some((Axis::D, Polarity::Positive)));
        assert_eq!(key_jog(KeyCode::Char('d')), Some((Axis::D, Polarity::Negative)));
        assert_eq!(key_jog(KeyCode::Char('k')), Some((Axis::E, Polarity::Positive)));
        assert_eq!(key_jog(KeyCode::Char('j')), Some((Axis::E, Polarity::Negative)));
        assert_eq!(key_jog(KeyCode::Char('x')), None);
        assert_eq!(key_jog(KeyCode::Enter), None);
    }
}
