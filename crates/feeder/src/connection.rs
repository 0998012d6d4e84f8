//! BLE side of the bridge: find the pointer by address, resolve its
//! orientation characteristic on request, then poll it on a fixed period.
//!
//! The link runs as its own task and reports through an event channel; the
//! main loop is the only consumer and owns all decoding state.

use std::time::Duration;

use anyhow::anyhow;
use btleplug::{
    api::{Central as _, Manager as _, Peripheral as _, ScanFilter},
    platform::{Adapter, Manager, Peripheral},
};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::decoder::OrientationSample;

/// Forward-only progression of the link. A dropped link is not modeled;
/// once polling starts the only exit is process exit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LinkState {
    Disconnected,
    Scanning,
    DeviceFound,
    ServiceResolved,
    Subscribed,
}

impl LinkState {
    /// Advertisement filter: only an exact address match while scanning
    /// moves the state forward. Duplicates and strangers are ignored.
    pub fn on_advertisement(self, matched: bool) -> LinkState {
        match (self, matched) {
            (LinkState::Scanning, true) => LinkState::DeviceFound,
            (state, _) => state,
        }
    }
}

#[derive(Debug)]
pub enum Event {
    /// The target pointer advertised; the connect affordance is now live.
    Found,
    /// Characteristic resolved, polling has started.
    Subscribed,
    Sample(OrientationSample),
    /// Setup failed in a way the link cannot continue from.
    Error(anyhow::Error),
}

/// Spawns the link task. The returned sender is the user's connect
/// trigger; sends before the pointer is found are the caller's to gate.
pub fn start(config: &Config) -> (mpsc::UnboundedReceiver<Event>, mpsc::Sender<()>) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (connect_tx, connect_rx) = mpsc::channel(1);
    tokio::spawn(run(config.clone(), connect_rx, event_tx));
    (event_rx, connect_tx)
}

async fn run(config: Config, connect: mpsc::Receiver<()>, events: mpsc::UnboundedSender<Event>) {
    if let Err(e) = link(config, connect, &events).await {
        let _ = events.send(Event::Error(e));
    }
}

async fn link(
    config: Config,
    mut connect: mpsc::Receiver<()>,
    events: &mpsc::UnboundedSender<Event>,
) -> anyhow::Result<()> {
    log::debug!("link state: {:?}", LinkState::Disconnected);
    let manager = Manager::new().await?;
    let adapter = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or(anyhow!("no bluetooth adapter"))?;

    let peripheral = scan(&adapter, &config).await?;
    adapter.stop_scan().await?;
    if events.send(Event::Found).is_err() {
        return Ok(());
    }

    // The pointer stays untouched until the user asks for it.
    if connect.recv().await.is_none() {
        return Ok(());
    }

    let characteristic = resolve(&peripheral, &config).await?;
    log::debug!("link state: {:?}", LinkState::Subscribed);
    if events.send(Event::Subscribed).is_err() {
        return Ok(());
    }

    poll(&peripheral, &characteristic, &config, events).await
}

async fn scan(adapter: &Adapter, config: &Config) -> anyhow::Result<Peripheral> {
    adapter.start_scan(ScanFilter::default()).await?;
    let mut state = LinkState::Scanning;
    log::debug!("link state: {state:?}");

    let target = config.target_bdaddr();
    loop {
        for p in adapter.peripherals().await? {
            if let Some(props) = p.properties().await? {
                state = state.on_advertisement(props.address == target);
                if state == LinkState::DeviceFound {
                    log::debug!("link state: {state:?}");
                    return Ok(p);
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

async fn resolve(
    peripheral: &Peripheral,
    config: &Config,
) -> anyhow::Result<btleplug::api::Characteristic> {
    peripheral.connect().await?;
    peripheral.discover_services().await?;

    let service = peripheral
        .services()
        .into_iter()
        .find(|s| s.uuid == config.service_uuid)
        .ok_or_else(|| anyhow!("pointer is missing service {}", config.service_uuid))?;
    log::debug!("link state: {:?}", LinkState::ServiceResolved);

    service
        .characteristics
        .into_iter()
        .find(|ch| ch.uuid == config.characteristic_uuid)
        .ok_or_else(|| {
            anyhow!(
                "pointer is missing characteristic {}",
                config.characteristic_uuid
            )
        })
}

async fn poll(
    peripheral: &Peripheral,
    characteristic: &btleplug::api::Characteristic,
    config: &Config,
    events: &mpsc::UnboundedSender<Event>,
) -> anyhow::Result<()> {
    let mut ticks = tokio::time::interval(Duration::from_millis(config.poll_interval_ms));
    // Reads are awaited before the next tick, so ticks never overlap; a
    // read slower than the period drops ticks instead of bursting.
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticks.tick().await;
        match peripheral.read(characteristic).await {
            Ok(data) => match OrientationSample::from_le_bytes(&data) {
                Some(sample) => {
                    if events.send(Event::Sample(sample)).is_err() {
                        return Ok(());
                    }
                }
                None => log::debug!("short orientation read: {} bytes", data.len()),
            },
            // Best-effort telemetry: a failed tick produces no sample and
            // no state change.
            Err(e) => log::debug!("orientation read failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_advertisement_does_not_advance() {
        assert_eq!(
            LinkState::Scanning.on_advertisement(false),
            LinkState::Scanning
        );
    }

    #[test]
    fn matched_advertisement_advances_once() {
        let state = LinkState::Scanning.on_advertisement(true);
        assert_eq!(state, LinkState::DeviceFound);
        // A duplicate advertisement after the device is found is ignored.
        assert_eq!(state.on_advertisement(true), LinkState::DeviceFound);
    }

    #[test]
    fn advertisements_before_scanning_are_ignored() {
        assert_eq!(
            LinkState::Disconnected.on_advertisement(true),
            LinkState::Disconnected
        );
        assert_eq!(
            LinkState::Subscribed.on_advertisement(true),
            LinkState::Subscribed
        );
    }
}
