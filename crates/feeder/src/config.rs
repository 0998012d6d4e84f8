use std::fs::File;
use std::path::Path;

use anyhow::Context;
use btleplug::api::BDAddr;
use serde::Deserialize;
use uuid::{uuid, Uuid};

/// Everything the bridge needs to find its two peers. All fields have
/// defaults matching the demo rig, so a config file only needs to name the
/// values that differ.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// 64-bit Bluetooth address of the orientation pointer.
    pub device_address: u64,
    /// GATT service holding the orientation characteristic.
    pub service_uuid: Uuid,
    /// Characteristic carrying three little-endian f32 angles.
    pub characteristic_uuid: Uuid,
    /// TCP address of the motion controller.
    pub controller_address: String,
    /// Recorded in the session but irrelevant to the TCP transport.
    pub baud_rate: u32,
    pub poll_interval_ms: u64,
    /// Per-axis orientation delta (exclusive) that triggers a jog.
    pub delta_threshold: f32,
    /// How long a sent command may wait for the controller's reply.
    pub command_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            device_address: 106_380_957_178_854,
            service_uuid: uuid!("69c482ca-c200-44fc-b048-6e0d0be1191c"),
            characteristic_uuid: uuid!("69c482ca-c200-44fc-b048-6e0d0be1191d"),
            controller_address: "192.168.43.84:8899".to_owned(),
            baud_rate: 115_200,
            poll_interval_ms: 100,
            delta_threshold: 1.0,
            command_timeout_ms: 3000,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let file = File::open(path)
            .with_context(|| format!("failed to open config file {}", path.display()))?;
        let config = serde_json::from_reader(file)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// The pointer's address as btleplug sees it: the low six bytes of the
    /// 64-bit address, most significant first.
    pub fn target_bdaddr(&self) -> BDAddr {
        let b = self.device_address.to_be_bytes();
        BDAddr::from([b[2], b[3], b[4], b[5], b[6], b[7]])
    }
}
