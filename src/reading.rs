use chrono::{DateTime, Local};
use serde::Serialize;

use crate::config::DeviceConfig;
use crate::message::BasicInfoMessage;

/// One captured battery reading.
///
/// Created only from a successfully decoded frame and never mutated
/// afterwards. The field names are the canonical wire representation: this
/// struct serializes directly into the JSON published for the battery, with
/// the timestamp rendered as RFC 3339 including the local UTC offset.
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    pub battery_id: String,
    pub timestamp: DateTime<Local>,
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub capacity_remain_ah: f64,
    pub capacity_total_ah: f64,
    pub capacity_percent: f64,
    pub cycles: u16,
}

impl Reading {
    /// Stamp a decoded frame with the battery's identity and the current
    /// local time.
    pub fn capture(device: &DeviceConfig, msg: &BasicInfoMessage) -> Self {
        Self {
            battery_id: device.label.clone(),
            timestamp: Local::now(),
            voltage: msg.voltage_v(),
            current: msg.current_a(),
            power: msg.power_w(),
            capacity_remain_ah: msg.capacity_remain_ah(),
            capacity_total_ah: msg.capacity_total_ah(),
            capacity_percent: msg.capacity_percent(),
            cycles: msg.cycles_count(),
        }
    }
}
