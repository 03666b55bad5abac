use std::collections::HashMap;

use crate::reading::Reading;

/// The most recent reading of each battery, keyed by label.
///
/// Owned by the poller and written only from its loop: every successful cycle
/// replaces the battery's entry wholesale. A battery that has never completed
/// a cycle has no entry. Readers elsewhere see each entry as an immutable
/// snapshot.
#[derive(Debug, Default)]
pub struct ReadingStore {
    latest: HashMap<String, Reading>,
}

impl ReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the battery's entry with a fresh reading.
    pub fn insert(&mut self, reading: Reading) {
        self.latest.insert(reading.battery_id.clone(), reading);
    }

    pub fn get(&self, battery_id: &str) -> Option<&Reading> {
        self.latest.get(battery_id)
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.latest.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::message::BasicInfoMessage;

    fn reading_with_voltage(label: &str, raw_voltage: [u8; 2]) -> Reading {
        let mut frame = vec![
            0xdd, 0x03, 0x00, 0x10, 0x0c, 0x80, 0xff, 0xce, 0x03, 0xe8, 0x07, 0xd0, 0x32, 0x00,
            0x2a, 0x02,
        ];
        frame[4] = raw_voltage[0];
        frame[5] = raw_voltage[1];
        let msg = BasicInfoMessage::decode(&frame).unwrap();
        let device = DeviceConfig {
            address: "00:00:00:00:00:00".into(),
            label: label.into(),
        };
        Reading::capture(&device, &msg)
    }

    #[test]
    fn one_entry_per_battery_replaced_never_merged() {
        let mut store = ReadingStore::new();
        store.insert(reading_with_voltage("BATT1", [0x0c, 0x80]));
        store.insert(reading_with_voltage("BATT2", [0x0a, 0x28]));
        assert_eq!(store.len(), 2);

        store.insert(reading_with_voltage("BATT1", [0x0a, 0xf0]));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("BATT1").unwrap().voltage, 28.0);
        assert_eq!(store.get("BATT2").unwrap().voltage, 26.0);
    }

    #[test]
    fn no_entry_until_first_reading() {
        let store = ReadingStore::new();
        assert!(store.is_empty());
        assert!(store.get("BATT1").is_none());
    }
}
