use thiserror::Error;

/// A verbatim message to send which requests the basic pack state
pub (crate) const REQUEST: [u8; 7] = [0xdd, 0xa5, 0x03, 0x00, 0xff, 0xfd, 0x77];

/// The smallest response that still carries every field of the basic info
/// layout.
pub const MIN_FRAME_LEN: usize = 16;

/// Why a collected response could not be decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes arrived during the collection window than the fixed
    /// field layout requires.
    #[error("frame too short: got {len} bytes, need at least {MIN_FRAME_LEN}")]
    FrameTooShort { len: usize },
}

/// A message type which contains the pack's basic state: voltage, current,
/// capacities and cycle count.
///
/// Fields sit at fixed big-endian offsets. Decoding checks length only; no
/// start marker or checksum is verified, so a successful decode means
/// "syntactically plausible", nothing stronger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicInfoMessage {
    pack_voltage_cv: u16,
    pack_current_ca: i16,
    residual_capacity_cah: u16,
    design_capacity_cah: u16,
    state_of_charge_pct: u8,
    cycles_count: u16,
    temperature_sensor_count: u8,
}

impl BasicInfoMessage {
    /// Decode one response frame.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < MIN_FRAME_LEN {
            return Err(DecodeError::FrameTooShort { len: data.len() });
        }

        Ok(Self {
            pack_voltage_cv: u16::from_be_bytes([data[4], data[5]]),
            pack_current_ca: i16::from_be_bytes([data[6], data[7]]),
            residual_capacity_cah: u16::from_be_bytes([data[8], data[9]]),
            design_capacity_cah: u16::from_be_bytes([data[10], data[11]]),
            state_of_charge_pct: data[12],
            cycles_count: u16::from_be_bytes([data[13], data[14]]),
            temperature_sensor_count: data[15],
        })
    }

    /// The pack voltage in V
    pub fn voltage_v(&self) -> f64 {
        f64::from(self.pack_voltage_cv) / 100.0
    }

    /// The pack current in A. Sign follows the vendor convention, so it may
    /// be negative.
    pub fn current_a(&self) -> f64 {
        f64::from(self.pack_current_ca) / 100.0
    }

    /// Instantaneous power in W, voltage times current, unclamped.
    pub fn power_w(&self) -> f64 {
        self.voltage_v() * self.current_a()
    }

    /// The remaining capacity of the pack in Ah
    pub fn capacity_remain_ah(&self) -> f64 {
        f64::from(self.residual_capacity_cah) / 100.0
    }

    /// The design capacity of the pack in Ah
    pub fn capacity_total_ah(&self) -> f64 {
        f64::from(self.design_capacity_cah) / 100.0
    }

    /// Remaining capacity as a share of design capacity, rounded to one
    /// decimal place. A pack reporting zero design capacity reads as 0.
    pub fn capacity_percent(&self) -> f64 {
        if self.design_capacity_cah == 0 {
            return 0.0;
        }
        let pct =
            f64::from(self.residual_capacity_cah) / f64::from(self.design_capacity_cah) * 100.0;
        (pct * 10.0).round() / 10.0
    }

    /// The state of charge of the pack in % as the pack itself reports it
    pub fn state_of_charge_pct(&self) -> u8 {
        self.state_of_charge_pct
    }

    /// Lifetime number of charge cycles
    pub fn cycles_count(&self) -> u16 {
        self.cycles_count
    }

    /// How many temperature sensors the pack carries. The per-sensor values
    /// that follow this byte are not decoded.
    pub fn temperature_sensor_count(&self) -> u8 {
        self.temperature_sensor_count
    }
}

#[cfg(test)]
fn reference_frame() -> Vec<u8> {
    vec![
        0xdd, 0x03, 0x00, 0x10, // header bytes, ignored by the decoder
        0x0c, 0x80, // 3200 -> 32.00 V
        0xff, 0xce, // -50 -> -0.50 A
        0x03, 0xe8, // 1000 -> 10.00 Ah remaining
        0x07, 0xd0, // 2000 -> 20.00 Ah design
        0x32, // 50 % reported state of charge
        0x00, 0x2a, // 42 cycles
        0x02, // two temperature sensors
    ]
}

#[test]
fn test_decode_happy() {
    let msg = BasicInfoMessage::decode(&reference_frame()).unwrap();
    assert_eq!(msg.voltage_v(), 32.0);
    assert_eq!(msg.current_a(), -0.5);
    assert_eq!(msg.power_w(), -16.0);
    assert_eq!(msg.capacity_remain_ah(), 10.0);
    assert_eq!(msg.capacity_total_ah(), 20.0);
    assert_eq!(msg.capacity_percent(), 50.0);
    assert_eq!(msg.state_of_charge_pct(), 50);
    assert_eq!(msg.cycles_count(), 42);
    assert_eq!(msg.temperature_sensor_count(), 2);
}

#[test]
fn test_decode_rejects_every_short_length() {
    let frame = reference_frame();
    for len in 0..MIN_FRAME_LEN {
        let result = BasicInfoMessage::decode(&frame[..len]);
        assert_eq!(result, Err(DecodeError::FrameTooShort { len }));
    }
}

#[test]
fn test_decode_accepts_oversized_frame() {
    let mut frame = reference_frame();
    frame.extend_from_slice(&[0x0b, 0x54, 0x0b, 0x2f, 0x77]);
    let msg = BasicInfoMessage::decode(&frame).unwrap();
    assert_eq!(msg.voltage_v(), 32.0);
    assert_eq!(msg.cycles_count(), 42);
}

#[test]
fn test_capacity_percent_is_zero_for_zero_design_capacity() {
    let mut frame = reference_frame();
    frame[10] = 0x00;
    frame[11] = 0x00;
    let msg = BasicInfoMessage::decode(&frame).unwrap();
    assert_eq!(msg.capacity_percent(), 0.0);
    assert_eq!(msg.capacity_remain_ah(), 10.0);
}

#[test]
fn test_capacity_percent_rounds_to_one_decimal() {
    let mut frame = reference_frame();
    // 1000 / 3000 = 33.333... %
    frame[10] = 0x0b;
    frame[11] = 0xb8;
    let msg = BasicInfoMessage::decode(&frame).unwrap();
    assert_eq!(msg.capacity_percent(), 33.3);
}

#[test]
fn test_decode_is_deterministic() {
    let frame = reference_frame();
    let first = BasicInfoMessage::decode(&frame).unwrap();
    let second = BasicInfoMessage::decode(&frame).unwrap();
    assert_eq!(first, second);
}
