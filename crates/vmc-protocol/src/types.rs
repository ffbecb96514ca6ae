//! Common types used in the protocol.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::*;

/// A validated channel number in `1..=80`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Channel(u8);

impl Channel {
    /// Validate a channel number.
    pub fn new(number: i64) -> ProtocolResult<Self> {
        if (MIN_CHANNEL as i64..=MAX_CHANNEL as i64).contains(&number) {
            Ok(Channel(number as u8))
        } else {
            Err(ProtocolError::ChannelOutOfRange(number))
        }
    }

    /// The channel number.
    pub fn number(&self) -> u8 {
        self.0
    }

    /// Every logical channel, in order.
    pub fn all() -> impl Iterator<Item = Channel> {
        (MIN_CHANNEL..=MAX_CHANNEL).map(Channel)
    }
}

impl TryFrom<i64> for Channel {
    type Error = ProtocolError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Channel::new(value)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Door sensor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorState {
    /// Door open.
    Open,
    /// Door closed (any data byte other than [`DOOR_OPEN`]).
    Closed,
}

impl From<u8> for DoorState {
    fn from(value: u8) -> Self {
        if value == DOOR_OPEN {
            DoorState::Open
        } else {
            DoorState::Closed
        }
    }
}

/// Thermostat direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThermoMode {
    /// Refrigerated cabinet.
    Cooling,
    /// Heated cabinet.
    Heating,
}

impl From<ThermoMode> for u8 {
    fn from(mode: ThermoMode) -> Self {
        match mode {
            ThermoMode::Cooling => SWITCH_OFF,
            ThermoMode::Heating => SWITCH_ON,
        }
    }
}

/// Interpret a data byte as a two's-complement temperature in °C.
pub fn temperature_from_byte(data: u8) -> i16 {
    if data >= 0x80 {
        data as i16 - 0x100
    } else {
        data as i16
    }
}

/// Encode a signed value as the board's parameter byte (masked to 8 bits).
pub fn signed_to_byte(value: i16) -> u8 {
    (value & 0xFF) as u8
}

pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_bounds() {
        assert!(Channel::new(0).is_err());
        assert_eq!(Channel::new(1).map(|c| c.number()), Ok(1));
        assert_eq!(Channel::new(80).map(|c| c.number()), Ok(80));
        assert_eq!(Channel::new(81), Err(ProtocolError::ChannelOutOfRange(81)));
        assert_eq!(Channel::new(-3), Err(ProtocolError::ChannelOutOfRange(-3)));
        assert_eq!(Channel::all().count(), 80);
    }

    #[test]
    fn test_temperature_sign_conversion() {
        assert_eq!(temperature_from_byte(0xFF), -1);
        assert_eq!(temperature_from_byte(0x19), 25);
        assert_eq!(temperature_from_byte(0x80), -128);
        assert_eq!(temperature_from_byte(0x7F), 127);
    }

    #[test]
    fn test_signed_to_byte() {
        assert_eq!(signed_to_byte(-1), 0xFF);
        assert_eq!(signed_to_byte(-18), 0xEE);
        assert_eq!(signed_to_byte(4), 0x04);
        assert_eq!(temperature_from_byte(signed_to_byte(-18)), -18);
    }

    #[test]
    fn test_door_state() {
        assert_eq!(DoorState::from(0x01), DoorState::Open);
        assert_eq!(DoorState::from(0x00), DoorState::Closed);
        assert_eq!(DoorState::from(0x02), DoorState::Closed);
    }
}
