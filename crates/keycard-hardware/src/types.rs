//! Common types for indicator and presence devices.

use keycard_core::Identifier;
use serde::{Deserialize, Serialize};

/// Indicator LED color.
///
/// `Amber` is the lookup indication shown on every card arrival, `Green`
/// grants access and `Red` denies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedColor {
    /// LED off.
    Off,

    /// Red LED.
    Red,

    /// Green LED.
    Green,

    /// Amber LED.
    Amber,
}

impl LedColor {
    /// Get the RGB components of the LED color.
    pub fn as_rgb(&self) -> (u8, u8, u8) {
        match self {
            Self::Off => (0, 0, 0),
            Self::Red => (255, 0, 0),
            Self::Green => (0, 255, 0),
            Self::Amber => (255, 191, 0),
        }
    }

    pub fn is_off(&self) -> bool {
        matches!(self, Self::Off)
    }
}

/// Drive mode of a single board lamp.
///
/// The discriminants are the mode codes understood by the board's
/// `ledcontrol.sh` script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LampMode {
    /// Fade in and stay lit.
    On = 2,

    /// Fade out.
    Off = 3,

    /// Blink continuously.
    Blink = 10,
}

impl LampMode {
    /// Numeric mode code passed to the lamp script.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// A tag seen by a presence source, already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagData {
    /// Canonical identifier of the tag.
    pub id: Identifier,
}

impl TagData {
    pub fn new(id: Identifier) -> Self {
        Self { id }
    }

    /// Build tag data from raw UID bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the UID is empty or too long to be an identifier.
    pub fn from_uid(uid: &[u8]) -> crate::Result<Self> {
        let id = Identifier::from_bytes(uid)
            .map_err(|err| crate::HardwareError::invalid_data(err.to_string()))?;
        Ok(Self::new(id))
    }
}

/// What a presence source reports.
///
/// Event-driven sources report explicit arrivals and departures. Polling
/// sources report the full set of tags currently in the field and leave it
/// to the session tracker to derive arrivals and departures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// A tag entered the field.
    Arrived(TagData),

    /// The tag in the field left.
    Departed,

    /// Tags visible at one polling instant.
    Snapshot(Vec<TagData>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_led_color_rgb() {
        assert_eq!(LedColor::Red.as_rgb(), (255, 0, 0));
        assert_eq!(LedColor::Green.as_rgb(), (0, 255, 0));
        assert_eq!(LedColor::Amber.as_rgb(), (255, 191, 0));
        assert_eq!(LedColor::Off.as_rgb(), (0, 0, 0));
    }

    #[test]
    fn test_led_color_off() {
        assert!(LedColor::Off.is_off());
        assert!(!LedColor::Red.is_off());
        assert!(!LedColor::Amber.is_off());
    }

    #[test]
    fn test_led_color_serialization() {
        let json = serde_json::to_string(&LedColor::Amber).unwrap();
        assert_eq!(json, "\"amber\"");
        let deserialized: LedColor = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, LedColor::Amber);
    }

    #[test]
    fn test_lamp_mode_codes() {
        assert_eq!(LampMode::On.code(), 2);
        assert_eq!(LampMode::Off.code(), 3);
        assert_eq!(LampMode::Blink.code(), 10);
    }

    #[test]
    fn test_tag_data_from_uid() {
        let tag = TagData::from_uid(&[0x04, 0xab, 0xcd, 0xef]).unwrap();
        assert_eq!(tag.id.as_str(), "04ABCDEF");
    }

    #[test]
    fn test_tag_data_rejects_empty_uid() {
        assert!(TagData::from_uid(&[]).is_err());
    }
}
