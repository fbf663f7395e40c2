//! Pin numbering schemes and the 40-pin header table.
//!
//! The reader program expects WiringPi numbers. Users may configure the pin
//! in any of the four schemes below; the table maps every GPIO-capable
//! header position across all of them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pin numbering scheme
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum PinScheme {
    /// Physical header position
    #[serde(rename = "BOARD")]
    Board,
    /// Broadcom numbering on revision 1 boards (26-pin header)
    #[serde(rename = "BCMv1")]
    BcmV1,
    /// Broadcom numbering on revision 2 and later boards
    #[serde(rename = "BCMv2")]
    #[default]
    BcmV2,
    /// WiringPi numbering, the canonical scheme
    #[serde(rename = "WPI")]
    Wpi,
}

impl PinScheme {
    pub const ALL: [PinScheme; 4] = [
        PinScheme::Board,
        PinScheme::BcmV1,
        PinScheme::BcmV2,
        PinScheme::Wpi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PinScheme::Board => "BOARD",
            PinScheme::BcmV1 => "BCMv1",
            PinScheme::BcmV2 => "BCMv2",
            PinScheme::Wpi => "WPI",
        }
    }
}

impl fmt::Display for PinScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One GPIO-capable header position expressed in every scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinTableEntry {
    pub board: u8,
    /// Absent for positions that only exist on the 40-pin header
    pub bcm_v1: Option<u8>,
    pub bcm_v2: u8,
    pub wpi: u8,
}

impl PinTableEntry {
    const fn new(board: u8, bcm_v1: Option<u8>, bcm_v2: u8, wpi: u8) -> Self {
        Self {
            board,
            bcm_v1,
            bcm_v2,
            wpi,
        }
    }

    /// Pin number of this row in the given scheme
    pub fn get(&self, scheme: PinScheme) -> Option<u8> {
        match scheme {
            PinScheme::Board => Some(self.board),
            PinScheme::BcmV1 => self.bcm_v1,
            PinScheme::BcmV2 => Some(self.bcm_v2),
            PinScheme::Wpi => Some(self.wpi),
        }
    }

    /// Canonical pin number handed to the reader program
    pub fn canonical(&self) -> u8 {
        self.wpi
    }
}

/// Number of rows in [`PIN_TABLE`]
pub const PIN_TABLE_LEN: usize = 26;

/// Static header table, one row per GPIO-capable physical pin
pub const PIN_TABLE: [PinTableEntry; PIN_TABLE_LEN] = [
    PinTableEntry::new(10, Some(15), 15, 16),
    PinTableEntry::new(11, Some(17), 17, 0),
    PinTableEntry::new(12, Some(18), 18, 1),
    PinTableEntry::new(13, Some(21), 27, 2),
    PinTableEntry::new(15, Some(22), 22, 3),
    PinTableEntry::new(16, Some(23), 23, 4),
    PinTableEntry::new(18, Some(24), 24, 5),
    PinTableEntry::new(19, Some(10), 10, 12),
    PinTableEntry::new(21, Some(9), 9, 13),
    PinTableEntry::new(22, Some(25), 25, 6),
    PinTableEntry::new(23, Some(11), 11, 14),
    PinTableEntry::new(24, Some(8), 8, 10),
    PinTableEntry::new(26, Some(7), 7, 11),
    PinTableEntry::new(29, None, 5, 21),
    PinTableEntry::new(3, Some(0), 2, 8),
    PinTableEntry::new(31, None, 6, 22),
    PinTableEntry::new(32, None, 12, 26),
    PinTableEntry::new(33, None, 13, 23),
    PinTableEntry::new(35, None, 19, 24),
    PinTableEntry::new(36, None, 16, 27),
    PinTableEntry::new(37, None, 26, 25),
    PinTableEntry::new(38, None, 20, 28),
    PinTableEntry::new(40, None, 21, 29),
    PinTableEntry::new(5, Some(1), 3, 9),
    PinTableEntry::new(7, Some(4), 4, 7),
    PinTableEntry::new(8, Some(14), 14, 15),
];
