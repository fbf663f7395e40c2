//! Translation of configured pins into the reader's canonical numbering

use crate::error::InvalidPinError;
use dht_sens_types::{PinScheme, PinTableEntry, PIN_TABLE};

/// Find the header row holding `pin` in the given scheme
pub fn lookup(scheme: PinScheme, pin: u32) -> Option<&'static PinTableEntry> {
    PIN_TABLE
        .iter()
        .find(|row| row.get(scheme).map(u32::from) == Some(pin))
}

/// Resolve a configured pin to the canonical (WiringPi) pin number
pub fn resolve(scheme: PinScheme, pin: Option<u32>) -> Result<u8, InvalidPinError> {
    let pin = pin.ok_or(InvalidPinError::Missing)?;
    lookup(scheme, pin)
        .map(PinTableEntry::canonical)
        .ok_or(InvalidPinError::NotFound { scheme, pin })
}
