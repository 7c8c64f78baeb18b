//! Channel status decoding and presentation.
//!
//! The `Status` parameter is a bitmask with one condition per bit position.
//! Decoding is a pure bit-position mapping; the presentation layer is a
//! read-only projection of a [`ChannelInfo`] that expands the status flags
//! and keeps them out of the generic name/value listing.

use bitflags::bitflags;
use serde::Serialize;

use crate::marshal::{ParamValue, STATUS};
use crate::topology::ChannelInfo;

bitflags! {
    /// Decoded channel status conditions. Bit 12 is unassigned on this
    /// hardware family.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChannelStatus: u32 {
        const ON = 1 << 0;
        const RAMP_UP = 1 << 1;
        const RAMP_DOWN = 1 << 2;
        const OVER_CURRENT = 1 << 3;
        const OVER_VOLTAGE = 1 << 4;
        const UNDER_VOLTAGE = 1 << 5;
        const EXT_TRIP = 1 << 6;
        const MAX_V = 1 << 7;
        const EXT_DISABLE = 1 << 8;
        const INT_TRIP = 1 << 9;
        const INHIBIT = 1 << 10;
        const UNPLUGGED = 1 << 11;
        const OVP = 1 << 13;
        const POWER_FAIL = 1 << 14;
        const TEMP_ERROR = 1 << 15;
    }
}

/// Decode a raw status bitmask. Unassigned bits are dropped.
pub fn decode_status(raw: u32) -> ChannelStatus {
    ChannelStatus::from_bits_truncate(raw)
}

/// Comma-joined names of every set flag; `"Off"` when none are set.
pub fn summarize(flags: ChannelStatus) -> String {
    if flags.is_empty() {
        return "Off".to_string();
    }
    flags
        .iter_names()
        .map(|(name, _)| name.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(",")
}

/// Presentation-ready view of one channel: generic parameter/value pairs
/// plus the expanded status summary.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub slot: u16,
    pub channel: u16,
    pub name: String,
    pub values: Vec<(String, String)>,
    pub status: String,
}

/// Project a [`ChannelInfo`] into its operator-facing form.
///
/// The special `Status` parameter is expanded into flag names and excluded
/// from the plain listing; every other parameter is rendered as-is.
pub fn channel_report(info: &ChannelInfo) -> ChannelReport {
    let mut values = Vec::with_capacity(info.params.len());
    let mut status = summarize(ChannelStatus::empty());

    for (descriptor, value) in &info.params {
        if descriptor.name == STATUS {
            if let ParamValue::ChStatus(raw) = value {
                status = summarize(decode_status(*raw));
            }
            continue;
        }
        values.push((descriptor.name.clone(), value.to_string()));
    }

    ChannelReport {
        slot: info.slot,
        channel: info.channel,
        name: info.name.clone(),
        values,
        status,
    }
}

impl std::fmt::Display for ChannelReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Slot: {} | Channel Name: {} | Channel#: {}",
            self.slot, self.name, self.channel
        )?;
        for (name, value) in &self.values {
            write!(f, " | {name} : {value}")?;
        }
        write!(f, " | Status : {}", self.status)
    }
}
