//! Crate topology discovery and full-crate enumeration.
//!
//! Topology is read fresh on every query: hardware layout can only be
//! trusted at query time, so nothing here is cached.

use serde::Serialize;
use tracing::debug;

use caenhv_sys::MAX_CH_NAME;

use crate::catalog::{self, ParamDescriptor};
use crate::error::{HvpsError, Result};
use crate::framed::{fixed_str, FramedSlice};
use crate::marshal::{self, ParamValue};
use crate::session::Session;

/// Firmware release range reported for one board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FirmwareRange {
    pub min: u8,
    pub max: u8,
}

impl std::fmt::Display for FirmwareRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.max, self.min)
    }
}

/// What the crate map call reports: slot count, channel count and board
/// identity per slot.
#[derive(Debug, Clone, Serialize)]
pub struct CrateTopology {
    pub slots: u16,
    pub channels_per_slot: Vec<u16>,
    pub models: Vec<String>,
    pub descriptions: Vec<String>,
    pub serial_numbers: Vec<u16>,
    pub firmware: Vec<FirmwareRange>,
}

/// Everything known about one channel at one instant: identity plus every
/// discovered parameter with its value. Assembled fresh per query, never
/// persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelInfo {
    pub slot: u16,
    pub channel: u16,
    pub name: String,
    pub params: Vec<(ParamDescriptor, ParamValue)>,
}

/// Split a packed run of `n` consecutive NUL-terminated strings.
fn split_zstrings(bytes: &[u8], n: usize) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(n);
    let mut rest = bytes;
    for i in 0..n {
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| HvpsError::DecodeAnomaly {
                what: format!("crate map string list ends after {i} of {n} entries"),
            })?;
        let text = std::str::from_utf8(&rest[..end]).map_err(|e| HvpsError::DecodeAnomaly {
            what: format!("crate map string {i} is not valid UTF-8: {e}"),
        })?;
        out.push(text.to_string());
        rest = &rest[end + 1..];
    }
    Ok(out)
}

/// Read the crate map: slot count, channels per slot, board identities.
pub fn crate_info(session: &Session) -> Result<CrateTopology> {
    let raw = session.api().crate_map(session.handle())?;
    let n = raw.slots as usize;

    if raw.channels_per_slot.len() != n
        || raw.serial_numbers.len() != n
        || raw.fw_min.len() != n
        || raw.fw_max.len() != n
    {
        return Err(HvpsError::DecodeAnomaly {
            what: format!("crate map lists do not all carry {n} entries"),
        });
    }

    Ok(CrateTopology {
        slots: raw.slots,
        channels_per_slot: raw.channels_per_slot,
        models: split_zstrings(&raw.model_bytes, n)?,
        descriptions: split_zstrings(&raw.description_bytes, n)?,
        serial_numbers: raw.serial_numbers,
        firmware: raw
            .fw_min
            .iter()
            .zip(&raw.fw_max)
            .map(|(&min, &max)| FirmwareRange { min, max })
            .collect(),
    })
}

/// Read the names of the given channels on one slot.
pub fn channel_names(session: &Session, slot: u16, channels: &[u16]) -> Result<Vec<String>> {
    let raw = session.api().ch_names(session.handle(), slot, channels)?;
    let frames = FramedSlice::new(&raw.bytes, MAX_CH_NAME, raw.count)?;
    let mut names = Vec::with_capacity(frames.len());
    for frame in frames.iter() {
        names.push(fixed_str(frame)?.to_string());
    }
    Ok(names)
}

/// Assemble the full picture of one channel: name plus every parameter value.
pub fn channel_info(session: &Session, slot: u16, channel: u16) -> Result<ChannelInfo> {
    let name = channel_names(session, slot, &[channel])?
        .into_iter()
        .next()
        .unwrap_or_default();

    let descriptors = catalog::list_parameters(session, slot, channel)?;
    let mut params = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let value = marshal::read_parameter(session, slot, channel, &descriptor)?;
        params.push((descriptor, value));
    }

    Ok(ChannelInfo {
        slot,
        channel,
        name,
        params,
    })
}

/// Walk every slot and channel of the crate.
///
/// This is O(slots x channels x parameters) vendor calls. The library
/// offers no batching, so a full-crate snapshot takes seconds on a large
/// crate, not milliseconds.
pub fn enumerate_all_channels(session: &Session) -> Result<Vec<ChannelInfo>> {
    let topology = crate_info(session)?;
    debug!(
        slots = topology.slots,
        "enumerating all channels, this is latency-bound on crate size"
    );

    let mut channels = Vec::new();
    for slot in 0..topology.slots {
        let count = topology.channels_per_slot[slot as usize];
        for channel in 0..count {
            channels.push(channel_info(session, slot, channel)?);
        }
    }
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_packed_string_runs() {
        let bytes = b"A1833\0A1832\0";
        let strings = split_zstrings(bytes, 2).unwrap();
        assert_eq!(strings, vec!["A1833".to_string(), "A1832".to_string()]);
    }

    #[test]
    fn short_string_run_is_an_anomaly() {
        let bytes = b"A1833\0A18";
        assert!(matches!(
            split_zstrings(bytes, 2),
            Err(HvpsError::DecodeAnomaly { .. })
        ));
    }

    #[test]
    fn firmware_range_renders_max_dot_min() {
        let fw = FirmwareRange { min: 2, max: 13 };
        assert_eq!(fw.to_string(), "13.2");
    }
}
