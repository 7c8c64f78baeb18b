//! Reading and writing single parameter values.
//!
//! A read hands back the raw bytes the vendor wrote, reinterpreted according
//! to the descriptor's type tag into the closed [`ParamValue`] enum; nothing
//! downstream ever touches an undecoded buffer, and nothing is cached across
//! calls because hardware state can change between reads.
//!
//! Writes are the inverse with a vendor twist: the set call accepts only a
//! 32-bit float regardless of the parameter's logical type, so integer-coded
//! parameters are coerced on the way out and their declared type is used to
//! decode the value on the next read.

use serde::Serialize;
use tracing::debug;

use crate::catalog::{ParamDescriptor, ParamType};
use crate::error::{HvpsError, Result};
use crate::session::Session;
use crate::vendor::RawWord;

/// Well-known channel parameter names.
pub const VSET: &str = "VSet";
pub const ISET: &str = "ISet";
pub const RAMP_UP: &str = "RUp";
pub const RAMP_DOWN: &str = "RDwn";
pub const POWER: &str = "Pw";
pub const STATUS: &str = "Status";

/// Parameters whose logical value is an integer even though the vendor set
/// call only accepts floats.
pub const INT_CODED: [&str; 5] = ["Pon", "Pw", "PDwn", "TripInt", "TripExt"];

/// Whether a parameter takes integer values on the wire.
pub fn is_int_coded(name: &str) -> bool {
    INT_CODED.contains(&name)
}

/// A decoded parameter value. The variant is selected by the descriptor's
/// type tag at the marshaling boundary; downstream code matches exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ParamValue {
    Numeric(f32),
    OnOff(u32),
    ChStatus(u32),
    BdStatus(u32),
    Binary(u32),
    Text(String),
    Enum(u32),
}

impl ParamValue {
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bitmask(&self) -> Option<u32> {
        match self {
            Self::OnOff(v) | Self::ChStatus(v) | Self::BdStatus(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "{v}"),
            Self::OnOff(v) | Self::ChStatus(v) | Self::BdStatus(v) | Self::Binary(v) => {
                write!(f, "{v}")
            }
            Self::Text(s) => f.write_str(s),
            Self::Enum(v) => write!(f, "{v}"),
        }
    }
}

/// Reinterpret a raw value word according to the declared type tag.
fn decode_word(descriptor: &ParamDescriptor, word: &RawWord) -> Result<ParamValue> {
    let quad = word.quad();
    Ok(match descriptor.kind {
        ParamType::Numeric => ParamValue::Numeric(f32::from_ne_bytes(quad)),
        ParamType::OnOff => ParamValue::OnOff(u32::from_ne_bytes(quad)),
        ParamType::ChStatus => ParamValue::ChStatus(u32::from_ne_bytes(quad)),
        ParamType::BdStatus => ParamValue::BdStatus(u32::from_ne_bytes(quad)),
        ParamType::Binary => ParamValue::Binary(u32::from_ne_bytes(quad)),
        ParamType::Enum => ParamValue::Enum(u32::from_ne_bytes(quad)),
        ParamType::Text => {
            let bytes = &word.bytes;
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            let text =
                std::str::from_utf8(&bytes[..end]).map_err(|e| HvpsError::DecodeAnomaly {
                    what: format!(
                        "string parameter '{}' is not valid UTF-8: {e}",
                        descriptor.name
                    ),
                })?;
            ParamValue::Text(text.to_string())
        }
    })
}

/// Read one parameter's current value.
pub fn read_parameter(
    session: &Session,
    slot: u16,
    channel: u16,
    descriptor: &ParamDescriptor,
) -> Result<ParamValue> {
    let word = session
        .api()
        .get_ch_param(session.handle(), slot, channel, &descriptor.name)?;
    decode_word(descriptor, &word)
}

/// Write one parameter.
///
/// Callers pass the value as a float; integer-coded parameters should be
/// validated with [`is_int_coded`] before getting here.
pub fn write_parameter(
    session: &Session,
    slot: u16,
    channel: u16,
    name: &str,
    value: f32,
) -> Result<()> {
    debug!(slot, channel, param = name, value, "writing channel parameter");
    session
        .api()
        .set_ch_param(session.handle(), slot, channel, name, value)
}

/// Rename a channel.
///
/// Kept for API completeness: on this hardware family the call reports
/// success but the name does not stick. Control logic must not depend on the
/// rename taking effect.
pub fn set_channel_name(session: &Session, slot: u16, channel: u16, name: &str) -> Result<()> {
    debug!(slot, channel, name, "setting channel name (often ineffective on this family)");
    session
        .api()
        .set_ch_name(session.handle(), slot, channel, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::RawWord;

    #[test]
    fn numeric_word_decodes_as_f32() {
        let desc = ParamDescriptor::numeric(VSET);
        let value = decode_word(&desc, &RawWord::from_f32(1500.5)).unwrap();
        assert_eq!(value, ParamValue::Numeric(1500.5));
    }

    #[test]
    fn status_word_decodes_as_bitmask() {
        let desc = ParamDescriptor::new(STATUS, ParamType::ChStatus);
        let value = decode_word(&desc, &RawWord::from_u32(0b101)).unwrap();
        assert_eq!(value.as_bitmask(), Some(0b101));
    }

    #[test]
    fn text_word_decodes_to_first_nul() {
        let desc = ParamDescriptor::new("HVMax", ParamType::Text);
        let value = decode_word(&desc, &RawWord::from_text("3015V")).unwrap();
        assert_eq!(value, ParamValue::Text("3015V".to_string()));
    }

    #[test]
    fn int_coded_set_is_closed() {
        assert!(is_int_coded("Pw"));
        assert!(is_int_coded("TripExt"));
        assert!(!is_int_coded("VSet"));
        assert!(!is_int_coded("RUp"));
    }
}
