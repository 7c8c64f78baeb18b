//! Per-channel parameter discovery.
//!
//! The vendor reports, for each (slot, channel), a count of parameters and a
//! packed buffer of fixed-width identifiers; a second call per identifier
//! resolves its type tag. The walk covers the full reported count; the
//! count is the only part of the buffer contract the vendor guarantees, and
//! `parameter_count_matches_vendor_report` in the integration suite pins it.

use serde::Serialize;
use tracing::warn;

use caenhv_sys::MAX_PARAM_NAME;

use crate::error::{HvpsError, Result};
use crate::framed::{fixed_str, FramedSlice};
use crate::session::Session;

/// Vendor-declared classification of a parameter's value encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Numeric,
    OnOff,
    ChStatus,
    BdStatus,
    Binary,
    Text,
    Enum,
}

impl ParamType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            caenhv_sys::PARAM_TYPE_NUMERIC => Some(Self::Numeric),
            caenhv_sys::PARAM_TYPE_ONOFF => Some(Self::OnOff),
            caenhv_sys::PARAM_TYPE_CHSTATUS => Some(Self::ChStatus),
            caenhv_sys::PARAM_TYPE_BDSTATUS => Some(Self::BdStatus),
            caenhv_sys::PARAM_TYPE_BINARY => Some(Self::Binary),
            caenhv_sys::PARAM_TYPE_STRING => Some(Self::Text),
            caenhv_sys::PARAM_TYPE_ENUM => Some(Self::Enum),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::OnOff => "onoff",
            Self::ChStatus => "chstatus",
            Self::BdStatus => "bdstatus",
            Self::Binary => "binary",
            Self::Text => "string",
            Self::Enum => "enum",
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discovered parameter: its identifier (at most 10 bytes on the wire)
/// and how its value is encoded. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamDescriptor {
    pub name: String,
    pub kind: ParamType,
}

impl ParamDescriptor {
    pub fn new(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Shorthand for the common case of a numeric setpoint.
    pub fn numeric(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Numeric)
    }
}

/// Discover every parameter a channel exposes.
pub fn list_parameters(session: &Session, slot: u16, channel: u16) -> Result<Vec<ParamDescriptor>> {
    let raw = session.api().ch_param_info(session.handle(), slot, channel)?;
    let frames = FramedSlice::new(&raw.bytes, MAX_PARAM_NAME, raw.count)?;

    let mut descriptors = Vec::with_capacity(frames.len());
    for frame in frames.iter() {
        let name = fixed_str(frame)?;
        if name.is_empty() {
            return Err(HvpsError::DecodeAnomaly {
                what: format!("empty identifier in parameter list of slot {slot} ch {channel}"),
            });
        }

        let kind = match session
            .api()
            .ch_param_type(session.handle(), slot, channel, name)?
        {
            Some(tag) => ParamType::from_raw(tag).ok_or_else(|| HvpsError::DecodeAnomaly {
                what: format!("parameter '{name}' reports unknown type tag {tag}"),
            })?,
            None => {
                // Observed vendor quirk: some parameters never fill the
                // "Type" out-cell. They behave as plain numerics.
                warn!(slot, channel, param = %name, "no type tag reported, defaulting to numeric");
                ParamType::Numeric
            }
        };

        descriptors.push(ParamDescriptor::new(name, kind));
    }
    Ok(descriptors)
}
