//! Channel-bias control policy.
//!
//! The only layer allowed to energize a channel. Every request runs through
//! the same sequence of states: `Idle -> Validating -> AwaitingConfirmation
//! -> Applying -> Done`, with `Rejected` as the exit for every expected
//! refusal. Validation happens before any vendor write; once Applying has
//! started, a vendor failure aborts the remaining steps and partial
//! application is accepted as a known risk of the hardware API; retrying
//! could double-apply a half-written ramp configuration.

use std::time::Duration;

use tracing::{debug, info};

use crate::catalog::ParamDescriptor;
use crate::config::{ChannelConfig, DeviceSettings};
use crate::error::{BiasRejection, HvpsError, Result};
use crate::marshal::{self, ISET, POWER, RAMP_DOWN, RAMP_UP, VSET};
use crate::session::Session;
use crate::status::channel_report;
use crate::status::ChannelReport;
use crate::topology;

/// Wait between the safety-parameter writes and the voltage-set call, so the
/// device registers the new ramp configuration before voltage starts moving.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Control-flow states of one bias/unbias request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Validating,
    AwaitingConfirmation,
    Applying,
    Done,
    Rejected,
}

/// What an operator must see before a voltage change is carried out.
#[derive(Debug, Clone)]
pub struct ConfirmRequest {
    pub action: &'static str,
    pub channel: u16,
    pub detector: String,
    pub channel_limit: f32,
    pub ramp_rate: f32,
    pub current_voltage: f32,
    pub requested_voltage: f32,
}

/// The blocking yes/no decision gate in front of every voltage change.
///
/// There is no cancellation mechanism once Applying starts; declining here
/// is the only way to abort.
pub trait Confirm {
    fn confirm(&self, request: &ConfirmRequest) -> bool;
}

/// Canned answer, used for `--force` and in tests.
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm(&self, _request: &ConfirmRequest) -> bool {
        self.0
    }
}

/// Result of a carried-out bias or unbias.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiasReport {
    pub channel: u16,
    pub previous: f32,
    pub target: f32,
    pub ramp_rate: f32,
}

/// The effective ramp rate is never allowed above the crate ceiling.
pub fn effective_ramp_rate(channel_rate: f32, crate_max: f32) -> f32 {
    channel_rate.min(crate_max)
}

/// Bias policy for the channels of one crate.
pub struct BiasController<'a> {
    session: &'a Session,
    device: &'a DeviceSettings,
    slot: u16,
    settle: Duration,
}

impl<'a> BiasController<'a> {
    pub fn new(session: &'a Session, device: &'a DeviceSettings, slot: u16) -> Self {
        Self {
            session,
            device,
            slot,
            settle: SETTLE_DELAY,
        }
    }

    /// Override the settle delay. The delay is a hardware settling
    /// requirement; shortening it is for tests only.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    fn enter(&self, channel: u16, phase: Phase) {
        debug!(channel, phase = ?phase, "bias controller");
    }

    fn config_entry(&self, channel: u16) -> Result<&'a ChannelConfig> {
        self.device
            .channel(channel)
            .ok_or_else(|| BiasRejection::MissingChannelConfig { channel }.into())
    }

    fn read_vset(&self, channel: u16) -> Result<f32> {
        let descriptor = ParamDescriptor::numeric(VSET);
        marshal::read_parameter(self.session, self.slot, channel, &descriptor)?
            .as_f32()
            .ok_or_else(|| HvpsError::DecodeAnomaly {
                what: format!("{VSET} on channel {channel} did not decode as numeric"),
            })
    }

    /// Drive a channel to `requested` volts (or its configured maximum when
    /// no explicit voltage is given).
    ///
    /// Validation order: channel ceiling, crate ceiling, already-at-target.
    /// The write sequence is fixed: ramp-up, ramp-down, idle current,
    /// settle, enable, voltage. Each step must fully complete; the first
    /// vendor failure aborts the rest.
    pub fn bias(
        &self,
        channel: u16,
        requested: Option<f32>,
        gate: &dyn Confirm,
    ) -> Result<BiasReport> {
        self.enter(channel, Phase::Idle);
        let entry = self.config_entry(channel)?;
        let requested = requested.unwrap_or(entry.max_bias_voltage);

        self.enter(channel, Phase::Validating);
        if requested > entry.max_bias_voltage {
            self.enter(channel, Phase::Rejected);
            return Err(BiasRejection::VoltageExceedsChannelLimit {
                requested,
                limit: entry.max_bias_voltage,
            }
            .into());
        }
        if requested > self.device.max_bias_voltage {
            self.enter(channel, Phase::Rejected);
            return Err(BiasRejection::VoltageExceedsCrateLimit {
                requested,
                limit: self.device.max_bias_voltage,
            }
            .into());
        }

        let current = self.read_vset(channel)?;
        // Setpoints round-trip bit-exact through the 32-bit vendor float.
        if current == requested {
            self.enter(channel, Phase::Rejected);
            return Err(BiasRejection::AlreadyAtTarget {
                channel,
                voltage: current,
            }
            .into());
        }

        let ramp_rate = effective_ramp_rate(entry.ramp_rate, self.device.max_ramp_rate);

        self.enter(channel, Phase::AwaitingConfirmation);
        let request = ConfirmRequest {
            action: "BIAS",
            channel,
            detector: entry.detector.clone(),
            channel_limit: entry.max_bias_voltage,
            ramp_rate,
            current_voltage: current,
            requested_voltage: requested,
        };
        if !gate.confirm(&request) {
            self.enter(channel, Phase::Rejected);
            return Err(BiasRejection::UserDeclined.into());
        }

        self.enter(channel, Phase::Applying);
        let idle_current = entry.idle_current.unwrap_or(self.device.idle_current);
        self.write(channel, RAMP_UP, ramp_rate)?;
        self.write(channel, RAMP_DOWN, ramp_rate)?;
        self.write(channel, ISET, idle_current)?;

        // Real wall-clock block: the device needs it to register the ramp
        // configuration before the voltage starts moving.
        std::thread::sleep(self.settle);

        self.write(channel, POWER, 1.0)?;
        self.write(channel, VSET, requested)?;

        self.enter(channel, Phase::Done);
        info!(
            channel,
            detector = %entry.detector,
            from = current,
            to = requested,
            ramp_rate,
            "channel biased"
        );
        Ok(BiasReport {
            channel,
            previous: current,
            target: requested,
            ramp_rate,
        })
    }

    /// Ramp a channel down to 0 V.
    ///
    /// The channel stays enabled: ramp-down is used instead of a hard
    /// power-off to avoid an abrupt voltage collapse.
    pub fn unbias(&self, channel: u16, gate: &dyn Confirm) -> Result<BiasReport> {
        self.enter(channel, Phase::Idle);
        let entry = self.config_entry(channel)?;

        self.enter(channel, Phase::Validating);
        let current = self.read_vset(channel)?;
        let ramp_rate = effective_ramp_rate(entry.ramp_rate, self.device.max_ramp_rate);

        self.enter(channel, Phase::AwaitingConfirmation);
        let request = ConfirmRequest {
            action: "UNBIAS",
            channel,
            detector: entry.detector.clone(),
            channel_limit: entry.max_bias_voltage,
            ramp_rate,
            current_voltage: current,
            requested_voltage: 0.0,
        };
        if !gate.confirm(&request) {
            self.enter(channel, Phase::Rejected);
            return Err(BiasRejection::UserDeclined.into());
        }

        self.enter(channel, Phase::Applying);
        self.write(channel, RAMP_DOWN, ramp_rate)?;
        self.write(channel, VSET, 0.0)?;

        self.enter(channel, Phase::Done);
        info!(channel, detector = %entry.detector, from = current, ramp_rate, "channel unbiased");
        Ok(BiasReport {
            channel,
            previous: current,
            target: 0.0,
            ramp_rate,
        })
    }

    fn write(&self, channel: u16, param: &str, value: f32) -> Result<()> {
        marshal::write_parameter(self.session, self.slot, channel, param, value)
    }
}

/// Read-only status of one channel. Bypasses the state machine entirely.
pub fn status_one(session: &Session, slot: u16, channel: u16) -> Result<ChannelReport> {
    let info = topology::channel_info(session, slot, channel)?;
    Ok(channel_report(&info))
}

/// Read-only status of every channel in the crate.
pub fn status_all(session: &Session) -> Result<Vec<ChannelReport>> {
    let channels = topology::enumerate_all_channels(session)?;
    Ok(channels.iter().map(channel_report).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_rate_is_capped_by_crate_ceiling() {
        assert_eq!(effective_ramp_rate(50.0, 10.0), 10.0);
        assert_eq!(effective_ramp_rate(5.0, 10.0), 5.0);
    }
}
