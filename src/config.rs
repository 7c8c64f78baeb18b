//! Configuration management.
//!
//! Settings are loaded once per invocation from a TOML file and passed
//! explicitly to the control logic; there is no process-wide mutable state.
//!
//! ```toml
//! log_level = "info"
//! default_slot = 0
//!
//! [devices.SY4527]
//! system_type = "sy4527"
//! link_type = "tcpip"
//! hostname = "192.168.1.210"
//! username = "admin"
//! password = "admin"
//! max_bias_voltage = 3000.0
//! max_ramp_rate = 10.0
//!
//! [[devices.SY4527.channels]]
//! number = 0
//! detector = "HPGe-01"
//! max_bias_voltage = 2500.0
//! ramp_rate = 5.0
//! ```

use std::collections::HashMap;
use std::path::Path;

use config::Config;
use serde::Deserialize;

use crate::error::{HvpsError, Result};
use crate::vendor::{LinkType, SystemType};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub default_slot: u16,
    pub mqtt: Option<MqttSettings>,
    pub devices: HashMap<String, DeviceSettings>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MqttSettings {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_mqtt_topic")]
    pub topic: String,
}

/// One configured HVPS crate, including its crate-wide safety ceilings.
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceSettings {
    pub system_type: SystemType,
    pub link_type: LinkType,
    pub hostname: String,
    pub username: String,
    pub password: String,
    /// Crate-wide bias ceiling; no channel may be driven above this.
    pub max_bias_voltage: f32,
    /// Crate-wide ramp-rate ceiling in V/s.
    pub max_ramp_rate: f32,
    /// Current limit applied while a channel is being biased.
    #[serde(default)]
    pub idle_current: f32,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

/// Per-channel entry. A channel without an enabled entry cannot be biased.
#[derive(Debug, Deserialize, Clone)]
pub struct ChannelConfig {
    pub number: u16,
    pub detector: String,
    pub max_bias_voltage: f32,
    pub ramp_rate: f32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub idle_current: Option<f32>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_mqtt_topic() -> String {
    "hvps/status".to_string()
}

fn default_true() -> bool {
    true
}

impl DeviceSettings {
    /// The enabled configuration entry for a channel, if any.
    pub fn channel(&self, number: u16) -> Option<&ChannelConfig> {
        self.channels
            .iter()
            .find(|ch| ch.number == number && ch.enabled)
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.devices.is_empty() {
            return Err(HvpsError::InvalidConfig(
                "no [devices.<name>] section found".to_string(),
            ));
        }
        for (name, device) in &self.devices {
            if device.max_bias_voltage <= 0.0 {
                return Err(HvpsError::InvalidConfig(format!(
                    "device '{name}': max_bias_voltage must be positive"
                )));
            }
            if device.max_ramp_rate <= 0.0 {
                return Err(HvpsError::InvalidConfig(format!(
                    "device '{name}': max_ramp_rate must be positive"
                )));
            }
            let mut seen = std::collections::HashSet::new();
            for ch in &device.channels {
                if !seen.insert(ch.number) {
                    return Err(HvpsError::InvalidConfig(format!(
                        "device '{name}': duplicate entry for channel {}",
                        ch.number
                    )));
                }
                if ch.ramp_rate <= 0.0 {
                    return Err(HvpsError::InvalidConfig(format!(
                        "device '{name}' channel {}: ramp_rate must be positive",
                        ch.number
                    )));
                }
                if ch.max_bias_voltage <= 0.0 {
                    return Err(HvpsError::InvalidConfig(format!(
                        "device '{name}' channel {}: max_bias_voltage must be positive",
                        ch.number
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const GOOD: &str = r#"
        default_slot = 1

        [devices.SY4527]
        system_type = "sy4527"
        link_type = "tcpip"
        hostname = "192.168.1.210"
        username = "admin"
        password = "admin"
        max_bias_voltage = 3000.0
        max_ramp_rate = 10.0

        [[devices.SY4527.channels]]
        number = 0
        detector = "HPGe-01"
        max_bias_voltage = 2500.0
        ramp_rate = 5.0

        [[devices.SY4527.channels]]
        number = 1
        detector = "HPGe-02"
        max_bias_voltage = 2500.0
        ramp_rate = 5.0
        enabled = false
    "#;

    #[test]
    fn parses_devices_and_channels() {
        let file = write_config(GOOD);
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.default_slot, 1);
        assert_eq!(settings.log_level, "info");

        let device = &settings.devices["SY4527"];
        assert_eq!(device.system_type, SystemType::Sy4527);
        assert_eq!(device.link_type, LinkType::Tcpip);
        assert_eq!(device.channels.len(), 2);
    }

    #[test]
    fn disabled_channel_is_invisible() {
        let file = write_config(GOOD);
        let settings = Settings::load(file.path()).unwrap();
        let device = &settings.devices["SY4527"];
        assert!(device.channel(0).is_some());
        assert!(device.channel(1).is_none());
        assert!(device.channel(7).is_none());
    }

    #[test]
    fn rejects_empty_device_table() {
        let file = write_config("default_slot = 0\n[devices]\n");
        assert!(matches!(
            Settings::load(file.path()),
            Err(HvpsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_duplicate_channel_numbers() {
        let file = write_config(
            r#"
            [devices.X]
            system_type = "n1470"
            link_type = "usb"
            hostname = "localhost"
            username = "u"
            password = "p"
            max_bias_voltage = 100.0
            max_ramp_rate = 5.0

            [[devices.X.channels]]
            number = 0
            detector = "a"
            max_bias_voltage = 50.0
            ramp_rate = 1.0

            [[devices.X.channels]]
            number = 0
            detector = "b"
            max_bias_voltage = 50.0
            ramp_rate = 1.0
            "#,
        );
        assert!(matches!(
            Settings::load(file.path()),
            Err(HvpsError::InvalidConfig(_))
        ));
    }
}
