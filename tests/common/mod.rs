//! Shared fixtures for the integration suite: a simulated crate plus the
//! configuration of a typical two-channel germanium setup.

use std::sync::Arc;

use hvps_ctrl::config::{ChannelConfig, DeviceSettings};
use hvps_ctrl::session::Session;
use hvps_ctrl::vendor::{LinkType, MockCrate, SystemType};

pub fn device_settings() -> DeviceSettings {
    DeviceSettings {
        system_type: SystemType::Sy4527,
        link_type: LinkType::Tcpip,
        hostname: "127.0.0.1".to_string(),
        username: "admin".to_string(),
        password: "admin".to_string(),
        max_bias_voltage: 3000.0,
        max_ramp_rate: 10.0,
        idle_current: 0.0,
        channels: vec![
            ChannelConfig {
                number: 0,
                detector: "HPGe-01".to_string(),
                max_bias_voltage: 2500.0,
                ramp_rate: 5.0,
                enabled: true,
                idle_current: None,
            },
            ChannelConfig {
                number: 1,
                detector: "HPGe-02".to_string(),
                max_bias_voltage: 2500.0,
                ramp_rate: 50.0,
                enabled: true,
                idle_current: Some(2.0),
            },
            ChannelConfig {
                number: 2,
                detector: "spare".to_string(),
                max_bias_voltage: 2500.0,
                ramp_rate: 5.0,
                enabled: false,
                idle_current: None,
            },
        ],
    }
}

pub fn open_mock() -> (Arc<MockCrate>, Session, DeviceSettings) {
    let mock = Arc::new(MockCrate::new());
    let device = device_settings();
    let session = Session::open(mock.clone(), "SY4527", &device).expect("mock session opens");
    mock.clear_calls();
    (mock, session, device)
}
