//! End-to-end bias-controller behaviour against the simulated crate.
//!
//! The central safety pins: nothing is ever written before validation and
//! confirmation pass, and when a bias is applied the writes happen in
//! exactly the fixed order ramp-up, ramp-down, idle current, enable,
//! voltage.

mod common;

use std::time::Duration;

use common::open_mock;
use hvps_ctrl::bias::{AutoConfirm, BiasController};
use hvps_ctrl::error::{BiasRejection, HvpsError};

const YES: AutoConfirm = AutoConfirm(true);
const NO: AutoConfirm = AutoConfirm(false);

#[test]
fn bias_over_channel_limit_is_rejected_without_writes() {
    let (mock, session, device) = open_mock();
    let controller = BiasController::new(&session, &device, 0).with_settle(Duration::ZERO);

    let err = controller.bias(0, Some(2600.0), &YES).unwrap_err();
    assert!(matches!(
        err,
        HvpsError::Rejected(BiasRejection::VoltageExceedsChannelLimit { .. })
    ));
    assert!(mock.writes_for(0, 0).is_empty());
}

#[test]
fn bias_over_crate_limit_is_rejected_without_writes() {
    let (mock, session, mut device) = open_mock();
    // Channel ceiling above the crate ceiling, so the crate check trips.
    device.channels[0].max_bias_voltage = 3500.0;
    let controller = BiasController::new(&session, &device, 0).with_settle(Duration::ZERO);

    let err = controller.bias(0, Some(3200.0), &YES).unwrap_err();
    assert!(matches!(
        err,
        HvpsError::Rejected(BiasRejection::VoltageExceedsCrateLimit { .. })
    ));
    assert!(mock.writes_for(0, 0).is_empty());
}

#[test]
fn bias_at_current_setpoint_is_a_terminal_noop() {
    let (mock, session, device) = open_mock();
    mock.set_param(0, 0, "VSet", 1500.0);
    let controller = BiasController::new(&session, &device, 0).with_settle(Duration::ZERO);

    let err = controller.bias(0, Some(1500.0), &YES).unwrap_err();
    assert!(matches!(
        err,
        HvpsError::Rejected(BiasRejection::AlreadyAtTarget {
            channel: 0,
            voltage,
        }) if voltage == 1500.0
    ));
    assert!(mock.writes_for(0, 0).is_empty());

    // Repeating the identical request stays a no-op.
    let err = controller.bias(0, Some(1500.0), &YES).unwrap_err();
    assert!(matches!(
        err,
        HvpsError::Rejected(BiasRejection::AlreadyAtTarget { .. })
    ));
    assert!(mock.writes_for(0, 0).is_empty());
}

#[test]
fn successful_bias_writes_in_fixed_order() {
    let (mock, session, device) = open_mock();
    let controller = BiasController::new(&session, &device, 0).with_settle(Duration::ZERO);

    let report = controller.bias(0, Some(1500.0), &YES).unwrap();
    assert_eq!(report.previous, 0.0);
    assert_eq!(report.target, 1500.0);
    assert_eq!(report.ramp_rate, 5.0);

    let writes = mock.writes_for(0, 0);
    assert_eq!(
        writes,
        vec![
            ("RUp".to_string(), 5.0),
            ("RDwn".to_string(), 5.0),
            ("ISet".to_string(), 0.0),
            ("Pw".to_string(), 1.0),
            ("VSet".to_string(), 1500.0),
        ]
    );
}

#[test]
fn ramp_rate_is_capped_by_the_crate_ceiling() {
    let (mock, session, device) = open_mock();
    let controller = BiasController::new(&session, &device, 0).with_settle(Duration::ZERO);

    // Channel 1 is configured at 50 V/s against a crate ceiling of 10 V/s.
    let report = controller.bias(1, Some(1000.0), &YES).unwrap();
    assert_eq!(report.ramp_rate, 10.0);

    let writes = mock.writes_for(0, 1);
    assert_eq!(writes[0], ("RUp".to_string(), 10.0));
    assert_eq!(writes[1], ("RDwn".to_string(), 10.0));
    // Channel 1 carries its own idle current.
    assert_eq!(writes[2], ("ISet".to_string(), 2.0));
}

#[test]
fn bias_without_voltage_targets_the_configured_maximum() {
    let (mock, session, device) = open_mock();
    let controller = BiasController::new(&session, &device, 0).with_settle(Duration::ZERO);

    let report = controller.bias(0, None, &YES).unwrap();
    assert_eq!(report.target, 2500.0);
    assert_eq!(
        mock.writes_for(0, 0).last().unwrap(),
        &("VSet".to_string(), 2500.0)
    );
}

#[test]
fn declined_confirmation_aborts_before_any_write() {
    let (mock, session, device) = open_mock();
    let controller = BiasController::new(&session, &device, 0).with_settle(Duration::ZERO);

    let err = controller.bias(0, Some(1500.0), &NO).unwrap_err();
    assert!(matches!(
        err,
        HvpsError::Rejected(BiasRejection::UserDeclined)
    ));
    assert!(mock.writes_for(0, 0).is_empty());
}

#[test]
fn unconfigured_channel_cannot_be_biased() {
    let (mock, session, device) = open_mock();
    let controller = BiasController::new(&session, &device, 0).with_settle(Duration::ZERO);

    // Channel 2 exists in the config but is disabled; channel 3 is absent.
    for channel in [2u16, 3u16] {
        let err = controller.bias(channel, Some(100.0), &YES).unwrap_err();
        assert!(matches!(
            err,
            HvpsError::Rejected(BiasRejection::MissingChannelConfig { .. })
        ));
        assert!(mock.writes_for(0, channel).is_empty());
    }
}

#[test]
fn vendor_failure_mid_sequence_aborts_remaining_steps() {
    let (mock, session, device) = open_mock();
    let controller = BiasController::new(&session, &device, 0).with_settle(Duration::ZERO);

    mock.fail_next("CAENHV_SetChParam", 0x1002);
    let err = controller.bias(0, Some(1500.0), &YES).unwrap_err();
    assert!(matches!(
        err,
        HvpsError::Protocol {
            code: 0x1002,
            operation: "CAENHV_SetChParam",
        }
    ));

    // Only the failed ramp-up attempt reached the vendor; nothing after it.
    let writes = mock.writes_for(0, 0);
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, "RUp");
}

#[test]
fn unbias_ramps_down_without_disabling_the_channel() {
    let (mock, session, device) = open_mock();
    mock.set_param(0, 0, "VSet", 2000.0);
    let controller = BiasController::new(&session, &device, 0).with_settle(Duration::ZERO);

    let report = controller.unbias(0, &YES).unwrap();
    assert_eq!(report.previous, 2000.0);
    assert_eq!(report.target, 0.0);

    let writes = mock.writes_for(0, 0);
    assert_eq!(
        writes,
        vec![("RDwn".to_string(), 5.0), ("VSet".to_string(), 0.0)]
    );
    assert!(!writes.iter().any(|(name, _)| name == "Pw"));
}

#[test]
fn declined_unbias_changes_nothing() {
    let (mock, session, device) = open_mock();
    mock.set_param(0, 0, "VSet", 2000.0);
    let controller = BiasController::new(&session, &device, 0).with_settle(Duration::ZERO);

    let err = controller.unbias(0, &NO).unwrap_err();
    assert!(matches!(
        err,
        HvpsError::Rejected(BiasRejection::UserDeclined)
    ));
    assert!(mock.writes_for(0, 0).is_empty());
}
