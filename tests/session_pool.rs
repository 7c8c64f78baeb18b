//! Session lifecycle and by-name resolution rules.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::device_settings;
use hvps_ctrl::config::Settings;
use hvps_ctrl::error::HvpsError;
use hvps_ctrl::session::{Session, SessionPool};
use hvps_ctrl::vendor::MockCrate;

fn settings_with(names: &[&str]) -> Settings {
    let mut devices = HashMap::new();
    for name in names {
        devices.insert(name.to_string(), device_settings());
    }
    Settings {
        log_level: "info".to_string(),
        default_slot: 0,
        mqtt: None,
        devices,
    }
}

#[test]
fn failed_init_yields_a_connection_error_and_no_session() {
    let mock = Arc::new(MockCrate::new());
    mock.fail_next("CAENHV_InitSystem", 3);

    let err = Session::open(mock, "SY4527", &device_settings()).unwrap_err();
    assert!(matches!(err, HvpsError::Connection { .. }));
}

#[test]
fn sole_session_is_selected_without_a_name() {
    let mock = Arc::new(MockCrate::new());
    let pool = SessionPool::open_all(mock, &settings_with(&["SY4527"])).unwrap();

    assert_eq!(pool.select(None).unwrap().name(), "SY4527");
    assert_eq!(pool.select(Some("SY4527")).unwrap().name(), "SY4527");
    pool.close_all();
}

#[test]
fn unknown_name_is_reported() {
    let mock = Arc::new(MockCrate::new());
    let pool = SessionPool::open_all(mock, &settings_with(&["SY4527"])).unwrap();

    assert!(matches!(
        pool.select(Some("SY5527")),
        Err(HvpsError::UnknownDevice(_))
    ));
    pool.close_all();
}

#[test]
fn several_sessions_require_an_explicit_name() {
    let mock = Arc::new(MockCrate::new());
    let pool = SessionPool::open_all(mock, &settings_with(&["upstairs", "downstairs"])).unwrap();
    assert_eq!(pool.len(), 2);

    assert!(matches!(pool.select(None), Err(HvpsError::AmbiguousDevice)));
    assert_eq!(pool.select(Some("upstairs")).unwrap().name(), "upstairs");
    pool.close_all();
}

#[test]
fn close_reports_deinit_failures_without_aborting() {
    let mock = Arc::new(MockCrate::new());
    let session = Session::open(mock.clone(), "SY4527", &device_settings()).unwrap();

    mock.fail_next("CAENHV_DeinitSystem", 7);
    assert!(session.close().is_err());
}

#[test]
fn dropping_an_unclosed_session_deinitialises_it() {
    let mock = Arc::new(MockCrate::new());
    {
        let _session = Session::open(mock.clone(), "SY4527", &device_settings()).unwrap();
    }
    let calls = mock.calls();
    assert!(calls
        .iter()
        .any(|c| matches!(c, hvps_ctrl::vendor::CallRecord::DeinitSystem)));
}
