//! Marshaling-layer behaviour: parameter discovery, type-tag dispatch and
//! value round-trips through the simulated vendor buffers.

mod common;

use common::open_mock;
use hvps_ctrl::catalog::{self, ParamType};
use hvps_ctrl::error::HvpsError;
use hvps_ctrl::marshal::{self, ParamValue};
use hvps_ctrl::status;
use hvps_ctrl::topology;

#[test]
fn parameter_count_matches_vendor_report() {
    // The vendor reports a count and a packed name buffer; the walk must
    // cover every reported identifier, including the last one.
    let (mock, session, _) = open_mock();
    mock.push_param(0, 0, "Trip", caenhv_sys::PARAM_TYPE_NUMERIC, 1.0);

    let descriptors = catalog::list_parameters(&session, 0, 0).unwrap();
    assert_eq!(descriptors.len(), 8);
    assert_eq!(descriptors.last().unwrap().name, "Trip");
}

#[test]
fn discovery_resolves_declared_type_tags() {
    let (_mock, session, _) = open_mock();

    let descriptors = catalog::list_parameters(&session, 0, 0).unwrap();
    let kind_of = |name: &str| {
        descriptors
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.kind)
            .unwrap()
    };
    assert_eq!(kind_of("VSet"), ParamType::Numeric);
    assert_eq!(kind_of("Pw"), ParamType::OnOff);
    assert_eq!(kind_of("Status"), ParamType::ChStatus);
}

#[test]
fn absent_type_tag_defaults_to_numeric() {
    let (mock, session, _) = open_mock();
    mock.omit_type_tag(0, 0, "RUp");

    let descriptors = catalog::list_parameters(&session, 0, 0).unwrap();
    let rup = descriptors.iter().find(|d| d.name == "RUp").unwrap();
    assert_eq!(rup.kind, ParamType::Numeric);
}

#[test]
fn unknown_type_tag_is_a_decode_anomaly() {
    let (mock, session, _) = open_mock();
    mock.push_param(0, 0, "Weird", 99, 0.0);

    let err = catalog::list_parameters(&session, 0, 0).unwrap_err();
    assert!(matches!(err, HvpsError::DecodeAnomaly { .. }));
}

#[test]
fn numeric_value_round_trips_within_f32_tolerance() {
    let (_mock, session, _) = open_mock();
    let target = 1234.56f32;

    marshal::write_parameter(&session, 0, 0, "VSet", target).unwrap();

    let descriptors = catalog::list_parameters(&session, 0, 0).unwrap();
    let vset = descriptors.iter().find(|d| d.name == "VSet").unwrap();
    let value = marshal::read_parameter(&session, 0, 0, vset).unwrap();
    match value {
        ParamValue::Numeric(v) => assert!((v - target).abs() < f32::EPSILON),
        other => panic!("VSet decoded as {other:?}"),
    }
}

#[test]
fn string_parameter_decodes_as_text() {
    let (mock, session, _) = open_mock();
    mock.push_text_param(0, 0, "HVMax", "3015V");

    let descriptors = catalog::list_parameters(&session, 0, 0).unwrap();
    let hvmax = descriptors.iter().find(|d| d.name == "HVMax").unwrap();
    assert_eq!(hvmax.kind, ParamType::Text);

    let value = marshal::read_parameter(&session, 0, 0, hvmax).unwrap();
    assert_eq!(value, ParamValue::Text("3015V".to_string()));
}

#[test]
fn channel_names_decode_from_the_packed_matrix() {
    let (_mock, session, _) = open_mock();
    let names = topology::channel_names(&session, 0, &[0, 1, 2, 3]).unwrap();
    assert_eq!(names, vec!["CH00", "CH01", "CH02", "CH03"]);
}

#[test]
fn crate_info_reports_the_simulated_layout() {
    let (_mock, session, _) = open_mock();
    let topo = topology::crate_info(&session).unwrap();
    assert_eq!(topo.slots, 1);
    assert_eq!(topo.channels_per_slot, vec![4]);
    assert_eq!(topo.models, vec!["A1833".to_string()]);
    assert_eq!(topo.firmware[0].to_string(), "13.2");
}

#[test]
fn full_crate_enumeration_covers_every_channel() {
    let (_mock, session, _) = open_mock();
    let channels = topology::enumerate_all_channels(&session).unwrap();
    assert_eq!(channels.len(), 4);
    assert_eq!(channels[3].channel, 3);
    assert!(!channels[0].params.is_empty());
}

#[test]
fn channel_report_expands_status_and_hides_it_from_the_listing() {
    let (mock, session, _) = open_mock();
    mock.set_param(0, 1, "VSet", 1500.0);
    mock.set_status(0, 1, 0b11);

    let info = topology::channel_info(&session, 0, 1).unwrap();
    let report = status::channel_report(&info);

    assert_eq!(report.status, "on,ramp_up");
    assert!(report.values.iter().any(|(name, _)| name == "VSet"));
    assert!(!report.values.iter().any(|(name, _)| name == "Status"));
}

#[test]
fn set_channel_name_failure_is_not_fatal_to_reads() {
    // The rename call succeeds but does nothing on this family; the channel
    // keeps its old name.
    let (_mock, session, _) = open_mock();
    marshal::set_channel_name(&session, 0, 0, "ULGe").unwrap();
    let names = topology::channel_names(&session, 0, &[0]).unwrap();
    assert_eq!(names, vec!["CH00"]);
}

#[test]
fn protocol_errors_surface_the_vendor_code_verbatim() {
    let (mock, session, _) = open_mock();
    mock.fail_next("CAENHV_GetChParam", 0x42);

    let descriptors = catalog::list_parameters(&session, 0, 0).unwrap();
    let err = marshal::read_parameter(&session, 0, 0, &descriptors[0]).unwrap_err();
    assert!(matches!(
        err,
        HvpsError::Protocol {
            code: 0x42,
            operation: "CAENHV_GetChParam",
        }
    ));
}
