use proair::protocol::decode_status;
use proair::{ActuatorSetting, Humidity, OperatingMode, Temperature};

#[test]
fn celsius_to_tenths_truncates() {
    assert_eq!(Temperature::from_celsius(22.59).tenths(), 225);
    assert_eq!(Temperature::from_celsius(2.3).tenths(), 23);
    assert_eq!(Temperature::from_celsius(-0.45).tenths(), -4);
    assert_eq!(Humidity::from_percent(55.55).tenths(), 555);
}

#[test]
fn temperature_display() {
    assert_eq!(Temperature::from_tenths(205).to_string(), "20.5\u{00b0}C");
    assert_eq!(Temperature::from_tenths(-15).to_string(), "-1.5\u{00b0}C");
    assert_eq!(Humidity::from_tenths(612).to_string(), "61.2%");
}

#[test]
fn setting_values_are_validated() {
    for ok in [0u8, 1, 2, 3] {
        assert_eq!(
            ActuatorSetting::try_from(ok).unwrap(),
            ActuatorSetting::Position(ok)
        );
    }
    assert_eq!(ActuatorSetting::try_from(7u8).unwrap(), ActuatorSetting::Auto);
    for bad in [4u8, 6, 8, 16] {
        assert!(ActuatorSetting::try_from(bad).is_err());
    }
}

#[test]
fn unknown_cooling_sub_mode_is_kept() {
    let cu = decode_status(r#"{"c":"stato","is_cool":1,"cool_mod":9}"#).unwrap();
    assert_eq!(cu.operating_mode(), OperatingMode::UnknownCooling(9));
    assert_eq!(cu.mode_description(), "UNKNOWN(9)");

    let off = decode_status(r#"{"c":"stato","is_off":1,"is_cool":1,"cool_mod":1}"#).unwrap();
    assert_eq!(off.mode_description(), "OFF");
}

#[test]
fn snapshot_serializes_in_celsius() {
    let cu = decode_status(
        r#"{"c":"stato","t_can":205,"zone":[{"id_zona":1,"name":"Living","t":221,"t_set":200,"fan":-1,"shu":19,"shu_set":16,"u":455}]}"#,
    )
    .unwrap();
    let value = serde_json::to_value(&cu).unwrap();

    assert_eq!(value["canal_temperature"], 20.5);
    let zone = &value["zones"][0];
    assert_eq!(zone["temperature"], 22.1);
    assert_eq!(zone["humidity"], 45.5);
    assert!(zone["fan"].is_null());
    assert_eq!(zone["damper"]["position"], 3);
    assert_eq!(zone["damper"]["auto"], true);
    assert_eq!(zone["damper_set"], "Auto");
}

#[test]
fn zone_rendering() {
    let cu = decode_status(
        r#"{"c":"stato","zone":[{"id_zona":2,"name":"Kitchen","is_off":1,"t":190,"t_set":215,"fan":-1,"shu":-1,"EV":-1}]}"#,
    )
    .unwrap();
    let zone = cu.zone(2).unwrap();

    assert_eq!(
        zone.summary(),
        "Zone 2: Kitchen [OFF] T=19.0\u{00b0}C (set: 21.5\u{00b0}C)"
    );
    let detail = zone.to_string();
    assert!(!detail.contains("Fancoil"));
    assert!(!detail.contains("Damper"));
    assert!(!detail.contains("Electrovalve"));
    assert!(!detail.contains("Humidity"));
    assert!(cu.to_string().contains("Kitchen"));
}
