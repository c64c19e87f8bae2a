use std::fmt;

use serde::Serialize;

use crate::{Error, Result};

/// Model value for "automatic" fan speed / damper opening.
pub const AUTO_MODEL_VALUE: u8 = 7;
/// The same "automatic" value as the device sends and expects it.
pub const AUTO_WIRE_VALUE: i64 = 16;

// Absorbs binary representation error (2.3 * 10 = 22.999...) before truncating.
// Kept at f64 noise scale so real fractions below the next tenth still truncate.
const TENTHS_EPSILON: f64 = 1e-9;

fn truncate_to_tenths(value: f64) -> i32 {
    let scaled = value * 10.0;
    (scaled + TENTHS_EPSILON.copysign(scaled)).trunc() as i32
}

/// Temperature stored in tenths of a degree Celsius, the device's resolution.
/// Conversion from a float truncates toward zero, never rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(into = "f64")]
pub struct Temperature(i32);

impl Temperature {
    pub fn from_tenths(tenths: i32) -> Self {
        Self(tenths)
    }

    pub fn from_celsius(c: f64) -> Self {
        Self(truncate_to_tenths(c))
    }

    pub fn tenths(&self) -> i32 {
        self.0
    }

    pub fn celsius(&self) -> f64 {
        f64::from(self.0) / 10.0
    }
}

impl From<Temperature> for f64 {
    fn from(t: Temperature) -> Self {
        t.celsius()
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}\u{00b0}C", self.celsius())
    }
}

/// Relative humidity in tenths of a percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(into = "f64")]
pub struct Humidity(i32);

impl Humidity {
    pub fn from_tenths(tenths: i32) -> Self {
        Self(tenths)
    }

    pub fn from_percent(p: f64) -> Self {
        Self(truncate_to_tenths(p))
    }

    pub fn tenths(&self) -> i32 {
        self.0
    }

    pub fn percent(&self) -> f64 {
        f64::from(self.0) / 10.0
    }
}

impl From<Humidity> for f64 {
    fn from(h: Humidity) -> Self {
        h.percent()
    }
}

impl fmt::Display for Humidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.percent())
    }
}

fn position_label(position: u8) -> String {
    match position {
        0 => "0\u{00b0}".to_string(),
        1 => "30\u{00b0}".to_string(),
        2 => "60\u{00b0}".to_string(),
        3 => "90\u{00b0}".to_string(),
        other => other.to_string(),
    }
}

/// Requested fan-coil speed or damper opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActuatorSetting {
    Position(u8),
    Auto,
}

impl Default for ActuatorSetting {
    fn default() -> Self {
        ActuatorSetting::Position(0)
    }
}

impl ActuatorSetting {
    pub fn model_value(&self) -> u8 {
        match self {
            ActuatorSetting::Position(p) => *p,
            ActuatorSetting::Auto => AUTO_MODEL_VALUE,
        }
    }

    pub fn wire_value(&self) -> i64 {
        match self {
            ActuatorSetting::Position(p) => i64::from(*p),
            ActuatorSetting::Auto => AUTO_WIRE_VALUE,
        }
    }

    /// Lenient: whatever the device reports is mirrored, only 16 (and 7) mean auto.
    pub fn from_wire(value: i64) -> Self {
        match value {
            AUTO_WIRE_VALUE => ActuatorSetting::Auto,
            v if v == i64::from(AUTO_MODEL_VALUE) => ActuatorSetting::Auto,
            v => ActuatorSetting::Position(v.clamp(0, i64::from(u8::MAX)) as u8),
        }
    }
}

impl TryFrom<u8> for ActuatorSetting {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0..=3 => Ok(ActuatorSetting::Position(value)),
            AUTO_MODEL_VALUE => Ok(ActuatorSetting::Auto),
            other => Err(Error::InvalidArgument(format!(
                "{other} is not a valid setting (expected 0, 1, 2, 3 or 7 for auto)"
            ))),
        }
    }
}

impl fmt::Display for ActuatorSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorSetting::Position(p) => write!(f, "fixed {}", position_label(*p)),
            ActuatorSetting::Auto => write!(f, "AUTO"),
        }
    }
}

/// Actual (read-only) fan-coil speed or damper opening as measured by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActuatorReading {
    pub position: u8,
    /// The device is driving this actuator automatically.
    pub auto: bool,
}

impl ActuatorReading {
    /// Negative values are the device's "not installed" sentinel.
    /// Values of 16 and above carry the auto offset.
    pub fn from_wire(value: i64) -> Option<Self> {
        if value < 0 {
            return None;
        }
        let (raw, auto) = if value >= AUTO_WIRE_VALUE {
            (value - AUTO_WIRE_VALUE, true)
        } else {
            (value, false)
        };
        Some(Self {
            position: raw.min(i64::from(u8::MAX)) as u8,
            auto,
        })
    }
}

impl fmt::Display for ActuatorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", position_label(self.position))?;
        if self.auto {
            write!(f, " [AUTO]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Electrovalve {
    Absent,
    #[default]
    Off,
    On,
}

impl Electrovalve {
    pub fn from_wire(value: i64) -> Self {
        match value {
            v if v < 0 => Electrovalve::Absent,
            0 => Electrovalve::Off,
            _ => Electrovalve::On,
        }
    }
}

/// Sub-mode of the cooling season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoolingMode {
    Cooling,
    Dehumidify,
    Ventilation,
}

impl CoolingMode {
    pub fn wire_value(&self) -> u8 {
        match self {
            CoolingMode::Cooling => 1,
            CoolingMode::Dehumidify => 2,
            CoolingMode::Ventilation => 3,
        }
    }

    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            1 => Some(CoolingMode::Cooling),
            2 => Some(CoolingMode::Dehumidify),
            3 => Some(CoolingMode::Ventilation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperatingMode {
    Heating,
    Cooling(CoolingMode),
    /// Cooling season with a sub-mode this library does not know.
    UnknownCooling(u8),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Zone {
    pub id: u8,
    pub name: String,
    pub is_off: bool,
    pub temperature: Temperature,
    pub target_temperature: Temperature,
    pub fan: Option<ActuatorReading>,
    pub fan_set: ActuatorSetting,
    pub damper: Option<ActuatorReading>,
    pub damper_set: ActuatorSetting,
    pub electrovalve: Electrovalve,
    pub crono_mode: bool,
    pub crono_active: bool,
    pub humidity: Option<Humidity>,
    pub target_humidity: Option<Humidity>,
    pub window_open: bool,
    pub badge_present: bool,
    pub cut_off: bool,
    pub error_mask: u32,
}

impl Zone {
    pub fn is_on(&self) -> bool {
        !self.is_off
    }

    /// One-line rendering with the fields the full status always carries.
    pub fn summary(&self) -> String {
        format!(
            "Zone {}: {} [{}] T={} (set: {})",
            self.id,
            self.name,
            on_off(self.is_off),
            self.temperature,
            self.target_temperature,
        )
    }
}

fn on_off(is_off: bool) -> &'static str {
    if is_off { "OFF" } else { "ON" }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Zone {}: {} [{}]", self.id, self.name, on_off(self.is_off))?;
        write!(
            f,
            "\n  Temperature: {} (set: {})",
            self.temperature, self.target_temperature
        )?;
        if let Some(fan) = self.fan {
            write!(f, "\n  Fancoil: {} (actual: {fan})", self.fan_set)?;
        }
        if let Some(damper) = self.damper {
            write!(f, "\n  Damper: {} (actual: {damper})", self.damper_set)?;
        }
        match self.electrovalve {
            Electrovalve::Absent => {}
            Electrovalve::Off => write!(f, "\n  Electrovalve: OFF")?,
            Electrovalve::On => write!(f, "\n  Electrovalve: ON")?,
        }
        if let Some(humidity) = self.humidity {
            write!(f, "\n  Humidity: {humidity}")?;
            if let Some(target) = self.target_humidity {
                write!(f, " (set: {target})")?;
            }
        }
        if self.crono_mode {
            let state = if self.crono_active { "active" } else { "inactive" };
            write!(f, "\n  Crono: {state}")?;
        }
        if self.window_open {
            write!(f, "\n  Window: open")?;
        }
        if self.badge_present {
            write!(f, "\n  Badge: present")?;
        }
        if self.cut_off {
            write!(f, "\n  Cut-off: active")?;
        }
        if self.error_mask != 0 {
            write!(f, "\n  Errors: {}", self.error_mask)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ControlUnit {
    pub serial: String,
    pub firmware: String,
    pub is_off: bool,
    /// Season flag: cooling family when set, heating otherwise.
    pub is_cooling: bool,
    /// Raw cooling sub-mode. Only meaningful when `is_cooling` is set.
    pub cool_mode: u8,
    pub canal_temperature: Temperature,
    pub winter_frequency: i64,
    pub summer_frequency: i64,
    pub master_zone: i64,
    pub ir_present: bool,
    pub error_mask: u32,
    pub zones: Vec<Zone>,
}

impl ControlUnit {
    pub fn is_on(&self) -> bool {
        !self.is_off
    }

    pub fn operating_mode(&self) -> OperatingMode {
        if !self.is_cooling {
            return OperatingMode::Heating;
        }
        match CoolingMode::from_wire(self.cool_mode) {
            Some(mode) => OperatingMode::Cooling(mode),
            None => OperatingMode::UnknownCooling(self.cool_mode),
        }
    }

    pub fn mode_description(&self) -> String {
        if self.is_off {
            return "OFF".to_string();
        }
        match self.operating_mode() {
            OperatingMode::Heating => "HEATING".to_string(),
            OperatingMode::Cooling(CoolingMode::Cooling) => "COOLING".to_string(),
            OperatingMode::Cooling(CoolingMode::Dehumidify) => "DEHUMIDIFY".to_string(),
            OperatingMode::Cooling(CoolingMode::Ventilation) => "VENTILATION".to_string(),
            OperatingMode::UnknownCooling(raw) => format!("UNKNOWN({raw})"),
        }
    }

    pub fn zone(&self, zone_id: u8) -> Option<&Zone> {
        self.zones.iter().find(|z| z.id == zone_id)
    }
}

impl fmt::Display for ControlUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Control unit [{}] - Mode: {}",
            on_off(self.is_off),
            self.mode_description()
        )?;
        if !self.serial.is_empty() || !self.firmware.is_empty() {
            write!(f, "\n  Serial: {} | Firmware: {}", self.serial, self.firmware)?;
        }
        write!(
            f,
            "\n  Canal temperature: {} | Winter freq: {} | Summer freq: {}",
            self.canal_temperature, self.winter_frequency, self.summer_frequency
        )?;
        write!(
            f,
            "\n  IR: {} | Errors: {}",
            if self.ir_present { "yes" } else { "no" },
            self.error_mask
        )?;
        write!(f, "\n  Zones ({}):", self.zones.len())?;
        for zone in &self.zones {
            write!(f, "\n    {}", zone.summary())?;
        }
        Ok(())
    }
}

/// Events emitted by the refresh coordinator when a new snapshot differs from the last one.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    UnitPowerChanged { on: bool },
    UnitModeChanged { mode: OperatingMode },
    CanalTemperatureChanged { temp: Temperature },
    UnitErrorsChanged { mask: u32 },

    ZoneAdded { zone_id: u8, name: String },
    ZoneRemoved { zone_id: u8, name: String },
    ZonePowerChanged { zone_id: u8, name: String, on: bool },
    ZoneTemperatureChanged { zone_id: u8, name: String, temp: Temperature },
    ZoneTargetChanged { zone_id: u8, name: String, target: Temperature },
    ZoneHumidityChanged { zone_id: u8, name: String, humidity: Option<Humidity> },
    ZoneFanChanged {
        zone_id: u8,
        name: String,
        setting: ActuatorSetting,
        actual: Option<ActuatorReading>,
    },
    ZoneDamperChanged {
        zone_id: u8,
        name: String,
        setting: ActuatorSetting,
        actual: Option<ActuatorReading>,
    },
    ZoneScheduleChanged { zone_id: u8, name: String, crono_mode: bool, crono_active: bool },
    ZoneContactsChanged {
        zone_id: u8,
        name: String,
        window_open: bool,
        badge_present: bool,
        cut_off: bool,
    },
    ZoneErrorsChanged { zone_id: u8, name: String, mask: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_truncates_toward_zero() {
        assert_eq!(Temperature::from_celsius(20.57).tenths(), 205);
        assert_eq!(Temperature::from_celsius(20.59).tenths(), 205);
        assert_eq!(Temperature::from_celsius(-1.27).tenths(), -12);
    }

    #[test]
    fn values_just_below_a_tenth_still_truncate() {
        assert_eq!(Temperature::from_celsius(20.99999995).tenths(), 209);
        assert_eq!(Temperature::from_celsius(-20.99999995).tenths(), -209);
        assert_eq!(Humidity::from_percent(49.9999999).tenths(), 499);
    }

    #[test]
    fn temperature_survives_float_noise() {
        // 2.3 * 10.0 is 22.999999999999996 in f64
        assert_eq!(Temperature::from_celsius(2.3).tenths(), 23);
        for tenths in -100..400 {
            let t = Temperature::from_tenths(tenths);
            assert_eq!(Temperature::from_celsius(t.celsius()), t);
        }
    }

    #[test]
    fn actual_reading_strips_auto_offset() {
        for v in 0..=3u8 {
            let auto = ActuatorReading::from_wire(16 + i64::from(v)).unwrap();
            assert_eq!(auto, ActuatorReading { position: v, auto: true });
            let fixed = ActuatorReading::from_wire(i64::from(v)).unwrap();
            assert_eq!(fixed, ActuatorReading { position: v, auto: false });
        }
        assert_eq!(ActuatorReading::from_wire(-1), None);
    }

    #[test]
    fn auto_setting_maps_between_model_and_wire() {
        assert_eq!(ActuatorSetting::from_wire(16), ActuatorSetting::Auto);
        assert_eq!(ActuatorSetting::Auto.model_value(), 7);
        assert_eq!(ActuatorSetting::Auto.wire_value(), 16);
        assert_eq!(ActuatorSetting::try_from(7u8).unwrap().wire_value(), 16);
        assert_eq!(ActuatorSetting::from_wire(2), ActuatorSetting::Position(2));
    }

    #[test]
    fn setting_validation() {
        for ok in [0u8, 1, 2, 3, 7] {
            assert!(ActuatorSetting::try_from(ok).is_ok());
        }
        for bad in [4u8, 5, 6, 8, 16] {
            assert!(matches!(
                ActuatorSetting::try_from(bad),
                Err(Error::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn heating_ignores_cool_mode_value() {
        let cu = ControlUnit {
            is_cooling: false,
            cool_mode: 2,
            ..Default::default()
        };
        assert_eq!(cu.operating_mode(), OperatingMode::Heating);
        let cu = ControlUnit {
            is_cooling: true,
            cool_mode: 3,
            ..Default::default()
        };
        assert_eq!(
            cu.operating_mode(),
            OperatingMode::Cooling(CoolingMode::Ventilation)
        );
        assert_eq!(cu.mode_description(), "VENTILATION");
    }

    #[test]
    fn zone_rendering_omits_absent_fields() {
        let zone = Zone {
            id: 1,
            name: "Living".into(),
            temperature: Temperature::from_tenths(221),
            target_temperature: Temperature::from_tenths(240),
            fan: None,
            damper: ActuatorReading::from_wire(18),
            damper_set: ActuatorSetting::Position(2),
            electrovalve: Electrovalve::Absent,
            ..Default::default()
        };
        let text = zone.to_string();
        assert!(text.starts_with("Zone 1: Living [ON]"));
        assert!(text.contains("Temperature: 22.1\u{00b0}C (set: 24.0\u{00b0}C)"));
        assert!(text.contains("Damper: fixed 60\u{00b0} (actual: 60\u{00b0} [AUTO])"));
        assert!(!text.contains("Fancoil"));
        assert!(!text.contains("Electrovalve"));
        assert!(!text.contains("Humidity"));
        assert!(!text.contains("Errors"));
    }

    #[test]
    fn unit_rendering_lists_zone_summaries() {
        let cu = ControlUnit {
            is_cooling: true,
            cool_mode: 1,
            canal_temperature: Temperature::from_tenths(205),
            zones: vec![Zone {
                id: 2,
                name: "Bed".into(),
                is_off: true,
                ..Default::default()
            }],
            ..Default::default()
        };
        let text = cu.to_string();
        assert!(text.starts_with("Control unit [ON] - Mode: COOLING"));
        assert!(text.contains("Canal temperature: 20.5\u{00b0}C"));
        assert!(text.contains("Zones (1):"));
        assert!(text.contains("Zone 2: Bed [OFF]"));
    }
}
