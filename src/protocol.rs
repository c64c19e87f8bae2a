use std::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde_json::{Map, Value, json};

use crate::types::*;
use crate::{Error, Result};

pub const DEFAULT_PORT: u16 = 1235;
pub const DEFAULT_PIN: &str = "2909";

pub const CMD_CHECK_PIN: &str = "check_pin";
pub const CMD_STATUS: &str = "stato";
pub const CMD_STATUS_REDUCED: &str = "stato_r";
pub const CMD_ZONE_STATUS: &str = "stato_zona";
pub const CMD_UPDATE_UNIT: &str = "upd_cu";
pub const CMD_UPDATE_ZONE: &str = "upd_zona";
pub const CMD_UPDATE_DATE: &str = "upd_date";

const KEY_COMMAND: &str = "c";
const KEY_PIN: &str = "pin";
const KEY_RESULT: &str = "res";
const KEY_ZONES: &str = "zone";

/// Result code carried by `res` in command-style responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok,
    BadPin,
    UnknownCommand,
    Other(i64),
}

impl ResultCode {
    pub fn from_wire(value: i64) -> Self {
        match value {
            1 => ResultCode::Ok,
            2 => ResultCode::BadPin,
            4 => ResultCode::UnknownCommand,
            other => ResultCode::Other(other),
        }
    }

    pub fn wire_value(&self) -> i64 {
        match self {
            ResultCode::Ok => 1,
            ResultCode::BadPin => 2,
            ResultCode::UnknownCommand => 4,
            ResultCode::Other(v) => *v,
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCode::Ok => write!(f, "ok (1)"),
            ResultCode::BadPin => write!(f, "bad PIN (2)"),
            ResultCode::UnknownCommand => write!(f, "unknown command (4)"),
            ResultCode::Other(v) => write!(f, "result code {v}"),
        }
    }
}

fn flag(value: bool) -> u8 {
    u8::from(value)
}

// -- Outgoing commands --

pub fn check_pin_message(pin: &str) -> Value {
    json!({ "c": CMD_CHECK_PIN, "pin": pin })
}

pub fn status_message(pin: &str) -> Value {
    json!({ "c": CMD_STATUS, "pin": pin })
}

pub fn reduced_status_message(pin: &str) -> Value {
    json!({ "c": CMD_STATUS_REDUCED, "pin": pin })
}

pub fn zone_status_message(pin: &str, zone_id: u8) -> Value {
    json!({ "c": CMD_ZONE_STATUS, "pin": pin, "id_zona": zone_id })
}

/// Every field `upd_cu` carries. The device treats the command as a full
/// record write, so all of them must be restated.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitUpdate {
    pub is_off: bool,
    pub is_cooling: bool,
    pub cool_mode: u8,
    pub canal_temperature: Temperature,
    pub winter_frequency: i64,
    pub summer_frequency: i64,
}

impl From<&ControlUnit> for UnitUpdate {
    fn from(cu: &ControlUnit) -> Self {
        Self {
            is_off: cu.is_off,
            is_cooling: cu.is_cooling,
            cool_mode: cu.cool_mode,
            canal_temperature: cu.canal_temperature,
            winter_frequency: cu.winter_frequency,
            summer_frequency: cu.summer_frequency,
        }
    }
}

pub fn update_unit_message(pin: &str, update: &UnitUpdate) -> Value {
    json!({
        "c": CMD_UPDATE_UNIT,
        "pin": pin,
        "is_off": flag(update.is_off),
        "is_cool": flag(update.is_cooling),
        "cool_mod": update.cool_mode,
        "t_can": update.canal_temperature.tenths(),
        "f_inv": update.winter_frequency,
        "f_est": update.summer_frequency,
    })
}

/// Every field `upd_zona` carries, restated from the last full read.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneUpdate {
    pub zone_id: u8,
    pub name: String,
    pub is_off: bool,
    pub target_temperature: Temperature,
    pub fan_set: ActuatorSetting,
    pub damper_set: ActuatorSetting,
    pub crono_mode: bool,
}

impl From<&Zone> for ZoneUpdate {
    fn from(zone: &Zone) -> Self {
        Self {
            zone_id: zone.id,
            name: zone.name.clone(),
            is_off: zone.is_off,
            target_temperature: zone.target_temperature,
            fan_set: zone.fan_set,
            damper_set: zone.damper_set,
            crono_mode: zone.crono_mode,
        }
    }
}

pub fn update_zone_message(pin: &str, update: &ZoneUpdate) -> Value {
    json!({
        "c": CMD_UPDATE_ZONE,
        "pin": pin,
        "id_zona": update.zone_id,
        "name": update.name,
        "is_off": flag(update.is_off),
        // the device wants the setpoint as a string, unlike t_can
        "t_set": update.target_temperature.tenths().to_string(),
        "fan_set": update.fan_set.wire_value(),
        "shu_set": update.damper_set.wire_value(),
        "is_crono": flag(update.crono_mode),
    })
}

pub fn update_date_message(pin: &str, at: NaiveDateTime) -> Value {
    json!({
        "c": CMD_UPDATE_DATE,
        "pin": pin,
        "h24": 1,
        "day": at.weekday().number_from_monday(),
        "hour": at.hour(),
        "minute": at.minute(),
    })
}

// -- Incoming responses --

/// Which of the two status layouts a response uses, chosen from the echoed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    Full,
    Reduced,
}

impl Schema {
    pub fn from_echo(command: &str) -> Self {
        if command == CMD_STATUS_REDUCED {
            Schema::Reduced
        } else {
            Schema::Full
        }
    }

    fn other(&self) -> Self {
        match self {
            Schema::Full => Schema::Reduced,
            Schema::Reduced => Schema::Full,
        }
    }

    fn unit_keys(&self) -> &'static UnitKeys {
        match self {
            Schema::Full => &FULL_UNIT_KEYS,
            Schema::Reduced => &REDUCED_UNIT_KEYS,
        }
    }

    fn zone_keys(&self) -> &'static ZoneKeys {
        match self {
            Schema::Full => &FULL_ZONE_KEYS,
            Schema::Reduced => &REDUCED_ZONE_KEYS,
        }
    }
}

struct UnitKeys {
    is_off: &'static str,
    is_cooling: &'static str,
    cool_mode: &'static str,
    canal_temperature: &'static str,
    winter_frequency: &'static str,
    summer_frequency: &'static str,
    master_zone: &'static str,
    ir_present: &'static str,
    error_mask: &'static str,
    serial: &'static str,
    firmware: &'static str,
}

const FULL_UNIT_KEYS: UnitKeys = UnitKeys {
    is_off: "is_off",
    is_cooling: "is_cool",
    cool_mode: "cool_mod",
    canal_temperature: "t_can",
    winter_frequency: "f_inv",
    summer_frequency: "f_est",
    master_zone: "master_nr",
    ir_present: "ir_present",
    error_mask: "err_cu",
    serial: "serial",
    firmware: "fw_ver",
};

const REDUCED_UNIT_KEYS: UnitKeys = UnitKeys {
    is_off: "off",
    is_cooling: "cl",
    cool_mode: "cl_m",
    canal_temperature: "tc",
    winter_frequency: "fi",
    summer_frequency: "fe",
    master_zone: "m_nr",
    ir_present: "ir",
    error_mask: "err_cu",
    serial: "serial",
    firmware: "fw_ver",
};

struct ZoneKeys {
    id: &'static str,
    name: &'static str,
    is_off: &'static str,
    temperature: &'static str,
    target_temperature: &'static str,
    fan: &'static str,
    fan_set: &'static str,
    damper: &'static str,
    damper_set: &'static str,
    electrovalve: &'static str,
    crono_mode: &'static str,
    crono_active: &'static str,
    humidity: &'static str,
    target_humidity: &'static str,
    window: &'static str,
    badge: &'static str,
    /// Only the reduced layout reports cut-off.
    cut_off: Option<&'static str>,
    error_mask: &'static str,
}

const FULL_ZONE_KEYS: ZoneKeys = ZoneKeys {
    id: "id_zona",
    name: "name",
    is_off: "is_off",
    temperature: "t",
    target_temperature: "t_set",
    fan: "fan",
    fan_set: "fan_set",
    damper: "shu",
    damper_set: "shu_set",
    electrovalve: "EV",
    crono_mode: "is_crono",
    crono_active: "crono_on",
    humidity: "u",
    target_humidity: "u_set",
    window: "c_win",
    badge: "c_badge",
    cut_off: None,
    error_mask: "err",
};

const REDUCED_ZONE_KEYS: ZoneKeys = ZoneKeys {
    id: "nr",
    name: "n",
    is_off: "off",
    temperature: "t",
    target_temperature: "ts",
    fan: "fan",
    fan_set: "fan_set",
    damper: "shu",
    damper_set: "shu_set",
    electrovalve: "EV",
    crono_mode: "is_crono",
    crono_active: "crono_on",
    humidity: "u",
    target_humidity: "us",
    window: "w",
    badge: "b",
    cut_off: Some("co"),
    error_mask: "err",
};

/// Reads logical attributes from a response object: the echoed schema's key
/// first, then the other schema's key, then zero.
struct Fields<'a, K: 'static> {
    obj: &'a Map<String, Value>,
    primary: &'static K,
    fallback: &'static K,
}

impl<'a, K: 'static> Fields<'a, K> {
    fn raw_opt(&self, key: impl Fn(&K) -> Option<&'static str>) -> Option<&'a Value> {
        key(self.primary)
            .and_then(|k| self.obj.get(k))
            .or_else(|| key(self.fallback).and_then(|k| self.obj.get(k)))
    }

    fn raw(&self, key: impl Fn(&K) -> &'static str) -> Option<&'a Value> {
        self.raw_opt(|k| Some(key(k)))
    }

    fn int(&self, key: impl Fn(&K) -> &'static str) -> i64 {
        self.raw(key).and_then(as_int).unwrap_or(0)
    }

    fn flag(&self, key: impl Fn(&K) -> &'static str) -> bool {
        self.int(key) != 0
    }

    fn text(&self, key: impl Fn(&K) -> &'static str) -> String {
        match self.raw(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }
}

/// Numbers arrive as JSON integers, occasionally as floats or numeric strings.
fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn to_u8(value: i64) -> u8 {
    value.clamp(0, i64::from(u8::MAX)) as u8
}

fn to_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

fn to_mask(value: i64) -> u32 {
    u32::try_from(value).unwrap_or_default()
}

fn humidity(raw: i64) -> Option<Humidity> {
    // the device reports 0 when no humidity sensor is fitted
    (raw != 0).then(|| Humidity::from_tenths(to_i32(raw)))
}

pub fn zone_from_map(obj: &Map<String, Value>, schema: Schema) -> Zone {
    let f = Fields {
        obj,
        primary: schema.zone_keys(),
        fallback: schema.other().zone_keys(),
    };
    Zone {
        id: to_u8(f.int(|k| k.id)),
        name: f.text(|k| k.name),
        is_off: f.flag(|k| k.is_off),
        temperature: Temperature::from_tenths(to_i32(f.int(|k| k.temperature))),
        target_temperature: Temperature::from_tenths(to_i32(f.int(|k| k.target_temperature))),
        fan: ActuatorReading::from_wire(f.int(|k| k.fan)),
        fan_set: ActuatorSetting::from_wire(f.int(|k| k.fan_set)),
        damper: ActuatorReading::from_wire(f.int(|k| k.damper)),
        damper_set: ActuatorSetting::from_wire(f.int(|k| k.damper_set)),
        electrovalve: Electrovalve::from_wire(f.int(|k| k.electrovalve)),
        crono_mode: f.flag(|k| k.crono_mode),
        crono_active: f.flag(|k| k.crono_active),
        humidity: humidity(f.int(|k| k.humidity)),
        target_humidity: humidity(f.int(|k| k.target_humidity)),
        window_open: f.flag(|k| k.window),
        badge_present: f.flag(|k| k.badge),
        cut_off: f.raw_opt(|k| k.cut_off).and_then(as_int).unwrap_or(0) != 0,
        error_mask: to_mask(f.int(|k| k.error_mask)),
    }
}

pub fn unit_from_map(obj: &Map<String, Value>, schema: Schema) -> ControlUnit {
    let f = Fields {
        obj,
        primary: schema.unit_keys(),
        fallback: schema.other().unit_keys(),
    };
    let zones = match obj.get(KEY_ZONES) {
        Some(Value::Array(zones)) => zones
            .iter()
            .filter_map(|z| z.as_object())
            .map(|z| zone_from_map(z, schema))
            .collect(),
        _ => Vec::new(),
    };
    ControlUnit {
        serial: f.text(|k| k.serial),
        firmware: f.text(|k| k.firmware),
        is_off: f.flag(|k| k.is_off),
        is_cooling: f.flag(|k| k.is_cooling),
        cool_mode: to_u8(f.int(|k| k.cool_mode)),
        canal_temperature: Temperature::from_tenths(to_i32(f.int(|k| k.canal_temperature))),
        winter_frequency: f.int(|k| k.winter_frequency),
        summer_frequency: f.int(|k| k.summer_frequency),
        master_zone: f.int(|k| k.master_zone),
        ir_present: f.flag(|k| k.ir_present),
        error_mask: to_mask(f.int(|k| k.error_mask)),
        zones,
    }
}

pub fn parse_object(text: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim())? {
        Value::Object(obj) => Ok(obj),
        other => Err(Error::Protocol(format!("expected a JSON object, got {other}"))),
    }
}

fn result_code(obj: &Map<String, Value>) -> Option<ResultCode> {
    obj.get(KEY_RESULT).and_then(as_int).map(ResultCode::from_wire)
}

/// Parses a command-style response and returns its `res` code.
pub fn parse_result_code(text: &str) -> Result<ResultCode> {
    let obj = parse_object(text)?;
    result_code(&obj).ok_or_else(|| Error::Protocol(format!("response without result code: {text}")))
}

/// Status responses must echo the command; a bare non-ok `res` means the
/// device refused the request (typically a wrong PIN).
fn parse_status_object(text: &str) -> Result<(Map<String, Value>, Schema)> {
    let obj = parse_object(text)?;
    if let Some(code) = result_code(&obj)
        && code != ResultCode::Ok
    {
        return Err(Error::CommandRejected { code });
    }
    let schema = match obj.get(KEY_COMMAND).and_then(|v| v.as_str()) {
        Some(command) => Schema::from_echo(command),
        None => {
            return Err(Error::Protocol(format!(
                "status response without command echo: {text}"
            )));
        }
    };
    Ok((obj, schema))
}

pub fn decode_status(text: &str) -> Result<ControlUnit> {
    let (obj, schema) = parse_status_object(text)?;
    Ok(unit_from_map(&obj, schema))
}

/// Zone detail arrives either wrapped in a one-element `zone` array or flat.
/// A reply carrying no zone record (empty array, or neither an id nor a name)
/// is a protocol error rather than an all-zero zone.
pub fn decode_zone_status(text: &str) -> Result<Zone> {
    let (obj, schema) = parse_status_object(text)?;
    let record = match obj.get(KEY_ZONES) {
        Some(Value::Array(zones)) => zones.first().and_then(|z| z.as_object()).ok_or_else(|| {
            Error::Protocol(format!("zone detail without a zone record: {text}"))
        })?,
        _ => &obj,
    };
    if !has_zone_identity(record) {
        return Err(Error::Protocol(format!(
            "zone detail without zone id or name: {text}"
        )));
    }
    Ok(zone_from_map(record, schema))
}

fn has_zone_identity(obj: &Map<String, Value>) -> bool {
    [&FULL_ZONE_KEYS, &REDUCED_ZONE_KEYS]
        .iter()
        .any(|keys| obj.contains_key(keys.id) || obj.contains_key(keys.name))
}

/// Copy of an outgoing message safe to write to logs.
pub fn redact_pin(message: &Value) -> Value {
    let mut redacted = message.clone();
    if let Some(obj) = redacted.as_object_mut()
        && obj.contains_key(KEY_PIN)
    {
        obj.insert(KEY_PIN.to_string(), Value::String("****".to_string()));
    }
    redacted
}

pub fn command_name(message: &Value) -> &str {
    message
        .get(KEY_COMMAND)
        .and_then(|v| v.as_str())
        .unwrap_or("?")
}
