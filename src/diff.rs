use serde_json::Value;

use crate::types::*;

pub(crate) fn diff_json(
    previous: &Value,
    current: &Value,
    path_prefix: &str,
    changes: &mut Vec<(String, Value, Value)>,
) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let path = if path_prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{path_prefix}.{key}")
                };
                match prev_map.get(key) {
                    Some(prev_val) => diff_json(prev_val, curr_val, &path, changes),
                    None => {
                        if curr_val.is_object() {
                            diff_json(&Value::Object(serde_json::Map::new()), curr_val, &path, changes);
                        } else {
                            changes.push((path, Value::Null, curr_val.clone()));
                        }
                    }
                }
            }
        }
        (Value::Array(prev_arr), Value::Array(curr_arr)) if prev_arr.len() == curr_arr.len() => {
            for (i, (prev_val, curr_val)) in prev_arr.iter().zip(curr_arr).enumerate() {
                let path = if path_prefix.is_empty() {
                    i.to_string()
                } else {
                    format!("{path_prefix}.{i}")
                };
                diff_json(prev_val, curr_val, &path, changes);
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((path_prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}

/// Typed change events between two snapshots. Zones are matched by id, not
/// by position. With no previous snapshot every zone is reported as added.
pub(crate) fn diff_snapshots(previous: Option<&ControlUnit>, current: &ControlUnit) -> Vec<Event> {
    let empty = ControlUnit::default();
    let prev = previous.unwrap_or(&empty);
    let mut events = Vec::new();

    if prev.is_off != current.is_off || previous.is_none() {
        events.push(Event::UnitPowerChanged { on: current.is_on() });
    }
    if prev.operating_mode() != current.operating_mode() || previous.is_none() {
        events.push(Event::UnitModeChanged {
            mode: current.operating_mode(),
        });
    }
    if prev.canal_temperature != current.canal_temperature {
        events.push(Event::CanalTemperatureChanged {
            temp: current.canal_temperature,
        });
    }
    if prev.error_mask != current.error_mask {
        events.push(Event::UnitErrorsChanged {
            mask: current.error_mask,
        });
    }

    for zone in &current.zones {
        match prev.zone(zone.id) {
            Some(old) => diff_zone(old, zone, &mut events),
            None => events.push(Event::ZoneAdded {
                zone_id: zone.id,
                name: zone.name.clone(),
            }),
        }
    }
    for old in &prev.zones {
        if current.zone(old.id).is_none() {
            events.push(Event::ZoneRemoved {
                zone_id: old.id,
                name: old.name.clone(),
            });
        }
    }

    events
}

fn diff_zone(old: &Zone, new: &Zone, events: &mut Vec<Event>) {
    let zone_id = new.id;
    let name = || new.name.clone();

    if old.is_off != new.is_off {
        events.push(Event::ZonePowerChanged {
            zone_id,
            name: name(),
            on: new.is_on(),
        });
    }
    if old.temperature != new.temperature {
        events.push(Event::ZoneTemperatureChanged {
            zone_id,
            name: name(),
            temp: new.temperature,
        });
    }
    if old.target_temperature != new.target_temperature {
        events.push(Event::ZoneTargetChanged {
            zone_id,
            name: name(),
            target: new.target_temperature,
        });
    }
    if old.humidity != new.humidity {
        events.push(Event::ZoneHumidityChanged {
            zone_id,
            name: name(),
            humidity: new.humidity,
        });
    }
    if old.fan != new.fan || old.fan_set != new.fan_set {
        events.push(Event::ZoneFanChanged {
            zone_id,
            name: name(),
            setting: new.fan_set,
            actual: new.fan,
        });
    }
    if old.damper != new.damper || old.damper_set != new.damper_set {
        events.push(Event::ZoneDamperChanged {
            zone_id,
            name: name(),
            setting: new.damper_set,
            actual: new.damper,
        });
    }
    if old.crono_mode != new.crono_mode || old.crono_active != new.crono_active {
        events.push(Event::ZoneScheduleChanged {
            zone_id,
            name: name(),
            crono_mode: new.crono_mode,
            crono_active: new.crono_active,
        });
    }
    if old.window_open != new.window_open
        || old.badge_present != new.badge_present
        || old.cut_off != new.cut_off
    {
        events.push(Event::ZoneContactsChanged {
            zone_id,
            name: name(),
            window_open: new.window_open,
            badge_present: new.badge_present,
            cut_off: new.cut_off,
        });
    }
    if old.error_mask != new.error_mask {
        events.push(Event::ZoneErrorsChanged {
            zone_id,
            name: name(),
            mask: new.error_mask,
        });
    }
}
