use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{
    DEFAULT_PIN, DEFAULT_PORT, ResultCode, UnitUpdate, ZoneUpdate, check_pin_message, command_name,
    decode_status, decode_zone_status, parse_result_code, reduced_status_message, status_message,
    update_date_message, update_unit_message, update_zone_message, zone_status_message,
};
use crate::transport::{TcpTransport, TransportConfig};
use crate::types::*;
use crate::{Error, Result};

pub struct ProAirClientBuilder {
    host: String,
    port: u16,
    pin: String,
    transport: TransportConfig,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl ProAirClientBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            pin: DEFAULT_PIN.to_string(),
            transport: TransportConfig::default(),
            log_mode: None,
            log_path: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.host.clone())
            .port(config.port)
            .pin(config.pin.clone())
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = pin.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.transport.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.transport.read_timeout = timeout;
        self
    }

    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport = config;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<ProAirClient> {
        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(MessageLogger::new(mode, &path)?),
            _ => None,
        };

        Ok(ProAirClient {
            transport: TcpTransport::new(&self.host, self.port, self.transport),
            pin: self.pin,
            last_status: None,
            logger,
        })
    }
}

/// Stateful API for one control unit.
///
/// The unit's update commands are full-record writes: a field missing from
/// `upd_cu` or `upd_zona` is reset on the device. Every mutation is therefore
/// composed from the last full status read (fetched first when nothing is
/// cached), and the cache is dropped after a successful write so the next
/// operation reads fresh state instead of trusting the composed record.
///
/// Methods take `&mut self`; callers sharing one client across tasks must
/// serialize access (see [`crate::RefreshCoordinator`]).
pub struct ProAirClient {
    transport: TcpTransport,
    pin: String,
    last_status: Option<ControlUnit>,
    logger: Option<MessageLogger>,
}

impl ProAirClient {
    pub fn builder(host: impl Into<String>) -> ProAirClientBuilder {
        ProAirClientBuilder::new(host)
    }

    pub fn addr(&self) -> &str {
        self.transport.addr()
    }

    /// Last full status read, if it has not been invalidated since.
    pub fn cached_status(&self) -> Option<&ControlUnit> {
        self.last_status.as_ref()
    }

    pub fn invalidate_cache(&mut self) {
        if self.last_status.take().is_some() {
            debug!("status cache invalidated");
        }
    }

    /// Sends `check_pin` and reports failures in full.
    pub async fn verify_credential(&mut self) -> Result<()> {
        self.send_command(check_pin_message(&self.pin), None).await
    }

    /// Setup-time PIN check. Any failure is logged and reported as `false`:
    /// a wrong PIN, an unreachable unit, and also a malformed or unparseable
    /// reply. Use [`Self::verify_credential`] when the reason matters.
    pub async fn check_credential(&mut self) -> bool {
        match self.verify_credential().await {
            Ok(()) => true,
            Err(e) => {
                warn!(addr = %self.addr(), error = %e, "credential check failed");
                false
            }
        }
    }

    /// Reads the full status and replaces the cached state with it.
    pub async fn fetch_status(&mut self) -> Result<ControlUnit> {
        let text = self.request(status_message(&self.pin), None).await?;
        let cu = decode_status(&text)?;
        debug!(zones = cu.zones.len(), mode = %cu.mode_description(), "status fetched");
        self.last_status = Some(cu.clone());
        Ok(cu)
    }

    /// Same as [`Self::fetch_status`] using the abbreviated `stato_r` layout.
    pub async fn fetch_reduced_status(&mut self) -> Result<ControlUnit> {
        let text = self.request(reduced_status_message(&self.pin), None).await?;
        let cu = decode_status(&text)?;
        debug!(zones = cu.zones.len(), "reduced status fetched");
        self.last_status = Some(cu.clone());
        Ok(cu)
    }

    /// Detailed status of one zone. Leaves the cached state untouched.
    pub async fn fetch_zone_status(&mut self, zone_id: u8) -> Result<Zone> {
        let text = self
            .request(zone_status_message(&self.pin, zone_id), Some(zone_id))
            .await?;
        let mut zone = decode_zone_status(&text)?;
        if zone.id == 0 {
            zone.id = zone_id;
        } else if zone.id != zone_id {
            warn!(requested = zone_id, received = zone.id, "zone detail for a different zone");
        }
        Ok(zone)
    }

    // -- Control unit commands --

    pub async fn set_unit_on(&mut self) -> Result<()> {
        let cu = self.current_status().await?;
        self.write_unit("set_unit_on", UnitUpdate { is_off: false, ..UnitUpdate::from(&cu) })
            .await
    }

    pub async fn set_unit_off(&mut self) -> Result<()> {
        let cu = self.current_status().await?;
        self.write_unit("set_unit_off", UnitUpdate { is_off: true, ..UnitUpdate::from(&cu) })
            .await
    }

    /// Sets the supply-duct temperature. Sub-tenth precision is truncated.
    pub async fn set_canal_temperature(&mut self, temp: Temperature) -> Result<()> {
        let cu = self.current_status().await?;
        self.write_unit(
            "set_canal_temperature",
            UnitUpdate {
                canal_temperature: temp,
                ..UnitUpdate::from(&cu)
            },
        )
        .await
    }

    /// Switches to the cooling season with the given sub-mode.
    pub async fn set_cooling_mode(&mut self, mode: CoolingMode) -> Result<()> {
        let cu = self.current_status().await?;
        self.write_unit(
            "set_cooling_mode",
            UnitUpdate {
                is_cooling: true,
                cool_mode: mode.wire_value(),
                ..UnitUpdate::from(&cu)
            },
        )
        .await
    }

    pub async fn set_heating_mode(&mut self) -> Result<()> {
        let cu = self.current_status().await?;
        self.write_unit(
            "set_heating_mode",
            UnitUpdate {
                is_cooling: false,
                cool_mode: 0,
                ..UnitUpdate::from(&cu)
            },
        )
        .await
    }

    // -- Zone commands --

    pub async fn set_zone_on(&mut self, zone_id: u8) -> Result<()> {
        let zone = self.zone_from_status(zone_id).await?;
        self.write_zone("set_zone_on", ZoneUpdate { is_off: false, ..ZoneUpdate::from(&zone) })
            .await
    }

    pub async fn set_zone_off(&mut self, zone_id: u8) -> Result<()> {
        let zone = self.zone_from_status(zone_id).await?;
        self.write_zone("set_zone_off", ZoneUpdate { is_off: true, ..ZoneUpdate::from(&zone) })
            .await
    }

    pub async fn set_zone_temperature(&mut self, zone_id: u8, temp: Temperature) -> Result<()> {
        let zone = self.zone_from_status(zone_id).await?;
        self.write_zone(
            "set_zone_temperature",
            ZoneUpdate {
                target_temperature: temp,
                ..ZoneUpdate::from(&zone)
            },
        )
        .await
    }

    /// Fan-coil speed: 0-3, or 7 for automatic.
    pub async fn set_zone_fan_speed(&mut self, zone_id: u8, speed: u8) -> Result<()> {
        let fan_set = ActuatorSetting::try_from(speed)?;
        let zone = self.zone_from_status(zone_id).await?;
        self.write_zone(
            "set_zone_fan_speed",
            ZoneUpdate {
                fan_set,
                ..ZoneUpdate::from(&zone)
            },
        )
        .await
    }

    /// Damper opening: 0-3, or 7 for automatic.
    pub async fn set_zone_damper_opening(&mut self, zone_id: u8, opening: u8) -> Result<()> {
        let damper_set = ActuatorSetting::try_from(opening)?;
        let zone = self.zone_from_status(zone_id).await?;
        self.write_zone(
            "set_zone_damper_opening",
            ZoneUpdate {
                damper_set,
                ..ZoneUpdate::from(&zone)
            },
        )
        .await
    }

    /// Enables or disables the zone's weekly schedule ("crono").
    pub async fn set_zone_schedule_mode(&mut self, zone_id: u8, enabled: bool) -> Result<()> {
        let zone = self.zone_from_status(zone_id).await?;
        self.write_zone(
            "set_zone_schedule_mode",
            ZoneUpdate {
                crono_mode: enabled,
                ..ZoneUpdate::from(&zone)
            },
        )
        .await
    }

    /// Sets the unit's clock to local time.
    pub async fn sync_clock(&mut self) -> Result<()> {
        self.sync_clock_at(Local::now().naive_local()).await
    }

    pub async fn sync_clock_at(&mut self, at: NaiveDateTime) -> Result<()> {
        self.send_command(update_date_message(&self.pin, at), None)
            .await?;
        self.invalidate_cache();
        debug!(%at, "clock synchronized");
        Ok(())
    }

    // -- Helpers --

    async fn current_status(&mut self) -> Result<ControlUnit> {
        match &self.last_status {
            Some(cu) => Ok(cu.clone()),
            None => self.fetch_status().await,
        }
    }

    async fn zone_from_status(&mut self, zone_id: u8) -> Result<Zone> {
        self.current_status()
            .await?
            .zones
            .into_iter()
            .find(|z| z.id == zone_id)
            .ok_or(Error::NotFound(zone_id))
    }

    async fn write_unit(&mut self, action: &str, update: UnitUpdate) -> Result<()> {
        self.send_command(update_unit_message(&self.pin, &update), None)
            .await?;
        self.invalidate_cache();
        debug!(action, "control unit updated");
        Ok(())
    }

    async fn write_zone(&mut self, action: &str, update: ZoneUpdate) -> Result<()> {
        let zone_id = update.zone_id;
        self.send_command(update_zone_message(&self.pin, &update), Some(zone_id))
            .await?;
        self.invalidate_cache();
        debug!(action, zone_id, "zone updated");
        Ok(())
    }

    /// Sends a command-style message and requires `res` to be ok.
    async fn send_command(&mut self, message: Value, zone: Option<u8>) -> Result<()> {
        let text = self.request(message, zone).await?;
        match parse_result_code(&text)? {
            ResultCode::Ok => Ok(()),
            code => Err(Error::CommandRejected { code }),
        }
    }

    async fn request(&mut self, message: Value, zone: Option<u8>) -> Result<String> {
        let command = command_name(&message).to_string();
        if let Some(ref mut logger) = self.logger {
            logger.log_request(&message, zone);
        }
        debug!(command = %command, zone, "sending request");

        match self.transport.send(&message.to_string()).await {
            Ok(text) => {
                if let Some(ref mut logger) = self.logger {
                    logger.log_response(&command, zone, &text);
                }
                Ok(text)
            }
            Err(e) => {
                if let Some(ref mut logger) = self.logger {
                    logger.log_failure(&command, zone, &e);
                }
                Err(e)
            }
        }
    }
}
