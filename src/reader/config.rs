use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ReaderError;
use crate::llrp::requests::{self, push_u16, tlv};
use crate::llrp::{self, message_types, parameter_types};
use crate::reader::transport::LlrpConnection;

/// Transmit power bounds in centi-dBm. The M6e family tops out at
/// 31.5 dBm and will not key below 10 dBm.
pub const MIN_POWER_CDBM: i32 = 1000;
pub const MAX_POWER_CDBM: i32 = 3150;

/// Responses to configuration requests are expected well inside this.
pub const CONFIG_TIMEOUT: Duration = Duration::from_secs(5);

/// Gen2 inventory target flag rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gen2Target {
    A,
    B,
    #[serde(rename = "a_b")]
    AB,
    #[serde(rename = "b_a")]
    BA,
}

/// One GPO line held high or low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpoState {
    pub port: u16,
    pub high: bool,
}

/// Everything configurable about a reader. Serializes so callers can
/// persist a profile and load it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderSettings {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub description: String,
    /// Reported by the reader at connect; read only.
    #[serde(default)]
    pub firmware_version: String,
    /// Antennas the reader exposes, reported at connect.
    #[serde(default)]
    pub antennas: Vec<u16>,
    #[serde(default = "default_power")]
    pub read_power_cdbm: i32,
    #[serde(default = "default_power")]
    pub write_power_cdbm: i32,
    #[serde(default)]
    pub session: u8,
    #[serde(default = "default_target")]
    pub target: Gen2Target,
    /// Fixed Q, or None for the reader's dynamic algorithm.
    #[serde(default)]
    pub static_q: Option<u8>,
    #[serde(default)]
    pub tari_ns: Option<u32>,
    #[serde(default)]
    pub link_frequency_khz: Option<u32>,
    /// Report each EPC once per antenna instead of once per reader.
    #[serde(default)]
    pub unique_by_antenna: bool,
    /// When deduplicating, keep the read with the strongest signal.
    #[serde(default)]
    pub record_highest_rssi: bool,
    #[serde(default)]
    pub enabled_gpis: Vec<u16>,
    #[serde(default)]
    pub gpo_states: Vec<GpoState>,
    #[serde(default = "default_async_on")]
    pub async_on_time_ms: u32,
    #[serde(default = "default_async_off")]
    pub async_off_time_ms: u32,
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_ms: u32,
    /// Applied to access ops whose own password is unset.
    #[serde(default)]
    pub access_password: u32,
    #[serde(default = "default_tag_population")]
    pub tag_population: u16,
}

fn default_power() -> i32 {
    MAX_POWER_CDBM
}

fn default_target() -> Gen2Target {
    Gen2Target::AB
}

fn default_async_on() -> u32 {
    250
}

fn default_async_off() -> u32 {
    0
}

fn default_keepalive_interval() -> u32 {
    5000
}

fn default_tag_population() -> u16 {
    32
}

impl Default for ReaderSettings {
    fn default() -> ReaderSettings {
        ReaderSettings {
            hostname: String::new(),
            description: String::new(),
            firmware_version: String::new(),
            antennas: Vec::new(),
            read_power_cdbm: default_power(),
            write_power_cdbm: default_power(),
            session: 0,
            target: default_target(),
            static_q: None,
            tari_ns: None,
            link_frequency_khz: None,
            unique_by_antenna: false,
            record_highest_rssi: false,
            enabled_gpis: Vec::new(),
            gpo_states: Vec::new(),
            async_on_time_ms: default_async_on(),
            async_off_time_ms: default_async_off(),
            keepalive_interval_ms: default_keepalive_interval(),
            access_password: 0,
            tag_population: 0x20,
        }
    }
}

impl ReaderSettings {
    pub fn validate(&self) -> Result<(), ReaderError> {
        for (name, power) in [
            ("read", self.read_power_cdbm),
            ("write", self.write_power_cdbm),
        ] {
            if !(MIN_POWER_CDBM..=MAX_POWER_CDBM).contains(&power) {
                return Err(ReaderError::InvalidArgument(format!(
                    "{name} power {power} outside {MIN_POWER_CDBM}..={MAX_POWER_CDBM} centi-dBm"
                )))
            }
        }
        if self.session > 3 {
            return Err(ReaderError::InvalidArgument(format!(
                "gen2 session {} must be 0 through 3",
                self.session
            )))
        }
        if let Some(q) = self.static_q {
            if q > 15 {
                return Err(ReaderError::InvalidArgument(format!(
                    "static q {q} must be 0 through 15"
                )))
            }
        }
        if self.keepalive_interval_ms == 0 {
            return Err(ReaderError::InvalidArgument(String::from(
                "keepalive interval must be nonzero",
            )))
        }
        Ok(())
    }
}

/// Transact and verify the response carries a successful LLRPStatus.
pub fn transact_checked(
    connection: &dyn LlrpConnection,
    buf: &[u8],
) -> Result<llrp::Message, ReaderError> {
    let response = connection.transact(buf, CONFIG_TIMEOUT)?;
    let status = llrp::parse_status(&response.payload)
        .map_err(|e| ReaderError::Communication(e.to_string()))?;
    if !status.success() {
        // some readers leave the description empty
        let message = if status.description.is_empty() {
            String::from(parameter_types::status_name(status.status))
        } else {
            status.description
        };
        return Err(ReaderError::Protocol { status: status.status, message })
    }
    Ok(response)
}

/// Push the reader's keepalive cadence and the event subscriptions the
/// lifecycle depends on. Run once right after the connection comes up.
pub fn configure_connection(
    connection: &dyn LlrpConnection,
    settings: &ReaderSettings,
) -> Result<(), ReaderError> {
    let id = connection.next_id();
    transact_checked(
        connection,
        &requests::set_keepalive(&id, &settings.keepalive_interval_ms),
    )?;
    let id = connection.next_id();
    transact_checked(connection, &requests::set_event_notifications(&id))?;
    Ok(())
}

/// Apply transmit power and GPO state over SET_READER_CONFIG.
pub fn apply_settings(
    connection: &dyn LlrpConnection,
    settings: &ReaderSettings,
) -> Result<(), ReaderError> {
    settings.validate()?;
    let mut payload = Vec::new();
    // restore factory defaults - no
    payload.push(0x00);
    for antenna in &settings.antennas {
        payload.extend(antenna_power(*antenna, settings.read_power_cdbm));
    }
    for gpo in &settings.gpo_states {
        let mut data = Vec::with_capacity(3);
        push_u16(&mut data, gpo.port);
        data.push(if gpo.high { 0x80 } else { 0x00 });
        payload.extend(tlv(parameter_types::GPO_WRITE_DATA, &data));
    }
    let id = connection.next_id();
    let msg = requests::message(message_types::SET_READER_CONFIG, &id, &payload);
    transact_checked(connection, &msg)?;
    Ok(())
}

/// Antenna configuration carrying just an RF transmitter power index.
/// Power is sent as an index into the reader's power table; ThingMagic
/// readers key the table in centi-dBm steps from the minimum.
fn antenna_power(antenna: u16, power_cdbm: i32) -> Vec<u8> {
    let index = (power_cdbm - MIN_POWER_CDBM) / 25 + 1;
    let mut transmitter = Vec::with_capacity(6);
    // hop table id and channel index are fixed for fcc readers
    push_u16(&mut transmitter, 1);
    push_u16(&mut transmitter, 1);
    push_u16(&mut transmitter, index as u16);
    let mut config = Vec::new();
    push_u16(&mut config, antenna);
    config.extend(tlv(parameter_types::RF_TRANSMITTER, &transmitter));
    tlv(parameter_types::ANTENNA_CONFIGURATION, &config)
}

/// GET_READER_CONFIG for everything the reader will report.
pub fn get_reader_config(id: &u32) -> Vec<u8> {
    let mut payload = Vec::new();
    // antenna id 0 - all antennas
    push_u16(&mut payload, 0);
    // requested data 0 - all
    payload.push(0x00);
    // gpi port 0, gpo port 0 - all
    push_u16(&mut payload, 0);
    push_u16(&mut payload, 0);
    requests::message(message_types::GET_READER_CONFIG, id, &payload)
}

/// GET_READER_CAPABILITIES for everything the reader will report.
pub fn get_reader_capabilities(id: &u32) -> Vec<u8> {
    // requested data 0 - all
    requests::message(message_types::GET_READER_CAPABILITIES, id, &[0x00])
}

/// Pull the antenna list and firmware version out of a connect
/// handshake. Fields the reader leaves out keep their prior values.
pub fn absorb_capabilities(settings: &mut ReaderSettings, response: &llrp::Message) {
    let mut params = llrp::ParamReader::new(&response.payload);
    while let Ok(Some(param)) = params.next_param() {
        match param.kind {
            parameter_types::GENERAL_DEVICE_CAPABILITIES => {
                // max antennas u16, can set utc bit u16, device
                // manufacturer u32, model u32, firmware utf8
                if param.data.len() >= 14 {
                    if let Ok(count) = llrp::read_u16(param.data, 0) {
                        settings.antennas = (1..=count).collect();
                    }
                    let fw_len = llrp::read_u16(param.data, 12).unwrap_or(0) as usize;
                    if param.data.len() >= 14 + fw_len {
                        if let Ok(fw) = String::from_utf8(param.data[14..14 + fw_len].to_vec()) {
                            settings.firmware_version = fw;
                        }
                    }
                }
            }
            parameter_types::IDENTIFICATION => {
                if param.data.len() > 3 {
                    let len = llrp::read_u16(param.data, 1).unwrap_or(0) as usize;
                    if param.data.len() >= 3 + len {
                        if let Ok(name) = String::from_utf8(param.data[3..3 + len].to_vec()) {
                            settings.hostname = name;
                        }
                    }
                }
            }
            _ => (),
        }
    }
}
