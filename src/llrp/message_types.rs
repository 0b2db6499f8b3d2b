/// The LLRP message type space as a closed enum. Conversions are total in
/// both directions with an explicit unknown-code error path instead of a
/// lookup map miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    GetSupportedVersion,
    GetSupportedVersionResponse,
    SetProtocolVersion,
    SetProtocolVersionResponse,
    GetReaderCapabilities,
    GetReaderCapabilitiesResponse,
    AddRospec,
    AddRospecResponse,
    DeleteRospec,
    DeleteRospecResponse,
    StartRospec,
    StartRospecResponse,
    StopRospec,
    StopRospecResponse,
    EnableRospec,
    EnableRospecResponse,
    DisableRospec,
    DisableRospecResponse,
    GetRospecs,
    GetRospecsResponse,
    AddAccessSpec,
    AddAccessSpecResponse,
    DeleteAccessSpec,
    DeleteAccessSpecResponse,
    EnableAccessSpec,
    EnableAccessSpecResponse,
    DisableAccessSpec,
    DisableAccessSpecResponse,
    GetAccessSpecs,
    GetAccessSpecsResponse,
    ClientRequestOp,
    ClientRequestOpResponse,
    GetReaderConfig,
    GetReaderConfigResponse,
    SetReaderConfig,
    SetReaderConfigResponse,
    CloseConnection,
    CloseConnectionResponse,
    GetReport,
    RoAccessReport,
    Keepalive,
    KeepaliveAck,
    ReaderEventNotification,
    EnableEventsAndReports,
    ErrorMessage,
    CustomMessage,
}

impl MessageType {
    pub fn code(&self) -> u16 {
        match self {
            MessageType::GetSupportedVersion => 46,
            MessageType::GetSupportedVersionResponse => 56,
            MessageType::SetProtocolVersion => 47,
            MessageType::SetProtocolVersionResponse => 57,
            MessageType::GetReaderCapabilities => 1,
            MessageType::GetReaderCapabilitiesResponse => 11,
            MessageType::AddRospec => 20,
            MessageType::AddRospecResponse => 30,
            MessageType::DeleteRospec => 21,
            MessageType::DeleteRospecResponse => 31,
            MessageType::StartRospec => 22,
            MessageType::StartRospecResponse => 32,
            MessageType::StopRospec => 23,
            MessageType::StopRospecResponse => 33,
            MessageType::EnableRospec => 24,
            MessageType::EnableRospecResponse => 34,
            MessageType::DisableRospec => 25,
            MessageType::DisableRospecResponse => 35,
            MessageType::GetRospecs => 26,
            MessageType::GetRospecsResponse => 36,
            MessageType::AddAccessSpec => 40,
            MessageType::AddAccessSpecResponse => 50,
            MessageType::DeleteAccessSpec => 41,
            MessageType::DeleteAccessSpecResponse => 51,
            MessageType::EnableAccessSpec => 42,
            MessageType::EnableAccessSpecResponse => 52,
            MessageType::DisableAccessSpec => 43,
            MessageType::DisableAccessSpecResponse => 53,
            MessageType::GetAccessSpecs => 44,
            MessageType::GetAccessSpecsResponse => 54,
            MessageType::ClientRequestOp => 45,
            MessageType::ClientRequestOpResponse => 55,
            MessageType::GetReaderConfig => 2,
            MessageType::GetReaderConfigResponse => 12,
            MessageType::SetReaderConfig => 3,
            MessageType::SetReaderConfigResponse => 13,
            MessageType::CloseConnection => 14,
            MessageType::CloseConnectionResponse => 4,
            MessageType::GetReport => 60,
            MessageType::RoAccessReport => 61,
            MessageType::Keepalive => 62,
            MessageType::KeepaliveAck => 72,
            MessageType::ReaderEventNotification => 63,
            MessageType::EnableEventsAndReports => 64,
            MessageType::ErrorMessage => 100,
            MessageType::CustomMessage => 1023,
        }
    }

    pub fn from_code(kind: u16) -> Result<MessageType, &'static str> {
        match kind {
            46 => Ok(MessageType::GetSupportedVersion),
            56 => Ok(MessageType::GetSupportedVersionResponse),
            47 => Ok(MessageType::SetProtocolVersion),
            57 => Ok(MessageType::SetProtocolVersionResponse),
            1 => Ok(MessageType::GetReaderCapabilities),
            11 => Ok(MessageType::GetReaderCapabilitiesResponse),
            20 => Ok(MessageType::AddRospec),
            30 => Ok(MessageType::AddRospecResponse),
            21 => Ok(MessageType::DeleteRospec),
            31 => Ok(MessageType::DeleteRospecResponse),
            22 => Ok(MessageType::StartRospec),
            32 => Ok(MessageType::StartRospecResponse),
            23 => Ok(MessageType::StopRospec),
            33 => Ok(MessageType::StopRospecResponse),
            24 => Ok(MessageType::EnableRospec),
            34 => Ok(MessageType::EnableRospecResponse),
            25 => Ok(MessageType::DisableRospec),
            35 => Ok(MessageType::DisableRospecResponse),
            26 => Ok(MessageType::GetRospecs),
            36 => Ok(MessageType::GetRospecsResponse),
            40 => Ok(MessageType::AddAccessSpec),
            50 => Ok(MessageType::AddAccessSpecResponse),
            41 => Ok(MessageType::DeleteAccessSpec),
            51 => Ok(MessageType::DeleteAccessSpecResponse),
            42 => Ok(MessageType::EnableAccessSpec),
            52 => Ok(MessageType::EnableAccessSpecResponse),
            43 => Ok(MessageType::DisableAccessSpec),
            53 => Ok(MessageType::DisableAccessSpecResponse),
            44 => Ok(MessageType::GetAccessSpecs),
            54 => Ok(MessageType::GetAccessSpecsResponse),
            45 => Ok(MessageType::ClientRequestOp),
            55 => Ok(MessageType::ClientRequestOpResponse),
            2 => Ok(MessageType::GetReaderConfig),
            12 => Ok(MessageType::GetReaderConfigResponse),
            3 => Ok(MessageType::SetReaderConfig),
            13 => Ok(MessageType::SetReaderConfigResponse),
            14 => Ok(MessageType::CloseConnection),
            4 => Ok(MessageType::CloseConnectionResponse),
            60 => Ok(MessageType::GetReport),
            61 => Ok(MessageType::RoAccessReport),
            62 => Ok(MessageType::Keepalive),
            72 => Ok(MessageType::KeepaliveAck),
            63 => Ok(MessageType::ReaderEventNotification),
            64 => Ok(MessageType::EnableEventsAndReports),
            100 => Ok(MessageType::ErrorMessage),
            1023 => Ok(MessageType::CustomMessage),
            _ => Err("unknown message type code"),
        }
    }

    /// Messages the reader sends without being asked. Everything else is a
    /// response to an outstanding request.
    pub fn asynchronous(&self) -> bool {
        matches!(
            self,
            MessageType::RoAccessReport
                | MessageType::Keepalive
                | MessageType::ReaderEventNotification
        )
    }
}

// Raw codes for places that build headers directly.
pub const GET_READER_CAPABILITIES: u16 = 1;
pub const ADD_ROSPEC: u16 = 20;
pub const DELETE_ROSPEC: u16 = 21;
pub const START_ROSPEC: u16 = 22;
pub const STOP_ROSPEC: u16 = 23;
pub const ENABLE_ROSPEC: u16 = 24;
pub const DISABLE_ROSPEC: u16 = 25;
pub const ADD_ACCESS_SPEC: u16 = 40;
pub const DELETE_ACCESS_SPEC: u16 = 41;
pub const ENABLE_ACCESS_SPEC: u16 = 42;
pub const GET_READER_CONFIG: u16 = 2;
pub const SET_READER_CONFIG: u16 = 3;
pub const CLOSE_CONNECTION: u16 = 14;
pub const RO_ACCESS_REPORT: u16 = 61;
pub const KEEPALIVE: u16 = 62;
pub const KEEPALIVE_ACK: u16 = 72;
pub const READER_EVENT_NOTIFICATION: u16 = 63;
pub const ENABLE_EVENTS_AND_REPORTS: u16 = 64;
