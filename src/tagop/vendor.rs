/// Silicon families with vendor custom command sets. The family is the
/// dispatch discriminant for the codec; each family owns its own variant
/// enum below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipFamily {
    AlienHiggs2,
    AlienHiggs3,
    NxpG2,
    ImpinjMonza4,
    IdsSl900a,
    DenatranIav,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorOp {
    pub chip: ChipFamily,
    pub op: VendorVariant,
    pub access_password: Option<u32>,
}

/// Representative command set per family. Families follow one pattern: a
/// custom OpSpec with a per-command subtype and a fixed field payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorVariant {
    // Alien Higgs 2
    Higgs2PartialLoadImage {
        kill_password: u32,
        access_password: u32,
        epc: Vec<u8>,
    },
    // Alien Higgs 3
    Higgs3FastLoadImage {
        current_access_password: u32,
        kill_password: u32,
        access_password: u32,
        pc: u16,
        epc: Vec<u8>,
    },
    Higgs3BlockReadLock {
        lock_bits: u8,
    },
    // NXP G2X
    NxpSetReadProtect,
    NxpResetReadProtect,
    NxpChangeEas {
        reset: bool,
    },
    NxpCalibrate,
    // Impinj Monza 4
    Monza4QtReadWrite {
        write: bool,
        persist: bool,
        /// QT payload: bit 15 short range, bit 14 public memory map.
        payload: u16,
    },
    // IDS SL900A sensor logger
    Sl900aGetBatteryLevel,
    Sl900aGetSensorValue {
        sensor: Sl900aSensor,
    },
    Sl900aSetLogMode {
        form: u8,
        storage_rule: u8,
        ext1_enable: bool,
        ext2_enable: bool,
        temp_enable: bool,
        batt_enable: bool,
        log_interval_s: u16,
    },
    Sl900aGetLogState,
    // Denatran IAV secure toll tags
    IavActivateSecureMode {
        payload: Vec<u8>,
    },
    IavObuAuthId {
        payload: Vec<u8>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sl900aSensor {
    Temperature,
    External1,
    External2,
    Battery,
}

impl Sl900aSensor {
    pub fn code(&self) -> u8 {
        match self {
            Sl900aSensor::Temperature => 0,
            Sl900aSensor::External1 => 1,
            Sl900aSensor::External2 => 2,
            Sl900aSensor::Battery => 3,
        }
    }
}

impl VendorVariant {
    /// Which silicon family the command belongs to. An op whose declared
    /// chip disagrees with its variant is rejected at encode.
    pub fn family(&self) -> ChipFamily {
        match self {
            VendorVariant::Higgs2PartialLoadImage { .. } => ChipFamily::AlienHiggs2,
            VendorVariant::Higgs3FastLoadImage { .. }
            | VendorVariant::Higgs3BlockReadLock { .. } => ChipFamily::AlienHiggs3,
            VendorVariant::NxpSetReadProtect
            | VendorVariant::NxpResetReadProtect
            | VendorVariant::NxpChangeEas { .. }
            | VendorVariant::NxpCalibrate => ChipFamily::NxpG2,
            VendorVariant::Monza4QtReadWrite { .. } => ChipFamily::ImpinjMonza4,
            VendorVariant::Sl900aGetBatteryLevel
            | VendorVariant::Sl900aGetSensorValue { .. }
            | VendorVariant::Sl900aSetLogMode { .. }
            | VendorVariant::Sl900aGetLogState => ChipFamily::IdsSl900a,
            VendorVariant::IavActivateSecureMode { .. }
            | VendorVariant::IavObuAuthId { .. } => ChipFamily::DenatranIav,
        }
    }
}

/// Battery level reading from an SL900A: battery type and a 10 bit ADC
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sl900aBatteryLevel {
    pub battery_type: u8,
    pub value: u16,
}

/// Sensor reading from an SL900A: error flag, range limit and a 10 bit
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sl900aSensorReading {
    pub ad_error: bool,
    pub range_limit: u8,
    pub value: u16,
}

/// Logging state of an SL900A: limit crossing counters plus the system
/// status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sl900aLogState {
    pub extreme_lower: u8,
    pub lower: u8,
    pub upper: u8,
    pub extreme_upper: u8,
    pub measurement_count: u16,
    pub active: bool,
}

/// Parsed view of a vendor command's reply payload, matched to the
/// request variant that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorValue {
    BatteryLevel(Sl900aBatteryLevel),
    SensorReading(Sl900aSensorReading),
    LogState(Sl900aLogState),
}
