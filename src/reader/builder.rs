use crate::error::ReaderError;
use crate::filter::TagFilter;
use crate::llrp::parameter_types;
use crate::llrp::requests::{custom_parameter, push_u16, push_u32, tlv};
use crate::plan::{SimpleReadPlan, TagProtocol};
use crate::reader::config::ReaderSettings;
use crate::reader::opspec;
use crate::tagop::Gen2MemoryBank;

/// Custom inventory parameter subtypes.
pub const TM_FAST_SEARCH_SUBTYPE: u32 = 130;
pub const TM_ISO18K6B_INVENTORY_FILTER_SUBTYPE: u32 = 131;

/// Firmware began reporting phase at this version.
pub const MIN_PHASE_FIRMWARE: (u32, u32) = (5, 3);

/// How the boundary spec of a built ROSpec starts, which determines
/// whether stopping it later takes a STOP_ROSPEC or a DISABLE_ROSPEC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartTriggerKind {
    /// Started explicitly with START_ROSPEC.
    Null,
    /// Re-fires on its own; never explicitly started.
    Periodic,
}

/// Timing mode for a build pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// One bounded inventory round.
    Bounded,
    /// Runs until stopped.
    Continuous,
}

/// Monotonic id counters shared across one top level call. Reset only at
/// the start of the next `read`/`start_reading`/`execute_tag_op`.
pub struct SpecIds {
    ro: u32,
    access: u32,
    op: u32,
}

impl SpecIds {
    pub fn new() -> SpecIds {
        SpecIds { ro: 0, access: 0, op: 0 }
    }

    pub fn reset(&mut self) {
        self.ro = 0;
        self.access = 0;
        self.op = 0;
    }

    pub fn next_rospec(&mut self) -> u32 {
        self.ro += 1;
        self.ro
    }

    /// The most recently issued rospec id.
    pub fn current_rospec(&self) -> u32 {
        self.ro
    }

    pub fn next_access_spec(&mut self) -> u32 {
        self.access += 1;
        self.access
    }

    pub fn next_op_spec(&mut self) -> u32 {
        self.op += 1;
        self.op
    }
}

impl Default for SpecIds {
    fn default() -> Self {
        SpecIds::new()
    }
}

/// Everything the lifecycle needs to submit and later tear down one leaf
/// plan's specs.
#[derive(Debug)]
pub struct BuiltSpec {
    pub rospec_id: u32,
    pub rospec: Vec<u8>,
    pub access_spec: Option<(u32, Vec<u8>)>,
    pub protocol: TagProtocol,
    pub start_trigger: StartTriggerKind,
}

/// Build the ROSpec (and AccessSpec, when the plan embeds an operation)
/// for one leaf plan. Pure translation: nothing here touches the wire.
pub fn build_spec(
    ids: &mut SpecIds,
    plan: &SimpleReadPlan,
    duration_ms: u32,
    mode: ReadMode,
    multi_plan: bool,
    standalone: bool,
    settings: &ReaderSettings,
) -> Result<BuiltSpec, ReaderError> {
    // consume the id first so each leaf holds exactly one rospec id even
    // when its build fails
    let rospec_id = ids.next_rospec();
    if let Some(filter) = &plan.filter {
        filter.validate()?;
    }
    let start_trigger = match (mode, multi_plan) {
        (ReadMode::Continuous, true) => StartTriggerKind::Periodic,
        _ => StartTriggerKind::Null,
    };

    let access_spec = match &plan.op {
        Some(op) => {
            let access_spec_id = ids.next_access_spec();
            let op_spec_id = ids.next_op_spec();
            let op_spec = opspec::encode(op_spec_id, op, settings.access_password)?;
            let antenna = plan.antennas.first().copied().unwrap_or(0);
            let body = build_access_spec(
                access_spec_id,
                rospec_id,
                antenna,
                plan.protocol,
                plan.filter.as_ref(),
                &op_spec,
                standalone,
            )?;
            Some((access_spec_id, body))
        }
        None => None,
    };

    // boundary spec
    let mut boundary = Vec::new();
    match start_trigger {
        StartTriggerKind::Null => {
            // trigger type - 0 null, starts with START_ROSPEC
            boundary.extend(tlv(parameter_types::RO_SPEC_START_TRIGGER, &[0x00]));
        }
        StartTriggerKind::Periodic => {
            let mut periodic = Vec::with_capacity(8);
            // offset
            push_u32(&mut periodic, 0);
            // period: one on/off rotation
            push_u32(
                &mut periodic,
                settings.async_on_time_ms.saturating_add(settings.async_off_time_ms),
            );
            let mut trigger = vec![0x02];
            trigger.extend(tlv(parameter_types::PERIODIC_TRIGGER_VALUE, &periodic));
            boundary.extend(tlv(parameter_types::RO_SPEC_START_TRIGGER, &trigger));
        }
    }
    // stop trigger - 0 null, bounded reads are stopped explicitly
    let mut stop = vec![0x00];
    push_u32(&mut stop, 0);
    boundary.extend(tlv(parameter_types::RO_SPEC_STOP_TRIGGER, &stop));

    // ai spec
    let mut ai = Vec::new();
    if plan.antennas.is_empty() {
        // set to one antenna with an id of 0, meaning all antennas
        push_u16(&mut ai, 1);
        push_u16(&mut ai, 0);
    } else {
        push_u16(&mut ai, plan.antennas.len() as u16);
        for ant in &plan.antennas {
            push_u16(&mut ai, *ant);
        }
    }
    let mut ai_stop = Vec::with_capacity(5);
    match (mode, multi_plan) {
        (ReadMode::Bounded, _) => {
            // duration trigger bounds the inventory round
            ai_stop.push(0x01);
            push_u32(&mut ai_stop, duration_ms);
        }
        (ReadMode::Continuous, true) => {
            // rotate to the next plan after the on time
            ai_stop.push(0x01);
            push_u32(&mut ai_stop, settings.async_on_time_ms);
        }
        (ReadMode::Continuous, false) => {
            // null: runs until the rospec is disabled
            ai_stop.push(0x00);
            push_u32(&mut ai_stop, 0);
        }
    }
    ai.extend(tlv(parameter_types::AI_SPEC_STOP_TRIGGER, &ai_stop));
    ai.extend(build_inventory_parameter_spec(rospec_id, plan, settings)?);

    // report spec: report every read as it happens
    let mut report = Vec::new();
    // ro report trigger - 2 with n = 1 reports every read
    report.push(0x02);
    push_u16(&mut report, 1);
    report.extend(build_content_selector(plan, settings));

    let mut rospec = Vec::new();
    push_u32(&mut rospec, rospec_id);
    // priority 0-7, lower is higher
    rospec.push(0x00);
    // current state - disabled until enabled
    rospec.push(0x00);
    rospec.extend(tlv(parameter_types::RO_BOUNDARY_SPEC, &boundary));
    rospec.extend(tlv(parameter_types::AI_SPEC, &ai));
    rospec.extend(tlv(parameter_types::RO_REPORT_SPEC, &report));

    Ok(BuiltSpec {
        rospec_id,
        rospec: tlv(parameter_types::RO_SPEC, &rospec),
        access_spec,
        protocol: plan.protocol,
        start_trigger,
    })
}

fn protocol_id(protocol: TagProtocol) -> u8 {
    match protocol {
        // EPCGlobal C1G2
        TagProtocol::Gen2 => 1,
        // ISO 18000-6B rides a vendor extension; the spec id byte uses the
        // unspecified air protocol slot
        TagProtocol::Iso18k6b => 0,
    }
}

fn build_inventory_parameter_spec(
    rospec_id: u32,
    plan: &SimpleReadPlan,
    settings: &ReaderSettings,
) -> Result<Vec<u8>, ReaderError> {
    let mut spec = Vec::new();
    // inventory parameter spec id, reuse the rospec id
    push_u16(&mut spec, (rospec_id & 0xFFFF) as u16);
    spec.push(protocol_id(plan.protocol));

    let mut command = Vec::new();
    // tag inventory state aware - no
    command.push(0x00);
    match (plan.protocol, &plan.filter) {
        (TagProtocol::Gen2, Some(filter)) => {
            command.extend(build_gen2_filter(filter)?);
        }
        (TagProtocol::Iso18k6b, Some(filter)) => {
            command.extend(build_iso6b_filter(filter)?);
        }
        (_, None) => (),
    }
    if plan.protocol == TagProtocol::Gen2 {
        if let Some((mode_index, tari)) = rf_control(settings) {
            let mut rf = Vec::new();
            push_u16(&mut rf, mode_index);
            push_u16(&mut rf, tari);
            command.extend(tlv(parameter_types::C1G2_RF_CONTROL, &rf));
        }
    }
    // singulation control: session and a default population estimate
    let mut singulation = Vec::new();
    singulation.push((settings.session & 0x03) << 6);
    push_u16(&mut singulation, settings.tag_population);
    push_u32(&mut singulation, 0);
    command.extend(tlv(parameter_types::C1G2_SINGULATION_CONTROL, &singulation));
    if plan.fast_search {
        command.extend(custom_parameter(TM_FAST_SEARCH_SUBTYPE, &[0x01]));
    }

    let mut antenna_config = Vec::new();
    // antenna id 0 applies to every antenna in the ai spec
    push_u16(&mut antenna_config, 0);
    antenna_config.extend(tlv(parameter_types::C1G2_INVENTORY_COMMAND, &command));
    spec.extend(tlv(parameter_types::ANTENNA_CONFIGURATION, &antenna_config));
    Ok(tlv(parameter_types::INVENTORY_PARAMETER_SPEC, &spec))
}

/// RF control is only sent when the profile pins a link frequency or
/// Tari, otherwise the reader keeps its current mode table entry.
fn rf_control(settings: &ReaderSettings) -> Option<(u16, u16)> {
    if settings.link_frequency_khz.is_none() && settings.tari_ns.is_none() {
        return None
    }
    let mode_index = match settings.link_frequency_khz {
        Some(640) => 1,
        Some(320) => 2,
        _ => 0,
    };
    let tari = settings.tari_ns.unwrap_or(0).min(u32::from(u16::MAX)) as u16;
    Some((mode_index, tari))
}

/// Gen2 select filters become C1G2Filter parameters; an exact id becomes
/// an EPC bank mask anchored past the CRC and PC words.
fn build_gen2_filter(filter: &TagFilter) -> Result<Vec<u8>, ReaderError> {
    let (bank, pointer, bit_count, mask, invert): (u8, u16, u16, &[u8], bool) = match filter {
        TagFilter::Select { bank, bit_pointer, bit_length, mask, invert } => (
            bank.code(),
            *bit_pointer as u16,
            *bit_length,
            mask.as_slice(),
            *invert,
        ),
        TagFilter::ExactId { epc } => (
            Gen2MemoryBank::Epc.code(),
            crate::filter::EPC_MEMORY_DATA_OFFSET_BITS as u16,
            (epc.len() * 8) as u16,
            epc.as_slice(),
            false,
        ),
    };
    let mut inventory_mask = Vec::with_capacity(5 + mask.len());
    inventory_mask.push(bank << 6);
    push_u16(&mut inventory_mask, pointer);
    push_u16(&mut inventory_mask, bit_count);
    inventory_mask.extend_from_slice(mask);

    // state unaware action: select matching (0) or flip on invert (1)
    let action: u8 = if invert { 0x01 } else { 0x00 };

    let mut body = Vec::new();
    // truncate - no
    body.push(0x00);
    body.extend(tlv(parameter_types::C1G2_TAG_INVENTORY_MASK, &inventory_mask));
    body.extend(tlv(
        parameter_types::C1G2_TAG_INVENTORY_STATE_UNAWARE_FILTER_ACTION,
        &[action],
    ));
    Ok(tlv(parameter_types::C1G2_FILTER, &body))
}

/// ISO 18000-6B filters are a vendor extension: a group select op with a
/// byte address and mask, or a tag data pattern for exact matches.
fn build_iso6b_filter(filter: &TagFilter) -> Result<Vec<u8>, ReaderError> {
    match filter {
        TagFilter::Select { bank, bit_pointer, bit_length, mask, invert } => {
            if *bank != Gen2MemoryBank::Epc {
                return Err(ReaderError::Unsupported(String::from(
                    "iso18k6b filters cannot address gen2 memory banks",
                )))
            }
            let mut body = Vec::with_capacity(5 + mask.len());
            // select op: 0 select matching, 1 unselect matching
            body.push(if *invert { 0x01 } else { 0x00 });
            body.push((bit_pointer / 8) as u8);
            body.push(((usize::from(*bit_length) + 7) / 8) as u8);
            body.extend_from_slice(mask);
            Ok(custom_parameter(TM_ISO18K6B_INVENTORY_FILTER_SUBTYPE, &body))
        }
        TagFilter::ExactId { epc } => {
            let mut body = Vec::with_capacity(3 + epc.len());
            // tag data pattern starting at address zero
            body.push(0x00);
            body.push(0x00);
            body.push(epc.len() as u8);
            body.extend_from_slice(epc);
            Ok(custom_parameter(TM_ISO18K6B_INVENTORY_FILTER_SUBTYPE, &body))
        }
    }
}

fn build_content_selector(plan: &SimpleReadPlan, settings: &ReaderSettings) -> Vec<u8> {
    let mut selector = Vec::new();
    // 1... .... .... .... - enable rospec id - yes
    // .0.. .... .... .... - enable spec index - no
    // ..0. .... .... .... - enable inventory spec id - no
    // ...1 .... .... .... - enable antenna id - yes
    // .... 1... .... .... - enable channel index - yes
    // .... .1.. .... .... - enable peak rssi - yes
    // .... ..1. .... .... - enable first seen timestamp - yes
    // .... ...0 .... .... - enable last seen timestamp - no
    // .... .... 1... .... - enable tag seen count - yes
    // .... .... .1.. .... - enable accessspec id - when an op rides along
    let mut bits: u16 = 0x9E80;
    if plan.op.is_some() {
        bits |= 0x0040;
    }
    push_u16(&mut selector, bits);
    // 1... .... - enable crc - yes
    // .1.. .... - enable pc bits - yes
    let epc_selector = match plan.protocol {
        TagProtocol::Gen2 => 0xC0,
        TagProtocol::Iso18k6b => 0x00,
    };
    selector.extend(tlv(parameter_types::C1G2_EPC_MEMORY_SELECTOR, &[epc_selector]));
    if phase_supported(&settings.firmware_version) {
        selector.extend(custom_parameter(opspec::TM_PHASE_REPORT_SUBTYPE, &[0x01]));
    }
    tlv(parameter_types::TAG_REPORT_CONTENT_SELECTOR, &selector)
}

/// Phase reporting needs firmware at or past the documented minimum. An
/// unparsable version string just omits the request.
pub fn phase_supported(firmware: &str) -> bool {
    match parse_firmware(firmware) {
        Some((major, minor)) => (major, minor) >= MIN_PHASE_FIRMWARE,
        None => false,
    }
}

/// Parse "major.minor" off the front of a firmware version string.
pub fn parse_firmware(firmware: &str) -> Option<(u32, u32)> {
    let mut parts = firmware.split('.');
    let major = parts.next()?.trim().parse().ok()?;
    let minor = parts.next()?.trim().parse().ok()?;
    Some((major, minor))
}

fn build_access_spec(
    access_spec_id: u32,
    rospec_id: u32,
    antenna: u16,
    protocol: TagProtocol,
    filter: Option<&TagFilter>,
    op_spec: &[u8],
    standalone: bool,
) -> Result<Vec<u8>, ReaderError> {
    let mut body = Vec::new();
    push_u32(&mut body, access_spec_id);
    push_u16(&mut body, antenna);
    body.push(protocol_id(protocol));
    // current state - disabled until enabled
    body.push(0x00);
    push_u32(&mut body, rospec_id);

    // stop trigger: a standalone op runs exactly once, an embedded op is
    // bounded by the owning rospec instead
    let mut stop = Vec::with_capacity(3);
    if standalone {
        stop.push(0x01);
        push_u16(&mut stop, 1);
    } else {
        stop.push(0x00);
        push_u16(&mut stop, 0);
    }
    body.extend(tlv(parameter_types::ACCESS_SPEC_STOP_TRIGGER, &stop));

    // access command: which tags, then what to do to them
    let mut target = Vec::new();
    match filter {
        Some(TagFilter::Select { bank, bit_pointer, bit_length, mask, invert }) => {
            target.push(bank.code() << 6 | if *invert { 0 } else { 0x20 });
            push_u16(&mut target, *bit_pointer as u16);
            push_u16(&mut target, *bit_length);
            target.extend_from_slice(mask);
            // tag data: none, mask only
            push_u16(&mut target, 0);
        }
        Some(TagFilter::ExactId { epc }) => {
            target.push(Gen2MemoryBank::Epc.code() << 6 | 0x20);
            push_u16(&mut target, crate::filter::EPC_MEMORY_DATA_OFFSET_BITS as u16);
            push_u16(&mut target, (epc.len() * 8) as u16);
            target.extend_from_slice(epc);
            push_u16(&mut target, 0);
        }
        None => {
            // match any tag
            target.push(Gen2MemoryBank::Epc.code() << 6 | 0x20);
            push_u16(&mut target, 0);
            push_u16(&mut target, 0);
            push_u16(&mut target, 0);
        }
    }
    let tag_spec = tlv(
        parameter_types::C1G2_TAG_SPEC,
        &tlv(parameter_types::C1G2_TARGET_TAG, &target),
    );
    let mut command = Vec::new();
    command.extend(tag_spec);
    command.extend_from_slice(op_spec);
    body.extend(tlv(parameter_types::ACCESS_COMMAND, &command));

    Ok(tlv(parameter_types::ACCESS_SPEC, &body))
}
