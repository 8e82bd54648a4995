use bitflags::bitflags;
use rustc_serialize::hex::ToHex;
use rustc_serialize::{Encodable, Encoder};

use crate::ether::{MacAddr, MAC_ADDR_LEN};
use crate::util::{read_mac, read_u16, read_u32, DecodeError, DecodeResult};

// For definitive reference:
// http://standards.ieee.org/getieee802/download/802.11-2012.pdf

/// Frame control, duration and one address: the shortest frame on the air.
pub const MIN_FRAME_LEN: usize = 10;
pub const FCS_LEN: usize = 4;
pub const QOS_DATA_THRESHOLD: u8 = 0x8;

const ADDR1_START: usize = 4;
const SEQ_CTRL_LEN: usize = 2;
const QOS_CTRL_LEN: usize = 2;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum FrameType {
    Management,
    Control,
    Data,
    Reserved
}

impl FrameType {
    pub fn from_bits(ty: u8) -> FrameType {
        match ty & 0b11 {
            0 => FrameType::Management,
            1 => FrameType::Control,
            2 => FrameType::Data,
            _ => FrameType::Reserved
        }
    }
}

bitflags! {
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
    pub struct FrameControlFlags: u8 {
        const TO_DS           = 0x01;
        const FROM_DS         = 0x02;
        const MORE_FRAGMENTS  = 0x04;
        const RETRY           = 0x08;
        const POWER_MGMT      = 0x10;
        const MORE_DATA       = 0x20;
        const PROTECTED_FRAME = 0x40;
        const ORDER           = 0x80;
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct FrameControl {
    pub ty: u8,
    pub flags: FrameControlFlags,
}

impl FrameControl {
    pub fn from_bits(fc: u16) -> FrameControl {
        FrameControl {
            ty: fc as u8,
            flags: FrameControlFlags::from_bits_retain((fc >> 8) as u8)
        }
    }

    pub fn bits(&self) -> u16 {
        u16::from(self.ty) | (u16::from(self.flags.bits()) << 8)
    }

    /// When this is non-zero, the packet is bogus; however, being 0 is not sufficient
    /// to imply that the packet is good.
    pub fn protocol_version(&self) -> u8 {
        self.ty & 0b00000011
    }
    pub fn frame_type(&self) -> FrameType {
        FrameType::from_bits((self.ty & 0b00001100) >> 2)
    }
    pub fn frame_subtype(&self) -> u8 {
        (self.ty & 0b11110000) >> 4
    }

    /// Type and subtype packed as `type << 4 | subtype`, see `kind`.
    pub fn kind(&self) -> u8 {
        (((self.ty & 0b00001100) >> 2) << 4) | self.frame_subtype()
    }

    pub fn has_flag(&self, flag: FrameControlFlags) -> bool {
        self.flags.contains(flag)
    }
    pub fn to_ds(&self) -> bool {
        self.has_flag(FrameControlFlags::TO_DS)
    }
    pub fn from_ds(&self) -> bool {
        self.has_flag(FrameControlFlags::FROM_DS)
    }
}

/// Combined type/subtype codes, as returned by `FrameControl::kind`.
pub mod kind {
    // Management
    pub const ASSOCIATION_REQUEST: u8    = 0x00;
    pub const ASSOCIATION_RESPONSE: u8   = 0x01;
    pub const REASSOCIATION_REQUEST: u8  = 0x02;
    pub const REASSOCIATION_RESPONSE: u8 = 0x03;
    pub const PROBE_REQUEST: u8          = 0x04;
    pub const PROBE_RESPONSE: u8         = 0x05;
    pub const TIMING_ADVERTISEMENT: u8   = 0x06;
    pub const BEACON: u8                 = 0x08;
    pub const ATIM: u8                   = 0x09;
    pub const DISASSOCIATION: u8         = 0x0A;
    pub const AUTHENTICATION: u8         = 0x0B;
    pub const DEAUTHENTICATION: u8       = 0x0C;
    pub const ACTION: u8                 = 0x0D;
    pub const ACTION_NO_ACK: u8          = 0x0E;

    // Control
    pub const CONTROL_WRAPPER: u8        = 0x17;
    pub const BLOCK_ACK_REQUEST: u8      = 0x18;
    pub const BLOCK_ACK: u8              = 0x19;
    pub const PS_POLL: u8                = 0x1A;
    pub const RTS: u8                    = 0x1B;
    pub const CTS: u8                    = 0x1C;
    pub const ACK: u8                    = 0x1D;
    pub const CF_END: u8                 = 0x1E;
    pub const CF_END_CF_ACK: u8          = 0x1F;

    // Data
    pub const DATA: u8                   = 0x20;
    pub const DATA_CF_ACK: u8            = 0x21;
    pub const DATA_CF_POLL: u8           = 0x22;
    pub const DATA_CF_ACK_CF_POLL: u8    = 0x23;
    pub const NULL: u8                   = 0x24;
    pub const CF_ACK: u8                 = 0x25;
    pub const CF_POLL: u8                = 0x26;
    pub const CF_ACK_CF_POLL: u8         = 0x27;
    pub const QOS_DATA: u8               = 0x28;
    pub const QOS_DATA_CF_ACK: u8        = 0x29;
    pub const QOS_DATA_CF_POLL: u8       = 0x2A;
    pub const QOS_DATA_CF_ACK_CF_POLL: u8 = 0x2B;
    pub const QOS_NULL: u8               = 0x2C;
    pub const QOS_CF_POLL: u8            = 0x2E;
    pub const QOS_CF_ACK_CF_POLL: u8     = 0x2F;
}

static KIND_NAMES: [(u8, &str); 38] = [
    (kind::ASSOCIATION_REQUEST, "Association Request"),
    (kind::ASSOCIATION_RESPONSE, "Association Response"),
    (kind::REASSOCIATION_REQUEST, "Reassociation Request"),
    (kind::REASSOCIATION_RESPONSE, "Reassociation Response"),
    (kind::PROBE_REQUEST, "Probe Request"),
    (kind::PROBE_RESPONSE, "Probe Response"),
    (kind::TIMING_ADVERTISEMENT, "Timing Advertisement"),
    (kind::BEACON, "Beacon"),
    (kind::ATIM, "ATIM"),
    (kind::DISASSOCIATION, "Disassociation"),
    (kind::AUTHENTICATION, "Authentication"),
    (kind::DEAUTHENTICATION, "Deauthentication"),
    (kind::ACTION, "Action"),
    (kind::ACTION_NO_ACK, "Action No Ack"),
    (kind::CONTROL_WRAPPER, "Control Wrapper"),
    (kind::BLOCK_ACK_REQUEST, "Block Ack Request"),
    (kind::BLOCK_ACK, "Block Ack"),
    (kind::PS_POLL, "PS-Poll"),
    (kind::RTS, "RTS"),
    (kind::CTS, "CTS"),
    (kind::ACK, "ACK"),
    (kind::CF_END, "CF-End"),
    (kind::CF_END_CF_ACK, "CF-End + CF-Ack"),
    (kind::DATA, "Data"),
    (kind::DATA_CF_ACK, "Data + CF-Ack"),
    (kind::DATA_CF_POLL, "Data + CF-Poll"),
    (kind::DATA_CF_ACK_CF_POLL, "Data + CF-Ack + CF-Poll"),
    (kind::NULL, "Null"),
    (kind::CF_ACK, "CF-Ack"),
    (kind::CF_POLL, "CF-Poll"),
    (kind::CF_ACK_CF_POLL, "CF-Ack + CF-Poll"),
    (kind::QOS_DATA, "QoS Data"),
    (kind::QOS_DATA_CF_ACK, "QoS Data + CF-Ack"),
    (kind::QOS_DATA_CF_POLL, "QoS Data + CF-Poll"),
    (kind::QOS_DATA_CF_ACK_CF_POLL, "QoS Data + CF-Ack + CF-Poll"),
    (kind::QOS_NULL, "QoS Null"),
    (kind::QOS_CF_POLL, "QoS CF-Poll"),
    (kind::QOS_CF_ACK_CF_POLL, "QoS CF-Ack + CF-Poll"),
];

pub fn kind_name(kind: u8) -> Option<&'static str> {
    KIND_NAMES.iter().find(|&&(k, _)| k == kind).map(|&(_, name)| name)
}

/// Which address slots a frame carries ahead of the optional addr4.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AddressLayout {
    /// Reserved frame type: nothing past duration/ID is understood.
    Bare,
    /// CTS, ACK and control wrapper: receiver address only.
    Receiver,
    /// Remaining control frames: receiver and transmitter.
    ReceiverTransmitter,
    /// Management and data: three addresses plus sequence control.
    Full,
}

impl AddressLayout {
    pub fn of(fc: &FrameControl) -> AddressLayout {
        match fc.frame_type() {
            FrameType::Management | FrameType::Data => AddressLayout::Full,
            FrameType::Control => match fc.kind() {
                kind::CONTROL_WRAPPER | kind::CTS | kind::ACK => AddressLayout::Receiver,
                _ => AddressLayout::ReceiverTransmitter
            },
            FrameType::Reserved => AddressLayout::Bare
        }
    }
}

/// How to decide whether the last four bytes are a frame check sequence.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum FcsMode {
    /// Take the trailer whenever four bytes remain past the header. Frames
    /// captured without an FCS lose their last four payload bytes to it.
    #[default]
    Detect,
    Present,
    Absent,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Frame {
    pub frame_control: FrameControl,
    pub duration_id: u16,
    pub addr1: Option<MacAddr>,
    pub addr2: Option<MacAddr>,
    pub addr3: Option<MacAddr>,
    pub sequence_control: Option<u16>,
    pub addr4: Option<MacAddr>,
    pub qos: Option<u16>,
    pub body: Vec<u8>,
    pub fcs: Option<u32>,
    header_len: usize,
}

/// Decode one 802.11 MAC frame, guessing at the FCS trailer.
pub fn decode(bytes: &[u8]) -> DecodeResult<Frame> {
    decode_with(bytes, FcsMode::Detect)
}

pub fn decode_with(bytes: &[u8], fcs_mode: FcsMode) -> DecodeResult<Frame> {
    if bytes.len() < MIN_FRAME_LEN {
        return Err(DecodeError::TooShort { needed: MIN_FRAME_LEN, available: bytes.len() });
    }

    let frame_control = FrameControl::from_bits(read_u16(bytes, 0)?);
    let duration_id = read_u16(bytes, 2)?;

    let mut frame = Frame {
        frame_control,
        duration_id,
        addr1: None,
        addr2: None,
        addr3: None,
        sequence_control: None,
        addr4: None,
        qos: None,
        body: Vec::new(),
        fcs: None,
        header_len: 0,
    };

    let mut off = ADDR1_START;
    let layout = AddressLayout::of(&frame_control);
    if layout != AddressLayout::Bare {
        frame.addr1 = Some(read_mac(bytes, off)?);
        off += MAC_ADDR_LEN;
    }
    if layout == AddressLayout::ReceiverTransmitter || layout == AddressLayout::Full {
        frame.addr2 = Some(read_mac(bytes, off)?);
        off += MAC_ADDR_LEN;
    }
    if layout == AddressLayout::Full {
        frame.addr3 = Some(read_mac(bytes, off)?);
        off += MAC_ADDR_LEN;
        frame.sequence_control = Some(read_u16(bytes, off)?);
        off += SEQ_CTRL_LEN;
    }

    if frame_control.to_ds() && frame_control.from_ds() {
        frame.addr4 = Some(read_mac(bytes, off)?);
        off += MAC_ADDR_LEN;
    }

    if frame_control.frame_type() == FrameType::Data
    && frame_control.frame_subtype() >= QOS_DATA_THRESHOLD {
        frame.qos = Some(read_u16(bytes, off)?);
        off += QOS_CTRL_LEN;
    }

    frame.header_len = off;

    let fcs_start = bytes.len().checked_sub(FCS_LEN).filter(|&start| start >= off);
    match (fcs_mode, fcs_start) {
        (FcsMode::Absent, _) | (FcsMode::Detect, None) => {
            frame.body = bytes[off..].to_vec();
        }
        (FcsMode::Present, None) => {
            return Err(DecodeError::TooShort { needed: off + FCS_LEN, available: bytes.len() });
        }
        (_, Some(start)) => {
            frame.body = bytes[off..start].to_vec();
            frame.fcs = Some(read_u32(bytes, start)?);
        }
    }

    Ok(frame)
}

impl Frame {
    pub fn frame_type(&self) -> FrameType {
        self.frame_control.frame_type()
    }

    pub fn kind(&self) -> u8 {
        self.frame_control.kind()
    }

    /// Bytes of MAC header consumed ahead of the body.
    pub fn header_len(&self) -> usize {
        self.header_len
    }

    pub fn source(&self) -> Option<MacAddr> {
        let fc = &self.frame_control;
        if !fc.from_ds() {
            self.addr2
        } else if !fc.to_ds() {
            self.addr3
        } else {
            self.addr4
        }
    }

    pub fn destination(&self) -> Option<MacAddr> {
        if !self.frame_control.to_ds() {
            self.addr1
        } else {
            self.addr3
        }
    }

    /// None for WDS frames, which carry no BSSID.
    pub fn bssid(&self) -> Option<MacAddr> {
        let fc = &self.frame_control;
        match (fc.to_ds(), fc.from_ds()) {
            (false, false) => self.addr3,
            (false, true) => self.addr2,
            (true, false) => self.addr1,
            (true, true) => None
        }
    }
}

impl Encodable for Frame {
    fn encode<S: Encoder>(&self, s: &mut S) -> Result<(), S::Error> {
        s.emit_struct("Frame", 11, |s| {
            s.emit_struct_field("frame_control", 0, |s| s.emit_u16(self.frame_control.bits()))?;
            s.emit_struct_field("kind", 1, |s| {
                match kind_name(self.kind()) {
                    Some(name) => s.emit_str(name),
                    None => s.emit_str(&format!("{:#04x}", self.kind()))
                }
            })?;
            s.emit_struct_field("duration_id", 2, |s| s.emit_u16(self.duration_id))?;
            s.emit_struct_field("addr1", 3, |s| self.addr1.encode(s))?;
            s.emit_struct_field("addr2", 4, |s| self.addr2.encode(s))?;
            s.emit_struct_field("addr3", 5, |s| self.addr3.encode(s))?;
            s.emit_struct_field("sequence_control", 6, |s| self.sequence_control.encode(s))?;
            s.emit_struct_field("addr4", 7, |s| self.addr4.encode(s))?;
            s.emit_struct_field("qos", 8, |s| self.qos.encode(s))?;
            s.emit_struct_field("body", 9, |s| s.emit_str(&self.body.to_hex()))?;
            s.emit_struct_field("fcs", 10, |s| self.fcs.encode(s))
        })
    }
}
