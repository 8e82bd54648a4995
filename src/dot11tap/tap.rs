use std::collections::BTreeMap;

use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};
use rustc_serialize::json::{Json, ToJson};
use rustc_serialize::{Encodable, Encoder};

use crate::util::{align_up, read_u16, read_u32, read_u8, take, DecodeError, DecodeResult};

//For possible reference:
//https://github.com/simsong/tcpflow/blob/master/src/wifipcap/ieee802_11_radio.h
//http://www.radiotap.org/defined-fields

/// version, pad, length and the first presence word.
pub const PREFIX_LEN: usize = 8;
const PRESENCE_WORD_LEN: usize = 4;

bitflags! {
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
    pub struct ItPresent: u32 {
        const TSFT              = 1 << 0;
        const FLAGS             = 1 << 1;
        const RATE              = 1 << 2;
        const CHANNEL           = 1 << 3;
        const FHSS              = 1 << 4;
        const ANTENNA_SIGNAL    = 1 << 5;
        const ANTENNA_NOISE     = 1 << 6;
        const LOCK_QUALITY      = 1 << 7;
        const TX_ATTENUATION    = 1 << 8;
        const DB_TX_ATTENUATION = 1 << 9;
        const DBM_TX_POWER      = 1 << 10;
        const ANTENNA           = 1 << 11;
        const DB_ANTENNA_SIGNAL = 1 << 12;
        const DB_ANTENNA_NOISE  = 1 << 13;
        const RX_FLAGS          = 1 << 14;
        const MCS               = 1 << 15;
        const A_MPDU_STATUS     = 1 << 16;
        const VHT               = 1 << 17;
        const RADIOTAP_NS       = 1 << 29;
        const VENDOR_NS         = 1 << 30;
        const MORE_IT_PRESENT   = 1 << 31;
    }
}

bitflags! {
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
    pub struct Flags: u8 {
        const DURING_CFP     = 0x01;
        const SHORT_PREAMBLE = 0x02;
        const ENCRYPT_WEP    = 0x04;
        const FRAGMENTATION  = 0x08;
        const INCLUDES_FCS   = 0x10;
        const HAS_PADDING    = 0x20;
        const FAILED_FCS_CHK = 0x40;
        const SHORT_GUARD    = 0x80;
    }
}

bitflags! {
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
    pub struct ChannelFlags: u16 {
        const TURBO        = 0x0010;
        const CCK          = 0x0020;
        const OFDM         = 0x0040;
        const GHZ2         = 0x0080;
        const GHZ5         = 0x0100;
        const PSV_SCAN     = 0x0200;
        const DYN_CCK_OFDM = 0x0400;
        const GFSK         = 0x0800;
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Channel {
    pub freq: u16,
    pub flags: u16
}

impl Channel {
    pub fn channel_flags(&self) -> ChannelFlags {
        ChannelFlags::from_bits_retain(self.flags)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Fhss {
    pub hop_set: u8,
    pub hop_pattern: u8
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Mcs {
    pub known: u8,
    pub flags: u8,
    pub mcs: u8
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct AmpduStatus {
    pub reference_number: u64,
    pub flags: u16,
    pub delimiter_crc: u8,
    pub reserved: u8
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Vht {
    pub known: u16,
    pub flags: u8,
    pub bandwidth: u8,
    pub mcs_nss: [u8; 4],
    pub coding: u8,
    pub group_id: u8,
    pub partial_aid: u16
}

/// A decoded radiotap header. Fields whose presence bit is clear hold zero;
/// check `has_field` before reading them.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct RadiotapHeader {
    pub version: u8,
    pub length: u16,
    pub presence: u32,

    pub tsft: u64,
    pub flags: u8,
    pub rate: u8, // x 500 Kbps
    pub channel: Channel,
    pub fhss: Fhss,
    pub antenna_signal: i8, // dBm
    pub antenna_noise: i8, // dBm
    pub lock_quality: u16,
    pub tx_attenuation: u16,
    pub db_tx_attenuation: u16, // dB
    pub dbm_tx_power: i8, // dBm
    pub antenna: u8,
    pub db_antenna_signal: u8, // dB
    pub db_antenna_noise: u8, // dB
    pub rx_flags: u16,
    pub mcs: Mcs,
    pub ampdu: AmpduStatus,
    pub vht: Vht
}

struct Field {
    present: ItPresent,
    name: &'static str,
    size: usize,
    align: usize,
    read: fn(&[u8], &mut RadiotapHeader),
    json: fn(&RadiotapHeader) -> Json
}

// Walked in order; entry `i` is gated by presence bit `i`. Each `read` gets
// exactly `size` bytes. Bits 18-28 are not decoded.
static FIELDS: [Field; 18] = [
    Field { present: ItPresent::TSFT, name: "tsft", size: 8, align: 8,
            read: read_tsft, json: |h| h.tsft.to_json() },
    Field { present: ItPresent::FLAGS, name: "flags", size: 1, align: 1,
            read: |b, h| h.flags = b[0], json: |h| h.flags.to_json() },
    Field { present: ItPresent::RATE, name: "rate", size: 1, align: 1,
            read: |b, h| h.rate = b[0], json: |h| h.rate.to_json() },
    Field { present: ItPresent::CHANNEL, name: "channel", size: 4, align: 2,
            read: read_channel, json: |h| h.channel.to_json() },
    Field { present: ItPresent::FHSS, name: "fhss", size: 2, align: 1,
            read: read_fhss, json: |h| h.fhss.to_json() },
    Field { present: ItPresent::ANTENNA_SIGNAL, name: "antenna_signal", size: 1, align: 1,
            read: |b, h| h.antenna_signal = b[0] as i8, json: |h| h.antenna_signal.to_json() },
    Field { present: ItPresent::ANTENNA_NOISE, name: "antenna_noise", size: 1, align: 1,
            read: |b, h| h.antenna_noise = b[0] as i8, json: |h| h.antenna_noise.to_json() },
    Field { present: ItPresent::LOCK_QUALITY, name: "lock_quality", size: 2, align: 2,
            read: |b, h| h.lock_quality = LittleEndian::read_u16(b),
            json: |h| h.lock_quality.to_json() },
    Field { present: ItPresent::TX_ATTENUATION, name: "tx_attenuation", size: 2, align: 2,
            read: |b, h| h.tx_attenuation = LittleEndian::read_u16(b),
            json: |h| h.tx_attenuation.to_json() },
    Field { present: ItPresent::DB_TX_ATTENUATION, name: "db_tx_attenuation", size: 2, align: 2,
            read: |b, h| h.db_tx_attenuation = LittleEndian::read_u16(b),
            json: |h| h.db_tx_attenuation.to_json() },
    Field { present: ItPresent::DBM_TX_POWER, name: "dbm_tx_power", size: 1, align: 1,
            read: |b, h| h.dbm_tx_power = b[0] as i8, json: |h| h.dbm_tx_power.to_json() },
    Field { present: ItPresent::ANTENNA, name: "antenna", size: 1, align: 1,
            read: |b, h| h.antenna = b[0], json: |h| h.antenna.to_json() },
    Field { present: ItPresent::DB_ANTENNA_SIGNAL, name: "db_antenna_signal", size: 1, align: 1,
            read: |b, h| h.db_antenna_signal = b[0], json: |h| h.db_antenna_signal.to_json() },
    Field { present: ItPresent::DB_ANTENNA_NOISE, name: "db_antenna_noise", size: 1, align: 1,
            read: |b, h| h.db_antenna_noise = b[0], json: |h| h.db_antenna_noise.to_json() },
    Field { present: ItPresent::RX_FLAGS, name: "rx_flags", size: 2, align: 2,
            read: |b, h| h.rx_flags = LittleEndian::read_u16(b), json: |h| h.rx_flags.to_json() },
    Field { present: ItPresent::MCS, name: "mcs", size: 3, align: 1,
            read: read_mcs, json: |h| h.mcs.to_json() },
    Field { present: ItPresent::A_MPDU_STATUS, name: "ampdu", size: 12, align: 8,
            read: read_ampdu, json: |h| h.ampdu.to_json() },
    Field { present: ItPresent::VHT, name: "vht", size: 12, align: 2,
            read: read_vht, json: |h| h.vht.to_json() },
];

fn read_tsft(b: &[u8], h: &mut RadiotapHeader) {
    h.tsft = LittleEndian::read_u64(b);
}

fn read_channel(b: &[u8], h: &mut RadiotapHeader) {
    h.channel = Channel {
        freq: LittleEndian::read_u16(&b[0..2]),
        flags: LittleEndian::read_u16(&b[2..4])
    };
}

fn read_fhss(b: &[u8], h: &mut RadiotapHeader) {
    h.fhss = Fhss { hop_set: b[0], hop_pattern: b[1] };
}

fn read_mcs(b: &[u8], h: &mut RadiotapHeader) {
    h.mcs = Mcs { known: b[0], flags: b[1], mcs: b[2] };
}

fn read_ampdu(b: &[u8], h: &mut RadiotapHeader) {
    h.ampdu = AmpduStatus {
        reference_number: LittleEndian::read_u64(&b[0..8]),
        flags: LittleEndian::read_u16(&b[8..10]),
        delimiter_crc: b[10],
        reserved: b[11]
    };
}

fn read_vht(b: &[u8], h: &mut RadiotapHeader) {
    h.vht = Vht {
        known: LittleEndian::read_u16(&b[0..2]),
        flags: b[2],
        bandwidth: b[3],
        mcs_nss: [b[4], b[5], b[6], b[7]],
        coding: b[8],
        group_id: b[9],
        partial_aid: LittleEndian::read_u16(&b[10..12])
    };
}

/// Decode the radiotap header at the start of `bytes`. The 802.11 frame
/// starts at `length`; see `RadiotapHeader::frame_bytes`.
pub fn decode(bytes: &[u8]) -> DecodeResult<RadiotapHeader> {
    if bytes.len() < PREFIX_LEN {
        return Err(DecodeError::TooShort { needed: PREFIX_LEN, available: bytes.len() });
    }

    let mut hdr = RadiotapHeader {
        version: read_u8(bytes, 0)?,
        length: read_u16(bytes, 2)?,
        presence: read_u32(bytes, 4)?,
        ..RadiotapHeader::default()
    };
    let end = usize::from(hdr.length);

    // Bytes consumed past the prefix. The prefix is a multiple of every
    // field alignment, so aligning this aligns the absolute offset too.
    let mut consumed = 0;

    // Extended presence words only announce namespaces we don't decode.
    let mut present = hdr.presence;
    while present & ItPresent::MORE_IT_PRESENT.bits() != 0 {
        let off = PREFIX_LEN + consumed;
        if off + PRESENCE_WORD_LEN > end {
            return Ok(hdr);
        }
        present = read_u32(bytes, off)?;
        consumed += PRESENCE_WORD_LEN;
    }

    let gate = hdr.present();
    for field in FIELDS.iter() {
        if !gate.contains(field.present) {
            continue;
        }
        let start = align_up(consumed, field.align);
        let off = PREFIX_LEN + start;
        if off + field.size > end {
            break;
        }
        let b = take(bytes, off, field.size)?;
        (field.read)(b, &mut hdr);
        consumed = start + field.size;
    }

    Ok(hdr)
}

impl RadiotapHeader {
    pub fn present(&self) -> ItPresent {
        ItPresent::from_bits_retain(self.presence)
    }

    pub fn has_field(&self, fld: ItPresent) -> bool {
        self.present().contains(fld)
    }

    pub fn frame_flags(&self) -> Flags {
        Flags::from_bits_retain(self.flags)
    }

    /// Whether the driver reports an FCS at the end of the frame. None when
    /// the flags field is absent.
    pub fn includes_fcs(&self) -> Option<bool> {
        if self.has_field(ItPresent::FLAGS) {
            Some(self.frame_flags().contains(Flags::INCLUDES_FCS))
        } else {
            None
        }
    }

    /// The bytes following this header in `capture`.
    pub fn frame_bytes<'a>(&self, capture: &'a [u8]) -> &'a [u8] {
        capture.get(usize::from(self.length)..).unwrap_or(&[])
    }
}

fn obj(fields: Vec<(&str, Json)>) -> Json {
    let mut m = BTreeMap::new();
    for (k, v) in fields {
        m.insert(k.to_string(), v);
    }
    Json::Object(m)
}

impl ToJson for Channel {
    fn to_json(&self) -> Json {
        obj(vec![("freq", self.freq.to_json()), ("flags", self.flags.to_json())])
    }
}

impl ToJson for Fhss {
    fn to_json(&self) -> Json {
        obj(vec![("hop_set", self.hop_set.to_json()), ("hop_pattern", self.hop_pattern.to_json())])
    }
}

impl ToJson for Mcs {
    fn to_json(&self) -> Json {
        obj(vec![("known", self.known.to_json()),
                 ("flags", self.flags.to_json()),
                 ("mcs", self.mcs.to_json())])
    }
}

impl ToJson for AmpduStatus {
    fn to_json(&self) -> Json {
        obj(vec![("reference_number", self.reference_number.to_json()),
                 ("flags", self.flags.to_json()),
                 ("delimiter_crc", self.delimiter_crc.to_json())])
    }
}

impl ToJson for Vht {
    fn to_json(&self) -> Json {
        obj(vec![("known", self.known.to_json()),
                 ("flags", self.flags.to_json()),
                 ("bandwidth", self.bandwidth.to_json()),
                 ("mcs_nss", self.mcs_nss.to_vec().to_json()),
                 ("coding", self.coding.to_json()),
                 ("group_id", self.group_id.to_json()),
                 ("partial_aid", self.partial_aid.to_json())])
    }
}

/// Only fields whose presence bit is set are emitted.
impl ToJson for RadiotapHeader {
    fn to_json(&self) -> Json {
        let mut m = BTreeMap::new();
        m.insert("version".to_string(), self.version.to_json());
        m.insert("length".to_string(), self.length.to_json());
        m.insert("presence".to_string(), self.presence.to_json());
        for field in FIELDS.iter().filter(|f| self.has_field(f.present)) {
            m.insert(field.name.to_string(), (field.json)(self));
        }
        Json::Object(m)
    }
}

impl Encodable for RadiotapHeader {
    fn encode<S: Encoder>(&self, s: &mut S) -> Result<(), S::Error> {
        self.to_json().encode(s)
    }
}
