//! Reader for classic libpcap savefiles.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use thiserror::Error;
use tracing::{debug, warn};

//TODO: http://www.tcpdump.org/linktypes.html
pub type DataLinkType = u32;
pub const DLT_NULL: DataLinkType = 0;
pub const DLT_ETHERNET: DataLinkType = 1;
pub const DLT_IEEE802_11: DataLinkType = 105;
pub const DLT_IEEE802_11_RADIO: DataLinkType = 127;

const MAGIC_USEC: u32 = 0xa1b2c3d4;
const MAGIC_NSEC: u32 = 0xa1b23c4d;

const GLOBAL_HEADER_LEN: usize = 24;
const RECORD_HEADER_LEN: usize = 16;

/// Records bigger than this are treated as corruption rather than allocated.
pub const MAX_RECORD_LEN: u32 = 256 * 1024;

#[derive(Debug, Error)]
pub enum PcapError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("not a pcap savefile (magic {0:#010x})")]
    BadMagic(u32),
    #[error("savefile ends inside a {0}")]
    Truncated(&'static str),
    #[error("record of {0} bytes exceeds the 256 KiB limit")]
    Oversized(u32),
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Endian {
    Little,
    Big
}

impl Endian {
    fn read_u16(self, b: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(b),
            Endian::Big => BigEndian::read_u16(b)
        }
    }

    fn read_u32(self, b: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(b),
            Endian::Big => BigEndian::read_u32(b)
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct PcapTimeval {
    sec: i64,
    nsec: u32
}

impl PcapTimeval {
    pub fn sec(&self) -> i64 {
        self.sec
    }

    pub fn usec(&self) -> u32 {
        self.nsec / 1000
    }

    pub fn nsec(&self) -> u32 {
        self.nsec
    }
}

#[derive(Clone, Debug)]
pub struct PcapData {
    ts: PcapTimeval,
    len: u32,
    dat: Vec<u8>
}

impl PcapData {
    /// Length of the packet on the wire.
    pub fn len(&self) -> u32 {
        self.len
    }

    /// No bytes were captured.
    pub fn is_empty(&self) -> bool {
        self.dat.is_empty()
    }

    /// Bytes actually captured; at most `len`.
    pub fn caplen(&self) -> u32 {
        self.dat.len() as u32
    }

    pub fn ts(&self) -> PcapTimeval {
        self.ts
    }

    pub fn data(&self) -> &[u8] {
        &self.dat
    }
}

pub struct PcapSession<R> {
    rdr: R,
    endian: Endian,
    nanos: bool,
    version: (u16, u16),
    snaplen: u32,
    datalink: DataLinkType
}

impl PcapSession<BufReader<File>> {
    pub fn from_file<P: AsRef<Path>>(f: P) -> Result<PcapSession<BufReader<File>>, PcapError> {
        let file = File::open(f.as_ref())?;
        debug!(path = %f.as_ref().display(), "opened savefile");
        PcapSession::from_reader(BufReader::new(file))
    }
}

impl<R: Read> PcapSession<R> {
    pub fn from_reader(mut rdr: R) -> Result<PcapSession<R>, PcapError> {
        let mut hdr = [0u8; GLOBAL_HEADER_LEN];
        if !read_full(&mut rdr, &mut hdr, "global header")? {
            return Err(PcapError::Truncated("global header"));
        }

        let (endian, nanos) = match LittleEndian::read_u32(&hdr[0..4]) {
            MAGIC_USEC => (Endian::Little, false),
            MAGIC_NSEC => (Endian::Little, true),
            m if m.swap_bytes() == MAGIC_USEC => (Endian::Big, false),
            m if m.swap_bytes() == MAGIC_NSEC => (Endian::Big, true),
            m => return Err(PcapError::BadMagic(m))
        };

        let sess = PcapSession {
            rdr,
            endian,
            nanos,
            version: (endian.read_u16(&hdr[4..6]), endian.read_u16(&hdr[6..8])),
            snaplen: endian.read_u32(&hdr[16..20]),
            datalink: endian.read_u32(&hdr[20..24])
        };
        debug!(version = ?sess.version, snaplen = sess.snaplen, datalink = sess.datalink,
               nanos, "read savefile header");
        Ok(sess)
    }

    pub fn datalink(&self) -> DataLinkType {
        self.datalink
    }

    pub fn snaplen(&self) -> u32 {
        self.snaplen
    }

    pub fn version(&self) -> (u16, u16) {
        self.version
    }

    /// The next record, or `None` once the file ends on a record boundary.
    pub fn next_packet(&mut self) -> Result<Option<PcapData>, PcapError> {
        let mut hdr = [0u8; RECORD_HEADER_LEN];
        if !read_full(&mut self.rdr, &mut hdr, "record header")? {
            return Ok(None);
        }

        let e = self.endian;
        let sec = i64::from(e.read_u32(&hdr[0..4]));
        let frac = e.read_u32(&hdr[4..8]);
        let caplen = e.read_u32(&hdr[8..12]);
        let len = e.read_u32(&hdr[12..16]);

        if caplen > MAX_RECORD_LEN {
            return Err(PcapError::Oversized(caplen));
        }

        let mut dat = vec![0u8; caplen as usize];
        if !read_full(&mut self.rdr, &mut dat, "record")? {
            return Err(PcapError::Truncated("record"));
        }

        if caplen < len {
            warn!(caplen, len, "record holds only part of the packet");
        }

        let nsec = if self.nanos { frac } else { frac.saturating_mul(1000) };
        Ok(Some(PcapData { ts: PcapTimeval { sec, nsec }, len, dat }))
    }
}

/// Fill `buf` completely. `Ok(false)` when the reader was already at EOF;
/// EOF part-way through is `Truncated(what)`.
fn read_full<R: Read>(rdr: &mut R, buf: &mut [u8], what: &'static str) -> Result<bool, PcapError> {
    let mut filled = 0;
    while filled < buf.len() {
        match rdr.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(PcapError::Truncated(what)),
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(PcapError::Io(e))
        }
    }
    Ok(true)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn global_header(magic: u32, big: bool, datalink: u32) -> Vec<u8> {
        let words: [u32; 4] = [0, 0, 65535, datalink];
        let mut b = Vec::new();
        let put32 = |b: &mut Vec<u8>, v: u32| {
            if big { b.extend_from_slice(&v.to_be_bytes()) } else { b.extend_from_slice(&v.to_le_bytes()) }
        };
        put32(&mut b, magic);
        if big {
            b.extend_from_slice(&2u16.to_be_bytes());
            b.extend_from_slice(&4u16.to_be_bytes());
        } else {
            b.extend_from_slice(&2u16.to_le_bytes());
            b.extend_from_slice(&4u16.to_le_bytes());
        }
        for w in words.iter() {
            put32(&mut b, *w);
        }
        b
    }

    fn record(big: bool, sec: u32, frac: u32, len: u32, dat: &[u8]) -> Vec<u8> {
        let mut b = Vec::new();
        for w in [sec, frac, dat.len() as u32, len] {
            if big { b.extend_from_slice(&w.to_be_bytes()) } else { b.extend_from_slice(&w.to_le_bytes()) }
        }
        b.extend_from_slice(dat);
        b
    }

    #[test]
    fn test_little_endian_usec() {
        let mut f = global_header(MAGIC_USEC, false, DLT_IEEE802_11_RADIO);
        f.extend(record(false, 1_400_000_000, 250_000, 3, &[1, 2, 3]));
        f.extend(record(false, 1_400_000_001, 0, 10, &[4, 5]));

        let mut sess = PcapSession::from_reader(Cursor::new(f)).unwrap();
        assert_eq!(sess.datalink(), DLT_IEEE802_11_RADIO);
        assert_eq!(sess.snaplen(), 65535);
        assert_eq!(sess.version(), (2, 4));

        let p = sess.next_packet().unwrap().unwrap();
        assert_eq!(p.data(), &[1, 2, 3]);
        assert_eq!(p.len(), 3);
        assert_eq!(p.ts().sec(), 1_400_000_000);
        assert_eq!(p.ts().usec(), 250_000);
        assert_eq!(p.ts().nsec(), 250_000_000);

        let p = sess.next_packet().unwrap().unwrap();
        assert_eq!(p.caplen(), 2);
        assert_eq!(p.len(), 10);

        assert!(sess.next_packet().unwrap().is_none());
    }

    #[test]
    fn test_empty_capture() {
        let mut f = global_header(MAGIC_USEC, false, DLT_IEEE802_11);
        f.extend(record(false, 0, 0, 60, &[]));
        f.extend(record(false, 0, 0, 60, &[0xd4]));

        let mut sess = PcapSession::from_reader(Cursor::new(f)).unwrap();
        let p = sess.next_packet().unwrap().unwrap();
        assert_eq!(p.len(), 60);
        assert!(p.is_empty());
        assert!(p.data().is_empty());

        let p = sess.next_packet().unwrap().unwrap();
        assert!(!p.is_empty());
    }

    #[test]
    fn test_big_endian_nsec() {
        let mut f = global_header(MAGIC_NSEC, true, DLT_IEEE802_11);
        f.extend(record(true, 7, 123_456_789, 1, &[0xaa]));

        let mut sess = PcapSession::from_reader(Cursor::new(f)).unwrap();
        assert_eq!(sess.datalink(), DLT_IEEE802_11);
        let p = sess.next_packet().unwrap().unwrap();
        assert_eq!(p.ts().sec(), 7);
        assert_eq!(p.ts().nsec(), 123_456_789);
        assert_eq!(p.ts().usec(), 123_456);
        assert_eq!(p.data(), &[0xaa]);
    }

    #[test]
    fn test_bad_magic() {
        let f = global_header(0xdeadbeef, false, DLT_ETHERNET);
        match PcapSession::from_reader(Cursor::new(f)) {
            Err(PcapError::BadMagic(0xdeadbeef)) => {}
            other => panic!("unexpected {:?}", other.map(|s| s.datalink()))
        }
    }

    #[test]
    fn test_truncated() {
        let f = global_header(MAGIC_USEC, false, DLT_ETHERNET);
        assert!(matches!(PcapSession::from_reader(Cursor::new(&f[..10])),
                         Err(PcapError::Truncated("global header"))));

        let mut g = f.clone();
        g.extend(&record(false, 0, 0, 4, &[1, 2, 3, 4])[..18]);
        let mut sess = PcapSession::from_reader(Cursor::new(g)).unwrap();
        assert!(matches!(sess.next_packet(), Err(PcapError::Truncated("record"))));

        let mut h = f;
        h.extend(&record(false, 0, 0, 4, &[1, 2, 3, 4])[..6]);
        let mut sess = PcapSession::from_reader(Cursor::new(h)).unwrap();
        assert!(matches!(sess.next_packet(), Err(PcapError::Truncated("record header"))));
    }

    #[test]
    fn test_oversized() {
        let mut f = global_header(MAGIC_USEC, false, DLT_ETHERNET);
        f.extend_from_slice(&[0; 8]);
        f.extend_from_slice(&(MAX_RECORD_LEN + 1).to_le_bytes());
        f.extend_from_slice(&[0; 4]);
        let mut sess = PcapSession::from_reader(Cursor::new(f)).unwrap();
        assert!(matches!(sess.next_packet(), Err(PcapError::Oversized(n)) if n == MAX_RECORD_LEN + 1));
    }
}
