use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

use crate::ether::{MacAddr, MAC_ADDR_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("buffer too short: needed {needed} bytes, have {available}")]
    TooShort { needed: usize, available: usize },
}

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Borrow `len` bytes at `off`, or fail with the length the read needed.
pub fn take(buf: &[u8], off: usize, len: usize) -> DecodeResult<&[u8]> {
    let end = off.saturating_add(len);
    buf.get(off..end).ok_or(DecodeError::TooShort { needed: end, available: buf.len() })
}

pub fn read_u8(buf: &[u8], off: usize) -> DecodeResult<u8> {
    take(buf, off, 1).map(|b| b[0])
}

pub fn read_u16(buf: &[u8], off: usize) -> DecodeResult<u16> {
    take(buf, off, 2).map(LittleEndian::read_u16)
}

pub fn read_u32(buf: &[u8], off: usize) -> DecodeResult<u32> {
    take(buf, off, 4).map(LittleEndian::read_u32)
}

pub fn read_mac(buf: &[u8], off: usize) -> DecodeResult<MacAddr> {
    let b = take(buf, off, MAC_ADDR_LEN)?;
    let mut out = [0; MAC_ADDR_LEN];
    out.copy_from_slice(b);
    Ok(MacAddr(out))
}

/// Round `off` up to the next multiple of `align`.
pub fn align_up(off: usize, align: usize) -> usize {
    match off % align {
        0 => off,
        r => off + (align - r)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reads_little_endian() {
        let b = [0x80, 0x00, 0xf0, 0x90, 0x8c, 0x39, 0x8d, 0x11];
        assert_eq!(read_u16(&b, 0), Ok(0x0080));
        assert_eq!(read_u16(&b, 2), Ok(0x90f0));
        assert_eq!(read_u32(&b, 4), Ok(0x118d398c));
        assert_eq!(read_u8(&b, 7), Ok(0x11));
    }

    #[test]
    fn short_reads_report_needed_length() {
        let b = [0u8; 5];
        assert_eq!(read_u32(&b, 2), Err(DecodeError::TooShort { needed: 6, available: 5 }));
        assert_eq!(read_mac(&b, 0), Err(DecodeError::TooShort { needed: 6, available: 5 }));
        assert_eq!(take(&b, usize::MAX, 2).unwrap_err(),
                   DecodeError::TooShort { needed: usize::MAX, available: 5 });
    }

    #[test]
    fn alignment() {
        assert_eq!(align_up(0, 8), 0);
        assert_eq!(align_up(1, 2), 2);
        assert_eq!(align_up(9, 8), 16);
        assert_eq!(align_up(17, 4), 20);
        assert_eq!(align_up(5, 1), 5);
    }
}
