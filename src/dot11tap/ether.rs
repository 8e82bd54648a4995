use std::fmt::{Display, Error, Formatter};

use rustc_serialize::hex::FromHex;
use rustc_serialize::{Encodable, Encoder};

pub const MAC_ADDR_LEN: usize = 6;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct MacAddr(pub [u8; MAC_ADDR_LEN]);

impl Display for MacAddr {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        let &MacAddr(a) = self;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
               a[0], a[1], a[2], a[3], a[4], a[5])
    }
}

impl Encodable for MacAddr {
    fn encode<S: Encoder>(&self, s: &mut S) -> Result<(), S::Error> {
        s.emit_str(&self.to_string())
    }
}

impl MacAddr {
    pub fn from_string(mac: &str) -> Option<MacAddr> {
        let v: Vec<_> = mac.split(':').collect();
        if v.len() == MAC_ADDR_LEN {
            let mut out = [0; MAC_ADDR_LEN];
            for (i, s) in v.iter().enumerate() {
                match s.from_hex() {
                    Ok(ref hx) if hx.len() == 1 => out[i] = hx[0],
                    _ => return None
                }
            }
            Some(MacAddr(out))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rustc_serialize::json;

    #[test]
    fn display_is_lower_hex() {
        let m = MacAddr([0x28, 0xcf, 0xda, 0xb2, 0x16, 0xd0]);
        assert_eq!(m.to_string(), "28:cf:da:b2:16:d0");
        assert_eq!(MacAddr([0, 1, 2, 3, 4, 5]).to_string(), "00:01:02:03:04:05");
    }

    #[test]
    fn parses_display_form() {
        let m = MacAddr::from_string("28:CF:da:b2:16:d0").unwrap();
        assert_eq!(m, MacAddr([0x28, 0xcf, 0xda, 0xb2, 0x16, 0xd0]));
        assert!(MacAddr::from_string("28:cf:da:b2:16").is_none());
        assert!(MacAddr::from_string("28:cf:da:b2:16:zz").is_none());
        assert!(MacAddr::from_string("28:cf:da:b2:16:d0d0").is_none());
    }

    #[test]
    fn encodes_as_string() {
        assert_eq!(json::encode(&MacAddr([0xff; 6])).unwrap(), "\"ff:ff:ff:ff:ff:ff\"");
    }
}
