use std::collections::HashMap;

use pcap::PcapTimeval;
use rustc_serialize::json::ToJson;
use rustc_serialize::{Encodable, Encoder};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use dot11tap::tap::RadiotapHeader;
use dot11tap::{Frame, MacAddr};

pub trait TransAddr<T> {
    fn trans(&self, addr: &T) -> String;
}

impl TransAddr<MacAddr> for HashMap<MacAddr, String> {
    fn trans(&self, addr: &MacAddr) -> String {
        match self.get(addr) {
            Some(v) => v.clone(),
            None => addr.to_string()
        }
    }
}

/// Capture time as RFC 3339, None if it doesn't fit a calendar date.
pub fn format_ts(ts: &PcapTimeval) -> Option<String> {
    let t = OffsetDateTime::from_unix_timestamp(ts.sec()).ok()?
        + Duration::nanoseconds(i64::from(ts.nsec()));
    t.format(&Rfc3339).ok()
}

/// One output line: everything decoded from a single capture buffer.
pub struct Report<'a> {
    pub ts: Option<String>,
    pub radiotap: Option<&'a RadiotapHeader>,
    pub frame: &'a Frame,
    pub src: Option<String>,
    pub dst: Option<String>,
    pub bssid: Option<String>,
}

impl<'a> Report<'a> {
    pub fn new<T: TransAddr<MacAddr>>(ts: Option<String>,
                                      radiotap: Option<&'a RadiotapHeader>,
                                      frame: &'a Frame,
                                      names: &T) -> Report<'a> {
        Report {
            ts,
            radiotap,
            frame,
            src: frame.source().map(|a| names.trans(&a)),
            dst: frame.destination().map(|a| names.trans(&a)),
            bssid: frame.bssid().map(|a| names.trans(&a)),
        }
    }
}

impl<'a> Encodable for Report<'a> {
    fn encode<S: Encoder>(&self, s: &mut S) -> Result<(), S::Error> {
        s.emit_struct("Report", 6, |s| {
            s.emit_struct_field("ts", 0, |s| self.ts.encode(s))?;
            s.emit_struct_field("radiotap", 1, |s| self.radiotap.map(|h| h.to_json()).encode(s))?;
            s.emit_struct_field("frame", 2, |s| self.frame.encode(s))?;
            s.emit_struct_field("src", 3, |s| self.src.encode(s))?;
            s.emit_struct_field("dst", 4, |s| self.dst.encode(s))?;
            s.emit_struct_field("bssid", 5, |s| self.bssid.encode(s))
        })
    }
}
