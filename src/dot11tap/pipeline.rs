use std::collections::HashMap;
use std::io::{Read, Write};

use rustc_serialize::hex::FromHex;
use rustc_serialize::json;
use tracing::{debug, info, warn};

use dot11tap::tap::RadiotapHeader;
use dot11tap::{dot11, tap, DecodeResult, Frame, MacAddr};
use pcap::{PcapSession, DLT_IEEE802_11, DLT_IEEE802_11_RADIO};

use crate::cli::{CliErr, TapRunConf};
use crate::conf::{FcsPolicy, TapConf};
use crate::report::{format_ts, Report};

pub struct Decoded {
    pub radiotap: Option<RadiotapHeader>,
    pub frame: Frame,
}

/// Decode one capture buffer, radiotap header first when `radiotap` is set.
pub fn decode_capture(bytes: &[u8], radiotap: bool, policy: FcsPolicy) -> DecodeResult<Decoded> {
    let (radiotap, frame_bytes) = if radiotap {
        let hdr = tap::decode(bytes)?;
        (Some(hdr), hdr.frame_bytes(bytes))
    } else {
        (None, bytes)
    };
    let frame = dot11::decode_with(frame_bytes, policy.mode_for(radiotap.as_ref()))?;
    Ok(Decoded { radiotap, frame })
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Summary {
    pub decoded: usize,
    pub failed: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.decoded + self.failed
    }
}

pub struct Pipeline<W> {
    out: W,
    policy: FcsPolicy,
    names: HashMap<MacAddr, String>,
    limit: Option<usize>,
    summary: Summary,
}

impl<W: Write> Pipeline<W> {
    pub fn new(out: W, policy: FcsPolicy, names: HashMap<MacAddr, String>,
               limit: Option<usize>) -> Pipeline<W> {
        Pipeline { out, policy, names, limit, summary: Summary::default() }
    }

    pub fn summary(&self) -> Summary {
        self.summary
    }

    /// Decode and print one buffer. Undecodable buffers are logged and counted.
    pub fn feed(&mut self, bytes: &[u8], radiotap: bool, ts: Option<String>) -> Result<(), CliErr> {
        match decode_capture(bytes, radiotap, self.policy) {
            Ok(d) => {
                let report = Report::new(ts, d.radiotap.as_ref(), &d.frame, &self.names);
                writeln!(self.out, "{}", json::encode(&report)?)?;
                self.summary.decoded += 1;
            }
            Err(e) => {
                warn!(error = %e, len = bytes.len(), "skipping undecodable packet");
                self.summary.failed += 1;
            }
        }
        Ok(())
    }

    pub fn replay<R: Read>(&mut self, sess: &mut PcapSession<R>) -> Result<(), CliErr> {
        let radiotap = match sess.datalink() {
            DLT_IEEE802_11_RADIO => true,
            DLT_IEEE802_11 => false,
            x => return Err(CliErr::Datalink(x))
        };
        info!(datalink = sess.datalink(), "starting replay");

        while self.limit.map_or(true, |n| self.summary.total() < n) {
            let pkt = match sess.next_packet()? {
                Some(pkt) => pkt,
                None => break
            };
            debug!(caplen = pkt.caplen(), len = pkt.len(), "packet");
            self.feed(pkt.data(), radiotap, format_ts(&pkt.ts()))?;
        }
        Ok(())
    }
}

pub fn parse_hex(s: &str) -> Result<Vec<u8>, CliErr> {
    let cleaned: String = s.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
    Ok(cleaned.from_hex()?)
}

pub fn run<W: Write>(conf: &TapRunConf, out: W) -> Result<Summary, CliErr> {
    let tap_conf = match conf.conf {
        Some(ref path) => TapConf::load(path)?,
        None => TapConf::default()
    };
    let policy = conf.fcs.or(tap_conf.fcs).unwrap_or_default();
    let mut pipeline = Pipeline::new(out, policy, tap_conf.known_macs, conf.count);

    if let Some(ref hex) = conf.hex {
        pipeline.feed(&parse_hex(hex)?, conf.radiotap, None)?;
    } else if let Some(ref file) = conf.file {
        let mut sess = PcapSession::from_file(file)?;
        pipeline.replay(&mut sess)?;
    } else {
        return Err(CliErr::NoInput);
    }

    let summary = pipeline.summary();
    info!(decoded = summary.decoded, failed = summary.failed, "done");
    Ok(summary)
}

#[cfg(test)]
mod test {
    use super::*;
    use rustc_serialize::json::Json;
    use std::io::Cursor;

    const TAP_ACK: [u8; 23] = [
        0, 0, 0x09, 0, 0x02, 0, 0, 0, 0x00,
        0xd4, 0x00, 0x00, 0x00, 0x28, 0xcf, 0xda, 0xb2, 0x16, 0xd0, 0xde, 0xad, 0xbe, 0xef,
    ];

    fn savefile(datalink: u32, packets: &[&[u8]]) -> Vec<u8> {
        let mut f = Vec::new();
        for w in [0xa1b2c3d4u32, 0x0004_0002, 0, 0, 65535, datalink] {
            f.extend_from_slice(&w.to_le_bytes());
        }
        for (i, p) in packets.iter().enumerate() {
            for w in [i as u32, 0, p.len() as u32, p.len() as u32] {
                f.extend_from_slice(&w.to_le_bytes());
            }
            f.extend_from_slice(p);
        }
        f
    }

    fn lines(out: &[u8]) -> Vec<Json> {
        String::from_utf8(out.to_vec()).unwrap()
            .lines()
            .map(|l| Json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn radiotap_flags_pick_the_trailer() {
        let d = decode_capture(&TAP_ACK, true, FcsPolicy::Radiotap).unwrap();
        assert_eq!(d.radiotap.map(|h| h.length), Some(9));
        assert_eq!(d.frame.fcs, None);
        assert_eq!(d.frame.body, vec![0xde, 0xad, 0xbe, 0xef]);

        let d = decode_capture(&TAP_ACK, true, FcsPolicy::Detect).unwrap();
        assert_eq!(d.frame.fcs, Some(0xefbeadde));
        assert!(d.frame.body.is_empty());
    }

    #[test]
    fn bare_frames_skip_radiotap() {
        let d = decode_capture(&TAP_ACK[9..], false, FcsPolicy::Detect).unwrap();
        assert!(d.radiotap.is_none());
        assert_eq!(d.frame.kind(), dot11::kind::ACK);
    }

    #[test]
    fn replay_prints_one_line_per_packet() {
        let bad: &[u8] = &[0, 0, 9, 0, 0, 0, 0, 0, 0, 0xd4];
        let f = savefile(DLT_IEEE802_11_RADIO, &[&TAP_ACK, bad, &TAP_ACK]);
        let mut sess = PcapSession::from_reader(Cursor::new(f)).unwrap();

        let mut out = Vec::new();
        let mut names = HashMap::new();
        names.insert(MacAddr([0x28, 0xcf, 0xda, 0xb2, 0x16, 0xd0]), "laptop".to_string());
        {
            let mut p = Pipeline::new(&mut out, FcsPolicy::Detect, names, None);
            p.replay(&mut sess).unwrap();
            assert_eq!(p.summary(), Summary { decoded: 2, failed: 1 });
        }

        let js = lines(&out);
        assert_eq!(js.len(), 2);
        assert_eq!(js[0].find("dst"), Some(&Json::String("laptop".to_string())));
        assert_eq!(js[0].find("ts"), Some(&Json::String("1970-01-01T00:00:00Z".to_string())));
        assert_eq!(js[1].find_path(&["radiotap", "length"]), Some(&Json::U64(9)));
        assert_eq!(js[1].find_path(&["frame", "kind"]), Some(&Json::String("ACK".to_string())));
    }

    #[test]
    fn replay_honors_the_limit() {
        let f = savefile(DLT_IEEE802_11, &[&TAP_ACK[9..], &TAP_ACK[9..], &TAP_ACK[9..]]);
        let mut sess = PcapSession::from_reader(Cursor::new(f)).unwrap();
        let mut out = Vec::new();
        let mut p = Pipeline::new(&mut out, FcsPolicy::Detect, HashMap::new(), Some(2));
        p.replay(&mut sess).unwrap();
        assert_eq!(p.summary().decoded, 2);
    }

    #[test]
    fn replay_rejects_other_datalinks() {
        let f = savefile(pcap::DLT_ETHERNET, &[]);
        let mut sess = PcapSession::from_reader(Cursor::new(f)).unwrap();
        let mut p = Pipeline::new(Vec::new(), FcsPolicy::Detect, HashMap::new(), None);
        assert!(matches!(p.replay(&mut sess), Err(CliErr::Datalink(1))));
    }

    #[test]
    fn hex_input() {
        assert_eq!(parse_hex("d4 00:00 00").unwrap(), vec![0xd4, 0, 0, 0]);
        assert!(matches!(parse_hex("d4 0"), Err(CliErr::Hex(_))));

        let conf = TapRunConf {
            file: None,
            hex: Some("d400 0000 28cfdab216d0".to_string()),
            conf: None,
            radiotap: false,
            fcs: None,
            count: None,
            verbosity: 0,
        };
        let mut out = Vec::new();
        let summary = run(&conf, &mut out).unwrap();
        assert_eq!(summary, Summary { decoded: 1, failed: 0 });
        assert_eq!(lines(&out)[0].find("dst"), Some(&Json::String("28:cf:da:b2:16:d0".to_string())));
    }

    #[test]
    fn no_input_is_an_error() {
        let conf = TapRunConf {
            file: None, hex: None, conf: None, radiotap: true, fcs: None, count: None, verbosity: 0,
        };
        assert!(matches!(run(&conf, Vec::new()), Err(CliErr::NoInput)));
    }
}
