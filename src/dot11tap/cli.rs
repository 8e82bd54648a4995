use std::io;

use getopts as go;
use rustc_serialize::hex::FromHexError;
use rustc_serialize::json::EncoderError;
use thiserror::Error;

use pcap::{DataLinkType, PcapError};

use crate::conf::{ConfError, FcsPolicy};

#[derive(Debug, Error)]
pub enum CliErr {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Pcap(#[from] PcapError),
    #[error(transparent)]
    Conf(#[from] ConfError),
    #[error("{0}")]
    Opts(#[from] go::Fail),
    #[error("invalid hex input: {0}")]
    Hex(#[from] FromHexError),
    #[error("could not encode report: {0}")]
    Encode(#[from] EncoderError),
    #[error("unsupported datalink type: {0}")]
    Datalink(DataLinkType),
    #[error("invalid packet count {0:?}")]
    Count(String),
    #[error("nothing to decode: pass --file or --hex")]
    NoInput,
}

pub struct TapRunConf {
    pub file: Option<String>,
    pub hex: Option<String>,
    pub conf: Option<String>,
    pub radiotap: bool,
    pub fcs: Option<FcsPolicy>,
    pub count: Option<usize>,
    pub verbosity: usize,
}

pub enum Command {
    Help(String),
    Run(TapRunConf),
}

fn options() -> go::Options {
    let mut opts = go::Options::new();
    opts.optflag("h", "help", "Print this help menu");
    opts.optopt("f", "file", "Savefile to replay", "cap_file");
    opts.optopt("x", "hex", "Decode a single hex-encoded capture buffer", "bytes");
    opts.optopt("c", "conf", "Configuration file", "conf_file");
    opts.optflag("", "no-radiotap", "The hex buffer is a bare 802.11 frame");
    opts.optopt("", "fcs", "How to find the frame check sequence [detect]",
                "detect|radiotap|present|absent");
    opts.optopt("n", "count", "Stop after this many packets", "N");
    opts.optflagmulti("v", "verbose", "Log more (repeatable)");
    opts
}

pub fn parse_args(args: &[String]) -> Result<Command, CliErr> {
    let opts = options();
    let matches = opts.parse(args.get(1..).unwrap_or(&[]))?;

    if matches.opt_present("h") {
        let program = args.first().map(|s| &s[..]).unwrap_or("dot11tap");
        let brief = format!("Usage: {} (-f FILE | -x HEX) [options]", program);
        return Ok(Command::Help(opts.usage(&brief)));
    }

    let fcs = match matches.opt_str("fcs") {
        Some(s) => Some(s.parse::<FcsPolicy>()?),
        None => None
    };

    let count = match matches.opt_str("n") {
        Some(n) => Some(n.parse::<usize>().map_err(|_| CliErr::Count(n.clone()))?),
        None => None
    };

    Ok(Command::Run(TapRunConf {
        file: matches.opt_str("f"),
        hex: matches.opt_str("x"),
        conf: matches.opt_str("c"),
        radiotap: !matches.opt_present("no-radiotap"),
        fcs,
        count,
        verbosity: matches.opt_count("v"),
    }))
}

#[cfg(test)]
mod test {
    use super::*;

    fn args(a: &[&str]) -> Vec<String> {
        a.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_run_options() {
        let cmd = parse_args(&args(&["dot11tap", "-f", "cap.pcap", "--fcs", "radiotap",
                                     "-n", "5", "-vv", "--no-radiotap"])).unwrap();
        match cmd {
            Command::Run(conf) => {
                assert_eq!(conf.file.as_deref(), Some("cap.pcap"));
                assert_eq!(conf.hex, None);
                assert_eq!(conf.fcs, Some(FcsPolicy::Radiotap));
                assert_eq!(conf.count, Some(5));
                assert_eq!(conf.verbosity, 2);
                assert!(!conf.radiotap);
            }
            Command::Help(_) => panic!("expected a run")
        }
    }

    #[test]
    fn help_lists_options() {
        match parse_args(&args(&["dot11tap", "-h"])).unwrap() {
            Command::Help(usage) => {
                assert!(usage.contains("--file"));
                assert!(usage.contains("--no-radiotap"));
            }
            Command::Run(_) => panic!("expected help")
        }
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(parse_args(&args(&["dot11tap", "-n", "many"])), Err(CliErr::Count(_))));
        assert!(matches!(parse_args(&args(&["dot11tap", "--fcs", "maybe"])), Err(CliErr::Conf(_))));
        assert!(matches!(parse_args(&args(&["dot11tap", "--bogus"])), Err(CliErr::Opts(_))));
    }
}
