use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, warn};

use dot11tap::tap::RadiotapHeader;
use dot11tap::{FcsMode, MacAddr};

#[derive(Debug, Error)]
pub enum ConfError {
    #[error("could not read {path}: {source}")]
    Io { path: String, #[source] source: io::Error },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown fcs mode {0:?} (expected detect, radiotap, present or absent)")]
    FcsPolicy(String),
}

/// Where the trailer decision comes from for each packet.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum FcsPolicy {
    #[default]
    Detect,
    /// Follow the radiotap `IncludesFCS` flag, detecting when it's missing.
    Radiotap,
    Present,
    Absent,
}

impl FcsPolicy {
    pub fn mode_for(&self, tap: Option<&RadiotapHeader>) -> FcsMode {
        match *self {
            FcsPolicy::Detect => FcsMode::Detect,
            FcsPolicy::Present => FcsMode::Present,
            FcsPolicy::Absent => FcsMode::Absent,
            FcsPolicy::Radiotap => match tap.and_then(|h| h.includes_fcs()) {
                Some(true) => FcsMode::Present,
                Some(false) => FcsMode::Absent,
                None => FcsMode::Detect
            }
        }
    }
}

impl FromStr for FcsPolicy {
    type Err = ConfError;

    fn from_str(s: &str) -> Result<FcsPolicy, ConfError> {
        match s {
            "detect" => Ok(FcsPolicy::Detect),
            "radiotap" => Ok(FcsPolicy::Radiotap),
            "present" => Ok(FcsPolicy::Present),
            "absent" => Ok(FcsPolicy::Absent),
            other => Err(ConfError::FcsPolicy(other.to_string()))
        }
    }
}

/// Contents of the TOML configuration file.
#[derive(Debug, Default)]
pub struct TapConf {
    pub known_macs: HashMap<MacAddr, String>,
    pub fcs: Option<FcsPolicy>,
}

impl TapConf {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<TapConf, ConfError> {
        let path = path.as_ref();
        let s = fs::read_to_string(path).map_err(|source| ConfError::Io {
            path: path.display().to_string(),
            source
        })?;
        let conf = TapConf::parse(&s)?;
        debug!(path = %path.display(), known_macs = conf.known_macs.len(), "loaded configuration");
        Ok(conf)
    }

    pub fn parse(s: &str) -> Result<TapConf, ConfError> {
        let t: toml::Table = s.parse()?;

        let mut known_macs = HashMap::new();
        if let Some(table) = t.get("known-macs").and_then(|v| v.as_table()) {
            for (k, v) in table.iter() {
                match (MacAddr::from_string(k), v.as_str()) {
                    (Some(addr), Some(alias)) => {
                        known_macs.insert(addr, alias.to_string());
                    }
                    _ => warn!(entry = %k, "skipping known-macs entry")
                }
            }
        }

        let fcs = match t.get("fcs").and_then(|v| v.as_str()) {
            Some(s) => Some(s.parse()?),
            None => None
        };

        Ok(TapConf { known_macs, fcs })
    }
}
