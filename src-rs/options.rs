use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest device API level that speaks the length-prefixed dump protocol.
pub const V2_MIN_API: u32 = 23;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolVersion {
    #[serde(rename = "Version1")]
    V1,
    #[serde(rename = "Version2")]
    V2,
}

impl ProtocolVersion {
    pub fn for_api_level(api_level: u32) -> Self {
        if api_level >= V2_MIN_API {
            ProtocolVersion::V2
        } else {
            ProtocolVersion::V1
        }
    }

    pub fn number(self) -> u8 {
        match self {
            ProtocolVersion::V1 => 1,
            ProtocolVersion::V2 => 2,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version{}", self.number())
    }
}

/// What to request from the device. Its string form is stored verbatim in
/// every snapshot header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureOptions {
    pub title: String,
    pub version: ProtocolVersion,
}

impl CaptureOptions {
    pub fn new(title: impl Into<String>, version: ProtocolVersion) -> Self {
        Self {
            title: title.into(),
            version,
        }
    }

    pub fn for_api_level(title: impl Into<String>, api_level: u32) -> Self {
        Self::new(title, ProtocolVersion::for_api_level(api_level))
    }
}

impl fmt::Display for CaptureOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&raw)
    }
}

impl FromStr for CaptureOptions {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}
