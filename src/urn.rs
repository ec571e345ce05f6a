//! Parsing and serialization of MIoT specification URNs.
//! Every schema entity (device, service, property, action, event) is
//! identified by a 7-part colon-delimited URN.

use crate::error::MiotError;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identifies a schema entity and its version, e.g.
/// `urn:miot-spec-v2:device:air-purifier:0000A007:zhimi-v7:1`.
///
/// Construction is strict: anything that is not exactly seven
/// colon-delimited parts with a leading `urn` and an integer version is
/// rejected, there is no partial parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct URN {
    pub namespace: String,
    pub urn_type: String,
    pub name: String,
    pub internal_id: String,
    pub model: String,
    pub version: u32,
}

impl URN {
    /// The `name` part with dashes normalized to underscores.
    pub fn normalized_name(&self) -> String {
        self.name.replace('-', "_")
    }

    /// Re-serializes the URN into its canonical string form.
    pub fn urn_string(&self) -> String {
        self.to_string()
    }
}

impl FromStr for URN {
    type Err = MiotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 7 || parts[0] != "urn" {
            return Err(MiotError::InvalidUrn(s.to_string()));
        }
        let version = parts[6]
            .parse::<u32>()
            .map_err(|_| MiotError::InvalidUrn(s.to_string()))?;

        Ok(URN {
            namespace: parts[1].to_string(),
            urn_type: parts[2].to_string(),
            name: parts[3].to_string(),
            internal_id: parts[4].to_string(),
            model: parts[5].to_string(),
            version,
        })
    }
}

impl fmt::Display for URN {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "urn:{}:{}:{}:{}:{}:{}",
            self.namespace, self.urn_type, self.name, self.internal_id, self.model, self.version
        )
    }
}

impl Serialize for URN {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for URN {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
