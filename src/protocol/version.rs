//! Protocol version negotiation.
//!
//! Versions are carried as the wire version byte (`0x01` for 1.0, `0x04` for
//! 1.3, ...). Configuration names them by their dotted release string.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Wire version byte announced by a switch during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolVersion(pub u8);

impl ProtocolVersion {
    pub const V1_0: ProtocolVersion = ProtocolVersion(0x01);
    pub const V1_1: ProtocolVersion = ProtocolVersion(0x02);
    pub const V1_2: ProtocolVersion = ProtocolVersion(0x03);
    pub const V1_3: ProtocolVersion = ProtocolVersion(0x04);
    pub const V1_4: ProtocolVersion = ProtocolVersion(0x05);
    pub const V1_5: ProtocolVersion = ProtocolVersion(0x06);

    const NAMES: [(ProtocolVersion, &'static str); 6] = [
        (Self::V1_0, "1.0"),
        (Self::V1_1, "1.1"),
        (Self::V1_2, "1.2"),
        (Self::V1_3, "1.3"),
        (Self::V1_4, "1.4"),
        (Self::V1_5, "1.5"),
    ];

    fn name(&self) -> Option<&'static str> {
        Self::NAMES
            .iter()
            .find(|(version, _)| version == self)
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "0x{:02x}", self.0),
        }
    }
}

/// Error for unknown version strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown protocol version '{0}'")]
pub struct UnknownVersion(pub String);

impl FromStr for ProtocolVersion {
    type Err = UnknownVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::NAMES
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(version, _)| *version)
            .ok_or_else(|| UnknownVersion(s.to_string()))
    }
}

/// The set of versions this controller instance will complete a handshake with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedVersions {
    versions: Vec<ProtocolVersion>,
}

impl SupportedVersions {
    pub fn new(mut versions: Vec<ProtocolVersion>) -> Self {
        versions.sort();
        versions.dedup();
        Self { versions }
    }

    /// Parse configured version names. Unknown names are reported together.
    pub fn parse(names: &[String]) -> Result<Self, Vec<UnknownVersion>> {
        let mut versions = Vec::with_capacity(names.len());
        let mut errors = Vec::new();
        for name in names {
            match name.parse() {
                Ok(version) => versions.push(version),
                Err(e) => errors.push(e),
            }
        }
        if errors.is_empty() {
            Ok(Self::new(versions))
        } else {
            Err(errors)
        }
    }

    pub fn contains(&self, version: ProtocolVersion) -> bool {
        self.versions.contains(&version)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProtocolVersion> {
        self.versions.iter()
    }
}

impl Default for SupportedVersions {
    fn default() -> Self {
        Self::new(vec![ProtocolVersion::V1_3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_names() {
        assert_eq!("1.3".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::V1_3);
        assert_eq!(" 1.0 ".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::V1_0);
        assert!("2.0".parse::<ProtocolVersion>().is_err());
    }

    #[test]
    fn display_falls_back_to_hex() {
        assert_eq!(ProtocolVersion::V1_3.to_string(), "1.3");
        assert_eq!(ProtocolVersion(0x42).to_string(), "0x42");
    }

    #[test]
    fn default_supports_only_1_3() {
        let supported = SupportedVersions::default();
        assert!(supported.contains(ProtocolVersion::V1_3));
        assert!(!supported.contains(ProtocolVersion::V1_0));
    }

    #[test]
    fn parse_collects_every_unknown_name() {
        let names = vec!["1.3".to_string(), "9.9".to_string(), "x".to_string()];
        let errors = SupportedVersions::parse(&names).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
