use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::{
    fmt::{self, Debug, Display},
    str::FromStr,
};
use thiserror::Error;

/// A 32-byte transaction identifier.
///
/// Bitcoin txids are conventionally displayed and parsed in reversed-byte-order hex; this type
/// stores the raw bytes as returned by the decoder and only reverses them for display/parsing, so
/// that hashing and equality are cheap and do not depend on string formatting.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Txid([u8; 32]);

impl Txid {
    /// Wraps raw, internal-order bytes (as produced by a decoder) into a [`Txid`].
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw, internal-order bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

#[derive(Debug, Error)]
#[error("invalid txid: {0}")]
pub struct ParseTxidError(String);

impl FromStr for Txid {
    type Err = ParseTxidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = hex::decode(s).map_err(|e| ParseTxidError(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(ParseTxidError(format!("expected 32 bytes, got {}", bytes.len())));
        }
        bytes.reverse();
        let mut buf = [0u8; 32];
        buf.copy_from_slice(&bytes);
        Ok(Self(buf))
    }
}

impl Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        write!(f, "{}", hex::encode(reversed))
    }
}

impl Debug for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txid({self})")
    }
}

impl Serialize for Txid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Txid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let bytes = {
            let mut b = [0u8; 32];
            for (i, byte) in b.iter_mut().enumerate() {
                *byte = i as u8;
            }
            b
        };
        let txid = Txid::from_bytes(bytes);
        let parsed: Txid = txid.to_string().parse().unwrap();
        assert_eq!(txid, parsed);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("aabb".parse::<Txid>().is_err());
    }
}
