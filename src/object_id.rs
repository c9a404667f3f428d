use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::Error;

/// Number of hexadecimal characters in a rendered [`ObjectId`].
pub const HEX_LEN: usize = 40;

/// An identifier for a particular framed object.
/// Under the hood, this is a [`sha1`] digest of `{type} {len}\0{payload}`.
///
/// It is displayed in lowercase hexadecimal format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; 20]);

impl ObjectId {
    /// Hashes bytes which are already framed.
    pub fn digest(framed: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(framed);
        ObjectId(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The abbreviated form used in graph labels.
    pub fn short(&self) -> String {
        let mut s = self.to_hex();
        s.truncate(7);
        s
    }

    /// Splits the hex form into the fan-out directory name and file name.
    pub fn fan_out(&self) -> (String, String) {
        let mut dir = self.to_hex();
        let file = dir.split_off(2);
        (dir, file)
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowercase = s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if s.len() != HEX_LEN || !lowercase {
            return Err(Error::InvalidObjectId(s.to_string()));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| Error::InvalidObjectId(s.to_string()))?;
        Ok(ObjectId(bytes))
    }
}

impl TryFrom<&[u8]> for ObjectId {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let s = std::str::from_utf8(bytes)
            .map_err(|_| Error::InvalidObjectId(String::from_utf8_lossy(bytes).into_owned()))?;
        s.parse()
    }
}

impl Serialize for ObjectId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_hex().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[test]
fn test_digest_of_framed_blob() {
    // `printf hello | git hash-object --stdin`
    let id = ObjectId::digest(b"blob 5\0hello");
    assert_eq!(id.to_hex(), "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0");
    assert_eq!(id.short(), "b6fc4c6");
    let (dir, file) = id.fan_out();
    assert_eq!(dir, "b6");
    assert_eq!(file.len(), 38);
}

#[test]
fn test_parse_round_trip() {
    let id = ObjectId::digest(b"blob 0\0");
    let parsed: ObjectId = id.to_string().parse().unwrap();
    assert_eq!(id, parsed);
    assert_eq!(parsed.to_hex(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
}

#[test]
fn test_rejects_bad_ids() {
    assert!("abc".parse::<ObjectId>().is_err());
    assert!("E69DE29BB2D1D6434B8B29AE775AD8C2E48C5391"
        .parse::<ObjectId>()
        .is_err());
    assert!("z69de29bb2d1d6434b8b29ae775ad8c2e48c5391"
        .parse::<ObjectId>()
        .is_err());
}

#[test]
fn test_serde_as_hex_string() {
    let id = ObjectId::digest(b"blob 5\0hello");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0\"");
    let back: ObjectId = serde_json::from_str(&json).unwrap();
    assert_eq!(id, back);
}
