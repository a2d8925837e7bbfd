use crate::error::TypesError;
use std::fmt;
use std::str::FromStr;

/// 24-byte content id of an event.
///
/// Events are owned by the host; the core only ever compares and orders
/// them by this id. Construction from raw content (`compute`) is provided
/// for hosts and tests that don't already content-address their events.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId([u8; 24]);

impl EventId {
    pub const ZERO: Self = Self([0u8; 24]);
    pub const LEN: usize = 24;

    pub const fn from_bytes(bytes: [u8; 24]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 24] {
        &self.0
    }

    /// Create from a byte slice.
    pub fn from_slice(slice: &[u8]) -> Result<Self, TypesError> {
        if slice.len() != Self::LEN {
            return Err(TypesError::InvalidEventIdLength(slice.len()));
        }
        let mut bytes = [0u8; 24];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Derive an id from arbitrary content, truncating a blake3 digest to 24 bytes.
    /// For hosts and tests that don't content-address events themselves.
    pub fn compute(data: &[u8]) -> Self {
        let digest = blake3::hash(data);
        let mut bytes = [0u8; 24];
        bytes.copy_from_slice(&digest.as_bytes()[..24]);
        Self(bytes)
    }

    /// Same as `compute` but over multiple chunks, e.g. creator + seq + parents.
    pub fn compute_multi(data: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for chunk in data {
            hasher.update(chunk);
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 24];
        bytes.copy_from_slice(&digest.as_bytes()[..24]);
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self == &Self::ZERO
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self)
    }
}

impl fmt::LowerHex for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::UpperHex for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode_upper(self.0))
    }
}

impl FromStr for EventId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = if s.starts_with("0x") || s.starts_with("0X") {
            &s[2..]
        } else {
            s
        };

        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl AsRef<[u8]> for EventId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_deterministic() {
        let a = EventId::compute(b"event-a");
        let b = EventId::compute(b"event-a");
        let c = EventId::compute(b"event-b");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_compute_multi() {
        let a = EventId::compute_multi(&[b"event-", b"a"]);
        let b = EventId::compute(b"event-a");
        assert_eq!(a, b);
    }

    #[test]
    fn test_hex_roundtrip() {
        let id = EventId::compute(b"roundtrip");
        let parsed: EventId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_zero() {
        assert!(EventId::ZERO.is_zero());
        assert!(!EventId::compute(b"x").is_zero());
    }

    #[test]
    fn test_rejects_wrong_length() {
        let err = EventId::from_slice(&[0u8; 10]).unwrap_err();
        assert_eq!(err, TypesError::InvalidEventIdLength(10));
    }
}
