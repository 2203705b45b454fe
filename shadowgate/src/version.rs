//! Protocol version marker.
//!
//! The 402 challenge carries `"x402Version": 1` as a bare integer. [`Version`]
//! encodes that number in the type so a challenge can never be built with the
//! wrong version, and a body announcing another version fails to deserialize.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A const-generic protocol version that serializes as a bare integer.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Version<const N: u8>;

/// The only protocol version this crate speaks.
pub type X402Version1 = Version<1>;

impl<const N: u8> Version<N> {
    /// Numeric value of the version.
    pub const VALUE: u8 = N;
}

impl<const N: u8> From<Version<N>> for u8 {
    fn from(_: Version<N>) -> Self {
        N
    }
}

impl<const N: u8> fmt::Display for Version<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{N}")
    }
}

impl<const N: u8> Serialize for Version<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(N)
    }
}

impl<'de, const N: u8> Deserialize<'de> for Version<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            v if v == N => Ok(Self),
            v => Err(serde::de::Error::custom(format!(
                "unsupported x402 version {v}, expected {N}"
            ))),
        }
    }
}
