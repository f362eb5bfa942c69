use std::{fmt, str::FromStr};

use crate::{Error, Result};

/// A Bluetooth device address (`BD_ADDR`).
///
/// Stored in display order, most significant octet first. On the HCI wire the
/// address travels little-endian; use [`from_le_bytes`](Self::from_le_bytes)
/// and [`to_le_bytes`](Self::to_le_bytes) at the codec boundary.
///
/// The canonical text form is six uppercase hex octets separated by colons.
/// Parsing is case-insensitive, so differently cased spellings of one address
/// normalize to the same value.
///
/// ```rust
/// use hci_cert::Address;
///
/// let addr: Address = "00:11:22:aa:bb:cc".parse().unwrap();
/// assert_eq!(addr.to_string(), "00:11:22:AA:BB:CC");
/// assert_eq!(addr.to_le_bytes(), [0xcc, 0xbb, 0xaa, 0x22, 0x11, 0x00]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 6]);

impl Address {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Build an address from the little-endian octets carried in HCI packets.
    pub fn from_le_bytes(mut octets: [u8; 6]) -> Self {
        octets.reverse();
        Self(octets)
    }

    /// Octets in HCI wire order.
    pub fn to_le_bytes(&self) -> [u8; 6] {
        let mut octets = self.0;
        octets.reverse();
        octets
    }

    /// Octets in display order.
    #[inline]
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidAddress(s.to_owned());
        let mut octets = [0u8; 6];
        let mut parts = s.trim().split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(octets))
    }
}

impl From<[u8; 6]> for Address {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl TryFrom<&[u8]> for Address {
    type Error = Error;

    /// Accepts either six raw octets in display order or the UTF-8 text form.
    fn try_from(bytes: &[u8]) -> Result<Self> {
        if let Ok(octets) = <[u8; 6]>::try_from(bytes) {
            return Ok(Self(octets));
        }
        let text = std::str::from_utf8(bytes)
            .map_err(|_| Error::InvalidAddress(format!("{bytes:02x?}")))?;
        text.parse()
    }
}

/// Anything a connection can be initiated to.
///
/// Implemented for [`Address`], text (`&str`, `String`) and byte forms
/// (`&[u8]`, byte arrays, `Vec<u8>`), so scenarios can pass whatever
/// representation they read from a device.
pub trait ToAddress {
    fn to_address(&self) -> Result<Address>;
}

impl ToAddress for Address {
    fn to_address(&self) -> Result<Address> {
        Ok(*self)
    }
}

impl ToAddress for str {
    fn to_address(&self) -> Result<Address> {
        self.parse()
    }
}

impl ToAddress for String {
    fn to_address(&self) -> Result<Address> {
        self.parse()
    }
}

impl ToAddress for [u8] {
    fn to_address(&self) -> Result<Address> {
        Address::try_from(self)
    }
}

impl<const N: usize> ToAddress for [u8; N] {
    fn to_address(&self) -> Result<Address> {
        Address::try_from(&self[..])
    }
}

impl ToAddress for Vec<u8> {
    fn to_address(&self) -> Result<Address> {
        Address::try_from(self.as_slice())
    }
}

impl<T: ToAddress + ?Sized> ToAddress for &T {
    fn to_address(&self) -> Result<Address> {
        (**self).to_address()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
