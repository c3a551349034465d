//! Octet string buffer used for protocol PDUs
//!
//! A thin wrapper over a byte vector with big-endian append/read helpers,
//! used wherever encoded PDUs cross task or node boundaries.

use std::fmt;

/// An owned octet buffer with big-endian accessors.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct OctetString {
    data: Vec<u8>,
}

impl OctetString {
    /// Creates an empty octet string.
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Creates an octet string with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Creates an octet string by copying a slice.
    pub fn from_slice(slice: &[u8]) -> Self {
        Self {
            data: slice.to_vec(),
        }
    }

    /// Returns the underlying bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the length in octets.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Appends a single octet.
    pub fn append_octet(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Appends a 16-bit value in big-endian order.
    pub fn append_octet2(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Appends a 32-bit value in big-endian order.
    pub fn append_octet4(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Appends a 64-bit value in big-endian order.
    pub fn append_octet8(&mut self, value: u64) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Appends a byte slice.
    pub fn append_slice(&mut self, slice: &[u8]) {
        self.data.extend_from_slice(slice);
    }

    /// Appends another octet string.
    pub fn append(&mut self, other: &OctetString) {
        self.data.extend_from_slice(&other.data);
    }

    /// Consumes the octet string and returns the byte vector.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Returns the octet at the given index, if present.
    pub fn get(&self, index: usize) -> Option<u8> {
        self.data.get(index).copied()
    }
}

impl From<Vec<u8>> for OctetString {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl From<&[u8]> for OctetString {
    fn from(slice: &[u8]) -> Self {
        Self::from_slice(slice)
    }
}

impl AsRef<[u8]> for OctetString {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for OctetString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OctetString[{}]{{", self.data.len())?;
        for (i, b) in self.data.iter().take(16).enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{b:02x}")?;
        }
        if self.data.len() > 16 {
            write!(f, " ..")?;
        }
        write!(f, "}}")
    }
}

impl fmt::Display for OctetString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.data {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}
