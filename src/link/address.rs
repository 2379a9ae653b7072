//! MAC addressing: 16-bit short addresses, PAN identifiers, and the
//! resolution rules for optional address/PAN arguments.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU16, Ordering};

/// 16-bit link-layer short address, rendered as two hex octets (`"ab:cd"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShortAddress(u16);

// Process-wide allocation counter. Auto-allocated addresses are unique
// within the simulation process until the 16-bit space is exhausted, which
// no realistic deployment approaches.
static NEXT_ADDRESS: AtomicU16 = AtomicU16::new(0x0001);

impl ShortAddress {
    /// Destination accepted by every device.
    pub const BROADCAST: ShortAddress = ShortAddress(0xffff);
    /// Placeholder before `set_address` has run.
    pub const UNASSIGNED: ShortAddress = ShortAddress(0xfffe);

    pub const fn new(raw: u16) -> ShortAddress {
        ShortAddress(raw)
    }

    pub const fn to_u16(self) -> u16 {
        self.0
    }

    pub fn is_broadcast(self) -> bool {
        self == ShortAddress::BROADCAST
    }

    /// Draw a fresh address from the process-wide allocator.
    pub fn allocate() -> ShortAddress {
        let raw = NEXT_ADDRESS.fetch_add(1, Ordering::Relaxed);
        debug_assert!(raw < ShortAddress::UNASSIGNED.0, "short address space exhausted");
        ShortAddress(raw)
    }
}

impl fmt::Display for ShortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}:{:02x}", self.0 >> 8, self.0 & 0xff)
    }
}

/// Failure parsing a `"hh:hh"` short address string.
#[derive(Debug, PartialEq, Eq)]
pub enum AddressParseError {
    /// Input is not two colon-separated fields.
    Shape(String),
    /// A field is not a two-digit hex octet.
    InvalidOctet(String),
}

impl fmt::Display for AddressParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressParseError::Shape(input) => {
                write!(f, "expected two colon-separated octets, got {input:?}")
            }
            AddressParseError::InvalidOctet(octet) => {
                write!(f, "invalid hex octet {octet:?}")
            }
        }
    }
}

impl std::error::Error for AddressParseError {}

impl FromStr for ShortAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<ShortAddress, AddressParseError> {
        let mut parts = s.split(':');
        let (Some(high), Some(low), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(AddressParseError::Shape(s.to_string()));
        };

        let parse_octet = |octet: &str| {
            if octet.len() != 2 || !octet.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(AddressParseError::InvalidOctet(octet.to_string()));
            }
            u8::from_str_radix(octet, 16)
                .map_err(|_| AddressParseError::InvalidOctet(octet.to_string()))
        };

        let high = parse_octet(high)?;
        let low = parse_octet(low)?;
        Ok(ShortAddress(((high as u16) << 8) | low as u16))
    }
}

/// Personal Area Network identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PanId(u16);

impl PanId {
    /// PAN joined when no identifier is supplied.
    pub const DEFAULT: PanId = PanId(0);
    /// Wildcard PAN accepted by every associated device.
    pub const BROADCAST: PanId = PanId(0xffff);

    pub const fn new(raw: u16) -> PanId {
        PanId(raw)
    }

    pub const fn to_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for PanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a node's short address is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressConfig {
    /// Apply the given address verbatim.
    Explicit(ShortAddress),
    /// Draw a fresh address from the process-wide allocator.
    AutoAllocate,
}

impl AddressConfig {
    pub fn resolve(self) -> ShortAddress {
        match self {
            AddressConfig::Explicit(address) => address,
            AddressConfig::AutoAllocate => ShortAddress::allocate(),
        }
    }
}

/// How a node's PAN membership is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanConfig {
    Explicit(PanId),
    /// PAN 0.
    Default,
}

impl PanConfig {
    pub fn resolve(self) -> PanId {
        match self {
            PanConfig::Explicit(pan) => pan,
            PanConfig::Default => PanId::DEFAULT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip_verbatim() {
        let address: ShortAddress = "ab:cd".parse().unwrap();
        assert_eq!(address.to_u16(), 0xabcd);
        assert_eq!(address.to_string(), "ab:cd");
    }

    #[test]
    fn broadcast_renders_as_ff_ff() {
        assert_eq!(ShortAddress::BROADCAST.to_string(), "ff:ff");
        assert!(ShortAddress::BROADCAST.is_broadcast());
        assert!(!ShortAddress::new(0x0001).is_broadcast());
    }

    #[test]
    fn malformed_addresses_are_rejected() {
        assert!(matches!(
            "abcd".parse::<ShortAddress>(),
            Err(AddressParseError::Shape(_))
        ));
        assert!(matches!(
            "ab:cd:ef".parse::<ShortAddress>(),
            Err(AddressParseError::Shape(_))
        ));
        assert!(matches!(
            "zz:01".parse::<ShortAddress>(),
            Err(AddressParseError::InvalidOctet(_))
        ));
        assert!(matches!(
            "a:bc".parse::<ShortAddress>(),
            Err(AddressParseError::InvalidOctet(_))
        ));
    }

    #[test]
    fn allocation_yields_distinct_addresses() {
        let a = ShortAddress::allocate();
        let b = ShortAddress::allocate();
        assert_ne!(a, b);
        assert!(!a.is_broadcast());
        assert_ne!(a, ShortAddress::UNASSIGNED);
    }

    #[test]
    fn config_resolution_rules() {
        let explicit = AddressConfig::Explicit(ShortAddress::new(0x1234)).resolve();
        assert_eq!(explicit, ShortAddress::new(0x1234));

        assert_eq!(PanConfig::Default.resolve(), PanId::new(0));
        assert_eq!(PanConfig::Explicit(PanId::new(7)).resolve(), PanId::new(7));
    }
}
