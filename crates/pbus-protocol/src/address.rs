//! Module addressing and channel mapping arithmetic
//!
//! A module owns one bus address in the current protocol, giving it eight
//! sub-channels addressed by a one-hot bit mask. Devices with more than
//! eight channels aggregate several addresses into one [`ModuleAddress`];
//! the linear channel index then spans `8 * address_count` channels.

use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;

/// Lowest valid bus address
pub const MIN_ADDRESS: u8 = 1;
/// Highest valid bus address
pub const MAX_ADDRESS: u8 = 64;

/// One of the eight sub-channels of a bus address
///
/// The pair (address, mask) is what actually travels on the wire; the mask
/// always has exactly one bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelIdentifier {
    address: u8,
    mask: u8,
}

impl ChannelIdentifier {
    /// Create an identifier, rejecting masks without exactly one bit set
    pub fn new(address: u8, mask: u8) -> Result<Self, AddressError> {
        if mask.count_ones() != 1 {
            return Err(AddressError::InvalidMask(mask));
        }
        Ok(Self { address, mask })
    }

    /// The bus address this channel belongs to
    pub fn address(&self) -> u8 {
        self.address
    }

    /// The one-hot channel bit mask (1, 2, 4, .. 128)
    pub fn mask(&self) -> u8 {
        self.mask
    }

    /// 1-based bit number within the address: log2(mask) + 1
    pub fn bit_number(&self) -> u8 {
        self.mask.trailing_zeros() as u8 + 1
    }
}

impl fmt::Display for ChannelIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.bit_number())
    }
}

/// The ordered set of bus addresses owned by one logical module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleAddress {
    addresses: Vec<u8>,
}

fn check_address(address: u8) -> Result<u8, AddressError> {
    if (MIN_ADDRESS..=MAX_ADDRESS).contains(&address) {
        Ok(address)
    } else {
        Err(AddressError::InvalidAddress(address.to_string()))
    }
}

impl ModuleAddress {
    /// A module occupying a single bus address (the common case)
    pub fn new(address: u8) -> Result<Self, AddressError> {
        Ok(Self {
            addresses: vec![check_address(address)?],
        })
    }

    /// A module spanning several addresses, 8 channels each, in order
    pub fn aggregate(addresses: Vec<u8>) -> Result<Self, AddressError> {
        if addresses.is_empty() {
            return Err(AddressError::InvalidAddress("empty".into()));
        }
        for &address in &addresses {
            check_address(address)?;
        }
        Ok(Self { addresses })
    }

    /// The module's first (primary) address
    pub fn primary(&self) -> u8 {
        self.addresses[0]
    }

    /// All addresses the module answers on, in channel order
    pub fn active_addresses(&self) -> &[u8] {
        &self.addresses
    }

    /// Total number of sub-channels across all addresses
    pub fn channel_count(&self) -> usize {
        self.addresses.len() * 8
    }

    /// Map a 0-based linear channel index to its wire identifier
    pub fn channel_identifier(
        &self,
        channel_index: usize,
    ) -> Result<ChannelIdentifier, AddressError> {
        if channel_index >= self.channel_count() {
            return Err(AddressError::ChannelOutOfRange {
                index: channel_index,
                count: self.channel_count(),
            });
        }

        let address = self.addresses[channel_index / 8];
        let mask = 1u8 << (channel_index % 8);
        Ok(ChannelIdentifier { address, mask })
    }

    /// Map a wire identifier back to its 1-based channel number
    ///
    /// The identifier's address must be one of this module's active
    /// addresses; its position times 8 plus the bit number gives the
    /// channel number.
    pub fn channel_number(&self, identifier: &ChannelIdentifier) -> Result<usize, AddressError> {
        let position = self
            .addresses
            .iter()
            .position(|&a| a == identifier.address())
            .ok_or(AddressError::UnknownAddress {
                address: identifier.address(),
            })?;

        Ok(position * 8 + identifier.bit_number() as usize)
    }
}

impl fmt::Display for ModuleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary())
    }
}

impl FromStr for ModuleAddress {
    type Err = AddressError;

    /// Parse the decimal address string used in module configuration
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address: u8 = s
            .trim()
            .parse()
            .map_err(|_| AddressError::InvalidAddress(s.to_string()))?;
        Self::new(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_mask_is_one_hot() {
        assert!(ChannelIdentifier::new(5, 0x04).is_ok());
        assert_eq!(
            ChannelIdentifier::new(5, 0x05),
            Err(AddressError::InvalidMask(0x05))
        );
        assert_eq!(
            ChannelIdentifier::new(5, 0x00),
            Err(AddressError::InvalidMask(0x00))
        );
    }

    #[test]
    fn bit_numbers_are_one_based() {
        assert_eq!(ChannelIdentifier::new(1, 0x01).unwrap().bit_number(), 1);
        assert_eq!(ChannelIdentifier::new(1, 0x80).unwrap().bit_number(), 8);
    }

    #[test]
    fn mapping_is_inverse_for_single_address() {
        let module = ModuleAddress::new(12).unwrap();

        for index in 0..8 {
            let id = module.channel_identifier(index).unwrap();
            assert_eq!(id.address(), 12);
            assert_eq!(id.mask(), 1 << index);
            assert_eq!(module.channel_number(&id).unwrap(), index + 1);
        }
    }

    #[test]
    fn aggregate_spans_multiple_addresses() {
        let module = ModuleAddress::aggregate(vec![10, 11]).unwrap();
        assert_eq!(module.channel_count(), 16);

        let id = module.channel_identifier(9).unwrap();
        assert_eq!(id.address(), 11);
        assert_eq!(id.mask(), 0x02);
        assert_eq!(module.channel_number(&id).unwrap(), 10);
    }

    #[test]
    fn channel_index_out_of_range() {
        let module = ModuleAddress::new(3).unwrap();
        assert_eq!(
            module.channel_identifier(8),
            Err(AddressError::ChannelOutOfRange { index: 8, count: 8 })
        );
    }

    #[test]
    fn foreign_address_is_rejected() {
        let module = ModuleAddress::new(3).unwrap();
        let id = ChannelIdentifier::new(4, 0x01).unwrap();
        assert_eq!(
            module.channel_number(&id),
            Err(AddressError::UnknownAddress { address: 4 })
        );
    }

    #[test]
    fn address_range_is_enforced() {
        assert!(ModuleAddress::new(0).is_err());
        assert!(ModuleAddress::new(65).is_err());
        assert!(ModuleAddress::new(1).is_ok());
        assert!(ModuleAddress::new(64).is_ok());
    }

    #[test]
    fn parses_decimal_config_strings() {
        let module: ModuleAddress = "17".parse().unwrap();
        assert_eq!(module.primary(), 17);

        assert!(" 5 ".parse::<ModuleAddress>().is_ok());
        assert!("0".parse::<ModuleAddress>().is_err());
        assert!("relay".parse::<ModuleAddress>().is_err());
        assert!("".parse::<ModuleAddress>().is_err());
    }
}
