//! Destination address filtering
//!
//! Frames not addressed to the receiving node are dropped without any
//! observable effect. There is no broadcast fan-out and no forwarding.

use crate::protocol::{Address, Frame};

/// Accepts frames addressed to one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressFilter {
    own: Address,
}

impl AddressFilter {
    /// Create a filter for the given receiving address
    pub fn new(own: Address) -> Self {
        Self { own }
    }

    /// Address this filter accepts
    pub fn own_address(&self) -> Address {
        self.own
    }

    /// Whether the frame is addressed to this node
    pub fn accepts(&self, frame: &Frame) -> bool {
        frame.recipient() == self.own.as_u8()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_own_address() {
        let filter = AddressFilter::new(Address::Master);
        let frame = Frame::between(Address::Master, Address::Node1, 0, "1.0,2.0").unwrap();
        assert!(filter.accepts(&frame));
    }

    #[test]
    fn test_rejects_other_addresses() {
        let filter = AddressFilter::new(Address::Node1);
        for recipient in [0x00u8, 0x01, 0xCC, 0xFF, 0xBA] {
            let frame = Frame::new(recipient, 0xFF, 0, "SF7").unwrap();
            assert!(!filter.accepts(&frame), "recipient {:#04x}", recipient);
        }
    }
}
