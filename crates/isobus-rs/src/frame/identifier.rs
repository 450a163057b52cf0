use crate::hal::IsobusError;
use crate::types::{CanPriority, Pgn, BROADCAST_CAN_ADDRESS, NULL_CAN_ADDRESS};
use core::fmt;

/// First PDU-format value of the PDU2 (broadcast) range.
const PDU2_FORMAT_START: u32 = 0xF0;

/// A 29-bit J1939 extended identifier.
///
/// The identifier packs priority (bits 26..=28), the parameter group number
/// and the source address (bits 0..=7). For PDU1 parameter groups (PDU format
/// below 0xF0) byte 1 carries the destination address; for PDU2 groups the
/// same byte extends the PGN and the destination is implicitly global.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CanIdentifier(u32);

impl CanIdentifier {
    /// Wraps a raw identifier received from the hardware. High bits beyond
    /// the 29-bit field are discarded.
    pub fn new(raw: u32) -> Self {
        Self(raw & 0x1FFF_FFFF)
    }

    /// Encodes the discrete identifier components.
    ///
    /// A destination of [`NULL_CAN_ADDRESS`] is never routable and PDU2
    /// parameter groups can only be sent to [`BROADCAST_CAN_ADDRESS`]; both
    /// yield an error instead of a frame.
    pub fn encode(
        priority: CanPriority,
        pgn: Pgn,
        source: u8,
        destination: u8,
    ) -> Result<Self, IsobusError> {
        if destination == NULL_CAN_ADDRESS {
            return Err(IsobusError::NoRoute);
        }

        let mut identifier = u32::from(u8::from(priority)) << 26;
        identifier |= u32::from(source);

        if (pgn >> 8) & 0xFF >= PDU2_FORMAT_START {
            // PDU2: the whole 18-bit group number rides in bits 8..=25.
            if destination != BROADCAST_CAN_ADDRESS {
                return Err(IsobusError::CannotSendToDestination);
            }
            identifier |= (pgn & 0x3FFFF) << 8;
        } else {
            // PDU1: destination in byte 1, PS byte of the PGN zeroed.
            identifier |= u32::from(destination) << 8;
            identifier |= (pgn & 0x3FF00) << 8;
        }
        Ok(Self(identifier & 0x1FFF_FFFF))
    }

    pub fn priority(&self) -> CanPriority {
        CanPriority::from_bits(((self.0 >> 26) & 0x07) as u8)
    }

    pub fn source_address(&self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// Destination address, [`BROADCAST_CAN_ADDRESS`] for PDU2 groups.
    pub fn destination_address(&self) -> u8 {
        if self.is_pdu2() {
            BROADCAST_CAN_ADDRESS
        } else {
            ((self.0 >> 8) & 0xFF) as u8
        }
    }

    /// The 18-bit parameter group number. For PDU1 identifiers the PS byte
    /// (which carries the destination) is masked out of the group number.
    pub fn pgn(&self) -> Pgn {
        if self.is_pdu2() {
            (self.0 >> 8) & 0x3FFFF
        } else {
            (self.0 >> 8) & 0x3FF00
        }
    }

    pub fn raw(&self) -> u32 {
        self.0
    }

    fn is_pdu2(&self) -> bool {
        (self.0 >> 16) & 0xFF >= PDU2_FORMAT_START
    }
}

impl fmt::Debug for CanIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanIdentifier")
            .field("raw", &format_args!("{:#010X}", self.0))
            .field("priority", &self.priority())
            .field("pgn", &format_args!("{:#07X}", self.pgn()))
            .field("source", &self.source_address())
            .field("destination", &self.destination_address())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        struct TestCase {
            priority: CanPriority,
            pgn: Pgn,
            source: u8,
            destination: u8,
        }
        let test_cases = [
            // PDU1 destination specific (address claim request shape)
            TestCase {
                priority: CanPriority::Default6,
                pgn: 0xEA00,
                source: 0x00,
                destination: 0xFC,
            },
            // PDU1 broadcast
            TestCase {
                priority: CanPriority::Default6,
                pgn: 0xEE00,
                source: 0x80,
                destination: BROADCAST_CAN_ADDRESS,
            },
            // PDU2 broadcast
            TestCase {
                priority: CanPriority::Priority3,
                pgn: 0xFE6C,
                source: 0xEE,
                destination: BROADCAST_CAN_ADDRESS,
            },
            TestCase {
                priority: CanPriority::Lowest7,
                pgn: 0x0EC00,
                source: 61,
                destination: BROADCAST_CAN_ADDRESS,
            },
        ];
        for case in &test_cases {
            let id = CanIdentifier::encode(case.priority, case.pgn, case.source, case.destination)
                .expect("valid encode");
            assert_eq!(id.priority(), case.priority);
            assert_eq!(id.pgn(), case.pgn);
            assert_eq!(id.source_address(), case.source);
            assert_eq!(id.destination_address(), case.destination);
        }
    }

    #[test]
    fn encode_known_identifiers() {
        struct TestCase {
            raw: u32,
            priority: CanPriority,
            pgn: Pgn,
            source: u8,
            destination: u8,
        }
        let test_cases = [
            TestCase {
                raw: 0x18EEFF80,
                priority: CanPriority::Default6,
                pgn: 0xEE00,
                source: 0x80,
                destination: 0xFF,
            },
            TestCase {
                raw: 0x18EFFF20,
                priority: CanPriority::Default6,
                pgn: 0xEF00,
                source: 0x20,
                destination: 0xFF,
            },
            TestCase {
                raw: 0x0CFE6CEE,
                priority: CanPriority::Priority3,
                pgn: 0xFE6C,
                source: 0xEE,
                destination: 0xFF,
            },
        ];
        for case in &test_cases {
            let id = CanIdentifier::encode(case.priority, case.pgn, case.source, case.destination)
                .expect("valid encode");
            assert_eq!(id.raw(), case.raw);
        }
    }

    #[test]
    fn decode_pdu1_masks_ps_byte_out_of_pgn() {
        let id = CanIdentifier::new(0x18EE2380);
        assert_eq!(id.pgn(), 0xEE00);
        assert_eq!(id.destination_address(), 0x23);
        assert_eq!(id.source_address(), 0x80);
    }

    #[test]
    fn pdu2_to_specific_destination_is_rejected() {
        let result = CanIdentifier::encode(CanPriority::Default6, 0xFECA, 0x20, 0x42);
        assert_eq!(result, Err(IsobusError::CannotSendToDestination));
    }

    #[test]
    fn null_destination_is_rejected() {
        let result = CanIdentifier::encode(CanPriority::Default6, 0xEF00, 0x20, NULL_CAN_ADDRESS);
        assert_eq!(result, Err(IsobusError::NoRoute));
    }

    #[test]
    fn new_discards_flag_bits() {
        assert_eq!(CanIdentifier::new(0xFFFF_FFFF).raw(), 0x1FFF_FFFF);
    }
}
