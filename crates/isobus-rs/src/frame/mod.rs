//! Identifier codec and frame construction for the data link layer.

pub mod identifier;

pub use identifier::CanIdentifier;

use crate::hal::{CanFrame, IsobusError};
use crate::types::{CanPriority, Pgn, CAN_DATA_LENGTH, CAN_PORT_MAXIMUM};

/// Builds a single outbound frame from its discrete components.
///
/// Fails when the port is out of range, the payload does not fit one frame,
/// or the identifier cannot be encoded (see [`CanIdentifier::encode`]).
pub fn construct_frame(
    port: u8,
    source: u8,
    destination: u8,
    pgn: Pgn,
    priority: CanPriority,
    data: &[u8],
) -> Result<CanFrame, IsobusError> {
    if usize::from(port) >= CAN_PORT_MAXIMUM {
        return Err(IsobusError::InvalidPort(port));
    }
    if data.len() > CAN_DATA_LENGTH {
        return Err(IsobusError::InvalidDataLength(data.len()));
    }
    let identifier = CanIdentifier::encode(priority, pgn, source, destination)?;
    Ok(CanFrame::new(port, identifier.raw(), data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BROADCAST_CAN_ADDRESS;

    #[test]
    fn construct_rejects_oversized_payload() {
        let result = construct_frame(
            0,
            0x20,
            BROADCAST_CAN_ADDRESS,
            0xEF00,
            CanPriority::Default6,
            &[0u8; 9],
        );
        assert_eq!(result, Err(IsobusError::InvalidDataLength(9)));
    }

    #[test]
    fn construct_rejects_bad_port() {
        let result = construct_frame(
            CAN_PORT_MAXIMUM as u8,
            0x20,
            BROADCAST_CAN_ADDRESS,
            0xEF00,
            CanPriority::Default6,
            &[0xAA],
        );
        assert_eq!(result, Err(IsobusError::InvalidPort(CAN_PORT_MAXIMUM as u8)));
    }

    #[test]
    fn construct_encodes_identifier_and_data() {
        let frame = construct_frame(
            1,
            0x20,
            BROADCAST_CAN_ADDRESS,
            0xEF00,
            CanPriority::Default6,
            &[0xAA, 0xBB],
        )
        .expect("valid frame");
        assert_eq!(frame.channel, 1);
        assert_eq!(frame.identifier, 0x18EFFF20);
        assert_eq!(frame.data(), &[0xAA, 0xBB]);
    }
}
