// crates/isobus-rs/src/hal.rs
use crate::types::{CAN_DATA_LENGTH, CAN_PORT_MAXIMUM};
use core::fmt;

/// Defines a portable, descriptive Error type for the ISOBUS stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsobusError {
    /// A payload length was zero, above the transport limit, or above eight
    /// bytes for a raw single-frame send.
    InvalidDataLength(usize),
    /// Neither a data buffer nor a chunk callback was supplied.
    MissingPayload,
    /// A CAN channel index at or above [`CAN_PORT_MAXIMUM`].
    InvalidPort(u8),
    /// An address outside the claimable range 0..=253.
    InvalidAddress(u8),
    /// The source handle did not resolve to an internal control function.
    InvalidSourceControlFunction,
    /// The source control function has not completed address claiming.
    NoValidAddress,
    /// The destination control function holds no bus address.
    NoRoute,
    /// A PDU2 (broadcast-format) parameter group cannot be sent to a
    /// specific destination address.
    CannotSendToDestination,
    /// The hardware layer rejected the frame.
    HardwareSendFailed,
    /// No registered transport protocol accepted a multi-frame payload.
    ProtocolRejected,
}

impl fmt::Display for IsobusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDataLength(len) => write!(f, "Invalid data length: {}", len),
            Self::MissingPayload => write!(f, "No data buffer and no chunk callback"),
            Self::InvalidPort(port) => {
                write!(f, "Invalid CAN port {} (maximum {})", port, CAN_PORT_MAXIMUM)
            }
            Self::InvalidAddress(address) => {
                write!(f, "Address {} is outside the claimable range", address)
            }
            Self::InvalidSourceControlFunction => {
                write!(f, "Source is not a registered internal control function")
            }
            Self::NoValidAddress => write!(f, "Source has not claimed a bus address"),
            Self::NoRoute => write!(f, "Destination holds no bus address"),
            Self::CannotSendToDestination => {
                write!(f, "Broadcast parameter group sent to a specific destination")
            }
            Self::HardwareSendFailed => write!(f, "Hardware layer rejected the frame"),
            Self::ProtocolRejected => write!(f, "No transport protocol accepted the message"),
        }
    }
}

impl std::error::Error for IsobusError {}

/// A classic CAN frame as exchanged with the hardware layer.
///
/// ISOBUS traffic always uses 29-bit extended identifiers; `is_extended` is
/// carried so a driver can reject the occasional 11-bit frame before it
/// reaches the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    /// CAN channel the frame belongs to.
    pub channel: u8,
    /// The 29-bit extended identifier.
    pub identifier: u32,
    pub is_extended: bool,
    pub data: [u8; CAN_DATA_LENGTH],
    /// Number of valid bytes in `data`, 0 through 8.
    pub data_length: u8,
}

impl CanFrame {
    /// Builds an extended frame from an identifier and up to eight data bytes.
    ///
    /// Panics if `data` is longer than eight bytes; callers validate length
    /// before constructing frames.
    pub fn new(channel: u8, identifier: u32, data: &[u8]) -> Self {
        let mut bytes = [0u8; CAN_DATA_LENGTH];
        bytes[..data.len()].copy_from_slice(data);
        Self {
            channel,
            identifier,
            is_extended: true,
            data: bytes,
            data_length: data.len() as u8,
        }
    }

    /// The valid portion of the data field.
    pub fn data(&self) -> &[u8] {
        &self.data[..usize::from(self.data_length.min(CAN_DATA_LENGTH as u8))]
    }
}

/// Hardware Abstraction Layer for a raw CAN interface.
///
/// This trait abstracts the physical transmission of CAN frames, keeping the
/// network-management core platform-agnostic. Ingress is the inverse path:
/// the driver (or its receive thread) calls
/// [`CanNetworkManager::receive_frame`](crate::network::CanNetworkManager::receive_frame)
/// for every frame it takes off the wire.
pub trait CanDriver: Send {
    /// Sends one frame over the network.
    fn send_frame(&mut self, frame: &CanFrame) -> Result<(), IsobusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_data_respects_length() {
        let frame = CanFrame::new(0, 0x18EEFF80, &[1, 2, 3]);
        assert_eq!(frame.data(), &[1, 2, 3]);
        assert_eq!(frame.data_length, 3);
        assert!(frame.is_extended);
    }

    #[test]
    fn error_display_is_descriptive() {
        let text = IsobusError::InvalidPort(9).to_string();
        assert!(text.contains('9'));
    }
}
