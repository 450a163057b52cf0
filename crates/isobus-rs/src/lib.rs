//! ISO 11783 (ISOBUS) / SAE J1939 network management.
//!
//! This crate sits between a raw CAN driver and application logic. It keeps
//! track of every logical participant on a CAN segment (the control
//! functions), performs ISO 11783-5 address claiming for the participants
//! this process owns, routes incoming frames to registered parameter-group
//! handlers, and arbitrates between direct single-frame transmission and
//! pluggable multi-frame transport protocols.
//!
//! The entry point is [`CanNetworkManager`]: construct it over a
//! [`CanDriver`], register internal and partnered control functions, feed
//! received frames into [`CanNetworkManager::receive_frame`] and call
//! [`CanNetworkManager::update`] at least every 10 ms.

// --- Foundation Modules ---
pub mod types;
pub mod hal;

// --- Data Link Layer ---
pub mod frame;
pub mod message;

// --- Network Management ---
pub mod cf;
pub mod name;
pub mod network;
pub mod transport;

// Export core types and the CAN driver abstraction
pub use cf::{AddressClaimState, CfHandle, ControlFunction, ControlFunctionKind};
pub use frame::CanIdentifier;
pub use hal::{CanDriver, CanFrame, IsobusError};
pub use message::CanMessage;
pub use name::{Name, NameField, NameFilter};
pub use network::{CanNetworkManager, PgnCallback, PgnCallbackEntry};
pub use transport::{
    DataChunkCallback, DriverBadge, TransmitCompleteCallback, TransmitJob, TransportProtocol,
};
pub use types::{
    CanPriority, Millis, Pgn, ABSOLUTE_MAX_MESSAGE_LENGTH, BROADCAST_CAN_ADDRESS, CAN_DATA_LENGTH,
    CAN_PORT_MAXIMUM, NULL_CAN_ADDRESS, PGN_ADDRESS_CLAIM, PGN_REQUEST,
};
