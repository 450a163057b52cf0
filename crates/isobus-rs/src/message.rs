use crate::cf::CfHandle;
use crate::frame::CanIdentifier;
use crate::types::{Millis, Pgn};

/// A received (or transport-assembled) message, fully resolved against the
/// control function registry at the moment it entered the stack.
#[derive(Debug, Clone)]
pub struct CanMessage {
    identifier: CanIdentifier,
    data: Vec<u8>,
    source: Option<CfHandle>,
    destination: Option<CfHandle>,
    port: u8,
    timestamp: Millis,
}

impl CanMessage {
    pub fn new(
        identifier: CanIdentifier,
        data: Vec<u8>,
        source: Option<CfHandle>,
        destination: Option<CfHandle>,
        port: u8,
        timestamp: Millis,
    ) -> Self {
        Self {
            identifier,
            data,
            source,
            destination,
            port,
            timestamp,
        }
    }

    pub fn identifier(&self) -> CanIdentifier {
        self.identifier
    }

    /// Shortcut for `identifier().pgn()`.
    pub fn pgn(&self) -> Pgn {
        self.identifier.pgn()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The resolved sender, if its address was known when the message arrived.
    pub fn source_control_function(&self) -> Option<CfHandle> {
        self.source
    }

    /// The resolved destination; `None` for broadcasts and unknown addresses.
    pub fn destination_control_function(&self) -> Option<CfHandle> {
        self.destination
    }

    pub fn port(&self) -> u8 {
        self.port
    }

    /// Monotonic receive timestamp in milliseconds.
    pub fn timestamp(&self) -> Millis {
        self.timestamp
    }
}
