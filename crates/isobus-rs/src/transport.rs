//! The contract between the network manager and pluggable multi-frame
//! transport protocols (ISO 11783-3 TP, ETP, NMEA 2000 fast packet, ...).
//!
//! Concrete protocols live outside this crate. The manager owns a registry
//! of boxed protocols and consults them, in registration order, for every
//! outbound message before falling back to a single frame.

use crate::cf::CfHandle;
use crate::types::{CanPriority, Millis, Pgn};

/// Capability token proving the caller is the network manager.
///
/// The constructor is crate-private, so application code cannot mint one;
/// protocol implementations simply accept the reference and may ignore it.
pub struct DriverBadge {
    _private: (),
}

impl DriverBadge {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

/// Notification that a transmission finished. `success` reports whether the
/// full payload made it onto the bus.
pub type TransmitCompleteCallback = fn(
    pgn: Pgn,
    length: usize,
    source: CfHandle,
    destination: Option<CfHandle>,
    success: bool,
    parent: usize,
);

/// Pull-style payload source for chunked transmissions. The implementation
/// fills `chunk` with payload bytes starting at `offset` and returns false to
/// abort the transfer.
pub type DataChunkCallback = fn(offset: usize, chunk: &mut [u8], parent: usize) -> bool;

/// Everything a transport protocol needs to decide whether it will carry a
/// message, and to run the transfer if it accepts.
#[derive(Clone, Copy)]
pub struct TransmitJob<'a> {
    pub pgn: Pgn,
    /// Payload, if fully materialized. `None` means the data is pulled
    /// through `chunk` instead.
    pub data: Option<&'a [u8]>,
    /// Total payload length in bytes, also when chunked.
    pub length: usize,
    pub source: CfHandle,
    pub destination: Option<CfHandle>,
    pub priority: CanPriority,
    pub on_complete: Option<TransmitCompleteCallback>,
    /// Opaque registration context echoed back through the callbacks.
    pub parent: usize,
    pub chunk: Option<DataChunkCallback>,
}

/// A pluggable multi-frame transport protocol.
///
/// All methods are driven exclusively by the network manager, which is
/// enforced through the [`DriverBadge`] parameter. A protocol that accepts a
/// job via [`offer`](Self::offer) owns that transmission and must report the
/// outcome asynchronously through the job's completion callback; it must
/// never invoke the callback from inside `offer` itself.
pub trait TransportProtocol: Send {
    /// One-shot setup, called before the first `update`.
    fn initialize(&mut self, badge: &DriverBadge);

    fn is_initialized(&self) -> bool;

    /// Decides whether this protocol takes responsibility for the message.
    fn offer(&mut self, job: &TransmitJob<'_>, badge: &DriverBadge) -> bool;

    /// Ticked once per network manager update.
    fn update(&mut self, now: Millis, badge: &DriverBadge);
}
