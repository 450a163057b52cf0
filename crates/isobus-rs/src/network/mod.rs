//! The network manager: owns the control function registry, drives address
//! claiming, arbitrates transmissions and fans received messages out to the
//! registered handlers.

pub mod callbacks;
pub mod registry;

pub use callbacks::{PgnCallback, PgnCallbackEntry};
pub use registry::ControlFunctionRegistry;

use crate::cf::address_claim::ClaimAction;
use crate::cf::{AddressClaimState, CfHandle, ControlFunctionKind};
use crate::frame::{construct_frame, CanIdentifier};
use crate::hal::{CanDriver, CanFrame, IsobusError};
use crate::message::CanMessage;
use crate::name::{Name, NameFilter};
use crate::transport::{DriverBadge, TransmitJob, TransportProtocol};
use crate::types::{
    CanPriority, Millis, Pgn, ABSOLUTE_MAX_MESSAGE_LENGTH, BROADCAST_CAN_ADDRESS, CAN_DATA_LENGTH,
    CAN_PORT_MAXIMUM, NULL_CAN_ADDRESS, PGN_ADDRESS_CLAIM, PGN_REQUEST,
};
use log::{debug, trace, warn};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default bound of the receive queue; the oldest message is dropped on
/// overflow.
pub const DEFAULT_RX_QUEUE_LIMIT: usize = 4096;

/// State shared between the hardware ingress context and the update tick.
/// One mutex covers both the queue and the registry, so the ingress path's
/// active-list scans are safe against concurrent reconciliation.
struct SharedState {
    registry: ControlFunctionRegistry,
    rx_queue: VecDeque<CanMessage>,
}

/// The ISOBUS network manager.
///
/// Owns the control function registry, the receive queue and the transport
/// protocol registry. Every operation takes `&self` and locks internally, so
/// an application can share the manager (e.g. behind an `Arc`) between its
/// main loop and a driver receive thread:
///
/// - [`receive_frame`](Self::receive_frame) is the hardware ingress entry
///   point and may run on any thread,
/// - [`update`](Self::update) is the periodic tick and must run at least
///   every 10 ms for address claiming to meet its deadlines,
/// - [`send`](Self::send) / [`send_message`](Self::send_message) transmit
///   from an internal control function.
///
/// Timestamps are injected: the caller passes monotonic milliseconds into
/// every time-dependent operation.
pub struct CanNetworkManager<D: CanDriver> {
    driver: Mutex<D>,
    shared: Mutex<SharedState>,
    protocols: Mutex<Vec<Box<dyn TransportProtocol>>>,
    protocol_callbacks: Mutex<Vec<PgnCallbackEntry>>,
    global_callbacks: Mutex<Vec<PgnCallbackEntry>>,
    initialized: AtomicBool,
    rx_queue_limit: usize,
    last_update: AtomicU64,
}

/// Locks without propagating poisoning: the stack must keep running even if
/// a user callback panicked on another thread while holding state.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<D: CanDriver> CanNetworkManager<D> {
    pub fn new(driver: D) -> Self {
        Self::with_rx_queue_limit(driver, DEFAULT_RX_QUEUE_LIMIT)
    }

    /// Creates a manager with a custom receive-queue bound.
    pub fn with_rx_queue_limit(driver: D, rx_queue_limit: usize) -> Self {
        Self {
            driver: Mutex::new(driver),
            shared: Mutex::new(SharedState {
                registry: ControlFunctionRegistry::new(),
                rx_queue: VecDeque::new(),
            }),
            protocols: Mutex::new(Vec::new()),
            protocol_callbacks: Mutex::new(Vec::new()),
            global_callbacks: Mutex::new(Vec::new()),
            initialized: AtomicBool::new(false),
            rx_queue_limit: rx_queue_limit.max(1),
            last_update: AtomicU64::new(0),
        }
    }

    /// Clears any stale receive state and opens the ingress path. Called
    /// implicitly by the first [`update`](Self::update).
    pub fn initialize(&self) {
        lock(&self.shared).rx_queue.clear();
        self.initialized.store(true, Ordering::Release);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Timestamp passed to the most recent [`update`](Self::update).
    pub fn last_update_timestamp(&self) -> Millis {
        self.last_update.load(Ordering::Acquire)
    }

    // --- Control function registration ---

    /// Registers a control function owned by this process. Address claiming
    /// for it starts on the next tick.
    pub fn register_internal_control_function(
        &self,
        name: Name,
        preferred_address: u8,
        port: u8,
    ) -> Result<CfHandle, IsobusError> {
        if usize::from(port) >= CAN_PORT_MAXIMUM {
            return Err(IsobusError::InvalidPort(port));
        }
        if preferred_address >= NULL_CAN_ADDRESS {
            return Err(IsobusError::InvalidAddress(preferred_address));
        }
        Ok(lock(&self.shared)
            .registry
            .register_internal(name, preferred_address, port))
    }

    /// Declares a device this application wants to talk to, described by
    /// NAME filters. The partner becomes active once a matching NAME claims
    /// an address on `port`.
    pub fn register_partnered_control_function(
        &self,
        port: u8,
        filters: Vec<NameFilter>,
    ) -> Result<CfHandle, IsobusError> {
        if usize::from(port) >= CAN_PORT_MAXIMUM {
            return Err(IsobusError::InvalidPort(port));
        }
        Ok(lock(&self.shared).registry.register_partner(port, filters))
    }

    /// Removes a control function; its handle stops resolving immediately.
    pub fn deregister_control_function(&self, handle: CfHandle) -> bool {
        lock(&self.shared).registry.deregister(handle)
    }

    // --- Callback registration ---

    /// Registers a callback for a PGN destined to the global address.
    /// Duplicate registrations are kept and fire in insertion order.
    pub fn add_global_pgn_callback(&self, pgn: Pgn, callback: PgnCallback, parent: usize) {
        lock(&self.global_callbacks).push(PgnCallbackEntry::new(pgn, callback, parent));
    }

    /// Removes the first global callback matching the exact triple.
    pub fn remove_global_pgn_callback(
        &self,
        pgn: Pgn,
        callback: PgnCallback,
        parent: usize,
    ) -> bool {
        callbacks::remove_exact(
            &mut lock(&self.global_callbacks),
            &PgnCallbackEntry::new(pgn, callback, parent),
        )
    }

    pub fn global_pgn_callback_count(&self) -> usize {
        lock(&self.global_callbacks).len()
    }

    /// Registers a callback used by a transport protocol to see its control
    /// and data PGNs. Rejects exact duplicates.
    pub fn add_protocol_pgn_callback(&self, pgn: Pgn, callback: PgnCallback, parent: usize) -> bool {
        callbacks::add_unique(
            &mut lock(&self.protocol_callbacks),
            PgnCallbackEntry::new(pgn, callback, parent),
        )
    }

    pub fn remove_protocol_pgn_callback(
        &self,
        pgn: Pgn,
        callback: PgnCallback,
        parent: usize,
    ) -> bool {
        callbacks::remove_exact(
            &mut lock(&self.protocol_callbacks),
            &PgnCallbackEntry::new(pgn, callback, parent),
        )
    }

    /// Adds a callback fired when `partner` sends the given PGN to one of
    /// our internal control functions. Insertion order is preserved.
    pub fn add_partner_pgn_callback(
        &self,
        partner: CfHandle,
        pgn: Pgn,
        callback: PgnCallback,
        parent: usize,
    ) -> bool {
        let mut shared = lock(&self.shared);
        let Some(state) = shared
            .registry
            .get_mut(partner)
            .and_then(|cf| cf.partner_state_mut())
        else {
            return false;
        };
        state
            .callbacks
            .push(PgnCallbackEntry::new(pgn, callback, parent));
        true
    }

    /// Removes a partner callback matching the exact triple.
    pub fn remove_partner_pgn_callback(
        &self,
        partner: CfHandle,
        pgn: Pgn,
        callback: PgnCallback,
        parent: usize,
    ) -> bool {
        let mut shared = lock(&self.shared);
        let Some(state) = shared
            .registry
            .get_mut(partner)
            .and_then(|cf| cf.partner_state_mut())
        else {
            return false;
        };
        callbacks::remove_exact(&mut state.callbacks, &PgnCallbackEntry::new(pgn, callback, parent))
    }

    // --- Transport protocols ---

    /// Registers a multi-frame transport. Protocols are offered outbound
    /// messages in registration order; the first to accept owns the
    /// transmission.
    pub fn register_transport_protocol(&self, protocol: Box<dyn TransportProtocol>) {
        lock(&self.protocols).push(protocol);
    }

    // --- Transmission ---

    /// Sends a buffered message without completion callbacks. See
    /// [`send_message`](Self::send_message) for the full form.
    pub fn send(
        &self,
        pgn: Pgn,
        data: &[u8],
        source: CfHandle,
        destination: Option<CfHandle>,
        priority: CanPriority,
    ) -> bool {
        self.send_message(&TransmitJob {
            pgn,
            data: Some(data),
            length: data.len(),
            source,
            destination,
            priority,
            on_complete: None,
            parent: 0,
            chunk: None,
        })
    }

    /// The main way to send a message of any length from an internal control
    /// function.
    ///
    /// Transport protocols get the first chance at the message, in
    /// registration order; an accepted job completes asynchronously through
    /// its callback. Otherwise a payload of up to eight bytes goes out as a
    /// single frame and the completion callback (if any) runs synchronously
    /// before this method returns.
    ///
    /// Returns false, with diagnostics on the log, for invalid input, an
    /// unclaimed source address, an unroutable destination, or a hardware
    /// rejection.
    pub fn send_message(&self, job: &TransmitJob<'_>) -> bool {
        match self.try_send(job) {
            Ok(()) => true,
            Err(error) => {
                warn!("[NM] send of PGN {:#07X} failed: {}", job.pgn, error);
                false
            }
        }
    }

    fn try_send(&self, job: &TransmitJob<'_>) -> Result<(), IsobusError> {
        if job.data.is_none() && job.chunk.is_none() {
            return Err(IsobusError::MissingPayload);
        }
        if job.length == 0 || job.length > ABSOLUTE_MAX_MESSAGE_LENGTH {
            return Err(IsobusError::InvalidDataLength(job.length));
        }
        if let Some(data) = job.data {
            if data.len() != job.length {
                return Err(IsobusError::InvalidDataLength(data.len()));
            }
        }

        let (port, source_address, destination_address) = {
            let shared = lock(&self.shared);
            let source = shared
                .registry
                .get(job.source)
                .ok_or(IsobusError::InvalidSourceControlFunction)?;
            if source.kind() != ControlFunctionKind::Internal {
                return Err(IsobusError::InvalidSourceControlFunction);
            }
            if job.pgn != PGN_ADDRESS_CLAIM && !source.address_valid() {
                return Err(IsobusError::NoValidAddress);
            }
            let destination_address = match job.destination {
                None => Ok(BROADCAST_CAN_ADDRESS),
                Some(handle) => {
                    let destination =
                        shared.registry.get(handle).ok_or(IsobusError::NoRoute)?;
                    if destination.address_valid() {
                        Ok(destination.address())
                    } else {
                        // Kept as a deferred error: transports may still
                        // accept the job and wait out the partner's claim.
                        Err(IsobusError::NoRoute)
                    }
                }
            };
            (source.port(), source.address(), destination_address)
        };

        {
            let badge = DriverBadge::new();
            let mut protocols = lock(&self.protocols);
            for protocol in protocols.iter_mut() {
                if protocol.offer(job, &badge) {
                    trace!(
                        "[NM] PGN {:#07X} ({} bytes) accepted by a transport protocol",
                        job.pgn,
                        job.length
                    );
                    return Ok(());
                }
            }
        }

        // Single-frame fallback.
        let data = job.data.ok_or(IsobusError::ProtocolRejected)?;
        if job.length > CAN_DATA_LENGTH {
            return Err(IsobusError::ProtocolRejected);
        }
        let frame = construct_frame(
            port,
            source_address,
            destination_address?,
            job.pgn,
            job.priority,
            data,
        )?;
        lock(&self.driver)
            .send_frame(&frame)
            .map_err(|_| IsobusError::HardwareSendFailed)?;

        if let Some(on_complete) = job.on_complete {
            on_complete(job.pgn, job.length, job.source, job.destination, true, job.parent);
        }
        Ok(())
    }

    /// Sends one frame from raw addresses, bypassing the control function
    /// checks. This is the escape hatch transport protocols build on.
    pub fn send_raw(
        &self,
        port: u8,
        source: u8,
        destination: u8,
        pgn: Pgn,
        priority: CanPriority,
        data: &[u8],
    ) -> Result<(), IsobusError> {
        let frame = construct_frame(port, source, destination, pgn, priority, data)?;
        lock(&self.driver)
            .send_frame(&frame)
            .map_err(|_| IsobusError::HardwareSendFailed)
    }

    // --- Ingress ---

    /// Hardware ingress entry point; may run on a driver thread. Performs
    /// the partial decode, resolves source and destination control
    /// functions and queues the message for the next tick.
    pub fn receive_frame(&self, frame: &CanFrame, now: Millis) {
        if !self.is_initialized() || !frame.is_extended {
            return;
        }
        if usize::from(frame.channel) >= CAN_PORT_MAXIMUM {
            warn!("[NM] dropping frame on unknown port {}", frame.channel);
            return;
        }

        let identifier = CanIdentifier::new(frame.identifier);
        let mut shared = lock(&self.shared);

        let (source, destination) = if identifier.pgn() == PGN_ADDRESS_CLAIM
            && usize::from(frame.data_length) == CAN_DATA_LENGTH
        {
            let claimed_name = Name::from_le_bytes(frame.data);
            shared
                .registry
                .observe_claim(frame.channel, identifier.source_address(), claimed_name);
            // The table may be stale for claims; resolve by scanning the
            // active list instead.
            (
                shared
                    .registry
                    .find_active_by_address(frame.channel, identifier.source_address()),
                None,
            )
        } else {
            (
                shared
                    .registry
                    .lookup(frame.channel, identifier.source_address()),
                shared
                    .registry
                    .lookup(frame.channel, identifier.destination_address()),
            )
        };

        let message = CanMessage::new(
            identifier,
            frame.data().to_vec(),
            source,
            destination,
            frame.channel,
            now,
        );
        if shared.rx_queue.len() >= self.rx_queue_limit {
            shared.rx_queue.pop_front();
            warn!("[NM] receive queue full, dropping oldest message");
        }
        shared.rx_queue.push_back(message);
    }

    // --- Periodic tick ---

    /// The main update tick: drains the receive queue, drives the address
    /// claim state machines, refreshes the address table for internal
    /// control functions that moved, and ticks every transport protocol.
    pub fn update(&self, now: Millis) {
        if !self.is_initialized() {
            self.initialize();
        }

        self.process_rx_messages(now);
        self.update_internal_control_functions(now);
        self.update_transport_protocols(now);

        self.last_update.store(now, Ordering::Release);
    }

    fn process_rx_messages(&self, now: Millis) {
        loop {
            // Lock only around head extraction; dispatch runs unlocked so
            // callbacks may call back into the manager.
            let message = lock(&self.shared).rx_queue.pop_front();
            let Some(message) = message else {
                break;
            };
            self.dispatch_message(&message, now);
        }
    }

    fn dispatch_message(&self, message: &CanMessage, now: Millis) {
        if message.pgn() == PGN_ADDRESS_CLAIM {
            let source_address = message.identifier().source_address();
            lock(&self.shared)
                .registry
                .update_address_table(message.port(), source_address);

            if let Ok(bytes) = <[u8; CAN_DATA_LENGTH]>::try_from(message.data()) {
                let claimed_name = Name::from_le_bytes(bytes);
                self.process_claim_for_internals(
                    message.port(),
                    claimed_name,
                    source_address,
                    now,
                );
            }
        } else if message.pgn() == PGN_REQUEST {
            self.process_pgn_request(message, now);
        }

        // Protocol callbacks run under their mutex for the whole fan-out so
        // an entry cannot be removed mid-invocation. They must not try to
        // register or unregister protocol callbacks.
        {
            let protocol_callbacks = lock(&self.protocol_callbacks);
            for entry in protocol_callbacks.iter() {
                if entry.pgn == message.pgn() {
                    (entry.callback)(message, entry.parent);
                }
            }
        }

        self.process_for_callbacks(message);
    }

    /// Runs the global/partner callback fan-out for a message. Also the
    /// entry point for transport protocols handing back a fully assembled
    /// multi-frame message.
    pub fn handle_protocol_message(&self, message: &CanMessage) {
        self.process_for_callbacks(message);
    }

    fn process_for_callbacks(&self, message: &CanMessage) {
        let Some(destination) = message.destination_control_function() else {
            // Destined to global: a known sender, or an address-less device
            // asking for claims.
            let eligible = message.source_control_function().is_some()
                || (message.pgn() == PGN_REQUEST
                    && message.identifier().source_address() == NULL_CAN_ADDRESS);
            if !eligible {
                return;
            }
            let matching: Vec<PgnCallbackEntry> = lock(&self.global_callbacks)
                .iter()
                .copied()
                .filter(|entry| entry.pgn == message.pgn())
                .collect();
            for entry in matching {
                (entry.callback)(message, entry.parent);
            }
            return;
        };

        // Destination specific: only messages addressed to one of our
        // internal control functions reach the partner callbacks.
        let matching: Vec<PgnCallbackEntry> = {
            let shared = lock(&self.shared);
            let internal_destination = shared
                .registry
                .get(destination)
                .is_some_and(|cf| cf.kind() == ControlFunctionKind::Internal);
            if !internal_destination {
                return;
            }
            let mut matching = Vec::new();
            for partner_handle in shared.registry.partners() {
                let Some(cf) = shared.registry.get(*partner_handle) else {
                    continue;
                };
                if cf.port() != message.port() {
                    continue;
                }
                let Some(partner) = cf.partner_state() else {
                    continue;
                };
                matching.extend(
                    partner
                        .callbacks
                        .iter()
                        .copied()
                        .filter(|entry| entry.pgn == message.pgn()),
                );
            }
            matching
        };
        for entry in matching {
            (entry.callback)(message, entry.parent);
        }
    }

    fn process_claim_for_internals(
        &self,
        port: u8,
        claimed_name: Name,
        source_address: u8,
        now: Millis,
    ) {
        let internals = lock(&self.shared).registry.internals().to_vec();
        for handle in internals {
            let action = {
                let mut shared = lock(&self.shared);
                let Some(cf) = shared.registry.get_mut(handle) else {
                    continue;
                };
                if cf.port() != port {
                    continue;
                }
                let Some(machine) = cf.claim_state_machine_mut() else {
                    continue;
                };
                machine
                    .process_claim(claimed_name, source_address, now)
                    .map(|action| (action, machine.name()))
            };
            if let Some((action, name)) = action {
                self.execute_claim_action(handle, port, name, action, now);
            }
        }
    }

    fn process_pgn_request(&self, message: &CanMessage, now: Millis) {
        if message.data().len() < 3 {
            return;
        }
        let requested = u32::from(message.data()[0])
            | u32::from(message.data()[1]) << 8
            | u32::from(message.data()[2]) << 16;
        if requested != PGN_ADDRESS_CLAIM {
            return;
        }

        let request_destination = message.identifier().destination_address();
        let internals = lock(&self.shared).registry.internals().to_vec();
        for handle in internals {
            let action = {
                let shared = lock(&self.shared);
                let Some(cf) = shared.registry.get(handle) else {
                    continue;
                };
                if cf.port() != message.port() {
                    continue;
                }
                if request_destination != BROADCAST_CAN_ADDRESS
                    && cf.address() != request_destination
                {
                    continue;
                }
                let Some(machine) = cf.claim_state_machine() else {
                    continue;
                };
                machine
                    .process_request_for_claim()
                    .map(|action| (action, machine.name()))
            };
            if let Some((action, name)) = action {
                self.execute_claim_action(handle, message.port(), name, action, now);
            }
        }
    }

    fn update_internal_control_functions(&self, now: Millis) {
        let internals = lock(&self.shared).registry.internals().to_vec();
        for handle in internals {
            let action = {
                let mut shared = lock(&self.shared);
                let Some(cf) = shared.registry.get_mut(handle) else {
                    continue;
                };
                let port = cf.port();
                let Some(machine) = cf.claim_state_machine_mut() else {
                    continue;
                };
                machine.update(now).map(|action| (action, port, machine.name()))
            };
            if let Some((action, port, name)) = action {
                self.execute_claim_action(handle, port, name, action, now);
            }

            // Sync the control function's address with its state machine and
            // refresh the table slot if the address moved since last tick.
            let changed = {
                let mut shared = lock(&self.shared);
                let Some(cf) = shared.registry.get_mut(handle) else {
                    continue;
                };
                let port = cf.port();
                let Some(machine) = cf.claim_state_machine_mut() else {
                    continue;
                };
                let changed = machine.take_changed_address();
                let address = machine.current_address();
                cf.address = address;
                if changed {
                    shared.registry.ensure_active(handle);
                    shared.registry.update_address_table(port, address);
                }
                changed
            };
            if changed {
                debug!("[NM] internal control function moved, table refreshed");
            }
        }
    }

    fn execute_claim_action(
        &self,
        handle: CfHandle,
        port: u8,
        name: Name,
        action: ClaimAction,
        now: Millis,
    ) {
        match action {
            ClaimAction::SendRequestForClaim => {
                let data = [
                    (PGN_ADDRESS_CLAIM & 0xFF) as u8,
                    ((PGN_ADDRESS_CLAIM >> 8) & 0xFF) as u8,
                    ((PGN_ADDRESS_CLAIM >> 16) & 0xFF) as u8,
                ];
                let sent = self
                    .send_raw(
                        port,
                        NULL_CAN_ADDRESS,
                        BROADCAST_CAN_ADDRESS,
                        PGN_REQUEST,
                        CanPriority::Default6,
                        &data,
                    )
                    .is_ok();
                if sent {
                    let mut shared = lock(&self.shared);
                    if let Some(machine) = shared
                        .registry
                        .get_mut(handle)
                        .and_then(|cf| cf.claim_state_machine_mut())
                    {
                        machine.request_sent(now);
                    }
                }
            }
            ClaimAction::SendAddressClaim(address) => {
                let sent = self
                    .send_raw(
                        port,
                        address,
                        BROADCAST_CAN_ADDRESS,
                        PGN_ADDRESS_CLAIM,
                        CanPriority::Default6,
                        &name.to_le_bytes(),
                    )
                    .is_ok();
                if sent {
                    let mut shared = lock(&self.shared);
                    if let Some(machine) = shared
                        .registry
                        .get_mut(handle)
                        .and_then(|cf| cf.claim_state_machine_mut())
                    {
                        machine.claim_sent(now);
                    }
                }
            }
        }
    }

    fn update_transport_protocols(&self, now: Millis) {
        let badge = DriverBadge::new();
        let mut protocols = lock(&self.protocols);
        for protocol in protocols.iter_mut() {
            if !protocol.is_initialized() {
                protocol.initialize(&badge);
            }
            protocol.update(now, &badge);
        }
    }

    // --- Registry accessors ---

    /// O(1) address-table lookup; out-of-range inputs return None.
    pub fn lookup(&self, port: u8, address: u8) -> Option<CfHandle> {
        lock(&self.shared).registry.lookup(port, address)
    }

    pub fn control_function_address(&self, handle: CfHandle) -> Option<u8> {
        lock(&self.shared).registry.get(handle).map(|cf| cf.address())
    }

    pub fn control_function_name(&self, handle: CfHandle) -> Option<Name> {
        lock(&self.shared).registry.get(handle).map(|cf| cf.name())
    }

    pub fn control_function_kind(&self, handle: CfHandle) -> Option<ControlFunctionKind> {
        lock(&self.shared).registry.get(handle).map(|cf| cf.kind())
    }

    /// Claim progress of an internal control function, observable so an
    /// application can react to `UnableToClaim`.
    pub fn address_claim_state(&self, handle: CfHandle) -> Option<AddressClaimState> {
        lock(&self.shared)
            .registry
            .get(handle)
            .and_then(|cf| cf.claim_state_machine().map(|machine| machine.state()))
    }

    /// Handles of every control function currently claiming an address.
    pub fn active_control_functions(&self) -> Vec<CfHandle> {
        lock(&self.shared).registry.active().to_vec()
    }

    /// Asks an internal control function to move to a new preferred address.
    pub fn change_preferred_address(&self, handle: CfHandle, address: u8, now: Millis) -> bool {
        if address >= NULL_CAN_ADDRESS {
            return false;
        }
        let mut shared = lock(&self.shared);
        match shared
            .registry
            .get_mut(handle)
            .and_then(|cf| cf.claim_state_machine_mut())
        {
            Some(machine) => {
                machine.change_preferred_address(address, now);
                true
            }
            None => false,
        }
    }
}
