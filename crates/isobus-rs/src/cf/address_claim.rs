use crate::name::Name;
use crate::types::{
    Millis, ARBITRARY_ADDRESS_RANGE_END, ARBITRARY_ADDRESS_RANGE_START, NULL_CAN_ADDRESS,
};
use log::{debug, info, warn};

/// The ISO 11783-5 contention window after a request or a claim.
const CONTENTION_PERIOD_MS: Millis = 250;

/// States of the address-claim procedure for one internal control function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClaimState {
    /// Freshly constructed; nothing sent yet.
    NonePresent,
    /// Waiting out the pseudo-random delay before requesting claims.
    WaitingForClaim,
    /// A request for address claims needs to go out on the bus.
    SendingRequestForClaim,
    /// Listening for claims from other devices after our request.
    WaitingForRequestContention,
    /// Our own claim for the candidate address needs to go out.
    SendingPreferredAddress,
    /// Claim sent; other devices have the contention window to object.
    ContendingForPreferredAddress,
    /// The candidate address is ours.
    AddressClaimed,
    /// Arbitration lost with no usable fallback. Terminal for this boot.
    UnableToClaim,
}

/// A bus action the state machine needs the network manager to perform.
///
/// The machine never touches the hardware itself; the manager executes the
/// action and reports the outcome back through [`AddressClaimStateMachine::request_sent`]
/// or [`AddressClaimStateMachine::claim_sent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimAction {
    /// Broadcast a parameter group number request for the address-claim PGN.
    SendRequestForClaim,
    /// Send an address-claim frame from the given source address. The null
    /// address announces "cannot claim".
    SendAddressClaim(u8),
}

/// Drives ISO 11783-5 address claiming for one internal control function.
#[derive(Debug, Clone)]
pub struct AddressClaimStateMachine {
    state: AddressClaimState,
    name: Name,
    /// Address we are currently trying to obtain or defending.
    candidate_address: u8,
    port: u8,
    /// Timestamp of the last state entry, from the injected clock.
    state_entry: Millis,
    random_delay_ms: Millis,
    changed_address: bool,
}

impl AddressClaimStateMachine {
    pub fn new(name: Name, preferred_address: u8, port: u8) -> Self {
        Self {
            state: AddressClaimState::NonePresent,
            name,
            candidate_address: preferred_address,
            port,
            state_entry: 0,
            random_delay_ms: contention_delay_ms(name),
            changed_address: false,
        }
    }

    pub fn state(&self) -> AddressClaimState {
        self.state
    }

    pub fn name(&self) -> Name {
        self.name
    }

    /// The address this control function may currently transmit from, or the
    /// null address while claiming is incomplete.
    pub fn current_address(&self) -> u8 {
        if self.state == AddressClaimState::AddressClaimed {
            self.candidate_address
        } else {
            NULL_CAN_ADDRESS
        }
    }

    /// Returns and clears the changed-address marker set on every transition
    /// that gains or loses a bus address.
    pub fn take_changed_address(&mut self) -> bool {
        core::mem::take(&mut self.changed_address)
    }

    /// Advances timers and reports the next required bus action, if any.
    pub fn update(&mut self, now: Millis) -> Option<ClaimAction> {
        match self.state {
            AddressClaimState::NonePresent => {
                self.enter(AddressClaimState::WaitingForClaim, now);
                None
            }
            AddressClaimState::WaitingForClaim => {
                if now.saturating_sub(self.state_entry) >= self.random_delay_ms {
                    self.enter(AddressClaimState::SendingRequestForClaim, now);
                }
                None
            }
            AddressClaimState::SendingRequestForClaim => Some(ClaimAction::SendRequestForClaim),
            AddressClaimState::WaitingForRequestContention => {
                if now.saturating_sub(self.state_entry) >= CONTENTION_PERIOD_MS {
                    self.enter(AddressClaimState::SendingPreferredAddress, now);
                }
                None
            }
            AddressClaimState::SendingPreferredAddress => {
                Some(ClaimAction::SendAddressClaim(self.candidate_address))
            }
            AddressClaimState::ContendingForPreferredAddress => {
                if now.saturating_sub(self.state_entry) >= CONTENTION_PERIOD_MS {
                    self.enter(AddressClaimState::AddressClaimed, now);
                    self.changed_address = true;
                    info!(
                        "[AC] port {} claimed address {}",
                        self.port, self.candidate_address
                    );
                }
                None
            }
            AddressClaimState::AddressClaimed | AddressClaimState::UnableToClaim => None,
        }
    }

    /// Acknowledges that the request-for-claim frame reached the bus.
    pub fn request_sent(&mut self, now: Millis) {
        if self.state == AddressClaimState::SendingRequestForClaim {
            self.enter(AddressClaimState::WaitingForRequestContention, now);
        }
    }

    /// Acknowledges that our address-claim frame reached the bus.
    pub fn claim_sent(&mut self, now: Millis) {
        if self.state == AddressClaimState::SendingPreferredAddress {
            self.enter(AddressClaimState::ContendingForPreferredAddress, now);
        }
    }

    /// Reacts to an observed address claim from another device.
    ///
    /// Only claims for our candidate address matter. A lower NAME wins the
    /// address from us; a higher NAME gets answered with a defending claim
    /// once we have put our own claim on the bus.
    pub fn process_claim(
        &mut self,
        claimant: Name,
        claimed_address: u8,
        now: Millis,
    ) -> Option<ClaimAction> {
        if claimant == self.name || claimed_address != self.candidate_address {
            return None;
        }
        match self.state {
            AddressClaimState::AddressClaimed
            | AddressClaimState::ContendingForPreferredAddress => {
                if claimant < self.name {
                    self.lose_arbitration(now);
                    None
                } else {
                    debug!(
                        "[AC] port {} defending address {} against {:?}",
                        self.port, self.candidate_address, claimant
                    );
                    Some(ClaimAction::SendAddressClaim(self.candidate_address))
                }
            }
            AddressClaimState::WaitingForClaim
            | AddressClaimState::SendingRequestForClaim
            | AddressClaimState::WaitingForRequestContention
            | AddressClaimState::SendingPreferredAddress => {
                if claimant < self.name {
                    // The address is taken by a better NAME before we ever
                    // claimed it; move on or give up now.
                    self.lose_arbitration(now);
                }
                None
            }
            AddressClaimState::NonePresent | AddressClaimState::UnableToClaim => None,
        }
    }

    /// Answers a parameter group number request for the address-claim PGN.
    pub fn process_request_for_claim(&self) -> Option<ClaimAction> {
        match self.state {
            AddressClaimState::AddressClaimed => {
                Some(ClaimAction::SendAddressClaim(self.candidate_address))
            }
            // A device that failed arbitration announces "cannot claim"
            // from the null address.
            AddressClaimState::UnableToClaim => {
                Some(ClaimAction::SendAddressClaim(NULL_CAN_ADDRESS))
            }
            _ => None,
        }
    }

    /// Application request to move to a different preferred address.
    pub fn change_preferred_address(&mut self, address: u8, now: Millis) {
        if address == self.candidate_address || address >= NULL_CAN_ADDRESS {
            return;
        }
        if self.state == AddressClaimState::AddressClaimed {
            self.changed_address = true;
        }
        self.candidate_address = address;
        self.enter(AddressClaimState::SendingPreferredAddress, now);
    }

    fn lose_arbitration(&mut self, now: Millis) {
        let lost = self.candidate_address;
        if self.state == AddressClaimState::AddressClaimed {
            self.changed_address = true;
        }
        if self.name.arbitrary_address_capable() {
            self.candidate_address = next_arbitrary_address(self.candidate_address);
            self.enter(AddressClaimState::SendingPreferredAddress, now);
            info!(
                "[AC] port {} lost address {}, re-arbitrating at {}",
                self.port, lost, self.candidate_address
            );
        } else {
            self.enter(AddressClaimState::UnableToClaim, now);
            warn!(
                "[AC] port {} lost address {} and cannot arbitrate, claiming failed",
                self.port, lost
            );
        }
    }

    fn enter(&mut self, state: AddressClaimState, now: Millis) {
        self.state = state;
        self.state_entry = now;
    }
}

/// Pseudo-random claim delay in 0..=153 ms, derived deterministically from
/// the NAME (ISO 11783-5 specifies a random value scaled by 0.6 ms).
fn contention_delay_ms(name: Name) -> Millis {
    let mut mixed = name.raw().wrapping_mul(0x9E37_79B9_7F4A_7C15);
    mixed ^= mixed >> 32;
    Millis::from((mixed & 0xFF) as u8) * 6 / 10
}

/// Next address in the self-configurable range, wrapping at the end.
fn next_arbitrary_address(current: u8) -> u8 {
    if !(ARBITRARY_ADDRESS_RANGE_START..ARBITRARY_ADDRESS_RANGE_END).contains(&current) {
        ARBITRARY_ADDRESS_RANGE_START
    } else {
        current + 1
    }
}
