//! Control functions: the logical participants tracked on each CAN port.

pub mod address_claim;

pub use address_claim::{AddressClaimState, AddressClaimStateMachine};

use crate::name::{Name, NameFilter};
use crate::network::callbacks::PgnCallbackEntry;
use crate::types::{BROADCAST_CAN_ADDRESS, NULL_CAN_ADDRESS};

/// A stable, copyable identity for a control function owned by the registry.
///
/// Handles are generational: after a control function is deregistered its
/// handle stops resolving instead of aliasing a later occupant of the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CfHandle {
    pub(crate) index: u16,
    pub(crate) generation: u16,
}

/// Which role a control function plays from this node's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFunctionKind {
    /// Owned by this process; claims an address via its state machine.
    Internal,
    /// Observed on the bus, owned elsewhere.
    External,
    /// Declared by the application through a NAME filter; adopted once a
    /// matching NAME claims an address.
    Partnered,
}

/// Role-specific state carried alongside the common identity fields.
#[derive(Debug, Clone)]
pub(crate) enum CfRole {
    External,
    Internal(AddressClaimStateMachine),
    Partnered(PartnerState),
}

/// Identity description and per-partner callback list for a partnered
/// control function.
#[derive(Debug, Clone)]
pub(crate) struct PartnerState {
    pub filters: Vec<NameFilter>,
    pub callbacks: Vec<PgnCallbackEntry>,
    /// False until a claim matching the filters was observed and the NAME
    /// was adopted.
    pub name_known: bool,
}

/// One addressable participant on a CAN port.
#[derive(Debug, Clone)]
pub struct ControlFunction {
    pub(crate) name: Name,
    pub(crate) address: u8,
    pub(crate) port: u8,
    pub(crate) role: CfRole,
}

impl ControlFunction {
    pub(crate) fn new_external(name: Name, address: u8, port: u8) -> Self {
        Self {
            name,
            address,
            port,
            role: CfRole::External,
        }
    }

    pub(crate) fn new_internal(name: Name, preferred_address: u8, port: u8) -> Self {
        Self {
            name,
            address: NULL_CAN_ADDRESS,
            port,
            role: CfRole::Internal(AddressClaimStateMachine::new(name, preferred_address, port)),
        }
    }

    pub(crate) fn new_partnered(port: u8, filters: Vec<NameFilter>) -> Self {
        Self {
            name: Name::default(),
            address: NULL_CAN_ADDRESS,
            port,
            role: CfRole::Partnered(PartnerState {
                filters,
                callbacks: Vec::new(),
                name_known: false,
            }),
        }
    }

    pub fn name(&self) -> Name {
        self.name
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn port(&self) -> u8 {
        self.port
    }

    pub fn kind(&self) -> ControlFunctionKind {
        match self.role {
            CfRole::External => ControlFunctionKind::External,
            CfRole::Internal(_) => ControlFunctionKind::Internal,
            CfRole::Partnered(_) => ControlFunctionKind::Partnered,
        }
    }

    /// True when the control function currently holds a routable bus address.
    pub fn address_valid(&self) -> bool {
        self.address != NULL_CAN_ADDRESS && self.address != BROADCAST_CAN_ADDRESS
    }

    pub(crate) fn claim_state_machine(&self) -> Option<&AddressClaimStateMachine> {
        match &self.role {
            CfRole::Internal(machine) => Some(machine),
            _ => None,
        }
    }

    pub(crate) fn claim_state_machine_mut(&mut self) -> Option<&mut AddressClaimStateMachine> {
        match &mut self.role {
            CfRole::Internal(machine) => Some(machine),
            _ => None,
        }
    }

    pub(crate) fn partner_state(&self) -> Option<&PartnerState> {
        match &self.role {
            CfRole::Partnered(state) => Some(state),
            _ => None,
        }
    }

    pub(crate) fn partner_state_mut(&mut self) -> Option<&mut PartnerState> {
        match &mut self.role {
            CfRole::Partnered(state) => Some(state),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::NameField;

    #[test]
    fn external_is_valid_once_addressed() {
        let cf = ControlFunction::new_external(Name::from_raw(1), 0x80, 0);
        assert!(cf.address_valid());
        assert_eq!(cf.kind(), ControlFunctionKind::External);
    }

    #[test]
    fn internal_starts_unaddressed() {
        let cf = ControlFunction::new_internal(Name::from_raw(1), 0x20, 0);
        assert!(!cf.address_valid());
        assert_eq!(cf.address(), NULL_CAN_ADDRESS);
        assert_eq!(cf.kind(), ControlFunctionKind::Internal);
    }

    #[test]
    fn partner_carries_filters() {
        let filters = vec![NameFilter::new(NameField::Function, 0x81)];
        let cf = ControlFunction::new_partnered(1, filters.clone());
        assert_eq!(cf.kind(), ControlFunctionKind::Partnered);
        assert_eq!(cf.partner_state().unwrap().filters, filters);
        assert!(!cf.partner_state().unwrap().name_known);
    }
}
