use crate::cf::{CfHandle, ControlFunction};
use crate::name::{matches_all, Name, NameFilter};
use crate::types::{CAN_PORT_MAXIMUM, NULL_CAN_ADDRESS};
use log::{debug, info};

/// Valid claimable addresses are 0..=253; the null address has no table slot.
const ADDRESS_TABLE_SIZE: usize = NULL_CAN_ADDRESS as usize;

struct Slot {
    generation: u16,
    cf: Option<ControlFunction>,
}

/// The authoritative collection of known control functions and the per-port
/// address lookup table.
///
/// The registry owns every control function in a generational arena and
/// partitions the known ones into an active set (holding or claiming an
/// address) and an inactive set. The address table is a cache over the
/// active set: stale slots are reconciled lazily, when a claim touches them
/// or an internal control function changes address.
pub struct ControlFunctionRegistry {
    slots: Vec<Slot>,
    active: Vec<CfHandle>,
    inactive: Vec<CfHandle>,
    partners: Vec<CfHandle>,
    internals: Vec<CfHandle>,
    address_table: [[Option<CfHandle>; ADDRESS_TABLE_SIZE]; CAN_PORT_MAXIMUM],
}

impl ControlFunctionRegistry {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            active: Vec::new(),
            inactive: Vec::new(),
            partners: Vec::new(),
            internals: Vec::new(),
            address_table: [[None; ADDRESS_TABLE_SIZE]; CAN_PORT_MAXIMUM],
        }
    }

    // --- Arena ---

    pub fn get(&self, handle: CfHandle) -> Option<&ControlFunction> {
        let slot = self.slots.get(usize::from(handle.index))?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.cf.as_ref()
    }

    pub fn get_mut(&mut self, handle: CfHandle) -> Option<&mut ControlFunction> {
        let slot = self.slots.get_mut(usize::from(handle.index))?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.cf.as_mut()
    }

    fn insert(&mut self, cf: ControlFunction) -> CfHandle {
        if let Some(index) = self.slots.iter().position(|slot| slot.cf.is_none()) {
            let slot = &mut self.slots[index];
            slot.cf = Some(cf);
            CfHandle {
                index: index as u16,
                generation: slot.generation,
            }
        } else {
            self.slots.push(Slot {
                generation: 0,
                cf: Some(cf),
            });
            CfHandle {
                index: (self.slots.len() - 1) as u16,
                generation: 0,
            }
        }
    }

    // --- Registration ---

    pub fn register_internal(&mut self, name: Name, preferred_address: u8, port: u8) -> CfHandle {
        let handle = self.insert(ControlFunction::new_internal(name, preferred_address, port));
        self.internals.push(handle);
        handle
    }

    pub fn register_partner(&mut self, port: u8, filters: Vec<NameFilter>) -> CfHandle {
        let handle = self.insert(ControlFunction::new_partnered(port, filters));
        self.partners.push(handle);
        handle
    }

    /// Frees the slot, bumps the generation so stale handles stop resolving,
    /// and scrubs the handle out of every list and table slot.
    pub fn deregister(&mut self, handle: CfHandle) -> bool {
        let Some(slot) = self.slots.get_mut(usize::from(handle.index)) else {
            return false;
        };
        if slot.generation != handle.generation || slot.cf.is_none() {
            return false;
        }
        slot.cf = None;
        slot.generation = slot.generation.wrapping_add(1);

        self.active.retain(|candidate| *candidate != handle);
        self.inactive.retain(|candidate| *candidate != handle);
        self.partners.retain(|candidate| *candidate != handle);
        self.internals.retain(|candidate| *candidate != handle);
        for table in &mut self.address_table {
            for entry in table.iter_mut() {
                if *entry == Some(handle) {
                    *entry = None;
                }
            }
        }
        true
    }

    // --- List access ---

    pub fn internals(&self) -> &[CfHandle] {
        &self.internals
    }

    pub fn partners(&self) -> &[CfHandle] {
        &self.partners
    }

    pub fn active(&self) -> &[CfHandle] {
        &self.active
    }

    pub fn ensure_active(&mut self, handle: CfHandle) {
        if !self.active.contains(&handle) {
            self.active.push(handle);
        }
    }

    // --- Address claim bookkeeping ---

    /// Reconciles the known-control-function lists against an observed
    /// address claim and returns the claimant's handle.
    ///
    /// Scan order: active list by NAME, inactive list by NAME, partners by
    /// NAME filter, then a brand-new external control function. Along the
    /// way every other control function on the same port holding the claimed
    /// address loses it, since the claimant won that arbitration.
    pub fn observe_claim(&mut self, port: u8, source_address: u8, claimed_name: Name) -> CfHandle {
        let mut found: Option<CfHandle> = None;

        for handle in self.active.clone() {
            let Some(cf) = self.get_mut(handle) else {
                continue;
            };
            if cf.port != port {
                continue;
            }
            if cf.name == claimed_name {
                found = Some(handle);
            } else if cf.address == source_address {
                cf.address = NULL_CAN_ADDRESS;
                debug!(
                    "[NM] port {} address {} lost to a competing claim",
                    port, source_address
                );
            }
        }

        // The claimant may be a device we lost track of earlier; the scan
        // also clears duplicate addresses that went stale while inactive.
        for handle in self.inactive.clone() {
            let Some(cf) = self.get_mut(handle) else {
                continue;
            };
            if cf.port != port {
                continue;
            }
            if cf.name == claimed_name {
                found.get_or_insert(handle);
            } else if cf.address == source_address {
                cf.address = NULL_CAN_ADDRESS;
            }
        }
        if let Some(handle) = found {
            if self.inactive.contains(&handle) {
                self.inactive.retain(|candidate| *candidate != handle);
                self.active.push(handle);
            }
        }

        if found.is_none() {
            for handle in self.partners.clone() {
                let Some(cf) = self.get_mut(handle) else {
                    continue;
                };
                if cf.port != port {
                    continue;
                }
                let Some(partner) = cf.partner_state_mut() else {
                    continue;
                };
                if partner.name_known || !matches_all(&partner.filters, claimed_name) {
                    continue;
                }
                partner.name_known = true;
                cf.name = claimed_name;
                self.active.push(handle);
                found = Some(handle);
                info!("[NM] partner has claimed {}", source_address);
                break;
            }
        }

        let found = match found {
            Some(handle) => handle,
            None => {
                let handle =
                    self.insert(ControlFunction::new_external(claimed_name, source_address, port));
                self.active.push(handle);
                info!("[NM] new control function {}", source_address);
                handle
            }
        };

        if let Some(cf) = self.get_mut(found) {
            cf.address = source_address;
        }
        found
    }

    /// Reconciles one address-table slot against the active list.
    ///
    /// An occupant whose address was stolen is evicted; an empty slot is
    /// filled with whichever active control function now holds the address.
    pub fn update_address_table(&mut self, port: u8, address: u8) {
        if usize::from(port) >= CAN_PORT_MAXIMUM || usize::from(address) >= ADDRESS_TABLE_SIZE {
            return;
        }

        let occupant = self.address_table[usize::from(port)][usize::from(address)];
        if let Some(handle) = occupant {
            let stale = match self.get(handle) {
                Some(cf) => cf.address == NULL_CAN_ADDRESS,
                None => true,
            };
            if stale {
                if let Some(cf) = self.get_mut(handle) {
                    cf.address = NULL_CAN_ADDRESS;
                }
                self.address_table[usize::from(port)][usize::from(address)] = None;
            }
        }

        if self.address_table[usize::from(port)][usize::from(address)].is_none() {
            let replacement = self.active.iter().copied().find(|handle| {
                self.get(*handle)
                    .is_some_and(|cf| cf.port == port && cf.address == address)
            });
            if let Some(handle) = replacement {
                self.address_table[usize::from(port)][usize::from(address)] = Some(handle);
                if let Some(cf) = self.get_mut(handle) {
                    cf.address = address;
                }
            }
        }
    }

    /// Direct table lookup. Out-of-range inputs and dead handles return None.
    pub fn lookup(&self, port: u8, address: u8) -> Option<CfHandle> {
        if usize::from(port) >= CAN_PORT_MAXIMUM || usize::from(address) >= ADDRESS_TABLE_SIZE {
            return None;
        }
        self.address_table[usize::from(port)][usize::from(address)]
            .filter(|handle| self.get(*handle).is_some())
    }

    /// Linear scan of the active list, used instead of [`lookup`](Self::lookup)
    /// while the table may be stale (address-claim frames in the producer
    /// context).
    pub fn find_active_by_address(&self, port: u8, address: u8) -> Option<CfHandle> {
        self.active.iter().copied().find(|handle| {
            self.get(*handle)
                .is_some_and(|cf| cf.port == port && cf.address == address)
        })
    }
}

impl Default for ControlFunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::NameField;

    #[test]
    fn fresh_claim_creates_external_cf() {
        let mut registry = ControlFunctionRegistry::new();
        let name = Name::from_raw(0x0807_0605_0403_0201);

        let handle = registry.observe_claim(0, 0x80, name);
        registry.update_address_table(0, 0x80);

        assert_eq!(registry.active().len(), 1);
        assert_eq!(registry.lookup(0, 0x80), Some(handle));
        let cf = registry.get(handle).unwrap();
        assert_eq!(cf.name(), name);
        assert_eq!(cf.address(), 0x80);
    }

    #[test]
    fn re_claim_by_same_name_moves_address() {
        let mut registry = ControlFunctionRegistry::new();
        let name = Name::from_raw(0x1111);

        let first = registry.observe_claim(0, 0x80, name);
        registry.update_address_table(0, 0x80);
        let second = registry.observe_claim(0, 0x42, name);

        assert_eq!(first, second);
        assert_eq!(registry.get(first).unwrap().address(), 0x42);
        assert_eq!(registry.active().len(), 1);
    }

    #[test]
    fn contention_nulls_loser_and_reassigns_slot() {
        let mut registry = ControlFunctionRegistry::new();
        let loser_name = Name::from_raw(0x2000);
        let winner_name = Name::from_raw(0x1000);

        let loser = registry.observe_claim(0, 0x80, loser_name);
        registry.update_address_table(0, 0x80);

        let winner = registry.observe_claim(0, 0x80, winner_name);
        registry.update_address_table(0, 0x80);

        assert_eq!(registry.get(loser).unwrap().address(), NULL_CAN_ADDRESS);
        assert_eq!(registry.get(winner).unwrap().address(), 0x80);
        assert_eq!(registry.lookup(0, 0x80), Some(winner));
    }

    #[test]
    fn same_address_on_other_port_is_untouched() {
        let mut registry = ControlFunctionRegistry::new();
        let port0 = registry.observe_claim(0, 0x80, Name::from_raw(0x10));
        registry.update_address_table(0, 0x80);

        registry.observe_claim(1, 0x80, Name::from_raw(0x20));
        registry.update_address_table(1, 0x80);

        assert_eq!(registry.get(port0).unwrap().address(), 0x80);
        assert_eq!(registry.lookup(0, 0x80), Some(port0));
    }

    #[test]
    fn partner_is_adopted_by_matching_claim() {
        let mut registry = ControlFunctionRegistry::new();
        let filters = vec![NameFilter::new(NameField::Function, 0x81)];
        let partner = registry.register_partner(0, filters);

        let name = Name::new(false, 2, 0, 0x10, 0x81, 0, 0, 0x123, 42);
        let found = registry.observe_claim(0, 0x42, name);

        assert_eq!(found, partner);
        let cf = registry.get(partner).unwrap();
        assert_eq!(cf.address(), 0x42);
        assert_eq!(cf.name(), name);
        assert!(registry.active().contains(&partner));
    }

    #[test]
    fn non_matching_claim_skips_partner() {
        let mut registry = ControlFunctionRegistry::new();
        let filters = vec![NameFilter::new(NameField::Function, 0x81)];
        let partner = registry.register_partner(0, filters);

        let name = Name::new(false, 2, 0, 0x10, 0x44, 0, 0, 0x123, 42);
        let found = registry.observe_claim(0, 0x42, name);

        assert_ne!(found, partner);
        assert_eq!(registry.get(partner).unwrap().address(), NULL_CAN_ADDRESS);
    }

    #[test]
    fn lookup_rejects_out_of_range() {
        let registry = ControlFunctionRegistry::new();
        assert_eq!(registry.lookup(CAN_PORT_MAXIMUM as u8, 0x10), None);
        assert_eq!(registry.lookup(0, NULL_CAN_ADDRESS), None);
        assert_eq!(registry.lookup(0, 0xFF), None);
    }

    #[test]
    fn deregistered_handle_stops_resolving() {
        let mut registry = ControlFunctionRegistry::new();
        let handle = registry.register_internal(Name::from_raw(1), 0x20, 0);
        assert!(registry.get(handle).is_some());

        assert!(registry.deregister(handle));
        assert!(registry.get(handle).is_none());
        assert!(!registry.deregister(handle));
        assert!(registry.internals().is_empty());

        // The slot is recycled under a new generation.
        let replacement = registry.register_internal(Name::from_raw(2), 0x21, 0);
        assert_eq!(replacement.index, handle.index);
        assert_ne!(replacement.generation, handle.generation);
        assert!(registry.get(handle).is_none());
    }

    #[test]
    fn reconnected_inactive_cf_returns_to_active() {
        let mut registry = ControlFunctionRegistry::new();
        let name = Name::from_raw(0x3000);
        let handle = registry.observe_claim(0, 0x33, name);

        // Simulate the device dropping off: lost arbitration, demoted.
        registry.get_mut(handle).unwrap().address = NULL_CAN_ADDRESS;
        registry.active.retain(|candidate| *candidate != handle);
        registry.inactive.push(handle);

        let found = registry.observe_claim(0, 0x34, name);
        assert_eq!(found, handle);
        assert!(registry.active().contains(&handle));
        assert_eq!(registry.get(handle).unwrap().address(), 0x34);
    }
}
