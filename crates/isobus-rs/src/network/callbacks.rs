use crate::message::CanMessage;
use crate::types::Pgn;

/// Signature for parameter-group callbacks. `parent` is the opaque context
/// supplied at registration time, echoed back on every invocation.
pub type PgnCallback = fn(&CanMessage, usize);

/// One registered callback. Two entries are equal only when PGN, function
/// and parent all match, which is also the key used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PgnCallbackEntry {
    pub pgn: Pgn,
    pub callback: PgnCallback,
    pub parent: usize,
}

impl PgnCallbackEntry {
    pub fn new(pgn: Pgn, callback: PgnCallback, parent: usize) -> Self {
        Self {
            pgn,
            callback,
            parent,
        }
    }
}

/// Appends `entry` only if an identical entry is not present. Used by the
/// protocol-callback registry, which has set semantics.
pub(crate) fn add_unique(list: &mut Vec<PgnCallbackEntry>, entry: PgnCallbackEntry) -> bool {
    if list.contains(&entry) {
        false
    } else {
        list.push(entry);
        true
    }
}

/// Removes the first entry matching the exact triple.
pub(crate) fn remove_exact(list: &mut Vec<PgnCallbackEntry>, entry: &PgnCallbackEntry) -> bool {
    if let Some(position) = list.iter().position(|candidate| candidate == entry) {
        list.remove(position);
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callback_a(_message: &CanMessage, _parent: usize) {}
    fn callback_b(_message: &CanMessage, _parent: usize) {}

    #[test]
    fn equality_is_by_full_triple() {
        let base = PgnCallbackEntry::new(0xEF00, callback_a, 1);
        assert_eq!(base, PgnCallbackEntry::new(0xEF00, callback_a, 1));
        assert_ne!(base, PgnCallbackEntry::new(0xEF01, callback_a, 1));
        assert_ne!(base, PgnCallbackEntry::new(0xEF00, callback_b, 1));
        assert_ne!(base, PgnCallbackEntry::new(0xEF00, callback_a, 2));
    }

    #[test]
    fn add_unique_rejects_duplicates() {
        let mut list = Vec::new();
        let entry = PgnCallbackEntry::new(0xEF00, callback_a, 0);
        assert!(add_unique(&mut list, entry));
        assert!(!add_unique(&mut list, entry));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn remove_exact_needs_matching_parent() {
        let mut list = vec![PgnCallbackEntry::new(0xEF00, callback_a, 1)];
        assert!(!remove_exact(&mut list, &PgnCallbackEntry::new(0xEF00, callback_a, 2)));
        assert!(remove_exact(&mut list, &PgnCallbackEntry::new(0xEF00, callback_a, 1)));
        assert!(list.is_empty());
    }
}
