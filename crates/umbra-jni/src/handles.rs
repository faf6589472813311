//! Generational handle table for values owned on behalf of the JVM.
//!
//! Handles cross the FFI boundary as `jlong`. A stale or forged handle maps to
//! no entry instead of to a reused slot.

use jni::sys::jlong;
use slotmap::{Key, KeyData, SlotMap, new_key_type};

new_key_type! {
    /// Key of one live subscription.
    pub struct HandleKey;
}

/// Values addressed by `jlong` handles. `0` is never a valid handle.
pub struct HandleTable<T> {
    slots: SlotMap<HandleKey, T>,
}

impl<T> HandleTable<T> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
        }
    }

    /// Store `value` and return its handle.
    pub fn insert(&mut self, value: T) -> jlong {
        encode(self.slots.insert(value))
    }

    /// Remove and return the value behind `handle`, if it is live.
    pub fn remove(&mut self, handle: jlong) -> Option<T> {
        self.slots.remove(decode(handle)?)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no entries are live.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(key: HandleKey) -> jlong {
    // Occupied slots have odd versions, so the encoding is never zero.
    key.data().as_ffi() as jlong
}

fn decode(handle: jlong) -> Option<HandleKey> {
    if handle == 0 {
        return None;
    }
    Some(KeyData::from_ffi(handle as u64).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_remove() {
        let mut table = HandleTable::new();
        let handle = table.insert("first");
        assert_ne!(handle, 0);
        assert_eq!(table.len(), 1);
        assert_eq!(table.remove(handle), Some("first"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_stale_handle_is_ignored() {
        let mut table = HandleTable::new();
        let stale = table.insert(1);
        table.remove(stale);

        // The slot is reused with a new version.
        let fresh = table.insert(2);
        assert_ne!(stale, fresh);
        assert_eq!(table.remove(stale), None);
        assert_eq!(table.remove(fresh), Some(2));
    }

    #[test]
    fn test_invalid_handles() {
        let mut table: HandleTable<u32> = HandleTable::new();
        assert_eq!(table.remove(0), None);
        assert_eq!(table.remove(-1), None);
        assert_eq!(table.remove(0x1234_5678), None);
    }
}
