//! Exact-match dispatch table with a fixed entry bound
//!
//! Used for the IP protocol-number table and the UDP port table. Registering
//! an existing key replaces its handler; only a new key can hit the bound.

use std::collections::HashMap;
use std::hash::Hash;

use crate::buffer::PacketBuf;
use crate::error::{Result, StackError};

pub struct DispatchTable<K, H> {
    entries: HashMap<K, H>,
    capacity: usize,
}

impl<K: Eq + Hash + Copy, H> DispatchTable<K, H> {
    pub fn with_capacity(capacity: usize) -> Self {
        DispatchTable {
            entries: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Install `handler` under `key`, returning the handler it replaced
    pub fn register(&mut self, key: K, handler: H) -> Result<Option<H>> {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            return Err(StackError::TableFull {
                capacity: self.capacity,
            });
        }
        Ok(self.entries.insert(key, handler))
    }

    /// Remove the handler for `key`; absent keys are ignored
    pub fn unregister(&mut self, key: K) -> Option<H> {
        self.entries.remove(&key)
    }

    pub fn contains(&self, key: K) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut H> {
        self.entries.get_mut(&key)
    }

    /// Hand `buf` to the handler for `key`
    ///
    /// Without a handler the buffer comes back untouched so the caller can
    /// report the failure.
    pub fn dispatch<R, F>(&mut self, key: K, buf: PacketBuf, deliver: F) -> std::result::Result<R, PacketBuf>
    where
        F: FnOnce(&mut H, PacketBuf) -> R,
    {
        match self.entries.get_mut(&key) {
            Some(handler) => Ok(deliver(handler, buf)),
            None => Err(buf),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
