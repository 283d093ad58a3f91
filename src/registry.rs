//! # Name Registry
//!
//! Attaches human-readable names to kernel resources so a debugger (or a
//! log line) can say "IntQueue" instead of printing an address. Fixed
//! capacity, no allocation, safe to touch from interrupts.

use core::cell::RefCell;

use heapless::Vec;

use crate::config::REGISTRY_CAPACITY;
use crate::error::ConfigError;
use crate::sync::{self, Mutex};

/// Opaque identity of a registered resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(u16);

impl ResourceId {
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }
}

type Entries = Vec<(ResourceId, &'static str), REGISTRY_CAPACITY>;

pub struct Registry {
    entries: Mutex<RefCell<Entries>>,
}

impl Registry {
    pub const fn new() -> Self {
        Self { entries: Mutex::new(RefCell::new(Vec::new())) }
    }

    /// Name `id`. Registering an already named resource replaces its name.
    pub fn add(&self, id: ResourceId, name: &'static str) -> Result<(), ConfigError> {
        sync::critical_section(|cs| {
            let mut entries = self.entries.borrow_ref_mut(cs);
            if let Some(entry) = entries.iter_mut().find(|(rid, _)| *rid == id) {
                entry.1 = name;
                return Ok(());
            }
            entries.push((id, name)).map_err(|_| ConfigError::RegistryFull)
        })
    }

    pub fn name_of(&self, id: ResourceId) -> Option<&'static str> {
        sync::critical_section(|cs| {
            self.entries
                .borrow_ref(cs)
                .iter()
                .find(|(rid, _)| *rid == id)
                .map(|(_, name)| *name)
        })
    }

    /// Drop `id`'s name. Returns `false` if it had none.
    pub fn remove(&self, id: ResourceId) -> bool {
        sync::critical_section(|cs| {
            let mut entries = self.entries.borrow_ref_mut(cs);
            match entries.iter().position(|(rid, _)| *rid == id) {
                Some(pos) => {
                    entries.swap_remove(pos);
                    true
                }
                None => false,
            }
        })
    }

    pub fn len(&self) -> usize {
        sync::critical_section(|cs| self.entries.borrow_ref(cs).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
