//! Epoch counters for role cache invalidation.
//! A cached decision is valid while the global epoch and its principal's epoch are unchanged.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::identity::PrincipalId;

#[derive(Debug)]
pub struct Epochs {
    global: AtomicU64,
    principals: RwLock<HashMap<PrincipalId, u64>>,
}

/// Epoch pair captured when an entry was cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpochStamp {
    pub global: u64,
    pub principal: u64,
}

impl Default for Epochs {
    fn default() -> Self { Self { global: AtomicU64::new(1), principals: RwLock::new(HashMap::new()) } }
}

impl Epochs {
    pub fn new() -> Self { Self::default() }

    pub fn epoch_global(&self) -> u64 { self.global.load(Ordering::Acquire) }

    pub fn bump_global(&self) -> u64 { self.global.fetch_add(1, Ordering::AcqRel) + 1 }

    pub fn epoch_principal(&self, id: PrincipalId) -> u64 {
        *self.principals.read().get(&id).unwrap_or(&1)
    }

    pub fn bump_principal(&self, id: PrincipalId) -> u64 {
        let mut m = self.principals.write();
        let v = m.get(&id).copied().unwrap_or(1) + 1;
        m.insert(id, v);
        v
    }

    pub fn stamp(&self, id: PrincipalId) -> EpochStamp {
        EpochStamp { global: self.epoch_global(), principal: self.epoch_principal(id) }
    }

    pub fn is_current(&self, id: PrincipalId, stamp: EpochStamp) -> bool {
        stamp == self.stamp(id)
    }
}
