//! Permission bitsets.
//!
//! A [`PermissionSet`] carries an allowed and a denied bitset; the effective permissions are
//! `allowed & !denied`. The string form lists allowed bits with `+` and denied bits with `-`,
//! e.g. `+r+w+v-c`.

use anyhow::{bail, Result};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Permission: u32 {
        const READ           = 0b0_0001;
        const WRITE          = 0b0_0010;
        const VIEW           = 0b0_0100;
        const CONTROL        = 0b0_1000;
        const DIRECT_PUBLISH = 0b1_0000;
    }
}

const LETTERS: [(Permission, char); 5] = [
    (Permission::READ, 'r'),
    (Permission::WRITE, 'w'),
    (Permission::VIEW, 'v'),
    (Permission::CONTROL, 'c'),
    (Permission::DIRECT_PUBLISH, 'd'),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionSet {
    pub allowed: Permission,
    #[serde(default = "Permission::empty")]
    pub denied: Permission,
}

pub const ACCESS_READ: PermissionSet = PermissionSet::new(Permission::READ);
pub const ACCESS_WRITE: PermissionSet = PermissionSet::new(Permission::WRITE);
pub const ACCESS_VIEW: PermissionSet = PermissionSet::new(Permission::VIEW);
pub const ACCESS_CONTROL: PermissionSet = PermissionSet::new(Permission::CONTROL);
pub const ACCESS_DIRECT_PUBLISH: PermissionSet = PermissionSet::new(Permission::DIRECT_PUBLISH);
pub const ACCESS_READ_WRITE: PermissionSet = PermissionSet::new(Permission::READ.union(Permission::WRITE));

impl PermissionSet {
    pub const fn new(allowed: Permission) -> Self {
        Self { allowed, denied: Permission::empty() }
    }

    pub const fn with_denied(allowed: Permission, denied: Permission) -> Self {
        Self { allowed, denied }
    }

    pub const fn empty() -> Self { Self::new(Permission::empty()) }

    pub const fn all() -> Self { Self::new(Permission::all()) }

    pub fn effective(&self) -> Permission { self.allowed.difference(self.denied) }

    pub fn requires_write(&self) -> bool { self.effective().contains(Permission::WRITE) }

    pub fn requires_control(&self) -> bool { self.effective().contains(Permission::CONTROL) }

    /// Merge another set in: allowed and denied bits accumulate.
    pub fn add(&mut self, other: &PermissionSet) {
        self.allowed |= other.allowed;
        self.denied |= other.denied;
    }

    /// Revoke bits regardless of what was allowed.
    pub fn deny(&mut self, bits: Permission) {
        self.denied |= bits;
    }

    /// Grant bits and lift any denial on them.
    pub fn grant(&mut self, bits: Permission) {
        self.allowed |= bits;
        self.denied.remove(bits);
    }

    /// Required bits this set does not grant effectively.
    pub fn missing(&self, required: &PermissionSet) -> Permission {
        required.effective().difference(self.effective())
    }

    pub fn satisfies(&self, required: &PermissionSet) -> bool { self.missing(required).is_empty() }

    pub fn permission_string(&self) -> String {
        let mut s = String::new();
        for (bit, letter) in LETTERS {
            if self.allowed.contains(bit) && !self.denied.contains(bit) {
                s.push('+');
                s.push(letter);
            } else if self.denied.contains(bit) {
                s.push('-');
                s.push(letter);
            }
        }
        s
    }
}

impl Default for PermissionSet {
    fn default() -> Self { Self::empty() }
}

impl Display for PermissionSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.permission_string()) }
}

impl FromStr for PermissionSet {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut set = PermissionSet::empty();
        let mut chars = s.trim().chars();
        while let Some(sign) = chars.next() {
            let Some(letter) = chars.next() else { bail!("dangling '{}' in permission string '{}'", sign, s) };
            let Some((bit, _)) = LETTERS.iter().find(|(_, l)| *l == letter) else { bail!("unknown permission '{}' in '{}'", letter, s) };
            match sign {
                '+' => set.allowed |= *bit,
                '-' => set.denied |= *bit,
                other => bail!("expected '+' or '-' but found '{}' in '{}'", other, s),
            }
        }
        Ok(set)
    }
}
