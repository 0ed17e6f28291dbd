//! Positions of tap-hold keys that were committed as tap but are still
//! physically down. Hold is the default on release, so only tap outcomes
//! need remembering; the set is keyed on position because a release may
//! arrive with a keycode from a different layer than its press.

use crate::record::KeyPos;

pub(crate) const SET_SIZE: usize = 8;

pub(crate) struct TapReleaseSet {
    positions: [KeyPos; SET_SIZE],
    used: u8,
}

impl TapReleaseSet {
    pub(crate) fn new() -> Self {
        Self {
            positions: [KeyPos::NONE; SET_SIZE],
            used: 0,
        }
    }

    pub(crate) fn insert(&mut self, pos: KeyPos) {
        let free = !self.used;
        if free == 0 {
            crate::warn!(
                "no space to remember tap release of ({}, {})",
                pos.row,
                pos.col
            );
            return;
        }
        let slot = free.trailing_zeros() as usize;
        self.positions[slot] = pos;
        self.used |= 1 << slot;
    }

    /// Removes `pos` if present and reports whether it was.
    pub(crate) fn remove(&mut self, pos: KeyPos) -> bool {
        let mut to_check = self.used;
        while to_check != 0 {
            let slot = to_check.trailing_zeros() as usize;
            let bit = 1 << slot;
            if self.positions[slot] == pos {
                self.used &= !bit;
                return true;
            }
            to_check &= !bit;
        }
        false
    }
}
