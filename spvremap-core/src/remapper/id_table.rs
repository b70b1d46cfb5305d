//! Id Table
//!
//! Tracks, for every old id below the module bound, whether it is used by the module and
//! which new id it has been assigned.
//!
//! # State Lifecycle
//! `Unused -> Unmapped -> Mapped(new)`. Transitions never go backwards; the only way to
//! forget a mapping is to rebuild the whole table on a rescan.
//!
//! # Memory Optimizations
//! - Claimed new ids live in a `BitVec` (1 bit per id) instead of a `HashSet<u32>`
//! - The claimed set grows lazily, since hashed candidates may land above the old bound

use bitvec::prelude::*;

use crate::remapper::error::{RemapError, Result};

/// State of one old id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IdState {
    /// The id does not occur in the module.
    #[default]
    Unused,
    /// The id occurs but has no new id yet.
    Unmapped,
    /// The id has been assigned this new id.
    Mapped(u32),
}

/// Old-id to new-id table with collision tracking.
#[derive(Debug, Clone, Default)]
pub struct IdTable {
    states: Vec<IdState>,
    /// New ids already claimed by some old id.
    claimed: BitVec<u32>,
}

impl IdTable {
    /// Empty table for a module with the given id bound.
    pub fn with_bound(bound: u32) -> Self {
        let mut table: IdTable = Self::default();
        table.reset(bound);
        table
    }

    /// Drop every state and mapping and resize to `bound`.
    pub fn reset(&mut self, bound: u32) {
        self.states.clear();
        self.states.resize(bound as usize, IdState::Unused);
        self.claimed.clear();
        self.claimed.resize(bound as usize, false);
    }

    /// Id bound the table was sized for.
    #[inline]
    pub fn bound(&self) -> u32 {
        self.states.len() as u32
    }

    /// Current state of `id`; ids outside the table read as unused.
    #[inline]
    pub fn state(&self, id: u32) -> IdState {
        self.states.get(id as usize).copied().unwrap_or(IdState::Unused)
    }

    #[inline]
    pub fn is_unmapped(&self, id: u32) -> bool {
        self.state(id) == IdState::Unmapped
    }

    /// Whether `new_id` has been handed out.
    #[inline]
    pub fn is_claimed(&self, new_id: u32) -> bool {
        self.claimed
            .get(new_id as usize)
            .map(|bit| *bit)
            .unwrap_or(false)
    }

    /// Record that `id` occurs in the module.
    ///
    /// # Errors
    /// [`RemapError::ReservedId`] for id 0, [`RemapError::IdOutOfBound`] for ids at or
    /// above the bound.
    #[inline] // Called once per id occurrence on every rescan
    pub fn touch(&mut self, id: u32) -> Result<()> {
        if id == 0 {
            return Err(RemapError::ReservedId);
        }
        let bound: u32 = self.bound();
        let state: &mut IdState = self
            .states
            .get_mut(id as usize)
            .ok_or(RemapError::IdOutOfBound { id, bound })?;
        if *state == IdState::Unused {
            *state = IdState::Unmapped;
        }
        Ok(())
    }

    /// Map `old` to `new_id`.
    ///
    /// Re-assigning the same pair is accepted.
    ///
    /// # Errors
    /// - [`RemapError::IdUnused`] if `old` does not occur in the module
    /// - [`RemapError::IdAlreadyMapped`] if `old` is mapped to something else
    /// - [`RemapError::ReservedId`] if `new_id` is 0
    /// - [`RemapError::IdCollision`] if another old id already claimed `new_id`
    pub fn assign(&mut self, old: u32, new_id: u32) -> Result<()> {
        match self.state(old) {
            IdState::Unused => return Err(RemapError::IdUnused { id: old }),
            IdState::Mapped(current) if current == new_id => return Ok(()),
            IdState::Mapped(current) => {
                return Err(RemapError::IdAlreadyMapped {
                    id: old,
                    current,
                    requested: new_id,
                })
            }
            IdState::Unmapped => {}
        }
        if new_id == 0 {
            return Err(RemapError::ReservedId);
        }
        if self.is_claimed(new_id) {
            return Err(RemapError::IdCollision { id: old, new_id });
        }

        let slot: usize = new_id as usize;
        if slot >= self.claimed.len() {
            self.claimed.resize(slot + 1, false);
        }
        self.claimed.set(slot, true);
        self.states[old as usize] = IdState::Mapped(new_id);
        log::trace!("map: {} -> {}", old, new_id);
        Ok(())
    }

    /// First unclaimed new id at or above `start`, never 0.
    pub fn next_free(&self, start: u32) -> u32 {
        let mut id: u32 = start.max(1);
        while self.is_claimed(id) {
            id += 1;
        }
        id
    }

    /// Map `old` to the first free id at or above `candidate`, if `old` is still unmapped.
    ///
    /// # Returns
    /// The new id, or `None` if `old` was unused or already mapped.
    pub fn claim(&mut self, old: u32, candidate: u32) -> Result<Option<u32>> {
        if !self.is_unmapped(old) {
            return Ok(None);
        }
        let new_id: u32 = self.next_free(candidate);
        self.assign(old, new_id)?;
        Ok(Some(new_id))
    }

    /// New id of `old`.
    ///
    /// # Errors
    /// [`RemapError::IdNotMapped`] if `old` is unused or unmapped.
    #[inline]
    pub fn mapped(&self, old: u32) -> Result<u32> {
        match self.state(old) {
            IdState::Mapped(new_id) => Ok(new_id),
            _ => Err(RemapError::IdNotMapped { id: old }),
        }
    }

    /// Assign sequential free ids to every still unmapped id.
    ///
    /// # Returns
    /// `(ids mapped here, new id bound)` where the bound is one past the largest new id
    /// of any used old id (1 for a module without ids).
    pub fn map_remainder(&mut self) -> Result<(usize, u32)> {
        let mut next: u32 = 1;
        let mut count: usize = 0;
        let mut bound: u32 = 1;

        for old in 1..self.bound() {
            if self.state(old) == IdState::Unused {
                continue;
            }
            if self.is_unmapped(old) {
                next = self.next_free(next);
                self.assign(old, next)?;
                count += 1;
            }
            bound = bound.max(self.mapped(old)? + 1);
        }

        Ok((count, bound))
    }

    /// Number of ids that occur in the module.
    pub fn used_count(&self) -> usize {
        self.states
            .iter()
            .filter(|state| **state != IdState::Unused)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut table = IdTable::with_bound(8);
        assert_eq!(table.state(3), IdState::Unused);

        table.touch(3).unwrap();
        assert_eq!(table.state(3), IdState::Unmapped);

        table.assign(3, 40).unwrap();
        assert_eq!(table.state(3), IdState::Mapped(40));
        assert_eq!(table.mapped(3), Ok(40));

        // touching again does not demote a mapped id
        table.touch(3).unwrap();
        assert_eq!(table.state(3), IdState::Mapped(40));
    }

    #[test]
    fn test_touch_rejects_reserved_and_out_of_bound() {
        let mut table = IdTable::with_bound(4);
        assert_eq!(table.touch(0), Err(RemapError::ReservedId));
        assert_eq!(
            table.touch(4),
            Err(RemapError::IdOutOfBound { id: 4, bound: 4 })
        );
    }

    #[test]
    fn test_assign_errors() {
        let mut table = IdTable::with_bound(8);
        assert_eq!(table.assign(2, 5), Err(RemapError::IdUnused { id: 2 }));

        table.touch(2).unwrap();
        table.touch(3).unwrap();
        assert_eq!(table.assign(2, 0), Err(RemapError::ReservedId));

        table.assign(2, 5).unwrap();
        assert_eq!(table.assign(2, 5), Ok(()));
        assert_eq!(
            table.assign(2, 6),
            Err(RemapError::IdAlreadyMapped {
                id: 2,
                current: 5,
                requested: 6
            })
        );
        assert_eq!(
            table.assign(3, 5),
            Err(RemapError::IdCollision { id: 3, new_id: 5 })
        );
    }

    #[test]
    fn test_next_free_skips_zero_and_claimed() {
        let mut table = IdTable::with_bound(4);
        assert_eq!(table.next_free(0), 1);

        table.touch(1).unwrap();
        table.touch(2).unwrap();
        table.assign(1, 1).unwrap();
        table.assign(2, 3100).unwrap();
        assert_eq!(table.next_free(0), 2);
        assert_eq!(table.next_free(3100), 3101);
    }

    #[test]
    fn test_claim_only_touches_unmapped() {
        let mut table = IdTable::with_bound(4);
        table.touch(1).unwrap();
        table.touch(2).unwrap();

        assert_eq!(table.claim(1, 10), Ok(Some(10)));
        assert_eq!(table.claim(2, 10), Ok(Some(11)));
        assert_eq!(table.claim(2, 50), Ok(None));
        assert_eq!(table.claim(3, 50), Ok(None));
    }

    #[test]
    fn test_map_remainder() {
        let mut table = IdTable::with_bound(10);
        for id in [2, 4, 9] {
            table.touch(id).unwrap();
        }
        table.assign(4, 1).unwrap();

        let (count, bound) = table.map_remainder().unwrap();
        assert_eq!(count, 2);
        assert_eq!(table.mapped(2), Ok(2));
        assert_eq!(table.mapped(9), Ok(3));
        assert_eq!(bound, 4);
        assert_eq!(table.mapped(5), Err(RemapError::IdNotMapped { id: 5 }));
    }

    #[test]
    fn test_map_remainder_without_ids() {
        let mut table = IdTable::with_bound(3);
        assert_eq!(table.map_remainder(), Ok((0, 1)));
    }
}
