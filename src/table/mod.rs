//! The allocation table: an open addressing map from block address to the
//! block it owns, its size and its live mark.
//!
//! Collisions are resolved with double hashing. The table's capacity is
//! always prime and is used as the modulus of every probe sequence, so any
//! lookup or insert visits each slot at most once. After every insert the
//! ratio of tracked blocks to capacity is at most the configured max load
//! factor; the table doubles (to the largest prime below twice its size)
//! whenever an insert would break that bound.

mod probe;
mod slot;


pub use slot::Entry;
use slot::Slot;

use crate::block::Block;
use crate::config::GcConfig;
use crate::error::{AllocError, ConfigError, GcError};
use crate::math::prime_at_most;
use log::{debug, trace};
use probe::Probe;

/// What a sweep reclaimed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub blocks: usize,
    pub bytes: usize,
}

pub struct AllocationTable {
    slots: Box<[Slot]>,
    len: usize,
    tombstones: usize,
    tracked_bytes: usize,
    max_load_factor: f64,
    rehashes: usize,
}

impl AllocationTable {
    pub fn new(capacity: usize, max_load_factor: f64) -> Result<Self, GcError> {
        let capacity = prime_at_most(capacity)
            .filter(|&p| p > 2)
            .ok_or(ConfigError::CapacityTooSmall(capacity))?;

        if !(max_load_factor > 0.0 && max_load_factor < 1.0) {
            return Err(ConfigError::LoadFactor(max_load_factor).into());
        }

        Ok(Self {
            slots: Self::empty_slots(capacity),
            len: 0,
            tombstones: 0,
            tracked_bytes: 0,
            max_load_factor,
            rehashes: 0,
        })
    }

    pub fn from_config(config: &GcConfig) -> Result<Self, GcError> {
        Self::new(config.initial_capacity, config.max_load_factor)
    }

    /// Number of slots, which is also the probing modulus.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn tracked_bytes(&self) -> usize {
        self.tracked_bytes
    }

    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.capacity() as f64
    }

    pub fn max_load_factor(&self) -> f64 {
        self.max_load_factor
    }

    /// How many times the table has been rebuilt into a larger one.
    pub fn rehashes(&self) -> usize {
        self.rehashes
    }

    /// Starts tracking `block`.
    ///
    /// Fails only when the address is already tracked or no free slot is
    /// left, both of which mean the table's invariants were broken.
    pub fn insert(&mut self, block: Block) -> Result<(), GcError> {
        self.insert_entry(Entry::new(block))
    }

    /// Returns the size of the block starting at `addr`.
    pub fn find(&self, addr: usize) -> Option<usize> {
        self.get(addr).map(Entry::size)
    }

    pub fn get(&self, addr: usize) -> Option<&Entry> {
        let pos = self.position(addr)?;

        match &self.slots[pos] {
            Slot::Occupied(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn contains(&self, addr: usize) -> bool {
        self.position(addr).is_some()
    }

    /// Stops tracking the block at `addr` and frees it.
    pub fn remove(&mut self, addr: usize) -> bool {
        self.take(addr).is_some()
    }

    /// Stops tracking the block at `addr`, handing it back to the caller.
    pub fn take(&mut self, addr: usize) -> Option<Block> {
        self.take_entry(addr).map(Entry::into_block)
    }

    /// Swaps the block at `old` for the one `resize` turns it into.
    ///
    /// The mark carries over, so a block resized while a cycle has already
    /// marked it stays live. If `resize` fails the original block is tracked
    /// again under its old address. Returns the new address.
    pub fn replace<F>(&mut self, old: usize, resize: F) -> Result<usize, GcError>
    where
        F: FnOnce(Block) -> Result<Block, (Block, AllocError)>,
    {
        let entry = self.take_entry(old).ok_or(GcError::UntrackedPointer(old))?;
        let marked = entry.is_marked();

        match resize(entry.into_block()) {
            Ok(block) => {
                let addr = block.addr();

                self.insert_entry(Entry::with_block(block, marked))?;

                Ok(addr)
            }
            Err((block, e)) => {
                self.insert_entry(Entry::with_block(block, marked))?;

                Err(e.into())
            }
        }
    }

    pub fn unmark_all(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Slot::Occupied(entry) = slot {
                entry.set_mark(false);
            }
        }
    }

    /// Marks the block at `addr` if there is one. Returns whether it exists.
    pub fn mark_if_present(&mut self, addr: usize) -> bool {
        match self.get_mut(addr) {
            Some(entry) => {
                entry.set_mark(true);
                true
            }
            None => false,
        }
    }

    /// Asking for the mark of an untracked address is an error, callers must
    /// confirm the address is tracked first.
    pub fn is_marked(&self, addr: usize) -> Result<bool, GcError> {
        self.get(addr)
            .map(Entry::is_marked)
            .ok_or(GcError::UntrackedPointer(addr))
    }

    /// The candidate test used while marking: if `addr` is a tracked block
    /// that has not been marked yet, mark it and return its byte range.
    pub fn mark_candidate(&mut self, addr: usize) -> Option<(usize, usize)> {
        let entry = self.get_mut(addr)?;

        if entry.is_marked() {
            return None;
        }

        entry.set_mark(true);

        Some((entry.addr(), entry.size()))
    }

    /// Frees every block that is still unmarked.
    pub fn sweep_unmarked(&mut self) -> SweepStats {
        let mut stats = SweepStats::default();

        for slot in self.slots.iter_mut() {
            let dead = matches!(slot, Slot::Occupied(entry) if !entry.is_marked());

            if dead {
                if let Slot::Occupied(entry) = std::mem::replace(slot, Slot::Tombstone) {
                    trace!("sweeping block {:#x} ({} bytes)", entry.addr(), entry.size());

                    stats.blocks += 1;
                    stats.bytes += entry.size();
                }
            }
        }

        self.len -= stats.blocks;
        self.tombstones += stats.blocks;
        self.tracked_bytes -= stats.bytes;

        stats
    }

    fn insert_entry(&mut self, entry: Entry) -> Result<(), GcError> {
        let addr = entry.addr();
        let size = entry.size();
        let pos = self.insert_position(addr)?;

        if let Slot::Tombstone = self.slots[pos] {
            self.tombstones -= 1;
        }

        self.slots[pos] = Slot::Occupied(entry);
        self.len += 1;
        self.tracked_bytes += size;

        self.maybe_rehash()
    }

    fn take_entry(&mut self, addr: usize) -> Option<Entry> {
        let pos = self.position(addr)?;

        match std::mem::replace(&mut self.slots[pos], Slot::Tombstone) {
            Slot::Occupied(entry) => {
                self.len -= 1;
                self.tombstones += 1;
                self.tracked_bytes -= entry.size();

                Some(entry)
            }
            _ => unreachable!("position always points at an occupied slot"),
        }
    }

    fn get_mut(&mut self, addr: usize) -> Option<&mut Entry> {
        let pos = self.position(addr)?;

        match &mut self.slots[pos] {
            Slot::Occupied(entry) => Some(entry),
            _ => None,
        }
    }

    fn position(&self, addr: usize) -> Option<usize> {
        for pos in Probe::new(addr, self.capacity()) {
            match &self.slots[pos] {
                Slot::Empty => return None,
                Slot::Occupied(entry) if entry.addr() == addr => return Some(pos),
                _ => {}
            }
        }

        None
    }

    fn insert_position(&self, addr: usize) -> Result<usize, GcError> {
        let mut reusable = None;

        for pos in Probe::new(addr, self.capacity()) {
            match &self.slots[pos] {
                Slot::Empty => return Ok(reusable.unwrap_or(pos)),
                Slot::Tombstone => {
                    reusable.get_or_insert(pos);
                }
                Slot::Occupied(entry) if entry.addr() == addr => {
                    return Err(GcError::TableInvariant(addr));
                }
                Slot::Occupied(_) => {}
            }
        }

        reusable.ok_or(GcError::TableInvariant(addr))
    }

    fn exceeds(&self, used: usize, capacity: usize) -> bool {
        used as f64 / capacity as f64 > self.max_load_factor
    }

    // Grows when the live entries break the load factor. When only the
    // tombstones push it over, the table is rebuilt at the same size so that
    // lookups of absent keys keep finding empty slots.
    fn maybe_rehash(&mut self) -> Result<(), GcError> {
        if self.exceeds(self.len, self.capacity()) {
            let mut capacity = self.capacity();

            while self.exceeds(self.len, capacity) {
                capacity = prime_at_most(capacity * 2).unwrap_or(capacity * 2);
            }

            debug!(
                "growing allocation table {} -> {} slots ({} blocks)",
                self.capacity(),
                capacity,
                self.len
            );

            self.rehashes += 1;
            self.rebuild(capacity)
        } else if self.exceeds(self.len + self.tombstones, self.capacity()) {
            trace!("purging {} tombstones", self.tombstones);

            self.rebuild(self.capacity())
        } else {
            Ok(())
        }
    }

    fn rebuild(&mut self, capacity: usize) -> Result<(), GcError> {
        let old = std::mem::replace(&mut self.slots, Self::empty_slots(capacity));

        self.tombstones = 0;

        // marks move along with their entries
        for slot in old.into_vec() {
            if let Slot::Occupied(entry) = slot {
                let pos = self.insert_position(entry.addr())?;

                self.slots[pos] = Slot::Occupied(entry);
            }
        }

        Ok(())
    }

    fn empty_slots(capacity: usize) -> Box<[Slot]> {
        (0..capacity).map(|_| Slot::Empty).collect()
    }
}
