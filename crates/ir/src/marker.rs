//! Epoch-based visit markers.
//!
//! A traversal acquires a [`Marker`] from the graph's [`MarkerManager`],
//! stamps blocks or instructions with it, and releases it when done. A fresh
//! marker carries a new epoch, so stale stamps from earlier traversals never
//! read as set and nothing has to be cleared between passes.

pub const MARKER_SLOTS: usize = 4;

const SLOT_BITS: u32 = 2;
const SLOT_MASK: u32 = (1 << SLOT_BITS) - 1;

/// A visit marker: an epoch shifted over the slot it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker(u32);

impl Marker {
    fn new(epoch: u32, slot: usize) -> Self {
        Self((epoch << SLOT_BITS) | slot as u32)
    }

    pub fn slot(self) -> usize {
        (self.0 & SLOT_MASK) as usize
    }

    fn epoch(self) -> u32 {
        self.0 >> SLOT_BITS
    }
}

/// Per-entity marker storage, one word per slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerWords([u32; MARKER_SLOTS]);

impl MarkerWords {
    pub fn is_marked(&self, marker: Marker) -> bool {
        self.0[marker.slot()] == marker.epoch()
    }

    pub fn mark(&mut self, marker: Marker) {
        self.0[marker.slot()] = marker.epoch();
    }

    pub fn unmark(&mut self, marker: Marker) {
        self.0[marker.slot()] = 0;
    }
}

/// Hands out up to [`MARKER_SLOTS`] concurrently live markers.
#[derive(Debug, Clone)]
pub struct MarkerManager {
    // Epoch 0 is never issued so a default `MarkerWords` reads as unmarked.
    epoch: u32,
    live: [bool; MARKER_SLOTS],
}

impl Default for MarkerManager {
    fn default() -> Self {
        Self { epoch: 0, live: [false; MARKER_SLOTS] }
    }
}

impl MarkerManager {
    /// Acquires a marker in the first free slot.
    ///
    /// # Panics
    /// Panics if all slots are held by unreleased markers.
    pub fn acquire(&mut self) -> Marker {
        let slot = self
            .live
            .iter()
            .position(|l| !l)
            .unwrap_or_else(|| panic!("all {MARKER_SLOTS} marker slots are in use"));
        self.live[slot] = true;
        self.epoch += 1;
        Marker::new(self.epoch, slot)
    }

    pub fn release(&mut self, marker: Marker) {
        self.live[marker.slot()] = false;
    }
}
