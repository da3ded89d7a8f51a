//! # spatial-hash: perfect spatial hash tables for wide keys
//!
//! Builds a _perfect spatial hash table_ in the style of Lefebvre & Hoppe
//! ("Perfect Spatial Hashing") for a static set of 128- or 192-bit keys.
//! The result is two dense arrays: a primary table holding one key per slot
//! and a small offset table steering each key to its slot. Membership of a
//! key (and its slot index) is decided with exactly two table loads and
//! two modulo reductions:
//!
//! ```text
//! slot(k) = (k mod m + offsets[k mod r]) mod m
//! ```
//!
//! The hard part is construction: choosing the two coprime table sizes and
//! filling the offset table is an online constraint-satisfaction search with
//! one-step backtracking, supervised by a watchdog that abandons table sizes
//! which stop making progress and retries larger ones.
//!
//! Usage example:
//! ```rust
//! use spatial_hash::{BuildParams, Key192, SpatialHash};
//!
//! // Generate some distinct random keys.
//! let keys = spatial_hash::util::generate_keys::<Key192>(1000, 17);
//!
//! let params = BuildParams {
//!     seed: Some(7),
//!     ..BuildParams::default()
//! };
//! let table = SpatialHash::build(&keys, params).unwrap();
//!
//! // Every key resolves to its own slot.
//! let mut seen = vec![false; table.slots() as usize];
//! for key in &keys {
//!     let slot = table.index(key).unwrap() as usize;
//!     assert!(!seen[slot]);
//!     seen[slot] = true;
//! }
//!
//! // Absent keys are rejected by the final comparison.
//! assert_eq!(table.index(&Key192::new(0xdead, 0, 0)), None);
//! ```
//!
//! Construction is deterministic for a fixed seed, key set and parameter
//! choice; pass `seed: None` to seed from the wall clock instead.

pub mod error;
pub mod key;
/// Table sizing internals, exposed for tests and diagnostics.
#[doc(hidden)]
pub mod sizing;
/// Key generation helpers.
pub mod util;

mod buckets;
mod build;
mod dedup;
mod sort_buckets;
mod stats;
mod verify;
mod watchdog;

use std::time::Duration;

pub use dedup::remove_duplicates;
pub use error::Error;
pub use key::{Key128, Key192, KeyTable, KeyWidth, ShiftConsts};
pub use stats::BuildStats;

use sizing::Sizes;

/// Knobs for [`SpatialHash::build`]. The defaults follow the sizing
/// staircase; the overrides exist for reproduction and testing.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuildParams {
    /// Solver RNG seed; `None` seeds from the wall clock.
    pub seed: Option<u64>,
    /// Emit a progress line to stdout while solving.
    pub print_progress: bool,
    /// Override the staircase's offset-table growth multiplier.
    pub mult_offset: Option<f64>,
    /// Override the staircase's primary-table growth multiplier.
    pub mult_slots: Option<f64>,
    /// Override the watchdog's start delay and repeat period.
    pub watchdog: Option<(Duration, Duration)>,
}

/// A finished perfect spatial hash table.
///
/// Holds the primary table `H` (one slot per key, lane-sliced) and the
/// offset table `O`, plus the sizes and reduction constants a reader needs.
#[derive(Clone, Debug)]
pub struct SpatialHash<K: KeyWidth> {
    pub(crate) n: usize,
    pub(crate) seed: u64,
    pub(crate) sizes: Sizes,
    pub(crate) offsets: Vec<u32>,
    pub(crate) table: KeyTable<K>,
    pub(crate) stats: BuildStats,
}

impl<K: KeyWidth> SpatialHash<K> {
    /// The slot holding `key`, or `None` when `key` was not part of the
    /// build.
    #[inline]
    pub fn index(&self, key: &K) -> Option<u32> {
        if self.n == 0 {
            return None;
        }
        let bucket = key.reduce(self.sizes.offsets, self.sizes.offset_shifts);
        let offset = self.offsets[bucket as usize];
        let slot = (key.reduce(self.sizes.slots, self.sizes.slot_shifts) + offset)
            % self.sizes.slots;
        (self.table.get(slot as usize) == *key).then_some(slot)
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.index(key).is_some()
    }

    /// Re-run the full verifier against `keys`.
    pub fn verify(&self, keys: &[K]) -> Result<(), Error> {
        verify::check(self, keys)
    }

    /// Number of keys the table was built from.
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// The seed the offset search ran with; feed it back through
    /// [`BuildParams::seed`] to reproduce the exact same tables.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Primary-table length `m`.
    pub fn slots(&self) -> u32 {
        self.sizes.slots
    }

    /// Offset-table length `r`.
    pub fn offset_entries(&self) -> u32 {
        self.sizes.offsets
    }

    pub fn offset_table(&self) -> &[u32] {
        &self.offsets
    }

    pub fn key_table(&self) -> &KeyTable<K> {
        &self.table
    }

    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Number of non-empty primary-table slots.
    pub fn occupied_slots(&self) -> usize {
        (0..self.sizes.slots as usize)
            .filter(|&s| !self.table.is_empty_slot(s))
            .count()
    }
}
