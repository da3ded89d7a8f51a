//! Post-build verification: recompute every key's slot from the finished
//! tables and prove the perfect-hash property actually holds.

use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

use crate::error::Error;
use crate::key::KeyWidth;
use crate::SpatialHash;

pub(crate) fn check<K: KeyWidth>(built: &SpatialHash<K>, keys: &[K]) -> Result<(), Error> {
    let sizes = &built.sizes;
    let slots = sizes.slots as usize;

    let hits: Vec<AtomicU32> = (0..slots)
        .into_par_iter()
        .map(|_| AtomicU32::new(0))
        .collect();

    keys.par_iter().enumerate().try_for_each(|(i, k)| {
        let bucket = k.reduce(sizes.offsets, sizes.offset_shifts);
        let offset = built.offsets[bucket as usize];
        // Walk the same arithmetic a reader uses: shift the key by its
        // offset, then reduce into the primary table.
        let slot = k.checked_add_u32(offset)?.reduce(sizes.slots, sizes.slot_shifts) as usize;

        if hits[slot].fetch_add(1, Ordering::Relaxed) + 1 > 1 {
            return Err(Error::VerifierMismatch(format!(
                "key {i} landed in slot {slot}, which is already taken"
            )));
        }
        if built.table.get(slot) != *k {
            return Err(Error::VerifierMismatch(format!(
                "slot {slot} does not hold key {i} lane for lane"
            )));
        }
        Ok(())
    })?;

    let occupied = (0..slots)
        .into_par_iter()
        .filter(|&s| !built.table.is_empty_slot(s))
        .count();
    if occupied != keys.len() {
        return Err(Error::VerifierMismatch(format!(
            "table holds {occupied} entries but {} keys were loaded",
            keys.len()
        )));
    }

    Ok(())
}
