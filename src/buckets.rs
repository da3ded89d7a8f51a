//! Grouping keys by their offset-table index.
//!
//! Three parallel passes: count the population of every bucket, lay the
//! member lists out contiguously with a prefix sum, then scatter key indices
//! into place with an atomic cursor per bucket.

use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

use crate::error::Error;
use crate::key::KeyWidth;
use crate::sizing::Sizes;

/// One offset-table entry's bookkeeping during construction.
///
/// `index` survives the population sort so the solver can write the chosen
/// offset back to the right table entry. Members live in a shared array at
/// `start .. start + len`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BucketInfo {
    pub index: u32,
    pub len: u16,
    pub start: u32,
}

pub(crate) struct Buckets {
    pub info: Vec<BucketInfo>,
    pub max_len: u16,
    members: Vec<u32>,
}

impl Buckets {
    pub fn build<K: KeyWidth>(keys: &[K], sizes: &Sizes) -> Result<Self, Error> {
        let r = sizes.offsets as usize;
        let bucket_of = |k: &K| k.reduce(sizes.offsets, sizes.offset_shifts) as usize;

        let counts: Vec<AtomicU32> = (0..r).into_par_iter().map(|_| AtomicU32::new(0)).collect();
        keys.par_iter().for_each(|k| {
            counts[bucket_of(k)].fetch_add(1, Ordering::Relaxed);
        });

        let mut info = Vec::new();
        info.try_reserve_exact(r).map_err(|source| Error::AllocFailure {
            what: "bucket directory",
            source,
        })?;
        let mut start = 0u32;
        let mut max_len = 0u16;
        for (index, count) in counts.iter().enumerate() {
            let population = count.load(Ordering::Relaxed);
            let len = u16::try_from(population).map_err(|_| Error::PopulationOverflow {
                bucket: index as u32,
                population,
            })?;
            max_len = max_len.max(len);
            info.push(BucketInfo {
                index: index as u32,
                len,
                start,
            });
            start += population;
        }

        // Scatter pass: each key claims the next free cell of its bucket.
        let starts: Vec<u32> = info.iter().map(|b| b.start).collect();
        for c in &counts {
            c.store(0, Ordering::Relaxed);
        }
        let members: Vec<AtomicU32> = (0..keys.len())
            .into_par_iter()
            .map(|_| AtomicU32::new(0))
            .collect();
        keys.par_iter().enumerate().for_each(|(i, k)| {
            let b = bucket_of(k);
            let cell = counts[b].fetch_add(1, Ordering::Relaxed);
            members[(starts[b] + cell) as usize].store(i as u32, Ordering::Relaxed);
        });
        let members = members.into_iter().map(AtomicU32::into_inner).collect();

        Ok(Self {
            info,
            max_len,
            members,
        })
    }

    pub fn members(&self, bucket: &BucketInfo) -> &[u32] {
        &self.members[bucket.start as usize..bucket.start as usize + bucket.len as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Key192;

    fn sizes_for(n: usize) -> Sizes {
        let s = crate::sizing::growth_schedule(n);
        Sizes::plan(n, s.mult_offset, s.mult_slots).unwrap()
    }

    #[test]
    fn populations_and_members_agree() {
        let keys: Vec<Key192> = (1..=500u64).map(|i| Key192::new(i * 977, i, 0)).collect();
        let sizes = sizes_for(keys.len());
        let buckets = Buckets::build(&keys, &sizes).unwrap();

        assert_eq!(buckets.info.len(), sizes.offsets as usize);
        let total: usize = buckets.info.iter().map(|b| b.len as usize).sum();
        assert_eq!(total, keys.len());

        for b in &buckets.info {
            let members = buckets.members(b);
            assert_eq!(members.len(), b.len as usize);
            for &j in members {
                assert_eq!(
                    keys[j as usize].reduce(sizes.offsets, sizes.offset_shifts),
                    b.index
                );
            }
        }
    }

    #[test]
    fn every_key_appears_exactly_once() {
        let keys: Vec<Key192> = (1..=200u64).map(|i| Key192::new(i, i * 3, i * 7)).collect();
        let sizes = sizes_for(keys.len());
        let buckets = Buckets::build(&keys, &sizes).unwrap();

        let mut seen = vec![false; keys.len()];
        for b in &buckets.info {
            for &j in buckets.members(b) {
                assert!(!seen[j as usize]);
                seen[j as usize] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }
}
