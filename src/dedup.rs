//! Duplicate removal over a freshly loaded key array.
//!
//! A power-of-two side table chains key indices on the low limb; a full
//! limb comparison against earlier members of the same chain decides
//! whether a key is new. Duplicates are zeroed in place and the survivors
//! compacted to a prefix. The all-zero key is dropped as well: it is
//! reserved as the primary table's vacancy sentinel.

use crate::key::KeyWidth;

/// Deduplicate `keys` in place. Returns the number of survivors.
pub fn remove_duplicates<K: KeyWidth>(keys: &mut Vec<K>) -> usize {
    if keys.len() < 2 {
        keys.retain(|k| !k.is_zero());
        return keys.len();
    }

    let table_len = keys.len().next_power_of_two();
    let mask = (table_len - 1) as u64;

    let mut counts = vec![0u32; table_len];
    for k in keys.iter() {
        counts[(k.low() & mask) as usize] += 1;
    }

    let mut starts = vec![0u32; table_len + 1];
    for i in 0..table_len {
        starts[i + 1] = starts[i] + counts[i];
    }

    let mut chains = vec![0u32; keys.len()];
    let mut filled = vec![0u32; table_len];
    for i in 0..keys.len() {
        if keys[i].is_zero() {
            continue;
        }
        let b = (keys[i].low() & mask) as usize;
        let chain = &chains[starts[b] as usize..(starts[b] + filled[b]) as usize];
        if chain.iter().any(|&j| keys[j as usize] == keys[i]) {
            keys[i] = K::default();
        } else {
            chains[(starts[b] + filled[b]) as usize] = i as u32;
            filled[b] += 1;
        }
    }

    keys.retain(|k| !k.is_zero());
    keys.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{Key128, Key192};

    #[test]
    fn duplicates_collapse_to_one() {
        let mut keys = vec![
            Key192::new(1, 0, 0),
            Key192::new(2, 5, 0),
            Key192::new(1, 0, 0),
            Key192::new(3, 0, 9),
            Key192::new(2, 5, 0),
            Key192::new(1, 0, 0),
        ];
        assert_eq!(remove_duplicates(&mut keys), 3);
        assert_eq!(keys.len(), 3);
        keys.sort_by_key(|k| k.lo);
        assert_eq!(keys[0], Key192::new(1, 0, 0));
        assert_eq!(keys[1], Key192::new(2, 5, 0));
        assert_eq!(keys[2], Key192::new(3, 0, 9));
    }

    #[test]
    fn same_low_limb_different_high_limbs_survive() {
        // All collide in the side table; only true duplicates go.
        let mut keys = vec![
            Key128::new(7, 1),
            Key128::new(7, 2),
            Key128::new(7, 3),
            Key128::new(7, 1),
        ];
        assert_eq!(remove_duplicates(&mut keys), 3);
    }

    #[test]
    fn zero_key_is_dropped() {
        let mut keys = vec![
            Key192::default(),
            Key192::new(4, 0, 0),
            Key192::default(),
        ];
        assert_eq!(remove_duplicates(&mut keys), 1);
        assert_eq!(keys[0], Key192::new(4, 0, 0));
    }

    #[test]
    fn distinct_input_is_untouched() {
        let mut keys: Vec<Key192> = (1..=100).map(|i| Key192::new(i, i * i, 0)).collect();
        let before = keys.clone();
        assert_eq!(remove_duplicates(&mut keys), 100);
        assert_eq!(keys, before);
    }
}
