//! Key generation and small internal helpers.

use std::time::Instant;

use colored::Colorize;
use log::trace;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::dedup::remove_duplicates;
use crate::error::Error;
use crate::key::KeyWidth;

/// Generate `n` distinct non-zero keys from a seeded stream.
pub fn generate_keys<K: KeyWidth>(n: usize, seed: u64) -> Vec<K> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    loop {
        let mut keys: Vec<K> = (0..n).map(|_| K::random(&mut rng)).collect();
        remove_duplicates(&mut keys);
        if keys.len() == n {
            return keys;
        }
        log::warn!("duplicate keys generated, retrying");
    }
}

pub(crate) fn log_duration(name: &str, start: Instant) -> Instant {
    trace!(
        "{}",
        format!("{name:>12}: {:>9.2?}", start.elapsed()).bold()
    );
    Instant::now()
}

/// Seconds since the epoch, the default solver seed.
pub(crate) fn clock_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Zeroed `u32` storage with allocation failure reported as an [`Error`].
pub(crate) fn try_zeroed(len: usize, what: &'static str) -> Result<Vec<u32>, Error> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|source| Error::AllocFailure { what, source })?;
    v.resize(len, 0);
    Ok(v)
}
