//! The size-search loop and the offset solver.
//!
//! The solver is deliberately single-threaded: it mutates the primary table
//! non-monotonically (backtracking clears slots), so the parallelism lives
//! in the preparatory passes and the verifier instead.

use std::io::Write as _;
use std::time::Instant;

use log::{info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::buckets::Buckets;
use crate::error::Error;
use crate::key::{KeyTable, KeyWidth};
use crate::sizing::{growth_schedule, SizePlan, Sizes};
use crate::sort_buckets::sort_by_population;
use crate::stats::BuildStats;
use crate::util::{clock_seed, log_duration, try_zeroed};
use crate::verify;
use crate::watchdog::Watchdog;
use crate::{BuildParams, SpatialHash};

enum Outcome {
    Solved,
    Stalled,
}

impl<K: KeyWidth> SpatialHash<K> {
    /// Build the two tables for `keys`, retrying at larger sizes until the
    /// solver converges. The input must already be deduplicated; the
    /// all-zero key is rejected.
    pub fn build(keys: &[K], params: BuildParams) -> Result<Self, Error> {
        let overall = Instant::now();
        if keys.par_iter().any(|k| k.is_zero()) {
            return Err(Error::ZeroKey);
        }

        let n = keys.len();
        let schedule = growth_schedule(n);
        let (wd_start, wd_repeat) = params
            .watchdog
            .unwrap_or((schedule.watchdog_start, schedule.watchdog_repeat));
        let seed = params.seed.unwrap_or_else(clock_seed);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut plan = SizePlan::new(
            n,
            params.mult_offset.unwrap_or(schedule.mult_offset),
            params.mult_slots.unwrap_or(schedule.mult_slots),
        );
        let mut stats = BuildStats::default();

        let built = loop {
            stats.attempts += 1;
            let sizes = plan.current()?;

            let start = Instant::now();
            let mut buckets = Buckets::build(keys, &sizes)?;
            let start = log_duration("build bucket", start);
            sort_by_population(&mut buckets.info, buckets.max_len);
            let start = log_duration("sort buckets", start);
            stats.max_population = buckets.max_len;
            report_sizes::<K>(&sizes, &buckets, n);

            let mut offsets = try_zeroed(sizes.offsets as usize, "offset table")?;
            let mut table = KeyTable::new(sizes.slots as usize)?;

            let watchdog = Watchdog::arm(wd_start, wd_repeat);
            let outcome = solve(
                keys,
                &buckets,
                &sizes,
                &mut offsets,
                &mut table,
                &mut rng,
                &watchdog,
                params.print_progress,
                &mut stats,
            );
            drop(watchdog);
            log_duration("find offsets", start);

            match outcome {
                Outcome::Solved => {
                    break SpatialHash {
                        n,
                        seed,
                        sizes,
                        offsets,
                        table,
                        stats,
                    }
                }
                Outcome::Stalled => {
                    warn!(
                        "attempt {} did not converge, growing the offset table",
                        stats.attempts
                    );
                    plan.grow();
                }
            }
        };

        let start = Instant::now();
        verify::check(&built, keys)?;
        log_duration("test tables", start);
        log_duration("total build", overall);
        Ok(built)
    }
}

/// One solver run over a fixed pair of table sizes.
#[allow(clippy::too_many_arguments)]
fn solve<K: KeyWidth>(
    keys: &[K],
    buckets: &Buckets,
    sizes: &Sizes,
    offsets: &mut [u32],
    table: &mut KeyTable<K>,
    rng: &mut ChaCha8Rng,
    watchdog: &Watchdog,
    print_progress: bool,
    stats: &mut BuildStats,
) -> Outcome {
    let m = sizes.slots;
    // An offset word can only express this many consecutive candidates.
    let limit = (u32::MAX % m) + 1;
    let n = keys.len() as u64;

    let largest = buckets.info.first().map(|b| b.len as usize).unwrap_or(0);
    let mut slot_hashes: Vec<u32> = Vec::with_capacity(largest);
    let mut slot_idxs: Vec<u32> = Vec::with_capacity(largest);

    let mut i = 0usize;
    let mut backtracking = false;
    let mut last_offset = 0u32;
    let mut settled = 0u64;
    let mut trigger = 0u32;

    while i < buckets.info.len() && buckets.info[i].len > 1 {
        if watchdog.abort_requested() {
            return Outcome::Stalled;
        }
        watchdog.note_bucket(i as u32);

        let bucket = buckets.info[i];
        let members = buckets.members(&bucket);
        slot_hashes.clear();
        slot_hashes.extend(
            members
                .iter()
                .map(|&j| keys[j as usize].reduce(m, sizes.slot_shifts)),
        );

        let mut offset = if backtracking {
            // Resume right after the choice that led into the dead end.
            let next = last_offset + 1;
            if next == m {
                0
            } else {
                next
            }
        } else {
            rng.random::<u32>() % m
        };
        backtracking = false;

        let mut tries = 0u32;
        let mut placed = false;
        while tries < limit {
            stats.probes += 1;
            if try_offset(table, keys, members, &slot_hashes, &mut slot_idxs, offset, m) {
                placed = true;
                break;
            }
            tries += 1;
            offset += 1;
            if offset == m {
                offset = 0;
            }
        }

        if placed {
            offsets[bucket.index as usize] = offset;
            settled += bucket.len as u64;
            if print_progress {
                if (trigger & 0xffff) == 0 {
                    print!(
                        "\rprogress: {:6.2} %, bucket population: {}",
                        settled as f64 / n as f64 * 100.0,
                        bucket.len
                    );
                    let _ = std::io::stdout().flush();
                }
                trigger += 1;
            }
            i += 1;
        } else {
            stats.backtracks += 1;
            if i == 0 {
                // Nothing earlier to unwind; this table size is hopeless.
                return Outcome::Stalled;
            }
            let prev = buckets.info[i - 1];
            last_offset = offsets[prev.index as usize];
            for &j in buckets.members(&prev) {
                let z = keys[j as usize].reduce(m, sizes.slot_shifts);
                let mut idx = z + last_offset;
                if idx >= m {
                    idx -= m;
                }
                table.clear(idx as usize);
            }
            offsets[prev.index as usize] = 0;
            settled -= prev.len as u64;
            i -= 1;
            backtracking = true;
        }
    }

    // Only singletons and empties remain; nothing left worth supervising.
    watchdog.disarm();
    stats.multi_buckets = i as u32;
    stats.tail_keys = 0;

    let mut cursor = 0usize;
    while i < buckets.info.len() && buckets.info[i].len == 1 {
        let bucket = buckets.info[i];
        let j = buckets.members(&bucket)[0];
        let key = &keys[j as usize];
        while cursor < m as usize && !table.is_empty_slot(cursor) {
            cursor += 1;
        }
        if cursor == m as usize {
            return Outcome::Stalled;
        }
        table.assign(cursor, key);
        let z = key.reduce(m, sizes.slot_shifts);
        offsets[bucket.index as usize] = ((m - z) + cursor as u32) % m;
        stats.tail_keys += 1;
        i += 1;
    }

    if print_progress {
        println!("\rprogress: 100.00 %                           ");
    }

    Outcome::Solved
}

/// Probe one offset for a whole bucket: a read-only vacancy pass first,
/// then the writes, undone if two members of this bucket collide with each
/// other.
fn try_offset<K: KeyWidth>(
    table: &mut KeyTable<K>,
    keys: &[K],
    members: &[u32],
    slot_hashes: &[u32],
    slot_idxs: &mut Vec<u32>,
    offset: u32,
    m: u32,
) -> bool {
    slot_idxs.clear();
    for &z in slot_hashes {
        let mut idx = z + offset;
        if idx >= m {
            idx -= m;
        }
        if !table.is_empty_slot(idx as usize) {
            return false;
        }
        slot_idxs.push(idx);
    }

    for (pos, (&idx, &j)) in slot_idxs.iter().zip(members).enumerate() {
        if !table.is_empty_slot(idx as usize) {
            for &undo in &slot_idxs[..pos] {
                table.clear(undo as usize);
            }
            return false;
        }
        table.assign(idx as usize, &keys[j as usize]);
    }
    true
}

fn report_sizes<K: KeyWidth>(sizes: &Sizes, buckets: &Buckets, n: usize) {
    const GB: f64 = (1u64 << 30) as f64;
    let used = buckets.info.iter().filter(|b| b.len > 0).count();
    info!(
        "offset table: {} entries ({:.6} GB), {:.2} % of the key count",
        sizes.offsets,
        sizes.offsets as f64 * 4.0 / GB,
        sizes.offsets as f64 / n.max(1) as f64 * 100.0
    );
    info!(
        "primary table: {} slots of {} lanes ({:.6} GB)",
        sizes.slots,
        K::LANES,
        sizes.slots as f64 * (K::LANES * 4) as f64 / GB
    );
    info!(
        "unused offset entries: {:.2} %",
        (sizes.offsets as usize - used) as f64 / sizes.offsets as f64 * 100.0
    );
}
