//! `build-perfect-hash`: build and check a perfect spatial hash table from
//! a key file or a generated key set.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};

use spatial_hash::{
    remove_duplicates, util::generate_keys, BuildParams, Error, Key128, Key192, KeyWidth,
    SpatialHash,
};

#[derive(Parser, Debug)]
#[command(
    name = "build-perfect-hash",
    about = "Build a perfect spatial hash table for a static set of wide keys"
)]
struct Args {
    /// Key width in bits (128 or 192).
    #[arg(long, default_value_t = 192)]
    width: u32,

    /// File with one hexadecimal key per line.
    #[arg(long, conflicts_with = "random")]
    input: Option<PathBuf>,

    /// Generate this many uniform random keys instead of reading a file.
    #[arg(long)]
    random: Option<usize>,

    /// Seed for the offset search (and for --random); defaults to the wall
    /// clock.
    #[arg(long)]
    seed: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Suppress the progress line.
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    match args.width {
        128 => run::<Key128>(&args),
        192 => run::<Key192>(&args),
        other => bail!("unsupported key width {other}; expected 128 or 192"),
    }
}

/// `RUST_LOG` still wins; the flag only raises the default filter.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run<K: KeyWidth>(args: &Args) -> Result<()> {
    let mut keys: Vec<K> = match (&args.input, args.random) {
        (Some(path), _) => load_keys(path)?,
        (None, Some(n)) => generate_keys(n, args.seed.unwrap_or(0)),
        (None, None) => bail!("provide --input FILE or --random N"),
    };

    let loaded = keys.len();
    let unique = remove_duplicates(&mut keys);
    if unique < loaded {
        println!("dropped {} duplicate keys", loaded - unique);
    }
    if keys.is_empty() {
        return Err(Error::EmptyKeySet.into());
    }

    let params = BuildParams {
        seed: args.seed,
        print_progress: !args.quiet,
        ..BuildParams::default()
    };
    let table =
        SpatialHash::build(&keys, params).context("building the perfect hash table failed")?;

    println!("tables tested OK");
    println!("keys:           {}", table.len());
    println!("key width:      {} bits", K::BITS);
    println!(
        "primary table:  {} slots, {} occupied",
        table.slots(),
        table.len()
    );
    println!("offset table:   {} entries", table.offset_entries());
    println!(
        "attempts:       {} ({} probes, {} backtracks)",
        table.stats().attempts,
        table.stats().probes,
        table.stats().backtracks
    );
    println!(
        "buckets:        {} multi-key, largest population {}, {} keys placed in the tail",
        table.stats().multi_buckets,
        table.stats().max_population,
        table.stats().tail_keys
    );
    println!("seed:           {}", table.seed());
    Ok(())
}

fn load_keys<K: KeyWidth>(path: &PathBuf) -> Result<Vec<K>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading keys from {}", path.display()))?;
    let mut keys = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let limbs = parse_hex_limbs(line)
            .with_context(|| format!("{}:{}: bad key {line:?}", path.display(), lineno + 1))?;
        let key = K::from_limbs(limbs)
            .with_context(|| format!("{}:{}: key too wide for {} bits", path.display(), lineno + 1, K::BITS))?;
        keys.push(key);
    }
    Ok(keys)
}

/// Parse a hex string of up to 48 digits into little-endian limbs.
fn parse_hex_limbs(s: &str) -> Result<[u64; 3]> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() || digits.len() > 48 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        bail!("expected up to 48 hex digits");
    }
    let mut limbs = [0u64; 3];
    let mut end = digits.len();
    for limb in &mut limbs {
        if end == 0 {
            break;
        }
        let start = end.saturating_sub(16);
        *limb = u64::from_str_radix(&digits[start..end], 16)?;
        end = start;
    }
    Ok(limbs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing_fills_limbs_little_endian() {
        assert_eq!(parse_hex_limbs("ff").unwrap(), [0xff, 0, 0]);
        assert_eq!(
            parse_hex_limbs("0x0123456789abcdef0011223344556677").unwrap(),
            [0x0011223344556677, 0x0123456789abcdef, 0]
        );
        assert_eq!(
            parse_hex_limbs("a0123456789abcdef0011223344556677").unwrap(),
            [0x0011223344556677, 0x0123456789abcdef, 0xa]
        );
        assert!(parse_hex_limbs("").is_err());
        assert!(parse_hex_limbs("xyz").is_err());
        assert!(parse_hex_limbs(&"f".repeat(49)).is_err());
    }
}
