use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use tdl_2048::config::parse_patterns;
use tdl_2048::ntuple::{read_record, Network, WeightBudget, DEFAULT_BUDGET_BYTES};

#[derive(Debug, Parser)]
#[command(name = "weights", about = "Inspect and check n-tuple weight files")]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,

    /// Weight memory ceiling in bytes
    #[arg(long, global = true, default_value_t = DEFAULT_BUDGET_BYTES)]
    budget: usize,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// List every feature record: name, size, non-zero count and value range
    Inspect {
        file: PathBuf,
    },
    /// Check that a file loads into the given pattern set with nothing left over
    Verify {
        file: PathBuf,
        /// Comma separated hex cell lists, e.g. "012345,456789"
        #[arg(long)]
        patterns: String,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    match &args.cmd {
        Cmd::Inspect { file } => inspect(file, args.budget),
        Cmd::Verify { file, patterns } => verify(file, patterns, args.budget),
    }
}

fn inspect(file: &Path, budget: usize) -> anyhow::Result<()> {
    let mut input = BufReader::new(fs::File::open(file).with_context(|| format!("opening {}", file.display()))?);
    let mut budget = WeightBudget::new(budget);
    let mut records = 0usize;
    while let Some((name, table)) = read_record(&mut input, &mut budget)? {
        let values = table.as_slice();
        let nonzero = values.iter().filter(|&&w| w != 0.0).count();
        let (min, max) = values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &w| (lo.min(w), hi.max(w)));
        println!(
            "{name}\t{} weights\t{nonzero} non-zero ({:.2}%)\tmin {min}\tmax {max}",
            values.len(),
            nonzero as f64 * 100.0 / values.len().max(1) as f64
        );
        records += 1;
    }
    println!("{records} record(s), {} bytes of weights", budget.allocated() * 4);
    Ok(())
}

fn verify(file: &Path, patterns: &str, budget: usize) -> anyhow::Result<()> {
    let patterns = parse_patterns(patterns)?;
    let mut net = Network::with_patterns(WeightBudget::new(budget), &patterns, 8)?;
    let mut input = BufReader::new(fs::File::open(file).with_context(|| format!("opening {}", file.display()))?);
    net.read_from(&mut input).with_context(|| format!("loading {}", file.display()))?;
    let mut rest = Vec::new();
    input.read_to_end(&mut rest)?;
    if !rest.is_empty() {
        anyhow::bail!("{} trailing byte(s) after {} feature(s)", rest.len(), net.len());
    }
    for p in net.patterns() {
        println!("ok\t{}", p.name());
    }
    Ok(())
}
