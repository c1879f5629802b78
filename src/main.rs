use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use tdl_2048::agent::{Agent, GreedySlider, RandomPlacer, TdAgent};
use tdl_2048::config::AgentConfig;
use tdl_2048::engine;
use tdl_2048::episode::{load_episodes, save_episodes};
use tdl_2048::selfplay;
use tdl_2048::statistic::Statistic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Player {
    /// n-tuple network trained with TD(0)
    Td,
    /// largest immediate merge reward
    Greedy,
}

#[derive(Debug, Parser)]
#[command(name = "tdl-2048", about = "Train and evaluate 2048 players")]
struct Args {
    /// Number of episodes to play
    #[arg(long, default_value_t = 1000)]
    total: usize,

    /// Log a summary every this many episodes (0 = only at the end)
    #[arg(long, default_value_t = 0)]
    block: usize,

    /// Keep at most this many episodes in memory (0 = all)
    #[arg(long, default_value_t = 0)]
    limit: usize,

    /// Which player to run
    #[arg(long, value_enum, default_value_t = Player::Td)]
    player: Player,

    /// Player properties, e.g. "alpha=0.1 iso=8 load=w.bin save=w.bin"
    #[arg(long, default_value = "")]
    play: String,

    /// Environment properties, e.g. "seed=7"
    #[arg(long, default_value = "")]
    evil: String,

    /// Seed previous episodes from this log before playing
    #[arg(long)]
    load_episodes: Option<PathBuf>,

    /// Write the kept episodes to this log when done
    #[arg(long)]
    save_episodes: Option<PathBuf>,

    /// Log a summary over every kept episode when done
    #[arg(long)]
    summary: bool,

    /// Worker threads for parallel self-play (1 = play sequentially)
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Episodes played concurrently before the learner catches up
    #[arg(long, default_value_t = 64)]
    batch: u64,

    /// Suppress the progress bar
    #[arg(long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    engine::warm();

    let mut stat = Statistic::new(args.total, args.block, args.limit);
    if let Some(path) = &args.load_episodes {
        let episodes = load_episodes(path).with_context(|| format!("loading episodes from {}", path.display()))?;
        stat.preload(episodes);
    }

    let pb = progress(&args, stat.total() - stat.count());
    let start = Instant::now();
    if args.threads > 1 {
        run_parallel(&args, &mut stat, &pb)?;
    } else {
        run_sequential(&args, &mut stat, &pb)?;
    }
    pb.finish_and_clear();
    log::info!("played {} episode(s) in {:.1}s", stat.count(), start.elapsed().as_secs_f64());

    if args.summary {
        log::info!("summary\n{}", stat.summary());
    }
    if let Some(path) = &args.save_episodes {
        save_episodes(path, stat.episodes()).with_context(|| format!("saving episodes to {}", path.display()))?;
    }
    Ok(())
}

fn run_sequential(args: &Args, stat: &mut Statistic, pb: &ProgressBar) -> anyhow::Result<()> {
    let mut play: Box<dyn Agent> = match args.player {
        Player::Td => Box::new(TdAgent::new(&args.play)?),
        Player::Greedy => Box::new(GreedySlider::new(&args.play)?),
    };
    let mut evil = RandomPlacer::new(&args.evil)?;
    log::info!("{} ({}) vs {} ({})", play.name(), play.role(), evil.name(), evil.role());

    while !stat.is_finished() {
        let flag = format!("{}:{}", play.name(), evil.name());
        play.open_episode(&flag);
        evil.open_episode(&flag);
        let ep = stat.open_episode(&flag);
        let last = ep.run(play.as_mut(), &mut evil);
        let score = ep.score();
        play.close_episode(&last);
        evil.close_episode(&last);
        stat.close_episode(&last);
        pb.inc(1);
        pb.set_message(format!("last score: {score}"));
    }
    play.finalize()?;
    Ok(())
}

fn run_parallel(args: &Args, stat: &mut Statistic, pb: &ProgressBar) -> anyhow::Result<()> {
    if args.player != Player::Td {
        anyhow::bail!("parallel self-play needs --player td");
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()
        .context("building the rayon thread pool")?;

    let mut play = TdAgent::new(&args.play)?;
    let evil_cfg: AgentConfig = AgentConfig::with_defaults("", &args.evil);
    let first_seed = evil_cfg.seed()?.unwrap_or_else(rand::random);
    let alpha = play.alpha();
    let remaining = (stat.total() - stat.count()) as u64;
    log::info!("{} threads, batches of {}, first seed {first_seed}", args.threads, args.batch);

    selfplay::train_parallel(play.network_mut(), alpha, remaining, args.batch, first_seed, &args.evil, |ep| {
        let score = ep.score();
        stat.push(ep);
        pb.inc(1);
        pb.set_message(format!("last score: {score}"));
    })?;
    play.finalize()?;
    Ok(())
}

fn progress(args: &Args, len: usize) -> ProgressBar {
    if args.quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template("{spinner} {elapsed_precise} [{bar:40}] {pos}/{len} | {per_sec} | {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .tick_chars("⠁⠃⠇⠧⠷⠿⠻⠟⠯⠷⠧⠇⠃");
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
