mod bench;

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use kestrel_core::Position;
use kestrel_engine::{Engine, EngineConfig, SearchInfo, SearchLimits, SearchResult};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Chess game-tree search", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search one position and print the best move
    Analyse(AnalyseArgs),
    /// Search a fixed set of positions and report nodes per second
    Bench(BenchArgs),
}

#[derive(Args, Debug)]
struct EngineArgs {
    /// Search threads
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Transposition table size in MB
    #[arg(long, default_value_t = 16)]
    hash: usize,
}

impl EngineArgs {
    fn build(&self) -> Result<Engine> {
        let config = EngineConfig {
            hash_mb: self.hash,
            threads: self.threads,
            ..EngineConfig::default()
        };
        Engine::new(config).context("invalid engine options")
    }
}

#[derive(Args, Debug)]
struct AnalyseArgs {
    /// Position to search, as FEN (defaults to the starting position)
    #[arg(long)]
    fen: Option<String>,

    /// Moves in UCI notation played from the position before searching
    #[arg(long, num_args = 1..)]
    moves: Vec<String>,

    #[arg(long)]
    depth: Option<u8>,

    /// Fixed time per move in milliseconds
    #[arg(long)]
    movetime: Option<u64>,

    #[arg(long)]
    nodes: Option<u64>,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Args, Debug)]
struct BenchArgs {
    #[arg(long, default_value_t = bench::DEFAULT_DEPTH)]
    depth: u8,

    #[command(flatten)]
    engine: EngineArgs,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!(command = ?cli.command, "kestrel starting");
    match cli.command {
        Command::Analyse(args) => analyse(&args),
        Command::Bench(args) => bench::run(&args.engine.build()?, args.depth),
    }
}

fn analyse(args: &AnalyseArgs) -> Result<()> {
    let mut pos = match &args.fen {
        Some(fen) => Position::from_fen(fen).with_context(|| format!("cannot parse FEN {fen:?}"))?,
        None => Position::startpos(),
    };
    for mv in &args.moves {
        pos.play_uci(mv).with_context(|| format!("cannot play {mv} in {}", pos.fen()))?;
    }

    let limits = SearchLimits {
        depth: args.depth,
        nodes: args.nodes,
        movetime: args.movetime.map(Duration::from_millis),
        ..SearchLimits::default()
    };
    if limits.depth.is_none() && limits.nodes.is_none() && limits.movetime.is_none() {
        bail!("give at least one of --depth, --movetime or --nodes");
    }

    let engine = args.engine.build()?;
    let result = engine.search(&pos, &limits, print_info).context("nothing to search")?;
    print_bestmove(&result);
    Ok(())
}

pub(crate) fn format_pv(pv: &[kestrel_core::Move]) -> String {
    pv.iter().map(|m| m.to_uci()).collect::<Vec<_>>().join(" ")
}

fn print_info(info: &SearchInfo<'_>) {
    println!(
        "info depth {} seldepth {} score {} nodes {} nps {} hashfull {} time {} pv {}",
        info.depth,
        info.seldepth,
        info.score,
        info.nodes,
        info.nps,
        info.hashfull,
        info.elapsed.as_millis(),
        format_pv(info.pv)
    );
}

fn print_bestmove(result: &SearchResult) {
    match result.ponder_move {
        Some(ponder) => println!("bestmove {} ponder {}", result.best_move, ponder),
        None => println!("bestmove {}", result.best_move),
    }
}
