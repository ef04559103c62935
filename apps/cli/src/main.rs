#![deny(warnings)]

//! Headless CLI: batch statistics for a seed and a scripted autoplayer.

use anyhow::{bail, Context, Result};
use reel_core::{GameConfig, PlayerProfile, RngService, Stat};
use reel_econ::{run_batch, BatchStats};
use reel_runtime::{Session, SessionEvent};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Virtual time the autoplayer waits for any event before giving up.
const IDLE_LIMIT: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Stats,
    Play,
    Version,
}

#[derive(Debug)]
struct Args {
    command: Command,
    config: Option<String>,
    seed: u64,
    count: u64,
    rounds: u32,
    json: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        command: Command::Stats,
        config: None,
        seed: 12345,
        count: 10_000,
        rounds: 3,
        json: false,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "stats" => args.command = Command::Stats,
            "play" => args.command = Command::Play,
            "--version" => args.command = Command::Version,
            "--config" => args.config = it.next(),
            "--seed" => args.seed = parse_next(&mut it, "--seed")?,
            "--count" => args.count = parse_next(&mut it, "--count")?,
            "--rounds" => args.rounds = parse_next(&mut it, "--rounds")?,
            "--json" => args.json = true,
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(args)
}

fn parse_next<T: std::str::FromStr>(
    it: &mut impl Iterator<Item = String>,
    flag: &str,
) -> Result<T> {
    let raw = it.next().with_context(|| format!("{flag} needs a value"))?;
    raw.parse()
        .map_err(|_| anyhow::anyhow!("invalid value for {flag}: {raw}"))
}

fn load_config(path: Option<&str>) -> Result<GameConfig> {
    match path {
        Some(p) => GameConfig::load(p).with_context(|| format!("loading {p}")),
        None => Ok(GameConfig::default()),
    }
}

fn print_stats(stats: &BatchStats, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(stats)?);
        return Ok(());
    }
    println!(
        "Fish | count: {} | mean: {} | min: {} | max: {} | jackpots: {:.2}% | specials: {}",
        stats.count,
        stats.mean_price(),
        stats.min_price.unwrap_or_default(),
        stats.max_price.unwrap_or_default(),
        stats.jackpot_rate() * 100.0,
        stats.specials,
    );
    for (tier, n) in &stats.tiers {
        println!("Tier {tier} | {n}");
    }
    for id in stats.species.keys() {
        println!("Species {id} | {:.1}%", stats.species_share(id) * 100.0);
    }
    Ok(())
}

fn stats(cfg: &GameConfig, args: &Args) -> Result<()> {
    let gear = &cfg.starting_gear;
    let player = PlayerProfile::new(gear.rod.clone(), gear.lure.clone());
    let lure = cfg
        .lure(&gear.lure)
        .with_context(|| format!("starting lure {} missing", gear.lure))?;
    let mut rng = RngService::new(args.seed);
    let batch = run_batch(cfg, &player, lure, &mut rng, args.count);
    print_stats(&batch, args.json)
}

/// Accepts every offer, fights it and sells whatever lands, until `rounds`
/// rounds have ended. Between rounds spends the balance on strength.
async fn autoplay(cfg: GameConfig, args: &Args) -> Result<()> {
    let session = Session::new(cfg, args.seed)?;
    let mut rx = session.subscribe();
    session.lure_enter().await;

    let mut ended = 0;
    while ended < args.rounds {
        let event = match tokio::time::timeout(IDLE_LIMIT, rx.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(RecvError::Lagged(n))) => {
                warn!(skipped = n, "autoplayer lagged behind events");
                continue;
            }
            Ok(Err(RecvError::Closed)) => break,
            Err(_) => {
                warn!("no events for an hour of game time, stopping");
                break;
            }
        };
        match event {
            SessionEvent::Offered { socket, fish, .. } => {
                if let Err(e) = session.accept_offer(socket, fish).await {
                    warn!(error = %e, "offer slipped away");
                    continue;
                }
                match session.resolve_fight(socket).await {
                    Ok(true) => {
                        if let Err(e) = session.sell_socket(socket).await {
                            warn!(error = %e, "sale refused");
                            if let Err(e) = session.release_hooked(socket).await {
                                warn!(error = %e, "unsold fish could not be released");
                            }
                        }
                    }
                    Ok(false) => info!(socket = %socket, "fish escaped"),
                    Err(e) => warn!(error = %e, "fight failed"),
                }
            }
            SessionEvent::RoundEnded { outcome, summary } => {
                ended += 1;
                println!(
                    "Round {} | {:?} | next goal: {} | balance: {}",
                    ended, outcome, summary.goal, summary.balance
                );
                while session.upgrade_stat(Stat::Strength).await.is_ok() {}
            }
            _ => {}
        }
    }
    session.lure_exit().await;

    let player = session.player().await;
    let summary = session.round_summary().await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&session.history().await)?);
    }
    println!(
        "Done | level: {} | balance: {} | strength: {} | bites: {:?}",
        summary.level,
        player.balance,
        player.stats.strength,
        session.bite_stats().await,
    );
    Ok(())
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args()?;
    info!(?args, "starting CLI");

    match args.command {
        Command::Version => {
            println!("reel {} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_SHA"));
            Ok(())
        }
        Command::Stats => {
            let cfg = load_config(args.config.as_deref())?;
            stats(&cfg, &args)
        }
        Command::Play => {
            let cfg = load_config(args.config.as_deref())?;
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()?;
            rt.block_on(autoplay(cfg, &args))
        }
    }
}
