#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that replays recorded sessions through the tile collector.

mod file_store;
mod scenario;

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tile_collector_core::{CollectorConfig, SceneSnapshot};
use tile_collector_system_persistence::{LoadOutcome, Vault};
use tile_collector_system_session::TileCollector;
use tile_collector_system_visitation::Verdict;
use tile_collector_world::query::{self, UnvisitedFilter};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{file_store::FileStore, scenario::Scenario};

#[derive(Debug, Parser)]
#[command(
    name = "tile-collector",
    about = "Track reachable and visited tiles from recorded agent movement"
)]
struct Cli {
    /// TOML file holding the persisted visited set
    #[arg(long, short, default_value = "tile-collector-store.toml")]
    store: PathBuf,
    /// Optional TOML file with collector tunables
    #[arg(long, short)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Replay a scenario tick by tick and persist what was visited
    Replay {
        /// Scenario TOML file
        scenario: PathBuf,
        /// Only count unvisited tiles within this many steps of the agent (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        radius: u32,
        /// End with an emergency flush instead of a clean stop
        #[arg(long)]
        abrupt: bool,
    },
    /// Verify the persisted visited set and summarise it per plane
    Stats,
    /// Erase the persisted visited set
    Reset,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Replay {
            ref scenario,
            radius,
            abrupt,
        } => replay(&cli, scenario, radius, abrupt),
        CliCommand::Stats => stats(&cli.store),
        CliCommand::Reset => reset(&cli.store),
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tile_collector=info"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<CollectorConfig> {
    let Some(path) = path else {
        return Ok(CollectorConfig::default());
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config at {}", path.display()))
}

fn replay(cli: &Cli, scenario_path: &Path, radius: u32, abrupt: bool) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let contents = fs::read_to_string(scenario_path)
        .with_context(|| format!("failed to read scenario at {}", scenario_path.display()))?;
    let scenario = Scenario::from_toml(&contents)?;
    let scene = scenario.scene()?;
    let scene: &dyn SceneSnapshot = &scene;

    let mut collector = TileCollector::new(config, FileStore::open(&cli.store)?);
    let first_frame = scenario.ticks.first().map(|tick| scenario.frame(tick));
    let loaded = collector.start(first_frame.as_ref(), Some(scene));
    info!(outcome = ?loaded, "replay starting");

    let mut last_position = None;
    let mut rejected = 0usize;
    for tick in &scenario.ticks {
        if let Some(event) = tick.host {
            let _ = collector.on_host_state(event.into());
        }
        let Some(report) = collector.tick(&scenario.frame(tick), Some(scene)) else {
            continue;
        };
        if !matches!(report.visit.verdict, Verdict::Recorded { .. }) {
            rejected += 1;
        }
        last_position = Some(report.position);
    }

    let (visited, reachable, walkable, unvisited) = collector.with_world(|world| {
        let filter = UnvisitedFilter {
            plane: Some(scenario.plane),
            within: last_position.map(|position| (position, radius)),
        };
        (
            query::visited(world).len(),
            query::reachable(world).len(),
            query::walkable(world).len(),
            query::unvisited_reachable(world, filter).len(),
        )
    });
    println!("ticks replayed:       {}", scenario.ticks.len());
    println!("reports not recorded: {rejected}");
    println!("visited tiles:        {visited}");
    println!("reachable tiles:      {reachable}");
    println!("walkable tiles:       {walkable}");
    println!("unvisited reachable:  {unvisited}");
    println!(
        "explored:             {:.1}%",
        collector.exploration_percentage()
    );

    let saved = if abrupt {
        collector.emergency_flush_handle().flush()
    } else {
        collector.stop()
    };
    let saved = saved.context("failed to persist visited tiles")?;
    println!("persisted:            {saved:?}");
    Ok(())
}

fn stats(store: &Path) -> Result<()> {
    let vault = Vault::new(FileStore::open(store)?);
    let outcome = vault.load().context("failed to load visited tiles")?;

    let (label, skipped) = match &outcome {
        LoadOutcome::Empty => ("empty", 0),
        LoadOutcome::Unverified { skipped, .. } => ("unverified (no digest)", *skipped),
        LoadOutcome::Verified { skipped, .. } => ("verified", *skipped),
        LoadOutcome::Tampered { reason } => {
            println!("tampered ({reason:?}); persisted keys erased");
            return Ok(());
        }
    };

    let tiles = outcome.into_tiles();
    let mut per_plane: BTreeMap<u8, usize> = BTreeMap::new();
    for tile in &tiles {
        *per_plane.entry(tile.plane()).or_default() += 1;
    }

    println!("store:          {label}");
    println!("visited tiles:  {}", tiles.len());
    println!("skipped:        {skipped}");
    for (plane, count) in per_plane {
        println!("  plane {plane}:      {count}");
    }
    Ok(())
}

fn reset(store: &Path) -> Result<()> {
    let vault = Vault::new(FileStore::open(store)?);
    vault.erase().context("failed to erase visited tiles")?;
    println!("visited tiles erased from {}", store.display());
    Ok(())
}
