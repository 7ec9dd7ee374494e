// Headless city runner.
//
// Builds a city from an optional JSON config, generates a map, places one
// industrial and one residential zone on the first buildable footprints it
// finds, then steps the requested number of weeks, logging each published
// census. Useful for eyeballing growth curves and for replaying a seed.
//
// Logging goes through `tracing`; set `RUST_LOG` to change verbosity (for
// example `RUST_LOG=gridopolis_sim=debug` to see every zone change).

use clap::Parser;
use gridopolis_sim::city::CityModel;
use gridopolis_sim::command::{CityCommand, CommandOutcome};
use gridopolis_sim::config::CityConfig;
use gridopolis_sim::error::CityError;
use gridopolis_sim::notify::ModelListener;
use gridopolis_sim::time::{SimTime, TimeInterval};
use gridopolis_sim::types::{GridLocation, GridRectangle, ZoneKind};
use gridopolis_sim::zone::Census;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Headless Gridopolis runner
#[derive(Parser, Debug)]
#[command(name = "gridopolis")]
#[command(about = "Generate a map, seed two zones, and simulate a number of weeks")]
struct Args {
    /// JSON config file; missing fields take their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// City seed, overriding the config
    #[arg(long)]
    seed: Option<u64>,

    /// Grid width, overriding the config
    #[arg(long)]
    width: Option<i32>,

    /// Grid height, overriding the config
    #[arg(long)]
    height: Option<i32>,

    /// Weeks to simulate
    #[arg(long, default_value_t = 52)]
    weeks: u32,
}

/// Logs each published census along with the week it closed.
#[derive(Default)]
struct CensusLog {
    now: Option<SimTime>,
}

impl ModelListener for CensusLog {
    fn time_changed(&mut self, now: SimTime) {
        self.now = Some(now);
    }

    fn census_changed(&mut self, census: &Census) {
        let week = self.now.map(|t| t.time_data().to_string());
        tracing::info!(
            week = week.as_deref().unwrap_or("start"),
            residential = census.residential,
            industrial = census.industrial,
            "census"
        );
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gridopolis_sim=info,gridopolis=info")),
        )
        .init();

    let args = Args::parse();
    if let Err(err) = run(&args) {
        tracing::error!(%err, "run failed");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), CityError> {
    let mut config = match &args.config {
        Some(path) => CityConfig::load(path)?,
        None => CityConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(width) = args.width {
        config.grid_width = width;
    }
    if let Some(height) = args.height {
        config.grid_height = height;
    }
    config.generate_map = true;

    let mut city = CityModel::new(config)?;
    city.add_model_listener(Box::<CensusLog>::default());

    for kind in [ZoneKind::Industrial, ZoneKind::Residential] {
        match first_buildable(&city) {
            Some(center) => {
                if let CommandOutcome::ZonePlaced(id) =
                    city.apply(CityCommand::Zone { kind, center })?
                {
                    tracing::info!(%id, %kind, %center, "seeded zone");
                }
            }
            None => tracing::warn!(%kind, "no buildable footprint left"),
        }
    }

    if args.weeks > 0 {
        city.apply(CityCommand::Step {
            count: args.weeks,
            interval: TimeInterval::Week,
        })?;
    }

    let census = city.census();
    tracing::info!(
        seed = city.seed(),
        time = %city.current_time(),
        zones = city.zones().count(),
        residential = census.residential,
        industrial = census.industrial,
        "run complete"
    );
    Ok(())
}

/// Center of the first 3x3 footprint that is entirely buildable, scanning
/// row by row from the top left.
fn first_buildable(city: &CityModel) -> Option<GridLocation> {
    let grid = city.grid();
    (1..grid.height() - 1)
        .flat_map(|y| (1..grid.width() - 1).map(move |x| GridLocation::new(x, y)))
        .find(|&center| city.is_buildable(GridRectangle::footprint(center)))
}
