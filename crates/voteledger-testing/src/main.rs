use anyhow::Result;
use clap::Parser;
use log::{error, info};

use crate::mining_bound::MiningBound;
use crate::reload_round_trip::ReloadRoundTrip;
use crate::tamper_detection::TamperDetection;
use crate::traits::Test;

mod harness;
mod mining_bound;
mod reload_round_trip;
mod tamper_detection;
mod traits;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Tamper with each stored block and check detection
    #[arg(long, default_value_t = false)]
    tamper_detection: bool,

    /// Check the mining attempt guard
    #[arg(long, default_value_t = false)]
    mining_bound: bool,

    /// Reload a chain from disk and compare
    #[arg(long, default_value_t = false)]
    round_trip: bool,

    /// Run every scenario
    #[arg(long, default_value_t = false)]
    all: bool,

    /// How many votes?
    #[arg(long, default_value_t = 5)]
    n_votes: usize,

    /// Mining difficulty for the scenario chains
    #[arg(long, default_value_t = 2)]
    difficulty: usize,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .init();

    let args = Args::parse();

    let mut scenarios: Vec<(&str, Box<dyn Test>)> = Vec::new();
    if args.all || args.tamper_detection {
        scenarios.push(("tamper_detection", Box::new(TamperDetection::new(args.difficulty))));
    }
    if args.all || args.mining_bound {
        scenarios.push(("mining_bound", Box::new(MiningBound::new(args.difficulty))));
    }
    if args.all || args.round_trip {
        scenarios.push(("round_trip", Box::new(ReloadRoundTrip::new(args.difficulty))));
    }

    let mut failed = 0;
    for (name, scenario) in &scenarios {
        match scenario.run(args.n_votes) {
            Ok(()) => info!("{} passed", name),
            Err(e) => {
                error!("{} failed; error = {:?}", name, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} scenarios failed", failed, scenarios.len());
    }
    Ok(())
}
