use std::future::Future;

use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use voteledger::store::chain_to_json;
use voteledger::{
    Candidate, CandidateList, JsonFileStore, Ledger, LedgerConfig, LedgerResult, VoterRegistry,
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: LedgerConfig,

    /// Log at debug level.
    #[arg(long, short, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load the chain, creating a genesis block if none is stored.
    Init,

    /// Manage the candidate list.
    #[command(subcommand)]
    Candidate(CandidateCommand),

    /// Register a voter.
    Register {
        #[arg(long)]
        voter_id: String,

        #[arg(long)]
        name: String,

        #[arg(long, env = "VOTELEDGER_PASSWORD")]
        password: String,
    },

    /// Cast a vote as a registered voter.
    Vote {
        #[arg(long)]
        voter_id: String,

        #[arg(long, env = "VOTELEDGER_PASSWORD")]
        password: String,

        #[arg(long)]
        candidate: String,
    },

    /// Print vote counts per candidate.
    Tally,

    /// Verify the chain and report unreadable vote records.
    Audit,

    /// Print the chain as JSON.
    Show,

    /// Print how many registered voters have voted.
    Turnout,

    /// List registered voters and whether each has voted.
    Voters,

    /// Discard all votes and voters and start a fresh chain.
    Reset {
        /// Confirm that everything should be deleted.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[derive(Debug, Subcommand)]
enum CandidateCommand {
    /// Add a candidate.
    Add {
        #[arg(long)]
        id: String,

        #[arg(long)]
        name: String,
    },

    /// List candidates.
    List,
}

fn format_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

/// Opens the ledger on a blocking worker and runs `work` against it. Mining
/// started by either step is cancelled when `shutdown` resolves first.
async fn with_ledger<T, F>(config: &LedgerConfig, shutdown: impl Future, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Ledger<JsonFileStore>) -> LedgerResult<T> + Send + 'static,
{
    let token = CancellationToken::new();
    let mut ledger = Ledger::new(config.chain_store(), config).cancel_with(token.clone());
    let mut task = tokio::task::spawn_blocking(move || {
        ledger.initialize()?;
        work(&mut ledger)
    });

    let res = tokio::select! {
        res = &mut task => res,
        _ = shutdown => {
            warn!("interrupt received, cancelling mining");
            token.cancel();
            task.await
        }
    };

    Ok(res.context("ledger worker panicked")??)
}

pub(crate) async fn run(cli: Cli, shutdown: impl Future) -> Result<()> {
    let config = cli.config;
    info!(
        "Using data directory {}; difficulty = {}",
        config.data_dir.display(),
        config.difficulty
    );

    match cli.command {
        Command::Init => {
            let (len, report) = with_ledger(&config, shutdown, |ledger| {
                Ok((ledger.len(), ledger.is_chain_valid()))
            })
            .await?;
            println!("chain {} ready with {} blocks", config.chain_key, len);
            if let Some(failure) = report.first_failure {
                println!("warning: {}", failure);
            }
        }
        Command::Candidate(CandidateCommand::Add { id, name }) => {
            let path = config.candidates_path();
            let mut candidates = CandidateList::load(&path)?;
            candidates.add(Candidate::new(id, name))?;
            candidates.save(&path)?;
        }
        Command::Candidate(CandidateCommand::List) => {
            let candidates = CandidateList::load(&config.candidates_path())?;
            if candidates.is_empty() {
                println!("No candidates configured; any candidate id is accepted.");
            }
            for candidate in candidates.as_slice() {
                println!("{}\t{}", candidate.id, candidate.name);
            }
        }
        Command::Register {
            voter_id,
            name,
            password,
        } => {
            let path = config.voters_path();
            let mut registry = VoterRegistry::load(&path)?;
            registry.register(&voter_id, &name, &password)?;
            registry.save(&path)?;
            println!("registered voter {}", voter_id);
        }
        Command::Vote {
            voter_id,
            password,
            candidate,
        } => {
            let path = config.voters_path();
            let mut registry = VoterRegistry::load(&path)?;
            registry.authenticate(&voter_id, &password)?;
            CandidateList::load(&config.candidates_path())?.check(&candidate)?;

            let voter = voter_id.clone();
            let block = with_ledger(&config, shutdown, move |ledger| {
                ledger.append_vote(&candidate, Some(voter.as_str())).cloned()
            })
            .await?;

            registry.mark_voted(&voter_id)?;
            if let Err(e) = registry.save(&path) {
                error!(
                    "Vote for {} is in block {} but the voter registry was not updated",
                    voter_id, block.index
                );
                return Err(e).context("saving voter registry");
            }
            println!(
                "vote recorded in block #{} at {}; hash = {}",
                block.index,
                format_millis(block.timestamp),
                block.hash
            );
        }
        Command::Tally => {
            let tally = with_ledger(&config, shutdown, |ledger| Ok(ledger.tally())).await?;
            let candidates = CandidateList::load(&config.candidates_path())?;
            if tally.total_votes() == 0 {
                println!("No votes recorded yet.");
            }
            for row in tally.labelled(candidates.as_slice()) {
                println!("{:<32} {:>8}", row.name, row.votes);
            }
            println!("total votes: {}", tally.total_votes());
            if let Some((leader, votes)) = tally.leader() {
                println!("leading: {} with {} votes", leader, votes);
            }
            if tally.malformed_count() > 0 {
                println!("unreadable records: {}", tally.malformed_count());
            }
        }
        Command::Audit => {
            let (report, tally, tail) = with_ledger(&config, shutdown, |ledger| {
                Ok((
                    ledger.is_chain_valid(),
                    ledger.tally(),
                    ledger.tail().map(|b| b.timestamp),
                ))
            })
            .await?;

            println!("blocks checked: {}", report.blocks_checked);
            println!("difficulty: {}", report.difficulty);
            if let Some(ts) = tail {
                println!("last block at: {}", format_millis(ts));
            }
            match report.first_failure {
                None => println!("chain status: valid"),
                Some(failure) => println!("chain status: INVALID; {}", failure),
            }
            println!("unreadable vote records: {}", tally.malformed_count());
            for record in &tally.malformed {
                println!("  {}", record);
            }
            if let Some(failure) = report.first_failure {
                bail!("chain verification failed at block {}", failure.index);
            }
        }
        Command::Show => {
            let blocks = with_ledger(&config, shutdown, |ledger| Ok(ledger.export())).await?;
            println!("{}", chain_to_json(&blocks)?);
        }
        Command::Turnout => {
            let turnout = VoterRegistry::load(&config.voters_path())?.turnout();
            println!("registered: {}", turnout.registered);
            println!("voted: {}", turnout.voted);
            println!("not yet voted: {}", turnout.not_voted());
        }
        Command::Voters => {
            let registry = VoterRegistry::load(&config.voters_path())?;
            if registry.turnout().registered == 0 {
                println!("No voters registered.");
            }
            for (voter_id, record) in registry.iter() {
                let status = if record.voted { "voted" } else { "not voted" };
                println!("{:<24} {:<32} {}", voter_id, record.name, status);
            }
        }
        Command::Reset { yes } => {
            if !yes {
                bail!("refusing to reset without --yes");
            }
            with_ledger(&config, shutdown, |ledger| ledger.reset().map(|blocks| blocks.len()))
                .await?;
            let path = config.voters_path();
            let mut registry = VoterRegistry::load(&path)?;
            registry.clear();
            registry.save(&path)?;
            println!("chain and voter registry reset");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::builder()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    run(cli, tokio::signal::ctrl_c()).await
}
