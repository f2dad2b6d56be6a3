use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use courtside_edge::backtesting::historical;
use courtside_edge::backtesting::simulator::BankrollSimulator;
use courtside_edge::backtesting::streaks::SettledPick;
use courtside_edge::config::AppConfig;
use courtside_edge::db::ledger::{LedgerQuery, Outcome};
use courtside_edge::decision::summary::DecisionReport;
use courtside_edge::market::models::Matchup;
use courtside_edge::monitoring::logger;

#[derive(Parser)]
#[command(name = "courtside-edge")]
#[command(author, version, about = "NBA moneyline betting decisions and bankroll simulation", long_about = None)]
struct Cli {
    /// Config file (defaults to $BETTING_CONFIG, then config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a day's slate and replace that day's bets
    Decide {
        /// JSON array of matchups with probabilities and odds
        #[arg(short, long)]
        input: PathBuf,

        /// Slate date (YYYY-MM-DD); defaults to the first matchup's date
        #[arg(short, long)]
        date: Option<NaiveDate>,

        #[arg(short, long)]
        user: Option<String>,

        /// Write the per-game summary here
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Record the result of a game
    Settle {
        #[arg(short, long)]
        date: NaiveDate,

        #[arg(short, long)]
        team: String,

        /// win or lose
        #[arg(short, long)]
        result: Outcome,
    },

    /// List ledger records
    Ledger {
        #[arg(short, long)]
        user: Option<String>,

        #[arg(long)]
        from: Option<NaiveDate>,

        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Replay settled bets into a bankroll curve
    Simulate {
        /// Defaults to every user in [simulation] users
        #[arg(short, long)]
        user: Option<String>,

        #[arg(long)]
        initial: Option<Decimal>,

        /// Kelly multiplier (0.5 = half Kelly)
        #[arg(long)]
        scale: Option<f64>,

        /// Print the daily curve from this date
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,

        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,
    },

    /// Losing-streak and staking-risk report per confidence bucket
    Streaks {
        /// Results sheet CSV; defaults to the ledger's settled bets
        #[arg(long)]
        csv: Option<PathBuf>,

        #[arg(short, long)]
        user: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    logger::init_logging(&config.monitoring)?;

    match cli.command {
        Commands::Decide {
            input,
            date,
            user,
            summary,
        } => run_decide(&config, &input, date, user, summary.as_deref()),
        Commands::Settle { date, team, result } => run_settle(&config, date, &team, result),
        Commands::Ledger { user, from, to } => run_ledger(&config, user, from, to),
        Commands::Simulate {
            user,
            initial,
            scale,
            from,
            to,
        } => run_simulate(&config, user, initial, scale, from.zip(to)),
        Commands::Streaks { csv, user } => run_streaks(&config, csv.as_deref(), user),
    }
}

fn run_decide(
    config: &AppConfig,
    input: &Path,
    date: Option<NaiveDate>,
    user: Option<String>,
    summary_path: Option<&Path>,
) -> Result<()> {
    let contents = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let matchups: Vec<Matchup> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse matchups in {}", input.display()))?;

    let date = date
        .or_else(|| matchups.first().map(|m| m.key.date))
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let user = user.unwrap_or_else(|| config.ledger.default_user.clone());

    let engine = config.decision.engine()?;
    let ledger = config.ledger.open()?;
    let run = engine.run_day(&ledger, date, &user, &matchups)?;

    println!("{} bets for {} on {}", run.accepted_count(), user, date);
    for rec in run.accepted() {
        println!(
            "  {:<28} {:>6}  p={:.3}  EV={:+.3}  Kelly={:.1}%",
            rec.team, rec.american_odds, rec.win_probability, rec.expected_value, rec.kelly_fraction
        );
    }

    if let Some(path) = summary_path {
        DecisionReport::new(date, run.summaries)
            .write_to(path)
            .with_context(|| format!("Failed to write summary {}", path.display()))?;
        tracing::info!(path = %path.display(), "Decision summary written");
    }
    Ok(())
}

fn run_settle(config: &AppConfig, date: NaiveDate, team: &str, outcome: Outcome) -> Result<()> {
    let ledger = config.ledger.open()?;
    let settled = ledger.settle(date, team, outcome)?;
    println!("Settled {} bet(s) on {} for {} as {}", settled.len(), team, date, outcome);
    Ok(())
}

fn run_ledger(
    config: &AppConfig,
    user: Option<String>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<()> {
    let ledger = config.ledger.open()?;
    let query = LedgerQuery { user, from, to };

    for record in ledger.query(&query) {
        println!(
            "{}  {:<28} {:>6}  Kelly={:>5.1}%  {:<7} {}",
            record.date, record.team, record.odds, record.kelly, record.result, record.user
        );
    }
    Ok(())
}

fn run_simulate(
    config: &AppConfig,
    user: Option<String>,
    initial: Option<Decimal>,
    scale: Option<f64>,
    range: Option<(NaiveDate, NaiveDate)>,
) -> Result<()> {
    let simulator = BankrollSimulator::new(
        initial.unwrap_or(config.simulation.initial_bankroll),
        scale.unwrap_or(config.simulation.kelly_scale),
    )?;
    let users = match user {
        Some(user) => vec![user],
        None => config.simulation.users.clone(),
    };

    let ledger = config.ledger.open()?;
    for user in users {
        let state = simulator.simulate(&ledger, &user)?;
        println!("\n[{user}]\n{}", state.summary);

        if let Some((from, to)) = range {
            for (day, bankroll) in state.curve(from, to) {
                println!("  {day}  {bankroll:.0}");
            }
        }
    }
    Ok(())
}

fn run_streaks(config: &AppConfig, csv: Option<&Path>, user: Option<String>) -> Result<()> {
    let picks: Vec<SettledPick> = match csv {
        Some(path) => historical::load_history_csv(path)?,
        None => {
            let ledger = config.ledger.open()?;
            let query = match user {
                Some(user) => LedgerQuery::for_user(user),
                None => LedgerQuery::all(),
            };
            ledger
                .query(&query)
                .iter()
                .filter_map(SettledPick::from_record)
                .collect()
        }
    };

    tracing::info!(picks = picks.len(), "Running streak analysis");

    let analyzer = config.analysis.analyzer()?;
    for report in analyzer.report(&picks)? {
        println!("\n{report}");
    }
    Ok(())
}
