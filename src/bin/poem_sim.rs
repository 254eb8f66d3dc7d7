//! Confirmation latency and common prefix experiments.
//!
//! ```text
//! poem-sim latency --g 0.7 --beta 0.3 --protocol poem
//! poem-sim sweep --betas 0.05:0.45:9 --gs 0.1:4:40 --sqrt --format csv
//! poem-sim compare --betas 0.1:0.4:4 --gs 0.1:4:20 --output compare.json
//! poem-sim backbone --parties 100 --corrupted 30 --round-success 0.2
//! ```

use std::{fs, path::PathBuf, str::FromStr, time::Instant};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use poem_sim::{
    config::{DEFAULT_EPSILON, DEFAULT_HORIZON, DEFAULT_TRIALS},
    prelude::*,
    sweep::{linear_range, sqrt_spaced_range},
    work::DEFAULT_KAPPA,
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "poem-sim", version)]
#[command(about = "Monte-Carlo latency estimates for Nakamoto and PoEM")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Estimate the latency of a single operating point
    Latency {
        /// Honest blocks per network delay
        #[arg(long)]
        g: f64,

        /// Adversarial fraction of mining power
        #[arg(short, long)]
        beta: f64,

        /// Per-block work bias (entropy-weighted only)
        #[arg(long, default_value = "0")]
        gamma: f64,

        #[arg(short, long, value_enum, default_value = "poem")]
        protocol: Protocol,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Minimize latency over a grid of honest rates and work biases
    Sweep {
        #[arg(short, long, value_enum, default_value = "poem")]
        protocol: Protocol,

        /// Parameter the output is indexed by
        #[arg(short, long, value_enum, default_value = "beta")]
        axis: SweepAxis,

        #[command(flatten)]
        grid: GridArgs,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Sweep both protocols over the same adversarial ratios
    Compare {
        #[command(flatten)]
        grid: GridArgs,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Measure the common prefix of discrete-round executions
    Backbone {
        /// Total number of parties
        #[arg(short = 'n', long, default_value = "100")]
        parties: u64,

        /// Number of corrupted parties
        #[arg(short = 't', long, default_value = "0")]
        corrupted: u64,

        /// Hash queries per party per round
        #[arg(short, long, default_value = "1")]
        queries: u64,

        /// Probability of at least one honest block per round
        #[arg(short = 'f', long)]
        round_success: f64,

        #[arg(short, long, default_value = "1000")]
        rounds: u64,

        /// Number of independent executions
        #[arg(long, default_value = "100")]
        repeats: usize,

        #[arg(short, long, value_enum, default_value = "private-mining")]
        adversary: Strategy,

        #[arg(short, long, value_enum, default_value = "nakamoto")]
        protocol: Protocol,

        #[arg(long, default_value = "0")]
        seed: u64,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Tolerated fraction of failing trials
    #[arg(short, long, default_value_t = DEFAULT_EPSILON)]
    epsilon: f64,

    /// Monte-Carlo trials per point
    #[arg(long, default_value_t = DEFAULT_TRIALS)]
    trials: usize,

    /// Maximum chain weight simulated per trial
    #[arg(long, default_value_t = DEFAULT_HORIZON)]
    horizon: u64,

    #[arg(long, default_value = "0")]
    seed: u64,
}

#[derive(Args)]
struct GridArgs {
    /// Adversarial ratios, as `value` or `start:end:points`
    #[arg(short, long, default_value = "0.05:0.45:9")]
    betas: GridRange,

    /// Honest rates, as `value` or `start:end:points`
    #[arg(short, long, default_value = "0.1:4:40")]
    gs: GridRange,

    /// Work biases, as `value` or `start:end:points`
    #[arg(long, default_value = "0")]
    gammas: GridRange,

    /// Space grid points by square root instead of linearly
    #[arg(long)]
    sqrt: bool,
}

#[derive(Args)]
struct OutputArgs {
    #[arg(long, value_enum, global = true, default_value = "json")]
    format: OutputFormat,

    /// Write to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
    Pretty,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    PrivateMining,
    Balancing,
    Idle,
}

/// Grid given on the command line as `start:end:points`.
#[derive(Debug, Clone, Copy)]
struct GridRange {
    start: f64,
    end: f64,
    points: usize,
}

impl FromStr for GridRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |x: &str| {
            x.trim()
                .parse::<f64>()
                .map_err(|e| format!("invalid number '{x}': {e}"))
        };

        match s.split(':').collect::<Vec<_>>()[..] {
            [value] => {
                let value = parse(value)?;
                Ok(GridRange {
                    start: value,
                    end: value,
                    points: 1,
                })
            }
            [start, end, points] => Ok(GridRange {
                start: parse(start)?,
                end: parse(end)?,
                points: points
                    .trim()
                    .parse()
                    .map_err(|e| {
                        format!("invalid point count '{points}': {e}")
                    })?,
            }),
            _ => Err(format!(
                "expected 'value' or 'start:end:points', got '{s}'"
            )),
        }
    }
}

impl GridRange {
    fn values(&self, sqrt: bool) -> Result<Vec<f64>, ConfigError> {
        if sqrt {
            sqrt_spaced_range(self.start, self.end, self.points)
        } else {
            linear_range(self.start, self.end, self.points)
        }
    }
}

impl GridArgs {
    fn sweep(
        &self,
        common: &CommonArgs,
    ) -> anyhow::Result<ParameterSweepBuilder> {
        Ok(ParameterSweep::builder()
            .betas(self.betas.values(self.sqrt)?)
            .gs(self.gs.values(self.sqrt)?)
            .gammas(self.gammas.values(self.sqrt)?)
            .epsilon(common.epsilon)
            .trials(common.trials)
            .horizon(common.horizon)
            .seed(common.seed))
    }
}

fn emit<T: Serialize>(
    value: &T,
    table: ResultsTable,
    args: &OutputArgs,
) -> anyhow::Result<()> {
    let text = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Csv => table.with_format(Format::CSV).to_string(),
        OutputFormat::Pretty => {
            table.with_format(Format::PrettyPrint).to_string()
        }
    };

    match &args.output {
        Some(path) => fs::write(path, text)
            .with_context(|| format!("writing {}", path.display()))?,
        None => println!("{}", text),
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let start = Instant::now();

    match cli.command {
        Command::Latency {
            g,
            beta,
            gamma,
            protocol,
            common,
        } => {
            let config = SimulationConfig::builder()
                .g(g)
                .beta(beta)
                .gamma(gamma)
                .protocol(protocol)
                .epsilon(common.epsilon)
                .trials(common.trials)
                .horizon(common.horizon)
                .seed(common.seed)
                .build()?;

            let estimate = LatencyEstimator::new(config).estimate();
            let table = ResultsTable::from_estimate(&estimate);
            emit(&estimate, table, &cli.output)?;
        }
        Command::Sweep {
            protocol,
            axis,
            grid,
            common,
        } => {
            let record = grid
                .sweep(&common)?
                .protocol(protocol)
                .axis(axis)
                .build()?
                .run()?;

            emit(&record, ResultsTable::from_sweep(&record), &cli.output)?;
        }
        Command::Compare { grid, common } => {
            let record = grid.sweep(&common)?.build()?.compare()?;

            let table = ResultsTable::from_comparison(&record);
            emit(&record, table, &cli.output)?;
        }
        Command::Backbone {
            parties,
            corrupted,
            queries,
            round_success,
            rounds,
            repeats,
            adversary,
            protocol,
            seed,
        } => {
            let builder = Backbone::builder()
                .parties(parties)
                .corrupted(corrupted)
                .queries(queries)
                .round_success(round_success)
                .rounds(rounds)
                .work_model(protocol.work_model(DEFAULT_KAPPA));
            let backbone = match adversary {
                Strategy::PrivateMining => {
                    builder.adversary(PrivateMining::new())
                }
                Strategy::Balancing => builder.adversary(Balancing::new()),
                Strategy::Idle => builder.adversary(Idle),
            }
            .build()?;

            let summary = backbone.summarize(seed, repeats)?;
            let table = ResultsTable::from_backbone(&summary);
            emit(&summary, table, &cli.output)?;
        }
    }

    log::info!("Elapsed time: {:.4} secs", start.elapsed().as_secs_f64());

    Ok(())
}
