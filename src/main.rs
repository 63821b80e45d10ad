use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rsla::action::{ActionRules, DEFAULT_SWARM_THRESHOLD};
use rsla::report::{self, Metric, OutputFormat};
use rsla::{Aggregator, LineParser, ParserOptions, Reader, SubnetMask};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Web server access log analysis tool.
#[derive(Parser, Debug)]
#[command(name = "rsla", version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tally a log into frequency tables and print them.
    Analyze {
        /// Log file, or `-` for stdin.
        #[arg(value_name = "LOGFILE")]
        log: PathBuf,

        /// ip, agent, path, time, endpoint, status, subnet or summary.
        #[arg(short, long, default_value = "summary", value_parser = parse_metric)]
        metric: Metric,

        /// json, yaml or csv.
        #[arg(short, long, default_value = "json", value_parser = parse_format)]
        output: OutputFormat,

        /// Subnet prefix length, 24 or 16.
        #[arg(long, default_value = "24", value_parser = parse_mask)]
        mask: SubnetMask,

        /// Agent recorded for lines without a user agent.
        #[arg(long, value_name = "TEXT")]
        missing_agent: Option<String>,

        /// Append rejected lines and the reason to this file.
        #[arg(long, value_name = "FILE")]
        rejects: Option<PathBuf>,

        /// YAML action rules; `swarm` rules are planned for busy subnets
        /// when the metric includes subnet counts (subnet or summary).
        #[arg(short, long, value_name = "FILE")]
        actions: Option<PathBuf>,

        /// Request count above which a subnet counts as swarming.
        #[arg(long, default_value_t = DEFAULT_SWARM_THRESHOLD)]
        swarm_threshold: u64,
    },
    /// Print the commands action rules would run for a log (dry run).
    Actions {
        /// YAML action rules.
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Log file, or `-` for stdin.
        #[arg(value_name = "LOGFILE")]
        log: PathBuf,
    },
}

fn parse_metric(s: &str) -> std::result::Result<Metric, String> {
    s.parse().map_err(|e: rsla::Error| e.to_string())
}

fn parse_format(s: &str) -> std::result::Result<OutputFormat, String> {
    s.parse().map_err(|e: rsla::Error| e.to_string())
}

fn parse_mask(s: &str) -> std::result::Result<SubnetMask, String> {
    s.parse().map_err(|e: rsla::Error| e.to_string())
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(Box::new(file))
}

#[allow(clippy::too_many_arguments)]
fn analyze(
    log: &Path,
    metric: Metric,
    output: OutputFormat,
    mask: SubnetMask,
    missing_agent: Option<String>,
    rejects: Option<&Path>,
    actions: Option<&Path>,
    swarm_threshold: u64,
) -> Result<()> {
    let rules = actions
        .map(|path| {
            ActionRules::load(path)
                .with_context(|| format!("failed to load action rules from {}", path.display()))
        })
        .transpose()?;

    let mut options = ParserOptions::default();
    if let Some(missing_agent) = missing_agent {
        options = options.with_missing_agent(missing_agent);
    }
    let mut reader = Reader::with_parser(open_input(log)?, LineParser::with_options(options));

    let mut reject_file = rejects
        .map(|path| {
            File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open {}", path.display()))
        })
        .transpose()?;

    let mut aggregator = Aggregator::new(mask);
    let summary = reader
        .summarize(
            &mut aggregator,
            reject_file.as_mut().map(|f| f as &mut dyn Write),
        )
        .with_context(|| format!("failed to read {}", log.display()))?;
    eprintln!("{}", summary);

    let result = aggregator.finish();
    if result.is_empty() {
        anyhow::bail!("no log entries could be parsed from {}", log.display());
    }

    println!("{}", report::format(&result, metric, output)?);

    if let Some(rules) = rules {
        if !metric.includes(Metric::Subnet) {
            tracing::warn!(%metric, "swarm rules need subnet counts, skipping them");
            return Ok(());
        }
        for planned in rules.plan_swarms(&result.subnet_counts, swarm_threshold) {
            println!("# Blocking subnet {}", planned.ip);
            println!("{}", planned.command);
        }
    }
    Ok(())
}

fn plan_actions(config: &Path, log: &Path) -> Result<()> {
    let rules = ActionRules::load(config)
        .with_context(|| format!("failed to load action rules from {}", config.display()))?;

    let mut bytes = Vec::new();
    open_input(log)?
        .read_to_end(&mut bytes)
        .with_context(|| format!("failed to read {}", log.display()))?;
    let text = String::from_utf8_lossy(&bytes);

    for planned in rules.plan_lines(text.lines()) {
        println!("# Agent Tag: {}", planned.tag);
        println!("{}", planned.command);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Analyze {
            log,
            metric,
            output,
            mask,
            missing_agent,
            rejects,
            actions,
            swarm_threshold,
        } => analyze(
            &log,
            metric,
            output,
            mask,
            missing_agent,
            rejects.as_deref(),
            actions.as_deref(),
            swarm_threshold,
        ),
        Command::Actions { config, log } => plan_actions(&config, &log),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    rsla::logging::init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
