//! Argument parsing and report printing for the `reflect` binary.

use anyhow::{Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, CommandReport, PeriodOptions};
use crate::logging;

/// Monthly reflection summaries for journal entries.
#[derive(Parser)]
#[command(name = "reflect", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Log verbosity (-v for info, -vv for debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate the reflection summary for a period.
    Summary {
        #[command(flatten)]
        period: PeriodArgs,

        /// Also write the summary JSON to this file.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print the prompt context for a period without calling any provider.
    Context {
        #[command(flatten)]
        period: PeriodArgs,
    },

    /// List the provider cascade and its current configuration.
    Providers,
}

#[derive(Args)]
pub struct PeriodArgs {
    /// Journal owner.
    #[arg(long = "user")]
    pub user_id: String,

    /// Calendar month, YYYY-MM. Defaults to the previous month.
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub month: Option<String>,

    /// First day of an explicit range, YYYY-MM-DD.
    #[arg(long, requires = "to")]
    pub from: Option<NaiveDate>,

    /// Last day of an explicit range, YYYY-MM-DD.
    #[arg(long, requires = "from")]
    pub to: Option<NaiveDate>,

    /// Name used in the prompt context.
    #[arg(long = "name")]
    pub display_name: Option<String>,

    /// Entries file, overriding REFLECT_ENTRIES_FILE.
    #[arg(long = "entries")]
    pub entries_file: Option<PathBuf>,
}

impl From<PeriodArgs> for PeriodOptions {
    fn from(args: PeriodArgs) -> Self {
        Self {
            user_id: args.user_id,
            month: args.month,
            from: args.from,
            to: args.to,
            display_name: args.display_name,
            entries_file: args.entries_file,
        }
    }
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let status = if report.ok { "ok" } else { "failed" };
    println!("{}: {status}", report.command);
    for line in &report.details {
        println!("  {line}");
    }
    if !report.issues.is_empty() {
        println!("issues:");
        for issue in &report.issues {
            println!("  - {issue}");
        }
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let report = match cli.command {
        Command::Summary { period, out } => commands::summary::run(&commands::summary::SummaryOptions {
            period: period.into(),
            out,
        })?,
        Command::Context { period } => commands::context::run(&period.into())?,
        Command::Providers => commands::providers::run()?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        bail!(
            "{} finished with {} issue(s)",
            report.command,
            report.issues.len()
        );
    }
    Ok(())
}
