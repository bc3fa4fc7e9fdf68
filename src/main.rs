use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::io::Write;
use tracing::info;

mod config;
mod elevation;
mod engine;
mod error;
mod platform;
mod report;
mod rule;

use config::FwConfig;
use elevation::{ElevationOutcome, PrivilegeProbe};
use engine::RuleEngine;
use platform::{Policy, PolicyBackend, Privileges};
use report::Layout;
use rule::{Action, Direction, FieldValue, Protocol, RuleChange};

/// Exit code when an edit ran but at least one field write failed.
const EXIT_PARTIAL: i32 = 2;

#[derive(Parser)]
#[command(name = "fwrules")]
#[command(version, about = "List, inspect and edit Windows Firewall rules", long_about = None)]
struct Cli {
    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Disable coloured status lines
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every firewall rule (default)
    List {
        /// Print the rules as JSON
        #[arg(long)]
        json: bool,
        /// Include the protocol of each rule
        #[arg(long)]
        protocol: bool,
    },
    /// Look up one rule by name (case-insensitive)
    Show {
        name: String,
        /// Print the rule as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change fields of a rule, printing it before and after
    Edit(EditArgs),
    /// Show current configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

#[derive(Args)]
struct EditArgs {
    /// Rule name (case-insensitive)
    name: String,
    #[arg(long)]
    description: Option<String>,
    /// Program path the rule applies to
    #[arg(long, value_name = "PATH")]
    application: Option<String>,
    /// Local ports, e.g. "80,443" or "8000-8100"
    #[arg(long)]
    local_ports: Option<String>,
    /// Remote addresses, e.g. "10.0.0.0/8,LocalSubnet"
    #[arg(long)]
    remote_addresses: Option<String>,
    /// tcp, udp, any or a protocol number
    #[arg(long)]
    protocol: Option<Protocol>,
    /// allow or block
    #[arg(long)]
    action: Option<Action>,
    /// in or out
    #[arg(long)]
    direction: Option<Direction>,
    #[arg(long, conflicts_with = "disable")]
    enable: bool,
    #[arg(long)]
    disable: bool,
}

impl EditArgs {
    fn changes(&self) -> Vec<RuleChange> {
        let enabled = match (self.enable, self.disable) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        [
            self.description.clone().map(FieldValue::Description),
            self.application.clone().map(FieldValue::ApplicationPath),
            self.local_ports.clone().map(FieldValue::LocalPorts),
            self.remote_addresses.clone().map(FieldValue::RemoteAddresses),
            self.protocol.map(FieldValue::Protocol),
            self.action.map(FieldValue::Action),
            self.direction.map(FieldValue::Direction),
            enabled.map(FieldValue::Enabled),
        ]
        .into_iter()
        .flatten()
        .map(|value| RuleChange::new(self.name.clone(), value))
        .collect()
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = FwConfig::load_or_default();
    if cli.no_color || !config.report.color {
        colored::control::set_override(false);
    }

    let command = cli.command.unwrap_or(Commands::List {
        json: false,
        protocol: false,
    });
    let mut stdout = std::io::stdout().lock();
    let result = run(command, &config, &mut stdout);
    let code = exit_code(result, &mut stdout);
    let _ = stdout.flush();
    std::process::exit(code);
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

/// Hard errors are reported on standard output and end the run with status 1.
fn exit_code(result: Result<i32>, out: &mut impl Write) -> i32 {
    match result {
        Ok(code) => code,
        Err(e) => {
            let _ = writeln!(out, "Error: {}", e);
            1
        }
    }
}

fn run(command: Commands, config: &FwConfig, out: &mut impl Write) -> Result<i32> {
    let layout = if config.report.show_protocol {
        Layout::Editor
    } else {
        Layout::Reader
    };

    match command {
        Commands::List { json, protocol } => {
            let layout = if protocol { Layout::Editor } else { layout };
            let engine = RuleEngine::<Policy>::open()?;
            list(&engine, json, layout, out)
        }
        Commands::Show { name, json } => {
            let engine = RuleEngine::<Policy>::open()?;
            show(&engine, &name, json, layout, out)
        }
        Commands::Edit(args) => {
            let forwarded: Vec<String> = std::env::args().skip(1).collect();
            if let Some(code) = elevate(&Privileges, &forwarded, out)? {
                return Ok(code);
            }
            let engine = RuleEngine::<Policy>::open()?;
            edit(&engine, &args, out)
        }
        Commands::Config { init } => {
            if init {
                let path = config.save()?;
                writeln!(out, "{} {}", "[✓] Wrote".green(), path.display())?;
            }
            writeln!(out, "{}", "Current Configuration:".bright_blue().bold())?;
            writeln!(out, "{}", "━".repeat(50).bright_blue())?;
            write!(out, "{}", toml::to_string_pretty(config)?)?;
            Ok(0)
        }
    }
}

/// Runs the privilege check ahead of any write. `Some(code)` means this
/// process is done and must exit with `code`.
fn elevate(
    probe: &dyn PrivilegeProbe,
    args: &[String],
    out: &mut impl Write,
) -> Result<Option<i32>> {
    match elevation::ensure_elevated(probe, args) {
        ElevationOutcome::Continue => Ok(None),
        ElevationOutcome::Relaunched => {
            writeln!(out, "{}", "[+] Continuing in an elevated window".bright_cyan())?;
            Ok(Some(0))
        }
        ElevationOutcome::Declined(e) => Err(e.into()),
    }
}

fn list<P: PolicyBackend>(
    engine: &RuleEngine<P>,
    json: bool,
    layout: Layout,
    out: &mut impl Write,
) -> Result<i32> {
    if json {
        let rules = engine
            .enumerate()?
            .map(|rule| rule.and_then(|rule| engine.snapshot(&rule)))
            .collect::<error::Result<Vec<_>>>()?;
        writeln!(out, "{}", report::format_json(&rules)?)?;
        return Ok(0);
    }

    writeln!(out, "Total firewall rules: {}", engine.count()?)?;
    for rule in engine.enumerate()? {
        let snapshot = engine.snapshot(&rule?)?;
        write!(out, "{}", report::format(&snapshot, layout))?;
    }
    Ok(0)
}

fn show<P: PolicyBackend>(
    engine: &RuleEngine<P>,
    name: &str,
    json: bool,
    layout: Layout,
    out: &mut impl Write,
) -> Result<i32> {
    match engine.find_by_name(name)? {
        Some(rule) => {
            let snapshot = engine.snapshot(&rule)?;
            if json {
                writeln!(out, "{}", report::format_json(std::slice::from_ref(&snapshot))?)?;
            } else {
                writeln!(out, "{}", "Found exact match:".green())?;
                write!(out, "{}", report::format(&snapshot, layout))?;
            }
        }
        None => writeln!(out, "{} {}", "Rule not found:".yellow(), name)?,
    }
    Ok(0)
}

fn edit<P: PolicyBackend>(
    engine: &RuleEngine<P>,
    args: &EditArgs,
    out: &mut impl Write,
) -> Result<i32> {
    let changes = args.changes();

    writeln!(out, "{}", "━".repeat(50).bright_blue())?;
    writeln!(out, "{}", "  Before".bright_blue().bold())?;
    let found = print_rule(engine, &args.name, out)?;

    if changes.is_empty() {
        writeln!(out, "\n{}", "No changes requested".yellow())?;
        return Ok(0);
    }

    writeln!(out, "{}", "━".repeat(50).bright_blue())?;
    writeln!(out, "{}", "  Applying changes".bright_blue().bold())?;
    let batch = engine.apply(&changes);
    for (change, ok) in &batch.outcomes {
        let line = format!("{} -> {}", change.value.field().label(), change.value);
        if *ok {
            writeln!(out, "{} {}", "[✓]".green(), line)?;
        } else {
            writeln!(out, "{} {}", "[✗]".bright_red(), line)?;
        }
    }

    if found {
        writeln!(out, "{}", "━".repeat(50).bright_blue())?;
        writeln!(out, "{}", "  After".bright_blue().bold())?;
        print_rule(engine, &args.name, out)?;
    }

    if batch.all_succeeded() {
        info!("Applied {} change(s) to '{}'", changes.len(), args.name);
        Ok(0)
    } else {
        writeln!(
            out,
            "\n{}",
            format!("{} of {} change(s) failed", batch.failures(), changes.len()).bright_red()
        )?;
        Ok(EXIT_PARTIAL)
    }
}

fn print_rule<P: PolicyBackend>(
    engine: &RuleEngine<P>,
    name: &str,
    out: &mut impl Write,
) -> Result<bool> {
    match engine.find_by_name(name)? {
        Some(rule) => {
            write!(out, "{}", report::format(&engine.snapshot(&rule)?, Layout::Editor))?;
            Ok(true)
        }
        None => {
            writeln!(out, "{} {}", "Rule not found:".yellow(), name)?;
            Ok(false)
        }
    }
}
