use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use relsync_core::sync::{SyncReport, Syncer};
use relsync_core::transport::HttpSource;

const MAINTENANCE_WARNING: &str =
    "If the service is in maintenance the release may be republished later.";

#[derive(Parser)]
#[command(name = "relsync", version, about = "manifest-driven installation sync")]
struct Cli {
    /// Depot base URL
    #[arg(long, default_value = "http://patch.relsync.net")]
    server: String,
    /// Game identifier under the depot
    #[arg(long, default_value = "main")]
    game: String,
    /// Installation root
    #[arg(long, default_value = ".")]
    base: PathBuf,
    /// Periodic progress report on stderr
    #[arg(long, default_value_t = false)]
    progress: bool,
    /// Skip the service-status confirmation prompt
    #[arg(long, short = 'y', default_value_t = false)]
    yes: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Build a full installation of one version
    Install {
        version: u32,
        /// Continue an interrupted install by checking the disk first
        #[arg(long = "continue", default_value_t = false)]
        resume: bool,
    },
    /// Advance between versions, downloading only changed parts
    Upgrade {
        #[arg(long)]
        from: Option<u32>,
        #[arg(long)]
        to: Option<u32>,
        /// Skip files the previous run already brought up to date
        #[arg(long = "continue", default_value_t = false)]
        resume: bool,
    },
    /// Decode a version's manifest and print it as JSON
    Dump { version: u32 },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Version input is validated before anything touches the network.
    match &cli.cmd {
        Cmd::Install { version, .. } | Cmd::Dump { version } if *version == 0 => {
            bail!("version must be a positive integer")
        }
        Cmd::Upgrade { to: Some(0), .. } | Cmd::Upgrade { from: Some(0), .. } => {
            bail!("versions must be positive integers")
        }
        Cmd::Upgrade {
            from: Some(f),
            to: Some(t),
            ..
        } if f > t => bail!("--from {f} must be lower than --to {t}"),
        _ => {}
    }

    if !cli.yes && !matches!(cli.cmd, Cmd::Dump { .. }) && !confirm_service_status(&cli.server, &cli.game)? {
        log::info!("aborted by user");
        return Ok(());
    }

    let remote = HttpSource::new(&cli.server, &cli.game);
    let mut syncer = Syncer::new(remote, &cli.base).show_progress(cli.progress);

    match cli.cmd {
        Cmd::Install { version, resume } => {
            let report = if resume {
                syncer.resume_install(version)?
            } else {
                syncer.full_install(version)?
            };
            finish(&report)
        }
        Cmd::Upgrade { from, to, resume } => {
            let (from, to) = syncer.resolve_versions(from, to)?;
            if from > to {
                bail!("installed version {from} is newer than target {to}");
            }
            log::info!("upgrading v{from} -> v{to}");
            let report = if resume {
                syncer.resume_upgrade(from, to)?
            } else {
                syncer.upgrade(from, to)?
            };
            finish(&report)
        }
        Cmd::Dump { version } => {
            let manifest = syncer.manifest(version)?;
            println!("{}", serde_json::to_string_pretty(&*manifest)?);
            Ok(())
        }
    }
}

fn finish(report: &SyncReport) -> Result<()> {
    println!(
        "v{}: {} files fetched ({} bytes), {} deleted, {} failed, {} size warnings",
        report.to_version,
        report.fetch.files_ok,
        report.fetch.bytes_written,
        report.deleted,
        report.fetch.files_failed,
        report.fetch.size_mismatches
    );
    if !report.fetch.all_ok() {
        bail!(
            "{} files failed to download; rerun with --continue to finish",
            report.fetch.files_failed
        );
    }
    Ok(())
}

/// Probe the depot's status endpoint; any failure degrades to a prompt.
/// Returns whether the run should proceed.
fn confirm_service_status(server: &str, game: &str) -> Result<bool> {
    match service_online(server, game) {
        Some(true) => {
            log::info!("service is currently online");
            Ok(true)
        }
        Some(false) => {
            eprintln!("Service is currently OFFLINE. {MAINTENANCE_WARNING}");
            confirm("Continue anyway")
        }
        None => {
            eprintln!("Could not check service status. {MAINTENANCE_WARNING}");
            confirm("Continue anyway")
        }
    }
}

fn service_online(server: &str, game: &str) -> Option<bool> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(10))
        .timeout_read(Duration::from_secs(10))
        .build();
    let url = format!("{}/{game}/status.json", server.trim_end_matches('/'));
    let body = agent.get(&url).call().ok()?.into_string().ok()?;
    let value: serde_json::Value = serde_json::from_str(&body).ok()?;
    truthy(value.get("online")?)
}

// Mild future-proofing: the endpoint has reported booleans, 0/1 and
// quoted strings over its lifetime.
fn truthy(v: &serde_json::Value) -> Option<bool> {
    match v {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::Number(n) => Some(n.as_i64()? != 0),
        serde_json::Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn confirm(question: &str) -> Result<bool> {
    let stdin = std::io::stdin();
    loop {
        eprint!("{question} (y/n)? ");
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(false);
        }
        match line.trim() {
            "y" | "Y" => return Ok(true),
            "n" | "N" => return Ok(false),
            _ => {}
        }
    }
}
