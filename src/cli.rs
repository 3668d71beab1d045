//! CLI definitions and command routing.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::cert::CertSource;
use crate::config::Config;
use crate::crl::CrlExpiryChecker;
use crate::expiry::CaExpiryChecker;
use crate::primary::{KeyRole, PrimaryCertChecker};
use crate::task::Task;

#[derive(Parser)]
#[command(name = "ca-inspect")]
#[command(about = "Inspect CA expiry and primary certificate validity")]
pub struct Cli {
    /// Config file (default: $CA_INSPECT_CONFIG or the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human, global = true)]
    pub format: OutputFormat,

    /// Evaluate at this instant instead of now (RFC 3339 or YYYY-MM-DD)
    #[arg(long, global = true, value_parser = parse_instant)]
    pub at: Option<OffsetDateTime>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, ValueEnum)]
pub enum OutputFormat {
    /// One line per certificate, then an aggregate status line
    Human,
    /// Single JSON document
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report whether CA certificates are valid, expiring soon, or expired
    #[command(alias = "check_ca_expiry")]
    CheckCaExpiry {
        /// CA certificate file or inline PEM; repeatable
        #[arg(long)]
        path: Vec<String>,
        /// Warn when fewer than this many days remain
        #[arg(long)]
        threshold_days: Option<u32>,
    },

    /// Verify the primary certificate chains to the CA, is unexpired, and has a fitting key usage
    #[command(alias = "check_primary_cert")]
    CheckPrimaryCert {
        /// Primary certificate file or inline PEM
        #[arg(long)]
        primary_path: Option<String>,
        /// CA certificate (or bundle) file or inline PEM
        #[arg(long)]
        ca_path: Option<String>,
        /// Role the primary key usage must allow
        #[arg(long, value_enum)]
        role: Option<KeyRole>,
        /// Maximum issuer hops walked above the primary certificate
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        max_chain_depth: Option<u32>,
    },

    /// Report whether the CA revocation list is close to its next update
    #[command(alias = "check_crl_expiry")]
    CheckCrlExpiry {
        /// CRL file or inline PEM
        #[arg(long)]
        path: Option<String>,
        /// Warn when fewer than this many days remain
        #[arg(long)]
        threshold_days: Option<u32>,
    },
}

/// Parse `--at`: RFC 3339, or a bare date meaning midnight UTC.
pub fn parse_instant(s: &str) -> Result<OffsetDateTime, String> {
    if let Ok(t) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(t);
    }
    Date::parse(s, format_description!("[year]-[month]-[day]"))
        .map(|d| d.midnight().assume_utc())
        .map_err(|_| format!("expected RFC 3339 timestamp or YYYY-MM-DD, got {s:?}"))
}

/// Inline PEM when the argument carries PEM armour, otherwise a path.
/// Inline PEM is identified in reports by `label`.
pub fn source_arg(arg: &str, label: &str) -> CertSource {
    if arg.contains("-----BEGIN ") {
        CertSource::pem(label, arg)
    } else {
        CertSource::path(arg)
    }
}

/// Resolve a command against config into a runnable task. CLI values win.
pub fn build_task(config: &Config, command: Commands) -> Result<Task> {
    match command {
        Commands::CheckCaExpiry {
            path,
            threshold_days,
        } => {
            let sources: Vec<CertSource> = if path.is_empty() {
                config
                    .ca_expiry
                    .paths
                    .iter()
                    .map(|p| CertSource::Path(p.clone()))
                    .collect()
            } else {
                path.iter()
                    .enumerate()
                    .map(|(i, p)| source_arg(p, &format!("inline[{i}]")))
                    .collect()
            };
            if sources.is_empty() {
                anyhow::bail!("no CA certificate path given");
            }
            let threshold = threshold_days.unwrap_or(config.ca_expiry.threshold_days);
            Ok(Task::CaExpiry(CaExpiryChecker::new(sources, threshold)))
        }
        Commands::CheckPrimaryCert {
            primary_path,
            ca_path,
            role,
            max_chain_depth,
        } => {
            let primary = match (primary_path, &config.primary_cert.primary_path) {
                (Some(p), _) => source_arg(&p, "inline-primary"),
                (None, Some(p)) => CertSource::Path(p.clone()),
                (None, None) => anyhow::bail!(
                    "no primary certificate path given (use --primary-path or primary_cert.primary_path)"
                ),
            };
            let ca = ca_path
                .map(|p| source_arg(&p, "inline-ca"))
                .unwrap_or_else(|| CertSource::Path(config.primary_cert.ca_path.clone()));
            let depth = match max_chain_depth {
                Some(d) => usize::try_from(d).context("max chain depth")?,
                None => config.primary_cert.max_chain_depth,
            };
            let checker = PrimaryCertChecker::new(primary, ca)
                .with_role(role.unwrap_or(config.primary_cert.role))
                .with_max_chain_depth(depth);
            Ok(Task::PrimaryCert(checker))
        }
        Commands::CheckCrlExpiry {
            path,
            threshold_days,
        } => {
            let source = path
                .map(|p| source_arg(&p, "inline"))
                .unwrap_or_else(|| CertSource::Path(config.crl.path.clone()));
            let threshold = threshold_days.unwrap_or(config.crl.threshold_days);
            Ok(Task::CrlExpiry(CrlExpiryChecker::new(source, threshold)))
        }
    }
}

/// Run CLI and dispatch to handlers.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let now = cli.at.unwrap_or_else(OffsetDateTime::now_utc);
    let config = Config::load_from(cli.config.as_deref())?;
    let task = build_task(&config, cli.command)?;

    let outcome = task.run(now);
    if let Some(reason) = outcome.operational_failure() {
        anyhow::bail!("{}: no readable input: {reason}", task.name());
    }

    match cli.format {
        OutputFormat::Human => {
            println!("{}", outcome.summary_line());
        }
        OutputFormat::Json => {
            let doc = outcome.to_json().context("serialize report")?;
            println!("{doc}");
        }
    }
    Ok(())
}
