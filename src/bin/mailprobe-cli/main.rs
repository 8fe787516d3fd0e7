mod args;
mod output;

use std::io::{self, BufRead};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use mailprobe::{Config, mx, validate_bulk};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::args::{Cli, Commands};
use crate::output::{CatchAllRow, write_reports};

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "mailprobe=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => {
            Config::load(path).with_context(|| format!("load config {}", path.display()))
        }
        None => Ok(Config::default()),
    }
}

fn read_stdin() -> Result<Vec<String>> {
    let mut emails = Vec::new();
    for line in io::stdin().lock().lines() {
        let line = line.context("read stdin")?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            emails.push(trimmed.to_string());
        }
    }
    Ok(emails)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(&cli)?;

    // codes de sortie : 0 OK, 2 non valides, 1 fatal
    match &cli.cmd {
        Commands::Validate { emails, stdin } => {
            let mut emails = emails.clone();
            if *stdin {
                emails.extend(read_stdin()?);
            }
            if emails.is_empty() {
                bail!("no address given (pass addresses or --stdin)");
            }

            let validator = Arc::new(config.validator());
            let verdicts = if emails.len() == 1 {
                vec![validator.validate(&emails[0]).await]
            } else {
                validate_bulk(&validator, emails, &config.bulk_options())
                    .await
                    .results
            };
            write_reports(&verdicts, &cli)?;
            if verdicts.iter().any(|verdict| !verdict.is_valid()) {
                std::process::exit(2);
            }
        }
        Commands::Mx { domain } => {
            let resolver = config.resolver();
            let domain = domain.clone();
            let hosts = tokio::task::spawn_blocking(move || {
                let ascii = mx::normalize_domain(&domain)?;
                mx::resolve_with(&resolver, &ascii)
            })
            .await
            .context("MX lookup task")??;
            write_reports(&hosts, &cli)?;
        }
        Commands::CatchAll { domain } => {
            let validator = config.validator();
            let name = domain.clone();
            let result =
                tokio::task::spawn_blocking(move || validator.check_catch_all_domain(&name))
                    .await
                    .context("catch-all task")??;
            write_reports(
                &[CatchAllRow {
                    domain: domain.clone(),
                    result,
                }],
                &cli,
            )?;
        }
    }
    Ok(())
}
