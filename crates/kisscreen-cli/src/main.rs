//! kisscreen - first-pass stock screener on top of the KIS Open API.
//!
//! Runs a condition search saved in the broker's HTS/MTS and prints the
//! matching stock codes. Configuration comes from `KIS_*` environment
//! variables, optionally loaded from a `.env` file.

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use chrono::Local;
use kisscreen_core::{ClientConfig, KisClient, ScreenResult};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Run a condition search saved in KIS HTS/MTS and print the matching stock codes.
#[derive(Parser, Debug)]
#[command(name = "kisscreen")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Condition key to run (default: KIS_CONDITION_KEY)
    #[arg(long, value_name = "KEY")]
    seq: Option<String>,

    /// Request a fresh access token and print its expiry
    #[arg(long)]
    issue_token: bool,

    /// Delete the cached access token before running
    #[arg(long)]
    reset_token: bool,

    /// Log at info level (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(verbose: bool) {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "kisscreen failed");
            eprintln!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = ClientConfig::from_env().context(
        "Set KIS_APP_KEY, KIS_APP_SECRET, KIS_ACCOUNT_NUMBER and KIS_HTS_USER_ID in .env",
    )?;
    info!(config = ?config, "Loaded configuration");

    let mut client = KisClient::new(config).context("Failed to create KIS client")?;

    if args.reset_token {
        client
            .session_mut()
            .clear()
            .context("Failed to delete cached token")?;
        println!("Cached token removed.");
    }

    if args.issue_token {
        return issue_token(&mut client).await;
    }

    let seq = condition_key(args.seq, std::env::var("KIS_CONDITION_KEY").ok())?;

    run_screener(&mut client, &seq).await
}

/// Pick the condition key from `--seq` or the environment; blank counts as missing.
fn condition_key(flag: Option<String>, env: Option<String>) -> Result<String> {
    flag.or(env)
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .context("Set KIS_CONDITION_KEY in .env or pass --seq")
}

async fn issue_token(client: &mut KisClient) -> Result<()> {
    println!("Requesting access token ({})...", client.environment());
    client
        .session_mut()
        .renew()
        .await
        .context("Access token request failed")?;

    let credential = client
        .session()
        .credential()
        .context("Renewal succeeded without a token")?;
    println!("Access token issued.");
    println!("  - Token:   {}", credential.masked());
    println!(
        "  - Expires: {} (UTC, in {} min)",
        credential.expires_at.format("%Y-%m-%d %H:%M:%S"),
        credential.time_until_expiry().num_minutes().max(0)
    );
    println!("  - Cache:   {}", client.session().config().token_path.display());
    Ok(())
}

async fn run_screener(client: &mut KisClient, seq: &str) -> Result<()> {
    println!("--- kisscreen condition search ---");
    println!("Environment: {}", client.environment());
    println!("Condition:   {}", seq);
    println!("Started:     {}", Local::now().format("%Y-%m-%d %H:%M:%S"));

    let result = client
        .fetch_screen(seq)
        .await
        .context("Could not obtain an access token")?;

    print!("{}", render_report(&result));
    println!("--- done ---");
    Ok(())
}

fn render_report(result: &ScreenResult) -> String {
    if result.is_empty() {
        return "\nNo stocks matched the condition (or the search failed; see log).\n".to_string();
    }

    let mut out = format!("\n{} stock(s) matched:\n", result.len());
    for (i, code) in result.codes().iter().enumerate() {
        out.push_str(&format!("  {:>3}. {}\n", i + 1, code));
    }
    out.push_str("\nNext: review the candidates' fundamentals by hand.\n");
    out
}
