//! frontdesk - terminal front end for a frontdesk session.
//!
//! Logs in and out, shows the session, issues authenticated API requests and
//! checks navigation against the route guard. Outcomes are shown as toasts.

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use frontdesk_core::{App, Config, Severity, Toast};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable consulted before prompting for a password
const ENV_PASSWORD: &str = "FRONTDESK_PASSWORD";

#[derive(Parser)]
#[command(name = "frontdesk", version, about = "Session front end for the frontdesk API")]
struct Cli {
    /// API base URL (overrides config and FRONTDESK_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the session
    Login {
        #[arg(long, env = "FRONTDESK_EMAIL")]
        email: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show whether a session is stored and for whom
    Status,
    /// GET a path with the session's credentials and print the JSON
    Get { path: String },
    /// Check where navigating to a path would land
    Navigate { path: String },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    info!(api_url = %config.api_url, "frontdesk starting");

    let mut app = App::new(config).context("Failed to start")?;

    let outcome = run(&mut app, cli.command).await;
    app.pump_session_events();
    print_toasts(&app.toasts.toasts());
    outcome
}

async fn run(app: &mut App, command: Command) -> Result<()> {
    match command {
        Command::Login { email } => {
            let email = match email {
                Some(email) => email,
                None => prompt("Email: ")?,
            };
            let password = match std::env::var(ENV_PASSWORD) {
                Ok(password) => password,
                Err(_) => rpassword::prompt_password("Password: ")?,
            };
            // Failures are reported as toasts
            let _ = app.login(&email, &password).await;
        }
        Command::Logout => {
            app.logout();
            app.toasts.success("Logged out.");
        }
        Command::Status => {
            if app.is_authenticated() {
                let user = app
                    .session
                    .user()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "unknown user".to_string());
                println!("Logged in as {}", user);
            } else {
                println!("Not logged in");
            }
        }
        Command::Get { path } => match app.api.get::<Value>(&path).await {
            Ok(body) => println!("{}", serde_json::to_string_pretty(&body)?),
            Err(e) => app.report_http_error(&e),
        },
        Command::Navigate { path } => {
            let nav = app.navigate(&path);
            if nav.redirected() {
                println!("{} -> {}", nav.requested, nav.location);
            } else {
                println!("{}", nav.location);
            }
        }
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn print_toasts(toasts: &[Toast]) {
    for toast in toasts {
        let marker = match toast.severity {
            Severity::Success => "✓",
            Severity::Error => "✗",
            Severity::Info => "i",
            Severity::Warning => "!",
        };
        eprintln!("{} {}", marker, toast.message);
        if let Some(ref detail) = toast.detail {
            eprintln!("  {}", detail);
        }
    }
}
