// ============================
// sessiongate-server/src/main.rs
// ============================
//! Command-line entry point: serve the demo API or run one-off auth tasks.
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sessiongate_backend::{
    auth::{hash_password_secure, AuthService, Identity},
    config::{Settings, DEFAULT_CONFIG_FILE},
    router, AppState,
};
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How often idle login-throttle entries are dropped
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(name = "sessiongate", version, about = "Token and session service")]
struct Cli {
    /// Configuration file (TOML, or JSON with a .json extension)
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Hash a password read from the argument or the first line of stdin.
    /// The password must meet the configured requirements.
    HashPassword {
        #[arg(long)]
        password: Option<String>,
    },
    /// Issue a token pair and record the refresh session
    Issue {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        admin: bool,
    },
}

fn init_tracing(default_level: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::HashPassword { password } => {
            let settings = Settings::extract_from(&cli.config).with_context(|| {
                format!("failed to read configuration from {}", cli.config.display())
            })?;
            init_tracing("warn", false);
            hash_password(&settings, password)
        },
        Command::Issue {
            user_id,
            email,
            admin,
        } => {
            let settings = load_settings(&cli.config)?;
            init_tracing(&settings.log_level, settings.log_json);
            issue(settings, Identity::new(user_id, email).admin(admin)).await
        },
        Command::Serve => {
            let settings = load_settings(&cli.config)?;
            init_tracing(&settings.log_level, settings.log_json);
            serve(settings).await
        },
    }
}

fn load_settings(path: &PathBuf) -> Result<Settings> {
    Settings::load_from(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

fn hash_password(settings: &Settings, password: Option<String>) -> Result<()> {
    let mut plain = match password {
        Some(password) => password,
        None => {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        },
    };
    if plain.is_empty() {
        bail!("no password given");
    }
    settings.check_password_strength(&plain)?;
    println!("{}", hash_password_secure(&mut plain));
    Ok(())
}

async fn issue(settings: Settings, identity: Identity) -> Result<()> {
    let state = AppState::from_settings(settings)?;
    let pair = state.auth.issue(&identity).await?;
    println!("{}", serde_json::to_string_pretty(&pair)?);
    Ok(())
}

async fn serve(settings: Settings) -> Result<()> {
    let addr = settings.bind_addr;
    let state = AppState::from_settings(settings)?;

    let limiter = state.limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            limiter.cleanup();
        }
    });

    let app = router::create_router(state);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
