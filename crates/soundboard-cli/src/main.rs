//! CLI entry point for the soundboard client store.
//!
//! Provides the `soundboard` command. Tokens are persisted in the SQLite
//! file named by the config, so `login` in one invocation is seen by
//! `header` or `categories` in the next.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use soundboard_store::{AppStore, Credentials, LayoutEvent, StoreConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Soundboard admin client.
#[derive(Parser)]
#[command(name = "soundboard", version, about = "Soundboard admin client state")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "config/soundboard.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Obtain and store a token pair.
    Login {
        #[arg(long)]
        username: String,
        /// Falls back to `SOUNDBOARD_PASSWORD`.
        #[arg(long, env = "SOUNDBOARD_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "")]
        recaptcha: String,
    },

    /// Blacklist the refresh token and forget both tokens.
    Logout,

    /// Mint a new access token.
    Refresh,

    /// Print the Authorization header value.
    Header,

    /// Show whether a session is stored.
    Status,

    /// List the game-sound categories as JSON.
    Categories,

    /// Drive the sidebar flags and report the resize signals.
    Sidebar {
        #[command(subcommand)]
        action: SidebarAction,
    },
}

#[derive(Subcommand, Clone, Copy)]
enum SidebarAction {
    /// Flip sidebar visibility (an unset sidebar becomes shown).
    Toggle,
    /// Flip the unfoldable (narrow) sidebar flag.
    Unfold,
    /// Show the sidebar.
    Show,
    /// Hide the sidebar.
    Hide,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing("info");

    let mut config = StoreConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    config.apply_env_overrides();

    let store = AppStore::open(&config).context("failed to open store")?;
    info!(storage = %config.storage_path.display(), "store ready");

    match cli.command {
        Commands::Login {
            username,
            password,
            recaptcha,
        } => cmd_login(&store, username, password, recaptcha).await,
        Commands::Logout => {
            store.auth().logout().await.context("logout failed")?;
            println!("logged out");
            Ok(())
        }
        Commands::Refresh => {
            let refreshed = store.auth().refresh().await.context("refresh failed")?;
            println!("{}", if refreshed { "refreshed" } else { "not refreshed" });
            Ok(())
        }
        Commands::Header => {
            let header = store
                .auth()
                .auth_header()
                .await
                .context("cannot build auth header")?;
            println!("{header}");
            Ok(())
        }
        Commands::Status => {
            println!(
                "{}",
                if store.auth().logged_in() { "logged in" } else { "logged out" }
            );
            Ok(())
        }
        Commands::Categories => {
            let categories = store
                .categories()
                .retrieve_categories()
                .await
                .context("failed to retrieve categories")?;
            println!("{}", serde_json::to_string_pretty(&categories)?);
            Ok(())
        }
        Commands::Sidebar { action } => cmd_sidebar(&store, action),
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

async fn cmd_login(store: &AppStore, username: String, password: String, recaptcha: String) -> Result<()> {
    let credentials = Credentials {
        username,
        password,
        recaptcha,
    };

    let wrong_credentials = store
        .auth()
        .login(&credentials)
        .await
        .context("login request failed")?;

    if wrong_credentials {
        println!("wrong credentials");
    } else if store.auth().logged_in() {
        println!("logged in");
    } else {
        println!("login accepted but no tokens were issued");
    }
    Ok(())
}

fn cmd_sidebar(store: &AppStore, action: SidebarAction) -> Result<()> {
    let mut resize = store.ui().subscribe();

    match action {
        SidebarAction::Toggle => {
            store.toggle_sidebar();
        }
        SidebarAction::Unfold => {
            store.toggle_unfoldable();
        }
        SidebarAction::Show => store.update_sidebar_visible(true),
        SidebarAction::Hide => store.update_sidebar_visible(false),
    }

    let mut signals = 0;
    while let Ok(LayoutEvent::Resize) = resize.try_recv() {
        signals += 1;
    }

    let flags = store.ui_flags();
    println!(
        "sidebar_visible={:?} sidebar_unfoldable={} resize_signals={signals}",
        flags.sidebar_visible, flags.sidebar_unfoldable
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
