//! OpenPatent client - command-line front end for the authenticated API session.

mod app;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use client_config_and_utils::{init_logging, Config, Paths};

/// OpenPatent client command-line interface.
#[derive(Parser)]
#[command(name = "openpatent-client")]
#[command(about = "Sign in to OpenPatent and make authenticated API requests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for client files (config, credentials, logs). Defaults to ~/.openpatent
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "OPENPATENT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "OPENPATENT_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the current session state
    Status,
    /// Show the signed-in account
    Whoami,
    /// GET a path through the authenticated client and print the response
    Get {
        /// Path relative to the server URL, e.g. /api/patents/
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;
    let config = Config::load(&paths)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(level, Some(&paths.log_file()));

    let state = app::ClientState::build(config, paths)?;

    match cli.command {
        Commands::Login { email, password } => app::login(&state, &email, &password).await?,
        Commands::Register {
            email,
            password,
            username,
        } => app::register(&state, &email, &password, username.as_deref()).await?,
        Commands::Logout => app::logout(&state).await?,
        Commands::Status => app::status(&state),
        Commands::Whoami => app::whoami(&state).await?,
        Commands::Get { path } => app::get(&state, &path).await?,
    }

    Ok(())
}
