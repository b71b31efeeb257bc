#![cfg_attr(not(test), forbid(unsafe_code))]
//! Main entry point for the todo command-line client.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use dotenv::dotenv;
use shared::config::ClientConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::auth::{LoginArgs, RegisterArgs};
use commands::config::ConfigFormat;
use commands::context::AppContext;
use commands::todos::TodoCommand;

/// Todo CLI
#[derive(Parser)]
#[command(name = "todo", version)]
#[command(about = "Sign in and manage your todo list from the terminal", long_about = None)]
struct Cli {
    /// Path to the configuration file (yaml or json)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the todo API, overriding the configuration and environment
    #[arg(long, global = true, value_name = "URL")]
    api: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the todo CLI
#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login(LoginArgs),

    /// Create an account and sign in
    Register(RegisterArgs),

    /// Forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// List and edit todos
    Todos {
        #[command(subcommand)]
        command: TodoCommand,
    },

    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell to generate the completion script for
        #[arg(long, short, value_enum)]
        shell: Shell,
    },

    /// Generate a configuration file
    Config {
        /// Format of the configuration file to generate
        #[arg(long, short, value_enum, default_value_t = ConfigFormat::Yaml)]
        format: ConfigFormat,
    },
}

fn init_tracing(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Completion { shell } => {
            commands::completion::generate_completion(shell);
            return Ok(());
        }
        Commands::Config { format } => return commands::config::generate_config(format),
        _ => {}
    }

    let config = ClientConfig::load_config(cli.config, cli.api.as_deref())?;
    init_tracing(&config.log_level);
    let mut ctx = AppContext::open(&config)?;

    let result = match cli.command {
        Commands::Login(args) => commands::auth::login(&mut ctx, args).await,
        Commands::Register(args) => commands::auth::register(&mut ctx, args).await,
        Commands::Logout => commands::auth::logout(&mut ctx),
        Commands::Whoami => commands::auth::whoami(&mut ctx).await,
        Commands::Todos { command } => commands::todos::run(&mut ctx, command).await,
        Commands::Completion { .. } | Commands::Config { .. } => Ok(()),
    };

    ctx.close();
    result
}
