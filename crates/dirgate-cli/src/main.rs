//! Dirgate - Directory-Backed Identity Resolution
//!
//! Command-line access to the configured LDAP servers: health checks, test
//! logins and user lookups.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use dirgate_core::config::DirgateConfig;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::CommandContext;

#[derive(Parser)]
#[command(name = "dirgate")]
#[command(author = "Dirgate Team")]
#[command(version = dirgate_core::VERSION)]
#[command(about = "Directory-backed identity resolution", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Service configuration file
    #[arg(short, long, global = true, env = "DIRGATE_CONFIG")]
    config: Option<String>,

    /// LDAP server list, overrides `ldap.config_file`
    #[arg(long, global = true, env = "DIRGATE_LDAP_CONFIG_FILE")]
    ldap_config: Option<PathBuf>,

    /// Do not map directory groups onto organization roles
    #[arg(long, global = true)]
    skip_org_role_sync: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "DIRGATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Only print results
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that every configured server accepts connections
    Ping,

    /// Authenticate a user
    Login {
        username: String,

        #[arg(long, env = "DIRGATE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Look up one user and the server holding it
    User { username: String },

    /// Look up several users on every server
    Users {
        #[arg(required = true)]
        usernames: Vec<String>,
    },

    /// Load and validate the LDAP server list
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = if let Some(config_path) = &cli.config {
        DirgateConfig::from_file(config_path)?
    } else {
        DirgateConfig::from_env()
    };

    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(path) = cli.ldap_config {
        config.ldap.config_file = path;
    }
    if cli.skip_org_role_sync {
        config.ldap.skip_org_role_sync = true;
    }
    // the CLI exists to talk to the directory
    config.ldap.enabled = true;

    init_logging(&config.logging.level, &config.logging.format);
    info!("LDAP server list: {}", config.ldap.config_file.display());

    let ctx = CommandContext {
        settings: config.ldap,
        output_format: cli.output,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Ping => commands::ping::execute(&ctx).await,
        Commands::Login { username, password } => {
            commands::login::execute(&ctx, &username, &password).await
        }
        Commands::User { username } => commands::user::execute(&ctx, &username).await,
        Commands::Users { usernames } => commands::users::execute(&ctx, &usernames).await,
        Commands::CheckConfig => commands::check_config::execute(&ctx),
    }
}

fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
