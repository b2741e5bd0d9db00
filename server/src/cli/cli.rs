// server/src/cli/cli.rs

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use lib::config::{StorageEngineType, DEFAULT_CONFIG_PATH};
use models::medical::Role;

use crate::cli::handlers::{handle_audit, handle_create_user, handle_init_config, handle_serve, ServeOverrides};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Diabetic retinopathy clinic server", long_about = None)]
#[clap(propagate_version = true)]
pub struct CliArgs {
    /// YAML configuration file (defaults to ./clinic.yaml when present)
    #[clap(long, short = 'c', global = true, env = "CLINIC_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Run the REST API until SIGINT or SIGTERM
    Serve {
        #[arg(long, help = "Interface to bind, overrides server.host")]
        host: Option<String>,
        #[arg(long, value_parser = clap::value_parser!(u16), help = "Port to bind, overrides server.port")]
        port: Option<u16>,
        #[arg(long, help = "Storage engine: sled or in_memory")]
        storage_engine: Option<StorageEngineType>,
    },
    /// Write the default configuration as YAML
    InitConfig {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        path: PathBuf,
        #[arg(long, action = clap::ArgAction::SetTrue)]
        force: bool,
    },
    /// Create an account without going through /api/signup
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "CLINIC_BOOTSTRAP_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, value_parser = parse_role)]
        role: Role,
    },
    /// Print the most recent audit entries
    Audit {
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,
    },
}

fn parse_role(raw: &str) -> Result<Role, String> {
    raw.parse::<Role>().map_err(|e| e.to_string())
}

pub async fn run_command(config: Option<PathBuf>, command: Commands) -> Result<()> {
    match command {
        Commands::Serve { host, port, storage_engine } => {
            handle_serve(config.as_deref(), ServeOverrides { host, port, storage_engine }).await
        }
        Commands::InitConfig { path, force } => handle_init_config(&path, force),
        Commands::CreateUser { username, email, password, role } => {
            handle_create_user(config.as_deref(), &username, &email, &password, role).await
        }
        Commands::Audit { limit } => handle_audit(config.as_deref(), limit).await,
    }
}

pub async fn start_cli() -> Result<()> {
    let args = CliArgs::parse();
    let command = args.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
        storage_engine: None,
    });
    run_command(args.config, command).await
}
