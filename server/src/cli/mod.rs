// server/src/cli/mod.rs

// Command-line entry points: serving the API plus a few offline admin tasks.

pub mod cli;
pub mod handlers;

pub use cli::{run_command, start_cli, CliArgs, Commands};
pub use handlers::{handle_audit, handle_create_user, handle_init_config, handle_serve, shutdown_signal, ServeOverrides};
