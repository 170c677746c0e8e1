//! CLI command-name contract for logging and routing.

use crate::cli::parse::Commands;

/// Command name used in log fields (e.g. "refresh", "inspect").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Refresh { .. } => "refresh",
        Commands::Inspect { .. } => "inspect",
        Commands::Blacklist { .. } => "blacklist",
        Commands::Clean { .. } => "clean",
    }
}
