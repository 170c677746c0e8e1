//! CLI domain: parse, route, help, output, and presentation only.
//! No domain orchestration; single route table dispatches to domain services.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{
    format_blacklist_json, format_blacklist_text, format_cleanup_text, format_inventory_json,
    format_inventory_text, format_refresh_json, format_refresh_text,
};
pub use route::RunContext;
