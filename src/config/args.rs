use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Preload environment variables from a dotenv file before settings are resolved.
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Print the full discoverable option schema (all plugins, module- and
    /// class-scope) as JSON and exit without starting the listener.
    #[arg(long)]
    pub list_env: bool,
}
