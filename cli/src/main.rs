use clap::{Parser, Subcommand};

mod commands;
mod util;

use commands::mission::MissionCommands;
use commands::target::TargetCommands;

#[derive(Parser)]
#[command(name = "spycat", version, about = "Spy Cat Agency CLI: missions, targets, and their cats")]
struct Cli {
    /// API base URL
    #[arg(long, env = "SPYCAT_API_URL", default_value = "http://localhost:9000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Mission operations
    Mission {
        #[command(subcommand)]
        command: MissionCommands,
    },
    /// Target operations
    Target {
        #[command(subcommand)]
        command: TargetCommands,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(4);
        }
        Err(e) => e.exit(),
    };

    let code = match cli.command {
        Commands::Health => commands::health::run(&cli.api_url).await,
        Commands::Mission { command } => commands::mission::run(&cli.api_url, command).await,
        Commands::Target { command } => commands::target::run(&cli.api_url, command).await,
    };

    std::process::exit(code);
}
