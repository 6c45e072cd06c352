use anyhow::Result;
use clap::Parser;
use relay_cli::{load_config, print_stats, run_relay, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { token } => {
            let config = load_config(token)?;
            run_relay(config).await
        }
        Commands::Stats { database_url } => print_stats(database_url).await,
    }
}
