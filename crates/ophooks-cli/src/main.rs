mod cli;
mod demo;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;

use cli::Cli;
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // A missing .env file is fine; the process environment still applies.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    observability::init_tracing_with_level(&cli.log_level);

    demo::run(&cli).await
}
