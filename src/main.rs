// src/main.rs

use clap::Parser;
use dashdesk::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional
    dotenvy::dotenv().ok();

    let args = Cli::parse();
    cli::run(args).await
}
