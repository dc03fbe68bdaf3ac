//! archivebot - chat-driven control surface for a feed archiver.

use clap::Parser;
use std::process::ExitCode;

use archivebot::{logging, Args};

#[tokio::main]
async fn main() -> ExitCode {
    let _guard = match logging::init() {
        Ok((guard, _)) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let args = Args::parse();

    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
