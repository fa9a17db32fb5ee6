// src/main.rs
mod cli;
mod clock;
mod config;
mod crypto;
mod error;
mod guestbook;
mod models;
mod remote;
mod store;

use clap::Parser;

fn main() -> Result<(), error::AppError> {
    env_logger::init();
    log::info!("Starting guestbook");

    let cli_args = cli::Cli::parse();

    if let Err(e) = cli::handle_cli_command(cli_args) {
        log::error!("Command failed: {:#?}", e);
        eprintln!("Error: {}", e);
        return Err(e);
    }

    log::info!("Guestbook command finished successfully.");
    Ok(())
}
