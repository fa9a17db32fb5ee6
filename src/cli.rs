// src/cli.rs
use crate::config::{self, BackendKind, Config};
use crate::error::{AppError, AppResult, GuestbookError};
use crate::guestbook::Guestbook;
use crate::models::{EntryUpdate, GuestbookEntry};
use crate::store;
use clap::{Parser, Subcommand};
use log;
use rpassword;
use std::path::PathBuf;

/// A small guestbook kept in a JSON file or a hosted table.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a config file (defaults to the per-user config directory)
    #[clap(short, long, value_parser, global = true)]
    pub config: Option<PathBuf>,

    /// Storage backend to use, overriding the config file
    #[clap(short, long, value_parser = parse_backend, global = true)]
    pub backend: Option<BackendKind>,

    /// Path to the guestbook JSON file, overriding the config file
    #[clap(short, long, value_parser, global = true)]
    pub file: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List entries, newest first
    List {
        /// Maximum number of entries to show
        #[clap(short, long, value_parser)]
        limit: Option<usize>,
    },
    /// Write a new entry
    Write {
        #[clap(short, long, value_parser)]
        name: String,
        #[clap(short, long, value_parser)]
        message: String,
        /// Prompt for a password that will be required to edit or delete the entry
        #[clap(short, long)]
        protect: bool,
    },
    /// Show a single entry
    Show { id: String },
    /// Edit the name and/or message of an entry
    Edit {
        id: String,
        #[clap(short, long, value_parser)]
        name: Option<String>,
        #[clap(short, long, value_parser)]
        message: Option<String>,
    },
    /// Delete an entry
    Delete { id: String },
    /// Print the total number of entries, including legacy ones
    Count,
    /// Check that the storage backend is reachable
    Status,
}

fn parse_backend(value: &str) -> Result<BackendKind, String> {
    value.parse()
}

/// Resolves configuration from file, environment and flags, in that order.
pub fn resolve_config(cli: &Cli) -> Config {
    let mut config = config::load_config(cli.config.as_deref());
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(file) = &cli.file {
        config.data_file = file.clone();
    }
    config
}

pub fn handle_cli_command(cli: Cli) -> AppResult<()> {
    log::debug!("Handling CLI command: {:?}", cli.command);
    let config = resolve_config(&cli);
    let backend = store::open_backend(&config)?;
    let guestbook = Guestbook::new(backend, &config);

    match cli.command {
        Commands::List { limit } => {
            let entries = guestbook.list(limit);
            if entries.is_empty() {
                println!("No entries yet.");
            }
            for entry in &entries {
                print_entry(entry);
            }
            println!("Total: {}", guestbook.total_count());
            log::info!("Listed {} entries from the {} backend", entries.len(), guestbook.backend_name());
        }
        Commands::Write { name, message, protect } => {
            let password = if protect { Some(prompt_new_password()?) } else { None };
            match guestbook.append(&name, &message, password.as_deref())? {
                Some(entry) => {
                    println!("Saved entry {}", entry.id);
                    print_entry(&entry);
                }
                None => println!("Name and message are both required; nothing was saved."),
            }
        }
        Commands::Show { id } => match guestbook.find(&id) {
            Some((_, entry)) => print_entry(&entry),
            None => return Err(GuestbookError::NotFound(id).into()),
        },
        Commands::Edit { id, name, message } => {
            let password = prompt_password_if_protected(&guestbook, &id)?;
            let entry = guestbook.update(&id, EntryUpdate { name, message }, password.as_deref())?;
            println!("Updated entry {}", entry.id);
            print_entry(&entry);
        }
        Commands::Delete { id } => {
            let password = prompt_password_if_protected(&guestbook, &id)?;
            let entry = guestbook.delete(&id, password.as_deref())?;
            println!("Deleted entry {} by {}", entry.id, entry.name);
        }
        Commands::Count => println!("{}", guestbook.total_count()),
        Commands::Status => {
            let status = guestbook.status();
            println!("backend:   {}", status.backend);
            println!("location:  {}", status.location);
            println!("reachable: {}", status.reachable);
            match status.entries {
                Some(count) => println!("entries:   {}", count),
                None => println!("entries:   unknown"),
            }
            if let Some(error) = status.error {
                println!("error:     {}", error);
                return Err(AppError::Cli(format!("{} backend is not reachable", status.backend)));
            }
        }
    }
    Ok(())
}

fn print_entry(entry: &GuestbookEntry) {
    let lock = if entry.is_protected() { " [protected]" } else { "" };
    println!("[{}] {} ({}){}", entry.id, entry.name, entry.date, lock);
    for line in entry.message.lines() {
        println!("    {}", line);
    }
}

fn prompt_new_password() -> AppResult<String> {
    let password = rpassword::prompt_password("Entry password: ").map_err(|e| {
        log::error!("Failed to read entry password: {}", e);
        AppError::Cli(format!("Failed to read password: {}", e))
    })?;
    let confirm = rpassword::prompt_password("Confirm password: ").map_err(|e| {
        log::error!("Failed to read password confirmation: {}", e);
        AppError::Cli(format!("Failed to read password confirmation: {}", e))
    })?;
    if password != confirm {
        log::warn!("Entry password confirmation failed: passwords do not match.");
        return Err(AppError::Cli("Passwords do not match.".to_string()));
    }
    if password.is_empty() {
        return Err(AppError::Cli("Password cannot be empty when --protect is given.".to_string()));
    }
    Ok(password)
}

/// Only protected entries need a password; unknown ids fall through to the
/// store, which reports them as not found.
fn prompt_password_if_protected(guestbook: &Guestbook, id: &str) -> AppResult<Option<String>> {
    match guestbook.find(id) {
        Some((_, entry)) if entry.is_protected() => {
            let password = rpassword::prompt_password("Entry password: ").map_err(|e| {
                log::error!("Failed to read entry password: {}", e);
                AppError::Cli(format!("Failed to read password: {}", e))
            })?;
            Ok(Some(password))
        }
        _ => Ok(None),
    }
}
