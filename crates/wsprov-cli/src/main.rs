#![doc = include_str!("../README.md")]

mod app;
mod config;
mod store;
mod telemetry;

use std::io::{self, Write};

use app::App;
use clap::Parser;
use config::{CliArgs, CliConfig, Command};
use serde::Serialize;
use store::StateStore;
use telemetry::init_telemetry;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = CliConfig::try_from(args)?;

    init_telemetry()?;

    #[cfg(feature = "tracing")]
    tracing::debug!("running with config: {:#?}", config);

    let store = StateStore::new(config.state_file);
    let _lock = store.lock()?;
    let mut app = App::open(config.provision, store)?;

    match config.command {
        Command::Create { name, count } => print_json(&app.create(&name, count)?),
        Command::Delete { subdomain } => print_json(&app.delete(subdomain)?),
        Command::List => print_json(app.list()),
        Command::Stats => print_json(&app.stats()),
    }
}

fn print_json<T>(value: &T) -> anyhow::Result<()>
where
    T: Serialize + ?Sized,
{
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
