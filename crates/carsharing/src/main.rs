//! `carsharing` - CLI and server for the car catalog
//!
//! This binary serves the catalog over HTTP and offers read-only inspection
//! of the store from the command line.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use tracing::info;

use carsharing::cli::{Cli, Command, ConfigCommand, ListCommand, ServeCommand, ShowCommand};
use carsharing::{http, init_logging, Car, CarFilter, Catalog, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    // Execute the command
    match cli.command {
        Command::Serve(serve_cmd) => handle_serve(&config, serve_cmd).await,
        Command::List(list_cmd) => handle_list(&config, list_cmd),
        Command::Show(show_cmd) => handle_show(&config, &show_cmd),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

async fn handle_serve(config: &Config, cmd: ServeCommand) -> anyhow::Result<()> {
    let mut config = config.clone();
    if let Some(bind) = cmd.bind {
        config.server.bind = bind;
    }
    let addr = config.bind_addr()?;

    let catalog = Catalog::from_config(&config)
        .with_context(|| format!("opening store {}", config.store_path().display()))?;
    info!(
        "Serving {} cars from {}",
        catalog.len(),
        config.store_path().display()
    );

    http::serve(catalog.into_shared(), addr).await?;
    Ok(())
}

fn handle_list(config: &Config, cmd: ListCommand) -> anyhow::Result<()> {
    let catalog = open_catalog(config)?;
    let cars = catalog.list_cars(&CarFilter {
        doors_min: cmd.doors,
        size: cmd.size,
    });

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&cars)?);
        return Ok(());
    }

    if cars.is_empty() {
        println!("No cars found.");
        return Ok(());
    }
    println!(
        "{:>4}  {:<4}  {:<8}  {:>5}  {:<12}  {:>5}",
        "ID", "SIZE", "FUEL", "DOORS", "TRANSMISSION", "TRIPS"
    );
    for car in &cars {
        println!(
            "{:>4}  {:<4}  {:<8}  {:>5}  {:<12}  {:>5}",
            car.id,
            car.size,
            car.fuel,
            car.doors,
            car.transmission,
            car.trips.len()
        );
    }
    Ok(())
}

fn handle_show(config: &Config, cmd: &ShowCommand) -> anyhow::Result<()> {
    let catalog = open_catalog(config)?;
    let car = catalog.find_car(cmd.id)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(car)?);
    } else {
        print_car(car);
    }
    Ok(())
}

fn print_car(car: &Car) {
    println!("Car {}", car.id);
    println!("------");
    println!("  Size:          {}", car.size);
    println!("  Fuel:          {}", car.fuel);
    println!("  Doors:         {}", car.doors);
    println!("  Transmission:  {}", car.transmission);
    println!();
    if car.trips.is_empty() {
        println!("No trips recorded.");
        return;
    }
    println!("Trips");
    for trip in &car.trips {
        println!(
            "  #{:<3} {:>6} -> {:<6}  {}",
            trip.id, trip.start, trip.end, trip.description
        );
    }
}

/// Open the store read-only: a missing store is an error, never created here.
fn open_catalog(config: &Config) -> anyhow::Result<Catalog> {
    let mut config = config.clone();
    config.storage.create_if_missing = false;
    Catalog::from_config(&config)
        .with_context(|| format!("opening store {}", config.store_path().display()))
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Store path:          {}", config.store_path().display());
                println!(
                    "  Create if missing:   {}",
                    config.storage.create_if_missing
                );
                println!();
                println!("[Server]");
                println!("  Bind:                {}", config.server.bind);
                println!();
                println!("[Validation]");
                println!(
                    "  Require trip order:  {}",
                    config.validation.require_trip_order
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
