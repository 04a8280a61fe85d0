//! Synthetic NWP model step emulator.
//!
//! Grounded on `examples/original_source/src/nwp_emulator/nwp_emulator.cc`:
//! parse a config, build the host's offered `Protocol`, hand it to a
//! `Manager` to negotiate, feed the agreed `ModelData`, then step the model
//! `steps` times, calling `run` once per step and `teardown` once at the
//! end. Unlike the original, which reads real or synthetic GRIB fields, this
//! emulator only ever drives the synthetic field DSL in [`emulator`].

mod cli;
mod emulator;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use plume_rs::{Manager, ManagerConfig};

// Pulled in only for their `ctor`-driven self-registration into plume-rs's
// process-wide plugin registries; nothing here calls into them by name.
use field_plugin as _;
use grouped_plugin as _;
use simple_plugin as _;

use cli::{Cli, Commands};
use emulator::{EmulatorConfig, HostState};

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("nwp-emulator: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let Commands::Run { emulator_config, plume_config, steps } = cli.command;

    let config = EmulatorConfig::from_path(&emulator_config)?;
    let mut host = HostState::build(&config)?;

    let Some(plume_config_path) = plume_config else {
        info!(steps, "no plume config given, performing a dry run with no plugins loaded");
        for step in 0..steps {
            host.advance();
            info!(step, "dry run step");
        }
        return Ok(());
    };

    let manager_config = ManagerConfig::from_path(&plume_config_path)?;
    let mut manager = Manager::new();
    manager.configure(manager_config)?;

    let offers = host.offers();
    manager.negotiate(&offers)?;

    let data = host.provide_initial(|name| manager.is_param_requested(name))?;
    manager.feed_plugins(&data)?;

    for step in 0..steps {
        manager.run()?;
        host.advance();
        info!(step, "model step complete");
    }

    manager.teardown();
    Ok(())
}
