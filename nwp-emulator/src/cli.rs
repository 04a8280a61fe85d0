//! Command-line surface for the emulator binary.
//!
//! Grounded on `examples/PaprikaEngine-OrbitalModulator/src/cli/mod.rs`'s
//! `clap`-derive shape, and on `examples/original_source/src/nwp_emulator/nwp_emulator.cc`'s
//! `--grib-src`/`--config-src`/`--plume-cfg` options (renamed here to
//! `--emulator-config`/`--plume-config`, since this emulator only ever
//! reads its own synthetic-field DSL, never GRIB).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "nwp-emulator")]
#[command(about = "Synthetic NWP model step emulator for exercising plume-rs plugin negotiation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the emulator: configure and negotiate with plume-rs, then drive
    /// `steps` model timesteps.
    Run {
        /// Path to the emulator's own synthetic-field configuration
        /// (JSON or YAML; see `emulator::EmulatorConfig`).
        #[arg(long)]
        emulator_config: PathBuf,

        /// Path to the plume-rs `ManagerConfig` (TOML, YAML, or JSON).
        /// Omit it to dry-run the emulator with no plugins loaded, mirroring
        /// the original's "emulator will do a dry run" behaviour.
        #[arg(long)]
        plume_config: Option<PathBuf>,

        /// Number of model timesteps to run.
        #[arg(long, default_value_t = 10)]
        steps: u32,
    },
}
