//! Illustrative plugin exercising SPEC_FULL.md scenario S1: it requires
//! three always-available ints (`I`, `J`, `K`) and records what it reads on
//! every `run` so a driver (or a test) can assert it observed the host's
//! per-step increments.
//!
//! Grounded on `examples/original_source/tests/nwp_emulator/nwp_emulator_plugin.h`/`.cc`
//! (a self-registering test plugin + plugincore pair) and on
//! `examples/PaprikaEngine-OrbitalModulator/src/plugin/sdk.rs` for the
//! Rust-native self-registration idiom this crate adopts via
//! `plume_rs::register_plugin!`/`register_plugin_core!`.

use std::sync::{Arc, Mutex};

use plume_rs::{register_plugin, register_plugin_core, ModelData, Plugin, PluginCore, Protocol, Result};

pub const PLUGIN_NAME: &str = "SimplePlugin";
pub const PLUGINCORE_NAME: &str = "simple-plugincore";

pub struct SimplePlugin;

impl Plugin for SimplePlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn version(&self) -> &str {
        "0.1.0-simple"
    }

    fn plugincore_name(&self) -> &str {
        PLUGINCORE_NAME
    }

    fn negotiate(&self) -> Protocol {
        let mut protocol = Protocol::new();
        protocol.require_int("I");
        protocol.require_int("J");
        protocol.require_int("K");
        protocol
    }
}

register_plugin!(register_simple_plugin, PLUGIN_NAME, || Box::new(SimplePlugin));

/// One run's worth of observed values, kept so a driver can assert the
/// host's per-step increments were actually seen (S1: `I∈{0…9}, J∈{10…19},
/// K∈{100…109}` across ten runs).
pub type Observation = (i64, i64, i64);

pub struct SimplePluginCore {
    data: ModelData,
    observations: Arc<Mutex<Vec<Observation>>>,
}

impl SimplePluginCore {
    pub fn new() -> Self {
        SimplePluginCore { data: ModelData::new(), observations: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Shares the observation log so a driver holding the plugin externally
    /// (the static-registration path never hands back a concrete type) can
    /// still inspect what ran. Plugin authors needing this pattern should
    /// clone the `Arc` before `grab_data` is called.
    pub fn observations_handle(&self) -> Arc<Mutex<Vec<Observation>>> {
        Arc::clone(&self.observations)
    }
}

impl Default for SimplePluginCore {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginCore for SimplePluginCore {
    fn run(&mut self) -> Result<()> {
        let i = self.data.get_int("I")?;
        let j = self.data.get_int("J")?;
        let k = self.data.get_int("K")?;
        tracing::debug!(i, j, k, "simple-plugincore observed parameters");
        self.observations.lock().expect("observation log poisoned").push((i, j, k));
        Ok(())
    }

    fn grab_data(&mut self, data: ModelData) {
        self.data = data;
    }

    fn model_data(&self) -> &ModelData {
        &self.data
    }
}

register_plugin_core!(register_simple_plugincore, PLUGINCORE_NAME, |_cfg: serde_json::Value| {
    Ok(Box::new(SimplePluginCore::new()) as Box<dyn PluginCore>)
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiate_requires_i_j_k() {
        let plugin = SimplePlugin;
        let requires = plugin.negotiate();
        let names = requires.requires().param_names();
        assert_eq!(names, vec!["I".to_string(), "J".to_string(), "K".to_string()]);
    }

    #[test]
    fn run_observes_ten_incrementing_steps() {
        let mut core = SimplePluginCore::new();
        let log = core.observations_handle();

        let mut host_i: i64 = 0;
        let mut host_j: i64 = 10;
        let mut host_k: i64 = 100;
        let mut data = ModelData::new();
        data.provide_int("I", &mut host_i as *mut i64).unwrap();
        data.provide_int("J", &mut host_j as *mut i64).unwrap();
        data.provide_int("K", &mut host_k as *mut i64).unwrap();
        core.grab_data(data);

        for _ in 0..10 {
            core.run().unwrap();
            host_i += 1;
            host_j += 1;
            host_k += 1;
        }

        let observed = log.lock().unwrap();
        assert_eq!(observed.len(), 10);
        assert_eq!(observed[0], (0, 10, 100));
        assert_eq!(observed[9], (9, 19, 109));
    }
}
