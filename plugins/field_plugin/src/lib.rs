//! Illustrative plugin exercising SPEC_FULL.md scenario S5: it requires a
//! single `ATLAS_FIELD` handle (`field_dummy_1`) the host only offers
//! `on-request`. A driver must first check
//! `Manager::is_param_requested("field_dummy_1")` before it bothers
//! inserting the handle into the `ModelData` it feeds, so this plugin's
//! `run` only ever has to cope with the handle being present.
//!
//! Grounded on `examples/original_source/tests/nwp_emulator/nwp_emulator_plugin.h`/`.cc`,
//! whose plugincore reads `modelData().getAtlasFieldShared(name)`.

use plume_rs::{register_plugin, register_plugin_core, ModelData, Plugin, PluginCore, Protocol, Result};

pub const PLUGIN_NAME: &str = "FieldPlugin";
pub const PLUGINCORE_NAME: &str = "field-plugincore";
pub const FIELD_NAME: &str = "field_dummy_1";

pub struct FieldPlugin;

impl Plugin for FieldPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn version(&self) -> &str {
        "0.1.0-field"
    }

    fn plugincore_name(&self) -> &str {
        PLUGINCORE_NAME
    }

    fn negotiate(&self) -> Protocol {
        let mut protocol = Protocol::new();
        protocol.require_atlas_field(FIELD_NAME);
        protocol
    }
}

register_plugin!(register_field_plugin, PLUGIN_NAME, || Box::new(FieldPlugin));

pub struct FieldPluginCore {
    data: ModelData,
}

impl FieldPluginCore {
    pub fn new() -> Self {
        FieldPluginCore { data: ModelData::new() }
    }
}

impl Default for FieldPluginCore {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginCore for FieldPluginCore {
    fn run(&mut self) -> Result<()> {
        let handle = self.data.get_atlas_field_shared(FIELD_NAME)?;
        tracing::debug!(field = FIELD_NAME, raw = ?handle.as_raw(), "field-plugincore read shared field handle");
        Ok(())
    }

    fn grab_data(&mut self, data: ModelData) {
        self.data = data;
    }

    fn model_data(&self) -> &ModelData {
        &self.data
    }
}

register_plugin_core!(register_field_plugincore, PLUGINCORE_NAME, |_cfg: serde_json::Value| {
    Ok(Box::new(FieldPluginCore::new()) as Box<dyn PluginCore>)
});

#[cfg(test)]
mod tests {
    use super::*;
    use plume_rs::{negotiate, Availability, FieldHandle};

    #[test]
    fn rejected_when_field_not_offered() {
        let offers = Protocol::new();
        let requires = FieldPlugin.negotiate();
        let decision = negotiate(&offers, &requires, &[]);
        assert!(!decision.is_accepted());
    }

    #[test]
    fn accepted_with_on_request_offer_and_run_reads_handle() {
        let mut offers = Protocol::new();
        offers.offer_atlas_field(FIELD_NAME, Availability::OnRequest, "dummy field for tests");
        let requires = FieldPlugin.negotiate();
        let decision = negotiate(&offers, &requires, &[]);
        assert!(decision.is_accepted());
        assert_eq!(decision.agreed_names(), &[FIELD_NAME.to_string()]);

        let mut core = FieldPluginCore::new();
        let mut data = ModelData::new();
        let mut sentinel: u8 = 0;
        let handle = FieldHandle::from_raw(&mut sentinel as *mut u8 as *mut std::os::raw::c_void).unwrap();
        data.provide_atlas_field_shared(FIELD_NAME, handle).unwrap();
        core.grab_data(data);
        assert!(core.run().is_ok());
    }
}
