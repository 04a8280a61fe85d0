//! Illustrative plugin exercising SPEC_FULL.md scenario S4: it declares no
//! intrinsic requirements at all, leaning entirely on its configured
//! `parameters` groups (the alternative sets a `PluginConfig` carries — see
//! `plume_rs::negotiator`). Acceptance is therefore unconditional on the
//! host offering anything at all; what the plugin actually gets to read
//! depends on which groups the offers happened to satisfy.
//!
//! Grounded on `examples/original_source/tests/nwp_emulator/nwp_emulator_plugin.h`
//! for the self-registering plugin/plugincore pair shape.

use plume_rs::{register_plugin, register_plugin_core, ModelData, Plugin, PluginCore, Protocol, Result};

pub const PLUGIN_NAME: &str = "GroupedPlugin";
pub const PLUGINCORE_NAME: &str = "grouped-plugincore";

pub struct GroupedPlugin;

impl Plugin for GroupedPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn version(&self) -> &str {
        "0.1.0-grouped"
    }

    fn plugincore_name(&self) -> &str {
        PLUGINCORE_NAME
    }

    /// No intrinsic requires: every parameter this plugin ends up reading
    /// comes from a satisfied group in its `PluginConfig`, not from here.
    fn negotiate(&self) -> Protocol {
        Protocol::new()
    }
}

register_plugin!(register_grouped_plugin, PLUGIN_NAME, || Box::new(GroupedPlugin));

pub struct GroupedPluginCore {
    data: ModelData,
}

impl GroupedPluginCore {
    pub fn new() -> Self {
        GroupedPluginCore { data: ModelData::new() }
    }
}

impl Default for GroupedPluginCore {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginCore for GroupedPluginCore {
    /// Reads whatever of its agreed parameters are actually present; a
    /// group that was not satisfied during negotiation never reaches this
    /// core's `ModelData` view, so there is nothing to special-case here.
    fn run(&mut self) -> Result<()> {
        let available = self.data.names();
        tracing::debug!(?available, "grouped-plugincore sees agreed parameters");
        Ok(())
    }

    fn grab_data(&mut self, data: ModelData) {
        self.data = data;
    }

    fn model_data(&self) -> &ModelData {
        &self.data
    }
}

register_plugin_core!(register_grouped_plugincore, PLUGINCORE_NAME, |_cfg: serde_json::Value| {
    Ok(Box::new(GroupedPluginCore::new()) as Box<dyn PluginCore>)
});

#[cfg(test)]
mod tests {
    use super::*;
    use plume_rs::negotiate;

    #[test]
    fn negotiate_has_no_intrinsic_requires() {
        let plugin = GroupedPlugin;
        assert!(plugin.negotiate().requires().params().is_empty());
    }

    #[test]
    fn three_groups_two_satisfied_matches_s4() {
        let mut offers = Protocol::new();
        for name in ["I", "J", "JJJ", "XYZ", "K"] {
            offers.offer_int(name, plume_rs::Availability::Always, "");
        }
        let requires = GroupedPlugin.negotiate();
        let groups = vec![
            vec!["I".to_string(), "J".to_string()],
            vec!["JJJ".to_string(), "J".to_string(), "KKMM".to_string()],
            vec!["XYZ".to_string(), "K".to_string()],
        ];
        let decision = negotiate(&offers, &requires, &groups);
        assert!(decision.is_accepted());
        let mut agreed = decision.agreed_names().to_vec();
        agreed.sort();
        assert_eq!(agreed, vec!["I", "J", "K", "XYZ"]);
    }

    #[test]
    fn run_does_not_fail_on_partial_agreed_set() {
        let mut core = GroupedPluginCore::new();
        let mut data = ModelData::new();
        data.create_int("I", 1).unwrap();
        core.grab_data(data);
        assert!(core.run().is_ok());
    }
}
