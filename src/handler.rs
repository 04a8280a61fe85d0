//! Binds one accepted [`Plugin`] to its instantiated [`PluginCore`] body.
//!
//! Grounded on `examples/original_source/src/plume/PluginHandler.h` (the
//! `.cc` in the same tree is a stale partial rewrite; the header is
//! authoritative and matches how `Manager.cc` actually drives this type).
//! Move-only by construction (no `Clone`), matching the C++ deleted copy
//! constructor — a `PluginHandler` owns a `Box<dyn PluginCore>` that must
//! not be duplicated.

use uuid::Uuid;

use crate::config::PluginConfig;
use crate::error::Result;
use crate::model_data::ModelData;
use crate::plugin::{Plugin, PluginCore, PluginCoreFactory};

/// A plugin accepted by negotiation, paired with its running core body.
/// `plugin` is kept only for identity/metadata (`name`, `version`); the
/// negotiated `Protocol` itself is not retained past negotiation, matching
/// the original (only the agreed parameter names survive). `handler_id` has
/// no C++ counterpart — it exists so log lines for this handler's
/// setup/run/teardown calls can be correlated without repeating the plugin
/// name string, the same role `node_name_to_id: HashMap<String, Uuid>` plays
/// in `examples/PaprikaEngine-OrbitalModulator/src/main.rs`.
pub struct PluginHandler {
    handler_id: Uuid,
    plugin_name: String,
    config: PluginConfig,
    plugincore: Box<dyn PluginCore>,
    agreed_params: Vec<String>,
}

impl PluginHandler {
    /// Builds the core via [`PluginCoreFactory`] and wraps it, mirroring
    /// `PluginRegistry::setActive` in `Manager.cc`: look up
    /// `plugin.plugincoreName()`, build against `pconfig.coreConfig()`.
    pub fn activate(plugin: &dyn Plugin, config: PluginConfig, agreed_params: Vec<String>) -> Result<Self> {
        let plugincore = PluginCoreFactory::build(plugin.plugincore_name(), config.core_config())?;
        Ok(PluginHandler {
            handler_id: Uuid::new_v4(),
            plugin_name: plugin.name().to_string(),
            config,
            plugincore,
            agreed_params,
        })
    }

    pub fn is_active(&self) -> bool {
        true
    }

    pub fn handler_id(&self) -> Uuid {
        self.handler_id
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn get_required_param_names(&self) -> &[String] {
        &self.agreed_params
    }

    pub fn grab_data(&mut self, data: ModelData) {
        self.plugincore.grab_data(data);
    }

    pub fn setup(&mut self) {
        self.plugincore.setup();
    }

    pub fn run(&mut self) -> Result<()> {
        self.plugincore.run()
    }

    pub fn teardown(&mut self) {
        self.plugincore.teardown();
    }

    pub fn model_data(&self) -> &ModelData {
        self.plugincore.model_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Protocol;

    struct NoopCore {
        data: ModelData,
        ran: bool,
    }

    impl PluginCore for NoopCore {
        fn run(&mut self) -> Result<()> {
            self.ran = true;
            Ok(())
        }

        fn grab_data(&mut self, data: ModelData) {
            self.data = data;
        }

        fn model_data(&self) -> &ModelData {
            &self.data
        }
    }

    struct NoopPlugin;
    impl Plugin for NoopPlugin {
        fn name(&self) -> &str {
            "NoopPlugin"
        }
        fn plugincore_name(&self) -> &str {
            "handler-test-noop-core"
        }
        fn negotiate(&self) -> Protocol {
            Protocol::new()
        }
    }

    #[test]
    fn activate_builds_and_runs_core() {
        PluginCoreFactory::register(
            "handler-test-noop-core",
            Box::new(|_cfg| Ok(Box::new(NoopCore { data: ModelData::new(), ran: false }) as Box<dyn PluginCore>)),
        );

        let toml = r#"
            name = "NoopPlugin"
            lib = "noop"
        "#;
        let config: PluginConfig = toml::from_str(toml).unwrap();

        let mut handler = PluginHandler::activate(&NoopPlugin, config, vec!["I".to_string()]).unwrap();
        assert_eq!(handler.get_required_param_names(), &["I".to_string()]);
        handler.grab_data(ModelData::new());
        handler.setup();
        handler.run().unwrap();
        handler.teardown();

        PluginCoreFactory::deregister("handler-test-noop-core");
    }
}
