//! Owns the configured plugin set, negotiates with each one, and drives the
//! feed/run/teardown cycle.
//!
//! Grounded on `examples/original_source/src/plume/Manager.h`/`.cc`. The
//! original's `Manager` is an `eckit::system::LibraryManager` subclass
//! whose every member is `static`, backed by a private singleton
//! `PluginRegistry` class. SPEC_FULL.md §4.7 records the Design Note that
//! replaces that static API surface with a plain owned struct: an
//! application builds a `Manager`, configures it, and drives it — no
//! hidden process-wide state, no `PluginRegistry` indirection (the
//! "active plugin handlers" list the C++ singleton held is simply a field
//! here). Dynamically-loaded libraries are instead tracked as trailing
//! `Arc<LoadedLibrary>` handles on `Manager` so they outlive every
//! `PluginHandler` built from them.

use tracing::{info, warn};

use crate::config::ManagerConfig;
use crate::dynload::LoadedLibrary;
use crate::error::{Error, Result};
use crate::handler::PluginHandler;
use crate::model_data::ModelData;
use crate::negotiator::{self, PluginDecision};
use crate::parameter::ParameterCatalogue;
use crate::plugin::PluginRegistry;
use crate::protocol::Protocol;

/// Tracks where the manager sits in the `configure -> negotiate ->
/// feedPlugins -> run* -> teardown` sequence (SPEC_FULL.md §4.7), widened
/// from the C++ `isConfigured_` boolean so every operation can assert its
/// own precondition instead of relying on caller discipline. `TornDown` is
/// terminal: the conservative reading of the "should teardown release
/// handlers" open question (SPEC_FULL.md §9) is that a process-wide
/// `Manager` is spent after teardown, so a further `configure` fails rather
/// than silently resurrecting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManagerState {
    Unconfigured,
    Configured,
    Negotiated,
    Fed,
    TornDown,
}

pub struct Manager {
    config: Option<ManagerConfig>,
    state: ManagerState,
    active: Vec<PluginHandler>,
    data_catalogue: ParameterCatalogue,
    libraries: Vec<std::sync::Arc<LoadedLibrary>>,
    negotiated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl Manager {
    pub fn new() -> Self {
        Manager {
            config: None,
            state: ManagerState::Unconfigured,
            active: Vec::new(),
            data_catalogue: ParameterCatalogue::default(),
            libraries: Vec::new(),
            negotiated_at: None,
        }
    }

    /// Idempotent, matching `Manager::configure`'s `if (!isConfigured_)`
    /// guard: a second call keeps the first config rather than overwriting
    /// it. Fails with *precondition* once the manager has been torn down
    /// (the resolved reading of the "once-only per process" open question).
    pub fn configure(&mut self, config: ManagerConfig) -> Result<()> {
        match self.state {
            ManagerState::TornDown => Err(Error::precondition("manager already torn down, cannot configure again")),
            ManagerState::Unconfigured => {
                self.config = Some(config);
                self.state = ManagerState::Configured;
                Ok(())
            }
            _ => {
                warn!("manager already configured, keeping first configuration");
                Ok(())
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.state != ManagerState::Unconfigured
    }

    /// Loads each configured plugin's library, resolves its `Plugin`
    /// (statically-registered by name or, failing that, dynamically
    /// loaded), negotiates, and activates every plugin the negotiator
    /// accepts. Mirrors `Manager::negotiate`.
    pub fn negotiate(&mut self, offers: &Protocol) -> Result<()> {
        if self.state != ManagerState::Configured {
            return Err(Error::precondition("manager must be configured (and not already negotiated) before negotiate"));
        }
        let config = self.config.clone().expect("configured state implies config is set");

        info!(offers = ?offers.offers().param_names(), "negotiating with configured plugins");

        for pconfig in config.plugins() {
            let name = pconfig.name();
            let lib = pconfig.lib();
            info!(name, lib, "evaluating plugin");

            let plugin = match self.resolve_plugin(pconfig) {
                Ok(plugin) => plugin,
                Err(e) => {
                    warn!(name, lib, error = %e, "plugin library failed to load or resolve, skipping");
                    continue;
                }
            };

            let requires = plugin.negotiate();
            let groups = pconfig.group_names();
            if groups.is_empty() {
                info!(name, "no additional parameter groups found in configuration");
            } else {
                info!(name, ?groups, "parameter groups from configuration");
            }

            let decision: PluginDecision = negotiator::negotiate(offers, &requires, &groups);
            info!(name, accepted = decision.is_accepted(), agreed = ?decision.agreed_names(), "negotiation decision");

            if decision.is_accepted() {
                let handler = PluginHandler::activate(plugin.as_ref(), pconfig.clone(), decision.agreed_names().to_vec())?;
                info!(name, handler_id = %handler.handler_id(), "plugin activated");
                self.active.push(handler);
            }
        }

        self.data_catalogue = offers.offers().clone();
        self.negotiated_at = Some(chrono::Utc::now());
        self.state = ManagerState::Negotiated;
        Ok(())
    }

    /// Wall-clock time of the most recent successful `negotiate` call, for
    /// diagnostics (e.g. a host logging how long configure-to-negotiate
    /// took). Grounded on `examples/PaprikaEngine-OrbitalModulator/src/plugin/manifest.rs`'s
    /// `build_date: chrono::Utc::now().to_rfc3339()` stamp.
    pub fn negotiated_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.negotiated_at
    }

    /// Resolves the `Plugin` named in a config entry: first consults the
    /// statically-linked [`PluginRegistry`] (for plugins compiled into
    /// this binary), then falls back to dynamically loading `lib` and
    /// asking it for a plugin by that name.
    fn resolve_plugin(&mut self, pconfig: &crate::config::PluginConfig) -> Result<Box<dyn crate::plugin::Plugin>> {
        if let Some(plugin) = PluginRegistry::build(pconfig.name()) {
            return Ok(plugin);
        }

        let library = LoadedLibrary::open(pconfig.lib())?;
        let plugin = library.create_plugin()?;
        if plugin.name() != pconfig.name() {
            warn!(
                configured = pconfig.name(),
                actual = plugin.name(),
                "loaded plugin's reported name does not match configuration"
            );
        }
        self.libraries.push(library);
        Ok(plugin)
    }

    /// Filters `data` down to each plugin's agreed share, hands it over,
    /// and calls `setup`. Validates feed-time data with a warning-only
    /// policy first, mirroring `Manager::checkData` /
    /// `DataChecker::checkAllParams` + `checkAlwaysAvailParams`
    /// (`CheckPolicyWarning`, never `CheckPolicyThrow`, per SPEC_FULL.md §6).
    pub fn feed_plugins(&mut self, data: &ModelData) -> Result<()> {
        if self.state != ManagerState::Negotiated {
            return Err(Error::precondition("manager must negotiate before feeding plugins"));
        }

        self.check_data(data);

        for handler in &mut self.active {
            let required = handler.get_required_param_names().to_vec();
            let share = data.filter(&required);
            handler.grab_data(share);
            handler.setup();
        }
        self.state = ManagerState::Fed;
        Ok(())
    }

    /// Warning-only feed-time validation: every requested active parameter
    /// should be present in `data`, and every "always"-availability
    /// parameter in the offered catalogue should be present too. Neither
    /// check aborts the run; both only log.
    fn check_data(&self, data: &ModelData) {
        info!("manager checking data before feeding plugins");

        for name in self.get_active_params() {
            match data.has_parameter(&name, None) {
                Ok(true) => {}
                Ok(false) => warn!(name, "active parameter not present in fed data"),
                Err(e) => warn!(name, error = %e, "active parameter present with unexpected type"),
            }
        }

        for param in self.data_catalogue.params() {
            if param.availability() == crate::parameter::Availability::Always
                && !matches!(data.has_parameter(param.name(), None), Ok(true))
            {
                warn!(name = param.name(), "always-available parameter missing from fed data");
            }
        }

        info!("manager finished checking data");
    }

    /// Precondition: `FED`. May be called any number of times in that state
    /// (SPEC_FULL.md §5, "`run` may be called any number of times between
    /// feeding and teardown").
    pub fn run(&mut self) -> Result<()> {
        if self.state != ManagerState::Fed {
            return Err(Error::precondition("manager must be fed before run"));
        }
        for handler in &mut self.active {
            handler.run()?;
        }
        Ok(())
    }

    /// Idempotent: a second call is a no-op rather than an error, matching
    /// the testable property "`Manager.teardown()` is idempotent". Body
    /// `teardown` is invoked on each active handler exactly once, on the
    /// first call that finds the manager `FED`.
    pub fn teardown(&mut self) {
        if self.state != ManagerState::Fed {
            return;
        }
        for handler in &mut self.active {
            handler.teardown();
        }
        self.state = ManagerState::TornDown;
    }

    pub fn exists(&self, name: &str) -> bool {
        self.active.iter().any(|h| h.plugin_name() == name)
    }

    /// Union of every active plugin's agreed parameter names.
    pub fn get_active_params(&self) -> Vec<String> {
        let mut set = std::collections::BTreeSet::new();
        for handler in &self.active {
            set.extend(handler.get_required_param_names().iter().cloned());
        }
        set.into_iter().collect()
    }

    pub fn get_active_data_catalogue(&self) -> Result<ParameterCatalogue> {
        let names = self.get_active_params();
        self.data_catalogue.filter(&names)
    }

    pub fn is_param_requested(&self, name: &str) -> bool {
        self.get_active_params().iter().any(|p| p == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::Availability;
    use crate::plugin::{Plugin, PluginCore};
    use crate::{register_plugin, register_plugin_core};

    struct EchoCore {
        data: ModelData,
    }

    impl PluginCore for EchoCore {
        fn run(&mut self) -> Result<()> {
            self.data.get_int("I").map(|_| ())
        }

        fn grab_data(&mut self, data: ModelData) {
            self.data = data;
        }

        fn model_data(&self) -> &ModelData {
            &self.data
        }
    }

    register_plugin_core!(
        register_manager_test_core,
        "manager-test-echo-core",
        |_cfg: serde_json::Value| Ok(Box::new(EchoCore { data: ModelData::new() }) as Box<dyn PluginCore>)
    );

    struct EchoPlugin;
    impl Plugin for EchoPlugin {
        fn name(&self) -> &str {
            "manager-test-echo-plugin"
        }
        fn plugincore_name(&self) -> &str {
            "manager-test-echo-core"
        }
        fn negotiate(&self) -> Protocol {
            let mut p = Protocol::new();
            p.require_int("I");
            p
        }
    }

    register_plugin!(register_manager_test_plugin, "manager-test-echo-plugin", || Box::new(EchoPlugin));

    fn manager_config() -> ManagerConfig {
        let toml = r#"
            [[plugins]]
            name = "manager-test-echo-plugin"
            lib = "unused"
        "#;
        ManagerConfig::from_toml_str(toml).unwrap()
    }

    #[test]
    fn full_cycle_activates_statically_registered_plugin() {
        let mut manager = Manager::new();
        assert!(!manager.is_configured());
        manager.configure(manager_config()).unwrap();
        assert!(manager.is_configured());

        let mut offers = Protocol::new();
        offers.offer_int("I", Availability::Always, "");
        manager.negotiate(&offers).unwrap();

        assert!(manager.exists("manager-test-echo-plugin"));
        assert!(manager.is_param_requested("I"));

        let mut data = ModelData::new();
        data.create_int("I", 42).unwrap();
        manager.feed_plugins(&data).unwrap();
        manager.run().unwrap();
        manager.run().unwrap();
        manager.teardown();
        manager.teardown();
        assert!(manager.configure(manager_config()).is_err());
    }

    #[test]
    fn negotiate_before_configure_is_precondition_error() {
        let mut manager = Manager::new();
        let offers = Protocol::new();
        assert!(manager.negotiate(&offers).is_err());
    }

    #[test]
    fn feed_before_negotiate_is_precondition_error() {
        let mut manager = Manager::new();
        manager.configure(ManagerConfig::from_toml_str("plugins = []").unwrap()).unwrap();
        let data = ModelData::new();
        assert!(manager.feed_plugins(&data).is_err());
    }

    #[test]
    fn run_before_feed_is_precondition_error() {
        let mut manager = Manager::new();
        manager.configure(ManagerConfig::from_toml_str("plugins = []").unwrap()).unwrap();
        let offers = Protocol::new();
        manager.negotiate(&offers).unwrap();
        assert!(manager.run().is_err());
    }

    #[test]
    fn second_configure_keeps_first() {
        let mut manager = Manager::new();
        manager.configure(manager_config()).unwrap();
        manager.configure(ManagerConfig::from_toml_str("plugins = []").unwrap()).unwrap();
        assert_eq!(manager.config.as_ref().unwrap().plugins().len(), 1);
    }

    #[test]
    fn unmet_requirement_plugin_is_not_activated() {
        let mut manager = Manager::new();
        manager.configure(manager_config()).unwrap();
        let offers = Protocol::new();
        manager.negotiate(&offers).unwrap();
        assert!(!manager.exists("manager-test-echo-plugin"));
    }

    #[test]
    fn library_load_failure_is_skipped_and_negotiation_continues() {
        let toml = r#"
            [[plugins]]
            name = "not-statically-registered"
            lib = "definitely_not_on_disk_anywhere.so"

            [[plugins]]
            name = "manager-test-echo-plugin"
            lib = "unused"
        "#;
        let mut manager = Manager::new();
        manager.configure(ManagerConfig::from_toml_str(toml).unwrap()).unwrap();

        let mut offers = Protocol::new();
        offers.offer_int("I", Availability::Always, "");

        manager.negotiate(&offers).unwrap();

        assert!(!manager.exists("not-statically-registered"));
        assert!(manager.exists("manager-test-echo-plugin"));
    }
}
