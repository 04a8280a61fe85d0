//! The `Plugin` / `PluginCore` abstractions and their process-wide registries.
//!
//! Grounded on `examples/original_source/src/plume/Plugin.h`/`.cc` and
//! `PluginCore.h`/`.cc`. The C++ originals use virtual inheritance plus a
//! template `PluginCoreBuilder<T>` whose constructor/destructor
//! register/deregister a static instance with `PluginCoreFactory`. This
//! module keeps the same shape with Rust idioms: trait objects instead of
//! virtual dispatch, and a `Mutex`-guarded registry behind a `OnceLock`
//! instead of a function-local `static` (SPEC_FULL.md §4.5, "Rust
//! realization").

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use tracing::debug;

use crate::error::{Error, Result};
use crate::model_data::ModelData;
use crate::protocol::Protocol;

/// Lifecycle hooks `init`/`finalise` default to no-op, matching the C++
/// base class.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        ""
    }

    fn gitsha1(&self, _count: usize) -> String {
        "undefined".to_string()
    }

    /// The registry key of this plugin's [`PluginCore`] body.
    fn plugincore_name(&self) -> &str;

    /// The plugin's intrinsic requirements.
    fn negotiate(&self) -> Protocol;

    fn init(&mut self) {}

    fn finalise(&mut self) {}
}

/// The executable body instantiated for an accepted plugin. Subclasses
/// override `setup`/`run`/`teardown`; `run` is mandatory. `grab_data` and
/// `model_data` stand in for the C++ base class's `modelData_` member and
/// its `grabData`/`modelData()` accessors — every implementor stores its
/// own [`ModelData`] field and wires these two methods to it.
pub trait PluginCore: Send {
    fn setup(&mut self) {}

    fn run(&mut self) -> Result<()>;

    fn teardown(&mut self) {}

    fn grab_data(&mut self, data: ModelData);

    fn model_data(&self) -> &ModelData;
}

type CoreBuilderFn = dyn Fn(serde_json::Value) -> Result<Box<dyn PluginCore>> + Send + Sync;

/// Process-wide registry mapping a `PluginCore` type name to its builder.
/// Builders self-register at library load via the [`register_plugin_core`]
/// macro (backed by `ctor`), mirroring the C++ `PluginCoreBuilderBase`
/// constructor enregistering itself with `PluginCoreFactory::instance()`.
pub struct PluginCoreFactory;

fn core_registry() -> &'static Mutex<HashMap<String, Box<CoreBuilderFn>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Box<CoreBuilderFn>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

impl PluginCoreFactory {
    /// Register a builder under `name`. Asserts uniqueness, matching the
    /// C++ `ASSERT(builders_.find(name) == builders_.end())`.
    pub fn register(name: impl Into<String>, builder: Box<CoreBuilderFn>) {
        let name = name.into();
        let mut registry = core_registry().lock().expect("plugincore factory mutex poisoned");
        assert!(!registry.contains_key(&name), "PluginCore builder already registered for '{name}'");
        registry.insert(name, builder);
    }

    /// Rust realization of the C++ builder destructor's `deregister`: used
    /// by tests to undo a registration without waiting for process exit.
    pub fn deregister(name: &str) {
        let mut registry = core_registry().lock().expect("plugincore factory mutex poisoned");
        registry.remove(name);
    }

    pub fn list_registered() -> Vec<String> {
        core_registry().lock().expect("plugincore factory mutex poisoned").keys().cloned().collect()
    }

    pub fn build(name: &str, config: serde_json::Value) -> Result<Box<dyn PluginCore>> {
        let registry = core_registry().lock().expect("plugincore factory mutex poisoned");
        let builder = registry
            .get(name)
            .ok_or_else(|| Error::not_found(format!("no PluginCore builder registered for '{name}'")))?;
        builder(config)
    }
}

/// Registers a `PluginCore` builder under `T::type_name()` at process
/// startup, via `ctor`. `$ctor_fn` must be a unique identifier (the macro
/// generates a function with that name).
#[macro_export]
macro_rules! register_plugin_core {
    ($ctor_fn:ident, $name:expr, $builder:expr) => {
        #[::ctor::ctor]
        fn $ctor_fn() {
            $crate::plugin::PluginCoreFactory::register($name, ::std::boxed::Box::new($builder));
        }
    };
}

type PluginBuilderFn = dyn Fn() -> Box<dyn Plugin> + Send + Sync;

/// Process-wide registry of statically-linked [`Plugin`] instances, keyed
/// by the plugin's registered name (as used in `PluginConfig::name`). This
/// has no direct C++ counterpart — the original resolves `Plugin` objects
/// through `eckit::system::LibraryManager`'s own static plugin registry,
/// which this registry replaces for the "statically-linked body" admission
/// path described in SPEC_FULL.md §4.5.
pub struct PluginRegistry;

fn plugin_registry() -> &'static Mutex<HashMap<String, Box<PluginBuilderFn>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Box<PluginBuilderFn>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

impl PluginRegistry {
    pub fn register(name: impl Into<String>, builder: Box<PluginBuilderFn>) {
        let name = name.into();
        let mut registry = plugin_registry().lock().expect("plugin registry mutex poisoned");
        assert!(!registry.contains_key(&name), "Plugin already registered under '{name}'");
        registry.insert(name, builder);
    }

    pub fn deregister(name: &str) {
        let mut registry = plugin_registry().lock().expect("plugin registry mutex poisoned");
        registry.remove(name);
    }

    pub fn build(name: &str) -> Option<Box<dyn Plugin>> {
        let registry = plugin_registry().lock().expect("plugin registry mutex poisoned");
        let builder = registry.get(name)?;
        debug!(name, "instantiated statically-linked plugin");
        Some(builder())
    }

    pub fn list_registered() -> Vec<String> {
        plugin_registry().lock().expect("plugin registry mutex poisoned").keys().cloned().collect()
    }
}

/// Registers a `Plugin` under `$name` at process startup.
#[macro_export]
macro_rules! register_plugin {
    ($ctor_fn:ident, $name:expr, $builder:expr) => {
        #[::ctor::ctor]
        fn $ctor_fn() {
            $crate::plugin::PluginRegistry::register($name, ::std::boxed::Box::new($builder));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as CrateResult;

    struct EchoCore {
        data: ModelData,
    }

    impl PluginCore for EchoCore {
        fn run(&mut self) -> CrateResult<()> {
            self.data.get_int("I").map(|_| ())
        }

        fn grab_data(&mut self, data: ModelData) {
            self.data = data;
        }

        fn model_data(&self) -> &ModelData {
            &self.data
        }
    }

    #[test]
    fn factory_builds_registered_name() {
        PluginCoreFactory::register(
            "test-echo-core",
            Box::new(|_cfg| Ok(Box::new(EchoCore { data: ModelData::new() }) as Box<dyn PluginCore>)),
        );
        let mut core = PluginCoreFactory::build("test-echo-core", serde_json::Value::Null).unwrap();
        core.grab_data({
            let mut d = ModelData::new();
            d.create_int("I", 1).unwrap();
            d
        });
        assert!(core.run().is_ok());
        PluginCoreFactory::deregister("test-echo-core");
    }

    #[test]
    fn factory_build_unregistered_name_is_not_found() {
        assert!(PluginCoreFactory::build("no-such-core", serde_json::Value::Null).is_err());
    }

    #[test]
    fn plugin_registry_round_trip() {
        struct Dummy;
        impl Plugin for Dummy {
            fn name(&self) -> &str {
                "dummy"
            }
            fn plugincore_name(&self) -> &str {
                "dummy-core"
            }
            fn negotiate(&self) -> Protocol {
                Protocol::new()
            }
        }
        PluginRegistry::register("test-dummy-plugin", Box::new(|| Box::new(Dummy)));
        let plugin = PluginRegistry::build("test-dummy-plugin").unwrap();
        assert_eq!(plugin.name(), "dummy");
        PluginRegistry::deregister("test-dummy-plugin");
    }
}
