//! Runtime plugin orchestrator for numerical weather prediction model
//! components: negotiates a protocol between a host and a set of
//! configured plugins, then drives their feed/run/teardown cycle.
//!
//! Grounded throughout on `examples/original_source/src/plume/` (the
//! upstream C++ `plume` library this crate reimplements) and on
//! `examples/PaprikaEngine-OrbitalModulator` for the Rust-native shape of
//! the plugin/dynamic-loading/config/error/logging layers. See
//! `DESIGN.md` for the full grounding ledger.

pub mod config;
pub mod dynload;
pub mod error;
pub mod ffi;
pub mod handler;
pub mod manager;
pub mod model_data;
pub mod negotiator;
pub mod parameter;
pub mod plugin;
pub mod protocol;
pub mod version;

pub use config::{ManagerConfig, PluginConfig};
pub use error::{Error, Result};
pub use handler::PluginHandler;
pub use manager::Manager;
pub use model_data::{FieldHandle, ModelData};
pub use negotiator::{negotiate, Group, PluginDecision};
pub use parameter::{Availability, Parameter, ParameterCatalogue, ParameterDescriptor, ParameterType};
pub use plugin::{Plugin, PluginCore, PluginCoreFactory, PluginRegistry};
pub use protocol::{Protocol, ProtocolConfig};
pub use version::LibVersion;
