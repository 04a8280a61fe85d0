//! Dynamic loading bridge for out-of-process plugin libraries.
//!
//! Grounded on `examples/PaprikaEngine-OrbitalModulator/src/plugin/loader.rs`
//! and `api.rs`, which load a `.so`/`.dylib`/`.dll` with `libloading`,
//! resolve a handful of `extern "C" fn() -> *mut c_void` entry points, and
//! reconstruct a `Box<_>` on the other side of the boundary via
//! `Box::into_raw`/`Box::from_raw`.
//!
//! That original wraps its raw pointer around a concrete factory type it
//! knows by name (`*mut $factory_type`). We cannot do that here: the whole
//! point of [`crate::plugin::Plugin`]/[`crate::plugin::PluginCore`] is that
//! a plugin crate is built independently from this one. Passing a `Box<dyn
//! Trait>` itself across an `extern "C"` boundary is not ABI-stable in
//! general, but it is sound for a `dylib` built from the exact same
//! compiler and the exact same definition of the trait (the normal case
//! for a Cargo workspace plugin compiled against this crate as a
//! dependency) — the vtable pointer embedded in the fat pointer is valid
//! as long as both sides agree on the trait's layout. We therefore box the
//! already-fat `Box<dyn Trait>` a second time (`Box<Box<dyn Trait>>`),
//! which has a thin, `#[repr(C)]`-safe address, and hand that thin pointer
//! across the FFI boundary instead of trying to pass the fat pointer
//! directly. This is a deliberate simplification of the original's full
//! C-vtable-of-function-pointers approach (SPEC_FULL.md §4.5); see
//! DESIGN.md for the tradeoff.

use std::os::raw::c_void;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::{Library, Symbol};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};
use crate::plugin::{Plugin, PluginCore};

type CreatePluginFn = unsafe extern "C" fn() -> *mut c_void;
type CreatePluginCoreFn = unsafe extern "C" fn(config_json: *const std::os::raw::c_char) -> *mut c_void;

/// Directories searched, in order, for a plugin library named by a bare
/// filename that doesn't resolve as-is: alongside the running executable,
/// under the user's plume plugin directory, then a system-wide one.
/// Grounded on `examples/PaprikaEngine-OrbitalModulator/src/plugin/loader.rs`'s
/// `PluginLoader::new`, which builds the same kind of search list with
/// `dirs::home_dir()`.
fn search_directories() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.join("plugins"));
        }
    }
    if let Some(home_dir) = dirs::home_dir() {
        dirs.push(home_dir.join(".plume").join("plugins"));
    }
    #[cfg(unix)]
    dirs.push(PathBuf::from("/usr/local/share/plume/plugins"));
    dirs
}

/// Resolves `lib` to an on-disk path: as given, or failing that, under
/// each of [`search_directories`] in turn.
fn resolve_library_path(lib: &str) -> PathBuf {
    let candidate = Path::new(lib);
    if candidate.exists() {
        return candidate.to_path_buf();
    }
    for dir in search_directories() {
        let joined = dir.join(lib);
        if joined.exists() {
            return joined;
        }
    }
    candidate.to_path_buf()
}

/// A plugin library kept alive for the remainder of the process. Dropping
/// the contained `Box<dyn Plugin>`/`Box<dyn PluginCore>` values before the
/// `Library` itself would leave dangling vtable pointers, so this struct's
/// field order (and, more importantly, never exposing `library` for
/// reordering) keeps the library the longest-lived component.
pub struct LoadedLibrary {
    library: Library,
    path: String,
}

impl LoadedLibrary {
    /// Loads a `.so`/`.dylib`/`.dll` named `lib`, resolving it against
    /// [`search_directories`] first if it isn't a path that exists as given.
    pub fn open(lib: &str) -> Result<Arc<LoadedLibrary>> {
        let path = resolve_library_path(lib);
        let library = unsafe {
            Library::new(&path).map_err(|e| Error::library_load(format!("cannot load {}: {e}", path.display())))?
        };
        let hash = Self::content_hash(&path, 8).unwrap_or_else(|_| "unknown".to_string());
        debug!(path = %path.display(), sha256 = %hash, "loaded plugin library");
        Ok(Arc::new(LoadedLibrary { library, path: path.display().to_string() }))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// SHA-256 of the library file's bytes, truncated to `count` leading hex
    /// digits: an identifying hash for the library on disk, independent of
    /// whatever the `Plugin::gitsha1` it exposes reports. Grounded on
    /// `examples/PaprikaEngine-OrbitalModulator/src/plugin/manifest.rs`'s
    /// `calculate_file_hash`.
    pub fn content_hash(path: &Path, count: usize) -> Result<String> {
        let bytes = std::fs::read(path).map_err(|e| Error::library_load(format!("cannot hash {}: {e}", path.display())))?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hasher.finalize();
        let hex = format!("{digest:x}");
        Ok(hex.chars().take(count).collect())
    }

    /// Calls the library's `plume_create_plugin` entry point and reclaims
    /// the thin double-box pointer it returns.
    pub fn create_plugin(&self) -> Result<Box<dyn Plugin>> {
        let symbol: Symbol<CreatePluginFn> = unsafe {
            self.library
                .get(b"plume_create_plugin")
                .map_err(|e| Error::library_load(format!("{}: missing plume_create_plugin: {e}", self.path)))?
        };
        let raw = unsafe { symbol() };
        if raw.is_null() {
            return Err(Error::library_load(format!("{}: plume_create_plugin returned null", self.path)));
        }
        let boxed: Box<Box<dyn Plugin>> = unsafe { Box::from_raw(raw as *mut Box<dyn Plugin>) };
        Ok(*boxed)
    }

    /// Calls the library's `plume_create_plugincore` entry point, passing
    /// the plugin's `core-config` value serialized to JSON text.
    pub fn create_plugin_core(&self, config: &serde_json::Value) -> Result<Box<dyn PluginCore>> {
        let symbol: Symbol<CreatePluginCoreFn> = unsafe {
            self.library
                .get(b"plume_create_plugincore")
                .map_err(|e| Error::library_load(format!("{}: missing plume_create_plugincore: {e}", self.path)))?
        };
        let json = serde_json::to_string(config).map_err(|e| Error::library_load(e.to_string()))?;
        let c_json = std::ffi::CString::new(json).map_err(|e| Error::library_load(e.to_string()))?;
        let raw = unsafe { symbol(c_json.as_ptr()) };
        if raw.is_null() {
            return Err(Error::library_load(format!("{}: plume_create_plugincore returned null", self.path)));
        }
        let boxed: Box<Box<dyn PluginCore>> = unsafe { Box::from_raw(raw as *mut Box<dyn PluginCore>) };
        Ok(*boxed)
    }
}

/// Implements a dynamically-loadable plugin crate's two required entry
/// points in terms of constructor expressions supplied by the plugin
/// author. Mirrors the `plugin_main!` macro in `api.rs`, adapted
/// to hand back the double-boxed trait object instead of a concrete
/// factory pointer.
#[macro_export]
macro_rules! plume_plugin_entry_points {
    ($plugin_ctor:expr, $core_ctor:expr) => {
        #[no_mangle]
        pub extern "C" fn plume_create_plugin() -> *mut ::std::os::raw::c_void {
            let plugin: ::std::boxed::Box<dyn $crate::plugin::Plugin> = $plugin_ctor;
            ::std::boxed::Box::into_raw(::std::boxed::Box::new(plugin)) as *mut ::std::os::raw::c_void
        }

        #[no_mangle]
        pub extern "C" fn plume_create_plugincore(
            config_json: *const ::std::os::raw::c_char,
        ) -> *mut ::std::os::raw::c_void {
            let text = unsafe { ::std::ffi::CStr::from_ptr(config_json) }.to_string_lossy().into_owned();
            let config: ::serde_json::Value = ::serde_json::from_str(&text).unwrap_or(::serde_json::Value::Null);
            let core: ::std::boxed::Box<dyn $crate::plugin::PluginCore> = $core_ctor(config);
            ::std::boxed::Box::into_raw(::std::boxed::Box::new(core)) as *mut ::std::os::raw::c_void
        }
    };
}
