//! Heterogeneous named container of parameter *values*.
//!
//! Grounded on `examples/original_source/src/plume/data/ModelData.h`/`.cc`
//! and `Parameter.h`'s `ParameterValue` hierarchy. The C++ original stores a
//! `void*` with a runtime type tag and reinterpret-casts on access (its own
//! comment calls this "unsafe, temporary solution only"). The Rust
//! realization replaces that with a closed tagged-sum enum and
//! `Arc<Mutex<_>>` cells (§3, "Rust realization" note in SPEC_FULL.md) so
//! that `filter` shares storage safely instead of by convention.

use std::collections::HashMap;
use std::os::raw::c_void;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::error::{Error, Result};
use crate::parameter::{ParameterCatalogue, ParameterType};

/// A scalar cell: either owned by the core or borrowed from host memory.
///
/// Borrowed cells hold a raw pointer into memory the host guarantees stays
/// alive and stable for the run; this mirrors the original's pointer
/// semantics exactly (`provideT` is documented as "host keeps target alive
/// and stable for the full run").
enum ScalarCell<T> {
    Owned(T),
    Borrowed(*mut T),
}

// SAFETY: the orchestrator is single-threaded by contract (SPEC_FULL §5);
// cells are never accessed from two threads concurrently. The raw pointer
// variant only ever aliases host memory the host has promised not to free
// or invalidate while a run is in progress.
unsafe impl<T> Send for ScalarCell<T> {}

impl<T: Copy> ScalarCell<T> {
    fn get(&self) -> T {
        match self {
            ScalarCell::Owned(v) => *v,
            ScalarCell::Borrowed(ptr) => unsafe { **ptr },
        }
    }

    fn owns(&self) -> bool {
        matches!(self, ScalarCell::Owned(_))
    }

    fn update(&mut self, v: T) -> Result<()> {
        match self {
            ScalarCell::Owned(slot) => {
                *slot = v;
                Ok(())
            }
            ScalarCell::Borrowed(_) => Err(Error::unowned_mutation("update on a borrowed cell")),
        }
    }
}

impl ScalarCell<String> {
    fn get_string(&self) -> String {
        match self {
            ScalarCell::Owned(v) => v.clone(),
            ScalarCell::Borrowed(ptr) => unsafe { (**ptr).clone() },
        }
    }

    fn update_string(&mut self, v: String) -> Result<()> {
        match self {
            ScalarCell::Owned(slot) => {
                *slot = v;
                Ok(())
            }
            ScalarCell::Borrowed(_) => Err(Error::unowned_mutation("update on a borrowed cell")),
        }
    }
}

/// An opaque, reference-counted handle to an external gridded field.
/// `Arc` cloning stands in for "that external library's own" refcounting
/// discipline; the core never dereferences the raw pointer itself.
#[derive(Clone)]
pub struct FieldHandle(Arc<*mut c_void>);

// SAFETY: the pointer is opaque to this crate; it is never read or written,
// only carried. The external field library is responsible for thread safety
// of whatever it points to.
unsafe impl Send for FieldHandle {}
unsafe impl Sync for FieldHandle {}

impl FieldHandle {
    pub fn from_raw(ptr: *mut c_void) -> Result<Self> {
        if ptr.is_null() {
            return Err(Error::bad_value("atlas field handle must be non-null"));
        }
        Ok(FieldHandle(Arc::new(ptr)))
    }

    pub fn as_raw(&self) -> *mut c_void {
        *self.0
    }
}

/// A tagged cell carrying one of the scalar types or an external field
/// handle. The type tag never changes after construction.
pub enum ParameterValue {
    Int(ScalarCell<i64>),
    Bool(ScalarCell<bool>),
    Float(ScalarCell<f32>),
    Double(ScalarCell<f64>),
    String(ScalarCell<String>),
    AtlasField(FieldHandle),
}

impl ParameterValue {
    pub fn ptype(&self) -> ParameterType {
        match self {
            ParameterValue::Int(_) => ParameterType::Int,
            ParameterValue::Bool(_) => ParameterType::Bool,
            ParameterValue::Float(_) => ParameterType::Float,
            ParameterValue::Double(_) => ParameterType::Double,
            ParameterValue::String(_) => ParameterType::String,
            ParameterValue::AtlasField(_) => ParameterType::AtlasField,
        }
    }

    pub fn owns(&self) -> bool {
        match self {
            ParameterValue::Int(c) => c.owns(),
            ParameterValue::Bool(c) => c.owns(),
            ParameterValue::Float(c) => c.owns(),
            ParameterValue::Double(c) => c.owns(),
            ParameterValue::String(c) => c.owns(),
            ParameterValue::AtlasField(_) => true,
        }
    }
}

type Cell = Arc<Mutex<ParameterValue>>;

/// Mapping from name to [`ParameterValue`] (names unique, insertion order
/// irrelevant). `filter` shares the underlying cells rather than copying
/// them.
#[derive(Clone, Default)]
pub struct ModelData {
    values: HashMap<String, Cell>,
}

macro_rules! scalar_ops {
    ($ty:ty, $variant:ident, $provide:ident, $create:ident, $update:ident, $get:ident) => {
        pub fn $provide(&mut self, name: impl Into<String>, ptr: *mut $ty) -> Result<()> {
            self.insert_cell(name.into(), ParameterValue::$variant(ScalarCell::Borrowed(ptr)))
        }

        pub fn $create(&mut self, name: impl Into<String>, init: $ty) -> Result<()> {
            self.insert_cell(name.into(), ParameterValue::$variant(ScalarCell::Owned(init)))
        }

        pub fn $update(&mut self, name: &str, v: $ty) -> Result<()> {
            let cell = self.get_cell(name)?;
            let mut guard = cell.lock().expect("model data mutex poisoned");
            match &mut *guard {
                ParameterValue::$variant(c) => c.update(v),
                _ => Err(Error::type_mismatch(format!("'{name}' is not {}", stringify!($variant)))),
            }
        }

        pub fn $get(&self, name: &str) -> Result<$ty> {
            let cell = self.get_cell(name)?;
            let guard = cell.lock().expect("model data mutex poisoned");
            match &*guard {
                ParameterValue::$variant(c) => Ok(c.get()),
                _ => Err(Error::type_mismatch(format!("'{name}' is not {}", stringify!($variant)))),
            }
        }
    };
}

impl ModelData {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_cell(&mut self, name: String, value: ParameterValue) -> Result<()> {
        if self.values.contains_key(&name) {
            warn!(name, "duplicate model data insert ignored, first kept");
            return Ok(());
        }
        self.values.insert(name, Arc::new(Mutex::new(value)));
        Ok(())
    }

    fn get_cell(&self, name: &str) -> Result<&Cell> {
        self.values
            .get(name)
            .ok_or_else(|| Error::not_found(format!("no such parameter in model data: {name}")))
    }

    scalar_ops!(i64, Int, provide_int, create_int, update_int, get_int);
    scalar_ops!(bool, Bool, provide_bool, create_bool, update_bool, get_bool);
    scalar_ops!(f32, Float, provide_float, create_float, update_float, get_float);
    scalar_ops!(f64, Double, provide_double, create_double, update_double, get_double);

    pub fn provide_string(&mut self, name: impl Into<String>, ptr: *mut String) -> Result<()> {
        self.insert_cell(name.into(), ParameterValue::String(ScalarCell::Borrowed(ptr)))
    }

    pub fn create_string(&mut self, name: impl Into<String>, init: String) -> Result<()> {
        self.insert_cell(name.into(), ParameterValue::String(ScalarCell::Owned(init)))
    }

    pub fn update_string(&mut self, name: &str, v: String) -> Result<()> {
        let cell = self.get_cell(name)?;
        let mut guard = cell.lock().expect("model data mutex poisoned");
        match &mut *guard {
            ParameterValue::String(c) => c.update_string(v),
            _ => Err(Error::type_mismatch(format!("'{name}' is not STRING"))),
        }
    }

    pub fn get_string(&self, name: &str) -> Result<String> {
        let cell = self.get_cell(name)?;
        let guard = cell.lock().expect("model data mutex poisoned");
        match &*guard {
            ParameterValue::String(c) => Ok(c.get_string()),
            _ => Err(Error::type_mismatch(format!("'{name}' is not STRING"))),
        }
    }

    /// Precondition: `handle` must wrap a non-null pointer (checked by
    /// [`FieldHandle::from_raw`] before this is ever called).
    pub fn provide_atlas_field_shared(&mut self, name: impl Into<String>, handle: FieldHandle) -> Result<()> {
        self.insert_cell(name.into(), ParameterValue::AtlasField(handle))
    }

    /// Ref-count increments on return, since `FieldHandle` clones its `Arc`.
    pub fn get_atlas_field_shared(&self, name: &str) -> Result<FieldHandle> {
        let cell = self.get_cell(name)?;
        let guard = cell.lock().expect("model data mutex poisoned");
        match &*guard {
            ParameterValue::AtlasField(h) => Ok(h.clone()),
            _ => Err(Error::type_mismatch(format!("'{name}' is not ATLAS_FIELD"))),
        }
    }

    pub fn has_parameter(&self, name: &str, ptype: Option<ParameterType>) -> Result<bool> {
        let Some(cell) = self.values.get(name) else {
            return Ok(false);
        };
        match ptype {
            None => Ok(true),
            Some(expected) => {
                let guard = cell.lock().expect("model data mutex poisoned");
                if guard.ptype() == expected {
                    Ok(true)
                } else {
                    Err(Error::type_mismatch(format!(
                        "'{name}' is present but has type {:?}, expected {:?}",
                        guard.ptype(),
                        expected
                    )))
                }
            }
        }
    }

    /// A new `ModelData` sharing the same cells as `self`. Any name not
    /// present in `self` is silently skipped (matches `ModelData::filter`,
    /// which warns-and-skips rather than failing, unlike
    /// `ParameterCatalogue::filter`).
    pub fn filter(&self, names: &[String]) -> ModelData {
        let mut out = ModelData::new();
        for name in names {
            match self.values.get(name) {
                Some(cell) => {
                    out.values.insert(name.clone(), Arc::clone(cell));
                }
                None => warn!(name, "model data filter: parameter not present, skipped"),
            }
        }
        out
    }

    pub fn filter_catalogue(&self, catalogue: &ParameterCatalogue) -> ModelData {
        self.filter(&catalogue.param_names())
    }

    pub fn names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    pub fn list_available_parameters(&self, type_filter: Option<ParameterType>) -> Vec<String> {
        self.values
            .iter()
            .filter(|(_, cell)| {
                type_filter
                    .map(|t| cell.lock().expect("model data mutex poisoned").ptype() == t)
                    .unwrap_or(true)
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn print(&self) -> String {
        let mut out = String::new();
        for (name, cell) in &self.values {
            let guard = cell.lock().expect("model data mutex poisoned");
            out.push_str(&format!("{name}: {}\n", guard.ptype().as_str()));
        }
        out
    }
}

/// Convenience alias used where the C ABI needs a plain name→type map
/// without locking into the cell representation (e.g. reporting active
/// parameters to a non-Rust caller).
pub type NameTypeMap = HashMap<String, ParameterType>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provide_then_get_reads_through_pointer() {
        let mut host_value: i64 = 42;
        let mut data = ModelData::new();
        data.provide_int("I", &mut host_value as *mut i64).unwrap();
        assert_eq!(data.get_int("I").unwrap(), 42);
        host_value = 100;
        assert_eq!(data.get_int("I").unwrap(), 100);
    }

    #[test]
    fn update_on_borrowed_cell_fails() {
        let mut host_value: i64 = 0;
        let mut data = ModelData::new();
        data.provide_int("I", &mut host_value as *mut i64).unwrap();
        assert!(data.update_int("I", 5).is_err());
    }

    #[test]
    fn create_then_update_then_get_roundtrips() {
        let mut data = ModelData::new();
        data.create_int("I", 1).unwrap();
        data.update_int("I", 2).unwrap();
        assert_eq!(data.get_int("I").unwrap(), 2);
    }

    #[test]
    fn wrong_type_get_is_type_mismatch() {
        let mut data = ModelData::new();
        data.create_int("I", 1).unwrap();
        assert!(data.get_float("I").is_err());
    }

    #[test]
    fn filter_shares_cells_mutation_visible_everywhere() {
        let mut data = ModelData::new();
        data.create_int("I", 1).unwrap();
        data.create_int("J", 2).unwrap();
        let view = data.filter(&["I".to_string()]);
        data.update_int("I", 99).unwrap();
        assert_eq!(view.get_int("I").unwrap(), 99);
    }

    #[test]
    fn filter_skips_missing_names_without_failing() {
        let mut data = ModelData::new();
        data.create_int("I", 1).unwrap();
        let view = data.filter(&["I".to_string(), "NOPE".to_string()]);
        assert_eq!(view.names(), vec!["I".to_string()]);
    }

    #[test]
    fn has_parameter_with_wrong_type_is_an_error() {
        let mut data = ModelData::new();
        data.create_int("I", 1).unwrap();
        assert!(data.has_parameter("I", Some(ParameterType::Float)).is_err());
        assert!(data.has_parameter("I", Some(ParameterType::Int)).unwrap());
        assert!(!data.has_parameter("NOPE", None).unwrap());
    }
}
