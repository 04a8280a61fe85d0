//! C ABI surface: opaque handles plus `extern "C"` entry points mirroring
//! `examples/original_source/src/plume/api/plume.h`.
//!
//! Every entry point returns an `int` error code (`PLUME_SUCCESS = 0`,
//! `PLUME_ERROR_GENERAL_EXCEPTION = 1`, `PLUME_ERROR_UNKNOWN_EXCEPTION =
//! 2`) instead of throwing, since C has no exceptions to catch. Each
//! function body is wrapped in [`std::panic::catch_unwind`] so a Rust
//! panic can never unwind across the FFI boundary (undefined behaviour in
//! C); a caught panic reports `2`, matching the original's "unknown
//! exception" bucket. A thread-local holds the text of the last error for
//! [`plume_error_string`], and a process-wide failure handler callback can
//! be registered via [`plume_set_failure_handler`], mirroring the header's
//! `plume_failure_handler_t` contract.

#![allow(non_camel_case_types)]

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::{Mutex, OnceLock};

use tracing::error;

use crate::error::Error;
use crate::manager::Manager;
use crate::model_data::ModelData;
use crate::parameter::Availability;
use crate::protocol::Protocol;

pub const PLUME_SUCCESS: i32 = 0;
pub const PLUME_ERROR_GENERAL_EXCEPTION: i32 = 1;
pub const PLUME_ERROR_UNKNOWN_EXCEPTION: i32 = 2;

thread_local! {
    static LAST_ERROR: RefCell<String> = RefCell::new(String::new());
}

type FailureHandler = extern "C" fn(*mut c_void, i32);

struct FailureHandlerSlot {
    handler: Option<FailureHandler>,
    context: *mut c_void,
}

// SAFETY: the context pointer is opaque to us and handed back verbatim to
// the caller-supplied handler; the caller is responsible for its safety
// across threads, exactly as in the C original.
unsafe impl Send for FailureHandlerSlot {}

fn failure_handler_slot() -> &'static Mutex<FailureHandlerSlot> {
    static SLOT: OnceLock<Mutex<FailureHandlerSlot>> = OnceLock::new();
    SLOT.get_or_init(|| Mutex::new(FailureHandlerSlot { handler: None, context: ptr::null_mut() }))
}

fn set_last_error(message: impl Into<String>) {
    let message = message.into();
    error!(%message, "plume FFI call failed");
    LAST_ERROR.with(|slot| *slot.borrow_mut() = message);
}

fn notify_failure(code: i32) {
    let slot = failure_handler_slot().lock().expect("failure handler mutex poisoned");
    if let Some(handler) = slot.handler {
        handler(slot.context, code);
    }
}

fn code_for_error(err: &Error) -> i32 {
    if err.is_domain_error() {
        PLUME_ERROR_GENERAL_EXCEPTION
    } else {
        PLUME_ERROR_UNKNOWN_EXCEPTION
    }
}

/// Runs `body`, converting `Err`/panics into the 0/1/2 envelope and
/// recording the failure for [`plume_error_string`] / the failure handler.
fn guard<F: FnOnce() -> crate::error::Result<()>>(body: F) -> i32 {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(())) => PLUME_SUCCESS,
        Ok(Err(e)) => {
            let code = code_for_error(&e);
            set_last_error(e.to_string());
            notify_failure(code);
            code
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            set_last_error(message);
            notify_failure(PLUME_ERROR_UNKNOWN_EXCEPTION);
            PLUME_ERROR_UNKNOWN_EXCEPTION
        }
    }
}

/// Borrows a C string argument. Callers must ensure `ptr` is a valid,
/// NUL-terminated string for the duration of the call.
unsafe fn borrow_str<'a>(ptr: *const c_char) -> crate::error::Result<&'a str> {
    if ptr.is_null() {
        return Err(Error::bad_value("unexpected null string argument"));
    }
    CStr::from_ptr(ptr).to_str().map_err(|e| Error::bad_value(format!("argument is not valid UTF-8: {e}")))
}

unsafe fn borrow_mut<'a, T>(ptr: *mut T, what: &str) -> crate::error::Result<&'a mut T> {
    ptr.as_mut().ok_or_else(|| Error::bad_value(format!("null {what} handle")))
}

#[no_mangle]
pub extern "C" fn plume_error_string(err: i32) -> *const c_char {
    const GENERIC_SUCCESS: &[u8] = b"success\0";
    const GENERIC_DOMAIN: &[u8] = b"plume error\0";
    const GENERIC_UNKNOWN: &[u8] = b"unknown exception\0";
    let generic_bytes = match err {
        PLUME_SUCCESS => GENERIC_SUCCESS,
        PLUME_ERROR_GENERAL_EXCEPTION => GENERIC_DOMAIN,
        _ => GENERIC_UNKNOWN,
    };
    let generic = CStr::from_bytes_with_nul(generic_bytes).expect("static nul-terminated string");
    let detail = LAST_ERROR.with(|slot| slot.borrow().clone());
    if detail.is_empty() {
        return generic.as_ptr();
    }
    // Leaked intentionally: the C caller owns no cleanup contract for this
    // pointer per the header, and the message is short-lived in practice
    // (one FFI call's worth of detail).
    CString::new(detail).map(CString::into_raw).map(|p| p as *const c_char).unwrap_or_else(|| generic.as_ptr())
}

#[no_mangle]
pub extern "C" fn plume_set_failure_handler(handler: FailureHandler, context: *mut c_void) -> i32 {
    let mut slot = failure_handler_slot().lock().expect("failure handler mutex poisoned");
    slot.handler = Some(handler);
    slot.context = context;
    PLUME_SUCCESS
}

#[no_mangle]
pub extern "C" fn plume_initialise(_argc: i32, _argv: *mut *mut c_char) -> i32 {
    PLUME_SUCCESS
}

#[no_mangle]
pub extern "C" fn plume_finalise() -> i32 {
    PLUME_SUCCESS
}

/* --- Opaque handles --- */

pub struct plume_protocol_handle_t(Protocol);
pub struct plume_manager_handle_t(Manager);
pub struct plume_data_handle_t(ModelData);

/* --- Protocol --- */

#[no_mangle]
pub unsafe extern "C" fn plume_protocol_create_handle(h: *mut *mut plume_protocol_handle_t) -> i32 {
    guard(|| {
        let out = borrow_mut(h, "out-handle")?;
        *out = Box::into_raw(Box::new(plume_protocol_handle_t(Protocol::new())));
        Ok(())
    })
}

macro_rules! protocol_offer_fn {
    ($name:ident, $builder:ident) => {
        #[no_mangle]
        pub unsafe extern "C" fn $name(
            h: *mut plume_protocol_handle_t,
            name: *const c_char,
            avail: *const c_char,
            comment: *const c_char,
        ) -> i32 {
            guard(|| {
                let handle = borrow_mut(h, "protocol")?;
                let name = borrow_str(name)?.to_string();
                let avail = Availability::parse(borrow_str(avail)?)?;
                let comment = borrow_str(comment)?.to_string();
                handle.0.$builder(name, avail, comment);
                Ok(())
            })
        }
    };
}

protocol_offer_fn!(plume_protocol_offer_int, offer_int);
protocol_offer_fn!(plume_protocol_offer_bool, offer_bool);
protocol_offer_fn!(plume_protocol_offer_float, offer_float);
protocol_offer_fn!(plume_protocol_offer_double, offer_double);
protocol_offer_fn!(plume_protocol_offer_string, offer_string);
protocol_offer_fn!(plume_protocol_offer_atlas_field, offer_atlas_field);

macro_rules! protocol_require_fn {
    ($name:ident, $builder:ident) => {
        #[no_mangle]
        pub unsafe extern "C" fn $name(h: *mut plume_protocol_handle_t, name: *const c_char) -> i32 {
            guard(|| {
                let handle = borrow_mut(h, "protocol")?;
                let name = borrow_str(name)?.to_string();
                handle.0.$builder(name);
                Ok(())
            })
        }
    };
}

protocol_require_fn!(plume_protocol_require_int, require_int);
protocol_require_fn!(plume_protocol_require_bool, require_bool);
protocol_require_fn!(plume_protocol_require_float, require_float);
protocol_require_fn!(plume_protocol_require_double, require_double);
protocol_require_fn!(plume_protocol_require_string, require_string);
protocol_require_fn!(plume_protocol_require_atlas_field, require_atlas_field);

#[no_mangle]
pub unsafe extern "C" fn plume_protocol_delete_handle(h: *mut plume_protocol_handle_t) -> i32 {
    guard(|| {
        if !h.is_null() {
            drop(Box::from_raw(h));
        }
        Ok(())
    })
}

/* --- Manager --- */

#[no_mangle]
pub unsafe extern "C" fn plume_manager_create_handle(h: *mut *mut plume_manager_handle_t) -> i32 {
    guard(|| {
        let out = borrow_mut(h, "out-handle")?;
        *out = Box::into_raw(Box::new(plume_manager_handle_t(Manager::new())));
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn plume_manager_configure(h: *mut plume_manager_handle_t, config_path: *const c_char) -> i32 {
    guard(|| {
        let handle = borrow_mut(h, "manager")?;
        let path = borrow_str(config_path)?;
        let config = crate::config::ManagerConfig::from_path(std::path::Path::new(path))?;
        handle.0.configure(config)
    })
}

#[no_mangle]
pub unsafe extern "C" fn plume_manager_negotiate(h: *mut plume_manager_handle_t, p: *mut plume_protocol_handle_t) -> i32 {
    guard(|| {
        let handle = borrow_mut(h, "manager")?;
        let protocol = borrow_mut(p, "protocol")?;
        handle.0.negotiate(&protocol.0)
    })
}

#[no_mangle]
pub unsafe extern "C" fn plume_manager_feed_plugins(h: *mut plume_manager_handle_t, fdata: *mut plume_data_handle_t) -> i32 {
    guard(|| {
        let handle = borrow_mut(h, "manager")?;
        let data = borrow_mut(fdata, "data")?;
        handle.0.feed_plugins(&data.0)
    })
}

#[no_mangle]
pub unsafe extern "C" fn plume_manager_active_fields(h: *mut plume_manager_handle_t, str_in: *mut *mut c_char) -> i32 {
    guard(|| {
        let handle = borrow_mut(h, "manager")?;
        let out = borrow_mut(str_in, "out-string")?;
        let csv = handle.0.get_active_params().join(",");
        let c_string = CString::new(csv).map_err(|e| Error::bad_value(e.to_string()))?;
        *out = c_string.into_raw();
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn plume_manager_active_data_catalogue(
    h: *mut plume_manager_handle_t,
    active_data_catalogue: *mut *mut c_void,
) -> i32 {
    guard(|| {
        let handle = borrow_mut(h, "manager")?;
        let out = borrow_mut(active_data_catalogue, "out-catalogue")?;
        let catalogue = handle.0.get_active_data_catalogue()?;
        *out = Box::into_raw(Box::new(catalogue)) as *mut c_void;
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn plume_manager_is_param_requested(
    h: *mut plume_manager_handle_t,
    name: *const c_char,
    requested: *mut bool,
) -> i32 {
    guard(|| {
        let handle = borrow_mut(h, "manager")?;
        let name = borrow_str(name)?;
        let out = borrow_mut(requested, "out-bool")?;
        *out = handle.0.is_param_requested(name);
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn plume_manager_run(h: *mut plume_manager_handle_t) -> i32 {
    guard(|| {
        let handle = borrow_mut(h, "manager")?;
        handle.0.run()
    })
}

#[no_mangle]
pub unsafe extern "C" fn plume_manager_teardown(h: *mut plume_manager_handle_t) -> i32 {
    guard(|| {
        let handle = borrow_mut(h, "manager")?;
        handle.0.teardown();
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn plume_manager_delete_handle(h: *mut plume_manager_handle_t) -> i32 {
    guard(|| {
        if !h.is_null() {
            drop(Box::from_raw(h));
        }
        Ok(())
    })
}

/* --- Data --- */

#[no_mangle]
pub unsafe extern "C" fn plume_data_create_handle_t(h: *mut *mut plume_data_handle_t) -> i32 {
    guard(|| {
        let out = borrow_mut(h, "out-handle")?;
        *out = Box::into_raw(Box::new(plume_data_handle_t(ModelData::new())));
        Ok(())
    })
}

/// Wraps a `ModelData` the caller already owns (e.g. a pointer obtained
/// from an earlier in-process `Box::into_raw(Box::new(ModelData::new()))`)
/// into a handle, taking ownership of it. Distinct from
/// `plume_data_create_handle_t`, which allocates a fresh empty one.
#[no_mangle]
pub unsafe extern "C" fn plume_data_create_handle_from_ptr(h: *mut *mut plume_data_handle_t, cptr: *mut c_void) -> i32 {
    guard(|| {
        let out = borrow_mut(h, "out-handle")?;
        let data = *Box::from_raw(cptr as *mut ModelData);
        *out = Box::into_raw(Box::new(plume_data_handle_t(data)));
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn plume_data_delete_handle(h: *mut plume_data_handle_t) -> i32 {
    guard(|| {
        if !h.is_null() {
            drop(Box::from_raw(h));
        }
        Ok(())
    })
}

macro_rules! data_create_fn {
    ($name:ident, $ty:ty, $method:ident) => {
        #[no_mangle]
        pub unsafe extern "C" fn $name(h: *mut plume_data_handle_t, name: *const c_char, param: $ty) -> i32 {
            guard(|| {
                let handle = borrow_mut(h, "data")?;
                let name = borrow_str(name)?.to_string();
                handle.0.$method(name, param)
            })
        }
    };
}

data_create_fn!(plume_data_create_int, i64, create_int);
data_create_fn!(plume_data_create_bool, bool, create_bool);
data_create_fn!(plume_data_create_float, f32, create_float);
data_create_fn!(plume_data_create_double, f64, create_double);

#[no_mangle]
pub unsafe extern "C" fn plume_data_create_string(h: *mut plume_data_handle_t, name: *const c_char, param: *const c_char) -> i32 {
    guard(|| {
        let handle = borrow_mut(h, "data")?;
        let name = borrow_str(name)?.to_string();
        let param = borrow_str(param)?.to_string();
        handle.0.create_string(name, param)
    })
}

macro_rules! data_update_fn {
    ($name:ident, $ty:ty, $method:ident) => {
        #[no_mangle]
        pub unsafe extern "C" fn $name(h: *mut plume_data_handle_t, name: *const c_char, param: $ty) -> i32 {
            guard(|| {
                let handle = borrow_mut(h, "data")?;
                let name = borrow_str(name)?;
                handle.0.$method(name, param)
            })
        }
    };
}

data_update_fn!(plume_data_update_int, i64, update_int);
data_update_fn!(plume_data_update_bool, bool, update_bool);
data_update_fn!(plume_data_update_float, f32, update_float);
data_update_fn!(plume_data_update_double, f64, update_double);

#[no_mangle]
pub unsafe extern "C" fn plume_data_update_string(h: *mut plume_data_handle_t, name: *const c_char, param: *const c_char) -> i32 {
    guard(|| {
        let handle = borrow_mut(h, "data")?;
        let name = borrow_str(name)?;
        let param = borrow_str(param)?.to_string();
        handle.0.update_string(name, param)
    })
}

macro_rules! data_provide_fn {
    ($name:ident, $ty:ty, $method:ident) => {
        #[no_mangle]
        pub unsafe extern "C" fn $name(h: *mut plume_data_handle_t, name: *const c_char, param: *mut $ty) -> i32 {
            guard(|| {
                let handle = borrow_mut(h, "data")?;
                let name = borrow_str(name)?.to_string();
                handle.0.$method(name, param)
            })
        }
    };
}

data_provide_fn!(plume_data_provide_int, i64, provide_int);
data_provide_fn!(plume_data_provide_bool, bool, provide_bool);
data_provide_fn!(plume_data_provide_float, f32, provide_float);
data_provide_fn!(plume_data_provide_double, f64, provide_double);

#[no_mangle]
pub unsafe extern "C" fn plume_data_provide_atlas_field_shared(
    h: *mut plume_data_handle_t,
    name: *const c_char,
    ptr: *mut c_void,
) -> i32 {
    guard(|| {
        let handle = borrow_mut(h, "data")?;
        let name = borrow_str(name)?.to_string();
        let field = crate::model_data::FieldHandle::from_raw(ptr)?;
        handle.0.provide_atlas_field_shared(name, field)
    })
}

#[no_mangle]
pub unsafe extern "C" fn plume_data_get_shared_atlas_field(
    h: *mut plume_data_handle_t,
    name: *const c_char,
    ptr: *mut *mut c_void,
) -> i32 {
    guard(|| {
        let handle = borrow_mut(h, "data")?;
        let name = borrow_str(name)?;
        let out = borrow_mut(ptr, "out-ptr")?;
        let field = handle.0.get_atlas_field_shared(name)?;
        *out = field.as_raw();
        Ok(())
    })
}

macro_rules! data_get_fn {
    ($name:ident, $ty:ty, $method:ident) => {
        #[no_mangle]
        pub unsafe extern "C" fn $name(h: *mut plume_data_handle_t, name: *const c_char, val: *mut $ty) -> i32 {
            guard(|| {
                let handle = borrow_mut(h, "data")?;
                let name = borrow_str(name)?;
                let out = borrow_mut(val, "out-value")?;
                *out = handle.0.$method(name)?;
                Ok(())
            })
        }
    };
}

data_get_fn!(plume_data_get_int, i64, get_int);
data_get_fn!(plume_data_get_bool, bool, get_bool);
data_get_fn!(plume_data_get_float, f32, get_float);
data_get_fn!(plume_data_get_double, f64, get_double);

/// `STRING` has no `plume_data_provide_string`: a borrowed cell's pointer
/// must address a live Rust `String`, which a genuine C caller cannot hand
/// across this boundary (it only ever has a `char*` buffer, not a
/// `std::string` with matching layout). C callers use `create_string` /
/// `update_string` / `get_string` instead; `provide_string` remains
/// available to in-process Rust callers through [`ModelData`] directly.
#[no_mangle]
pub unsafe extern "C" fn plume_data_get_string(
    h: *mut plume_data_handle_t,
    name: *const c_char,
    out: *mut *mut c_char,
) -> i32 {
    guard(|| {
        let handle = borrow_mut(h, "data")?;
        let name = borrow_str(name)?;
        let out = borrow_mut(out, "out-string")?;
        let value = handle.0.get_string(name)?;
        let c_string = CString::new(value).map_err(|e| Error::bad_value(e.to_string()))?;
        *out = c_string.into_raw();
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn plume_data_print(h: *mut plume_data_handle_t) -> i32 {
    guard(|| {
        let handle = borrow_mut(h, "data")?;
        print!("{}", handle.0.print());
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_handle_round_trip() {
        let mut handle: *mut plume_protocol_handle_t = ptr::null_mut();
        unsafe {
            assert_eq!(plume_protocol_create_handle(&mut handle), PLUME_SUCCESS);
            let name = CString::new("I").unwrap();
            let avail = CString::new("always").unwrap();
            let comment = CString::new("").unwrap();
            assert_eq!(
                plume_protocol_offer_int(handle, name.as_ptr(), avail.as_ptr(), comment.as_ptr()),
                PLUME_SUCCESS
            );
            assert_eq!(plume_protocol_delete_handle(handle), PLUME_SUCCESS);
        }
    }

    #[test]
    fn null_handle_is_general_exception() {
        unsafe {
            let name = CString::new("I").unwrap();
            let avail = CString::new("always").unwrap();
            let comment = CString::new("").unwrap();
            let code = plume_protocol_offer_int(ptr::null_mut(), name.as_ptr(), avail.as_ptr(), comment.as_ptr());
            assert_eq!(code, PLUME_ERROR_GENERAL_EXCEPTION);
        }
    }

    #[test]
    fn data_create_and_get_round_trip() {
        let mut handle: *mut plume_data_handle_t = ptr::null_mut();
        unsafe {
            assert_eq!(plume_data_create_handle_t(&mut handle), PLUME_SUCCESS);
            let name = CString::new("I").unwrap();
            assert_eq!(plume_data_create_int(handle, name.as_ptr(), 7), PLUME_SUCCESS);
            let mut value: i64 = 0;
            assert_eq!(plume_data_get_int(handle, name.as_ptr(), &mut value), PLUME_SUCCESS);
            assert_eq!(value, 7);
            assert_eq!(plume_data_delete_handle(handle), PLUME_SUCCESS);
        }
    }

    #[test]
    fn error_string_reports_generic_messages() {
        unsafe {
            let msg = CStr::from_ptr(plume_error_string(PLUME_SUCCESS)).to_str().unwrap();
            assert_eq!(msg, "success");
        }
    }

    #[test]
    fn protocol_require_round_trip() {
        let mut handle: *mut plume_protocol_handle_t = ptr::null_mut();
        unsafe {
            assert_eq!(plume_protocol_create_handle(&mut handle), PLUME_SUCCESS);
            let name = CString::new("I").unwrap();
            assert_eq!(plume_protocol_require_int(handle, name.as_ptr()), PLUME_SUCCESS);
            assert_eq!((*handle).0.requires().param_names(), vec!["I".to_string()]);
            assert_eq!(plume_protocol_delete_handle(handle), PLUME_SUCCESS);
        }
    }

    #[test]
    fn data_string_create_update_get_round_trip() {
        let mut handle: *mut plume_data_handle_t = ptr::null_mut();
        unsafe {
            assert_eq!(plume_data_create_handle_t(&mut handle), PLUME_SUCCESS);
            let name = CString::new("S").unwrap();
            let initial = CString::new("hello").unwrap();
            assert_eq!(plume_data_create_string(handle, name.as_ptr(), initial.as_ptr()), PLUME_SUCCESS);
            let updated = CString::new("world").unwrap();
            assert_eq!(plume_data_update_string(handle, name.as_ptr(), updated.as_ptr()), PLUME_SUCCESS);
            let mut out: *mut c_char = ptr::null_mut();
            assert_eq!(plume_data_get_string(handle, name.as_ptr(), &mut out), PLUME_SUCCESS);
            let read_back = CStr::from_ptr(out).to_str().unwrap();
            assert_eq!(read_back, "world");
            drop(CString::from_raw(out));
            assert_eq!(plume_data_delete_handle(handle), PLUME_SUCCESS);
        }
    }
}
