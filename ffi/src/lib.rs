//! C-ABI wrapper around `console-core`.
//!
//! # Overview
//! Exposes URL deconstruction and the request store through `extern "C"`
//! functions, so a host written in any language with a C FFI can keep the
//! same request state the console does without running the async channel.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Structured inputs and outputs travel as JSON strings in the same camelCase
//!   shapes the host protocol uses.
//! - A single `FfiConsoleResult` envelope (error code, message, JSON payload)
//!   conveys success payloads and errors uniformly.
//! - The C caller owns all returned pointers and must call the matching
//!   `console_free_*` function to release them.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use console_core::protocol::{deserialize_request, serialize_request, SerializedRequest};
use console_core::store::{Edit, RequestStore};
use console_core::{ContractMode, Transition};
use serde_json::json;

use types::*;

/// Borrow a C string as `&str`, or `None` when null or not UTF-8.
fn c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

// ---------------------------------------------------------------------------
// URL deconstruction
// ---------------------------------------------------------------------------

/// Split `url` into summary path, route token spans and query pairs.
///
/// Returns null if `url` is null or not UTF-8, or if a piece of the result
/// cannot be represented as a C string.
/// The caller must free the returned pointer with `console_free_url_parts`.
#[unsafe(no_mangle)]
pub extern "C" fn console_deconstruct_url(url: *const c_char) -> *mut FfiUrlParts {
    catch_unwind(|| match c_str(url) {
        Some(url) => FfiUrlParts::from_core(console_core::url_parts::deconstruct(url)),
        None => std::ptr::null_mut(),
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free an `FfiUrlParts` returned by `console_deconstruct_url`.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn console_free_url_parts(parts: *mut FfiUrlParts) {
    if parts.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let parts = unsafe { Box::from_raw(parts) };
        if !parts.summary_path.is_null() {
            drop(unsafe { CString::from_raw(parts.summary_path) });
        }
        if !parts.route_tokens.is_null() && parts.route_tokens_len > 0 {
            drop(unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    parts.route_tokens,
                    parts.route_tokens_len as usize,
                ))
            });
        }
        if !parts.query_pairs.is_null() && parts.query_pairs_len > 0 {
            let pairs = unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    parts.query_pairs,
                    parts.query_pairs_len as usize,
                ))
            };
            for pair in pairs.iter() {
                if !pair.key.is_null() {
                    drop(unsafe { CString::from_raw(pair.key) });
                }
                if !pair.value.is_null() {
                    drop(unsafe { CString::from_raw(pair.value) });
                }
            }
        }
    });
}

// ---------------------------------------------------------------------------
// Store lifecycle
// ---------------------------------------------------------------------------

/// Create an empty request store.
///
/// With `strict` set, contract violations come back as errors; otherwise they
/// are logged and ignored. Free with `console_store_free`.
#[unsafe(no_mangle)]
pub extern "C" fn console_store_new(strict: bool) -> *mut FfiStore {
    catch_unwind(|| {
        let mode = if strict {
            ContractMode::Strict
        } else {
            ContractMode::Tolerant
        };
        Box::into_raw(Box::new(FfiStore {
            inner: RequestStore::new(mode),
        }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a store created by `console_store_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn console_store_free(store: *mut FfiStore) {
    if !store.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(store) });
        });
    }
}

// ---------------------------------------------------------------------------
// Store operations
// ---------------------------------------------------------------------------

/// Load a host-serialized request under `request_id` as clean state.
///
/// Returns an empty `Ok` result on success.
#[unsafe(no_mangle)]
pub extern "C" fn console_store_load(
    store: *mut FfiStore,
    request_id: *const c_char,
    request_json: *const c_char,
) -> *mut FfiConsoleResult {
    catch_unwind(AssertUnwindSafe(|| {
        if store.is_null() {
            return FfiConsoleResult::null_arg("store");
        }
        let Some(request_id) = c_str(request_id) else {
            return FfiConsoleResult::null_arg("request_id");
        };
        let Some(request_json) = c_str(request_json) else {
            return FfiConsoleResult::null_arg("request_json");
        };
        let serialized: SerializedRequest = match serde_json::from_str(request_json) {
            Ok(serialized) => serialized,
            Err(e) => return FfiConsoleResult::deserialization(e),
        };
        let store = unsafe { &mut *store };
        store
            .inner
            .load(request_id, deserialize_request(request_id, serialized));
        FfiConsoleResult::ok_empty()
    }))
    .unwrap_or_else(|_| FfiConsoleResult::panic("panic in console_store_load"))
}

/// Apply one JSON-encoded `Edit` to a loaded request.
///
/// On success the payload is `{"transition": "applied"|"ignored", "isDirty": bool}`.
#[unsafe(no_mangle)]
pub extern "C" fn console_store_apply(
    store: *mut FfiStore,
    request_id: *const c_char,
    edit_json: *const c_char,
) -> *mut FfiConsoleResult {
    catch_unwind(AssertUnwindSafe(|| {
        if store.is_null() {
            return FfiConsoleResult::null_arg("store");
        }
        let Some(request_id) = c_str(request_id) else {
            return FfiConsoleResult::null_arg("request_id");
        };
        let Some(edit_json) = c_str(edit_json) else {
            return FfiConsoleResult::null_arg("edit_json");
        };
        let edit: Edit = match serde_json::from_str(edit_json) {
            Ok(edit) => edit,
            Err(e) => return FfiConsoleResult::deserialization(e),
        };
        let store = unsafe { &mut *store };
        match store.inner.apply(request_id, edit) {
            Ok(transition) => {
                let transition = match transition {
                    Transition::Applied => "applied",
                    Transition::Ignored => "ignored",
                };
                FfiConsoleResult::ok_json(&json!({
                    "transition": transition,
                    "isDirty": store.inner.is_dirty(request_id).unwrap_or(false),
                }))
            }
            Err(e) => FfiConsoleResult::from_store_error(e),
        }
    }))
    .unwrap_or_else(|_| FfiConsoleResult::panic("panic in console_store_apply"))
}

/// Read the current (uncommitted) state of a request.
///
/// On success the payload is `{"request": <serialized request>, "isDirty": bool}`.
#[unsafe(no_mangle)]
pub extern "C" fn console_store_current(
    store: *const FfiStore,
    request_id: *const c_char,
) -> *mut FfiConsoleResult {
    catch_unwind(AssertUnwindSafe(|| {
        if store.is_null() {
            return FfiConsoleResult::null_arg("store");
        }
        let Some(request_id) = c_str(request_id) else {
            return FfiConsoleResult::null_arg("request_id");
        };
        let store = unsafe { &*store };
        let Some(saveable) = store.inner.request(request_id) else {
            return FfiConsoleResult::not_found(format!("request {request_id} is not loaded"));
        };
        match serde_json::to_value(serialize_request(saveable.current())) {
            Ok(request) => FfiConsoleResult::ok_json(&json!({
                "request": request,
                "isDirty": saveable.is_dirty(),
            })),
            Err(e) => FfiConsoleResult::serialization(e),
        }
    }))
    .unwrap_or_else(|_| FfiConsoleResult::panic("panic in console_store_current"))
}

/// Record the host's save acknowledgment for `request_id`.
///
/// `saved_id` is the id the host stored the request under; when it differs
/// from `request_id` every per-request binding moves to it. `saved_json` is
/// the request as the host persisted it.
#[unsafe(no_mangle)]
pub extern "C" fn console_store_save(
    store: *mut FfiStore,
    request_id: *const c_char,
    saved_id: *const c_char,
    saved_json: *const c_char,
) -> *mut FfiConsoleResult {
    catch_unwind(AssertUnwindSafe(|| {
        if store.is_null() {
            return FfiConsoleResult::null_arg("store");
        }
        let Some(request_id) = c_str(request_id) else {
            return FfiConsoleResult::null_arg("request_id");
        };
        let Some(saved_id) = c_str(saved_id) else {
            return FfiConsoleResult::null_arg("saved_id");
        };
        let Some(saved_json) = c_str(saved_json) else {
            return FfiConsoleResult::null_arg("saved_json");
        };
        let serialized: SerializedRequest = match serde_json::from_str(saved_json) {
            Ok(serialized) => serialized,
            Err(e) => return FfiConsoleResult::deserialization(e),
        };
        let store = unsafe { &mut *store };
        let saved = deserialize_request(saved_id, serialized);
        match store.inner.save(request_id, saved_id, saved) {
            Ok(_) => FfiConsoleResult::ok_empty(),
            Err(e) => FfiConsoleResult::from_store_error(e),
        }
    }))
    .unwrap_or_else(|_| FfiConsoleResult::panic("panic in console_store_save"))
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiConsoleResult` returned by any `console_store_*` function.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn console_free_result(result: *mut FfiConsoleResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { CString::from_raw(result.error_message) });
        }
        if !result.json.is_null() {
            drop(unsafe { CString::from_raw(result.json) });
        }
    });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn console_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
