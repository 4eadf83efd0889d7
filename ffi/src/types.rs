//! `#[repr(C)]` types shared with C callers.
//!
//! Every pointer handed out here is owned by the caller and must be released
//! with the matching `console_free_*` function.

use std::ffi::CString;
use std::os::raw::c_char;

use console_core::store::RequestStore;
use console_core::url_parts::DeconstructedUrl;
use console_core::StoreError;

// ---------------------------------------------------------------------------
// Opaque store handle
// ---------------------------------------------------------------------------

/// Opaque handle wrapping a `RequestStore`.
pub struct FfiStore {
    pub(crate) inner: RequestStore,
}

// ---------------------------------------------------------------------------
// Deconstructed URL
// ---------------------------------------------------------------------------

#[repr(C)]
pub struct FfiTokenSpan {
    pub start: u32,
    pub length: u32,
}

#[repr(C)]
pub struct FfiQueryPair {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// `summary_path` is the URL up to the first `?`; token spans index into it
/// in bytes and exclude the leading colon.
#[repr(C)]
pub struct FfiUrlParts {
    pub summary_path: *mut c_char,
    pub route_tokens: *mut FfiTokenSpan,
    pub route_tokens_len: u32,
    pub query_pairs: *mut FfiQueryPair,
    pub query_pairs_len: u32,
}

impl FfiUrlParts {
    /// Null when any piece holds an interior NUL, since token spans would no
    /// longer index into the string the caller sees.
    pub(crate) fn from_core(parts: DeconstructedUrl) -> *mut Self {
        let has_nul = parts.summary_path.contains('\0')
            || parts
                .query_pairs
                .iter()
                .any(|pair| pair.key.contains('\0') || pair.value.contains('\0'));
        if has_nul {
            return std::ptr::null_mut();
        }

        let tokens: Vec<FfiTokenSpan> = parts
            .route_tokens
            .iter()
            .map(|span| FfiTokenSpan {
                start: span.start as u32,
                length: span.length as u32,
            })
            .collect();
        let pairs: Vec<FfiQueryPair> = parts
            .query_pairs
            .into_iter()
            .map(|pair| FfiQueryPair {
                key: to_c_string(pair.key),
                value: to_c_string(pair.value),
            })
            .collect();

        let (route_tokens, route_tokens_len) = into_raw_slice(tokens);
        let (query_pairs, query_pairs_len) = into_raw_slice(pairs);

        Box::into_raw(Box::new(FfiUrlParts {
            summary_path: to_c_string(parts.summary_path),
            route_tokens,
            route_tokens_len,
            query_pairs,
            query_pairs_len,
        }))
    }
}

fn into_raw_slice<T>(items: Vec<T>) -> (*mut T, u32) {
    if items.is_empty() {
        return (std::ptr::null_mut(), 0);
    }
    let len = items.len() as u32;
    let boxed = items.into_boxed_slice();
    (Box::into_raw(boxed) as *mut T, len)
}

/// Null when `s` holds an interior NUL.
pub(crate) fn to_c_string(s: impl Into<Vec<u8>>) -> *mut c_char {
    CString::new(s).map_or(std::ptr::null_mut(), CString::into_raw)
}

// ---------------------------------------------------------------------------
// Result envelope
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    NotFound = 1,
    Conflict = 2,
    Deserialization = 3,
    Serialization = 4,
    Panic = 5,
    NullArg = 6,
}

/// Result envelope returned by every fallible store call.
///
/// On success `error_code == Ok` and `json` holds the payload (or null when
/// the call has nothing to return). On failure `error_message` describes it.
#[repr(C)]
pub struct FfiConsoleResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub json: *mut c_char,
}

impl FfiConsoleResult {
    pub(crate) fn ok_json(value: &serde_json::Value) -> *mut Self {
        match serde_json::to_string(value) {
            Ok(text) => Self::boxed(FfiErrorCode::Ok, None, Some(text)),
            Err(e) => Self::serialization(e),
        }
    }

    pub(crate) fn ok_empty() -> *mut Self {
        Self::boxed(FfiErrorCode::Ok, None, None)
    }

    pub(crate) fn from_store_error(err: StoreError) -> *mut Self {
        let code = match err {
            StoreError::RequestNotFound { .. } | StoreError::ParameterNotFound { .. } => {
                FfiErrorCode::NotFound
            }
            StoreError::Conflict { .. } | StoreError::NoModal | StoreError::ModalMismatch => {
                FfiErrorCode::Conflict
            }
        };
        Self::error(code, err.to_string())
    }

    pub(crate) fn deserialization(err: impl std::fmt::Display) -> *mut Self {
        Self::error(FfiErrorCode::Deserialization, err.to_string())
    }

    pub(crate) fn serialization(err: impl std::fmt::Display) -> *mut Self {
        Self::error(FfiErrorCode::Serialization, err.to_string())
    }

    pub(crate) fn not_found(what: impl std::fmt::Display) -> *mut Self {
        Self::error(FfiErrorCode::NotFound, what.to_string())
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::error(FfiErrorCode::NullArg, format!("null argument: {name}"))
    }

    pub(crate) fn panic(context: &str) -> *mut Self {
        Self::error(FfiErrorCode::Panic, context.to_string())
    }

    fn error(code: FfiErrorCode, message: String) -> *mut Self {
        Self::boxed(code, Some(message), None)
    }

    fn boxed(code: FfiErrorCode, message: Option<String>, json: Option<String>) -> *mut Self {
        Box::into_raw(Box::new(FfiConsoleResult {
            error_code: code,
            error_message: message.map_or(std::ptr::null_mut(), to_c_string),
            json: json.map_or(std::ptr::null_mut(), to_c_string),
        }))
    }
}
