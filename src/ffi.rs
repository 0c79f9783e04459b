//! C ABI function exports
//!
//! These functions are called via Fiddle (or any C FFI) from host languages.
//! All functions use C-compatible types and the `phreeqc_` prefix.
//!
//! Strings returned to the host are owned by this library and must be freed
//! with `phreeqc_free_string`. `PhreeqcVar` has the same layout as the
//! engine's `VAR`, but its strings are allocated here and are released by
//! `phreeqc_var_clear` or by the next `phreeqc_var_set_*` on the same value.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_double, c_int, c_long};
use std::ptr;

use crate::config::PhreeqcConfig;
use crate::error::Error;
use crate::phreeqc::IPhreeqc;
use crate::sys::{Api, RawPayload, TT_DOUBLE, TT_EMPTY, TT_ERROR, TT_LONG, TT_STRING};
use crate::var::{Payload, VResult, Var};

// ============================================================================
// Context
// ============================================================================

/// Opaque context passed to all FFI functions
pub struct PhreeqcContext {
    pub engine: IPhreeqc,
}

impl PhreeqcContext {
    pub fn new(engine: IPhreeqc) -> Self {
        Self { engine }
    }

    fn open(library: Option<&str>) -> Result<Self, Error> {
        let mut config = PhreeqcConfig::from_env();
        if let Some(lib) = library {
            config = config.with_library(lib);
        }
        let api = Api::load(config.library_path())?;
        Ok(Self::new(IPhreeqc::new(api.into())?))
    }
}

fn into_c_string(s: String) -> *mut c_char {
    let s = if s.contains('\0') { s.replace('\0', " ") } else { s };
    CString::new(s).unwrap_or_default().into_raw()
}

unsafe fn write_error(error_out: *mut *mut c_char, message: String) {
    if !error_out.is_null() {
        *error_out = into_c_string(message);
    }
}

unsafe fn str_arg<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        None
    } else {
        CStr::from_ptr(s).to_str().ok()
    }
}

/// Error count for load/run style results: 0 on success, the engine's error
/// count on a diagnosed failure, a negative status code otherwise
fn error_count(result: Result<(), Error>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(Error::Load { errors, .. }) | Err(Error::Run { errors, .. }) => {
            c_int::try_from(errors).unwrap_or(c_int::MAX)
        }
        Err(e) => e.vresult().code(),
    }
}

// ============================================================================
// Core FFI Functions
// ============================================================================

/// Library version (caller must free with phreeqc_free_string)
#[no_mangle]
pub extern "C" fn phreeqc_version() -> *mut c_char {
    into_c_string(crate::VERSION.to_string())
}

/// Load the engine and create an instance.
///
/// `library` may be null to use the configured/default library.
/// Returns null on error, error message written to error_out if provided.
///
/// # Safety
///
/// `library` must be null or a valid NUL-terminated string; `error_out` must
/// be null or writable.
#[no_mangle]
pub unsafe extern "C" fn phreeqc_create(
    library: *const c_char,
    error_out: *mut *mut c_char,
) -> *mut PhreeqcContext {
    let library = if library.is_null() {
        None
    } else {
        match str_arg(library) {
            Some(s) => Some(s),
            None => {
                write_error(error_out, "Invalid UTF-8 in library path".to_string());
                return ptr::null_mut();
            }
        }
    };

    match PhreeqcContext::open(library) {
        Ok(ctx) => Box::into_raw(Box::new(ctx)),
        Err(e) => {
            write_error(error_out, e.to_string());
            ptr::null_mut()
        }
    }
}

/// Destroy a context and its engine instance
///
/// # Safety
///
/// `ctx` must be null or a pointer returned by `phreeqc_create`, not yet
/// destroyed.
#[no_mangle]
pub unsafe extern "C" fn phreeqc_destroy(ctx: *mut PhreeqcContext) {
    if !ctx.is_null() {
        drop(Box::from_raw(ctx));
    }
}

/// Free a string returned by phreeqc functions
///
/// # Safety
///
/// `s` must be null or a string returned by this library, not yet freed.
#[no_mangle]
pub unsafe extern "C" fn phreeqc_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Free an error string returned through error_out
///
/// # Safety
///
/// Same as `phreeqc_free_string`.
#[no_mangle]
pub unsafe extern "C" fn phreeqc_free_error(error: *mut c_char) {
    phreeqc_free_string(error);
}

/// Load a database file.
/// Returns 0 on success, the engine error count on failure, or a negative
/// status code for bad arguments.
///
/// # Safety
///
/// `ctx` must be a live context; `path` a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn phreeqc_load_database(
    ctx: *mut PhreeqcContext,
    path: *const c_char,
) -> c_int {
    if ctx.is_null() {
        return VResult::InvalidArg.code();
    }
    let path = match str_arg(path) {
        Some(p) => p,
        None => return VResult::InvalidArg.code(),
    };
    error_count((*ctx).engine.load_database(path))
}

/// Run PHREEQC input. Same return convention as phreeqc_load_database.
///
/// # Safety
///
/// `ctx` must be a live context; `input` a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn phreeqc_run_string(
    ctx: *mut PhreeqcContext,
    input: *const c_char,
) -> c_int {
    if ctx.is_null() {
        return VResult::InvalidArg.code();
    }
    let input = match str_arg(input) {
        Some(s) => s,
        None => return VResult::InvalidArg.code(),
    };
    error_count((*ctx).engine.run_input(input))
}

/// Error text of the last failure (caller must free with phreeqc_free_string)
///
/// # Safety
///
/// `ctx` must be null or a live context.
#[no_mangle]
pub unsafe extern "C" fn phreeqc_error_string(ctx: *const PhreeqcContext) -> *mut c_char {
    if ctx.is_null() {
        return ptr::null_mut();
    }
    into_c_string((*ctx).engine.error_text())
}

/// Selected-output row count (heading row included), or a negative status
///
/// # Safety
///
/// `ctx` must be null or a live context.
#[no_mangle]
pub unsafe extern "C" fn phreeqc_row_count(ctx: *const PhreeqcContext) -> c_int {
    if ctx.is_null() {
        return VResult::InvalidArg.code();
    }
    match (*ctx).engine.selected_output_row_count() {
        Ok(n) => c_int::try_from(n).unwrap_or(c_int::MAX),
        Err(e) => e.vresult().code(),
    }
}

/// Selected-output column count, or a negative status
///
/// # Safety
///
/// `ctx` must be null or a live context.
#[no_mangle]
pub unsafe extern "C" fn phreeqc_column_count(ctx: *const PhreeqcContext) -> c_int {
    if ctx.is_null() {
        return VResult::InvalidArg.code();
    }
    match (*ctx).engine.selected_output_column_count() {
        Ok(n) => c_int::try_from(n).unwrap_or(c_int::MAX),
        Err(e) => e.vresult().code(),
    }
}

/// Read one selected-output cell into `out`.
///
/// `out` is cleared first. On failure it holds an Error value with the
/// returned status code.
///
/// # Safety
///
/// `ctx` must be a live context; `out` an initialised `PhreeqcVar`.
#[no_mangle]
pub unsafe extern "C" fn phreeqc_get_value(
    ctx: *const PhreeqcContext,
    row: c_int,
    col: c_int,
    out: *mut PhreeqcVar,
) -> c_int {
    if ctx.is_null() || out.is_null() {
        return VResult::InvalidArg.code();
    }
    let out = &mut *out;
    let status = match (usize::try_from(row), usize::try_from(col)) {
        (Err(_), _) => VResult::InvalidRow,
        (_, Err(_)) => VResult::InvalidCol,
        (Ok(row), Ok(col)) => match (*ctx).engine.cell_value(row, col) {
            Ok(var) => out.store(&var),
            Err(e) => e.vresult(),
        },
    };
    if !status.is_ok() {
        out.store(&Var::from(status));
    }
    status.code()
}

/// Component count, or a negative status
///
/// # Safety
///
/// `ctx` must be null or a live context.
#[no_mangle]
pub unsafe extern "C" fn phreeqc_component_count(ctx: *const PhreeqcContext) -> c_int {
    if ctx.is_null() {
        return VResult::InvalidArg.code();
    }
    match (*ctx).engine.component_count() {
        Ok(n) => c_int::try_from(n).unwrap_or(c_int::MAX),
        Err(e) => e.vresult().code(),
    }
}

/// Component name (caller must free), null when out of range
///
/// # Safety
///
/// `ctx` must be null or a live context.
#[no_mangle]
pub unsafe extern "C" fn phreeqc_component(ctx: *const PhreeqcContext, index: c_int) -> *mut c_char {
    if ctx.is_null() {
        return ptr::null_mut();
    }
    let index = match usize::try_from(index) {
        Ok(i) => i,
        Err(_) => return ptr::null_mut(),
    };
    match (*ctx).engine.component_name(index) {
        Ok(name) => into_c_string(name),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Host-side values
// ============================================================================

/// `VAR`-compatible value whose strings belong to this library
#[repr(C)]
pub struct PhreeqcVar {
    pub type_: c_int,
    pub payload: RawPayload,
}

impl PhreeqcVar {
    pub const fn empty() -> Self {
        Self {
            type_: TT_EMPTY,
            payload: RawPayload { d_val: 0.0 },
        }
    }

    /// Release an owned string, if any, and reset to Empty
    pub fn clear(&mut self) {
        if self.type_ == TT_STRING {
            let s = unsafe { self.payload.s_val };
            if !s.is_null() {
                drop(unsafe { CString::from_raw(s) });
            }
        }
        self.type_ = TT_EMPTY;
        self.payload = RawPayload { d_val: 0.0 };
    }

    /// Replace the contents with a copy of `var`
    pub fn store(&mut self, var: &Var) -> VResult {
        self.clear();
        match var.payload() {
            Payload::Empty => {}
            Payload::Error(code) => {
                self.type_ = TT_ERROR;
                self.payload.vresult = code.code();
            }
            Payload::Long(v) => {
                self.type_ = TT_LONG;
                self.payload.l_val = *v as c_long;
            }
            Payload::Double(v) => {
                self.type_ = TT_DOUBLE;
                self.payload.d_val = *v;
            }
            Payload::String(s) => match CString::new(s.as_str()) {
                Ok(c) => {
                    self.type_ = TT_STRING;
                    self.payload.s_val = c.into_raw();
                }
                Err(_) => return VResult::InvalidArg,
            },
        }
        VResult::Ok
    }

    /// Copy the contents out into an owned `Var`
    pub fn load(&self) -> Var {
        unsafe {
            match self.type_ {
                TT_ERROR => Var::from(
                    VResult::from_code(self.payload.vresult).unwrap_or(VResult::BadVarType),
                ),
                TT_LONG => Var::from(self.payload.l_val as i64),
                TT_DOUBLE => Var::from(self.payload.d_val),
                TT_STRING if !self.payload.s_val.is_null() => Var::from(
                    CStr::from_ptr(self.payload.s_val).to_string_lossy().into_owned(),
                ),
                TT_STRING => Var::from(String::new()),
                _ => Var::new(),
            }
        }
    }
}

impl Drop for PhreeqcVar {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Initialise a value to Empty without reading its previous contents
///
/// # Safety
///
/// `var` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn phreeqc_var_init(var: *mut PhreeqcVar) {
    if !var.is_null() {
        ptr::write(var, PhreeqcVar::empty());
    }
}

/// Release a value's string, if any, and reset it to Empty
///
/// # Safety
///
/// `var` must be null or an initialised `PhreeqcVar`.
#[no_mangle]
pub unsafe extern "C" fn phreeqc_var_clear(var: *mut PhreeqcVar) -> c_int {
    if var.is_null() {
        return VResult::InvalidArg.code();
    }
    (*var).clear();
    VResult::Ok.code()
}

/// # Safety
///
/// `var` must be null or an initialised `PhreeqcVar`.
#[no_mangle]
pub unsafe extern "C" fn phreeqc_var_set_long(var: *mut PhreeqcVar, value: c_long) -> c_int {
    if var.is_null() {
        return VResult::InvalidArg.code();
    }
    (*var).store(&Var::from(value as i64)).code()
}

/// # Safety
///
/// `var` must be null or an initialised `PhreeqcVar`.
#[no_mangle]
pub unsafe extern "C" fn phreeqc_var_set_double(var: *mut PhreeqcVar, value: c_double) -> c_int {
    if var.is_null() {
        return VResult::InvalidArg.code();
    }
    (*var).store(&Var::from(value)).code()
}

/// Copy `text` into the value, releasing the previous string first
///
/// # Safety
///
/// `var` must be null or an initialised `PhreeqcVar`; `text` a valid
/// NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn phreeqc_var_set_string(var: *mut PhreeqcVar, text: *const c_char) -> c_int {
    if var.is_null() || text.is_null() {
        return VResult::InvalidArg.code();
    }
    let text = CStr::from_ptr(text).to_string_lossy().into_owned();
    (*var).store(&Var::from(text)).code()
}

/// # Safety
///
/// `var` must be null or an initialised `PhreeqcVar`.
#[no_mangle]
pub unsafe extern "C" fn phreeqc_var_set_error(var: *mut PhreeqcVar, code: c_int) -> c_int {
    if var.is_null() {
        return VResult::InvalidArg.code();
    }
    match VResult::from_code(code) {
        Some(code) => (*var).store(&Var::from(code)).code(),
        None => VResult::InvalidArg.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    #[test]
    fn test_var_string_reassignment() {
        let mut var = PhreeqcVar::empty();
        unsafe {
            assert_eq!(phreeqc_var_set_string(&mut var, c("Hello World").as_ptr()), 0);
            assert_eq!(var.load().get_string().unwrap(), "Hello World");
            assert_eq!(phreeqc_var_set_string(&mut var, c("again").as_ptr()), 0);
            assert_eq!(phreeqc_var_set_long(&mut var, 42), 0);
        }
        assert_eq!(var.type_, TT_LONG);
        assert_eq!(var.load().get_integer().unwrap(), 42);
    }

    #[test]
    fn test_var_set_error() {
        let mut var = PhreeqcVar::empty();
        unsafe {
            assert_eq!(phreeqc_var_set_error(&mut var, VResult::OutOfMemory.code()), 0);
            assert_eq!(phreeqc_var_set_error(&mut var, 99), VResult::InvalidArg.code());
            assert_eq!(phreeqc_var_clear(&mut var), 0);
        }
        assert_eq!(var.type_, TT_EMPTY);
    }

    #[test]
    fn test_store_rejects_interior_nul() {
        let mut var = PhreeqcVar::empty();
        let status = var.store(&Var::from("a\0b".to_string()));
        assert_eq!(status, VResult::InvalidArg);
        assert_eq!(var.type_, TT_EMPTY);
    }

    #[test]
    fn test_null_arguments() {
        unsafe {
            assert_eq!(phreeqc_var_clear(ptr::null_mut()), VResult::InvalidArg.code());
            assert_eq!(phreeqc_row_count(ptr::null()), VResult::InvalidArg.code());
            assert!(phreeqc_error_string(ptr::null()).is_null());
            phreeqc_destroy(ptr::null_mut());
            phreeqc_free_string(ptr::null_mut());
        }
    }

    #[test]
    fn test_create_missing_library() {
        let mut error: *mut c_char = ptr::null_mut();
        unsafe {
            let path = c("/nonexistent/libiphreeqc.so");
            let ctx = phreeqc_create(path.as_ptr(), &mut error);
            assert!(ctx.is_null());
            assert!(!error.is_null());
            let message = CStr::from_ptr(error).to_string_lossy().into_owned();
            assert!(message.contains("/nonexistent/libiphreeqc.so"));
            phreeqc_free_error(error);
        }
    }

    #[test]
    fn test_version() {
        let v = phreeqc_version();
        unsafe {
            assert_eq!(CStr::from_ptr(v).to_str().unwrap(), crate::VERSION);
            phreeqc_free_string(v);
        }
    }
}
