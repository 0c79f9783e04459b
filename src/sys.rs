//! Raw IPhreeqc C surface
//!
//! Layout-compatible definitions of the engine's `VAR` union and the table of
//! C entry points the adapter calls through. The table is either resolved
//! from a shared library with `libloading` or supplied directly by an embedder
//! that links the engine statically.

use std::ffi::CStr;
use std::os::raw::{c_char, c_double, c_int, c_long};
use std::path::{Path, PathBuf};

use libloading::Library;

use crate::error::{Error, Result};

// ============================================================================
// Engine constants
// ============================================================================

pub const TT_EMPTY: c_int = 0;
pub const TT_ERROR: c_int = 1;
pub const TT_LONG: c_int = 2;
pub const TT_DOUBLE: c_int = 3;
pub const TT_STRING: c_int = 4;

pub const IPQ_OK: c_int = 0;
pub const IPQ_OUTOFMEMORY: c_int = -1;
pub const IPQ_BADVARTYPE: c_int = -2;
pub const IPQ_INVALIDARG: c_int = -3;
pub const IPQ_INVALIDROW: c_int = -4;
pub const IPQ_INVALIDCOL: c_int = -5;
pub const IPQ_BADINSTANCE: c_int = -6;

// ============================================================================
// VAR
// ============================================================================

/// Payload union of `VAR`
#[repr(C)]
#[derive(Clone, Copy)]
pub union RawPayload {
    pub l_val: c_long,
    pub d_val: c_double,
    pub s_val: *mut c_char,
    pub vresult: c_int,
}

/// Engine-native `VAR`.
///
/// A `TT_STRING` value points at a buffer allocated by the engine; only the
/// engine's `VarClear` may release it. Use [`crate::ScopedVar`] rather than
/// handling this type directly.
#[repr(C)]
pub struct RawVar {
    pub type_: c_int,
    pub payload: RawPayload,
}

impl RawVar {
    pub const fn empty() -> Self {
        Self {
            type_: TT_EMPTY,
            payload: RawPayload { d_val: 0.0 },
        }
    }
}

// ============================================================================
// Entry points
// ============================================================================

pub type CreateFn = unsafe extern "C" fn() -> c_int;
pub type IdFn = unsafe extern "C" fn(c_int) -> c_int;
pub type IdStrFn = unsafe extern "C" fn(c_int, *const c_char) -> c_int;
pub type IdTextFn = unsafe extern "C" fn(c_int) -> *const c_char;
pub type ValueFn = unsafe extern "C" fn(c_int, c_int, c_int, *mut RawVar) -> c_int;
pub type ComponentFn = unsafe extern "C" fn(c_int, c_int) -> *const c_char;
pub type VersionFn = unsafe extern "C" fn() -> *const c_char;
pub type VarInitFn = unsafe extern "C" fn(*mut RawVar);
pub type VarClearFn = unsafe extern "C" fn(*mut RawVar) -> c_int;

/// The engine's C entry points
#[derive(Clone, Copy)]
pub struct ApiTable {
    pub create: CreateFn,
    pub destroy: IdFn,
    pub load_database: IdStrFn,
    pub load_database_string: IdStrFn,
    pub run_string: IdStrFn,
    pub run_file: IdStrFn,
    pub accumulate_line: IdStrFn,
    pub run_accumulated: IdFn,
    pub clear_accumulated_lines: IdFn,
    pub get_error_string: IdTextFn,
    pub get_warning_string: IdTextFn,
    pub get_selected_output_row_count: IdFn,
    pub get_selected_output_column_count: IdFn,
    pub get_selected_output_value: ValueFn,
    pub get_component_count: IdFn,
    pub get_component: ComponentFn,
    pub get_version_string: VersionFn,
    pub var_init: VarInitFn,
    pub var_clear: VarClearFn,
}

/// Loaded engine: the entry point table plus the library that backs it
pub struct Api {
    table: ApiTable,
    path: Option<PathBuf>,
    _lib: Option<Library>,
}

unsafe fn symbol<T: Copy>(lib: &Library, name: &'static str) -> Result<T> {
    lib.get::<T>(name.as_bytes())
        .map(|sym| *sym)
        .map_err(|e| Error::Symbol {
            name,
            message: e.to_string(),
        })
}

impl Api {
    /// Load the engine from a shared library
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let lib = unsafe { Library::new(path) }.map_err(|e| Error::Library {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let table = unsafe {
            ApiTable {
                create: symbol(&lib, "CreateIPhreeqc")?,
                destroy: symbol(&lib, "DestroyIPhreeqc")?,
                load_database: symbol(&lib, "LoadDatabase")?,
                load_database_string: symbol(&lib, "LoadDatabaseString")?,
                run_string: symbol(&lib, "RunString")?,
                run_file: symbol(&lib, "RunFile")?,
                accumulate_line: symbol(&lib, "AccumulateLine")?,
                run_accumulated: symbol(&lib, "RunAccumulated")?,
                clear_accumulated_lines: symbol(&lib, "ClearAccumulatedLines")?,
                get_error_string: symbol(&lib, "GetErrorString")?,
                get_warning_string: symbol(&lib, "GetWarningString")?,
                get_selected_output_row_count: symbol(&lib, "GetSelectedOutputRowCount")?,
                get_selected_output_column_count: symbol(&lib, "GetSelectedOutputColumnCount")?,
                get_selected_output_value: symbol(&lib, "GetSelectedOutputValue")?,
                get_component_count: symbol(&lib, "GetComponentCount")?,
                get_component: symbol(&lib, "GetComponent")?,
                get_version_string: symbol(&lib, "GetVersionString")?,
                var_init: symbol(&lib, "VarInit")?,
                var_clear: symbol(&lib, "VarClear")?,
            }
        };

        log::debug!("loaded IPhreeqc from {}", path.display());

        Ok(Self {
            table,
            path: Some(path.to_path_buf()),
            _lib: Some(lib),
        })
    }

    /// Use an entry point table that is already resolved, e.g. a statically
    /// linked engine.
    ///
    /// # Safety
    ///
    /// Every function in `table` must implement the documented IPhreeqc
    /// contract, and must stay callable for the lifetime of the returned value.
    pub unsafe fn from_table(table: ApiTable) -> Self {
        Self {
            table,
            path: None,
            _lib: None,
        }
    }

    pub fn table(&self) -> &ApiTable {
        &self.table
    }

    /// Library path, if loaded dynamically
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Engine version string
    pub fn version(&self) -> String {
        unsafe { text_or_empty((self.table.get_version_string)()) }
    }
}

/// Copy a borrowed engine string; NULL reads as empty
///
/// # Safety
///
/// `ptr` must be NULL or a valid NUL-terminated string.
pub(crate) unsafe fn text_or_empty(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

/// Translate an `IPQ_RESULT`/`VRESULT` code
pub fn check(code: c_int) -> Result<()> {
    match code {
        IPQ_OK => Ok(()),
        IPQ_OUTOFMEMORY => Err(Error::OutOfMemory),
        IPQ_BADVARTYPE => Err(Error::BadType),
        IPQ_INVALIDARG => Err(Error::InvalidArg("rejected by engine".to_string())),
        // Callers with indices in hand replace these with the bounds-aware
        // variants.
        IPQ_INVALIDROW => Err(Error::InvalidRow { row: 0, rows: 0 }),
        IPQ_INVALIDCOL => Err(Error::InvalidCol { col: 0, cols: 0 }),
        IPQ_BADINSTANCE => Err(Error::BadInstance(code)),
        other => Err(Error::UnknownCode(other)),
    }
}
