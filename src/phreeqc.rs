//! Call adapter over one IPhreeqc instance
//!
//! Each method forwards to a single engine entry point and translates the
//! result code. Diagnostic text stays inside the engine, so
//! [`IPhreeqc::error_text`] still reports the last failure after an `Err` has
//! been handled.
//!
//! An instance is not safe to share between threads: `IPhreeqc` is `Send` but
//! not `Sync`, and no locking is done here. Callers that need concurrent
//! access must serialize it themselves.

use std::cell::Cell;
use std::ffi::CString;
use std::marker::PhantomData;
use std::os::raw::c_int;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::output::SelectedOutput;
use crate::scoped::ScopedVar;
use crate::sys::{self, text_or_empty, Api, IPQ_BADINSTANCE, IPQ_INVALIDCOL, IPQ_INVALIDROW};
use crate::var::Var;

pub struct IPhreeqc {
    api: Arc<Api>,
    id: c_int,
    _not_sync: PhantomData<Cell<()>>,
}

fn c_index(index: usize) -> Option<c_int> {
    c_int::try_from(index).ok()
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| Error::Path(path.to_path_buf()))
}

impl IPhreeqc {
    /// Create a new engine instance
    pub fn new(api: Arc<Api>) -> Result<Self> {
        let id = unsafe { (api.table().create)() };
        if id < 0 {
            sys::check(id)?;
            return Err(Error::UnknownCode(id));
        }
        log::debug!("created IPhreeqc instance {}", id);
        Ok(Self {
            api,
            id,
            _not_sync: PhantomData,
        })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn api(&self) -> &Arc<Api> {
        &self.api
    }

    // ------------------------------------------------------------------------
    // Database and input
    // ------------------------------------------------------------------------

    /// Load a database file, replacing any previously loaded one
    pub fn load_database(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let c_path = CString::new(path_str(path)?)?;
        let errors = unsafe { (self.api.table().load_database)(self.id, c_path.as_ptr()) };
        self.check_count(errors, |errors, text| Error::Load {
            path: path.display().to_string(),
            errors,
            text,
        })?;
        log::debug!("instance {}: loaded database {}", self.id, path.display());
        Ok(())
    }

    /// Load a database from its text
    pub fn load_database_string(&mut self, text: &str) -> Result<()> {
        let c_text = CString::new(text)?;
        let errors = unsafe { (self.api.table().load_database_string)(self.id, c_text.as_ptr()) };
        self.check_count(errors, |errors, text| Error::Load {
            path: "<string>".to_string(),
            errors,
            text,
        })
    }

    /// Run a PHREEQC input program against the loaded database
    pub fn run_input(&mut self, input: &str) -> Result<()> {
        let c_input = CString::new(input)?;
        let errors = unsafe { (self.api.table().run_string)(self.id, c_input.as_ptr()) };
        self.check_count(errors, |errors, text| Error::Run { errors, text })?;
        log::debug!("instance {}: run completed", self.id);
        Ok(())
    }

    pub fn run_string(&mut self, input: &str) -> Result<()> {
        self.run_input(input)
    }

    /// Run the input file at `path`
    pub fn run_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let c_path = CString::new(path_str(path.as_ref())?)?;
        let errors = unsafe { (self.api.table().run_file)(self.id, c_path.as_ptr()) };
        self.check_count(errors, |errors, text| Error::Run { errors, text })
    }

    /// Append one line to the accumulated input buffer
    pub fn accumulate_line(&mut self, line: &str) -> Result<()> {
        let c_line = CString::new(line)?;
        let code = unsafe { (self.api.table().accumulate_line)(self.id, c_line.as_ptr()) };
        self.check_code(code)
    }

    /// Run the accumulated lines.
    ///
    /// The buffer is kept until the next `accumulate_line` after a run, so a
    /// failed program can be inspected and re-run.
    pub fn run_accumulated(&mut self) -> Result<()> {
        let errors = unsafe { (self.api.table().run_accumulated)(self.id) };
        self.check_count(errors, |errors, text| Error::Run { errors, text })
    }

    pub fn clear_accumulated_lines(&mut self) -> Result<()> {
        let code = unsafe { (self.api.table().clear_accumulated_lines)(self.id) };
        self.check_code(code)
    }

    // ------------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------------

    /// Error text from the most recent failing operation; empty if none
    pub fn error_text(&self) -> String {
        unsafe { text_or_empty((self.api.table().get_error_string)(self.id)) }
    }

    pub fn warning_text(&self) -> String {
        unsafe { text_or_empty((self.api.table().get_warning_string)(self.id)) }
    }

    // ------------------------------------------------------------------------
    // Selected output
    // ------------------------------------------------------------------------

    /// Rows in the selected-output table, heading row included
    pub fn selected_output_row_count(&self) -> Result<usize> {
        let n = unsafe { (self.api.table().get_selected_output_row_count)(self.id) };
        self.count(n)
    }

    pub fn selected_output_column_count(&self) -> Result<usize> {
        let n = unsafe { (self.api.table().get_selected_output_column_count)(self.id) };
        self.count(n)
    }

    /// Read one cell of the selected-output table.
    ///
    /// Indices are 0-based. Row 0 holds the column headings as String values
    /// and data rows start at 1, which is IPhreeqc 3.x behaviour; the row
    /// count includes the heading row.
    pub fn cell_value(&self, row: usize, col: usize) -> Result<Var> {
        let mut var = ScopedVar::new(&self.api);
        self.cell_value_into(row, col, &mut var)?;
        Ok(var.into_var()?)
    }

    pub fn get_value(&self, row: usize, col: usize) -> Result<Var> {
        self.cell_value(row, col)
    }

    /// Read one cell into a caller-owned handle, reusing its storage
    pub fn cell_value_into(&self, row: usize, col: usize, var: &mut ScopedVar<'_>) -> Result<()> {
        let row_c = match c_index(row) {
            Some(r) => r,
            None => return Err(self.invalid_row(row)),
        };
        let col_c = match c_index(col) {
            Some(c) => c,
            None => return Err(self.invalid_col(col)),
        };

        var.reset();
        let code = unsafe {
            (self.api.table().get_selected_output_value)(self.id, row_c, col_c, var.as_mut_ptr())
        };
        match code {
            IPQ_INVALIDROW => Err(self.invalid_row(row)),
            IPQ_INVALIDCOL => Err(self.invalid_col(col)),
            code => self.check_code(code),
        }
    }

    /// Snapshot of the whole selected-output table
    pub fn selected_output(&self) -> Result<SelectedOutput> {
        SelectedOutput::read(self)
    }

    // ------------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------------

    /// Number of components (elements) after the last run
    pub fn component_count(&self) -> Result<usize> {
        let n = unsafe { (self.api.table().get_component_count)(self.id) };
        self.count(n)
    }

    /// Component name by index; components are listed alphabetically
    pub fn component_name(&self, index: usize) -> Result<String> {
        let count = self.component_count()?;
        let index_c = c_index(index)
            .filter(|_| index < count)
            .ok_or_else(|| {
                Error::InvalidArg(format!("component index {} out of range ({} components)", index, count))
            })?;
        let ptr = unsafe { (self.api.table().get_component)(self.id, index_c) };
        if ptr.is_null() {
            return Err(Error::InvalidArg(format!("component index {} out of range", index)));
        }
        Ok(unsafe { text_or_empty(ptr) })
    }

    pub fn component(&self, index: usize) -> Result<String> {
        self.component_name(index)
    }

    pub fn components(&self) -> Result<Vec<String>> {
        (0..self.component_count()?).map(|i| self.component_name(i)).collect()
    }

    // ------------------------------------------------------------------------
    // Result translation
    // ------------------------------------------------------------------------

    /// Engine calls that return an error count: zero is success, negative is
    /// a result code.
    fn check_count(&self, n: c_int, fail: impl FnOnce(usize, String) -> Error) -> Result<()> {
        if n < 0 {
            return self.check_code(n);
        }
        if n > 0 {
            let text = self.error_text();
            log::warn!("instance {}: {} error(s): {}", self.id, n, text.trim_end());
            return Err(fail(n as usize, text));
        }
        Ok(())
    }

    fn check_code(&self, code: c_int) -> Result<()> {
        match code {
            IPQ_BADINSTANCE => Err(Error::BadInstance(self.id)),
            code => sys::check(code),
        }
    }

    fn count(&self, n: c_int) -> Result<usize> {
        if n < 0 {
            self.check_code(n)?;
            return Err(Error::UnknownCode(n));
        }
        Ok(n as usize)
    }

    fn invalid_row(&self, row: usize) -> Error {
        Error::InvalidRow {
            row,
            rows: self.selected_output_row_count().unwrap_or(0),
        }
    }

    fn invalid_col(&self, col: usize) -> Error {
        Error::InvalidCol {
            col,
            cols: self.selected_output_column_count().unwrap_or(0),
        }
    }
}

impl Drop for IPhreeqc {
    fn drop(&mut self) {
        let code = unsafe { (self.api.table().destroy)(self.id) };
        if code < 0 {
            log::warn!("failed to destroy IPhreeqc instance {}: code {}", self.id, code);
        } else {
            log::debug!("destroyed IPhreeqc instance {}", self.id);
        }
    }
}

impl std::fmt::Debug for IPhreeqc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IPhreeqc")
            .field("id", &self.id)
            .field("library", &self.api.path())
            .finish()
    }
}
