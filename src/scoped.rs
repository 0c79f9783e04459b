//! Scoped ownership of engine-native values
//!
//! `ScopedVar` initialises a [`RawVar`] with the engine's `VarInit` and hands
//! it back to `VarClear` exactly once, on whichever path the owning scope
//! exits. Strings inside the raw value are engine allocations, so they are
//! copied into an owned [`Var`] before the handle goes away.

use std::ffi::CStr;
use std::fmt;

use crate::error::VarError;
use crate::sys::{Api, ApiTable, RawVar, TT_DOUBLE, TT_EMPTY, TT_ERROR, TT_LONG, TT_STRING};
use crate::var::{VResult, Var, VarType};

/// Owner of one engine-native `VAR`.
///
/// Not `Clone`: two handles would both release the same string. Moving the
/// handle moves ownership; [`ScopedVar::take`] does the same while leaving an
/// Empty value behind.
pub struct ScopedVar<'a> {
    raw: RawVar,
    api: &'a ApiTable,
}

impl<'a> ScopedVar<'a> {
    pub fn new(api: &'a Api) -> Self {
        let table = api.table();
        let mut raw = RawVar::empty();
        unsafe { (table.var_init)(&mut raw) };
        Self { raw, api: table }
    }

    /// Pointer for an engine call to fill in.
    ///
    /// The engine clears the previous contents before writing; callers that
    /// cannot rely on that should [`reset`](Self::reset) first.
    pub fn as_mut_ptr(&mut self) -> *mut RawVar {
        &mut self.raw
    }

    pub fn as_raw(&self) -> &RawVar {
        &self.raw
    }

    pub fn kind(&self) -> Result<VarType, VarError> {
        VarType::from_code(self.raw.type_).ok_or(VarError::BadType { code: self.raw.type_ })
    }

    /// Release the payload and return to Empty
    pub fn reset(&mut self) {
        unsafe {
            (self.api.var_clear)(&mut self.raw);
            (self.api.var_init)(&mut self.raw);
        }
    }

    /// Move the payload into a new handle, leaving this one Empty
    pub fn take(&mut self) -> ScopedVar<'a> {
        let raw = std::mem::replace(&mut self.raw, RawVar::empty());
        unsafe { (self.api.var_init)(&mut self.raw) };
        ScopedVar { raw, api: self.api }
    }

    /// Copy the current value out into an owned `Var`
    pub fn to_var(&self) -> Result<Var, VarError> {
        let mut var = Var::new();
        unsafe {
            match self.raw.type_ {
                TT_EMPTY => {}
                TT_ERROR => {
                    let code = VResult::from_code(self.raw.payload.vresult)
                        .unwrap_or(VResult::BadVarType);
                    var.set_error(code);
                }
                TT_LONG => var.set_integer(self.raw.payload.l_val as i64),
                TT_DOUBLE => var.set_double(self.raw.payload.d_val),
                TT_STRING => {
                    let ptr = self.raw.payload.s_val;
                    if ptr.is_null() {
                        var.set_string("")?;
                    } else {
                        var.set_string(&CStr::from_ptr(ptr).to_string_lossy())?;
                    }
                }
                code => return Err(VarError::BadType { code }),
            }
        }
        Ok(var)
    }

    /// Copy out, then release
    pub fn into_var(self) -> Result<Var, VarError> {
        self.to_var()
    }
}

impl Drop for ScopedVar<'_> {
    fn drop(&mut self) {
        unsafe { (self.api.var_clear)(&mut self.raw) };
    }
}

impl fmt::Debug for ScopedVar<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedVar")
            .field("type", &self.raw.type_)
            .finish_non_exhaustive()
    }
}
