//! Tagged values crossing the engine boundary
//!
//! `Var` is the safe counterpart of the engine's `VAR` union. The payload is a
//! real sum type, so a slot that is not active cannot be read, and the string
//! arm owns its buffer.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::VarError;

// ============================================================================
// Discriminant and status codes
// ============================================================================

/// Payload kind, with the engine's `VAR_TYPE` codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum VarType {
    Empty = 0,
    Error = 1,
    Long = 2,
    Double = 3,
    String = 4,
}

impl VarType {
    pub const ALL: [VarType; 5] = [
        VarType::Empty,
        VarType::Error,
        VarType::Long,
        VarType::Double,
        VarType::String,
    ];

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    /// Engine-side constant name (`TT_EMPTY`, ...)
    pub fn name(self) -> &'static str {
        match self {
            VarType::Empty => "TT_EMPTY",
            VarType::Error => "TT_ERROR",
            VarType::Long => "TT_LONG",
            VarType::Double => "TT_DOUBLE",
            VarType::String => "TT_STRING",
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operation result code, with the engine's `VRESULT` codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum VResult {
    #[default]
    Ok = 0,
    OutOfMemory = -1,
    BadVarType = -2,
    InvalidArg = -3,
    InvalidRow = -4,
    InvalidCol = -5,
}

impl VResult {
    pub const ALL: [VResult; 6] = [
        VResult::Ok,
        VResult::OutOfMemory,
        VResult::BadVarType,
        VResult::InvalidArg,
        VResult::InvalidRow,
        VResult::InvalidCol,
    ];

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.code() == code)
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == VResult::Ok
    }

    /// Engine-side constant name (`VR_OK`, ...)
    pub fn name(self) -> &'static str {
        match self {
            VResult::Ok => "VR_OK",
            VResult::OutOfMemory => "VR_OUTOFMEMORY",
            VResult::BadVarType => "VR_BADVARTYPE",
            VResult::InvalidArg => "VR_INVALIDARG",
            VResult::InvalidRow => "VR_INVALIDROW",
            VResult::InvalidCol => "VR_INVALIDCOL",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }
}

impl fmt::Display for VResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for VResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

// ============================================================================
// Tagged value
// ============================================================================

/// The active arm of a `Var`
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    #[default]
    Empty,
    Error(VResult),
    Long(i64),
    Double(f64),
    String(String),
}

impl Payload {
    pub fn kind(&self) -> VarType {
        match self {
            Payload::Empty => VarType::Empty,
            Payload::Error(_) => VarType::Error,
            Payload::Long(_) => VarType::Long,
            Payload::Double(_) => VarType::Double,
            Payload::String(_) => VarType::String,
        }
    }
}

/// A single typed value plus the status of the operation that produced it.
///
/// Every setter drops the previous payload before installing the next one, so
/// at most one string buffer is owned at any point and reassignment never
/// leaks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Var {
    payload: Payload,
    status: VResult,
}

impl Var {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(&self) -> VarType {
        self.payload.kind()
    }

    pub fn status(&self) -> VResult {
        self.status
    }

    pub fn set_status(&mut self, status: VResult) {
        self.status = status;
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.payload, Payload::Empty)
    }

    /// Release any owned string and reset to Empty
    pub fn clear(&mut self) {
        self.payload = Payload::Empty;
    }

    pub fn set_empty(&mut self) {
        self.clear();
        self.status = VResult::Ok;
    }

    pub fn set_error(&mut self, code: VResult) {
        self.clear();
        self.payload = Payload::Error(code);
        self.status = VResult::Ok;
    }

    pub fn set_integer(&mut self, value: i64) {
        self.clear();
        self.payload = Payload::Long(value);
        self.status = VResult::Ok;
    }

    pub fn set_double(&mut self, value: f64) {
        self.clear();
        self.payload = Payload::Double(value);
        self.status = VResult::Ok;
    }

    /// Copy `text` into a freshly allocated buffer.
    ///
    /// On allocation failure the value stays Empty with an `OutOfMemory`
    /// status.
    pub fn set_string(&mut self, text: &str) -> Result<(), VarError> {
        self.clear();
        let mut owned = String::new();
        if owned.try_reserve_exact(text.len()).is_err() {
            self.status = VResult::OutOfMemory;
            return Err(VarError::OutOfMemory { len: text.len() });
        }
        owned.push_str(text);
        self.payload = Payload::String(owned);
        self.status = VResult::Ok;
        Ok(())
    }

    /// Take ownership of an existing buffer without copying
    pub fn set_owned_string(&mut self, text: String) {
        self.clear();
        self.payload = Payload::String(text);
        self.status = VResult::Ok;
    }

    pub fn get_integer(&self) -> Result<i64, VarError> {
        match self.payload {
            Payload::Long(v) => Ok(v),
            _ => Err(self.mismatch(VarType::Long)),
        }
    }

    pub fn get_double(&self) -> Result<f64, VarError> {
        match self.payload {
            Payload::Double(v) => Ok(v),
            _ => Err(self.mismatch(VarType::Double)),
        }
    }

    pub fn get_string(&self) -> Result<&str, VarError> {
        match &self.payload {
            Payload::String(s) => Ok(s),
            _ => Err(self.mismatch(VarType::String)),
        }
    }

    pub fn get_error(&self) -> Result<VResult, VarError> {
        match self.payload {
            Payload::Error(code) => Ok(code),
            _ => Err(self.mismatch(VarType::Error)),
        }
    }

    /// Numeric view: Long widens to f64, Double as-is
    pub fn as_f64(&self) -> Option<f64> {
        match self.payload {
            Payload::Long(v) => Some(v as f64),
            Payload::Double(v) => Some(v),
            _ => None,
        }
    }

    fn mismatch(&self, expected: VarType) -> VarError {
        VarError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }
}

impl From<i64> for Var {
    fn from(value: i64) -> Self {
        Self { payload: Payload::Long(value), status: VResult::Ok }
    }
}

impl From<f64> for Var {
    fn from(value: f64) -> Self {
        Self { payload: Payload::Double(value), status: VResult::Ok }
    }
}

impl From<VResult> for Var {
    fn from(code: VResult) -> Self {
        Self { payload: Payload::Error(code), status: VResult::Ok }
    }
}

impl From<String> for Var {
    fn from(value: String) -> Self {
        Self { payload: Payload::String(value), status: VResult::Ok }
    }
}

impl From<Payload> for Var {
    fn from(payload: Payload) -> Self {
        Self { payload, status: VResult::Ok }
    }
}

impl TryFrom<&Var> for i64 {
    type Error = VarError;

    fn try_from(var: &Var) -> Result<Self, Self::Error> {
        var.get_integer()
    }
}

impl TryFrom<&Var> for f64 {
    type Error = VarError;

    fn try_from(var: &Var) -> Result<Self, Self::Error> {
        var.get_double()
    }
}

impl TryFrom<&Var> for String {
    type Error = VarError;

    fn try_from(var: &Var) -> Result<Self, Self::Error> {
        var.get_string().map(str::to_owned)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Payload::Empty => Ok(()),
            Payload::Error(code) => write!(f, "#{}", code),
            Payload::Long(v) => write!(f, "{}", v),
            Payload::Double(v) => write!(f, "{}", v),
            Payload::String(s) => f.write_str(s),
        }
    }
}

impl Serialize for Var {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.payload {
            Payload::Empty => serializer.serialize_none(),
            Payload::Error(code) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", code)?;
                map.end()
            }
            Payload::Long(v) => serializer.serialize_i64(*v),
            Payload::Double(v) => serializer.serialize_f64(*v),
            Payload::String(s) => serializer.serialize_str(s),
        }
    }
}
