//! IPhreeqc native bindings
//!
//! Safe marshaling between the IPhreeqc geochemical engine and Rust or any
//! host language:
//!
//! - [`Var`]: the engine's tagged value as a Rust sum type with checked
//!   accessors and an owned string arm
//! - [`ScopedVar`]: RAII handle over an engine-native `VAR`, released exactly
//!   once on every exit path
//! - [`IPhreeqc`]: one engine instance, with load/run/query calls and result
//!   codes translated into [`Error`]
//! - [`Phreeqc`]: config-driven session on top of `IPhreeqc`
//! - [`ffi`]: C ABI exports for Fiddle-style hosts
//!
//! The engine is reached only through its C entry points, resolved at runtime
//! with `libloading` ([`Api::load`]) or provided as a table
//! ([`Api::from_table`]).
//!
//! ```ignore
//! use iphreeqc_native::{Phreeqc, PhreeqcConfig};
//!
//! let mut phreeqc = Phreeqc::open(PhreeqcConfig::from_env())?;
//! phreeqc.run("SOLUTION 1\n    Ca 1.0\nEND")?;
//! println!("{:?}", phreeqc.components()?);
//! ```

pub mod config;
pub mod error;
pub mod ffi;
pub mod output;
pub mod phreeqc;
pub mod scoped;
pub mod session;
pub mod sys;
pub mod var;

pub use config::PhreeqcConfig;
pub use error::{Error, Result, VarError};
pub use output::SelectedOutput;
pub use phreeqc::IPhreeqc;
pub use scoped::ScopedVar;
pub use session::Phreeqc;
pub use sys::{Api, ApiTable, RawVar};
pub use var::{Payload, VResult, Var, VarType};

/// Build version, set through `VERSION_INFO` at compile time
pub const VERSION: &str = match option_env!("VERSION_INFO") {
    Some(v) => v,
    None => "dev",
};
