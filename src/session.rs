//! Config-driven engine session
//!
//! `Phreeqc` loads the library, creates an instance and loads the configured
//! database in one step. Everything else is delegated to [`IPhreeqc`].

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::config::PhreeqcConfig;
use crate::error::Result;
use crate::output::SelectedOutput;
use crate::phreeqc::IPhreeqc;
use crate::sys::Api;
use crate::var::Var;

#[derive(Debug)]
pub struct Phreeqc {
    engine: IPhreeqc,
    config: PhreeqcConfig,
}

impl Phreeqc {
    pub fn open(config: PhreeqcConfig) -> Result<Self> {
        let api = Arc::new(Api::load(config.library_path())?);
        Self::with_api(api, config)
    }

    /// Open with defaults and environment overrides
    pub fn from_env() -> Result<Self> {
        Self::open(PhreeqcConfig::from_env())
    }

    pub fn with_api(api: Arc<Api>, config: PhreeqcConfig) -> Result<Self> {
        let mut engine = IPhreeqc::new(api)?;
        engine.load_database(config.database_path())?;
        Ok(Self { engine, config })
    }

    pub fn config(&self) -> &PhreeqcConfig {
        &self.config
    }

    pub fn engine(&self) -> &IPhreeqc {
        &self.engine
    }

    pub fn into_engine(self) -> IPhreeqc {
        self.engine
    }

    pub fn run(&mut self, input: &str) -> Result<()> {
        self.engine.run_input(input)
    }

    /// (rows, columns) of the selected output, heading row included
    pub fn shape(&self) -> Result<(usize, usize)> {
        Ok((
            self.engine.selected_output_row_count()?,
            self.engine.selected_output_column_count()?,
        ))
    }

    pub fn get(&self, row: usize, col: usize) -> Result<Var> {
        self.engine.cell_value(row, col)
    }

    pub fn selected_output(&self) -> Result<SelectedOutput> {
        self.engine.selected_output()
    }
}

impl Deref for Phreeqc {
    type Target = IPhreeqc;

    fn deref(&self) -> &IPhreeqc {
        &self.engine
    }
}

impl DerefMut for Phreeqc {
    fn deref_mut(&mut self) -> &mut IPhreeqc {
        &mut self.engine
    }
}
