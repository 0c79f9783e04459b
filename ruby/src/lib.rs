//! Ruby bindings for IPhreeqc
//!
//! Exposes `Phreeqc::Var` (a tagged value that follows Ruby assignment) and
//! `Phreeqc::IPhreeqc` (one engine instance). Values convert as:
//! nil <-> Empty, Integer <-> Long, Float <-> Double, String <-> String,
//! `:VR_*` Symbol <-> Error.

use std::cell::RefCell;
use std::sync::Arc;

use iphreeqc_native::{
    Api, Error as PhreeqcError, IPhreeqc, Payload, PhreeqcConfig, VResult, Var, VarError, VarType,
    VERSION,
};
use magnus::{
    function, method, prelude::*, scan_args::scan_args, Error, Float, Integer, RArray, RString,
    Ruby, StaticSymbol, Symbol, Value,
};

// ============================================================================
// Conversions
// ============================================================================

fn to_ruby_error(ruby: &Ruby, e: PhreeqcError) -> Error {
    let class = match &e {
        PhreeqcError::Var(VarError::TypeMismatch { .. })
        | PhreeqcError::Var(VarError::BadType { .. })
        | PhreeqcError::BadType => ruby.exception_type_error(),
        PhreeqcError::InvalidRow { .. } | PhreeqcError::InvalidCol { .. } => {
            ruby.exception_index_error()
        }
        PhreeqcError::InvalidArg(_) | PhreeqcError::Nul(_) | PhreeqcError::Path(_) => {
            ruby.exception_arg_error()
        }
        _ => ruby.exception_runtime_error(),
    };
    Error::new(class, e.to_string())
}

fn var_to_ruby(ruby: &Ruby, var: &Var) -> Value {
    match var.payload() {
        Payload::Empty => ruby.qnil().as_value(),
        Payload::Error(code) => ruby.sym_new(code.name()).as_value(),
        Payload::Long(v) => ruby.into_value(*v),
        Payload::Double(v) => ruby.into_value(*v),
        Payload::String(s) => ruby.into_value(s.as_str()),
    }
}

fn assign(ruby: &Ruby, var: &mut Var, value: Value) -> Result<(), Error> {
    if value.is_nil() {
        var.set_empty();
    } else if let Some(sym) = Symbol::from_value(value) {
        let name = sym.name()?;
        let code = VResult::from_name(&name).ok_or_else(|| {
            Error::new(ruby.exception_arg_error(), format!("Unknown result code: {}", name))
        })?;
        var.set_error(code);
    } else if let Some(i) = Integer::from_value(value) {
        var.set_integer(i.to_i64()?);
    } else if let Some(f) = Float::from_value(value) {
        var.set_double(f.to_f64());
    } else if let Some(s) = RString::from_value(value) {
        var.set_string(&s.to_string()?)
            .map_err(|e| to_ruby_error(ruby, e.into()))?;
    } else {
        return Err(Error::new(ruby.exception_type_error(), "Unknown type"));
    }
    Ok(())
}

// ============================================================================
// Phreeqc::Var
// ============================================================================

#[magnus::wrap(class = "Phreeqc::Var")]
struct RubyVar {
    var: RefCell<Var>,
}

impl RubyVar {
    fn new(args: &[Value]) -> Result<Self, Error> {
        let ruby = unsafe { Ruby::get_unchecked() };
        let args = scan_args::<(), (Option<Value>,), (), (), (), ()>(args)?;
        let (value,) = args.optional;

        let mut var = Var::new();
        if let Some(value) = value {
            assign(&ruby, &mut var, value)?;
        }
        Ok(Self { var: RefCell::new(var) })
    }

    fn value(&self) -> Value {
        let ruby = unsafe { Ruby::get_unchecked() };
        var_to_ruby(&ruby, &self.var.borrow())
    }

    fn set_value(&self, value: Value) -> Result<(), Error> {
        let ruby = unsafe { Ruby::get_unchecked() };
        assign(&ruby, &mut self.var.borrow_mut(), value)
    }

    fn type_code(&self) -> i32 {
        self.var.borrow().kind().code()
    }

    fn status(&self) -> StaticSymbol {
        let ruby = unsafe { Ruby::get_unchecked() };
        ruby.sym_new(self.var.borrow().status().name())
    }

    fn to_s(&self) -> String {
        self.var.borrow().to_string()
    }
}

// ============================================================================
// Phreeqc::IPhreeqc
// ============================================================================

#[magnus::wrap(class = "Phreeqc::IPhreeqc")]
struct RubyIPhreeqc {
    engine: RefCell<IPhreeqc>,
}

impl RubyIPhreeqc {
    fn new(args: &[Value]) -> Result<Self, Error> {
        let ruby = unsafe { Ruby::get_unchecked() };
        let args = scan_args::<(), (Option<String>,), (), (), (), ()>(args)?;
        let (library,) = args.optional;

        let mut config = PhreeqcConfig::from_env();
        if let Some(lib) = library {
            config = config.with_library(lib);
        }
        let api = Api::load(config.library_path()).map_err(|e| to_ruby_error(&ruby, e))?;
        let engine = IPhreeqc::new(Arc::new(api)).map_err(|e| to_ruby_error(&ruby, e))?;
        Ok(Self { engine: RefCell::new(engine) })
    }

    fn load_database(&self, path: String) -> Result<(), Error> {
        let ruby = unsafe { Ruby::get_unchecked() };
        self.engine.borrow_mut().load_database(&path)
            .map_err(|e| to_ruby_error(&ruby, e))
    }

    fn run_string(&self, input: String) -> Result<(), Error> {
        let ruby = unsafe { Ruby::get_unchecked() };
        self.engine.borrow_mut().run_input(&input)
            .map_err(|e| to_ruby_error(&ruby, e))
    }

    fn get_error_string(&self) -> String {
        self.engine.borrow().error_text()
    }

    fn get_warning_string(&self) -> String {
        self.engine.borrow().warning_text()
    }

    fn get_selected_output_row_count(&self) -> Result<usize, Error> {
        let ruby = unsafe { Ruby::get_unchecked() };
        self.engine.borrow().selected_output_row_count()
            .map_err(|e| to_ruby_error(&ruby, e))
    }

    fn get_selected_output_column_count(&self) -> Result<usize, Error> {
        let ruby = unsafe { Ruby::get_unchecked() };
        self.engine.borrow().selected_output_column_count()
            .map_err(|e| to_ruby_error(&ruby, e))
    }

    fn get_value(&self, row: usize, col: usize) -> Result<Value, Error> {
        let ruby = unsafe { Ruby::get_unchecked() };
        let var = self.engine.borrow().cell_value(row, col)
            .map_err(|e| to_ruby_error(&ruby, e))?;
        Ok(var_to_ruby(&ruby, &var))
    }

    fn get_component_count(&self) -> Result<usize, Error> {
        let ruby = unsafe { Ruby::get_unchecked() };
        self.engine.borrow().component_count()
            .map_err(|e| to_ruby_error(&ruby, e))
    }

    fn get_component(&self, index: usize) -> Result<String, Error> {
        let ruby = unsafe { Ruby::get_unchecked() };
        self.engine.borrow().component_name(index)
            .map_err(|e| to_ruby_error(&ruby, e))
    }

    fn components(&self) -> Result<Vec<String>, Error> {
        let ruby = unsafe { Ruby::get_unchecked() };
        self.engine.borrow().components()
            .map_err(|e| to_ruby_error(&ruby, e))
    }

    /// Whole table as an array of row arrays, headings first
    fn selected_output(&self) -> Result<RArray, Error> {
        let ruby = unsafe { Ruby::get_unchecked() };
        let table = self.engine.borrow().selected_output()
            .map_err(|e| to_ruby_error(&ruby, e))?;

        let rows = ruby.ary_new();
        for r in 0..table.shape().0 {
            let row = ruby.ary_new();
            for cell in table.row(r).unwrap_or_default() {
                row.push(var_to_ruby(&ruby, cell))?;
            }
            rows.push(row)?;
        }
        Ok(rows)
    }

    fn version(&self) -> String {
        self.engine.borrow().api().version()
    }
}

#[magnus::init]
fn init(ruby: &Ruby) -> Result<(), Error> {
    let phreeqc = ruby.define_module("Phreeqc")?;

    phreeqc.const_set("VERSION", VERSION)?;
    for t in VarType::ALL {
        phreeqc.const_set(t.name(), t.code())?;
    }
    for r in VResult::ALL {
        phreeqc.const_set(r.name(), ruby.sym_new(r.name()))?;
    }

    let var = phreeqc.define_class("Var", ruby.class_object())?;
    var.define_singleton_method("new", function!(RubyVar::new, -1))?;
    var.define_method("value", method!(RubyVar::value, 0))?;
    var.define_method("value=", method!(RubyVar::set_value, 1))?;
    var.define_method("type", method!(RubyVar::type_code, 0))?;
    var.define_method("status", method!(RubyVar::status, 0))?;
    var.define_method("to_s", method!(RubyVar::to_s, 0))?;

    let class = phreeqc.define_class("IPhreeqc", ruby.class_object())?;
    class.define_singleton_method("new", function!(RubyIPhreeqc::new, -1))?;
    class.define_method("load_database", method!(RubyIPhreeqc::load_database, 1))?;
    class.define_method("run_string", method!(RubyIPhreeqc::run_string, 1))?;
    class.define_method("get_error_string", method!(RubyIPhreeqc::get_error_string, 0))?;
    class.define_method("get_warning_string", method!(RubyIPhreeqc::get_warning_string, 0))?;
    class.define_method(
        "get_selected_output_row_count",
        method!(RubyIPhreeqc::get_selected_output_row_count, 0),
    )?;
    class.define_method(
        "get_selected_output_column_count",
        method!(RubyIPhreeqc::get_selected_output_column_count, 0),
    )?;
    class.define_method("get_value", method!(RubyIPhreeqc::get_value, 2))?;
    class.define_method("[]", method!(RubyIPhreeqc::get_value, 2))?;
    class.define_method("get_component_count", method!(RubyIPhreeqc::get_component_count, 0))?;
    class.define_method("get_component", method!(RubyIPhreeqc::get_component, 1))?;
    class.define_method("components", method!(RubyIPhreeqc::components, 0))?;
    class.define_method("selected_output", method!(RubyIPhreeqc::selected_output, 0))?;
    class.define_method("version", method!(RubyIPhreeqc::version, 0))?;

    phreeqc.const_set("NATIVE_AVAILABLE", true)?;

    Ok(())
}
