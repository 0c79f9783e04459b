//! In-process stand-in for the IPhreeqc C library.
//!
//! Implements the C entry points with the engine's conventions (error counts,
//! result codes, heading row 0, NULL for missing components, engine-owned
//! strings in `VAR`) over a tiny line-oriented input language:
//!
//! - database lines: `ELEMENT <name>`; `#` comments
//! - `SELECTED_OUTPUT <heading>...` starts a new table
//! - `PUNCH <value>...` appends a row; values parse as integer, float, or text
//! - `SOLUTION <element>...` sets the component list (sorted)
//! - `WARN <text>`, `FAIL <text>`
//!
//! State is thread-local so parallel tests do not interfere.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::sync::Arc;

use iphreeqc_native::sys::{
    ApiTable, IPQ_BADINSTANCE, IPQ_INVALIDCOL, IPQ_INVALIDROW, IPQ_OK, IPQ_OUTOFMEMORY, TT_DOUBLE,
    TT_EMPTY, TT_ERROR, TT_LONG, TT_STRING,
};
use iphreeqc_native::{Api, RawVar, VResult};

#[derive(Clone)]
enum Cell {
    Long(i64),
    Double(f64),
    Text(String),
}

#[derive(Default)]
struct Instance {
    elements: Option<Vec<String>>,
    error: CString,
    warning: CString,
    headings: Vec<String>,
    rows: Vec<Vec<Cell>>,
    components: Vec<CString>,
    accumulated: String,
    accumulated_ran: bool,
}

#[derive(Default)]
struct Engine {
    next_id: c_int,
    instances: HashMap<c_int, Instance>,
    live_strings: usize,
    fail_next_create: bool,
}

thread_local! {
    static ENGINE: RefCell<Engine> = RefCell::new(Engine::default());
}

static VERSION: &[u8] = b"IPhreeqc mock 3.8.6\0";

fn with_instance<R>(id: c_int, f: impl FnOnce(&mut Instance) -> R) -> Option<R> {
    ENGINE.with(|e| e.borrow_mut().instances.get_mut(&id).map(f))
}

fn c_str(s: &str) -> CString {
    CString::new(s.replace('\0', " ")).unwrap()
}

unsafe fn arg(s: *const c_char) -> String {
    CStr::from_ptr(s).to_string_lossy().into_owned()
}

// ============================================================================
// Input handling
// ============================================================================

fn parse_database(text: &str) -> Result<Vec<String>, String> {
    let mut elements = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.split_whitespace().collect::<Vec<_>>().as_slice() {
            ["ELEMENT", name] => elements.push(name.to_string()),
            _ => return Err(format!("ERROR: Unknown database keyword at line {}: {}\n", n + 1, line)),
        }
    }
    if elements.is_empty() {
        return Err("ERROR: No elements defined in database.\n".to_string());
    }
    Ok(elements)
}

fn parse_cell(token: &str) -> Cell {
    if let Ok(v) = token.parse::<i64>() {
        Cell::Long(v)
    } else if let Ok(v) = token.parse::<f64>() {
        Cell::Double(v)
    } else {
        Cell::Text(token.to_string())
    }
}

fn run(inst: &mut Instance, input: &str) -> c_int {
    inst.warning = CString::default();
    let elements = match &inst.elements {
        Some(e) => e.clone(),
        None => {
            inst.error = c_str("ERROR: RunString: No database is loaded\n");
            return 1;
        }
    };

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let keyword = tokens.next().unwrap_or_default();
        let rest: Vec<&str> = tokens.collect();
        match keyword {
            "SELECTED_OUTPUT" => {
                inst.headings = rest.iter().map(|s| s.to_string()).collect();
                inst.rows.clear();
            }
            "PUNCH" => {
                if rest.len() != inst.headings.len() {
                    errors.push(format!(
                        "ERROR: PUNCH has {} values for {} headings.",
                        rest.len(),
                        inst.headings.len()
                    ));
                } else {
                    inst.rows.push(rest.iter().map(|t| parse_cell(t)).collect());
                }
            }
            "SOLUTION" => {
                let mut names = Vec::new();
                for name in &rest {
                    if elements.iter().any(|e| e == name) {
                        names.push(name.to_string());
                    } else {
                        errors.push(format!("ERROR: Element {} not in database.", name));
                    }
                }
                names.sort();
                names.dedup();
                inst.components = names.iter().map(|n| c_str(n)).collect();
            }
            "WARN" => warnings.push(format!("WARNING: {}", rest.join(" "))),
            "FAIL" => errors.push(format!("ERROR: {}", rest.join(" "))),
            other => errors.push(format!("ERROR: Unknown input keyword {}.", other)),
        }
    }

    inst.warning = c_str(&warnings.join("\n"));
    if errors.is_empty() {
        inst.error = CString::default();
    } else {
        inst.error = c_str(&(errors.join("\n") + "\n"));
    }
    errors.len() as c_int
}

// ============================================================================
// C entry points
// ============================================================================

unsafe extern "C" fn create() -> c_int {
    ENGINE.with(|e| {
        let mut e = e.borrow_mut();
        if std::mem::take(&mut e.fail_next_create) {
            return IPQ_OUTOFMEMORY;
        }
        let id = e.next_id;
        e.next_id += 1;
        e.instances.insert(id, Instance::default());
        id
    })
}

unsafe extern "C" fn destroy(id: c_int) -> c_int {
    ENGINE.with(|e| match e.borrow_mut().instances.remove(&id) {
        Some(_) => IPQ_OK,
        None => IPQ_BADINSTANCE,
    })
}

unsafe extern "C" fn load_database_string(id: c_int, input: *const c_char) -> c_int {
    let text = arg(input);
    with_instance(id, |inst| match parse_database(&text) {
        Ok(elements) => {
            inst.elements = Some(elements);
            inst.error = CString::default();
            inst.headings.clear();
            inst.rows.clear();
            inst.components.clear();
            0
        }
        Err(message) => {
            inst.elements = None;
            inst.error = c_str(&message);
            1
        }
    })
    .unwrap_or(IPQ_BADINSTANCE)
}

unsafe extern "C" fn load_database(id: c_int, filename: *const c_char) -> c_int {
    let path = arg(filename);
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            let c_text = c_str(&text);
            load_database_string(id, c_text.as_ptr())
        }
        Err(_) => with_instance(id, |inst| {
            inst.elements = None;
            inst.error = c_str(&format!("ERROR: LoadDatabase: Unable to open:\"{}\".\n", path));
            1
        })
        .unwrap_or(IPQ_BADINSTANCE),
    }
}

unsafe extern "C" fn run_string(id: c_int, input: *const c_char) -> c_int {
    let input = arg(input);
    with_instance(id, |inst| run(inst, &input)).unwrap_or(IPQ_BADINSTANCE)
}

unsafe extern "C" fn run_file(id: c_int, filename: *const c_char) -> c_int {
    let path = arg(filename);
    match std::fs::read_to_string(&path) {
        Ok(text) => with_instance(id, |inst| run(inst, &text)).unwrap_or(IPQ_BADINSTANCE),
        Err(_) => with_instance(id, |inst| {
            inst.error = c_str(&format!("ERROR: RunFile: Unable to open:\"{}\".\n", path));
            1
        })
        .unwrap_or(IPQ_BADINSTANCE),
    }
}

unsafe extern "C" fn accumulate_line(id: c_int, line: *const c_char) -> c_int {
    let line = arg(line);
    with_instance(id, |inst| {
        if std::mem::take(&mut inst.accumulated_ran) {
            inst.accumulated.clear();
        }
        inst.accumulated.push_str(&line);
        inst.accumulated.push('\n');
        IPQ_OK
    })
    .unwrap_or(IPQ_BADINSTANCE)
}

unsafe extern "C" fn run_accumulated(id: c_int) -> c_int {
    with_instance(id, |inst| {
        let input = inst.accumulated.clone();
        inst.accumulated_ran = true;
        run(inst, &input)
    })
    .unwrap_or(IPQ_BADINSTANCE)
}

unsafe extern "C" fn clear_accumulated_lines(id: c_int) -> c_int {
    with_instance(id, |inst| {
        inst.accumulated.clear();
        IPQ_OK
    })
    .unwrap_or(IPQ_BADINSTANCE)
}

unsafe extern "C" fn get_error_string(id: c_int) -> *const c_char {
    with_instance(id, |inst| inst.error.as_ptr()).unwrap_or(std::ptr::null())
}

unsafe extern "C" fn get_warning_string(id: c_int) -> *const c_char {
    with_instance(id, |inst| inst.warning.as_ptr()).unwrap_or(std::ptr::null())
}

unsafe extern "C" fn row_count(id: c_int) -> c_int {
    with_instance(id, |inst| {
        if inst.headings.is_empty() {
            0
        } else {
            1 + inst.rows.len() as c_int
        }
    })
    .unwrap_or(IPQ_BADINSTANCE)
}

unsafe extern "C" fn column_count(id: c_int) -> c_int {
    with_instance(id, |inst| inst.headings.len() as c_int).unwrap_or(IPQ_BADINSTANCE)
}

fn alloc_string(s: &str) -> *mut c_char {
    ENGINE.with(|e| e.borrow_mut().live_strings += 1);
    c_str(s).into_raw()
}

unsafe fn set_error(var: *mut RawVar, code: VResult) -> c_int {
    (*var).type_ = TT_ERROR;
    (*var).payload.vresult = code.code();
    code.code()
}

unsafe extern "C" fn get_value(id: c_int, row: c_int, col: c_int, var: *mut RawVar) -> c_int {
    var_clear(var);
    let cell = with_instance(id, |inst| {
        let rows = if inst.headings.is_empty() { 0 } else { 1 + inst.rows.len() };
        if row < 0 || row as usize >= rows {
            return Err(IPQ_INVALIDROW);
        }
        if col < 0 || col as usize >= inst.headings.len() {
            return Err(IPQ_INVALIDCOL);
        }
        let (row, col) = (row as usize, col as usize);
        if row == 0 {
            Ok(Cell::Text(inst.headings[col].clone()))
        } else {
            Ok(inst.rows[row - 1][col].clone())
        }
    });

    match cell {
        None => IPQ_BADINSTANCE,
        Some(Err(IPQ_INVALIDROW)) => set_error(var, VResult::InvalidRow),
        Some(Err(_)) => set_error(var, VResult::InvalidCol),
        Some(Ok(Cell::Long(v))) => {
            (*var).type_ = TT_LONG;
            (*var).payload.l_val = v as _;
            IPQ_OK
        }
        Some(Ok(Cell::Double(v))) => {
            (*var).type_ = TT_DOUBLE;
            (*var).payload.d_val = v;
            IPQ_OK
        }
        Some(Ok(Cell::Text(s))) => {
            (*var).type_ = TT_STRING;
            (*var).payload.s_val = alloc_string(&s);
            IPQ_OK
        }
    }
}

unsafe extern "C" fn component_count(id: c_int) -> c_int {
    with_instance(id, |inst| inst.components.len() as c_int).unwrap_or(IPQ_BADINSTANCE)
}

unsafe extern "C" fn get_component(id: c_int, n: c_int) -> *const c_char {
    with_instance(id, |inst| {
        usize::try_from(n)
            .ok()
            .and_then(|n| inst.components.get(n))
            .map_or(std::ptr::null(), |c| c.as_ptr())
    })
    .unwrap_or(std::ptr::null())
}

unsafe extern "C" fn version() -> *const c_char {
    VERSION.as_ptr() as *const c_char
}

unsafe extern "C" fn var_init(var: *mut RawVar) {
    (*var).type_ = TT_EMPTY;
    (*var).payload.d_val = 0.0;
}

unsafe extern "C" fn var_clear(var: *mut RawVar) -> c_int {
    if (*var).type_ == TT_STRING && !(*var).payload.s_val.is_null() {
        drop(CString::from_raw((*var).payload.s_val));
        ENGINE.with(|e| e.borrow_mut().live_strings -= 1);
    }
    var_init(var);
    IPQ_OK
}

// ============================================================================
// Test helpers
// ============================================================================

pub fn table() -> ApiTable {
    ApiTable {
        create,
        destroy,
        load_database,
        load_database_string,
        run_string,
        run_file,
        accumulate_line,
        run_accumulated,
        clear_accumulated_lines,
        get_error_string,
        get_warning_string,
        get_selected_output_row_count: row_count,
        get_selected_output_column_count: column_count,
        get_selected_output_value: get_value,
        get_component_count: component_count,
        get_component,
        get_version_string: version,
        var_init,
        var_clear,
    }
}

pub fn api() -> Arc<Api> {
    Arc::new(unsafe { Api::from_table(table()) })
}

/// Engine strings handed out through `VAR` and not yet released
pub fn live_strings() -> usize {
    ENGINE.with(|e| e.borrow().live_strings)
}

pub fn live_instances() -> usize {
    ENGINE.with(|e| e.borrow().instances.len())
}

pub fn fail_next_create() {
    ENGINE.with(|e| e.borrow_mut().fail_next_create = true);
}

/// Place an engine string directly into a raw `VAR`, as the engine would
pub unsafe fn fill_string(var: *mut RawVar, s: &str) {
    var_clear(var);
    (*var).type_ = TT_STRING;
    (*var).payload.s_val = alloc_string(s);
}

pub const DATABASE: &str = "\
# minimal element list
ELEMENT Ca
ELEMENT Cl
ELEMENT K
ELEMENT N
ELEMENT Na
";

/// Write `DATABASE` to a temp dir; keep the dir alive while the path is used
pub fn database_file() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("phreeqc.dat");
    std::fs::write(&path, DATABASE).unwrap();
    (dir, path)
}
