//! Persistent variable table.
//!
//! Cells are reference-counted and never move, so AST nodes and external
//! bindings (MIDI slots, transport time, x/y) can hold a handle to the same
//! cell for the whole session. Recompiling a program never destroys a cell.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// A named, mutable float. Reads and writes of a single cell are atomic.
pub struct VarCell {
    name: Box<str>,
    bits: AtomicU32,
}

/// A shared handle to a [`VarCell`].
#[derive(Clone)]
pub struct VarRef(Arc<VarCell>);

impl VarRef {
    fn new(name: &str, value: f32) -> Self {
        Self(Arc::new(VarCell {
            name: name.into(),
            bits: AtomicU32::new(value.to_bits()),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.bits.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set(&self, value: f32) {
        self.0.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Whether both handles point to the same cell.
    pub fn same_cell(&self, other: &VarRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for VarRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_cell(other)
    }
}

impl fmt::Debug for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarRef({} = {})", self.name(), self.get())
    }
}

/// Whether `name` may name a variable.
pub fn is_valid_name(name: &str) -> bool {
    match name.chars().next() {
        Some(c) => !c.is_ascii_digit(),
        None => false,
    }
}

/// Name-keyed set of variable cells owned by a session.
#[derive(Default)]
pub struct VariableTable {
    cells: Mutex<HashMap<Box<str>, VarRef>>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Box<str>, VarRef>> {
        self.cells.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Find an existing cell.
    pub fn lookup(&self, name: &str) -> Option<VarRef> {
        self.lock().get(name).cloned()
    }

    /// Find a cell, creating it with value 0 if it does not exist yet.
    ///
    /// Returns `None` if `name` is empty or starts with a digit.
    pub fn declare(&self, name: &str) -> Option<VarRef> {
        if !is_valid_name(name) {
            return None;
        }
        let mut cells = self.lock();
        let var = cells
            .entry(name.into())
            .or_insert_with(|| VarRef::new(name, 0.0));
        Some(var.clone())
    }

    /// Declare `name` and set it to `value`.
    pub fn define(&self, name: &str, value: f32) -> Option<VarRef> {
        let var = self.declare(name)?;
        var.set(value);
        Some(var)
    }

    /// Current value of a variable, if it exists.
    pub fn get(&self, name: &str) -> Option<f32> {
        self.lookup(name).map(|v| v.get())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Open a staging scope for one compilation.
    ///
    /// Cells the compiler creates are only inserted into the table when the
    /// scope is committed; dropping it discards them.
    pub fn scope(&self) -> Scope<'_> {
        Scope {
            cells: self.lock(),
            staged: HashMap::new(),
        }
    }
}

/// Staged view of a [`VariableTable`] held for the duration of a compile.
pub struct Scope<'a> {
    cells: MutexGuard<'a, HashMap<Box<str>, VarRef>>,
    staged: HashMap<Box<str>, VarRef>,
}

impl Scope<'_> {
    /// Resolve `name` to a cell, implicitly declaring it at 0.
    pub fn resolve(&mut self, name: &str) -> Option<VarRef> {
        if !is_valid_name(name) {
            return None;
        }
        if let Some(var) = self.cells.get(name).or_else(|| self.staged.get(name)) {
            return Some(var.clone());
        }
        let var = VarRef::new(name, 0.0);
        self.staged.insert(name.into(), var.clone());
        Some(var)
    }

    /// Number of cells this scope would add.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    pub fn commit(mut self) {
        let staged = std::mem::take(&mut self.staged);
        self.cells.extend(staged);
    }
}
