//! Symbols and their global value cells
//!
//! A symbol is an interned identity. Its global value is process-wide; its
//! dynamic (rebound) value is per-thread and lives in the thread's unwind
//! state, see `thread_state::symbol_value`.

use super::values::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

static SYMBOLS: OnceLock<Mutex<SymbolTable>> = OnceLock::new();

#[derive(Default)]
struct SymbolTable {
    names: Vec<Arc<str>>,
    interned: HashMap<Arc<str>, Symbol>,
    globals: Vec<Option<Value>>,
}

impl SymbolTable {
    fn push(&mut self, name: Arc<str>) -> Symbol {
        let sym = Symbol(self.names.len() as u32);
        self.names.push(name);
        self.globals.push(None);
        sym
    }
}

fn table() -> MutexGuard<'static, SymbolTable> {
    SYMBOLS
        .get_or_init(|| Mutex::new(SymbolTable::default()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Interned symbol identity
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Symbol(u32);

impl Symbol {
    /// Intern `name`, returning the same symbol for the same name.
    pub fn intern(name: &str) -> Self {
        let mut table = table();
        if let Some(sym) = table.interned.get(name) {
            return *sym;
        }
        let name: Arc<str> = Arc::from(name);
        let sym = table.push(name.clone());
        table.interned.insert(name, sym);
        sym
    }

    /// A fresh symbol that is never returned by [`Symbol::intern`].
    pub fn gensym(prefix: &str) -> Self {
        let mut table = table();
        let name = format!("{}{}", prefix, table.names.len());
        table.push(Arc::from(name.as_str()))
    }

    pub fn name(&self) -> Arc<str> {
        table().names[self.0 as usize].clone()
    }

    /// Global (unbound-in-every-thread) value, if any
    pub fn global_value(&self) -> Option<Value> {
        table().globals[self.0 as usize].clone()
    }

    pub fn set_global_value(&self, value: Value) {
        table().globals[self.0 as usize] = Some(value);
    }

    pub fn make_unbound(&self) {
        table().globals[self.0 as usize] = None;
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_returns_same_symbol() {
        assert_eq!(Symbol::intern("*print-base*"), Symbol::intern("*print-base*"));
        assert_ne!(Symbol::intern("*print-base*"), Symbol::intern("*print-radix*"));
    }

    #[test]
    fn test_gensym_is_not_interned() {
        let g = Symbol::gensym("G");
        assert_ne!(Symbol::intern(&g.name()), g);
    }

    #[test]
    fn test_global_value_cell() {
        let sym = Symbol::gensym("*global-");
        assert_eq!(sym.global_value(), None);
        sym.set_global_value(Value::Int(3));
        assert_eq!(sym.global_value(), Some(Value::Int(3)));
        sym.make_unbound();
        assert_eq!(sym.global_value(), None);
    }
}
