//! Lexically nested name → slot mapping feeding global (and, were locals
//! wired up, local) storage. Modeled as an explicit stack of owned scopes
//! rather than the source's back-pointer chain, per §9's re-architecture
//! note — an ownership-disciplined implementation keeps the outer scope
//! inside `Some(Box<SymbolTable>)` instead of a shared/borrowed reference.

use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

pub struct SymbolTable {
    outer: Option<Box<SymbolTable>>,
    store: FxHashMap<String, Symbol>,
    num_definitions: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable { outer: None, store: FxHashMap::default(), num_definitions: 0 }
    }

    /// A scope with no enclosing scope assigns Global; otherwise Local.
    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.outer.is_some() { SymbolScope::Local } else { SymbolScope::Global };
        let symbol = Symbol { name: name.to_string(), scope, index: self.num_definitions };
        self.store.insert(name.to_string(), symbol.clone());
        self.num_definitions += 1;
        symbol
    }

    /// Looks up `name` in the innermost scope, delegating outward to the
    /// nearest enclosing definition when absent. Resolution never crosses
    /// back inward.
    pub fn resolve(&self, name: &str) -> Option<Symbol> {
        match self.store.get(name) {
            Some(sym) => Some(sym.clone()),
            None => self.outer.as_ref().and_then(|outer| outer.resolve(name)),
        }
    }

    /// Pushes a new empty scope whose outer pointer is `self`, returning
    /// the enclosed table. Call `leave` on it to get `self` back.
    pub fn enclose(self) -> SymbolTable {
        SymbolTable { outer: Some(Box::new(self)), store: FxHashMap::default(), num_definitions: 0 }
    }

    /// Pops this scope, returning the outer table it was enclosing.
    /// Panics if called on the outermost (global) table — the compiler
    /// never leaves more scopes than it enters.
    pub fn leave(self) -> SymbolTable {
        *self.outer.expect("cannot leave the outermost symbol table")
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_in_global_scope_assigns_global_and_sequential_indices() {
        let mut table = SymbolTable::new();
        let a = table.define("a");
        let b = table.define("b");
        assert_eq!(a, Symbol { name: "a".into(), scope: SymbolScope::Global, index: 0 });
        assert_eq!(b, Symbol { name: "b".into(), scope: SymbolScope::Global, index: 1 });
    }

    #[test]
    fn define_in_enclosed_scope_assigns_local() {
        let mut global = SymbolTable::new();
        global.define("a");
        let mut local = global.enclose();
        let b = local.define("b");
        assert_eq!(b.scope, SymbolScope::Local);
        assert_eq!(b.index, 0);
    }

    #[test]
    fn resolve_finds_innermost_definition_first() {
        let mut global = SymbolTable::new();
        global.define("x");
        let mut local = global.enclose();
        local.define("x");
        let resolved = local.resolve("x").unwrap();
        assert_eq!(resolved.scope, SymbolScope::Local);
    }

    #[test]
    fn resolve_delegates_outward_when_absent_locally() {
        let mut global = SymbolTable::new();
        global.define("outer");
        let local = global.enclose();
        let resolved = local.resolve("outer").unwrap();
        assert_eq!(resolved.scope, SymbolScope::Global);
    }

    #[test]
    fn resolve_never_crosses_back_inward() {
        let mut global = SymbolTable::new();
        let mut local = global.enclose();
        local.define("inner_only");
        let global_again = local.leave();
        assert!(global_again.resolve("inner_only").is_none());
    }

    #[test]
    fn resolve_unknown_name_is_none() {
        let table = SymbolTable::new();
        assert!(table.resolve("nope").is_none());
    }

    #[test]
    fn redefining_a_name_in_the_same_scope_overwrites() {
        let mut table = SymbolTable::new();
        table.define("x");
        let redefined = table.define("x");
        assert_eq!(redefined.index, 1);
        assert_eq!(table.resolve("x").unwrap().index, 1);
    }
}
