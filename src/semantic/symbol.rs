//! Symbols and lexical scopes.
//!
//! A `Scope` maps a name to a non-empty list of `Symbol`s (more than one only
//! when every member is overloadable, e.g. functions and operators). Scopes
//! form a tree rooted at the builtin scope and are addressed by `ScopeId`
//! handle into a `ScopeArena` rather than by pointer or weak reference, so the
//! scope tree can be built top-down and never needs to be freed mid-compilation.

use std::collections::HashMap;

use crate::semantic::types::{TypeId, TypeRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// A declared name: a type alias, a function/operator overload, a generic
/// placeholder, or the implicit argument reference `$`.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub type_id: TypeId,
    pub overloadable: bool,
}

impl Symbol {
    pub fn new(name: impl Into<String>, type_id: TypeId, overloadable: bool) -> Self {
        Self {
            name: name.into(),
            type_id,
            overloadable,
        }
    }
}

#[derive(Debug, Default)]
struct ScopeData {
    parent: Option<ScopeId>,
    symbols: HashMap<String, Vec<SymbolId>>,
}

/// Arena owning every scope and symbol allocated during a compilation.
pub struct ScopeArena {
    scopes: Vec<ScopeData>,
    symbols: Vec<Symbol>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            symbols: Vec::new(),
        }
    }

    pub fn push_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(ScopeData {
            parent,
            symbols: HashMap::new(),
        });
        id
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }

    /// Declares `symbol` at `scope`, returning the id it was allocated.
    pub fn insert(&mut self, scope: ScopeId, symbol: Symbol) -> SymbolId {
        let name = symbol.name.clone();
        let id = SymbolId(self.symbols.len());
        self.symbols.push(symbol);
        self.scopes[scope.0].symbols.entry(name).or_default().push(id);
        id
    }

    /// The first symbol declared at `scope` (local only) named `name`, analogous
    /// to the source's `Scope.first(where=lambda s: s.name == name)`.
    pub fn first_local(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.scopes[scope.0]
            .symbols
            .get(name)
            .and_then(|ids| ids.first().copied())
    }

    /// `scope[name]`: every symbol declared at `scope` (local only) under `name`.
    pub fn local(&self, scope: ScopeId, name: &str) -> &[SymbolId] {
        self.scopes[scope.0]
            .symbols
            .get(name)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// Walks from `scope` through parents, returning the innermost scope whose
    /// local map contains `name`.
    pub fn find_scope_of(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(s) = current {
            if self.scopes[s.0].symbols.contains_key(name) {
                return Some(s);
            }
            current = self.scopes[s.0].parent;
        }
        None
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the process-wide builtin scope described in SPEC_FULL.md §3: ground
/// type aliases, the opaque `.` operator, and the overloaded `+`/`!` operators
/// plus `print`. Always allocates scope id 0 when called on a fresh arena.
pub fn build_builtin_scope(types: &mut TypeRegistry, arena: &mut ScopeArena) -> ScopeId {
    let scope = arena.push_scope(None);

    let object_ty = types.object(Vec::new());
    let bool_ty = types.ground("Bool");
    let int_ty = types.ground("Int");
    let float_ty = types.ground("Float");
    let string_ty = types.ground("String");
    let list_ty = types.ground_generic("List", vec!["Element".to_string()]);
    let set_ty = types.ground_generic("Set", vec!["Element".to_string()]);

    for (name, subject) in [
        ("Object", object_ty),
        ("Bool", bool_ty),
        ("Int", int_ty),
        ("Float", float_ty),
        ("String", string_ty),
        ("List", list_ty),
        ("Set", set_ty),
    ] {
        let alias = types.alias(subject);
        arena.insert(scope, Symbol::new(name, alias, false));
    }

    // print : { item: Object } -> Nothing
    let nothing_ty = types.ground("Nothing");
    let print_domain = types.object(vec![("item".to_string(), object_ty)]);
    let print_ty = types.function(print_domain, nothing_ty, Vec::new());
    arena.insert(scope, Symbol::new("print", print_ty, true));

    // The dot operator is opaque: its inference is special-cased directly in
    // the InfixExpression rule (property access), so its declared type is
    // never actually consulted. It only needs to exist so that scope lookup
    // of `.` succeeds and the "is this the dot symbol" check has something to
    // compare the resolved candidate against.
    let dot_domain = types.object(Vec::new());
    let dot_codomain = types.fresh_variable();
    let dot_ty = types.function(dot_domain, dot_codomain, Vec::new());
    arena.insert(scope, Symbol::new(".", dot_ty, true));

    // + : {lhs:Int,rhs:Int} -> Int  |  {lhs:Float,rhs:Float} -> Float
    let int_pair = types.object(vec![("lhs".to_string(), int_ty), ("rhs".to_string(), int_ty)]);
    let plus_int = types.function(int_pair, int_ty, Vec::new());
    arena.insert(scope, Symbol::new("+", plus_int, true));

    let float_pair = types.object(vec![
        ("lhs".to_string(), float_ty),
        ("rhs".to_string(), float_ty),
    ]);
    let plus_float = types.function(float_pair, float_ty, Vec::new());
    arena.insert(scope, Symbol::new("+", plus_float, true));

    // ! : {lhs:List[Element],rhs:Int} -> Element
    let element_ph = types.fresh_placeholder("Element");
    let bang_domain = types.object(vec![("lhs".to_string(), list_ty), ("rhs".to_string(), int_ty)]);
    let bang_ty = types.function(bang_domain, element_ph, vec!["Element".to_string()]);
    arena.insert(scope, Symbol::new("!", bang_ty, true));

    scope
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_scope_of_walks_parents() {
        let mut types = TypeRegistry::new();
        let mut arena = ScopeArena::new();
        let builtin = build_builtin_scope(&mut types, &mut arena);
        let child = arena.push_scope(Some(builtin));

        assert_eq!(arena.find_scope_of(child, "Int"), Some(builtin));
        assert_eq!(arena.find_scope_of(child, "does-not-exist"), None);
    }

    #[test]
    fn local_shadows_and_keeps_only_own_scope() {
        let mut types = TypeRegistry::new();
        let mut arena = ScopeArena::new();
        let builtin = build_builtin_scope(&mut types, &mut arena);
        let child = arena.push_scope(Some(builtin));

        let fresh = types.fresh_variable();
        arena.insert(child, Symbol::new("Int", fresh, false));

        assert_eq!(arena.find_scope_of(child, "Int"), Some(child));
        assert_eq!(arena.local(builtin, "Int").len(), 1);
        assert_eq!(arena.local(child, "Int").len(), 1);
    }

    #[test]
    fn plus_is_overloaded_twice_in_builtin_scope() {
        let mut types = TypeRegistry::new();
        let mut arena = ScopeArena::new();
        let builtin = build_builtin_scope(&mut types, &mut arena);
        assert_eq!(arena.local(builtin, "+").len(), 2);
    }

    #[test]
    fn insert_allows_multiple_overloadable_symbols() {
        let mut types = TypeRegistry::new();
        let mut arena = ScopeArena::new();
        let scope = arena.push_scope(None);
        let a = types.fresh_variable();
        let b = types.fresh_variable();
        arena.insert(scope, Symbol::new("f", a, true));
        arena.insert(scope, Symbol::new("f", b, true));
        assert_eq!(arena.local(scope, "f").len(), 2);
    }
}
