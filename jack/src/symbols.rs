//! Two-scope symbol table.
use std::collections::HashMap;

use smol_str::SmolStr;

/// Storage kind of a defined identifier.
///
/// `Static` and `Field` entries always live in class scope, `Arg`
/// and `Var` entries in subroutine scope. `None` is the sentinel
/// returned by lookups for names that are not defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Static,
    Field,
    Arg,
    Var,
    None,
}

#[derive(Debug, Clone)]
struct Entry {
    kind: SymbolKind,
    ty: SmolStr,
    index: u16,
}

/// Maps identifier names to `(kind, type, index)` across the class
/// scope and the subroutine scope.
///
/// Indices are dense, 0-based and assigned per kind in definition
/// order. Lookups consult subroutine scope first once a subroutine
/// has been entered, then class scope.
#[derive(Debug, Default)]
pub struct SymbolTable {
    class_scope: HashMap<SmolStr, Entry>,
    subroutine_scope: HashMap<SmolStr, Entry>,
    counts: [u16; 4],
    subroutine_active: bool,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins a new subroutine scope, clearing the previous
    /// subroutine's entries and index counters. Class scope remains
    /// visible beneath.
    pub fn start_subroutine(&mut self) {
        self.subroutine_scope.clear();
        self.counts[slot(SymbolKind::Arg)] = 0;
        self.counts[slot(SymbolKind::Var)] = 0;
        self.subroutine_active = true;
    }

    /// Defines a new identifier of the given type and kind and
    /// assigns it the next running index for that kind.
    pub fn define(&mut self, name: SmolStr, ty: SmolStr, kind: SymbolKind) {
        debug_assert!(kind != SymbolKind::None, "definitions carry a concrete kind");

        let index = self.counts[slot(kind)];
        self.counts[slot(kind)] += 1;

        let entry = Entry { kind, ty, index };
        match kind {
            SymbolKind::Static | SymbolKind::Field => self.class_scope.insert(name, entry),
            _ => self.subroutine_scope.insert(name, entry),
        };
    }

    /// Number of identifiers of the given kind defined in its scope.
    pub fn var_count(&self, kind: SymbolKind) -> u16 {
        match kind {
            SymbolKind::None => 0,
            _ => self.counts[slot(kind)],
        }
    }

    /// Defining kind of the named identifier, or
    /// [`SymbolKind::None`] when the name is not defined.
    pub fn kind_of(&self, name: &str) -> SymbolKind {
        self.lookup(name).map_or(SymbolKind::None, |entry| entry.kind)
    }

    /// Declared type of the named identifier.
    ///
    /// Infallible only after `kind_of` returned something other
    /// than [`SymbolKind::None`].
    pub fn type_of(&self, name: &str) -> Option<&SmolStr> {
        self.lookup(name).map(|entry| &entry.ty)
    }

    /// Running index assigned to the named identifier, or −1 when
    /// the name is not defined.
    pub fn index_of(&self, name: &str) -> i32 {
        self.lookup(name).map_or(-1, |entry| i32::from(entry.index))
    }

    fn lookup(&self, name: &str) -> Option<&Entry> {
        if self.subroutine_active {
            if let Some(entry) = self.subroutine_scope.get(name) {
                return Some(entry);
            }
        }
        self.class_scope.get(name)
    }
}

fn slot(kind: SymbolKind) -> usize {
    match kind {
        SymbolKind::Static => 0,
        SymbolKind::Field => 1,
        SymbolKind::Arg => 2,
        SymbolKind::Var => 3,
        SymbolKind::None => unreachable!("the sentinel kind has no index counter"),
    }
}
