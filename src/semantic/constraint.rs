//! Typing constraints emitted by the constraint inferer and consumed by the
//! solver. Mirrors `mamba.sema.constraint.Constraint`'s four kinds, but
//! replaces the source's `id()`-based stuck-detection hash (which relies on
//! Python object identity) with a monotonic `id: u64` assigned at emission
//! time (SPEC_FULL.md §9, Design Note "Stuck detection without pointer
//! identity").

use std::collections::HashMap;

use crate::semantic::types::TypeId;
use crate::source::SourceRange;

#[derive(Debug, Clone)]
pub enum Constraint {
    Equals {
        id: u64,
        lhs: TypeId,
        rhs: TypeId,
        range: SourceRange,
    },
    Conforms {
        id: u64,
        lhs: TypeId,
        rhs: TypeId,
        range: SourceRange,
    },
    Specializes {
        id: u64,
        lhs: TypeId,
        rhs: TypeId,
        args: HashMap<String, TypeId>,
        range: SourceRange,
    },
    Disjunction {
        id: u64,
        choices: Vec<Constraint>,
        range: SourceRange,
    },
}

impl Constraint {
    pub fn id(&self) -> u64 {
        match self {
            Constraint::Equals { id, .. }
            | Constraint::Conforms { id, .. }
            | Constraint::Specializes { id, .. }
            | Constraint::Disjunction { id, .. } => *id,
        }
    }

    pub fn range(&self) -> SourceRange {
        match self {
            Constraint::Equals { range, .. }
            | Constraint::Conforms { range, .. }
            | Constraint::Specializes { range, .. }
            | Constraint::Disjunction { range, .. } => *range,
        }
    }

    /// Ordering rank used to keep the solver's work list sorted equality
    /// first, then conformance, then specialization, then disjunction, so
    /// cheap deterministic constraints collapse variables before ambiguous
    /// ones are processed.
    pub fn kind_rank(&self) -> u8 {
        match self {
            Constraint::Equals { .. } => 0,
            Constraint::Conforms { .. } => 1,
            Constraint::Specializes { .. } => 2,
            Constraint::Disjunction { .. } => 3,
        }
    }
}

/// Allocates the monotonic constraint ids described above. One instance is
/// shared across the whole inference pass.
#[derive(Debug, Default)]
pub struct ConstraintIdAllocator {
    next: u64,
}

impl ConstraintIdAllocator {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SourceLocation, SourceRange};

    fn range() -> SourceRange {
        SourceRange::point(SourceLocation::START)
    }

    #[test]
    fn kind_rank_orders_equals_before_disjunction() {
        let mut types = crate::semantic::types::TypeRegistry::new();
        let ty = types.ground("Int");
        let equals = Constraint::Equals {
            id: 0,
            lhs: ty,
            rhs: ty,
            range: range(),
        };
        let disjunction = Constraint::Disjunction {
            id: 1,
            choices: Vec::new(),
            range: range(),
        };
        assert!(equals.kind_rank() < disjunction.kind_rank());
    }

    #[test]
    fn allocator_issues_monotonically_increasing_ids() {
        let mut alloc = ConstraintIdAllocator::new();
        let a = alloc.next_id();
        let b = alloc.next_id();
        assert!(b > a);
    }
}
