//! The semantic pipeline: four leaves-first passes sharing one `Annotations`
//! table, orchestrated by `analyze`. Grounded on `original_source/mamba/main.py`'s
//! `passes = [ScopeBuilder(), ScopeBinder(), constraint_inferer]` driver loop,
//! adapted to Rust's ownership model (the passes borrow the scope/type arenas
//! mutably in sequence rather than sharing one mutable visitor object) and
//! extended with the solver as an explicit fourth stage.

pub mod constraint;
pub mod errors;
pub mod inferer;
pub mod scope_binder;
pub mod scope_builder;
pub mod solver;
pub mod symbol;
pub mod types;

use std::collections::HashMap;

use crate::ast::{Ast, NodeId};
use crate::limits::CompilerLimits;
use crate::semantic::constraint::{Constraint, ConstraintIdAllocator};
use crate::semantic::errors::SemanticError;
use crate::semantic::inferer::ConstraintInferer;
use crate::semantic::scope_binder::ScopeBinder;
use crate::semantic::scope_builder::ScopeBuilder;
use crate::semantic::solver::{ConstraintSolver, Solution};
use crate::semantic::symbol::{build_builtin_scope, ScopeArena, ScopeId, SymbolId};
use crate::semantic::types::{TypeId, TypeRegistry};

/// Per-node facts accumulated across the four passes. Each field is written by
/// exactly one pass and only ever read afterwards (SPEC_FULL.md §5, "Mutation
/// discipline").
#[derive(Debug, Default)]
pub struct Annotations {
    /// Module/FunctionDeclaration/TypeDeclaration -> the scope they introduce.
    pub inner_scope: HashMap<NodeId, ScopeId>,
    /// FunctionDeclaration/TypeDeclaration -> the symbol declared for them.
    pub declaration_symbol: HashMap<NodeId, SymbolId>,
    /// Identifier -> the scope its name resolved into (not a specific symbol).
    pub resolved_scope: HashMap<NodeId, ScopeId>,
    /// ArgRef -> the enclosing function's `$` symbol.
    pub argref_symbol: HashMap<NodeId, SymbolId>,
    /// Every typed node -> its fresh (or otherwise assigned) type variable.
    pub node_type: HashMap<NodeId, TypeId>,
}

/// Output of the whole pipeline: every error collected across the four passes,
/// plus the sequence of solutions the solver produced (one entry per branch
/// the backtracking search reached; a branch that failed unification or
/// specialization is an `Err`, not simply absent).
pub struct AnalysisResult {
    pub annotations: Annotations,
    pub errors: Vec<SemanticError>,
    pub solutions: Vec<Result<Solution, SemanticError>>,
}

/// Runs scope building, scope binding, constraint inference and constraint
/// solving over `root`, in that order, combining every pass's error list.
/// Mirrors `main.py`'s `passes` loop followed by its standalone
/// `ConstraintSolver` construction. Returns the scope/type arenas alongside
/// the result since the annotations only make sense read back against them
/// (e.g. a CLI printer resolving `node_type` through `types.describe`).
pub fn analyze(
    ast: &Ast,
    root: NodeId,
    limits: &CompilerLimits,
) -> (ScopeArena, TypeRegistry, AnalysisResult) {
    let mut types = TypeRegistry::new();
    let mut scopes = ScopeArena::new();
    let builtin = build_builtin_scope(&mut types, &mut scopes);

    let mut annotations = Annotations::default();
    let mut errors = Vec::new();

    let mut builder = ScopeBuilder::new(&mut scopes, &mut types, builtin);
    builder.build(ast, root, &mut annotations);
    errors.extend(builder.errors);

    let mut binder = ScopeBinder::new(&scopes);
    binder.bind(ast, root, &mut annotations);
    errors.extend(binder.errors);

    let mut ids = ConstraintIdAllocator::new();
    let mut inferer = ConstraintInferer::new(&scopes, &mut types, &mut ids);
    let constraints = inferer.infer(ast, root, &mut annotations);
    errors.extend(inferer.errors);

    let solver = ConstraintSolver::new(constraints, limits.clone());
    let solutions = solver.solve(&mut types);

    (
        scopes,
        types,
        AnalysisResult {
            annotations,
            errors,
            solutions,
        },
    )
}
