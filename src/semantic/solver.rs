//! Pass 4: the backtracking constraint solver. Grounded on
//! `original_source/mamba/sema/constraint_solver.py`'s `ConstraintSolver`, with
//! its generator-based `solutions()`/disjunction-forking rewritten as an
//! explicit stack of continuation frames (SPEC_FULL.md §9, "Backtracking
//! solver as an explicit stack") since Rust has no stable generators: a
//! `Disjunction` constraint, instead of spawning nested Python generators,
//! clones the remaining work and partial solution once per candidate and
//! pushes each as its own `Frame` onto `stack`, to be drained depth-first by
//! the same loop that processes the first frame.

use std::collections::HashMap;

use crate::semantic::constraint::Constraint;
use crate::semantic::errors::SemanticError;
use crate::semantic::types::{specialize, specialize_with_args, Type, TypeId, TypeRegistry};
use crate::limits::CompilerLimits;
use crate::source::SourceRange;

/// A variable -> concrete-type substitution, the solver's final answer for one
/// branch of the backtracking search. Only variables that were actually bound
/// appear; unconstrained variables (dead code, or genuinely underdetermined
/// generics) are simply absent.
#[derive(Debug, Default, Clone)]
pub struct Solution {
    substitution: HashMap<TypeId, TypeId>,
}

impl Solution {
    pub fn get(&self, var: TypeId) -> Option<TypeId> {
        self.substitution.get(&var).copied()
    }

    pub fn len(&self) -> usize {
        self.substitution.len()
    }

    pub fn is_empty(&self) -> bool {
        self.substitution.is_empty()
    }

    /// Resolves `var` all the way through the substitution and through any
    /// object/function/union structure it points to, matching `deep_walk`'s
    /// output type. Used by callers (the CLI printer, tests) that want a
    /// fully-applied type rather than a single substitution hop.
    pub fn deep_resolve(&self, types: &mut TypeRegistry, var: TypeId) -> TypeId {
        let mut memo = HashMap::new();
        deep_walk(types, &self.substitution, var, &mut memo)
    }
}

struct Frame {
    constraints: Vec<Constraint>,
    solution: HashMap<TypeId, TypeId>,
}

pub struct ConstraintSolver {
    constraints: Vec<Constraint>,
    limits: CompilerLimits,
}

impl ConstraintSolver {
    pub fn new(constraints: Vec<Constraint>, limits: CompilerLimits) -> Self {
        Self { constraints, limits }
    }

    /// Drains the backtracking search to completion, returning one entry per
    /// branch reached: `Ok` for a frame that emptied its constraint queue,
    /// `Err` for one that got stuck, failed unification/specialization, or
    /// ran past a resource limit. A branch that never got forked into (because
    /// `max_disjunction_frames` ran out first) is silently not explored,
    /// mirroring the budget's role as a hard resource ceiling rather than a
    /// coverage guarantee.
    pub fn solve(self, types: &mut TypeRegistry) -> Vec<Result<Solution, SemanticError>> {
        let mut results = Vec::new();
        let mut stack = vec![Frame {
            constraints: self.constraints,
            solution: HashMap::new(),
        }];
        let mut frame_budget = self.limits.max_disjunction_frames;
        while let Some(frame) = stack.pop() {
            run_frame(frame, types, &self.limits, &mut stack, &mut frame_budget, &mut results);
        }
        results
    }
}

fn run_frame(
    frame: Frame,
    types: &mut TypeRegistry,
    limits: &CompilerLimits,
    stack: &mut Vec<Frame>,
    frame_budget: &mut usize,
    results: &mut Vec<Result<Solution, SemanticError>>,
) {
    let Frame { mut constraints, mut solution } = frame;
    let mut stall = 0usize;
    let mut iterations = 0usize;

    // Sorted once per frame, not on every iteration: a constraint that gets
    // deferred is pushed to the *back* of the list (see the `Ok(false)` arms
    // below), so later, not-yet-tried constraints of a higher kind still get
    // their turn instead of the same low-rank constraint being re-picked
    // forever by a fresh sort (SPEC_FULL.md §4.4 step 1, "ordering").
    constraints.sort_by_key(|c| c.kind_rank());

    loop {
        if constraints.is_empty() {
            results.push(Ok(Solution { substitution: solution }));
            return;
        }
        iterations += 1;
        if iterations > limits.max_solver_iterations {
            results.push(Err(SemanticError::Unsolvable {
                range: constraints[0].range(),
            }));
            return;
        }

        let constraint = constraints.remove(0);
        let range = constraint.range();

        match constraint {
            Constraint::Equals { lhs, rhs, .. } => match unify(types, lhs, rhs, &mut solution, range) {
                Ok(()) => stall = 0,
                Err(e) => {
                    results.push(Err(e));
                    return;
                }
            },
            Constraint::Conforms { id, lhs, rhs, range } => {
                match solve_conformity(types, lhs, rhs, &mut solution, range) {
                    Ok(true) => stall = 0,
                    Ok(false) => {
                        stall += 1;
                        if stall > constraints.len() + 1 {
                            results.push(Err(SemanticError::Unsolvable { range }));
                            return;
                        }
                        constraints.push(Constraint::Conforms { id, lhs, rhs, range });
                    }
                    Err(e) => {
                        results.push(Err(e));
                        return;
                    }
                }
            }
            Constraint::Specializes { id, lhs, rhs, args, range } => {
                match solve_specialization(types, lhs, rhs, &args, &mut solution, range) {
                    Ok(true) => stall = 0,
                    Ok(false) => {
                        stall += 1;
                        if stall > constraints.len() + 1 {
                            results.push(Err(SemanticError::Unsolvable { range }));
                            return;
                        }
                        constraints.push(Constraint::Specializes { id, lhs, rhs, args, range });
                    }
                    Err(e) => {
                        results.push(Err(e));
                        return;
                    }
                }
            }
            Constraint::Disjunction { choices, .. } => {
                for choice in choices {
                    if *frame_budget == 0 {
                        break;
                    }
                    *frame_budget -= 1;
                    let mut child = constraints.clone();
                    child.push(choice);
                    stack.push(Frame {
                        constraints: child,
                        solution: solution.clone(),
                    });
                }
                return;
            }
        }
    }
}

/// Substitutes `id` through `solution` until it stops being an unbound
/// variable, without descending into object/function/union structure.
/// Mirrors `constraint_solver.py`'s `walk`.
fn walk(types: &TypeRegistry, solution: &HashMap<TypeId, TypeId>, mut id: TypeId) -> TypeId {
    loop {
        if !matches!(types.get(id), Type::Variable(_)) {
            return id;
        }
        match solution.get(&id) {
            Some(&next) if next != id => id = next,
            _ => return id,
        }
    }
}

/// Fully resolves `id`'s structure through `solution`, recursing into object
/// properties, function domain/codomain, and union members. Memoized on the
/// walked `TypeId` so solutions containing a cycle (a recursive object type
/// bound back to itself through unification) terminate instead of
/// stack-overflowing, mirroring `constraint_solver.py`'s `deep_walk`.
fn deep_walk(
    types: &mut TypeRegistry,
    solution: &HashMap<TypeId, TypeId>,
    id: TypeId,
    memo: &mut HashMap<TypeId, TypeId>,
) -> TypeId {
    let walked = walk(types, solution, id);
    if let Some(&cached) = memo.get(&walked) {
        return cached;
    }
    match types.get(walked).clone() {
        Type::Object { properties, placeholders } => {
            memo.insert(walked, walked);
            let new_properties: Vec<(String, TypeId)> = properties
                .into_iter()
                .map(|(name, prop_ty)| (name, deep_walk(types, solution, prop_ty, memo)))
                .collect();
            let result = types.object_generic(new_properties, placeholders);
            memo.insert(walked, result);
            result
        }
        Type::Function {
            domain,
            codomain,
            placeholders,
        } => {
            memo.insert(walked, walked);
            let domain = deep_walk(types, solution, domain, memo);
            let codomain = deep_walk(types, solution, codomain, memo);
            let result = types.function(domain, codomain, placeholders);
            memo.insert(walked, result);
            result
        }
        Type::Union { members } => {
            memo.insert(walked, walked);
            let members: Vec<TypeId> = members
                .into_iter()
                .map(|m| deep_walk(types, solution, m, memo))
                .collect();
            let result = types.union(members);
            memo.insert(walked, result);
            result
        }
        Type::Alias { subject } => {
            memo.insert(walked, walked);
            let subject = deep_walk(types, solution, subject, memo);
            let result = types.alias(subject);
            memo.insert(walked, result);
            result
        }
        Type::Ground { .. } | Type::Variable(_) | Type::Placeholder(_) => walked,
    }
}

/// Symmetric structural unification. Binds a bare variable to whatever the
/// other side walks to; otherwise requires both sides to be the same
/// composite shape with unifiable parts, and for object types, an identical
/// set of property names (SPEC_FULL.md §4.4 — the asymmetric case lives in
/// `solve_conformity`, not here).
fn unify(
    types: &mut TypeRegistry,
    a: TypeId,
    b: TypeId,
    solution: &mut HashMap<TypeId, TypeId>,
    range: SourceRange,
) -> Result<(), SemanticError> {
    let a = walk(types, solution, a);
    let b = walk(types, solution, b);
    if a == b {
        return Ok(());
    }
    if matches!(types.get(a), Type::Variable(_)) {
        solution.insert(a, b);
        return Ok(());
    }
    if matches!(types.get(b), Type::Variable(_)) {
        solution.insert(b, a);
        return Ok(());
    }
    match (types.get(a).clone(), types.get(b).clone()) {
        (
            Type::Function {
                domain: ad,
                codomain: ac,
                ..
            },
            Type::Function {
                domain: bd,
                codomain: bc,
                ..
            },
        ) => {
            unify(types, ad, bd, solution, range)?;
            unify(types, ac, bc, solution, range)
        }
        (Type::Object { properties: ap, .. }, Type::Object { properties: bp, .. }) => {
            let a_names: std::collections::BTreeSet<&str> =
                ap.iter().map(|(name, _)| name.as_str()).collect();
            let b_names: std::collections::BTreeSet<&str> =
                bp.iter().map(|(name, _)| name.as_str()).collect();
            if a_names != b_names {
                return Err(SemanticError::UnificationError {
                    lhs: types.describe(a),
                    rhs: types.describe(b),
                    reason: "object types have different properties".to_string(),
                    range,
                });
            }
            let b_by_name: HashMap<&str, TypeId> =
                bp.iter().map(|(name, ty)| (name.as_str(), *ty)).collect();
            for (name, a_ty) in &ap {
                let b_ty = b_by_name[name.as_str()];
                unify(types, *a_ty, b_ty, solution, range)?;
            }
            Ok(())
        }
        (Type::Union { members: a_members }, Type::Union { members: b_members })
            if a_members.len() == b_members.len() =>
        {
            for (a_member, b_member) in a_members.iter().zip(b_members.iter()) {
                unify(types, *a_member, *b_member, solution, range)?;
            }
            Ok(())
        }
        _ => Err(SemanticError::UnificationError {
            lhs: types.describe(a),
            rhs: types.describe(b),
            reason: "cannot unify".to_string(),
            range,
        }),
    }
}

/// Asymmetric structural conformance: `actual` conforms to `ideal` when every
/// property `ideal` names is present on `actual` with a conforming type,
/// regardless of whatever else `actual` carries. Anything that is not an
/// `Object` on the `ideal` side (or either side still an unresolved variable)
/// falls back to plain unification (SPEC_FULL.md §4.4) — a deliberate
/// departure from the retrieved source's `solve_conformity`, which is a
/// documented `FIXME` that just calls `unify` unconditionally.
/// Resolves a `Conforms(actual, ideal)` constraint. Returns `Ok(false)` to
/// ask the caller to requeue the constraint when the ideal (right) side is
/// still an unresolved variable (SPEC_FULL.md §4.4 step 4, "If the right side
/// is still a variable, defer"): conformance is directional, so forcing
/// equality here — as the left-is-a-variable case does — would wrongly pin
/// the ideal to the actual's exact shape instead of waiting for the ideal's
/// real constraint to land.
fn solve_conformity(
    types: &mut TypeRegistry,
    actual: TypeId,
    ideal: TypeId,
    solution: &mut HashMap<TypeId, TypeId>,
    range: SourceRange,
) -> Result<bool, SemanticError> {
    let actual_w = walk(types, solution, actual);
    let ideal_w = walk(types, solution, ideal);

    if matches!(types.get(ideal_w), Type::Variable(_)) {
        return Ok(false);
    }

    // `Object` (no demanded properties) is the conformance top: every actual
    // type conforms to it, including one that is still an unresolved
    // variable (SPEC_FULL.md §3/§4.4) — checked ahead of the
    // actual-is-a-variable case below so an unbound actual (e.g. a call's
    // still-unconstrained return variable) is left alone rather than pinned
    // to the bare `Object` type before its real constraint gets a chance to
    // run.
    if matches!(types.get(ideal_w), Type::Object { ref properties, .. } if properties.is_empty()) {
        return Ok(true);
    }

    if matches!(types.get(actual_w), Type::Variable(_)) {
        return unify(types, actual_w, ideal_w, solution, range).map(|()| true);
    }

    if let Type::Object { properties: ideal_props, .. } = types.get(ideal_w).clone() {
        let actual_props = match types.get(actual_w).clone() {
            Type::Object { properties, .. } => properties,
            _ => {
                return Err(SemanticError::UnificationError {
                    lhs: types.describe(actual_w),
                    rhs: types.describe(ideal_w),
                    reason: "expected an object type".to_string(),
                    range,
                })
            }
        };
        let actual_by_name: HashMap<String, TypeId> = actual_props.into_iter().collect();
        for (name, ideal_ty) in ideal_props {
            match actual_by_name.get(&name) {
                Some(&actual_ty) => {
                    if !solve_conformity(types, actual_ty, ideal_ty, solution, range)? {
                        // A nested property's ideal side is itself still a
                        // variable; defer the whole constraint rather than
                        // partially resolving it.
                        return Ok(false);
                    }
                }
                None => {
                    return Err(SemanticError::UnificationError {
                        lhs: types.describe(actual_w),
                        rhs: types.describe(ideal_w),
                        reason: format!("missing property '{}'", name),
                        range,
                    })
                }
            }
        }
        return Ok(true);
    }

    unify(types, actual_w, ideal_w, solution, range).map(|()| true)
}

/// Resolves a `Specializes(lhs, rhs, args)` constraint: `lhs` becomes `rhs`
/// with `rhs`'s placeholders substituted (seeded by `args`, then inferred
/// structurally from whatever shape `lhs` already has). Returns `Ok(false)`
/// to ask the caller to requeue the constraint when `rhs` is still an
/// unresolved variable — mirrors `constraint_solver.py`'s
/// `solve_specialization` "defer if rhs variable" rule, since a variable has
/// no placeholders to inspect yet.
fn solve_specialization(
    types: &mut TypeRegistry,
    lhs: TypeId,
    rhs: TypeId,
    args: &HashMap<String, TypeId>,
    solution: &mut HashMap<TypeId, TypeId>,
    range: SourceRange,
) -> Result<bool, SemanticError> {
    let rhs_w = walk(types, solution, rhs);
    if matches!(types.get(rhs_w), Type::Variable(_)) {
        return Ok(false);
    }

    let placeholders = types.get(rhs_w).placeholders().to_vec();
    if placeholders.is_empty() {
        if !args.is_empty() {
            return Err(SemanticError::ExtraneousSpecializer {
                names: args.keys().cloned().collect(),
                range,
            });
        }
        unify(types, lhs, rhs_w, solution, range)?;
        return Ok(true);
    }

    let extraneous: Vec<String> = args.keys().filter(|k| !placeholders.contains(k)).cloned().collect();
    if !extraneous.is_empty() {
        return Err(SemanticError::ExtraneousSpecializer { names: extraneous, range });
    }

    let seeded = specialize_with_args(types, rhs_w, args);
    let lhs_w = walk(types, solution, lhs);
    let mut memo = HashMap::new();
    match specialize(types, seeded, lhs_w, &mut memo) {
        Ok(result) => {
            unify(types, lhs, result, solution, range)?;
            Ok(true)
        }
        Err(_) => Err(SemanticError::SpecializationError { range }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::constraint::ConstraintIdAllocator;
    use crate::source::SourceLocation;

    fn range() -> SourceRange {
        SourceRange::point(SourceLocation::START)
    }

    #[test]
    fn equals_binds_a_bare_variable() {
        let mut types = TypeRegistry::new();
        let mut ids = ConstraintIdAllocator::new();
        let var = types.fresh_variable();
        let int_ty = types.ground("Int");
        let constraints = vec![Constraint::Equals {
            id: ids.next_id(),
            lhs: var,
            rhs: int_ty,
            range: range(),
        }];
        let solver = ConstraintSolver::new(constraints, CompilerLimits::default());
        let solutions = solver.solve(&mut types);
        assert_eq!(solutions.len(), 1);
        let solution = solutions[0].as_ref().unwrap();
        assert_eq!(solution.get(var), Some(int_ty));
    }

    #[test]
    fn unify_rejects_object_types_with_different_properties() {
        let mut types = TypeRegistry::new();
        let mut ids = ConstraintIdAllocator::new();
        let int_ty = types.ground("Int");
        let a = types.object(vec![("x".to_string(), int_ty)]);
        let b = types.object(vec![("y".to_string(), int_ty)]);
        let constraints = vec![Constraint::Equals {
            id: ids.next_id(),
            lhs: a,
            rhs: b,
            range: range(),
        }];
        let solver = ConstraintSolver::new(constraints, CompilerLimits::default());
        let solutions = solver.solve(&mut types);
        assert_eq!(solutions.len(), 1);
        assert!(solutions[0].is_err());
    }

    #[test]
    fn conforms_allows_extra_actual_properties() {
        let mut types = TypeRegistry::new();
        let mut ids = ConstraintIdAllocator::new();
        let int_ty = types.ground("Int");
        let string_ty = types.ground("String");
        let actual = types.object(vec![
            ("x".to_string(), int_ty),
            ("extra".to_string(), string_ty),
        ]);
        let ideal = types.object(vec![("x".to_string(), int_ty)]);
        let constraints = vec![Constraint::Conforms {
            id: ids.next_id(),
            lhs: actual,
            rhs: ideal,
            range: range(),
        }];
        let solver = ConstraintSolver::new(constraints, CompilerLimits::default());
        let solutions = solver.solve(&mut types);
        assert_eq!(solutions.len(), 1);
        assert!(solutions[0].is_ok());
    }

    #[test]
    fn conforms_rejects_missing_ideal_property() {
        let mut types = TypeRegistry::new();
        let mut ids = ConstraintIdAllocator::new();
        let int_ty = types.ground("Int");
        let actual = types.object(vec![]);
        let ideal = types.object(vec![("x".to_string(), int_ty)]);
        let constraints = vec![Constraint::Conforms {
            id: ids.next_id(),
            lhs: actual,
            rhs: ideal,
            range: range(),
        }];
        let solver = ConstraintSolver::new(constraints, CompilerLimits::default());
        let solutions = solver.solve(&mut types);
        assert_eq!(solutions.len(), 1);
        assert!(solutions[0].is_err());
    }

    #[test]
    fn empty_object_ideal_absorbs_a_non_object_actual() {
        // `Object` (no properties) is the conformance top: a bare ground type
        // like `Nothing` must still conform to it, not just object-shaped
        // actuals (SPEC_FULL.md §3, "Object types with no properties absorb
        // anything").
        let mut types = TypeRegistry::new();
        let mut ids = ConstraintIdAllocator::new();
        let nothing_ty = types.ground("Nothing");
        let object_ty = types.object(vec![]);
        let constraints = vec![Constraint::Conforms {
            id: ids.next_id(),
            lhs: nothing_ty,
            rhs: object_ty,
            range: range(),
        }];
        let solver = ConstraintSolver::new(constraints, CompilerLimits::default());
        let solutions = solver.solve(&mut types);
        assert_eq!(solutions.len(), 1);
        assert!(solutions[0].is_ok());
    }

    #[test]
    fn empty_object_ideal_leaves_an_unresolved_actual_variable_unbound() {
        // A call's return variable conforming to an empty `Object` codomain
        // (e.g. `print`'s call site inside a function declared `-> Object`)
        // must not be pinned to the bare `Object` type here: a later
        // Equals/Specializes constraint still needs to bind it to whatever
        // the callee's real return type turns out to be.
        let mut types = TypeRegistry::new();
        let mut ids = ConstraintIdAllocator::new();
        let actual_var = types.fresh_variable();
        let nothing_ty = types.ground("Nothing");
        let object_ty = types.object(vec![]);
        // A `Specializes` constraint (rank 2) is what actually binds
        // `actual_var` in the real call-site scenario this mirrors; it sorts
        // after the `Conforms` (rank 1) regardless of emission order, so this
        // only passes if conformance leaves the variable alone instead of
        // eagerly pinning it to `object_ty`.
        let constraints = vec![
            Constraint::Conforms {
                id: ids.next_id(),
                lhs: actual_var,
                rhs: object_ty,
                range: range(),
            },
            Constraint::Specializes {
                id: ids.next_id(),
                lhs: actual_var,
                rhs: nothing_ty,
                args: HashMap::new(),
                range: range(),
            },
        ];
        let solver = ConstraintSolver::new(constraints, CompilerLimits::default());
        let solutions = solver.solve(&mut types);
        assert_eq!(solutions.len(), 1);
        let solution = solutions[0].as_ref().unwrap();
        assert_eq!(solution.get(actual_var), Some(nothing_ty));
    }

    #[test]
    fn disjunction_prunes_the_incompatible_branch() {
        // Mirrors `1 + 2`: op_var is pinned by Equals to {lhs:Int,rhs:Int}->node,
        // then a Disjunction offers the Int/Int and Float/Float overloads of `+`.
        let mut types = TypeRegistry::new();
        let mut ids = ConstraintIdAllocator::new();

        let int_ty = types.ground("Int");
        let float_ty = types.ground("Float");
        let int_pair = types.object(vec![("lhs".to_string(), int_ty), ("rhs".to_string(), int_ty)]);
        let float_pair = types.object(vec![
            ("lhs".to_string(), float_ty),
            ("rhs".to_string(), float_ty),
        ]);
        let plus_int = types.function(int_pair, int_ty, Vec::new());
        let plus_float = types.function(float_pair, float_ty, Vec::new());

        let node_var = types.fresh_variable();
        let op_var = types.fresh_variable();
        let actual_domain = types.object(vec![("lhs".to_string(), int_ty), ("rhs".to_string(), int_ty)]);
        let actual_fn = types.function(actual_domain, node_var, Vec::new());

        let choices = vec![
            Constraint::Specializes {
                id: ids.next_id(),
                lhs: op_var,
                rhs: plus_int,
                args: HashMap::new(),
                range: range(),
            },
            Constraint::Specializes {
                id: ids.next_id(),
                lhs: op_var,
                rhs: plus_float,
                args: HashMap::new(),
                range: range(),
            },
        ];
        let constraints = vec![
            Constraint::Equals {
                id: ids.next_id(),
                lhs: op_var,
                rhs: actual_fn,
                range: range(),
            },
            Constraint::Disjunction {
                id: ids.next_id(),
                choices,
                range: range(),
            },
        ];

        let solver = ConstraintSolver::new(constraints, CompilerLimits::default());
        let solutions = solver.solve(&mut types);
        assert_eq!(solutions.len(), 2);
        let ok_count = solutions.iter().filter(|s| s.is_ok()).count();
        let err_count = solutions.iter().filter(|s| s.is_err()).count();
        assert_eq!(ok_count, 1);
        assert_eq!(err_count, 1);
    }

    #[test]
    fn specialization_defers_until_rhs_is_resolved() {
        let mut types = TypeRegistry::new();
        let mut ids = ConstraintIdAllocator::new();
        let element_ph = types.fresh_placeholder("Element");
        let list_ty = types.ground_generic("List", vec!["Element".to_string()]);
        let list_var = types.fresh_variable();
        let int_ty = types.ground("Int");

        let constraints = vec![
            Constraint::Specializes {
                id: ids.next_id(),
                lhs: types.fresh_variable(),
                rhs: list_var,
                args: HashMap::new(),
                range: range(),
            },
            Constraint::Equals {
                id: ids.next_id(),
                lhs: list_var,
                rhs: list_ty,
                range: range(),
            },
        ];
        let mut args = HashMap::new();
        args.insert("Element".to_string(), int_ty);
        let _ = element_ph;
        let solver = ConstraintSolver::new(constraints, CompilerLimits::default());
        let solutions = solver.solve(&mut types);
        assert_eq!(solutions.len(), 1);
        assert!(solutions[0].is_ok());
    }
}
