//! Pass 3: assigns a fresh type variable to every typed node and emits the
//! constraints the solver will later resolve. Grounded on
//! `original_source/mamba/sema/constraint_inferer.py`'s `ConstraintInferer`
//! and its nested `_SignatureConstraintInferer`, kept here as two groups of
//! methods on one struct rather than two visitor classes: both need mutable
//! access to the same type arena and error list, and Rust's borrow checker
//! makes juggling that split across two long-lived objects more awkward than
//! it is worth for what the source's own split bought it (the two visitors
//! never actually share mutable state through anything but the arena).

use std::collections::HashMap;

use crate::ast::{Ast, Node, NodeId, ScalarValue};
use crate::semantic::constraint::{Constraint, ConstraintIdAllocator};
use crate::semantic::errors::SemanticError;
use crate::semantic::symbol::{ScopeArena, ScopeId};
use crate::semantic::types::{specialize_with_args, Type, TypeId, TypeRegistry};
use crate::semantic::Annotations;
use crate::source::SourceRange;

pub struct ConstraintInferer<'a> {
    scopes: &'a ScopeArena,
    types: &'a mut TypeRegistry,
    ids: &'a mut ConstraintIdAllocator,
    constraints: Vec<Constraint>,
    scope_stack: Vec<ScopeId>,
    pub errors: Vec<SemanticError>,
}

impl<'a> ConstraintInferer<'a> {
    pub fn new(
        scopes: &'a ScopeArena,
        types: &'a mut TypeRegistry,
        ids: &'a mut ConstraintIdAllocator,
    ) -> Self {
        Self {
            scopes,
            types,
            ids,
            constraints: Vec::new(),
            scope_stack: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn infer(&mut self, ast: &Ast, root: NodeId, annotations: &mut Annotations) -> Vec<Constraint> {
        if let Node::Module { declarations, .. } = ast.get(root) {
            let declarations = declarations.clone();
            for decl in declarations {
                self.visit_declaration(ast, decl, annotations);
            }
        }
        std::mem::take(&mut self.constraints)
    }

    fn current(&self) -> Option<ScopeId> {
        self.scope_stack.last().copied()
    }

    fn resolve_operator(&self, name: &str) -> Option<ScopeId> {
        self.current().and_then(|scope| self.scopes.find_scope_of(scope, name))
    }

    fn push_equals(&mut self, lhs: TypeId, rhs: TypeId, range: SourceRange) {
        let id = self.ids.next_id();
        self.constraints.push(Constraint::Equals { id, lhs, rhs, range });
    }

    fn push_conforms(&mut self, lhs: TypeId, rhs: TypeId, range: SourceRange) {
        let id = self.ids.next_id();
        self.constraints.push(Constraint::Conforms { id, lhs, rhs, range });
    }

    fn specializes(
        &mut self,
        lhs: TypeId,
        rhs: TypeId,
        args: HashMap<String, TypeId>,
        range: SourceRange,
    ) -> Constraint {
        let id = self.ids.next_id();
        Constraint::Specializes { id, lhs, rhs, args, range }
    }

    /// Pushes `choices` as a single constraint: unwrapped if there is exactly
    /// one candidate, wrapped in a `Disjunction` if there is more than one,
    /// dropped silently if there are none (an unresolved scope already
    /// produced an `UnboundName` elsewhere).
    fn emit_candidates(&mut self, mut choices: Vec<Constraint>, range: SourceRange) {
        match choices.len() {
            0 => {}
            1 => self.constraints.push(choices.pop().unwrap()),
            _ => {
                let id = self.ids.next_id();
                self.constraints.push(Constraint::Disjunction { id, choices, range });
            }
        }
    }

    /// `Equals(fresh, fresh)`, the placeholder rule SPEC_FULL.md §4.3 assigns
    /// to node kinds the surviving source never synthesizes bespoke
    /// constraints for.
    fn placeholder_type(&mut self, range: SourceRange) -> TypeId {
        let a = self.types.fresh_variable();
        let b = self.types.fresh_variable();
        self.push_equals(a, b, range);
        a
    }

    // ========== Declarations ==========

    fn visit_declaration(&mut self, ast: &Ast, id: NodeId, annotations: &mut Annotations) {
        match ast.get(id) {
            Node::TypeDeclaration { .. } => self.visit_type_declaration(ast, id, annotations),
            Node::FunctionDeclaration { .. } => self.visit_function_declaration(ast, id, annotations),
            _ => {}
        }
    }

    fn visit_type_declaration(&mut self, ast: &Ast, id: NodeId, annotations: &mut Annotations) {
        let (body, range) = match ast.get(id) {
            Node::TypeDeclaration { body, range, .. } => (*body, *range),
            _ => unreachable!("visit_type_declaration called on a non-TypeDeclaration node"),
        };
        let inner = match annotations.inner_scope.get(&id).copied() {
            Some(scope) => scope,
            // A duplicate declaration already reported by the scope builder
            // never got an inner scope; nothing to infer.
            None => return,
        };
        self.scope_stack.push(inner);
        let outcome = (|| -> Result<(), SemanticError> {
            let body_ty = self.visit_signature(ast, body, annotations)?;
            if let Some(&symbol_id) = annotations.declaration_symbol.get(&id) {
                let symbol_ty = self.scopes.symbol(symbol_id).type_id;
                if let Type::Alias { subject } = self.types.get(symbol_ty) {
                    let subject = *subject;
                    self.push_equals(subject, body_ty, range);
                }
            }
            Ok(())
        })();
        if let Err(e) = outcome {
            self.errors.push(e);
        }
        self.scope_stack.pop();
    }

    fn visit_function_declaration(&mut self, ast: &Ast, id: NodeId, annotations: &mut Annotations) {
        let (placeholders, domain, codomain, body, range) = match ast.get(id) {
            Node::FunctionDeclaration {
                placeholders,
                domain,
                codomain,
                body,
                range,
                ..
            } => (placeholders.clone(), *domain, *codomain, *body, *range),
            _ => unreachable!("visit_function_declaration called on a non-FunctionDeclaration node"),
        };
        let inner = match annotations.inner_scope.get(&id).copied() {
            Some(scope) => scope,
            None => return,
        };
        self.scope_stack.push(inner);
        let outcome = (|| -> Result<(), SemanticError> {
            let domain_ty = self.visit_signature(ast, domain, annotations)?;
            let codomain_ty = self.visit_signature(ast, codomain, annotations)?;
            let fn_ty = self.types.function(domain_ty, codomain_ty, placeholders.clone());

            if let Some(&symbol_id) = annotations.declaration_symbol.get(&id) {
                let symbol_ty = self.scopes.symbol(symbol_id).type_id;
                self.push_equals(symbol_ty, fn_ty, range);
            }
            if let Some(argref_id) = self.scopes.first_local(inner, "$") {
                let argref_ty = self.scopes.symbol(argref_id).type_id;
                self.push_equals(argref_ty, domain_ty, range);
            }

            let body_ty = self.visit_expr(ast, body, annotations);
            self.push_conforms(body_ty, codomain_ty, range);
            Ok(())
        })();
        if let Err(e) = outcome {
            self.errors.push(e);
        }
        self.scope_stack.pop();
    }

    // ========== Signature sub-visitor ==========

    /// Evaluates a type-expression node to a `TypeId`. An `Identifier` here
    /// must resolve to a unique, non-overloaded alias or placeholder symbol;
    /// anything else is a signature error (SPEC_FULL.md §4.3, "Signature
    /// visitor specifics").
    fn visit_signature(
        &mut self,
        ast: &Ast,
        id: NodeId,
        annotations: &mut Annotations,
    ) -> Result<TypeId, SemanticError> {
        match ast.get(id) {
            Node::Nothing { .. } => Ok(self.types.ground("Nothing")),
            Node::UnionType { members, .. } => {
                let members = members.clone();
                let mut member_tys = Vec::with_capacity(members.len());
                for member in members {
                    member_tys.push(self.visit_signature(ast, member, annotations)?);
                }
                Ok(self.types.union(member_tys))
            }
            Node::FunctionType { domain, codomain, .. } => {
                let (domain, codomain) = (*domain, *codomain);
                let domain_ty = self.visit_signature(ast, domain, annotations)?;
                let codomain_ty = self.visit_signature(ast, codomain, annotations)?;
                Ok(self.types.function(domain_ty, codomain_ty, Vec::new()))
            }
            Node::ObjectType { properties, .. } => {
                let properties = properties.clone();
                let mut seen: HashMap<String, SourceRange> = HashMap::new();
                let mut props = Vec::with_capacity(properties.len());
                for prop in properties {
                    let (name, annotation, range) = match ast.get(prop) {
                        Node::ObjectTypeProperty { name, annotation, range } => {
                            (name.clone(), *annotation, *range)
                        }
                        _ => unreachable!("ObjectType property is not an ObjectTypeProperty"),
                    };
                    if seen.contains_key(&name) {
                        return Err(SemanticError::DuplicateDeclaration { name, range });
                    }
                    let ty = self.visit_signature(ast, annotation, annotations)?;
                    seen.insert(name.clone(), range);
                    props.push((name, ty));
                }
                Ok(self.types.object(props))
            }
            Node::Identifier { name, specializers, range } => {
                let (name, specializers, range) = (name.clone(), specializers.clone(), *range);
                let scope = match annotations.resolved_scope.get(&id).copied() {
                    Some(scope) => scope,
                    None => return Err(SemanticError::NotAType { name, range }),
                };
                let candidates = self.scopes.local(scope, &name);
                if candidates.len() != 1 {
                    return Err(SemanticError::Overloaded { name, range });
                }
                let symbol = self.scopes.symbol(candidates[0]);
                let base = match self.types.get(symbol.type_id) {
                    Type::Alias { subject } => *subject,
                    Type::Placeholder(_) => symbol.type_id,
                    _ => return Err(SemanticError::NotAType { name, range }),
                };
                if specializers.is_empty() {
                    return Ok(base);
                }

                let placeholders = self.types.get(base).placeholders().to_vec();
                let mut args = HashMap::new();
                if specializers.len() == 1 && specializers[0].0.is_empty() {
                    if placeholders.len() != 1 {
                        return Err(SemanticError::ExtraneousSpecializer {
                            names: vec!["_0".to_string()],
                            range,
                        });
                    }
                    let ty = self.visit_signature(ast, specializers[0].1, annotations)?;
                    args.insert(placeholders[0].clone(), ty);
                } else {
                    let mut extraneous = Vec::new();
                    for (pname, type_node) in &specializers {
                        if !placeholders.contains(pname) {
                            extraneous.push(pname.clone());
                            continue;
                        }
                        let ty = self.visit_signature(ast, *type_node, annotations)?;
                        args.insert(pname.clone(), ty);
                    }
                    if !extraneous.is_empty() {
                        return Err(SemanticError::ExtraneousSpecializer { names: extraneous, range });
                    }
                }
                Ok(specialize_with_args(self.types, base, &args))
            }
            other => Err(SemanticError::NotAType {
                name: other.kind_name().to_string(),
                range: other.range(),
            }),
        }
    }

    // ========== Expression visitor ==========

    fn visit_expr(&mut self, ast: &Ast, id: NodeId, annotations: &mut Annotations) -> TypeId {
        if let Some(&ty) = annotations.node_type.get(&id) {
            return ty;
        }
        let ty = self.infer_expr(ast, id, annotations);
        annotations.node_type.insert(id, ty);
        ty
    }

    fn infer_expr(&mut self, ast: &Ast, id: NodeId, annotations: &mut Annotations) -> TypeId {
        match ast.get(id) {
            Node::ScalarLiteral { value, .. } => match value {
                ScalarValue::Bool(_) => self.types.ground("Bool"),
                ScalarValue::Int(_) => self.types.ground("Int"),
                ScalarValue::Float(_) => self.types.ground("Float"),
                ScalarValue::Str(_) => self.types.ground("String"),
            },
            Node::ObjectLiteral { properties, .. } => {
                let properties = properties.clone();
                let mut props = Vec::with_capacity(properties.len());
                for prop in properties {
                    let (key, value) = match ast.get(prop) {
                        Node::ObjectLiteralProperty { key, value, .. } => (*key, *value),
                        _ => unreachable!("ObjectLiteral property is not an ObjectLiteralProperty"),
                    };
                    let name = match ast.get(key) {
                        Node::ScalarLiteral {
                            value: ScalarValue::Str(s),
                            ..
                        } => s.clone(),
                        _ => unreachable!("object literal keys are always synthesized string scalars"),
                    };
                    let value_ty = self.visit_expr(ast, value, annotations);
                    props.push((name, value_ty));
                }
                self.types.object(props)
            }
            Node::Identifier { name, range, .. } => {
                let (name, range) = (name.clone(), *range);
                let node_var = self.types.fresh_variable();
                if let Some(scope) = annotations.resolved_scope.get(&id).copied() {
                    let candidates = self.scopes.local(scope, &name).to_vec();
                    let choices: Vec<Constraint> = candidates
                        .iter()
                        .map(|&symbol_id| {
                            let symbol_ty = self.scopes.symbol(symbol_id).type_id;
                            self.specializes(node_var, symbol_ty, HashMap::new(), range)
                        })
                        .collect();
                    self.emit_candidates(choices, range);
                }
                node_var
            }
            Node::ArgRef { .. } => match annotations.argref_symbol.get(&id).copied() {
                Some(symbol_id) => self.scopes.symbol(symbol_id).type_id,
                None => self.types.fresh_variable(),
            },
            Node::CallExpression { callee, argument, range } => {
                let (callee, argument, range) = (*callee, *argument, *range);
                let callee_ty = self.visit_expr(ast, callee, annotations);
                let argument_ty = self.visit_expr(ast, argument, annotations);
                let arg_var = self.types.fresh_variable();
                let ret_var = self.types.fresh_variable();
                let fn_ty = self.types.function(arg_var, ret_var, Vec::new());
                self.push_equals(callee_ty, fn_ty, range);
                self.push_conforms(argument_ty, arg_var, range);
                ret_var
            }
            Node::InfixExpression {
                operator,
                left,
                right,
                range,
            } => {
                let (operator, left, right, range) = (operator.clone(), *left, *right, *range);
                let left_ty = self.visit_expr(ast, left, annotations);
                let right_ty = self.visit_expr(ast, right, annotations);
                if operator == "." {
                    let prop_name = match ast.get(right) {
                        Node::ScalarLiteral {
                            value: ScalarValue::Str(s),
                            ..
                        } => s.clone(),
                        Node::Identifier { name, .. } => name.clone(),
                        _ => String::new(),
                    };
                    let _ = right_ty;
                    let node_var = self.types.fresh_variable();
                    let obj_ty = self.types.object(vec![(prop_name, node_var)]);
                    self.push_conforms(left_ty, obj_ty, range);
                    node_var
                } else {
                    let node_var = self.types.fresh_variable();
                    let domain = self
                        .types
                        .object(vec![("lhs".to_string(), left_ty), ("rhs".to_string(), right_ty)]);
                    let fn_ty = self.types.function(domain, node_var, Vec::new());
                    let op_var = self.types.fresh_variable();
                    match self.resolve_operator(&operator) {
                        Some(scope) => {
                            let candidates = self.scopes.local(scope, &operator).to_vec();
                            let choices: Vec<Constraint> = candidates
                                .iter()
                                .map(|&symbol_id| {
                                    let symbol_ty = self.scopes.symbol(symbol_id).type_id;
                                    self.specializes(op_var, symbol_ty, HashMap::new(), range)
                                })
                                .collect();
                            self.emit_candidates(choices, range);
                        }
                        None => self.errors.push(SemanticError::UnboundName { name: operator, range }),
                    }
                    self.push_equals(op_var, fn_ty, range);
                    node_var
                }
            }
            Node::PrefixExpression { operand, range, .. } | Node::PostfixExpression { operand, range, .. } => {
                let (operand, range) = (*operand, *range);
                self.visit_expr(ast, operand, annotations);
                self.placeholder_type(range)
            }
            Node::IfExpression {
                condition,
                then_branch,
                else_branch,
                range,
            } => {
                let (condition, then_branch, else_branch, range) = (*condition, *then_branch, *else_branch, *range);
                self.visit_expr(ast, condition, annotations);
                self.visit_expr(ast, then_branch, annotations);
                self.visit_expr(ast, else_branch, annotations);
                self.placeholder_type(range)
            }
            Node::MatchExpression { subject, cases, range } => {
                let (subject, cases, range) = (*subject, cases.clone(), *range);
                self.visit_expr(ast, subject, annotations);
                for case in cases {
                    self.visit_case(ast, case, annotations);
                }
                self.placeholder_type(range)
            }
            Node::ClosureExpression {
                domain,
                codomain,
                body,
                range,
            } => {
                let (domain, codomain, body, range) = (*domain, *codomain, *body, *range);
                self.visit_expr(ast, domain, annotations);
                if let Some(codomain) = codomain {
                    self.visit_expr(ast, codomain, annotations);
                }
                self.visit_expr(ast, body, annotations);
                self.placeholder_type(range)
            }
            Node::ListLiteral { items, range } => {
                let (items, range) = (items.clone(), *range);
                for item in items {
                    self.visit_expr(ast, item, annotations);
                }
                self.placeholder_type(range)
            }
            Node::Binding { range, .. } => self.placeholder_type(*range),
            Node::Nothing { .. } => self.types.fresh_variable(),
            // Type-expression and declaration node kinds never reach the
            // expression visitor; present only so the match stays exhaustive.
            Node::Module { range, .. }
            | Node::TypeDeclaration { range, .. }
            | Node::FunctionDeclaration { range, .. }
            | Node::FunctionType { range, .. }
            | Node::ObjectType { range, .. }
            | Node::ObjectTypeProperty { range, .. }
            | Node::UnionType { range, .. }
            | Node::WhenCase { range, .. }
            | Node::ElseCase { range, .. }
            | Node::ObjectLiteralProperty { range, .. } => self.placeholder_type(*range),
        }
    }

    fn visit_case(&mut self, ast: &Ast, id: NodeId, annotations: &mut Annotations) {
        match ast.get(id) {
            Node::WhenCase { pattern, body, .. } => {
                let (pattern, body) = (*pattern, *body);
                self.visit_expr(ast, pattern, annotations);
                self.visit_expr(ast, body, annotations);
            }
            Node::ElseCase { body, .. } => {
                let body = *body;
                self.visit_expr(ast, body, annotations);
            }
            _ => {}
        }
    }
}
