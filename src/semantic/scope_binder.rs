//! Pass 2: resolves every `Identifier` to the scope that declares its name
//! (not to a specific symbol — overload resolution happens later, in the
//! inferer/solver) and every `ArgRef` to the nearest enclosing `$` symbol.
//! Grounded on `original_source/mamba/sema/scope_binder.py`, whose visitor
//! walks the whole tree regardless of node kind, entering a new scope only at
//! the nodes the scope builder already annotated.

use crate::ast::{Ast, Node, NodeId};
use crate::semantic::errors::SemanticError;
use crate::semantic::symbol::{ScopeArena, ScopeId};
use crate::semantic::Annotations;

pub struct ScopeBinder<'a> {
    scopes: &'a ScopeArena,
    stack: Vec<ScopeId>,
    pub errors: Vec<SemanticError>,
}

impl<'a> ScopeBinder<'a> {
    pub fn new(scopes: &'a ScopeArena) -> Self {
        Self {
            scopes,
            stack: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn bind(&mut self, ast: &Ast, root: NodeId, annotations: &mut Annotations) {
        self.visit(ast, root, annotations);
    }

    fn current(&self) -> Option<ScopeId> {
        self.stack.last().copied()
    }

    fn visit(&mut self, ast: &Ast, id: NodeId, annotations: &mut Annotations) {
        if let Some(&scope) = annotations.inner_scope.get(&id) {
            self.stack.push(scope);
            self.visit_children(ast, id, annotations);
            self.stack.pop();
            return;
        }

        match ast.get(id) {
            Node::Identifier { name, specializers, range } => {
                match self.current() {
                    Some(scope) => match self.scopes.find_scope_of(scope, name) {
                        Some(resolved) => {
                            annotations.resolved_scope.insert(id, resolved);
                        }
                        None => self.errors.push(SemanticError::UnboundName {
                            name: name.clone(),
                            range: *range,
                        }),
                    },
                    None => self.errors.push(SemanticError::UnboundName {
                        name: name.clone(),
                        range: *range,
                    }),
                }
                for (_, child) in specializers {
                    self.visit(ast, *child, annotations);
                }
            }
            Node::ArgRef { range } => match self.current() {
                Some(scope) => match self.scopes.find_scope_of(scope, "$") {
                    Some(found) => {
                        if let Some(symbol_id) = self.scopes.local(found, "$").first().copied() {
                            annotations.argref_symbol.insert(id, symbol_id);
                        }
                    }
                    None => self.errors.push(SemanticError::UnboundName {
                        name: "$".to_string(),
                        range: *range,
                    }),
                },
                None => self.errors.push(SemanticError::UnboundName {
                    name: "$".to_string(),
                    range: *range,
                }),
            },
            _ => self.visit_children(ast, id, annotations),
        }
    }

    fn visit_children(&mut self, ast: &Ast, id: NodeId, annotations: &mut Annotations) {
        match ast.get(id) {
            Node::Module { declarations, .. } => {
                for &decl in declarations {
                    self.visit(ast, decl, annotations);
                }
            }
            Node::TypeDeclaration { body, .. } => self.visit(ast, *body, annotations),
            Node::FunctionDeclaration {
                domain,
                codomain,
                body,
                ..
            } => {
                self.visit(ast, *domain, annotations);
                self.visit(ast, *codomain, annotations);
                self.visit(ast, *body, annotations);
            }
            Node::FunctionType { domain, codomain, .. } => {
                self.visit(ast, *domain, annotations);
                self.visit(ast, *codomain, annotations);
            }
            Node::ObjectType { properties, .. } => {
                for &prop in properties {
                    self.visit(ast, prop, annotations);
                }
            }
            Node::ObjectTypeProperty { annotation, .. } => self.visit(ast, *annotation, annotations),
            Node::UnionType { members, .. } => {
                for &member in members {
                    self.visit(ast, member, annotations);
                }
            }
            Node::ClosureExpression {
                domain,
                codomain,
                body,
                ..
            } => {
                self.visit(ast, *domain, annotations);
                if let Some(codomain) = codomain {
                    self.visit(ast, *codomain, annotations);
                }
                self.visit(ast, *body, annotations);
            }
            Node::CallExpression { callee, argument, .. } => {
                self.visit(ast, *callee, annotations);
                self.visit(ast, *argument, annotations);
            }
            Node::InfixExpression { left, right, .. } => {
                self.visit(ast, *left, annotations);
                self.visit(ast, *right, annotations);
            }
            Node::PrefixExpression { operand, .. } | Node::PostfixExpression { operand, .. } => {
                self.visit(ast, *operand, annotations);
            }
            Node::IfExpression {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.visit(ast, *condition, annotations);
                self.visit(ast, *then_branch, annotations);
                self.visit(ast, *else_branch, annotations);
            }
            Node::MatchExpression { subject, cases, .. } => {
                self.visit(ast, *subject, annotations);
                for &case in cases {
                    self.visit(ast, case, annotations);
                }
            }
            Node::WhenCase { pattern, body, .. } => {
                self.visit(ast, *pattern, annotations);
                self.visit(ast, *body, annotations);
            }
            Node::ElseCase { body, .. } => self.visit(ast, *body, annotations),
            Node::Binding { annotation, .. } => {
                if let Some(annotation) = annotation {
                    self.visit(ast, *annotation, annotations);
                }
            }
            Node::ObjectLiteral { properties, .. } => {
                for &prop in properties {
                    self.visit(ast, prop, annotations);
                }
            }
            Node::ObjectLiteralProperty { key, value, .. } => {
                self.visit(ast, *key, annotations);
                self.visit(ast, *value, annotations);
            }
            Node::ListLiteral { items, .. } => {
                for &item in items {
                    self.visit(ast, item, annotations);
                }
            }
            Node::Identifier { .. } | Node::ArgRef { .. } => {
                unreachable!("handled directly in visit")
            }
            Node::ScalarLiteral { .. } | Node::Nothing { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Ast, Node};
    use crate::limits::CompilerLimits;
    use crate::semantic::scope_builder::ScopeBuilder;
    use crate::semantic::symbol::build_builtin_scope;
    use crate::semantic::types::TypeRegistry;
    use crate::source::{SourceLocation, SourceRange};

    fn dummy_range() -> SourceRange {
        SourceRange::point(SourceLocation::START)
    }

    fn push(ast: &mut Ast, limits: &CompilerLimits, node: Node) -> NodeId {
        ast.add_node(node, limits).unwrap()
    }

    #[test]
    fn identifier_resolves_to_builtin_scope() {
        let limits = CompilerLimits::default();
        let mut ast = Ast::new();
        let ident = push(
            &mut ast,
            &limits,
            Node::Identifier {
                name: "Int".to_string(),
                specializers: Vec::new(),
                range: dummy_range(),
            },
        );
        let func = push(
            &mut ast,
            &limits,
            Node::FunctionDeclaration {
                name: "f".to_string(),
                placeholders: Vec::new(),
                domain: ident,
                codomain: ident,
                body: ident,
                range: dummy_range(),
            },
        );
        let module = push(
            &mut ast,
            &limits,
            Node::Module {
                declarations: vec![func],
                range: dummy_range(),
            },
        );
        ast.root = Some(module);

        let mut types = TypeRegistry::new();
        let mut scopes = ScopeArena::new();
        let builtin = build_builtin_scope(&mut types, &mut scopes);
        let mut annotations = Annotations::default();
        ScopeBuilder::new(&mut scopes, &mut types, builtin).build(&ast, module, &mut annotations);

        let mut binder = ScopeBinder::new(&scopes);
        binder.bind(&ast, module, &mut annotations);

        assert!(binder.errors.is_empty());
        assert_eq!(annotations.resolved_scope.get(&ident), Some(&builtin));
    }

    #[test]
    fn unbound_identifier_is_reported() {
        let limits = CompilerLimits::default();
        let mut ast = Ast::new();
        let ident = push(
            &mut ast,
            &limits,
            Node::Identifier {
                name: "Nope".to_string(),
                specializers: Vec::new(),
                range: dummy_range(),
            },
        );
        let nothing = push(&mut ast, &limits, Node::Nothing { range: dummy_range() });
        let func = push(
            &mut ast,
            &limits,
            Node::FunctionDeclaration {
                name: "f".to_string(),
                placeholders: Vec::new(),
                domain: nothing,
                codomain: nothing,
                body: ident,
                range: dummy_range(),
            },
        );
        let module = push(
            &mut ast,
            &limits,
            Node::Module {
                declarations: vec![func],
                range: dummy_range(),
            },
        );
        ast.root = Some(module);

        let mut types = TypeRegistry::new();
        let mut scopes = ScopeArena::new();
        let builtin = build_builtin_scope(&mut types, &mut scopes);
        let mut annotations = Annotations::default();
        ScopeBuilder::new(&mut scopes, &mut types, builtin).build(&ast, module, &mut annotations);

        let mut binder = ScopeBinder::new(&scopes);
        binder.bind(&ast, module, &mut annotations);

        assert_eq!(binder.errors.len(), 1);
        assert!(matches!(binder.errors[0], SemanticError::UnboundName { .. }));
    }

    #[test]
    fn argref_resolves_to_function_dollar_symbol() {
        let limits = CompilerLimits::default();
        let mut ast = Ast::new();
        let nothing = push(&mut ast, &limits, Node::Nothing { range: dummy_range() });
        let argref = push(&mut ast, &limits, Node::ArgRef { range: dummy_range() });
        let func = push(
            &mut ast,
            &limits,
            Node::FunctionDeclaration {
                name: "f".to_string(),
                placeholders: Vec::new(),
                domain: nothing,
                codomain: nothing,
                body: argref,
                range: dummy_range(),
            },
        );
        let module = push(
            &mut ast,
            &limits,
            Node::Module {
                declarations: vec![func],
                range: dummy_range(),
            },
        );
        ast.root = Some(module);

        let mut types = TypeRegistry::new();
        let mut scopes = ScopeArena::new();
        let builtin = build_builtin_scope(&mut types, &mut scopes);
        let mut annotations = Annotations::default();
        ScopeBuilder::new(&mut scopes, &mut types, builtin).build(&ast, module, &mut annotations);

        let mut binder = ScopeBinder::new(&scopes);
        binder.bind(&ast, module, &mut annotations);

        assert!(binder.errors.is_empty());
        assert!(annotations.argref_symbol.contains_key(&argref));
    }
}
