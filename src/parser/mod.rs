// Recursive-descent, precedence-climbing parser for Mamba.
mod error;

pub use error::ParseError;

use crate::ast::{Ast, Node, NodeId, ScalarValue};
use crate::lexer::{Token, TokenKind};
use crate::limits::CompilerLimits;
use crate::source::{SourceLocation, SourceRange};

/// Infix operator precedence/associativity, keyed by spelling. `.` sits at
/// the top of the table so property access binds tighter than arithmetic.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Assoc {
    Left,
    Right,
}

fn infix_info(op: &str) -> Option<(u8, Assoc)> {
    Some(match op {
        "||" => (10, Assoc::Left),
        "&&" => (20, Assoc::Left),
        "^" => (30, Assoc::Left),
        "==" | "!=" => (40, Assoc::Left),
        "<" | "<=" | ">" | ">=" => (50, Assoc::Left),
        "+" | "-" => (60, Assoc::Left),
        "*" | "/" | "%" => (70, Assoc::Left),
        "**" => (80, Assoc::Right),
        "." => (90, Assoc::Left),
        _ => return None,
    })
}

fn is_prefix_operator(op: &str) -> bool {
    op == "+" || op == "-"
}

fn is_postfix_operator(op: &str) -> bool {
    op == "!"
}

pub struct Parser<'a> {
    tokens: Vec<Token>,
    source: &'a str,
    current: usize,
    limits: &'a CompilerLimits,
    ast: Ast,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, source: &'a str, limits: &'a CompilerLimits) -> Self {
        // Newlines are insignificant whitespace in this grammar: every
        // construct that needs a terminator uses commas or matching braces.
        let tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|t| t.kind != TokenKind::Newline)
            .collect();
        Self {
            tokens,
            source,
            current: 0,
            limits,
            ast: Ast::new(),
        }
    }

    pub fn parse(mut self) -> Result<Ast, ParseError> {
        let start = self.peek().location();
        let mut declarations = Vec::new();
        while !self.check(TokenKind::Eof) {
            declarations.push(self.parse_declaration()?);
        }
        let end = self.previous_or(start).location();
        let range = SourceRange::new(start, end);
        let module = self.add_node(Node::Module { declarations, range })?;
        self.ast.root = Some(module);
        Ok(self.ast)
    }

    // ---------- token stream plumbing ----------

    fn peek(&self) -> Token {
        self.tokens[self.current]
    }

    fn previous_or(&self, default: SourceLocation) -> Token {
        if self.current == 0 {
            return Token {
                kind: TokenKind::Eof,
                start: default.offset,
                end: default.offset,
                line: default.line,
                column: default.column,
            };
        }
        self.tokens[self.current - 1]
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek();
        if tok.kind != TokenKind::Eof {
            self.current += 1;
        }
        tok
    }

    fn text(&self, token: Token) -> &'a str {
        token.text(self.source)
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let tok = self.peek();
            Err(ParseError::unexpected_token(
                expected,
                &tok,
                self.current,
                self.source,
            ))
        }
    }

    fn expect_identifier(&mut self) -> Result<(String, Token), ParseError> {
        let tok = self.expect(TokenKind::Identifier, "identifier")?;
        Ok((self.text(tok).to_string(), tok))
    }

    fn add_node(&mut self, node: Node) -> Result<NodeId, ParseError> {
        let tok = self.peek();
        self.ast
            .add_node(node, self.limits)
            .map_err(|message| ParseError::from_token(message, &tok, self.current))
    }

    // ---------- declarations ----------

    fn parse_declaration(&mut self) -> Result<NodeId, ParseError> {
        match self.peek().kind {
            TokenKind::Func => self.parse_function_declaration(),
            TokenKind::Type => self.parse_type_declaration(),
            _ => {
                let tok = self.peek();
                Err(ParseError::unexpected_token(
                    "'func' or 'type' declaration",
                    &tok,
                    self.current,
                    self.source,
                ))
            }
        }
    }

    fn parse_placeholder_list(&mut self) -> Result<Vec<String>, ParseError> {
        if !self.check(TokenKind::LBracket) {
            return Ok(Vec::new());
        }
        self.advance();
        let mut placeholders = Vec::new();
        if !self.check(TokenKind::RBracket) {
            loop {
                let (name, _) = self.expect_identifier()?;
                placeholders.push(name);
                if self.check(TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RBracket, "']'")?;
        Ok(placeholders)
    }

    fn parse_function_declaration(&mut self) -> Result<NodeId, ParseError> {
        let start_tok = self.expect(TokenKind::Func, "'func'")?;
        let (name, _) = self.expect_identifier()?;
        let placeholders = self.parse_placeholder_list()?;
        let domain = self.parse_annotation()?;
        self.expect(TokenKind::Arrow, "'->'")?;
        let codomain = self.parse_annotation()?;
        self.expect(TokenKind::Bind, "'='")?;
        let body = self.parse_expression()?;
        let end = self.previous_or(start_tok.location()).location();
        let range = SourceRange::new(start_tok.location(), end);
        self.add_node(Node::FunctionDeclaration {
            name,
            placeholders,
            domain,
            codomain,
            body,
            range,
        })
    }

    fn parse_type_declaration(&mut self) -> Result<NodeId, ParseError> {
        let start_tok = self.expect(TokenKind::Type, "'type'")?;
        let (name, _) = self.expect_identifier()?;
        let placeholders = self.parse_placeholder_list()?;
        self.expect(TokenKind::Bind, "'='")?;
        let body = self.parse_annotation()?;
        let end = self.previous_or(start_tok.location()).location();
        let range = SourceRange::new(start_tok.location(), end);
        self.add_node(Node::TypeDeclaration {
            name,
            placeholders,
            body,
            range,
        })
    }

    // ---------- type annotations ----------

    fn parse_annotation(&mut self) -> Result<NodeId, ParseError> {
        let start = self.peek().location();
        let first = self.parse_function_type()?;
        if !self.check(TokenKind::Or) {
            return Ok(first);
        }
        let mut members = vec![first];
        while self.check(TokenKind::Or) {
            self.advance();
            members.push(self.parse_function_type()?);
        }
        let end = self.previous_or(start).location();
        self.add_node(Node::UnionType {
            members,
            range: SourceRange::new(start, end),
        })
    }

    fn parse_function_type(&mut self) -> Result<NodeId, ParseError> {
        let start = self.peek().location();
        let domain = self.parse_type_atom()?;
        if !self.check(TokenKind::Arrow) {
            return Ok(domain);
        }
        self.advance();
        let codomain = self.parse_type_atom()?;
        let end = self.previous_or(start).location();
        self.add_node(Node::FunctionType {
            domain,
            codomain,
            range: SourceRange::new(start, end),
        })
    }

    fn parse_type_atom(&mut self) -> Result<NodeId, ParseError> {
        match self.peek().kind {
            TokenKind::LBrace => self.parse_object_type(),
            TokenKind::Underscore => {
                let tok = self.advance();
                self.add_node(Node::Nothing {
                    range: SourceRange::point(tok.location()),
                })
            }
            TokenKind::Identifier => self.parse_identifier_like(),
            _ => {
                let tok = self.peek();
                Err(ParseError::unexpected_token(
                    "a type",
                    &tok,
                    self.current,
                    self.source,
                ))
            }
        }
    }

    fn parse_object_type(&mut self) -> Result<NodeId, ParseError> {
        let start_tok = self.expect(TokenKind::LBrace, "'{'")?;
        let mut properties = Vec::new();
        if !self.check(TokenKind::RBrace) {
            loop {
                let (name, name_tok) = self.expect_identifier()?;
                self.expect(TokenKind::Colon, "':'")?;
                let annotation = self.parse_annotation()?;
                let end = self.previous_or(name_tok.location()).location();
                let prop = self.add_node(Node::ObjectTypeProperty {
                    name,
                    annotation,
                    range: SourceRange::new(name_tok.location(), end),
                })?;
                properties.push(prop);
                if self.check(TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        let end = self.previous_or(start_tok.location()).location();
        self.add_node(Node::ObjectType {
            properties,
            range: SourceRange::new(start_tok.location(), end),
        })
    }

    /// Parses `name` or `name[ spec, spec ]`, used both in type position and
    /// in expression position (specializing an overloaded/generic name).
    fn parse_identifier_like(&mut self) -> Result<NodeId, ParseError> {
        let (name, name_tok) = self.expect_identifier()?;
        let mut specializers = Vec::new();
        if self.check(TokenKind::LBracket) {
            self.advance();
            if !self.check(TokenKind::RBracket) {
                loop {
                    let is_named = self.check(TokenKind::Identifier)
                        && self.tokens.get(self.current + 1).map(|t| t.kind)
                            == Some(TokenKind::Bind);
                    let key = if is_named {
                        let (key, _) = self.expect_identifier()?;
                        self.expect(TokenKind::Bind, "'='")?;
                        key
                    } else {
                        String::new()
                    };
                    let value = self.parse_annotation()?;
                    specializers.push((key, value));
                    if self.check(TokenKind::Comma) {
                        self.advance();
                        continue;
                    }
                    break;
                }
            }
            self.expect(TokenKind::RBracket, "']'")?;
        }
        let end = self.previous_or(name_tok.location()).location();
        self.add_node(Node::Identifier {
            name,
            specializers,
            range: SourceRange::new(name_tok.location(), end),
        })
    }

    // ---------- expressions ----------

    pub fn parse_expression(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<NodeId, ParseError> {
        let start = self.peek().location();
        let mut left = self.parse_prefix()?;
        loop {
            let Some((op, _)) = self.peek_operator() else {
                break;
            };
            let Some((prec, assoc)) = infix_info(&op) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.advance();
            // The property name on the right of `.` is never a bound
            // identifier (it names a structural field, not a scope entry),
            // so it is synthesized directly as a string literal rather than
            // parsed as an expression: this keeps it out of scope binding
            // entirely, and lets the inferer read the property name straight
            // off the node.
            let right = if op == "." {
                let (name, name_tok) = self.expect_identifier()?;
                self.add_node(Node::ScalarLiteral {
                    value: ScalarValue::Str(name),
                    range: SourceRange::point(name_tok.location()),
                })?
            } else {
                let next_min = match assoc {
                    Assoc::Left => prec + 1,
                    Assoc::Right => prec,
                };
                self.parse_binary(next_min)?
            };
            let end = self.previous_or(start).location();
            left = self.add_node(Node::InfixExpression {
                operator: op,
                left,
                right,
                range: SourceRange::new(start, end),
            })?;
        }
        Ok(left)
    }

    fn peek_operator(&self) -> Option<(String, Token)> {
        let tok = self.peek();
        if tok.kind == TokenKind::Operator {
            Some((self.text(tok).to_string(), tok))
        } else {
            None
        }
    }

    fn parse_prefix(&mut self) -> Result<NodeId, ParseError> {
        if let Some((op, tok)) = self.peek_operator() {
            if is_prefix_operator(&op) {
                self.advance();
                let operand = self.parse_prefix()?;
                let end = self.previous_or(tok.location()).location();
                return self.add_node(Node::PrefixExpression {
                    operator: op,
                    operand,
                    range: SourceRange::new(tok.location(), end),
                });
            }
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<NodeId, ParseError> {
        let start = self.peek().location();
        let mut node = self.parse_atom()?;
        while let Some((op, _)) = self.peek_operator() {
            if !is_postfix_operator(&op) {
                break;
            }
            self.advance();
            let end = self.previous_or(start).location();
            node = self.add_node(Node::PostfixExpression {
                operator: op,
                operand: node,
                range: SourceRange::new(start, end),
            })?;
        }
        Ok(node)
    }

    fn parse_atom(&mut self) -> Result<NodeId, ParseError> {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Integer => {
                self.advance();
                let value: i64 = self.text(tok).parse().map_err(|_| {
                    ParseError::from_token("invalid integer literal".into(), &tok, self.current)
                })?;
                self.add_node(Node::ScalarLiteral {
                    value: ScalarValue::Int(value),
                    range: SourceRange::point(tok.location()),
                })
            }
            TokenKind::Float => {
                self.advance();
                let value: f64 = self.text(tok).parse().map_err(|_| {
                    ParseError::from_token("invalid float literal".into(), &tok, self.current)
                })?;
                self.add_node(Node::ScalarLiteral {
                    value: ScalarValue::Float(value),
                    range: SourceRange::point(tok.location()),
                })
            }
            TokenKind::Boolean => {
                self.advance();
                let value = self.text(tok) == "true";
                self.add_node(Node::ScalarLiteral {
                    value: ScalarValue::Bool(value),
                    range: SourceRange::point(tok.location()),
                })
            }
            TokenKind::Str => {
                self.advance();
                let value = unescape_string_literal(self.text(tok));
                self.add_node(Node::ScalarLiteral {
                    value: ScalarValue::Str(value),
                    range: SourceRange::point(tok.location()),
                })
            }
            TokenKind::Dollar => {
                self.advance();
                self.add_node(Node::ArgRef {
                    range: SourceRange::point(tok.location()),
                })
            }
            TokenKind::Underscore => {
                self.advance();
                self.add_node(Node::Nothing {
                    range: SourceRange::point(tok.location()),
                })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_list_literal(),
            TokenKind::LBrace => self.parse_brace_expression(),
            TokenKind::If => self.parse_if_expression(),
            TokenKind::Match => self.parse_match_expression(),
            TokenKind::Identifier => self.parse_identifier_atom(),
            _ => Err(ParseError::unexpected_token(
                "an expression",
                &tok,
                self.current,
                self.source,
            )),
        }
    }

    fn parse_list_literal(&mut self) -> Result<NodeId, ParseError> {
        let start_tok = self.expect(TokenKind::LBracket, "'['")?;
        let mut items = Vec::new();
        if !self.check(TokenKind::RBracket) {
            loop {
                items.push(self.parse_expression()?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RBracket, "']'")?;
        let end = self.previous_or(start_tok.location()).location();
        self.add_node(Node::ListLiteral {
            items,
            range: SourceRange::new(start_tok.location(), end),
        })
    }

    /// An identifier atom, followed optionally by the call-expression sugar:
    /// `name { ... }` (argument is an object literal) or `name _` (call with
    /// no meaningful argument).
    fn parse_identifier_atom(&mut self) -> Result<NodeId, ParseError> {
        let start = self.peek().location();
        let callee = self.parse_identifier_like()?;
        if self.check(TokenKind::LBrace) {
            let argument = self.parse_object_literal()?;
            let end = self.previous_or(start).location();
            return self.add_node(Node::CallExpression {
                callee,
                argument,
                range: SourceRange::new(start, end),
            });
        }
        if self.check(TokenKind::Underscore) {
            let tok = self.advance();
            let argument = self.add_node(Node::Nothing {
                range: SourceRange::point(tok.location()),
            })?;
            let end = self.previous_or(start).location();
            return self.add_node(Node::CallExpression {
                callee,
                argument,
                range: SourceRange::new(start, end),
            });
        }
        Ok(callee)
    }

    /// `{ name = expr, ... }`, always value-separated by `=`.
    fn parse_object_literal(&mut self) -> Result<NodeId, ParseError> {
        let start_tok = self.expect(TokenKind::LBrace, "'{'")?;
        let mut properties = Vec::new();
        if !self.check(TokenKind::RBrace) {
            loop {
                let (name, name_tok) = self.expect_identifier()?;
                self.expect(TokenKind::Bind, "'='")?;
                let value = self.parse_expression()?;
                let key = self.add_node(Node::ScalarLiteral {
                    value: ScalarValue::Str(name),
                    range: SourceRange::point(name_tok.location()),
                })?;
                let end = self.previous_or(name_tok.location()).location();
                let prop = self.add_node(Node::ObjectLiteralProperty {
                    key,
                    value,
                    range: SourceRange::new(name_tok.location(), end),
                })?;
                properties.push(prop);
                if self.check(TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        let end = self.previous_or(start_tok.location()).location();
        Ok(self.add_node(Node::ObjectLiteral {
            properties,
            range: SourceRange::new(start_tok.location(), end),
        })?)
    }

    /// A bare `{ ... }` in expression position is either an object literal
    /// (`name = value` properties) or a closure's domain immediately
    /// followed by `=>` (`name: Type` properties). The separator on the
    /// first property disambiguates.
    fn parse_brace_expression(&mut self) -> Result<NodeId, ParseError> {
        let start_tok = self.expect(TokenKind::LBrace, "'{'")?;
        if self.check(TokenKind::RBrace) {
            self.advance();
            let end = self.previous_or(start_tok.location()).location();
            if self.check(TokenKind::BoldArrow) {
                let domain = self.add_node(Node::ObjectType {
                    properties: Vec::new(),
                    range: SourceRange::new(start_tok.location(), end),
                })?;
                return self.finish_closure(start_tok.location(), domain);
            }
            return self.add_node(Node::ObjectLiteral {
                properties: Vec::new(),
                range: SourceRange::new(start_tok.location(), end),
            });
        }

        let (name, name_tok) = self.expect_identifier()?;
        if self.check(TokenKind::Colon) {
            self.advance();
            let annotation = self.parse_annotation()?;
            let prop_end = self.previous_or(name_tok.location()).location();
            let mut properties = vec![self.add_node(Node::ObjectTypeProperty {
                name,
                annotation,
                range: SourceRange::new(name_tok.location(), prop_end),
            })?];
            while self.check(TokenKind::Comma) {
                self.advance();
                let (name, name_tok) = self.expect_identifier()?;
                self.expect(TokenKind::Colon, "':'")?;
                let annotation = self.parse_annotation()?;
                let end = self.previous_or(name_tok.location()).location();
                properties.push(self.add_node(Node::ObjectTypeProperty {
                    name,
                    annotation,
                    range: SourceRange::new(name_tok.location(), end),
                })?);
            }
            self.expect(TokenKind::RBrace, "'}'")?;
            let end = self.previous_or(start_tok.location()).location();
            let domain = self.add_node(Node::ObjectType {
                properties,
                range: SourceRange::new(start_tok.location(), end),
            })?;
            return self.finish_closure(start_tok.location(), domain);
        }

        self.expect(TokenKind::Bind, "'='")?;
        let value = self.parse_expression()?;
        let key = self.add_node(Node::ScalarLiteral {
            value: ScalarValue::Str(name),
            range: SourceRange::point(name_tok.location()),
        })?;
        let prop_end = self.previous_or(name_tok.location()).location();
        let mut properties = vec![self.add_node(Node::ObjectLiteralProperty {
            key,
            value,
            range: SourceRange::new(name_tok.location(), prop_end),
        })?];
        while self.check(TokenKind::Comma) {
            self.advance();
            let (name, name_tok) = self.expect_identifier()?;
            self.expect(TokenKind::Bind, "'='")?;
            let value = self.parse_expression()?;
            let key = self.add_node(Node::ScalarLiteral {
                value: ScalarValue::Str(name),
                range: SourceRange::point(name_tok.location()),
            })?;
            let end = self.previous_or(name_tok.location()).location();
            properties.push(self.add_node(Node::ObjectLiteralProperty {
                key,
                value,
                range: SourceRange::new(name_tok.location(), end),
            })?);
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        let end = self.previous_or(start_tok.location()).location();
        self.add_node(Node::ObjectLiteral {
            properties,
            range: SourceRange::new(start_tok.location(), end),
        })
    }

    fn finish_closure(
        &mut self,
        start: SourceLocation,
        domain: NodeId,
    ) -> Result<NodeId, ParseError> {
        self.expect(TokenKind::BoldArrow, "'=>'")?;
        let body = self.parse_expression()?;
        let end = self.previous_or(start).location();
        self.add_node(Node::ClosureExpression {
            domain,
            codomain: None,
            body,
            range: SourceRange::new(start, end),
        })
    }

    fn parse_if_expression(&mut self) -> Result<NodeId, ParseError> {
        let start_tok = self.expect(TokenKind::If, "'if'")?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Then, "'then'")?;
        let then_branch = self.parse_expression()?;
        self.expect(TokenKind::Else, "'else'")?;
        let else_branch = self.parse_expression()?;
        let end = self.previous_or(start_tok.location()).location();
        self.add_node(Node::IfExpression {
            condition,
            then_branch,
            else_branch,
            range: SourceRange::new(start_tok.location(), end),
        })
    }

    fn parse_match_expression(&mut self) -> Result<NodeId, ParseError> {
        let start_tok = self.expect(TokenKind::Match, "'match'")?;
        let subject = self.parse_expression()?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut cases = Vec::new();
        loop {
            if self.check(TokenKind::When) {
                let case_start = self.advance().location();
                let pattern = self.parse_expression()?;
                self.expect(TokenKind::BoldArrow, "'=>'")?;
                let body = self.parse_expression()?;
                let end = self.previous_or(case_start).location();
                cases.push(self.add_node(Node::WhenCase {
                    pattern,
                    body,
                    range: SourceRange::new(case_start, end),
                })?);
            } else if self.check(TokenKind::Else) {
                let case_start = self.advance().location();
                self.expect(TokenKind::BoldArrow, "'=>'")?;
                let body = self.parse_expression()?;
                let end = self.previous_or(case_start).location();
                cases.push(self.add_node(Node::ElseCase {
                    body,
                    range: SourceRange::new(case_start, end),
                })?);
            } else {
                break;
            }
            if self.check(TokenKind::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        let end = self.previous_or(start_tok.location()).location();
        self.add_node(Node::MatchExpression {
            subject,
            cases,
            range: SourceRange::new(start_tok.location(), end),
        })
    }
}

fn unescape_string_literal(raw: &str) -> String {
    // raw includes the surrounding quotes.
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Parses a complete token stream (as produced by `lexer::lex`) into an AST.
pub fn parse(tokens: Vec<Token>, source: &str, limits: &CompilerLimits) -> Result<Ast, ParseError> {
    Parser::new(tokens, source, limits).parse()
}
