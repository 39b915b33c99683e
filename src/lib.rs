//! Library surface for the Mamba semantic pipeline: lex -> parse -> analyze.
//!
//! Exposed as a library (rather than only a binary) so integration tests and
//! the CLI share one entry point instead of the tests spawning the binary as
//! a subprocess.

pub mod ast;
pub mod cli;
pub mod lexer;
pub mod limits;
pub mod parser;
pub mod semantic;
pub mod source;

use ast::Ast;
use limits::CompilerLimits;
use semantic::{analyze, AnalysisResult};
use semantic::symbol::ScopeArena;
use semantic::types::TypeRegistry;

/// Everything produced by running the four passes over one compilation unit,
/// bundled with the arenas the annotations are indices into.
pub struct Pipeline {
    pub ast: Ast,
    pub scopes: ScopeArena,
    pub types: TypeRegistry,
    pub result: AnalysisResult,
}

/// A failure before the semantic passes ever ran: a lex or parse error. These
/// halt the pipeline entirely (SPEC_FULL.md §7: "a process exits nonzero
/// after a parse error"), unlike semantic errors, which are collected and do
/// not prevent the solver from running.
#[derive(Debug)]
pub enum FrontendError {
    Lex(lexer::LexError),
    Parse(parser::ParseError),
    Empty,
}

impl std::fmt::Display for FrontendError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FrontendError::Lex(e) => write!(f, "{}", e),
            FrontendError::Parse(e) => write!(f, "{}", e),
            FrontendError::Empty => write!(f, "empty module: nothing to analyze"),
        }
    }
}

impl std::error::Error for FrontendError {}

impl From<lexer::LexError> for FrontendError {
    fn from(e: lexer::LexError) -> Self {
        FrontendError::Lex(e)
    }
}

impl From<parser::ParseError> for FrontendError {
    fn from(e: parser::ParseError) -> Self {
        FrontendError::Parse(e)
    }
}

/// Runs the whole front end to back end over `source`: lex, parse, then the
/// four semantic passes (scope build, scope bind, infer, solve).
pub fn run_pipeline(source: &str, limits: &CompilerLimits) -> Result<Pipeline, FrontendError> {
    let tokens = lexer::lex(source, limits)?;
    let ast = parser::parse(tokens, source, limits)?;
    let root = ast.root.ok_or(FrontendError::Empty)?;

    let (scopes, types, result) = analyze(&ast, root, limits);
    Ok(Pipeline {
        ast,
        scopes,
        types,
        result,
    })
}
