//! The semantic error taxonomy (SPEC_FULL.md §7): scope errors, signature
//! errors, and solver errors. Every variant carries a `SourceRange` and
//! renders a class name a diagnostic printer can show verbatim, mirroring
//! `mamba.sema.exc.SemanticError` and its subclasses.

use crate::source::SourceRange;

#[derive(Debug, Clone)]
pub enum SemanticError {
    DuplicateDeclaration { name: String, range: SourceRange },
    UnboundName { name: String, range: SourceRange },
    NotAType { name: String, range: SourceRange },
    Overloaded { name: String, range: SourceRange },
    ExtraneousSpecializer { names: Vec<String>, range: SourceRange },
    UnificationError {
        lhs: String,
        rhs: String,
        reason: String,
        range: SourceRange,
    },
    SpecializationError { range: SourceRange },
    Unsolvable { range: SourceRange },
}

impl SemanticError {
    pub fn range(&self) -> SourceRange {
        match self {
            SemanticError::DuplicateDeclaration { range, .. }
            | SemanticError::UnboundName { range, .. }
            | SemanticError::NotAType { range, .. }
            | SemanticError::Overloaded { range, .. }
            | SemanticError::ExtraneousSpecializer { range, .. }
            | SemanticError::UnificationError { range, .. }
            | SemanticError::SpecializationError { range, .. }
            | SemanticError::Unsolvable { range, .. } => *range,
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            SemanticError::DuplicateDeclaration { .. } => "DuplicateDeclaration",
            SemanticError::UnboundName { .. } => "UnboundName",
            SemanticError::NotAType { .. } | SemanticError::Overloaded { .. } | SemanticError::ExtraneousSpecializer { .. } => {
                "SignatureError"
            }
            SemanticError::UnificationError { .. } => "UnificationError",
            SemanticError::SpecializationError { .. } => "SpecializationError",
            SemanticError::Unsolvable { .. } => "Unsolvable",
        }
    }
}

impl std::fmt::Display for SemanticError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let start = self.range().start;
        match self {
            SemanticError::DuplicateDeclaration { name, .. } => {
                write!(f, "{}: {}: {}", start, self.class_name(), name)
            }
            SemanticError::UnboundName { name, .. } => {
                write!(f, "{}: {}: {}", start, self.class_name(), name)
            }
            SemanticError::NotAType { name, .. } => write!(
                f,
                "{}: {}: '{}' is not a type",
                start,
                self.class_name(),
                name
            ),
            SemanticError::Overloaded { name, .. } => write!(
                f,
                "{}: {}: '{}' is overloaded",
                start,
                self.class_name(),
                name
            ),
            SemanticError::ExtraneousSpecializer { names, .. } => write!(
                f,
                "{}: {}: extraneous explicit specializations: {}",
                start,
                self.class_name(),
                names.join(", ")
            ),
            SemanticError::UnificationError { lhs, rhs, reason, .. } => write!(
                f,
                "{}: {}: {} ('{}' vs '{}')",
                start,
                self.class_name(),
                reason,
                lhs,
                rhs
            ),
            SemanticError::SpecializationError { .. } => {
                write!(f, "{}: {}", start, self.class_name())
            }
            SemanticError::Unsolvable { .. } => write!(
                f,
                "{}: {}: constraint system appears to be unsolvable",
                start,
                self.class_name()
            ),
        }
    }
}

impl std::error::Error for SemanticError {}
