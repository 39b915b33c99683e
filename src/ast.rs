// Abstract syntax tree for Mamba, represented as a closed tagged sum over an
// arena rather than a reflective node hierarchy: every node kind is its own
// `Node` variant carrying strongly-typed fields, and children are referenced
// by `NodeId` into the tree's own arena.

use crate::source::SourceRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone)]
pub enum Node {
    Module {
        declarations: Vec<NodeId>,
        range: SourceRange,
    },
    TypeDeclaration {
        name: String,
        placeholders: Vec<String>,
        body: NodeId,
        range: SourceRange,
    },
    FunctionDeclaration {
        name: String,
        placeholders: Vec<String>,
        domain: NodeId,
        codomain: NodeId,
        body: NodeId,
        range: SourceRange,
    },
    FunctionType {
        domain: NodeId,
        codomain: NodeId,
        range: SourceRange,
    },
    ObjectType {
        properties: Vec<NodeId>,
        range: SourceRange,
    },
    ObjectTypeProperty {
        name: String,
        annotation: NodeId,
        range: SourceRange,
    },
    UnionType {
        members: Vec<NodeId>,
        range: SourceRange,
    },
    ClosureExpression {
        domain: NodeId,
        codomain: Option<NodeId>,
        body: NodeId,
        range: SourceRange,
    },
    CallExpression {
        callee: NodeId,
        argument: NodeId,
        range: SourceRange,
    },
    InfixExpression {
        operator: String,
        left: NodeId,
        right: NodeId,
        range: SourceRange,
    },
    PrefixExpression {
        operator: String,
        operand: NodeId,
        range: SourceRange,
    },
    PostfixExpression {
        operator: String,
        operand: NodeId,
        range: SourceRange,
    },
    IfExpression {
        condition: NodeId,
        then_branch: NodeId,
        else_branch: NodeId,
        range: SourceRange,
    },
    MatchExpression {
        subject: NodeId,
        cases: Vec<NodeId>,
        range: SourceRange,
    },
    WhenCase {
        pattern: NodeId,
        body: NodeId,
        range: SourceRange,
    },
    ElseCase {
        body: NodeId,
        range: SourceRange,
    },
    Binding {
        name: String,
        annotation: Option<NodeId>,
        range: SourceRange,
    },
    Identifier {
        name: String,
        /// Explicit specialization, e.g. `Pair[ A = Int, B = String ]`.
        /// Each entry is a placeholder name paired with a type-expression node,
        /// except the `_0` sugar which is stored with an empty name.
        specializers: Vec<(String, NodeId)>,
        range: SourceRange,
    },
    ScalarLiteral {
        value: ScalarValue,
        range: SourceRange,
    },
    ObjectLiteral {
        /// Each entry is an `ObjectLiteralProperty` node id.
        properties: Vec<NodeId>,
        range: SourceRange,
    },
    ObjectLiteralProperty {
        key: NodeId,
        value: NodeId,
        range: SourceRange,
    },
    ListLiteral {
        items: Vec<NodeId>,
        range: SourceRange,
    },
    ArgRef {
        range: SourceRange,
    },
    Nothing {
        range: SourceRange,
    },
}

impl Node {
    pub fn range(&self) -> SourceRange {
        match self {
            Node::Module { range, .. }
            | Node::TypeDeclaration { range, .. }
            | Node::FunctionDeclaration { range, .. }
            | Node::FunctionType { range, .. }
            | Node::ObjectType { range, .. }
            | Node::ObjectTypeProperty { range, .. }
            | Node::UnionType { range, .. }
            | Node::ClosureExpression { range, .. }
            | Node::CallExpression { range, .. }
            | Node::InfixExpression { range, .. }
            | Node::PrefixExpression { range, .. }
            | Node::PostfixExpression { range, .. }
            | Node::IfExpression { range, .. }
            | Node::MatchExpression { range, .. }
            | Node::WhenCase { range, .. }
            | Node::ElseCase { range, .. }
            | Node::Binding { range, .. }
            | Node::Identifier { range, .. }
            | Node::ScalarLiteral { range, .. }
            | Node::ObjectLiteral { range, .. }
            | Node::ObjectLiteralProperty { range, .. }
            | Node::ListLiteral { range, .. }
            | Node::ArgRef { range }
            | Node::Nothing { range } => *range,
        }
    }

    /// A short name for diagnostics, independent of Rust's `Debug` derive.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Module { .. } => "Module",
            Node::TypeDeclaration { .. } => "TypeDeclaration",
            Node::FunctionDeclaration { .. } => "FunctionDeclaration",
            Node::FunctionType { .. } => "FunctionType",
            Node::ObjectType { .. } => "ObjectType",
            Node::ObjectTypeProperty { .. } => "ObjectTypeProperty",
            Node::UnionType { .. } => "UnionType",
            Node::ClosureExpression { .. } => "ClosureExpression",
            Node::CallExpression { .. } => "CallExpression",
            Node::InfixExpression { .. } => "InfixExpression",
            Node::PrefixExpression { .. } => "PrefixExpression",
            Node::PostfixExpression { .. } => "PostfixExpression",
            Node::IfExpression { .. } => "IfExpression",
            Node::MatchExpression { .. } => "MatchExpression",
            Node::WhenCase { .. } => "WhenCase",
            Node::ElseCase { .. } => "ElseCase",
            Node::Binding { .. } => "Binding",
            Node::Identifier { .. } => "Identifier",
            Node::ScalarLiteral { .. } => "ScalarLiteral",
            Node::ObjectLiteral { .. } => "ObjectLiteral",
            Node::ObjectLiteralProperty { .. } => "ObjectLiteralProperty",
            Node::ListLiteral { .. } => "ListLiteral",
            Node::ArgRef { .. } => "ArgRef",
            Node::Nothing { .. } => "Nothing",
        }
    }
}

#[derive(Debug)]
pub struct Ast {
    nodes: Vec<Node>,
    pub root: Option<NodeId>,
}

impl Ast {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }

    pub fn add_node(
        &mut self,
        node: Node,
        limits: &crate::limits::CompilerLimits,
    ) -> Result<NodeId, String> {
        if self.nodes.len() >= limits.max_ast_nodes {
            return Err(format!(
                "AST node count exceeds max of {}",
                limits.max_ast_nodes
            ));
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}
