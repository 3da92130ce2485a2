//! Concrete syntax tree / 具体语法树
//!
//! Produced by [`tokenizer::parse_query`](super::tokenizer::parse_query) and
//! consumed once by the AST builder. Nodes keep the raw source text of every
//! token; composite nodes carry only children.

use super::label::Label;

/// Node kinds of the query grammar / 语法节点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxKind {
    Program,
    SimpleString,
    QuotedString,
    RawQuoted,
    Regex,
    Wildcard,
    Not,
    Or,
    Group,
    Label,
    /// Comma-joined values inside a parenthesized label body
    Alternatives,
    LabelName(Label),
    OpenParen,
    CloseParen,
    Colon,
    /// Unparsed fragment, transparent to every later stage
    Error,
}

impl SyntaxKind {
    pub fn is_string(&self) -> bool {
        matches!(
            self,
            SyntaxKind::SimpleString | SyntaxKind::QuotedString | SyntaxKind::RawQuoted
        )
    }

    /// Kinds that open a new scope in the term tree
    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            SyntaxKind::Group | SyntaxKind::Label | SyntaxKind::Alternatives
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxNode {
    pub kind: SyntaxKind,
    /// Source text (tokens only) / 源文本
    pub text: String,
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    pub fn token(kind: SyntaxKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            children: Vec::new(),
        }
    }

    pub fn branch(kind: SyntaxKind, children: Vec<SyntaxNode>) -> Self {
        Self {
            kind,
            text: String::new(),
            children,
        }
    }

    /// Compact rendering used by tests and trace logs, e.g.
    /// `Program(Not,SimpleString,Wildcard)`.
    pub fn sexpr(&self) -> String {
        let name = match self.kind {
            SyntaxKind::LabelName(label) => return format!("LabelName[{}]", label),
            other => format!("{:?}", other),
        };
        if self.children.is_empty() && !self.kind.is_scope() && self.kind != SyntaxKind::Program {
            return name;
        }
        let inner: Vec<String> = self.children.iter().map(|c| c.sexpr()).collect();
        format!("{}({})", name, inner.join(","))
    }
}

/// Position of a node during a walk / 遍历时节点的位置
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    pub node: &'a SyntaxNode,
    pub parent: Option<&'a SyntaxNode>,
    pub index: usize,
}

impl<'a> NodeRef<'a> {
    /// Siblings to the left, nearest first
    pub fn left_siblings(&self) -> impl Iterator<Item = &'a SyntaxNode> {
        let siblings: &'a [SyntaxNode] = match self.parent {
            Some(parent) => &parent.children[..self.index],
            None => &[],
        };
        siblings.iter().rev()
    }

    pub fn next_sibling(&self) -> Option<&'a SyntaxNode> {
        self.parent.and_then(|p| p.children.get(self.index + 1))
    }
}

/// Enter/leave visitor over the syntax tree
pub trait Visitor {
    fn enter(&mut self, at: NodeRef<'_>);
    fn leave(&mut self, at: NodeRef<'_>);
}

/// Depth-first walk, calling `enter` before and `leave` after the children
pub fn walk<V: Visitor>(root: &SyntaxNode, visitor: &mut V) {
    fn visit<V: Visitor>(at: NodeRef<'_>, visitor: &mut V) {
        visitor.enter(at);
        for (index, child) in at.node.children.iter().enumerate() {
            visit(
                NodeRef {
                    node: child,
                    parent: Some(at.node),
                    index,
                },
                visitor,
            );
        }
        visitor.leave(at);
    }

    visit(
        NodeRef {
            node: root,
            parent: None,
            index: 0,
        },
        visitor,
    );
}
