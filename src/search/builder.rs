//! AST builder - walks the syntax tree once and produces the term tree / 语法树到查询项树
//!
//! Scopes (root, groups, label constructs) live on an explicit stack while the
//! walk is inside them. Each scope collects `(separator, operand)` pairs and is
//! folded by precedence when the walk leaves it. Error nodes are skipped: they
//! contribute neither a term nor a separator.

use super::ast::{dedup_flags, Expr, Group, Separator, Term, TermKind};
use super::label::Label;
use super::syntax::{walk, NodeRef, SyntaxKind, SyntaxNode, Visitor};

/// How a sibling is seen when scanning to the left of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sibling {
    /// Unparsed fragment, transparent
    Skip,
    Not,
    Or,
    /// Label name, colon or opening paren: nothing can be joined across it
    Boundary,
    Operand,
}

fn classify(kind: SyntaxKind) -> Sibling {
    match kind {
        SyntaxKind::Error => Sibling::Skip,
        SyntaxKind::Not => Sibling::Not,
        SyntaxKind::Or => Sibling::Or,
        SyntaxKind::LabelName(_)
        | SyntaxKind::Colon
        | SyntaxKind::OpenParen
        | SyntaxKind::CloseParen => Sibling::Boundary,
        _ => Sibling::Operand,
    }
}

/// Build the term tree from a parsed query / 构建查询项树
pub fn build(tree: &SyntaxNode) -> Group {
    let mut builder = AstBuilder::default();
    walk(tree, &mut builder);
    builder.root.unwrap_or_else(|| Group::root(None))
}

/// An open scope / 当前打开的作用域
#[derive(Debug, Default)]
struct Scope {
    negate: bool,
    label: Option<Label>,
    /// Separator to put ahead of this scope once it is attached to its parent
    lead: Option<Separator>,
    /// A dropped empty group stood behind an `OR`: the next operand takes it
    pending_or: bool,
    items: Vec<(Option<Separator>, Expr)>,
}

#[derive(Debug, Default)]
struct AstBuilder {
    stack: Vec<Scope>,
    root: Option<Group>,
}

impl AstBuilder {
    fn current_label(&self) -> Option<Label> {
        self.stack.last().and_then(|scope| scope.label)
    }

    fn attach(&mut self, separator: Option<Separator>, expr: Expr) {
        if let Some(scope) = self.stack.last_mut() {
            let separator = if std::mem::take(&mut scope.pending_or) {
                Some(Separator::Or)
            } else {
                separator
            };
            scope.items.push((separator, expr));
        }
    }

    fn open_scope(&mut self, at: NodeRef<'_>) {
        let mut negate = leading_nots(at.left_siblings()) % 2 == 1;
        let mut label = self.current_label();

        if at.node.kind == SyntaxKind::Label {
            // `-tag:foo` carries its negation as the first child
            if leading_nots(at.node.children.iter()) % 2 == 1 {
                negate = !negate;
            }
            // `tag:-(a b)` negates the parenthesized body
            if body_nots(&at.node.children) % 2 == 1 {
                negate = !negate;
            }
            label = at.node.children.iter().find_map(|child| match child.kind {
                SyntaxKind::LabelName(label) => Some(label),
                _ => None,
            });
        }

        self.stack.push(Scope {
            negate,
            label,
            lead: separator_ahead(at),
            pending_or: false,
            items: Vec::new(),
        });
    }

    fn close_scope(&mut self) {
        let Some(scope) = self.stack.pop() else { return };
        let body = Expr::fold(scope.items);
        if body.is_none() {
            tracing::trace!("Dropping empty search group");
            // `a OR () b` keeps its OR
            if scope.lead == Some(Separator::Or) {
                if let Some(parent) = self.stack.last_mut() {
                    parent.pending_or = true;
                }
            }
            return;
        }
        let group = Group::nested(scope.negate, scope.label, body);
        self.attach(scope.lead, Expr::Group(Box::new(group)));
    }

    fn leaf(&mut self, at: NodeRef<'_>) {
        let node = at.node;
        let wildcard = at
            .next_sibling()
            .map_or(false, |next| next.kind == SyntaxKind::Wildcard);

        let kind = match node.kind {
            SyntaxKind::SimpleString => TermKind::SimpleString {
                value: node.text.clone(),
                wildcard,
            },
            SyntaxKind::QuotedString => TermKind::QuotedString {
                value: unquote(&node.text),
                wildcard,
            },
            SyntaxKind::RawQuoted => TermKind::QuotedString {
                value: unfence(&node.text).to_string(),
                wildcard,
            },
            SyntaxKind::Regex => {
                let (pattern, flags) = split_regex(&node.text);
                TermKind::Regex {
                    pattern: pattern.to_string(),
                    flags: dedup_flags(flags),
                }
            }
            _ => return,
        };

        let term = Term {
            kind,
            negate: leading_nots(at.left_siblings()) % 2 == 1,
            label: self.current_label(),
        };
        self.attach(separator_ahead(at), Expr::Term(term));
    }
}

impl Visitor for AstBuilder {
    fn enter(&mut self, at: NodeRef<'_>) {
        match at.node.kind {
            SyntaxKind::Program => self.stack.push(Scope::default()),
            SyntaxKind::SimpleString
            | SyntaxKind::QuotedString
            | SyntaxKind::RawQuoted
            | SyntaxKind::Regex => self.leaf(at),
            kind if kind.is_scope() => self.open_scope(at),
            SyntaxKind::Error => tracing::trace!("Skipping unparsed fragment {:?}", at.node.text),
            _ => {}
        }
    }

    fn leave(&mut self, at: NodeRef<'_>) {
        match at.node.kind {
            SyntaxKind::Program => {
                if let Some(scope) = self.stack.pop() {
                    self.root = Some(Group::root(Expr::fold(scope.items)));
                }
            }
            kind if kind.is_scope() => self.close_scope(),
            _ => {}
        }
    }
}

/// Count consecutive `Not` tokens, skipping error nodes, until anything else
fn leading_nots<'a>(siblings: impl Iterator<Item = &'a SyntaxNode>) -> usize {
    let mut count = 0;
    for sibling in siblings {
        match classify(sibling.kind) {
            Sibling::Skip => continue,
            Sibling::Not => count += 1,
            _ => break,
        }
    }
    count
}

/// `Not` tokens between a label's colon and its opening paren
fn body_nots(children: &[SyntaxNode]) -> usize {
    let after_colon = children
        .iter()
        .skip_while(|child| child.kind != SyntaxKind::Colon)
        .skip(1);
    let count = after_colon
        .clone()
        .take_while(|child| child.kind == SyntaxKind::Not)
        .count();
    match after_colon.clone().nth(count) {
        Some(child) if child.kind == SyntaxKind::OpenParen => count,
        _ => 0,
    }
}

/// Implicit or explicit connective ahead of a node
fn separator_ahead(at: NodeRef<'_>) -> Option<Separator> {
    for sibling in at.left_siblings() {
        match classify(sibling.kind) {
            Sibling::Skip | Sibling::Not => continue,
            Sibling::Or => return Some(Separator::Or),
            Sibling::Operand => return Some(Separator::And),
            Sibling::Boundary => return None,
        }
    }
    None
}

/// Resolve backslash escapes of a `"` or `'` quoted literal / 去除引号并处理转义
fn unquote(text: &str) -> String {
    let mut chars = text.chars();
    let Some(delimiter) = chars.next() else {
        return String::new();
    };
    let inner: Vec<char> = chars.collect();
    // 去掉结尾的引号
    let inner = match inner.split_last() {
        Some((last, rest)) if *last == delimiter => rest,
        _ => &inner[..],
    };

    let mut value = String::with_capacity(inner.len());
    let mut iter = inner.iter().peekable();
    while let Some(&c) = iter.next() {
        if c == '\\' {
            if let Some(&&next) = iter.peek() {
                if next == delimiter || next == '\\' {
                    value.push(next);
                    iter.next();
                    continue;
                }
            }
        }
        value.push(c);
    }
    value
}

/// Content between the matching delimiter fences of a raw literal
fn unfence(text: &str) -> &str {
    let Some(delimiter) = text.chars().next() else {
        return text;
    };
    // Delimiters are ASCII, so char counts equal byte offsets here
    let fence = text.chars().take_while(|&c| c == delimiter).count();
    if text.len() < fence * 2 {
        return "";
    }
    &text[fence..text.len() - fence]
}

/// `/pattern/flags` -> (pattern, flags)
fn split_regex(text: &str) -> (&str, &str) {
    let body = text.strip_prefix('/').unwrap_or(text);
    match body.rfind('/') {
        Some(end) => (&body[..end], &body[end + 1..]),
        None => (body, ""),
    }
}
