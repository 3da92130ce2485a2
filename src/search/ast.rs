//! Term tree - the interchange format between builder, normalizer and SQL generator / 查询项树
//!
//! The tree is owned top-down by the root [`Group`]. Boolean connectives are
//! stored as n-ary `And`/`Or` nodes whose shape already encodes precedence
//! (AND binds tighter than OR), so no later pass has to re-group operands.

use serde::Serialize;

use super::label::Label;

/// Leaf payload / 叶子内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TermKind {
    /// Unquoted literal / 未加引号的字面量
    SimpleString { value: String, wildcard: bool },
    /// Quoted or raw literal, escapes already resolved / 引号字面量
    QuotedString { value: String, wildcard: bool },
    /// `flags` is deduplicated, first occurrence order kept
    Regex { pattern: String, flags: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Term {
    #[serde(flatten)]
    pub kind: TermKind,
    pub negate: bool,
    pub label: Option<Label>,
}

impl Term {
    pub fn simple(value: impl Into<String>) -> Self {
        Self::new(TermKind::SimpleString {
            value: value.into(),
            wildcard: false,
        })
    }

    pub fn quoted(value: impl Into<String>) -> Self {
        Self::new(TermKind::QuotedString {
            value: value.into(),
            wildcard: false,
        })
    }

    pub fn regex(pattern: impl Into<String>, flags: &str) -> Self {
        Self::new(TermKind::Regex {
            pattern: pattern.into(),
            flags: dedup_flags(flags),
        })
    }

    fn new(kind: TermKind) -> Self {
        Self {
            kind,
            negate: false,
            label: None,
        }
    }

    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    pub fn labelled(mut self, label: Label) -> Self {
        self.label = Some(label);
        self
    }

    /// Literal value of a string term, `None` for regexes
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            TermKind::SimpleString { value, .. } | TermKind::QuotedString { value, .. } => {
                Some(value)
            }
            TermKind::Regex { .. } => None,
        }
    }
}

/// Keep each flag once, in order of first appearance / 标志去重
pub fn dedup_flags(flags: &str) -> String {
    let mut seen = String::with_capacity(flags.len());
    for c in flags.chars() {
        if !seen.contains(c) {
            seen.push(c);
        }
    }
    seen
}

/// Connective placed ahead of an operand while a scope is being read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "children", rename_all = "camelCase")]
pub enum Expr {
    Term(Term),
    Group(Box<Group>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    /// Fold a flat `operand (sep operand)*` run by precedence climbing.
    ///
    /// Contiguous AND-chains become one `And` node, the chains are joined by
    /// `Or`. A separator ahead of the first operand is ignored and a missing
    /// separator between two operands means AND.
    ///
    /// `[x OR x AND x]` folds to `Or[x, And[x, x]]`, and
    /// `[x AND x OR x AND x]` to `Or[And[x, x], And[x, x]]`.
    pub fn fold(items: Vec<(Option<Separator>, Expr)>) -> Option<Expr> {
        let mut alternatives: Vec<Expr> = Vec::new();
        let mut chain: Vec<Expr> = Vec::new();

        for (separator, operand) in items {
            if separator == Some(Separator::Or) && !chain.is_empty() {
                alternatives.push(Self::chain(std::mem::take(&mut chain)));
            }
            chain.push(operand);
        }
        if !chain.is_empty() {
            alternatives.push(Self::chain(chain));
        }

        match alternatives.len() {
            0 => None,
            1 => alternatives.pop(),
            _ => Some(Expr::Or(alternatives)),
        }
    }

    fn chain(mut operands: Vec<Expr>) -> Expr {
        if operands.len() == 1 {
            operands.remove(0)
        } else {
            Expr::And(operands)
        }
    }

    /// Swap `And` and `Or` in place (De Morgan); other nodes are untouched
    pub fn swap_connective(&mut self) {
        let swapped = match std::mem::replace(self, Expr::And(Vec::new())) {
            Expr::And(children) => Expr::Or(children),
            Expr::Or(children) => Expr::And(children),
            other => other,
        };
        *self = swapped;
    }

    /// Every leaf below this node, left to right
    pub fn terms(&self) -> Vec<&Term> {
        let mut out = Vec::new();
        self.collect_terms(&mut out);
        out
    }

    fn collect_terms<'a>(&'a self, out: &mut Vec<&'a Term>) {
        match self {
            Expr::Term(term) => out.push(term),
            Expr::Group(group) => {
                if let Some(body) = &group.body {
                    body.collect_terms(out);
                }
            }
            Expr::And(children) | Expr::Or(children) => {
                for child in children {
                    child.collect_terms(out);
                }
            }
        }
    }
}

/// A scope: the root, a parenthesized group, or a label construct / 分组
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub is_root: bool,
    pub negate: bool,
    pub label: Option<Label>,
    /// `None` when the scope holds no terms
    pub body: Option<Expr>,
}

impl Group {
    pub fn root(body: Option<Expr>) -> Self {
        Self {
            is_root: true,
            negate: false,
            label: None,
            body,
        }
    }

    pub fn nested(negate: bool, label: Option<Label>, body: Option<Expr>) -> Self {
        Self {
            is_root: false,
            negate,
            label,
            body,
        }
    }

    pub fn terms(&self) -> Vec<&Term> {
        self.body.as_ref().map(Expr::terms).unwrap_or_default()
    }
}
