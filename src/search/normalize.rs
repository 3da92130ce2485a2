//! Negation normalizer - pushes NOT down to the leaves (De Morgan) / 否定下推
//!
//! After [`normalize`] no group is negated: every negation sits on a term and
//! the connectives below a negated group have been swapped. Precedence is
//! already explicit in the tree shape, so swapping cannot regroup operands.

use super::ast::{Expr, Group};

/// Distribute all negations in place / 原地下推所有否定
pub fn normalize(root: &mut Group) {
    distribute_group(root, false);
}

fn distribute_group(group: &mut Group, ambient: bool) {
    let negate = group.negate != ambient;
    group.negate = false;
    if let Some(body) = group.body.as_mut() {
        distribute(body, negate);
    }
}

fn distribute(expr: &mut Expr, ambient: bool) {
    match expr {
        Expr::Term(term) => {
            if ambient {
                term.negate = !term.negate;
            }
        }
        Expr::Group(group) => distribute_group(group, ambient),
        Expr::And(children) | Expr::Or(children) => {
            for child in children.iter_mut() {
                distribute(child, ambient);
            }
        }
    }
    if ambient {
        expr.swap_connective();
    }
}
