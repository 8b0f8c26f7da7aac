//! Variable usage analysis shared by the optimization passes
//!
//! Collects the variables a statement may write and the variables an
//! expression reads. Both are name-based: shadowing cannot confuse the
//! passes because the constant table and the loop-variable set are both
//! invalidated by name, which only ever over-approximates.

use std::collections::HashSet;
use toycc_frontend::ast::{Expression, ExpressionKind, Statement, StatementKind};

/// Collect every variable name that may be assigned or declared anywhere
/// within `stmt`, including nested blocks, branches, and loops.
pub(crate) fn collect_modified(stmt: &Statement, out: &mut HashSet<String>) {
    match &stmt.kind {
        StatementKind::Block(stmts) => {
            for sub in stmts {
                collect_modified(sub, out);
            }
        }
        StatementKind::Assign { name, .. } | StatementKind::Declare { name, .. } => {
            out.insert(name.clone());
        }
        StatementKind::If {
            then_stmt,
            else_stmt,
            ..
        } => {
            collect_modified(then_stmt, out);
            if let Some(else_stmt) = else_stmt {
                collect_modified(else_stmt, out);
            }
        }
        StatementKind::While { body, .. } => collect_modified(body, out),
        _ => {}
    }
}

/// Collect every variable name read anywhere within `expr`
pub(crate) fn collect_reads(expr: &Expression, out: &mut HashSet<String>) {
    match &expr.kind {
        ExpressionKind::IntLiteral(_) => {}
        ExpressionKind::Identifier(name) => {
            out.insert(name.clone());
        }
        ExpressionKind::Unary { operand, .. } => collect_reads(operand, out),
        ExpressionKind::Binary { left, right, .. } => {
            collect_reads(left, out);
            collect_reads(right, out);
        }
        ExpressionKind::Call { arguments, .. } => {
            for arg in arguments {
                collect_reads(arg, out);
            }
        }
    }
}

/// Whether `expr` reads only variables outside `loop_vars`. Function
/// calls are conservatively never invariant.
pub(crate) fn is_invariant(expr: &Expression, loop_vars: &HashSet<String>) -> bool {
    match &expr.kind {
        ExpressionKind::IntLiteral(_) => true,
        ExpressionKind::Identifier(name) => !loop_vars.contains(name),
        ExpressionKind::Unary { operand, .. } => is_invariant(operand, loop_vars),
        ExpressionKind::Binary { left, right, .. } => {
            is_invariant(left, loop_vars) && is_invariant(right, loop_vars)
        }
        ExpressionKind::Call { .. } => false,
    }
}
