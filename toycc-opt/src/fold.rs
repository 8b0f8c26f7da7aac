//! Constant folding, constant propagation, and dead-code elimination
//!
//! One integrated statement walk: expressions are folded bottom-up over
//! wrapping 32-bit arithmetic, variables with known constant values are
//! replaced by those constants, and statements that can no longer
//! execute (or no longer do anything) are dropped. Folding must run
//! before the dead-code decisions — a branch condition has to become a
//! literal before the branch can be selected.
//!
//! Division or modulo by a literal zero is never folded; definitely
//! erroneous code keeps its runtime behavior instead of being
//! miscompiled into an arbitrary constant.

use crate::vars;
use std::collections::{HashMap, HashSet};
use toycc_frontend::ast::{
    BinaryOp, Expression, ExpressionKind, Statement, StatementKind, UnaryOp,
};

/// Run the pass over a function body
pub(crate) fn run(body: Statement) -> Statement {
    let mut consts = HashMap::new();
    rewrite_stmt(body, &mut consts)
}

fn eval_unary(op: UnaryOp, value: i32) -> i32 {
    match op {
        UnaryOp::Plus => value,
        UnaryOp::Minus => value.wrapping_neg(),
        UnaryOp::LogicalNot => (value == 0) as i32,
    }
}

/// Evaluate a binary operator over two constants. `None` means the
/// operation must stay in the tree (division/modulo by zero, overflowing
/// division, out-of-range shift).
fn eval_binary(op: BinaryOp, left: i32, right: i32) -> Option<i32> {
    match op {
        BinaryOp::Add => Some(left.wrapping_add(right)),
        BinaryOp::Sub => Some(left.wrapping_sub(right)),
        BinaryOp::Mul => Some(left.wrapping_mul(right)),
        BinaryOp::Div => left.checked_div(right),
        BinaryOp::Mod => left.checked_rem(right),
        BinaryOp::LeftShift => {
            if (0..32).contains(&right) {
                Some(left.wrapping_shl(right as u32))
            } else {
                None
            }
        }
        BinaryOp::Less => Some((left < right) as i32),
        BinaryOp::Greater => Some((left > right) as i32),
        BinaryOp::LessEqual => Some((left <= right) as i32),
        BinaryOp::GreaterEqual => Some((left >= right) as i32),
        BinaryOp::Equal => Some((left == right) as i32),
        BinaryOp::NotEqual => Some((left != right) as i32),
        BinaryOp::LogicalAnd => Some((left != 0 && right != 0) as i32),
        BinaryOp::LogicalOr => Some((left != 0 || right != 0) as i32),
    }
}

/// Fold an expression bottom-up, consulting the constant table for
/// variable reads. Rewritten nodes keep the id of the node they replace.
fn fold_expr(expr: Expression, consts: &HashMap<String, i32>) -> Expression {
    let Expression {
        node_id,
        kind,
        line,
    } = expr;
    match kind {
        ExpressionKind::IntLiteral(_) => Expression {
            node_id,
            kind,
            line,
        },
        ExpressionKind::Identifier(name) => match consts.get(&name) {
            Some(&value) => Expression {
                node_id,
                kind: ExpressionKind::IntLiteral(value),
                line,
            },
            None => Expression {
                node_id,
                kind: ExpressionKind::Identifier(name),
                line,
            },
        },
        ExpressionKind::Unary { op, operand } => {
            let operand = fold_expr(*operand, consts);
            match operand.as_constant() {
                Some(value) => Expression {
                    node_id,
                    kind: ExpressionKind::IntLiteral(eval_unary(op, value)),
                    line,
                },
                None => Expression {
                    node_id,
                    kind: ExpressionKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    line,
                },
            }
        }
        ExpressionKind::Binary { op, left, right } => {
            let left = fold_expr(*left, consts);
            let right = fold_expr(*right, consts);
            if let (Some(l), Some(r)) = (left.as_constant(), right.as_constant()) {
                if let Some(value) = eval_binary(op, l, r) {
                    return Expression {
                        node_id,
                        kind: ExpressionKind::IntLiteral(value),
                        line,
                    };
                }
            }
            Expression {
                node_id,
                kind: ExpressionKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                line,
            }
        }
        ExpressionKind::Call { callee, arguments } => Expression {
            node_id,
            kind: ExpressionKind::Call {
                callee,
                arguments: arguments
                    .into_iter()
                    .map(|arg| fold_expr(arg, consts))
                    .collect(),
            },
            line,
        },
    }
}

/// Conservative check that control cannot flow past `stmt`. Mirrors the
/// return-path analysis in semantic checking: a block terminates if any
/// statement in it does, an `if` needs both branches, a loop never counts.
fn terminates(stmt: &Statement) -> bool {
    match &stmt.kind {
        StatementKind::Return(_) => true,
        StatementKind::Block(stmts) => stmts.iter().any(terminates),
        StatementKind::If {
            then_stmt,
            else_stmt: Some(else_stmt),
            ..
        } => terminates(then_stmt) && terminates(else_stmt),
        _ => false,
    }
}

/// Remove from the constant table every variable `stmt` may write
fn invalidate_writes(stmt: &Statement, consts: &mut HashMap<String, i32>) {
    let mut written = HashSet::new();
    vars::collect_modified(stmt, &mut written);
    for name in written {
        consts.remove(&name);
    }
}

fn rewrite_stmt(stmt: Statement, consts: &mut HashMap<String, i32>) -> Statement {
    let Statement {
        node_id,
        kind,
        line,
    } = stmt;
    match kind {
        StatementKind::Block(stmts) => {
            let mut scope = consts.clone();
            let mut out = Vec::new();
            for sub in stmts {
                let sub = rewrite_stmt(sub, &mut scope);
                if matches!(sub.kind, StatementKind::Empty) {
                    continue;
                }
                let done = terminates(&sub);
                out.push(sub);
                if done {
                    // everything after an unconditional return is unreachable
                    break;
                }
            }
            let rewritten = Statement {
                node_id,
                kind: StatementKind::Block(out),
                line,
            };
            invalidate_writes(&rewritten, consts);
            rewritten
        }
        StatementKind::Empty => Statement {
            node_id,
            kind: StatementKind::Empty,
            line,
        },
        StatementKind::Expression(expr) => {
            let expr = fold_expr(expr, consts);
            if expr.as_constant().is_some() {
                // a bare constant has no effect
                Statement {
                    node_id,
                    kind: StatementKind::Empty,
                    line,
                }
            } else {
                Statement {
                    node_id,
                    kind: StatementKind::Expression(expr),
                    line,
                }
            }
        }
        StatementKind::Declare { name, init } => {
            let init = fold_expr(init, consts);
            match init.as_constant() {
                Some(value) => {
                    consts.insert(name.clone(), value);
                }
                None => {
                    consts.remove(&name);
                }
            }
            Statement {
                node_id,
                kind: StatementKind::Declare { name, init },
                line,
            }
        }
        StatementKind::Assign { name, value } => {
            let value = fold_expr(value, consts);
            match value.as_constant() {
                Some(constant) => {
                    consts.insert(name.clone(), constant);
                }
                None => {
                    consts.remove(&name);
                }
            }
            Statement {
                node_id,
                kind: StatementKind::Assign { name, value },
                line,
            }
        }
        StatementKind::If {
            condition,
            then_stmt,
            else_stmt,
        } => {
            let condition = fold_expr(condition, consts);
            match condition.as_constant() {
                Some(0) => match else_stmt {
                    Some(else_stmt) => rewrite_stmt(*else_stmt, consts),
                    None => Statement {
                        node_id,
                        kind: StatementKind::Empty,
                        line,
                    },
                },
                Some(_) => rewrite_stmt(*then_stmt, consts),
                None => {
                    let mut then_consts = consts.clone();
                    let then_stmt = Box::new(rewrite_stmt(*then_stmt, &mut then_consts));
                    let else_stmt = else_stmt.map(|else_stmt| {
                        let mut else_consts = consts.clone();
                        Box::new(rewrite_stmt(*else_stmt, &mut else_consts))
                    });
                    let rewritten = Statement {
                        node_id,
                        kind: StatementKind::If {
                            condition,
                            then_stmt,
                            else_stmt,
                        },
                        line,
                    };
                    // either branch may have run, so its writes are unknown
                    invalidate_writes(&rewritten, consts);
                    rewritten
                }
            }
        }
        StatementKind::While { condition, body } => {
            // the loop may run zero or more times and mutate these
            // between the analysis point and any given iteration
            invalidate_writes(&body, consts);
            let condition = fold_expr(condition, consts);
            if condition.as_constant() == Some(0) {
                return Statement {
                    node_id,
                    kind: StatementKind::Empty,
                    line,
                };
            }
            let mut body_consts = consts.clone();
            let body = Box::new(rewrite_stmt(*body, &mut body_consts));
            Statement {
                node_id,
                kind: StatementKind::While { condition, body },
                line,
            }
        }
        StatementKind::Break => Statement {
            node_id,
            kind: StatementKind::Break,
            line,
        },
        StatementKind::Continue => Statement {
            node_id,
            kind: StatementKind::Continue,
            line,
        },
        StatementKind::Return(value) => Statement {
            node_id,
            kind: StatementKind::Return(value.map(|expr| fold_expr(expr, consts))),
            line,
        },
    }
}
