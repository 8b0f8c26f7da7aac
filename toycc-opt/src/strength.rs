//! Strength reduction
//!
//! Rewrites `e * c`, where `c` is a positive power-of-two literal on
//! the right, into `e << log2(c)`. Only the right operand is matched;
//! constant folding has already collapsed fully-constant products, so
//! what remains here is a variable times a literal. The shift-amount
//! literal is a new node and gets a fresh id.

use toycc_frontend::ast::{
    BinaryOp, Expression, ExpressionKind, NodeIdGenerator, Statement, StatementKind,
};

/// Run the pass over a function body
pub(crate) fn run(body: Statement, ids: &mut NodeIdGenerator) -> Statement {
    rewrite_stmt(body, ids)
}

fn shift_amount(expr: &Expression) -> Option<i32> {
    match expr.kind {
        ExpressionKind::IntLiteral(value) if value > 0 && value.count_ones() == 1 => {
            Some(value.trailing_zeros() as i32)
        }
        _ => None,
    }
}

fn rewrite_expr(expr: Expression, ids: &mut NodeIdGenerator) -> Expression {
    let Expression {
        node_id,
        kind,
        line,
    } = expr;
    let kind = match kind {
        ExpressionKind::IntLiteral(_) | ExpressionKind::Identifier(_) => kind,
        ExpressionKind::Unary { op, operand } => ExpressionKind::Unary {
            op,
            operand: Box::new(rewrite_expr(*operand, ids)),
        },
        ExpressionKind::Binary { op, left, right } => {
            let left = Box::new(rewrite_expr(*left, ids));
            let right = Box::new(rewrite_expr(*right, ids));
            if op == BinaryOp::Mul {
                if let Some(amount) = shift_amount(&right) {
                    ExpressionKind::Binary {
                        op: BinaryOp::LeftShift,
                        left,
                        right: Box::new(Expression {
                            node_id: ids.next(),
                            kind: ExpressionKind::IntLiteral(amount),
                            line: right.line,
                        }),
                    }
                } else {
                    ExpressionKind::Binary { op, left, right }
                }
            } else {
                ExpressionKind::Binary { op, left, right }
            }
        }
        ExpressionKind::Call { callee, arguments } => ExpressionKind::Call {
            callee,
            arguments: arguments
                .into_iter()
                .map(|arg| rewrite_expr(arg, ids))
                .collect(),
        },
    };
    Expression {
        node_id,
        kind,
        line,
    }
}

fn rewrite_stmt(stmt: Statement, ids: &mut NodeIdGenerator) -> Statement {
    let Statement {
        node_id,
        kind,
        line,
    } = stmt;
    let kind = match kind {
        StatementKind::Block(stmts) => StatementKind::Block(
            stmts
                .into_iter()
                .map(|sub| rewrite_stmt(sub, ids))
                .collect(),
        ),
        StatementKind::Expression(expr) => StatementKind::Expression(rewrite_expr(expr, ids)),
        StatementKind::Declare { name, init } => StatementKind::Declare {
            name,
            init: rewrite_expr(init, ids),
        },
        StatementKind::Assign { name, value } => StatementKind::Assign {
            name,
            value: rewrite_expr(value, ids),
        },
        StatementKind::If {
            condition,
            then_stmt,
            else_stmt,
        } => StatementKind::If {
            condition: rewrite_expr(condition, ids),
            then_stmt: Box::new(rewrite_stmt(*then_stmt, ids)),
            else_stmt: else_stmt.map(|else_stmt| Box::new(rewrite_stmt(*else_stmt, ids))),
        },
        StatementKind::While { condition, body } => StatementKind::While {
            condition: rewrite_expr(condition, ids),
            body: Box::new(rewrite_stmt(*body, ids)),
        },
        StatementKind::Return(value) => {
            StatementKind::Return(value.map(|expr| rewrite_expr(expr, ids)))
        }
        other @ (StatementKind::Empty | StatementKind::Break | StatementKind::Continue) => other,
    };
    Statement {
        node_id,
        kind,
        line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toycc_frontend::Frontend;

    fn run_on_main(source: &str) -> Vec<Statement> {
        let unit = Frontend::parse_source(source).unwrap();
        let mut ids = NodeIdGenerator::resuming_after(&unit);
        let body = unit
            .functions
            .into_iter()
            .find(|f| f.name == "main")
            .unwrap()
            .body;
        match run(body, &mut ids).kind {
            StatementKind::Block(stmts) => stmts,
            other => panic!("expected block body, got {:?}", other),
        }
    }

    fn return_expr(stmt: &Statement) -> &Expression {
        match &stmt.kind {
            StatementKind::Return(Some(expr)) => expr,
            other => panic!("expected return with value, got {:?}", other),
        }
    }

    #[test]
    fn test_multiply_by_power_of_two_becomes_shift() {
        let stmts = run_on_main("int main() { int x = 5; return x * 8; }");
        match &return_expr(&stmts[1]).kind {
            ExpressionKind::Binary { op, right, .. } => {
                assert_eq!(*op, BinaryOp::LeftShift);
                assert_eq!(right.as_constant(), Some(3));
            }
            other => panic!("expected shift, got {:?}", other),
        }
    }

    #[test]
    fn test_multiply_by_non_power_of_two_unchanged() {
        let stmts = run_on_main("int main() { int x = 5; return x * 6; }");
        match &return_expr(&stmts[1]).kind {
            ExpressionKind::Binary { op, .. } => assert_eq!(*op, BinaryOp::Mul),
            other => panic!("expected multiply, got {:?}", other),
        }
    }

    #[test]
    fn test_power_of_two_on_left_unchanged() {
        let stmts = run_on_main("int main() { int x = 5; return 8 * x; }");
        match &return_expr(&stmts[1]).kind {
            ExpressionKind::Binary { op, .. } => assert_eq!(*op, BinaryOp::Mul),
            other => panic!("expected multiply, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_and_zero_factors_unchanged() {
        for source in [
            "int main() { int x = 5; return x * 0; }",
            "int main() { int x = 5; return x * -4; }",
        ] {
            let stmts = run_on_main(source);
            match &return_expr(&stmts[1]).kind {
                ExpressionKind::Binary { op, .. } => assert_eq!(*op, BinaryOp::Mul),
                other => panic!("expected multiply, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_rewrite_inside_nested_expression() {
        let stmts = run_on_main("int main() { int x = 5; return (x * 4) + (x * 3); }");
        match &return_expr(&stmts[1]).kind {
            ExpressionKind::Binary { left, right, .. } => {
                assert!(matches!(
                    left.kind,
                    ExpressionKind::Binary {
                        op: BinaryOp::LeftShift,
                        ..
                    }
                ));
                assert!(matches!(
                    right.kind,
                    ExpressionKind::Binary {
                        op: BinaryOp::Mul,
                        ..
                    }
                ));
            }
            other => panic!("expected sum, got {:?}", other),
        }
    }
}
