//! Common subexpression elimination
//!
//! Works over straight-line runs of statements inside a function body.
//! Eligible expressions are binary operations whose operands are both
//! plain variable reads. Each is fingerprinted by its operator and the
//! stack offsets of the two operands, and the table maps a fingerprint
//! to a variable known to hold that value. A later occurrence of the
//! same fingerprint is replaced by a read of that variable.
//!
//! The table is flushed at every control-flow boundary: `if` branches
//! and loop bodies start fresh tables, and the outer table is cleared
//! on re-join. A `while` condition is never rewritten; it runs once per
//! iteration and the body may invalidate any table entry in between.
//!
//! Replacements introduce identifier nodes the frontend never saw, so
//! each gets a fresh node id and a matching entry in the function's
//! per-expression offset map.

use std::collections::HashMap;
use toycc_common::{CompilerError, FunctionInfo, NodeId};
use toycc_frontend::ast::{
    BinaryOp, Expression, ExpressionKind, NodeIdGenerator, Statement, StatementKind,
};

/// Operator plus stack offsets of the two variable operands
type Fingerprint = (BinaryOp, i32, i32);

/// Value of an available expression: the variable holding it and its offset
type Holder = (String, i32);

struct CsePass<'a> {
    info: &'a mut FunctionInfo,
    ids: &'a mut NodeIdGenerator,
}

/// Run the pass over a function body
pub(crate) fn run(
    body: Statement,
    info: &mut FunctionInfo,
    ids: &mut NodeIdGenerator,
) -> Result<Statement, CompilerError> {
    let mut pass = CsePass { info, ids };
    let mut table = HashMap::new();
    pass.rewrite_stmt(body, &mut table)
}

impl CsePass<'_> {
    fn expr_offset(&self, expr: &Expression) -> Result<i32, CompilerError> {
        self.info
            .expr_offsets
            .get(&expr.node_id)
            .copied()
            .ok_or_else(|| CompilerError::InternalError {
                message: format!("no stack offset recorded for expression node {}", expr.node_id),
            })
    }

    fn stmt_target_offset(&self, node_id: NodeId) -> Result<i32, CompilerError> {
        self.info
            .stmt_offsets
            .get(&node_id)
            .copied()
            .ok_or_else(|| CompilerError::InternalError {
                message: format!("no stack offset recorded for statement node {}", node_id),
            })
    }

    /// Fingerprint `expr` if it is a binary operation over two variables
    fn fingerprint(&self, expr: &Expression) -> Result<Option<Fingerprint>, CompilerError> {
        if let ExpressionKind::Binary { op, left, right } = &expr.kind {
            if matches!(left.kind, ExpressionKind::Identifier(_))
                && matches!(right.kind, ExpressionKind::Identifier(_))
            {
                let left_offset = self.expr_offset(left)?;
                let right_offset = self.expr_offset(right)?;
                return Ok(Some((*op, left_offset, right_offset)));
            }
        }
        Ok(None)
    }

    /// Build a read of `holder` carrying a fresh node id
    fn make_holder_read(&mut self, holder: &Holder, line: u32) -> Expression {
        let node_id = self.ids.next();
        self.info.expr_offsets.insert(node_id, holder.1);
        Expression {
            node_id,
            kind: ExpressionKind::Identifier(holder.0.clone()),
            line,
        }
    }

    /// Drop every table entry that mentions a variable at `offset`
    fn invalidate(table: &mut HashMap<Fingerprint, Holder>, offset: i32) {
        table.retain(|&(_, left, right), &mut (_, held)| {
            left != offset && right != offset && held != offset
        });
    }

    /// Replace available subexpressions bottom-up. A replaced operand
    /// becomes a variable read, which can make its parent eligible too.
    fn rewrite_expr(
        &mut self,
        expr: Expression,
        table: &HashMap<Fingerprint, Holder>,
    ) -> Result<Expression, CompilerError> {
        let Expression {
            node_id,
            kind,
            line,
        } = expr;
        let rewritten = match kind {
            ExpressionKind::IntLiteral(_) | ExpressionKind::Identifier(_) => Expression {
                node_id,
                kind,
                line,
            },
            ExpressionKind::Unary { op, operand } => Expression {
                node_id,
                kind: ExpressionKind::Unary {
                    op,
                    operand: Box::new(self.rewrite_expr(*operand, table)?),
                },
                line,
            },
            ExpressionKind::Binary { op, left, right } => Expression {
                node_id,
                kind: ExpressionKind::Binary {
                    op,
                    left: Box::new(self.rewrite_expr(*left, table)?),
                    right: Box::new(self.rewrite_expr(*right, table)?),
                },
                line,
            },
            ExpressionKind::Call { callee, arguments } => {
                let arguments = arguments
                    .into_iter()
                    .map(|arg| self.rewrite_expr(arg, table))
                    .collect::<Result<Vec<_>, _>>()?;
                Expression {
                    node_id,
                    kind: ExpressionKind::Call { callee, arguments },
                    line,
                }
            }
        };
        if let Some(fingerprint) = self.fingerprint(&rewritten)? {
            if let Some(holder) = table.get(&fingerprint) {
                let holder = holder.clone();
                return Ok(self.make_holder_read(&holder, line));
            }
        }
        Ok(rewritten)
    }

    /// Rewrite the right-hand side of an assignment or declaration and
    /// update the table for the write to `name`.
    fn rewrite_write(
        &mut self,
        stmt_id: NodeId,
        name: &str,
        value: Expression,
        table: &mut HashMap<Fingerprint, Holder>,
    ) -> Result<Expression, CompilerError> {
        let value = self.rewrite_expr(value, table)?;
        let target = self.stmt_target_offset(stmt_id)?;
        Self::invalidate(table, target);
        if let Some((op, left, right)) = self.fingerprint(&value)? {
            // `a = a + b` computes a value the write itself destroys
            if target != left && target != right {
                table.insert((op, left, right), (name.to_string(), target));
            }
        }
        Ok(value)
    }

    fn rewrite_stmt(
        &mut self,
        stmt: Statement,
        table: &mut HashMap<Fingerprint, Holder>,
    ) -> Result<Statement, CompilerError> {
        let Statement {
            node_id,
            kind,
            line,
        } = stmt;
        let kind = match kind {
            StatementKind::Block(stmts) => {
                let mut inner = HashMap::new();
                let stmts = stmts
                    .into_iter()
                    .map(|sub| self.rewrite_stmt(sub, &mut inner))
                    .collect::<Result<Vec<_>, _>>()?;
                table.clear();
                StatementKind::Block(stmts)
            }
            StatementKind::Expression(expr) => {
                StatementKind::Expression(self.rewrite_expr(expr, table)?)
            }
            StatementKind::Declare { name, init } => {
                let init = self.rewrite_write(node_id, &name, init, table)?;
                StatementKind::Declare { name, init }
            }
            StatementKind::Assign { name, value } => {
                let value = self.rewrite_write(node_id, &name, value, table)?;
                StatementKind::Assign { name, value }
            }
            StatementKind::If {
                condition,
                then_stmt,
                else_stmt,
            } => {
                let condition = self.rewrite_expr(condition, table)?;
                let mut then_table = HashMap::new();
                let then_stmt = Box::new(self.rewrite_stmt(*then_stmt, &mut then_table)?);
                let else_stmt = match else_stmt {
                    Some(else_stmt) => {
                        let mut else_table = HashMap::new();
                        Some(Box::new(self.rewrite_stmt(*else_stmt, &mut else_table)?))
                    }
                    None => None,
                };
                table.clear();
                StatementKind::If {
                    condition,
                    then_stmt,
                    else_stmt,
                }
            }
            StatementKind::While { condition, body } => {
                let mut body_table = HashMap::new();
                let body = Box::new(self.rewrite_stmt(*body, &mut body_table)?);
                table.clear();
                StatementKind::While { condition, body }
            }
            StatementKind::Return(value) => StatementKind::Return(match value {
                Some(expr) => Some(self.rewrite_expr(expr, table)?),
                None => None,
            }),
            other @ (StatementKind::Empty | StatementKind::Break | StatementKind::Continue) => {
                other
            }
        };
        Ok(Statement {
            node_id,
            kind,
            line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toycc_frontend::Frontend;

    fn run_on_main(source: &str) -> (Vec<Statement>, FunctionInfo) {
        let (unit, infos) = Frontend::analyze_source(source).unwrap();
        let mut ids = NodeIdGenerator::resuming_after(&unit);
        let index = unit
            .functions
            .iter()
            .position(|f| f.name == "main")
            .unwrap();
        let mut info = infos[index].clone();
        let body = run(unit.functions[index].body.clone(), &mut info, &mut ids).unwrap();
        match body.kind {
            StatementKind::Block(stmts) => (stmts, info),
            other => panic!("expected block body, got {:?}", other),
        }
    }

    fn declare_init(stmt: &Statement) -> &Expression {
        match &stmt.kind {
            StatementKind::Declare { init, .. } => init,
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_repeated_expression_replaced_by_holder() {
        let (stmts, info) = run_on_main(
            "int f() { return 1; }\n\
             int main() {\n\
                 int a = f();\n\
                 int b = f();\n\
                 int x = a + b;\n\
                 int y = a + b;\n\
                 return x + y;\n\
             }",
        );
        match &declare_init(&stmts[3]).kind {
            ExpressionKind::Identifier(name) => assert_eq!(name, "x"),
            other => panic!("expected read of x, got {:?}", other),
        }
        // the synthesized read carries a fresh id mapped to x's slot
        let read = declare_init(&stmts[3]);
        assert_eq!(
            info.expr_offsets.get(&read.node_id),
            Some(&info.var_offsets["x"]),
        );
    }

    #[test]
    fn test_intervening_write_forces_recompute() {
        let (stmts, _) = run_on_main(
            "int f() { return 1; }\n\
             int main() {\n\
                 int a = f();\n\
                 int b = f();\n\
                 int x = a + b;\n\
                 a = f();\n\
                 int y = a + b;\n\
                 return y;\n\
             }",
        );
        assert!(matches!(
            declare_init(&stmts[4]).kind,
            ExpressionKind::Binary { .. },
        ));
    }

    #[test]
    fn test_write_to_operand_not_recorded() {
        let (stmts, _) = run_on_main(
            "int f() { return 1; }\n\
             int main() {\n\
                 int a = f();\n\
                 a = a + a;\n\
                 int y = a + a;\n\
                 return y;\n\
             }",
        );
        assert!(matches!(
            declare_init(&stmts[2]).kind,
            ExpressionKind::Binary { .. },
        ));
    }

    #[test]
    fn test_branch_clears_table() {
        let (stmts, _) = run_on_main(
            "int f() { return 1; }\n\
             int main() {\n\
                 int a = f();\n\
                 int b = f();\n\
                 int x = a + b;\n\
                 if (b) { a = f(); }\n\
                 int y = a + b;\n\
                 return y;\n\
             }",
        );
        assert!(matches!(
            declare_init(&stmts[4]).kind,
            ExpressionKind::Binary { .. },
        ));
    }

    #[test]
    fn test_if_condition_rewritten() {
        let (stmts, _) = run_on_main(
            "int f() { return 1; }\n\
             int main() {\n\
                 int a = f();\n\
                 int b = f();\n\
                 int x = a + b;\n\
                 if (a + b) { return x; }\n\
                 return 0;\n\
             }",
        );
        match &stmts[3].kind {
            StatementKind::If { condition, .. } => {
                assert!(matches!(condition.kind, ExpressionKind::Identifier(_)));
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_while_condition_not_rewritten() {
        let (stmts, _) = run_on_main(
            "int f() { return 1; }\n\
             int main() {\n\
                 int a = f();\n\
                 int b = f();\n\
                 int x = a + b;\n\
                 while (a + b) { a = a - 1; }\n\
                 return x;\n\
             }",
        );
        match &stmts[3].kind {
            StatementKind::While { condition, .. } => {
                assert!(matches!(condition.kind, ExpressionKind::Binary { .. }));
            }
            other => panic!("expected while, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_operands_cascade() {
        let (stmts, _) = run_on_main(
            "int f() { return 1; }\n\
             int main() {\n\
                 int a = f();\n\
                 int b = f();\n\
                 int x = a + b;\n\
                 int y = x - a;\n\
                 int z = a + b;\n\
                 return y + z;\n\
             }",
        );
        // z's initializer is the same a + b, replaced by a read of x
        match &declare_init(&stmts[4]).kind {
            ExpressionKind::Identifier(name) => assert_eq!(name, "x"),
            other => panic!("expected read of x, got {:?}", other),
        }
    }
}
