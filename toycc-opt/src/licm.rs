//! Loop-invariant code motion
//!
//! For each `while` loop, the loop-variable set is every variable
//! assigned or declared anywhere in the body plus every variable the
//! condition reads. A statement at the top level of the body that
//! assigns or declares from an expression reading only variables
//! outside that set (and containing no calls) computes the same value
//! on every iteration, so it is hoisted to immediately before the loop.
//! The loop and its hoisted statements are wrapped in a new block.
//!
//! Hoisting one statement can make another invariant (its reads leave
//! the loop-variable set), so each loop is reprocessed until nothing
//! moves. Inner loops are processed before their enclosing loop, so a
//! statement can migrate outward one level per enclosing `while`.

use crate::vars;
use std::collections::HashSet;
use toycc_frontend::ast::{NodeIdGenerator, Statement, StatementKind};

/// Run the pass over a function body
pub(crate) fn run(body: Statement, ids: &mut NodeIdGenerator) -> Statement {
    rewrite_stmt(body, ids)
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
        StatementKind::If {
            condition,
            then_stmt,
            else_stmt,
        } => StatementKind::If {
            condition,
            then_stmt: Box::new(rewrite_stmt(*then_stmt, ids)),
            else_stmt: else_stmt.map(|else_stmt| Box::new(rewrite_stmt(*else_stmt, ids))),
        },
        StatementKind::While { condition, body } => {
            let body = rewrite_stmt(*body, ids);
            let Statement {
                node_id: body_id,
                kind: body_kind,
                line: body_line,
            } = body;
            match body_kind {
                StatementKind::Block(mut stmts) => {
                    let mut hoisted = Vec::new();
                    loop {
                        let mut loop_vars = HashSet::new();
                        for sub in &stmts {
                            vars::collect_modified(sub, &mut loop_vars);
                        }
                        vars::collect_reads(&condition, &mut loop_vars);

                        let mut kept = Vec::new();
                        let mut moved = false;
                        for sub in stmts {
                            let invariant = match &sub.kind {
                                StatementKind::Declare { init, .. } => {
                                    vars::is_invariant(init, &loop_vars)
                                }
                                StatementKind::Assign { value, .. } => {
                                    vars::is_invariant(value, &loop_vars)
                                }
                                _ => false,
                            };
                            if invariant {
                                hoisted.push(sub);
                                moved = true;
                            } else {
                                kept.push(sub);
                            }
                        }
                        stmts = kept;
                        if !moved {
                            break;
                        }
                    }
                    let body = Box::new(Statement {
                        node_id: body_id,
                        kind: StatementKind::Block(stmts),
                        line: body_line,
                    });
                    if hoisted.is_empty() {
                        StatementKind::While { condition, body }
                    } else {
                        hoisted.push(Statement {
                            node_id,
                            kind: StatementKind::While { condition, body },
                            line,
                        });
                        return Statement {
                            node_id: ids.next(),
                            kind: StatementKind::Block(hoisted),
                            line,
                        };
                    }
                }
                other => StatementKind::While {
                    condition,
                    body: Box::new(Statement {
                        node_id: body_id,
                        kind: other,
                        line: body_line,
                    }),
                },
            }
        }
        other => other,
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
    use toycc_frontend::ast::TranslationUnit;
    use toycc_frontend::Frontend;

    fn run_on_main(source: &str) -> Vec<Statement> {
        let unit: TranslationUnit = Frontend::parse_source(source).unwrap();
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

    #[test]
    fn test_invariant_declaration_hoisted() {
        let stmts = run_on_main(
            "int main() {\n\
                 int a = 2;\n\
                 int b = 3;\n\
                 int i = 0;\n\
                 while (i < 10) {\n\
                     int t = a * b;\n\
                     i = i + t;\n\
                 }\n\
                 return i;\n\
             }",
        );
        match &stmts[3].kind {
            StatementKind::Block(wrapper) => {
                assert_eq!(wrapper.len(), 2);
                match &wrapper[0].kind {
                    StatementKind::Declare { name, .. } => assert_eq!(name, "t"),
                    other => panic!("expected hoisted declaration, got {:?}", other),
                }
                match &wrapper[1].kind {
                    StatementKind::While { body, .. } => match &body.kind {
                        StatementKind::Block(kept) => assert_eq!(kept.len(), 1),
                        other => panic!("expected block body, got {:?}", other),
                    },
                    other => panic!("expected loop after hoist, got {:?}", other),
                }
            }
            other => panic!("expected wrapper block, got {:?}", other),
        }
    }

    #[test]
    fn test_rhs_reading_loop_variable_stays() {
        let stmts = run_on_main(
            "int main() {\n\
                 int i = 0;\n\
                 while (i < 10) {\n\
                     int t = i * 2;\n\
                     i = i + 1;\n\
                 }\n\
                 return i;\n\
             }",
        );
        assert!(matches!(stmts[1].kind, StatementKind::While { .. }));
    }

    #[test]
    fn test_rhs_reading_condition_variable_stays() {
        let stmts = run_on_main(
            "int main() {\n\
                 int n = 4;\n\
                 int x = 0;\n\
                 while (n) {\n\
                     x = n + 1;\n\
                     break;\n\
                 }\n\
                 return x;\n\
             }",
        );
        assert!(matches!(stmts[2].kind, StatementKind::While { .. }));
    }

    #[test]
    fn test_call_never_hoisted() {
        let stmts = run_on_main(
            "int f() { return 1; }\n\
             int main() {\n\
                 int i = 0;\n\
                 while (i < 10) {\n\
                     int t = f();\n\
                     i = i + 1;\n\
                 }\n\
                 return i;\n\
             }",
        );
        assert!(matches!(stmts[1].kind, StatementKind::While { .. }));
    }

    #[test]
    fn test_inner_loop_hoists_before_outer() {
        let stmts = run_on_main(
            "int main() {\n\
                 int a = 2;\n\
                 int b = 3;\n\
                 int i = 0;\n\
                 while (i < 3) {\n\
                     int j = i - i;\n\
                     while (j < 3) {\n\
                         int t = a * b;\n\
                         j = j + t;\n\
                     }\n\
                     i = i + 1;\n\
                 }\n\
                 return i;\n\
             }",
        );
        // the inner loop gained a wrapper block holding the hoisted
        // declaration; `int j = i - i` reads i and stays put
        match &stmts[3].kind {
            StatementKind::While { body, .. } => match &body.kind {
                StatementKind::Block(outer_body) => {
                    assert!(matches!(outer_body[0].kind, StatementKind::Declare { .. }));
                    match &outer_body[1].kind {
                        StatementKind::Block(wrapper) => {
                            assert!(matches!(wrapper[0].kind, StatementKind::Declare { .. }));
                            assert!(matches!(wrapper[1].kind, StatementKind::While { .. }));
                        }
                        other => panic!("expected inner wrapper block, got {:?}", other),
                    }
                }
                other => panic!("expected block body, got {:?}", other),
            },
            other => panic!("expected outer loop, got {:?}", other),
        }
    }

    #[test]
    fn test_hoisting_cascades_through_dependencies() {
        let stmts = run_on_main(
            "int main() {\n\
                 int a = 2;\n\
                 int i = 0;\n\
                 while (i < 10) {\n\
                     int u = a + 1;\n\
                     int v = u + 1;\n\
                     i = i + u + v;\n\
                 }\n\
                 return i;\n\
             }",
        );
        // hoisting u takes it out of the loop-variable set, which makes
        // v invariant on the next round; both leave, in order
        match &stmts[2].kind {
            StatementKind::Block(wrapper) => {
                assert_eq!(wrapper.len(), 3);
                match (&wrapper[0].kind, &wrapper[1].kind) {
                    (
                        StatementKind::Declare { name: first, .. },
                        StatementKind::Declare { name: second, .. },
                    ) => {
                        assert_eq!(first, "u");
                        assert_eq!(second, "v");
                    }
                    other => panic!("expected two hoisted declarations, got {:?}", other),
                }
                assert!(matches!(wrapper[2].kind, StatementKind::While { .. }));
            }
            other => panic!("expected wrapper block, got {:?}", other),
        }
    }
}
