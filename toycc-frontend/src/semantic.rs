//! Semantic Analysis
//!
//! Performs symbol resolution and static checking on the AST produced by
//! the parser, and builds the per-function symbol table (`FunctionInfo`)
//! that code generation consumes. The AST itself is read-only here; all
//! annotations are recorded against node ids.

use crate::ast::*;
use log::debug;
use std::collections::HashMap;
use thiserror::Error;
use toycc_common::{slot_offset, CompilerError, FunctionInfo};

/// Semantic analysis errors
///
/// One variant per user-facing failure kind, carrying the offending name
/// where one exists.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SemanticError {
    #[error("duplicate function name: {name}")]
    DuplicateFunction { name: String },

    #[error("missing entry function: int main()")]
    MissingMain,

    #[error("main must be: int main()")]
    InvalidMain,

    #[error("redeclaration in same scope: {name}")]
    DuplicateVariable { name: String },

    #[error("use of undeclared variable: {name}")]
    UndeclaredVariable { name: String },

    #[error("call to undefined function: {name}")]
    CallToUndefinedFunction { name: String },

    #[error("call to function declared later: {name} (declaration must appear before call)")]
    CallToLaterFunction { name: String },

    #[error("call argument count mismatch for {name}: expected {expected}, found {found}")]
    ArgCountMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("void function '{name}' used in expression context")]
    VoidUsedAsValue { name: String },

    #[error("break used outside of loop")]
    BreakOutsideLoop,

    #[error("continue used outside of loop")]
    ContinueOutsideLoop,

    #[error("return with a value in void function")]
    ReturnValueInVoid,

    #[error("missing return value in int function")]
    MissingReturnValue,

    #[error("int function '{name}' may not return on every path")]
    NotAllPathsReturn { name: String },
}

impl From<SemanticError> for CompilerError {
    fn from(err: SemanticError) -> Self {
        CompilerError::semantic_error(err.to_string())
    }
}

/// Conservative check whether a statement always returns.
///
/// A block counts as returning when any of its statements does; an
/// if/else only when both branches do; a while never does. The block
/// rule accepts a `return` that is not the last reachable statement,
/// which is deliberately lenient (dead-code elimination removes the
/// tail anyway).
fn always_returns(stmt: &Statement) -> bool {
    match &stmt.kind {
        StatementKind::Return(_) => true,
        StatementKind::Block(stmts) => stmts.iter().any(always_returns),
        StatementKind::If {
            then_stmt,
            else_stmt: Some(else_stmt),
            ..
        } => always_returns(then_stmt) && always_returns(else_stmt),
        _ => false,
    }
}

/// Semantic analyzer
///
/// Runs a signature pass over the whole unit, then a single pass per
/// function in file order.
pub struct SemanticAnalyzer;

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyze a translation unit, producing one `FunctionInfo` per
    /// function or the first error encountered.
    pub fn analyze(&self, unit: &TranslationUnit) -> Result<Vec<FunctionInfo>, SemanticError> {
        // Signature pass: names, return types, parameter lists
        let mut infos: Vec<FunctionInfo> = Vec::with_capacity(unit.functions.len());
        for (index, func) in unit.functions.iter().enumerate() {
            if infos.iter().any(|fi| fi.name == func.name) {
                return Err(SemanticError::DuplicateFunction {
                    name: func.name.clone(),
                });
            }
            infos.push(FunctionInfo {
                name: func.name.clone(),
                return_type: func.return_type,
                params: func.parameters.clone(),
                index_in_file: index,
                ..Default::default()
            });
        }

        match infos.iter().find(|fi| fi.name == "main") {
            None => return Err(SemanticError::MissingMain),
            Some(main) => {
                if main.return_type != Type::Int || !main.params.is_empty() {
                    return Err(SemanticError::InvalidMain);
                }
            }
        }

        // Per-function pass, in file order
        for (index, func) in unit.functions.iter().enumerate() {
            debug!("analyzing function '{}'", func.name);
            let checked = FunctionChecker::new(&infos, index, infos[index].clone()).check(func)?;
            infos[index] = checked;
        }

        Ok(infos)
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// State for checking one function body
struct FunctionChecker<'a> {
    signatures: &'a [FunctionInfo],
    func_index: usize,
    info: FunctionInfo,
    /// Scope stack of name -> frame offset, innermost last
    scopes: Vec<HashMap<String, i32>>,
    /// Next storage slot to assign (parameters first, then locals)
    next_slot: usize,
    loop_depth: u32,
}

impl<'a> FunctionChecker<'a> {
    fn new(signatures: &'a [FunctionInfo], func_index: usize, info: FunctionInfo) -> Self {
        Self {
            signatures,
            func_index,
            info,
            scopes: Vec::new(),
            next_slot: 0,
            loop_depth: 0,
        }
    }

    fn check(mut self, func: &Function) -> Result<FunctionInfo, SemanticError> {
        // Parameters populate the outermost scope, slots first
        self.scopes.push(HashMap::new());
        for param in &func.parameters {
            let offset = self.alloc_slot();
            self.scopes[0].insert(param.clone(), offset);
            self.info.var_offsets.insert(param.clone(), offset);
        }

        self.check_stmt(&func.body)?;
        self.info.num_locals = self.next_slot - func.parameters.len();

        if func.return_type == Type::Int && !always_returns(&func.body) {
            return Err(SemanticError::NotAllPathsReturn {
                name: func.name.clone(),
            });
        }

        Ok(self.info)
    }

    fn alloc_slot(&mut self) -> i32 {
        let offset = slot_offset(self.next_slot);
        self.next_slot += 1;
        offset
    }

    /// Resolve a name through the scope stack, innermost first
    fn resolve(&self, name: &str) -> Option<i32> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    fn check_stmt(&mut self, stmt: &Statement) -> Result<(), SemanticError> {
        match &stmt.kind {
            StatementKind::Block(stmts) => {
                self.scopes.push(HashMap::new());
                for sub in stmts {
                    self.check_stmt(sub)?;
                }
                self.scopes.pop();
                Ok(())
            }
            StatementKind::Empty => Ok(()),
            StatementKind::Expression(expr) => {
                // A bare call statement is the one context where a void
                // result is permitted.
                let allow_void = matches!(expr.kind, ExpressionKind::Call { .. });
                self.check_expr(expr, allow_void)
            }
            StatementKind::Declare { name, init } => {
                let scope = self.scopes.last().expect("scope stack is never empty");
                if scope.contains_key(name) {
                    return Err(SemanticError::DuplicateVariable { name: name.clone() });
                }
                let offset = self.alloc_slot();
                self.scopes
                    .last_mut()
                    .expect("scope stack is never empty")
                    .insert(name.clone(), offset);
                self.info.var_offsets.insert(name.clone(), offset);
                self.info.stmt_offsets.insert(stmt.node_id, offset);
                // The name is visible to its own initializer, matching
                // single-pass declaration order.
                self.check_expr(init, false)
            }
            StatementKind::Assign { name, value } => {
                self.check_expr(value, false)?;
                let offset = self
                    .resolve(name)
                    .ok_or_else(|| SemanticError::UndeclaredVariable { name: name.clone() })?;
                self.info.stmt_offsets.insert(stmt.node_id, offset);
                Ok(())
            }
            StatementKind::If {
                condition,
                then_stmt,
                else_stmt,
            } => {
                self.check_expr(condition, false)?;
                self.check_stmt(then_stmt)?;
                if let Some(else_stmt) = else_stmt {
                    self.check_stmt(else_stmt)?;
                }
                Ok(())
            }
            StatementKind::While { condition, body } => {
                self.check_expr(condition, false)?;
                self.loop_depth += 1;
                let result = self.check_stmt(body);
                self.loop_depth -= 1;
                result
            }
            StatementKind::Break => {
                if self.loop_depth == 0 {
                    return Err(SemanticError::BreakOutsideLoop);
                }
                Ok(())
            }
            StatementKind::Continue => {
                if self.loop_depth == 0 {
                    return Err(SemanticError::ContinueOutsideLoop);
                }
                Ok(())
            }
            StatementKind::Return(value) => match value {
                Some(expr) => {
                    if self.info.return_type == Type::Void {
                        return Err(SemanticError::ReturnValueInVoid);
                    }
                    self.check_expr(expr, false)
                }
                None => {
                    if self.info.return_type == Type::Int {
                        return Err(SemanticError::MissingReturnValue);
                    }
                    Ok(())
                }
            },
        }
    }

    /// Check an expression. `allow_void` is true only when the
    /// expression is the entire body of an expression statement;
    /// operands and arguments are always value contexts.
    fn check_expr(&mut self, expr: &Expression, allow_void: bool) -> Result<(), SemanticError> {
        match &expr.kind {
            ExpressionKind::IntLiteral(_) => Ok(()),
            ExpressionKind::Identifier(name) => {
                let offset = self
                    .resolve(name)
                    .ok_or_else(|| SemanticError::UndeclaredVariable { name: name.clone() })?;
                self.info.expr_offsets.insert(expr.node_id, offset);
                Ok(())
            }
            ExpressionKind::Unary { operand, .. } => self.check_expr(operand, false),
            ExpressionKind::Binary { left, right, .. } => {
                self.check_expr(left, false)?;
                self.check_expr(right, false)
            }
            ExpressionKind::Call { callee, arguments } => {
                let found = self
                    .signatures
                    .iter()
                    .position(|fi| fi.name == *callee)
                    .ok_or_else(|| SemanticError::CallToUndefinedFunction {
                        name: callee.clone(),
                    })?;
                // Self-recursion is the only permitted forward reference
                if found > self.func_index {
                    return Err(SemanticError::CallToLaterFunction {
                        name: callee.clone(),
                    });
                }
                let signature = &self.signatures[found];
                if arguments.len() != signature.params.len() {
                    return Err(SemanticError::ArgCountMismatch {
                        name: callee.clone(),
                        expected: signature.params.len(),
                        found: arguments.len(),
                    });
                }
                if !allow_void && signature.return_type == Type::Void {
                    return Err(SemanticError::VoidUsedAsValue {
                        name: callee.clone(),
                    });
                }
                for arg in arguments {
                    self.check_expr(arg, false)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn analyze(source: &str) -> Result<Vec<FunctionInfo>, SemanticError> {
        let tokens = Lexer::new(source).tokenize().unwrap();
        let unit = Parser::new(tokens).parse_translation_unit().unwrap();
        SemanticAnalyzer::new().analyze(&unit)
    }

    #[test]
    fn test_missing_main() {
        assert_eq!(
            analyze("int f() { return 0; }").unwrap_err(),
            SemanticError::MissingMain
        );
    }

    #[test]
    fn test_invalid_main_signature() {
        assert_eq!(
            analyze("int main(int x) { return x; }").unwrap_err(),
            SemanticError::InvalidMain
        );
        assert_eq!(
            analyze("void main() { return; }").unwrap_err(),
            SemanticError::InvalidMain
        );
    }

    #[test]
    fn test_duplicate_function() {
        let err = analyze("int main() { return 0; } int main() { return 1; }").unwrap_err();
        assert_eq!(
            err,
            SemanticError::DuplicateFunction {
                name: "main".to_string()
            }
        );
    }

    #[test]
    fn test_parameter_and_local_offsets() {
        let infos =
            analyze("int f(int a, int b) { int c = 0; return c; } int main() { return f(1, 2); }")
                .unwrap();
        let f = &infos[0];
        assert_eq!(f.var_offsets["a"], -12);
        assert_eq!(f.var_offsets["b"], -16);
        assert_eq!(f.var_offsets["c"], -20);
        assert_eq!(f.num_locals, 1);
        assert_eq!(f.total_slots(), 3);
    }

    #[test]
    fn test_identifier_annotation() {
        let infos = analyze("int main() { int x = 1; return x; }").unwrap();
        let main = &infos[0];
        assert_eq!(main.var_offsets["x"], -12);
        // Exactly one identifier read of x, annotated with its offset
        assert_eq!(main.expr_offsets.len(), 1);
        assert!(main.expr_offsets.values().all(|&off| off == -12));
        // The declaration carries its target offset
        assert_eq!(main.stmt_offsets.len(), 1);
    }

    #[test]
    fn test_undeclared_variable() {
        assert_eq!(
            analyze("int main() { return y; }").unwrap_err(),
            SemanticError::UndeclaredVariable {
                name: "y".to_string()
            }
        );
        assert_eq!(
            analyze("int main() { y = 1; return 0; }").unwrap_err(),
            SemanticError::UndeclaredVariable {
                name: "y".to_string()
            }
        );
    }

    #[test]
    fn test_shadowing_allowed_same_scope_rejected() {
        // Shadowing in a nested scope is fine
        assert!(analyze("int main() { int x = 1; { int x = 2; x = 3; } return x; }").is_ok());
        // Redeclaration in the same scope is not
        assert_eq!(
            analyze("int main() { int x = 1; int x = 2; return x; }").unwrap_err(),
            SemanticError::DuplicateVariable {
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn test_inner_variable_not_visible_after_block() {
        assert_eq!(
            analyze("int main() { { int x = 1; } return x; }").unwrap_err(),
            SemanticError::UndeclaredVariable {
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn test_self_recursion_allowed_forward_call_rejected() {
        assert!(analyze(
            "int fact(int n) { if (n <= 1) { return 1; } return n * fact(n - 1); } \
             int main() { return fact(5); }"
        )
        .is_ok());

        let err = analyze("int main() { return later(); } int later() { return 1; }").unwrap_err();
        assert_eq!(
            err,
            SemanticError::CallToLaterFunction {
                name: "later".to_string()
            }
        );
        assert_eq!(
            err.to_string(),
            "call to function declared later: later (declaration must appear before call)"
        );
    }

    #[test]
    fn test_call_to_undefined_function() {
        assert_eq!(
            analyze("int main() { return nothing(); }").unwrap_err(),
            SemanticError::CallToUndefinedFunction {
                name: "nothing".to_string()
            }
        );
    }

    #[test]
    fn test_argument_count_mismatch() {
        let err = analyze(
            "int add(int a, int b) { return a + b; } int main() { return add(1); }",
        )
        .unwrap_err();
        assert_eq!(
            err,
            SemanticError::ArgCountMismatch {
                name: "add".to_string(),
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_void_call_contexts() {
        // Bare call statement: fine
        assert!(analyze("void hint() { return; } int main() { hint(); return 0; }").is_ok());
        // Used as a value: rejected
        let err =
            analyze("void hint() { return; } int main() { int x = hint(); return x; }").unwrap_err();
        assert_eq!(
            err,
            SemanticError::VoidUsedAsValue {
                name: "hint".to_string()
            }
        );
        // As an operand inside a bigger expression statement: rejected
        let err =
            analyze("void hint() { return; } int main() { hint() + 1; return 0; }").unwrap_err();
        assert_eq!(
            err,
            SemanticError::VoidUsedAsValue {
                name: "hint".to_string()
            }
        );
    }

    #[test]
    fn test_break_continue_outside_loop() {
        assert_eq!(
            analyze("int main() { break; return 0; }").unwrap_err(),
            SemanticError::BreakOutsideLoop
        );
        assert_eq!(
            analyze("int main() { continue; return 0; }").unwrap_err(),
            SemanticError::ContinueOutsideLoop
        );
        assert!(
            analyze("int main() { while (1) { break; } return 0; }").is_ok(),
            "break inside loop is legal"
        );
    }

    #[test]
    fn test_return_value_rules() {
        assert_eq!(
            analyze("void f() { return 1; } int main() { return 0; }").unwrap_err(),
            SemanticError::ReturnValueInVoid
        );
        assert_eq!(
            analyze("int main() { return; }").unwrap_err(),
            SemanticError::MissingReturnValue
        );
    }

    #[test]
    fn test_not_all_paths_return() {
        let err = analyze("int main() { if (1) { return 1; } }").unwrap_err();
        assert_eq!(
            err,
            SemanticError::NotAllPathsReturn {
                name: "main".to_string()
            }
        );
        // Both branches return: accepted
        assert!(analyze("int main() { if (1) { return 1; } else { return 2; } }").is_ok());
        // A while loop never counts as returning
        let err = analyze("int main() { while (1) { return 1; } }").unwrap_err();
        assert_eq!(
            err,
            SemanticError::NotAllPathsReturn {
                name: "main".to_string()
            }
        );
    }

    #[test]
    fn test_declaration_visible_to_own_initializer() {
        // Single-pass declaration order: the name resolves to itself
        assert!(analyze("int main() { int x = x; return x; }").is_ok());
    }
}
