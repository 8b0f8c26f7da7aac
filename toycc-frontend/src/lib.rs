//! Toy C Compiler - Frontend
//!
//! This crate provides the frontend components for the toy C compiler:
//! - Lexer: tokenizes toy C source code
//! - Parser: builds an AST from tokens
//! - AST: abstract syntax tree definitions
//! - Semantic analysis: symbol resolution and static checks

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod semantic;

pub use ast::{
    BinaryOp, Expression, ExpressionKind, Function, NodeIdGenerator, Statement, StatementKind,
    TranslationUnit, Type, UnaryOp,
};
pub use lexer::{Lexer, Token, TokenType};
pub use parser::{ParseError, Parser};
pub use semantic::{SemanticAnalyzer, SemanticError};

use toycc_common::{CompilerError, FunctionInfo};

/// High-level frontend interface
pub struct Frontend;

impl Frontend {
    /// Parse toy C source code into an AST
    pub fn parse_source(source: &str) -> Result<TranslationUnit, CompilerError> {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize()?;

        let mut parser = Parser::new(tokens);
        let unit = parser.parse_translation_unit()?;

        Ok(unit)
    }

    /// Parse and analyze toy C source code, returning the AST together
    /// with the per-function symbol tables
    pub fn analyze_source(source: &str) -> Result<(TranslationUnit, Vec<FunctionInfo>), CompilerError> {
        let unit = Self::parse_source(source)?;
        let infos = SemanticAnalyzer::new().analyze(&unit)?;
        Ok((unit, infos))
    }

    /// Tokenize source code (for debugging)
    pub fn tokenize_source(source: &str) -> Result<Vec<Token>, CompilerError> {
        let mut lexer = Lexer::new(source);
        lexer.tokenize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frontend_parse_simple_function() {
        let source = r#"
int main() {
    return 42;
}
"#;

        let unit = Frontend::parse_source(source).unwrap();
        assert_eq!(unit.functions.len(), 1);
        assert_eq!(unit.functions[0].name, "main");
        assert_eq!(unit.functions[0].return_type, Type::Int);
    }

    #[test]
    fn test_frontend_analyze() {
        let source = r#"
int add(int a, int b) {
    int result = a + b;
    return result;
}

int main() {
    return add(2, 3);
}
"#;

        let (unit, infos) = Frontend::analyze_source(source).unwrap();
        assert_eq!(unit.functions.len(), 2);
        assert_eq!(infos[0].name, "add");
        assert_eq!(infos[0].num_locals, 1);
        assert_eq!(infos[1].name, "main");
    }

    #[test]
    fn test_frontend_error_conversion() {
        let err = Frontend::analyze_source("int main() { return x; }").unwrap_err();
        assert!(matches!(err, CompilerError::SemanticError { .. }));
        assert!(format!("{}", err).contains("undeclared"));
    }
}
