//! Toy C Recursive Descent Parser
//!
//! Parses the token stream into an Abstract Syntax Tree. Precedence
//! climbing handles expressions; statements and function definitions are
//! parsed by one dedicated method each.

use crate::ast::*;
use crate::lexer::{Token, TokenType};
use std::collections::VecDeque;
use toycc_common::{CompilerError, SourceLocation};

/// Parse error types specific to the parser
#[derive(Debug, Clone)]
pub enum ParseError {
    UnexpectedToken { expected: String, found: Token },
    UnexpectedEndOfFile { expected: String },
}

impl From<ParseError> for CompilerError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::UnexpectedToken { expected, found } => CompilerError::parse_error(
                format!("expected {}, found {}", expected, found.token_type),
                found.location,
            ),
            ParseError::UnexpectedEndOfFile { expected } => CompilerError::parse_error(
                format!("unexpected end of file, expected {}", expected),
                SourceLocation::dummy(),
            ),
        }
    }
}

/// Toy C parser
pub struct Parser {
    tokens: VecDeque<Token>,
    node_id_gen: NodeIdGenerator,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into(),
            node_id_gen: NodeIdGenerator::new(),
        }
    }

    /// Peek at the current token without consuming
    fn peek(&self) -> Option<&Token> {
        self.tokens.front()
    }

    /// Peek one token past the current one
    fn peek_second(&self) -> Option<&Token> {
        self.tokens.get(1)
    }

    /// Source line of the current token
    fn current_line(&self) -> u32 {
        self.peek().map(|t| t.location.line).unwrap_or(0)
    }

    /// Get current token and advance
    fn advance(&mut self) -> Option<Token> {
        self.tokens.pop_front()
    }

    /// Check if the current token matches the given type (by variant)
    fn check(&self, token_type: &TokenType) -> bool {
        match self.peek() {
            Some(token) => {
                std::mem::discriminant(&token.token_type) == std::mem::discriminant(token_type)
            }
            None => false,
        }
    }

    /// Consume the current token if it matches the given type
    fn match_token(&mut self, token_type: &TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Expect and consume a specific token type
    fn expect(&mut self, token_type: TokenType, context: &str) -> Result<Token, ParseError> {
        match self.advance() {
            Some(token) => {
                if std::mem::discriminant(&token.token_type) == std::mem::discriminant(&token_type)
                {
                    Ok(token)
                } else {
                    Err(ParseError::UnexpectedToken {
                        expected: format!("{} in {}", token_type, context),
                        found: token,
                    })
                }
            }
            None => Err(ParseError::UnexpectedEndOfFile {
                expected: format!("{} in {}", token_type, context),
            }),
        }
    }

    /// Expect and consume an identifier, returning its name
    fn expect_identifier(&mut self, context: &str) -> Result<String, ParseError> {
        let token = self.expect(TokenType::Identifier(String::new()), context)?;
        match token.token_type {
            TokenType::Identifier(name) => Ok(name),
            _ => unreachable!("expect() matched an identifier"),
        }
    }

    fn expression(&mut self, kind: ExpressionKind, line: u32) -> Expression {
        Expression {
            node_id: self.node_id_gen.next(),
            kind,
            line,
        }
    }

    fn statement(&mut self, kind: StatementKind, line: u32) -> Statement {
        Statement {
            node_id: self.node_id_gen.next(),
            kind,
            line,
        }
    }

    /// Parse a whole translation unit: a sequence of function definitions
    pub fn parse_translation_unit(&mut self) -> Result<TranslationUnit, ParseError> {
        let mut functions = Vec::new();
        while !self.check(&TokenType::EndOfFile) && self.peek().is_some() {
            functions.push(self.parse_function()?);
        }
        Ok(TranslationUnit { functions })
    }

    /// funcdef := ("int" | "void") ident "(" params? ")" block
    fn parse_function(&mut self) -> Result<Function, ParseError> {
        let line = self.current_line();
        let return_type = if self.match_token(&TokenType::Void) {
            Type::Void
        } else {
            self.expect(TokenType::Int, "function definition")?;
            Type::Int
        };
        let name = self.expect_identifier("function definition")?;
        self.expect(TokenType::LeftParen, "function definition")?;

        let mut parameters = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                self.expect(TokenType::Int, "parameter list")?;
                parameters.push(self.expect_identifier("parameter list")?);
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenType::RightParen, "function definition")?;

        let body = self.parse_block()?;
        Ok(Function {
            node_id: self.node_id_gen.next(),
            name,
            return_type,
            parameters,
            body,
            line,
        })
    }

    /// block := "{" stmt* "}"
    fn parse_block(&mut self) -> Result<Statement, ParseError> {
        let line = self.current_line();
        self.expect(TokenType::LeftBrace, "block")?;
        let mut statements = Vec::new();
        while !self.check(&TokenType::RightBrace) {
            if self.check(&TokenType::EndOfFile) || self.peek().is_none() {
                return Err(ParseError::UnexpectedEndOfFile {
                    expected: "'}' closing block".to_string(),
                });
            }
            statements.push(self.parse_statement()?);
        }
        self.expect(TokenType::RightBrace, "block")?;
        Ok(self.statement(StatementKind::Block(statements), line))
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let line = self.current_line();
        match self.peek().map(|t| &t.token_type) {
            Some(TokenType::LeftBrace) => self.parse_block(),
            Some(TokenType::Semicolon) => {
                self.advance();
                Ok(self.statement(StatementKind::Empty, line))
            }
            Some(TokenType::Int) => {
                self.advance();
                let name = self.expect_identifier("declaration")?;
                self.expect(TokenType::Equal, "declaration")?;
                let init = self.parse_expression()?;
                self.expect(TokenType::Semicolon, "declaration")?;
                Ok(self.statement(StatementKind::Declare { name, init }, line))
            }
            Some(TokenType::If) => {
                self.advance();
                self.expect(TokenType::LeftParen, "if statement")?;
                let condition = self.parse_expression()?;
                self.expect(TokenType::RightParen, "if statement")?;
                let then_stmt = Box::new(self.parse_statement()?);
                let else_stmt = if self.match_token(&TokenType::Else) {
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(self.statement(
                    StatementKind::If {
                        condition,
                        then_stmt,
                        else_stmt,
                    },
                    line,
                ))
            }
            Some(TokenType::While) => {
                self.advance();
                self.expect(TokenType::LeftParen, "while statement")?;
                let condition = self.parse_expression()?;
                self.expect(TokenType::RightParen, "while statement")?;
                let body = Box::new(self.parse_statement()?);
                Ok(self.statement(StatementKind::While { condition, body }, line))
            }
            Some(TokenType::Break) => {
                self.advance();
                self.expect(TokenType::Semicolon, "break statement")?;
                Ok(self.statement(StatementKind::Break, line))
            }
            Some(TokenType::Continue) => {
                self.advance();
                self.expect(TokenType::Semicolon, "continue statement")?;
                Ok(self.statement(StatementKind::Continue, line))
            }
            Some(TokenType::Return) => {
                self.advance();
                let value = if self.check(&TokenType::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect(TokenType::Semicolon, "return statement")?;
                Ok(self.statement(StatementKind::Return(value), line))
            }
            Some(TokenType::Identifier(_))
                if matches!(
                    self.peek_second().map(|t| &t.token_type),
                    Some(TokenType::Equal)
                ) =>
            {
                let name = self.expect_identifier("assignment")?;
                self.expect(TokenType::Equal, "assignment")?;
                let value = self.parse_expression()?;
                self.expect(TokenType::Semicolon, "assignment")?;
                Ok(self.statement(StatementKind::Assign { name, value }, line))
            }
            _ => {
                let expr = self.parse_expression()?;
                self.expect(TokenType::Semicolon, "expression statement")?;
                Ok(self.statement(StatementKind::Expression(expr), line))
            }
        }
    }

    /// expr := logical_or
    pub fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_logical_or()
    }

    fn parse_logical_or(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_logical_and()?;
        while self.check(&TokenType::PipePipe) {
            let line = self.current_line();
            self.advance();
            let right = self.parse_logical_and()?;
            expr = self.expression(
                ExpressionKind::Binary {
                    op: BinaryOp::LogicalOr,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                line,
            );
        }
        Ok(expr)
    }

    fn parse_logical_and(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_equality()?;
        while self.check(&TokenType::AmpersandAmpersand) {
            let line = self.current_line();
            self.advance();
            let right = self.parse_equality()?;
            expr = self.expression(
                ExpressionKind::Binary {
                    op: BinaryOp::LogicalAnd,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                line,
            );
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_relational()?;
        loop {
            let op = match self.peek().map(|t| &t.token_type) {
                Some(TokenType::EqualEqual) => BinaryOp::Equal,
                Some(TokenType::BangEqual) => BinaryOp::NotEqual,
                _ => break,
            };
            let line = self.current_line();
            self.advance();
            let right = self.parse_relational()?;
            expr = self.expression(
                ExpressionKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                line,
            );
        }
        Ok(expr)
    }

    fn parse_relational(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_additive()?;
        loop {
            let op = match self.peek().map(|t| &t.token_type) {
                Some(TokenType::Less) => BinaryOp::Less,
                Some(TokenType::Greater) => BinaryOp::Greater,
                Some(TokenType::LessEqual) => BinaryOp::LessEqual,
                Some(TokenType::GreaterEqual) => BinaryOp::GreaterEqual,
                _ => break,
            };
            let line = self.current_line();
            self.advance();
            let right = self.parse_additive()?;
            expr = self.expression(
                ExpressionKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                line,
            );
        }
        Ok(expr)
    }

    fn parse_additive(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().map(|t| &t.token_type) {
                Some(TokenType::Plus) => BinaryOp::Add,
                Some(TokenType::Minus) => BinaryOp::Sub,
                _ => break,
            };
            let line = self.current_line();
            self.advance();
            let right = self.parse_multiplicative()?;
            expr = self.expression(
                ExpressionKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                line,
            );
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.peek().map(|t| &t.token_type) {
                Some(TokenType::Star) => BinaryOp::Mul,
                Some(TokenType::Slash) => BinaryOp::Div,
                Some(TokenType::Percent) => BinaryOp::Mod,
                _ => break,
            };
            let line = self.current_line();
            self.advance();
            let right = self.parse_unary()?;
            expr = self.expression(
                ExpressionKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                line,
            );
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        let op = match self.peek().map(|t| &t.token_type) {
            Some(TokenType::Plus) => Some(UnaryOp::Plus),
            Some(TokenType::Minus) => Some(UnaryOp::Minus),
            Some(TokenType::Bang) => Some(UnaryOp::LogicalNot),
            _ => None,
        };
        if let Some(op) = op {
            let line = self.current_line();
            self.advance();
            let operand = Box::new(self.parse_unary()?);
            return Ok(self.expression(ExpressionKind::Unary { op, operand }, line));
        }
        self.parse_primary()
    }

    /// primary := literal | ident | ident "(" args? ")" | "(" expr ")"
    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        let line = self.current_line();
        match self.advance() {
            Some(token) => match token.token_type {
                TokenType::IntLiteral(value) => {
                    Ok(self.expression(ExpressionKind::IntLiteral(value), line))
                }
                TokenType::Identifier(name) => {
                    if self.match_token(&TokenType::LeftParen) {
                        let mut arguments = Vec::new();
                        if !self.check(&TokenType::RightParen) {
                            loop {
                                arguments.push(self.parse_expression()?);
                                if !self.match_token(&TokenType::Comma) {
                                    break;
                                }
                            }
                        }
                        self.expect(TokenType::RightParen, "call expression")?;
                        Ok(self.expression(
                            ExpressionKind::Call {
                                callee: name,
                                arguments,
                            },
                            line,
                        ))
                    } else {
                        Ok(self.expression(ExpressionKind::Identifier(name), line))
                    }
                }
                TokenType::LeftParen => {
                    let expr = self.parse_expression()?;
                    self.expect(TokenType::RightParen, "parenthesized expression")?;
                    Ok(expr)
                }
                _ => Err(ParseError::UnexpectedToken {
                    expected: "expression".to_string(),
                    found: token,
                }),
            },
            None => Err(ParseError::UnexpectedEndOfFile {
                expected: "expression".to_string(),
            }),
        }
    }
}
