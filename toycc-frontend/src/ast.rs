//! Abstract Syntax Tree definitions for the toy C subset
//!
//! This module defines the AST nodes for the supported language:
//! functions over `int`/`void`, integer expressions, and structured
//! control flow. The tree is built by the parser, annotated (externally,
//! by node id) during semantic analysis, rewritten by the optimizer, and
//! lowered by code generation.

use serde::{Deserialize, Serialize};
use std::fmt;
use toycc_common::NodeId;

pub use toycc_common::Type;

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Plus,
    Minus,
    LogicalNot,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op_str = match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::LogicalNot => "!",
        };
        write!(f, "{}", op_str)
    }
}

/// Binary operators
///
/// `LeftShift` has no surface syntax; it is introduced by the strength
/// reduction pass when a multiplication by a power of two is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    LeftShift,

    // Comparison
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,

    // Logical (short-circuit)
    LogicalAnd,
    LogicalOr,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op_str = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::LeftShift => "<<",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::LessEqual => "<=",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
        };
        write!(f, "{}", op_str)
    }
}

/// AST expression node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub node_id: NodeId,
    pub kind: ExpressionKind,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpressionKind {
    /// Integer literal
    IntLiteral(i32),

    /// Identifier reference (resolved offset recorded by node id)
    Identifier(String),

    /// Unary operation
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },

    /// Binary operation
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// Function call
    Call {
        callee: String,
        arguments: Vec<Expression>,
    },
}

impl Expression {
    /// The literal value, if this expression is a bare integer constant
    pub fn as_constant(&self) -> Option<i32> {
        match self.kind {
            ExpressionKind::IntLiteral(value) => Some(value),
            _ => None,
        }
    }

    /// Whether any function call appears in this expression tree
    pub fn contains_call(&self) -> bool {
        match &self.kind {
            ExpressionKind::IntLiteral(_) | ExpressionKind::Identifier(_) => false,
            ExpressionKind::Unary { operand, .. } => operand.contains_call(),
            ExpressionKind::Binary { left, right, .. } => {
                left.contains_call() || right.contains_call()
            }
            ExpressionKind::Call { .. } => true,
        }
    }
}

/// AST statement node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub node_id: NodeId,
    pub kind: StatementKind,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatementKind {
    /// Block statement (introduces a lexical scope)
    Block(Vec<Statement>),

    /// Empty statement (bare semicolon)
    Empty,

    /// Expression statement
    Expression(Expression),

    /// Assignment to an already-declared variable
    Assign { name: String, value: Expression },

    /// Variable declaration with mandatory initializer
    Declare { name: String, init: Expression },

    /// If statement
    If {
        condition: Expression,
        then_stmt: Box<Statement>,
        else_stmt: Option<Box<Statement>>,
    },

    /// While loop
    While {
        condition: Expression,
        body: Box<Statement>,
    },

    /// Break statement
    Break,

    /// Continue statement
    Continue,

    /// Return statement with optional value
    Return(Option<Expression>),
}

/// Function definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub node_id: NodeId,
    pub name: String,
    pub return_type: Type,
    /// Parameter names in order; all parameters are `int`
    pub parameters: Vec<String>,
    pub body: Statement,
    pub line: u32,
}

/// Top-level compilation unit: an ordered list of function definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub functions: Vec<Function>,
}

/// Node ID generator for AST nodes
#[derive(Debug, Clone, Default)]
pub struct NodeIdGenerator {
    next_id: NodeId,
}

impl NodeIdGenerator {
    pub fn new() -> Self {
        Self { next_id: 0 }
    }

    /// Resume id assignment above every id already present in the unit.
    /// Used by passes that synthesize nodes after parsing.
    pub fn resuming_after(unit: &TranslationUnit) -> Self {
        fn max_expr(e: &Expression, max: &mut NodeId) {
            *max = (*max).max(e.node_id);
            match &e.kind {
                ExpressionKind::Unary { operand, .. } => max_expr(operand, max),
                ExpressionKind::Binary { left, right, .. } => {
                    max_expr(left, max);
                    max_expr(right, max);
                }
                ExpressionKind::Call { arguments, .. } => {
                    for arg in arguments {
                        max_expr(arg, max);
                    }
                }
                _ => {}
            }
        }
        fn max_stmt(s: &Statement, max: &mut NodeId) {
            *max = (*max).max(s.node_id);
            match &s.kind {
                StatementKind::Block(stmts) => {
                    for sub in stmts {
                        max_stmt(sub, max);
                    }
                }
                StatementKind::Expression(e)
                | StatementKind::Assign { value: e, .. }
                | StatementKind::Declare { init: e, .. } => max_expr(e, max),
                StatementKind::If {
                    condition,
                    then_stmt,
                    else_stmt,
                } => {
                    max_expr(condition, max);
                    max_stmt(then_stmt, max);
                    if let Some(else_stmt) = else_stmt {
                        max_stmt(else_stmt, max);
                    }
                }
                StatementKind::While { condition, body } => {
                    max_expr(condition, max);
                    max_stmt(body, max);
                }
                StatementKind::Return(Some(e)) => max_expr(e, max),
                _ => {}
            }
        }

        let mut max = 0;
        for func in &unit.functions {
            max = max.max(func.node_id);
            max_stmt(&func.body, &mut max);
        }
        Self { next_id: max + 1 }
    }

    pub fn next(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}
