//! Error handling for the toy C compiler
//!
//! This module defines the cross-phase error type. Each phase has its own
//! error enum (parse errors in the frontend, semantic errors in the
//! analyzer, internal errors in codegen) that converts into
//! `CompilerError` at the phase boundary; the driver turns the final
//! error into one diagnostic line and a nonzero exit status.

use crate::source_loc::SourceLocation;
use thiserror::Error;

/// Main compiler error type that encompasses all phases of compilation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompilerError {
    #[error("lexical error at {location}: {message}")]
    LexError {
        location: SourceLocation,
        message: String,
    },

    #[error("parse error at {location}: {message}")]
    ParseError {
        location: SourceLocation,
        message: String,
    },

    #[error("semantic error: {message}")]
    SemanticError { message: String },

    #[error("code generation error: {message}")]
    CodegenError { message: String },

    #[error("I/O error: {message}")]
    IoError { message: String },

    #[error("internal compiler error: {message}")]
    InternalError { message: String },
}

impl CompilerError {
    pub fn lex_error(message: String, location: SourceLocation) -> Self {
        CompilerError::LexError { location, message }
    }

    pub fn parse_error(message: String, location: SourceLocation) -> Self {
        CompilerError::ParseError { location, message }
    }

    pub fn semantic_error(message: String) -> Self {
        CompilerError::SemanticError { message }
    }

    pub fn codegen_error(message: String) -> Self {
        CompilerError::CodegenError { message }
    }
}

impl From<std::io::Error> for CompilerError {
    fn from(err: std::io::Error) -> Self {
        CompilerError::IoError {
            message: err.to_string(),
        }
    }
}
