//! Toy C Lexer
//!
//! Tokenizes toy C source code into a stream of tokens.
//! Handles keywords, operators, integer literals, identifiers, and
//! comments.

use serde::{Deserialize, Serialize};
use std::fmt;
use toycc_common::{CompilerError, SourceLocation};

/// Token types for the toy C subset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenType {
    // Literals
    IntLiteral(i32),

    // Identifiers
    Identifier(String),

    // Keywords
    Int,
    Void,
    If,
    Else,
    While,
    Break,
    Continue,
    Return,

    // Operators
    Plus,    // +
    Minus,   // -
    Star,    // *
    Slash,   // /
    Percent, // %
    Bang,    // !
    Equal,   // =
    Less,    // <
    Greater, // >

    // Compound operators
    LessEqual,          // <=
    GreaterEqual,       // >=
    EqualEqual,         // ==
    BangEqual,          // !=
    AmpersandAmpersand, // &&
    PipePipe,           // ||

    // Delimiters
    LeftParen,  // (
    RightParen, // )
    LeftBrace,  // {
    RightBrace, // }
    Semicolon,  // ;
    Comma,      // ,

    // Special
    EndOfFile,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::IntLiteral(value) => write!(f, "integer literal {}", value),
            TokenType::Identifier(name) => write!(f, "identifier '{}'", name),
            TokenType::Int => write!(f, "'int'"),
            TokenType::Void => write!(f, "'void'"),
            TokenType::If => write!(f, "'if'"),
            TokenType::Else => write!(f, "'else'"),
            TokenType::While => write!(f, "'while'"),
            TokenType::Break => write!(f, "'break'"),
            TokenType::Continue => write!(f, "'continue'"),
            TokenType::Return => write!(f, "'return'"),
            TokenType::Plus => write!(f, "'+'"),
            TokenType::Minus => write!(f, "'-'"),
            TokenType::Star => write!(f, "'*'"),
            TokenType::Slash => write!(f, "'/'"),
            TokenType::Percent => write!(f, "'%'"),
            TokenType::Bang => write!(f, "'!'"),
            TokenType::Equal => write!(f, "'='"),
            TokenType::Less => write!(f, "'<'"),
            TokenType::Greater => write!(f, "'>'"),
            TokenType::LessEqual => write!(f, "'<='"),
            TokenType::GreaterEqual => write!(f, "'>='"),
            TokenType::EqualEqual => write!(f, "'=='"),
            TokenType::BangEqual => write!(f, "'!='"),
            TokenType::AmpersandAmpersand => write!(f, "'&&'"),
            TokenType::PipePipe => write!(f, "'||'"),
            TokenType::LeftParen => write!(f, "'('"),
            TokenType::RightParen => write!(f, "')'"),
            TokenType::LeftBrace => write!(f, "'{{'"),
            TokenType::RightBrace => write!(f, "'}}'"),
            TokenType::Semicolon => write!(f, "';'"),
            TokenType::Comma => write!(f, "','"),
            TokenType::EndOfFile => write!(f, "end of file"),
        }
    }
}

/// A token with its source location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub token_type: TokenType,
    pub location: SourceLocation,
}

impl Token {
    pub fn new(token_type: TokenType, location: SourceLocation) -> Self {
        Self {
            token_type,
            location,
        }
    }
}

fn keyword_or_identifier(word: &str) -> TokenType {
    match word {
        "int" => TokenType::Int,
        "void" => TokenType::Void,
        "if" => TokenType::If,
        "else" => TokenType::Else,
        "while" => TokenType::While,
        "break" => TokenType::Break,
        "continue" => TokenType::Continue,
        "return" => TokenType::Return,
        _ => TokenType::Identifier(word.to_string()),
    }
}

/// Toy C lexer
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    /// Skip whitespace and comments; errors on an unterminated block comment
    fn skip_trivia(&mut self) -> Result<(), CompilerError> {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while let Some(ch) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_next() == Some('*') => {
                    let start = self.location();
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            Some('*') if self.peek_next() == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(_) => {
                                self.advance();
                            }
                            None => {
                                return Err(CompilerError::lex_error(
                                    "unterminated block comment".to_string(),
                                    start,
                                ));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn lex_number(&mut self) -> Result<TokenType, CompilerError> {
        let start = self.location();
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        text.parse::<i32>()
            .map(TokenType::IntLiteral)
            .map_err(|_| {
                CompilerError::lex_error(format!("integer literal out of range: {}", text), start)
            })
    }

    fn lex_word(&mut self) -> TokenType {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        keyword_or_identifier(&text)
    }

    fn lex_operator(&mut self) -> Result<TokenType, CompilerError> {
        let location = self.location();
        let ch = self.advance().ok_or_else(|| {
            CompilerError::lex_error("unexpected end of input".to_string(), location)
        })?;
        let token = match ch {
            '+' => TokenType::Plus,
            '-' => TokenType::Minus,
            '*' => TokenType::Star,
            '/' => TokenType::Slash,
            '%' => TokenType::Percent,
            '(' => TokenType::LeftParen,
            ')' => TokenType::RightParen,
            '{' => TokenType::LeftBrace,
            '}' => TokenType::RightBrace,
            ';' => TokenType::Semicolon,
            ',' => TokenType::Comma,
            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                }
            }
            '&' => {
                if self.peek() == Some('&') {
                    self.advance();
                    TokenType::AmpersandAmpersand
                } else {
                    return Err(CompilerError::lex_error(
                        "unexpected character '&' (did you mean '&&'?)".to_string(),
                        location,
                    ));
                }
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.advance();
                    TokenType::PipePipe
                } else {
                    return Err(CompilerError::lex_error(
                        "unexpected character '|' (did you mean '||'?)".to_string(),
                        location,
                    ));
                }
            }
            other => {
                return Err(CompilerError::lex_error(
                    format!("unexpected character '{}'", other),
                    location,
                ));
            }
        };
        Ok(token)
    }

    /// Tokenize the whole input, ending with an `EndOfFile` token
    pub fn tokenize(&mut self) -> Result<Vec<Token>, CompilerError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let location = self.location();
            match self.peek() {
                None => {
                    tokens.push(Token::new(TokenType::EndOfFile, location));
                    return Ok(tokens);
                }
                Some(ch) if ch.is_ascii_digit() => {
                    let token_type = self.lex_number()?;
                    tokens.push(Token::new(token_type, location));
                }
                Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {
                    let token_type = self.lex_word();
                    tokens.push(Token::new(token_type, location));
                }
                Some(_) => {
                    let token_type = self.lex_operator()?;
                    tokens.push(Token::new(token_type, location));
                }
            }
        }
    }
}
