//! Token types for the constraint expression lexer

/// Token types for the lexer
#[derive(Debug, PartialEq, Clone, Eq)]
pub enum TokenType {
    // Literals
    StringLiteral,
    NumberLiteral,
    BooleanLiteral,

    // Identifiers
    Identifier,
    DelimitedIdentifier,

    // Keywords
    As,
    Is,
    Div,
    Mod,
    In,
    Contains,
    And,
    Or,
    Xor,
    Implies,
    This,  // $this
    Index, // $index

    // External constant
    ExternalConstant, // %identifier or %'string'

    // Operators
    Dot,                // .
    OpenBracket,        // [
    CloseBracket,       // ]
    Plus,               // +
    Minus,              // -
    Multiply,           // *
    Divide,             // /
    Ampersand,          // &
    Pipe,               // |
    LessThanOrEqual,    // <=
    LessThan,           // <
    GreaterThanOrEqual, // >=
    GreaterThan,        // >
    Equal,              // =
    Equivalent,         // ~
    NotEqual,           // !=
    NotEquivalent,      // !~

    // Delimiters
    OpenParen,  // (
    CloseParen, // )
    OpenBrace,  // {
    CloseBrace, // }
    Comma,      // ,

    // End of input
    Eof,

    // Syntax error; the message is in `Token::value`
    Error,
}

impl TokenType {
    /// Keywords that may still name a member or function after a dot
    /// (`x.contains('a')`, `descendants().as(uri)`).
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenType::As
                | TokenType::Is
                | TokenType::Div
                | TokenType::Mod
                | TokenType::In
                | TokenType::Contains
                | TokenType::And
                | TokenType::Or
                | TokenType::Xor
                | TokenType::Implies
        )
    }
}

/// A token in an expression
#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub value: String,
    pub position: usize,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(
        token_type: TokenType,
        value: String,
        position: usize,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            token_type,
            value,
            position,
            line,
            column,
        }
    }

    pub fn eof(position: usize, line: usize, column: usize) -> Self {
        Self {
            token_type: TokenType::Eof,
            value: String::new(),
            position,
            line,
            column,
        }
    }

    pub fn error(message: String, position: usize, line: usize, column: usize) -> Self {
        Self {
            token_type: TokenType::Error,
            value: message,
            position,
            line,
            column,
        }
    }
}
