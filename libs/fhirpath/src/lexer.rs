//! Lexer for constraint expressions
//!
//! Converts an expression string into a stream of tokens. Comments (`//` and
//! `/* */`) and whitespace are skipped; errors surface as `TokenType::Error`
//! tokens carrying the message so the parser can report a position.

use crate::error::{Error, Result};
use crate::token::{Token, TokenType};

pub struct Lexer {
    position: usize,
    line: usize,
    column: usize,
    chars: Vec<char>,
    current_char: Option<char>,
}

impl Lexer {
    pub fn new(input: String) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Self {
            position: 0,
            line: 1,
            column: 1,
            chars,
            current_char,
        }
    }

    fn advance(&mut self) {
        if let Some(c) = self.current_char {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.position += 1;
        self.current_char = self.chars.get(self.position).copied();
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current_char, Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    /// Skip a `//` or `/* */` comment starting at the current position.
    fn skip_comment(&mut self) -> Result<()> {
        if self.peek() == Some('/') {
            while let Some(c) = self.current_char {
                self.advance();
                if c == '\n' {
                    break;
                }
            }
            return Ok(());
        }

        self.advance(); // '/'
        self.advance(); // '*'
        while let Some(c) = self.current_char {
            if c == '*' && self.peek() == Some('/') {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }
        Err(Error::ParseError("Unterminated block comment".into()))
    }

    fn read_identifier(&mut self) -> String {
        let start_pos = self.position;
        while matches!(self.current_char, Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        self.chars[start_pos..self.position].iter().collect()
    }

    /// Read the character after a backslash, including `\uXXXX`.
    fn read_escape(&mut self) -> Result<char> {
        self.advance(); // '\'
        let Some(escaped) = self.current_char else {
            return Err(Error::ParseError("Incomplete escape sequence".into()));
        };
        self.advance();
        let c = match escaped {
            'f' => '\x0C',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'u' => {
                let mut hex = String::new();
                for _ in 0..4 {
                    match self.current_char {
                        Some(h) if h.is_ascii_hexdigit() => {
                            hex.push(h);
                            self.advance();
                        }
                        _ => {
                            return Err(Error::ParseError(
                                "Invalid unicode escape sequence".into(),
                            ))
                        }
                    }
                }
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| Error::ParseError("Invalid unicode code point".into()))?;
                char::from_u32(code)
                    .ok_or_else(|| Error::ParseError("Invalid unicode character".into()))?
            }
            other => other,
        };
        Ok(c)
    }

    /// Read text enclosed in `delimiter` (`'string'` or `` `identifier` ``).
    /// A doubled delimiter stands for itself.
    fn read_delimited(&mut self, delimiter: char) -> Result<String> {
        self.advance(); // opening delimiter

        let mut value = String::new();
        while let Some(c) = self.current_char {
            if c == delimiter {
                if self.peek() == Some(delimiter) {
                    value.push(delimiter);
                    self.advance();
                    self.advance();
                } else {
                    self.advance();
                    return Ok(value);
                }
            } else if c == '\\' {
                value.push(self.read_escape()?);
            } else {
                value.push(c);
                self.advance();
            }
        }

        Err(Error::ParseError(if delimiter == '`' {
            "Unterminated delimited identifier".into()
        } else {
            "Unterminated string literal".into()
        }))
    }

    /// Read an integer or decimal. A dot is only part of the number when a
    /// digit follows, so `1.exists()` lexes as `1` `.` `exists`.
    fn read_number(&mut self) -> String {
        let start_pos = self.position;
        while matches!(self.current_char, Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        if self.current_char == Some('.') && self.peek().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
            while matches!(self.current_char, Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        self.chars[start_pos..self.position].iter().collect()
    }

    /// Produce the next token. After the end of input every call returns
    /// `Eof`.
    pub fn next_token(&mut self) -> Token {
        loop {
            self.skip_whitespace();
            let is_comment = self.current_char == Some('/')
                && matches!(self.peek(), Some('/') | Some('*'));
            if !is_comment {
                break;
            }
            if let Err(e) = self.skip_comment() {
                return Token::error(e.to_string(), self.position, self.line, self.column);
            }
        }

        let position = self.position;
        let line = self.line;
        let column = self.column;
        let token = |token_type: TokenType, value: &str| {
            Token::new(token_type, value.to_string(), position, line, column)
        };

        let Some(c) = self.current_char else {
            return Token::eof(position, line, column);
        };

        let simple = match c {
            '.' => Some(TokenType::Dot),
            '[' => Some(TokenType::OpenBracket),
            ']' => Some(TokenType::CloseBracket),
            '(' => Some(TokenType::OpenParen),
            ')' => Some(TokenType::CloseParen),
            '{' => Some(TokenType::OpenBrace),
            '}' => Some(TokenType::CloseBrace),
            ',' => Some(TokenType::Comma),
            '+' => Some(TokenType::Plus),
            '-' => Some(TokenType::Minus),
            '*' => Some(TokenType::Multiply),
            '/' => Some(TokenType::Divide),
            '&' => Some(TokenType::Ampersand),
            '|' => Some(TokenType::Pipe),
            '=' => Some(TokenType::Equal),
            '~' => Some(TokenType::Equivalent),
            _ => None,
        };
        if let Some(token_type) = simple {
            self.advance();
            return token(token_type, &c.to_string());
        }

        match c {
            '<' | '>' => {
                self.advance();
                let or_equal = self.current_char == Some('=');
                if or_equal {
                    self.advance();
                }
                match (c, or_equal) {
                    ('<', true) => token(TokenType::LessThanOrEqual, "<="),
                    ('<', false) => token(TokenType::LessThan, "<"),
                    (_, true) => token(TokenType::GreaterThanOrEqual, ">="),
                    (_, false) => token(TokenType::GreaterThan, ">"),
                }
            }
            '!' => {
                self.advance();
                match self.current_char {
                    Some('=') => {
                        self.advance();
                        token(TokenType::NotEqual, "!=")
                    }
                    Some('~') => {
                        self.advance();
                        token(TokenType::NotEquivalent, "!~")
                    }
                    _ => token(TokenType::Error, "Unexpected '!' character"),
                }
            }
            '%' => {
                self.advance();
                let name = match self.current_char {
                    Some('\'') => self.read_delimited('\''),
                    Some('`') => self.read_delimited('`'),
                    _ => Ok(self.read_identifier()),
                };
                match name {
                    Ok(name) if !name.is_empty() => token(TokenType::ExternalConstant, &name),
                    Ok(_) => token(TokenType::Error, "Expected a name after '%'"),
                    Err(e) => token(TokenType::Error, &e.to_string()),
                }
            }
            '$' => {
                self.advance();
                let ident = self.read_identifier();
                match ident.as_str() {
                    "this" => token(TokenType::This, "$this"),
                    "index" => token(TokenType::Index, "$index"),
                    _ => token(TokenType::Error, &format!("Unknown variable: ${}", ident)),
                }
            }
            '\'' => match self.read_delimited('\'') {
                Ok(value) => token(TokenType::StringLiteral, &value),
                Err(e) => token(TokenType::Error, &e.to_string()),
            },
            '`' => match self.read_delimited('`') {
                Ok(value) => token(TokenType::DelimitedIdentifier, &value),
                Err(e) => token(TokenType::Error, &e.to_string()),
            },
            '@' => token(
                TokenType::Error,
                "Date/time literals are not supported in constraint expressions",
            ),
            _ if c.is_ascii_digit() => {
                let value = self.read_number();
                token(TokenType::NumberLiteral, &value)
            }
            _ if c.is_alphabetic() || c == '_' => {
                let ident = self.read_identifier();
                let token_type = match ident.as_str() {
                    "true" | "false" => TokenType::BooleanLiteral,
                    "as" => TokenType::As,
                    "is" => TokenType::Is,
                    "div" => TokenType::Div,
                    "mod" => TokenType::Mod,
                    "in" => TokenType::In,
                    "contains" => TokenType::Contains,
                    "and" => TokenType::And,
                    "or" => TokenType::Or,
                    "xor" => TokenType::Xor,
                    "implies" => TokenType::Implies,
                    _ => TokenType::Identifier,
                };
                token(token_type, &ident)
            }
            _ => {
                self.advance();
                token(TokenType::Error, &format!("Unexpected character: {}", c))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input.to_string());
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let done = matches!(token.token_type, TokenType::Eof | TokenType::Error);
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    fn types(input: &str) -> Vec<TokenType> {
        tokenize(input).into_iter().map(|t| t.token_type).collect()
    }

    #[test]
    fn test_path_navigation() {
        assert_eq!(
            types("contained.meta.versionId"),
            vec![
                TokenType::Identifier,
                TokenType::Dot,
                TokenType::Identifier,
                TokenType::Dot,
                TokenType::Identifier,
                TokenType::Eof
            ]
        );
    }

    #[test]
    fn test_string_escape() {
        let tokens = tokenize(r"'it''s \'quoted\' A'");
        assert_eq!(tokens[0].value, "it's 'quoted' A");
    }

    #[test]
    fn test_numbers() {
        let tokens = tokenize("1.5 2");
        assert_eq!(tokens[0].value, "1.5");
        assert_eq!(tokens[1].value, "2");
        assert_eq!(types("1.exists()")[1], TokenType::Dot);
    }

    #[test]
    fn test_delimited_identifier() {
        let tokens = tokenize("text.`div`");
        assert_eq!(tokens[2].token_type, TokenType::DelimitedIdentifier);
        assert_eq!(tokens[2].value, "div");
    }

    #[test]
    fn test_external_constant() {
        let tokens = tokenize("%rootResource %'vs-name'");
        assert_eq!(tokens[0].token_type, TokenType::ExternalConstant);
        assert_eq!(tokens[0].value, "rootResource");
        assert_eq!(tokens[1].value, "vs-name");
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            types("a // trailing\n/* block */ b"),
            vec![TokenType::Identifier, TokenType::Identifier, TokenType::Eof]
        );
        assert_eq!(types("a /* open")[1], TokenType::Error);
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(
            types("<= < >= > != !~"),
            vec![
                TokenType::LessThanOrEqual,
                TokenType::LessThan,
                TokenType::GreaterThanOrEqual,
                TokenType::GreaterThan,
                TokenType::NotEqual,
                TokenType::NotEquivalent,
                TokenType::Eof
            ]
        );
    }

    #[test]
    fn test_error_carries_position() {
        let tokens = tokenize("a ? b");
        let last = tokens.last().unwrap();
        assert_eq!(last.token_type, TokenType::Error);
        assert_eq!(last.column, 3);
    }
}
