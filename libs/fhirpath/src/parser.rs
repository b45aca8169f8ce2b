//! Parser for constraint expressions
//!
//! Recursive descent over the token stream. Precedence, lowest to highest:
//! 1. implies
//! 2. or/xor
//! 3. and
//! 4. membership (in, contains)
//! 5. equality (=, ~, !=, !~)
//! 6. inequality (<=, <, >, >=)
//! 7. union (|)
//! 8. type (is, as)
//! 9. additive (+, -, &)
//! 10. multiplicative (*, /, div, mod)
//! 11. polarity (+, -)
//! 12. indexer ([ ]) and invocation (.)
//! 13. term (invocation, literal, external constant, parenthesized)

use crate::ast::*;
use crate::error::{Error, Result};
use crate::lexer::Lexer;
use crate::token::{Token, TokenType};
use rust_decimal::Decimal;
use std::str::FromStr;

pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    recursion_depth: usize,
}

const MAX_RECURSION_DEPTH: usize = 200;

impl Parser {
    pub fn new(input: String) -> Self {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token();
        Self {
            lexer,
            current_token,
            recursion_depth: 0,
        }
    }

    fn advance(&mut self) -> Token {
        let next = self.lexer.next_token();
        std::mem::replace(&mut self.current_token, next)
    }

    fn current_token_is(&self, token_type: TokenType) -> bool {
        self.current_token.token_type == token_type
    }

    fn current_token_is_one_of(&self, types: &[TokenType]) -> bool {
        types.contains(&self.current_token.token_type)
    }

    fn unexpected(&self, expected: &str) -> Error {
        let token = &self.current_token;
        match token.token_type {
            TokenType::Error => Error::ParseError(format!(
                "{} at line {}, column {}",
                token.value, token.line, token.column
            )),
            TokenType::Eof => Error::ParseError(format!(
                "Expected {}, but reached end of input",
                expected
            )),
            _ => Error::ParseError(format!(
                "Expected {}, got {:?} '{}' at line {}, column {}",
                expected, token.token_type, token.value, token.line, token.column
            )),
        }
    }

    fn expect(&mut self, token_type: TokenType) -> Result<Token> {
        if self.current_token_is(token_type.clone()) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("{:?}", token_type)))
        }
    }

    /// Parse the entire expression; trailing tokens are an error.
    pub fn parse(&mut self) -> Result<AstNode> {
        let expr = self.parse_expression()?;
        if !self.current_token_is(TokenType::Eof) {
            return Err(self.unexpected("end of expression"));
        }
        Ok(expr)
    }

    fn parse_expression(&mut self) -> Result<AstNode> {
        self.recursion_depth += 1;
        if self.recursion_depth > MAX_RECURSION_DEPTH {
            return Err(Error::ParseError(format!(
                "Expression too deeply nested (max depth: {})",
                MAX_RECURSION_DEPTH
            )));
        }
        let expr = self.parse_implies_expression();
        self.recursion_depth -= 1;
        expr
    }

    fn parse_implies_expression(&mut self) -> Result<AstNode> {
        let mut left = self.parse_or_expression()?;
        while self.current_token_is(TokenType::Implies) {
            self.advance();
            let right = self.parse_or_expression()?;
            left = AstNode::ImpliesExpression {
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_or_expression(&mut self) -> Result<AstNode> {
        let mut left = self.parse_and_expression()?;
        loop {
            let operator = match self.current_token.token_type {
                TokenType::Or => OrOperator::Or,
                TokenType::Xor => OrOperator::Xor,
                _ => break,
            };
            self.advance();
            let right = self.parse_and_expression()?;
            left = AstNode::OrExpression {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and_expression(&mut self) -> Result<AstNode> {
        let mut left = self.parse_membership_expression()?;
        while self.current_token_is(TokenType::And) {
            self.advance();
            let right = self.parse_membership_expression()?;
            left = AstNode::AndExpression {
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_membership_expression(&mut self) -> Result<AstNode> {
        let mut left = self.parse_equality_expression()?;
        loop {
            let operator = match self.current_token.token_type {
                TokenType::In => MembershipOperator::In,
                TokenType::Contains => MembershipOperator::Contains,
                _ => break,
            };
            self.advance();
            let right = self.parse_equality_expression()?;
            left = AstNode::MembershipExpression {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_equality_expression(&mut self) -> Result<AstNode> {
        let mut left = self.parse_inequality_expression()?;
        loop {
            let operator = match self.current_token.token_type {
                TokenType::Equal => EqualityOperator::Equal,
                TokenType::NotEqual => EqualityOperator::NotEqual,
                TokenType::Equivalent => EqualityOperator::Equivalent,
                TokenType::NotEquivalent => EqualityOperator::NotEquivalent,
                _ => break,
            };
            self.advance();
            let right = self.parse_inequality_expression()?;
            left = AstNode::EqualityExpression {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_inequality_expression(&mut self) -> Result<AstNode> {
        let mut left = self.parse_union_expression()?;
        loop {
            let operator = match self.current_token.token_type {
                TokenType::LessThan => InequalityOperator::LessThan,
                TokenType::LessThanOrEqual => InequalityOperator::LessThanOrEqual,
                TokenType::GreaterThan => InequalityOperator::GreaterThan,
                TokenType::GreaterThanOrEqual => InequalityOperator::GreaterThanOrEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_union_expression()?;
            left = AstNode::InequalityExpression {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_union_expression(&mut self) -> Result<AstNode> {
        let mut left = self.parse_type_expression()?;
        while self.current_token_is(TokenType::Pipe) {
            self.advance();
            let right = self.parse_type_expression()?;
            left = AstNode::UnionExpression {
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_type_expression(&mut self) -> Result<AstNode> {
        let mut expression = self.parse_additive_expression()?;
        loop {
            let operator = match self.current_token.token_type {
                TokenType::Is => TypeOperator::Is,
                TokenType::As => TypeOperator::As,
                _ => break,
            };
            self.advance();
            let type_specifier = self.parse_qualified_identifier()?;
            expression = AstNode::TypeExpression {
                expression: Box::new(expression),
                operator,
                type_specifier,
            };
        }
        Ok(expression)
    }

    fn parse_additive_expression(&mut self) -> Result<AstNode> {
        let mut left = self.parse_multiplicative_expression()?;
        loop {
            let operator = match self.current_token.token_type {
                TokenType::Plus => AdditiveOperator::Plus,
                TokenType::Minus => AdditiveOperator::Minus,
                TokenType::Ampersand => AdditiveOperator::Concatenate,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative_expression()?;
            left = AstNode::AdditiveExpression {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative_expression(&mut self) -> Result<AstNode> {
        let mut left = self.parse_polarity_expression()?;
        loop {
            let operator = match self.current_token.token_type {
                TokenType::Multiply => MultiplicativeOperator::Multiply,
                TokenType::Divide => MultiplicativeOperator::Divide,
                TokenType::Div => MultiplicativeOperator::Div,
                TokenType::Mod => MultiplicativeOperator::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_polarity_expression()?;
            left = AstNode::MultiplicativeExpression {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_polarity_expression(&mut self) -> Result<AstNode> {
        let operator = match self.current_token.token_type {
            TokenType::Plus => PolarityOperator::Plus,
            TokenType::Minus => PolarityOperator::Minus,
            _ => return self.parse_postfix_expression(),
        };
        self.advance();
        let expression = self.parse_polarity_expression()?;
        Ok(AstNode::PolarityExpression {
            operator,
            expression: Box::new(expression),
        })
    }

    /// A term followed by any number of `.invocation` and `[index]`
    fn parse_postfix_expression(&mut self) -> Result<AstNode> {
        let mut expression = self.parse_term()?;
        loop {
            if self.current_token_is(TokenType::Dot) {
                self.advance();
                let invocation = self.parse_invocation(true)?;
                expression = AstNode::InvocationExpression {
                    expression: Box::new(expression),
                    invocation: Box::new(invocation),
                };
            } else if self.current_token_is(TokenType::OpenBracket) {
                self.advance();
                let index = self.parse_expression()?;
                self.expect(TokenType::CloseBracket)?;
                expression = AstNode::IndexerExpression {
                    collection: Box::new(expression),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        Ok(expression)
    }

    fn parse_term(&mut self) -> Result<AstNode> {
        match self.current_token.token_type {
            TokenType::OpenParen => {
                self.advance();
                let expression = self.parse_expression()?;
                self.expect(TokenType::CloseParen)?;
                Ok(AstNode::ParenthesizedTerm {
                    expression: Box::new(expression),
                })
            }
            TokenType::ExternalConstant => {
                let token = self.advance();
                Ok(AstNode::ExternalConstantTerm {
                    constant: token.value,
                })
            }
            TokenType::OpenBrace
            | TokenType::BooleanLiteral
            | TokenType::StringLiteral
            | TokenType::NumberLiteral => self.parse_literal(),
            // Keywords such as `contains` may open a function call at the start
            // of a sub-expression only when followed by '('
            _ => self.parse_invocation(false),
        }
    }

    fn parse_literal(&mut self) -> Result<AstNode> {
        let token = self.advance();
        match token.token_type {
            TokenType::OpenBrace => {
                self.expect(TokenType::CloseBrace)?;
                Ok(AstNode::NullLiteral)
            }
            TokenType::BooleanLiteral => Ok(AstNode::BooleanLiteral(token.value == "true")),
            TokenType::StringLiteral => Ok(AstNode::StringLiteral(token.value)),
            TokenType::NumberLiteral if token.value.contains('.') => Decimal::from_str(&token.value)
                .map(AstNode::NumberLiteral)
                .map_err(|e| Error::ParseError(format!("Invalid number '{}': {}", token.value, e))),
            TokenType::NumberLiteral => match token.value.parse::<i64>() {
                Ok(i) => Ok(AstNode::IntegerLiteral(i)),
                Err(_) => Decimal::from_str(&token.value)
                    .map(AstNode::NumberLiteral)
                    .map_err(|e| {
                        Error::ParseError(format!("Invalid number '{}': {}", token.value, e))
                    }),
            },
            other => Err(Error::ParseError(format!(
                "Unexpected token type for literal: {:?}",
                other
            ))),
        }
    }

    /// Parse `$this`, `$index`, a member name or a function call. After a
    /// dot, operator keywords are accepted as names (`.contains('x')`,
    /// `.as(uri)`).
    fn parse_invocation(&mut self, after_dot: bool) -> Result<AstNode> {
        match self.current_token.token_type {
            TokenType::This => {
                self.advance();
                return Ok(AstNode::ThisInvocation);
            }
            TokenType::Index => {
                self.advance();
                return Ok(AstNode::IndexInvocation);
            }
            _ => {}
        }

        let is_name = self.current_token_is_one_of(&[
            TokenType::Identifier,
            TokenType::DelimitedIdentifier,
        ]) || (after_dot && self.current_token.token_type.is_keyword());
        if !is_name {
            return Err(self.unexpected("invocation"));
        }
        let ident = self.advance().value;

        if !self.current_token_is(TokenType::OpenParen) {
            return Ok(AstNode::MemberInvocation { identifier: ident });
        }

        self.advance(); // '('
        let mut parameters = Vec::new();
        if !self.current_token_is(TokenType::CloseParen) {
            loop {
                parameters.push(self.parse_expression()?);
                if self.current_token_is(TokenType::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenType::CloseParen)?;
        Ok(AstNode::FunctionInvocation {
            function_name: ident,
            parameters,
        })
    }

    /// Parse a qualified identifier: identifier ('.' identifier)*
    fn parse_qualified_identifier(&mut self) -> Result<QualifiedIdentifier> {
        let mut parts = Vec::new();
        loop {
            if !self.current_token_is_one_of(&[
                TokenType::Identifier,
                TokenType::DelimitedIdentifier,
            ]) {
                return Err(self.unexpected("type name"));
            }
            parts.push(self.advance().value);
            if !self.current_token_is(TokenType::Dot) {
                break;
            }
            self.advance();
        }
        Ok(QualifiedIdentifier::new(parts))
    }
}

/// Parse `expression` into an AST.
pub fn parse(expression: &str) -> Result<AstNode> {
    Parser::new(expression.to_string()).parse()
}
