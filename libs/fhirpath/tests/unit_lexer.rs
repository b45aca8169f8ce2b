//! Unit tests for the expression lexer

use ferrum_fhirpath::lexer::Lexer;
use ferrum_fhirpath::token::{Token, TokenType};

/// Helper function to tokenize input and collect all tokens
fn tokenize(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(input.to_string());
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        match &token.token_type {
            TokenType::Eof | TokenType::Error => {
                tokens.push(token);
                break;
            }
            _ => tokens.push(token),
        }
    }
    tokens
}

#[test]
fn test_literal_integers() {
    let tokens = tokenize("42");
    assert_eq!(tokens.len(), 2); // NumberLiteral + EOF
    assert_eq!(tokens[0].token_type, TokenType::NumberLiteral);
    assert_eq!(tokens[0].value, "42");

    let tokens = tokenize("-42");
    assert_eq!(tokens[0].token_type, TokenType::Minus);
    assert_eq!(tokens[1].token_type, TokenType::NumberLiteral);
    assert_eq!(tokens[1].value, "42");
}

#[test]
fn test_literal_decimals() {
    let tokens = tokenize("3.14");
    assert_eq!(tokens[0].token_type, TokenType::NumberLiteral);
    assert_eq!(tokens[0].value, "3.14");

    let tokens = tokenize("0.5");
    assert_eq!(tokens[0].value, "0.5");
}

#[test]
fn test_literal_strings() {
    let tokens = tokenize("'hello'");
    assert_eq!(tokens[0].token_type, TokenType::StringLiteral);
    assert_eq!(tokens[0].value, "hello");

    let tokens = tokenize("''");
    assert_eq!(tokens[0].token_type, TokenType::StringLiteral);
    assert_eq!(tokens[0].value, "");

    // Escaped quotes
    let tokens = tokenize("'don\\'t'");
    assert_eq!(tokens[0].value, "don't");

    let tokens = tokenize("'\\u0041BC'");
    assert_eq!(tokens[0].value, "ABC");
}

#[test]
fn test_literal_booleans() {
    let tokens = tokenize("true");
    assert_eq!(tokens[0].token_type, TokenType::BooleanLiteral);
    assert_eq!(tokens[0].value, "true");

    let tokens = tokenize("false");
    assert_eq!(tokens[0].token_type, TokenType::BooleanLiteral);
    assert_eq!(tokens[0].value, "false");
}

#[test]
fn test_operators() {
    let cases = [
        ("+", TokenType::Plus),
        ("-", TokenType::Minus),
        ("*", TokenType::Multiply),
        ("/", TokenType::Divide),
        ("&", TokenType::Ampersand),
        ("|", TokenType::Pipe),
        ("=", TokenType::Equal),
        ("~", TokenType::Equivalent),
        ("!=", TokenType::NotEqual),
        ("!~", TokenType::NotEquivalent),
        ("<", TokenType::LessThan),
        ("<=", TokenType::LessThanOrEqual),
        (">", TokenType::GreaterThan),
        (">=", TokenType::GreaterThanOrEqual),
    ];
    for (input, expected) in cases {
        assert_eq!(tokenize(input)[0].token_type, expected, "{}", input);
    }
}

#[test]
fn test_keywords() {
    let cases = [
        ("and", TokenType::And),
        ("or", TokenType::Or),
        ("xor", TokenType::Xor),
        ("implies", TokenType::Implies),
        ("is", TokenType::Is),
        ("as", TokenType::As),
        ("in", TokenType::In),
        ("contains", TokenType::Contains),
        ("div", TokenType::Div),
        ("mod", TokenType::Mod),
    ];
    for (input, expected) in cases {
        let token = &tokenize(input)[0];
        assert_eq!(token.token_type, expected);
        assert!(token.token_type.is_keyword());
    }
}

#[test]
fn test_identifiers() {
    for name in ["name", "Coverage", "_private", "name123", "valueQuantity"] {
        let tokens = tokenize(name);
        assert_eq!(tokens[0].token_type, TokenType::Identifier);
        assert_eq!(tokens[0].value, name);
    }

    let tokens = tokenize("`div`");
    assert_eq!(tokens[0].token_type, TokenType::DelimitedIdentifier);
    assert_eq!(tokens[0].value, "div");
}

#[test]
fn test_external_variables() {
    let tokens = tokenize("%resource");
    assert_eq!(tokens[0].token_type, TokenType::ExternalConstant);
    assert_eq!(tokens[0].value, "resource");

    let tokens = tokenize("%rootResource.contained");
    assert_eq!(tokens[0].value, "rootResource");
    assert_eq!(tokens[1].token_type, TokenType::Dot);

    let tokens = tokenize("%");
    assert_eq!(tokens[0].token_type, TokenType::Error);
}

#[test]
fn test_context_variables() {
    assert_eq!(tokenize("$this")[0].token_type, TokenType::This);
    assert_eq!(tokenize("$index")[0].token_type, TokenType::Index);
    assert_eq!(tokenize("$total")[0].token_type, TokenType::Error);
}

#[test]
fn test_whitespace_handling() {
    let tokens = tokenize("name  .  field");
    assert_eq!(tokens[0].value, "name");
    assert_eq!(tokens[1].token_type, TokenType::Dot);
    assert_eq!(tokens[2].value, "field");
}

#[test]
fn test_constraint_expression() {
    let tokens = tokenize("reference.startsWith('#').not() or (reference.substring(1) in %rootResource.contained.id)");
    let types: Vec<&TokenType> = tokens.iter().map(|t| &t.token_type).collect();
    assert!(types.contains(&&TokenType::StringLiteral));
    assert!(types.contains(&&TokenType::Or));
    assert!(types.contains(&&TokenType::In));
    assert!(types.contains(&&TokenType::ExternalConstant));
    assert_eq!(types.last(), Some(&&TokenType::Eof));
}

#[test]
fn test_empty_input() {
    let tokens = tokenize("");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].token_type, TokenType::Eof);
}

#[test]
fn test_date_literals_are_rejected() {
    let tokens = tokenize("@2024-01-01");
    assert_eq!(tokens[0].token_type, TokenType::Error);
}

#[test]
fn test_string_unterminated() {
    let tokens = tokenize("'unterminated");
    assert_eq!(tokens[0].token_type, TokenType::Error);
}

#[test]
fn test_line_column_tracking() {
    let mut lexer = Lexer::new("42\n  name".to_string());
    let token1 = lexer.next_token();
    assert_eq!(token1.line, 1);
    assert_eq!(token1.column, 1);

    // Whitespace (including newline) is skipped, so the next token is the identifier
    let token2 = lexer.next_token();
    assert_eq!(token2.line, 2);
    assert_eq!(token2.column, 3);
    assert_eq!(token2.token_type, TokenType::Identifier);
    assert_eq!(token2.value, "name");
}
