//! Abstract Syntax Tree (AST) representation
//!
//! The AST mirrors the grammar of constraint expressions directly, without
//! semantic analysis:
//!
//! ```text
//! expression: term
//!           | expression '.' invocation
//!           | expression '[' expression ']'
//!           | ('+' | '-') expression
//!           | expression ('*' | '/' | 'div' | 'mod') expression
//!           | expression ('+' | '-' | '&') expression
//!           | expression ('is' | 'as') typeSpecifier
//!           | expression '|' expression
//!           | expression ('<=' | '<' | '>' | '>=') expression
//!           | expression ('=' | '~' | '!=' | '!~') expression
//!           | expression ('in' | 'contains') expression
//!           | expression 'and' expression
//!           | expression ('or' | 'xor') expression
//!           | expression 'implies' expression
//! term:       invocation | literal | '%' identifier | '(' expression ')'
//! invocation: identifier | identifier '(' params? ')' | '$this' | '$index'
//! literal:    '{}' | 'true' | 'false' | STRING | NUMBER
//! ```

use rust_decimal::Decimal;

/// AST node of a constraint expression
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    /// `expression '.' invocation`
    InvocationExpression {
        expression: Box<AstNode>,
        invocation: Box<AstNode>,
    },

    /// `expression '[' expression ']'`
    IndexerExpression {
        collection: Box<AstNode>,
        index: Box<AstNode>,
    },

    PolarityExpression {
        operator: PolarityOperator,
        expression: Box<AstNode>,
    },

    MultiplicativeExpression {
        left: Box<AstNode>,
        operator: MultiplicativeOperator,
        right: Box<AstNode>,
    },

    AdditiveExpression {
        left: Box<AstNode>,
        operator: AdditiveOperator,
        right: Box<AstNode>,
    },

    /// `expression ('is' | 'as') typeSpecifier`
    TypeExpression {
        expression: Box<AstNode>,
        operator: TypeOperator,
        type_specifier: QualifiedIdentifier,
    },

    UnionExpression {
        left: Box<AstNode>,
        right: Box<AstNode>,
    },

    InequalityExpression {
        left: Box<AstNode>,
        operator: InequalityOperator,
        right: Box<AstNode>,
    },

    EqualityExpression {
        left: Box<AstNode>,
        operator: EqualityOperator,
        right: Box<AstNode>,
    },

    MembershipExpression {
        left: Box<AstNode>,
        operator: MembershipOperator,
        right: Box<AstNode>,
    },

    AndExpression {
        left: Box<AstNode>,
        right: Box<AstNode>,
    },

    OrExpression {
        left: Box<AstNode>,
        operator: OrOperator,
        right: Box<AstNode>,
    },

    ImpliesExpression {
        left: Box<AstNode>,
        right: Box<AstNode>,
    },

    /// `'%' identifier`, stored without the `%`
    ExternalConstantTerm { constant: String },

    ParenthesizedTerm { expression: Box<AstNode> },

    /// Member access; at the start of an expression it applies to `$this`
    MemberInvocation { identifier: String },

    FunctionInvocation {
        function_name: String,
        parameters: Vec<AstNode>,
    },

    ThisInvocation,

    IndexInvocation,

    /// `{}`
    NullLiteral,

    BooleanLiteral(bool),

    StringLiteral(String),

    IntegerLiteral(i64),

    /// Number with a decimal point
    NumberLiteral(Decimal),
}

impl AstNode {
    /// Every function call in the expression as `(name, argument count)`,
    /// in source order.
    pub fn function_calls(&self) -> Vec<(&str, usize)> {
        let mut calls = Vec::new();
        self.collect_function_calls(&mut calls);
        calls
    }

    fn collect_function_calls<'a>(&'a self, out: &mut Vec<(&'a str, usize)>) {
        match self {
            AstNode::FunctionInvocation {
                function_name,
                parameters,
            } => {
                out.push((function_name, parameters.len()));
                for p in parameters {
                    p.collect_function_calls(out);
                }
            }
            AstNode::InvocationExpression {
                expression,
                invocation,
            } => {
                expression.collect_function_calls(out);
                invocation.collect_function_calls(out);
            }
            AstNode::IndexerExpression { collection, index } => {
                collection.collect_function_calls(out);
                index.collect_function_calls(out);
            }
            AstNode::PolarityExpression { expression, .. }
            | AstNode::TypeExpression { expression, .. }
            | AstNode::ParenthesizedTerm { expression } => expression.collect_function_calls(out),
            AstNode::MultiplicativeExpression { left, right, .. }
            | AstNode::AdditiveExpression { left, right, .. }
            | AstNode::UnionExpression { left, right }
            | AstNode::InequalityExpression { left, right, .. }
            | AstNode::EqualityExpression { left, right, .. }
            | AstNode::MembershipExpression { left, right, .. }
            | AstNode::AndExpression { left, right }
            | AstNode::OrExpression { left, right, .. }
            | AstNode::ImpliesExpression { left, right } => {
                left.collect_function_calls(out);
                right.collect_function_calls(out);
            }
            _ => {}
        }
    }
}

/// Type name in `is`/`as`/`ofType`, optionally namespaced (`FHIR.uri`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedIdentifier {
    pub parts: Vec<String>,
}

impl QualifiedIdentifier {
    pub fn new(parts: Vec<String>) -> Self {
        Self { parts }
    }

    /// The unqualified type name
    pub fn name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        if self.parts.len() > 1 {
            self.parts.first().map(String::as_str)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolarityOperator {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiplicativeOperator {
    Multiply,
    Divide,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdditiveOperator {
    Plus,
    Minus,
    Concatenate, // &
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeOperator {
    Is,
    As,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InequalityOperator {
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqualityOperator {
    Equal,
    NotEqual,
    Equivalent,
    NotEquivalent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipOperator {
    In,
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrOperator {
    Or,
    Xor,
}
