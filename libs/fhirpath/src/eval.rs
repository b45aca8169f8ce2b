//! Tree-walking evaluator
//!
//! Evaluates an [`AstNode`] against a [`Context`]. Boolean operators follow
//! three-valued logic: an empty operand is unknown, and `and`, `or` and
//! `implies` do not evaluate their right operand once the left one decides
//! the result.

use crate::ast::*;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::functions::{self, FunctionKind};
use crate::value::{Collection, Value};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use tracing::trace;

/// Iteration state: the current `$this` and `$index`
#[derive(Clone)]
struct Frame {
    this: Collection,
    index: Option<usize>,
}

pub(crate) struct Evaluator<'a> {
    ctx: &'a Context,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    pub(crate) fn evaluate(&self, ast: &AstNode) -> Result<Collection> {
        let frame = Frame {
            this: Collection::singleton(Value::node(self.ctx.focus.clone())),
            index: None,
        };
        self.eval(ast, &frame)
    }

    fn eval(&self, ast: &AstNode, frame: &Frame) -> Result<Collection> {
        match ast {
            AstNode::NullLiteral => Ok(Collection::empty()),
            AstNode::BooleanLiteral(b) => Ok(Collection::singleton(Value::boolean(*b))),
            AstNode::StringLiteral(s) => Ok(Collection::singleton(Value::string(s.clone()))),
            AstNode::IntegerLiteral(i) => Ok(Collection::singleton(Value::integer(*i))),
            AstNode::NumberLiteral(d) => Ok(Collection::singleton(Value::decimal(*d))),

            AstNode::ExternalConstantTerm { constant } => self
                .ctx
                .get_variable(constant)
                .ok_or_else(|| Error::VariableNotFound(format!("%{}", constant))),
            AstNode::ParenthesizedTerm { expression } => self.eval(expression, frame),
            AstNode::ThisInvocation => Ok(frame.this.clone()),
            AstNode::IndexInvocation => Ok(frame
                .index
                .map(|i| Value::integer(i as i64))
                .into_iter()
                .collect()),
            AstNode::MemberInvocation { identifier } => {
                if let Some(root) = self.type_name_root(&frame.this, identifier) {
                    return Ok(root);
                }
                Ok(navigate(&frame.this, identifier))
            }
            AstNode::FunctionInvocation {
                function_name,
                parameters,
            } => self.call(function_name, frame.this.clone(), parameters, frame),

            AstNode::InvocationExpression {
                expression,
                invocation,
            } => {
                let input = self.eval(expression, frame)?;
                match invocation.as_ref() {
                    AstNode::MemberInvocation { identifier } => Ok(navigate(&input, identifier)),
                    AstNode::FunctionInvocation {
                        function_name,
                        parameters,
                    } => self.call(function_name, input, parameters, frame),
                    AstNode::ThisInvocation => Ok(input),
                    other => Err(Error::EvaluationError(format!(
                        "cannot invoke {:?} on a collection",
                        other
                    ))),
                }
            }
            AstNode::IndexerExpression { collection, index } => {
                let items = self.eval(collection, frame)?;
                let index = self.eval(index, frame)?.as_integer("indexer")?;
                Ok(match index {
                    Some(i) if i >= 0 => items.get(i as usize).cloned().into_iter().collect(),
                    _ => Collection::empty(),
                })
            }

            AstNode::PolarityExpression {
                operator,
                expression,
            } => {
                let operand = self.eval(expression, frame)?;
                let Some(value) = operand.singleton_value("unary operator")? else {
                    return Ok(Collection::empty());
                };
                let number = Number::of(value).ok_or_else(|| {
                    Error::TypeError(format!("cannot negate {}", value.type_name()))
                })?;
                Ok(Collection::singleton(match operator {
                    PolarityOperator::Plus => number.into_value(),
                    PolarityOperator::Minus => number.negate().into_value(),
                }))
            }
            AstNode::MultiplicativeExpression {
                left,
                operator,
                right,
            } => {
                let (l, r) = (self.eval(left, frame)?, self.eval(right, frame)?);
                multiplicative(*operator, &l, &r)
            }
            AstNode::AdditiveExpression {
                left,
                operator,
                right,
            } => {
                let (l, r) = (self.eval(left, frame)?, self.eval(right, frame)?);
                additive(*operator, &l, &r)
            }
            AstNode::TypeExpression {
                expression,
                operator,
                type_specifier,
            } => {
                let input = self.eval(expression, frame)?;
                let Some(value) = input.singleton_value("type operator")? else {
                    return Ok(Collection::empty());
                };
                let matches = is_type(value, type_specifier);
                Ok(match operator {
                    TypeOperator::Is => Collection::from_bool(Some(matches)),
                    TypeOperator::As if matches => Collection::singleton(value.clone()),
                    TypeOperator::As => Collection::empty(),
                })
            }
            AstNode::UnionExpression { left, right } => {
                let mut out = Collection::empty();
                for item in self.eval(left, frame)?.into_iter().chain(self.eval(right, frame)?) {
                    out.push_distinct(item);
                }
                Ok(out)
            }
            AstNode::InequalityExpression {
                left,
                operator,
                right,
            } => {
                let (l, r) = (self.eval(left, frame)?, self.eval(right, frame)?);
                let (Some(a), Some(b)) = (
                    l.singleton_value("comparison")?,
                    r.singleton_value("comparison")?,
                ) else {
                    return Ok(Collection::empty());
                };
                let result = a.compare(b)?.map(|ordering| match operator {
                    InequalityOperator::LessThan => ordering == Ordering::Less,
                    InequalityOperator::LessThanOrEqual => ordering != Ordering::Greater,
                    InequalityOperator::GreaterThan => ordering == Ordering::Greater,
                    InequalityOperator::GreaterThanOrEqual => ordering != Ordering::Less,
                });
                Ok(Collection::from_bool(result))
            }
            AstNode::EqualityExpression {
                left,
                operator,
                right,
            } => {
                let (l, r) = (self.eval(left, frame)?, self.eval(right, frame)?);
                let result = match operator {
                    EqualityOperator::Equal => collections_equal(&l, &r),
                    EqualityOperator::NotEqual => collections_equal(&l, &r).map(|b| !b),
                    EqualityOperator::Equivalent => Some(collections_equivalent(&l, &r)),
                    EqualityOperator::NotEquivalent => Some(!collections_equivalent(&l, &r)),
                };
                Ok(Collection::from_bool(result))
            }
            AstNode::MembershipExpression {
                left,
                operator,
                right,
            } => {
                let (l, r) = (self.eval(left, frame)?, self.eval(right, frame)?);
                let (item, container) = match operator {
                    MembershipOperator::In => (l, r),
                    MembershipOperator::Contains => (r, l),
                };
                Ok(match item.singleton_value("membership operator")? {
                    None => Collection::empty(),
                    Some(value) => Collection::from_bool(Some(container.contains_value(value))),
                })
            }

            AstNode::AndExpression { left, right } => {
                let l = self.eval(left, frame)?.as_boolean()?;
                if l == Some(false) {
                    return Ok(Collection::from_bool(Some(false)));
                }
                let r = self.eval(right, frame)?.as_boolean()?;
                Ok(Collection::from_bool(match (l, r) {
                    (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                }))
            }
            AstNode::OrExpression {
                left,
                operator: OrOperator::Or,
                right,
            } => {
                let l = self.eval(left, frame)?.as_boolean()?;
                if l == Some(true) {
                    return Ok(Collection::from_bool(Some(true)));
                }
                let r = self.eval(right, frame)?.as_boolean()?;
                Ok(Collection::from_bool(match (l, r) {
                    (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                }))
            }
            AstNode::OrExpression {
                left,
                operator: OrOperator::Xor,
                right,
            } => {
                let l = self.eval(left, frame)?.as_boolean()?;
                let r = self.eval(right, frame)?.as_boolean()?;
                Ok(Collection::from_bool(match (l, r) {
                    (Some(a), Some(b)) => Some(a != b),
                    _ => None,
                }))
            }
            AstNode::ImpliesExpression { left, right } => {
                let l = self.eval(left, frame)?.as_boolean()?;
                if l == Some(false) {
                    return Ok(Collection::from_bool(Some(true)));
                }
                let r = self.eval(right, frame)?.as_boolean()?;
                Ok(Collection::from_bool(match (l, r) {
                    (_, Some(true)) => Some(true),
                    (Some(true), r) => r,
                    _ => None,
                }))
            }
        }
    }

    /// A leading type name (`Coverage.status`) selects the focus itself when
    /// the focus is of that type and has no element of that name.
    fn type_name_root(&self, this: &Collection, identifier: &str) -> Option<Collection> {
        if !identifier.starts_with(|c: char| c.is_ascii_uppercase()) {
            return None;
        }
        match this.first() {
            Some(Value::Node(node))
                if this.len() == 1
                    && node.type_name() == identifier
                    && node.definition().property(identifier).is_none() =>
            {
                Some(this.clone())
            }
            _ => None,
        }
    }

    fn call(
        &self,
        name: &str,
        input: Collection,
        parameters: &[AstNode],
        frame: &Frame,
    ) -> Result<Collection> {
        let metadata = functions::validate_call(name, parameters.len())?;
        match metadata.kind {
            FunctionKind::Unsupported => Err(Error::Unsupported(format!(
                "{}() requires services outside the model",
                name
            ))),
            FunctionKind::TypeArgument => {
                let type_specifier = type_specifier(&parameters[0])?;
                match name {
                    // as() filters like ofType() so that descendants().as(uri) works
                    "ofType" | "as" => Ok(input
                        .into_iter()
                        .filter(|v| is_type(v, &type_specifier))
                        .collect()),
                    _ => {
                        let Some(value) = input.singleton_value(name)? else {
                            return Ok(Collection::empty());
                        };
                        Ok(Collection::from_bool(Some(is_type(value, &type_specifier))))
                    }
                }
            }
            FunctionKind::Lambda => self.call_lambda(name, input, parameters, frame),
            FunctionKind::Eager => {
                let args = parameters
                    .iter()
                    .map(|p| self.eval(p, frame))
                    .collect::<Result<Vec<_>>>()?;
                functions::execute(name, input, &args)
            }
        }
    }

    /// Evaluate `criteria` with `$this` bound to each input item in turn.
    fn per_item<'s>(
        &'s self,
        input: &Collection,
        criteria: &'s AstNode,
    ) -> impl Iterator<Item = Result<(Value, Collection)>> + 's {
        let items: Vec<Value> = input.iter().cloned().collect();
        items.into_iter().enumerate().map(move |(index, item)| {
            let frame = Frame {
                this: Collection::singleton(item.clone()),
                index: Some(index),
            };
            self.eval(criteria, &frame).map(|result| (item, result))
        })
    }

    fn call_lambda(
        &self,
        name: &str,
        input: Collection,
        parameters: &[AstNode],
        frame: &Frame,
    ) -> Result<Collection> {
        match (name, parameters) {
            ("exists", []) => Ok(Collection::from_bool(Some(!input.is_empty()))),
            ("exists", [criteria]) => {
                for result in self.per_item(&input, criteria) {
                    if result?.1.as_boolean()? == Some(true) {
                        return Ok(Collection::from_bool(Some(true)));
                    }
                }
                Ok(Collection::from_bool(Some(false)))
            }
            ("all", [criteria]) => {
                for result in self.per_item(&input, criteria) {
                    if result?.1.as_boolean()? != Some(true) {
                        return Ok(Collection::from_bool(Some(false)));
                    }
                }
                Ok(Collection::from_bool(Some(true)))
            }
            ("where", [criteria]) => {
                let mut out = Collection::empty();
                for result in self.per_item(&input, criteria) {
                    let (item, keep) = result?;
                    if keep.as_boolean()? == Some(true) {
                        out.push(item);
                    }
                }
                Ok(out)
            }
            ("select", [projection]) => {
                let mut out = Collection::empty();
                for result in self.per_item(&input, projection) {
                    out.extend(result?.1);
                }
                Ok(out)
            }
            ("iif", [condition, then, rest @ ..]) => {
                if input.len() > 1 {
                    return Err(Error::EvaluationError(
                        "iif() can only be used on a single item".into(),
                    ));
                }
                let inner = Frame {
                    this: if input.is_empty() {
                        frame.this.clone()
                    } else {
                        input
                    },
                    index: frame.index,
                };
                if self.eval(condition, &inner)?.as_boolean()? == Some(true) {
                    self.eval(then, &inner)
                } else {
                    match rest.first() {
                        Some(otherwise) => self.eval(otherwise, &inner),
                        None => Ok(Collection::empty()),
                    }
                }
            }
            ("trace", [label, projection @ ..]) => {
                let label = self.eval(label, frame)?;
                let label = label.as_string("trace() name")?.unwrap_or("trace").to_string();
                let traced = match projection.first() {
                    Some(projection) => {
                        let mut out = Collection::empty();
                        for result in self.per_item(&input, projection) {
                            out.extend(result?.1);
                        }
                        out
                    }
                    None => input.clone(),
                };
                let items: Vec<String> = traced.iter().map(|v| v.to_string()).collect();
                trace!(label = %label, items = ?items, "expression trace");
                Ok(input)
            }
            _ => Err(Error::EvaluationError(format!(
                "Invalid arguments for {}()",
                name
            ))),
        }
    }
}

/// Child nodes called `name` of every node in `input`. `id` reads the
/// element id, which is an attribute rather than a child element.
fn navigate(input: &Collection, name: &str) -> Collection {
    let mut out = Collection::empty();
    for item in input {
        let Value::Node(node) = item else { continue };
        let children = node.field(name);
        if !children.is_empty() {
            out.extend(children.iter().cloned().map(Value::node));
        } else if name == "id" && node.definition().property("id").is_none() {
            out.extend(node.id().map(Value::string));
        }
    }
    out
}

fn type_specifier(parameter: &AstNode) -> Result<QualifiedIdentifier> {
    match parameter {
        AstNode::MemberInvocation { identifier } => {
            Ok(QualifiedIdentifier::new(vec![identifier.clone()]))
        }
        AstNode::InvocationExpression {
            expression,
            invocation,
        } => match (expression.as_ref(), invocation.as_ref()) {
            (
                AstNode::MemberInvocation { identifier: ns },
                AstNode::MemberInvocation { identifier: name },
            ) => Ok(QualifiedIdentifier::new(vec![ns.clone(), name.clone()])),
            _ => Err(Error::TypeError("expected a type name".into())),
        },
        _ => Err(Error::TypeError("expected a type name".into())),
    }
}

/// Type test for `is`, `as` and `ofType`. Element nodes match their own
/// type and its base types; system values match their system type, or a
/// same-named element type when no namespace is given.
fn is_type(value: &Value, type_specifier: &QualifiedIdentifier) -> bool {
    let name = type_specifier.name();
    let namespace = type_specifier.namespace();
    match value {
        Value::Node(node) => {
            namespace != Some("System") && node.registry().is_subtype_of(node.type_name(), name)
        }
        other => match namespace {
            Some("System") => other.type_name() == name,
            Some(_) => false,
            None => other.type_name().eq_ignore_ascii_case(name),
        },
    }
}

fn collections_equal(left: &Collection, right: &Collection) -> Option<bool> {
    if left.is_empty() || right.is_empty() {
        return None;
    }
    if left.len() != right.len() {
        return Some(false);
    }
    let mut result = Some(true);
    for (a, b) in left.iter().zip(right.iter()) {
        match a.equals(b) {
            Some(true) => {}
            Some(false) => return Some(false),
            None => result = None,
        }
    }
    result
}

fn collections_equivalent(left: &Collection, right: &Collection) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .all(|a| right.iter().any(|b| a.equivalent(b)))
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Integer(i64),
    Decimal(Decimal),
}

impl Number {
    fn of(value: &Value) -> Option<Self> {
        match value.primitive()? {
            ferrum_model::PrimitiveValue::Integer(i) => Some(Number::Integer(i)),
            ferrum_model::PrimitiveValue::Decimal(d) => Some(Number::Decimal(d)),
            _ => None,
        }
    }

    fn decimal(self) -> Decimal {
        match self {
            Number::Integer(i) => Decimal::from(i),
            Number::Decimal(d) => d,
        }
    }

    fn negate(self) -> Self {
        match self {
            Number::Integer(i) => Number::Integer(-i),
            Number::Decimal(d) => Number::Decimal(-d),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Number::Integer(i) => Value::integer(i),
            Number::Decimal(d) => Value::decimal(d),
        }
    }
}

fn operands<'c>(
    left: &'c Collection,
    right: &'c Collection,
    what: &str,
) -> Result<Option<(&'c Value, &'c Value)>> {
    Ok(match (left.singleton_value(what)?, right.singleton_value(what)?) {
        (Some(a), Some(b)) => Some((a, b)),
        _ => None,
    })
}

fn numbers(a: &Value, b: &Value, what: &str) -> Result<(Number, Number)> {
    match (Number::of(a), Number::of(b)) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(Error::TypeError(format!(
            "{} is not defined for {} and {}",
            what,
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn additive(operator: AdditiveOperator, left: &Collection, right: &Collection) -> Result<Collection> {
    if operator == AdditiveOperator::Concatenate {
        let l = left.as_string("&")?.unwrap_or_default();
        let r = right.as_string("&")?.unwrap_or_default();
        return Ok(Collection::singleton(Value::string(format!("{}{}", l, r))));
    }
    let Some((a, b)) = operands(left, right, "arithmetic")? else {
        return Ok(Collection::empty());
    };
    if operator == AdditiveOperator::Plus {
        if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
            return Ok(Collection::singleton(Value::string(format!("{}{}", x, y))));
        }
    }
    let result = match (numbers(a, b, "arithmetic")?, operator) {
        ((Number::Integer(x), Number::Integer(y)), AdditiveOperator::Plus) => {
            x.checked_add(y).map(Number::Integer)
        }
        ((Number::Integer(x), Number::Integer(y)), _) => x.checked_sub(y).map(Number::Integer),
        ((x, y), AdditiveOperator::Plus) => x.decimal().checked_add(y.decimal()).map(Number::Decimal),
        ((x, y), _) => x.decimal().checked_sub(y.decimal()).map(Number::Decimal),
    };
    Ok(result.map(Number::into_value).into_iter().collect())
}

fn multiplicative(
    operator: MultiplicativeOperator,
    left: &Collection,
    right: &Collection,
) -> Result<Collection> {
    let Some((a, b)) = operands(left, right, "arithmetic")? else {
        return Ok(Collection::empty());
    };
    let (x, y) = numbers(a, b, "arithmetic")?;
    let result = match (operator, x, y) {
        (MultiplicativeOperator::Multiply, Number::Integer(x), Number::Integer(y)) => {
            x.checked_mul(y).map(Number::Integer)
        }
        (MultiplicativeOperator::Multiply, x, y) => {
            x.decimal().checked_mul(y.decimal()).map(Number::Decimal)
        }
        (MultiplicativeOperator::Divide, x, y) => {
            x.decimal().checked_div(y.decimal()).map(Number::Decimal)
        }
        (MultiplicativeOperator::Div, Number::Integer(x), Number::Integer(y)) => {
            x.checked_div(y).map(Number::Integer)
        }
        (MultiplicativeOperator::Div, x, y) => x
            .decimal()
            .checked_div(y.decimal())
            .map(|d| Number::Decimal(d.trunc())),
        (MultiplicativeOperator::Mod, Number::Integer(x), Number::Integer(y)) => {
            x.checked_rem(y).map(Number::Integer)
        }
        (MultiplicativeOperator::Mod, x, y) => {
            x.decimal().checked_rem(y.decimal()).map(Number::Decimal)
        }
    };
    Ok(result.map(Number::into_value).into_iter().collect())
}
