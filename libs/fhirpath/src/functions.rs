//! Function table and the functions that take evaluated arguments
//!
//! Every function an expression may call has an entry in a compile-time
//! perfect hash map giving its arity and how its arguments are evaluated.
//! Functions whose arguments are expressions over each input item
//! (`where`, `select`, ...) and type-argument functions (`ofType`, `as`)
//! are run by the evaluator; the rest are implemented here.

use crate::error::{Error, Result};
use crate::value::{Collection, Value};
use ferrum_model::Node;
use lru::LruCache;
use once_cell::sync::Lazy;
use phf::phf_map;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// How a function's arguments are evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Arguments are evaluated once, against the enclosing focus
    Eager,
    /// Arguments are expressions evaluated per input item (`$this`)
    Lambda,
    /// The single argument is a type name, not an expression
    TypeArgument,
    /// Known but not evaluable without terminology or resolution services
    Unsupported,
}

#[derive(Debug, Clone, Copy)]
pub struct FunctionMetadata {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub kind: FunctionKind,
}

macro_rules! function {
    ($name:literal, $min:literal, $max:literal, $kind:ident) => {
        FunctionMetadata {
            name: $name,
            min_args: $min,
            max_args: $max,
            kind: FunctionKind::$kind,
        }
    };
}

static FUNCTIONS_BY_NAME: phf::Map<&'static str, FunctionMetadata> = phf_map! {
    // Existence
    "empty" => function!("empty", 0, 0, Eager),
    "exists" => function!("exists", 0, 1, Lambda),
    "all" => function!("all", 1, 1, Lambda),
    "count" => function!("count", 0, 0, Eager),
    "distinct" => function!("distinct", 0, 0, Eager),
    "isDistinct" => function!("isDistinct", 0, 0, Eager),
    "hasValue" => function!("hasValue", 0, 0, Eager),

    // Filtering and projection
    "where" => function!("where", 1, 1, Lambda),
    "select" => function!("select", 1, 1, Lambda),
    "ofType" => function!("ofType", 1, 1, TypeArgument),
    "extension" => function!("extension", 1, 1, Eager),

    // Subsetting
    "first" => function!("first", 0, 0, Eager),
    "last" => function!("last", 0, 0, Eager),

    // Navigation
    "children" => function!("children", 0, 0, Eager),
    "descendants" => function!("descendants", 0, 0, Eager),

    // Boolean and types
    "not" => function!("not", 0, 0, Eager),
    "as" => function!("as", 1, 1, TypeArgument),
    "is" => function!("is", 1, 1, TypeArgument),

    // Strings
    "startsWith" => function!("startsWith", 1, 1, Eager),
    "endsWith" => function!("endsWith", 1, 1, Eager),
    "contains" => function!("contains", 1, 1, Eager),
    "matches" => function!("matches", 1, 1, Eager),
    "length" => function!("length", 0, 0, Eager),
    "substring" => function!("substring", 1, 2, Eager),

    // Utility
    "iif" => function!("iif", 2, 3, Lambda),
    "trace" => function!("trace", 1, 2, Lambda),

    // Need terminology, resolution or profile services
    "memberOf" => function!("memberOf", 1, 2, Unsupported),
    "resolve" => function!("resolve", 0, 0, Unsupported),
    "conformsTo" => function!("conformsTo", 1, 1, Unsupported),
    "htmlChecks" => function!("htmlChecks", 0, 0, Unsupported),
};

/// Metadata for `name`, if the function exists.
pub fn lookup(name: &str) -> Option<&'static FunctionMetadata> {
    FUNCTIONS_BY_NAME.get(name)
}

/// Check that `name` exists and accepts `arg_count` arguments.
pub fn validate_call(name: &str, arg_count: usize) -> Result<&'static FunctionMetadata> {
    let metadata = lookup(name).ok_or_else(|| Error::FunctionNotFound(name.to_string()))?;
    if arg_count < metadata.min_args || arg_count > metadata.max_args {
        let expected = if metadata.min_args == metadata.max_args {
            metadata.min_args.to_string()
        } else {
            format!("{} to {}", metadata.min_args, metadata.max_args)
        };
        return Err(Error::EvaluationError(format!(
            "Function {}() takes {} arguments, got {}",
            name, expected, arg_count
        )));
    }
    Ok(metadata)
}

/// Run an eager function on `input` with already evaluated `args`.
pub fn execute(name: &str, input: Collection, args: &[Collection]) -> Result<Collection> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
    match name {
        "empty" => Ok(Collection::from_bool(Some(input.is_empty()))),
        "count" => Ok(Collection::singleton(Value::integer(input.len() as i64))),
        "first" => Ok(input.first().cloned().into_iter().collect()),
        "last" => Ok(input.last().cloned().into_iter().collect()),
        "not" => Ok(Collection::from_bool(input.as_boolean()?.map(|b| !b))),
        "hasValue" => Ok(Collection::from_bool(Some(has_value(&input)))),
        "distinct" => Ok(distinct(input)),
        "isDistinct" => {
            let len = input.len();
            Ok(Collection::from_bool(Some(distinct(input).len() == len)))
        }
        "children" => Ok(input.iter().flat_map(children).collect()),
        "descendants" => Ok(descendants(&input)),
        "extension" => extension(&input, &arg(0)),
        "startsWith" => string_test(&input, &arg(0), name, |s, p| s.starts_with(p)),
        "endsWith" => string_test(&input, &arg(0), name, |s, p| s.ends_with(p)),
        "contains" => string_test(&input, &arg(0), name, |s, p| s.contains(p)),
        "matches" => matches(&input, &arg(0)),
        "length" => Ok(input
            .as_string("length()")?
            .map(|s| Value::integer(s.chars().count() as i64))
            .into_iter()
            .collect()),
        "substring" => substring(&input, &arg(0), args.get(1)),
        other => Err(Error::FunctionNotFound(other.to_string())),
    }
}

fn has_value(input: &Collection) -> bool {
    match input.singleton_value("hasValue()") {
        Ok(Some(Value::Node(node))) => node.has_value(),
        Ok(Some(_)) => true,
        _ => false,
    }
}

fn distinct(input: Collection) -> Collection {
    let mut out = Collection::with_capacity(input.len());
    for item in input {
        out.push_distinct(item);
    }
    out
}

/// Direct children of a node: its element id, then every child node in
/// schema order. Values of other items have no children.
pub fn children(item: &Value) -> Vec<Value> {
    let Value::Node(node) = item else {
        return Vec::new();
    };
    let mut out = Vec::new();
    if let Some(id) = node.id() {
        out.push(Value::string(id));
    }
    for (_, field) in node.fields() {
        out.extend(field.nodes().iter().cloned().map(Value::node));
    }
    out
}

fn descendants(input: &Collection) -> Collection {
    let mut out = Collection::empty();
    let mut stack: Vec<Value> = input.iter().flat_map(children).rev().collect();
    while let Some(item) = stack.pop() {
        let nested = children(&item);
        out.push(item);
        stack.extend(nested.into_iter().rev());
    }
    out
}

fn extension(input: &Collection, url: &Collection) -> Result<Collection> {
    let Some(url) = url.as_string("extension() url")? else {
        return Ok(Collection::empty());
    };
    Ok(input
        .iter()
        .filter_map(Value::as_node)
        .flat_map(|node: &Node| node.extensions_by_url(url).cloned().collect::<Vec<_>>())
        .map(Value::node)
        .collect())
}

fn string_test(
    input: &Collection,
    arg: &Collection,
    name: &str,
    test: impl Fn(&str, &str) -> bool,
) -> Result<Collection> {
    let what = format!("{}()", name);
    match (input.as_string(&what)?, arg.as_string(&what)?) {
        (Some(s), Some(p)) => Ok(Collection::from_bool(Some(test(s, p)))),
        _ => Ok(Collection::empty()),
    }
}

static REGEX_CACHE: Lazy<Mutex<LruCache<String, Regex>>> = Lazy::new(|| {
    Mutex::new(LruCache::new(
        NonZeroUsize::new(64).unwrap_or(NonZeroUsize::MIN),
    ))
});

fn cached_regex(pattern: &str) -> Result<Regex> {
    let mut cache = REGEX_CACHE.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(regex) = cache.get(pattern) {
        return Ok(regex.clone());
    }
    let regex = Regex::new(pattern)
        .map_err(|e| Error::EvaluationError(format!("Invalid regex '{}': {}", pattern, e)))?;
    cache.put(pattern.to_string(), regex.clone());
    Ok(regex)
}

fn matches(input: &Collection, pattern: &Collection) -> Result<Collection> {
    match (
        input.as_string("matches()")?,
        pattern.as_string("matches()")?,
    ) {
        (Some(s), Some(p)) => Ok(Collection::from_bool(Some(cached_regex(p)?.is_match(s)))),
        _ => Ok(Collection::empty()),
    }
}

fn substring(input: &Collection, start: &Collection, length: Option<&Collection>) -> Result<Collection> {
    let (Some(s), Some(start)) = (
        input.as_string("substring()")?,
        start.as_integer("substring() start")?,
    ) else {
        return Ok(Collection::empty());
    };
    let chars: Vec<char> = s.chars().collect();
    if start < 0 || start as usize >= chars.len() {
        return Ok(Collection::empty());
    }
    let start = start as usize;
    let end = match length {
        Some(length) => match length.as_integer("substring() length")? {
            Some(n) if n <= 0 => start,
            Some(n) => (start + n as usize).min(chars.len()),
            None => chars.len(),
        },
        None => chars.len(),
    };
    Ok(Collection::singleton(Value::string(
        chars[start..end].iter().collect::<String>(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(value: &str) -> Collection {
        Collection::singleton(Value::string(value))
    }

    #[test]
    fn test_every_entry_is_named_after_its_key() {
        for (key, metadata) in FUNCTIONS_BY_NAME.entries() {
            assert_eq!(*key, metadata.name);
            assert!(metadata.min_args <= metadata.max_args);
        }
    }

    #[test]
    fn test_validate_call() {
        assert!(validate_call("where", 1).is_ok());
        assert!(matches!(
            validate_call("frobnicate", 0),
            Err(Error::FunctionNotFound(_))
        ));
        assert!(validate_call("substring", 3).is_err());
        assert_eq!(
            validate_call("memberOf", 2).unwrap().kind,
            FunctionKind::Unsupported
        );
    }

    #[test]
    fn test_substring() {
        assert_eq!(
            execute("substring", s("#org1"), &[Collection::singleton(Value::integer(1))]).unwrap(),
            s("org1")
        );
        assert_eq!(
            execute(
                "substring",
                s("abcdef"),
                &[
                    Collection::singleton(Value::integer(2)),
                    Collection::singleton(Value::integer(10))
                ]
            )
            .unwrap(),
            s("cdef")
        );
        assert!(execute("substring", s("abc"), &[Collection::singleton(Value::integer(3))])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_string_predicates() {
        assert_eq!(
            execute("startsWith", s("#x"), &[s("#")]).unwrap(),
            Collection::from_bool(Some(true))
        );
        assert!(execute("endsWith", Collection::empty(), &[s("x")])
            .unwrap()
            .is_empty());
        assert_eq!(
            execute("matches", s("abc-123"), &[s("^[a-z]+-[0-9]+$")]).unwrap(),
            Collection::from_bool(Some(true))
        );
        assert!(execute("matches", s("a"), &[s("(")]).is_err());
    }

    #[test]
    fn test_distinct() {
        let input: Collection = vec![Value::integer(1), Value::integer(1), Value::integer(2)]
            .into_iter()
            .collect();
        assert_eq!(execute("distinct", input.clone(), &[]).unwrap().len(), 2);
        assert_eq!(
            execute("isDistinct", input, &[]).unwrap(),
            Collection::from_bool(Some(false))
        );
    }
}
