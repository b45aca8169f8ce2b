//! Primitive values and their lexical rules

use crate::config::ModelConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::fmt;

const MAX_STRING_LENGTH: usize = 1024 * 1024;
const MAX_ID_LENGTH: usize = 64;

static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{4})(-(0[1-9]|1[0-2])(-(0[1-9]|[1-2][0-9]|3[0-1]))?)?$")
        .expect("date regex must compile")
});

static DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([0-9]{4})(-(0[1-9]|1[0-2])(-(0[1-9]|[1-2][0-9]|3[0-1])(T([01][0-9]|2[0-3]):[0-5][0-9]:([0-5][0-9]|60)(\.[0-9]{1,9})?(Z|[+-]((0[0-9]|1[0-3]):[0-5][0-9]|14:00)))?)?)?$",
    )
    .expect("dateTime regex must compile")
});

static INSTANT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([0-9]{4})-(0[1-9]|1[0-2])-(0[1-9]|[1-2][0-9]|3[0-1])T([01][0-9]|2[0-3]):[0-5][0-9]:([0-5][0-9]|60)(\.[0-9]{1,9})?(Z|[+-]((0[0-9]|1[0-3]):[0-5][0-9]|14:00))$",
    )
    .expect("instant regex must compile")
});

static TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]:([0-5][0-9]|60)(\.[0-9]{1,9})?$")
        .expect("time regex must compile")
});

static OID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^urn:oid:[0-2](\.(0|[1-9][0-9]*))+$")
        .expect("oid regex must compile")
});

static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^urn:uuid:[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("uuid regex must compile")
});

/// The value carried by a primitive-type node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrimitiveValue {
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    String(String),
}

impl PrimitiveValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => Some(*d),
            Self::Integer(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the representation, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Decimal(_) => "decimal",
            Self::String(_) => "string",
        }
    }
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for PrimitiveValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for PrimitiveValue {
    fn from(value: i32) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<i64> for PrimitiveValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for PrimitiveValue {
    fn from(value: u32) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<Decimal> for PrimitiveValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<&str> for PrimitiveValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PrimitiveValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Check if a type code names a FHIR primitive
pub fn is_primitive_type(type_name: &str) -> bool {
    matches!(
        type_name,
        "boolean"
            | "integer"
            | "unsignedInt"
            | "positiveInt"
            | "integer64"
            | "decimal"
            | "string"
            | "code"
            | "id"
            | "markdown"
            | "uri"
            | "url"
            | "canonical"
            | "oid"
            | "uuid"
            | "date"
            | "dateTime"
            | "instant"
            | "time"
            | "base64Binary"
            | "xhtml"
    )
}

/// Validate `value` against the representation and lexical rules of the
/// primitive type `type_code`. Returns a diagnostic message on failure.
pub fn check_primitive(
    type_code: &str,
    value: &PrimitiveValue,
    config: &ModelConfig,
) -> Result<(), String> {
    match (type_code, value) {
        ("boolean", PrimitiveValue::Boolean(_)) => Ok(()),
        ("integer", PrimitiveValue::Integer(i)) => {
            if i32::try_from(*i).is_err() {
                return Err(format!("Integer value: {} is out of range", i));
            }
            Ok(())
        }
        ("integer64", PrimitiveValue::Integer(_)) => Ok(()),
        ("positiveInt", PrimitiveValue::Integer(i)) => check_min(*i, 1, config),
        ("unsignedInt", PrimitiveValue::Integer(i)) => check_min(*i, 0, config),
        ("decimal", PrimitiveValue::Decimal(_)) => Ok(()),
        (code, PrimitiveValue::String(s)) if is_string_like(code) => {
            if config.check_primitive_values {
                check_lexical(code, s, config)
            } else {
                Ok(())
            }
        }
        (code, _) if !is_primitive_type(code) => Ok(()),
        (code, other) => Err(format!(
            "Invalid value type: {} for primitive type: {}",
            other.kind_name(),
            code
        )),
    }
}

fn is_string_like(code: &str) -> bool {
    matches!(
        code,
        "string"
            | "markdown"
            | "code"
            | "id"
            | "uri"
            | "url"
            | "canonical"
            | "oid"
            | "uuid"
            | "date"
            | "dateTime"
            | "instant"
            | "time"
            | "base64Binary"
            | "xhtml"
    )
}

fn check_min(value: i64, min: i64, config: &ModelConfig) -> Result<(), String> {
    if i32::try_from(value).is_err() {
        return Err(format!("Integer value: {} is out of range", value));
    }
    if config.check_primitive_values && value < min {
        return Err(format!(
            "Integer value: {} is less than minimum required value: {}",
            value, min
        ));
    }
    Ok(())
}

fn check_lexical(code: &str, s: &str, config: &ModelConfig) -> Result<(), String> {
    match code {
        "string" | "markdown" => check_string(s, config),
        "code" => check_code(s, config),
        "id" => check_id(s),
        "uri" | "url" | "canonical" => check_uri(s, config),
        "oid" => check_pattern(s, &OID, "oid"),
        "uuid" => check_pattern(s, &UUID, "uuid"),
        "date" => check_pattern(s, &DATE, "date"),
        "dateTime" => check_pattern(s, &DATE_TIME, "dateTime"),
        "instant" => check_pattern(s, &INSTANT, "instant"),
        "time" => check_pattern(s, &TIME, "time"),
        "base64Binary" => check_base64(s),
        _ => Ok(()),
    }
}

fn is_unsupported_control(ch: char) -> bool {
    (ch as u32) < 32 && !matches!(ch, '\t' | '\n' | '\r')
}

/// `[ \r\n\t\S]+`, at most 1MB, at least one non-whitespace character.
pub fn check_string(s: &str, config: &ModelConfig) -> Result<(), String> {
    let length = s.chars().count();
    if length > MAX_STRING_LENGTH {
        return Err(format!(
            "String value length: {} is greater than maximum allowed length: {}",
            length, MAX_STRING_LENGTH
        ));
    }
    let mut count = 0;
    for ch in s.chars() {
        if matches!(ch, ' ' | '\t' | '\r' | '\n') {
            continue;
        }
        if ch.is_whitespace() {
            return Err(format!(
                "String value: '{}' is not valid with respect to pattern: [ \\r\\n\\t\\S]+",
                s
            ));
        }
        if config.check_control_chars && is_unsupported_control(ch) {
            return Err("String value contains unsupported control characters".to_string());
        }
        count += 1;
    }
    if count < 1 {
        return Err(format!(
            "Trimmed String value length: {} is less than minimum required length: 1",
            count
        ));
    }
    Ok(())
}

/// `[^\s]+(\s[^\s]+)*`
pub fn check_code(s: &str, config: &ModelConfig) -> Result<(), String> {
    let first = s.chars().next();
    if first.map_or(true, char::is_whitespace) {
        return Err(format!(
            "Code value: '{}' must begin with a non-whitespace character",
            s
        ));
    }
    if s.chars().last().map_or(false, char::is_whitespace) {
        return Err(format!(
            "Code value: '{}' must end with a non-whitespace character",
            s
        ));
    }
    let mut previous_is_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if ch != ' ' {
                return Err(format!(
                    "Code value: '{}' must not contain whitespace other than a single space",
                    s
                ));
            }
            if previous_is_space {
                return Err(format!(
                    "Code value: '{}' must not contain consecutive spaces",
                    s
                ));
            }
            previous_is_space = true;
        } else {
            if config.check_control_chars && is_unsupported_control(ch) {
                return Err("Code value contains unsupported control characters".to_string());
            }
            previous_is_space = false;
        }
    }
    Ok(())
}

/// `[A-Za-z0-9\-\.]{1,64}`
pub fn check_id(s: &str) -> Result<(), String> {
    if s.is_empty() {
        return Err("Id value must not be empty".to_string());
    }
    if s.len() > MAX_ID_LENGTH {
        return Err(format!(
            "Id value length: {} is greater than maximum allowed length: {}",
            s.len(),
            MAX_ID_LENGTH
        ));
    }
    if let Some(c) = s
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '.'))
    {
        return Err(format!("Id value: '{}' contain invalid character '{}'", s, c));
    }
    Ok(())
}

pub fn check_uri(s: &str, config: &ModelConfig) -> Result<(), String> {
    if s.chars().count() > MAX_STRING_LENGTH {
        return Err(format!(
            "Uri value length: {} is greater than maximum allowed length: {}",
            s.chars().count(),
            MAX_STRING_LENGTH
        ));
    }
    for ch in s.chars() {
        if config.check_control_chars && is_unsupported_control(ch) {
            return Err("Uri value contains unsupported control characters".to_string());
        }
        if ch.is_whitespace() {
            return Err(format!("Uri value: '{}' must not contain whitespace", s));
        }
    }
    Ok(())
}

fn check_pattern(s: &str, pattern: &Regex, type_name: &str) -> Result<(), String> {
    if pattern.is_match(s) {
        Ok(())
    } else {
        Err(format!("Value: '{}' is not a valid {}", s, type_name))
    }
}

pub fn check_base64(s: &str) -> Result<(), String> {
    if s.len() % 4 != 0 {
        return Err(format!("Invalid base64 string length: {}", s.len()));
    }
    let padding_start = s.trim_end_matches('=').len();
    if s.len() - padding_start > 2 {
        return Err("Invalid base64 string: too much padding".to_string());
    }
    for (index, ch) in s.char_indices() {
        if ch == '=' {
            if index < padding_start {
                return Err(format!(
                    "Unexpected base64 padding character: '=' found at index: {}",
                    index
                ));
            }
        } else if !(ch.is_ascii_alphanumeric() || ch == '+' || ch == '/') {
            return Err(format!(
                "Illegal base64 character: '{}' found at index: {}",
                ch, index
            ));
        }
    }
    Ok(())
}
