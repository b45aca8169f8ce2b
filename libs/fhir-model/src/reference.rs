//! Reference target kinds
//!
//! A reference is a weak pointer: the framework never resolves it. The kind
//! of resource it points at is inferred from the payload when that is
//! possible (relative literal, conditional reference, explicit
//! `Reference.type`) and checked against the field's whitelist. A payload
//! that reveals no kind (fragment, absolute URI, identifier only) is never
//! an error.

use crate::error::StructuralViolation;
use crate::node::Node;
use crate::resource_type::is_resource_type;
use crate::schema::{extract_type_name_from_url, TypeRegistry};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RELATIVE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]+)/[A-Za-z0-9\-.]{1,64}(/_history/[A-Za-z0-9\-.]{1,64})?$")
        .expect("reference regex must compile")
});

/// True if the literal starts with a URI scheme (`urn:`, `http:`) followed
/// by a non-empty remainder.
fn has_scheme(literal: &str) -> bool {
    let Some(index) = literal.find(':') else {
        return false;
    };
    let scheme = &literal[..index];
    let mut chars = scheme.chars();
    chars.next().map_or(false, |c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && literal.len() > index + 1
}

/// Resource type named by a reference literal, if it can be read from the
/// literal alone. Fragments (`#p1`) and absolute URIs give `None`.
pub fn infer_literal_kind(literal: &str) -> Option<String> {
    literal_candidate(literal)
        .filter(|c| is_resource_type(c))
        .map(str::to_string)
}

fn literal_candidate(literal: &str) -> Option<&str> {
    if literal.starts_with('#') || has_scheme(literal) {
        return None;
    }
    match literal.find('?') {
        Some(index) => Some(&literal[..index]),
        None => RELATIVE_REFERENCE
            .captures(literal)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str()),
    }
}

/// Resource type a `Reference` node points at, from its literal or, failing
/// that, its explicit `type`.
pub fn reference_kind(reference: &Node) -> Option<String> {
    reference
        .string_value("reference")
        .and_then(infer_literal_kind)
        .or_else(|| declared_kind(reference))
}

fn declared_kind(reference: &Node) -> Option<String> {
    reference
        .string_value("type")
        .map(extract_type_name_from_url)
}

fn is_known_resource(name: &str, registry: &TypeRegistry) -> bool {
    is_resource_type(name) || registry.get_type(name).map_or(false, |t| t.is_resource())
}

/// Check a `Reference` node placed at `path` against `targets`. An empty
/// whitelist, or one containing `Resource`, allows any kind.
pub(crate) fn check_reference(
    reference: &Node,
    targets: &[String],
    path: &str,
    registry: &TypeRegistry,
) -> Vec<StructuralViolation> {
    let mut violations = Vec::new();
    if !registry.config().check_reference_types {
        debug!(%path, "reference type checks disabled");
        return violations;
    }

    let any = targets.is_empty() || targets.iter().any(|t| t == "Resource");
    let literal = reference.string_value("reference");
    let literal_kind = literal
        .and_then(literal_candidate)
        .filter(|c| is_known_resource(c, registry))
        .map(str::to_string);

    if literal.is_some() && literal_kind.is_none() {
        debug!(%path, literal = ?literal, "reference kind not determinable");
    }

    if let Some(kind) = &literal_kind {
        if !any && !targets.contains(kind) {
            violations.push(StructuralViolation::ReferenceTypeViolation {
                path: path.to_string(),
                actual: kind.clone(),
                allowed: targets.to_vec(),
            });
        }
    }

    if let Some(declared) = declared_kind(reference) {
        if is_known_resource(&declared, registry) && !any && !targets.contains(&declared) {
            violations.push(StructuralViolation::ReferenceTypeViolation {
                path: path.to_string(),
                actual: declared.clone(),
                allowed: targets.to_vec(),
            });
        }
        if let (Some(kind), Some(literal)) = (&literal_kind, literal) {
            if *kind != declared {
                violations.push(StructuralViolation::ReferenceTypeMismatch {
                    path: path.to_string(),
                    literal: literal.to_string(),
                    declared,
                });
            }
        }
    }

    violations
}
