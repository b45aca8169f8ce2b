//! Property-based tests using QuickCheck

use ferrum_model::{datatypes, schema, Node, StructuralViolation, TraceVisitor};
use quickcheck::{QuickCheck, TestResult};

const STATUSES: &[&str] = &["active", "cancelled", "draft", "entered-in-error"];
const PAYORS: &[&str] = &["Organization/o1", "Patient/p1", "RelatedPerson/r1"];

/// Keep characters an `id`-like value accepts.
fn sanitize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .take(32)
        .collect()
}

fn coverage(status: usize, payors: &[u8], identifiers: &[String]) -> Option<Node> {
    let mut builder = schema::core()
        .builder("Coverage")
        .ok()?
        .set_value("status", STATUSES[status % STATUSES.len()])
        .set("beneficiary", datatypes::reference("Patient/p1").ok()?);
    for p in payors {
        builder = builder.add(
            "payor",
            datatypes::reference(PAYORS[*p as usize % PAYORS.len()]).ok()?,
        );
    }
    for value in identifiers.iter().map(|s| sanitize(s)).filter(|s| !s.is_empty()) {
        builder = builder.add("identifier", datatypes::identifier("urn:sys", &value).ok()?);
    }
    builder.build().ok()
}

/// Property: rebuilding a node from its own builder is an identity on
/// content and hash
#[test]
fn prop_builder_round_trip() {
    fn prop(status: usize, payors: Vec<u8>, identifiers: Vec<String>) -> TestResult {
        if payors.is_empty() {
            return TestResult::discard();
        }
        let Some(node) = coverage(status, &payors, &identifiers) else {
            return TestResult::failed();
        };
        let copy = match node.to_builder().build() {
            Ok(copy) => copy,
            Err(_) => return TestResult::failed(),
        };
        TestResult::from_bool(node == copy && node.hash_code() == copy.hash_code())
    }

    QuickCheck::new()
        .tests(100)
        .quickcheck(prop as fn(usize, Vec<u8>, Vec<String>) -> TestResult);
}

/// Property: two traversals of the same node produce the same callbacks
#[test]
fn prop_traversal_deterministic() {
    fn prop(status: usize, payors: Vec<u8>, identifiers: Vec<String>) -> TestResult {
        if payors.is_empty() {
            return TestResult::discard();
        }
        let Some(node) = coverage(status, &payors, &identifiers) else {
            return TestResult::failed();
        };
        let mut first = TraceVisitor::new();
        let mut second = TraceVisitor::new();
        node.walk(&mut first);
        node.walk(&mut second);
        TestResult::from_bool(first.events == second.events)
    }

    QuickCheck::new()
        .tests(100)
        .quickcheck(prop as fn(usize, Vec<u8>, Vec<String>) -> TestResult);
}

/// Property: an empty payor list is always reported as a missing required
/// element, whatever else is set
#[test]
fn prop_missing_payor_named_exactly() {
    fn prop(status: usize, identifiers: Vec<String>) -> TestResult {
        let mut builder = schema::core()
            .builder("Coverage")
            .unwrap()
            .set_value("status", STATUSES[status % STATUSES.len()])
            .set("beneficiary", datatypes::reference("Patient/p1").unwrap());
        for value in identifiers.iter().map(|s| sanitize(s)).filter(|s| !s.is_empty()) {
            builder = builder.add("identifier", datatypes::identifier("urn:sys", &value).unwrap());
        }
        match builder.build() {
            Err(err) => TestResult::from_bool(
                err.violations()
                    == [StructuralViolation::MissingRequiredField {
                        path: "Coverage.payor".to_string(),
                    }],
            ),
            Ok(_) => TestResult::failed(),
        }
    }

    QuickCheck::new()
        .tests(100)
        .quickcheck(prop as fn(usize, Vec<String>) -> TestResult);
}

/// Property: equal content gives equal hashes, computed independently
#[test]
fn prop_equal_nodes_hash_equal() {
    fn prop(system: String, code: String) -> TestResult {
        let system = format!("urn:{}", sanitize(&system));
        let code = sanitize(&code);
        if code.is_empty() {
            return TestResult::discard();
        }
        let a = datatypes::coding(&system, &code).unwrap();
        let b = datatypes::coding(&system, &code).unwrap();
        TestResult::from_bool(a == b && a.hash_code() == b.hash_code())
    }

    QuickCheck::new()
        .tests(100)
        .quickcheck(prop as fn(String, String) -> TestResult);
}
