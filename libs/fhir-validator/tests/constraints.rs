//! Constraint evaluation over built nodes

use ferrum_model::{datatypes, schema, Builder, ModelConfig, Node, TypeRegistry};
use ferrum_validator::{
    BuildError, ConstraintLevel, ConstraintValidator, ConstraintsConfig, IssueCode,
    IssueSeverity, Preset,
};
use std::sync::Arc;

fn organization(id: &str) -> Node {
    schema::core()
        .builder("Organization")
        .unwrap()
        .id(id)
        .set_value("name", "Acme Insurance")
        .build()
        .unwrap()
}

fn coverage_builder() -> Builder {
    schema::core()
        .builder("Coverage")
        .unwrap()
        .id("cov1")
        .add("contained", organization("org1"))
        .set_value("status", "active")
        .set("beneficiary", datatypes::reference("Patient/p1").unwrap())
        .add("payor", datatypes::reference("#org1").unwrap())
        .set(
            "period",
            datatypes::period(Some("2024-01-01"), Some("2024-12-31")).unwrap(),
        )
}

fn coverage() -> Node {
    coverage_builder().build().unwrap()
}

fn validator(preset: Preset) -> ConstraintValidator {
    ConstraintValidator::from_config(&ConstraintsConfig::preset(preset)).unwrap()
}

#[test]
fn well_formed_coverage_has_no_errors() {
    let outcome = validator(Preset::Strict).validate(&coverage());
    assert!(outcome.valid, "{:?}", outcome.issues);
    assert_eq!(outcome.error_count(), 0);
    assert_eq!(outcome.resource_type.as_deref(), Some("Coverage"));

    // no narrative on the resource nor on the contained organization
    let dom6: Vec<&str> = outcome
        .issues_for("dom-6")
        .filter_map(|i| i.location.as_deref())
        .collect();
    assert_eq!(dom6, vec!["Coverage", "Coverage.contained[0]"]);
    assert_eq!(outcome.warning_count(), 2);
}

#[test]
fn reversed_period_fails_per_1() {
    let node = coverage_builder()
        .set(
            "period",
            datatypes::period(Some("2024-12-31"), Some("2024-01-01")).unwrap(),
        )
        .build()
        .unwrap();
    let outcome = validator(Preset::Strict).validate(&node);
    assert!(!outcome.valid);
    let issue = outcome.issues_for("per-1").next().unwrap();
    assert_eq!(issue.severity, IssueSeverity::Error);
    assert_eq!(issue.code, IssueCode::Invariant);
    assert_eq!(issue.location.as_deref(), Some("Coverage.period"));
    assert!(issue.diagnostics.contains("per-1"));
}

#[test]
fn dangling_local_reference_fails_ref_1() {
    let node = coverage_builder()
        .add("payor", datatypes::reference("#nowhere").unwrap())
        .build()
        .unwrap();
    let outcome = validator(Preset::Lenient).validate(&node);
    let locations: Vec<&str> = outcome
        .issues_for("ref-1")
        .filter_map(|i| i.location.as_deref())
        .collect();
    assert_eq!(locations, vec!["Coverage.payor[1]"]);
}

#[test]
fn unreferenced_contained_resource_fails_dom_3() {
    let node = coverage_builder()
        .replace(
            "payor",
            vec![datatypes::reference("Organization/o2").unwrap()],
        )
        .build()
        .unwrap();
    let outcome = validator(Preset::Lenient).validate(&node);
    let issue = outcome.issues_for("dom-3").next().unwrap();
    assert_eq!(issue.location.as_deref(), Some("Coverage"));
}

#[test]
fn references_inside_contained_resources_resolve_against_the_root() {
    let partner = schema::core()
        .builder("Organization")
        .unwrap()
        .id("org2")
        .set_value("name", "Partner")
        .set("partOf", datatypes::reference("#org1").unwrap())
        .build()
        .unwrap();
    let node = coverage_builder()
        .add("contained", partner)
        .add("payor", datatypes::reference("#org2").unwrap())
        .build()
        .unwrap();
    let outcome = validator(Preset::Strict).validate(&node);
    assert_eq!(outcome.error_count(), 0, "{:?}", outcome.issues);
}

#[test]
fn organization_needs_name_or_identifier() {
    let org = schema::core()
        .builder("Organization")
        .unwrap()
        .set_value("active", true)
        .build()
        .unwrap();
    let outcome = validator(Preset::Lenient).validate(&org);
    assert_eq!(outcome.issues_for("org-1").count(), 1);
}

#[test]
fn extension_with_value_and_children_fails_ext_1() {
    let nested = datatypes::extension("http://example.org/inner", datatypes::string("x").unwrap())
        .unwrap();
    let ext = datatypes::extension("http://example.org/outer", datatypes::string("y").unwrap())
        .unwrap()
        .to_builder()
        .extension(nested)
        .build()
        .unwrap();
    let outcome = validator(Preset::Lenient).validate(&ext);
    let locations: Vec<&str> = outcome
        .issues_for("ext-1")
        .filter_map(|i| i.location.as_deref())
        .collect();
    assert_eq!(locations, vec!["Extension"]);
}

#[test]
fn trusted_input_is_still_linted() {
    let trusted = Arc::new(TypeRegistry::with_core_types().with_config(ModelConfig::trusted()));
    let empty = trusted.builder("Period").unwrap().id("p1").build().unwrap();
    let outcome = validator(Preset::Lenient).validate(&empty);
    assert_eq!(outcome.issues_for("ele-1").count(), 1);
}

#[test]
fn member_of_is_reported_as_not_evaluated() {
    let class = schema::core()
        .builder("Coverage.class")
        .unwrap()
        .set(
            "type",
            datatypes::codeable_concept("http://terminology.hl7.org/CodeSystem/coverage-class", "group")
                .unwrap(),
        )
        .set_value("value", "CB135")
        .build()
        .unwrap();
    let node = coverage_builder().add("class", class).build().unwrap();

    let outcome = validator(Preset::Strict).validate(&node);
    let issue = outcome.issues_for("coverage-2").next().unwrap();
    assert_eq!(issue.severity, IssueSeverity::Information);
    assert_eq!(issue.code, IssueCode::NotSupported);
    assert_eq!(issue.location.as_deref(), Some("Coverage.class[0].type"));
    assert!(outcome.valid);

    // warnings are not evaluated at all under the lenient preset
    let lenient = validator(Preset::Lenient).validate(&node);
    assert_eq!(lenient.issues_for("coverage-2").count(), 0);
}

#[test]
fn lenient_reports_rules_without_rejecting() {
    let node = coverage_builder()
        .set(
            "period",
            datatypes::period(Some("2024-12-31"), Some("2024-01-01")).unwrap(),
        )
        .build()
        .unwrap();
    let outcome = validator(Preset::Lenient).validate(&node);
    assert!(outcome.valid);
    assert_eq!(outcome.error_count(), 1);
    assert_eq!(outcome.warning_count(), 0);
}

#[test]
fn off_preset_reports_nothing() {
    let node = coverage_builder()
        .add("payor", datatypes::reference("#nowhere").unwrap())
        .build()
        .unwrap();
    let outcome = validator(Preset::Off).validate(&node);
    assert!(outcome.valid);
    assert!(outcome.issues.is_empty());
}

#[test]
fn suppress_and_level_overrides_apply() {
    let node = coverage_builder()
        .set(
            "period",
            datatypes::period(Some("2024-12-31"), Some("2024-01-01")).unwrap(),
        )
        .add("payor", datatypes::reference("#nowhere").unwrap())
        .build()
        .unwrap();
    let cfg = ConstraintsConfig::builder()
        .preset(Preset::Strict)
        .suppress("ref-1")
        .level_override("per-1", ConstraintLevel::Warning)
        .suppress("dom-6")
        .build();
    let outcome = ConstraintValidator::from_config(&cfg).unwrap().validate(&node);
    assert!(outcome.valid, "{:?}", outcome.issues);
    assert_eq!(outcome.issues_for("ref-1").count(), 0);
    assert_eq!(
        outcome.issues_for("per-1").next().map(|i| i.severity),
        Some(IssueSeverity::Warning)
    );
}

#[test]
fn without_recursion_only_root_constraints_run() {
    let node = coverage_builder()
        .set(
            "period",
            datatypes::period(Some("2024-12-31"), Some("2024-01-01")).unwrap(),
        )
        .build()
        .unwrap();
    let cfg = ConstraintsConfig::builder()
        .preset(Preset::Strict)
        .recurse(false)
        .build();
    let outcome = ConstraintValidator::from_config(&cfg).unwrap().validate(&node);
    assert_eq!(outcome.issues_for("per-1").count(), 0);
    assert_eq!(outcome.issues_for("dom-6").count(), 1);
}

#[test]
fn max_issues_caps_the_outcome() {
    let node = coverage_builder()
        .add("payor", datatypes::reference("#a").unwrap())
        .add("payor", datatypes::reference("#b").unwrap())
        .add("payor", datatypes::reference("#c").unwrap())
        .build()
        .unwrap();
    let cfg = ConstraintsConfig::builder().max_issues(2).build();
    let outcome = ConstraintValidator::from_config(&cfg).unwrap().validate(&node);
    assert_eq!(outcome.issues.len(), 2);
}

#[test]
fn build_rejects_failing_rules_only_when_strict() {
    let strict = validator(Preset::Strict);
    let bad = coverage_builder().set(
        "period",
        datatypes::period(Some("2024-12-31"), Some("2024-01-01")).unwrap(),
    );
    match strict.build(bad.clone()) {
        Err(BuildError::Constraints(outcome)) => assert_eq!(outcome.error_count(), 1),
        other => panic!("expected constraint rejection, got {:?}", other.map(|(n, _)| n)),
    }
    assert!(validator(Preset::Lenient).build(bad).is_ok());

    // warnings alone never block
    let (node, outcome) = strict.build(coverage_builder()).unwrap();
    assert_eq!(node.type_name(), "Coverage");
    assert!(outcome.warning_count() > 0);

    let structural = strict.build(schema::core().builder("Coverage").unwrap());
    assert!(matches!(structural, Err(BuildError::Structural(_))));
}

#[test]
fn batch_validation_keeps_order() {
    let nodes = vec![
        coverage(),
        datatypes::period(Some("2024-12-31"), Some("2024-01-01")).unwrap(),
    ];
    let outcomes = validator(Preset::Strict).validate_batch(&nodes);
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].valid);
    assert!(!outcomes[1].valid);
    assert_eq!(outcomes[1].resource_type.as_deref(), Some("Period"));
}

#[test]
fn operation_outcome_lists_every_issue() {
    let node = coverage_builder()
        .add("payor", datatypes::reference("#nowhere").unwrap())
        .build()
        .unwrap();
    let outcome = validator(Preset::Strict).validate(&node);
    let json = outcome.to_operation_outcome();
    assert_eq!(json["resourceType"], "OperationOutcome");
    let issues = json["issue"].as_array().unwrap();
    assert_eq!(issues.len(), outcome.issues.len());
    assert!(issues
        .iter()
        .any(|i| i["severity"] == "error" && i["expression"][0] == "Coverage.payor[1]"));
}

#[test]
fn shared_engine_caches_expressions() {
    let engine = Arc::new(ferrum_fhirpath::Engine::new());
    let plan = ConstraintsConfig::preset(Preset::Strict).compile().unwrap();
    let a = ConstraintValidator::with_engine(plan.clone(), engine.clone());
    let b = ConstraintValidator::with_engine(plan, engine.clone());
    a.validate(&coverage());
    let cached = engine.cached();
    assert!(cached > 0);
    b.validate(&coverage());
    assert_eq!(engine.cached(), cached);
}
