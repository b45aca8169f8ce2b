//! Reference target whitelists

use ferrum_model::reference::reference_kind;
use ferrum_model::{
    datatypes, schema, Cardinality, ModelConfig, Property, PropertyType, StructuralViolation,
    TypeDefinition, TypeKind, TypeRegistry,
};
use std::sync::Arc;

/// Registry with a `Measure` resource whose `subject` may point at a
/// Patient or a Group only.
fn subject_registry(config: ModelConfig) -> Arc<TypeRegistry> {
    let mut registry = TypeRegistry::with_core_types().with_config(config);
    let mut measure = registry.get_type("Contract").unwrap().as_ref().clone();
    measure.name = "Measure".to_string();
    measure.url = Some("http://example.org/StructureDefinition/Measure".to_string());
    measure.constraints.clear();
    measure.properties.retain(|p| p.name != "subject");
    measure.properties.push(Property::new(
        "subject",
        vec![PropertyType::reference(&["Patient", "Group"])],
        Cardinality::optional(),
    ));
    registry.add_type(measure);
    Arc::new(registry)
}

fn measure_with_subject(registry: &Arc<TypeRegistry>, reference: ferrum_model::Node) -> ferrum_model::Result<ferrum_model::Node> {
    registry
        .builder("Measure")?
        .set("subject", reference)
        .build()
}

#[test]
fn kind_outside_whitelist_is_rejected() {
    let registry = subject_registry(ModelConfig::default());
    let err = measure_with_subject(&registry, datatypes::reference("Organization/o1").unwrap())
        .unwrap_err();
    assert_eq!(
        err.violations(),
        &[StructuralViolation::ReferenceTypeViolation {
            path: "Measure.subject".to_string(),
            actual: "Organization".to_string(),
            allowed: vec!["Patient".to_string(), "Group".to_string()],
        }]
    );
}

#[test]
fn allowed_kinds_pass() {
    let registry = subject_registry(ModelConfig::default());
    for literal in ["Patient/p1", "Group/g1", "Patient/p1/_history/3", "Group?name=cohort"] {
        assert!(
            measure_with_subject(&registry, datatypes::reference(literal).unwrap()).is_ok(),
            "{} should be allowed",
            literal
        );
    }
}

#[test]
fn undeterminable_kinds_never_fail() {
    let registry = subject_registry(ModelConfig::default());
    for literal in [
        "urn:uuid:9d3e8a1e-5d44-4bfc-8b61-3c6f1c2d8b10",
        "#contained-1",
        "http://example.org/fhir/Organization/o1",
        "some-opaque-token",
    ] {
        assert!(
            measure_with_subject(&registry, datatypes::reference(literal).unwrap()).is_ok(),
            "{} should not be checked",
            literal
        );
    }

    let by_identifier = registry
        .builder("Reference")
        .unwrap()
        .set("identifier", datatypes::identifier("urn:sys", "42").unwrap())
        .build()
        .unwrap();
    assert!(measure_with_subject(&registry, by_identifier).is_ok());
}

#[test]
fn conditional_reference_kind_is_checked() {
    let registry = subject_registry(ModelConfig::default());
    let err = measure_with_subject(
        &registry,
        datatypes::reference("Organization?identifier=urn:sys|1").unwrap(),
    )
    .unwrap_err();
    assert_eq!(err.violations()[0].kind(), "ReferenceTypeViolation");
}

#[test]
fn explicit_type_is_checked_and_must_agree() {
    let registry = subject_registry(ModelConfig::default());

    let absolute = datatypes::typed_reference("http://example.org/fhir/Organization/o1", "Organization")
        .unwrap();
    let err = measure_with_subject(&registry, absolute).unwrap_err();
    assert_eq!(err.violations()[0].kind(), "ReferenceTypeViolation");

    let mismatch = datatypes::typed_reference("Patient/p1", "Group").unwrap();
    let err = measure_with_subject(&registry, mismatch).unwrap_err();
    assert_eq!(
        err.violations(),
        &[StructuralViolation::ReferenceTypeMismatch {
            path: "Measure.subject".to_string(),
            literal: "Patient/p1".to_string(),
            declared: "Group".to_string(),
        }]
    );
}

#[test]
fn checks_can_be_disabled() {
    let registry = subject_registry(ModelConfig {
        check_reference_types: false,
        ..ModelConfig::default()
    });
    assert!(
        measure_with_subject(&registry, datatypes::reference("Organization/o1").unwrap()).is_ok()
    );
}

#[test]
fn any_resource_reference_accepts_every_kind() {
    let contract = schema::core()
        .builder("Contract")
        .unwrap()
        .add("subject", datatypes::reference("Organization/o1").unwrap())
        .add("subject", datatypes::reference("Coverage/c1").unwrap())
        .build()
        .unwrap();
    assert_eq!(contract.field("subject").len(), 2);
}

#[test]
fn list_violation_path_carries_index() {
    let err = schema::core()
        .builder("Coverage")
        .unwrap()
        .set_value("status", "active")
        .set("beneficiary", datatypes::reference("Patient/p1").unwrap())
        .add("payor", datatypes::reference("Organization/o1").unwrap())
        .add("payor", datatypes::reference("Group/g1").unwrap())
        .build()
        .unwrap_err();
    assert_eq!(err.violations()[0].path(), "Coverage.payor[1]");
}

#[test]
fn reference_kind_prefers_literal() {
    let typed = datatypes::typed_reference("urn:uuid:1", "Patient").unwrap();
    assert_eq!(reference_kind(&typed).as_deref(), Some("Patient"));
    let relative = datatypes::reference("Organization/o1").unwrap();
    assert_eq!(reference_kind(&relative).as_deref(), Some("Organization"));
    assert_eq!(reference_kind(&datatypes::reference("#x").unwrap()), None);
}
