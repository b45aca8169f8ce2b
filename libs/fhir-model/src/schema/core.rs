//! Built-in core schema
//!
//! FHIR R4 base types, primitives, the common datatypes and a handful of
//! resources, with the invariants the base specification declares on them.
//! Larger schemas are loaded from StructureDefinitions with
//! [`super::parser`].

use super::{
    Cardinality, Constraint, Property, PropertyType, TypeDefinition, TypeKind, TypeRegistry,
};
use once_cell::sync::Lazy;
use std::sync::Arc;

const SD: &str = "http://hl7.org/fhir/StructureDefinition/";

static CORE: Lazy<Arc<TypeRegistry>> = Lazy::new(|| Arc::new(build_core()));

/// Shared registry holding the built-in core schema with the default
/// [`crate::ModelConfig`].
pub fn core() -> Arc<TypeRegistry> {
    Arc::clone(&CORE)
}

const PRIMITIVES: &[&str] = &[
    "boolean",
    "integer",
    "unsignedInt",
    "positiveInt",
    "decimal",
    "string",
    "code",
    "id",
    "markdown",
    "uri",
    "url",
    "canonical",
    "oid",
    "uuid",
    "date",
    "dateTime",
    "instant",
    "time",
    "base64Binary",
];

/// Types an `Extension.value[x]` may hold in this schema.
const EXTENSION_VALUE_TYPES: &[&str] = &[
    "base64Binary",
    "boolean",
    "canonical",
    "code",
    "date",
    "dateTime",
    "decimal",
    "id",
    "instant",
    "integer",
    "markdown",
    "oid",
    "positiveInt",
    "string",
    "time",
    "unsignedInt",
    "uri",
    "url",
    "uuid",
    "CodeableConcept",
    "Coding",
    "Identifier",
    "Money",
    "Period",
    "Quantity",
    "Reference",
];

fn prop(name: &str, code: &str, cardinality: Cardinality) -> Property {
    Property::new(name, vec![PropertyType::new(code)], cardinality)
}

fn opt(name: &str, code: &str) -> Property {
    prop(name, code, Cardinality::optional())
}

fn req(name: &str, code: &str) -> Property {
    prop(name, code, Cardinality::required())
}

fn many(name: &str, code: &str) -> Property {
    prop(name, code, Cardinality::many())
}

fn reference(name: &str, targets: &[&str], cardinality: Cardinality) -> Property {
    Property::new(name, vec![PropertyType::reference(targets)], cardinality)
}

fn choice(name: &str, codes: &[&str], cardinality: Cardinality) -> Property {
    Property::new(
        name,
        codes.iter().map(|c| PropertyType::new(*c)).collect(),
        cardinality,
    )
}

fn element_properties() -> Vec<Property> {
    vec![many("extension", "Extension")]
}

fn backbone_properties() -> Vec<Property> {
    vec![
        many("extension", "Extension"),
        many("modifierExtension", "Extension").modifier(),
    ]
}

fn resource_properties() -> Vec<Property> {
    vec![
        opt("meta", "Meta").summary(),
        opt("implicitRules", "uri").modifier().summary(),
        opt("language", "code"),
    ]
}

fn domain_resource_properties() -> Vec<Property> {
    let mut properties = resource_properties();
    properties.extend([
        opt("text", "Narrative"),
        many("contained", "Resource"),
        many("extension", "Extension"),
        many("modifierExtension", "Extension").modifier(),
    ]);
    properties
}

fn complex(name: &str, own: Vec<Property>) -> TypeDefinition {
    let mut def = TypeDefinition::new(name, TypeKind::ComplexType);
    def.url = Some(format!("{}{}", SD, name));
    def.base_type = Some("Element".to_string());
    def.properties = element_properties();
    def.properties.extend(own);
    def
}

fn backbone(name: &str, own: Vec<Property>) -> TypeDefinition {
    let mut def = TypeDefinition::new(name, TypeKind::BackboneElement);
    def.base_type = Some("BackboneElement".to_string());
    def.properties = backbone_properties();
    def.properties.extend(own);
    def
}

fn resource(name: &str, own: Vec<Property>) -> TypeDefinition {
    let mut def = TypeDefinition::new(name, TypeKind::Resource);
    def.url = Some(format!("{}{}", SD, name));
    def.base_type = Some("DomainResource".to_string());
    def.properties = domain_resource_properties();
    def.properties.extend(own);
    def
}

fn primitive(name: &str) -> TypeDefinition {
    let mut def = TypeDefinition::new(name, TypeKind::PrimitiveType);
    def.url = Some(format!("{}{}", SD, name));
    def.base_type = Some("Element".to_string());
    def.properties = element_properties();
    def
}

fn base_types() -> Vec<TypeDefinition> {
    let mut element = TypeDefinition::new("Element", TypeKind::ComplexType);
    element.url = Some(format!("{}Element", SD));
    element.is_abstract = true;
    element.properties = element_properties();
    element.constraints.push(
        Constraint::rule(
            "ele-1",
            "All FHIR elements must have a @value or children",
            "hasValue() or (children().count() > id.count())",
        )
        .with_source(&format!("{}Element", SD)),
    );

    let mut backbone_element = TypeDefinition::new("BackboneElement", TypeKind::ComplexType);
    backbone_element.url = Some(format!("{}BackboneElement", SD));
    backbone_element.base_type = Some("Element".to_string());
    backbone_element.is_abstract = true;
    backbone_element.properties = backbone_properties();

    let mut resource = TypeDefinition::new("Resource", TypeKind::Resource);
    resource.url = Some(format!("{}Resource", SD));
    resource.is_abstract = true;
    resource.properties = resource_properties();

    let dr = format!("{}DomainResource", SD);
    let mut domain_resource = TypeDefinition::new("DomainResource", TypeKind::Resource);
    domain_resource.url = Some(dr.clone());
    domain_resource.base_type = Some("Resource".to_string());
    domain_resource.is_abstract = true;
    domain_resource.properties = domain_resource_properties();
    domain_resource.constraints = vec![
        Constraint::rule(
            "dom-2",
            "If the resource is contained in another resource, it SHALL NOT contain nested Resources",
            "contained.contained.empty()",
        )
        .with_source(&dr),
        Constraint::rule(
            "dom-3",
            "If the resource is contained in another resource, it SHALL be referred to from elsewhere in the resource or SHALL refer to the containing resource",
            "contained.where((('#'+id in (%resource.descendants().reference | %resource.descendants().as(canonical) | %resource.descendants().as(uri) | %resource.descendants().as(url))) or descendants().where(reference = '#').exists() or descendants().where(as(canonical) = '#').exists() or descendants().where(as(uri) = '#').exists()).not()).trace('unmatched', id).empty()",
        )
        .with_source(&dr),
        Constraint::rule(
            "dom-4",
            "If a resource is contained in another resource, it SHALL NOT have a meta.versionId or a meta.lastUpdated",
            "contained.meta.versionId.empty() and contained.meta.lastUpdated.empty()",
        )
        .with_source(&dr),
        Constraint::rule(
            "dom-5",
            "If a resource is contained in another resource, it SHALL NOT have a security label",
            "contained.meta.security.empty()",
        )
        .with_source(&dr),
        Constraint::warning(
            "dom-6",
            "A resource should have narrative for robust management",
            "text.`div`.exists()",
        )
        .with_source(&dr),
    ];

    vec![element, backbone_element, resource, domain_resource]
}

fn primitive_types() -> Vec<TypeDefinition> {
    let mut types: Vec<TypeDefinition> = PRIMITIVES.iter().map(|p| primitive(p)).collect();

    let mut xhtml = TypeDefinition::new("xhtml", TypeKind::PrimitiveType);
    xhtml.url = Some(format!("{}xhtml", SD));
    xhtml.base_type = Some("Element".to_string());
    types.push(xhtml);

    types
}

fn datatypes() -> Vec<TypeDefinition> {
    let mut extension = complex(
        "Extension",
        vec![
            req("url", "uri"),
            choice("value", EXTENSION_VALUE_TYPES, Cardinality::optional()),
        ],
    );
    extension.constraints.push(
        Constraint::rule(
            "ext-1",
            "Must have either extensions or value[x], not both",
            "extension.exists() != value.exists()",
        )
        .with_source(&format!("{}Extension", SD)),
    );

    let coding = complex(
        "Coding",
        vec![
            opt("system", "uri").summary(),
            opt("version", "string").summary(),
            opt("code", "code").summary(),
            opt("display", "string").summary(),
            opt("userSelected", "boolean").summary(),
        ],
    );

    let codeable_concept = complex(
        "CodeableConcept",
        vec![many("coding", "Coding").summary(), opt("text", "string").summary()],
    );

    let identifier = complex(
        "Identifier",
        vec![
            opt("use", "code").modifier().summary(),
            opt("type", "CodeableConcept").summary(),
            opt("system", "uri").summary(),
            opt("value", "string").summary(),
            opt("period", "Period").summary(),
            reference("assigner", &["Organization"], Cardinality::optional()).summary(),
        ],
    );

    let mut period = complex(
        "Period",
        vec![
            opt("start", "dateTime").summary(),
            opt("end", "dateTime").summary(),
        ],
    );
    period.constraints.push(
        Constraint::rule(
            "per-1",
            "If present, start SHALL have a lower value than end",
            "start.hasValue().not() or end.hasValue().not() or (start <= end)",
        )
        .with_source(&format!("{}Period", SD)),
    );

    let mut quantity = complex(
        "Quantity",
        vec![
            opt("value", "decimal").summary(),
            opt("comparator", "code").modifier().summary(),
            opt("unit", "string").summary(),
            opt("system", "uri").summary(),
            opt("code", "code").summary(),
        ],
    );
    quantity.constraints.push(
        Constraint::rule(
            "qty-3",
            "If a code for the unit is present, the system SHALL also be present",
            "code.empty() or system.exists()",
        )
        .with_source(&format!("{}Quantity", SD)),
    );

    let money = complex(
        "Money",
        vec![
            opt("value", "decimal").summary(),
            opt("currency", "code").summary(),
        ],
    );

    let mut reference_type = complex(
        "Reference",
        vec![
            opt("reference", "string").summary(),
            opt("type", "uri").summary(),
            opt("identifier", "Identifier").summary(),
            opt("display", "string").summary(),
        ],
    );
    reference_type.constraints.push(
        Constraint::rule(
            "ref-1",
            "SHALL have a contained resource if a local reference is provided",
            "reference.startsWith('#').not() or (reference.substring(1).trace('url') in %rootResource.contained.id.trace('ids'))",
        )
        .with_source(&format!("{}Reference", SD)),
    );

    let meta = complex(
        "Meta",
        vec![
            opt("versionId", "id").summary(),
            opt("lastUpdated", "instant").summary(),
            opt("source", "uri").summary(),
            many("profile", "canonical").summary(),
            many("security", "Coding").summary(),
            many("tag", "Coding").summary(),
        ],
    );

    let narrative = complex(
        "Narrative",
        vec![req("status", "code"), req("div", "xhtml")],
    );

    let human_name = complex(
        "HumanName",
        vec![
            opt("use", "code").modifier().summary(),
            opt("text", "string").summary(),
            opt("family", "string").summary(),
            many("given", "string").summary(),
            many("prefix", "string").summary(),
            many("suffix", "string").summary(),
            opt("period", "Period").summary(),
        ],
    );

    vec![
        extension,
        coding,
        codeable_concept,
        identifier,
        period,
        quantity,
        money,
        reference_type,
        meta,
        narrative,
        human_name,
    ]
}

fn resources() -> Vec<TypeDefinition> {
    let patient = resource(
        "Patient",
        vec![
            many("identifier", "Identifier").summary(),
            opt("active", "boolean").modifier().summary(),
            many("name", "HumanName").summary(),
            opt("gender", "code").summary(),
            opt("birthDate", "date").summary(),
            reference(
                "managingOrganization",
                &["Organization"],
                Cardinality::optional(),
            )
            .summary(),
        ],
    );

    let group = resource(
        "Group",
        vec![
            many("identifier", "Identifier").summary(),
            opt("active", "boolean").summary(),
            req("type", "code").summary(),
            req("actual", "boolean").summary(),
            opt("name", "string").summary(),
            opt("quantity", "unsignedInt").summary(),
        ],
    );

    let mut organization = resource(
        "Organization",
        vec![
            many("identifier", "Identifier").summary(),
            opt("active", "boolean").modifier().summary(),
            many("type", "CodeableConcept").summary(),
            opt("name", "string").summary(),
            many("alias", "string"),
            reference("partOf", &["Organization"], Cardinality::optional()).summary(),
        ],
    );
    organization.constraints.push(
        Constraint::rule(
            "org-1",
            "The organization SHALL at least have a name or an identifier, and possibly more than one",
            "(identifier.count() + name.count()) > 0",
        )
        .with_source(&format!("{}Organization", SD)),
    );

    let related_person = resource(
        "RelatedPerson",
        vec![
            many("identifier", "Identifier").summary(),
            opt("active", "boolean").modifier().summary(),
            reference("patient", &["Patient"], Cardinality::required()).summary(),
            many("relationship", "CodeableConcept").summary(),
            many("name", "HumanName").summary(),
            opt("gender", "code").summary(),
            opt("birthDate", "date").summary(),
            opt("period", "Period"),
        ],
    );

    let contract = resource(
        "Contract",
        vec![
            many("identifier", "Identifier").summary(),
            opt("url", "uri").summary(),
            opt("version", "string").summary(),
            opt("status", "code").modifier().summary(),
            opt("name", "string").summary(),
            opt("title", "string").summary(),
            reference("subject", &["Resource"], Cardinality::many()).summary(),
        ],
    );

    let mut types = vec![patient, group, organization, related_person, contract];
    types.extend(coverage());
    types
}

fn coverage() -> Vec<TypeDefinition> {
    let source = format!("{}Coverage", SD);

    let mut coverage = resource(
        "Coverage",
        vec![
            many("identifier", "Identifier").summary(),
            req("status", "code").modifier().summary(),
            opt("type", "CodeableConcept").summary(),
            reference(
                "policyHolder",
                &["Patient", "RelatedPerson", "Organization"],
                Cardinality::optional(),
            )
            .summary(),
            reference(
                "subscriber",
                &["Patient", "RelatedPerson"],
                Cardinality::optional(),
            )
            .summary(),
            opt("subscriberId", "string").summary(),
            reference("beneficiary", &["Patient"], Cardinality::required()).summary(),
            opt("dependent", "string").summary(),
            opt("relationship", "CodeableConcept"),
            opt("period", "Period").summary(),
            reference(
                "payor",
                &["Organization", "Patient", "RelatedPerson"],
                Cardinality::one_or_more(),
            )
            .summary(),
            many("class", "Coverage.class"),
            opt("order", "positiveInt").summary(),
            opt("network", "string").summary(),
            many("costToBeneficiary", "Coverage.costToBeneficiary"),
            opt("subrogation", "boolean"),
            reference("contract", &["Contract"], Cardinality::many()),
        ],
    );
    coverage.description = Some(
        "Financial instrument which may be used to reimburse or pay for health care products and services"
            .to_string(),
    );
    coverage.constraints = vec![
        Constraint::warning(
            "coverage-0",
            "SHALL, if possible, contain a code from value set http://hl7.org/fhir/ValueSet/coverage-type",
            "type.exists() implies (type.memberOf('http://hl7.org/fhir/ValueSet/coverage-type', 'preferred'))",
        )
        .with_source(&source),
        Constraint::warning(
            "coverage-1",
            "SHALL, if possible, contain a code from value set http://hl7.org/fhir/ValueSet/subscriber-relationship",
            "relationship.exists() implies (relationship.memberOf('http://hl7.org/fhir/ValueSet/subscriber-relationship', 'extensible'))",
        )
        .with_source(&source),
        Constraint::warning(
            "coverage-2",
            "SHALL, if possible, contain a code from value set http://hl7.org/fhir/ValueSet/coverage-class",
            "$this.memberOf('http://hl7.org/fhir/ValueSet/coverage-class', 'extensible')",
        )
        .at("class.type")
        .with_source(&source),
        Constraint::warning(
            "coverage-3",
            "SHALL, if possible, contain a code from value set http://hl7.org/fhir/ValueSet/coverage-copay-type",
            "$this.memberOf('http://hl7.org/fhir/ValueSet/coverage-copay-type', 'extensible')",
        )
        .at("costToBeneficiary.type")
        .with_source(&source),
    ];

    let class = backbone(
        "Coverage.class",
        vec![
            req("type", "CodeableConcept").summary(),
            req("value", "string").summary(),
            opt("name", "string").summary(),
        ],
    );

    let cost = backbone(
        "Coverage.costToBeneficiary",
        vec![
            opt("type", "CodeableConcept"),
            choice("value", &["Quantity", "Money"], Cardinality::required()),
            many("exception", "Coverage.costToBeneficiary.exception"),
        ],
    );

    let exception = backbone(
        "Coverage.costToBeneficiary.exception",
        vec![req("type", "CodeableConcept"), opt("period", "Period")],
    );

    vec![coverage, class, cost, exception]
}

fn build_core() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.extend(base_types());
    registry.extend(primitive_types());
    registry.extend(datatypes());
    registry.extend(resources());
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_is_shared() {
        assert!(Arc::ptr_eq(&core(), &core()));
    }

    #[test]
    fn test_every_property_type_is_known() {
        let registry = core();
        for def in registry.types() {
            for property in &def.properties {
                for t in &property.types {
                    assert!(
                        registry.contains(&t.code),
                        "{}.{} uses unknown type {}",
                        def.name,
                        property.name,
                        t.code
                    );
                }
            }
        }
    }

    #[test]
    fn test_coverage_shape() {
        let registry = core();
        let coverage = registry.get_type("Coverage").unwrap();
        let names: Vec<&str> = coverage.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(&names[..7], &["meta", "implicitRules", "language", "text", "contained", "extension", "modifierExtension"]);
        assert_eq!(names[7], "identifier");
        assert_eq!(names.last(), Some(&"contract"));

        let payor = coverage.property("payor").unwrap();
        assert_eq!(payor.cardinality, Cardinality::one_or_more());
        assert_eq!(
            payor.reference_targets(),
            vec!["Organization", "Patient", "RelatedPerson"]
        );
        assert!(registry.get_type_by_url(&format!("{}Coverage", SD)).is_some());
    }

    #[test]
    fn test_constraint_locations() {
        let registry = core();
        let coverage = registry.get_type("Coverage").unwrap();
        let c2 = coverage.constraints.iter().find(|c| c.key == "coverage-2").unwrap();
        assert_eq!(c2.location, "class.type");
        assert!(!c2.is_base_location());
        assert!(coverage.constraints[0].is_base_location());
    }
}
