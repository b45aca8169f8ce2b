//! Parser for FHIR StructureDefinitions
//!
//! Builds [`TypeDefinition`]s from StructureDefinition snapshots: one for the
//! type itself and one per backbone element, named by its path
//! (`Coverage.class`). Invariants declared by the definition become
//! constraints of the type, located relative to it.

use super::{
    extract_type_name_from_url, Cardinality, Constraint, Property, PropertyType, TypeDefinition,
    TypeKind, TypeRegistry, BASE_LOCATION,
};
use crate::error::{Error, Result};
use serde_json::Value;
use tracing::debug;

impl TypeRegistry {
    /// Parse StructureDefinitions from JSON (a single definition, an array or
    /// a Bundle) and add every resulting type. Returns the number of types
    /// added.
    pub fn load_json(&mut self, json: &str) -> Result<usize> {
        let defs = parse_json(json)?;
        let count = defs.len();
        self.extend(defs);
        Ok(count)
    }
}

/// Parse StructureDefinitions from a JSON document. Entries that are not
/// StructureDefinitions are skipped.
pub fn parse_json(json: &str) -> Result<Vec<TypeDefinition>> {
    let value: Value = serde_json::from_str(json)?;
    let mut defs = Vec::new();
    for sd in structure_definitions(&value) {
        defs.extend(parse_structure_definition(sd)?);
    }
    Ok(defs)
}

fn structure_definitions(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().flat_map(structure_definitions).collect(),
        Value::Object(_) => match value.get("resourceType").and_then(|v| v.as_str()) {
            Some("StructureDefinition") => vec![value],
            Some("Bundle") => value
                .get("entry")
                .and_then(|v| v.as_array())
                .map(|entries| {
                    entries
                        .iter()
                        .filter_map(|e| e.get("resource"))
                        .flat_map(structure_definitions)
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Parse a single StructureDefinition into its type and backbone types.
pub fn parse_structure_definition(sd: &Value) -> Result<Vec<TypeDefinition>> {
    let name = sd
        .get("type")
        .or_else(|| sd.get("name"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Schema("StructureDefinition missing 'type'".to_string()))?
        .to_string();

    if sd.get("derivation").and_then(|v| v.as_str()) == Some("constraint") {
        return Err(Error::Schema(format!(
            "'{}' is a profile; only base definitions can be loaded",
            sd.get("url").and_then(|v| v.as_str()).unwrap_or(&name)
        )));
    }

    let url = sd.get("url").and_then(|v| v.as_str()).map(String::from);

    let description = sd
        .get("description")
        .and_then(|v| v.as_str())
        .map(String::from);

    let kind = match sd.get("kind").and_then(|v| v.as_str()) {
        Some("resource") => TypeKind::Resource,
        Some("primitive-type") => TypeKind::PrimitiveType,
        _ => TypeKind::ComplexType,
    };

    let is_abstract = sd
        .get("abstract")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let base_type = sd
        .get("baseDefinition")
        .and_then(|v| v.as_str())
        .map(extract_type_name_from_url);

    let elements = sd
        .get("snapshot")
        .and_then(|s| s.get("element"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::Schema(format!("'{}' has no snapshot elements", name)))?;

    let mut root = TypeDefinition::new(name.clone(), kind);
    root.url = url.clone();
    root.description = description;
    root.base_type = base_type;
    root.is_abstract = is_abstract;

    let mut types = vec![root];
    let prefix = format!("{}.", name);

    for (index, element) in elements.iter().enumerate() {
        let path = element_path(element)?;
        for constraint in parse_constraints(element, url.as_deref()) {
            let location = match path.strip_prefix(&prefix) {
                Some(relative) => relative.to_string(),
                None => BASE_LOCATION.to_string(),
            };
            types[0].constraints.push(constraint.at(&location));
        }

        if index == 0 || !path.starts_with(&prefix) {
            continue;
        }

        let Some((owner, element_name)) = path.rsplit_once('.') else {
            continue;
        };
        if element_name == "id" || (kind == TypeKind::PrimitiveType && element_name == "value") {
            continue;
        }

        if is_backbone(elements, index, path) {
            let mut backbone = TypeDefinition::new(path, TypeKind::BackboneElement);
            backbone.base_type = element_type_codes(element).into_iter().next();
            backbone.description = short_description(element);
            types.push(backbone);
        }

        let Some(owner_def) = types.iter_mut().find(|t| t.name == owner) else {
            debug!(%path, "element without an owning type, skipped");
            continue;
        };
        owner_def.properties.push(parse_element(elements, index)?);
    }

    Ok(types)
}

fn element_path(element: &Value) -> Result<&str> {
    element
        .get("path")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Schema("element missing 'path'".to_string()))
}

fn short_description(element: &Value) -> Option<String> {
    element
        .get("short")
        .and_then(|v| v.as_str())
        .or_else(|| element.get("definition").and_then(|v| v.as_str()))
        .map(String::from)
}

fn element_type_codes(element: &Value) -> Vec<String> {
    element
        .get("type")
        .and_then(|v| v.as_array())
        .map(|types| {
            types
                .iter()
                .filter_map(|t| t.get("code").and_then(|c| c.as_str()).map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// An element declaring an inline type: typed `BackboneElement`/`Element`
/// and followed by its own children.
fn is_backbone(elements: &[Value], index: usize, path: &str) -> bool {
    let codes = element_type_codes(&elements[index]);
    let inline = matches!(codes.as_slice(), [c] if c == "BackboneElement" || c == "Element");
    let child_prefix = format!("{}.", path);
    inline
        && elements
            .get(index + 1)
            .and_then(|next| next.get("path").and_then(|v| v.as_str()))
            .map_or(false, |next| next.starts_with(&child_prefix))
}

/// Parse a single element into a Property
fn parse_element(elements: &[Value], index: usize) -> Result<Property> {
    let element = &elements[index];
    let path = element_path(element)?;

    let raw_name = path
        .rsplit('.')
        .next()
        .ok_or_else(|| Error::Schema(format!("Invalid path: {}", path)))?;
    let name = raw_name.strip_suffix("[x]").unwrap_or(raw_name).to_string();

    let min = element.get("min").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let max = match element.get("max").and_then(|v| v.as_str()) {
        Some("*") => None,
        Some(n) => Some(
            n.parse()
                .map_err(|_| Error::Schema(format!("{}: invalid max '{}'", path, n)))?,
        ),
        None => Some(1),
    };

    let types = if let Some(reference) = element.get("contentReference").and_then(|v| v.as_str())
    {
        let target = reference.rsplit_once('#').map_or(reference, |(_, t)| t);
        vec![PropertyType::new(target)]
    } else if is_backbone(elements, index, path) {
        vec![PropertyType::new(path)]
    } else {
        element
            .get("type")
            .and_then(|v| v.as_array())
            .map(|types| types.iter().filter_map(parse_element_type).collect())
            .unwrap_or_default()
    };

    if types.is_empty() {
        return Err(Error::Schema(format!("{}: element has no type", path)));
    }

    let mut property = Property::new(name, types, Cardinality::new(min, max));
    property.is_modifier = element
        .get("isModifier")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    property.is_summary = element
        .get("isSummary")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    property.description = short_description(element);
    Ok(property)
}

/// Parse a type specification from an element
fn parse_element_type(type_spec: &Value) -> Option<PropertyType> {
    let code = type_spec.get("code").and_then(|v| v.as_str())?;
    let target_profiles = type_spec
        .get("targetProfile")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    Some(PropertyType {
        code: code.to_string(),
        target_profiles,
    })
}

/// Constraints declared on `element` by the definition at `url`. Inherited
/// constraints carry the source of their declaring type and are skipped;
/// the registry reaches them through the base chain.
fn parse_constraints(element: &Value, url: Option<&str>) -> Vec<Constraint> {
    let Some(constraints) = element.get("constraint").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    constraints
        .iter()
        .filter_map(|c| {
            let source = c.get("source").and_then(|v| v.as_str());
            if let (Some(source), Some(url)) = (source, url) {
                if source != url {
                    return None;
                }
            }
            let key = c.get("key").and_then(|v| v.as_str())?;
            let expression = c.get("expression").and_then(|v| v.as_str())?;
            let human = c.get("human").and_then(|v| v.as_str()).unwrap_or_default();
            let mut constraint = match c.get("severity").and_then(|v| v.as_str()) {
                Some("warning") => Constraint::warning(key, human, expression),
                _ => Constraint::rule(key, human, expression),
            };
            constraint.source = source.or(url).map(String::from);
            Some(constraint)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ConstraintSeverity;
    use serde_json::json;

    fn coverage_fragment() -> Value {
        json!({
            "resourceType": "StructureDefinition",
            "url": "http://hl7.org/fhir/StructureDefinition/Coverage",
            "name": "Coverage",
            "type": "Coverage",
            "kind": "resource",
            "abstract": false,
            "derivation": "specialization",
            "baseDefinition": "http://hl7.org/fhir/StructureDefinition/DomainResource",
            "snapshot": {
                "element": [
                    {
                        "path": "Coverage",
                        "min": 0,
                        "max": "*",
                        "constraint": [
                            {
                                "key": "dom-2",
                                "severity": "error",
                                "human": "nested",
                                "expression": "contained.contained.empty()",
                                "source": "http://hl7.org/fhir/StructureDefinition/DomainResource"
                            }
                        ]
                    },
                    { "path": "Coverage.id", "min": 0, "max": "1", "type": [{ "code": "http://hl7.org/fhirpath/System.String" }] },
                    { "path": "Coverage.status", "min": 1, "max": "1", "isModifier": true, "isSummary": true, "type": [{ "code": "code" }] },
                    {
                        "path": "Coverage.beneficiary", "min": 1, "max": "1",
                        "type": [{ "code": "Reference", "targetProfile": ["http://hl7.org/fhir/StructureDefinition/Patient"] }]
                    },
                    { "path": "Coverage.class", "min": 0, "max": "*", "type": [{ "code": "BackboneElement" }] },
                    { "path": "Coverage.class.id", "min": 0, "max": "1", "type": [{ "code": "http://hl7.org/fhirpath/System.String" }] },
                    {
                        "path": "Coverage.class.type", "min": 1, "max": "1",
                        "type": [{ "code": "CodeableConcept" }],
                        "constraint": [
                            {
                                "key": "coverage-2",
                                "severity": "warning",
                                "human": "class code",
                                "expression": "$this.memberOf('http://hl7.org/fhir/ValueSet/coverage-class', 'extensible')",
                                "source": "http://hl7.org/fhir/StructureDefinition/Coverage"
                            }
                        ]
                    },
                    { "path": "Coverage.class.value", "min": 1, "max": "1", "type": [{ "code": "string" }] },
                    { "path": "Coverage.costToBeneficiary", "min": 0, "max": "*", "type": [{ "code": "BackboneElement" }] },
                    { "path": "Coverage.costToBeneficiary.value[x]", "min": 1, "max": "1", "type": [{ "code": "Quantity" }, { "code": "Money" }] },
                    { "path": "Coverage.costToBeneficiary.nested", "min": 0, "max": "*", "contentReference": "#Coverage.class" }
                ]
            }
        })
    }

    #[test]
    fn test_parse_resource_with_backbones() {
        let types = parse_structure_definition(&coverage_fragment()).unwrap();
        let names: Vec<&str> = types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Coverage", "Coverage.class", "Coverage.costToBeneficiary"]
        );

        let coverage = &types[0];
        assert_eq!(coverage.base_type.as_deref(), Some("DomainResource"));
        assert!(coverage.property("id").is_none());
        let status = coverage.property("status").unwrap();
        assert!(status.is_required() && status.is_modifier && status.is_summary);
        assert_eq!(
            coverage.property("class").unwrap().types[0].code,
            "Coverage.class"
        );
        assert_eq!(
            coverage.property("beneficiary").unwrap().reference_targets(),
            vec!["Patient"]
        );

        let class = &types[1];
        assert_eq!(class.kind, TypeKind::BackboneElement);
        assert_eq!(class.base_type.as_deref(), Some("BackboneElement"));
        assert_eq!(class.properties.len(), 2);
    }

    #[test]
    fn test_choice_and_content_reference() {
        let types = parse_structure_definition(&coverage_fragment()).unwrap();
        let cost = &types[2];
        let value = cost.property("value").unwrap();
        assert!(value.is_choice());
        assert_eq!(value.type_codes(), vec!["Quantity", "Money"]);
        assert_eq!(cost.property("nested").unwrap().types[0].code, "Coverage.class");
    }

    #[test]
    fn test_only_own_constraints_with_relative_location() {
        let types = parse_structure_definition(&coverage_fragment()).unwrap();
        let constraints = &types[0].constraints;
        assert_eq!(constraints.len(), 1);
        assert_eq!(constraints[0].key, "coverage-2");
        assert_eq!(constraints[0].location, "class.type");
        assert_eq!(constraints[0].severity, ConstraintSeverity::Warning);
    }

    #[test]
    fn test_load_bundle_into_registry() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [
                { "resource": coverage_fragment() },
                { "resource": { "resourceType": "Patient" } }
            ]
        });
        let mut registry = TypeRegistry::new();
        let added = registry.load_json(&bundle.to_string()).unwrap();
        assert_eq!(added, 3);
        assert!(registry
            .get_type_by_url("http://hl7.org/fhir/StructureDefinition/Coverage")
            .is_some());
    }

    #[test]
    fn test_profiles_are_rejected() {
        let profile = json!({
            "resourceType": "StructureDefinition",
            "url": "http://example.org/StructureDefinition/my-patient",
            "type": "Patient",
            "derivation": "constraint",
            "snapshot": { "element": [] }
        });
        assert!(matches!(
            parse_structure_definition(&profile),
            Err(Error::Schema(_))
        ));
    }
}
