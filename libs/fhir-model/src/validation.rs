//! Structural validation run by `Builder::build`
//!
//! Checks, per property in schema order: required presence, null list
//! elements, maximum cardinality, the type of every held node (choice
//! legality included) and reference target kinds. Then the node itself:
//! primitive value rules and "value or children" for non-resource elements.
//! All violations are collected; nothing short-circuits.

use crate::builder::Slot;
use crate::error::StructuralViolation;
use crate::primitive::{check_primitive, PrimitiveValue};
use crate::reference::check_reference;
use crate::schema::{Property, TypeDefinition, TypeRegistry};

pub(crate) struct StructuralCheck<'a> {
    registry: &'a TypeRegistry,
    definition: &'a TypeDefinition,
    violations: Vec<StructuralViolation>,
}

impl<'a> StructuralCheck<'a> {
    pub(crate) fn new(registry: &'a TypeRegistry, definition: &'a TypeDefinition) -> Self {
        Self {
            registry,
            definition,
            violations: Vec::new(),
        }
    }

    pub(crate) fn run(
        mut self,
        id: Option<&str>,
        value: Option<&PrimitiveValue>,
        slots: &[Slot],
    ) -> Vec<StructuralViolation> {
        let mut has_children = false;

        for (property, slot) in self.definition.properties.iter().zip(slots) {
            let path = format!("{}.{}", self.definition.name, property.name);
            match slot {
                Slot::Single(node) => {
                    if property.is_required() && node.is_none() {
                        self.violations
                            .push(StructuralViolation::MissingRequiredField { path: path.clone() });
                    }
                    if let Some(node) = node {
                        has_children = true;
                        self.check_element(property, node, &path);
                    }
                }
                Slot::List(items) => {
                    self.check_list(property, items, &path);
                    has_children |= items.iter().any(Option::is_some);
                }
            }
        }

        self.check_self(id, value, has_children);
        self.violations
    }

    fn check_list(&mut self, property: &Property, items: &[Option<crate::Node>], path: &str) {
        let present = items.iter().filter(|n| n.is_some()).count();
        if present < property.cardinality.min as usize {
            self.violations.push(StructuralViolation::MissingRequiredField {
                path: path.to_string(),
            });
        }
        for (index, item) in items.iter().enumerate() {
            if item.is_none() {
                self.violations.push(StructuralViolation::NullListElement {
                    path: path.to_string(),
                    index,
                });
            }
        }
        if let Some(max) = property.cardinality.max {
            if present > max as usize {
                self.violations.push(StructuralViolation::MaxCardinalityExceeded {
                    path: path.to_string(),
                    max,
                    actual: present,
                });
            }
        }
        for (index, item) in items.iter().enumerate() {
            if let Some(node) = item {
                self.check_element(property, node, &format!("{}[{}]", path, index));
            }
        }
    }

    fn check_element(&mut self, property: &Property, node: &crate::Node, path: &str) {
        if !property.accepts(node.definition(), self.registry) {
            let actual = node.type_name().to_string();
            let allowed = property.type_codes();
            self.violations.push(if property.is_choice() {
                StructuralViolation::ChoiceTypeViolation {
                    path: path.to_string(),
                    actual,
                    allowed,
                }
            } else {
                StructuralViolation::InvalidElementType {
                    path: path.to_string(),
                    actual,
                    expected: allowed,
                }
            });
            return;
        }

        if node.type_name() == "Reference" {
            let targets = property.reference_targets();
            self.violations.extend(check_reference(
                node,
                &targets,
                path,
                self.registry,
            ));
        }
    }

    fn check_self(&mut self, id: Option<&str>, value: Option<&PrimitiveValue>, has_children: bool) {
        let def = self.definition;
        let config = self.registry.config();

        if let Some(value) = value {
            if let Err(message) = check_primitive(&def.name, value, config) {
                self.violations.push(StructuralViolation::InvalidPrimitiveValue {
                    path: def.name.clone(),
                    message,
                });
            }
        }

        if let Some(id) = id {
            if let Err(message) = check_primitive("string", &PrimitiveValue::from(id), config) {
                self.violations.push(StructuralViolation::InvalidPrimitiveValue {
                    path: format!("{}.id", def.name),
                    message,
                });
            } else if def.is_resource() && config.check_primitive_values {
                if let Err(message) = crate::primitive::check_id(id) {
                    self.violations.push(StructuralViolation::InvalidPrimitiveValue {
                        path: format!("{}.id", def.name),
                        message,
                    });
                }
            }
        }

        if !def.is_resource() && value.is_none() && !has_children {
            self.violations.push(StructuralViolation::EmptyLeafElement {
                path: def.name.clone(),
            });
        }
    }
}
