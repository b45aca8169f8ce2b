//! Builders
//!
//! A [`Builder`] is the mutable staging area for one node. Setters are
//! fluent and never fail; anything wrong is collected and surfaced by
//! [`Builder::build`], which consumes the builder, freezes its lists and runs
//! structural validation before the node becomes observable.
//!
//! Misuse (an unknown element, `set` on a repeating element, a value for a
//! non-primitive) is logged with `warn!` when it happens and always fails
//! `build()`, validation switch or not. Callers that want it at the call
//! site use the `try_` setters, which return
//! [`Error::InvalidBuilderUsage`] immediately.
//!
//! ```rust
//! use ferrum_model::{datatypes, schema};
//!
//! let coverage = schema::core()
//!     .builder("Coverage")?
//!     .set_value("status", "active")
//!     .set("beneficiary", datatypes::reference("Patient/123")?)
//!     .add("payor", datatypes::reference("Organization/7")?)
//!     .build()?;
//!
//! assert_eq!(coverage.get("status").and_then(|s| s.value()).and_then(|v| v.as_str()), Some("active"));
//! # Ok::<(), ferrum_model::Error>(())
//! ```

use crate::error::{Error, Result, StructuralViolation, ValidationErrors};
use crate::node::{Field, Node};
use crate::primitive::PrimitiveValue;
use crate::schema::{self, TypeDefinition, TypeRegistry};
use crate::validation::StructuralCheck;
use std::sync::Arc;
use tracing::{debug, warn};

/// Mutable content of one property while building.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Single(Option<Node>),
    /// `None` entries are null list elements, rejected by validation.
    List(Vec<Option<Node>>),
}

#[derive(Debug, Clone)]
pub struct Builder {
    registry: Arc<TypeRegistry>,
    definition: Arc<TypeDefinition>,
    id: Option<String>,
    value: Option<PrimitiveValue>,
    slots: Vec<Slot>,
    misuse: Vec<String>,
    /// Violations raised while building primitive children via `set_value`,
    /// reported by `build()` only when validating.
    deferred: Vec<StructuralViolation>,
    validating: bool,
}

impl Builder {
    pub(crate) fn new(registry: Arc<TypeRegistry>, definition: Arc<TypeDefinition>) -> Self {
        let slots = definition
            .properties
            .iter()
            .map(|p| {
                if p.is_list() {
                    Slot::List(Vec::new())
                } else {
                    Slot::Single(None)
                }
            })
            .collect();
        let validating = registry.config().validate;
        Self {
            registry,
            definition,
            id: None,
            value: None,
            slots,
            misuse: Vec::new(),
            deferred: Vec::new(),
            validating,
        }
    }

    /// Builder for a type of the built-in core schema.
    pub fn for_type(type_name: &str) -> Result<Self> {
        schema::core().builder(type_name)
    }

    /// Seed a builder with every field of `node`.
    pub fn from_node(node: &Node) -> Self {
        let slots = node
            .fields()
            .map(|(_, field)| match field {
                Field::Single(n) => Slot::Single(n.clone()),
                Field::List(nodes) => Slot::List(nodes.iter().cloned().map(Some).collect()),
            })
            .collect();
        Self {
            registry: Arc::clone(node.registry()),
            definition: Arc::clone(node.definition()),
            id: node.id().map(str::to_string),
            value: node.value().cloned(),
            slots,
            misuse: Vec::new(),
            deferred: Vec::new(),
            validating: node.registry().config().validate,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.definition.name
    }

    /// Enable or disable structural validation for this builder only.
    pub fn validating(mut self, validate: bool) -> Self {
        self.validating = validate;
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the value of a primitive node.
    pub fn value(mut self, value: impl Into<PrimitiveValue>) -> Self {
        if !self.definition.is_primitive() {
            self.record_misuse(format!(
                "'{}' is not a primitive type and cannot hold a value",
                self.definition.name
            ));
            return self;
        }
        self.value = Some(value.into());
        self
    }

    /// Set a single-valued field. Choice fields accept any node here; the
    /// held type is checked by `build()`.
    pub fn set(mut self, name: &str, node: impl Into<Node>) -> Self {
        let node = node.into();
        if let Some(index) = self.single_slot(name, Some(&node)) {
            self.slots[index] = Slot::Single(Some(node));
        }
        self
    }

    /// Set or clear a single-valued field.
    pub fn set_opt(self, name: &str, node: Option<Node>) -> Self {
        match node {
            Some(node) => self.set(name, node),
            None => self.clear(name),
        }
    }

    /// Remove any content from a field.
    pub fn clear(mut self, name: &str) -> Self {
        match self.slot_index(name) {
            Some(index) => {
                self.slots[index] = match self.slots[index] {
                    Slot::Single(_) => Slot::Single(None),
                    Slot::List(_) => Slot::List(Vec::new()),
                };
            }
            None => self.unknown_element(name),
        }
        self
    }

    /// Set a single-valued primitive field from a raw value, building the
    /// primitive child with the field's declared type.
    pub fn set_value(mut self, name: &str, value: impl Into<PrimitiveValue>) -> Self {
        if let Some(node) = self.primitive_child(name, value.into()) {
            if let Some(index) = self.single_slot(name, Some(&node)) {
                self.slots[index] = Slot::Single(Some(node));
            }
        }
        self
    }

    /// Append one element to a list field.
    pub fn add(mut self, name: &str, node: impl Into<Node>) -> Self {
        if let Some(index) = self.list_slot(name) {
            if let Slot::List(items) = &mut self.slots[index] {
                items.push(Some(node.into()));
            }
        }
        self
    }

    /// Append every element to a list field, keeping what was added before.
    pub fn add_all<I>(mut self, name: &str, nodes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        if let Some(index) = self.list_slot(name) {
            if let Slot::List(items) = &mut self.slots[index] {
                items.extend(nodes.into_iter().map(|n| Some(n.into())));
            }
        }
        self
    }

    /// Append a possibly-null element. A null is kept until `build()`, which
    /// reports it as `NullListElement`.
    pub fn add_nullable(mut self, name: &str, node: Option<Node>) -> Self {
        if let Some(index) = self.list_slot(name) {
            if let Slot::List(items) = &mut self.slots[index] {
                items.push(node);
            }
        }
        self
    }

    /// Append a primitive element built from a raw value.
    pub fn add_value(mut self, name: &str, value: impl Into<PrimitiveValue>) -> Self {
        if let Some(node) = self.primitive_child(name, value.into()) {
            if let Some(index) = self.list_slot(name) {
                if let Slot::List(items) = &mut self.slots[index] {
                    items.push(Some(node));
                }
            }
        }
        self
    }

    /// Replace the whole list with a copy of `nodes`.
    pub fn replace<I>(mut self, name: &str, nodes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        if let Some(index) = self.list_slot(name) {
            self.slots[index] = Slot::List(nodes.into_iter().map(|n| Some(n.into())).collect());
        }
        self
    }

    /// Replace the whole list with elements that may be null.
    pub fn replace_nullable<I>(mut self, name: &str, nodes: I) -> Self
    where
        I: IntoIterator<Item = Option<Node>>,
    {
        if let Some(index) = self.list_slot(name) {
            self.slots[index] = Slot::List(nodes.into_iter().collect());
        }
        self
    }

    pub fn extension(self, extension: Node) -> Self {
        self.add("extension", extension)
    }

    pub fn modifier_extension(self, extension: Node) -> Self {
        self.add("modifierExtension", extension)
    }

    /// [`set`](Self::set), failing at once on misuse.
    pub fn try_set(self, name: &str, node: impl Into<Node>) -> Result<Self> {
        self.checked(|b| b.set(name, node))
    }

    /// [`set_value`](Self::set_value), failing at once on misuse.
    pub fn try_set_value(self, name: &str, value: impl Into<PrimitiveValue>) -> Result<Self> {
        self.checked(|b| b.set_value(name, value))
    }

    /// [`add`](Self::add), failing at once on misuse.
    pub fn try_add(self, name: &str, node: impl Into<Node>) -> Result<Self> {
        self.checked(|b| b.add(name, node))
    }

    /// [`replace`](Self::replace), failing at once on misuse.
    pub fn try_replace<I>(self, name: &str, nodes: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        self.checked(|b| b.replace(name, nodes))
    }

    /// Freeze the accumulated fields and produce the immutable node.
    ///
    /// Misuse recorded by the setters is reported as
    /// [`Error::InvalidBuilderUsage`] whether or not validation is enabled.
    /// With validation enabled every structural violation is collected and
    /// returned together as [`Error::Validation`].
    pub fn build(self) -> Result<Node> {
        let Builder {
            registry,
            definition,
            id,
            value,
            slots,
            misuse,
            deferred,
            validating,
        } = self;

        if !misuse.is_empty() {
            warn!(
                type_name = %definition.name,
                count = misuse.len(),
                "builder misuse"
            );
            return Err(Error::InvalidBuilderUsage(misuse.join("; ")));
        }

        if validating {
            let mut violations = deferred;
            violations.extend(
                StructuralCheck::new(&registry, &definition).run(id.as_deref(), value.as_ref(), &slots),
            );
            if !violations.is_empty() {
                debug!(
                    type_name = %definition.name,
                    violations = violations.len(),
                    "structural validation failed"
                );
                return Err(Error::Validation(ValidationErrors::new(violations)));
            }
        }

        let fields = slots
            .into_iter()
            .zip(definition.properties.iter())
            .map(|(slot, property)| match slot {
                Slot::Single(node) => Field::Single(node),
                Slot::List(items) => {
                    let total = items.len();
                    let nodes: Vec<Node> = items.into_iter().flatten().collect();
                    if nodes.len() != total {
                        warn!(
                            type_name = %definition.name,
                            element = %property.name,
                            dropped = total - nodes.len(),
                            "dropping null list elements"
                        );
                    }
                    Field::List(nodes)
                }
            })
            .collect();

        Ok(Node::from_parts(registry, definition, id, value, fields))
    }

    /// Apply `setter` and turn any misuse it records into an error.
    fn checked(self, setter: impl FnOnce(Self) -> Self) -> Result<Self> {
        let before = self.misuse.len();
        let builder = setter(self);
        if builder.misuse.len() > before {
            return Err(Error::InvalidBuilderUsage(builder.misuse[before..].join("; ")));
        }
        Ok(builder)
    }

    fn record_misuse(&mut self, message: String) {
        warn!(type_name = %self.definition.name, %message, "invalid builder usage");
        self.misuse.push(message);
    }

    fn unknown_element(&mut self, name: &str) {
        let message = format!("'{}' has no element named '{}'", self.definition.name, name);
        self.record_misuse(message);
    }

    /// Index of the property a setter addresses. Typed choice names resolve
    /// to their base property.
    fn slot_index(&self, name: &str) -> Option<usize> {
        self.definition.property_index(name).or_else(|| {
            self.definition
                .resolve_choice_name(name)
                .and_then(|(p, _)| self.definition.property_index(&p.name))
        })
    }

    fn single_slot(&mut self, name: &str, node: Option<&Node>) -> Option<usize> {
        let Some(index) = self.slot_index(name) else {
            self.unknown_element(name);
            return None;
        };
        if self.definition.properties[index].is_list() {
            let message = format!(
                "'{}.{}' is a repeating element; use add or replace",
                self.definition.name, name
            );
            self.record_misuse(message);
            return None;
        }
        if let (Some((_, code)), Some(node)) = (self.definition.resolve_choice_name(name), node) {
            if node.type_name() != code {
                let message = format!(
                    "'{}.{}' given a value of type {}",
                    self.definition.name,
                    name,
                    node.type_name()
                );
                self.record_misuse(message);
                return None;
            }
        }
        Some(index)
    }

    fn list_slot(&mut self, name: &str) -> Option<usize> {
        let Some(index) = self.slot_index(name) else {
            self.unknown_element(name);
            return None;
        };
        if !self.definition.properties[index].is_list() {
            let message = format!(
                "'{}.{}' is a single-valued element; use set",
                self.definition.name, name
            );
            self.record_misuse(message);
            return None;
        }
        Some(index)
    }

    /// Build a primitive child for `name`. The field must declare exactly
    /// one primitive type, or be addressed by its typed choice name.
    fn primitive_child(&mut self, name: &str, value: PrimitiveValue) -> Option<Node> {
        let code = match self.definition.property(name) {
            Some(p) if p.types.len() == 1 => p.types[0].code.clone(),
            Some(_) => {
                let message = format!(
                    "'{}.{}' is a choice element; use a typed name such as '{}'",
                    self.definition.name,
                    name,
                    crate::choice::choice_element_name(name, "string")
                );
                self.record_misuse(message);
                return None;
            }
            None => match self.definition.resolve_choice_name(name) {
                Some((_, code)) => code.to_string(),
                None => {
                    self.unknown_element(name);
                    return None;
                }
            },
        };

        let builder = match self.registry.builder(&code) {
            Ok(b) if b.definition.is_primitive() => b,
            Ok(_) => {
                let message = format!(
                    "'{}.{}' is of type {}, not a primitive",
                    self.definition.name, name, code
                );
                self.record_misuse(message);
                return None;
            }
            Err(e) => {
                self.record_misuse(e.to_string());
                return None;
            }
        };

        let path = format!("{}.{}", self.definition.name, name);
        // Checked regardless of this builder's setting; build() decides
        // whether the deferred violations count.
        let checked = builder
            .clone()
            .validating(true)
            .value(value.clone())
            .build();
        match checked {
            Ok(node) => Some(node),
            Err(Error::Validation(errors)) => {
                // The parent's build() reports these; keep the field populated
                // so it is not also reported as missing.
                self.deferred
                    .extend(errors.into_violations().into_iter().map(|v| v.rebased(&code, &path)));
                builder.validating(false).value(value).build().ok()
            }
            Err(e) => {
                self.record_misuse(e.to_string());
                None
            }
        }
    }
}

impl From<&Node> for Builder {
    fn from(node: &Node) -> Self {
        Builder::from_node(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes;
    use crate::schema::core;

    #[test]
    fn test_set_value_uses_declared_type() {
        let coding = core()
            .builder("Coding")
            .unwrap()
            .set_value("system", "http://loinc.org")
            .set_value("code", "1234-5")
            .build()
            .unwrap();
        assert_eq!(coding.get("system").unwrap().type_name(), "uri");
        assert_eq!(coding.get("code").unwrap().type_name(), "code");
    }

    #[test]
    fn test_set_value_reports_invalid_primitive_at_parent_path() {
        let err = core()
            .builder("Coding")
            .unwrap()
            .set_value("code", " padded ")
            .build()
            .unwrap_err();
        match err.violations() {
            [StructuralViolation::InvalidPrimitiveValue { path, .. }] => {
                assert_eq!(path, "Coding.code");
            }
            other => panic!("unexpected violations: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_element_is_misuse() {
        let err = core()
            .builder("Coding")
            .unwrap()
            .set_value("nope", "x")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidBuilderUsage(_)));
    }

    #[test]
    fn test_misuse_reported_even_without_validation() {
        let err = core()
            .builder("Coding")
            .unwrap()
            .validating(false)
            .add("code", datatypes::code("x").unwrap())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidBuilderUsage(msg) if msg.contains("use set")));
    }

    #[test]
    fn test_value_on_complex_type_is_misuse() {
        let err = core()
            .builder("Coding")
            .unwrap()
            .value("x")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidBuilderUsage(_)));
    }

    #[test]
    fn test_typed_choice_name_must_match_node_type() {
        let err = core()
            .builder("Coverage.costToBeneficiary")
            .unwrap()
            .set("valueQuantity", datatypes::money(rust_decimal::Decimal::ONE, "EUR").unwrap())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidBuilderUsage(_)));
    }

    #[test]
    fn test_set_opt_none_clears() {
        let period = core()
            .builder("Period")
            .unwrap()
            .set("start", datatypes::date_time("2024-01-01T00:00:00Z").unwrap())
            .set_value("end", "2024-12-31T00:00:00Z")
            .set_opt("start", None)
            .build()
            .unwrap();
        assert!(period.get("start").is_none());
        assert!(period.get("end").is_some());
    }

    #[test]
    fn test_disabled_validation_drops_null_elements() {
        let cc = core()
            .builder("CodeableConcept")
            .unwrap()
            .validating(false)
            .add_nullable("coding", None)
            .add("coding", datatypes::coding("http://loinc.org", "1").unwrap())
            .build()
            .unwrap();
        assert_eq!(cc.field("coding").len(), 1);
    }
}
