//! Schema table
//!
//! Language-agnostic representation of FHIR types: every property a type
//! carries (in snapshot order, inherited ones included), its cardinality,
//! its allowed types (more than one makes it a choice field), reference
//! whitelists and the constraints declared on the type.
//!
//! Nodes and builders interpret this table; there is no Rust type per
//! resource.

mod core;
pub mod parser;

pub use self::core::core;

use crate::builder::Builder;
use crate::config::ModelConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of type definitions, indexed by name and canonical URL
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<TypeDefinition>>,
    url_index: HashMap<String, String>,
    config: ModelConfig,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with every type of the built-in core schema.
    pub fn with_core_types() -> Self {
        core().as_ref().clone()
    }

    pub fn with_config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Add a type to the registry, replacing any type with the same name
    pub fn add_type(&mut self, type_def: TypeDefinition) {
        if let Some(url) = &type_def.url {
            self.url_index.insert(url.clone(), type_def.name.clone());
        }
        self.types.insert(type_def.name.clone(), Arc::new(type_def));
    }

    pub fn extend<I: IntoIterator<Item = TypeDefinition>>(&mut self, defs: I) {
        for def in defs {
            self.add_type(def);
        }
    }

    pub fn get_type(&self, name: &str) -> Option<&Arc<TypeDefinition>> {
        self.types.get(name)
    }

    pub fn get_type_by_url(&self, url: &str) -> Option<&Arc<TypeDefinition>> {
        self.url_index.get(url).and_then(|name| self.types.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate over all types
    pub fn types(&self) -> impl Iterator<Item = &Arc<TypeDefinition>> {
        self.types.values()
    }

    /// Get all concrete resource types
    pub fn resource_types(&self) -> impl Iterator<Item = &Arc<TypeDefinition>> {
        self.types
            .values()
            .filter(|t| t.kind == TypeKind::Resource && !t.is_abstract)
    }

    /// Start a builder for `type_name`.
    pub fn builder(self: &Arc<Self>, type_name: &str) -> Result<Builder> {
        let definition = self
            .get_type(type_name)
            .cloned()
            .ok_or_else(|| Error::UnknownType(type_name.to_string()))?;
        if definition.is_abstract {
            return Err(Error::InvalidBuilderUsage(format!(
                "cannot instantiate abstract type '{}'",
                type_name
            )));
        }
        Ok(Builder::new(Arc::clone(self), definition))
    }

    /// True if `name` is `ancestor` or derives from it through `base_type`.
    pub fn is_subtype_of(&self, name: &str, ancestor: &str) -> bool {
        let mut current = Some(name);
        // Bounded walk; a malformed table must not loop forever.
        for _ in 0..32 {
            match current {
                Some(n) if n == ancestor => return true,
                Some(n) => {
                    current = self.get_type(n).and_then(|t| t.base_type.as_deref());
                }
                None => return false,
            }
        }
        false
    }

    /// Constraints that apply to instances of `type_name`: those of its base
    /// types first, then its own.
    pub fn constraints_for(&self, type_name: &str) -> Vec<&Constraint> {
        let mut chain = Vec::new();
        let mut current = self.get_type(type_name);
        while let Some(def) = current {
            if chain.len() >= 32 {
                break;
            }
            chain.push(def);
            current = def.base_type.as_deref().and_then(|b| self.get_type(b));
        }
        chain
            .iter()
            .rev()
            .flat_map(|def| def.constraints.iter())
            .collect()
    }
}

/// A single type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    /// The type name (e.g., "Coverage", "Coverage.class", "string")
    pub name: String,
    /// Canonical URL if available
    pub url: Option<String>,
    /// Human-readable description
    pub description: Option<String>,
    pub kind: TypeKind,
    /// Base type this extends (if any)
    pub base_type: Option<String>,
    pub is_abstract: bool,
    /// Properties in schema order, inherited ones first. The element `id`
    /// is not listed; every node carries it as an attribute.
    pub properties: Vec<Property>,
    /// Constraints declared by this type (not inherited ones)
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl TypeDefinition {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            url: None,
            description: None,
            kind,
            base_type: None,
            is_abstract: false,
            properties: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }

    /// Resolve a typed choice name (`valueQuantity`) to its property and the
    /// chosen type code.
    pub fn resolve_choice_name(&self, name: &str) -> Option<(&Property, &str)> {
        self.properties.iter().filter(|p| p.is_choice()).find_map(|p| {
            let suffix = name.strip_prefix(p.name.as_str())?;
            p.types
                .iter()
                .find(|t| crate::choice::choice_type_suffix(&t.code) == suffix)
                .map(|t| (p, t.code.as_str()))
        })
    }

    pub fn is_resource(&self) -> bool {
        self.kind == TypeKind::Resource
    }

    pub fn is_primitive(&self) -> bool {
        self.kind == TypeKind::PrimitiveType
    }
}

/// Kind of FHIR type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    /// FHIR Resource (e.g., Patient, Coverage)
    Resource,
    /// Complex datatype (e.g., Coding, Period)
    ComplexType,
    /// Primitive type (e.g., string, integer, boolean)
    PrimitiveType,
    /// Backbone element (nested complex element within a resource)
    BackboneElement,
}

/// A property/field within a type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Property name; the base name for choice fields (`value`, not `value[x]`)
    pub name: String,
    /// The type(s) this property can have
    pub types: Vec<PropertyType>,
    pub cardinality: Cardinality,
    #[serde(default)]
    pub is_modifier: bool,
    #[serde(default)]
    pub is_summary: bool,
    #[serde(default)]
    pub description: Option<String>,
}

impl Property {
    pub fn new(name: impl Into<String>, types: Vec<PropertyType>, cardinality: Cardinality) -> Self {
        Self {
            name: name.into(),
            types,
            cardinality,
            is_modifier: false,
            is_summary: false,
            description: None,
        }
    }

    pub fn modifier(mut self) -> Self {
        self.is_modifier = true;
        self
    }

    pub fn summary(mut self) -> Self {
        self.is_summary = true;
        self
    }

    pub fn is_choice(&self) -> bool {
        self.types.len() > 1
    }

    pub fn is_list(&self) -> bool {
        self.cardinality.is_array()
    }

    pub fn is_required(&self) -> bool {
        self.cardinality.is_required()
    }

    pub fn type_codes(&self) -> Vec<String> {
        self.types.iter().map(|t| t.code.clone()).collect()
    }

    /// Whether a node of `def` may sit in this property. A `Resource` or
    /// `DomainResource` type code accepts any resource of that family.
    pub fn accepts(&self, def: &TypeDefinition, registry: &TypeRegistry) -> bool {
        self.types.iter().any(|t| {
            t.code == def.name
                || (def.is_resource() && matches!(t.code.as_str(), "Resource" | "DomainResource"))
                || registry.is_subtype_of(&def.name, &t.code)
        })
    }

    /// Allowed target resource types across all `Reference` types of this
    /// property. Empty means any resource.
    pub fn reference_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = Vec::new();
        for t in self.types.iter().filter(|t| t.code == "Reference") {
            for profile in &t.target_profiles {
                let name = extract_type_name_from_url(profile);
                if !targets.contains(&name) {
                    targets.push(name);
                }
            }
        }
        targets
    }
}

/// Type reference for a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyType {
    /// Type code (e.g., "string", "CodeableConcept", "Reference")
    pub code: String,
    /// Target resource profiles (for Reference properties)
    #[serde(default)]
    pub target_profiles: Vec<String>,
}

impl PropertyType {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            target_profiles: Vec::new(),
        }
    }

    /// A `Reference` type restricted to the given resource types.
    pub fn reference(targets: &[&str]) -> Self {
        Self {
            code: "Reference".to_string(),
            target_profiles: targets
                .iter()
                .map(|t| format!("http://hl7.org/fhir/StructureDefinition/{}", t))
                .collect(),
        }
    }
}

/// Cardinality of a property (min..max)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cardinality {
    /// Minimum occurrences
    pub min: u32,
    /// Maximum occurrences (None means unbounded/*)
    pub max: Option<u32>,
}

impl Cardinality {
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    pub fn optional() -> Self {
        Self::new(0, Some(1))
    }

    pub fn required() -> Self {
        Self::new(1, Some(1))
    }

    pub fn many() -> Self {
        Self::new(0, None)
    }

    pub fn one_or_more() -> Self {
        Self::new(1, None)
    }

    /// Check if this property is a list/array
    pub fn is_array(&self) -> bool {
        self.max.map(|m| m > 1).unwrap_or(true)
    }

    /// Check if this property is optional
    pub fn is_optional(&self) -> bool {
        self.min == 0
    }

    /// Check if this property is required
    pub fn is_required(&self) -> bool {
        self.min > 0
    }
}

/// Severity of a declared constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintSeverity {
    /// Must hold
    Rule,
    /// Should hold
    Warning,
}

/// Location value meaning "the node the constraint is declared on".
pub const BASE_LOCATION: &str = "(base)";

/// Declarative rule attached to a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// Constraint key (e.g., "ele-1", "coverage-0")
    pub key: String,
    pub severity: ConstraintSeverity,
    /// `(base)` or a path relative to the declaring type (e.g., "period")
    pub location: String,
    /// Human description of constraint
    pub human: String,
    /// FHIRPath expression of constraint
    pub expression: String,
    /// Canonical URL of the definition the constraint originates from
    pub source: Option<String>,
}

impl Constraint {
    pub fn rule(key: &str, human: &str, expression: &str) -> Self {
        Self::new(key, ConstraintSeverity::Rule, human, expression)
    }

    pub fn warning(key: &str, human: &str, expression: &str) -> Self {
        Self::new(key, ConstraintSeverity::Warning, human, expression)
    }

    fn new(key: &str, severity: ConstraintSeverity, human: &str, expression: &str) -> Self {
        Self {
            key: key.to_string(),
            severity,
            location: BASE_LOCATION.to_string(),
            human: human.to_string(),
            expression: expression.to_string(),
            source: None,
        }
    }

    pub fn at(mut self, location: &str) -> Self {
        self.location = location.to_string();
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn is_base_location(&self) -> bool {
        self.location == BASE_LOCATION
    }
}

/// Extract the type name from a canonical URL
/// E.g., "http://hl7.org/fhir/StructureDefinition/Patient" -> "Patient"
pub fn extract_type_name_from_url(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}
