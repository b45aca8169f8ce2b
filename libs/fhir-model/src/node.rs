//! Immutable element nodes
//!
//! A [`Node`] is one element of a resource tree: a resource, a complex
//! datatype, a backbone element or a primitive. Its shape is described by a
//! [`TypeDefinition`]; the node stores one [`Field`] per schema property, in
//! schema order, plus the element `id` and (for primitives) a value.
//!
//! Nodes are reference counted and never change after `build()`, so cloning
//! is cheap and a node can be shared across threads. The structural hash is
//! computed on first use and memoized.

use crate::builder::Builder;
use crate::choice::ChoiceType;
use crate::primitive::PrimitiveValue;
use crate::schema::{Property, TypeDefinition, TypeKind, TypeRegistry};
use once_cell::sync::OnceCell;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Clone)]
pub struct Node(Arc<NodeData>);

struct NodeData {
    registry: Arc<TypeRegistry>,
    definition: Arc<TypeDefinition>,
    id: Option<String>,
    value: Option<PrimitiveValue>,
    fields: Vec<Field>,
    hash: OnceCell<u64>,
}

/// Frozen content of one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Single(Option<Node>),
    List(Vec<Node>),
}

impl Field {
    /// The nodes held by this field; never null, possibly empty.
    pub fn nodes(&self) -> &[Node] {
        match self {
            Field::Single(Some(node)) => std::slice::from_ref(node),
            Field::Single(None) => &[],
            Field::List(nodes) => nodes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes().is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes().len()
    }
}

impl Node {
    pub(crate) fn from_parts(
        registry: Arc<TypeRegistry>,
        definition: Arc<TypeDefinition>,
        id: Option<String>,
        value: Option<PrimitiveValue>,
        fields: Vec<Field>,
    ) -> Self {
        Node(Arc::new(NodeData {
            registry,
            definition,
            id,
            value,
            fields,
            hash: OnceCell::new(),
        }))
    }

    pub fn type_name(&self) -> &str {
        &self.0.definition.name
    }

    pub fn definition(&self) -> &Arc<TypeDefinition> {
        &self.0.definition
    }

    /// Registry the node was built against.
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.0.registry
    }

    pub fn kind(&self) -> TypeKind {
        self.0.definition.kind
    }

    pub fn is_resource(&self) -> bool {
        self.0.definition.is_resource()
    }

    pub fn is_primitive(&self) -> bool {
        self.0.definition.is_primitive()
    }

    pub fn id(&self) -> Option<&str> {
        self.0.id.as_deref()
    }

    pub fn value(&self) -> Option<&PrimitiveValue> {
        self.0.value.as_ref()
    }

    /// Properties paired with their frozen content, in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&Property, &Field)> {
        self.0.definition.properties.iter().zip(self.0.fields.iter())
    }

    /// Nodes held by the property `name`. Typed choice names
    /// (`valueQuantity`) select the base field only when it holds that type.
    /// Unknown names give an empty slice.
    pub fn field(&self, name: &str) -> &[Node] {
        let def = &self.0.definition;
        if let Some(index) = def.property_index(name) {
            return self.0.fields[index].nodes();
        }
        if let Some((property, code)) = def.resolve_choice_name(name) {
            if let Some(index) = def.property_index(&property.name) {
                let nodes = self.0.fields[index].nodes();
                if nodes.first().map_or(false, |n| n.type_name() == code) {
                    return nodes;
                }
            }
        }
        &[]
    }

    /// First node of the property `name`, for single-valued fields.
    pub fn get(&self, name: &str) -> Option<&Node> {
        self.field(name).first()
    }

    pub fn has(&self, name: &str) -> bool {
        !self.field(name).is_empty()
    }

    /// String value of a primitive child, e.g. `reference.string_value("reference")`.
    pub fn string_value(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|n| n.value())
            .and_then(|v| v.as_str())
    }

    /// Current alternative of a choice field.
    pub fn choice<C: ChoiceType>(&self, name: &str) -> Option<C> {
        self.get(name).and_then(C::from_node)
    }

    pub fn extensions(&self) -> &[Node] {
        self.field("extension")
    }

    pub fn modifier_extensions(&self) -> &[Node] {
        self.field("modifierExtension")
    }

    /// Extensions (not modifier extensions) with the given URL.
    pub fn extensions_by_url<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.extensions()
            .iter()
            .filter(move |ext| ext.string_value("url") == Some(url))
    }

    /// False if the node carries a modifier extension whose URL is not in
    /// `understood`. Such a node must not be interpreted by the consumer.
    pub fn is_interpretable(&self, understood: &[&str]) -> bool {
        self.modifier_extensions().iter().all(|ext| {
            ext.string_value("url")
                .map_or(false, |url| understood.contains(&url))
        })
    }

    pub fn has_value(&self) -> bool {
        self.0.value.is_some()
    }

    /// True if any property holds at least one node. The `id` attribute
    /// does not count.
    pub fn has_children(&self) -> bool {
        self.0.fields.iter().any(|f| !f.is_empty())
    }

    /// True if the node carries a value, an extension or any child.
    pub fn has_meaningful_content(&self) -> bool {
        self.has_value() || self.has_children()
    }

    /// A builder seeded with this node's content.
    pub fn to_builder(&self) -> Builder {
        Builder::from_node(self)
    }

    pub fn ptr_eq(a: &Node, b: &Node) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Structural hash, computed once per node.
    pub fn hash_code(&self) -> u64 {
        *self.0.hash.get_or_init(|| self.compute_hash())
    }

    fn compute_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.type_name().hash(&mut hasher);
        self.0.id.hash(&mut hasher);
        self.0.value.hash(&mut hasher);
        for field in &self.0.fields {
            match field {
                Field::Single(node) => {
                    0u8.hash(&mut hasher);
                    node.as_ref().map(Node::hash_code).hash(&mut hasher);
                }
                Field::List(nodes) => {
                    1u8.hash(&mut hasher);
                    nodes.len().hash(&mut hasher);
                    for node in nodes {
                        node.hash_code().hash(&mut hasher);
                    }
                }
            }
        }
        hasher.finish()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        if Node::ptr_eq(self, other) {
            return true;
        }
        if let (Some(a), Some(b)) = (self.0.hash.get(), other.0.hash.get()) {
            if a != b {
                return false;
            }
        }
        self.type_name() == other.type_name()
            && self.0.id == other.0.id
            && self.0.value == other.0.value
            && self.0.fields == other.0.fields
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code());
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.type_name());
        if let Some(id) = &self.0.id {
            s.field("id", id);
        }
        if let Some(value) = &self.0.value {
            s.field("value", value);
        }
        for (property, field) in self.fields() {
            match field {
                Field::Single(Some(node)) => {
                    s.field(&property.name, node);
                }
                Field::List(nodes) if !nodes.is_empty() => {
                    s.field(&property.name, nodes);
                }
                _ => {}
            }
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::datatypes;
    use crate::schema::core;
    use std::collections::HashSet;

    #[test]
    fn test_absent_fields_are_empty_not_errors() {
        let coding = datatypes::coding("http://loinc.org", "1234-5").unwrap();
        assert!(coding.get("display").is_none());
        assert!(coding.field("display").is_empty());
        assert!(coding.field("noSuchField").is_empty());
        assert!(coding.extensions().is_empty());
        assert_eq!(coding.string_value("code"), Some("1234-5"));
    }

    #[test]
    fn test_meaningful_content() {
        let s = datatypes::string("x").unwrap();
        assert!(s.has_meaningful_content());

        let period = core()
            .builder("Period")
            .unwrap()
            .validating(false)
            .id("p1")
            .build()
            .unwrap();
        assert!(!period.has_children());
        assert!(!period.has_meaningful_content());
    }

    #[test]
    fn test_hash_is_memoized_and_consistent_with_eq() {
        let a = datatypes::coding("http://loinc.org", "1234-5").unwrap();
        let b = datatypes::coding("http://loinc.org", "1234-5").unwrap();
        let c = datatypes::coding("http://loinc.org", "9999-9").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.hash_code(), b.hash_code());
        assert_eq!(a.hash_code(), a.hash_code());
        assert_ne!(a, c);

        let set: HashSet<_> = vec![a.clone(), b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&a));
    }

    #[test]
    fn test_typed_choice_name_access() {
        let money = datatypes::money(rust_decimal::Decimal::new(1050, 2), "EUR").unwrap();
        let cost = core()
            .builder("Coverage.costToBeneficiary")
            .unwrap()
            .set("value", money.clone())
            .build()
            .unwrap();
        assert_eq!(cost.get("value"), Some(&money));
        assert_eq!(cost.get("valueMoney"), Some(&money));
        assert!(cost.get("valueQuantity").is_none());
    }

    #[test]
    fn test_is_interpretable() {
        let ext = datatypes::extension(
            "http://example.org/must-understand",
            datatypes::boolean(true).unwrap(),
        )
        .unwrap();
        let class = core()
            .builder("Coverage.class")
            .unwrap()
            .set(
                "type",
                datatypes::codeable_concept(
                    "http://terminology.hl7.org/CodeSystem/coverage-class",
                    "group",
                )
                .unwrap(),
            )
            .set_value("value", "CB135")
            .modifier_extension(ext)
            .build()
            .unwrap();
        assert!(!class.is_interpretable(&[]));
        assert!(class.is_interpretable(&["http://example.org/must-understand"]));
    }
}
