//! Evaluation context for constraint expressions
//!
//! The context supplies the environment variables an expression can refer
//! to. `%resource` is the resource that contains the node under evaluation,
//! `%rootResource` the outermost resource (different from `%resource` only
//! inside contained resources) and `%context` the node the expression is
//! evaluated on, which is also the initial `$this`.

use crate::value::{Collection, Value};
use ferrum_model::Node;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct Context {
    /// The node the expression starts from (`%context`, initial `$this`)
    pub focus: Node,
    /// `%resource`
    pub resource: Node,
    /// `%rootResource`
    pub root: Node,
    /// Additional `%name` constants
    pub variables: Arc<HashMap<String, Collection>>,
}

impl Context {
    /// Context for evaluating on a resource itself.
    pub fn new(resource: Node) -> Self {
        Self {
            focus: resource.clone(),
            root: resource.clone(),
            resource,
            variables: Arc::new(HashMap::new()),
        }
    }

    /// Context for a node inside `resource`, which itself sits in `root`.
    pub fn for_node(focus: Node, resource: Node, root: Node) -> Self {
        Self {
            focus,
            resource,
            root,
            variables: Arc::new(HashMap::new()),
        }
    }

    pub fn with_root_resource(mut self, root: Node) -> Self {
        self.root = root;
        self
    }

    pub fn with_focus(mut self, focus: Node) -> Self {
        self.focus = focus;
        self
    }

    /// Define `%name`. The `%` prefix is optional.
    pub fn set_variable(&mut self, name: &str, value: Collection) {
        let name = name.strip_prefix('%').unwrap_or(name).to_string();
        Arc::make_mut(&mut self.variables).insert(name, value);
    }

    pub fn with_variable(mut self, name: &str, value: Value) -> Self {
        self.set_variable(name, Collection::singleton(value));
        self
    }

    /// Look up `%name` (given without the `%`).
    pub fn get_variable(&self, name: &str) -> Option<Collection> {
        let node = match name {
            "resource" => &self.resource,
            "rootResource" => &self.root,
            "context" => &self.focus,
            "ucum" => return Some(Collection::singleton(Value::string("http://unitsofmeasure.org"))),
            "sct" => return Some(Collection::singleton(Value::string("http://snomed.info/sct"))),
            "loinc" => return Some(Collection::singleton(Value::string("http://loinc.org"))),
            _ => return self.variables.get(name).cloned(),
        };
        Some(Collection::singleton(Value::node(node.clone())))
    }
}
