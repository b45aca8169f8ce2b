//! Visitor protocol
//!
//! Uniform pre-order traversal over a node tree. For every node the
//! traversal calls, in order:
//!
//! 1. [`Visitor::pre_visit`]: returning `false` skips the node entirely
//! 2. [`Visitor::visit_start`]
//! 3. [`Visitor::visit`]: returning `false` skips the node's content
//! 4. if descending: [`Visitor::visit_id`], [`Visitor::visit_value`], then
//!    every child in schema order, list fields bracketed by
//!    [`Visitor::visit_list_start`] / [`Visitor::visit_list_end`]
//! 5. [`Visitor::visit_end`]
//! 6. [`Visitor::post_visit`]
//!
//! Children follow the property order of the type definition, which places
//! `extension` and `modifierExtension` where the base types declare them.
//! Choice fields are reported under their base name (`value`); encoders that
//! need the typed name use [`crate::choice::choice_element_name`].

use crate::node::{Field, Node};
use crate::primitive::PrimitiveValue;

/// Traversal callbacks. Every method has a no-op default.
#[allow(unused_variables)]
pub trait Visitor {
    fn pre_visit(&mut self, node: &Node) -> bool {
        true
    }

    fn visit_start(&mut self, name: &str, index: Option<usize>, node: &Node) {}

    /// Return `false` to skip the node's id, value and children.
    fn visit(&mut self, name: &str, index: Option<usize>, node: &Node) -> bool {
        true
    }

    fn visit_id(&mut self, id: &str) {}

    fn visit_value(&mut self, value: &PrimitiveValue) {}

    fn visit_list_start(&mut self, name: &str, len: usize) {}

    fn visit_list_end(&mut self, name: &str, len: usize) {}

    fn visit_end(&mut self, name: &str, index: Option<usize>, node: &Node) {}

    fn post_visit(&mut self, node: &Node) {}
}

impl Node {
    /// Drive `visitor` over this node and its subtree. `name` is the element
    /// name the node sits under (the type name for a root resource) and
    /// `index` its position in a list field.
    pub fn accept<V: Visitor + ?Sized>(&self, name: &str, index: Option<usize>, visitor: &mut V) {
        if !visitor.pre_visit(self) {
            return;
        }
        visitor.visit_start(name, index, self);
        if visitor.visit(name, index, self) {
            if let Some(id) = self.id() {
                visitor.visit_id(id);
            }
            if let Some(value) = self.value() {
                visitor.visit_value(value);
            }
            for (property, field) in self.fields() {
                match field {
                    Field::Single(Some(child)) => child.accept(&property.name, None, visitor),
                    Field::List(children) if !children.is_empty() => {
                        visitor.visit_list_start(&property.name, children.len());
                        for (i, child) in children.iter().enumerate() {
                            child.accept(&property.name, Some(i), visitor);
                        }
                        visitor.visit_list_end(&property.name, children.len());
                    }
                    _ => {}
                }
            }
        }
        visitor.visit_end(name, index, self);
        visitor.post_visit(self);
    }

    /// Visit this node as a root, named after its type.
    pub fn walk<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        let name = self.type_name().to_string();
        self.accept(&name, None, visitor);
    }
}

/// Phase of a recorded callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    PreVisit,
    VisitStart,
    Visit,
    VisitId,
    VisitValue,
    ListStart,
    ListEnd,
    VisitEnd,
    PostVisit,
}

/// One recorded callback: phase, element name and list index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub phase: Phase,
    pub name: String,
    pub index: Option<usize>,
}

/// Records every callback. Useful for debugging encoders and for checking
/// that traversal is deterministic.
#[derive(Debug, Default)]
pub struct TraceVisitor {
    pub events: Vec<TraceEvent>,
    /// Names of the elements currently open, innermost last.
    stack: Vec<(String, Option<usize>)>,
}

impl TraceVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, phase: Phase, name: &str, index: Option<usize>) {
        self.events.push(TraceEvent {
            phase,
            name: name.to_string(),
            index,
        });
    }

    fn current(&self) -> (String, Option<usize>) {
        self.stack.last().cloned().unwrap_or_default()
    }
}

impl Visitor for TraceVisitor {
    fn pre_visit(&mut self, node: &Node) -> bool {
        self.record(Phase::PreVisit, node.type_name(), None);
        true
    }

    fn visit_start(&mut self, name: &str, index: Option<usize>, _node: &Node) {
        self.stack.push((name.to_string(), index));
        self.record(Phase::VisitStart, name, index);
    }

    fn visit(&mut self, name: &str, index: Option<usize>, _node: &Node) -> bool {
        self.record(Phase::Visit, name, index);
        true
    }

    fn visit_id(&mut self, _id: &str) {
        let (name, index) = self.current();
        self.record(Phase::VisitId, &name, index);
    }

    fn visit_value(&mut self, _value: &PrimitiveValue) {
        let (name, index) = self.current();
        self.record(Phase::VisitValue, &name, index);
    }

    fn visit_list_start(&mut self, name: &str, _len: usize) {
        self.record(Phase::ListStart, name, None);
    }

    fn visit_list_end(&mut self, name: &str, _len: usize) {
        self.record(Phase::ListEnd, name, None);
    }

    fn visit_end(&mut self, name: &str, index: Option<usize>, _node: &Node) {
        self.record(Phase::VisitEnd, name, index);
        self.stack.pop();
    }

    fn post_visit(&mut self, node: &Node) {
        self.record(Phase::PostVisit, node.type_name(), None);
    }
}

/// Calls `f` with the FHIRPath-style location of every node
/// (`Coverage.payor[0]`, `Coverage.class[1].value`). `f` returns whether to
/// descend into the node.
pub struct PathVisitor<F> {
    segments: Vec<String>,
    f: F,
}

impl<F> PathVisitor<F>
where
    F: FnMut(&str, &Node) -> bool,
{
    pub fn new(f: F) -> Self {
        Self {
            segments: Vec::new(),
            f,
        }
    }

    pub fn into_inner(self) -> F {
        self.f
    }
}

impl<F> Visitor for PathVisitor<F>
where
    F: FnMut(&str, &Node) -> bool,
{
    fn visit_start(&mut self, name: &str, index: Option<usize>, _node: &Node) {
        let segment = match index {
            Some(i) => format!("{}[{}]", name, i),
            None => name.to_string(),
        };
        self.segments.push(segment);
    }

    fn visit(&mut self, _name: &str, _index: Option<usize>, node: &Node) -> bool {
        let path = self.segments.join(".");
        (self.f)(&path, node)
    }

    fn visit_end(&mut self, _name: &str, _index: Option<usize>, _node: &Node) {
        self.segments.pop();
    }
}

/// Every node of the tree rooted at `root`, paired with its location.
pub fn collect_paths(root: &Node) -> Vec<(String, Node)> {
    let mut out = Vec::new();
    let mut visitor = PathVisitor::new(|path: &str, node: &Node| {
        out.push((path.to_string(), node.clone()));
        true
    });
    root.walk(&mut visitor);
    out
}
