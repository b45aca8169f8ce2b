use crate::{BuildError, ConfigError, ConstraintPlan, ConstraintsConfig};
use ferrum_fhirpath::{Context, Engine as FhirPathEngine, Error as FhirPathError};
use ferrum_model::visitor::Visitor;
use ferrum_model::{Builder, Constraint, Node};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace};

/// Reusable constraint validator - owns the plan and the expression engine
pub struct ConstraintValidator {
    plan: ConstraintPlan,
    fhirpath_engine: Arc<FhirPathEngine>,
}

impl ConstraintValidator {
    pub fn new(plan: ConstraintPlan) -> Self {
        Self::with_engine(plan, Arc::new(FhirPathEngine::new()))
    }

    /// Share one engine (and its compiled-expression cache) between validators.
    pub fn with_engine(plan: ConstraintPlan, fhirpath_engine: Arc<FhirPathEngine>) -> Self {
        Self {
            plan,
            fhirpath_engine,
        }
    }

    pub fn from_config(config: &ConstraintsConfig) -> Result<Self, ConfigError> {
        let plan = config.compile()?;
        Ok(Self::new(plan))
    }

    /// Evaluate the constraints declared for `node`'s type, and for every
    /// nested element when the plan recurses.
    pub fn validate(&self, node: &Node) -> ValidationOutcome {
        if !self.plan.enabled {
            return ValidationOutcome::success(Some(node.type_name().to_string()));
        }
        let mut run = ValidationRun::new(&self.plan, &self.fhirpath_engine, node);
        node.walk(&mut run);
        let outcome = run.finish();
        debug!(
            resource_type = node.type_name(),
            errors = outcome.error_count(),
            warnings = outcome.warning_count(),
            valid = outcome.valid,
            "constraint validation finished"
        );
        outcome
    }

    pub fn validate_batch(&self, nodes: &[Node]) -> Vec<ValidationOutcome> {
        nodes.iter().map(|n| self.validate(n)).collect()
    }

    /// Build `builder` and validate the result. Structural violations always
    /// fail; failing constraints fail only under a strict plan, and warnings
    /// never do.
    pub fn build(&self, builder: Builder) -> Result<(Node, ValidationOutcome), BuildError> {
        let node = builder.build()?;
        let outcome = self.validate(&node);
        if !outcome.valid {
            return Err(BuildError::Constraints(Box::new(outcome)));
        }
        Ok((node, outcome))
    }

    pub fn plan(&self) -> &ConstraintPlan {
        &self.plan
    }

    pub fn engine(&self) -> &Arc<FhirPathEngine> {
        &self.fhirpath_engine
    }
}

/// Short-lived validation execution, driven by the node traversal
struct ValidationRun<'a> {
    plan: &'a ConstraintPlan,
    fhirpath_engine: &'a FhirPathEngine,
    root: Node,
    /// Enclosing resources, innermost last (`%resource`)
    resources: Vec<Node>,
    segments: Vec<String>,
    issues: Vec<ValidationIssue>,
}

impl<'a> ValidationRun<'a> {
    fn new(plan: &'a ConstraintPlan, fhirpath_engine: &'a FhirPathEngine, root: &Node) -> Self {
        Self {
            plan,
            fhirpath_engine,
            root: root.clone(),
            resources: Vec::new(),
            segments: Vec::new(),
            issues: Vec::new(),
        }
    }

    fn finish(self) -> ValidationOutcome {
        let has_errors = self.has_errors();
        ValidationOutcome {
            resource_type: Some(self.root.type_name().to_string()),
            valid: !(self.plan.strict && has_errors),
            issues: self.issues,
        }
    }

    fn is_full(&self) -> bool {
        self.issues.len() >= self.plan.max_issues
    }

    fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Error || i.severity == IssueSeverity::Fatal)
    }

    fn check_node(&mut self, path: &str, node: &Node) {
        let registry = node.registry().clone();
        for constraint in registry.constraints_for(node.type_name()) {
            let Some(severity) = self.plan.severity_for(constraint) else {
                continue;
            };
            if constraint.is_base_location() {
                self.check(constraint, severity, path, node);
            } else {
                for (target_path, target) in resolve_location(path, node, &constraint.location) {
                    self.check(constraint, severity, &target_path, &target);
                }
            }
        }
    }

    fn check(&mut self, constraint: &Constraint, severity: IssueSeverity, path: &str, node: &Node) {
        if self.is_full() {
            return;
        }
        let resource = self
            .resources
            .last()
            .cloned()
            .unwrap_or_else(|| self.root.clone());
        let ctx = Context::for_node(node.clone(), resource, self.root.clone());
        let result = self
            .fhirpath_engine
            .evaluate(&constraint.expression, &ctx)
            .and_then(|c| c.as_boolean());
        trace!(key = %constraint.key, path, result = ?result, "constraint evaluated");

        let issue = match result {
            Ok(Some(false)) => ValidationIssue::new(
                severity,
                IssueCode::Invariant,
                format!("Constraint failed: {}: '{}'", constraint.key, constraint.human),
            ),
            Ok(_) => return,
            Err(err) => {
                let code = match err {
                    FhirPathError::Unsupported(_) => IssueCode::NotSupported,
                    _ => IssueCode::Processing,
                };
                ValidationIssue::information(
                    code,
                    format!("Constraint {} not evaluated: {}", constraint.key, err),
                )
            }
        };
        self.issues.push(
            issue
                .with_constraint(&constraint.key)
                .with_location(path.to_string())
                .with_expression(vec![path.to_string()]),
        );
    }
}

impl Visitor for ValidationRun<'_> {
    fn pre_visit(&mut self, _node: &Node) -> bool {
        !self.is_full()
    }

    fn visit_start(&mut self, name: &str, index: Option<usize>, node: &Node) {
        self.segments.push(match index {
            Some(i) => format!("{}[{}]", name, i),
            None => name.to_string(),
        });
        if node.is_resource() {
            self.resources.push(node.clone());
        }
    }

    fn visit(&mut self, _name: &str, _index: Option<usize>, node: &Node) -> bool {
        let path = self.segments.join(".");
        self.check_node(&path, node);
        self.plan.recurse
    }

    fn visit_end(&mut self, _name: &str, _index: Option<usize>, node: &Node) {
        self.segments.pop();
        if node.is_resource() {
            self.resources.pop();
        }
    }
}

/// Nodes addressed by a dotted `location` relative to `node`, with their
/// element paths.
fn resolve_location(path: &str, node: &Node, location: &str) -> Vec<(String, Node)> {
    let mut current = vec![(path.to_string(), node.clone())];
    for segment in location.split('.') {
        let mut next = Vec::new();
        for (parent_path, parent) in &current {
            let is_list = parent
                .definition()
                .property(segment)
                .map_or(false, |p| p.is_list());
            for (i, child) in parent.field(segment).iter().enumerate() {
                let child_path = if is_list {
                    format!("{}.{}[{}]", parent_path, segment, i)
                } else {
                    format!("{}.{}", parent_path, segment)
                };
                next.push((child_path, child.clone()));
            }
        }
        current = next;
    }
    current
}

/// Constraint validation result for a single node tree
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub resource_type: Option<String>,
    /// False when a strict plan saw a failing rule
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationOutcome {
    pub fn success(resource_type: Option<String>) -> Self {
        Self {
            resource_type,
            valid: true,
            issues: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error || i.severity == IssueSeverity::Fatal)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
            .count()
    }

    /// Issues raised by the constraint `key`.
    pub fn issues_for<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a ValidationIssue> + 'a {
        self.issues
            .iter()
            .filter(move |i| i.constraint.as_deref() == Some(key))
    }

    pub fn to_operation_outcome(&self) -> Value {
        serde_json::json!({
            "resourceType": "OperationOutcome",
            "issue": self.issues.iter().map(|i| i.to_json()).collect::<Vec<_>>()
        })
    }
}

/// Individual validation issue
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub code: IssueCode,
    pub diagnostics: String,
    /// Key of the constraint that raised the issue
    pub constraint: Option<String>,
    pub location: Option<String>,
    pub expression: Option<Vec<String>>,
}

impl ValidationIssue {
    pub fn new(severity: IssueSeverity, code: IssueCode, diagnostics: String) -> Self {
        Self {
            severity,
            code,
            diagnostics,
            constraint: None,
            location: None,
            expression: None,
        }
    }

    pub fn error(code: IssueCode, diagnostics: String) -> Self {
        Self::new(IssueSeverity::Error, code, diagnostics)
    }

    pub fn warning(code: IssueCode, diagnostics: String) -> Self {
        Self::new(IssueSeverity::Warning, code, diagnostics)
    }

    pub fn information(code: IssueCode, diagnostics: String) -> Self {
        Self::new(IssueSeverity::Information, code, diagnostics)
    }

    pub fn with_constraint(mut self, key: &str) -> Self {
        self.constraint = Some(key.to_string());
        self
    }

    pub fn with_location(mut self, location: String) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_expression(mut self, expression: Vec<String>) -> Self {
        self.expression = Some(expression);
        self
    }

    fn to_json(&self) -> Value {
        let mut issue = serde_json::json!({
            "severity": self.severity.to_string().to_lowercase(),
            "code": self.code.to_string(),
            "diagnostics": self.diagnostics,
        });

        if let Some(ref key) = self.constraint {
            issue["details"] = serde_json::json!({ "text": key });
        }

        if let Some(ref loc) = self.location {
            issue["location"] = serde_json::json!([loc]);
        }

        if let Some(ref expr) = self.expression {
            issue["expression"] = serde_json::json!(expr);
        }

        issue
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    Fatal,
    Error,
    Warning,
    Information,
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fatal => write!(f, "Fatal"),
            Self::Error => write!(f, "Error"),
            Self::Warning => write!(f, "Warning"),
            Self::Information => write!(f, "Information"),
        }
    }
}

/// OperationOutcome issue types raised by constraint evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueCode {
    Invariant,
    Processing,
    NotSupported,
    Informational,
}

impl std::fmt::Display for IssueCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Invariant => "invariant",
            Self::Processing => "processing",
            Self::NotSupported => "not-supported",
            Self::Informational => "informational",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_outcome_operations() {
        let outcome = ValidationOutcome {
            resource_type: Some("Coverage".to_string()),
            valid: false,
            issues: vec![
                ValidationIssue::error(IssueCode::Invariant, "Constraint failed: per-1".to_string())
                    .with_constraint("per-1"),
                ValidationIssue::warning(IssueCode::Invariant, "Constraint failed: dom-6".to_string()),
            ],
        };

        assert!(!outcome.valid);
        assert!(outcome.has_errors());
        assert_eq!(outcome.error_count(), 1);
        assert_eq!(outcome.warning_count(), 1);
        assert_eq!(outcome.issues_for("per-1").count(), 1);
    }

    #[test]
    fn test_operation_outcome_conversion() {
        let outcome = ValidationOutcome {
            resource_type: Some("Coverage".to_string()),
            valid: false,
            issues: vec![ValidationIssue::error(
                IssueCode::Invariant,
                "Constraint failed: per-1".to_string(),
            )
            .with_constraint("per-1")
            .with_location("Coverage.period".to_string())
            .with_expression(vec!["Coverage.period".to_string()])],
        };

        let op_outcome = outcome.to_operation_outcome();
        assert_eq!(op_outcome["resourceType"], "OperationOutcome");
        assert_eq!(op_outcome["issue"][0]["severity"], "error");
        assert_eq!(op_outcome["issue"][0]["code"], "invariant");
        assert_eq!(op_outcome["issue"][0]["details"]["text"], "per-1");
        assert_eq!(op_outcome["issue"][0]["expression"][0], "Coverage.period");
    }

    #[test]
    fn test_location_resolution_indexes_lists() {
        use ferrum_model::{datatypes, schema};
        let class = |value: &str| {
            schema::core()
                .builder("Coverage.class")
                .unwrap()
                .set("type", datatypes::codeable_concept("urn:sys", "group").unwrap())
                .set_value("value", value)
                .build()
                .unwrap()
        };
        let coverage = schema::core()
            .builder("Coverage")
            .unwrap()
            .set_value("status", "active")
            .set("beneficiary", datatypes::reference("Patient/p1").unwrap())
            .add("payor", datatypes::reference("Organization/o1").unwrap())
            .add("class", class("A"))
            .add("class", class("B"))
            .build()
            .unwrap();
        let paths: Vec<String> = resolve_location("Coverage", &coverage, "class.type")
            .into_iter()
            .map(|(path, _)| path)
            .collect();
        assert_eq!(paths, vec!["Coverage.class[0].type", "Coverage.class[1].type"]);
        assert!(resolve_location("Coverage", &coverage, "period").is_empty());
    }
}
