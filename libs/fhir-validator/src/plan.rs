use crate::validator::IssueSeverity;
use ferrum_model::{Constraint, ConstraintSeverity};
use std::collections::{HashMap, HashSet};

/// Compiled constraint configuration, immutable and cheap to share
#[derive(Debug, Clone)]
pub struct ConstraintPlan {
    pub enabled: bool,
    pub report_warnings: bool,
    pub suppress: HashSet<String>,
    pub overrides: HashMap<String, IssueSeverity>,
    pub strict: bool,
    pub max_issues: usize,
    pub recurse: bool,
}

impl ConstraintPlan {
    /// Severity to report a failure of `constraint` at, or `None` when the
    /// constraint is not evaluated at all.
    pub fn severity_for(&self, constraint: &Constraint) -> Option<IssueSeverity> {
        if !self.enabled || self.suppress.contains(&constraint.key) {
            return None;
        }
        let severity = match self.overrides.get(&constraint.key) {
            Some(level) => *level,
            None => match constraint.severity {
                ConstraintSeverity::Rule => IssueSeverity::Error,
                ConstraintSeverity::Warning => IssueSeverity::Warning,
            },
        };
        if severity == IssueSeverity::Warning && !self.report_warnings {
            return None;
        }
        Some(severity)
    }
}

#[cfg(test)]
mod tests {
    use crate::{ConstraintLevel, ConstraintsConfig, Preset};
    use crate::validator::IssueSeverity;
    use ferrum_model::Constraint;

    #[test]
    fn test_declared_severity_maps_to_issue_severity() {
        let plan = ConstraintsConfig::preset(Preset::Strict).compile().unwrap();
        let rule = Constraint::rule("per-1", "", "true");
        let warning = Constraint::warning("dom-6", "", "true");
        assert_eq!(plan.severity_for(&rule), Some(IssueSeverity::Error));
        assert_eq!(plan.severity_for(&warning), Some(IssueSeverity::Warning));
    }

    #[test]
    fn test_lenient_ignores_warnings() {
        let plan = ConstraintsConfig::preset(Preset::Lenient).compile().unwrap();
        assert_eq!(plan.severity_for(&Constraint::warning("dom-6", "", "true")), None);
    }

    #[test]
    fn test_suppress_and_override() {
        let plan = ConstraintsConfig::builder()
            .preset(Preset::Strict)
            .suppress("ele-1")
            .level_override("ref-1", ConstraintLevel::Information)
            .build()
            .compile()
            .unwrap();
        assert_eq!(plan.severity_for(&Constraint::rule("ele-1", "", "true")), None);
        assert_eq!(
            plan.severity_for(&Constraint::rule("ref-1", "", "true")),
            Some(IssueSeverity::Information)
        );
    }

    #[test]
    fn test_off_evaluates_nothing() {
        let plan = ConstraintsConfig::preset(Preset::Off).compile().unwrap();
        assert_eq!(plan.severity_for(&Constraint::rule("per-1", "", "true")), None);
    }
}
