use ferrum_model::{datatypes, schema};
use ferrum_validator::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Example 1: Using presets
    let strict = ConstraintsConfig::preset(Preset::Strict);
    let plan = strict.compile()?;
    println!("Strict plan reports warnings: {}", plan.report_warnings);

    // Example 2: Builder pattern
    let custom_cfg = ConstraintsConfig::builder()
        .preset(Preset::Lenient)
        .warnings(WarningMode::Report)
        .suppress("dom-6")
        .level_override("ref-1", ConstraintLevel::Warning)
        .max_issues(500)
        .build();
    let validator = ConstraintValidator::from_config(&custom_cfg)?;

    // Example 3: YAML configuration
    let yaml = r#"
preset: Strict
suppress:
  - "dom-6"
max_issues: 1000
"#;
    let cfg = ConstraintsConfig::from_yaml(yaml)?;
    println!("YAML config strict: {}", cfg.strict);

    // Example 4: Error handling
    let invalid_cfg = ConstraintsConfig::builder().max_issues(0).build();
    match invalid_cfg.compile() {
        Ok(_) => println!("Should not happen"),
        Err(e) => println!("Caught expected error: {}", e),
    }

    // Example 5: Validate a node and render the outcome
    let coverage = schema::core()
        .builder("Coverage")?
        .set_value("status", "active")
        .set("beneficiary", datatypes::reference("Patient/p1")?)
        .add("payor", datatypes::reference("#missing")?)
        .set(
            "period",
            datatypes::period(Some("2024-12-31"), Some("2024-01-01"))?,
        )
        .build()?;
    let outcome = validator.validate(&coverage);
    println!(
        "{} error(s), {} warning(s)",
        outcome.error_count(),
        outcome.warning_count()
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&outcome.to_operation_outcome())?
    );

    // Example 6: Export to YAML
    println!("\nStrict preset as YAML:\n{}", strict.to_yaml()?);

    Ok(())
}
